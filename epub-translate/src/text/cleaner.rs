//! Entity decoding, whitespace cleanup and the reverse escaping.

/// Named entities that show up in EPUB content documents.
const NAMED_ENTITIES: &[(&str, &str)] = &[
    ("&nbsp;", "\u{00a0}"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&apos;", "'"),
    ("&#39;", "'"),
    ("&mdash;", "\u{2014}"),
    ("&ndash;", "\u{2013}"),
    ("&hellip;", "\u{2026}"),
    ("&rsquo;", "\u{2019}"),
    ("&lsquo;", "\u{2018}"),
    ("&rdquo;", "\u{201d}"),
    ("&ldquo;", "\u{201c}"),
    ("&laquo;", "\u{00ab}"),
    ("&raquo;", "\u{00bb}"),
    ("&middot;", "\u{00b7}"),
    ("&shy;", ""),
    // Must stay last so "&amp;lt;" decodes to "&lt;" and not "<"
    ("&amp;", "&"),
];

/// Decode named and numeric character references.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut result = decode_numeric(text);
    for (entity, replacement) in NAMED_ENTITIES {
        result = result.replace(entity, replacement);
    }
    result
}

fn decode_numeric(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("&#") {
        result.push_str(&rest[..start]);
        let candidate = &rest[start..];

        let decoded = candidate.find(';').and_then(|end| {
            let body = &candidate[2..end];
            let code = match body.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => body.parse::<u32>().ok(),
            }?;
            char::from_u32(code).map(|c| (c, end + 1))
        });

        match decoded {
            Some((c, consumed)) => {
                result.push(c);
                rest = &candidate[consumed..];
            }
            None => {
                result.push_str("&#");
                rest = &candidate[2..];
            }
        }
    }

    result.push_str(rest);
    result
}

/// Collapse runs of whitespace (including non-breaking spaces) and trim.
pub fn normalize_whitespace(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c == '\u{00a0}')
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Escape text for use as XHTML element content.
pub fn escape_text(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            _ => result.push(c),
        }
    }
    result
}
