//! Scrape `<input type="hidden">` fields from an HTML page.
//!
//! Single-sign-on providers answer the credential POST with an auto-submitting
//! form; replaying its hidden fields to the relay URL completes the hand-off.

use regex::Regex;
use std::sync::OnceLock;

fn input_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<input\b[^>]*>").expect("static regex"))
}

fn attribute() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)\b([a-z_:-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("static regex")
    })
}

/// Returns `(name, value)` of every hidden input, in document order, with
/// HTML entities decoded.
pub fn hidden_inputs(html: &str) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    for tag in input_tag().find_iter(html) {
        let mut kind = None;
        let mut name = None;
        let mut value = None;
        for cap in attribute().captures_iter(tag.as_str()) {
            let raw = cap
                .get(2)
                .or_else(|| cap.get(3))
                .map(|m| m.as_str())
                .unwrap_or("");
            match cap[1].to_ascii_lowercase().as_str() {
                "type" => kind = Some(raw.to_ascii_lowercase()),
                "name" => name = Some(unescape_html(raw)),
                "value" => value = Some(unescape_html(raw)),
                _ => {}
            }
        }
        if kind.as_deref() == Some("hidden") {
            if let Some(name) = name {
                fields.push((name, value.unwrap_or_default()));
            }
        }
    }
    fields
}

/// Decode the named entities SSO pages use plus numeric references.
pub fn unescape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let Some(semi) = tail.find(';') else {
            out.push_str(tail);
            return out;
        };
        let entity = &tail[1..semi];
        match decode_entity(entity) {
            Some(c) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let num = entity.strip_prefix('#')?;
            let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_hidden_fields_in_order() {
        let html = r#"
            <form action="https://sp.example.com/Shibboleth.sso/SAML2/POST" method="post">
              <input type="hidden" name="RelayState" value="ss:mem:abc"/>
              <input type="hidden" name="SAMLResponse" value="PHNhbWw+&#x3d;&#x3d;"/>
              <input type="submit" value="Continue"/>
            </form>"#;
        let fields = hidden_inputs(html);
        assert_eq!(
            fields,
            vec![
                ("RelayState".to_string(), "ss:mem:abc".to_string()),
                ("SAMLResponse".to_string(), "PHNhbWw+==".to_string()),
            ]
        );
    }

    #[test]
    fn attribute_order_and_case_do_not_matter() {
        let html = r#"<INPUT value='v&amp;1' NAME='k' Type='HIDDEN'>"#;
        assert_eq!(hidden_inputs(html), vec![("k".to_string(), "v&1".to_string())]);
    }

    #[test]
    fn unescape_leaves_unknown_entities() {
        assert_eq!(unescape_html("a &amp; b &bogus; c"), "a & b &bogus; c");
        assert_eq!(unescape_html("&#65;&#x42;"), "AB");
        assert_eq!(unescape_html("tail &"), "tail &");
    }
}
