//! Content-Disposition handling: the server's filename tells us the real
//! extension when the task list only knew a bare title.

use std::path::{Path, PathBuf};

/// Extracts the filename from a raw Content-Disposition header value.
///
/// Supports `filename="quoted"`, `filename=token` and the RFC 5987
/// `filename*=UTF-8''percent-encoded` form, which wins when both are present.
pub fn parse_content_disposition_filename(header_value: &str) -> Option<String> {
    let mut plain: Option<String> = None;

    for param in header_value.split(';') {
        let Some((name, value)) = param.trim().split_once('=') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();

        if name == "filename*" {
            let encoded = value
                .get(..7)
                .filter(|p| p.eq_ignore_ascii_case("utf-8''"))
                .map(|_| &value[7..]);
            if let Some(encoded) = encoded {
                let decoded = percent_decode(encoded);
                if !decoded.is_empty() {
                    return Some(decoded);
                }
            }
        } else if name == "filename" {
            let unquoted = match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
                Some(inner) => unescape_quoted(inner),
                None => value.to_string(),
            };
            if !unquoted.is_empty() {
                plain = Some(unquoted);
            }
        }
    }

    plain
}

/// Extension of the advertised filename (`report.final.pdf` → `pdf`).
pub fn disposition_extension(header_value: &str) -> Option<String> {
    let name = parse_content_disposition_filename(header_value)?;
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.contains(|c: char| c == '/' || c == '\\') {
        return None;
    }
    Some(ext.to_string())
}

/// Destination path with the advertised extension appended when `dest` does
/// not already end with it (case-insensitive).
pub(crate) fn with_disposition_extension(dest: &Path, content_disposition: Option<&str>) -> PathBuf {
    let Some(ext) = content_disposition.and_then(disposition_extension) else {
        return dest.to_path_buf();
    };
    let has_ext = dest
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(&ext));
    if has_ext {
        return dest.to_path_buf();
    }
    let mut s = dest.as_os_str().to_owned();
    s.push(".");
    s.push(&ext);
    PathBuf::from(s)
}

fn unescape_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if next == '"' || next == '\\' {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(h), Some(l)) = (hex_digit(bytes[i + 1]), hex_digit(bytes[i + 2])) {
                out.push(h << 4 | l);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
