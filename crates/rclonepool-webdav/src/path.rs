//! Request-path decoding: strips a scheme+host prefix (as sent in some
//! `Destination` headers) and percent-decodes the remainder. No URL crate
//! is in the dependency stack for this — it's a small, fixed decoding
//! rule, same "hand-rolled, no crate needed" call as `range.rs`/`xml.rs`.

/// Strips `scheme://host` from a URI-or-path string, leaving the path
/// (with leading `/`). Used for the `Destination` header, which clients
/// may send as an absolute URL or a bare path.
pub fn strip_origin(raw: &str) -> &str {
    match raw.find("://") {
        Some(idx) => {
            let rest = &raw[idx + 3..];
            match rest.find('/') {
                Some(slash) => &rest[slash..],
                None => "/",
            }
        }
        None => raw,
    }
}

/// Percent-decodes a path segment. Invalid escapes are passed through
/// byte-for-byte rather than rejected.
pub fn percent_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Normalizes a decoded request path into the virtual file-path form used
/// throughout the pool: a single leading `/`, no trailing `/` (except for
/// the root itself), no repeated slashes.
pub fn normalize(path: &str) -> String {
    let decoded = percent_decode(path);
    let mut segments: Vec<&str> = decoded.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return "/".to_string();
    }
    let last = segments.pop().unwrap();
    let mut out = String::from("/");
    for s in segments {
        out.push_str(s);
        out.push('/');
    }
    out.push_str(last);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_origin_removes_scheme_and_host() {
        assert_eq!(strip_origin("http://example.com/dir/a.bin"), "/dir/a.bin");
        assert_eq!(strip_origin("/dir/a.bin"), "/dir/a.bin");
        assert_eq!(strip_origin("https://host"), "/");
    }

    #[test]
    fn percent_decode_handles_spaces_and_unicode_bytes() {
        assert_eq!(percent_decode("a%20b"), "a b");
        assert_eq!(percent_decode("a%2Fb"), "a/b");
        assert_eq!(percent_decode("noescapes"), "noescapes");
    }

    #[test]
    fn normalize_collapses_slashes_and_keeps_leading_slash() {
        assert_eq!(normalize("/a//b/"), "/a/b");
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("a/b"), "/a/b");
    }
}
