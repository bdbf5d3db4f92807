//! Hand-rolled `Range` header parsing: `bytes=a-b`, `bytes=a-`,
//! `bytes=-N`. No crate in the dependency stack parses HTTP ranges, so
//! this is a from-scratch implementation.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64, // inclusive
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Parses a single-range `Range` header value against a known `file_size`.
/// Returns `Ok(None)` if there is no (or an unparseable-but-ignorable)
/// range — callers should treat that as "serve the whole file". Returns
/// `Err(())` for a range that is syntactically fine but unsatisfiable
/// against `file_size` (416).
pub fn parse_range(header_value: &str, file_size: u64) -> Result<Option<ByteRange>, ()> {
    let spec = match header_value.strip_prefix("bytes=") {
        Some(s) => s,
        None => return Ok(None),
    };

    // Multipart ranges (comma-separated) are not supported; treat as
    // treated as unsatisfiable (416) rather than served partially.
    if spec.contains(',') {
        return Err(());
    }

    let (start_str, end_str) = spec.split_once('-').ok_or(())?;

    if start_str.is_empty() {
        // Suffix range: bytes=-N, last N bytes.
        let suffix_len: u64 = end_str.parse().map_err(|_| ())?;
        if suffix_len == 0 {
            return Err(());
        }
        if file_size == 0 {
            return Err(());
        }
        let len = suffix_len.min(file_size);
        return Ok(Some(ByteRange {
            start: file_size - len,
            end: file_size - 1,
        }));
    }

    let start: u64 = start_str.parse().map_err(|_| ())?;
    if start >= file_size {
        return Err(());
    }

    let end = if end_str.is_empty() {
        file_size - 1
    } else {
        let parsed: u64 = end_str.parse().map_err(|_| ())?;
        parsed.min(file_size - 1)
    };

    if end < start {
        return Err(());
    }

    Ok(Some(ByteRange { start, end }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_range_header_means_whole_file() {
        assert_eq!(parse_range("", 100), Ok(None));
    }

    #[test]
    fn parses_closed_range() {
        assert_eq!(parse_range("bytes=10-19", 100), Ok(Some(ByteRange { start: 10, end: 19 })));
    }

    #[test]
    fn parses_open_ended_range() {
        assert_eq!(parse_range("bytes=90-", 100), Ok(Some(ByteRange { start: 90, end: 99 })));
    }

    #[test]
    fn parses_suffix_range() {
        assert_eq!(parse_range("bytes=-10", 100), Ok(Some(ByteRange { start: 90, end: 99 })));
    }

    #[test]
    fn suffix_range_longer_than_file_clamps_to_whole_file() {
        assert_eq!(parse_range("bytes=-1000", 100), Ok(Some(ByteRange { start: 0, end: 99 })));
    }

    #[test]
    fn end_clamps_to_file_size_minus_one() {
        assert_eq!(parse_range("bytes=0-999", 100), Ok(Some(ByteRange { start: 0, end: 99 })));
    }

    #[test]
    fn start_past_eof_is_unsatisfiable() {
        assert_eq!(parse_range("bytes=100-200", 100), Err(()));
    }

    #[test]
    fn end_before_start_is_unsatisfiable() {
        assert_eq!(parse_range("bytes=50-10", 100), Err(()));
    }

    #[test]
    fn multipart_ranges_are_rejected() {
        assert_eq!(parse_range("bytes=0-10,20-30", 100), Err(()));
    }

    #[test]
    fn range_on_zero_length_file_is_unsatisfiable() {
        assert_eq!(parse_range("bytes=0-0", 0), Err(()));
        assert_eq!(parse_range("bytes=-1", 0), Err(()));
    }

    #[test]
    fn byte_range_exactly_on_chunk_boundary_has_correct_length() {
        let r = parse_range("bytes=100-199", 1000).unwrap().unwrap();
        assert_eq!(r.len(), 100);
    }
}
