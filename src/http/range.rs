//! `Range: bytes=N-M | -M | N-` parsing, with the `-1` sentinel for any
//! malformed or out-of-range value rather than a hard parse error — a
//! malformed Range header is conventionally ignored, not a 400.

/// A parsed byte range. `-1` in either field is the "absent/invalid"
/// sentinel, matching the wire protocol's own convention rather than an
/// `Option`, so callers can compare directly against request-table values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub from: i64,
    pub to: i64,
}

const INVALID: ByteRange = ByteRange { from: -1, to: -1 };

/// Parses a `Range` header value (without the leading `bytes=` having been
/// stripped yet). Returns [`INVALID`] for anything that doesn't match one
/// of the three accepted forms, rather than failing the request.
pub(crate) fn parse(raw: &[u8]) -> ByteRange {
    let Some(range) = raw.strip_prefix(b"bytes=") else {
        return INVALID;
    };

    if let Some(dash) = memchr::memchr(b'-', range) {
        let (from_s, to_s) = (&range[..dash], &range[dash + 1..]);

        if from_s.is_empty() && !to_s.is_empty() {
            return match parse_u64(to_s) {
                Some(to) => ByteRange { from: 0, to },
                None => INVALID,
            };
        }
        if !from_s.is_empty() && to_s.is_empty() {
            return match parse_u64(from_s) {
                Some(from) => ByteRange { from, to: -1 },
                None => INVALID,
            };
        }
        if !from_s.is_empty() && !to_s.is_empty() {
            return match (parse_u64(from_s), parse_u64(to_s)) {
                (Some(from), Some(to)) => ByteRange { from, to },
                _ => INVALID,
            };
        }
    }

    INVALID
}

/// Parses a run of ASCII digits as `i64`, rejecting overflow past
/// `i64::MAX` the same way the original `off_t` ceiling does.
fn parse_u64(s: &[u8]) -> Option<i64> {
    if s.is_empty() || !s.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(s).ok()?.parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_range() {
        assert_eq!(parse(b"bytes=100-"), ByteRange { from: 100, to: -1 });
    }

    #[test]
    fn suffix_range() {
        assert_eq!(parse(b"bytes=-50"), ByteRange { from: 0, to: 50 });
    }

    #[test]
    fn full_range() {
        assert_eq!(parse(b"bytes=0-499"), ByteRange { from: 0, to: 499 });
    }

    #[test]
    fn garbage_is_invalid_sentinel() {
        assert_eq!(parse(b"bytes=abc"), INVALID);
        assert_eq!(parse(b"abc"), INVALID);
        assert_eq!(parse(b"bytes="), INVALID);
        assert_eq!(parse(b"bytes=-"), INVALID);
    }

    #[test]
    fn overflow_is_invalid_sentinel() {
        assert_eq!(parse(b"bytes=99999999999999999999-"), INVALID);
    }
}
