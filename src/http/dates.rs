//! `If-Modified-Since` date parsing. RFC 7231 permits three date formats on
//! the wire (RFC 1123, obsolete RFC 850, asctime); `httpdate` already
//! recognizes all three, so no hand-rolled date grammar is written here.

use std::time::SystemTime;

/// Parses an `If-Modified-Since` header value. A parse failure leaves the
/// field absent rather than failing the request — an unparseable date is
/// conventionally treated as "no conditional", matching `parse_range`'s
/// tolerance of malformed input over it instead of a hard 400.
pub(crate) fn parse(raw: &[u8]) -> Option<SystemTime> {
    let s = std::str::from_utf8(raw).ok()?;
    httpdate::parse_http_date(s).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc1123() {
        assert!(parse(b"Sun, 06 Nov 1994 08:49:37 GMT").is_some());
    }

    #[test]
    fn parses_obsolete_rfc850() {
        assert!(parse(b"Sunday, 06-Nov-94 08:49:37 GMT").is_some());
    }

    #[test]
    fn parses_asctime() {
        assert!(parse(b"Sun Nov  6 08:49:37 1994").is_some());
    }

    #[test]
    fn garbage_is_absent() {
        assert_eq!(parse(b"not a date"), None);
    }
}
