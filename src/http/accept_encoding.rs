//! `Accept-Encoding` scanning: sets gzip/deflate flags from a
//! comma-separated token list, tolerant of the rest of the grammar
//! (quality values, unknown codings) since only these two encodings are
//! ever selected by the response path this core hands off to.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcceptEncoding {
    pub gzip: bool,
    pub deflate: bool,
}

pub(crate) fn parse(raw: &[u8]) -> AcceptEncoding {
    let mut result = AcceptEncoding::default();

    for token in raw.split(|&b| b == b',') {
        let token = trim_leading_space(token);
        if token.eq_ignore_ascii_case(b"gzip") || token.starts_with(b"gzip;") {
            result.gzip = true;
        } else if token.eq_ignore_ascii_case(b"deflate") || token.starts_with(b"deflate;") {
            result.deflate = true;
        }
    }

    result
}

fn trim_leading_space(mut s: &[u8]) -> &[u8] {
    while let [b' ', rest @ ..] = s {
        s = rest;
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_encodings() {
        assert_eq!(
            parse(b"gzip, deflate"),
            AcceptEncoding {
                gzip: true,
                deflate: true
            }
        );
    }

    #[test]
    fn single_with_quality() {
        assert_eq!(
            parse(b"deflate;q=0.5"),
            AcceptEncoding {
                gzip: false,
                deflate: true
            }
        );
    }

    #[test]
    fn unknown_encoding_sets_nothing() {
        assert_eq!(parse(b"br"), AcceptEncoding::default());
    }

    #[test]
    fn empty_is_default() {
        assert_eq!(parse(b""), AcceptEncoding::default());
    }
}
