//! `Connection` header scanning. Widens a plain exact-match
//! `"keep-alive"` / `"close"` comparison into a comma-separated token scan
//! so `Connection: Upgrade` (sent alongside `Connection: keep-alive, Upgrade`
//! by some clients, or alone by most) is recognized instead of rejected as
//! an unrecognized connection value.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ConnectionTokens {
    pub(crate) keep_alive: Option<bool>,
    pub(crate) upgrade: bool,
}

pub(crate) fn parse(raw: &[u8]) -> ConnectionTokens {
    let mut result = ConnectionTokens::default();

    for token in raw.split(|&b| b == b',') {
        let token = trim_leading_space(token);
        if token.eq_ignore_ascii_case(b"keep-alive") {
            result.keep_alive = Some(true);
        } else if token.eq_ignore_ascii_case(b"close") {
            result.keep_alive = Some(false);
        } else if token.eq_ignore_ascii_case(b"upgrade") {
            result.upgrade = true;
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
