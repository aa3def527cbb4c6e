//! Cookie and urlencoded-form decoding, built on the same split mechanics as
//! [`crate::query::Query`] but widened with real `%HH`/`+` decoding: cookies
//! decode identically (cookie values are rarely percent-encoded but some
//! clients do encode them), form bodies always decode.
//!
//! [`crate::query::Query`] only splits — it borrows and never needs exclusive
//! access to what it borrows. This module keeps the same zero-copy *storage*
//! (slices still point into the connection's own buffer, nothing is copied
//! out) but decodes in place, exactly the way the request-line URL is
//! decoded in place before being frozen into a `&'static [u8]`.

use crate::bytes::url_decode;
use memchr::memchr;

/// Splits `raw` on `sep`, then each item on `=`, url-decoding key and value
/// in place. A key or value that fails to decode truncates the result
/// rather than failing outright — the items parsed before it are kept.
/// The returned pairs are sorted ascending by key (stably, so pairs sharing
/// a key keep their relative split order).
///
/// # Safety
/// `raw` must be the only live reference to these bytes: this function
/// temporarily widens shared access into exclusive access, the same trick
/// [`crate::http::request::Parser::get_slice_static`] already relies on to
/// hand out `'static` slices over a buffer it alone owns.
pub(crate) unsafe fn parse_pairs(
    raw: &'static [u8],
    sep: u8,
    decode: bool,
) -> Vec<(&'static [u8], &'static [u8])> {
    let mut_raw: &'static mut [u8] =
        unsafe { std::slice::from_raw_parts_mut(raw.as_ptr() as *mut u8, raw.len()) };

    let mut result = Vec::new();
    let mut start = 0;

    while start < mut_raw.len() {
        let end = memchr(sep, &mut_raw[start..])
            .map(|pos| start + pos)
            .unwrap_or(mut_raw.len());

        let eq = memchr(b'=', &mut_raw[start..end]).map(|pos| start + pos);
        let (key_range, value_range) = match eq {
            Some(eq) => (start..eq, eq + 1..end),
            None => (start..end, end..end),
        };

        let (Some(key), Some(value)) = (
            decode_segment(mut_raw, key_range, decode),
            decode_segment(mut_raw, value_range, decode),
        ) else {
            break;
        };

        result.push((key, value));
        start = end + 1;
    }

    result.sort_by(|a, b| a.0.cmp(b.0));
    result
}

/// Decodes (if `decode`) the bytes at `range` within `buf` in place and
/// returns a `'static` view of the (possibly shortened) result. Leading
/// spaces are trimmed first, matching how `Cookie: a=1; b=2` and
/// `Connection:`/`Accept-Encoding:` token lists are all conventionally
/// whitespace-tolerant after a separator.
fn decode_segment(
    buf: &mut [u8],
    mut range: std::ops::Range<usize>,
    decode: bool,
) -> Option<&'static [u8]> {
    while range.start < range.end && buf[range.start] == b' ' {
        range.start += 1;
    }

    if !decode {
        let slice = &buf[range];
        return Some(unsafe { std::slice::from_raw_parts(slice.as_ptr(), slice.len()) });
    }

    let segment = &mut buf[range];
    let ptr = segment.as_mut_ptr();
    let new_len = url_decode(segment).ok()?;
    Some(unsafe { std::slice::from_raw_parts(ptr, new_len) })
}
