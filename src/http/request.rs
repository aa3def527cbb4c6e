use crate::{
    bytes::url_decode_static,
    errors::*,
    http::{
        accept_encoding::{self, AcceptEncoding},
        connection_header, dates, form,
        range::{self, ByteRange},
        types::{self, Header, HeaderMap},
    },
    limits::ReqLimits,
    query::{decode_query_parts, Query},
    server::connection::HttpConnection,
    ConnectionData, Handler, Method, Url, Version,
};
use memchr::{memchr, memchr_iter};
use std::{
    io, mem,
    net::{Ipv4Addr, SocketAddr},
    time::{Duration, SystemTime},
};
use tokio::{io::AsyncReadExt, net::TcpStream, time::sleep};

/// Lazily decoded request field: parsed at most once, on first access.
///
/// Fields like `Range` or `Accept-Encoding` are read by a minority of
/// handlers, so this avoids paying for the decode on every request
/// regardless of whether the handler looks at it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LazyField<T> {
    Unparsed,
    Parsed(T),
    ParsedEmpty,
}

impl<T> LazyField<T> {
    /// `parse` returns `None` both when the header is absent and when its
    /// value fails to parse — both cases degrade to "field absent" rather
    /// than an error, matching `range`/`dates`'s own sentinel-over-error
    /// conventions.
    #[inline]
    fn get_or_parse(
        &mut self,
        raw: Option<&'static [u8]>,
        parse: impl FnOnce(&'static [u8]) -> Option<T>,
    ) -> Option<&T> {
        if matches!(self, LazyField::Unparsed) {
            *self = match raw.and_then(parse) {
                Some(v) => LazyField::Parsed(v),
                None => LazyField::ParsedEmpty,
            };
        }

        match self {
            LazyField::Parsed(v) => Some(v),
            LazyField::ParsedEmpty | LazyField::Unparsed => None,
        }
    }
}

/// High-performance HTTP request representation.
///
/// Uses strategic memory alignment for optimal cache performance.
/// All data is zero-copy referenced from the original input.
#[derive(Debug, Clone, PartialEq)]
#[repr(align(128))]
pub struct Request {
    method: Method,
    url: Url,
    version: Version,
    headers: HeaderMap,
    body: Option<&'static [u8]>,

    pub(crate) client_addr: SocketAddr,
    pub(crate) server_addr: SocketAddr,

    /// The URL as first received, before any handler-triggered rewrite.
    original_url: Url,
    /// Number of internal rewrites applied to this request so far (§9 caps at 4).
    pub(crate) urls_rewritten: u8,

    range: LazyField<ByteRange>,
    if_modified_since: LazyField<SystemTime>,
    accept_encoding: LazyField<AcceptEncoding>,
    connection_tokens: LazyField<connection_header::ConnectionTokens>,
    cookies: LazyField<Vec<(&'static [u8], &'static [u8])>>,
    form: LazyField<Vec<(&'static [u8], &'static [u8])>>,
}

const UNSPECIFIED: SocketAddr = SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0);

impl Request {
    #[inline(always)]
    pub(crate) fn new(limits: &ReqLimits) -> Self {
        Request {
            method: Method::Get,
            url: Url::new(limits),
            version: Version::Http11,
            headers: HeaderMap::new(limits.header_count),
            body: None,

            client_addr: UNSPECIFIED,
            server_addr: UNSPECIFIED,

            original_url: Url::new(limits),
            urls_rewritten: 0,

            range: LazyField::Unparsed,
            if_modified_since: LazyField::Unparsed,
            accept_encoding: LazyField::Unparsed,
            connection_tokens: LazyField::Unparsed,
            cookies: LazyField::Unparsed,
            form: LazyField::Unparsed,
        }
    }

    #[inline(always)]
    pub(crate) fn reset(&mut self) {
        self.method = Method::Get;
        self.url.clear();
        self.version = Version::Http11;
        self.headers.reset();
        self.body = None;

        self.original_url.clear();
        self.urls_rewritten = 0;

        self.range = LazyField::Unparsed;
        self.if_modified_since = LazyField::Unparsed;
        self.accept_encoding = LazyField::Unparsed;
        self.connection_tokens = LazyField::Unparsed;
        self.cookies = LazyField::Unparsed;
        self.form = LazyField::Unparsed;
    }

    /// Snapshots the just-parsed URL as `original_url`, called once per
    /// request before any rewrite can occur.
    #[inline]
    pub(crate) fn snapshot_original_url(&mut self) {
        self.original_url = self.url.clone();
    }
}

// Public API
impl Request {
    #[inline(always)]
    pub const fn method(&self) -> Method {
        self.method
    }

    #[inline(always)]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Re-derives `url` from a handler-signaled rewrite target. Callers
    /// must snapshot `original_url` first if this is the request's first
    /// rewrite.
    #[inline]
    pub(crate) fn rewrite_url(&mut self, raw: &'static [u8]) -> Result<(), ErrorKind> {
        self.url.rewrite(raw)
    }

    #[inline(always)]
    pub const fn version(&self) -> Version {
        self.version
    }

    /// Returns the first header value with case-insensitive name matching
    /// (per [RFC 7230](https://tools.ietf.org/html/rfc7230#section-3.2)).
    /// Uses linear search.
    ///
    /// # Arguments
    /// - `name`: Header name bytes (e.g., `b"content-type"`)
    #[inline(always)]
    pub fn header(&self, name: &[u8]) -> Option<&[u8]> {
        self.headers.get(name)
    }

    /// Returns the value of the `Content-Length` header if present.
    #[inline(always)]
    pub const fn content_length(&self) -> Option<usize> {
        self.headers.content_length
    }

    /// Returns the request body if present.
    #[inline(always)]
    pub const fn body(&self) -> Option<&[u8]> {
        self.body
    }

    /// The address of the peer that sent this request, after PROXY protocol
    /// unwrapping if the preface was trusted and present.
    #[inline(always)]
    pub const fn client_addr(&self) -> SocketAddr {
        self.client_addr
    }

    /// The address of the socket this request was accepted on.
    #[inline(always)]
    pub const fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    /// The URL as originally received, unaffected by any internal rewrite.
    #[inline(always)]
    pub const fn original_url(&self) -> &Url {
        &self.original_url
    }

    /// Parses and caches the `Range` header, if present.
    #[inline]
    pub fn range(&mut self) -> Option<&ByteRange> {
        let raw = self.headers.get_static(b"range");
        self.range.get_or_parse(raw, |raw| Some(range::parse(raw)))
    }

    /// Parses and caches the `If-Modified-Since` header, if present and valid.
    #[inline]
    pub fn if_modified_since(&mut self) -> Option<&SystemTime> {
        let raw = self.headers.get_static(b"if-modified-since");
        self.if_modified_since.get_or_parse(raw, dates::parse)
    }

    /// Parses and caches the `Accept-Encoding` header, if present.
    #[inline]
    pub fn accept_encoding(&mut self) -> AcceptEncoding {
        let raw = self.headers.get_static(b"accept-encoding");
        *self
            .accept_encoding
            .get_or_parse(raw, |raw| Some(accept_encoding::parse(raw)))
            .unwrap_or(&AcceptEncoding {
                gzip: false,
                deflate: false,
            })
    }

    #[inline]
    pub(crate) fn connection_tokens(&mut self) -> connection_header::ConnectionTokens {
        let raw = self.headers.get_static(b"connection");
        *self
            .connection_tokens
            .get_or_parse(raw, |raw| Some(connection_header::parse(raw)))
            .unwrap_or(&connection_header::ConnectionTokens::default())
    }

    /// Parses and caches the `Cookie` header as `name=value` pairs split on
    /// `;`. Values are taken as-is: cookie values are rarely percent-encoded
    /// and RFC 6265 doesn't require a client to decode them.
    #[inline]
    pub fn cookies(&mut self) -> &[(&'static [u8], &'static [u8])] {
        let raw = self.headers.get_static(b"cookie");
        self.cookies
            .get_or_parse(raw, |raw| {
                // SAFETY: `raw` is the only live reference to this header's
                // bytes; `parse_pairs` needs this to widen them to a mutable
                // slice for in-place decoding.
                Some(unsafe { form::parse_pairs(raw, b';', false) })
            })
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Parses and caches the body as `application/x-www-form-urlencoded`
    /// `name=value` pairs, url-decoding both. Empty when there's no body or
    /// `Content-Type` doesn't match.
    #[inline]
    pub fn form(&mut self) -> &[(&'static [u8], &'static [u8])] {
        let is_form = self
            .headers
            .get(b"content-type")
            .map(|ct| ct.eq_ignore_ascii_case(b"application/x-www-form-urlencoded"))
            .unwrap_or(false);
        let raw = if is_form { self.body } else { None };

        self.form
            .get_or_parse(raw, |raw| {
                // SAFETY: see `cookies` above; the body slice is likewise
                // owned solely by this request for its lifetime.
                Some(unsafe { form::parse_pairs(raw, b'&', true) })
            })
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

// If you don't like using HttpConnection instead of transmitting all the
// values, then you can't even imagine what happened here...
// It's a pity now that you can understand this code (when passing all the
//  values, I didn't understand it myself):(
impl<H: Handler<S>, S: ConnectionData> HttpConnection<H, S> {
    #[inline]
    pub(crate) fn parse(&mut self) -> Result<Version, ErrorKind> {
        self.parse_method()?;
        self.parse_url()?;
        if self.check_http09()? {
            return Ok(self.request.version);
        }
        self.check_version()?;

        self.parse_headers()?;
        self.check_body()?;

        Ok(self.request.version)
    }
}

// Parse first line
impl<H: Handler<S>, S: ConnectionData> HttpConnection<H, S> {
    // Basic methods
    #[inline]
    fn parse_method(&mut self) -> Result<(), ErrorKind> {
        // "OPTIONS " - The longest possible method with a space (8 bytes)
        let slice = self
            .parser
            .get_slice(0, 8)
            .ok_or(ErrorKind::InvalidMethod)?;

        (self.request.method, self.parser.position) = Method::from_bytes(slice)?;
        Ok(())
    }

    #[inline]
    // Cannot replace with `get_slice` or `find_slice` method
    // due to ownership error. And there is no need to use `into_static`
    fn parse_url(&mut self) -> Result<(), ErrorKind> {
        let [start, posit] = match self
            .parser
            .find_char(self.req_limits.precalc.url_size_memchr, b' ')
        {
            Some(pos) => [self.parser.position + 1, pos],
            None if self.is_http_09() => self.get_range_url_http_09()?,
            None => return Err(ErrorKind::InvalidUrl),
        };

        let parser = &mut self.parser;
        let url = &mut self.request.url;

        let mut last = 0;
        let start_pos = start + posit;
        let slice_url = &parser.buffer[start..start_pos];

        if slice_url.is_empty() || parser.buffer[start - 1] != b'/' {
            return Err(ErrorKind::InvalidUrl);
        }

        for index in memchr_iter(b'/', slice_url) {
            if url.parts.len() == self.req_limits.url_parts {
                return Err(ErrorKind::InvalidUrl);
            }

            let slice_part = parser
                .get_slice_static(start + last, index - last)
                .ok_or(ErrorKind::InvalidUrl)?;

            if !slice_part.is_empty() {
                let decoded =
                    unsafe { url_decode_static(slice_part) }.map_err(|_| ErrorKind::UrlDecode)?;
                url.parts.push(decoded);
            }
            last = index + 1;
        }

        let range = [start + last, (posit - last).saturating_sub(1)];
        let (end, url_middle) = match parser.find_char(posit, b'?') {
            Some(q_pos) => {
                let slice = parser
                    .get_slice_static(q_pos, (range[0] + range[1]).saturating_sub(q_pos))
                    .ok_or(ErrorKind::InvalidUrl)?;
                let limit = url.query_parts.capacity();

                Query::parse_into(&mut url.query_parts, slice, limit)?;
                unsafe { decode_query_parts(&mut url.query_parts) }
                    .map_err(|_| ErrorKind::UrlDecode)?;
                url.query = Some(slice);

                (q_pos, q_pos)
            }
            None => (posit, posit),
        };

        let slice = parser
            .get_slice_static(range[0], (parser.position + end).saturating_sub(range[0]))
            .ok_or(ErrorKind::InvalidUrl)?;

        if !slice.is_empty() {
            let decoded = unsafe { url_decode_static(slice) }.map_err(|_| ErrorKind::UrlDecode)?;
            url.parts.push(decoded);
        }

        let path_raw = parser
            .get_slice_static(parser.position, url_middle)
            .ok_or(ErrorKind::InvalidUrl)?;
        url.path = unsafe { url_decode_static(path_raw) }.map_err(|_| ErrorKind::UrlDecode)?;
        url.target = parser
            .get_slice_static(parser.position, posit)
            .ok_or(ErrorKind::InvalidUrl)?;

        parser.update_position(posit);

        Ok(())
    }

    #[inline]
    fn check_version(&mut self) -> Result<(), ErrorKind> {
        // "HTTP/1.X\r\n" - HTTP version with line break (10 bytes)
        let slice = self
            .parser
            .find_slice(10, b'\n')
            .ok_or(ErrorKind::InvalidVersion)?;

        if !matches!(slice.len(), 8 | 9) {
            return Err(ErrorKind::InvalidVersion);
        }

        (self.response.version, self.response.keep_alive) = Version::from_bytes(&slice[..8])?;
        self.request.version = self.response.version;

        // Check for the use of the '\r' character
        self.parser.has_crlf = slice.last() == Some(&b'\r');

        Ok(())
    }

    // Auxiliary methods
    #[inline(always)]
    fn is_http_09(&self) -> bool {
        self.http_09_limits.is_some()
            && self.parser.len < self.req_limits.precalc.len_http09
            && self.request.method == Method::Get
            && self.parser.buffer[..self.parser.len].ends_with(b"\r\n")
    }

    #[inline]
    fn get_range_url_http_09(&mut self) -> Result<[usize; 2], ErrorKind> {
        let parser = &mut self.parser;

        let end_url = parser.len - 2;
        if parser.position >= end_url {
            return Err(ErrorKind::InvalidUrl);
        }
        let slice = parser
            .get_slice(parser.position, 12)
            .ok_or(ErrorKind::InvalidUrl)?;

        if slice.starts_with(b"/keep_alive") {
            self.response.keep_alive = true;
            parser.position += 11;
        } else {
            self.response.keep_alive = false;
        };

        self.request.version = Version::Http09;
        self.response.version = Version::Http09;

        Ok([parser.position + 1, end_url - parser.position])
    }

    #[inline]
    fn check_http09(&mut self) -> Result<bool, ErrorKind> {
        if self.request.version == Version::Http09 {
            if self.http_09_limits.is_none() {
                return Err(ErrorKind::UnsupportedVersion);
            }

            let p = &self.parser;
            match &p.buffer[p.position..p.len].ends_with(b"\n") {
                true => Ok(true),
                false => Err(ErrorKind::InvalidVersion),
            }
        } else {
            Ok(false)
        }
    }
}

// Parse headers
impl<H: Handler<S>, S: ConnectionData> HttpConnection<H, S> {
    // Basic methods
    #[inline]
    fn parse_headers(&mut self) -> Result<(), ErrorKind> {
        for _ in 0..=self.req_limits.header_count {
            let Some(header) = self.parse_header()? else {
                return Ok(());
            };

            if !self.parse_special_header(&header)? {
                self.request.headers.headers.push(header);
            }
        }

        Err(ErrorKind::TooManyHeaders)
    }

    #[inline]
    fn parse_header(&mut self) -> Result<Option<Header>, ErrorKind> {
        let parser = &mut self.parser;
        // HeaderName: Someone=data\r\n
        //                            |
        let end = parser
            .find_char(self.req_limits.precalc.h_line, b'\n')
            .ok_or(ErrorKind::InvalidHeader)?;

        match parser.get_slice(parser.position + end - 1, 2) {
            Some([b'\r', b'\n']) if parser.has_crlf => {}
            Some([_, b'\n']) if !parser.has_crlf => {}
            _ => return Err(ErrorKind::InvalidHeader),
        }

        // HeaderName: Someone=data\r\n
        //           |
        let Some(split) = parser.find_char(end, b':') else {
            self.check_end_of_headers(end)?;
            return Ok(None);
        };

        if parser.get_slice(parser.position + split, 2) != Some(b": ") {
            return Err(ErrorKind::InvalidHeader);
        }

        let value_start = split + 2;
        let len_value = end - value_start - parser.has_crlf as usize;

        if split > self.req_limits.header_name_size || len_value > self.req_limits.header_value_size
        {
            return Err(ErrorKind::InvalidHeader);
        }

        let name = {
            let name = parser
                .get_slice_mut(parser.position, split)
                .ok_or(ErrorKind::InvalidHeader)?;

            if name.is_empty() {
                return Err(ErrorKind::InvalidHeader);
            }

            types::to_lower_case(name);
            unsafe { Parser::into_static(name) }
        };

        let value = parser
            .get_slice_static(parser.position + value_start, len_value)
            .ok_or(ErrorKind::InvalidHeader)?;

        parser.update_position(end);

        Ok(Some(Header::new(name, value)))
    }

    #[inline]
    fn parse_special_header(&mut self, header: &Header) -> Result<bool, ErrorKind> {
        match header.name {
            b"content-length" => self.parse_content_length(header.value),
            b"connection" => self.parse_connection(header.value),
            _ => return Ok(false),
        }
        .map(|_| true)
    }

    // Auxiliary methods
    #[inline]
    fn check_end_of_headers(&mut self, start: usize) -> Result<(), ErrorKind> {
        let parser = &mut self.parser;
        // [\r, \n, \r, \n] or [x, x, \n, \n]
        let p_end = parser
            .get_slice(parser.position + start - 3, 4)
            .ok_or(ErrorKind::InvalidHeader)?;

        if !match parser.has_crlf {
            true => p_end.ends_with(b"\r\n\r\n"),
            false => p_end.ends_with(b"\n\n"),
        } {
            return Err(ErrorKind::InvalidHeader);
        }

        parser.position += parser.has_crlf as usize + 1;

        Ok(())
    }

    #[inline]
    fn parse_content_length(&mut self, value: &[u8]) -> Result<(), ErrorKind> {
        let len = types::slice_to_usize(value).ok_or(ErrorKind::InvalidContentLength)?;
        if len > self.req_limits.body_size {
            return Err(ErrorKind::BodyTooLarge);
        }
        self.request.headers.content_length = Some(len);
        Ok(())
    }

    #[inline]
    fn parse_connection(&mut self, value: &[u8]) -> Result<(), ErrorKind> {
        let mut normalized = [0; 10];
        let len = types::into_lower_case(value, &mut normalized);

        match &normalized[..len] {
            b"keep-alive" => self.response.keep_alive = true,
            b"close" => self.response.keep_alive = false,
            _ => return Err(ErrorKind::InvalidConnection),
        }

        Ok(())
    }
}

// Parse body
impl<H: Handler<S>, S: ConnectionData> HttpConnection<H, S> {
    /// Handles the common case where the whole body already arrived in the
    /// same read as the headers, zero-copy. When `Content-Length` names more
    /// bytes than are currently buffered, leaves `request.body` unset for
    /// [`Self::ingest_body`] to fill in after draining the rest of the
    /// socket.
    #[inline]
    fn check_body(&mut self) -> Result<(), ErrorKind> {
        let parser = &self.parser;
        let body = parser.len - parser.position;

        match self.request.headers.content_length {
            Some(len) if len == body => {
                let slice = parser.get_slice_static(parser.position, len).ok_or(
                    ErrorKind::BodyMismatch {
                        expected: len,
                        available: body,
                    },
                )?;

                self.request.body = Some(slice);
                Ok(())
            }
            Some(len) if len > body => Ok(()),
            Some(len) => Err(ErrorKind::BodyMismatch {
                expected: len,
                available: body,
            }),
            None => match body == 0 {
                true => Ok(()),
                false => Err(ErrorKind::UnexpectedBody(body)),
            },
        }
    }

    /// Drains the remainder of a `Content-Length` body from the socket when
    /// `check_body` couldn't satisfy it from the already-buffered bytes
    /// alone. A no-op when the body was already fully inline.
    #[inline]
    pub(crate) async fn ingest_body(&mut self, stream: &mut TcpStream) -> Result<(), ErrorKind> {
        if self.request.body.is_some() {
            return Ok(());
        }

        let Some(len) = self.request.headers.content_length else {
            return Ok(());
        };

        let available = self.parser.len - self.parser.position;
        let inline = self
            .parser
            .get_slice_static(self.parser.position, available)
            .unwrap_or(&[]);

        let store = crate::body::ingest(stream, inline, len, &self.body_limits).await?;
        let slice = store.as_slice();
        // SAFETY: `store` is moved into `self.body_store`, which outlives
        // every use of `self.request.body` until the next `reset`.
        let slice: &'static [u8] = unsafe { std::slice::from_raw_parts(slice.as_ptr(), slice.len()) };

        self.request.body = Some(slice);
        self.body_store = Some(store);

        Ok(())
    }

    /// Sniffs the freshly-filled buffer for a PROXY protocol preface before
    /// any request-line tokenization begins. Only meaningful on the first
    /// request of a connection — a preface never reappears on a pipelined
    /// second request, so callers must only invoke this once per connection.
    ///
    /// On a recognized preface, advances `self.parser` past the consumed
    /// bytes and overwrites `request.client_addr`/`server_addr` with the
    /// addresses it carried. Returns `Ok(())` unchanged when the buffer
    /// isn't proxied at all.
    #[inline]
    pub(crate) fn sniff_proxy_preface(&mut self) -> Result<(), ErrorKind> {
        let buf = self
            .parser
            .get_slice(0, self.parser.len)
            .unwrap_or(&[]);

        match crate::proxy::sniff_and_decode(buf) {
            Ok(Some((descriptor, consumed))) => {
                self.parser.position = consumed;
                if let Some(addr) = descriptor.from.to_socket_addr() {
                    self.request.client_addr = addr;
                }
                if let Some(addr) = descriptor.to.to_socket_addr() {
                    self.request.server_addr = addr;
                }
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(_) => Err(ErrorKind::InvalidProxyPreface),
        }
    }
}

//

#[derive(Debug, Clone, PartialEq)]
#[repr(align(64))]
pub(crate) struct Parser {
    position: usize,
    len: usize,
    has_crlf: bool,
    buffer: Box<[u8]>,
}

impl Parser {
    #[inline(always)]
    pub(crate) fn new(limits: &ReqLimits) -> Self {
        let buffer = vec![0; limits.precalc.buffer].into_boxed_slice();

        Parser {
            position: 0,
            len: 0,
            has_crlf: false,
            buffer,
        }
    }

    #[cfg(test)]
    pub(crate) fn from<V: AsRef<[u8]>>(limits: &ReqLimits, value: V) -> Self {
        let mut buffer = vec![0; limits.precalc.buffer];

        let value = value.as_ref();
        buffer[0..value.len()].copy_from_slice(value);

        Parser {
            position: 0,
            len: value.len(),
            has_crlf: false,
            buffer: buffer.into_boxed_slice(),
        }
    }

    #[inline]
    pub(crate) fn reset(&mut self) {
        self.position = 0;
        self.len = 0;
        self.has_crlf = false;
        self.buffer.fill(0);
    }

    /// Moves any bytes left over past the just-finished request (a second,
    /// pipelined request that arrived in the same read) to the front of the
    /// buffer, returning how many bytes were carried.
    #[inline]
    pub(crate) fn carry_tail(&mut self) -> usize {
        let tail = self.len - self.position;
        if tail > 0 {
            self.buffer.copy_within(self.position..self.len, 0);
        }
        tail
    }

    /// Like [`Self::reset`], but keeps the first `tail` bytes already moved
    /// to the front by [`Self::carry_tail`] instead of zeroing them.
    #[inline]
    pub(crate) fn reset_keep_tail(&mut self, tail: usize) {
        self.position = 0;
        self.len = tail;
        self.has_crlf = false;
        self.buffer[tail..].fill(0);
    }
}

// Work with Buffer
impl Parser {
    // Reading level
    /// Reads more bytes in past whatever is already buffered (any carried
    /// pipelined tail) rather than overwriting from the start, so a second
    /// request already partially read alongside the first is never lost.
    #[inline]
    pub(crate) async fn fill_buffer(
        &mut self,
        stream: &mut TcpStream,
        time: Duration,
    ) -> Result<usize, io::Error> {
        tokio::select! {
            biased;

            read_result = stream.read(&mut self.buffer[self.len..]) => {
                let n = read_result?;
                self.len += n;
                Ok(n)
            }
            _ = sleep(time) => {
                Err(io::Error::new(io::ErrorKind::TimedOut, "read timeout"))
            },
        }
    }

    // Search level
    #[inline]
    fn find_slice(&mut self, limit: usize, delimiter: u8) -> Option<&[u8]> {
        let step = self.find_char(limit, delimiter)?;
        let last_index = self.update_position(step);
        let slice = self.get_slice(last_index, step)?;
        Some(slice)
    }

    #[inline]
    fn find_char(&self, step: usize, delimiter: u8) -> Option<usize> {
        let slice = self.get_slice(self.position, step)?;
        memchr(delimiter, slice)
    }

    // Low level
    #[inline(always)]
    fn get_slice(&self, start: usize, step: usize) -> Option<&[u8]> {
        self.buffer.get(start..start + step)
    }

    #[inline(always)]
    fn get_slice_mut(&mut self, start: usize, step: usize) -> Option<&mut [u8]> {
        self.buffer.get_mut(start..start + step)
    }

    #[inline(always)]
    fn update_position(&mut self, step: usize) -> usize {
        let old = self.position;
        self.position += step + 1;
        old
    }

    // Unsafe level
    #[inline(always)]
    fn get_slice_static(&self, start: usize, step: usize) -> Option<&'static [u8]> {
        let value = self.get_slice(start, step)?;
        unsafe { Some(Self::into_static(value)) }
    }

    #[inline(always)]
    // SAFETY: into_static creates "temporary" references for tokio integration,
    // which become invalid after Request cleanup.
    // Parser: 'static (lives for entire program lifetime), buffer cleared via .fill(0).
    // Memory remains valid even if user holds references.
    // DO NOT SUGGEST FIXES without full server architecture context.
    const unsafe fn into_static(src: &[u8]) -> &'static [u8] {
        // Second `unsafe` for integration with the 2024 edition
        unsafe { mem::transmute(src) }
    }
}


#[cfg(test)]
mod parser {
    use super::*;
    use crate::tools::*;

    #[test]
    fn reset() {
        let limits = ReqLimits::default().precalculate();
        let mut parser = Parser::new(&limits);

        parser.position = 5;
        parser.len = 10;
        parser.has_crlf = true;
        parser.buffer[0] = b'X';

        parser.reset();

        assert_eq!(Parser::new(&limits), parser);
    }

    // Search level
    #[test]
    fn find_slice() {
        let limits = ReqLimits::default().precalculate();
        let mut parser = Parser::from(&limits, b"GET / HTTP/1.1");

        let slice = parser.find_slice(10, b' ').unwrap();
        assert_eq!(slice, b"GET");
        assert_eq!(parser.position, 4);

        let slice = parser.find_slice(10, b' ').unwrap();
        assert_eq!(slice, b"/");

        assert_eq!(parser.find_slice(limits.precalc.buffer + 1, b' '), None);
        assert_eq!(parser.find_slice(0, b' '), None);
    }

    #[test]
    fn find_char() {
        let limits = ReqLimits::default().precalculate();
        let parser = Parser::from(&limits, b"hello world\nnext line");

        assert_eq!(parser.find_char(20, b' '), Some(5));
        assert_eq!(parser.find_char(20, b'\n'), Some(11));
        assert_eq!(parser.find_char(5, b'x'), None);
        assert_eq!(parser.find_char(3, b'o'), None);
    }

    // Low level
    #[test]
    fn get_slice() {
        let limits = ReqLimits::default().precalculate();
        let parser = Parser::from(&limits, b"test data here");

        assert_eq!(str(parser.get_slice(0, 4)), Some("test"));
        assert_eq!(str(parser.get_slice(5, 4)), Some("data"));
        assert_eq!(str(parser.get_slice(20, 5)), Some("\0\0\0\0\0"));
        assert_eq!(parser.get_slice(limits.precalc.buffer + 1, 10), None);
    }

    #[test]
    fn get_slice_mut() {
        let limits = ReqLimits::default().precalculate();
        let mut parser = Parser::from(&limits, b"original");

        {
            let slice = parser.get_slice_mut(0, 8).unwrap();
            slice.copy_from_slice(b"modified");
        }

        assert_eq!(parser.get_slice(0, 8), Some(b"modified".as_ref()));
    }

    #[test]
    fn get_slice_static() {
        let limits = ReqLimits::default().precalculate();
        let parser = Parser::from(&limits, b"static data");

        assert_eq!(str(parser.get_slice_static(0, 6)), Some("static"));
        assert_eq!(str(parser.get_slice_static(7, 4)), Some("data"));
        assert_eq!(str(parser.get_slice_static(20, 5)), Some("\0\0\0\0\0"));
        assert_eq!(parser.get_slice_static(limits.precalc.buffer + 1, 10), None);
    }

    #[test]
    fn update_position() {
        let limits = ReqLimits::default().precalculate();
        let mut parser = Parser::from(&limits, b"some data");

        let old_pos = parser.update_position(4);
        assert_eq!(old_pos, 0);
        assert_eq!(parser.position, 5);

        let old_pos = parser.update_position(3);
        assert_eq!(old_pos, 5);
        assert_eq!(parser.position, 9);
    }

    // Unsafe level
    #[test]
    fn into_static() {
        let vec = vec![1, 2, 3];
        let mut vec_mut = vec.clone();

        let vec_static = unsafe { Parser::into_static(&vec_mut) };
        assert_eq!(vec_mut, vec_static);

        vec_mut[0] = 2;
        assert_eq!(vec_mut, vec_static);
    }

    // Other
    #[test]
    fn sequence_operations() {
        let limits = ReqLimits::default().precalculate();
        let mut parser = Parser::from(&limits, b"GET /api/users HTTP/1.1");

        let method = parser.find_slice(10, b' ').unwrap();
        assert_eq!(method, b"GET");

        let path = parser.find_slice(15, b' ').unwrap();
        assert_eq!(path, b"/api/users");

        let version = parser.get_slice_static(parser.position, 8).unwrap();
        assert_eq!(version, b"HTTP/1.1");
    }
}
