//! PROXY protocol v1 (text) and v2 (binary) preface decoding.
//!
//! Both variants are sniffed and decoded over an already-filled request
//! buffer — by the time this runs, the socket reader (`server::connection`)
//! has already read at least the first line into the buffer, so this is a
//! pure, synchronous byte-slice parser rather than its own I/O loop.

use crate::bytes::parse_ascii_port;
use memchr::memchr;
use std::error;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// One endpoint of a PROXY protocol header: the real peer address as seen
/// by the proxy, before it was rewritten by the TCP connection to us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyAddr {
    Unspec,
    V4(Ipv4Addr, u16),
    V6(Ipv6Addr, u16),
}

impl ProxyAddr {
    /// `PROXY UNKNOWN`/the v2 LOCAL command carry no address; everything
    /// else converts directly.
    pub(crate) fn to_socket_addr(self) -> Option<SocketAddr> {
        match self {
            ProxyAddr::Unspec => None,
            ProxyAddr::V4(ip, port) => Some(SocketAddr::new(IpAddr::V4(ip), port)),
            ProxyAddr::V6(ip, port) => Some(SocketAddr::new(IpAddr::V6(ip), port)),
        }
    }
}

/// The two endpoints carried by a PROXY protocol header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyDescriptor {
    pub from: ProxyAddr,
    pub to: ProxyAddr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyError {
    /// Recognized a v1/v2 preface but its contents didn't parse.
    Malformed,
}

impl error::Error for ProxyError {}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed PROXY protocol preface")
    }
}

const V1_MAX_LINE: usize = 108;
const V2_SIG: &[u8] = b"\r\n\r\n\x00\r\nQUIT\n";
const V2_HDR_LEN: usize = 16;

const V2_CMD_LOCAL: u8 = 0x20;
const V2_CMD_PROXY: u8 = 0x21;
const V2_FAM_TCP4: u8 = 0x11;
const V2_FAM_TCP6: u8 = 0x21;

/// Sniffs `buf` for a PROXY protocol preface and decodes it if present.
///
/// Returns `Ok(None)` if the buffer doesn't start with either preface (the
/// connection isn't proxied; `buf` is left untouched for the caller to
/// tokenize as a normal request line). Returns `Ok(Some((descriptor,
/// consumed)))` on success, where `consumed` is the number of leading bytes
/// of `buf` that made up the preface and must be skipped before tokenizing
/// the request line.
pub fn sniff_and_decode(buf: &[u8]) -> Result<Option<(ProxyDescriptor, usize)>, ProxyError> {
    if buf.starts_with(b"PROX") {
        return decode_v1(buf).map(Some);
    }
    if buf.starts_with(V2_SIG) {
        return decode_v2(buf).map(Some);
    }
    Ok(None)
}

fn decode_v1(buf: &[u8]) -> Result<(ProxyDescriptor, usize), ProxyError> {
    let search = &buf[..buf.len().min(V1_MAX_LINE)];
    let cr = memchr(b'\r', search).ok_or(ProxyError::Malformed)?;
    if search.get(cr + 1) != Some(&b'\n') {
        return Err(ProxyError::Malformed);
    }
    let line = &buf[..cr];
    let consumed = cr + 2;

    let rest = line.strip_prefix(b"PROXY ").ok_or(ProxyError::Malformed)?;
    let mut parts = rest.split(|&b| b == b' ');

    let proto = parts.next().ok_or(ProxyError::Malformed)?;
    let src_addr = parts.next().ok_or(ProxyError::Malformed)?;
    let dst_addr = parts.next().ok_or(ProxyError::Malformed)?;
    let src_port = parts.next().ok_or(ProxyError::Malformed)?;
    let dst_port = parts.next().ok_or(ProxyError::Malformed)?;
    if parts.next().is_some() {
        return Err(ProxyError::Malformed);
    }

    let src_port = parse_ascii_port(src_port).ok_or(ProxyError::Malformed)?;
    let dst_port = parse_ascii_port(dst_port).ok_or(ProxyError::Malformed)?;

    let descriptor = match proto {
        b"TCP4" => {
            let src_addr = parse_str(src_addr)?.parse::<Ipv4Addr>().map_err(|_| ProxyError::Malformed)?;
            let dst_addr = parse_str(dst_addr)?.parse::<Ipv4Addr>().map_err(|_| ProxyError::Malformed)?;
            ProxyDescriptor {
                from: ProxyAddr::V4(src_addr, src_port),
                to: ProxyAddr::V4(dst_addr, dst_port),
            }
        }
        b"TCP6" => {
            let src_addr = parse_str(src_addr)?.parse::<Ipv6Addr>().map_err(|_| ProxyError::Malformed)?;
            let dst_addr = parse_str(dst_addr)?.parse::<Ipv6Addr>().map_err(|_| ProxyError::Malformed)?;
            ProxyDescriptor {
                from: ProxyAddr::V6(src_addr, src_port),
                to: ProxyAddr::V6(dst_addr, dst_port),
            }
        }
        _ => return Err(ProxyError::Malformed),
    };

    Ok((descriptor, consumed))
}

fn parse_str(b: &[u8]) -> Result<&str, ProxyError> {
    std::str::from_utf8(b).map_err(|_| ProxyError::Malformed)
}

fn decode_v2(buf: &[u8]) -> Result<(ProxyDescriptor, usize), ProxyError> {
    if buf.len() < V2_HDR_LEN {
        return Err(ProxyError::Malformed);
    }

    let cmd_ver = buf[12];
    let fam = buf[13];
    let len = u16::from_be_bytes([buf[14], buf[15]]) as usize;
    let consumed = V2_HDR_LEN + len;

    if consumed > buf.len() {
        return Err(ProxyError::Malformed);
    }
    let payload = &buf[V2_HDR_LEN..consumed];

    if cmd_ver == V2_CMD_LOCAL {
        return Ok((
            ProxyDescriptor {
                from: ProxyAddr::Unspec,
                to: ProxyAddr::Unspec,
            },
            consumed,
        ));
    }
    if cmd_ver != V2_CMD_PROXY {
        return Err(ProxyError::Malformed);
    }

    let descriptor = match fam {
        V2_FAM_TCP4 => {
            if payload.len() < 12 {
                return Err(ProxyError::Malformed);
            }
            let src_addr = Ipv4Addr::new(payload[0], payload[1], payload[2], payload[3]);
            let dst_addr = Ipv4Addr::new(payload[4], payload[5], payload[6], payload[7]);
            let src_port = u16::from_be_bytes([payload[8], payload[9]]);
            let dst_port = u16::from_be_bytes([payload[10], payload[11]]);
            ProxyDescriptor {
                from: ProxyAddr::V4(src_addr, src_port),
                to: ProxyAddr::V4(dst_addr, dst_port),
            }
        }
        V2_FAM_TCP6 => {
            if payload.len() < 36 {
                return Err(ProxyError::Malformed);
            }
            let src_addr: [u8; 16] = payload[0..16].try_into().unwrap();
            let dst_addr: [u8; 16] = payload[16..32].try_into().unwrap();
            let src_port = u16::from_be_bytes([payload[32], payload[33]]);
            let dst_port = u16::from_be_bytes([payload[34], payload[35]]);
            ProxyDescriptor {
                from: ProxyAddr::V6(Ipv6Addr::from(src_addr), src_port),
                to: ProxyAddr::V6(Ipv6Addr::from(dst_addr), dst_port),
            }
        }
        _ => return Err(ProxyError::Malformed),
    };

    Ok((descriptor, consumed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_tcp4() {
        let input = b"PROXY TCP4 1.2.3.4 5.6.7.8 1111 2222\r\nGET / HTTP/1.1\r\n\r\n";
        let (desc, consumed) = sniff_and_decode(input).unwrap().unwrap();
        assert_eq!(desc.from, ProxyAddr::V4(Ipv4Addr::new(1, 2, 3, 4), 1111));
        assert_eq!(desc.to, ProxyAddr::V4(Ipv4Addr::new(5, 6, 7, 8), 2222));
        assert_eq!(&input[consumed..], b"GET / HTTP/1.1\r\n\r\n");
    }

    #[test]
    fn v1_tcp6() {
        let input = b"PROXY TCP6 ::1 ::2 111 222\r\n";
        let (desc, consumed) = sniff_and_decode(input).unwrap().unwrap();
        assert_eq!(desc.from, ProxyAddr::V6("::1".parse().unwrap(), 111));
        assert_eq!(desc.to, ProxyAddr::V6("::2".parse().unwrap(), 222));
        assert_eq!(consumed, input.len());
    }

    #[test]
    fn v1_missing_crlf_within_108_is_malformed() {
        let mut input = b"PROXY TCP4 ".to_vec();
        input.extend(std::iter::repeat(b'1').take(200));
        assert_eq!(sniff_and_decode(&input), Err(ProxyError::Malformed));
    }

    #[test]
    fn v1_bad_protocol_token() {
        let input = b"PROXY UDP4 1.2.3.4 5.6.7.8 1 2\r\n";
        assert_eq!(sniff_and_decode(input), Err(ProxyError::Malformed));
    }

    #[test]
    fn v2_proxy_tcp4() {
        let mut input = V2_SIG.to_vec();
        input.push(0x21); // PROXY
        input.push(0x11); // TCP4
        input.extend_from_slice(&12u16.to_be_bytes());
        input.extend_from_slice(&[1, 2, 3, 4]);
        input.extend_from_slice(&[5, 6, 7, 8]);
        input.extend_from_slice(&1111u16.to_be_bytes());
        input.extend_from_slice(&2222u16.to_be_bytes());
        input.extend_from_slice(b"GET / HTTP/1.1\r\n\r\n");

        let (desc, consumed) = sniff_and_decode(&input).unwrap().unwrap();
        assert_eq!(desc.from, ProxyAddr::V4(Ipv4Addr::new(1, 2, 3, 4), 1111));
        assert_eq!(desc.to, ProxyAddr::V4(Ipv4Addr::new(5, 6, 7, 8), 2222));
        assert_eq!(&input[consumed..], b"GET / HTTP/1.1\r\n\r\n");
    }

    #[test]
    fn v2_local_is_unspec() {
        let mut input = V2_SIG.to_vec();
        input.push(0x20); // LOCAL
        input.push(0x00);
        input.extend_from_slice(&0u16.to_be_bytes());

        let (desc, consumed) = sniff_and_decode(&input).unwrap().unwrap();
        assert_eq!(desc.from, ProxyAddr::Unspec);
        assert_eq!(desc.to, ProxyAddr::Unspec);
        assert_eq!(consumed, V2_HDR_LEN);
    }

    #[test]
    fn v2_bad_cmd_ver_is_malformed() {
        let mut input = V2_SIG.to_vec();
        input.push(0x55);
        input.push(0x11);
        input.extend_from_slice(&0u16.to_be_bytes());
        assert_eq!(sniff_and_decode(&input), Err(ProxyError::Malformed));
    }

    #[test]
    fn not_proxied_returns_none() {
        let input = b"GET / HTTP/1.1\r\n\r\n";
        assert_eq!(sniff_and_decode(input), Ok(None));
    }
}
