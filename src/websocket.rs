//! RFC 6455 WebSocket upgrade handshake: validates the request headers and
//! computes the `Sec-WebSocket-Accept` response value.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha1::{Digest, Sha1};
use std::error;
use std::fmt;

const GUID: &[u8] = b"258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// A base64-encoded SHA-1 digest is always 28 bytes (20-byte digest, padded
/// to a multiple of 3 for base64): no heap allocation is needed.
pub const ACCEPT_LEN: usize = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebSocketError {
    /// `Upgrade` header missing or not exactly `websocket`.
    NotUpgrade,
    /// `Sec-WebSocket-Key` missing or not valid base64.
    InvalidKey,
}

impl error::Error for WebSocketError {}

impl fmt::Display for WebSocketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebSocketError::NotUpgrade => write!(f, "not a websocket upgrade request"),
            WebSocketError::InvalidKey => write!(f, "missing or invalid Sec-WebSocket-Key"),
        }
    }
}

/// Validates `upgrade`/`key` per RFC 6455 and computes `Sec-WebSocket-Accept`.
///
/// `upgrade` must be exactly `b"websocket"` (case-insensitively, matching
/// real clients' `Upgrade: websocket` / `Upgrade: WebSocket` variance).
/// `key` must be well-formed base64 (its decoded length is not otherwise
/// constrained here — real clients always send a 16-byte nonce, but the
/// handshake algorithm itself doesn't require checking that).
pub fn accept(upgrade: &[u8], key: &[u8]) -> Result<[u8; ACCEPT_LEN], WebSocketError> {
    if !upgrade.eq_ignore_ascii_case(b"websocket") {
        return Err(WebSocketError::NotUpgrade);
    }
    STANDARD
        .decode(key)
        .map_err(|_| WebSocketError::InvalidKey)?;

    let mut hasher = Sha1::new();
    hasher.update(key);
    hasher.update(GUID);
    let digest = hasher.finalize();

    let mut out = [0u8; ACCEPT_LEN];
    STANDARD
        .encode_slice(digest, &mut out)
        .expect("28-byte buffer always fits a 20-byte digest's base64 encoding");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The literal RFC 6455 §1.3 example vector.
    #[test]
    fn rfc6455_example_vector() {
        let accepted = accept(b"websocket", b"dGhlIHNhbXBsZSBub25jZQ==").unwrap();
        assert_eq!(&accepted[..], b"s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn case_insensitive_upgrade_token() {
        assert!(accept(b"WebSocket", b"dGhlIHNhbXBsZSBub25jZQ==").is_ok());
        assert!(accept(b"Websocket", b"dGhlIHNhbXBsZSBub25jZQ==").is_ok());
    }

    #[test]
    fn rejects_non_websocket_upgrade() {
        assert_eq!(
            accept(b"h2c", b"dGhlIHNhbXBsZSBub25jZQ=="),
            Err(WebSocketError::NotUpgrade)
        );
    }

    #[test]
    fn rejects_invalid_base64_key() {
        assert_eq!(
            accept(b"websocket", b"not!base64!"),
            Err(WebSocketError::InvalidKey)
        );
    }
}
