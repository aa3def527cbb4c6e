//! Body ingest: validates `Content-Length`, then either borrows the
//! bytes straight out of the request buffer (the common case — the whole
//! body already arrived with the headers), grows a heap-owned arena for
//! mid-sized bodies, or falls back to a memory-mapped temp file for bodies
//! at or above [`LARGE_BODY_THRESHOLD`].
//!
//! Unlike a bare `check_body` that only accepts a body already entirely
//! present in the one buffer read, this module is the part that actually
//! drains the socket for the rest of it.

use crate::errors::ErrorKind;
use crate::limits::BodyLimits;
use memmap2::MmapMut;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

/// Bodies at or above this size are file-backed instead of heap-allocated.
pub const LARGE_BODY_THRESHOLD: usize = 1024 * 1024;

/// Where the ingested body bytes actually live.
pub(crate) enum BodyStore {
    /// Body fully present in the request buffer already (zero-copy; the
    /// common case for small POSTs sent in the same packet as the headers).
    Inline(&'static [u8]),
    /// Body copied into a heap-owned buffer — used when more bytes had to
    /// be read past what the header-phase buffer held, but the total
    /// stayed under [`LARGE_BODY_THRESHOLD`].
    Arena(Box<[u8]>),
    /// Body backed by a memory-mapped, already-unlinked temp file.
    Mapped(MappedBody),
}

impl BodyStore {
    pub(crate) fn as_slice(&self) -> &[u8] {
        match self {
            BodyStore::Inline(s) => s,
            BodyStore::Arena(b) => b,
            BodyStore::Mapped(m) => &m.mmap[..],
        }
    }
}

/// A body backed by a memory-mapped temp file. The file was created
/// already-unlinked (`tempfile::tempfile`), so there is no path on disk to
/// clean up; dropping this drops the mapping and closes the descriptor,
/// which is the only teardown the platform requires.
pub(crate) struct MappedBody {
    // Kept alive only to keep the descriptor open for the mmap's lifetime.
    _file: std::fs::File,
    mmap: MmapMut,
}

/// Ingests a request body of `content_length` bytes.
///
/// `inline` is whatever body bytes are already sitting in the request
/// buffer past the headers (possibly the whole body, possibly a prefix,
/// possibly empty); `stream` is read for the remainder, if any.
pub(crate) async fn ingest(
    stream: &mut TcpStream,
    inline: &'static [u8],
    content_length: usize,
    limits: &BodyLimits,
) -> Result<BodyStore, ErrorKind> {
    if content_length >= limits.max_post_data_size {
        return Err(ErrorKind::BodyTooLarge);
    }

    if inline.len() == content_length {
        return Ok(BodyStore::Inline(inline));
    }

    if content_length < LARGE_BODY_THRESHOLD {
        let mut buf = vec![0u8; content_length].into_boxed_slice();
        let prefix = inline.len().min(content_length);
        buf[..prefix].copy_from_slice(&inline[..prefix]);
        if prefix < content_length {
            stream.read_exact(&mut buf[prefix..]).await?;
        }
        return Ok(BodyStore::Arena(buf));
    }

    if !limits.allow_temp_file {
        return Err(ErrorKind::BodyAllocation);
    }

    // `tempfile::tempfile()` is already unlinked on Unix at creation time,
    // satisfying "unlink before any yield" with no extra bookkeeping.
    let file = tempfile::tempfile().map_err(ErrorKind::from)?;
    file.set_len(content_length as u64).map_err(ErrorKind::from)?;

    // MAP_HUGETLB has no portable equivalent in `memmap2`; see DESIGN.md's
    // Open Question resolution. This is always a plain private mapping.
    let mut mmap = unsafe { MmapMut::map_mut(&file) }.map_err(ErrorKind::from)?;

    let prefix = inline.len().min(content_length);
    mmap[..prefix].copy_from_slice(&inline[..prefix]);
    if prefix < content_length {
        stream.read_exact(&mut mmap[prefix..]).await?;
    }

    Ok(BodyStore::Mapped(MappedBody { _file: file, mmap }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::BodyLimits;
    use tokio::io::AsyncWriteExt;
    use tokio::net::{TcpListener, TcpStream};

    async fn socket_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connect = TcpStream::connect(addr);
        let (server, _) = listener.accept().await.unwrap();
        let client = connect.await.unwrap();
        (server, client)
    }

    #[tokio::test]
    async fn fully_inline_body_is_zero_copy() {
        let (mut server, _client) = socket_pair().await;
        let limits = BodyLimits::default();

        let store = ingest(&mut server, b"a=1&b=2", 7, &limits).await.unwrap();
        assert!(matches!(store, BodyStore::Inline(_)));
        assert_eq!(store.as_slice(), b"a=1&b=2");
    }

    #[tokio::test]
    async fn partial_body_reads_remainder_from_socket() {
        let (mut server, mut client) = socket_pair().await;
        let limits = BodyLimits::default();

        let send = tokio::spawn(async move {
            client.write_all(b"world").await.unwrap();
        });

        let store = ingest(&mut server, b"hello", 10, &limits).await.unwrap();
        send.await.unwrap();
        assert_eq!(store.as_slice(), b"helloworld");
    }

    #[tokio::test]
    async fn over_ceiling_is_body_too_large() {
        let (mut server, _client) = socket_pair().await;
        let limits = BodyLimits {
            max_post_data_size: 10,
            ..Default::default()
        };

        let err = ingest(&mut server, b"", 11, &limits).await.unwrap_err();
        assert_eq!(err, ErrorKind::BodyTooLarge);
    }

    #[tokio::test]
    async fn large_body_without_temp_file_fails() {
        let (mut server, _client) = socket_pair().await;
        let limits = BodyLimits {
            max_post_data_size: usize::MAX,
            allow_temp_file: false,
        };

        let err = ingest(&mut server, b"", LARGE_BODY_THRESHOLD, &limits)
            .await
            .unwrap_err();
        assert_eq!(err, ErrorKind::BodyAllocation);
    }
}
