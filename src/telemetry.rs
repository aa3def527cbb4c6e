//! Structured logging via `tracing`: the instrumentation points a deployed
//! ingest core needs, added at the granularity a production HTTP server
//! uses `tracing` for (accept/reject at `debug`, protocol-level failures at
//! `warn`, per-request completion at `trace`, unrecoverable faults at
//! `error`).

use crate::errors::ErrorKind;
use std::net::SocketAddr;

#[inline]
pub(crate) fn connection_accepted(client_addr: SocketAddr, server_addr: SocketAddr) {
    tracing::debug!(%client_addr, %server_addr, "connection accepted");
}

#[inline]
pub(crate) fn connection_rejected(client_addr: SocketAddr, reason: &str) {
    tracing::debug!(%client_addr, reason, "connection rejected by filter");
}

#[inline]
pub(crate) fn proxy_preface_rejected(client_addr: SocketAddr) {
    tracing::warn!(%client_addr, "PROXY protocol preface did not parse");
}

#[inline]
pub(crate) fn websocket_upgrade_rejected(client_addr: SocketAddr) {
    tracing::warn!(%client_addr, "WebSocket upgrade handshake rejected");
}

#[inline]
pub(crate) fn request_completed(client_addr: SocketAddr, keep_alive: bool) {
    tracing::trace!(%client_addr, keep_alive, "request completed");
}

#[inline]
pub(crate) fn connection_error(client_addr: SocketAddr, error: &ErrorKind) {
    tracing::warn!(%client_addr, ?error, "connection terminated with error");
}

#[inline]
pub(crate) fn worker_panicked(worker_id: usize) {
    tracing::error!(worker_id, "worker task panicked, respawning");
}
