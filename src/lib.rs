//! rsfairplay - FairPlay Streaming Key Server Module (KSM).
//!
//! This crate implements the server side of the FairPlay Streaming key
//! exchange: it decodes a Server Playback Context (SPC) message from a
//! client device, derives the session keys, wraps the asset's content
//! key, and encodes the Content Key Context (CKC) reply.
//!
//! The core is stateless between requests. Content keys and the
//! licensee D-function are supplied through the [`provider`] traits;
//! transport, key loading, and asset catalogs live outside this crate.
//!
//! Feature flags:
//! - `tracing`: emit diagnostic traces of non-secret protocol fields.

#[macro_use]
mod macros;

/// CKC container framing and payload assembly.
pub mod ckc;
/// Big-endian wire primitives and random material.
pub mod codec;
/// AES / RSA / SHA-1 façade.
pub mod crypto;
/// Common error types and Result alias.
pub mod error;
/// The key server module itself.
pub mod ksm;
/// Content-key and D-function provider contracts.
pub mod provider;
/// SPC container decoding.
pub mod spc;
/// Tag-Length-Length-Value codec.
pub mod tllv;
