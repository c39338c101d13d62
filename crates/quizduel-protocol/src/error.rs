//! Error types for the protocol layer.
//!
//! Each crate in quizduel defines its own error enum. A `ProtocolError`
//! always means the problem is in turning frames into envelopes (or back),
//! never in room or registry logic.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, missing required fields, an unknown
    /// operation tag.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded but breaks a protocol rule, e.g. a client sent
    /// a server-only payload.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
