//! Error Types for Session Core
//!
//! Every failure here is scoped to the single active call. The coordinator
//! logs and swallows per-event errors; nothing is fatal to the process.

use duet_sip_core::SdpError;
use thiserror::Error;

/// Main result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Main error type for session operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Peer SDP could not be read
    #[error("SDP error: {0}")]
    Sdp(#[from] SdpError),

    /// No codec is shared with the peer
    #[error("No common codec with peer")]
    NoCommonCodec,

    /// Peer demands media encryption, which is never offered
    #[error("Peer requires encryption")]
    EncryptionRequired,

    /// A second call was requested while one is active
    #[error("Call {call_id} already in progress")]
    CallInProgress { call_id: String },

    /// The event needs an active call and there is none
    #[error("No active call")]
    NoActiveCall,

    /// The event is not valid in the current call state
    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    /// SIP transport collaborator failed
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Media backend collaborator failed
    #[error("Media error: {message}")]
    Media { message: String },

    /// Configuration rejected by validation
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

// Convenience constructors
impl SessionError {
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn media(message: impl Into<String>) -> Self {
        Self::Media {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Failures that end the negotiation for the current call
    pub fn is_negotiation_failure(&self) -> bool {
        matches!(self, Self::Sdp(_) | Self::NoCommonCodec | Self::EncryptionRequired)
    }
}
