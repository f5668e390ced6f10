//! Negotiation configuration
//!
//! ```rust
//! use duet_session_core::NegotiationConfig;
//!
//! let config = NegotiationConfig::new("192.168.1.20")
//!     .with_connectivity_checks(false)
//!     .with_excluded_codec("G729");
//! assert!(config.validate().is_ok());
//! ```

use std::net::Ipv4Addr;

use duet_sip_core::sdp::builder::{DEFAULT_BANDWIDTH, DEFAULT_MAX_PTIME, DEFAULT_SESSION_NAME};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SessionError};

fn default_local_ip() -> String {
    "127.0.0.1".to_string()
}

fn default_session_name() -> String {
    DEFAULT_SESSION_NAME.to_string()
}

fn default_bandwidth() -> String {
    DEFAULT_BANDWIDTH.to_string()
}

fn default_true() -> bool {
    true
}

fn default_excluded_codecs() -> Vec<String> {
    // Its fmtp line is too long for older peers
    vec!["THEORA".to_string()]
}

fn default_max_ptime() -> u32 {
    DEFAULT_MAX_PTIME
}

fn default_warning_agent() -> String {
    "duet".to_string()
}

/// Settings for one call negotiation endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationConfig {
    /// IPv4 address advertised in `o=` and `c=`
    #[serde(default = "default_local_ip")]
    pub local_ip: String,

    #[serde(default = "default_session_name")]
    pub session_name: String,

    /// Value of the `b=` line
    #[serde(default = "default_bandwidth")]
    pub bandwidth: String,

    /// Whether the first stream of an outgoing call runs connectivity checks.
    /// A legacy answer downgrades the stream regardless.
    #[serde(default = "default_true")]
    pub connectivity_checks: bool,

    /// Codec names never announced
    #[serde(default = "default_excluded_codecs")]
    pub excluded_codecs: Vec<String>,

    #[serde(default = "default_max_ptime")]
    pub max_ptime: u32,

    /// Agent token of the `Warning` header sent with 488
    #[serde(default = "default_warning_agent")]
    pub warning_agent: String,

    /// Drop local candidates whose RTP/RTCP partner is missing
    #[serde(default = "default_true")]
    pub drop_incomplete_candidate_pairs: bool,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            local_ip: default_local_ip(),
            session_name: default_session_name(),
            bandwidth: default_bandwidth(),
            connectivity_checks: true,
            excluded_codecs: default_excluded_codecs(),
            max_ptime: default_max_ptime(),
            warning_agent: default_warning_agent(),
            drop_incomplete_candidate_pairs: true,
        }
    }
}

impl NegotiationConfig {
    pub fn new(local_ip: impl Into<String>) -> Self {
        Self {
            local_ip: local_ip.into(),
            ..Default::default()
        }
    }

    /// Parse from JSON; absent fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SessionError::config(format!("Invalid configuration JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_session_name(mut self, name: impl Into<String>) -> Self {
        self.session_name = name.into();
        self
    }

    pub fn with_bandwidth(mut self, bandwidth: impl Into<String>) -> Self {
        self.bandwidth = bandwidth.into();
        self
    }

    pub fn with_connectivity_checks(mut self, enabled: bool) -> Self {
        self.connectivity_checks = enabled;
        self
    }

    pub fn with_excluded_codec(mut self, name: impl Into<String>) -> Self {
        self.excluded_codecs.push(name.into());
        self
    }

    pub fn with_max_ptime(mut self, max_ptime: u32) -> Self {
        self.max_ptime = max_ptime;
        self
    }

    pub fn with_warning_agent(mut self, agent: impl Into<String>) -> Self {
        self.warning_agent = agent.into();
        self
    }

    pub fn with_drop_incomplete_candidate_pairs(mut self, enabled: bool) -> Self {
        self.drop_incomplete_candidate_pairs = enabled;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.local_ip.parse::<Ipv4Addr>().is_err() {
            return Err(SessionError::config(format!(
                "local_ip must be an IPv4 address, got '{}'",
                self.local_ip
            )));
        }
        if self.session_name.trim().is_empty() {
            return Err(SessionError::config("session_name cannot be empty"));
        }
        if !self.bandwidth.contains(':') {
            return Err(SessionError::config(format!(
                "bandwidth must look like '<type>:<value>', got '{}'",
                self.bandwidth
            )));
        }
        if self.max_ptime == 0 {
            return Err(SessionError::config("max_ptime must be positive"));
        }
        if self.warning_agent.contains(char::is_whitespace) || self.warning_agent.is_empty() {
            return Err(SessionError::config("warning_agent must be a single token"));
        }
        Ok(())
    }
}
