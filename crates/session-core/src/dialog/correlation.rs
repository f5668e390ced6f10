//! Transaction correlation
//!
//! Responses are matched to the request that caused them by call id, CSeq
//! number and method. A response whose key does not match the dialog's
//! outstanding INVITE belongs to some other transaction (a PRACK, a BYE, an
//! INVITE that has already been settled) and must not move the call.

use std::fmt;

use duet_sip_core::{Method, SipMessage};
use serde::{Deserialize, Serialize};

/// Key of one client transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionKey {
    pub call_id: String,
    pub cseq: u32,
    pub method: Method,
}

impl TransactionKey {
    pub fn new(call_id: impl Into<String>, cseq: u32, method: Method) -> Self {
        Self {
            call_id: call_id.into(),
            cseq,
            method,
        }
    }

    /// Whether a response carries this key in its Call-ID and CSeq headers
    pub fn matches_response(&self, response: &SipMessage) -> bool {
        response.call_id() == Some(self.call_id.as_str())
            && response
                .cseq()
                .map_or(false, |(cseq, method)| cseq == self.cseq && method == self.method)
    }
}

impl fmt::Display for TransactionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}><{} {}>", self.call_id, self.cseq, self.method)
    }
}
