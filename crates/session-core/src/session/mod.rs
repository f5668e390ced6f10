//! Call session and its lifecycle states
mod session;
mod state;

pub(crate) use session::InviteKind;
pub use session::{CallInfo, CallSession};
pub use state::CallState;
