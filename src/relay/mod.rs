//! Session orchestration and the client transport contract.

mod session;
mod transport;

pub use session::RelaySession;
pub use transport::{Transport, SERVER_ERROR_MESSAGE};
