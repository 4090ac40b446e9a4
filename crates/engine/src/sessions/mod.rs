//! Session runtime: one state machine per active conversation plus the
//! process-wide participant registry.

mod formatter;
mod registry;
mod session;

pub use formatter::{PrefixFormatter, SessionFormatter};
pub use registry::SessionRegistry;
pub use session::{DialogueSession, SessionError};
