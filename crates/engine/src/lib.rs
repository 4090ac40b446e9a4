//! Dialogues Engine library.
//!
//! Runtime for scripted, branching conversations: loads immutable dialogue
//! trees from a compact binary format and drives them against live
//! participants.
//!
//! ## Structure
//!
//! - `infrastructure/` - External dependency boundaries (ports + adapters)
//!   and the binary serialization framework
//! - `stores/` - Load-on-miss dialogue cache backed by the binary codec
//! - `sessions/` - Session state machine and participant registry
//! - `commands` - Text command surface for host integration

pub mod commands;
pub mod infrastructure;
pub mod sessions;
pub mod stores;
