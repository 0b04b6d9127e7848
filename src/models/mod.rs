//! Domain models for mailbox synchronization

mod credential;
mod thread;

pub use credential::Credential;
pub use thread::{KnownThreadCache, MessageSummary, ThreadHeader, ThreadId, ThreadSummary};
