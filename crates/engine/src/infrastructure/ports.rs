//! Port traits for infrastructure boundaries.
//!
//! These are the ONLY abstractions in the engine. Everything else is
//! concrete types. Ports exist for:
//! - Delayed task execution (host scheduler, or a manual one in tests)
//! - Chat delivery (whatever the host uses to reach a participant)
//! - Participant name resolution (host roster)
//! - Authoring-source import (the spreadsheet compiler lives outside)

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use dialogues_domain::{Dialogue, ParticipantId};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Missing authoring source for dialogue '{0}'")]
    NotFound(String),
    #[error("Invalid authoring source: {0}")]
    Invalid(String),
    #[error("Import failed: {0}")]
    Io(String),
}

// =============================================================================
// Scheduling
// =============================================================================

/// A boxed fire-once task body for [`SchedulerPort::run_later`].
pub type ScheduledTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Handle to an outstanding scheduled task.
///
/// Cancelling prevents the task body from running if it has not started yet;
/// a task that already began executing is unaffected.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    token: CancellationToken,
}

impl TimerHandle {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Fire-once delayed task execution with tick granularity defined by the
/// host.
pub trait SchedulerPort: Send + Sync {
    /// Runs `task` after `delay_ticks` host ticks unless the returned handle
    /// is cancelled first.
    fn run_later(&self, delay_ticks: u32, task: ScheduledTask) -> TimerHandle;
}

// =============================================================================
// Host Integration Ports
// =============================================================================

/// Text delivery to a participant.
#[async_trait]
pub trait ChatPort: Send + Sync {
    async fn send_message(&self, to: ParticipantId, message: &str);

    /// Sends a line that, when activated by the participant, submits
    /// `command` back to the command surface (e.g. `select 2`).
    async fn send_clickable(&self, to: ParticipantId, message: &str, command: &str);
}

/// Participant lookup by host-visible name.
pub trait PresencePort: Send + Sync {
    fn resolve_name(&self, name: &str) -> Option<ParticipantId>;
}

/// Authoring-source import boundary. The actual importer (spreadsheet
/// conversion) is an external collaborator; the engine only needs the
/// resulting dialogue.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImporterPort: Send + Sync {
    async fn import(&self, name: &str) -> Result<Dialogue, ImportError>;
}
