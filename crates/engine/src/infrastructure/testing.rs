//! Hand-rolled port fakes shared by the engine's unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use dialogues_domain::ParticipantId;

use crate::infrastructure::ports::{
    ChatPort, PresencePort, ScheduledTask, SchedulerPort, TimerHandle,
};

/// Scheduler that queues tasks until the test fires them explicitly.
#[derive(Default)]
pub struct ManualScheduler {
    pending: Mutex<Vec<PendingTask>>,
}

struct PendingTask {
    delay_ticks: u32,
    token: CancellationToken,
    task: ScheduledTask,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued tasks, including cancelled ones not yet fired.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().expect("scheduler lock").len()
    }

    /// Delays of queued tasks, oldest first.
    pub fn scheduled_ticks(&self) -> Vec<u32> {
        self.pending
            .lock()
            .expect("scheduler lock")
            .iter()
            .map(|p| p.delay_ticks)
            .collect()
    }

    /// Fires the oldest queued task. Returns whether its body actually ran;
    /// a cancelled task is discarded without running.
    pub async fn fire_next(&self) -> bool {
        let next = {
            let mut guard = self.pending.lock().expect("scheduler lock");
            if guard.is_empty() {
                return false;
            }
            guard.remove(0)
        };
        if next.token.is_cancelled() {
            return false;
        }
        next.task.await;
        true
    }

    /// Fires queued tasks (skipping cancelled ones) until none remain.
    pub async fn fire_all(&self) {
        loop {
            let next = {
                let mut guard = self.pending.lock().expect("scheduler lock");
                if guard.is_empty() {
                    break;
                }
                guard.remove(0)
            };
            if !next.token.is_cancelled() {
                next.task.await;
            }
        }
    }
}

impl SchedulerPort for ManualScheduler {
    fn run_later(&self, delay_ticks: u32, task: ScheduledTask) -> TimerHandle {
        let token = CancellationToken::new();
        self.pending
            .lock()
            .expect("scheduler lock")
            .push(PendingTask {
                delay_ticks,
                token: token.clone(),
                task,
            });
        TimerHandle::new(token)
    }
}

/// Everything sent through the chat port, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Message {
        to: ParticipantId,
        text: String,
    },
    Clickable {
        to: ParticipantId,
        text: String,
        command: String,
    },
}

/// Chat port that records instead of delivering.
#[derive(Default)]
pub struct RecordingChat {
    events: Mutex<Vec<ChatEvent>>,
}

impl RecordingChat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ChatEvent> {
        self.events.lock().expect("chat lock").clone()
    }

    /// Plain messages delivered to one participant, in order.
    pub fn texts_to(&self, to: ParticipantId) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ChatEvent::Message { to: t, text } if t == to => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Activation commands of every clickable line sent, in order.
    pub fn clickable_commands(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ChatEvent::Clickable { command, .. } => Some(command),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().expect("chat lock").clear();
    }
}

#[async_trait]
impl ChatPort for RecordingChat {
    async fn send_message(&self, to: ParticipantId, message: &str) {
        self.events.lock().expect("chat lock").push(ChatEvent::Message {
            to,
            text: message.to_string(),
        });
    }

    async fn send_clickable(&self, to: ParticipantId, message: &str, command: &str) {
        self.events
            .lock()
            .expect("chat lock")
            .push(ChatEvent::Clickable {
                to,
                text: message.to_string(),
                command: command.to_string(),
            });
    }
}

/// Fixed name-to-participant roster.
#[derive(Default)]
pub struct StaticRoster {
    names: HashMap<String, ParticipantId>,
}

impl StaticRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, id: ParticipantId) -> Self {
        self.names.insert(name.into(), id);
        self
    }
}

impl PresencePort for StaticRoster {
    fn resolve_name(&self, name: &str) -> Option<ParticipantId> {
        self.names.get(name).copied()
    }
}
