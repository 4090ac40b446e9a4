//! Dialogue session state machine.
//!
//! One `DialogueSession` drives one conversation through an immutable
//! dialogue tree: delays, message delivery, and choice collection. All state
//! lives behind a single mutex, so every step of a session (including the
//! awaited chat sends inside it) runs to completion before the next one can
//! begin; the choice-versus-timeout race resolves as whichever path takes
//! the lock first, and the loser's action becomes a no-op.
//!
//! Zero delays advance synchronously without touching the scheduler.
//! Non-zero delays schedule exactly one cancellable callback; the callback
//! holds a `Weak` session reference and an epoch stamp, so a timer that was
//! cancelled after firing (but before running) is discarded on arrival.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use dialogues_domain::{Dialogue, ParticipantId};

use crate::infrastructure::ports::{ChatPort, SchedulerPort, TimerHandle};
use crate::sessions::formatter::SessionFormatter;
use crate::sessions::registry::SessionRegistry;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session is already started")]
    AlreadyStarted,
    #[error("Cannot create dialogue session with no participants")]
    NoParticipants,
}

/// Where the session is within the current prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Created but not started.
    Idle,
    /// Entering a prompt; runs or schedules the initial delay.
    AcceptPrompt,
    /// Initial delay elapsed; sends the message, then the final delay.
    SendMessage,
    /// Final delay elapsed; advances directly or presents choices.
    PostMessage,
    /// Choices are out; first accepted submission (or the timeout) wins.
    AwaitingChoice,
    /// Absorbing.
    Terminated,
}

struct SessionState {
    participants: Vec<ParticipantId>,
    current_prompt_id: Option<i32>,
    phase: Phase,
    started: bool,
    last_sender: Option<ParticipantId>,
    pending_timer: Option<TimerHandle>,
    /// Bumped on every cancel/reschedule; a fired callback whose stamp no
    /// longer matches was superseded and must not act.
    timer_epoch: u64,
}

/// One in-progress traversal of a dialogue by a fixed set of participants.
pub struct DialogueSession {
    dialogue: Arc<Dialogue>,
    registry: Arc<SessionRegistry>,
    scheduler: Arc<dyn SchedulerPort>,
    chat: Arc<dyn ChatPort>,
    formatter: Arc<dyn SessionFormatter>,
    state: Mutex<SessionState>,
}

impl DialogueSession {
    pub fn new(
        dialogue: Arc<Dialogue>,
        participants: Vec<ParticipantId>,
        registry: Arc<SessionRegistry>,
        scheduler: Arc<dyn SchedulerPort>,
        chat: Arc<dyn ChatPort>,
        formatter: Arc<dyn SessionFormatter>,
    ) -> Result<Arc<Self>, SessionError> {
        if participants.is_empty() {
            return Err(SessionError::NoParticipants);
        }
        Ok(Arc::new(Self {
            dialogue,
            registry,
            scheduler,
            chat,
            formatter,
            state: Mutex::new(SessionState {
                participants,
                current_prompt_id: None,
                phase: Phase::Idle,
                started: false,
                last_sender: None,
                pending_timer: None,
                timer_epoch: 0,
            }),
        }))
    }

    pub fn dialogue(&self) -> &Arc<Dialogue> {
        &self.dialogue
    }

    pub async fn participants(&self) -> Vec<ParticipantId> {
        self.state.lock().await.participants.clone()
    }

    /// Last participant whose accepted choice advanced the session.
    pub async fn last_sender(&self) -> Option<ParticipantId> {
        self.state.lock().await.last_sender
    }

    pub async fn accepts_input(&self) -> bool {
        self.state.lock().await.phase == Phase::AwaitingChoice
    }

    pub async fn is_terminated(&self) -> bool {
        self.state.lock().await.phase == Phase::Terminated
    }

    /// Registers every participant with the registry and runs the machine
    /// until it first suspends (or terminates). Fails if already started.
    pub async fn start(self: &Arc<Self>) -> Result<(), SessionError> {
        {
            let mut st = self.state.lock().await;
            if st.started {
                return Err(SessionError::AlreadyStarted);
            }
            st.started = true;
            st.current_prompt_id = Some(self.dialogue.first_prompt_id());
            st.phase = Phase::AcceptPrompt;
        }
        // Registered before the first step so lookups made from within the
        // step (e.g. a participant reacting instantly) already resolve.
        self.registry.on_start(self).await;

        tracing::info!(dialogue = %self.dialogue.name(), "dialogue session started");
        let mut st = self.state.lock().await;
        self.run(&mut st).await;
        Ok(())
    }

    /// Submits a choice on behalf of a participant. Ignored unless the
    /// session is awaiting input and `choice_id` names a valid choice of the
    /// current prompt. The first accepted submission wins: it cancels the
    /// pending timeout and every later submission finds the phase changed.
    pub async fn accept_choice(self: &Arc<Self>, participant: ParticipantId, choice_id: i32) {
        let mut st = self.state.lock().await;
        if st.phase != Phase::AwaitingChoice {
            return;
        }
        let Some(prompt) = st.current_prompt_id.and_then(|id| self.dialogue.prompt(id)) else {
            return;
        };
        let Some(choice) = prompt.input_choice(choice_id) else {
            return;
        };

        Self::cancel_pending(&mut st);
        st.last_sender = Some(participant);
        tracing::debug!(
            dialogue = %self.dialogue.name(),
            choice = choice.choice_id(),
            "choice accepted"
        );

        if let Some(message) = self.formatter.chat_message(&self.dialogue, choice) {
            self.broadcast(&st.participants, &message).await;
        }

        st.current_prompt_id = Some(choice.next_prompt_id());
        st.phase = Phase::AcceptPrompt;
        self.run(&mut st).await;
    }

    /// Stops the session: cancels the pending timer, clears participants and
    /// the current prompt, and releases registry entries. Idempotent.
    pub async fn terminate(self: &Arc<Self>) {
        let mut st = self.state.lock().await;
        if st.phase == Phase::Terminated {
            return;
        }
        self.finish(&mut st);
    }

    /// Removes one participant, returning whether any remain.
    pub(crate) async fn remove_participant(&self, participant: ParticipantId) -> bool {
        let mut st = self.state.lock().await;
        st.participants.retain(|p| *p != participant);
        !st.participants.is_empty()
    }

    /// Drives the machine until it suspends (scheduled callback, awaiting
    /// input) or terminates. Caller holds the state lock.
    async fn run(self: &Arc<Self>, st: &mut SessionState) {
        loop {
            let Some(prompt) = st.current_prompt_id.and_then(|id| self.dialogue.prompt(id))
            else {
                // A reference with no prompt behind it is the normal end of
                // the dialogue, not an error.
                self.finish(st);
                return;
            };

            match st.phase {
                Phase::AcceptPrompt => {
                    st.phase = Phase::SendMessage;
                    if prompt.has_initial_delay() {
                        self.schedule(st, prompt.initial_delay());
                        return;
                    }
                }
                Phase::SendMessage => {
                    if let Some(message) = self.formatter.prompt_message(&self.dialogue, prompt) {
                        self.broadcast(&st.participants, &message).await;
                    }
                    st.phase = Phase::PostMessage;
                    if prompt.has_final_delay() {
                        self.schedule(st, prompt.final_delay());
                        return;
                    }
                }
                Phase::PostMessage => {
                    if !prompt.requires_choices() {
                        st.current_prompt_id = Some(prompt.next_prompt_id());
                        st.phase = Phase::AcceptPrompt;
                        continue;
                    }

                    for choice in prompt.input_choices() {
                        if let Some(line) = self.formatter.display_line(&self.dialogue, choice) {
                            let command = format!("select {}", choice.choice_id());
                            self.broadcast_clickable(&st.participants, &line, &command).await;
                        }
                    }
                    if prompt.has_choice_timeout() {
                        self.schedule(st, prompt.choice_timeout());
                    }
                    st.phase = Phase::AwaitingChoice;
                    return;
                }
                Phase::Idle | Phase::AwaitingChoice | Phase::Terminated => return,
            }
        }
    }

    /// Scheduled-callback entry point.
    async fn on_timer(self: Arc<Self>, epoch: u64) {
        let mut st = self.state.lock().await;
        if st.timer_epoch != epoch {
            // Superseded between firing and acquiring the lock.
            return;
        }
        st.pending_timer = None;
        match st.phase {
            Phase::SendMessage | Phase::PostMessage => self.run(&mut st).await,
            Phase::AwaitingChoice => self.handle_post_timeout(&mut st).await,
            Phase::Idle | Phase::AcceptPrompt | Phase::Terminated => {}
        }
    }

    /// Choice timeout elapsed without input: advance through the prompt's
    /// own successor.
    async fn handle_post_timeout(self: &Arc<Self>, st: &mut SessionState) {
        Self::cancel_pending(st);
        let Some(prompt) = st.current_prompt_id.and_then(|id| self.dialogue.prompt(id)) else {
            self.finish(st);
            return;
        };
        tracing::debug!(
            dialogue = %self.dialogue.name(),
            prompt = prompt.prompt_id(),
            "choice prompt timed out"
        );
        st.current_prompt_id = Some(prompt.next_prompt_id());
        st.phase = Phase::AcceptPrompt;
        self.run(st).await;
    }

    fn schedule(self: &Arc<Self>, st: &mut SessionState, delay_ticks: u32) {
        Self::cancel_pending(st);
        let epoch = st.timer_epoch;
        let weak = Arc::downgrade(self);
        let task = Box::pin(async move {
            if let Some(session) = weak.upgrade() {
                session.on_timer(epoch).await;
            }
        });
        st.pending_timer = Some(self.scheduler.run_later(delay_ticks, task));
    }

    /// Cancels the outstanding timer, if any, and bumps the epoch so a
    /// callback that already fired but has not yet run becomes a no-op.
    fn cancel_pending(st: &mut SessionState) {
        if let Some(handle) = st.pending_timer.take() {
            handle.cancel();
        }
        st.timer_epoch += 1;
    }

    /// Enters the absorbing state and releases everything the session holds.
    /// Registry entries are dropped directly by participant ID; no callback
    /// into this session can re-enter.
    fn finish(self: &Arc<Self>, st: &mut SessionState) {
        Self::cancel_pending(st);
        let participants = std::mem::take(&mut st.participants);
        st.phase = Phase::Terminated;
        st.current_prompt_id = None;
        self.registry.remove_matching(&participants, self);
        tracing::info!(dialogue = %self.dialogue.name(), "dialogue session ended");
    }

    async fn broadcast(&self, participants: &[ParticipantId], message: &str) {
        for participant in participants {
            self.chat.send_message(*participant, message).await;
        }
    }

    async fn broadcast_clickable(
        &self,
        participants: &[ParticipantId],
        message: &str,
        command: &str,
    ) {
        for participant in participants {
            self.chat.send_clickable(*participant, message, command).await;
        }
    }
}
