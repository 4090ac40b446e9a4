//! Participant-to-session registry.
//!
//! One entry per participant currently inside a dialogue. The registry owns
//! the session `Arc`s; sessions remove their own entries when they finish,
//! so a dropped registry entry is the only thing keeping a finished session
//! from being freed.

use std::sync::Arc;

use dashmap::DashMap;

use dialogues_domain::ParticipantId;

use crate::sessions::session::DialogueSession;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<ParticipantId, Arc<DialogueSession>>,
}

impl SessionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Session the participant is currently in, if any.
    pub fn session_of(&self, participant: ParticipantId) -> Option<Arc<DialogueSession>> {
        self.sessions
            .get(&participant)
            .map(|entry| entry.value().clone())
    }

    pub fn has_session(&self, participant: ParticipantId) -> bool {
        self.sessions.contains_key(&participant)
    }

    /// Points every participant of a starting session at it. A participant
    /// already in another session is pulled out of that one first; if the
    /// old session is left empty it is terminated.
    pub(crate) async fn on_start(&self, session: &Arc<DialogueSession>) {
        for participant in session.participants().await {
            // insert() hands back the displaced value, so no map guard is
            // held across the awaits below.
            let previous = self.sessions.insert(participant, session.clone());
            if let Some(previous) = previous {
                if Arc::ptr_eq(&previous, session) {
                    continue;
                }
                tracing::debug!(%participant, "participant reassigned to a new dialogue");
                if !previous.remove_participant(participant).await {
                    previous.terminate().await;
                }
            }
        }
    }

    /// Drops the given participants' entries, but only those still pointing
    /// at this session. Entries already reassigned elsewhere are untouched.
    pub(crate) fn remove_matching(
        &self,
        participants: &[ParticipantId],
        session: &Arc<DialogueSession>,
    ) {
        for participant in participants {
            self.sessions
                .remove_if(participant, |_, current| Arc::ptr_eq(current, session));
        }
    }

    /// Handles a participant leaving the host entirely: their session forgets
    /// them, and is terminated if nobody remains.
    pub async fn on_participant_quit(&self, participant: ParticipantId) {
        let Some((_, session)) = self.sessions.remove(&participant) else {
            return;
        };
        if !session.remove_participant(participant).await {
            session.terminate().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use dialogues_domain::{Dialogue, DialoguePrompt, InputChoice, END_OF_DIALOGUE};

    use super::*;
    use crate::infrastructure::testing::{ManualScheduler, RecordingChat};
    use crate::sessions::formatter::PrefixFormatter;

    // A dialogue that parks immediately on a choice, keeping the session
    // alive until the test decides otherwise.
    fn waiting_dialogue(name: &str) -> Arc<Dialogue> {
        let mut prompts = BTreeMap::new();
        prompts.insert(
            0,
            DialoguePrompt::new(
                0,
                Some("waiting".to_string()),
                END_OF_DIALOGUE,
                0,
                0,
                0,
                vec![InputChoice::new(
                    1,
                    END_OF_DIALOGUE,
                    Some("done".to_string()),
                    None,
                )],
            ),
        );
        Arc::new(Dialogue::new(name, 0, prompts, BTreeMap::new()).expect("valid dialogue"))
    }

    fn session(
        registry: &Arc<SessionRegistry>,
        name: &str,
        participants: Vec<ParticipantId>,
    ) -> Arc<DialogueSession> {
        DialogueSession::new(
            waiting_dialogue(name),
            participants,
            registry.clone(),
            Arc::new(ManualScheduler::new()),
            Arc::new(RecordingChat::new()),
            Arc::new(PrefixFormatter),
        )
        .expect("session")
    }

    #[tokio::test]
    async fn start_registers_every_participant() {
        let registry = SessionRegistry::new();
        let a = ParticipantId::new();
        let b = ParticipantId::new();
        let s = session(&registry, "a.b", vec![a, b]);

        s.start().await.expect("start");

        assert!(registry.has_session(a));
        assert!(Arc::ptr_eq(&registry.session_of(b).expect("entry"), &s));
        assert!(registry.session_of(ParticipantId::new()).is_none());
    }

    #[tokio::test]
    async fn reassignment_pulls_participant_out_of_old_session() {
        let registry = SessionRegistry::new();
        let a = ParticipantId::new();
        let b = ParticipantId::new();
        let old = session(&registry, "old.one", vec![a, b]);
        old.start().await.expect("start old");

        let new = session(&registry, "new.one", vec![a]);
        new.start().await.expect("start new");

        // A moved; B's session keeps running without A.
        assert!(Arc::ptr_eq(&registry.session_of(a).expect("entry"), &new));
        assert!(Arc::ptr_eq(&registry.session_of(b).expect("entry"), &old));
        assert!(!old.is_terminated().await);
        assert_eq!(old.participants().await, vec![b]);
    }

    #[tokio::test]
    async fn reassigning_sole_participant_terminates_old_session() {
        let registry = SessionRegistry::new();
        let a = ParticipantId::new();
        let old = session(&registry, "old.one", vec![a]);
        old.start().await.expect("start old");

        let new = session(&registry, "new.one", vec![a]);
        new.start().await.expect("start new");

        assert!(old.is_terminated().await);
        assert!(Arc::ptr_eq(&registry.session_of(a).expect("entry"), &new));
    }

    #[tokio::test]
    async fn quit_removes_entry_and_terminates_emptied_session() {
        let registry = SessionRegistry::new();
        let a = ParticipantId::new();
        let b = ParticipantId::new();
        let s = session(&registry, "a.b", vec![a, b]);
        s.start().await.expect("start");

        registry.on_participant_quit(a).await;
        assert!(!registry.has_session(a));
        assert!(!s.is_terminated().await);

        registry.on_participant_quit(b).await;
        assert!(!registry.has_session(b));
        assert!(s.is_terminated().await);
    }

    #[tokio::test]
    async fn quit_without_session_is_a_no_op() {
        let registry = SessionRegistry::new();
        registry.on_participant_quit(ParticipantId::new()).await;
    }

    #[tokio::test]
    async fn finished_session_leaves_no_entries_behind() {
        let registry = SessionRegistry::new();
        let a = ParticipantId::new();
        let s = session(&registry, "a.b", vec![a]);
        s.start().await.expect("start");

        s.accept_choice(a, 1).await;

        assert!(s.is_terminated().await);
        assert!(!registry.has_session(a));
    }
}
