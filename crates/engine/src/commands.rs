//! Line-based command surface.
//!
//! Every command reports its outcome as plain text back through the chat
//! port; failures are recoverable and never escalate past this layer.

use std::sync::Arc;

use dialogues_domain::ParticipantId;

use crate::infrastructure::ports::{ChatPort, ImporterPort, PresencePort, SchedulerPort};
use crate::sessions::{DialogueSession, SessionFormatter, SessionRegistry};
use crate::stores::DialogueStore;

const HELP: &[&str] = &[
    "Available commands:",
    "  compile <name>          import a dialogue from source and write its binary",
    "  load <name>             load a dialogue binary into the cache",
    "  unload <name|-ALL>      drop one dialogue (or all) from the cache",
    "  list                    show loaded dialogues",
    "  start <name> [names..]  start a dialogue for yourself and the named participants",
    "  select <number>         answer the choice your dialogue is waiting on",
    "  help                    show this text",
];

pub struct CommandHandler {
    store: Arc<DialogueStore>,
    registry: Arc<SessionRegistry>,
    scheduler: Arc<dyn SchedulerPort>,
    chat: Arc<dyn ChatPort>,
    presence: Arc<dyn PresencePort>,
    formatter: Arc<dyn SessionFormatter>,
    importer: Option<Arc<dyn ImporterPort>>,
}

impl CommandHandler {
    pub fn new(
        store: Arc<DialogueStore>,
        registry: Arc<SessionRegistry>,
        scheduler: Arc<dyn SchedulerPort>,
        chat: Arc<dyn ChatPort>,
        presence: Arc<dyn PresencePort>,
        formatter: Arc<dyn SessionFormatter>,
        importer: Option<Arc<dyn ImporterPort>>,
    ) -> Self {
        Self {
            store,
            registry,
            scheduler,
            chat,
            presence,
            formatter,
            importer,
        }
    }

    /// Parses and runs one command line on behalf of `sender`. The command
    /// word is case-insensitive; arguments are taken as written.
    pub async fn handle(&self, sender: ParticipantId, line: &str) {
        let mut words = line.split_whitespace();
        let command = words.next().map(str::to_lowercase);
        match command.as_deref() {
            None | Some("help") => self.send_help(sender).await,
            Some("compile") => match words.next() {
                Some(name) => self.compile(sender, name).await,
                None => self.reply(sender, "Usage: compile <name>").await,
            },
            Some("load") => match words.next() {
                Some(name) => self.load(sender, name).await,
                None => self.reply(sender, "Usage: load <name>").await,
            },
            Some("unload") => match words.next() {
                Some(token) if token.eq_ignore_ascii_case("-ALL") => {
                    let count = self.store.unload_all().await;
                    self.reply(sender, &format!("Unloaded {count} dialogue(s)"))
                        .await;
                }
                Some(name) => {
                    let message = if self.store.unload(name).await.is_some() {
                        format!("Unloaded dialogue '{name}'")
                    } else {
                        format!("Dialogue '{name}' is not loaded")
                    };
                    self.reply(sender, &message).await;
                }
                None => self.reply(sender, "Usage: unload <name|-ALL>").await,
            },
            Some("list") => self.list(sender).await,
            Some("start") => match words.next() {
                Some(name) => {
                    let others: Vec<&str> = words.collect();
                    self.start(sender, name, &others).await;
                }
                None => {
                    self.reply(sender, "Usage: start <name> [participant...]")
                        .await;
                }
            },
            Some("select") => match words.next().map(str::parse::<i32>) {
                Some(Ok(choice_id)) => self.select(sender, choice_id).await,
                _ => self.reply(sender, "Usage: select <number>").await,
            },
            Some(other) => {
                self.reply(
                    sender,
                    &format!("Unknown command '{other}', try 'help'"),
                )
                .await;
            }
        }
    }

    async fn compile(&self, sender: ParticipantId, name: &str) {
        let Some(importer) = &self.importer else {
            self.reply(sender, "No dialogue importer is configured").await;
            return;
        };
        let dialogue = match importer.import(name).await {
            Ok(dialogue) => dialogue,
            Err(err) => {
                self.reply(sender, &err.to_string()).await;
                return;
            }
        };
        match self.store.save(&dialogue).await {
            Ok(()) => {
                self.reply(sender, &format!("Compiled dialogue '{name}'"))
                    .await;
            }
            Err(err) => self.reply(sender, &err.to_string()).await,
        }
    }

    async fn load(&self, sender: ParticipantId, name: &str) {
        let message = match self.store.get_or_load(name).await {
            Ok(_) => format!("Loaded dialogue '{name}'"),
            Err(err) => err.to_string(),
        };
        self.reply(sender, &message).await;
    }

    async fn list(&self, sender: ParticipantId) {
        let names = self.store.loaded_names().await;
        if names.is_empty() {
            self.reply(sender, "No dialogues loaded").await;
            return;
        }
        self.reply(sender, &format!("Loaded dialogues: {}", names.join(", ")))
            .await;
    }

    async fn start(&self, sender: ParticipantId, name: &str, others: &[&str]) {
        // The invoker is always part of the session, alongside anyone named.
        let mut participants = vec![sender];
        for other in others {
            match self.presence.resolve_name(other) {
                Some(id) => {
                    if participants.contains(&id) {
                        self.reply(sender, &format!("Participant '{other}' entered twice"))
                            .await;
                        return;
                    }
                    participants.push(id);
                }
                None => {
                    self.reply(sender, &format!("Unknown participant '{other}'"))
                        .await;
                    return;
                }
            }
        }

        let dialogue = match self.store.get_or_load(name).await {
            Ok(dialogue) => dialogue,
            Err(err) => {
                self.reply(sender, &err.to_string()).await;
                return;
            }
        };

        let session = match DialogueSession::new(
            dialogue,
            participants,
            self.registry.clone(),
            self.scheduler.clone(),
            self.chat.clone(),
            self.formatter.clone(),
        ) {
            Ok(session) => session,
            Err(err) => {
                self.reply(sender, &err.to_string()).await;
                return;
            }
        };
        if let Err(err) = session.start().await {
            self.reply(sender, &err.to_string()).await;
        }
    }

    async fn select(&self, sender: ParticipantId, choice_id: i32) {
        let Some(session) = self.registry.session_of(sender) else {
            self.reply(sender, "You are not in a dialogue").await;
            return;
        };
        // Invalid or late submissions are silently absorbed by the session.
        session.accept_choice(sender, choice_id).await;
    }

    async fn send_help(&self, sender: ParticipantId) {
        for line in HELP {
            self.reply(sender, line).await;
        }
    }

    async fn reply(&self, to: ParticipantId, message: &str) {
        self.chat.send_message(to, message).await;
    }
}
