//! Console host for the dialogue engine.
//!
//! Runs the full runtime against a single local participant: chat output
//! goes to stdout, commands come from stdin. Useful for exercising compiled
//! dialogue binaries without a real host integration.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dialogues_domain::ParticipantId;
use dialogues_engine::commands::CommandHandler;
use dialogues_engine::infrastructure::ports::{ChatPort, PresencePort};
use dialogues_engine::infrastructure::scheduler::TokioScheduler;
use dialogues_engine::sessions::{PrefixFormatter, SessionRegistry};
use dialogues_engine::stores::DialogueStore;

/// The one participant a console run has.
struct ConsoleHost {
    name: String,
    participant: ParticipantId,
}

#[async_trait]
impl ChatPort for ConsoleHost {
    async fn send_message(&self, _to: ParticipantId, message: &str) {
        println!("{message}");
    }

    async fn send_clickable(&self, _to: ParticipantId, message: &str, command: &str) {
        // No clickable text on a terminal; show the command to type instead.
        println!("{message}   [{command}]");
    }
}

impl PresencePort for ConsoleHost {
    fn resolve_name(&self, name: &str) -> Option<ParticipantId> {
        (name == self.name).then_some(self.participant)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dialogues_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let data_dir = std::env::var("DIALOGUES_DATA_DIR").unwrap_or_else(|_| "./dialogues".into());
    let tick_ms: u64 = std::env::var("DIALOGUES_TICK_MS")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(50);

    tracing::info!(%data_dir, tick_ms, "starting dialogue console");

    let host = Arc::new(ConsoleHost {
        name: "console".to_string(),
        participant: ParticipantId::new(),
    });
    let handler = CommandHandler::new(
        Arc::new(DialogueStore::new(data_dir.as_str())),
        SessionRegistry::new(),
        Arc::new(TokioScheduler::new(Duration::from_millis(tick_ms))),
        host.clone(),
        host.clone(),
        Arc::new(PrefixFormatter),
        None,
    );

    println!("Dialogue console ready, 'help' lists commands, 'quit' exits.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed == "quit" || trimmed == "exit" {
            break;
        }
        handler.handle(host.participant, trimmed).await;
    }

    Ok(())
}
