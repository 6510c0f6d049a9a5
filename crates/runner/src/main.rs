use anyhow::Context;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rusty_bot_client::config_loader::ConfigLoader;
use rusty_bot_client::session::GroupEvent;
use rusty_bot_client::{
    RetryPolicy, SessionConfig, SessionEvent, SessionHandle, authenticate_with_retry,
    connect_world,
};
use rusty_bot_core::world::{EntityEvent, FriendEvent};

const DEFAULT_CONFIG: &str = "rusty-bot.toml";

#[derive(Debug, Deserialize)]
struct RunnerConfig {
    connection: SessionConfig,
    #[serde(default)]
    retry: RetryPolicy,
    #[serde(default)]
    log_level: Option<String>,
}

fn init_tracing(log_level: Option<&str>) {
    // RUST_LOG wins over the config file.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::Chat(message) => {
            let channel = message.channel.as_deref().unwrap_or("");
            info!(
                kind = ?message.kind,
                channel,
                sender = %message.sender,
                text = %message.text,
                "event.chat"
            );
        }
        SessionEvent::Group(GroupEvent::CommandResult { label, .. }) => {
            info!(%label, "event.group.result");
        }
        SessionEvent::Group(event) => info!(?event, "event.group"),
        SessionEvent::Entity(EntityEvent::Appear {
            guid,
            object_type,
            name,
            ..
        }) => {
            info!(guid, ?object_type, name = name.as_deref().unwrap_or(""), "event.entity.appear");
        }
        SessionEvent::Entity(EntityEvent::Disappear { guid, name, .. }) => {
            info!(guid, name = name.as_deref().unwrap_or(""), "event.entity.disappear");
        }
        SessionEvent::Entity(EntityEvent::Update { guid, changed }) => {
            tracing::debug!(guid, ?changed, "event.entity.update");
        }
        SessionEvent::Friend(FriendEvent::ListReplaced(list)) => {
            info!(count = list.len(), "event.friend.list");
        }
        SessionEvent::Friend(event) => info!(?event, "event.friend"),
        SessionEvent::DecodeError { opcode, message } => {
            warn!(opcode = format_args!("0x{opcode:04x}"), %message, "event.decode_error");
        }
        SessionEvent::NotImplemented(opcode) => {
            info!(opcode = format_args!("0x{opcode:04x}"), "event.not_implemented");
        }
    }
}

async fn pump_events(handle: SessionHandle) {
    let mut events = handle.subscribe();
    loop {
        match events.recv().await {
            Ok(event) => log_event(&event),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "event.lagged"),
            Err(RecvError::Closed) => return,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var("RUSTY_BOT_CONFIG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config: RunnerConfig = ConfigLoader::parse_from_file(&config_path)?;
    init_tracing(config.log_level.as_deref());

    info!(
        host = %config.connection.host,
        account = %config.connection.account,
        character = %config.connection.character,
        "runner.start"
    );
    let auth = authenticate_with_retry(&config.connection, &config.retry)
        .await
        .context("realm authentication failed")?;
    let handle = connect_world(config.connection.clone(), auth)
        .await
        .context("world login failed")?;
    tokio::spawn(pump_events(handle.clone()));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("runner.interrupt");
            handle.close().await;
        }
        _ = handle.closed() => warn!("runner.session_ended"),
    }
    Ok(())
}
