//! bot.rs: chat commands and the Telegram receive loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::settings::ScheduleSettings;
use crate::notify::{format, Destination, TelegramClient};
use crate::pipeline::Pipeline;
use crate::scheduler::Scheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Subscribe this chat to scheduled runs.
    Start,
    /// Run the on-demand pipeline once.
    Latest,
    Help,
}

/// Parse `/cmd`, `/cmd@SomeBot` and `/cmd args`. Anything else is not a command.
pub fn parse_command(text: &str) -> Option<Command> {
    let first = text.split_whitespace().next()?;
    let cmd = first.strip_prefix('/')?;
    let cmd = cmd.split('@').next().unwrap_or_default();
    match cmd.to_ascii_lowercase().as_str() {
        "start" => Some(Command::Start),
        "latest" => Some(Command::Latest),
        "help" => Some(Command::Help),
        _ => None,
    }
}

pub struct Bot {
    pipeline: Arc<Pipeline>,
    scheduler: Arc<Scheduler>,
    schedule: ScheduleSettings,
}

impl Bot {
    pub fn new(pipeline: Arc<Pipeline>, scheduler: Arc<Scheduler>, schedule: ScheduleSettings) -> Self {
        Self {
            pipeline,
            scheduler,
            schedule,
        }
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Execute a command and return the reply to send back.
    pub async fn handle(&self, dest: Destination, cmd: Command) -> String {
        match cmd {
            Command::Start => {
                self.scheduler
                    .activate(dest, self.schedule.interval(), self.schedule.initial_delay());
                format::activated_message(self.schedule.interval_secs)
            }
            Command::Latest => {
                // Own task: a panic inside the run becomes an error reply, not a dead bot.
                let p = self.pipeline.clone();
                match tokio::spawn(async move { p.on_demand(dest).await }).await {
                    Ok(reply) => reply,
                    Err(e) => {
                        tracing::error!(dest = %dest, error = %e, "on-demand run failed");
                        format::FETCH_ERROR.to_string()
                    }
                }
            }
            Command::Help => format::HELP.to_string(),
        }
    }

    /// Handle a raw incoming message and send the reply through the pipeline's transport.
    pub async fn on_message(&self, dest: Destination, text: &str) {
        let Some(cmd) = parse_command(text) else {
            return;
        };
        tracing::info!(dest = %dest, command = ?cmd, "command received");
        let reply = self.handle(dest, cmd).await;
        if let Err(e) = self.pipeline.transport().deliver(dest, &reply).await {
            tracing::warn!(dest = %dest, error = ?e, "reply not delivered");
        }
    }
}

/// Long-poll Telegram for commands. Each message is handled in its own task so a
/// slow `/latest` never blocks other chats.
pub fn spawn_polling(bot: Arc<Bot>, client: TelegramClient) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut offset: Option<i64> = None;
        tracing::info!("telegram polling started");
        loop {
            match client.get_updates(offset).await {
                Ok(updates) => {
                    for up in updates {
                        offset = Some(offset.map_or(up.update_id + 1, |o| o.max(up.update_id + 1)));
                        let Some(msg) = up.message else { continue };
                        let Some(text) = msg.text else { continue };
                        let bot = bot.clone();
                        tokio::spawn(async move {
                            bot.on_message(Destination(msg.chat.id), &text).await;
                        });
                    }
                }
                Err(e) => {
                    tracing::warn!(error = ?e, "telegram polling failed, backing off");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("/start"), Some(Command::Start));
        assert_eq!(parse_command("/latest@BtcNewsBot"), Some(Command::Latest));
        assert_eq!(parse_command("  /LATEST now"), Some(Command::Latest));
        assert_eq!(parse_command("/help"), Some(Command::Help));
    }

    #[test]
    fn ignores_non_commands() {
        assert_eq!(parse_command("hello"), None);
        assert_eq!(parse_command("/stop"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("start"), None);
    }
}
