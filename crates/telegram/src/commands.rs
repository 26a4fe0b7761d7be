use std::sync::Arc;

use teloxide::{dispatching::UpdateHandler, prelude::*, utils::command::BotCommands};
use tracing::{info, warn};

use common::{ActionResult, ActionStatus, StatusReport, TradingMode};
use engine::SupervisorHandle;

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Dependencies injected into every handler via `dptree`.
#[derive(Clone)]
pub struct BotDeps {
    pub supervisor: SupervisorHandle,
    pub trading_mode: TradingMode,
    /// Only commands from this chat are obeyed.
    pub chat_id: i64,
}

/// Telegram bot commands exposed to the operator.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Candlewatch commands:")]
pub enum Command {
    #[command(description = "Start the monitoring loop")]
    Start,
    #[command(description = "Stop the monitoring loop")]
    Stop,
    #[command(description = "Show bot status")]
    Status,
}

/// Start the Telegram bot in long-polling mode.
pub async fn start_bot(token: String, deps: BotDeps) {
    let bot = Bot::new(token);
    let deps = Arc::new(deps);

    info!(chat_id = deps.chat_id, "Telegram bot starting (long-polling)");

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![deps])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync>> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Start].endpoint(handle_start))
        .branch(case![Command::Stop].endpoint(handle_stop))
        .branch(case![Command::Status].endpoint(handle_status));

    Update::filter_message()
        .filter(|msg: Message, deps: Arc<BotDeps>| authorized(msg.chat.id.0, deps.chat_id))
        .branch(command_handler)
}

fn authorized(chat_id: i64, allowed: i64) -> bool {
    if chat_id != allowed {
        warn!(chat_id, "Unauthorized Telegram access attempt");
        return false;
    }
    true
}

async fn handle_start(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let result = deps.supervisor.start().await;
    bot.send_message(msg.chat.id, format_action(&result)).await?;
    Ok(())
}

async fn handle_stop(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let result = deps.supervisor.stop().await;
    bot.send_message(msg.chat.id, format_action(&result)).await?;
    Ok(())
}

async fn handle_status(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let report = deps.supervisor.status().await;
    bot.send_message(msg.chat.id, format_status(&report, deps.trading_mode))
        .await?;
    Ok(())
}

fn format_action(result: &ActionResult) -> String {
    match result.status {
        ActionStatus::Success => format!("✅ {}", result.message),
        ActionStatus::Warning => format!("⚠️ {}", result.message),
    }
}

fn format_status(report: &StatusReport, mode: TradingMode) -> String {
    let running = if report.running { "Running" } else { "Stopped" };
    format!(
        "Candlewatch Status\n\
         Bot: {running}\n\
         Symbol: {}\n\
         Mode: {mode}",
        report.symbol
    )
}

#[cfg(test)]
mod tests {
    use common::EngineState;

    use super::*;

    #[test]
    fn only_the_configured_chat_is_authorized() {
        assert!(authorized(42, 42));
        assert!(!authorized(7, 42));
    }

    #[test]
    fn action_replies_carry_status_marker() {
        assert_eq!(
            format_action(&ActionResult::success("Bot started successfully.")),
            "✅ Bot started successfully."
        );
        assert!(format_action(&ActionResult::warning("Bot is already running!")).starts_with("⚠️"));
    }

    #[test]
    fn status_reply_names_symbol_and_mode() {
        let report = StatusReport {
            running: true,
            symbol: "BTCUSDT".into(),
            state: EngineState::Running,
        };
        let text = format_status(&report, TradingMode::Paper);
        assert!(text.contains("Bot: Running"));
        assert!(text.contains("Symbol: BTCUSDT"));
        assert!(text.contains(&TradingMode::Paper.to_string()));
    }
}
