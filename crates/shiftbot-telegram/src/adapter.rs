//! Telegram channel adapter.
//!
//! Wraps a teloxide `Bot` + `Dispatcher` and drives either the long-polling
//! loop or an axum webhook listener until Ctrl+C.

use std::net::SocketAddr;
use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use tracing::info;

use shiftbot_core::config::{TelegramConfig, UpdateMode};

use crate::context::BotContext;
use crate::error::TelegramError;
use crate::handler;

/// Telegram channel adapter.
pub struct TelegramAdapter {
    bot: Bot,
    ctx: Arc<BotContext>,
    config: TelegramConfig,
}

impl TelegramAdapter {
    pub fn new(config: &TelegramConfig, ctx: Arc<BotContext>) -> Result<Self, TelegramError> {
        if config.bot_token.is_empty() {
            return Err(TelegramError::NoToken);
        }
        Ok(Self {
            bot: Bot::new(&config.bot_token),
            ctx,
            config: config.clone(),
        })
    }

    /// Bot handle for collaborators that send on their own (the dispatch transport).
    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    /// Drive the dispatcher. Returns after Ctrl+C once in-flight handlers finish.
    pub async fn run(self) -> Result<(), TelegramError> {
        let mut dispatcher = Dispatcher::builder(self.bot.clone(), handler::schema())
            .dependencies(dptree::deps![Arc::clone(&self.ctx)])
            .default_handler(|_upd| async {})
            .enable_ctrlc_handler()
            .build();

        match self.config.mode {
            UpdateMode::Polling => {
                info!("Telegram: starting long-polling dispatcher");
                dispatcher.dispatch().await;
            }
            UpdateMode::Webhook => {
                let url = self
                    .config
                    .webhook_url
                    .as_deref()
                    .ok_or(TelegramError::MissingWebhookUrl)?;
                let url = reqwest::Url::parse(url)
                    .map_err(|e| TelegramError::InvalidWebhookUrl(e.to_string()))?;
                let addr = SocketAddr::from(([0, 0, 0, 0], self.config.listen_port));

                info!(%addr, %url, "Telegram: starting webhook listener");
                let listener =
                    webhooks::axum(self.bot.clone(), webhooks::Options::new(addr, url)).await?;
                dispatcher
                    .dispatch_with_listener(
                        listener,
                        LoggingErrorHandler::with_custom_text("webhook update listener error"),
                    )
                    .await;
            }
        }

        info!("Telegram: dispatcher stopped");
        Ok(())
    }
}
