// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram channel adapter for the Tianshu bridge hub.
//!
//! Implements [`ChannelAdapter`] for the Telegram Bot API via teloxide:
//! rendered MarkdownV2 sends with an inline keyboard, and long polling that
//! forwards authorized chat messages to the inbound relay.

pub mod handler;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode, Recipient};
use tianshu_config::model::TelegramConfig;
use tianshu_core::{
    AdapterType, ChannelAdapter, DeliveryTarget, HealthStatus, InboundMessage, MessageId,
    PluginAdapter, TianshuError,
};
use tianshu_render::telegram::{self, InlineButton};
use tianshu_render::{RendererRegistry, TelegramMessage};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Platform name used in delivery targets and chat addresses.
pub const PLATFORM: &str = "telegram";

/// Telegram channel adapter implementing [`ChannelAdapter`].
///
/// Without a bot token the adapter is not configured: sends fail with
/// [`TianshuError::NotConfigured`] and polling never starts.
pub struct TelegramChannel {
    bot: Option<Bot>,
    config: TelegramConfig,
    renderers: RendererRegistry<TelegramMessage>,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Self {
        let bot = config
            .bot_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(Bot::new);
        if bot.is_none() {
            info!("telegram.bot_token not set, adapter disabled");
        }
        Self {
            bot,
            config,
            renderers: telegram::registry(),
        }
    }

    /// Points the bot at another Bot API server.
    pub fn with_api_url(mut self, url: reqwest::Url) -> Self {
        self.bot = self.bot.map(|bot| bot.set_api_url(url));
        self
    }

    fn bot(&self) -> Result<&Bot, TianshuError> {
        self.bot.as_ref().ok_or_else(|| TianshuError::NotConfigured {
            adapter: PLATFORM.to_string(),
        })
    }

    /// Starts long polling, forwarding authorized messages and button presses to `inbound`.
    ///
    /// Returns `None` when the adapter is not configured or polling is
    /// disabled. The task ends once `cancel` fires.
    pub fn start_polling(
        &self,
        inbound: mpsc::Sender<InboundMessage>,
        cancel: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        let bot = self.bot.clone()?;
        if !self.config.poll_inbound {
            info!("Telegram inbound polling disabled");
            return None;
        }
        let allowed: Arc<Vec<String>> = Arc::new(self.config.allowed_users.clone());

        info!("starting Telegram long polling");
        Some(tokio::spawn(async move {
            let messages = {
                let (tx, allowed) = (inbound.clone(), allowed.clone());
                Update::filter_message().endpoint(move |msg: Message| {
                    let (tx, allowed) = (tx.clone(), allowed.clone());
                    async move {
                        if !handler::is_authorized(msg.from.as_ref(), &allowed) {
                            debug!(chat_id = msg.chat.id.0, "ignoring unauthorized user");
                            return respond(());
                        }
                        match handler::to_inbound_message(&msg) {
                            Some(inbound) => forward(&tx, inbound).await,
                            None => debug!(msg_id = msg.id.0, "ignoring message without text"),
                        }
                        respond(())
                    }
                })
            };
            let callbacks = Update::filter_callback_query().endpoint(move |bot: Bot, query: CallbackQuery| {
                let (tx, allowed) = (inbound.clone(), allowed.clone());
                async move {
                    if let Err(e) = bot.answer_callback_query(query.id.clone()).await {
                        debug!(error = %e, "failed to answer callback query");
                    }
                    if !handler::is_authorized(Some(&query.from), &allowed) {
                        debug!(user_id = query.from.id.0, "ignoring unauthorized button press");
                        return respond(());
                    }
                    if let Some(inbound) = handler::callback_to_inbound(&query) {
                        forward(&tx, inbound).await;
                    }
                    respond(())
                }
            });

            let mut dispatcher = Dispatcher::builder(bot, dptree::entry().branch(messages).branch(callbacks))
                .default_handler(|_| async {})
                .build();
            let shutdown = dispatcher.shutdown_token();
            tokio::spawn(async move {
                cancel.cancelled().await;
                if let Ok(stopping) = shutdown.shutdown() {
                    stopping.await;
                }
            });
            dispatcher.dispatch().await;
            info!("Telegram long polling stopped");
        }))
    }

    async fn send_rendered(&self, chat_id: &str, message: &TelegramMessage) -> Result<MessageId, TianshuError> {
        let bot = self.bot()?;
        let recipient = recipient(chat_id)?;
        let keyboard = (!message.buttons.is_empty()).then(|| inline_keyboard(&message.buttons));

        let mut request = bot
            .send_message(recipient.clone(), &message.text)
            .parse_mode(ParseMode::MarkdownV2);
        if let Some(markup) = keyboard.clone() {
            request = request.reply_markup(markup);
        }
        let sent = match request.await {
            Ok(sent) => sent,
            Err(e) => {
                warn!(chat_id, error = %e, "MarkdownV2 failed, sending as plain text");
                let mut plain = bot.send_message(recipient, &message.plain);
                if let Some(markup) = keyboard {
                    plain = plain.reply_markup(markup);
                }
                plain.await.map_err(|e| TianshuError::Channel {
                    message: format!("failed to send Telegram message: {e}"),
                    source: Some(Box::new(e)),
                })?
            }
        };
        Ok(MessageId(sent.id.0.to_string()))
    }
}

async fn forward(tx: &mpsc::Sender<InboundMessage>, inbound: InboundMessage) {
    if tx.send(inbound).await.is_err() {
        warn!("inbound channel closed, dropping Telegram message");
    }
}

/// Numeric ids address chats directly; anything else is taken as a public `@username`.
fn recipient(chat_id: &str) -> Result<Recipient, TianshuError> {
    let chat_id = chat_id.trim();
    if chat_id.is_empty() {
        return Err(TianshuError::channel("empty Telegram chat id"));
    }
    Ok(match chat_id.parse::<i64>() {
        Ok(id) => Recipient::Id(ChatId(id)),
        Err(_) if chat_id.starts_with('@') => Recipient::ChannelUsername(chat_id.to_string()),
        Err(_) => Recipient::ChannelUsername(format!("@{chat_id}")),
    })
}

fn inline_keyboard(rows: &[Vec<InlineButton>]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(rows.iter().map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.text.clone(), b.callback_data.clone()))
            .collect::<Vec<_>>()
    }))
}

#[async_trait]
impl PluginAdapter for TelegramChannel {
    fn name(&self) -> &str {
        PLATFORM
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, TianshuError> {
        let Some(bot) = &self.bot else {
            return Ok(HealthStatus::Unhealthy("not configured".into()));
        };
        match bot.get_me().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!("Telegram bot unreachable: {e}"))),
        }
    }

    async fn shutdown(&self) -> Result<(), TianshuError> {
        debug!("Telegram channel shutting down");
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for TelegramChannel {
    fn platform(&self) -> &str {
        PLATFORM
    }

    fn is_configured(&self) -> bool {
        self.bot.is_some()
    }

    async fn send_text(&self, chat_id: &str, text: &str) -> Result<MessageId, TianshuError> {
        let sent = self
            .bot()?
            .send_message(recipient(chat_id)?, text)
            .await
            .map_err(|e| TianshuError::Channel {
                message: format!("failed to send Telegram message: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(MessageId(sent.id.0.to_string()))
    }

    async fn deliver(
        &self,
        target: &DeliveryTarget,
        semantic_type: &str,
        payload: &Value,
    ) -> Result<MessageId, TianshuError> {
        let message = self.renderers.render(semantic_type, payload);
        self.send_rendered(&target.receive_id, &message).await
    }
}
