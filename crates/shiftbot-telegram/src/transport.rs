//! Document delivery over the Bot API.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::InputFile;
use tracing::debug;

use shiftbot_core::delivery::{DeliveryMeta, Document, Transport};
use shiftbot_core::error::DeliveryError;
use shiftbot_core::types::Destination;

/// Telegram caption limit.
const CAPTION_MAX: usize = 1024;

/// [`Transport`] that uploads the rendered document with `sendDocument`.
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn deliver(
        &self,
        destination: Destination,
        document: &Document,
        meta: &DeliveryMeta,
    ) -> Result<(), DeliveryError> {
        send_document(&self.bot, ChatId(destination.get()), document, &meta.caption)
            .await
            .map(|_| ())
            .map_err(|e| DeliveryError::Failed {
                destination,
                reason: e.to_string(),
            })
    }
}

/// Upload `document` to `chat_id` under its display name.
pub async fn send_document(
    bot: &Bot,
    chat_id: ChatId,
    document: &Document,
    caption: &str,
) -> Result<Message, teloxide::RequestError> {
    debug!(chat_id = chat_id.0, path = %document.path.display(), "telegram: uploading document");
    let file = InputFile::file(document.path.clone()).file_name(document.file_name.clone());
    bot.send_document(chat_id, file)
        .caption(truncate_caption(caption))
        .await
}

/// Cut `caption` to Telegram's limit on a char boundary.
fn truncate_caption(caption: &str) -> String {
    if caption.chars().count() <= CAPTION_MAX {
        return caption.to_string();
    }
    caption.chars().take(CAPTION_MAX).collect()
}
