use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use poise::serenity_prelude::{ChannelId, CreateMessage, Http};
use tracing::Instrument;

/// the transient notification region.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str);
}

/// used when no notification channel is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str) {
        tracing::warn!(message = %message, "notification");
    }
}

/// posts into a channel, then deletes the message once `linger` has passed.
#[derive(Clone)]
pub struct ChannelNotifier {
    http: Arc<Http>,
    channel_id: ChannelId,
    linger: Duration,
}

impl ChannelNotifier {
    pub fn new(http: Arc<Http>, channel_id: ChannelId, linger: Duration) -> Self {
        ChannelNotifier {
            http,
            channel_id,
            linger,
        }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    #[tracing::instrument(skip_all, fields(channel_id = %self.channel_id))]
    async fn notify(&self, message: &str) {
        let msg = match self
            .channel_id
            .send_message(self.http.as_ref(), CreateMessage::new().content(message))
            .await
        {
            Ok(msg) => msg,
            Err(e) => {
                tracing::error!(err = ?e, "an error occurred when sending notification");
                return;
            }
        };

        let http = self.http.clone();
        let linger = self.linger;

        tokio::spawn(
            async move {
                tokio::time::sleep(linger).await;

                if let Err(e) = msg.delete(http.as_ref()).await {
                    tracing::warn!(err = ?e, "an error occurred when deleting notification");
                }
            }
            .in_current_span(),
        );
    }
}
