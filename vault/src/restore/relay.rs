use base64::{Engine as _, engine::general_purpose::STANDARD};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::remote::host::GuildHost;
use crate::remote::types::{
    AllowedMentionPolicy, AttachmentPayload, LiveChannel, RelayMessage, WebhookInfo,
};
use crate::restore::OutcomeCounts;
use crate::snapshot::models::{ImageRef, MessageSeed};

/// Name of the delegated-identity endpoint the relay creates and reuses.
pub const RELAY_ENDPOINT_NAME: &str = "guildvault-relay";

/// Replays a bounded slice of chronological history into a channel or
/// thread, displaying each message under its original author's name and
/// avatar. One endpoint per channel, reused across that channel's
/// threads; if no endpoint can be acquired the channel's replay is
/// skipped entirely rather than sent under the restoring identity.
pub struct MessageRelay<'a> {
    host: &'a dyn GuildHost,
    max_messages: usize,
    allowed_mentions: AllowedMentionPolicy,
    cancel: &'a CancellationToken,
}

impl<'a> MessageRelay<'a> {
    pub fn new(
        host: &'a dyn GuildHost,
        max_messages: usize,
        allowed_mentions: AllowedMentionPolicy,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            host,
            max_messages,
            allowed_mentions,
            cancel,
        }
    }

    /// Find or create the relay endpoint for a channel. Bounded to one
    /// creation attempt; `None` means replay must be skipped.
    pub async fn acquire(&self, channel: &LiveChannel) -> Option<WebhookInfo> {
        if !channel.kind.supports_relay() {
            return None;
        }
        match self.host.list_channel_webhooks(&channel.id).await {
            Ok(hooks) => {
                if let Some(existing) = hooks.into_iter().find(|w| w.name == RELAY_ENDPOINT_NAME) {
                    return Some(existing);
                }
            }
            Err(e) => {
                warn!(channel = %channel.name, error = %e, "could not list relay endpoints");
            }
        }
        match self
            .host
            .create_webhook(&channel.id, RELAY_ENDPOINT_NAME, None)
            .await
        {
            Ok(hook) => Some(hook),
            Err(e) => {
                warn!(channel = %channel.name, error = %e, "could not create relay endpoint, skipping history");
                None
            }
        }
    }

    /// Select what actually gets replayed: drop messages that carry
    /// nothing, reverse the captured newest-first order to chronological,
    /// and keep only the most recent `max_messages` — the tail of the
    /// chronological slice.
    pub fn prepare<'m>(&self, messages: &'m [MessageSeed]) -> Vec<&'m MessageSeed> {
        let mut chronological: Vec<&MessageSeed> =
            messages.iter().filter(|m| !m.is_empty()).rev().collect();
        if chronological.len() > self.max_messages {
            chronological.drain(..chronological.len() - self.max_messages);
        }
        chronological
    }

    /// Replay one target's history through an already-acquired endpoint.
    /// Sends are strictly sequential; a send failure aborts the rest of
    /// this target only, counting the undelivered remainder as failed.
    pub async fn replay(
        &self,
        webhook: &WebhookInfo,
        thread_id: Option<&str>,
        messages: &[MessageSeed],
    ) -> OutcomeCounts {
        let mut tally = OutcomeCounts::default();
        let prepared = self.prepare(messages);
        let pin_target = thread_id.unwrap_or(&webhook.channel_id);

        let mut remaining = prepared.len();
        for msg in prepared {
            if self.cancel.is_cancelled() {
                break;
            }
            let relay_message = RelayMessage {
                author_name: msg.author_name.clone(),
                author_avatar: msg.author_avatar.clone(),
                content: (!msg.content.is_empty()).then(|| msg.content.clone()),
                embeds: msg.embeds.clone(),
                attachment: self.fetch_attachment(msg).await,
                thread_id: thread_id.map(str::to_string),
                allowed_mentions: self.allowed_mentions,
            };
            match self.host.execute_webhook(webhook, &relay_message).await {
                Ok(sent_id) => {
                    tally.succeed();
                    remaining -= 1;
                    if msg.pinned
                        && let Err(e) = self.host.pin_message(pin_target, &sent_id).await
                    {
                        warn!(target = %pin_target, error = %e, "could not pin replayed message");
                    }
                }
                Err(e) => {
                    warn!(target = %pin_target, error = %e, "relay send failed, aborting this target");
                    tally.failed += remaining;
                    break;
                }
            }
        }
        tally
    }

    /// Fetch a message's single attachment into a sendable payload.
    /// Failure degrades to sending the message without it.
    async fn fetch_attachment(&self, msg: &MessageSeed) -> Option<AttachmentPayload> {
        let attachment = msg.attachment.as_ref()?;
        let data = match &attachment.source {
            ImageRef::Url(url) => match self.host.download_blob(url).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(url = %url, error = %e, "attachment fetch failed, sending without it");
                    return None;
                }
            },
            ImageRef::Inline(b64) => match STANDARD.decode(b64) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(error = %e, "inlined attachment is not valid base64, sending without it");
                    return None;
                }
            },
        };
        debug!(name = %attachment.name, bytes = data.len(), "attachment ready");
        Some(AttachmentPayload {
            name: attachment.name.clone(),
            data,
        })
    }
}
