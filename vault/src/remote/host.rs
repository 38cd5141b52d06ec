use async_trait::async_trait;

use crate::error::Result;
use crate::remote::types::{
    BanEntry, CreateChannelRequest, CreateRoleRequest, CreateThreadRequest, GuildInfo, GuildPatch,
    LiveChannel, LiveEmoji, LiveMember, LiveMessage, LiveRole, LiveThread, OverwriteRecord,
    RelayMessage, WebhookInfo,
};

/// The single capability boundary to the remote guild service.
///
/// Every remote mutation and fetch the capture and restore paths need is
/// named here once; the HTTP binding implements it against the live
/// service and tests implement it in memory. All client variance lives
/// behind this trait — nothing elsewhere probes what kind of client is
/// configured.
#[async_trait]
pub trait GuildHost: Send + Sync {
    // ── Guild ───────────────────────────────────────────────────
    async fn fetch_guild(&self) -> Result<GuildInfo>;
    async fn edit_guild(&self, patch: &GuildPatch) -> Result<()>;

    // ── Roles ───────────────────────────────────────────────────
    /// Roles in position order, highest first.
    async fn list_roles(&self) -> Result<Vec<LiveRole>>;
    async fn create_role(&self, req: &CreateRoleRequest) -> Result<LiveRole>;
    async fn edit_role(&self, role_id: &str, req: &CreateRoleRequest) -> Result<()>;
    async fn delete_role(&self, role_id: &str) -> Result<()>;

    // ── Channels & threads ──────────────────────────────────────
    async fn list_channels(&self) -> Result<Vec<LiveChannel>>;
    async fn create_channel(&self, req: &CreateChannelRequest) -> Result<LiveChannel>;
    async fn delete_channel(&self, channel_id: &str) -> Result<()>;
    /// Replace the channel's overwrites with the given batch, discarding
    /// any defaults the service attached on creation.
    async fn replace_overwrites(
        &self,
        channel_id: &str,
        overwrites: &[OverwriteRecord],
    ) -> Result<()>;
    async fn list_threads(&self, channel_id: &str) -> Result<Vec<LiveThread>>;
    async fn create_thread(
        &self,
        channel_id: &str,
        req: &CreateThreadRequest,
    ) -> Result<LiveThread>;

    // ── Relay endpoints (webhooks) ──────────────────────────────
    async fn list_channel_webhooks(&self, channel_id: &str) -> Result<Vec<WebhookInfo>>;
    async fn list_guild_webhooks(&self) -> Result<Vec<WebhookInfo>>;
    async fn create_webhook(
        &self,
        channel_id: &str,
        name: &str,
        avatar_url: Option<&str>,
    ) -> Result<WebhookInfo>;
    async fn delete_webhook(&self, webhook_id: &str) -> Result<()>;
    /// Send through a relay endpoint; returns the new message's id.
    async fn execute_webhook(&self, webhook: &WebhookInfo, message: &RelayMessage)
    -> Result<String>;

    // ── Messages ────────────────────────────────────────────────
    /// Newest-first page of history, optionally before a message id.
    async fn fetch_messages(
        &self,
        channel_id: &str,
        limit: usize,
        before: Option<&str>,
    ) -> Result<Vec<LiveMessage>>;
    async fn pin_message(&self, channel_id: &str, message_id: &str) -> Result<()>;

    // ── Bans ────────────────────────────────────────────────────
    async fn list_bans(&self) -> Result<Vec<BanEntry>>;
    async fn create_ban(&self, user_id: &str, reason: Option<&str>) -> Result<()>;
    async fn remove_ban(&self, user_id: &str) -> Result<()>;

    // ── Emoji ───────────────────────────────────────────────────
    async fn list_emojis(&self) -> Result<Vec<LiveEmoji>>;
    /// `image` is a URL or data URI payload.
    async fn create_emoji(&self, name: &str, image: &str) -> Result<LiveEmoji>;
    async fn delete_emoji(&self, emoji_id: &str) -> Result<()>;

    // ── Members (capture only) ──────────────────────────────────
    async fn list_members(&self) -> Result<Vec<LiveMember>>;

    // ── Blobs ───────────────────────────────────────────────────
    /// Fetch an attachment or image by URL into bytes.
    async fn download_blob(&self, url: &str) -> Result<Vec<u8>>;
}
