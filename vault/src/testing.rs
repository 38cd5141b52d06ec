//! In-memory [`GuildHost`] double for tests.
//!
//! Holds a whole fake guild behind the same capability boundary the HTTP
//! binding implements, with failure injection for the scenarios the
//! restore path must absorb: protected roles, denied relay endpoints,
//! mid-replay send faults.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use crate::error::{Error, Result};
use crate::remote::host::GuildHost;
use crate::remote::types::{
    BanEntry, ChannelKind, CreateChannelRequest, CreateRoleRequest, CreateThreadRequest, GuildInfo,
    GuildPatch, LiveChannel, LiveEmoji, LiveMember, LiveMessage, LiveOverwrite, LiveRole,
    LiveThread, OverwriteRecord, RelayMessage, RemoteAttachment, WebhookInfo,
};

/// A message that went through a relay endpoint, with the identity
/// override it carried.
#[derive(Debug, Clone)]
pub struct SentRecord {
    pub id: String,
    pub webhook_id: String,
    /// Channel or thread the message landed in.
    pub target_id: String,
    pub author_name: String,
    pub author_avatar: Option<String>,
    pub content: Option<String>,
    pub embeds: Vec<serde_json::Value>,
    pub attachment_name: Option<String>,
    pub pinned: bool,
}

pub struct MemoryHost {
    guild: Mutex<GuildInfo>,
    roles: Mutex<Vec<LiveRole>>,
    channels: Mutex<Vec<LiveChannel>>,
    threads: DashMap<String, Vec<LiveThread>>,
    webhooks: Mutex<Vec<WebhookInfo>>,
    /// Per-target history, oldest first.
    messages: DashMap<String, Vec<LiveMessage>>,
    bans: Mutex<Vec<BanEntry>>,
    emojis: Mutex<Vec<LiveEmoji>>,
    members: Mutex<Vec<LiveMember>>,
    blobs: DashMap<String, Vec<u8>>,
    sent: Mutex<Vec<SentRecord>>,
    next_id: AtomicU64,

    // Failure injection.
    protected_roles: Mutex<HashSet<String>>,
    webhook_creation_denied: AtomicBool,
    guild_access_denied: AtomicBool,
    fail_send_at: Mutex<HashMap<String, usize>>,
    send_attempts: Mutex<HashMap<String, usize>>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        Self {
            guild: Mutex::new(GuildInfo {
                id: "g1".into(),
                name: "Fresh Guild".into(),
                icon_url: None,
                splash_url: None,
                banner_url: None,
                premium_tier: 0,
                features: vec![],
                verification_level: 0,
                explicit_content_filter: 0,
                default_notifications: 0,
                afk_channel_id: None,
                afk_timeout_secs: 300,
                widget_enabled: false,
                widget_channel_id: None,
                system_channel_id: None,
            }),
            roles: Mutex::new(Vec::new()),
            channels: Mutex::new(Vec::new()),
            threads: DashMap::new(),
            webhooks: Mutex::new(Vec::new()),
            messages: DashMap::new(),
            bans: Mutex::new(Vec::new()),
            emojis: Mutex::new(Vec::new()),
            members: Mutex::new(Vec::new()),
            blobs: DashMap::new(),
            sent: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            protected_roles: Mutex::new(HashSet::new()),
            webhook_creation_denied: AtomicBool::new(false),
            guild_access_denied: AtomicBool::new(false),
            fail_send_at: Mutex::new(HashMap::new()),
            send_attempts: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_feature(self, feature: &str) -> Self {
        self.guild.lock().unwrap().features.push(feature.to_string());
        self
    }

    pub fn with_tier(self, premium_tier: u8) -> Self {
        self.guild.lock().unwrap().premium_tier = premium_tier;
        self
    }

    fn next(&self, prefix: &str) -> String {
        format!("{prefix}{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    // ── Seeding ─────────────────────────────────────────────────

    pub fn guild_mut(&self) -> std::sync::MutexGuard<'_, GuildInfo> {
        self.guild.lock().unwrap()
    }

    /// Seed a role with insert-at-bottom position semantics: the newest
    /// non-default role sits just above the default role.
    pub fn add_role(&self, name: &str, is_default: bool) -> LiveRole {
        let mut roles = self.roles.lock().unwrap();
        let position = if is_default {
            0
        } else {
            for role in roles.iter_mut() {
                if !role.is_default {
                    role.position += 1;
                }
            }
            1
        };
        let role = LiveRole {
            id: self.next("r"),
            name: name.into(),
            color: 0,
            hoist: false,
            permissions: "0".into(),
            mentionable: false,
            position,
            managed: false,
            is_default,
        };
        roles.push(role.clone());
        role
    }

    pub fn add_channel(&self, name: &str, kind: ChannelKind) -> LiveChannel {
        self.insert_channel(name, kind, None)
    }

    pub fn add_child_channel(&self, name: &str, kind: ChannelKind, parent_id: &str) -> LiveChannel {
        self.insert_channel(name, kind, Some(parent_id.to_string()))
    }

    fn insert_channel(
        &self,
        name: &str,
        kind: ChannelKind,
        parent_id: Option<String>,
    ) -> LiveChannel {
        let channel = LiveChannel {
            id: self.next("c"),
            kind,
            name: name.into(),
            parent_id,
            nsfw: false,
            slowmode_secs: 0,
            topic: None,
            bitrate: None,
            user_limit: None,
            overwrites: vec![],
        };
        self.channels.lock().unwrap().push(channel.clone());
        channel
    }

    /// Swap in a modified copy of an existing channel (matched by id).
    pub fn replace_channel(&self, channel: LiveChannel) {
        let mut channels = self.channels.lock().unwrap();
        if let Some(slot) = channels.iter_mut().find(|c| c.id == channel.id) {
            *slot = channel;
        }
    }

    pub fn add_webhook(&self, channel_id: &str, name: &str) -> WebhookInfo {
        let webhook = WebhookInfo {
            id: self.next("w"),
            name: name.into(),
            channel_id: channel_id.into(),
            token: Some(self.next("tok")),
        };
        self.webhooks.lock().unwrap().push(webhook.clone());
        webhook
    }

    pub fn add_emoji(&self, name: &str) -> LiveEmoji {
        let emoji = LiveEmoji {
            id: self.next("e"),
            name: name.into(),
            image_url: format!("https://cdn.example/emoji/{name}.png"),
        };
        self.emojis.lock().unwrap().push(emoji.clone());
        emoji
    }

    pub fn add_ban(&self, user_id: &str, reason: Option<&str>) {
        self.bans.lock().unwrap().push(BanEntry {
            user_id: user_id.into(),
            reason: reason.map(str::to_string),
        });
    }

    pub fn add_member(&self, id: &str, display_name: &str) {
        self.members.lock().unwrap().push(LiveMember {
            id: id.into(),
            display_name: display_name.into(),
            tag: "0001".into(),
            avatar_url: None,
            joined_at: Some(Utc::now()),
            role_ids: vec![],
            bot: false,
        });
    }

    pub fn add_blob(&self, url: &str, bytes: Vec<u8>) {
        self.blobs.insert(url.to_string(), bytes);
    }

    /// Append a message to a target's history (each call is newer than
    /// the last).
    pub fn seed_message(&self, target_id: &str, content: &str, pinned: bool) -> String {
        let id = self.next("m");
        self.messages
            .entry(target_id.to_string())
            .or_default()
            .push(LiveMessage {
                id: id.clone(),
                author_name: "seeder".into(),
                author_avatar: None,
                content: content.into(),
                embeds: vec![],
                attachments: vec![],
                pinned,
                sent_at: Utc::now(),
            });
        id
    }

    // ── Failure injection ───────────────────────────────────────

    /// Deleting this role will fail, as for service-managed roles.
    pub fn protect_role(&self, role_id: &str) {
        self.protected_roles
            .lock()
            .unwrap()
            .insert(role_id.to_string());
    }

    pub fn deny_webhook_creation(&self) {
        self.webhook_creation_denied.store(true, Ordering::Relaxed);
    }

    /// All guild fetches fail, as when the token lacks access.
    pub fn deny_guild_access(&self) {
        self.guild_access_denied.store(true, Ordering::Relaxed);
    }

    /// The `index`-th send (0-based) into `target_id` will fail.
    pub fn fail_send_at(&self, target_id: &str, index: usize) {
        self.fail_send_at
            .lock()
            .unwrap()
            .insert(target_id.to_string(), index);
    }

    // ── Inspection ──────────────────────────────────────────────

    pub fn roles(&self) -> Vec<LiveRole> {
        self.roles.lock().unwrap().clone()
    }

    pub fn channels(&self) -> Vec<LiveChannel> {
        self.channels.lock().unwrap().clone()
    }

    pub fn channel_named(&self, name: &str) -> Option<LiveChannel> {
        self.channels
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.name == name)
            .cloned()
    }

    pub fn webhooks(&self) -> Vec<WebhookInfo> {
        self.webhooks.lock().unwrap().clone()
    }

    pub fn bans(&self) -> Vec<BanEntry> {
        self.bans.lock().unwrap().clone()
    }

    pub fn emojis(&self) -> Vec<LiveEmoji> {
        self.emojis.lock().unwrap().clone()
    }

    pub fn threads_of(&self, channel_id: &str) -> Vec<LiveThread> {
        self.threads
            .get(channel_id)
            .map(|t| t.value().clone())
            .unwrap_or_default()
    }

    pub fn sent_messages(&self) -> Vec<SentRecord> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, target_id: &str) -> Vec<SentRecord> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.target_id == target_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl GuildHost for MemoryHost {
    async fn fetch_guild(&self) -> Result<GuildInfo> {
        if self.guild_access_denied.load(Ordering::Relaxed) {
            return Err(Error::Remote {
                status: 403,
                message: "missing access".into(),
            });
        }
        Ok(self.guild.lock().unwrap().clone())
    }

    async fn edit_guild(&self, patch: &GuildPatch) -> Result<()> {
        let mut guild = self.guild.lock().unwrap();
        if let Some(name) = &patch.name {
            guild.name = name.clone();
        }
        if let Some(icon) = &patch.icon {
            guild.icon_url = icon.clone();
        }
        if let Some(splash) = &patch.splash {
            guild.splash_url = splash.clone();
        }
        if let Some(banner) = &patch.banner {
            guild.banner_url = banner.clone();
        }
        if let Some(level) = patch.verification_level {
            guild.verification_level = level;
        }
        if let Some(filter) = patch.explicit_content_filter {
            guild.explicit_content_filter = filter;
        }
        if let Some(notifications) = patch.default_notifications {
            guild.default_notifications = notifications;
        }
        if let Some(afk) = &patch.afk_channel_id {
            guild.afk_channel_id = afk.clone();
        }
        if let Some(timeout) = patch.afk_timeout_secs {
            guild.afk_timeout_secs = timeout;
        }
        if let Some(enabled) = patch.widget_enabled {
            guild.widget_enabled = enabled;
        }
        if let Some(widget) = &patch.widget_channel_id {
            guild.widget_channel_id = widget.clone();
        }
        if let Some(system) = &patch.system_channel_id {
            guild.system_channel_id = system.clone();
        }
        Ok(())
    }

    async fn list_roles(&self) -> Result<Vec<LiveRole>> {
        let mut roles = self.roles.lock().unwrap().clone();
        roles.sort_by(|a, b| b.position.cmp(&a.position));
        Ok(roles)
    }

    async fn create_role(&self, req: &CreateRoleRequest) -> Result<LiveRole> {
        let mut roles = self.roles.lock().unwrap();
        // New roles slot in at the bottom, just above the default role.
        for role in roles.iter_mut() {
            if !role.is_default {
                role.position += 1;
            }
        }
        let role = LiveRole {
            id: self.next("r"),
            name: req.name.clone(),
            color: req.color,
            hoist: req.hoist,
            permissions: req.permissions.clone(),
            mentionable: req.mentionable,
            position: 1,
            managed: false,
            is_default: false,
        };
        roles.push(role.clone());
        Ok(role)
    }

    async fn edit_role(&self, role_id: &str, req: &CreateRoleRequest) -> Result<()> {
        let mut roles = self.roles.lock().unwrap();
        let role = roles
            .iter_mut()
            .find(|r| r.id == role_id)
            .ok_or_else(|| Error::NotFound(format!("role {role_id}")))?;
        role.name = req.name.clone();
        role.color = req.color;
        role.hoist = req.hoist;
        role.permissions = req.permissions.clone();
        role.mentionable = req.mentionable;
        Ok(())
    }

    async fn delete_role(&self, role_id: &str) -> Result<()> {
        if self.protected_roles.lock().unwrap().contains(role_id) {
            return Err(Error::Remote {
                status: 403,
                message: "role is protected".into(),
            });
        }
        let mut roles = self.roles.lock().unwrap();
        let before = roles.len();
        roles.retain(|r| r.id != role_id);
        if roles.len() == before {
            return Err(Error::NotFound(format!("role {role_id}")));
        }
        Ok(())
    }

    async fn list_channels(&self) -> Result<Vec<LiveChannel>> {
        Ok(self.channels.lock().unwrap().clone())
    }

    async fn create_channel(&self, req: &CreateChannelRequest) -> Result<LiveChannel> {
        let channel = LiveChannel {
            id: self.next("c"),
            kind: req.kind,
            name: req.name.clone(),
            parent_id: req.parent_id.clone(),
            nsfw: req.nsfw.unwrap_or(false),
            slowmode_secs: req.slowmode_secs.unwrap_or(0),
            topic: req.topic.clone(),
            bitrate: req.bitrate,
            user_limit: req.user_limit,
            overwrites: vec![],
        };
        self.channels.lock().unwrap().push(channel.clone());
        Ok(channel)
    }

    async fn delete_channel(&self, channel_id: &str) -> Result<()> {
        let mut channels = self.channels.lock().unwrap();
        let before = channels.len();
        channels.retain(|c| c.id != channel_id);
        if channels.len() == before {
            return Err(Error::NotFound(format!("channel {channel_id}")));
        }
        self.threads.remove(channel_id);
        self.messages.remove(channel_id);
        Ok(())
    }

    async fn replace_overwrites(
        &self,
        channel_id: &str,
        overwrites: &[OverwriteRecord],
    ) -> Result<()> {
        let mut channels = self.channels.lock().unwrap();
        let channel = channels
            .iter_mut()
            .find(|c| c.id == channel_id)
            .ok_or_else(|| Error::NotFound(format!("channel {channel_id}")))?;
        channel.overwrites = overwrites
            .iter()
            .map(|o| LiveOverwrite {
                role_id: o.role_id.clone(),
                allow: o.allow.to_string(),
                deny: o.deny.to_string(),
            })
            .collect();
        Ok(())
    }

    async fn list_threads(&self, channel_id: &str) -> Result<Vec<LiveThread>> {
        Ok(self.threads_of(channel_id))
    }

    async fn create_thread(
        &self,
        channel_id: &str,
        req: &CreateThreadRequest,
    ) -> Result<LiveThread> {
        let thread = LiveThread {
            id: self.next("t"),
            name: req.name.clone(),
            auto_archive_minutes: req.auto_archive_minutes,
            archived: false,
            locked: false,
            slowmode_secs: req.slowmode_secs.unwrap_or(0),
        };
        self.threads
            .entry(channel_id.to_string())
            .or_default()
            .push(thread.clone());
        Ok(thread)
    }

    async fn list_channel_webhooks(&self, channel_id: &str) -> Result<Vec<WebhookInfo>> {
        Ok(self
            .webhooks
            .lock()
            .unwrap()
            .iter()
            .filter(|w| w.channel_id == channel_id)
            .cloned()
            .collect())
    }

    async fn list_guild_webhooks(&self) -> Result<Vec<WebhookInfo>> {
        Ok(self.webhooks.lock().unwrap().clone())
    }

    async fn create_webhook(
        &self,
        channel_id: &str,
        name: &str,
        _avatar_url: Option<&str>,
    ) -> Result<WebhookInfo> {
        if self.webhook_creation_denied.load(Ordering::Relaxed) {
            return Err(Error::Remote {
                status: 403,
                message: "missing manage webhooks capability".into(),
            });
        }
        Ok(self.add_webhook(channel_id, name))
    }

    async fn delete_webhook(&self, webhook_id: &str) -> Result<()> {
        let mut webhooks = self.webhooks.lock().unwrap();
        let before = webhooks.len();
        webhooks.retain(|w| w.id != webhook_id);
        if webhooks.len() == before {
            return Err(Error::NotFound(format!("webhook {webhook_id}")));
        }
        Ok(())
    }

    async fn execute_webhook(
        &self,
        webhook: &WebhookInfo,
        message: &RelayMessage,
    ) -> Result<String> {
        let target_id = message
            .thread_id
            .clone()
            .unwrap_or_else(|| webhook.channel_id.clone());

        let attempt = {
            let mut attempts = self.send_attempts.lock().unwrap();
            let counter = attempts.entry(target_id.clone()).or_insert(0);
            let current = *counter;
            *counter += 1;
            current
        };
        if self.fail_send_at.lock().unwrap().get(&target_id) == Some(&attempt) {
            return Err(Error::Remote {
                status: 502,
                message: "send failed".into(),
            });
        }

        let id = self.next("m");
        let attachments = match &message.attachment {
            Some(att) => {
                let url = format!("memory://{target_id}/{}/{}", id, att.name);
                self.blobs.insert(url.clone(), att.data.clone());
                vec![RemoteAttachment {
                    name: att.name.clone(),
                    url,
                }]
            }
            None => vec![],
        };
        self.messages
            .entry(target_id.clone())
            .or_default()
            .push(LiveMessage {
                id: id.clone(),
                author_name: message.author_name.clone(),
                author_avatar: message.author_avatar.clone(),
                content: message.content.clone().unwrap_or_default(),
                embeds: message.embeds.clone(),
                attachments,
                pinned: false,
                sent_at: Utc::now(),
            });
        self.sent.lock().unwrap().push(SentRecord {
            id: id.clone(),
            webhook_id: webhook.id.clone(),
            target_id,
            author_name: message.author_name.clone(),
            author_avatar: message.author_avatar.clone(),
            content: message.content.clone(),
            embeds: message.embeds.clone(),
            attachment_name: message.attachment.as_ref().map(|a| a.name.clone()),
            pinned: false,
        });
        Ok(id)
    }

    async fn fetch_messages(
        &self,
        channel_id: &str,
        limit: usize,
        before: Option<&str>,
    ) -> Result<Vec<LiveMessage>> {
        let Some(history) = self.messages.get(channel_id) else {
            return Ok(Vec::new());
        };
        // Stored oldest-first; pages are served newest-first.
        let newest_first = history.iter().rev();
        let page: Vec<LiveMessage> = match before {
            Some(before_id) => newest_first
                .skip_while(|m| m.id != before_id)
                .skip(1)
                .take(limit)
                .cloned()
                .collect(),
            None => newest_first.take(limit).cloned().collect(),
        };
        Ok(page)
    }

    async fn pin_message(&self, channel_id: &str, message_id: &str) -> Result<()> {
        if let Some(mut history) = self.messages.get_mut(channel_id)
            && let Some(message) = history.iter_mut().find(|m| m.id == message_id)
        {
            message.pinned = true;
        } else {
            return Err(Error::NotFound(format!("message {message_id}")));
        }
        if let Some(record) = self
            .sent
            .lock()
            .unwrap()
            .iter_mut()
            .find(|s| s.id == message_id)
        {
            record.pinned = true;
        }
        Ok(())
    }

    async fn list_bans(&self) -> Result<Vec<BanEntry>> {
        Ok(self.bans.lock().unwrap().clone())
    }

    async fn create_ban(&self, user_id: &str, reason: Option<&str>) -> Result<()> {
        self.add_ban(user_id, reason);
        Ok(())
    }

    async fn remove_ban(&self, user_id: &str) -> Result<()> {
        let mut bans = self.bans.lock().unwrap();
        let before = bans.len();
        bans.retain(|b| b.user_id != user_id);
        if bans.len() == before {
            return Err(Error::NotFound(format!("ban {user_id}")));
        }
        Ok(())
    }

    async fn list_emojis(&self) -> Result<Vec<LiveEmoji>> {
        Ok(self.emojis.lock().unwrap().clone())
    }

    async fn create_emoji(&self, name: &str, image: &str) -> Result<LiveEmoji> {
        let emoji = LiveEmoji {
            id: self.next("e"),
            name: name.into(),
            image_url: image.into(),
        };
        self.emojis.lock().unwrap().push(emoji.clone());
        Ok(emoji)
    }

    async fn delete_emoji(&self, emoji_id: &str) -> Result<()> {
        let mut emojis = self.emojis.lock().unwrap();
        let before = emojis.len();
        emojis.retain(|e| e.id != emoji_id);
        if emojis.len() == before {
            return Err(Error::NotFound(format!("emoji {emoji_id}")));
        }
        Ok(())
    }

    async fn list_members(&self) -> Result<Vec<LiveMember>> {
        Ok(self.members.lock().unwrap().clone())
    }

    async fn download_blob(&self, url: &str) -> Result<Vec<u8>> {
        self.blobs
            .get(url)
            .map(|b| b.value().clone())
            .ok_or_else(|| Error::NotFound(format!("blob {url}")))
    }
}
