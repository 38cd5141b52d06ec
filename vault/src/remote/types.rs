use bitflags::bitflags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Guild feature flag that locks verification and content-filter fields.
pub const COMMUNITY_FEATURE: &str = "COMMUNITY";

/// Channel kinds understood by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Text,
    Voice,
    Category,
    Announcement,
    Stage,
    Forum,
    Media,
}

impl ChannelKind {
    /// Kinds that carry message history and threads.
    pub fn supports_messages(self) -> bool {
        matches!(self, ChannelKind::Text | ChannelKind::Announcement)
    }

    /// Kinds that take a bitrate and are subject to the plan-tier clamp.
    pub fn is_voice_like(self) -> bool {
        matches!(self, ChannelKind::Voice | ChannelKind::Stage)
    }

    /// Kinds a delegated-identity relay endpoint can be attached to.
    pub fn supports_relay(self) -> bool {
        self.supports_messages()
    }
}

bitflags! {
    /// Suppression flags on the guild's system channel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SystemChannelFlags: u32 {
        const SUPPRESS_JOIN_NOTIFICATIONS    = 1 << 0;
        const SUPPRESS_PREMIUM_SUBSCRIPTIONS = 1 << 1;
        const SUPPRESS_GUILD_REMINDERS       = 1 << 2;
    }
}

/// How replayed messages may mention live members.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowedMentionPolicy {
    /// Never ping anyone; mentions render as plain text.
    #[default]
    Suppress,
    UsersOnly,
    Everything,
}

/// Target guild as the remote service reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildInfo {
    pub id: String,
    pub name: String,
    pub icon_url: Option<String>,
    pub splash_url: Option<String>,
    pub banner_url: Option<String>,
    /// Plan tier 0-3; caps voice bitrate.
    pub premium_tier: u8,
    #[serde(default)]
    pub features: Vec<String>,
    pub verification_level: u8,
    pub explicit_content_filter: u8,
    pub default_notifications: u8,
    pub afk_channel_id: Option<String>,
    pub afk_timeout_secs: u32,
    pub widget_enabled: bool,
    pub widget_channel_id: Option<String>,
    pub system_channel_id: Option<String>,
}

impl GuildInfo {
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveRole {
    pub id: String,
    pub name: String,
    pub color: u32,
    pub hoist: bool,
    /// Decimal permission bitset, as the service serializes it.
    pub permissions: String,
    pub mentionable: bool,
    pub position: i64,
    /// Service-managed roles cannot be deleted.
    #[serde(default)]
    pub managed: bool,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveChannel {
    pub id: String,
    pub kind: ChannelKind,
    pub name: String,
    pub parent_id: Option<String>,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default)]
    pub slowmode_secs: u32,
    pub topic: Option<String>,
    pub bitrate: Option<u32>,
    pub user_limit: Option<u32>,
    /// Role overwrites currently attached to the channel.
    #[serde(default)]
    pub overwrites: Vec<LiveOverwrite>,
}

/// A per-role allow/deny pair as stored on a live channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveOverwrite {
    pub role_id: String,
    pub allow: String,
    pub deny: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveThread {
    pub id: String,
    pub name: String,
    pub auto_archive_minutes: u32,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub slowmode_secs: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookInfo {
    pub id: String,
    pub name: String,
    pub channel_id: String,
    /// Execution token; absent when the caller may not execute.
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveMessage {
    pub id: String,
    pub author_name: String,
    pub author_avatar: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub embeds: Vec<serde_json::Value>,
    #[serde(default)]
    pub attachments: Vec<RemoteAttachment>,
    #[serde(default)]
    pub pinned: bool,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteAttachment {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanEntry {
    pub user_id: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveEmoji {
    pub id: String,
    pub name: String,
    pub image_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveMember {
    pub id: String,
    pub display_name: String,
    pub tag: String,
    pub avatar_url: Option<String>,
    pub joined_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub role_ids: Vec<String>,
    #[serde(default)]
    pub bot: bool,
}

// ── Mutation requests ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    pub color: u32,
    pub hoist: bool,
    /// Decimal permission bitset.
    pub permissions: String,
    pub mentionable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChannelRequest {
    pub name: String,
    pub kind: ChannelKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nsfw: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slowmode_secs: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_limit: Option<u32>,
}

impl CreateChannelRequest {
    /// A bare request for the given kind and name; type-specific fields
    /// are filled in by the sequencer.
    pub fn new(name: &str, kind: ChannelKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            parent_id: None,
            topic: None,
            nsfw: None,
            slowmode_secs: None,
            bitrate: None,
            user_limit: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateThreadRequest {
    pub name: String,
    pub auto_archive_minutes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slowmode_secs: Option<u32>,
}

/// An applyable overwrite resolved against the target's live role set.
/// Bitsets travel as decimal strings but are held wide enough that no
/// captured bitset loses bits in transit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverwriteRecord {
    pub role_id: String,
    #[serde(with = "bitset_string")]
    pub allow: u128,
    #[serde(with = "bitset_string")]
    pub deny: u128,
}

/// A delegated-identity send: displays under the original author's name
/// and avatar rather than the restoring identity.
#[derive(Debug, Clone, Serialize)]
pub struct RelayMessage {
    pub author_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<AttachmentPayload>,
    /// Routing hint for sends into a thread of the endpoint's channel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    pub allowed_mentions: AllowedMentionPolicy,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttachmentPayload {
    pub name: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

/// Partial guild update. `None` leaves a field untouched; for clearable
/// fields the inner Option distinguishes "set" from "clear" (serialized
/// as null).
#[derive(Debug, Clone, Default, Serialize)]
pub struct GuildPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub splash: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_level: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explicit_content_filter: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_notifications: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub afk_channel_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub afk_timeout_secs: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub widget_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub widget_channel_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_channel_id: Option<Option<String>>,
    /// Raw bits of [`SystemChannelFlags`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_channel_flags: Option<u32>,
}

/// Decimal-string serde for wide permission bitsets.
mod bitset_string {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &u128, ser: S) -> Result<S::Ok, S::Error> {
        ser.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<u128, D::Error> {
        let s = String::deserialize(de)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// Base64 serde for attachment bytes.
mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&STANDARD.encode(value))
    }
}
