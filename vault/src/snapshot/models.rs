use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::remote::types::ChannelKind;

/// Current snapshot document format version.
pub const DOCUMENT_VERSION: u32 = 1;

/// An image carried by a snapshot: either a remote URL or an inlined
/// base64 blob. Inlined blobs survive the source guild deleting its CDN
/// assets; URLs keep the document small.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageRef {
    Url(String),
    Inline(String),
}

impl ImageRef {
    /// Render this reference as a payload string the remote service
    /// accepts: the URL itself, or a PNG data URI for inlined blobs.
    pub fn to_payload(&self) -> String {
        match self {
            ImageRef::Url(url) => url.clone(),
            ImageRef::Inline(b64) => format!("data:image/png;base64,{b64}"),
        }
    }
}

/// A portable snapshot of a guild. Produced once by capture, immutable
/// thereafter. Restoring the same document twice into the same target
/// without a reset creates duplicate entities — this is expected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub version: u32,
    /// Opaque snapshot identifier; unique, never reused.
    pub id: String,
    /// Identifier of the guild this snapshot was captured from.
    pub guild_id: String,
    pub created_at: DateTime<Utc>,

    pub name: String,
    /// 0-4, lowest to highest.
    pub verification_level: u8,
    /// 0 = disabled, 1 = members without roles, 2 = all members.
    pub explicit_content_filter: u8,
    /// 0 = all messages, 1 = mentions only.
    pub default_notifications: u8,
    pub afk: Option<AfkSeed>,
    #[serde(default)]
    pub widget: WidgetSeed,
    pub icon: Option<ImageRef>,
    pub splash: Option<ImageRef>,
    pub banner: Option<ImageRef>,

    /// Ordered descending by position (highest first). Exactly one seed
    /// carries `is_default`.
    #[serde(default)]
    pub roles: Vec<RoleSeed>,
    #[serde(default)]
    pub channels: ChannelTree,
    #[serde(default)]
    pub bans: Vec<BanSeed>,
    #[serde(default)]
    pub emojis: Vec<EmojiSeed>,
    /// Capture-only; never replayed.
    #[serde(default)]
    pub members: Vec<MemberSeed>,
}

/// AFK channel reference. Channels are referenced by name because ids are
/// not portable across guilds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AfkSeed {
    pub name: String,
    pub timeout_secs: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WidgetSeed {
    pub enabled: bool,
    /// Widget channel, by name.
    pub channel: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleSeed {
    pub name: String,
    pub color: u32,
    pub hoist: bool,
    /// Decimal permission bitset. Kept as a string because the bitset may
    /// exceed native integer width; parsed as u128 at restore time.
    pub permissions: String,
    pub mentionable: bool,
    pub position: i64,
    /// The guild's implicit default role. Edited in place on restore,
    /// never recreated.
    #[serde(default)]
    pub is_default: bool,
}

/// A named permission rule attached to a channel or category. Resolved
/// against the target's live role set by name; rules whose role cannot be
/// found are dropped at restore time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionSeed {
    pub role_name: String,
    /// Decimal allow bitset, verbatim from capture.
    pub allow: String,
    /// Decimal deny bitset, verbatim from capture.
    pub deny: String,
}

/// Channel hierarchy: grouping categories with their ordered children,
/// plus freestanding channels. Children keep their captured relative
/// order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelTree {
    pub categories: Vec<CategorySeed>,
    pub others: Vec<ChannelSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySeed {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<PermissionSeed>,
    #[serde(default)]
    pub children: Vec<ChannelSeed>,
}

/// A captured channel, split into the two families that need different
/// creation requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ChannelSeed {
    Text(TextChannelSeed),
    Voice(VoiceChannelSeed),
}

impl ChannelSeed {
    pub fn name(&self) -> &str {
        match self {
            ChannelSeed::Text(c) => &c.name,
            ChannelSeed::Voice(c) => &c.name,
        }
    }

    pub fn kind(&self) -> ChannelKind {
        match self {
            ChannelSeed::Text(c) => c.kind,
            ChannelSeed::Voice(c) => c.kind,
        }
    }

    pub fn permissions(&self) -> &[PermissionSeed] {
        match self {
            ChannelSeed::Text(c) => &c.permissions,
            ChannelSeed::Voice(c) => &c.permissions,
        }
    }
}

/// Text-family channel: text, announcement, forum or media.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChannelSeed {
    pub kind: ChannelKind,
    pub name: String,
    #[serde(default)]
    pub nsfw: bool,
    /// Slow-mode interval in seconds; 0 disables.
    #[serde(default)]
    pub slowmode_secs: u32,
    pub topic: Option<String>,
    #[serde(default)]
    pub permissions: Vec<PermissionSeed>,
    /// Captured newest-first; replayed oldest-first.
    #[serde(default)]
    pub messages: Vec<MessageSeed>,
    #[serde(default)]
    pub threads: Vec<ThreadSeed>,
}

/// Voice-family channel: voice or stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceChannelSeed {
    pub kind: ChannelKind,
    pub name: String,
    /// Requested bitrate in bits/sec; clamped to the target's plan tier
    /// at restore time.
    pub bitrate: Option<u32>,
    pub user_limit: Option<u32>,
    #[serde(default)]
    pub permissions: Vec<PermissionSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadSeed {
    pub name: String,
    pub auto_archive_minutes: u32,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub slowmode_secs: u32,
    #[serde(default)]
    pub messages: Vec<MessageSeed>,
}

/// One captured message. Replayed through a delegated-identity relay so
/// it displays under the original author's name and avatar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageSeed {
    pub author_name: String,
    pub author_avatar: Option<String>,
    #[serde(default)]
    pub content: String,
    /// Embeds are carried opaquely and relayed verbatim.
    #[serde(default)]
    pub embeds: Vec<serde_json::Value>,
    /// At most one attachment survives capture.
    pub attachment: Option<AttachmentSeed>,
    #[serde(default)]
    pub pinned: bool,
    pub sent_at: DateTime<Utc>,
}

impl MessageSeed {
    /// A message with no text, no embeds and no attachment carries
    /// nothing worth replaying.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.embeds.is_empty() && self.attachment.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentSeed {
    pub name: String,
    pub source: ImageRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanSeed {
    pub user_id: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmojiSeed {
    pub name: String,
    pub image: ImageRef,
}

/// Optional member record, captured for reference only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSeed {
    pub id: String,
    pub display_name: String,
    pub tag: String,
    pub avatar: Option<String>,
    pub joined_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub role_ids: Vec<String>,
    #[serde(default)]
    pub bot: bool,
}
