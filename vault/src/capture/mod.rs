use std::collections::{HashMap, HashSet};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::remote::host::GuildHost;
use crate::remote::types::{LiveChannel, LiveMessage, LiveOverwrite, LiveRole};
use crate::snapshot::models::{
    AfkSeed, AttachmentSeed, BanSeed, CategorySeed, ChannelSeed, ChannelTree, DOCUMENT_VERSION,
    Document, EmojiSeed, ImageRef, MemberSeed, MessageSeed, PermissionSeed, RoleSeed,
    TextChannelSeed, ThreadSeed, VoiceChannelSeed, WidgetSeed,
};

/// Page size for message-history fetches.
const FETCH_PAGE: usize = 100;

/// Sections that can be left out of a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exclude {
    Bans,
    Roles,
    Emojis,
    Channels,
}

/// How images travel in the document: by URL, or downloaded and inlined
/// as base64.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageMode {
    #[default]
    Url,
    Inline,
}

#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// Most recent messages kept per channel or thread.
    pub max_messages_per_channel: usize,
    pub include_members: bool,
    pub image_mode: ImageMode,
    pub exclude: HashSet<Exclude>,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            max_messages_per_channel: 10,
            include_members: false,
            image_mode: ImageMode::Url,
            exclude: HashSet::new(),
        }
    }
}

/// Read a live guild into a portable snapshot document.
///
/// Only the initial guild fetch is fatal; every section degrades to an
/// empty list if the remote refuses it, so a capture always yields a
/// loadable document.
pub async fn capture(host: &dyn GuildHost, options: &CaptureOptions) -> Result<Document> {
    let guild = host.fetch_guild().await?;
    info!(guild = %guild.id, "starting capture");

    // The live role set is always fetched: channel permission rules
    // store role names, and names only come from here.
    let live_roles = match host.list_roles().await {
        Ok(roles) => roles,
        Err(e) => {
            warn!(error = %e, "could not list roles");
            Vec::new()
        }
    };
    let role_names: HashMap<&str, &str> = live_roles
        .iter()
        .map(|r| (r.id.as_str(), r.name.as_str()))
        .collect();

    let channels = if options.exclude.contains(&Exclude::Channels) {
        Vec::new()
    } else {
        match host.list_channels().await {
            Ok(channels) => channels,
            Err(e) => {
                warn!(error = %e, "could not list channels");
                Vec::new()
            }
        }
    };

    let channel_name = |id: &Option<String>| -> Option<String> {
        id.as_ref()
            .and_then(|id| channels.iter().find(|c| &c.id == id))
            .map(|c| c.name.clone())
    };
    let afk = channel_name(&guild.afk_channel_id).map(|name| AfkSeed {
        name,
        timeout_secs: guild.afk_timeout_secs,
    });
    let widget = WidgetSeed {
        enabled: guild.widget_enabled,
        channel: channel_name(&guild.widget_channel_id),
    };

    let icon = snapshot_image(host, guild.icon_url.as_deref(), options.image_mode).await;
    let splash = snapshot_image(host, guild.splash_url.as_deref(), options.image_mode).await;
    let banner = snapshot_image(host, guild.banner_url.as_deref(), options.image_mode).await;

    let roles = if options.exclude.contains(&Exclude::Roles) {
        Vec::new()
    } else {
        live_roles.iter().map(role_seed).collect()
    };

    let bans = if options.exclude.contains(&Exclude::Bans) {
        Vec::new()
    } else {
        match host.list_bans().await {
            Ok(bans) => bans
                .into_iter()
                .map(|b| BanSeed {
                    user_id: b.user_id,
                    reason: b.reason,
                })
                .collect(),
            Err(e) => {
                warn!(error = %e, "could not list bans");
                Vec::new()
            }
        }
    };

    let emojis = if options.exclude.contains(&Exclude::Emojis) {
        Vec::new()
    } else {
        match host.list_emojis().await {
            Ok(emojis) => {
                let mut seeds = Vec::with_capacity(emojis.len());
                for emoji in emojis {
                    let image = snapshot_image(host, Some(&emoji.image_url), options.image_mode)
                        .await
                        .unwrap_or(ImageRef::Url(emoji.image_url));
                    seeds.push(EmojiSeed {
                        name: emoji.name,
                        image,
                    });
                }
                seeds
            }
            Err(e) => {
                warn!(error = %e, "could not list emojis");
                Vec::new()
            }
        }
    };

    let members = if options.include_members {
        match host.list_members().await {
            Ok(members) => members
                .into_iter()
                .map(|m| MemberSeed {
                    id: m.id,
                    display_name: m.display_name,
                    tag: m.tag,
                    avatar: m.avatar_url,
                    joined_at: m.joined_at,
                    role_ids: m.role_ids,
                    bot: m.bot,
                })
                .collect(),
            Err(e) => {
                warn!(error = %e, "could not list members");
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    let tree = capture_tree(host, &channels, &role_names, options).await;

    Ok(Document {
        version: DOCUMENT_VERSION,
        id: Uuid::new_v4().to_string(),
        guild_id: guild.id,
        created_at: Utc::now(),
        name: guild.name,
        verification_level: guild.verification_level,
        explicit_content_filter: guild.explicit_content_filter,
        default_notifications: guild.default_notifications,
        afk,
        widget,
        icon,
        splash,
        banner,
        roles,
        channels: tree,
        bans,
        emojis,
        members,
    })
}

fn role_seed(role: &LiveRole) -> RoleSeed {
    RoleSeed {
        name: role.name.clone(),
        color: role.color,
        hoist: role.hoist,
        permissions: role.permissions.clone(),
        mentionable: role.mentionable,
        position: role.position,
        is_default: role.is_default,
    }
}

/// Overwrites whose role has vanished are silently left out, matching
/// the restore side's treatment of unresolvable names.
fn capture_permissions(
    overwrites: &[LiveOverwrite],
    role_names: &HashMap<&str, &str>,
) -> Vec<PermissionSeed> {
    overwrites
        .iter()
        .filter_map(|ov| {
            role_names.get(ov.role_id.as_str()).map(|name| PermissionSeed {
                role_name: (*name).to_string(),
                allow: ov.allow.clone(),
                deny: ov.deny.clone(),
            })
        })
        .collect()
}

async fn capture_tree(
    host: &dyn GuildHost,
    channels: &[LiveChannel],
    role_names: &HashMap<&str, &str>,
    options: &CaptureOptions,
) -> ChannelTree {
    let mut tree = ChannelTree::default();
    for category in channels.iter().filter(|c| c.kind == crate::remote::types::ChannelKind::Category) {
        let mut children = Vec::new();
        for child in channels
            .iter()
            .filter(|c| c.parent_id.as_deref() == Some(category.id.as_str()))
        {
            children.push(capture_channel(host, child, role_names, options).await);
        }
        tree.categories.push(CategorySeed {
            name: category.name.clone(),
            permissions: capture_permissions(&category.overwrites, role_names),
            children,
        });
    }
    for channel in channels.iter().filter(|c| {
        c.kind != crate::remote::types::ChannelKind::Category && c.parent_id.is_none()
    }) {
        tree.others
            .push(capture_channel(host, channel, role_names, options).await);
    }
    tree
}

async fn capture_channel(
    host: &dyn GuildHost,
    channel: &LiveChannel,
    role_names: &HashMap<&str, &str>,
    options: &CaptureOptions,
) -> ChannelSeed {
    let permissions = capture_permissions(&channel.overwrites, role_names);
    if channel.kind.is_voice_like() {
        return ChannelSeed::Voice(VoiceChannelSeed {
            kind: channel.kind,
            name: channel.name.clone(),
            bitrate: channel.bitrate,
            user_limit: channel.user_limit,
            permissions,
        });
    }

    let (messages, threads) = if channel.kind.supports_messages() {
        let messages = capture_messages(host, &channel.id, options).await;
        let threads = capture_threads(host, &channel.id, options).await;
        (messages, threads)
    } else {
        (Vec::new(), Vec::new())
    };
    ChannelSeed::Text(TextChannelSeed {
        kind: channel.kind,
        name: channel.name.clone(),
        nsfw: channel.nsfw,
        slowmode_secs: channel.slowmode_secs,
        topic: channel.topic.clone(),
        permissions,
        messages,
        threads,
    })
}

/// Page backwards through history until the per-channel cap is reached.
/// The resulting list stays newest-first, as captured.
async fn capture_messages(
    host: &dyn GuildHost,
    channel_id: &str,
    options: &CaptureOptions,
) -> Vec<MessageSeed> {
    let cap = options.max_messages_per_channel;
    let mut out = Vec::new();
    let mut before: Option<String> = None;
    while out.len() < cap {
        let page = match host
            .fetch_messages(channel_id, FETCH_PAGE, before.as_deref())
            .await
        {
            Ok(page) => page,
            Err(e) => {
                warn!(channel = %channel_id, error = %e, "message fetch failed, keeping partial history");
                break;
            }
        };
        if page.is_empty() {
            break;
        }
        before = page.last().map(|m| m.id.clone());
        for live in page {
            if out.len() >= cap {
                break;
            }
            out.push(message_seed(host, live, options).await);
        }
    }
    out
}

async fn message_seed(
    host: &dyn GuildHost,
    live: LiveMessage,
    options: &CaptureOptions,
) -> MessageSeed {
    let attachment = match live.attachments.into_iter().next() {
        Some(att) => {
            let source = match options.image_mode {
                ImageMode::Inline => match host.download_blob(&att.url).await {
                    Ok(bytes) => ImageRef::Inline(STANDARD.encode(bytes)),
                    Err(e) => {
                        warn!(url = %att.url, error = %e, "attachment download failed, keeping url");
                        ImageRef::Url(att.url)
                    }
                },
                ImageMode::Url => ImageRef::Url(att.url),
            };
            Some(AttachmentSeed {
                name: att.name,
                source,
            })
        }
        None => None,
    };
    MessageSeed {
        author_name: live.author_name,
        author_avatar: live.author_avatar,
        content: live.content,
        embeds: live.embeds,
        attachment,
        pinned: live.pinned,
        sent_at: live.sent_at,
    }
}

async fn capture_threads(
    host: &dyn GuildHost,
    channel_id: &str,
    options: &CaptureOptions,
) -> Vec<ThreadSeed> {
    let threads = match host.list_threads(channel_id).await {
        Ok(threads) => threads,
        Err(e) => {
            warn!(channel = %channel_id, error = %e, "could not list threads");
            return Vec::new();
        }
    };
    let mut seeds = Vec::with_capacity(threads.len());
    for thread in threads {
        let messages = capture_messages(host, &thread.id, options).await;
        seeds.push(ThreadSeed {
            name: thread.name,
            auto_archive_minutes: thread.auto_archive_minutes,
            archived: thread.archived,
            locked: thread.locked,
            slowmode_secs: thread.slowmode_secs,
            messages,
        });
    }
    seeds
}

/// Capture a guild image per the configured mode, falling back to the
/// URL when a download fails.
async fn snapshot_image(
    host: &dyn GuildHost,
    url: Option<&str>,
    mode: ImageMode,
) -> Option<ImageRef> {
    let url = url?;
    match mode {
        ImageMode::Url => Some(ImageRef::Url(url.to_string())),
        ImageMode::Inline => match host.download_blob(url).await {
            Ok(bytes) => Some(ImageRef::Inline(STANDARD.encode(bytes))),
            Err(e) => {
                warn!(url = %url, error = %e, "image download failed, keeping url");
                Some(ImageRef::Url(url.to_string()))
            }
        },
    }
}
