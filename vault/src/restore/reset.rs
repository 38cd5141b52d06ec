use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::Result;
use crate::remote::host::GuildHost;
use crate::remote::types::{COMMUNITY_FEATURE, GuildInfo, GuildPatch, SystemChannelFlags};
use crate::restore::OutcomeCounts;

/// AFK timeout the reset falls back to, in seconds.
const RESET_AFK_TIMEOUT_SECS: u32 = 300;

/// Per-domain deletion outcomes of a guild reset.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct ResetTally {
    pub roles: OutcomeCounts,
    pub channels: OutcomeCounts,
    pub emojis: OutcomeCounts,
    pub webhooks: OutcomeCounts,
    pub bans: OutcomeCounts,
}

/// Strip the guild back to a neutral baseline before a restore.
///
/// Work lists are computed up front from fresh list calls, then processed
/// one entity at a time; a failed deletion is logged and skipped, never
/// blocking the rest. Only the list calls themselves are fatal.
pub(crate) async fn clear_guild(
    host: &dyn GuildHost,
    guild: &GuildInfo,
    cancel: &CancellationToken,
) -> Result<ResetTally> {
    let mut tally = ResetTally::default();

    // The implicit default role and service-managed roles are not
    // deletable; everything else goes.
    let roles: Vec<_> = host
        .list_roles()
        .await?
        .into_iter()
        .filter(|r| !r.is_default && !r.managed)
        .collect();
    for role in roles {
        if cancel.is_cancelled() {
            break;
        }
        match host.delete_role(&role.id).await {
            Ok(()) => tally.roles.succeed(),
            Err(e) => {
                warn!(role = %role.name, error = %e, "could not delete role");
                tally.roles.fail();
            }
        }
    }

    for channel in host.list_channels().await? {
        if cancel.is_cancelled() {
            break;
        }
        match host.delete_channel(&channel.id).await {
            Ok(()) => tally.channels.succeed(),
            Err(e) => {
                warn!(channel = %channel.name, error = %e, "could not delete channel");
                tally.channels.fail();
            }
        }
    }

    for emoji in host.list_emojis().await? {
        if cancel.is_cancelled() {
            break;
        }
        match host.delete_emoji(&emoji.id).await {
            Ok(()) => tally.emojis.succeed(),
            Err(e) => {
                warn!(emoji = %emoji.name, error = %e, "could not delete emoji");
                tally.emojis.fail();
            }
        }
    }

    for webhook in host.list_guild_webhooks().await? {
        if cancel.is_cancelled() {
            break;
        }
        match host.delete_webhook(&webhook.id).await {
            Ok(()) => tally.webhooks.succeed(),
            Err(e) => {
                warn!(webhook = %webhook.name, error = %e, "could not delete webhook");
                tally.webhooks.fail();
            }
        }
    }

    for ban in host.list_bans().await? {
        if cancel.is_cancelled() {
            break;
        }
        match host.remove_ban(&ban.user_id).await {
            Ok(()) => tally.bans.succeed(),
            Err(e) => {
                warn!(user = %ban.user_id, error = %e, "could not revoke ban");
                tally.bans.fail();
            }
        }
    }

    reset_settings(host, guild).await;

    info!(
        roles = tally.roles.ok,
        channels = tally.channels.ok,
        emojis = tally.emojis.ok,
        webhooks = tally.webhooks.ok,
        bans = tally.bans.ok,
        "guild cleared"
    );
    Ok(tally)
}

/// Reset workspace-level settings to neutral defaults. All patches are
/// best-effort; a refusal leaves the field in its prior state.
async fn reset_settings(host: &dyn GuildHost, guild: &GuildInfo) {
    let baseline = GuildPatch {
        afk_channel_id: Some(None),
        afk_timeout_secs: Some(RESET_AFK_TIMEOUT_SECS),
        icon: Some(None),
        default_notifications: Some(1), // mentions only
        widget_enabled: Some(false),
        widget_channel_id: Some(None),
        system_channel_id: Some(None),
        system_channel_flags: Some(SystemChannelFlags::all().bits()),
        ..Default::default()
    };
    if let Err(e) = host.edit_guild(&baseline).await {
        warn!(error = %e, "could not reset guild settings");
    }

    let art = GuildPatch {
        banner: Some(None),
        splash: Some(None),
        ..Default::default()
    };
    if let Err(e) = host.edit_guild(&art).await {
        warn!(error = %e, "could not clear banner/splash");
    }

    // Community guilds lock these two fields.
    if !guild.has_feature(COMMUNITY_FEATURE) {
        let moderation = GuildPatch {
            explicit_content_filter: Some(0),
            verification_level: Some(0),
            ..Default::default()
        };
        if let Err(e) = host.edit_guild(&moderation).await {
            warn!(error = %e, "could not reset moderation levels");
        }
    }
}
