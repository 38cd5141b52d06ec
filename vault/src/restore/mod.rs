pub mod bitrate;
pub mod channels;
pub mod overwrites;
pub mod relay;
pub mod reset;

use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::remote::directory::GuildDirectory;
use crate::remote::host::GuildHost;
use crate::remote::types::{
    AllowedMentionPolicy, COMMUNITY_FEATURE, ChannelKind, CreateRoleRequest, GuildInfo, GuildPatch,
};
use crate::snapshot::models::{Document, RoleSeed};
pub use reset::ResetTally;

/// How entities of one domain fared.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct OutcomeCounts {
    pub ok: usize,
    /// Entities that could not be created or delivered; they are omitted
    /// from the target, never retried.
    pub failed: usize,
}

impl OutcomeCounts {
    pub(crate) fn succeed(&mut self) {
        self.ok += 1;
    }

    pub(crate) fn fail(&mut self) {
        self.failed += 1;
    }

    pub(crate) fn absorb(&mut self, other: OutcomeCounts) {
        self.ok += other.ok;
        self.failed += other.failed;
    }
}

/// Per-entity outcome report of a restore. Degraded entities show up
/// here as well as in the logs.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RestoreReport {
    /// Present when the guild was cleared first.
    pub reset: Option<ResetTally>,
    pub settings: OutcomeCounts,
    pub roles: OutcomeCounts,
    pub channels: OutcomeCounts,
    pub messages: OutcomeCounts,
    pub emojis: OutcomeCounts,
    pub bans: OutcomeCounts,
}

pub struct RestoreOptions {
    /// Clear the target guild before replaying the snapshot.
    pub clear_before_restore: bool,
    /// Most recent messages replayed per channel or thread.
    pub max_messages_per_channel: usize,
    pub allowed_mentions: AllowedMentionPolicy,
    /// Cooperative cancellation; a cancelled restore stops issuing remote
    /// calls and resolves with the partial report accumulated so far.
    pub cancel: CancellationToken,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            clear_before_restore: true,
            max_messages_per_channel: 100,
            allowed_mentions: AllowedMentionPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }
}

/// Shared state of one restore invocation.
pub(crate) struct RestoreCtx<'a> {
    pub host: &'a dyn GuildHost,
    pub directory: Arc<GuildDirectory>,
    pub guild: GuildInfo,
    pub options: &'a RestoreOptions,
}

/// Replay a snapshot document onto the target guild.
///
/// Runs the optional guild reset, refreshes the live directory, then
/// issues the sub-tasks — settings, roles, structure, AFK, widget,
/// emoji, bans — concurrently and waits for all of them. Leaf failures
/// (one role, one channel, one message) degrade locally and are
/// reported; only precondition and reset-sequencing failures reject.
///
/// Restoring the same document twice without a reset duplicates
/// entities: creation is not idempotent, by design.
pub async fn restore(
    host: &dyn GuildHost,
    document: &Document,
    options: &RestoreOptions,
) -> Result<RestoreReport> {
    let guild = host
        .fetch_guild()
        .await
        .map_err(|e| Error::Precondition(format!("cannot access target guild: {e}")))?;
    info!(snapshot = %document.id, guild = %guild.id, "starting restore");

    let mut report = RestoreReport::default();
    if options.clear_before_restore {
        report.reset = Some(reset::clear_guild(host, &guild, &options.cancel).await?);
    }

    // Refreshed after the reset so stale entity references never resolve.
    let directory = Arc::new(GuildDirectory::new());
    directory.refresh(host).await?;

    let ctx = RestoreCtx {
        host,
        directory,
        guild,
        options,
    };

    let (settings, roles, structure, afk, widget, emojis, bans) = tokio::join!(
        restore_settings(&ctx, document),
        restore_roles(&ctx, document),
        channels::restore_structure(&ctx, &document.channels),
        restore_afk(&ctx, document),
        restore_widget(&ctx, document),
        restore_emojis(&ctx, document),
        restore_bans(&ctx, document),
    );

    report.settings = settings;
    report.settings.absorb(afk);
    report.settings.absorb(widget);
    report.roles = roles;
    report.channels = structure.channels;
    report.messages = structure.messages;
    report.emojis = emojis;
    report.bans = bans;

    info!(
        roles = report.roles.ok,
        channels = report.channels.ok,
        messages = report.messages.ok,
        emojis = report.emojis.ok,
        bans = report.bans.ok,
        "restore complete"
    );
    Ok(report)
}

/// Apply workspace-level settings, one independent patch per field so a
/// refused field never blocks the others.
async fn restore_settings(ctx: &RestoreCtx<'_>, document: &Document) -> OutcomeCounts {
    let mut patches: Vec<(&'static str, GuildPatch)> = vec![(
        "name",
        GuildPatch {
            name: Some(document.name.clone()),
            ..Default::default()
        },
    )];
    if let Some(icon) = &document.icon {
        patches.push((
            "icon",
            GuildPatch {
                icon: Some(Some(icon.to_payload())),
                ..Default::default()
            },
        ));
    }
    if let Some(splash) = &document.splash {
        patches.push((
            "splash",
            GuildPatch {
                splash: Some(Some(splash.to_payload())),
                ..Default::default()
            },
        ));
    }
    if let Some(banner) = &document.banner {
        patches.push((
            "banner",
            GuildPatch {
                banner: Some(Some(banner.to_payload())),
                ..Default::default()
            },
        ));
    }
    patches.push((
        "verification_level",
        GuildPatch {
            verification_level: Some(document.verification_level),
            ..Default::default()
        },
    ));
    patches.push((
        "default_notifications",
        GuildPatch {
            default_notifications: Some(document.default_notifications),
            ..Default::default()
        },
    ));
    // Locked unless the guild carries the community feature.
    if ctx.guild.has_feature(COMMUNITY_FEATURE) {
        patches.push((
            "explicit_content_filter",
            GuildPatch {
                explicit_content_filter: Some(document.explicit_content_filter),
                ..Default::default()
            },
        ));
    }

    let mut tally = OutcomeCounts::default();
    if ctx.options.cancel.is_cancelled() {
        return tally;
    }
    let results = join_all(patches.iter().map(|(field, patch)| async move {
        (*field, ctx.host.edit_guild(patch).await)
    }))
    .await;
    for (field, result) in results {
        match result {
            Ok(()) => tally.succeed(),
            Err(e) => {
                warn!(field, error = %e, "could not apply guild setting");
                tally.fail();
            }
        }
    }
    tally
}

/// Replay roles strictly in document order (highest position first);
/// the service slots each new role in at the bottom, which reproduces
/// the captured ordering. The default role is edited in place.
async fn restore_roles(ctx: &RestoreCtx<'_>, document: &Document) -> OutcomeCounts {
    let mut tally = OutcomeCounts::default();
    for seed in &document.roles {
        if ctx.options.cancel.is_cancelled() {
            break;
        }
        let request = role_request(seed);
        if seed.is_default {
            match ctx.directory.default_role() {
                Some(live) => match ctx.host.edit_role(&live.id, &request).await {
                    Ok(()) => tally.succeed(),
                    Err(e) => {
                        warn!(role = %seed.name, error = %e, "could not edit default role");
                        tally.fail();
                    }
                },
                None => {
                    warn!(role = %seed.name, "target has no default role to edit");
                    tally.fail();
                }
            }
            continue;
        }
        match ctx.host.create_role(&request).await {
            Ok(created) => {
                // Publish immediately so concurrently-running permission
                // remapping can resolve this role by name.
                ctx.directory.record_role(created);
                tally.succeed();
            }
            Err(e) => {
                warn!(role = %seed.name, error = %e, "could not create role");
                tally.fail();
            }
        }
    }
    tally
}

fn role_request(seed: &RoleSeed) -> CreateRoleRequest {
    CreateRoleRequest {
        name: seed.name.clone(),
        color: seed.color,
        hoist: seed.hoist,
        permissions: seed.permissions.clone(),
        mentionable: seed.mentionable,
    }
}

/// Point the AFK channel at the recreated voice channel of the same name.
async fn restore_afk(ctx: &RestoreCtx<'_>, document: &Document) -> OutcomeCounts {
    let mut tally = OutcomeCounts::default();
    let Some(afk) = &document.afk else {
        return tally;
    };
    if ctx.options.cancel.is_cancelled() {
        return tally;
    }
    let channel_id = ctx
        .directory
        .channel_of_kind(&afk.name, ChannelKind::Voice)
        .map(|c| c.id);
    if channel_id.is_none() {
        warn!(channel = %afk.name, "afk channel not found on target, setting timeout only");
    }
    let patch = GuildPatch {
        afk_channel_id: channel_id.map(Some),
        afk_timeout_secs: Some(afk.timeout_secs),
        ..Default::default()
    };
    match ctx.host.edit_guild(&patch).await {
        Ok(()) => tally.succeed(),
        Err(e) => {
            warn!(error = %e, "could not restore afk settings");
            tally.fail();
        }
    }
    tally
}

/// Re-enable the widget against the recreated channel of the same name.
async fn restore_widget(ctx: &RestoreCtx<'_>, document: &Document) -> OutcomeCounts {
    let mut tally = OutcomeCounts::default();
    let Some(channel_name) = &document.widget.channel else {
        return tally;
    };
    if ctx.options.cancel.is_cancelled() {
        return tally;
    }
    let channel_id = ctx.directory.channel_named(channel_name).map(|c| c.id);
    if channel_id.is_none() {
        warn!(channel = %channel_name, "widget channel not found on target");
    }
    let patch = GuildPatch {
        widget_enabled: Some(document.widget.enabled),
        widget_channel_id: Some(channel_id),
        ..Default::default()
    };
    match ctx.host.edit_guild(&patch).await {
        Ok(()) => tally.succeed(),
        Err(e) => {
            warn!(error = %e, "could not restore widget settings");
            tally.fail();
        }
    }
    tally
}

async fn restore_emojis(ctx: &RestoreCtx<'_>, document: &Document) -> OutcomeCounts {
    let mut tally = OutcomeCounts::default();
    if ctx.options.cancel.is_cancelled() {
        return tally;
    }
    let results = join_all(document.emojis.iter().map(|seed| async move {
        (
            seed,
            ctx.host
                .create_emoji(&seed.name, &seed.image.to_payload())
                .await,
        )
    }))
    .await;
    for (seed, result) in results {
        match result {
            Ok(_) => tally.succeed(),
            Err(e) => {
                warn!(emoji = %seed.name, error = %e, "could not create emoji");
                tally.fail();
            }
        }
    }
    tally
}

async fn restore_bans(ctx: &RestoreCtx<'_>, document: &Document) -> OutcomeCounts {
    let mut tally = OutcomeCounts::default();
    if ctx.options.cancel.is_cancelled() {
        return tally;
    }
    let results = join_all(document.bans.iter().map(|seed| async move {
        (
            seed,
            ctx.host.create_ban(&seed.user_id, seed.reason.as_deref()).await,
        )
    }))
    .await;
    for (seed, result) in results {
        match result {
            Ok(()) => tally.succeed(),
            Err(e) => {
                warn!(user = %seed.user_id, error = %e, "could not restore ban");
                tally.fail();
            }
        }
    }
    tally
}
