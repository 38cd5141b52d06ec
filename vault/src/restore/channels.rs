use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::remote::types::{ChannelKind, CreateChannelRequest, LiveChannel};
use crate::restore::bitrate::clamp_bitrate;
use crate::restore::overwrites::remap_overwrites;
use crate::restore::relay::MessageRelay;
use crate::restore::{OutcomeCounts, RestoreCtx};
use crate::snapshot::models::{
    CategorySeed, ChannelSeed, ChannelTree, TextChannelSeed, ThreadSeed,
};

/// Outcome of the structural restore: channel/category creations plus the
/// messages relayed into them.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructureTally {
    pub channels: OutcomeCounts,
    pub messages: OutcomeCounts,
}

impl StructureTally {
    fn absorb(&mut self, other: StructureTally) {
        self.channels.absorb(other.channels);
        self.messages.absorb(other.messages);
    }
}

/// Recreate the captured channel hierarchy on the target.
///
/// A category's existence strictly precedes its children (the children
/// need the parent's live id); everything else — sibling categories,
/// each category's children among themselves, freestanding channels —
/// runs concurrently. The restore is complete once every node has
/// reached a terminal state, successful or failed-and-skipped.
pub(crate) async fn restore_structure(ctx: &RestoreCtx<'_>, tree: &ChannelTree) -> StructureTally {
    let categories = join_all(tree.categories.iter().map(|c| restore_category(ctx, c)));
    let freestanding = join_all(tree.others.iter().map(|c| restore_channel(ctx, c, None)));
    let (category_tallies, freestanding_tallies) = tokio::join!(categories, freestanding);

    let mut tally = StructureTally::default();
    for t in category_tallies.into_iter().chain(freestanding_tallies) {
        tally.absorb(t);
    }
    tally
}

async fn restore_category(ctx: &RestoreCtx<'_>, seed: &CategorySeed) -> StructureTally {
    let mut tally = StructureTally::default();
    if ctx.options.cancel.is_cancelled() {
        return tally;
    }

    let request = CreateChannelRequest::new(&seed.name, ChannelKind::Category);
    let category = match ctx.host.create_channel(&request).await {
        Ok(category) => category,
        Err(e) => {
            warn!(category = %seed.name, error = %e, "failed to create category, skipping its children");
            tally.channels.fail();
            // Children never reach creation; they still terminate.
            tally.channels.failed += seed.children.len();
            return tally;
        }
    };
    tally.channels.succeed();
    ctx.directory.record_channel(category.clone());
    apply_permissions(ctx, &category, seed.permissions.as_slice()).await;

    let children = join_all(
        seed.children
            .iter()
            .map(|c| restore_channel(ctx, c, Some(&category.id))),
    )
    .await;
    for t in children {
        tally.absorb(t);
    }
    tally
}

/// Create one channel, wire its permissions, and replay its history.
/// Failures are caught here; siblings never see them.
async fn restore_channel(
    ctx: &RestoreCtx<'_>,
    seed: &ChannelSeed,
    parent_id: Option<&str>,
) -> StructureTally {
    let mut tally = StructureTally::default();
    if ctx.options.cancel.is_cancelled() {
        return tally;
    }

    let request = build_request(seed, parent_id, ctx.guild.premium_tier);
    let channel = match ctx.host.create_channel(&request).await {
        Ok(channel) => channel,
        Err(e) => {
            warn!(channel = %seed.name(), error = %e, "failed to create channel");
            tally.channels.fail();
            return tally;
        }
    };
    tally.channels.succeed();
    debug!(channel = %channel.name, kind = ?channel.kind, "channel created");
    ctx.directory.record_channel(channel.clone());
    apply_permissions(ctx, &channel, seed.permissions()).await;

    if let ChannelSeed::Text(text) = seed
        && channel.kind.supports_messages()
    {
        tally.messages = relay_history(ctx, &channel, text).await;
    }
    tally
}

/// Resolve and apply the seed's permission rules as one batch, replacing
/// whatever defaults the service attached on creation. Application
/// failure degrades — the channel stands without its overwrites.
async fn apply_permissions(
    ctx: &RestoreCtx<'_>,
    channel: &LiveChannel,
    rules: &[crate::snapshot::models::PermissionSeed],
) {
    let overwrites = remap_overwrites(rules, &ctx.directory);
    if let Err(e) = ctx.host.replace_overwrites(&channel.id, &overwrites).await {
        warn!(channel = %channel.name, error = %e, "failed to apply permission overwrites");
    }
}

/// Replay the channel's own history, then each captured thread —
/// sequentially, reusing the one relay endpoint acquired for the parent
/// channel. Threads are recreated even when no endpoint is available;
/// only their message replay is skipped.
async fn relay_history(
    ctx: &RestoreCtx<'_>,
    channel: &LiveChannel,
    seed: &TextChannelSeed,
) -> OutcomeCounts {
    let mut tally = OutcomeCounts::default();
    let has_history =
        !seed.messages.is_empty() || seed.threads.iter().any(|t| !t.messages.is_empty());
    if !has_history && seed.threads.is_empty() {
        return tally;
    }

    let relay = MessageRelay::new(
        ctx.host,
        ctx.options.max_messages_per_channel,
        ctx.options.allowed_mentions,
        &ctx.options.cancel,
    );
    let webhook = if has_history {
        let acquired = relay.acquire(channel).await;
        if acquired.is_none() {
            warn!(channel = %channel.name, "no relay endpoint, skipping message replay");
        }
        acquired
    } else {
        None
    };

    match &webhook {
        Some(webhook) => tally.absorb(relay.replay(webhook, None, &seed.messages).await),
        None => tally.failed += relay.prepare(&seed.messages).len(),
    }

    if seed.threads.is_empty() {
        return tally;
    }
    let existing = match ctx.host.list_threads(&channel.id).await {
        Ok(threads) => threads,
        Err(e) => {
            warn!(channel = %channel.name, error = %e, "could not list threads");
            Vec::new()
        }
    };
    for thread_seed in &seed.threads {
        if ctx.options.cancel.is_cancelled() {
            break;
        }
        let thread = match existing.iter().find(|t| t.name == thread_seed.name) {
            Some(found) => found.clone(),
            None => {
                match ctx
                    .host
                    .create_thread(&channel.id, &thread_request(thread_seed))
                    .await
                {
                    Ok(created) => created,
                    Err(e) => {
                        warn!(thread = %thread_seed.name, error = %e, "failed to create thread");
                        tally.failed += relay.prepare(&thread_seed.messages).len();
                        continue;
                    }
                }
            }
        };
        match &webhook {
            Some(webhook) => tally.absorb(
                relay
                    .replay(webhook, Some(&thread.id), &thread_seed.messages)
                    .await,
            ),
            None => tally.failed += relay.prepare(&thread_seed.messages).len(),
        }
    }
    tally
}

fn thread_request(seed: &ThreadSeed) -> crate::remote::types::CreateThreadRequest {
    crate::remote::types::CreateThreadRequest {
        name: seed.name.clone(),
        // Auto-archive duration passes through unchanged regardless of
        // the target's plan tier.
        auto_archive_minutes: seed.auto_archive_minutes,
        slowmode_secs: (seed.slowmode_secs > 0).then_some(seed.slowmode_secs),
    }
}

/// Build the type-specific creation request for a seed.
fn build_request(
    seed: &ChannelSeed,
    parent_id: Option<&str>,
    premium_tier: u8,
) -> CreateChannelRequest {
    let mut request = CreateChannelRequest::new(seed.name(), seed.kind());
    request.parent_id = parent_id.map(str::to_string);
    match seed {
        ChannelSeed::Text(text) => {
            request.topic = text.topic.clone();
            request.nsfw = Some(text.nsfw);
            request.slowmode_secs = Some(text.slowmode_secs);
        }
        ChannelSeed::Voice(voice) => {
            request.bitrate = Some(clamp_bitrate(voice.bitrate, premium_tier));
            request.user_limit = voice.user_limit;
        }
    }
    request
}
