use std::sync::RwLock;

use dashmap::DashMap;

use crate::error::Result;
use crate::remote::host::GuildHost;
use crate::remote::types::{ChannelKind, LiveChannel, LiveRole};

/// Name-keyed view of the target guild's live roles and channels.
///
/// Read by the permission remapper and the AFK/widget sub-tasks while the
/// role and structural sub-tasks write entities into it as they are
/// created, mirroring the live-cache model the remapper resolves against.
/// Must be refreshed between a guild reset and the restore proper so
/// stale references do not resolve.
///
/// Duplicate names resolve to the first entry recorded — the documented
/// first-match policy.
#[derive(Default)]
pub struct GuildDirectory {
    roles: DashMap<String, LiveRole>,
    channels: DashMap<String, Vec<LiveChannel>>,
    default_role: RwLock<Option<LiveRole>>,
}

impl GuildDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything and reload the live role and channel sets.
    pub async fn refresh(&self, host: &dyn GuildHost) -> Result<()> {
        self.roles.clear();
        self.channels.clear();
        *self.default_role.write().expect("directory lock poisoned") = None;

        for role in host.list_roles().await? {
            self.record_role(role);
        }
        for channel in host.list_channels().await? {
            self.record_channel(channel);
        }
        Ok(())
    }

    /// Record a role. Later roles with an already-seen name are ignored
    /// (first match wins).
    pub fn record_role(&self, role: LiveRole) {
        if role.is_default {
            *self.default_role.write().expect("directory lock poisoned") = Some(role.clone());
        }
        self.roles.entry(role.name.clone()).or_insert(role);
    }

    pub fn record_channel(&self, channel: LiveChannel) {
        self.channels
            .entry(channel.name.clone())
            .or_default()
            .push(channel);
    }

    pub fn role_named(&self, name: &str) -> Option<LiveRole> {
        self.roles.get(name).map(|r| r.value().clone())
    }

    pub fn default_role(&self) -> Option<LiveRole> {
        self.default_role
            .read()
            .expect("directory lock poisoned")
            .clone()
    }

    /// First channel recorded under this name, any kind.
    pub fn channel_named(&self, name: &str) -> Option<LiveChannel> {
        self.channels
            .get(name)
            .and_then(|list| list.first().cloned())
    }

    /// First channel of the given kind recorded under this name.
    pub fn channel_of_kind(&self, name: &str, kind: ChannelKind) -> Option<LiveChannel> {
        self.channels
            .get(name)
            .and_then(|list| list.iter().find(|c| c.kind == kind).cloned())
    }
}
