use tracing::warn;

use crate::remote::directory::GuildDirectory;
use crate::remote::types::OverwriteRecord;
use crate::snapshot::models::PermissionSeed;

/// Resolve named permission rules against the target's live role set.
///
/// Rules are matched by exact role name, first match winning. A rule
/// whose role cannot be found — or whose bitset strings do not parse —
/// is dropped with a warning: the channel is still created, with reduced
/// permission fidelity. No ordering is guaranteed among the results.
pub fn remap_overwrites(
    rules: &[PermissionSeed],
    directory: &GuildDirectory,
) -> Vec<OverwriteRecord> {
    rules
        .iter()
        .filter_map(|rule| {
            let Some(role) = directory.role_named(&rule.role_name) else {
                warn!(role = %rule.role_name, "permission rule references an unknown role, dropping");
                return None;
            };
            let (Ok(allow), Ok(deny)) = (rule.allow.parse(), rule.deny.parse()) else {
                warn!(role = %rule.role_name, "permission rule carries an unparseable bitset, dropping");
                return None;
            };
            Some(OverwriteRecord {
                role_id: role.id,
                allow,
                deny,
            })
        })
        .collect()
}
