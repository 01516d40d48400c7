//! Desired group membership and full-replace reconciliation.
//!
//! Members collected for a group during a run become the group's complete
//! membership. Anyone currently in the group but not collected is removed.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::error::{SyncError, SyncResult};
use crate::models::DirectoryGroup;
use crate::remote::Remotes;

/// Accumulated membership for one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredGroup {
    pub group_id: String,
    pub group_name: String,
    pub members: BTreeSet<String>,
}

/// Desired state for every group touched in a run, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct DesiredGroups {
    groups: Vec<DesiredGroup>,
}

impl DesiredGroups {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `account_id` as a member of `group`.
    pub fn ensure_member(&mut self, group: &DirectoryGroup, account_id: &str) {
        let entry = if let Some(pos) = self.groups.iter().position(|g| g.group_id == group.id) {
            &mut self.groups[pos]
        } else {
            self.groups.push(DesiredGroup {
                group_id: group.id.clone(),
                group_name: group.name.clone(),
                members: BTreeSet::new(),
            });
            let last = self.groups.len() - 1;
            &mut self.groups[last]
        };
        entry.members.insert(account_id.to_string());
    }

    #[must_use]
    pub fn get(&self, group_id: &str) -> Option<&DesiredGroup> {
        self.groups.iter().find(|g| g.group_id == group_id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DesiredGroup> {
        self.groups.iter()
    }
}

/// What happened to one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupAction {
    Unchanged,
    Updated,
    /// Dry-run: the update was computed but not sent.
    WouldUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupChange {
    pub group_id: String,
    pub group_name: String,
    pub previous: BTreeSet<String>,
    pub desired: BTreeSet<String>,
    pub action: GroupAction,
}

/// Whether a group needs a write: true iff the two sets differ.
#[must_use]
pub fn needs_update(current: &BTreeSet<String>, desired: &BTreeSet<String>) -> bool {
    current != desired
}

/// Bring every group in `desired` to exactly its desired membership.
pub async fn reconcile_groups(
    remotes: &Remotes,
    desired: &DesiredGroups,
    dry_run: bool,
) -> SyncResult<Vec<GroupChange>> {
    let platform = &*remotes.platform;
    let mut changes = Vec::with_capacity(desired.len());

    for group in desired.iter() {
        let current: BTreeSet<String> = remotes
            .platform_call("get_group_members", || platform.get_group_members(&group.group_id))
            .await
            .map_err(|e| {
                SyncError::remote(
                    format!("failed to get user group members for {:?}", group.group_name),
                    e,
                )
            })?
            .into_iter()
            .collect();

        let mut change = GroupChange {
            group_id: group.group_id.clone(),
            group_name: group.group_name.clone(),
            previous: current,
            desired: group.members.clone(),
            action: GroupAction::Unchanged,
        };

        if !needs_update(&change.previous, &change.desired) {
            debug!(user_group = %group.group_name, "User group already has the right members");
            changes.push(change);
            continue;
        }

        let members: Vec<String> = group.members.iter().cloned().collect();
        if dry_run {
            info!(
                user_group = %group.group_name,
                members = %members.join(","),
                "[DRY RUN] Not updating user group"
            );
            change.action = GroupAction::WouldUpdate;
            changes.push(change);
            continue;
        }

        remotes
            .platform_call("replace_group_members", || {
                platform.replace_group_members(&group.group_id, &members)
            })
            .await
            .map_err(|e| {
                SyncError::remote(
                    format!("failed to update user group members for {:?}", group.group_name),
                    e,
                )
            })?;
        info!(
            user_group = %group.group_name,
            members = %members.join(","),
            "Updated user group"
        );
        change.action = GroupAction::Updated;
        changes.push(change);
    }

    Ok(changes)
}
