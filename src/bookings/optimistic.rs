//! Two-phase optimistic membership changes

use std::collections::BTreeSet;

use crate::groups::GroupId;

/// The change a user action asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    Join(GroupId),
    Leave(GroupId),
}

impl MembershipChange {
    pub fn group_id(self) -> GroupId {
        match self {
            MembershipChange::Join(id) | MembershipChange::Leave(id) => id,
        }
    }
}

/// An optimistic edit of the enrolled set
///
/// `apply` edits the set and remembers what it looked like before.
/// Exactly one of `commit` or `rollback` then consumes the update.
#[derive(Debug)]
pub struct OptimisticUpdate {
    change: MembershipChange,
    snapshot: Option<BTreeSet<GroupId>>,
}

impl OptimisticUpdate {
    pub fn new(change: MembershipChange) -> Self {
        Self { change, snapshot: None }
    }

    /// Edit `enrolled` ahead of the server
    pub fn apply(&mut self, enrolled: &mut BTreeSet<GroupId>) {
        self.snapshot = Some(enrolled.clone());
        match self.change {
            MembershipChange::Join(id) => {
                enrolled.insert(id);
            }
            MembershipChange::Leave(id) => {
                enrolled.remove(&id);
            }
        }
    }

    /// The server accepted the change. Its view replaces ours when known;
    /// otherwise the optimistic edit stands.
    pub fn commit(self, enrolled: &mut BTreeSet<GroupId>, server: Option<BTreeSet<GroupId>>) {
        if let Some(server) = server {
            *enrolled = server;
        }
    }

    /// The server refused; restore the set seen by `apply`
    pub fn rollback(self, enrolled: &mut BTreeSet<GroupId>) {
        if let Some(snapshot) = self.snapshot {
            *enrolled = snapshot;
        }
    }
}
