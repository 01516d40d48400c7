//! Mapping an on-call identity to a platform account.
//!
//! Email is tried first because it is the distinctive identifier. Names are
//! a fallback for directories where email fields are missing or inconsistent;
//! they are not unique within an organization.

use crate::models::{DirectoryAccount, OnCallIdentity};

/// Which field produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedBy {
    Email,
    RealName,
    Handle,
}

/// Find the account for `identity`, or `None` if nothing matches.
#[must_use]
pub fn match_account<'a>(
    identity: &OnCallIdentity,
    accounts: &'a [DirectoryAccount],
) -> Option<(&'a DirectoryAccount, MatchedBy)> {
    if !identity.email.is_empty() {
        if let Some(account) = accounts.iter().find(|a| a.email == identity.email) {
            return Some((account, MatchedBy::Email));
        }
    }

    let name = identity.name.to_lowercase();
    if name.is_empty() {
        return None;
    }

    if let Some(account) = accounts.iter().find(|a| a.real_name == name) {
        return Some((account, MatchedBy::RealName));
    }

    accounts
        .iter()
        .find(|a| a.name == name)
        .map(|account| (account, MatchedBy::Handle))
}
