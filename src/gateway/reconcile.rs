use std::collections::HashSet;

use crate::models::{Credential, CredentialStatus};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Credentials that adopted incoming usage, window or status.
    pub updated: Vec<String>,
    /// Incoming-only credentials appended to the pool.
    pub adopted: Vec<String>,
    /// Incoming-only credentials left out by the adopt filter.
    pub skipped: Vec<String>,
}

impl MergeOutcome {
    pub fn changed(&self) -> bool {
        !self.updated.is_empty() || !self.adopted.is_empty()
    }
}

/// Applies one incoming copy of a credential. Daily counters are only
/// comparable inside the same 24h window: a newer window replaces the local
/// one, an older window is ignored, and the same window takes the higher
/// counter and escalates to the cap.
fn merge_one(ours: &mut Credential, theirs: &Credential) -> bool {
    let mut changed = false;

    if theirs.day_start_timestamp > ours.day_start_timestamp {
        ours.day_start_timestamp = theirs.day_start_timestamp;
        ours.daily_usage = theirs.daily_usage;
        if theirs.status == CredentialStatus::DailyCapReached {
            ours.status = CredentialStatus::DailyCapReached;
        } else if ours.status == CredentialStatus::DailyCapReached {
            // The cap belonged to the old window. A pending penalty still holds.
            ours.status = if ours.cooldown_until > 0 {
                CredentialStatus::RateLimited
            } else {
                CredentialStatus::Ready
            };
        }
        changed = true;
    } else if theirs.day_start_timestamp == ours.day_start_timestamp {
        if theirs.daily_usage > ours.daily_usage {
            ours.daily_usage = theirs.daily_usage;
            changed = true;
        }
        if theirs.status == CredentialStatus::DailyCapReached
            && ours.status != CredentialStatus::DailyCapReached
        {
            ours.status = CredentialStatus::DailyCapReached;
            changed = true;
        }
    }

    if theirs.last_used > ours.last_used {
        ours.last_used = theirs.last_used;
        changed = true;
    }
    if theirs.usage_count > ours.usage_count {
        ours.usage_count = theirs.usage_count;
        changed = true;
    }
    changed
}

/// Merges `incoming` into `base` by username. Credentials only `incoming`
/// knows are appended when `adopt` accepts them. Applying the same snapshot
/// twice is a no-op.
pub fn merge_remote<F>(
    base: &mut Vec<Credential>,
    incoming: &[Credential],
    adopt: F,
) -> MergeOutcome
where
    F: Fn(&Credential) -> bool,
{
    let mut outcome = MergeOutcome::default();
    let known: HashSet<String> = base.iter().map(|c| c.username.clone()).collect();

    for credential in base.iter_mut() {
        let Some(theirs) = incoming.iter().find(|c| c.username == credential.username) else {
            continue;
        };
        if merge_one(credential, theirs) {
            outcome.updated.push(credential.username.clone());
        }
    }

    for theirs in incoming.iter().filter(|c| !known.contains(&c.username)) {
        if adopt(theirs) {
            base.push(theirs.clone());
            outcome.adopted.push(theirs.username.clone());
        } else {
            outcome.skipped.push(theirs.username.clone());
        }
    }
    outcome
}

/// Startup view: the shared document is the base, the local mirror
/// contributes its usage. Mirror-only credentials survive only when they were
/// created after the document was last written, i.e. never pushed.
pub fn rebase_on_remote(
    remote: Vec<Credential>,
    remote_updated_at: i64,
    local: &[Credential],
) -> (Vec<Credential>, MergeOutcome) {
    let mut pool = remote;
    let outcome = merge_remote(&mut pool, local, |c| c.created_at > remote_updated_at);
    (pool, outcome)
}
