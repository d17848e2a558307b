use crate::constants;
use crate::error::{ExhaustionCause, GatewayError};
use crate::models::{Credential, CredentialStatus, GatewayConfig};

use super::refresh::refresh_statuses;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub daily_limit: u32,
    pub safety_cooldown_ms: i64,
    pub day_ms: i64,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            daily_limit: constants::DAILY_LIMIT,
            safety_cooldown_ms: constants::SAFETY_COOLDOWN_MS,
            day_ms: constants::DAY_MS,
        }
    }
}

impl From<&GatewayConfig> for SelectionPolicy {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            daily_limit: config.daily_limit,
            safety_cooldown_ms: (config.safety_cooldown_secs as i64).saturating_mul(1000),
            day_ms: constants::DAY_MS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Selection {
    /// Snapshot taken after the pre-commit.
    pub credential: Credential,
    /// True when every candidate was inside its safety cooldown.
    pub velocity_warning: bool,
}

fn is_candidate(c: &Credential, policy: &SelectionPolicy) -> bool {
    c.status == CredentialStatus::Ready && c.daily_usage < policy.daily_limit
}

fn exhaustion_cause(pool: &[Credential], policy: &SelectionPolicy) -> ExhaustionCause {
    if pool.is_empty() {
        return ExhaustionCause::EmptyPool;
    }
    let capped = pool
        .iter()
        .filter(|c| {
            matches!(
                c.status,
                CredentialStatus::DailyCapReached | CredentialStatus::Exhausted
            ) || c.daily_usage >= policy.daily_limit
        })
        .count();
    let cooling = pool
        .iter()
        .filter(|c| c.status == CredentialStatus::RateLimited && c.daily_usage < policy.daily_limit)
        .count();
    if capped == pool.len() {
        ExhaustionCause::DailyCaps
    } else if cooling == pool.len() {
        ExhaustionCause::Cooldowns
    } else {
        ExhaustionCause::Mixed
    }
}

/// Index of the credential sequential filling would hand out next.
pub fn pick_index(
    pool: &[Credential],
    now_ms: i64,
    policy: &SelectionPolicy,
) -> Result<(usize, bool), ExhaustionCause> {
    let candidates: Vec<usize> = (0..pool.len())
        .filter(|&i| is_candidate(&pool[i], policy))
        .collect();
    if candidates.is_empty() {
        return Err(exhaustion_cause(pool, policy));
    }

    let safe = candidates
        .iter()
        .copied()
        .filter(|&i| now_ms - pool[i].last_used > policy.safety_cooldown_ms)
        .min_by(|&a, &b| {
            pool[b]
                .daily_usage
                .cmp(&pool[a].daily_usage)
                .then_with(|| pool[a].username.cmp(&pool[b].username))
        });
    if let Some(i) = safe {
        return Ok((i, false));
    }

    let fallback = candidates
        .iter()
        .copied()
        .min_by(|&a, &b| {
            pool[a]
                .last_used
                .cmp(&pool[b].last_used)
                .then_with(|| pool[a].username.cmp(&pool[b].username))
        })
        .ok_or_else(|| exhaustion_cause(pool, policy))?;
    Ok((fallback, true))
}

/// Refresh, pick and pre-commit in one step. The caller holds the pool lock
/// for the whole call so two selections never see the same budget.
pub fn select_and_commit(
    pool: &mut [Credential],
    now_ms: i64,
    policy: &SelectionPolicy,
) -> Result<Selection, GatewayError> {
    refresh_statuses(pool, now_ms, policy.day_ms);
    let (index, velocity_warning) =
        pick_index(pool, now_ms, policy).map_err(GatewayError::exhausted)?;

    let credential = &mut pool[index];
    if velocity_warning {
        tracing::warn!(
            username = %credential.username,
            last_used = credential.last_used,
            "All candidates inside safety cooldown, reusing least recently used credential"
        );
    }
    credential.mark_used(now_ms, policy.daily_limit);
    tracing::debug!(
        username = %credential.username,
        daily_usage = credential.daily_usage,
        "Credential selected"
    );
    Ok(Selection {
        credential: credential.clone(),
        velocity_warning,
    })
}
