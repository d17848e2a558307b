use crate::models::{Credential, CredentialStatus};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshReport {
    pub cooldowns_cleared: usize,
    pub windows_reset: usize,
}

impl RefreshReport {
    pub fn changed(&self) -> bool {
        self.cooldowns_cleared > 0 || self.windows_reset > 0
    }
}

/// Lazily applies time-based transitions. `Exhausted` is never touched.
pub fn refresh_statuses(pool: &mut [Credential], now_ms: i64, day_ms: i64) -> RefreshReport {
    let mut report = RefreshReport::default();
    for credential in pool.iter_mut() {
        if credential.status == CredentialStatus::RateLimited && now_ms > credential.cooldown_until
        {
            credential.status = CredentialStatus::Ready;
            credential.cooldown_until = 0;
            report.cooldowns_cleared += 1;
            tracing::debug!(username = %credential.username, "Cooldown elapsed, credential ready");
        }

        if now_ms - credential.day_start_timestamp > day_ms {
            credential.daily_usage = 0;
            credential.day_start_timestamp = now_ms;
            if credential.status == CredentialStatus::DailyCapReached {
                // A penalty taken while capped outlives the window reset.
                credential.status = if credential.cooldown_until > now_ms {
                    CredentialStatus::RateLimited
                } else {
                    credential.cooldown_until = 0;
                    CredentialStatus::Ready
                };
            }
            report.windows_reset += 1;
        }
    }
    report
}
