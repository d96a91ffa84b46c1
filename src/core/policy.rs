use crate::config::{PolicyConfig, TierConfig};
use crate::domain::model::{AccessGrant, Quota};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

type CooldownSlot = Arc<Mutex<Option<Instant>>>;

/// Tier resolution plus per-caller cooldown tracking.
///
/// Cooldown timestamps live only in memory and are lost when the policy is
/// dropped. Each caller has its own slot, so check-and-record for one caller
/// never waits on another.
#[derive(Debug)]
pub struct AccessPolicy {
    owner: String,
    tiers: Vec<TierConfig>,
    cooldowns: Mutex<HashMap<String, CooldownSlot>>,
}

impl AccessPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        tracing::debug!(
            "Access policy loaded with {} tiers: {:?}",
            config.tiers.len(),
            config.tiers.iter().map(|t| t.name.as_str()).collect::<Vec<_>>()
        );

        Self {
            owner: config.owner,
            tiers: config.tiers,
            cooldowns: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_owner(&self, caller: &str) -> bool {
        caller == self.owner
    }

    /// Owner first, then tiers in configured order; first match wins.
    pub fn resolve_grant<M: AsRef<str>>(&self, caller: &str, memberships: &[M]) -> AccessGrant {
        if self.is_owner(caller) {
            return AccessGrant::owner();
        }

        let matched = self.tiers.iter().find(|tier| {
            memberships
                .iter()
                .any(|m| m.as_ref() == tier.role_key())
        });

        match matched {
            Some(tier) => AccessGrant {
                allowed: true,
                max_withdraw: Quota::Limited(tier.max_withdraw),
                cooldown: tier.cooldown(),
                tier: Some(tier.name.clone()),
            },
            None => AccessGrant::denied(),
        }
    }

    /// Returns 0 and records now as the caller's last use when the cooldown
    /// has elapsed (or there is no prior use). Otherwise leaves the timestamp
    /// alone and returns the remaining whole seconds, rounded up.
    ///
    /// Call once per attempted withdrawal, after the quota check.
    pub fn check_and_record_cooldown(&self, caller: &str, cooldown: Duration) -> u64 {
        let slot = {
            let mut cooldowns = self.cooldowns.lock().unwrap_or_else(PoisonError::into_inner);
            cooldowns.entry(caller.to_string()).or_default().clone()
        };

        let mut last_used = slot.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        if let Some(previous) = *last_used {
            let elapsed = now.saturating_duration_since(previous);
            if elapsed < cooldown {
                let remaining = ceil_secs(cooldown - elapsed);
                tracing::debug!("Caller {} cooling down, {}s remaining", caller, remaining);
                return remaining;
            }
        }

        *last_used = Some(now);
        0
    }

    /// Number of callers with a recorded withdrawal.
    pub fn tracked_callers(&self) -> usize {
        self.cooldowns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    if duration.subsec_nanos() > 0 {
        duration.as_secs() + 1
    } else {
        duration.as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> AccessPolicy {
        AccessPolicy::new(PolicyConfig {
            owner: "owner-1".to_string(),
            tiers: vec![
                TierConfig::new("silver", 5, Duration::from_secs(30)).with_role("role-silver"),
                TierConfig::new("bronze", 1, Duration::from_secs(60)).with_role("role-bronze"),
            ],
        })
    }

    #[test]
    fn test_owner_is_unlimited() {
        let grant = policy().resolve_grant::<&str>("owner-1", &[]);
        assert_eq!(grant, AccessGrant::owner());
        assert!(grant.max_withdraw.permits(10_000));
        assert_eq!(grant.cooldown, Duration::ZERO);
    }

    #[test]
    fn test_highest_tier_wins() {
        let grant = policy().resolve_grant("user", &["role-bronze", "role-silver"]);
        assert!(grant.allowed);
        assert_eq!(grant.tier.as_deref(), Some("silver"));
        assert_eq!(grant.max_withdraw, Quota::Limited(5));
        assert_eq!(grant.cooldown, Duration::from_secs(30));
    }

    #[test]
    fn test_single_lower_tier() {
        let grant = policy().resolve_grant("user", &["role-bronze".to_string()]);
        assert_eq!(grant.tier.as_deref(), Some("bronze"));
        assert_eq!(grant.max_withdraw, Quota::Limited(1));
    }

    #[test]
    fn test_no_tier_is_denied() {
        let grant = policy().resolve_grant("user", &["role-gold"]);
        assert!(!grant.allowed);
        assert!(!grant.max_withdraw.permits(1));
    }

    #[test]
    fn test_tier_name_is_not_a_membership_when_role_set() {
        let grant = policy().resolve_grant("user", &["silver"]);
        assert!(!grant.allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_blocks_then_expires() {
        let policy = policy();
        let cooldown = Duration::from_millis(5000);

        assert_eq!(policy.check_and_record_cooldown("user", cooldown), 0);

        tokio::time::advance(Duration::from_millis(1200)).await;
        let remaining = policy.check_and_record_cooldown("user", cooldown);
        assert_eq!(remaining, 4);

        tokio::time::advance(Duration::from_millis(3800)).await;
        assert_eq!(policy.check_and_record_cooldown("user", cooldown), 0);

        // the successful check above restarted the window
        assert_eq!(policy.check_and_record_cooldown("user", cooldown), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_check_does_not_extend_window() {
        let policy = policy();
        let cooldown = Duration::from_secs(10);

        assert_eq!(policy.check_and_record_cooldown("user", cooldown), 0);
        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(policy.check_and_record_cooldown("user", cooldown), 1);
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(policy.check_and_record_cooldown("user", cooldown), 0);
    }

    #[test]
    fn test_cooldowns_are_per_caller() {
        let policy = policy();
        let cooldown = Duration::from_secs(60);

        assert_eq!(policy.check_and_record_cooldown("a", cooldown), 0);
        assert_eq!(policy.check_and_record_cooldown("b", cooldown), 0);
        assert!(policy.check_and_record_cooldown("a", cooldown) >= 1);
        assert_eq!(policy.tracked_callers(), 2);
    }

    #[test]
    fn test_zero_cooldown_never_blocks() {
        let policy = policy();
        for _ in 0..3 {
            assert_eq!(policy.check_and_record_cooldown("owner-1", Duration::ZERO), 0);
        }
    }

    #[test]
    fn test_concurrent_checks_admit_one() {
        let policy = Arc::new(policy());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let policy = Arc::clone(&policy);
                std::thread::spawn(move || {
                    policy.check_and_record_cooldown("racer", Duration::from_secs(60))
                })
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|remaining| *remaining == 0)
            .count();
        assert_eq!(admitted, 1);
    }

    #[test]
    fn test_ceil_secs() {
        assert_eq!(ceil_secs(Duration::from_millis(1)), 1);
        assert_eq!(ceil_secs(Duration::from_secs(5)), 5);
        assert_eq!(ceil_secs(Duration::from_millis(4001)), 5);
    }
}
