use crate::core::inventory::InventoryStore;
use crate::core::policy::AccessPolicy;
use crate::core::{Record, Result, ServiceName, Storage};
use crate::domain::model::{Quota, RestockOutcome, StockReport};
use crate::utils::error::StockError;

/// Gatekeeper a front end talks to: authorizes a caller, then runs the
/// operation against the store. Never formats replies.
pub struct Dispenser<S: Storage> {
    store: InventoryStore<S>,
    policy: AccessPolicy,
}

impl<S: Storage> Dispenser<S> {
    pub fn new(store: InventoryStore<S>, policy: AccessPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &InventoryStore<S> {
        &self.store
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Withdraw `count` random records on behalf of `caller`.
    ///
    /// Checks run in order: tier, quota, cooldown, stock. A request rejected
    /// before the cooldown check does not start a cooldown; one rejected by
    /// the store afterwards has already used its slot.
    pub async fn generate<M: AsRef<str>>(
        &self,
        caller: &str,
        memberships: &[M],
        service: &str,
        count: usize,
    ) -> Result<Vec<Record>> {
        if count == 0 {
            return Err(StockError::InvalidCount { count });
        }

        let grant = self.policy.resolve_grant(caller, memberships);
        if !grant.allowed {
            tracing::debug!("Denied generate for {}: no tier", caller);
            return Err(StockError::PolicyDenied {
                caller: caller.to_string(),
            });
        }

        if let Quota::Limited(max) = grant.max_withdraw {
            if count > max {
                return Err(StockError::QuotaExceeded {
                    requested: count,
                    max,
                });
            }
        }

        let remaining_secs = self.policy.check_and_record_cooldown(caller, grant.cooldown);
        if remaining_secs > 0 {
            return Err(StockError::CooldownActive { remaining_secs });
        }

        let records = self.store.withdraw_random(service, count).await?;
        tracing::info!(
            "{} generated {} records from {} (tier: {})",
            caller,
            records.len(),
            service,
            grant.tier.as_deref().unwrap_or("owner")
        );
        Ok(records)
    }

    pub async fn restock(&self, caller: &str, service: &str, block: &str) -> Result<RestockOutcome> {
        self.require_owner(caller)?;
        self.store.restock(service, block).await
    }

    pub async fn create_service(&self, caller: &str, service: &str) -> Result<ServiceName> {
        self.require_owner(caller)?;
        self.store.create_service(service).await
    }

    pub async fn delete_service(&self, caller: &str, service: &str) -> Result<usize> {
        self.require_owner(caller)?;
        self.store.delete_service(service).await
    }

    pub async fn stock_report(&self) -> StockReport {
        self.store.stock_report().await
    }

    fn require_owner(&self, caller: &str) -> Result<()> {
        if self.policy.is_owner(caller) {
            Ok(())
        } else {
            Err(StockError::OwnerOnly {
                caller: caller.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStorage;
    use crate::config::{PolicyConfig, TierConfig};
    use std::time::Duration;

    const OWNER: &str = "owner-1";

    async fn dispenser() -> Dispenser<MemoryStorage> {
        let policy = AccessPolicy::new(PolicyConfig {
            owner: OWNER.to_string(),
            tiers: vec![
                TierConfig::new("silver", 3, Duration::from_secs(30)),
                TierConfig::new("bronze", 1, Duration::from_secs(60)),
            ],
        });
        let dispenser = Dispenser::new(InventoryStore::new(MemoryStorage::new()), policy);
        dispenser
            .restock(OWNER, "netflix", "a\nb\nc\nd\ne\nf\n")
            .await
            .unwrap();
        dispenser
    }

    #[tokio::test]
    async fn test_generate_within_quota() {
        let dispenser = dispenser().await;

        let records = dispenser
            .generate("user", &["silver"], "Netflix", 3)
            .await
            .unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(dispenser.store().count_records("netflix").await, 3);
    }

    #[tokio::test]
    async fn test_over_quota_does_not_start_cooldown() {
        let dispenser = dispenser().await;

        let err = dispenser
            .generate("user", &["bronze"], "netflix", 2)
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::QuotaExceeded { requested: 2, max: 1 }));

        let records = dispenser
            .generate("user", &["bronze"], "netflix", 1)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_second_generate_hits_cooldown() {
        let dispenser = dispenser().await;

        dispenser.generate("user", &["bronze"], "netflix", 1).await.unwrap();
        let err = dispenser
            .generate("user", &["bronze"], "netflix", 1)
            .await
            .unwrap_err();

        match err {
            StockError::CooldownActive { remaining_secs } => {
                assert!((1..=60).contains(&remaining_secs))
            }
            other => panic!("expected cooldown, got {other:?}"),
        }
        assert_eq!(dispenser.store().count_records("netflix").await, 5);
    }

    #[tokio::test]
    async fn test_no_tier_is_denied() {
        let dispenser = dispenser().await;
        let err = dispenser
            .generate::<&str>("stranger", &[], "netflix", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::PolicyDenied { .. }));
        assert_eq!(dispenser.policy().tracked_callers(), 0);
    }

    #[tokio::test]
    async fn test_owner_unlimited_and_uncooled() {
        let dispenser = dispenser().await;

        assert_eq!(
            dispenser.generate::<&str>(OWNER, &[], "netflix", 4).await.unwrap().len(),
            4
        );
        assert_eq!(
            dispenser.generate::<&str>(OWNER, &[], "netflix", 2).await.unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn test_zero_count_rejected() {
        let dispenser = dispenser().await;
        let err = dispenser
            .generate::<&str>(OWNER, &[], "netflix", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::InvalidCount { count: 0 }));
    }

    #[tokio::test]
    async fn test_missing_service_surfaces_not_found() {
        let dispenser = dispenser().await;
        let err = dispenser
            .generate("user", &["silver"], "ghost", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_admin_operations_are_owner_only() {
        let dispenser = dispenser().await;

        assert!(matches!(
            dispenser.restock("user", "netflix", "x").await.unwrap_err(),
            StockError::OwnerOnly { .. }
        ));
        assert!(matches!(
            dispenser.create_service("user", "hulu").await.unwrap_err(),
            StockError::OwnerOnly { .. }
        ));
        assert!(matches!(
            dispenser.delete_service("user", "netflix").await.unwrap_err(),
            StockError::OwnerOnly { .. }
        ));

        dispenser.create_service(OWNER, "hulu").await.unwrap();
        let outcome = dispenser.restock(OWNER, "hulu", "1\n\n2").await.unwrap();
        assert_eq!(outcome, RestockOutcome { added: 2, total: 2 });
        assert_eq!(dispenser.delete_service(OWNER, "hulu").await.unwrap(), 2);

        let report = dispenser.stock_report().await;
        assert_eq!(report.services.len(), 1);
        assert_eq!(report.total, 6);
    }
}
