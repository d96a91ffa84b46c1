use crate::core::{parse_records, render_records, Record, Result, ServiceName, Storage};
use crate::domain::model::{RestockOutcome, ServiceStock, StockReport};
use crate::utils::error::StockError;
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Services and their records, with every mutation of a service serialized
/// behind a lock keyed by its normalized name.
pub struct InventoryStore<S: Storage> {
    storage: S,
    locks: Mutex<HashMap<ServiceName, Arc<AsyncMutex<()>>>>,
}

impl<S: Storage> InventoryStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    // Entries are never evicted: a waiter may still hold the Arc after delete.
    async fn lock_service(&self, service: &ServiceName) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(service.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// 列出所有服務，讀取失敗時回傳空列表
    pub async fn list_services(&self) -> Vec<ServiceName> {
        match self.storage.list().await {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!("Failed to list services, reporting none: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn service_exists(&self, service: &str) -> Result<bool> {
        let service = ServiceName::parse(service)?;
        Ok(self.storage.read(&service).await?.is_some())
    }

    pub async fn create_service(&self, service: &str) -> Result<ServiceName> {
        let service = ServiceName::parse(service)?;
        let _guard = self.lock_service(&service).await;

        if !self.storage.create(&service).await? {
            return Err(StockError::AlreadyExists {
                service: service.to_string(),
            });
        }

        tracing::info!("Created service {}", service);
        Ok(service)
    }

    /// Delete a service, returning how many records it held.
    pub async fn delete_service(&self, service: &str) -> Result<usize> {
        let service = ServiceName::parse(service)?;
        let _guard = self.lock_service(&service).await;

        let content = self
            .storage
            .read(&service)
            .await?
            .ok_or_else(|| StockError::NotFound {
                service: service.to_string(),
            })?;
        let count = parse_records(&content).len();

        if !self.storage.remove(&service).await? {
            return Err(StockError::NotFound {
                service: service.to_string(),
            });
        }

        tracing::info!("Deleted service {} ({} records)", service, count);
        Ok(count)
    }

    /// Number of records in a service. Absent services, invalid names and
    /// read failures all count as 0; use `service_exists` to tell them apart.
    pub async fn count_records(&self, service: &str) -> usize {
        let Ok(service) = ServiceName::parse(service) else {
            return 0;
        };

        match self.storage.read(&service).await {
            Ok(Some(content)) => parse_records(&content).len(),
            Ok(None) => 0,
            Err(e) => {
                tracing::warn!("Failed to count records in {}: {}", service, e);
                0
            }
        }
    }

    /// Append the non-blank lines of `block`, creating the service if needed.
    pub async fn append_records(&self, service: &str, block: &str) -> Result<usize> {
        Ok(self.restock(service, block).await?.added)
    }

    /// Append and report both the lines added and the resulting total, taken
    /// from the same locked read-modify-write.
    pub async fn restock(&self, service: &str, block: &str) -> Result<RestockOutcome> {
        let service = ServiceName::parse(service)?;
        let added = parse_records(block);
        let _guard = self.lock_service(&service).await;

        let existing = match self.storage.read(&service).await? {
            Some(content) => content,
            None => {
                tracing::info!("Service {} missing, creating it on restock", service);
                String::new()
            }
        };
        let mut records = parse_records(&existing);
        records.extend(added.iter().cloned());
        self.storage.write(&service, &render_records(&records)).await?;

        tracing::info!(
            "Restocked {} with {} records (now {})",
            service,
            added.len(),
            records.len()
        );
        Ok(RestockOutcome {
            added: added.len(),
            total: records.len(),
        })
    }

    /// Draw `count` random records without replacement and persist the rest.
    pub async fn withdraw_random(&self, service: &str, count: usize) -> Result<Vec<Record>> {
        let service = ServiceName::parse(service)?;
        let _guard = self.lock_service(&service).await;

        let content = self
            .storage
            .read(&service)
            .await?
            .ok_or_else(|| StockError::NotFound {
                service: service.to_string(),
            })?;
        let mut pool = parse_records(&content);

        if count > pool.len() {
            return Err(StockError::InsufficientStock {
                service: service.to_string(),
                requested: count,
                available: pool.len(),
            });
        }
        if count == 0 {
            return Ok(Vec::new());
        }

        let drawn = draw_without_replacement(&mut pool, count, &mut rand::rng());
        self.storage.write(&service, &render_records(&pool)).await?;

        tracing::info!(
            "Withdrew {} records from {} ({} remaining)",
            drawn.len(),
            service,
            pool.len()
        );
        Ok(drawn)
    }

    pub async fn stock_report(&self) -> StockReport {
        let mut services = Vec::new();
        for service in self.list_services().await {
            let count = self.count_records(service.as_str()).await;
            services.push(ServiceStock { service, count });
        }

        let total = services.iter().map(|s| s.count).sum();
        StockReport {
            services,
            total,
            generated_at: chrono::Utc::now(),
        }
    }
}

/// Remove `count` uniformly random entries from `pool`, picked by index, and
/// return them in draw order. Survivors keep their relative order.
pub fn draw_without_replacement<R: Rng + ?Sized>(
    pool: &mut Vec<Record>,
    count: usize,
    rng: &mut R,
) -> Vec<Record> {
    let count = count.min(pool.len());
    let mut drawn = Vec::with_capacity(count);
    for _ in 0..count {
        let index = rng.random_range(0..pool.len());
        drawn.push(pool.remove(index));
    }
    drawn
}
