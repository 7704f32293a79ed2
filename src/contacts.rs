//! Contact pools
//!
//! Contacts are imported from several named source pools. The engine only needs to list a
//! pool and retire a record from it; [`ContactStore`] is the registry of pools the engine was
//! built with.

use crate::db::Database;
use crate::error::{Error, Result};
use crate::types::{Contact, ContactId, SourcePool};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One source pool of contacts
#[async_trait]
pub trait ContactPool: Send + Sync {
    /// Which pool this is
    fn source(&self) -> SourcePool;

    /// Live contacts of this pool
    async fn list(&self) -> Result<Vec<Contact>>;

    /// Retire a contact of this pool
    async fn delete(&self, id: ContactId) -> Result<()>;
}

/// [`ContactPool`] backed by the `contacts` table
pub struct DbContactPool {
    db: Arc<Database>,
    source: SourcePool,
}

impl DbContactPool {
    /// Pool view over `db` for `source`
    pub fn new(db: Arc<Database>, source: SourcePool) -> Self {
        Self { db, source }
    }
}

#[async_trait]
impl ContactPool for DbContactPool {
    fn source(&self) -> SourcePool {
        self.source
    }

    async fn list(&self) -> Result<Vec<Contact>> {
        self.db.list_pool_contacts(self.source).await
    }

    async fn delete(&self, id: ContactId) -> Result<()> {
        self.db.retire_contact(self.source, id).await
    }
}

/// Registry of source pools, iterated most trusted first
#[derive(Clone, Default)]
pub struct ContactStore {
    pools: BTreeMap<SourcePool, Arc<dyn ContactPool>>,
}

impl ContactStore {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Every known pool backed by `db`
    pub fn from_database(db: Arc<Database>) -> Self {
        let mut store = Self::new();
        for source in SourcePool::ALL {
            store.register(Arc::new(DbContactPool::new(db.clone(), source)));
        }
        store
    }

    /// Add or replace a pool
    pub fn register(&mut self, pool: Arc<dyn ContactPool>) {
        self.pools.insert(pool.source(), pool);
    }

    /// Look up a pool
    pub fn get(&self, source: SourcePool) -> Result<&Arc<dyn ContactPool>> {
        self.pools
            .get(&source)
            .ok_or_else(|| Error::NotFound(format!("source pool {source} is not registered")))
    }

    /// Registered pools, most trusted first
    pub fn sources(&self) -> Vec<SourcePool> {
        self.pools.keys().copied().collect()
    }

    /// Live contacts of `sources` (all registered pools when empty), most trusted pool first
    pub async fn list(&self, sources: &[SourcePool]) -> Result<Vec<Contact>> {
        let mut contacts = Vec::new();
        for (source, pool) in &self.pools {
            if !sources.is_empty() && !sources.contains(source) {
                continue;
            }
            contacts.extend(pool.list().await?);
        }
        Ok(contacts)
    }
}
