//! Outreach engine split into focused submodules.
//!
//! The `OutreachEngine` struct and its methods are organized by domain:
//! - [`campaigns`] - Campaign creation, listing and deletion
//! - [`control`] - Campaign lifecycle control (start/pause/resume/cancel/retry)
//! - [`dispatch`] - The dispatch run that drains a campaign's pending recipients
//! - [`progress`] - Progress snapshots
//! - [`duplicates`] - Duplicate detection and merge under pool locks
//! - [`tasks`] - Automated task management and the poller
//! - [`lifecycle`] - Startup restore and shutdown coordination

mod campaigns;
mod control;
mod dispatch;
mod duplicates;
mod lifecycle;
mod progress;
mod tasks;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use dispatch::{DispatchReport, RunOutcome};
pub use duplicates::{MergeRequest, PrimaryOverride};

use crate::automation::{AutomationScheduler, TaskRunner};
use crate::channel::{self, ChannelSender};
use crate::config::Config;
use crate::contacts::ContactStore;
use crate::db::Database;
use crate::delay::{Delay, TokioDelay};
use crate::error::Result;
use crate::pool_lock::PoolLocks;
use crate::types::{CampaignId, Event};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{Mutex, Semaphore, broadcast};
use tokio_util::sync::CancellationToken;

/// A registered dispatch run
pub(crate) struct ActiveRun {
    pub(crate) token: CancellationToken,
    pub(crate) generation: u64,
}

/// Dispatch run bookkeeping
#[derive(Clone)]
pub(crate) struct DispatchState {
    /// Limits how many campaigns dispatch at once (respects max_concurrent_campaigns)
    pub(crate) concurrent_limit: Arc<Semaphore>,
    /// Cancellation tokens of every registered run per campaign, used by pause/cancel/shutdown
    pub(crate) active_runs: Arc<Mutex<HashMap<CampaignId, Vec<ActiveRun>>>>,
    /// Per-campaign run locks; at most one run walks a campaign at a time
    pub(crate) campaign_locks: Arc<Mutex<HashMap<CampaignId, Arc<Mutex<()>>>>>,
    /// Source of run generations
    pub(crate) next_generation: Arc<AtomicU64>,
    /// Flag to indicate whether new runs are accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
}

impl DispatchState {
    fn new(max_concurrent: usize) -> Self {
        Self {
            concurrent_limit: Arc::new(Semaphore::new(max_concurrent)),
            active_runs: Arc::new(Mutex::new(HashMap::new())),
            campaign_locks: Arc::new(Mutex::new(HashMap::new())),
            next_generation: Arc::new(AtomicU64::new(1)),
            accepting_new: Arc::new(AtomicBool::new(true)),
        }
    }
}

/// Main engine instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct OutreachEngine {
    /// Database instance for persistence
    /// Public for integration tests to query recipient state
    pub db: Arc<Database>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Configuration
    pub(crate) config: Arc<Config>,
    /// Outbound message channel shared by campaigns and automated tasks
    pub(crate) channel: Arc<dyn ChannelSender>,
    /// Cancellable timer used for pacing and inter-batch waits
    pub(crate) delay: Arc<dyn Delay>,
    /// Source pools contacts are read from and retired through
    pub(crate) contacts: ContactStore,
    /// Advisory locks serializing merges against dispatch per pool
    pub(crate) pool_locks: PoolLocks,
    /// Dispatch run bookkeeping
    pub(crate) dispatch: DispatchState,
    /// Automated task poller
    pub(crate) automation: AutomationScheduler,
}

impl OutreachEngine {
    /// Create a new OutreachEngine instance
    ///
    /// This initializes all core components:
    /// - Validates the configuration
    /// - Opens/creates the SQLite database and runs migrations
    /// - Builds the channel sender (HTTP provider or loopback)
    /// - Registers one SQLite-backed contact pool per source pool
    /// - Restores campaigns interrupted by the previous process
    /// - Starts the automation poller when automated sends are enabled
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let db = Arc::new(Database::new(&config.persistence.database_path).await?);
        let channel = channel::from_config(&config.channel)?;
        let contacts = ContactStore::from_database(db.clone());

        let engine = Self::with_components(config, db, channel, Arc::new(TokioDelay), contacts);

        engine.restore_on_startup().await?;
        if engine.config.automation.auto_send_enabled {
            engine.automation.start();
        }

        Ok(engine)
    }

    /// Assemble an engine from explicit components
    ///
    /// Use this to plug in an external contact store or channel. Nothing is restored and no
    /// background task is started; call [`restore_on_startup`](Self::restore_on_startup) and
    /// [`start_scheduler`](Self::start_scheduler) as needed.
    pub fn with_components(
        config: Config,
        db: Arc<Database>,
        channel: Arc<dyn ChannelSender>,
        delay: Arc<dyn Delay>,
        contacts: ContactStore,
    ) -> Self {
        // Create broadcast channel with buffer size of 1000 events
        let (event_tx, _rx) = broadcast::channel(1000);
        let pool_locks = PoolLocks::new();

        let runner = TaskRunner::new(
            db.clone(),
            contacts.clone(),
            channel.clone(),
            delay.clone(),
            pool_locks.clone(),
            config.automation.clone(),
            event_tx.clone(),
        );
        let automation =
            AutomationScheduler::new(db.clone(), runner, config.automation.check_interval);

        let dispatch = DispatchState::new(config.dispatch.max_concurrent_campaigns);

        tracing::info!(
            max_concurrent_campaigns = config.dispatch.max_concurrent_campaigns,
            pools = contacts.sources().len(),
            "Outreach engine initialized"
        );

        Self {
            db,
            event_tx,
            config: Arc::new(config),
            channel,
            delay,
            contacts,
            pool_locks,
            dispatch,
            automation,
        }
    }

    /// Subscribe to engine events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// A subscriber that falls behind by more than 1000 events receives
    /// `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Contact store the engine reads from
    pub fn contacts(&self) -> &ContactStore {
        &self.contacts
    }

    /// Emit an event to all subscribers
    ///
    /// Events are silently dropped when nobody is subscribed.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    pub(crate) fn is_accepting(&self) -> bool {
        self.dispatch.accepting_new.load(Ordering::SeqCst)
    }

    /// Spawn the REST API server in a background task
    pub fn spawn_api_server(&self) -> tokio::task::JoinHandle<Result<()>> {
        let engine = Arc::new(self.clone());
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(engine, config).await })
    }
}
