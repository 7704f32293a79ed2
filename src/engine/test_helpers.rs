//! Shared test helpers for creating OutreachEngine instances in tests.

use crate::channel::{ChannelSender, SendOutcome};
use crate::config::Config;
use crate::contacts::ContactStore;
use crate::db::{Database, NewContact};
use crate::delay::{Delay, WaitOutcome};
use crate::engine::OutreachEngine;
use crate::types::{
    CampaignDefinition, ContactId, ContactType, Event, Exclusions, MessagePayload, Priority,
    SendType, SourcePool, TargetRule,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Channel that records every phone it is handed and fails a chosen set
#[derive(Default)]
pub(crate) struct ScriptedSender {
    sent: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
}

impl ScriptedSender {
    pub(crate) fn fail_for(&self, phone: &str) {
        self.failing.lock().unwrap().insert(phone.to_string());
    }

    pub(crate) fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelSender for ScriptedSender {
    async fn send(&self, phone: &str, _payload: &MessagePayload) -> SendOutcome {
        self.sent.lock().unwrap().push(phone.to_string());
        if self.failing.lock().unwrap().contains(phone) {
            SendOutcome::Failed {
                error: "provider rejected the number".into(),
            }
        } else {
            SendOutcome::Delivered {
                provider_message_id: Some(format!("msg-{phone}")),
            }
        }
    }
}

/// Delay that records requested durations and elapses instantly
///
/// While held, waits block until their token is cancelled, which stands in for a long
/// inter-batch cooldown.
#[derive(Default)]
pub(crate) struct ScriptedDelay {
    waits: Mutex<Vec<Duration>>,
    held: AtomicBool,
}

impl ScriptedDelay {
    pub(crate) fn hold(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    pub(crate) fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
    }

    pub(crate) fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Delay for ScriptedDelay {
    async fn wait(&self, duration: Duration, cancel: &CancellationToken) -> WaitOutcome {
        self.waits.lock().unwrap().push(duration);
        if cancel.is_cancelled() {
            return WaitOutcome::Cancelled;
        }
        if self.held.load(Ordering::SeqCst) {
            cancel.cancelled().await;
            return WaitOutcome::Cancelled;
        }
        WaitOutcome::Elapsed
    }
}

/// Engine wired to scripted components, plus handles to drive them
pub(crate) struct TestEngine {
    pub(crate) engine: OutreachEngine,
    pub(crate) sender: Arc<ScriptedSender>,
    pub(crate) delay: Arc<ScriptedDelay>,
    _temp_dir: tempfile::TempDir,
}

/// Config used by engine tests: no pacing, so only inter-batch waits reach the delay
pub(crate) fn test_config() -> Config {
    let mut config = Config::default();
    config.dispatch.pacing_delay = Duration::ZERO;
    config.dispatch.default_inter_batch_delay = Duration::from_secs(300);
    config.automation.pacing_delay = Duration::ZERO;
    config.dedup.merge_lock_timeout = Duration::from_millis(100);
    config
}

/// Helper to create a test OutreachEngine with a persistent database.
/// The returned TestEngine owns the tempdir, which must be kept alive.
pub(crate) async fn create_test_engine() -> TestEngine {
    create_test_engine_with(test_config()).await
}

pub(crate) async fn create_test_engine_with(mut config: Config) -> TestEngine {
    let temp_dir = tempdir().unwrap();
    config.persistence.database_path = temp_dir.path().join("outreach.db");

    let db = Arc::new(
        Database::new(&config.persistence.database_path)
            .await
            .unwrap(),
    );
    let sender = Arc::new(ScriptedSender::default());
    let delay = Arc::new(ScriptedDelay::default());
    let contacts = ContactStore::from_database(db.clone());

    let engine =
        OutreachEngine::with_components(config, db, sender.clone(), delay.clone(), contacts);

    TestEngine {
        engine,
        sender,
        delay,
        _temp_dir: temp_dir,
    }
}

/// Phone number of the `n`th seeded contact
pub(crate) fn phone(n: usize) -> String {
    format!("+9715000{:05}", n)
}

/// Insert `count` contacts into `pool`, numbered from `first`
pub(crate) async fn seed_contacts(
    engine: &OutreachEngine,
    pool: SourcePool,
    first: usize,
    count: usize,
) -> Vec<ContactId> {
    let mut ids = Vec::with_capacity(count);
    for n in first..first + count {
        let id = engine
            .db
            .insert_contact(&NewContact {
                source_pool: pool,
                name: format!("Contact {n}"),
                phone: Some(phone(n)),
                email: None,
                company: None,
                notes: None,
                contact_type: ContactType::Client,
                tags: vec![],
                priority: Priority::Medium,
            })
            .await
            .unwrap();
        ids.push(id);
    }
    ids
}

pub(crate) fn definition(name: &str, send_type: SendType) -> CampaignDefinition {
    CampaignDefinition {
        name: name.to_string(),
        payload: MessagePayload::Text {
            body: "Viewing slots open this weekend".into(),
        },
        target: TargetRule::All,
        exclusions: Exclusions::default(),
        send_type,
        max_retries: None,
    }
}

/// Wait for the first event matching `predicate`
pub(crate) async fn wait_for_event(
    rx: &mut broadcast::Receiver<Event>,
    predicate: impl Fn(&Event) -> bool,
) -> Event {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Ok(event) if predicate(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}
