//! Test configuration helpers for engines backed by a mock messaging provider

use bulk_outreach::{Config, OutreachEngine};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;

/// An engine plus everything that must outlive it
pub struct TestHarness {
    /// Engine under test
    pub engine: OutreachEngine,
    /// Mock provider the engine sends to
    pub provider: MockServer,
    /// Configuration the engine was built from
    pub config: Config,
    /// Holds the database file
    pub temp_dir: TempDir,
}

/// Configuration pointing at `provider_url` with a fresh database in `temp_dir`
///
/// Pacing is disabled and gradual campaigns that do not choose their own batching get
/// batches of 2 with no pause in between.
pub fn create_test_config(temp_dir: &TempDir, provider_url: &str) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = temp_dir.path().join("outreach.db");
    config.channel.endpoint = Some(provider_url.to_string());
    config.channel.api_token = Some("test-token".to_string());
    config.channel.timeout = Duration::from_secs(5);
    config.dispatch.pacing_delay = Duration::ZERO;
    config.dispatch.default_batch_size = 2;
    config.dispatch.default_inter_batch_delay = Duration::ZERO;
    config.automation.pacing_delay = Duration::ZERO;
    config
}

/// Start a mock provider and an engine that sends to it
pub async fn create_test_harness() -> TestHarness {
    create_test_harness_with(|_| {}).await
}

/// Like [`create_test_harness`], adjusting the config before the engine is built
pub async fn create_test_harness_with(adjust: impl FnOnce(&mut Config)) -> TestHarness {
    let provider = MockServer::start().await;
    let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
    let mut config = create_test_config(&temp_dir, &provider.uri());
    adjust(&mut config);
    let engine = OutreachEngine::new(config.clone())
        .await
        .expect("failed to create engine");

    TestHarness {
        engine,
        provider,
        config,
        temp_dir,
    }
}
