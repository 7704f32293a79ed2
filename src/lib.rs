//! # bulk-outreach
//!
//! Backend library for bulk outbound messaging: campaigns to contacts held in several
//! source pools, paced and resumable, plus recurring automated sends and cross-pool
//! duplicate cleanup.
//!
//! ## Design Philosophy
//!
//! bulk-outreach is designed to be:
//! - **Resumable** - Every send is checkpointed in SQLite before and after it goes out
//! - **Sensible defaults** - Works out of the box with zero configuration
//! - **Library-first** - The REST API is optional; everything is a method on [`OutreachEngine`]
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use bulk_outreach::{
//!     CampaignDefinition, Config, Exclusions, MessagePayload, OutreachEngine, SendType,
//!     TargetRule,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = OutreachEngine::new(Config::default()).await?;
//!
//!     // Subscribe to events
//!     let mut events = engine.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let campaign = engine
//!         .create_campaign(CampaignDefinition {
//!             name: "Open house".to_string(),
//!             payload: MessagePayload::Text {
//!                 body: "Viewings this Saturday".to_string(),
//!             },
//!             target: TargetRule::All,
//!             exclusions: Exclusions::default(),
//!             send_type: SendType::Gradual {
//!                 batch_size: 50,
//!                 inter_batch_delay_secs: 600,
//!             },
//!             max_retries: None,
//!         })
//!         .await?;
//!     engine.start(campaign.id).await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Recurring automated sends
pub mod automation;
/// Outbound message channel
pub mod channel;
/// Configuration types
pub mod config;
/// Source contact pools
pub mod contacts;
/// Database persistence layer
pub mod db;
/// Cross-pool duplicate detection and merge
pub mod dedup;
/// Cancellable waits
pub mod delay;
/// Engine implementation (decomposed into focused submodules)
pub mod engine;
/// Error types
pub mod error;
/// Phone number canonicalization
pub mod phone;
/// Per-pool advisory locks
pub mod pool_lock;
/// Campaign audience resolution
pub mod resolver;
/// Campaign and recipient state machines
pub mod state;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use automation::{AutomatedTask, ExecutionResult, SchedulerStatus, TaskDefinition, Weekday};
pub use channel::{ChannelSender, SendOutcome};
pub use config::Config;
pub use contacts::{ContactPool, ContactStore};
pub use db::Database;
pub use dedup::{DuplicateGroup, DuplicateReport, MemberKey, MergeResult};
pub use delay::{Delay, TokioDelay, WaitOutcome};
pub use engine::{DispatchReport, MergeRequest, OutreachEngine, PrimaryOverride, RunOutcome};
pub use error::{
    ApiError, CampaignError, DatabaseError, Error, ErrorDetail, Result, ToHttpStatus,
    ValidationError,
};
pub use types::{
    CampaignDefinition, CampaignId, CampaignInfo, CampaignStatus, Contact, ContactId,
    ContactType, Event, Exclusions, MessagePayload, Priority, ProgressSnapshot, RecipientInfo,
    RecipientStatus, SendType, SourcePool, TargetRule, TaskId,
};

/// Helper function to run the engine with graceful signal handling.
///
/// Waits for a termination signal and then calls the engine's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use bulk_outreach::{Config, OutreachEngine, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let engine = OutreachEngine::new(Config::default()).await?;
///     let _api = engine.spawn_api_server();
///
///     run_with_shutdown(engine).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(engine: OutreachEngine) -> Result<()> {
    wait_for_signal().await;
    engine.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
