//! Campaign and recipient state machines
//!
//! Campaigns: `draft -> queued -> sending -> {paused, completed, cancelled}`, `paused -> sending`,
//! and `cancel` from any non-terminal state. `completed` and `cancelled` are terminal.
//!
//! Recipients: `pending -> sending -> {sent, failed}` and `failed -> pending` while retries
//! remain. A recipient never reaches `sent` or `failed` without passing through `sending`.

use crate::error::CampaignError;
use crate::types::{CampaignId, CampaignStatus, RecipientStatus};

/// Operation requested against a campaign
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CampaignAction {
    /// Operator start (draft or queued campaigns)
    Start,
    /// A dispatch run obtained a slot and begins sending
    BeginSending,
    /// Operator pause
    Pause,
    /// Operator resume
    Resume,
    /// Operator cancel
    Cancel,
    /// Dispatch drained every pending and in-flight recipient
    Complete,
    /// Operator reset of failed recipients; never changes the campaign status
    RetryFailed,
}

impl CampaignAction {
    /// Verb used in error messages and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignAction::Start => "start",
            CampaignAction::BeginSending => "dispatch",
            CampaignAction::Pause => "pause",
            CampaignAction::Resume => "resume",
            CampaignAction::Cancel => "cancel",
            CampaignAction::Complete => "complete",
            CampaignAction::RetryFailed => "retry",
        }
    }
}

/// Compute the status a campaign moves to when `action` is applied in `current`
///
/// Returns [`CampaignError::AlreadyInState`] when the action would be a no-op request
/// (pausing a paused campaign) and [`CampaignError::InvalidState`] when the state machine
/// forbids it.
pub fn next_campaign_status(
    id: CampaignId,
    current: CampaignStatus,
    action: CampaignAction,
) -> Result<CampaignStatus, CampaignError> {
    use CampaignAction as A;
    use CampaignStatus as S;

    let next = match (action, current) {
        (A::Start, S::Draft | S::Queued) => S::Queued,
        (A::Start, S::Sending) => return Err(already(id, current)),

        // A resumed campaign is already `sending` when its run picks up a slot
        (A::BeginSending, S::Queued | S::Sending) => S::Sending,

        (A::Pause, S::Sending) => S::Paused,
        (A::Pause, S::Paused) => return Err(already(id, current)),

        (A::Resume, S::Paused) => S::Sending,
        (A::Resume, S::Sending) => return Err(already(id, current)),

        (A::Cancel, S::Cancelled) => return Err(already(id, current)),
        (A::Cancel, s) if !s.is_terminal() => S::Cancelled,

        (A::Complete, S::Sending) => S::Completed,

        (A::RetryFailed, s) if !s.is_terminal() => s,

        _ => {
            return Err(CampaignError::InvalidState {
                id: id.get(),
                operation: action.as_str().to_string(),
                current_state: current.as_str().to_string(),
            });
        }
    };
    Ok(next)
}

fn already(id: CampaignId, current: CampaignStatus) -> CampaignError {
    CampaignError::AlreadyInState {
        id: id.get(),
        state: current.as_str().to_string(),
    }
}

/// A single guarded recipient status change
///
/// The store applies each transition only when the row is still in [`from`](Self::from),
/// so concurrent writers can never move a recipient backwards or skip `sending`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecipientTransition {
    /// `pending -> sending` before the channel is invoked
    Claim,
    /// `sending -> sent` on channel acceptance
    Deliver,
    /// `sending -> failed` on channel rejection (or an interrupted send found at startup)
    Fail,
    /// `failed -> pending` by an explicit retry while retries remain
    Requeue,
}

impl RecipientTransition {
    /// Required current status
    pub fn from(&self) -> RecipientStatus {
        match self {
            RecipientTransition::Claim => RecipientStatus::Pending,
            RecipientTransition::Deliver | RecipientTransition::Fail => RecipientStatus::Sending,
            RecipientTransition::Requeue => RecipientStatus::Failed,
        }
    }

    /// Resulting status
    pub fn to(&self) -> RecipientStatus {
        match self {
            RecipientTransition::Claim => RecipientStatus::Sending,
            RecipientTransition::Deliver => RecipientStatus::Sent,
            RecipientTransition::Fail => RecipientStatus::Failed,
            RecipientTransition::Requeue => RecipientStatus::Pending,
        }
    }
}

/// Whether a failed recipient may be requeued
pub fn can_retry(retry_count: u32, max_retries: u32) -> bool {
    retry_count < max_retries
}
