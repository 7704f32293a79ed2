//! Duplicate detection and merge under pool locks.
//!
//! Scans hold read locks on the scanned pools, so they run alongside campaign dispatch.
//! Merges hold write locks on the pools that lose records and wait at most
//! `dedup.merge_lock_timeout` for running campaigns to release them.

use crate::dedup::{self, DuplicateGroup, DuplicateReport, MergeResult};
use crate::error::{Result, ValidationError};
use crate::types::{ContactId, Event, SourcePool};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use utoipa::ToSchema;

use super::OutreachEngine;

/// Operator choice of primary for one group
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PrimaryOverride {
    /// Group the override applies to
    pub group_id: String,
    /// Member to keep instead of the default primary
    pub primary_id: ContactId,
    /// Pool of that member; needed only when the ID appears in several pools of the group
    #[serde(default)]
    pub source_pool: Option<SourcePool>,
}

/// Merge request built from a reviewed duplicate report
///
/// Groups are recomputed from the current pool contents when the request is applied, so a
/// stale report can never retire a contact that no longer shares the number.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MergeRequest {
    /// Pools to scan; empty means every pool
    #[serde(default)]
    pub pools: Vec<SourcePool>,
    /// Groups to merge; `None` merges every group found
    #[serde(default)]
    pub group_ids: Option<Vec<String>>,
    /// Primary overrides
    #[serde(default)]
    pub overrides: Vec<PrimaryOverride>,
}

impl OutreachEngine {
    /// Group contacts of `pools` (all pools when empty) by normalized phone number
    pub async fn find_duplicates(&self, pools: &[SourcePool]) -> Result<Vec<DuplicateGroup>> {
        Ok(self.scan(pools).await?.1)
    }

    /// Scan `pools` and summarize the result for review
    pub async fn duplicate_report(&self, pools: &[SourcePool]) -> Result<DuplicateReport> {
        let (scanned, groups) = self.scan(pools).await?;
        Ok(DuplicateReport::new(scanned, groups))
    }

    async fn scan(&self, pools: &[SourcePool]) -> Result<(usize, Vec<DuplicateGroup>)> {
        let sources = if pools.is_empty() {
            self.contacts.sources()
        } else {
            pools.to_vec()
        };

        let _pools = self.pool_locks.read(sources.iter().copied()).await;
        let contacts = self.contacts.list(&sources).await?;
        let groups = dedup::find_duplicates(&contacts);

        tracing::info!(
            scanned = contacts.len(),
            groups = groups.len(),
            "Duplicate scan finished"
        );
        Ok((contacts.len(), groups))
    }

    /// Retire the non-primary members of `groups`
    ///
    /// Fails with [`PoolBusy`](crate::Error::PoolBusy) when a running campaign keeps one of
    /// the affected pools locked past the configured timeout. Individual delete failures are
    /// reported in the result and do not stop the merge.
    pub async fn merge_duplicates(&self, groups: &[DuplicateGroup]) -> Result<MergeResult> {
        let pools: BTreeSet<SourcePool> = groups
            .iter()
            .flat_map(DuplicateGroup::retiring_pools)
            .collect();

        let _guard = self
            .pool_locks
            .write(pools, self.config.dedup.merge_lock_timeout)
            .await?;
        let result = dedup::merge(&self.contacts, groups).await;

        tracing::info!(
            groups = groups.len(),
            merged = result.merged_count,
            errors = result.errors.len(),
            "Duplicate merge finished"
        );
        self.emit_event(Event::DuplicatesMerged {
            merged: result.merged_count as u64,
            errors: result.errors.len() as u64,
        });
        Ok(result)
    }

    /// Recompute groups, apply the request's selection and overrides, then merge
    pub async fn apply_merge_request(&self, request: MergeRequest) -> Result<MergeResult> {
        let groups = self.find_duplicates(&request.pools).await?;

        let overrides: HashMap<&str, &PrimaryOverride> = request
            .overrides
            .iter()
            .map(|o| (o.group_id.as_str(), o))
            .collect();
        let selected: Option<BTreeSet<&str>> = request
            .group_ids
            .as_ref()
            .map(|ids| ids.iter().map(String::as_str).collect());

        if let Some(unknown) = overrides
            .keys()
            .find(|id| !groups.iter().any(|g| g.group_id() == **id))
        {
            return Err(ValidationError::invalid(
                "overrides",
                format!("no duplicate group {}", unknown),
            )
            .into());
        }

        let mut chosen = Vec::new();
        for group in groups {
            if selected
                .as_ref()
                .is_some_and(|ids| !ids.contains(group.group_id()))
            {
                continue;
            }
            match overrides.get(group.group_id()) {
                Some(o) => chosen.push(group.reassign_primary(o.primary_id, o.source_pool)?),
                None => chosen.push(group),
            }
        }

        self.merge_duplicates(&chosen).await
    }
}
