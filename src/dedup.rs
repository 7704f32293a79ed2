//! Cross-pool duplicate detection and merge
//!
//! Contacts are grouped by [`normalize`](crate::phone::normalize)d phone number. Within a
//! group the member from the most trusted pool (see [`SourcePool::rank`]) is kept as primary
//! and every other member is retired through its own pool.
//!
//! Ranking is fixed: channel contacts, then brokers, owners, clients and tenants. Ties inside
//! one pool go to the lowest contact ID (the oldest record). Contact IDs are only unique within
//! a pool, so members are always addressed by [`MemberKey`]. Operators can pick another
//! primary with [`DuplicateGroup::reassign_primary`], which builds a new group rather than
//! editing the old one.

use crate::contacts::ContactStore;
use crate::error::ValidationError;
use crate::phone;
use crate::types::{Contact, ContactId, SourcePool};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use utoipa::ToSchema;

/// Review priority of a duplicate group
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum GroupPriority {
    /// Three or more records share the number
    High,
    /// Exactly two records share the number
    Medium,
}

impl GroupPriority {
    fn for_size(size: usize) -> Self {
        if size >= 3 {
            GroupPriority::High
        } else {
            GroupPriority::Medium
        }
    }
}

/// A contact qualified by the pool it lives in
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
pub struct MemberKey {
    /// Pool the record lives in
    pub source_pool: SourcePool,
    /// Contact ID within that pool
    pub contact_id: ContactId,
}

/// One contact inside a duplicate group
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DuplicateMember {
    /// Contact ID
    pub contact_id: ContactId,
    /// Pool the record lives in
    pub source_pool: SourcePool,
    /// Display name
    pub name: String,
    /// Phone as stored in the pool
    pub phone: String,
}

impl DuplicateMember {
    /// Pool-qualified identity of this member
    pub fn key(&self) -> MemberKey {
        MemberKey {
            source_pool: self.source_pool,
            contact_id: self.contact_id,
        }
    }

    fn sort_key(&self) -> (u8, ContactId) {
        (self.source_pool.rank(), self.contact_id)
    }
}

/// Contacts sharing one normalized phone number
///
/// Always has at least two members; the primary (`primary_id` in `primary_pool`) is a member
/// and `to_retire` is exactly the other members, in rank order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DuplicateGroup {
    group_id: String,
    members: Vec<DuplicateMember>,
    primary_id: ContactId,
    primary_pool: SourcePool,
    to_retire: Vec<MemberKey>,
    priority: GroupPriority,
}

impl DuplicateGroup {
    /// Build a group with the default primary, or `None` for fewer than two members
    fn from_members(group_id: String, mut members: Vec<DuplicateMember>) -> Option<Self> {
        if members.len() < 2 {
            return None;
        }
        members.sort_by_key(DuplicateMember::sort_key);
        let primary = members[0].key();
        Some(Self::with_primary(group_id, members, primary))
    }

    fn with_primary(group_id: String, members: Vec<DuplicateMember>, primary: MemberKey) -> Self {
        let to_retire = members
            .iter()
            .map(DuplicateMember::key)
            .filter(|key| *key != primary)
            .collect();
        let priority = GroupPriority::for_size(members.len());
        Self {
            group_id,
            members,
            primary_id: primary.contact_id,
            primary_pool: primary.source_pool,
            to_retire,
            priority,
        }
    }

    /// Stable identifier (the normalized phone number)
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// Members in rank order
    pub fn members(&self) -> &[DuplicateMember] {
        &self.members
    }

    /// Contact that survives the merge
    pub fn primary_id(&self) -> ContactId {
        self.primary_id
    }

    /// Pool-qualified identity of the primary
    pub fn primary(&self) -> MemberKey {
        MemberKey {
            source_pool: self.primary_pool,
            contact_id: self.primary_id,
        }
    }

    /// Contacts the merge retires
    pub fn to_retire(&self) -> &[MemberKey] {
        &self.to_retire
    }

    /// Review priority
    pub fn priority(&self) -> GroupPriority {
        self.priority
    }

    /// Member record for `key`
    pub fn member(&self, key: MemberKey) -> Option<&DuplicateMember> {
        self.members.iter().find(|m| m.key() == key)
    }

    /// Pools that lose records when this group is merged
    pub fn retiring_pools(&self) -> BTreeSet<SourcePool> {
        self.to_retire.iter().map(|key| key.source_pool).collect()
    }

    /// Same group with `contact_id` as primary
    ///
    /// `source_pool` is required only when two pools share the ID inside this group. Member
    /// order (the pool ranking) is unchanged; only the split between primary and `to_retire`
    /// is recomputed.
    pub fn reassign_primary(
        &self,
        contact_id: ContactId,
        source_pool: Option<SourcePool>,
    ) -> Result<Self, ValidationError> {
        let candidates: Vec<MemberKey> = self
            .members
            .iter()
            .map(DuplicateMember::key)
            .filter(|key| {
                key.contact_id == contact_id && source_pool.is_none_or(|pool| key.source_pool == pool)
            })
            .collect();

        match candidates.as_slice() {
            [primary] => Ok(Self::with_primary(
                self.group_id.clone(),
                self.members.clone(),
                *primary,
            )),
            [] => Err(ValidationError::invalid(
                "primary_id",
                format!(
                    "contact {} is not a member of duplicate group {}",
                    contact_id, self.group_id
                ),
            )),
            _ => Err(ValidationError::invalid(
                "source_pool",
                format!(
                    "contact {} appears in several pools of duplicate group {}",
                    contact_id, self.group_id
                ),
            )),
        }
    }
}

/// Group contacts by normalized phone number
///
/// Contacts without a usable phone are ignored. Groups come back high priority first, then
/// by group ID.
pub fn find_duplicates(contacts: &[Contact]) -> Vec<DuplicateGroup> {
    let mut by_phone: BTreeMap<String, Vec<DuplicateMember>> = BTreeMap::new();

    for contact in contacts {
        let Some(normalized) = phone::normalize_opt(contact.phone.as_deref()) else {
            continue;
        };
        by_phone.entry(normalized).or_default().push(DuplicateMember {
            contact_id: contact.id,
            source_pool: contact.source_pool,
            name: contact.name.clone(),
            phone: contact.phone.clone().unwrap_or_default(),
        });
    }

    let mut groups: Vec<DuplicateGroup> = by_phone
        .into_iter()
        .filter_map(|(phone, members)| DuplicateGroup::from_members(phone, members))
        .collect();
    groups.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| a.group_id.cmp(&b.group_id))
    });
    groups
}

/// A contact the merge could not retire
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MergeFailure {
    /// Group the contact belongs to
    pub group_id: String,
    /// Contact that is still live
    pub contact_id: ContactId,
    /// Pool the delete was issued against
    pub source_pool: SourcePool,
    /// Why the delete failed
    pub error: String,
}

/// Outcome of a merge; partial success is normal
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MergeResult {
    /// Contacts retired
    pub merged_count: usize,
    /// Contacts that could not be retired
    pub errors: Vec<MergeFailure>,
}

/// Retire every `to_retire` member of `groups` through its own pool
///
/// A failed delete is recorded and the merge moves on; nothing already retired is rolled
/// back. Callers are responsible for holding the pool locks.
pub async fn merge(store: &ContactStore, groups: &[DuplicateGroup]) -> MergeResult {
    let mut result = MergeResult::default();

    for group in groups {
        for key in group.to_retire() {
            let outcome = match store.get(key.source_pool) {
                Ok(pool) => pool.delete(key.contact_id).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(()) => {
                    result.merged_count += 1;
                    tracing::debug!(
                        group_id = %group.group_id,
                        contact_id = %key.contact_id,
                        source_pool = %key.source_pool,
                        "retired duplicate contact"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        group_id = %group.group_id,
                        contact_id = %key.contact_id,
                        source_pool = %key.source_pool,
                        error = %e,
                        "failed to retire duplicate contact"
                    );
                    result.errors.push(MergeFailure {
                        group_id: group.group_id.clone(),
                        contact_id: key.contact_id,
                        source_pool: key.source_pool,
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    result
}

/// Audit artifact describing a duplicate scan
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DuplicateReport {
    /// When the scan ran
    pub generated_at: DateTime<Utc>,
    /// Contacts scanned
    pub contacts_scanned: usize,
    /// Number of groups
    pub total_groups: usize,
    /// Groups of three or more
    pub high_priority: usize,
    /// Groups of two
    pub medium_priority: usize,
    /// Contacts a full merge would retire
    pub contacts_to_retire: usize,
    /// The groups themselves
    pub groups: Vec<DuplicateGroup>,
}

impl DuplicateReport {
    /// Summarize `groups` found among `contacts_scanned` contacts
    pub fn new(contacts_scanned: usize, groups: Vec<DuplicateGroup>) -> Self {
        let high_priority = groups
            .iter()
            .filter(|g| g.priority() == GroupPriority::High)
            .count();
        Self {
            generated_at: Utc::now(),
            contacts_scanned,
            total_groups: groups.len(),
            high_priority,
            medium_priority: groups.len() - high_priority,
            contacts_to_retire: groups.iter().map(|g| g.to_retire().len()).sum(),
            groups,
        }
    }
}
