//! Campaign recipient resolution
//!
//! Expands a [`TargetRule`] plus [`Exclusions`] into the frozen recipient list of a campaign.
//! Contacts that share a normalized phone number are collapsed to the member from the most
//! trusted pool, the same choice the duplicate merge would make, so nobody receives the same
//! campaign twice.

use crate::db::NewRecipient;
use crate::error::ValidationError;
use crate::phone;
use crate::types::{Contact, ContactId, Exclusions, TargetRule};
use std::collections::{HashMap, HashSet};

/// Resolved recipients plus what was dropped on the way
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Recipients in dispatch order
    pub recipients: Vec<NewRecipient>,
    /// Targeted contacts without a usable phone
    pub skipped_no_phone: usize,
    /// Targeted contacts removed because a more trusted record has the same number
    pub skipped_duplicates: usize,
    /// Targeted contacts removed by exclusions
    pub excluded: usize,
}

/// Reject rules that can never match anything
pub fn validate_rule(target: &TargetRule) -> Result<(), ValidationError> {
    match target {
        TargetRule::All => Ok(()),
        TargetRule::ByType { types } if types.is_empty() => Err(ValidationError::invalid(
            "target.types",
            "at least one contact type is required",
        )),
        TargetRule::ByCompany { companies } if companies.iter().all(|c| c.trim().is_empty()) => {
            Err(ValidationError::invalid(
                "target.companies",
                "at least one company is required",
            ))
        }
        TargetRule::ByTag { tags } if tags.iter().all(|t| t.trim().is_empty()) => Err(
            ValidationError::invalid("target.tags", "at least one tag is required"),
        ),
        TargetRule::Explicit { contact_ids } if contact_ids.is_empty() => Err(
            ValidationError::invalid("target.contact_ids", "at least one contact is required"),
        ),
        _ => Ok(()),
    }
}

fn lowercase_set(values: &[String]) -> HashSet<String> {
    values
        .iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

fn matches_rule(contact: &Contact, target: &TargetRule) -> bool {
    match target {
        TargetRule::All => true,
        TargetRule::ByType { types } => types.contains(&contact.contact_type),
        TargetRule::ByCompany { companies } => {
            let wanted = lowercase_set(companies);
            contact
                .company
                .as_deref()
                .is_some_and(|c| wanted.contains(&c.trim().to_lowercase()))
        }
        TargetRule::ByTag { tags } => {
            let wanted = lowercase_set(tags);
            contact
                .tags
                .iter()
                .any(|t| wanted.contains(&t.trim().to_lowercase()))
        }
        TargetRule::Explicit { contact_ids } => contact_ids.contains(&contact.id),
    }
}

fn is_excluded(
    contact: &Contact,
    exclusions: &Exclusions,
    excluded_phones: &HashSet<String>,
    excluded_tags: &HashSet<String>,
    recently_contacted: &HashSet<ContactId>,
    normalized: &str,
) -> bool {
    exclusions.contact_ids.contains(&contact.id)
        || exclusions.types.contains(&contact.contact_type)
        || contact
            .tags
            .iter()
            .any(|t| excluded_tags.contains(&t.trim().to_lowercase()))
        || excluded_phones.contains(normalized)
        || recently_contacted.contains(&contact.id)
}

/// Resolve `target` minus `exclusions` over `contacts`
///
/// `recently_contacted` holds contacts that fall under `exclusions.contacted_within_hours`;
/// the caller looks them up in the send history. Output order is pool rank, then contact ID,
/// and never changes once the campaign is created.
pub fn resolve(
    contacts: &[Contact],
    target: &TargetRule,
    exclusions: &Exclusions,
    recently_contacted: &HashSet<ContactId>,
) -> Resolution {
    let excluded_phones: HashSet<String> = exclusions
        .phones
        .iter()
        .map(|p| phone::normalize(p))
        .filter(|p| !p.is_empty())
        .collect();
    let excluded_tags = lowercase_set(&exclusions.tags);

    let mut ranked: Vec<&Contact> = contacts.iter().filter(|c| matches_rule(c, target)).collect();
    ranked.sort_by_key(|c| (c.source_pool.rank(), c.id));

    let mut resolution = Resolution::default();
    let mut seen: HashMap<String, ContactId> = HashMap::new();

    for contact in ranked {
        let Some(raw) = contact.phone.as_deref() else {
            resolution.skipped_no_phone += 1;
            continue;
        };
        let normalized = phone::normalize(raw);
        if normalized.is_empty() {
            resolution.skipped_no_phone += 1;
            continue;
        }

        // The first (most trusted) record for a number claims it, even if later excluded
        if seen.contains_key(&normalized) {
            resolution.skipped_duplicates += 1;
            continue;
        }
        seen.insert(normalized.clone(), contact.id);

        if is_excluded(
            contact,
            exclusions,
            &excluded_phones,
            &excluded_tags,
            recently_contacted,
            &normalized,
        ) {
            resolution.excluded += 1;
            continue;
        }

        resolution.recipients.push(NewRecipient {
            contact_id: contact.id,
            source_pool: contact.source_pool,
            phone: phone::dialable(raw),
        });
    }

    resolution
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContactType, Priority, SourcePool};

    fn contact(id: i64, pool: SourcePool, phone: Option<&str>) -> Contact {
        Contact {
            id: ContactId(id),
            source_pool: pool,
            name: format!("Contact {id}"),
            phone: phone.map(String::from),
            email: None,
            company: None,
            notes: None,
            contact_type: ContactType::Client,
            tags: vec![],
            priority: Priority::Medium,
        }
    }

    fn ids(resolution: &Resolution) -> Vec<i64> {
        resolution.recipients.iter().map(|r| r.contact_id.0).collect()
    }

    #[test]
    fn all_rule_collapses_duplicates_to_most_trusted_pool() {
        let contacts = vec![
            contact(1, SourcePool::Tenants, Some("0501234567")),
            contact(2, SourcePool::Owners, Some("+971 50 123 4567")),
            contact(3, SourcePool::Clients, Some("0507654321")),
            contact(4, SourcePool::Clients, None),
        ];

        let resolution = resolve(
            &contacts,
            &TargetRule::All,
            &Exclusions::default(),
            &HashSet::new(),
        );
        assert_eq!(ids(&resolution), vec![2, 3]);
        assert_eq!(resolution.recipients[0].phone, "+971501234567");
        assert_eq!(resolution.recipients[0].source_pool, SourcePool::Owners);
        assert_eq!(resolution.skipped_duplicates, 1);
        assert_eq!(resolution.skipped_no_phone, 1);
    }

    #[test]
    fn by_type_company_and_tag_rules() {
        let mut broker = contact(1, SourcePool::Brokers, Some("0500000001"));
        broker.contact_type = ContactType::Broker;
        broker.company = Some("Emaar Realty".into());
        let mut owner = contact(2, SourcePool::Owners, Some("0500000002"));
        owner.contact_type = ContactType::Owner;
        owner.tags = vec!["VIP".into()];
        let contacts = vec![broker, owner];
        let none = Exclusions::default();
        let empty = HashSet::new();

        let by_type = resolve(
            &contacts,
            &TargetRule::ByType {
                types: vec![ContactType::Owner],
            },
            &none,
            &empty,
        );
        assert_eq!(ids(&by_type), vec![2]);

        let by_company = resolve(
            &contacts,
            &TargetRule::ByCompany {
                companies: vec![" emaar realty ".into()],
            },
            &none,
            &empty,
        );
        assert_eq!(ids(&by_company), vec![1]);

        let by_tag = resolve(
            &contacts,
            &TargetRule::ByTag {
                tags: vec!["vip".into()],
            },
            &none,
            &empty,
        );
        assert_eq!(ids(&by_tag), vec![2]);

        let explicit = resolve(
            &contacts,
            &TargetRule::Explicit {
                contact_ids: vec![ContactId(1), ContactId(2)],
            },
            &none,
            &empty,
        );
        assert_eq!(ids(&explicit), vec![1, 2]);
    }

    #[test]
    fn exclusions_remove_contacts() {
        let mut tagged = contact(3, SourcePool::Clients, Some("0500000003"));
        tagged.tags = vec!["do-not-contact".into()];
        let contacts = vec![
            contact(1, SourcePool::Clients, Some("0500000001")),
            contact(2, SourcePool::Clients, Some("0500000002")),
            tagged,
            contact(4, SourcePool::Clients, Some("0500000004")),
            contact(5, SourcePool::Clients, Some("0500000005")),
        ];
        let exclusions = Exclusions {
            contact_ids: vec![ContactId(1)],
            types: vec![],
            tags: vec!["Do-Not-Contact".into()],
            phones: vec!["+971500000004".into()],
            contacted_within_hours: Some(24),
        };
        let recent: HashSet<ContactId> = [ContactId(5)].into_iter().collect();

        let resolution = resolve(&contacts, &TargetRule::All, &exclusions, &recent);
        assert_eq!(ids(&resolution), vec![2]);
        assert_eq!(resolution.excluded, 4);
    }

    #[test]
    fn excluded_primary_does_not_promote_a_duplicate() {
        let contacts = vec![
            contact(1, SourcePool::Brokers, Some("0501234567")),
            contact(2, SourcePool::Tenants, Some("0501234567")),
        ];
        let exclusions = Exclusions {
            contact_ids: vec![ContactId(1)],
            ..Default::default()
        };

        let resolution = resolve(&contacts, &TargetRule::All, &exclusions, &HashSet::new());
        assert!(resolution.recipients.is_empty());
    }

    #[test]
    fn empty_rules_are_rejected() {
        assert!(validate_rule(&TargetRule::All).is_ok());
        assert!(validate_rule(&TargetRule::ByType { types: vec![] }).is_err());
        assert!(
            validate_rule(&TargetRule::ByTag {
                tags: vec![" ".into()]
            })
            .is_err()
        );
        assert!(
            validate_rule(&TargetRule::Explicit {
                contact_ids: vec![]
            })
            .is_err()
        );
    }
}
