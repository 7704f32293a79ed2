//! Campaign creation, listing and deletion.

use crate::db::{NewCampaign, NewRecipient};
use crate::error::{CampaignError, Error, Result, ValidationError};
use crate::resolver;
use crate::types::{
    CampaignDefinition, CampaignId, CampaignInfo, ContactId, Event, RecipientInfo,
    RecipientStatus, SendType,
};
use std::collections::HashSet;

use super::OutreachEngine;

impl OutreachEngine {
    /// Create a campaign in `draft` with its frozen recipient list
    ///
    /// The definition is validated, the targeting rule is resolved against every source pool
    /// (duplicates collapse to the most trusted record) and the recipients are stored in
    /// dispatch order. Nothing is stored if validation fails or no recipient remains.
    pub async fn create_campaign(&self, definition: CampaignDefinition) -> Result<CampaignInfo> {
        if definition.name.trim().is_empty() {
            return Err(ValidationError::missing("name").into());
        }
        definition.payload.validate()?;
        resolver::validate_rule(&definition.target)?;
        let send_type = self.effective_send_type(definition.send_type);

        let recipients = self.resolve_recipients(&definition).await?;
        if recipients.is_empty() {
            return Err(ValidationError::NoRecipients.into());
        }

        let new_campaign = NewCampaign {
            name: definition.name.trim().to_string(),
            payload: serde_json::to_string(&definition.payload)?,
            target: serde_json::to_string(&definition.target)?,
            exclusions: serde_json::to_string(&definition.exclusions)?,
            send_type,
            max_retries: definition
                .max_retries
                .unwrap_or(self.config.dispatch.default_max_retries),
        };

        let id = self.db.insert_campaign(&new_campaign, &recipients).await?;

        tracing::info!(
            campaign_id = %id,
            name = %new_campaign.name,
            recipients = recipients.len(),
            payload = definition.payload.kind(),
            "Campaign created"
        );
        self.emit_event(Event::CampaignCreated {
            id,
            name: new_campaign.name.clone(),
            total_recipients: recipients.len() as u64,
        });

        self.get_campaign(id).await
    }

    /// Fill in configured defaults for a gradual definition
    fn effective_send_type(&self, send_type: SendType) -> SendType {
        match send_type {
            SendType::Immediate => SendType::Immediate,
            SendType::Gradual {
                batch_size,
                inter_batch_delay_secs,
            } => SendType::Gradual {
                batch_size: if batch_size == 0 {
                    self.config.dispatch.default_batch_size
                } else {
                    batch_size
                },
                inter_batch_delay_secs: if inter_batch_delay_secs == 0 {
                    self.config.dispatch.default_inter_batch_delay.as_secs()
                } else {
                    inter_batch_delay_secs
                },
            },
        }
    }

    async fn resolve_recipients(&self, definition: &CampaignDefinition) -> Result<Vec<NewRecipient>> {
        // Resolution reads every pool; a merge must not retire records underneath it
        let _pools = self.pool_locks.read(self.contacts.sources()).await;
        let contacts = self.contacts.list(&[]).await?;

        let recently_contacted: HashSet<ContactId> =
            match definition.exclusions.contacted_within_hours {
                Some(hours) => {
                    let cutoff = chrono::Utc::now().timestamp() - i64::from(hours) * 3600;
                    self.db.contacts_sent_after(cutoff).await?.into_iter().collect()
                }
                None => HashSet::new(),
            };

        let resolution = resolver::resolve(
            &contacts,
            &definition.target,
            &definition.exclusions,
            &recently_contacted,
        );
        tracing::debug!(
            scanned = contacts.len(),
            recipients = resolution.recipients.len(),
            skipped_no_phone = resolution.skipped_no_phone,
            skipped_duplicates = resolution.skipped_duplicates,
            excluded = resolution.excluded,
            "Resolved campaign recipients"
        );

        Ok(resolution.recipients)
    }

    /// Get a campaign
    pub async fn get_campaign(&self, id: CampaignId) -> Result<CampaignInfo> {
        let row = self
            .db
            .get_campaign(id)
            .await?
            .ok_or(CampaignError::NotFound { id: id.get() })?;
        CampaignInfo::try_from(row)
    }

    /// List campaigns, newest first
    pub async fn list_campaigns(&self) -> Result<Vec<CampaignInfo>> {
        self.db
            .list_campaigns()
            .await?
            .into_iter()
            .map(CampaignInfo::try_from)
            .collect()
    }

    /// List a campaign's recipients in dispatch order, optionally filtered by status
    pub async fn list_recipients(
        &self,
        id: CampaignId,
        status: Option<RecipientStatus>,
    ) -> Result<Vec<RecipientInfo>> {
        // Distinguish "no recipients match" from "no such campaign"
        self.get_campaign(id).await?;
        Ok(self
            .db
            .list_recipients(id, status)
            .await?
            .into_iter()
            .map(RecipientInfo::from)
            .collect())
    }

    /// Soft-delete a campaign, stopping any active run first
    pub async fn delete_campaign(&self, id: CampaignId) -> Result<()> {
        let campaign = self.get_campaign(id).await?;

        if !campaign.status.is_terminal() {
            self.cancel(id).await?;
        }
        self.cancel_run(id).await;

        if !self.db.soft_delete_campaign(id).await? {
            return Err(Error::Campaign(CampaignError::NotFound { id: id.get() }));
        }
        self.dispatch.campaign_locks.lock().await.remove(&id);

        tracing::info!(campaign_id = %id, "Campaign deleted");
        self.emit_event(Event::CampaignDeleted { id });
        Ok(())
    }
}
