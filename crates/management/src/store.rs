//! In-memory campaign registry backed by DashMap.
//!
//! Holds campaigns, their send reports and the admin audit log. Audience
//! data lives elsewhere (see `campaign_segmentation::AudienceStore`).

use crate::error::{ManagementError, ManagementResult};
use crate::models::*;
use chrono::Utc;
use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

/// Thread-safe store for campaigns, send reports and the audit log.
pub struct CampaignStore {
    campaigns: DashMap<Uuid, MarketingCampaign>,
    reports: DashMap<Uuid, SendReport>,
    audit_log: DashMap<Uuid, AuditLogEntry>,
}

impl CampaignStore {
    pub fn new() -> Self {
        info!("Campaign store initialized (in-memory)");
        Self {
            campaigns: DashMap::new(),
            reports: DashMap::new(),
            audit_log: DashMap::new(),
        }
    }

    // ─── Campaigns ─────────────────────────────────────────────────────────

    pub fn list_campaigns(&self) -> Vec<MarketingCampaign> {
        let mut campaigns: Vec<MarketingCampaign> =
            self.campaigns.iter().map(|r| r.value().clone()).collect();
        campaigns.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        campaigns
    }

    pub fn get_campaign(&self, id: Uuid) -> Option<MarketingCampaign> {
        self.campaigns.get(&id).map(|r| r.value().clone())
    }

    /// Store a new draft. The caller has already validated the filter.
    pub fn create_campaign(&self, req: CreateCampaignRequest, user: &str) -> MarketingCampaign {
        let now = Utc::now();
        let campaign = MarketingCampaign {
            id: Uuid::new_v4(),
            name: req.name,
            subject: req.subject,
            body: req.body,
            segment_filter: req.segment_filter,
            status: CampaignStatus::Draft,
            created_by: user.to_string(),
            created_at: now,
            updated_at: now,
            sent_at: None,
        };
        let id = campaign.id;
        self.campaigns.insert(id, campaign.clone());
        self.log_audit(
            user,
            AuditAction::Create,
            "campaign",
            &id.to_string(),
            serde_json::json!({"name": &campaign.name}),
        );
        campaign
    }

    /// Delete a campaign and its report. A campaign mid-send is kept until
    /// the send settles.
    pub fn delete_campaign(&self, id: Uuid, user: &str) -> ManagementResult<()> {
        let removed = self
            .campaigns
            .remove_if(&id, |_, c| c.status != CampaignStatus::Sending);
        if removed.is_none() {
            return Err(match self.campaigns.get(&id) {
                Some(_) => ManagementError::SendInProgress(id),
                None => ManagementError::NotFound(id),
            });
        }
        self.reports.remove(&id);
        self.log_audit(user, AuditAction::Delete, "campaign", &id.to_string(), serde_json::json!({}));
        Ok(())
    }

    /// Move a draft to `sending` and return it.
    ///
    /// Taken under the entry lock: of two concurrent callers exactly one
    /// sees `Draft`.
    pub fn begin_send(&self, id: Uuid) -> ManagementResult<MarketingCampaign> {
        let mut entry = self
            .campaigns
            .get_mut(&id)
            .ok_or(ManagementError::NotFound(id))?;
        let campaign = entry.value_mut();
        if campaign.status != CampaignStatus::Draft {
            return Err(ManagementError::AlreadySent {
                id,
                status: campaign.status,
            });
        }
        campaign.status = CampaignStatus::Sending;
        campaign.updated_at = Utc::now();
        Ok(campaign.clone())
    }

    /// Return a `sending` campaign to draft when nothing was delivered.
    pub fn abort_send(&self, id: Uuid) {
        if let Some(mut entry) = self.campaigns.get_mut(&id) {
            let campaign = entry.value_mut();
            if campaign.status == CampaignStatus::Sending {
                campaign.status = CampaignStatus::Draft;
                campaign.updated_at = Utc::now();
            }
        }
    }

    /// Record the outcome of a send and settle the campaign's final status.
    pub fn finish_send(&self, report: SendReport, user: &str) -> Option<MarketingCampaign> {
        let id = report.campaign_id;
        let status = if report.failed == 0 {
            CampaignStatus::Sent
        } else {
            CampaignStatus::PartiallySent
        };
        let details = serde_json::json!({
            "attempted": report.attempted,
            "sent": report.sent,
            "failed": report.failed,
        });
        let finished_at = report.finished_at;

        // The report is written while the entry lock is held so it never
        // outlives its campaign.
        let campaign = self.campaigns.get_mut(&id).map(|mut entry| {
            let c = entry.value_mut();
            c.status = status;
            c.sent_at = Some(finished_at);
            c.updated_at = Utc::now();
            self.reports.insert(id, report);
            c.clone()
        });
        if campaign.is_none() {
            info!(campaign_id = %id, "Campaign removed while sending, report dropped");
        }
        self.log_audit(user, AuditAction::Send, "campaign", &id.to_string(), details);
        campaign
    }

    pub fn get_report(&self, id: Uuid) -> Option<SendReport> {
        self.reports.get(&id).map(|r| r.value().clone())
    }

    // ─── Audit Log ─────────────────────────────────────────────────────────

    pub fn get_audit_log(&self) -> Vec<AuditLogEntry> {
        let mut entries: Vec<AuditLogEntry> =
            self.audit_log.iter().map(|r| r.value().clone()).collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries
    }

    pub fn log_audit(
        &self,
        user: &str,
        action: AuditAction,
        resource_type: &str,
        resource_id: &str,
        details: serde_json::Value,
    ) {
        let entry = AuditLogEntry {
            id: Uuid::new_v4(),
            user: user.to_string(),
            action,
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            details,
            timestamp: Utc::now(),
        };
        self.audit_log.insert(entry.id, entry);
    }
}

impl Default for CampaignStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn request() -> CreateCampaignRequest {
        CreateCampaignRequest {
            name: "Spring check-in".into(),
            subject: "How are your goals going?".into(),
            body: "<p>Hi</p>".into(),
            segment_filter: json!({"type": "all"}),
        }
    }

    fn report(campaign_id: Uuid, sent: u64, failed: u64) -> SendReport {
        let now = Utc::now();
        SendReport {
            campaign_id,
            attempted: sent + failed,
            sent,
            failed,
            outcomes: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn test_create_and_list() {
        let store = CampaignStore::new();
        let first = store.create_campaign(request(), "admin");
        let second = store.create_campaign(request(), "admin");

        assert_eq!(first.status, CampaignStatus::Draft);
        let listed = store.list_campaigns();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().any(|c| c.id == first.id));
        assert!(listed.iter().any(|c| c.id == second.id));
        assert_eq!(store.get_audit_log().len(), 2);
    }

    #[test]
    fn test_begin_send_only_once() {
        let store = CampaignStore::new();
        let campaign = store.create_campaign(request(), "admin");

        let sending = store.begin_send(campaign.id).unwrap();
        assert_eq!(sending.status, CampaignStatus::Sending);
        assert!(matches!(
            store.begin_send(campaign.id),
            Err(ManagementError::AlreadySent {
                status: CampaignStatus::Sending,
                ..
            })
        ));
    }

    #[test]
    fn test_begin_send_unknown_campaign() {
        let store = CampaignStore::new();
        assert!(matches!(
            store.begin_send(Uuid::new_v4()),
            Err(ManagementError::NotFound(_))
        ));
    }

    #[test]
    fn test_concurrent_begin_send_has_one_winner() {
        let store = Arc::new(CampaignStore::new());
        let id = store.create_campaign(request(), "admin").id;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.begin_send(id).is_ok())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_abort_returns_to_draft() {
        let store = CampaignStore::new();
        let id = store.create_campaign(request(), "admin").id;
        store.begin_send(id).unwrap();
        store.abort_send(id);
        assert_eq!(store.get_campaign(id).unwrap().status, CampaignStatus::Draft);
    }

    #[test]
    fn test_finish_send_settles_status() {
        let store = CampaignStore::new();
        let clean = store.create_campaign(request(), "admin").id;
        let partial = store.create_campaign(request(), "admin").id;

        store.begin_send(clean).unwrap();
        store.begin_send(partial).unwrap();
        assert_eq!(
            store.finish_send(report(clean, 3, 0), "admin").unwrap().status,
            CampaignStatus::Sent
        );
        assert_eq!(
            store.finish_send(report(partial, 2, 1), "admin").unwrap().status,
            CampaignStatus::PartiallySent
        );
        assert_eq!(store.get_report(partial).unwrap().failed, 1);
        assert!(store.get_campaign(clean).unwrap().sent_at.is_some());
    }

    #[test]
    fn test_delete_removes_report() {
        let store = CampaignStore::new();
        let id = store.create_campaign(request(), "admin").id;
        store.begin_send(id).unwrap();
        store.finish_send(report(id, 1, 0), "admin");

        store.delete_campaign(id, "admin").unwrap();
        assert!(store.get_campaign(id).is_none());
        assert!(store.get_report(id).is_none());
        assert!(matches!(
            store.delete_campaign(id, "admin"),
            Err(ManagementError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_refused_while_sending() {
        let store = CampaignStore::new();
        let id = store.create_campaign(request(), "admin").id;
        store.begin_send(id).unwrap();

        assert!(matches!(
            store.delete_campaign(id, "admin"),
            Err(ManagementError::SendInProgress(_))
        ));
        store.finish_send(report(id, 2, 0), "admin").unwrap();
        assert!(store.get_report(id).is_some());

        store.delete_campaign(id, "admin").unwrap();
        assert!(store.get_report(id).is_none());
    }

    #[test]
    fn test_report_for_missing_campaign_is_dropped() {
        let store = CampaignStore::new();
        let id = Uuid::new_v4();
        assert!(store.finish_send(report(id, 1, 0), "admin").is_none());
        assert!(store.get_report(id).is_none());
    }
}
