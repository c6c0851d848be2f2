//! Campaign email dispatch — one delivery attempt per resolved recipient.

use campaign_channels::{EmailSender, OutboundEmail};
use campaign_core::Recipient;
use chrono::Utc;
use tracing::{info, warn};

use crate::models::{DeliveryOutcome, MarketingCampaign, RecipientOutcome, SendReport};

/// Send `campaign` to every recipient in order and report each outcome.
///
/// Failures are recorded and the loop moves on; nothing is retried.
pub async fn dispatch(
    sender: &dyn EmailSender,
    campaign: &MarketingCampaign,
    recipients: Vec<Recipient>,
) -> SendReport {
    let started_at = Utc::now();
    let mut outcomes = Vec::with_capacity(recipients.len());
    let mut sent = 0u64;
    let mut failed = 0u64;

    for recipient in recipients {
        let email = OutboundEmail {
            campaign_id: campaign.id,
            recipient,
            subject: campaign.subject.clone(),
            html_body: campaign.body.clone(),
        };

        let delivery = match sender.send(&email).await {
            Ok(receipt) => {
                sent += 1;
                metrics::counter!("email.sent").increment(1);
                DeliveryOutcome::Sent {
                    provider_message_id: receipt.provider_message_id,
                }
            }
            Err(e) => {
                failed += 1;
                metrics::counter!("email.failed").increment(1);
                warn!(
                    campaign_id = %campaign.id,
                    user_id = %email.recipient.user_id,
                    error = %e,
                    "Email delivery failed"
                );
                DeliveryOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };

        outcomes.push(RecipientOutcome {
            user_id: email.recipient.user_id,
            email: email.recipient.email,
            delivery,
        });
    }

    info!(campaign_id = %campaign.id, sent, failed, "Campaign dispatch finished");

    SendReport {
        campaign_id: campaign.id,
        attempted: sent + failed,
        sent,
        failed,
        outcomes,
        started_at,
        finished_at: Utc::now(),
    }
}
