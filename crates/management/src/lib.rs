//! Campaign management backend — campaigns, segment previews, sends and the
//! admin audit log.
//!
//! Provides the REST API used by the admin console. Campaigns live in a
//! DashMap registry; audiences come from a `campaign_segmentation` store.

pub mod auth;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod service;
pub mod store;

pub use error::{ManagementError, ManagementResult};
pub use handlers::ManagementState;
pub use router::management_router;
pub use service::CampaignService;
pub use store::CampaignStore;
