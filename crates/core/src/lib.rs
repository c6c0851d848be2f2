//! Shared configuration, error, and domain types for the campaign console.

pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{CampaignError, CampaignResult};
pub use types::Recipient;
