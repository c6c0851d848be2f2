//! Segment filters and audience evaluation — turns a campaign's declarative
//! audience selection into a preview count or a recipient list.

pub mod csv_import;
pub mod engine;
pub mod filter;
pub mod memory;
pub mod postgres;
pub mod predicates;
pub mod store;

pub use csv_import::{parse_email_csv, EmailImport};
pub use engine::{SegmentError, SegmentEvaluator};
pub use filter::{InvalidFilter, SegmentFilter};
pub use memory::{AudienceMember, InMemoryAudienceStore};
pub use postgres::PgAudienceStore;
pub use predicates::AttributePredicate;
pub use store::{AudienceQuery, AudienceStore, MockAudienceStore, StoreError};
