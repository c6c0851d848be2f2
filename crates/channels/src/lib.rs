//! Outbound channels for campaign delivery.
//!
//! Email only: SendGrid in production, a log-only sender for development.

pub mod email;

pub use email::{
    sender_from_config, DeliveryError, DeliveryReceipt, EmailSender, LogSender, MockEmailSender,
    OutboundEmail, SendGridSender,
};
