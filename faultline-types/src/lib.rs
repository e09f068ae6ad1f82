//! This crate provides common types for working with the faultline notifier
//! protocol.  It's used by the faultline client crates and can be used by
//! anyone who wants to produce or inspect payloads in the same wire format.
//!
//! Most of the types in this crate are serializable in one form or another.
//! The types in the `protocol` module are really only serializable to JSON as
//! the collection endpoints do not accept any other format.
//!
//! ## API Concepts
//!
//! Most types are directly serializable or deserializable and try to implement
//! the `Default` type.  This means that objects can be created conveniently
//! and missing attributes can be filled in:
//!
//! ```rust
//! use faultline_types::protocol::v4;
//!
//! let event = v4::Event {
//!     context: Some("checkout".to_string()),
//!     severity: v4::Severity::Info,
//!     ..Default::default()
//! };
//! ```

#![warn(missing_docs)]

pub mod protocol;

// Re-export external types and traits for convenience
pub use chrono::{DateTime, Utc};
pub use uuid::Uuid;

/// Generates a random v4 UUID.
pub fn random_uuid() -> Uuid {
    Uuid::new_v4()
}
