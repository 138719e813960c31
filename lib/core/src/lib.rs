//! Core domain types shared across the quarry platform.
//!
//! Provides the strongly-typed entity IDs and the common `Result` alias
//! used by the platform's library crates. Each crate defines its own
//! error type and adds layer-appropriate context via rootcause as
//! errors propagate.

pub mod id;

pub use id::{OrganizationId, ParseIdError, RepositoryId, UserId};

use rootcause::Report;

/// Platform-wide `Result` alias over rootcause's [`Report`].
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
