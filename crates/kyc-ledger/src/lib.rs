//! Durable storage for KYC verification outcomes and developer profiles
//!
//! Verification records form an append-only ledger: every attempt is a new
//! record and nothing is ever updated in place, so the status history of a
//! user is the sequence of records for their email. Developer profiles map
//! API keys to accounts and plans.
//!
//! The ledger is a JSON-lines file that each `save` appends one line to.
//! Profiles are a JSON document rewritten atomically (temp file + rename).
//! Both write under a per-store lock, so a single `save` is either fully
//! durable or not written at all.
//!
//! Store handles are constructed once by the process entry point and passed
//! to every component through the [`VerificationStore`] and
//! [`ProfileStore`] traits.

pub mod error;
pub mod ledger;
mod persist;
pub mod profile;
pub mod record;
pub mod store;

pub use error::{Error, Result};
pub use ledger::FileLedger;
pub use profile::{DeveloperProfile, PlanType, ProfileDirectory, Role};
pub use record::{
    DEFAULT_API_PROVIDER, DEFAULT_VERIFICATION_TYPE, ListFilter, NewVerification, RecordPage,
    VERIFICATION_LINK_KEY, VerificationRecord, VerificationStatus,
};
pub use store::{ProfileStore, StoreFuture, VerificationStore};
