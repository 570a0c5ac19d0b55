//! Store abstractions consumed by the gateway
//!
//! Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
//! (`Arc<dyn VerificationStore>`), so tests and alternate backends can stand
//! in for the file stores.

use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::profile::DeveloperProfile;
use crate::record::{ListFilter, NewVerification, RecordPage, VerificationRecord};

/// Boxed future returned by store methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Append-only ledger of verification outcomes.
pub trait VerificationStore: Send + Sync {
    /// Validate and durably append one record, returning it with its
    /// assigned id and `created_at`.
    fn save(&self, input: NewVerification) -> StoreFuture<'_, VerificationRecord>;

    fn get<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Option<VerificationRecord>>;

    /// Records matching `filter`, newest first, after skipping `offset` and
    /// taking at most `limit`. `total` counts every match.
    fn list<'a>(
        &'a self,
        filter: &'a ListFilter,
        limit: usize,
        offset: usize,
    ) -> StoreFuture<'a, RecordPage>;

    /// Most recent record for `email` (case-insensitive), optionally scoped
    /// to an owning profile.
    fn latest_for_email<'a>(
        &'a self,
        email: &'a str,
        owner_id: Option<&'a str>,
    ) -> StoreFuture<'a, Option<VerificationRecord>> {
        Box::pin(async move {
            let filter = ListFilter {
                user_email: Some(email.to_string()),
                owner_id: owner_id.map(str::to_string),
                ..ListFilter::default()
            };
            let page = self.list(&filter, 1, 0).await?;
            Ok(page.records.into_iter().next())
        })
    }

    /// Most recent record in the history of one verification: the record
    /// with that id or any record linked to it, optionally scoped to an
    /// owning profile.
    fn latest_in_history<'a>(
        &'a self,
        verification_id: &'a str,
        owner_id: Option<&'a str>,
    ) -> StoreFuture<'a, Option<VerificationRecord>> {
        Box::pin(async move {
            let filter = ListFilter {
                verification_id: Some(verification_id.to_string()),
                owner_id: owner_id.map(str::to_string),
                ..ListFilter::default()
            };
            let page = self.list(&filter, 1, 0).await?;
            Ok(page.records.into_iter().next())
        })
    }
}

/// Lookup of developer profiles by API key.
pub trait ProfileStore: Send + Sync {
    fn find_by_api_key<'a>(&'a self, api_key: &'a str)
    -> StoreFuture<'a, Option<DeveloperProfile>>;
}
