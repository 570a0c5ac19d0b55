//! File-backed verification ledger
//!
//! Records live in memory as an insertion-ordered `Vec` and are mirrored to
//! a JSON-lines file on disk, one record per line. Every `save` holds the
//! lock across the in-memory push and the file append, so concurrent saves
//! are serialized and none is lost. A save writes only its own line.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::Result;
use crate::persist::{append_line, load_lines};
use crate::record::{ListFilter, NewVerification, RecordPage, VerificationRecord};
use crate::store::{StoreFuture, VerificationStore};

/// Append-only ledger persisted to a single JSON-lines file.
pub struct FileLedger {
    path: PathBuf,
    records: Mutex<Vec<VerificationRecord>>,
}

impl FileLedger {
    /// Load the ledger from `path`, creating an empty file on cold start.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records: Vec<VerificationRecord> = load_lines(&path).await?;
        info!(path = %path.display(), records = records.len(), "verification ledger loaded");
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    async fn append(&self, input: NewVerification) -> Result<VerificationRecord> {
        let mut records = self.records.lock().await;

        // Clock steps backwards must not reorder the ledger
        let floor = records.last().map(|r| r.created_at).unwrap_or(0);
        let created_at = now_millis().max(floor);

        let id = format!("vr_{}", uuid::Uuid::new_v4().simple());
        let record = input.into_record(id, created_at)?;

        records.push(record.clone());
        if let Err(e) = append_line(&self.path, &record).await {
            records.pop();
            warn!(error = %e, "verification record not persisted, rolled back");
            return Err(e);
        }

        info!(
            id = %record.id,
            status = %record.status,
            kind = %record.kind,
            "verification recorded"
        );
        Ok(record)
    }

    async fn page(&self, filter: &ListFilter, limit: usize, offset: usize) -> RecordPage {
        let records = self.records.lock().await;
        let matching: Vec<&VerificationRecord> =
            records.iter().rev().filter(|r| filter.matches(r)).collect();
        let total = matching.len();
        let records = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        RecordPage { records, total }
    }
}

impl VerificationStore for FileLedger {
    fn save(&self, input: NewVerification) -> StoreFuture<'_, VerificationRecord> {
        Box::pin(self.append(input))
    }

    fn get<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Option<VerificationRecord>> {
        Box::pin(async move {
            let records = self.records.lock().await;
            Ok(records.iter().find(|r| r.id == id).cloned())
        })
    }

    fn list<'a>(
        &'a self,
        filter: &'a ListFilter,
        limit: usize,
        offset: usize,
    ) -> StoreFuture<'a, RecordPage> {
        Box::pin(async move { Ok(self.page(filter, limit, offset).await) })
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl std::fmt::Debug for FileLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileLedger")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::record::VerificationStatus;
    use std::sync::Arc;

    async fn temp_ledger() -> (tempfile::TempDir, FileLedger) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FileLedger::open(dir.path().join("verifications.jsonl"))
            .await
            .unwrap();
        (dir, ledger)
    }

    #[tokio::test]
    async fn save_assigns_id_and_defaults() {
        let (_dir, ledger) = temp_ledger().await;
        let record = ledger
            .save(NewVerification::new("a@b.com", VerificationStatus::Success))
            .await
            .unwrap();

        assert!(record.id.starts_with("vr_"));
        assert_eq!(record.kind, "KYC");
        assert_eq!(record.api_provider, "fayda");
        assert!(record.created_at > 0);
        let id = record.id.clone();
        assert_eq!(ledger.get(&id).await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn invalid_input_creates_no_record() {
        let (_dir, ledger) = temp_ledger().await;
        let input = NewVerification {
            status: Some(VerificationStatus::Success),
            ..NewVerification::default()
        };

        let err = ledger.save(input).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn failed_write_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("verifications.jsonl");
        let ledger = FileLedger::open(&path).await.unwrap();

        // A directory in place of the ledger file makes the append fail
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        let err = ledger
            .save(NewVerification::new("a@b.com", VerificationStatus::Failed))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Persistence(_)), "got {err:?}");
        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn list_is_newest_first_with_total() {
        let (_dir, ledger) = temp_ledger().await;
        for i in 0..5 {
            ledger
                .save(NewVerification::new(format!("u{i}@b.com"), VerificationStatus::Success))
                .await
                .unwrap();
        }

        let page = ledger.list(&ListFilter::default(), 2, 1).await.unwrap();
        assert_eq!(page.total, 5);
        let emails: Vec<_> = page.records.iter().map(|r| r.user_email.as_str()).collect();
        assert_eq!(emails, vec!["u3@b.com", "u2@b.com"]);
    }

    #[tokio::test]
    async fn offset_past_end_is_empty_page() {
        let (_dir, ledger) = temp_ledger().await;
        ledger
            .save(NewVerification::new("a@b.com", VerificationStatus::Pending))
            .await
            .unwrap();

        let page = ledger.list(&ListFilter::default(), 10, 5).await.unwrap();
        assert!(page.records.is_empty());
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn latest_for_email_respects_owner() {
        let (_dir, ledger) = temp_ledger().await;
        ledger
            .save(NewVerification::new("a@b.com", VerificationStatus::Pending).owned_by("p1"))
            .await
            .unwrap();
        let second = ledger
            .save(NewVerification::new("A@B.com", VerificationStatus::Success).owned_by("p1"))
            .await
            .unwrap();
        ledger
            .save(NewVerification::new("a@b.com", VerificationStatus::Failed).owned_by("p2"))
            .await
            .unwrap();

        let latest = ledger.latest_for_email("a@b.com", Some("p1")).await.unwrap();
        assert_eq!(latest.map(|r| r.id), Some(second.id));

        let any = ledger.latest_for_email("a@b.com", None).await.unwrap().unwrap();
        assert_eq!(any.status, VerificationStatus::Failed);

        assert!(ledger.latest_for_email("nobody@b.com", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn latest_in_history_ignores_other_verifications_for_same_email() {
        let (_dir, ledger) = temp_ledger().await;
        let first = ledger
            .save(NewVerification::new("a@b.com", VerificationStatus::Pending).owned_by("p1"))
            .await
            .unwrap();
        let outcome = ledger
            .save(
                NewVerification::new("a@b.com", VerificationStatus::Success)
                    .owned_by("p1")
                    .with_metadata(crate::record::VERIFICATION_LINK_KEY, first.id.clone()),
            )
            .await
            .unwrap();
        let second = ledger
            .save(NewVerification::new("a@b.com", VerificationStatus::Pending).owned_by("p1"))
            .await
            .unwrap();

        let latest = ledger.latest_in_history(&first.id, Some("p1")).await.unwrap();
        assert_eq!(latest.map(|r| r.id), Some(outcome.id));

        let latest = ledger.latest_in_history(&second.id, Some("p1")).await.unwrap();
        assert_eq!(latest.map(|r| r.id), Some(second.id));

        assert!(ledger.latest_in_history(&first.id, Some("p2")).await.unwrap().is_none());
        assert!(ledger.latest_in_history("vr_missing", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_saves_for_same_email_both_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("verifications.jsonl");
        let ledger = Arc::new(FileLedger::open(&path).await.unwrap());

        let a = {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                ledger
                    .save(NewVerification::new("same@b.com", VerificationStatus::Pending))
                    .await
            })
        };
        let b = {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                ledger
                    .save(NewVerification::new("same@b.com", VerificationStatus::Success))
                    .await
            })
        };
        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();
        assert_ne!(a.id, b.id);

        let reopened = FileLedger::open(&path).await.unwrap();
        let page = reopened
            .list(
                &ListFilter {
                    user_email: Some("same@b.com".into()),
                    ..ListFilter::default()
                },
                10,
                0,
            )
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert!(page.records[0].created_at >= page.records[1].created_at);
    }

    #[tokio::test]
    async fn save_appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("verifications.jsonl");
        let ledger = FileLedger::open(&path).await.unwrap();
        let first = ledger
            .save(NewVerification::new("a@b.com", VerificationStatus::Pending))
            .await
            .unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        ledger
            .save(NewVerification::new("a@b.com", VerificationStatus::Success))
            .await
            .unwrap();

        let after = std::fs::read_to_string(&path).unwrap();
        assert!(after.starts_with(&before), "earlier lines must not be rewritten");
        assert_eq!(after.lines().count(), 2);
        let head: VerificationRecord = serde_json::from_str(after.lines().next().unwrap()).unwrap();
        assert_eq!(head.id, first.id);
    }

    #[tokio::test]
    async fn reopen_preserves_records_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("verifications.jsonl");
        {
            let ledger = FileLedger::open(&path).await.unwrap();
            ledger
                .save(NewVerification::new("first@b.com", VerificationStatus::Pending))
                .await
                .unwrap();
            ledger
                .save(
                    NewVerification::new("second@b.com", VerificationStatus::Success)
                        .with_metadata("source", "web"),
                )
                .await
                .unwrap();
        }

        let ledger = FileLedger::open(&path).await.unwrap();
        let page = ledger.list(&ListFilter::default(), 10, 0).await.unwrap();
        assert_eq!(page.records[0].user_email, "second@b.com");
        assert_eq!(page.records[0].metadata["source"], "web");
        assert_eq!(page.records[1].user_email, "first@b.com");
    }
}
