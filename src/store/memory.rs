//! In-memory record and glossary stores for tests and scenario runs.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::record::{GlossaryTerm, MeetingRecord, MeetingStatus, RecordKey};

use super::{GlossaryStore, RecordPatch, RecordStore};

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<RecordKey, MeetingRecord>>,
    terms: Mutex<Vec<GlossaryTerm>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_terms(&self, terms: Vec<GlossaryTerm>) {
        *self.terms.lock().unwrap() = terms;
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<MeetingRecord>> {
        Ok(self.records.lock().unwrap().get(key).cloned())
    }

    async fn put(&self, record: &MeetingRecord) -> Result<()> {
        self.records
            .lock()
            .unwrap()
            .insert(record.key(), record.clone());
        Ok(())
    }

    async fn update(&self, key: &RecordKey, patch: RecordPatch) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        let Some(record) = records.get_mut(key) else {
            bail!("record not found: {}/{}", key.meeting_id, key.created_at);
        };
        patch.apply(record);
        Ok(())
    }

    async fn update_if_status(
        &self,
        key: &RecordKey,
        expected: MeetingStatus,
        patch: RecordPatch,
    ) -> Result<bool> {
        let mut records = self.records.lock().unwrap();
        let Some(record) = records.get_mut(key) else {
            return Ok(false);
        };
        if record.status != expected {
            return Ok(false);
        }
        patch.apply(record);
        Ok(true)
    }

    async fn find_by_status(
        &self,
        status: MeetingStatus,
        s3_key: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MeetingRecord>> {
        let records = self.records.lock().unwrap();
        let mut matches: Vec<MeetingRecord> = records
            .values()
            .filter(|r| r.status == status)
            .filter(|r| s3_key.map(|k| r.s3_key == k).unwrap_or(true))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        matches.truncate(limit);
        Ok(matches)
    }

    async fn find_latest(&self, meeting_id: &str) -> Result<Option<MeetingRecord>> {
        let records = self.records.lock().unwrap();
        Ok(records
            .values()
            .filter(|r| r.meeting_id == meeting_id)
            .max_by(|a, b| a.created_at.cmp(&b.created_at))
            .cloned())
    }
}

#[async_trait]
impl GlossaryStore for MemoryStore {
    async fn list_terms(&self) -> Result<Vec<GlossaryTerm>> {
        Ok(self.terms.lock().unwrap().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MeetingType;

    fn record(id: &str, created_at: &str, status: MeetingStatus, s3_key: &str) -> MeetingRecord {
        let mut r = MeetingRecord::new_pending(
            id,
            created_at,
            "",
            "x.mp4",
            MeetingType::General,
            s3_key,
        );
        r.status = status;
        r
    }

    #[tokio::test]
    async fn test_put_get_update() {
        let store = MemoryStore::new();
        let r = record("m1", "t0", MeetingStatus::Pending, "inbox/m1/x.mp4");
        store.put(&r).await.unwrap();

        store
            .update(
                &r.key(),
                RecordPatch {
                    status: Some(MeetingStatus::Processing),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let loaded = store.get(&r.key()).await.unwrap().unwrap();
        assert_eq!(loaded.status, MeetingStatus::Processing);
    }

    #[tokio::test]
    async fn test_update_missing_record_fails() {
        let store = MemoryStore::new();
        let key = RecordKey::new("nope", "t0");
        assert!(store.update(&key, RecordPatch::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_conditional_update() {
        let store = MemoryStore::new();
        let r = record("m1", "t0", MeetingStatus::Failed, "inbox/m1/x.mp4");
        store.put(&r).await.unwrap();

        let patch = RecordPatch {
            status: Some(MeetingStatus::Processing),
            clear_error: true,
            ..Default::default()
        };
        assert!(store
            .update_if_status(&r.key(), MeetingStatus::Failed, patch.clone())
            .await
            .unwrap());
        // Second attempt: status no longer `failed`.
        assert!(!store
            .update_if_status(&r.key(), MeetingStatus::Failed, patch)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_find_by_status_with_filter() {
        let store = MemoryStore::new();
        store
            .put(&record("m1", "t0", MeetingStatus::Pending, "inbox/a.mp4"))
            .await
            .unwrap();
        store
            .put(&record("m2", "t1", MeetingStatus::Pending, "inbox/b.mp4"))
            .await
            .unwrap();
        store
            .put(&record("m3", "t2", MeetingStatus::Completed, "inbox/a.mp4"))
            .await
            .unwrap();

        let hits = store
            .find_by_status(MeetingStatus::Pending, Some("inbox/a.mp4"), 1)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].meeting_id, "m1");

        let none = store
            .find_by_status(MeetingStatus::Failed, Some("inbox/a.mp4"), 1)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_find_latest_picks_newest() {
        let store = MemoryStore::new();
        store
            .put(&record("m1", "2025-01-01T00:00:00.000Z", MeetingStatus::Failed, "a"))
            .await
            .unwrap();
        store
            .put(&record("m1", "2025-02-01T00:00:00.000Z", MeetingStatus::Completed, "a"))
            .await
            .unwrap();

        let latest = store.find_latest("m1").await.unwrap().unwrap();
        assert_eq!(latest.created_at, "2025-02-01T00:00:00.000Z");
        assert!(store.find_latest("m2").await.unwrap().is_none());
    }
}
