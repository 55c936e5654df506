use crate::models::Medication;
use crate::services::MongoDb;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use service_core::error::AppError;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Persistence operations behind the medication handlers.
///
/// Each method is a single call against the backing collection; callers own
/// timeouts and the mapping of `None`/`false` to "not found".
#[async_trait]
pub trait MedicationStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Medication>, AppError>;

    async fn get(&self, id: ObjectId) -> Result<Option<Medication>, AppError>;

    /// Insert `medication`, ignoring any id it carries, and return it with
    /// the identifier the store assigned.
    async fn create(&self, medication: Medication) -> Result<Medication, AppError>;

    /// Overwrite every mutable field of record `id`. Returns `None` when no
    /// record matched.
    async fn replace(
        &self,
        id: ObjectId,
        medication: Medication,
    ) -> Result<Option<Medication>, AppError>;

    /// Returns whether a record was removed.
    async fn delete(&self, id: ObjectId) -> Result<bool, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;

    async fn close(&self);
}

#[derive(Clone)]
pub struct MongoMedicationStore {
    db: MongoDb,
}

impl MongoMedicationStore {
    pub fn new(db: MongoDb) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MedicationStore for MongoMedicationStore {
    async fn list(&self) -> Result<Vec<Medication>, AppError> {
        let cursor = self.db.medications().find(doc! {}, None).await?;
        let medications: Vec<Medication> = cursor.try_collect().await?;
        Ok(medications)
    }

    async fn get(&self, id: ObjectId) -> Result<Option<Medication>, AppError> {
        let medication = self
            .db
            .medications()
            .find_one(doc! { "_id": id }, None)
            .await?;
        Ok(medication)
    }

    async fn create(&self, mut medication: Medication) -> Result<Medication, AppError> {
        medication.id = None;
        let result = self
            .db
            .medications()
            .insert_one(&medication, None)
            .await?;

        let id = result.inserted_id.as_object_id().ok_or_else(|| {
            AppError::DatabaseError(anyhow::anyhow!(
                "Inserted id is not an ObjectId: {}",
                result.inserted_id
            ))
        })?;

        Ok(medication.with_id(id))
    }

    async fn replace(
        &self,
        id: ObjectId,
        medication: Medication,
    ) -> Result<Option<Medication>, AppError> {
        let update = doc! {
            "$set": {
                "name": medication.name.as_str(),
                "description": medication.description.as_str(),
                "price": medication.price,
                "imageUrl": medication.image_url.as_str(),
            }
        };

        let result = self
            .db
            .medications()
            .update_one(doc! { "_id": id }, update, None)
            .await?;

        if result.matched_count == 0 {
            return Ok(None);
        }

        Ok(Some(medication.with_id(id)))
    }

    async fn delete(&self, id: ObjectId) -> Result<bool, AppError> {
        let result = self
            .db
            .medications()
            .delete_one(doc! { "_id": id }, None)
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.db.health_check().await
    }

    async fn close(&self) {
        self.db.close().await;
    }
}

/// Process-local store.
///
/// Records are kept in insertion order under a sequence number drawn from
/// an atomic counter; `index` maps identifiers to sequence numbers.
#[derive(Default)]
pub struct InMemoryMedicationStore {
    next_seq: AtomicU64,
    records: RwLock<Records>,
}

#[derive(Default)]
struct Records {
    by_seq: BTreeMap<u64, Medication>,
    index: HashMap<ObjectId, u64>,
}

impl InMemoryMedicationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MedicationStore for InMemoryMedicationStore {
    async fn list(&self) -> Result<Vec<Medication>, AppError> {
        Ok(self.records.read().await.by_seq.values().cloned().collect())
    }

    async fn get(&self, id: ObjectId) -> Result<Option<Medication>, AppError> {
        let records = self.records.read().await;
        Ok(records
            .index
            .get(&id)
            .and_then(|seq| records.by_seq.get(seq))
            .cloned())
    }

    async fn create(&self, medication: Medication) -> Result<Medication, AppError> {
        let id = ObjectId::new();
        let medication = medication.with_id(id);

        let mut records = self.records.write().await;
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        records.index.insert(id, seq);
        records.by_seq.insert(seq, medication.clone());

        Ok(medication)
    }

    async fn replace(
        &self,
        id: ObjectId,
        medication: Medication,
    ) -> Result<Option<Medication>, AppError> {
        let mut records = self.records.write().await;
        let Some(seq) = records.index.get(&id).copied() else {
            return Ok(None);
        };

        let medication = medication.with_id(id);
        records.by_seq.insert(seq, medication.clone());
        Ok(Some(medication))
    }

    async fn delete(&self, id: ObjectId) -> Result<bool, AppError> {
        let mut records = self.records.write().await;
        match records.index.remove(&id) {
            Some(seq) => Ok(records.by_seq.remove(&seq).is_some()),
            None => Ok(false),
        }
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn close(&self) {
        let count = self.records.read().await.by_seq.len();
        tracing::info!(records = count, "Discarding in-memory medication store");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aspirin() -> Medication {
        Medication::new(
            "Aspirin".to_string(),
            "Pain relief".to_string(),
            4.5,
            "http://x/a.png".to_string(),
        )
    }

    #[tokio::test]
    async fn create_assigns_fresh_id() {
        let store = InMemoryMedicationStore::new();
        let supplied = ObjectId::new();

        let created = store.create(aspirin().with_id(supplied)).await.unwrap();

        let id = created.id.unwrap();
        assert_ne!(id, supplied);
        assert_eq!(store.get(id).await.unwrap(), Some(created));
        assert_eq!(store.get(supplied).await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_preserves_insertion_order() {
        let store = InMemoryMedicationStore::new();
        let mut names = Vec::new();
        for name in ["Aspirin", "Ibuprofen", "Paracetamol"] {
            let mut medication = aspirin();
            medication.name = name.to_string();
            store.create(medication).await.unwrap();
            names.push(name.to_string());
        }

        let listed: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(listed, names);
    }

    #[tokio::test]
    async fn replace_overwrites_all_fields() {
        let store = InMemoryMedicationStore::new();
        let id = store.create(aspirin()).await.unwrap().id.unwrap();

        let replacement =
            Medication::new("Aspirin 500".to_string(), String::new(), 0.0, String::new());
        let updated = store.replace(id, replacement).await.unwrap().unwrap();

        assert_eq!(updated.id, Some(id));
        assert_eq!(updated.description, "");
        assert_eq!(updated.image_url, "");
        assert_eq!(store.get(id).await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn missing_ids_report_absence() {
        let store = InMemoryMedicationStore::new();
        let id = ObjectId::new();

        assert_eq!(store.get(id).await.unwrap(), None);
        assert_eq!(store.replace(id, aspirin()).await.unwrap(), None);
        assert!(!store.delete(id).await.unwrap());
    }

    #[tokio::test]
    async fn delete_removes_record_once() {
        let store = InMemoryMedicationStore::new();
        let id = store.create(aspirin()).await.unwrap().id.unwrap();

        assert!(store.delete(id).await.unwrap());
        assert!(!store.delete(id).await.unwrap());
        assert!(store.list().await.unwrap().is_empty());
    }
}
