use std::{
    collections::{hash_map::Entry, BTreeSet, HashMap},
    fmt,
    sync::Arc,
};

use chrono::{DateTime, Utc};
use serde_json::Value;
use shared::domain::{
    FieldId, ImageId, ProcessingResultId, ResourceType, SeasonId, UavFlightId, UserId,
};

use super::tags::Tag;

/// Server-assigned identifier, unique within one [`ResourceType`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reads the `id` member of a serialized record, numeric or textual.
    pub fn from_payload(record: &Value) -> Option<Self> {
        match record.get("id")? {
            Value::Number(n) => Some(Self(n.to_string())),
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

macro_rules! entity_id_from {
    ($($name:ident),*) => {
        $(
            impl From<$name> for EntityId {
                fn from(id: $name) -> Self {
                    Self(id.0.to_string())
                }
            }
        )*
    };
}

entity_id_from!(UserId, FieldId, SeasonId, UavFlightId, ImageId, ProcessingResultId);

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub resource: ResourceType,
    pub id: EntityId,
    pub payload: Arc<Value>,
    pub fetched_at: DateTime<Utc>,
    pub tags: BTreeSet<Tag>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Inserted,
    Replaced,
    Unchanged,
}

/// Normalized table of fetched records, one entry per `(resource, id)`.
///
/// No expiry: an entry is stale only when a mutation says so through its
/// tags. Refreshes go through [`EntityStore::put`]; [`EntityStore::remove`]
/// is reserved for deletions.
#[derive(Debug, Default)]
pub struct EntityStore {
    entries: HashMap<(ResourceType, EntityId), CacheEntry>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, resource: ResourceType, id: &EntityId) -> Option<&CacheEntry> {
        self.entries.get(&(resource, id.clone()))
    }

    /// Writes a record. An identical payload keeps the original `fetched_at`
    /// and only merges tags; a different payload replaces the entry.
    pub fn put(
        &mut self,
        resource: ResourceType,
        id: EntityId,
        payload: Value,
        tags: &[Tag],
    ) -> PutOutcome {
        match self.entries.entry((resource, id.clone())) {
            Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();
                if *entry.payload == payload {
                    entry.tags.extend(tags.iter().cloned());
                    return PutOutcome::Unchanged;
                }
                entry.payload = Arc::new(payload);
                entry.fetched_at = Utc::now();
                entry.tags = tags.iter().cloned().collect();
                PutOutcome::Replaced
            }
            Entry::Vacant(slot) => {
                slot.insert(CacheEntry {
                    resource,
                    id,
                    payload: Arc::new(payload),
                    fetched_at: Utc::now(),
                    tags: tags.iter().cloned().collect(),
                });
                PutOutcome::Inserted
            }
        }
    }

    pub fn remove(&mut self, resource: ResourceType, id: &EntityId) -> Option<CacheEntry> {
        self.entries.remove(&(resource, id.clone()))
    }

    pub fn contains(&self, resource: ResourceType, id: &EntityId) -> bool {
        self.entries.contains_key(&(resource, id.clone()))
    }

    pub fn ids(&self, resource: ResourceType) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .entries
            .keys()
            .filter(|(r, _)| *r == resource)
            .map(|(_, id)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn put_then_get_returns_the_record() {
        let mut store = EntityStore::new();
        let outcome = store.put(
            ResourceType::Field,
            EntityId::from(3_i64),
            json!({"id": 3, "name": "north"}),
            &[Tag::list(ResourceType::Field)],
        );
        assert_eq!(outcome, PutOutcome::Inserted);

        let entry = store
            .get(ResourceType::Field, &EntityId::from(3_i64))
            .expect("entry");
        assert_eq!(entry.payload["name"], "north");
        assert!(entry.tags.contains(&Tag::list(ResourceType::Field)));
        assert!(store.get(ResourceType::Season, &EntityId::from(3_i64)).is_none());
    }

    #[test]
    fn identical_payload_keeps_fetched_at() {
        let mut store = EntityStore::new();
        let id = EntityId::from(9_i64);
        store.put(ResourceType::Season, id.clone(), json!({"id": 9}), &[]);
        let first = store.get(ResourceType::Season, &id).expect("entry").fetched_at;

        let outcome = store.put(
            ResourceType::Season,
            id.clone(),
            json!({"id": 9}),
            &[Tag::id(ResourceType::Season, 9_i64)],
        );
        assert_eq!(outcome, PutOutcome::Unchanged);
        let entry = store.get(ResourceType::Season, &id).expect("entry");
        assert_eq!(entry.fetched_at, first);
        assert!(entry.tags.contains(&Tag::id(ResourceType::Season, 9_i64)));
    }

    #[test]
    fn differing_payload_overwrites_in_place() {
        let mut store = EntityStore::new();
        let id = EntityId::from(9_i64);
        store.put(ResourceType::Season, id.clone(), json!({"id": 9, "name": "a"}), &[]);
        let outcome = store.put(
            ResourceType::Season,
            id.clone(),
            json!({"id": 9, "name": "b"}),
            &[],
        );
        assert_eq!(outcome, PutOutcome::Replaced);
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get(ResourceType::Season, &id).expect("entry").payload["name"],
            "b"
        );
    }

    #[test]
    fn remove_evicts_only_the_given_entity() {
        let mut store = EntityStore::new();
        store.put(ResourceType::Field, EntityId::from(1_i64), json!({"id": 1}), &[]);
        store.put(ResourceType::Field, EntityId::from(2_i64), json!({"id": 2}), &[]);

        assert!(store.remove(ResourceType::Field, &EntityId::from(1_i64)).is_some());
        assert!(store.remove(ResourceType::Field, &EntityId::from(1_i64)).is_none());
        assert_eq!(store.ids(ResourceType::Field), vec![EntityId::from(2_i64)]);
    }

    #[test]
    fn payload_ids_accept_numbers_and_strings() {
        assert_eq!(
            EntityId::from_payload(&json!({"id": 12})),
            Some(EntityId::from(12_i64))
        );
        assert_eq!(
            EntityId::from_payload(&json!({"id": "abc"})),
            Some(EntityId::from("abc"))
        );
        assert_eq!(EntityId::from_payload(&json!({"id": null})), None);
        assert_eq!(EntityId::from_payload(&json!({"name": "x"})), None);
    }
}
