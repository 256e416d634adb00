//! Normalized client cache: entity store, tag index, deduplicating query
//! executor and the mutation coordinator, all sharing one [`CacheContext`].

use std::{collections::HashMap, sync::Arc};

use parking_lot::{Mutex, MutexGuard};
use serde_json::Value;
use shared::domain::ResourceType;
use tokio::sync::broadcast;

use crate::{config::ClientSettings, error::CacheError, transport::Transport};

pub mod mutation;
pub mod query;
pub mod store;
pub mod tags;

pub use mutation::{MutationCommand, MutationCoordinator, MutationOutcome, RefetchSet};
pub use query::{
    ParamValue, QueryData, QueryDescriptor, QueryExecutor, QueryKey, QueryStatus,
    QuerySubscription, ResponseShape,
};
pub use store::{CacheEntry, EntityId, EntityStore, PutOutcome};
pub use tags::{Tag, TagIndex, TagScope};

use query::{InFlightRequest, QueryRecord};

#[derive(Debug, Clone)]
pub enum CacheEvent {
    QuerySettled {
        key: QueryKey,
    },
    QueryFailed {
        key: QueryKey,
        error: CacheError,
    },
    EntityRemoved {
        resource: ResourceType,
        id: EntityId,
    },
    Invalidated {
        tags: Vec<Tag>,
        queries: Vec<QueryKey>,
    },
}

/// Everything guarded by the context lock. Nothing awaits while holding it.
#[derive(Default)]
pub(crate) struct CacheState {
    pub(crate) store: EntityStore,
    pub(crate) tags: TagIndex,
    pub(crate) queries: HashMap<QueryKey, QueryRecord>,
    pub(crate) in_flight: HashMap<QueryKey, InFlightRequest>,
    pub(crate) next_generation: u64,
}

impl CacheState {
    /// Result of a subscribed, settled and not invalidated query.
    fn fresh_result(&self, key: &QueryKey) -> Option<Arc<Value>> {
        let record = self.queries.get(key)?;
        if record.subscribers == 0 || record.stale || record.status != QueryStatus::Settled {
            return None;
        }
        self.materialize(record.data.as_ref()?)
    }

    /// Resolves entity references against the store. Entities removed since
    /// the query settled drop out of lists; a removed single record yields
    /// `None`.
    fn materialize(&self, data: &QueryData) -> Option<Arc<Value>> {
        match data {
            QueryData::Entities { resource, ids } => {
                let records = ids
                    .iter()
                    .filter_map(|id| self.store.get(*resource, id))
                    .map(|entry| (*entry.payload).clone())
                    .collect();
                Some(Arc::new(Value::Array(records)))
            }
            QueryData::Entity { resource, id } => self
                .store
                .get(*resource, id)
                .map(|entry| Arc::clone(&entry.payload)),
            QueryData::Opaque(body) => Some(Arc::clone(body)),
        }
    }
}

/// Shared cache state plus the transport it fetches through. Passed
/// explicitly to every component; there is no process-wide instance.
pub struct CacheContext {
    transport: Arc<dyn Transport>,
    state: Mutex<CacheState>,
    events: broadcast::Sender<CacheEvent>,
}

impl CacheContext {
    pub fn new(transport: Arc<dyn Transport>) -> Arc<Self> {
        Self::with_event_capacity(transport, ClientSettings::default().event_capacity)
    }

    pub fn with_event_capacity(transport: Arc<dyn Transport>, capacity: usize) -> Arc<Self> {
        let (events, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self {
            transport,
            state: Mutex::new(CacheState::default()),
            events,
        })
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    /// Snapshot of one stored entity.
    pub fn entity(&self, resource: ResourceType, id: &EntityId) -> Option<CacheEntry> {
        self.lock().store.get(resource, id).cloned()
    }

    pub fn entity_count(&self) -> usize {
        self.lock().store.len()
    }

    pub fn entity_ids(&self, resource: ResourceType) -> Vec<EntityId> {
        self.lock().store.ids(resource)
    }

    /// Subscribed query identities registered under any of `tags`.
    pub fn tags_to_queries(&self, tags: &[Tag]) -> Vec<QueryKey> {
        let mut keys: Vec<QueryKey> = self.lock().tags.tags_to_queries(tags).into_iter().collect();
        keys.sort();
        keys
    }

    pub fn tags_for(&self, key: &QueryKey) -> Vec<Tag> {
        self.lock().tags.tags_for(key)
    }

    pub fn is_in_flight(&self, key: &QueryKey) -> bool {
        self.lock().in_flight.contains_key(key)
    }

    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        self.lock()
            .queries
            .get(key)
            .map(|record| record.subscribers)
            .unwrap_or(0)
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock()
    }

    pub(crate) fn emit(&self, event: CacheEvent) {
        // No receivers is not an error.
        let _ = self.events.send(event);
    }
}
