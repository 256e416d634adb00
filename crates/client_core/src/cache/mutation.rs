use std::sync::Arc;

use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::domain::ResourceType;
use tracing::{debug, info, warn};

use super::{
    query::{QueryExecutor, QueryKey, SharedFetch},
    store::EntityId,
    tags::Tag,
    CacheEvent,
};
use crate::{
    error::{CacheError, CacheResult},
    transport::ApiRequest,
};

/// A write plus the cache consequences of its success: tags whose queries
/// must re-execute and entities to evict outright.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationCommand {
    label: &'static str,
    request: ApiRequest,
    invalidates: Vec<Tag>,
    removes: Vec<(ResourceType, EntityId)>,
}

impl MutationCommand {
    pub fn new(label: &'static str, request: ApiRequest) -> Self {
        Self {
            label,
            request,
            invalidates: Vec::new(),
            removes: Vec::new(),
        }
    }

    pub fn invalidating(mut self, tag: Tag) -> Self {
        if !self.invalidates.contains(&tag) {
            self.invalidates.push(tag);
        }
        self
    }

    pub fn removing(mut self, resource: ResourceType, id: impl Into<EntityId>) -> Self {
        self.removes.push((resource, id.into()));
        self
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn request(&self) -> &ApiRequest {
        &self.request
    }

    pub fn invalidates(&self) -> &[Tag] {
        &self.invalidates
    }

    pub fn removes(&self) -> &[(ResourceType, EntityId)] {
        &self.removes
    }
}

/// Refetches started by one mutation. They run whether or not this set is
/// awaited; awaiting only observes them.
pub struct RefetchSet {
    pending: Vec<(QueryKey, SharedFetch)>,
}

impl RefetchSet {
    pub fn keys(&self) -> Vec<QueryKey> {
        self.pending.iter().map(|(key, _)| key.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub async fn settled(self) -> Vec<(QueryKey, CacheResult<Arc<Value>>)> {
        let (keys, fetches): (Vec<_>, Vec<_>) = self.pending.into_iter().unzip();
        keys.into_iter().zip(join_all(fetches).await).collect()
    }
}

pub struct MutationOutcome {
    pub status: u16,
    pub response: Value,
    pub refetches: RefetchSet,
}

impl MutationOutcome {
    /// Decodes the record the server echoed back.
    pub fn decode<T: DeserializeOwned>(&self) -> CacheResult<T> {
        T::deserialize(&self.response)
            .map_err(|err| CacheError::unexpected(format!("mutation response: {err}")))
    }
}

#[derive(Clone)]
pub struct MutationCoordinator {
    queries: QueryExecutor,
}

impl MutationCoordinator {
    pub fn new(queries: QueryExecutor) -> Self {
        Self { queries }
    }

    /// Sends the write; only once it succeeded evicts the command's
    /// deleted entities and re-executes every subscribed query under its
    /// tags. A failed write leaves the cache untouched.
    pub async fn apply(&self, command: MutationCommand) -> CacheResult<MutationOutcome> {
        let ctx = self.queries.context();
        debug!(mutation = command.label, "sending mutation");

        let response = match ctx.transport().send(command.request.clone()).await {
            Ok(response) => response,
            Err(err) => {
                warn!(mutation = command.label, "mutation failed: {err}");
                return Err(err);
            }
        };

        let (removed, refetches) = {
            let mut guard = ctx.lock();
            let state = &mut *guard;
            let removed: Vec<(ResourceType, EntityId)> = command
                .removes
                .iter()
                .filter(|(resource, id)| state.store.remove(*resource, id).is_some())
                .cloned()
                .collect();
            let refetches = self.queries.invalidate(state, &command.invalidates);
            (removed, refetches)
        };

        for (resource, id) in removed {
            info!(mutation = command.label, %resource, %id, "evicted deleted entity");
            ctx.emit(CacheEvent::EntityRemoved { resource, id });
        }
        let refetches = RefetchSet { pending: refetches };
        if !command.invalidates.is_empty() {
            let queries = refetches.keys();
            info!(
                mutation = command.label,
                refetches = queries.len(),
                "invalidated tags"
            );
            ctx.emit(CacheEvent::Invalidated {
                tags: command.invalidates.clone(),
                queries,
            });
        }

        Ok(MutationOutcome {
            status: response.status,
            response: response.body,
            refetches,
        })
    }
}

#[cfg(test)]
#[path = "../tests/mutation_tests.rs"]
mod tests;
