use std::{collections::BTreeMap, fmt, sync::Arc};

use chrono::{DateTime, Utc};
use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use serde_json::Value;
use shared::domain::{FieldId, ImageId, ResourceType, SeasonId, UavFlightId, UserId};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use url::form_urlencoded;

use super::{
    store::EntityId,
    tags::Tag,
    CacheContext, CacheEvent, CacheState,
};
use crate::{
    error::{CacheError, CacheResult},
    transport::{ApiRequest, ApiResponse, HttpMethod},
};

/// Canonical identity of a parametrized read. Two descriptors with equal
/// keys are the same query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(String);

impl QueryKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Int(i64),
    Text(String),
    Bool(bool),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Text(v) => f.write_str(v),
            ParamValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

macro_rules! param_from_id {
    ($($name:ident),*) => {
        $(
            impl From<$name> for ParamValue {
                fn from(id: $name) -> Self {
                    ParamValue::Int(id.0)
                }
            }
        )*
    };
}

param_from_id!(UserId, FieldId, SeasonId, UavFlightId, ImageId);

/// How a response body maps onto the entity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// JSON array of records of one resource class, each carrying `id`.
    Collection(ResourceType),
    /// A single record carrying `id`.
    Record(ResourceType),
    /// Kept verbatim on the query result, never normalized.
    Opaque,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    endpoint: String,
    params: BTreeMap<String, ParamValue>,
    shape: ResponseShape,
    provides: Vec<Tag>,
}

impl QueryDescriptor {
    pub fn new(endpoint: impl Into<String>, shape: ResponseShape) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: BTreeMap::new(),
            shape,
            provides: Vec::new(),
        }
    }

    pub fn opaque(endpoint: impl Into<String>) -> Self {
        Self::new(endpoint, ResponseShape::Opaque)
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn provides(mut self, tag: Tag) -> Self {
        if !self.provides.contains(&tag) {
            self.provides.push(tag);
        }
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn params(&self) -> &BTreeMap<String, ParamValue> {
        &self.params
    }

    pub fn shape(&self) -> ResponseShape {
        self.shape
    }

    pub fn tags(&self) -> &[Tag] {
        &self.provides
    }

    /// Endpoint followed by the url-encoded parameters in key order.
    pub fn key(&self) -> QueryKey {
        if self.params.is_empty() {
            return QueryKey(self.endpoint.clone());
        }
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.params.iter().map(|(k, v)| (k.as_str(), v.to_string())))
            .finish();
        QueryKey(format!("{}?{query}", self.endpoint))
    }

    pub fn request(&self) -> ApiRequest {
        ApiRequest::new(HttpMethod::Get, self.endpoint.clone()).with_query(
            self.params
                .iter()
                .map(|(k, v)| (k.clone(), v.to_string()))
                .collect(),
        )
    }
}

/// Normalized result of a settled query: references into the entity store,
/// or the raw body for opaque shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryData {
    Entities {
        resource: ResourceType,
        ids: Vec<EntityId>,
    },
    Entity {
        resource: ResourceType,
        id: EntityId,
    },
    Opaque(Arc<Value>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Idle,
    Fetching,
    Settled,
    Failed,
}

/// Per-identity bookkeeping for queries with live subscribers.
#[derive(Debug, Clone)]
pub struct QueryRecord {
    pub descriptor: QueryDescriptor,
    pub subscribers: usize,
    pub status: QueryStatus,
    pub data: Option<QueryData>,
    pub stale: bool,
    pub settled_at: Option<DateTime<Utc>>,
    pub last_error: Option<CacheError>,
}

impl QueryRecord {
    fn new(descriptor: QueryDescriptor) -> Self {
        Self {
            descriptor,
            subscribers: 0,
            status: QueryStatus::Idle,
            data: None,
            stale: false,
            settled_at: None,
            last_error: None,
        }
    }
}

pub(crate) type SharedFetch = Shared<BoxFuture<'static, CacheResult<Arc<Value>>>>;

/// Outstanding round trip for one query identity.
pub(crate) struct InFlightRequest {
    pub(crate) handle: SharedFetch,
    pub(crate) generation: u64,
    pub(crate) waiters: usize,
    pub(crate) started_at: DateTime<Utc>,
}

struct Normalized {
    data: QueryData,
    records: Vec<(ResourceType, EntityId, Value)>,
}

impl Normalized {
    /// The response as its callers asked for it, without going through the
    /// store.
    fn into_value(self) -> Value {
        match self.data {
            QueryData::Opaque(body) => (*body).clone(),
            QueryData::Entity { .. } => self
                .records
                .into_iter()
                .next()
                .map(|(_, _, payload)| payload)
                .unwrap_or(Value::Null),
            QueryData::Entities { .. } => Value::Array(
                self.records
                    .into_iter()
                    .map(|(_, _, payload)| payload)
                    .collect(),
            ),
        }
    }
}

fn normalize(shape: ResponseShape, body: Value) -> CacheResult<Normalized> {
    match shape {
        ResponseShape::Collection(resource) => {
            let Value::Array(items) = body else {
                return Err(CacheError::unexpected(format!(
                    "expected a list of {resource} records"
                )));
            };
            let mut ids = Vec::with_capacity(items.len());
            let mut records = Vec::with_capacity(items.len());
            for item in items {
                let id = EntityId::from_payload(&item).ok_or_else(|| {
                    CacheError::unexpected(format!("{resource} record without an id"))
                })?;
                ids.push(id.clone());
                records.push((resource, id, item));
            }
            Ok(Normalized {
                data: QueryData::Entities { resource, ids },
                records,
            })
        }
        ResponseShape::Record(resource) => {
            let id = EntityId::from_payload(&body).ok_or_else(|| {
                CacheError::unexpected(format!("{resource} record without an id"))
            })?;
            Ok(Normalized {
                data: QueryData::Entity {
                    resource,
                    id: id.clone(),
                },
                records: vec![(resource, id, body)],
            })
        }
        ResponseShape::Opaque => Ok(Normalized {
            data: QueryData::Opaque(Arc::new(body)),
            records: Vec::new(),
        }),
    }
}

/// Runs reads against the transport, deduplicating concurrent identical
/// reads and populating the entity store and tag index on settle.
#[derive(Clone)]
pub struct QueryExecutor {
    ctx: Arc<CacheContext>,
}

impl QueryExecutor {
    pub fn new(ctx: Arc<CacheContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<CacheContext> {
        &self.ctx
    }

    /// Serves a fresh subscribed result from the cache, otherwise fetches.
    /// Concurrent calls for one key share a single round trip.
    pub async fn run(&self, descriptor: &QueryDescriptor) -> CacheResult<Arc<Value>> {
        let key = descriptor.key();
        let fetch = {
            let mut state = self.ctx.lock();
            if let Some(hit) = state.fresh_result(&key) {
                debug!(%key, "serving query from cache");
                return Ok(hit);
            }
            self.attach_or_start(&mut state, &key, descriptor)
        };
        fetch.await
    }

    /// Registers a live subscriber. Results of a subscribed identity stay
    /// cached and its tags stay indexed until the last subscription drops.
    pub fn subscribe(&self, descriptor: QueryDescriptor) -> QuerySubscription {
        let key = descriptor.key();
        {
            let mut state = self.ctx.lock();
            let record = state
                .queries
                .entry(key.clone())
                .or_insert_with(|| QueryRecord::new(descriptor.clone()));
            record.subscribers += 1;
            debug!(%key, subscribers = record.subscribers, "query subscribed");
        }
        QuerySubscription {
            executor: self.clone(),
            descriptor,
            key,
        }
    }

    pub fn status(&self, key: &QueryKey) -> QueryStatus {
        self.ctx
            .lock()
            .queries
            .get(key)
            .map(|record| record.status)
            .unwrap_or(QueryStatus::Idle)
    }

    /// Marks every subscribed query under `tags` stale and re-executes it.
    /// Runs inside the caller's critical section so removals made in the
    /// same section are visible before any refetch starts. A request already
    /// in flight may have read the server before the write, so it is
    /// superseded rather than joined.
    pub(crate) fn invalidate(
        &self,
        state: &mut CacheState,
        tags: &[Tag],
    ) -> Vec<(QueryKey, SharedFetch)> {
        let mut keys: Vec<QueryKey> = state.tags.tags_to_queries(tags).into_iter().collect();
        keys.sort();

        let mut refetches = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(record) = state.queries.get_mut(&key) else {
                continue;
            };
            if record.subscribers == 0 {
                continue;
            }
            record.stale = true;
            let descriptor = record.descriptor.clone();
            let fetch = self.start(state, &key, &descriptor);
            refetches.push((key, fetch));
        }
        refetches
    }

    fn attach_or_start(
        &self,
        state: &mut CacheState,
        key: &QueryKey,
        descriptor: &QueryDescriptor,
    ) -> SharedFetch {
        if let Some(in_flight) = state.in_flight.get_mut(key) {
            in_flight.waiters += 1;
            debug!(
                %key,
                waiters = in_flight.waiters,
                since = %in_flight.started_at,
                "attaching to in-flight query"
            );
            return in_flight.handle.clone();
        }
        self.start(state, key, descriptor)
    }

    /// Issues a new round trip for `key`. Any request still in flight for it
    /// keeps serving its own waiters but no longer writes the cache.
    fn start(
        &self,
        state: &mut CacheState,
        key: &QueryKey,
        descriptor: &QueryDescriptor,
    ) -> SharedFetch {
        state.next_generation += 1;
        let generation = state.next_generation;

        let (tx, rx) = oneshot::channel();
        let handle: SharedFetch = rx
            .map(|settled| {
                settled.unwrap_or_else(|_| {
                    Err(CacheError::transport("query task ended before settling"))
                })
            })
            .boxed()
            .shared();
        let superseded = state.in_flight.insert(
            key.clone(),
            InFlightRequest {
                handle: handle.clone(),
                generation,
                waiters: 1,
                started_at: Utc::now(),
            },
        );
        if let Some(old) = superseded {
            debug!(%key, superseded = old.generation, generation, "replacing in-flight query");
        }
        if let Some(record) = state.queries.get_mut(key) {
            record.status = QueryStatus::Fetching;
        }

        debug!(%key, generation, "starting query fetch");
        let ctx = Arc::clone(&self.ctx);
        let key = key.clone();
        let descriptor = descriptor.clone();
        tokio::spawn(async move {
            let outcome = ctx.transport().send(descriptor.request()).await;
            let result = settle(&ctx, &key, generation, &descriptor, outcome);
            // Every caller may have detached; the store is warm either way.
            let _ = tx.send(result);
        });
        handle
    }

    fn release(&self, key: &QueryKey) {
        let mut state = self.ctx.lock();
        let state = &mut *state;
        let Some(record) = state.queries.get_mut(key) else {
            return;
        };
        record.subscribers = record.subscribers.saturating_sub(1);
        if record.subscribers > 0 {
            return;
        }
        state.queries.remove(key);
        let pruned = state.tags.unsubscribe_query(key);
        debug!(%key, pruned, "last subscriber detached");
    }
}

fn settle(
    ctx: &CacheContext,
    key: &QueryKey,
    generation: u64,
    descriptor: &QueryDescriptor,
    outcome: CacheResult<ApiResponse>,
) -> CacheResult<Arc<Value>> {
    let normalized = outcome.and_then(|response| normalize(descriptor.shape(), response.body));

    let (result, event) = {
        let mut guard = ctx.lock();
        let state = &mut *guard;
        let current = state
            .in_flight
            .get(key)
            .is_some_and(|in_flight| in_flight.generation == generation);
        if !current {
            // A newer request owns this key; its result is the one applied.
            debug!(%key, generation, "superseded query settled");
            return normalized.map(|normalized| Arc::new(normalized.into_value()));
        }
        state.in_flight.remove(key);

        match normalized {
            Ok(Normalized { data, records }) => {
                let tags = descriptor.tags();
                for (resource, id, payload) in records {
                    state.store.put(resource, id, payload, tags);
                }
                let value = state
                    .materialize(&data)
                    .unwrap_or_else(|| Arc::new(Value::Null));

                let event = match state.queries.get_mut(key) {
                    Some(record) if record.subscribers > 0 => {
                        record.status = QueryStatus::Settled;
                        record.data = Some(data);
                        record.stale = false;
                        record.settled_at = Some(Utc::now());
                        record.last_error = None;
                        for tag in tags {
                            state.tags.subscribe(tag.clone(), key.clone());
                        }
                        info!(%key, "query settled");
                        Some(CacheEvent::QuerySettled { key: key.clone() })
                    }
                    _ => {
                        debug!(%key, "query settled without subscribers");
                        None
                    }
                };
                (Ok(value), event)
            }
            Err(err) => {
                warn!(%key, "query failed: {err}");
                let event = match state.queries.get_mut(key) {
                    Some(record) if record.subscribers > 0 => {
                        record.status = QueryStatus::Failed;
                        record.last_error = Some(err.clone());
                        Some(CacheEvent::QueryFailed {
                            key: key.clone(),
                            error: err.clone(),
                        })
                    }
                    _ => None,
                };
                (Err(err), event)
            }
        }
    };

    if let Some(event) = event {
        ctx.emit(event);
    }
    result
}

/// Live interest in one query identity. Dropping the last subscription
/// for a key prunes its tags and cached result.
pub struct QuerySubscription {
    executor: QueryExecutor,
    descriptor: QueryDescriptor,
    key: QueryKey,
}

impl QuerySubscription {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }

    pub async fn fetch(&self) -> CacheResult<Arc<Value>> {
        self.executor.run(&self.descriptor).await
    }

    /// Last settled result, stale or not, without touching the network.
    pub fn current(&self) -> Option<Arc<Value>> {
        let state = self.executor.ctx.lock();
        let data = state.queries.get(&self.key)?.data.as_ref()?;
        state.materialize(data)
    }

    pub fn status(&self) -> QueryStatus {
        self.executor.status(&self.key)
    }

    pub fn is_stale(&self) -> bool {
        self.executor
            .ctx
            .lock()
            .queries
            .get(&self.key)
            .map(|record| record.stale)
            .unwrap_or(false)
    }

    pub fn last_error(&self) -> Option<CacheError> {
        self.executor
            .ctx
            .lock()
            .queries
            .get(&self.key)
            .and_then(|record| record.last_error.clone())
    }
}

impl Drop for QuerySubscription {
    fn drop(&mut self) {
        self.executor.release(&self.key);
    }
}

#[cfg(test)]
#[path = "../tests/query_tests.rs"]
mod tests;
