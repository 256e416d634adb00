use std::sync::Arc;

use serde::de::DeserializeOwned;
use shared::{
    domain::{
        Field, FieldId, FieldRecord, FieldSeasonLink, ProcessingResult, ResourceType, Season,
        SeasonId, UavFlight, UavFlightId, UserId,
    },
    protocol::{
        AddFieldsToSeasonRequest, FieldSeasonImagesRequest, FieldUpdate, LinkUavFlightsRequest,
        NewField,
        NewProcessingResult, NewSeason, NewUavFlight, SeasonUpdate, StartAnalysisRequest,
    },
};
use tokio::sync::broadcast;
use tracing::debug;

pub mod cache;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod transport;
pub mod types;

pub use cache::{
    CacheContext, CacheEvent, EntityId, MutationCommand, MutationCoordinator, MutationOutcome,
    QueryDescriptor, QueryExecutor, QueryKey, QuerySubscription, Tag,
};
pub use config::{load_settings, ClientSettings};
pub use error::{CacheError, CacheResult};
pub use transport::{
    CredentialProvider, FileUpload, HttpTransport, SharedCredentials, StaticCredentials,
    Transport,
};
pub use types::{paginate, Page};

use endpoints::{commands, queries};

/// Typed entry point for UI collaborators: reads go through the
/// deduplicating query executor, writes through the mutation coordinator.
#[derive(Clone)]
pub struct FieldClient {
    ctx: Arc<CacheContext>,
    queries: QueryExecutor,
    mutations: MutationCoordinator,
}

impl FieldClient {
    pub fn connect(
        settings: &ClientSettings,
        credentials: Arc<dyn CredentialProvider>,
    ) -> CacheResult<Self> {
        let transport = HttpTransport::new(settings, credentials)?;
        debug!(base_url = %settings.api_base_url, "field client configured");
        Ok(Self::with_context(CacheContext::with_event_capacity(
            Arc::new(transport),
            settings.event_capacity,
        )))
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self::with_context(CacheContext::new(transport))
    }

    pub fn with_context(ctx: Arc<CacheContext>) -> Self {
        let queries = QueryExecutor::new(Arc::clone(&ctx));
        let mutations = MutationCoordinator::new(queries.clone());
        Self {
            ctx,
            queries,
            mutations,
        }
    }

    pub fn context(&self) -> &Arc<CacheContext> {
        &self.ctx
    }

    pub fn queries(&self) -> &QueryExecutor {
        &self.queries
    }

    pub fn mutations(&self) -> &MutationCoordinator {
        &self.mutations
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CacheEvent> {
        self.ctx.subscribe_events()
    }

    /// Keeps `descriptor` live: its result is served from the cache and
    /// re-executed whenever a mutation invalidates one of its tags.
    pub fn watch(&self, descriptor: QueryDescriptor) -> QuerySubscription {
        self.queries.subscribe(descriptor)
    }

    /// Decodes a stored entity without touching the network.
    pub fn cached<T: DeserializeOwned>(
        &self,
        resource: ResourceType,
        id: impl Into<EntityId>,
    ) -> CacheResult<Option<T>> {
        let Some(entry) = self.ctx.entity(resource, &id.into()) else {
            return Ok(None);
        };
        T::deserialize(entry.payload.as_ref())
            .map(Some)
            .map_err(|err| CacheError::unexpected(format!("cached {resource}: {err}")))
    }

    async fn read<T: DeserializeOwned>(&self, descriptor: QueryDescriptor) -> CacheResult<T> {
        let value = self.queries.run(&descriptor).await?;
        T::deserialize(value.as_ref())
            .map_err(|err| CacheError::unexpected(format!("{}: {err}", descriptor.endpoint())))
    }

    async fn read_fields(&self, descriptor: QueryDescriptor) -> CacheResult<Vec<Field>> {
        let records: Vec<FieldRecord> = self.read(descriptor).await?;
        records
            .into_iter()
            .map(|record| Field::try_from(record).map_err(CacheError::from))
            .collect()
    }

    pub async fn list_fields(&self, owner: UserId) -> CacheResult<Vec<Field>> {
        self.read_fields(queries::my_fields(owner)).await
    }

    pub async fn list_fields_page(
        &self,
        owner: UserId,
        page: usize,
        per_page: usize,
    ) -> CacheResult<Page<Field>> {
        Ok(paginate(self.list_fields(owner).await?, page, per_page))
    }

    pub async fn list_seasons(&self, owner: UserId) -> CacheResult<Vec<Season>> {
        self.read(queries::list_seasons(owner)).await
    }

    pub async fn get_season(&self, season: SeasonId) -> CacheResult<Season> {
        self.read(queries::get_season(season)).await
    }

    pub async fn list_fields_in_season(&self, season: SeasonId) -> CacheResult<Vec<Field>> {
        self.read_fields(queries::fields_in_season(season)).await
    }

    pub async fn uav_flights_for_field_season(
        &self,
        field: FieldId,
        season: SeasonId,
    ) -> CacheResult<FieldSeasonLink> {
        self.read(queries::uav_flights_for_field_season(field, season))
            .await
    }

    pub async fn uav_flights_by_owner(&self, owner: UserId) -> CacheResult<Vec<UavFlight>> {
        self.read(queries::uav_flights_by_owner(owner)).await
    }

    /// The flight record with its nested images.
    pub async fn images_for_uav_flight(&self, flight: UavFlightId) -> CacheResult<UavFlight> {
        self.read(queries::images_for_uav_flight(flight)).await
    }

    pub async fn generated_images_for_uav_flight(
        &self,
        flight: UavFlightId,
    ) -> CacheResult<Vec<ProcessingResult>> {
        self.read(queries::generated_images_for_uav_flight(flight))
            .await
    }

    pub async fn uav_flights_with_completed_analysis(
        &self,
        owner: UserId,
    ) -> CacheResult<Vec<UavFlight>> {
        self.read(queries::uav_flights_with_completed_analysis(owner))
            .await
    }

    pub async fn create_field(&self, field: NewField) -> CacheResult<MutationOutcome> {
        self.mutations.apply(commands::create_field(field)?).await
    }

    pub async fn update_field(&self, update: FieldUpdate) -> CacheResult<MutationOutcome> {
        self.mutations.apply(commands::update_field(update)?).await
    }

    pub async fn delete_field(&self, field: FieldId) -> CacheResult<MutationOutcome> {
        self.mutations.apply(commands::delete_field(field)?).await
    }

    pub async fn create_season(&self, season: NewSeason) -> CacheResult<MutationOutcome> {
        self.mutations.apply(commands::create_season(season)?).await
    }

    pub async fn update_season(&self, update: SeasonUpdate) -> CacheResult<MutationOutcome> {
        self.mutations.apply(commands::update_season(update)?).await
    }

    pub async fn delete_season(&self, season: SeasonId) -> CacheResult<MutationOutcome> {
        self.mutations.apply(commands::delete_season(season)?).await
    }

    pub async fn add_fields_to_season(
        &self,
        request: AddFieldsToSeasonRequest,
    ) -> CacheResult<MutationOutcome> {
        self.mutations
            .apply(commands::add_fields_to_season(request)?)
            .await
    }

    pub async fn remove_field_from_season(
        &self,
        season: SeasonId,
        field: FieldId,
    ) -> CacheResult<MutationOutcome> {
        self.mutations
            .apply(commands::remove_field_from_season(season, field)?)
            .await
    }

    pub async fn add_images_to_field_season(
        &self,
        request: FieldSeasonImagesRequest,
        images: Vec<FileUpload>,
    ) -> CacheResult<MutationOutcome> {
        self.mutations
            .apply(commands::add_images_to_field_season(request, images)?)
            .await
    }

    pub async fn create_uav_flight(
        &self,
        flight: NewUavFlight,
        images: Vec<FileUpload>,
    ) -> CacheResult<MutationOutcome> {
        self.mutations
            .apply(commands::create_uav_flight(flight, images)?)
            .await
    }

    pub async fn delete_uav_flight(&self, flight: UavFlightId) -> CacheResult<MutationOutcome> {
        self.mutations
            .apply(commands::delete_uav_flight(flight)?)
            .await
    }

    pub async fn link_uav_flights(
        &self,
        request: LinkUavFlightsRequest,
    ) -> CacheResult<MutationOutcome> {
        self.mutations
            .apply(commands::link_uav_flights(request)?)
            .await
    }

    pub async fn start_analysis(
        &self,
        request: StartAnalysisRequest,
    ) -> CacheResult<MutationOutcome> {
        self.mutations.apply(commands::start_analysis(request)?).await
    }

    pub async fn add_processing_result(
        &self,
        result: NewProcessingResult,
    ) -> CacheResult<MutationOutcome> {
        self.mutations
            .apply(commands::add_processing_result(result)?)
            .await
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
