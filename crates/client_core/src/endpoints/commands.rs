//! Write commands. Every builder validates its input before any request is
//! built, so a rejected command never reaches the network.

use serde::Serialize;
use serde_json::Value;
use shared::{
    domain::{FieldId, ResourceType, SeasonId, UavFlightId},
    geometry::Polygon,
    protocol::{
        AddFieldsToSeasonRequest, DeleteFieldRequest, DeleteSeasonRequest,
        DeleteUavFlightRequest, FieldEnvelope, FieldSeasonImagesRequest, FieldUpdate,
        LinkUavFlightsRequest, NewField,
        NewProcessingResult, NewSeason, NewUavFlight, RemoveFieldFromSeasonRequest,
        SeasonUpdate, StartAnalysisRequest,
    },
};

use super::*;
use crate::{
    cache::{MutationCommand, Tag},
    error::{CacheError, CacheResult},
    transport::{ApiRequest, FileUpload, HttpMethod},
};

/// Multipart part name the flight endpoint reads images from.
pub const FLIGHT_IMAGES_PART: &str = "images";
/// Multipart part name the field-season endpoint reads images from.
pub const FIELD_SEASON_IMAGE_PART: &str = "image";

fn named_parts(uploads: Vec<FileUpload>, part: &str) -> Vec<FileUpload> {
    uploads
        .into_iter()
        .map(|upload| FileUpload {
            field: part.to_string(),
            ..upload
        })
        .collect()
}

fn json_body<T: Serialize>(body: &T) -> CacheResult<Value> {
    serde_json::to_value(body)
        .map_err(|err| CacheError::validation(format!("cannot encode request body: {err}")))
}

fn require_name(name: &str, what: &str) -> CacheResult<()> {
    if name.trim().is_empty() {
        return Err(CacheError::validation(format!("{what} name must not be empty")));
    }
    Ok(())
}

fn require_boundary(boundary: &Polygon) -> CacheResult<()> {
    boundary
        .validate_ring()
        .map_err(|err| CacheError::validation(format!("field boundary rejected: {err}")))
}

fn require_ids<T>(ids: &[T], what: &str) -> CacheResult<()> {
    if ids.is_empty() {
        return Err(CacheError::validation(format!("{what} must not be empty")));
    }
    Ok(())
}

pub fn create_field(field: NewField) -> CacheResult<MutationCommand> {
    require_name(&field.name, "field")?;
    require_boundary(&field.boundary)?;
    let body = json_body(&FieldEnvelope { field })?;
    Ok(MutationCommand::new(
        "create_field",
        ApiRequest::new(HttpMethod::Post, ADD_FIELD).with_body(body),
    )
    .invalidating(Tag::list(ResourceType::Field)))
}

pub fn update_field(update: FieldUpdate) -> CacheResult<MutationCommand> {
    if update.name.is_none() && update.boundary.is_none() && update.description.is_none() {
        return Err(CacheError::validation("field update carries no changes"));
    }
    if let Some(name) = &update.name {
        require_name(name, "field")?;
    }
    if let Some(boundary) = &update.boundary {
        require_boundary(boundary)?;
    }
    let body = json_body(&FieldEnvelope { field: update })?;
    Ok(MutationCommand::new(
        "update_field",
        ApiRequest::new(HttpMethod::Put, UPDATE_FIELD).with_body(body),
    )
    .invalidating(Tag::list(ResourceType::Field)))
}

/// Evicts the field outright. Season and flight lists embedding it are not
/// invalidated; `fields_in_season` refreshes through the field list tag.
pub fn delete_field(field: FieldId) -> CacheResult<MutationCommand> {
    let body = json_body(&DeleteFieldRequest { field_id: field })?;
    Ok(MutationCommand::new(
        "delete_field",
        ApiRequest::new(HttpMethod::Delete, DELETE_FIELD).with_body(body),
    )
    .invalidating(Tag::list(ResourceType::Field))
    .removing(ResourceType::Field, field))
}

pub fn create_season(season: NewSeason) -> CacheResult<MutationCommand> {
    require_name(&season.name, "season")?;
    if season.end_date < season.start_date {
        return Err(CacheError::validation(format!(
            "season ends ({}) before it starts ({})",
            season.end_date, season.start_date
        )));
    }
    let body = json_body(&season)?;
    Ok(MutationCommand::new(
        "create_season",
        ApiRequest::new(HttpMethod::Post, CREATE_SEASON).with_body(body),
    )
    .invalidating(Tag::list(ResourceType::Season)))
}

pub fn update_season(update: SeasonUpdate) -> CacheResult<MutationCommand> {
    if update.name.is_none()
        && update.start_date.is_none()
        && update.end_date.is_none()
        && update.description.is_none()
    {
        return Err(CacheError::validation("season update carries no changes"));
    }
    if let Some(name) = &update.name {
        require_name(name, "season")?;
    }
    if let (Some(start), Some(end)) = (update.start_date, update.end_date) {
        if end < start {
            return Err(CacheError::validation(format!(
                "season ends ({end}) before it starts ({start})"
            )));
        }
    }
    let season = update.season_id;
    let body = json_body(&update)?;
    Ok(MutationCommand::new(
        "update_season",
        ApiRequest::new(HttpMethod::Put, UPDATE_SEASON).with_body(body),
    )
    .invalidating(Tag::list(ResourceType::Season))
    .invalidating(Tag::id(ResourceType::Season, season)))
}

pub fn delete_season(season: SeasonId) -> CacheResult<MutationCommand> {
    let body = json_body(&DeleteSeasonRequest { season_id: season })?;
    Ok(MutationCommand::new(
        "delete_season",
        ApiRequest::new(HttpMethod::Delete, DELETE_SEASON).with_body(body),
    )
    .invalidating(Tag::list(ResourceType::Season))
    .invalidating(Tag::id(ResourceType::Season, season))
    .removing(ResourceType::Season, season))
}

pub fn add_fields_to_season(request: AddFieldsToSeasonRequest) -> CacheResult<MutationCommand> {
    require_ids(&request.field_ids, "field_ids")?;
    let season = request.season_id;
    let body = json_body(&request)?;
    Ok(MutationCommand::new(
        "add_fields_to_season",
        ApiRequest::new(HttpMethod::Post, ADD_FIELD_TO_SEASON).with_body(body),
    )
    .invalidating(Tag::id(ResourceType::Season, season)))
}

pub fn remove_field_from_season(season: SeasonId, field: FieldId) -> CacheResult<MutationCommand> {
    let body = json_body(&RemoveFieldFromSeasonRequest {
        season_id: season,
        field_id: field,
    })?;
    Ok(MutationCommand::new(
        "remove_field_from_season",
        ApiRequest::new(HttpMethod::Delete, REMOVE_FIELD_FROM_SEASON).with_body(body),
    )
    .invalidating(Tag::id(ResourceType::Season, season)))
}

/// Images, if any, travel in the same multipart request as the flight.
pub fn create_uav_flight(
    flight: NewUavFlight,
    images: Vec<FileUpload>,
) -> CacheResult<MutationCommand> {
    let body = json_body(&flight)?;
    Ok(MutationCommand::new(
        "create_uav_flight",
        ApiRequest::new(HttpMethod::Post, CREATE_UAV_FLIGHT)
            .with_body(body)
            .with_uploads(named_parts(images, FLIGHT_IMAGES_PART)),
    )
    .invalidating(Tag::list(ResourceType::UavFlight)))
}

pub fn add_images_to_field_season(
    request: FieldSeasonImagesRequest,
    images: Vec<FileUpload>,
) -> CacheResult<MutationCommand> {
    require_ids(&images, "images")?;
    let season = request.season_id;
    let body = json_body(&request)?;
    Ok(MutationCommand::new(
        "add_images_to_field_season",
        ApiRequest::new(HttpMethod::Post, ADD_IMAGE_TO_FIELD_SEASON)
            .with_body(body)
            .with_uploads(named_parts(images, FIELD_SEASON_IMAGE_PART)),
    )
    .invalidating(Tag::id(ResourceType::Season, season)))
}

pub fn delete_uav_flight(flight: UavFlightId) -> CacheResult<MutationCommand> {
    let body = json_body(&DeleteUavFlightRequest {
        uav_flight_id: flight,
    })?;
    Ok(MutationCommand::new(
        "delete_uav_flight",
        ApiRequest::new(HttpMethod::Delete, DELETE_UAV_FLIGHT).with_body(body),
    )
    .invalidating(Tag::list(ResourceType::UavFlight))
    .invalidating(Tag::id(ResourceType::UavFlight, flight))
    .removing(ResourceType::UavFlight, flight))
}

pub fn link_uav_flights(request: LinkUavFlightsRequest) -> CacheResult<MutationCommand> {
    require_ids(&request.uav_flight_ids, "uav_flight_ids")?;
    let body = json_body(&request)?;
    Ok(MutationCommand::new(
        "link_uav_flights",
        ApiRequest::new(HttpMethod::Post, LINK_UAV_FLIGHTS).with_body(body),
    )
    .invalidating(Tag::list(ResourceType::UavFlight)))
}

pub fn start_analysis(request: StartAnalysisRequest) -> CacheResult<MutationCommand> {
    let flight = request.uav_flight_id;
    let body = json_body(&request)?;
    Ok(MutationCommand::new(
        "start_analysis",
        ApiRequest::new(HttpMethod::Post, ANALYSIS_JOB).with_body(body),
    )
    .invalidating(Tag::list(ResourceType::AnalysisResult))
    .invalidating(Tag::id(ResourceType::UavFlight, flight)))
}

pub fn add_processing_result(result: NewProcessingResult) -> CacheResult<MutationCommand> {
    if result.result_data.is_null() {
        return Err(CacheError::validation("result_data must not be null"));
    }
    let body = json_body(&result)?;
    Ok(MutationCommand::new(
        "add_processing_result",
        ApiRequest::new(HttpMethod::Post, ADD_PROCESSING_RESULT).with_body(body),
    )
    .invalidating(Tag::list(ResourceType::AnalysisResult)))
}
