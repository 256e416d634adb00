use shared::domain::{FieldId, ResourceType, SeasonId, UavFlightId, UserId};

use super::*;
use crate::cache::{QueryDescriptor, ResponseShape, Tag};

pub fn my_fields(owner: UserId) -> QueryDescriptor {
    QueryDescriptor::new(MY_FIELDS, ResponseShape::Collection(ResourceType::Field))
        .param("user_id", owner)
        .provides(Tag::list(ResourceType::Field))
}

pub fn list_seasons(owner: UserId) -> QueryDescriptor {
    QueryDescriptor::new(LIST_SEASONS, ResponseShape::Collection(ResourceType::Season))
        .param("user_id", owner)
        .provides(Tag::list(ResourceType::Season))
}

pub fn get_season(season: SeasonId) -> QueryDescriptor {
    QueryDescriptor::new(GET_SEASON, ResponseShape::Record(ResourceType::Season))
        .param("season_id", season)
        .provides(Tag::id(ResourceType::Season, season))
}

/// Membership changes are tagged on the season; field edits on the field
/// list.
pub fn fields_in_season(season: SeasonId) -> QueryDescriptor {
    QueryDescriptor::new(
        LIST_FIELDS_IN_SEASON,
        ResponseShape::Collection(ResourceType::Field),
    )
    .param("season_id", season)
    .provides(Tag::id(ResourceType::Season, season))
    .provides(Tag::list(ResourceType::Field))
}

/// The association record is not an entity class of its own, so it stays
/// opaque.
pub fn uav_flights_for_field_season(field: FieldId, season: SeasonId) -> QueryDescriptor {
    QueryDescriptor::opaque(UAV_FLIGHTS_FOR_FIELD_SEASON)
        .param("field_id", field)
        .param("season_id", season)
        .provides(Tag::list(ResourceType::UavFlight))
}

pub fn uav_flights_by_owner(owner: UserId) -> QueryDescriptor {
    QueryDescriptor::new(
        UAV_FLIGHTS_BY_OWNER,
        ResponseShape::Collection(ResourceType::UavFlight),
    )
    .param("user_id", owner)
    .provides(Tag::list(ResourceType::UavFlight))
}

pub fn images_for_uav_flight(flight: UavFlightId) -> QueryDescriptor {
    QueryDescriptor::new(
        IMAGES_FOR_UAV_FLIGHT,
        ResponseShape::Record(ResourceType::UavFlight),
    )
    .param("uav_flight_id", flight)
    .provides(Tag::id(ResourceType::UavFlight, flight))
}

pub fn generated_images_for_uav_flight(flight: UavFlightId) -> QueryDescriptor {
    QueryDescriptor::new(
        GENERATED_IMAGES_FOR_UAV_FLIGHT,
        ResponseShape::Collection(ResourceType::AnalysisResult),
    )
    .param("uav_flight_id", flight)
    .provides(Tag::id(ResourceType::UavFlight, flight))
}

pub fn uav_flights_with_completed_analysis(owner: UserId) -> QueryDescriptor {
    QueryDescriptor::new(
        FLIGHTS_WITH_COMPLETED_ANALYSIS,
        ResponseShape::Collection(ResourceType::UavFlight),
    )
    .param("user_id", owner)
    .provides(Tag::list(ResourceType::AnalysisResult))
}
