//! Request bodies for the field-management REST surface.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{FieldId, ImageId, SeasonId, UavFlightId},
    geometry::Polygon,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewField {
    pub name: String,
    /// Sent as `[{lat, lng}, ..]`; the server closes the ring itself.
    #[serde(rename = "location")]
    pub boundary: Polygon,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdate {
    pub id: FieldId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "location", default, skip_serializing_if = "Option::is_none")]
    pub boundary: Option<Polygon>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Field bodies travel wrapped as `{"field": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldEnvelope<T> {
    pub field: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteFieldRequest {
    pub field_id: FieldId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSeason {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonUpdate {
    pub season_id: SeasonId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteSeasonRequest {
    pub season_id: SeasonId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddFieldsToSeasonRequest {
    pub season_id: SeasonId,
    pub field_ids: Vec<FieldId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveFieldFromSeasonRequest {
    pub season_id: SeasonId,
    pub field_id: FieldId,
}

/// Form fields sent alongside images attached to a field within a season.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSeasonImagesRequest {
    pub season_id: SeasonId,
    pub field_id: FieldId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUavFlight {
    pub flight_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteUavFlightRequest {
    pub uav_flight_id: UavFlightId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkUavFlightsRequest {
    pub field_id: FieldId,
    pub season_id: SeasonId,
    pub uav_flight_ids: Vec<UavFlightId>,
}

/// Analysis job trigger. Without `image_id` every unprocessed image of the
/// flight is queued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartAnalysisRequest {
    pub uav_flight_id: UavFlightId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<ImageId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProcessingResult {
    pub field_image_id: ImageId,
    pub result_data: serde_json::Value,
}

/// Acknowledgement body of write endpoints that do not echo a record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Acknowledgement {
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Acknowledgement {
    pub fn text(&self) -> &str {
        self.detail
            .as_deref()
            .or(self.message.as_deref())
            .unwrap_or_default()
    }
}
