use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::{self, GeometryError, Polygon};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(FieldId);
id_newtype!(SeasonId);
id_newtype!(UavFlightId);
id_newtype!(ImageId);
id_newtype!(ProcessingResultId);
id_newtype!(FieldSeasonLinkId);

/// Entity classes the client caches. The set is closed: every cache key,
/// tag and normalized record belongs to exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceType {
    Field,
    Season,
    #[serde(rename = "UAVFlight")]
    UavFlight,
    Image,
    AnalysisResult,
}

impl ResourceType {
    pub const ALL: [ResourceType; 5] = [
        ResourceType::Field,
        ResourceType::Season,
        ResourceType::UavFlight,
        ResourceType::Image,
        ResourceType::AnalysisResult,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Field => "Field",
            ResourceType::Season => "Season",
            ResourceType::UavFlight => "UAVFlight",
            ResourceType::Image => "Image",
            ResourceType::AnalysisResult => "AnalysisResult",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field as the server serializes it: `location` is a WKT polygon in
/// `lon lat` order, possibly prefixed with `SRID=...;`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub id: FieldId,
    #[serde(default)]
    pub owner: Option<UserId>,
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Field with its boundary decoded into map order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub id: FieldId,
    pub owner: Option<UserId>,
    pub name: String,
    pub boundary: Polygon,
    pub description: Option<String>,
}

impl TryFrom<FieldRecord> for Field {
    type Error = GeometryError;

    fn try_from(record: FieldRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            boundary: geometry::decode(&record.location)?,
            id: record.id,
            owner: record.owner,
            name: record.name,
            description: record.description,
        })
    }
}

impl From<&Field> for FieldRecord {
    fn from(field: &Field) -> Self {
        Self {
            id: field.id,
            owner: field.owner,
            name: field.name.clone(),
            location: geometry::encode(&field.boundary),
            description: field.description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Season {
    pub id: SeasonId,
    #[serde(default)]
    pub owner: Option<UserId>,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldImage {
    pub id: ImageId,
    #[serde(default)]
    pub uav_flight: Option<UavFlightId>,
    pub image: String,
    #[serde(default)]
    pub resized_image: Option<String>,
    pub upload_date: DateTime<Utc>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub gps_latitude: Option<String>,
    #[serde(default)]
    pub gps_longitude: Option<String>,
    #[serde(default)]
    pub gps_altitude: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UavFlight {
    pub id: UavFlightId,
    #[serde(default)]
    pub owner: Option<UserId>,
    pub flight_date: DateTime<Utc>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub images: Vec<FieldImage>,
}

/// Association of a field with a season, carrying the flights linked to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSeasonLink {
    pub id: FieldSeasonLinkId,
    pub field: FieldId,
    pub season: SeasonId,
    pub date_associated: DateTime<Utc>,
    #[serde(default)]
    pub uav_flights: Vec<UavFlight>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub id: ProcessingResultId,
    #[serde(default)]
    pub image: Option<ImageId>,
    #[serde(default)]
    pub result_data: Option<serde_json::Value>,
    pub date_processed: DateTime<Utc>,
    #[serde(default)]
    pub generated_image: Option<String>,
    #[serde(default)]
    pub image_details: Option<FieldImage>,
}
