//! Catalog of the REST surface: which reads provide which tags and which
//! writes invalidate them. Paths are relative to the API base URL.

pub mod commands;
pub mod queries;

pub const ADD_FIELD: &str = "api/add-field/";
pub const MY_FIELDS: &str = "api/my-fields/";
pub const UPDATE_FIELD: &str = "api/update-field/";
pub const DELETE_FIELD: &str = "api/delete-field/";

pub const CREATE_SEASON: &str = "api/create-season/";
pub const LIST_SEASONS: &str = "api/list-seasons/";
pub const GET_SEASON: &str = "api/get-season/";
pub const UPDATE_SEASON: &str = "api/update-season/";
pub const DELETE_SEASON: &str = "api/delete-season/";
pub const ADD_FIELD_TO_SEASON: &str = "api/add-field-to-season/";
pub const REMOVE_FIELD_FROM_SEASON: &str = "api/remove-field-from-season/";
pub const LIST_FIELDS_IN_SEASON: &str = "api/list-fields-in-season/";
pub const ADD_IMAGE_TO_FIELD_SEASON: &str = "api/add-image-to-field-season/";

pub const CREATE_UAV_FLIGHT: &str = "api/create-uav-flight/";
pub const DELETE_UAV_FLIGHT: &str = "api/delete-uav-flight/";
pub const LINK_UAV_FLIGHTS: &str = "api/link-uav-flight-to-field-season/";
pub const UAV_FLIGHTS_FOR_FIELD_SEASON: &str = "api/get-uav-flights-for-field-season/";
pub const UAV_FLIGHTS_BY_OWNER: &str = "api/get-uav-flights-by-owner/";
pub const IMAGES_FOR_UAV_FLIGHT: &str = "api/get-images-for-uav-flight/";

pub const ANALYSIS_JOB: &str = "api/analysis-job/";
pub const GENERATED_IMAGES_FOR_UAV_FLIGHT: &str = "api/get-generated-images-for-uav-flight/";
pub const FLIGHTS_WITH_COMPLETED_ANALYSIS: &str = "api/uav-flights-with-completed-analysis/";
pub const ADD_PROCESSING_RESULT: &str = "api/add-processing-result-to-field-image/";
