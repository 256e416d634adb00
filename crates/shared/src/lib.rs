pub mod domain;
pub mod error;
pub mod geometry;
pub mod protocol;
