//! Polygon boundaries on the wire and on the map.
//!
//! The server speaks WKT with `lon lat` pairs; the map wants `(lat, lng)`.
//! This module is the only place the two orders meet.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_VERTICES: usize = 3;
pub const COORDINATE_PRECISION: usize = 6;

/// Plain decimal: optional minus, digits, optional fraction. Exponents are
/// rejected on purpose so `1e5` never turns into a coordinate.
static DECIMAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?\d+(?:\.\d+)?$").expect("decimal pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("polygon needs at least {MIN_VERTICES} coordinate pairs, found {found}")]
    TooFewPoints { found: usize },
    #[error("polygon needs at least {MIN_VERTICES} distinct vertices, found {found}")]
    TooFewDistinctVertices { found: usize },
    #[error("coordinate out of range: lat {lat}, lng {lng}")]
    OutOfRange { lat: f64, lng: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    fn bits(self) -> (u64, u64) {
        // -0.0 and 0.0 are the same vertex
        ((self.lat + 0.0).to_bits(), (self.lng + 0.0).to_bits())
    }
}

/// Ordered ring of map points. The closing repeat of the first point is
/// optional; it is kept exactly as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<LatLng>", into = "Vec<LatLng>")]
pub struct Polygon {
    points: Vec<LatLng>,
}

impl Polygon {
    pub fn new(points: Vec<LatLng>) -> Result<Self, GeometryError> {
        if points.len() < MIN_VERTICES {
            return Err(GeometryError::TooFewPoints {
                found: points.len(),
            });
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[LatLng] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => self.points.len() > 1 && first.bits() == last.bits(),
            _ => false,
        }
    }

    /// Points with the first one repeated at the end when it is not already.
    pub fn closed_ring(&self) -> Vec<LatLng> {
        let mut ring = self.points.clone();
        if !self.is_closed() {
            if let Some(first) = ring.first().copied() {
                ring.push(first);
            }
        }
        ring
    }

    pub fn distinct_vertices(&self) -> usize {
        self.points
            .iter()
            .map(|point| point.bits())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Precondition for any command that writes a field boundary.
    pub fn validate_ring(&self) -> Result<(), GeometryError> {
        if let Some(point) = self
            .points
            .iter()
            .find(|p| !(-90.0..=90.0).contains(&p.lat) || !(-180.0..=180.0).contains(&p.lng))
        {
            return Err(GeometryError::OutOfRange {
                lat: point.lat,
                lng: point.lng,
            });
        }
        let found = self.distinct_vertices();
        if found < MIN_VERTICES {
            return Err(GeometryError::TooFewDistinctVertices { found });
        }
        Ok(())
    }

    pub fn into_points(self) -> Vec<LatLng> {
        self.points
    }
}

impl TryFrom<Vec<LatLng>> for Polygon {
    type Error = GeometryError;

    fn try_from(points: Vec<LatLng>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<Polygon> for Vec<LatLng> {
    fn from(polygon: Polygon) -> Self {
        polygon.points
    }
}

/// Decodes a WKT polygon into map order.
///
/// Every `(`/`)`/`,`-delimited segment made of exactly two plain decimals
/// is a `lon lat` pair; anything else (the `POLYGON` keyword, an `SRID=`
/// prefix, exponent notation, a third ordinate) is skipped. The ring is
/// not closed here.
pub fn decode(wkt: &str) -> Result<Polygon, GeometryError> {
    let points: Vec<LatLng> = wkt
        .split(|c| matches!(c, '(' | ')' | ','))
        .filter_map(parse_pair)
        .collect();
    Polygon::new(points)
}

fn parse_pair(segment: &str) -> Option<LatLng> {
    let mut tokens = segment.split_whitespace();
    let lon = tokens.next()?;
    let lat = tokens.next()?;
    if tokens.next().is_some() || !DECIMAL.is_match(lon) || !DECIMAL.is_match(lat) {
        return None;
    }
    Some(LatLng::new(lat.parse().ok()?, lon.parse().ok()?))
}

/// Encodes map points back into `POLYGON((lon lat, ...))`, one WKT pair per
/// point, without adding a closing repeat.
pub fn encode(polygon: &Polygon) -> String {
    let pairs = polygon
        .points
        .iter()
        .map(|p| {
            format!(
                "{:.prec$} {:.prec$}",
                p.lng,
                p.lat,
                prec = COORDINATE_PRECISION
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("POLYGON(({pairs}))")
}

#[cfg(test)]
#[path = "tests/geometry_tests.rs"]
mod tests;
