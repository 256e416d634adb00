use super::*;

const SQUARE: &str = "POLYGON((33.1 40.0, 33.2 40.0, 33.2 40.1, 33.1 40.1, 33.1 40.0))";

#[test]
fn decodes_wire_pairs_into_lat_lng_order() {
    let polygon = decode(SQUARE).expect("decode");
    assert_eq!(polygon.len(), 5);
    assert_eq!(polygon.points()[0], LatLng::new(40.0, 33.1));
    assert_eq!(polygon.points()[2], LatLng::new(40.1, 33.2));
    assert!(polygon.is_closed());
}

#[test]
fn open_ring_from_first_four_points_is_a_valid_boundary() {
    let polygon = decode(SQUARE).expect("decode");
    let open = Polygon::new(polygon.points()[..4].to_vec()).expect("four points");
    assert!(!open.is_closed());
    assert_eq!(open.distinct_vertices(), 4);
    open.validate_ring().expect("valid ring");
    assert_eq!(open.closed_ring().len(), 5);
    assert_eq!(open.closed_ring()[4], open.points()[0]);
}

#[test]
fn fewer_than_three_pairs_is_malformed() {
    for wkt in [
        "",
        "POLYGON EMPTY",
        "POLYGON((33.1 40.0))",
        "POLYGON((33.1 40.0, 33.2 40.0))",
    ] {
        assert!(
            matches!(decode(wkt), Err(GeometryError::TooFewPoints { .. })),
            "expected failure for {wkt:?}"
        );
    }
}

#[test]
fn tolerates_extra_whitespace_and_srid_prefix() {
    let polygon = decode(
        "SRID=4326;POLYGON ((  33.1   40.0 ,\n33.2\t40.0,33.2 40.1   ))",
    )
    .expect("decode");
    assert_eq!(
        polygon.points(),
        &[
            LatLng::new(40.0, 33.1),
            LatLng::new(40.0, 33.2),
            LatLng::new(40.1, 33.2)
        ]
    );
}

#[test]
fn accepts_negative_and_integer_coordinates() {
    let polygon = decode("POLYGON((-58 -34.5, -58.1 -34.5, -58.1 -34))").expect("decode");
    assert_eq!(polygon.points()[0], LatLng::new(-34.5, -58.0));
    assert_eq!(polygon.points()[2], LatLng::new(-34.0, -58.1));
}

#[test]
fn scientific_notation_pairs_are_absent_not_zero() {
    let polygon = decode("POLYGON((1e1 40.0, 33.1 40.0, 33.2 40.0, 33.2 40.1))").expect("decode");
    assert_eq!(polygon.len(), 3);
    assert!(polygon.points().iter().all(|p| p.lng != 0.0 && p.lng != 10.0));

    assert!(matches!(
        decode("POLYGON((1e1 4e1, 2e1 4e1, 2e1 5e1))"),
        Err(GeometryError::TooFewPoints { found: 0 })
    ));
}

#[test]
fn encode_writes_lon_lat_with_fixed_precision() {
    let polygon = Polygon::new(vec![
        LatLng::new(40.0, 33.1),
        LatLng::new(40.0, 33.2),
        LatLng::new(40.1, 33.2),
    ])
    .expect("polygon");
    assert_eq!(
        encode(&polygon),
        "POLYGON((33.100000 40.000000, 33.200000 40.000000, 33.200000 40.100000))"
    );
}

#[test]
fn decode_encode_decode_is_stable() {
    for wkt in [
        SQUARE,
        "POLYGON((-58.123456 -34.654321, -58.2 -34.6, -58.25 -34.7, -58.123456 -34.654321))",
        "POLYGON((10 20, 11 20, 11 21))",
    ] {
        let first = decode(wkt).expect("first decode");
        let second = decode(&encode(&first)).expect("second decode");
        assert_eq!(first, second, "round trip changed {wkt:?}");
        assert_eq!(encode(&second), encode(&first));
    }
}

#[test]
fn ring_with_repeated_vertices_fails_validation() {
    let polygon = Polygon::new(vec![
        LatLng::new(40.0, 33.1),
        LatLng::new(40.0, 33.2),
        LatLng::new(40.0, 33.1),
    ])
    .expect("three points");
    assert_eq!(
        polygon.validate_ring(),
        Err(GeometryError::TooFewDistinctVertices { found: 2 })
    );
}

#[test]
fn ring_outside_coordinate_range_fails_validation() {
    let polygon = Polygon::new(vec![
        LatLng::new(95.0, 33.1),
        LatLng::new(40.0, 33.2),
        LatLng::new(40.1, 33.2),
    ])
    .expect("three points");
    assert!(matches!(
        polygon.validate_ring(),
        Err(GeometryError::OutOfRange { .. })
    ));
}

#[test]
fn polygon_serializes_as_lat_lng_objects() {
    let polygon = decode(SQUARE).expect("decode");
    let json = serde_json::to_value(&polygon).expect("json");
    assert_eq!(json[0], serde_json::json!({"lat": 40.0, "lng": 33.1}));

    let too_short: Result<Polygon, _> =
        serde_json::from_value(serde_json::json!([{"lat": 1.0, "lng": 2.0}]));
    assert!(too_short.is_err());
}
