//! Place fixtures around Cape Town.

use roam_domain::{Bounds, PlaceDetails, PlaceRecord, PlaceSource, RequestContext, Review};

pub const CENTER_LAT: f64 = -33.9249;
pub const CENTER_LNG: f64 = 18.4241;

pub fn place_source(
	source_id: &str,
	name: &str,
	lat: f64,
	lng: f64,
	types: &[&str],
) -> PlaceSource {
	PlaceSource {
		source_id: source_id.to_string(),
		name: name.to_string(),
		address: "Cape Town".to_string(),
		description: None,
		lat,
		lng,
		types: types.iter().map(|value| value.to_string()).collect(),
		rating: Some(4.2),
		rating_count: Some(120),
		price_level: Some(2),
		detail_excerpt: None,
	}
}

pub fn place_record(
	source_id: &str,
	name: &str,
	lat: f64,
	lng: f64,
	types: &[&str],
) -> PlaceRecord {
	PlaceRecord::from_source(
		place_source(source_id, name, lat, lng, types),
		RequestContext::default(),
	)
}

/// `count` places spread along a short north-south line inside [`city_bounds`].
pub fn playgrounds_near_center(prefix: &str, count: usize) -> Vec<PlaceSource> {
	(0..count)
		.map(|index| {
			place_source(
				&format!("{prefix}-{index}"),
				&format!("{prefix} playground {index}"),
				CENTER_LAT + index as f64 * 0.001,
				CENTER_LNG,
				&["playground"],
			)
		})
		.collect()
}

pub fn city_bounds() -> Bounds {
	Bounds::around(CENTER_LAT, CENTER_LNG, 5.0)
}

pub fn details_with_review(source_id: &str, review: &str) -> PlaceDetails {
	PlaceDetails {
		source_id: source_id.to_string(),
		reviews: vec![Review { rating: Some(4.0), text: review.to_string() }],
		..PlaceDetails::default()
	}
}
