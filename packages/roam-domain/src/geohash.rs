//! Base-32 geohash buckets used to emulate bounding-box queries with string prefix ranges.
//!
//! Prefix sampling is an approximation: a box is covered by the cells under its corners, edge
//! midpoints, and center, plus one coarser cell at the center. Coverage is best-effort in two ways:
//!
//! - Boxes with unusual aspect ratios can miss a cell between two samples.
//! - Precision bottoms out at 4. Once the half-span exceeds one precision-4 cell (0.176 degrees,
//!   a radius of roughly 19 km north-south and less east-west away from the equator) samples sit
//!   further apart than a cell, so whole interior rows of cells go unqueried even for square
//!   boxes. At a 50 km radius most of the box can be missed.
//!
//! Callers must still filter results by the literal coordinates because a prefix over-approximates
//! the box.

use serde::{Deserialize, Serialize};

const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";
const KM_PER_DEGREE_LAT: f64 = 110.574;
const KM_PER_DEGREE_LNG_EQUATOR: f64 = 111.320;
const MIN_QUERY_PRECISION: usize = 4;
const MAX_QUERY_PRECISION: usize = 7;
/// Smaller side of a cell in degrees for precisions 4 through 7.
const CELL_MIN_SIDE_DEGREES: [(usize, f64); 4] =
	[(7, 0.001_37), (6, 0.005_49), (5, 0.043_9), (4, 0.175_8)];

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
	pub south: f64,
	pub west: f64,
	pub north: f64,
	pub east: f64,
}
impl Bounds {
	/// Square box around a center point. Latitude and longitude are clamped to valid ranges.
	pub fn around(lat: f64, lng: f64, radius_km: f64) -> Self {
		let radius_km = radius_km.max(0.0);
		let lat_delta = radius_km / KM_PER_DEGREE_LAT;
		let lng_scale = (KM_PER_DEGREE_LNG_EQUATOR * lat.to_radians().cos()).max(1e-6);
		let lng_delta = (radius_km / lng_scale).min(180.0);

		Self {
			south: (lat - lat_delta).max(-90.0),
			west: (lng - lng_delta).max(-180.0),
			north: (lat + lat_delta).min(90.0),
			east: (lng + lng_delta).min(180.0),
		}
	}

	pub fn is_valid(&self) -> bool {
		[self.south, self.west, self.north, self.east].iter().all(|value| value.is_finite())
			&& self.south <= self.north
			&& self.west <= self.east
			&& (-90.0..=90.0).contains(&self.south)
			&& (-90.0..=90.0).contains(&self.north)
			&& (-180.0..=180.0).contains(&self.west)
			&& (-180.0..=180.0).contains(&self.east)
	}

	pub fn contains(&self, lat: f64, lng: f64) -> bool {
		self.south <= lat && lat <= self.north && self.west <= lng && lng <= self.east
	}

	pub fn center(&self) -> (f64, f64) {
		((self.south + self.north) / 2.0, (self.west + self.east) / 2.0)
	}

	fn max_span(&self) -> f64 {
		(self.north - self.south).max(self.east - self.west)
	}
}

pub fn is_valid_coordinate(lat: f64, lng: f64) -> bool {
	lat.is_finite()
		&& lng.is_finite()
		&& (-90.0..=90.0).contains(&lat)
		&& (-180.0..=180.0).contains(&lng)
}

pub fn encode(lat: f64, lng: f64, precision: usize) -> String {
	let mut lat_range = (-90.0_f64, 90.0_f64);
	let mut lng_range = (-180.0_f64, 180.0_f64);
	let mut out = String::with_capacity(precision);
	let mut bits = 0_u8;
	let mut bit_count = 0;
	let mut even = true;

	while out.len() < precision {
		let (range, value) = if even { (&mut lng_range, lng) } else { (&mut lat_range, lat) };
		let mid = (range.0 + range.1) / 2.0;

		bits <<= 1;

		if value >= mid {
			bits |= 1;
			range.0 = mid;
		} else {
			range.1 = mid;
		}

		even = !even;
		bit_count += 1;

		if bit_count == 5 {
			out.push(BASE32[bits as usize] as char);

			bits = 0;
			bit_count = 0;
		}
	}

	out
}

/// Picks the finest precision (4-7) whose cells are at least half the box span wide, so the
/// sampled points land in adjacent cells.
pub fn precision_for_bounds(bounds: &Bounds) -> usize {
	let half_span = bounds.max_span() / 2.0;

	for (precision, side) in CELL_MIN_SIDE_DEGREES {
		if half_span <= side {
			return precision;
		}
	}

	MIN_QUERY_PRECISION
}

/// Distinct prefixes to query for a box, in a stable order.
pub fn sample_prefixes(bounds: &Bounds) -> Vec<String> {
	let precision = precision_for_bounds(bounds).clamp(MIN_QUERY_PRECISION, MAX_QUERY_PRECISION);
	let (center_lat, center_lng) = bounds.center();
	let points = [
		(bounds.south, bounds.west),
		(bounds.south, bounds.east),
		(bounds.north, bounds.west),
		(bounds.north, bounds.east),
		(center_lat, center_lng),
		(bounds.south, center_lng),
		(bounds.north, center_lng),
		(center_lat, bounds.west),
		(center_lat, bounds.east),
	];
	let mut prefixes: Vec<String> = Vec::with_capacity(points.len() + 1);

	for (lat, lng) in points {
		push_unique(&mut prefixes, encode(lat, lng, precision));
	}

	if precision > MIN_QUERY_PRECISION {
		push_unique(&mut prefixes, encode(center_lat, center_lng, precision - 1));
	}

	prefixes
}

fn push_unique(prefixes: &mut Vec<String>, prefix: String) {
	if !prefixes.contains(&prefix) {
		prefixes.push(prefix);
	}
}
