use serde::Deserialize;

use roam_domain::{PlaceDetails, PlaceSource, Review, geohash};

#[derive(Clone, Debug, PartialEq)]
pub struct SearchRequest {
	pub query: String,
	pub lat: f64,
	pub lng: f64,
	pub radius_km: f64,
	pub page_token: Option<String>,
}
impl SearchRequest {
	pub fn first_page(query: impl Into<String>, lat: f64, lng: f64, radius_km: f64) -> Self {
		Self { query: query.into(), lat, lng, radius_km, page_token: None }
	}

	pub fn next_page(&self, page_token: impl Into<String>) -> Self {
		Self { page_token: Some(page_token.into()), ..self.clone() }
	}

	pub(crate) fn query_params(&self) -> Vec<(&'static str, String)> {
		let mut params = vec![
			("query", self.query.clone()),
			("lat", self.lat.to_string()),
			("lng", self.lng.to_string()),
			("radiusKm", self.radius_km.to_string()),
		];

		if let Some(token) = self.page_token.as_ref() {
			params.push(("pageToken", token.clone()));
		}

		params
	}
}

/// One page of search results. Fetch failures never surface as errors: the page is empty and
/// `error` carries the diagnostic text.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchPage {
	pub places: Vec<PlaceSource>,
	pub next_page_token: Option<String>,
	pub has_more: bool,
	pub error: Option<String>,
	/// Requests issued for this page, including conflict retries.
	pub attempts: u32,
	pub cancelled: bool,
}
impl SearchPage {
	pub(crate) fn failed(error: String, attempts: u32) -> Self {
		Self { error: Some(error), attempts, ..Self::default() }
	}

	pub(crate) fn cancelled(attempts: u32) -> Self {
		Self { attempts, cancelled: true, ..Self::default() }
	}

	pub fn is_degraded(&self) -> bool {
		self.error.is_some()
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSearchResponse {
	#[serde(default)]
	results: Vec<WirePlace>,
	#[serde(default)]
	next_page_token: Option<String>,
	#[serde(default)]
	has_more: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePlace {
	id: String,
	name: String,
	#[serde(default)]
	address: String,
	#[serde(default)]
	description: Option<String>,
	lat: f64,
	lng: f64,
	#[serde(default)]
	types: Vec<String>,
	#[serde(default)]
	rating: Option<f32>,
	#[serde(default)]
	user_ratings_total: Option<u32>,
	#[serde(default)]
	price_level: Option<u8>,
}
impl WirePlace {
	fn into_source(self) -> Option<PlaceSource> {
		if self.id.trim().is_empty() || !geohash::is_valid_coordinate(self.lat, self.lng) {
			return None;
		}

		Some(PlaceSource {
			source_id: self.id.trim().to_string(),
			name: self.name,
			address: self.address,
			description: self.description.filter(|value| !value.trim().is_empty()),
			lat: self.lat,
			lng: self.lng,
			types: self.types,
			rating: self.rating.filter(|value| value.is_finite()),
			rating_count: self.user_ratings_total,
			price_level: self.price_level,
			detail_excerpt: None,
		})
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDetails {
	id: String,
	#[serde(default)]
	summary: Option<String>,
	#[serde(default)]
	reviews: Vec<WireReview>,
	#[serde(default)]
	opening_hours: Vec<String>,
	#[serde(default)]
	amenities: std::collections::BTreeMap<String, bool>,
}

#[derive(Debug, Deserialize)]
struct WireReview {
	#[serde(default)]
	rating: Option<f32>,
	#[serde(default)]
	text: String,
}

pub(crate) fn parse_search_response(raw: &[u8]) -> serde_json::Result<SearchPage> {
	let wire: WireSearchResponse = serde_json::from_slice(raw)?;
	let next_page_token = wire.next_page_token.filter(|token| !token.trim().is_empty());
	let has_more = wire.has_more.unwrap_or(next_page_token.is_some()) && next_page_token.is_some();
	let places = wire.results.into_iter().filter_map(WirePlace::into_source).collect();

	Ok(SearchPage { places, next_page_token, has_more, error: None, attempts: 0, cancelled: false })
}

pub(crate) fn parse_details_response(raw: &[u8]) -> serde_json::Result<PlaceDetails> {
	let wire: WireDetails = serde_json::from_slice(raw)?;

	Ok(PlaceDetails {
		source_id: wire.id,
		summary: wire.summary.filter(|value| !value.trim().is_empty()),
		reviews: wire
			.reviews
			.into_iter()
			.filter(|review| !review.text.trim().is_empty())
			.map(|review| Review { rating: review.rating, text: review.text })
			.collect(),
		opening_hours: wire.opening_hours,
		amenities: wire.amenities,
	})
}
