//! Stable keys for settled searches.

use serde_json::Value;

use roam_domain::text::normalize_query;

use crate::{Error, Result, explore::ExploreRequest};

const SIGNATURE_KIND: &str = "explore_search";
const SIGNATURE_SCHEMA_VERSION: i64 = 1;

/// Hex blake3 over the canonical request payload. Coordinates are rounded to three decimals and
/// the radius to one, so nearby repeat searches share a key.
pub fn search_signature(request: &ExploreRequest) -> Result<String> {
	let category = request
		.options
		.category
		.as_deref()
		.map(|raw| raw.trim().to_lowercase())
		.filter(|raw| !raw.is_empty())
		.unwrap_or_else(|| "all".to_string());
	let query = request.options.query.as_deref().map(normalize_query).unwrap_or_default();
	let filters = match request.options.filters.as_ref() {
		Some(filters) => serde_json::to_value(filters).map_err(|err| Error::InvalidRequest {
			message: format!("Failed to encode filter state: {err}."),
		})?,
		None => Value::Null,
	};
	let payload = serde_json::json!({
		"kind": SIGNATURE_KIND,
		"schema_version": SIGNATURE_SCHEMA_VERSION,
		"intent": request.intent.trim(),
		"lat_e3": round_scaled(request.lat, 1_000.0),
		"lng_e3": round_scaled(request.lng, 1_000.0),
		"radius_e1": round_scaled(request.radius_km, 10.0),
		"category": category,
		"filter_state": filters,
		"query": query,
	});

	hash_payload(&payload)
}

/// First characters of a signature, for log fields.
pub fn signature_prefix(signature: &str) -> &str {
	&signature[..signature.len().min(12)]
}

fn hash_payload(payload: &Value) -> Result<String> {
	let raw = serde_json::to_vec(payload).map_err(|err| Error::InvalidRequest {
		message: format!("Failed to encode signature payload: {err}."),
	})?;

	Ok(blake3::hash(&raw).to_hex().to_string())
}

fn round_scaled(value: f64, scale: f64) -> i64 {
	(value * scale).round() as i64
}
