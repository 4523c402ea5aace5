use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	facets::{Category, Facets, compute_facets},
	geohash,
};

/// Precision of the stored bucket key. Queries use prefixes of it, so it must be at least the
/// finest query precision.
pub const BUCKET_PRECISION: usize = 9;

const PLACE_ID_PREFIX: &str = "upstream:";
const DETAIL_VIEW_WEIGHT: f64 = 3.0;

/// Raw fields as they arrive from the upstream provider (plus the enrichment excerpt).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceSource {
	pub source_id: String,
	pub name: String,
	pub address: String,
	#[serde(default)]
	pub description: Option<String>,
	pub lat: f64,
	pub lng: f64,
	#[serde(default)]
	pub types: Vec<String>,
	#[serde(default)]
	pub rating: Option<f32>,
	#[serde(default)]
	pub rating_count: Option<u32>,
	#[serde(default)]
	pub price_level: Option<u8>,
	/// Review text mined during enrichment that carried a signal the light fields lacked.
	#[serde(default)]
	pub detail_excerpt: Option<String>,
}
impl PlaceSource {
	pub fn searchable_text(&self) -> String {
		let mut text = String::with_capacity(self.name.len() + self.address.len() + 64);

		text.push_str(&self.name);
		text.push(' ');
		text.push_str(self.description.as_deref().unwrap_or_default());
		text.push(' ');
		text.push_str(&self.address);

		if let Some(excerpt) = self.detail_excerpt.as_deref() {
			text.push(' ');
			text.push_str(excerpt);
		}

		text
	}

	/// Stable hash of the source fields, used to skip rewrites of unchanged documents.
	pub fn content_hash(&self) -> String {
		let raw = serde_json::to_vec(self).unwrap_or_default();

		blake3::hash(&raw).to_hex().to_string()
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshStatus {
	#[default]
	Fresh,
	Stale,
	Failed,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RefreshState {
	pub status: RefreshStatus,
	#[serde(with = "time::serde::rfc3339::option", default)]
	pub last_refreshed_at: Option<OffsetDateTime>,
	#[serde(with = "time::serde::rfc3339::option", default)]
	pub next_refresh_at: Option<OffsetDateTime>,
	pub failure_count: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PopularityEvent {
	SearchHit,
	DetailView,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Popularity {
	pub search_hits: u64,
	pub detail_views: u64,
	pub score: f32,
}
impl Popularity {
	pub fn apply(&mut self, event: PopularityEvent) {
		match event {
			PopularityEvent::SearchHit => self.record_search_hit(),
			PopularityEvent::DetailView => self.record_detail_view(),
		}
	}

	pub fn record_search_hit(&mut self) {
		self.search_hits = self.search_hits.saturating_add(1);

		self.rescore();
	}

	pub fn record_detail_view(&mut self) {
		self.detail_views = self.detail_views.saturating_add(1);

		self.rescore();
	}

	/// Detail views count more than appearances in a result list.
	fn rescore(&mut self) {
		self.score = ((1.0 + self.search_hits as f64).ln()
			+ DETAIL_VIEW_WEIGHT * (1.0 + self.detail_views as f64).ln()) as f32;
	}
}

/// The context a record was first fetched under.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
	pub intent: Option<String>,
	pub category: Option<Category>,
	pub query: Option<String>,
}

/// Canonical cached place document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaceRecord {
	pub id: Uuid,
	pub source: PlaceSource,
	pub geohash: String,
	pub facets: Facets,
	pub context: RequestContext,
	pub version_hash: String,
	pub refresh: RefreshState,
	pub popularity: Popularity,
	/// Crowd report confidence per chip slug, folded in from community reports.
	#[serde(default)]
	pub report_trust: BTreeMap<String, f32>,
	#[serde(default)]
	pub community_enriched: bool,
}
impl PlaceRecord {
	/// Builds a fresh record for a source. Facets and the bucket key are always derived here,
	/// never supplied by callers.
	pub fn from_source(source: PlaceSource, context: RequestContext) -> Self {
		let facets = compute_facets(&source, context.category);
		let geohash = geohash::encode(source.lat, source.lng, BUCKET_PRECISION);
		let version_hash = source.content_hash();

		Self {
			id: place_id_for(&source.source_id),
			source,
			geohash,
			facets,
			context,
			version_hash,
			refresh: RefreshState::default(),
			popularity: Popularity::default(),
			report_trust: BTreeMap::new(),
			community_enriched: false,
		}
	}

	/// Recomputes every derived field from the current source.
	pub fn rederive(&mut self) {
		self.facets = compute_facets(&self.source, self.context.category);
		self.geohash = geohash::encode(self.source.lat, self.source.lng, BUCKET_PRECISION);
		self.version_hash = self.source.content_hash();
	}

	pub fn rating(&self) -> f32 {
		self.source.rating.filter(|rating| rating.is_finite()).unwrap_or(0.0)
	}

	pub fn trust_for(&self, slug: &str) -> f32 {
		self.report_trust.get(slug).copied().unwrap_or(0.0)
	}
}

pub fn place_id_for(source_id: &str) -> Uuid {
	let name = format!("{PLACE_ID_PREFIX}{}", source_id.trim());

	Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}
