use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStage {
	#[default]
	Idle,
	CacheMerge,
	CoreQuery,
	OptionalQuery,
	PageExpansion,
	Enrichment,
	Settled,
}

/// Per-query fetch telemetry. Degraded pages keep their error text here and nowhere else.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryDebug {
	pub query: String,
	pub optional: bool,
	pub pages_fetched: u32,
	/// Upstream requests issued, conflict retries included.
	pub attempts: u32,
	pub results: usize,
	pub added: usize,
	pub errors: Vec<String>,
	/// Set once the query has no further page to fetch.
	pub exhausted: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentDebug {
	pub triggered: bool,
	pub checked: usize,
	pub enriched: usize,
	pub failed: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchDebugState {
	pub signature: String,
	pub stage: SearchStage,
	/// The whole response came from the settled-search cache.
	pub result_cache_hit: bool,
	pub cache_candidates: usize,
	pub cache_fallback_used: bool,
	pub cache_error: Option<String>,
	pub queries: Vec<QueryDebug>,
	pub merged_count: usize,
	pub intent_rejected: usize,
	pub after_filter_count: usize,
	pub hard_filters_applied: bool,
	pub hard_filtered_out: bool,
	pub enrichment: EnrichmentDebug,
	pub cancelled: bool,
}
impl SearchDebugState {
	pub fn query(&self, query: &str) -> Option<&QueryDebug> {
		self.queries.iter().find(|entry| entry.query == query)
	}

	pub fn upstream_attempts(&self) -> u32 {
		self.queries.iter().map(|entry| entry.attempts).sum()
	}
}
