use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub upstream: Upstream,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub enrichment: Enrichment,
	#[serde(default)]
	pub cache: Cache,
	#[serde(default)]
	pub ranking: Ranking,
	#[serde(default)]
	pub worker: Worker,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	/// One of "memory" or "postgres".
	pub backend: String,
	pub postgres: Option<Postgres>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Upstream {
	pub api_base: String,
	pub api_key: Option<String>,
	#[serde(default = "default_search_path")]
	pub search_path: String,
	#[serde(default = "default_details_path")]
	pub details_path: String,
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	/// Size of the FIFO admission gate shared by every upstream call.
	#[serde(default = "default_max_concurrency")]
	pub max_concurrency: u32,
	#[serde(default = "default_conflict_retry_delay_ms")]
	pub conflict_retry_delay_ms: u64,
	/// Total attempts for a page that answers 409, including the first one.
	#[serde(default = "default_conflict_max_attempts")]
	pub conflict_max_attempts: u32,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Search {
	pub min_results: u32,
	pub target_results: u32,
	pub max_pages: u32,
	pub inter_page_delay_ms: u64,
	pub max_cache_candidates: u32,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			min_results: 10,
			target_results: 20,
			max_pages: 3,
			inter_page_delay_ms: 2_000,
			max_cache_candidates: 60,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Enrichment {
	pub enabled: bool,
	pub max_candidates: u32,
	pub concurrency: u32,
	/// How many of the top ranked candidates are inspected for the signal before enriching.
	pub scan_top: u32,
}
impl Default for Enrichment {
	fn default() -> Self {
		Self { enabled: true, max_candidates: 10, concurrency: 2, scan_top: 25 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Cache {
	pub signature_ttl_seconds: i64,
	pub place_ttl_days: i64,
	pub max_entries: u32,
}
impl Default for Cache {
	fn default() -> Self {
		Self { signature_ttl_seconds: 1_800, place_ttl_days: 90, max_entries: 20 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Ranking {
	pub trust_threshold: f32,
	pub lens_match_bonus: f32,
	pub category_penalty: f32,
}
impl Default for Ranking {
	fn default() -> Self {
		Self { trust_threshold: 0.55, lens_match_bonus: 1.0, category_penalty: 2.0 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Worker {
	pub poll_interval_ms: u64,
	pub batch_size: u32,
	pub base_backoff_ms: i64,
	pub max_backoff_ms: i64,
}
impl Default for Worker {
	fn default() -> Self {
		Self {
			poll_interval_ms: 5_000,
			batch_size: 20,
			base_backoff_ms: 60_000,
			max_backoff_ms: 86_400_000,
		}
	}
}

fn default_search_path() -> String {
	"/search".to_string()
}

fn default_details_path() -> String {
	"/details".to_string()
}

fn default_timeout_ms() -> u64 {
	10_000
}

fn default_max_concurrency() -> u32 {
	3
}

fn default_conflict_retry_delay_ms() -> u64 {
	2_000
}

fn default_conflict_max_attempts() -> u32 {
	2
}
