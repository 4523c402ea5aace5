use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use roam_config::{Config, Postgres};

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_toml_with(section: &str, key: &str, value: Value) -> String {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let table = root
		.as_table_mut()
		.and_then(|root| root.get_mut(section))
		.and_then(Value::as_table_mut)
		.expect("Template config must include the requested section.");

	table.insert(key.to_string(), value);

	toml::to_string(&root).expect("Failed to render template config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("roam_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn base_config() -> Config {
	toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse test config.")
}

#[test]
fn template_config_loads_and_normalizes() {
	let path = write_temp_config(SAMPLE_CONFIG_TEMPLATE_TOML.to_string());
	let result = roam_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let cfg = result.expect("Expected template config to load.");

	assert_eq!(cfg.upstream.api_base, "http://127.0.0.1:9000");
	assert!(cfg.upstream.api_key.is_none());
	assert_eq!(cfg.upstream.max_concurrency, 3);
	assert_eq!(cfg.upstream.conflict_retry_delay_ms, 2_000);
	assert_eq!(cfg.upstream.conflict_max_attempts, 2);
	assert_eq!(cfg.search.min_results, 10);
	assert_eq!(cfg.search.target_results, 20);
}

#[test]
fn omitted_sections_fall_back_to_defaults() {
	let payload = "\
[service]
http_bind = \"127.0.0.1:8080\"
log_level = \"info\"

[storage]
backend = \"memory\"

[upstream]
api_base = \"http://localhost\"
";
	let cfg: Config = toml::from_str(payload).expect("Failed to parse minimal config.");

	roam_config::validate(&cfg).expect("Expected minimal config to validate.");

	assert_eq!(cfg.search.max_pages, 3);
	assert_eq!(cfg.enrichment.max_candidates, 10);
	assert_eq!(cfg.enrichment.concurrency, 2);
	assert_eq!(cfg.enrichment.scan_top, 25);
	assert_eq!(cfg.cache.max_entries, 20);
	assert_eq!(cfg.cache.signature_ttl_seconds, 1_800);
	assert!((cfg.ranking.trust_threshold - 0.55).abs() < f32::EPSILON);
}

#[test]
fn unknown_storage_backend_is_rejected() {
	let payload = sample_toml_with("storage", "backend", Value::String("redis".to_string()));
	let path = write_temp_config(payload);
	let result = roam_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let err = result.expect_err("Expected storage backend validation error.");

	assert!(
		err.to_string().contains("storage.backend must be one of memory or postgres."),
		"Unexpected error: {err}"
	);
}

#[test]
fn postgres_backend_requires_postgres_section() {
	let mut cfg = base_config();

	cfg.storage.backend = "postgres".to_string();

	let err = roam_config::validate(&cfg).expect_err("Expected missing postgres section error.");

	assert!(err.to_string().contains("storage.postgres is required"), "Unexpected error: {err}");

	cfg.storage.postgres =
		Some(Postgres { dsn: "postgres://localhost/roam".to_string(), pool_max_conns: 4 });

	roam_config::validate(&cfg).expect("Expected postgres config to validate.");
}

#[test]
fn target_results_must_cover_min_results() {
	let mut cfg = base_config();

	cfg.search.target_results = 5;

	let err = roam_config::validate(&cfg).expect_err("Expected target_results validation error.");

	assert!(
		err.to_string().contains("search.target_results must be greater than or equal to"),
		"Unexpected error: {err}"
	);
}

#[test]
fn upstream_concurrency_must_be_positive() {
	let payload = sample_toml_with("upstream", "max_concurrency", Value::Integer(0));
	let path = write_temp_config(payload);
	let result = roam_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let err = result.expect_err("Expected max_concurrency validation error.");

	assert!(
		err.to_string().contains("upstream.max_concurrency must be greater than zero."),
		"Unexpected error: {err}"
	);
}

#[test]
fn trust_threshold_must_be_a_probability() {
	let mut cfg = base_config();

	cfg.ranking.trust_threshold = 1.5;

	let err = roam_config::validate(&cfg).expect_err("Expected trust_threshold range error.");

	assert!(err.to_string().contains("range 0.0-1.0"), "Unexpected error: {err}");

	cfg.ranking.trust_threshold = f32::NAN;

	let err = roam_config::validate(&cfg).expect_err("Expected trust_threshold finite error.");

	assert!(err.to_string().contains("finite"), "Unexpected error: {err}");
}

#[test]
fn negative_ranking_weights_are_rejected() {
	let mut cfg = base_config();

	cfg.ranking.category_penalty = -1.0;

	let err = roam_config::validate(&cfg).expect_err("Expected category_penalty error.");

	assert!(
		err.to_string().contains("ranking.category_penalty must be zero or greater."),
		"Unexpected error: {err}"
	);
}

#[test]
fn cache_capacity_must_be_positive() {
	let mut cfg = base_config();

	cfg.cache.max_entries = 0;

	let err = roam_config::validate(&cfg).expect_err("Expected cache.max_entries error.");

	assert!(
		err.to_string().contains("cache.max_entries must be greater than zero."),
		"Unexpected error: {err}"
	);
}

#[test]
fn worker_backoff_must_be_ordered() {
	let mut cfg = base_config();

	cfg.worker.batch_size = 0;

	let err = roam_config::validate(&cfg).expect_err("Expected worker.batch_size error.");

	assert!(
		err.to_string().contains("worker.batch_size must be greater than zero."),
		"Unexpected error: {err}"
	);

	cfg.worker.batch_size = 20;
	cfg.worker.max_backoff_ms = cfg.worker.base_backoff_ms - 1;

	let err = roam_config::validate(&cfg).expect_err("Expected worker backoff ordering error.");

	assert!(err.to_string().contains("worker.max_backoff_ms"), "Unexpected error: {err}");
}
