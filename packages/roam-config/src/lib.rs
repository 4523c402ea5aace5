mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Cache, Config, Enrichment, Postgres, Ranking, Search, Service, Storage, Upstream, Worker,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}

	match cfg.storage.backend.as_str() {
		"memory" => {},
		"postgres" =>
			if cfg.storage.postgres.is_none() {
				return Err(Error::Validation {
					message: "storage.postgres is required when storage.backend is postgres."
						.to_string(),
				});
			},
		_ => {
			return Err(Error::Validation {
				message: "storage.backend must be one of memory or postgres.".to_string(),
			});
		},
	}

	if let Some(postgres) = cfg.storage.postgres.as_ref()
		&& postgres.pool_max_conns == 0
	{
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}

	if cfg.upstream.api_base.trim().is_empty() {
		return Err(Error::Validation {
			message: "upstream.api_base must be non-empty.".to_string(),
		});
	}
	if cfg.upstream.max_concurrency == 0 {
		return Err(Error::Validation {
			message: "upstream.max_concurrency must be greater than zero.".to_string(),
		});
	}
	if cfg.upstream.conflict_max_attempts == 0 {
		return Err(Error::Validation {
			message: "upstream.conflict_max_attempts must be greater than zero.".to_string(),
		});
	}
	if cfg.upstream.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "upstream.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.search.min_results == 0 {
		return Err(Error::Validation {
			message: "search.min_results must be greater than zero.".to_string(),
		});
	}
	if cfg.search.target_results < cfg.search.min_results {
		return Err(Error::Validation {
			message: "search.target_results must be greater than or equal to search.min_results."
				.to_string(),
		});
	}
	if cfg.search.max_pages == 0 {
		return Err(Error::Validation {
			message: "search.max_pages must be greater than zero.".to_string(),
		});
	}
	if cfg.enrichment.enabled && cfg.enrichment.concurrency == 0 {
		return Err(Error::Validation {
			message: "enrichment.concurrency must be greater than zero when enabled.".to_string(),
		});
	}
	if cfg.cache.max_entries == 0 {
		return Err(Error::Validation {
			message: "cache.max_entries must be greater than zero.".to_string(),
		});
	}
	if cfg.cache.signature_ttl_seconds <= 0 {
		return Err(Error::Validation {
			message: "cache.signature_ttl_seconds must be greater than zero.".to_string(),
		});
	}
	if cfg.cache.place_ttl_days <= 0 {
		return Err(Error::Validation {
			message: "cache.place_ttl_days must be greater than zero.".to_string(),
		});
	}
	if !cfg.ranking.trust_threshold.is_finite() {
		return Err(Error::Validation {
			message: "ranking.trust_threshold must be a finite number.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.ranking.trust_threshold) {
		return Err(Error::Validation {
			message: "ranking.trust_threshold must be in the range 0.0-1.0.".to_string(),
		});
	}

	for (label, weight) in [
		("ranking.lens_match_bonus", cfg.ranking.lens_match_bonus),
		("ranking.category_penalty", cfg.ranking.category_penalty),
	] {
		if !weight.is_finite() {
			return Err(Error::Validation { message: format!("{label} must be a finite number.") });
		}
		if weight < 0.0 {
			return Err(Error::Validation { message: format!("{label} must be zero or greater.") });
		}
	}

	if cfg.worker.poll_interval_ms == 0 {
		return Err(Error::Validation {
			message: "worker.poll_interval_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.worker.batch_size == 0 {
		return Err(Error::Validation {
			message: "worker.batch_size must be greater than zero.".to_string(),
		});
	}
	if cfg.worker.base_backoff_ms <= 0 {
		return Err(Error::Validation {
			message: "worker.base_backoff_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.worker.max_backoff_ms < cfg.worker.base_backoff_ms {
		return Err(Error::Validation {
			message: "worker.max_backoff_ms must be greater than or equal to worker.base_backoff_ms."
				.to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.upstream.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.upstream.api_key = None;
	}

	cfg.storage.backend = cfg.storage.backend.trim().to_ascii_lowercase();

	let api_base = cfg.upstream.api_base.trim().trim_end_matches('/').to_string();

	cfg.upstream.api_base = api_base;
}
