pub mod geo_cache;
pub mod memory;
pub mod models;
pub mod pg;
pub mod schema;
pub mod store;

mod error;

pub use error::Error;
pub use geo_cache::{GeoIndexCache, QueryStats, UpsertOutcome};
pub use memory::MemoryPlaceStore;
pub use models::StoredDetails;
pub use pg::PgPlaceStore;
pub use store::{BoxFuture, PlaceStore};

use std::sync::Arc;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Opens the configured backend. Postgres stores get their schema applied before use.
pub async fn open_store(cfg: &roam_config::Storage) -> Result<Arc<dyn PlaceStore>> {
	match (cfg.backend.as_str(), cfg.postgres.as_ref()) {
		("memory", _) => Ok(Arc::new(MemoryPlaceStore::new())),
		("postgres", Some(postgres)) => {
			let store = PgPlaceStore::connect(postgres).await?;

			store.ensure_schema().await?;

			Ok(Arc::new(store))
		},
		("postgres", None) => Err(Error::InvalidArgument(
			"storage.postgres is required for the postgres backend.".to_string(),
		)),
		(backend, _) =>
			Err(Error::InvalidArgument(format!("Unknown storage backend {backend:?}."))),
	}
}
