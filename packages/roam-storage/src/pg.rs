use sqlx::{PgPool, postgres::PgPoolOptions, types::Json};
use time::OffsetDateTime;
use uuid::Uuid;

use roam_domain::{Category, PlaceRecord, PopularityEvent};

use crate::{
	Result,
	models::StoredDetails,
	schema,
	store::{BoxFuture, PlaceStore, validate_prefix},
};

const SCHEMA_LOCK_ID: i64 = 7_120_301;

pub struct PgPlaceStore {
	pub pool: PgPool,
}
impl PgPlaceStore {
	pub async fn connect(cfg: &roam_config::Postgres) -> Result<Self> {
		let pool =
			PgPoolOptions::new().max_connections(cfg.pool_max_conns).connect(&cfg.dsn).await?;

		Ok(Self { pool })
	}

	pub async fn ensure_schema(&self) -> Result<()> {
		let sql = schema::render_schema();
		// Advisory locks are per connection, so take a transaction-scoped lock on one connection.
		let mut tx = self.pool.begin().await?;

		sqlx::query("SELECT pg_advisory_xact_lock($1)")
			.bind(SCHEMA_LOCK_ID)
			.execute(&mut *tx)
			.await?;

		for statement in sql.split(';') {
			let trimmed = statement.trim();

			if trimmed.is_empty() {
				continue;
			}

			sqlx::query(trimmed).execute(&mut *tx).await?;
		}

		tx.commit().await?;

		Ok(())
	}
}

impl PlaceStore for PgPlaceStore {
	fn get_place<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<Option<PlaceRecord>>> {
		Box::pin(async move {
			let row: Option<(Json<PlaceRecord>,)> =
				sqlx::query_as("SELECT doc FROM places WHERE id = $1")
					.bind(id)
					.fetch_optional(&self.pool)
					.await?;

			Ok(row.map(|(Json(record),)| record))
		})
	}

	fn put_place<'a>(&'a self, record: &'a PlaceRecord) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let categories: Vec<&str> =
				record.facets.categories.iter().map(|category| category.as_str()).collect();

			sqlx::query(
				"\
INSERT INTO places (id, source_id, geohash, categories, community_enriched, next_refresh_at, doc, updated_at)
VALUES ($1, $2, $3, $4, $5, $6, $7, now())
ON CONFLICT (id) DO UPDATE
SET
	source_id = EXCLUDED.source_id,
	geohash = EXCLUDED.geohash,
	categories = EXCLUDED.categories,
	community_enriched = EXCLUDED.community_enriched,
	next_refresh_at = EXCLUDED.next_refresh_at,
	doc = EXCLUDED.doc,
	updated_at = now()",
			)
			.bind(record.id)
			.bind(record.source.source_id.as_str())
			.bind(record.geohash.as_str())
			.bind(categories)
			.bind(record.community_enriched)
			.bind(record.refresh.next_refresh_at)
			.bind(Json(record))
			.execute(&self.pool)
			.await?;

			Ok(())
		})
	}

	fn record_popularity<'a>(
		&'a self,
		id: Uuid,
		event: PopularityEvent,
	) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			let mut tx = self.pool.begin().await?;
			let row: Option<(Json<PlaceRecord>,)> =
				sqlx::query_as("SELECT doc FROM places WHERE id = $1 FOR UPDATE")
					.bind(id)
					.fetch_optional(&mut *tx)
					.await?;
			let Some((Json(mut record),)) = row else {
				return Ok(false);
			};

			record.popularity.apply(event);

			sqlx::query("UPDATE places SET doc = $2, updated_at = now() WHERE id = $1")
				.bind(id)
				.bind(Json(&record))
				.execute(&mut *tx)
				.await?;
			tx.commit().await?;

			Ok(true)
		})
	}

	fn query_bucket_prefix<'a>(
		&'a self,
		prefix: &'a str,
		category: Option<Category>,
		limit: usize,
	) -> BoxFuture<'a, Result<Vec<PlaceRecord>>> {
		Box::pin(async move {
			validate_prefix(prefix)?;

			let rows: Vec<(Json<PlaceRecord>,)> = sqlx::query_as(
				"\
SELECT doc
FROM places
WHERE geohash LIKE $1
	AND ($2::text IS NULL OR categories @> ARRAY[$2::text])
ORDER BY geohash, id
LIMIT $3",
			)
			.bind(format!("{prefix}%"))
			.bind(category.map(Category::as_str))
			.bind(limit as i64)
			.fetch_all(&self.pool)
			.await?;

			Ok(into_records(rows))
		})
	}

	fn scan_places<'a>(&'a self, limit: usize) -> BoxFuture<'a, Result<Vec<PlaceRecord>>> {
		Box::pin(async move {
			let rows: Vec<(Json<PlaceRecord>,)> =
				sqlx::query_as("SELECT doc FROM places ORDER BY id LIMIT $1")
					.bind(limit as i64)
					.fetch_all(&self.pool)
					.await?;

			Ok(into_records(rows))
		})
	}

	fn places_due_for_refresh<'a>(
		&'a self,
		now: OffsetDateTime,
		limit: usize,
	) -> BoxFuture<'a, Result<Vec<PlaceRecord>>> {
		Box::pin(async move {
			let rows: Vec<(Json<PlaceRecord>,)> = sqlx::query_as(
				"\
SELECT doc
FROM places
WHERE next_refresh_at IS NOT NULL
	AND next_refresh_at <= $1
	AND community_enriched = false
ORDER BY next_refresh_at ASC, id ASC
LIMIT $2",
			)
			.bind(now)
			.bind(limit as i64)
			.fetch_all(&self.pool)
			.await?;

			Ok(into_records(rows))
		})
	}

	fn get_details<'a>(
		&'a self,
		source_id: &'a str,
	) -> BoxFuture<'a, Result<Option<StoredDetails>>> {
		Box::pin(async move {
			let row: Option<(Json<StoredDetails>,)> =
				sqlx::query_as("SELECT doc FROM place_details WHERE source_id = $1")
					.bind(source_id)
					.fetch_optional(&self.pool)
					.await?;

			Ok(row.map(|(Json(stored),)| stored))
		})
	}

	fn put_details<'a>(&'a self, stored: &'a StoredDetails) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			sqlx::query(
				"\
INSERT INTO place_details (source_id, doc, fetched_at)
VALUES ($1, $2, $3)
ON CONFLICT (source_id) DO UPDATE
SET doc = EXCLUDED.doc, fetched_at = EXCLUDED.fetched_at",
			)
			.bind(stored.details.source_id.as_str())
			.bind(Json(stored))
			.bind(stored.fetched_at)
			.execute(&self.pool)
			.await?;

			Ok(())
		})
	}
}

fn into_records(rows: Vec<(Json<PlaceRecord>,)>) -> Vec<PlaceRecord> {
	rows.into_iter().map(|(Json(record),)| record).collect()
}
