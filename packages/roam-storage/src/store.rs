use std::{future::Future, pin::Pin};

use time::OffsetDateTime;
use uuid::Uuid;

use roam_domain::{Category, PlaceRecord, PopularityEvent};

use crate::{Result, models::StoredDetails};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Keyed document store for place records and detail payloads.
///
/// Writes replace the whole document; merging is done by callers before `put_place`. Each write
/// is atomic for its one document.
pub trait PlaceStore
where
	Self: Send + Sync,
{
	fn get_place<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<Option<PlaceRecord>>>;

	fn put_place<'a>(&'a self, record: &'a PlaceRecord) -> BoxFuture<'a, Result<()>>;

	/// Applies one popularity event inside the store so concurrent increments are never lost.
	/// Returns `false` when the place is not stored.
	fn record_popularity<'a>(
		&'a self,
		id: Uuid,
		event: PopularityEvent,
	) -> BoxFuture<'a, Result<bool>>;

	/// Records whose bucket key starts with `prefix`, intersected with an array-contains match
	/// on `category` when one is given. Order is by bucket key.
	fn query_bucket_prefix<'a>(
		&'a self,
		prefix: &'a str,
		category: Option<Category>,
		limit: usize,
	) -> BoxFuture<'a, Result<Vec<PlaceRecord>>>;

	/// Unindexed read of up to `limit` records, used when prefix queries fail.
	fn scan_places<'a>(&'a self, limit: usize) -> BoxFuture<'a, Result<Vec<PlaceRecord>>>;

	/// Records whose `next_refresh_at` is due, oldest first. Community enriched places are never
	/// returned.
	fn places_due_for_refresh<'a>(
		&'a self,
		now: OffsetDateTime,
		limit: usize,
	) -> BoxFuture<'a, Result<Vec<PlaceRecord>>>;

	fn get_details<'a>(&'a self, source_id: &'a str)
	-> BoxFuture<'a, Result<Option<StoredDetails>>>;

	fn put_details<'a>(&'a self, stored: &'a StoredDetails) -> BoxFuture<'a, Result<()>>;
}

pub(crate) fn validate_prefix(prefix: &str) -> Result<()> {
	const BASE32: &str = "0123456789bcdefghjkmnpqrstuvwxyz";

	if prefix.is_empty() || !prefix.chars().all(|ch| BASE32.contains(ch)) {
		return Err(crate::Error::InvalidArgument(format!(
			"Bucket prefix {prefix:?} must be non-empty base32."
		)));
	}

	Ok(())
}
