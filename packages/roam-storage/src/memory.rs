use std::{
	collections::{BTreeMap, BTreeSet, HashMap},
	sync::RwLock,
};

use time::OffsetDateTime;
use uuid::Uuid;

use roam_domain::{Category, PlaceRecord, PopularityEvent};

use crate::{
	Result,
	models::StoredDetails,
	store::{BoxFuture, PlaceStore, validate_prefix},
};

#[derive(Default)]
struct Tables {
	places: BTreeMap<Uuid, PlaceRecord>,
	/// Ordered `(geohash, id)` pairs standing in for an indexed string column.
	bucket_index: BTreeSet<(String, Uuid)>,
	details: HashMap<String, StoredDetails>,
}

/// Process-local store with the same query semantics as the Postgres store.
#[derive(Default)]
pub struct MemoryPlaceStore {
	tables: RwLock<Tables>,
}
impl MemoryPlaceStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.tables.read().unwrap_or_else(|err| err.into_inner()).places.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn read_places<F>(&self, f: F) -> Vec<PlaceRecord>
	where
		F: FnOnce(&Tables) -> Vec<PlaceRecord>,
	{
		let tables = self.tables.read().unwrap_or_else(|err| err.into_inner());

		f(&tables)
	}
}

impl PlaceStore for MemoryPlaceStore {
	fn get_place<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<Option<PlaceRecord>>> {
		Box::pin(async move {
			let tables = self.tables.read().unwrap_or_else(|err| err.into_inner());

			Ok(tables.places.get(&id).cloned())
		})
	}

	fn put_place<'a>(&'a self, record: &'a PlaceRecord) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut tables = self.tables.write().unwrap_or_else(|err| err.into_inner());

			if let Some(previous) = tables.places.insert(record.id, record.clone()) {
				tables.bucket_index.remove(&(previous.geohash, previous.id));
			}

			tables.bucket_index.insert((record.geohash.clone(), record.id));

			Ok(())
		})
	}

	fn record_popularity<'a>(
		&'a self,
		id: Uuid,
		event: PopularityEvent,
	) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			let mut tables = self.tables.write().unwrap_or_else(|err| err.into_inner());
			let Some(record) = tables.places.get_mut(&id) else {
				return Ok(false);
			};

			record.popularity.apply(event);

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

			Ok(self.read_places(|tables| {
				tables
					.bucket_index
					.range((prefix.to_string(), Uuid::nil())..)
					.take_while(|(geohash, _)| geohash.starts_with(prefix))
					.filter_map(|(_, id)| tables.places.get(id))
					.filter(|record| category.is_none_or(|category| record.facets.has_category(category)))
					.take(limit)
					.cloned()
					.collect()
			}))
		})
	}

	fn scan_places<'a>(&'a self, limit: usize) -> BoxFuture<'a, Result<Vec<PlaceRecord>>> {
		Box::pin(async move {
			Ok(self.read_places(|tables| tables.places.values().take(limit).cloned().collect()))
		})
	}

	fn places_due_for_refresh<'a>(
		&'a self,
		now: OffsetDateTime,
		limit: usize,
	) -> BoxFuture<'a, Result<Vec<PlaceRecord>>> {
		Box::pin(async move {
			let mut due = self.read_places(|tables| {
				tables
					.places
					.values()
					.filter(|record| !record.community_enriched)
					.filter(|record| record.refresh.next_refresh_at.is_some_and(|at| at <= now))
					.cloned()
					.collect()
			});

			due.sort_by(|left, right| {
				left.refresh
					.next_refresh_at
					.cmp(&right.refresh.next_refresh_at)
					.then_with(|| left.id.cmp(&right.id))
			});
			due.truncate(limit);

			Ok(due)
		})
	}

	fn get_details<'a>(
		&'a self,
		source_id: &'a str,
	) -> BoxFuture<'a, Result<Option<StoredDetails>>> {
		Box::pin(async move {
			let tables = self.tables.read().unwrap_or_else(|err| err.into_inner());

			Ok(tables.details.get(source_id).cloned())
		})
	}

	fn put_details<'a>(&'a self, stored: &'a StoredDetails) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut tables = self.tables.write().unwrap_or_else(|err| err.into_inner());

			tables.details.insert(stored.details.source_id.clone(), stored.clone());

			Ok(())
		})
	}
}
