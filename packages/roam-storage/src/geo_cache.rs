//! Approximate bounding-box index over a [`PlaceStore`].

use std::{cmp::Ordering, collections::HashSet, sync::Arc};

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use roam_domain::{
	Bounds, Category, PlaceRecord, PopularityEvent, RefreshState, RefreshStatus, geohash,
};

use crate::{Error, Result, store::PlaceStore};

/// Unindexed fallback reads are capped at this multiple of the requested limit.
const FALLBACK_SCAN_FACTOR: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
	Inserted,
	Updated,
	/// The stored document already matched and was still fresh.
	Unchanged,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryStats {
	pub prefixes: usize,
	pub fallback_used: bool,
	pub outside_bounds: usize,
}

#[derive(Clone)]
pub struct GeoIndexCache {
	store: Arc<dyn PlaceStore>,
	place_ttl: Duration,
}
impl GeoIndexCache {
	pub fn new(store: Arc<dyn PlaceStore>, cfg: &roam_config::Cache) -> Self {
		Self { store, place_ttl: Duration::days(cfg.place_ttl_days) }
	}

	pub fn store(&self) -> &Arc<dyn PlaceStore> {
		&self.store
	}

	/// Merge-upserts a freshly derived record. Popularity, crowd trust, community data, and the
	/// first-seen request context survive from the stored copy; facets are recomputed.
	pub async fn upsert(
		&self,
		incoming: PlaceRecord,
		now: OffsetDateTime,
	) -> Result<(PlaceRecord, UpsertOutcome)> {
		let existing = self.store.get_place(incoming.id).await?;
		let merged = merge_for_upsert(existing.as_ref(), incoming, now, self.place_ttl);

		if let Some(existing) = existing.as_ref()
			&& is_unchanged(existing, &merged, now)
		{
			return Ok((existing.clone(), UpsertOutcome::Unchanged));
		}

		self.store.put_place(&merged).await?;

		let outcome =
			if existing.is_some() { UpsertOutcome::Updated } else { UpsertOutcome::Inserted };

		Ok((merged, outcome))
	}

	pub async fn query_by_bounds_and_category(
		&self,
		bounds: &Bounds,
		category: Option<Category>,
		limit: usize,
	) -> Result<Vec<PlaceRecord>> {
		self.query_with_stats(bounds, category, limit).await.map(|(records, _)| records)
	}

	/// Prefix-sampled box query. Results always lie inside `bounds` and match `category`; a
	/// failing index read falls back to one capped unindexed scan.
	pub async fn query_with_stats(
		&self,
		bounds: &Bounds,
		category: Option<Category>,
		limit: usize,
	) -> Result<(Vec<PlaceRecord>, QueryStats)> {
		if !bounds.is_valid() {
			return Err(Error::InvalidArgument(format!("Bounds {bounds:?} are not valid.")));
		}
		if limit == 0 {
			return Ok((Vec::new(), QueryStats::default()));
		}

		let prefixes = geohash::sample_prefixes(bounds);
		let mut stats = QueryStats { prefixes: prefixes.len(), ..QueryStats::default() };
		let raw = match self.query_prefixes(&prefixes, category, limit).await {
			Ok(raw) => raw,
			Err(err) => {
				tracing::warn!(error = %err, "Bucket prefix query failed; falling back to a scan.");

				stats.fallback_used = true;

				self.store.scan_places(limit.saturating_mul(FALLBACK_SCAN_FACTOR)).await?
			},
		};
		let mut seen = HashSet::<Uuid>::with_capacity(raw.len());
		let mut records = Vec::with_capacity(raw.len());

		for record in raw {
			if !seen.insert(record.id) {
				continue;
			}
			if !bounds.contains(record.source.lat, record.source.lng) {
				stats.outside_bounds += 1;

				continue;
			}
			if category.is_some_and(|category| !record.facets.has_category(category)) {
				continue;
			}

			records.push(record);
		}

		records.sort_by(compare_popularity);
		records.truncate(limit);

		Ok((records, stats))
	}

	pub async fn record_detail_view(&self, id: Uuid) -> Result<()> {
		if !self.store.record_popularity(id, PopularityEvent::DetailView).await? {
			return Err(Error::NotFound(format!("Place {id} is not cached.")));
		}

		Ok(())
	}

	/// Places that are no longer cached are skipped.
	pub async fn record_search_hits(&self, ids: &[Uuid]) -> Result<()> {
		for id in ids {
			self.store.record_popularity(*id, PopularityEvent::SearchHit).await?;
		}

		Ok(())
	}

	async fn query_prefixes(
		&self,
		prefixes: &[String],
		category: Option<Category>,
		limit: usize,
	) -> Result<Vec<PlaceRecord>> {
		let mut out = Vec::new();

		for prefix in prefixes {
			out.extend(self.store.query_bucket_prefix(prefix, category, limit).await?);
		}

		Ok(out)
	}
}

pub fn merge_for_upsert(
	existing: Option<&PlaceRecord>,
	mut incoming: PlaceRecord,
	now: OffsetDateTime,
	place_ttl: Duration,
) -> PlaceRecord {
	if let Some(existing) = existing {
		incoming.popularity = existing.popularity.clone();
		incoming.report_trust = existing.report_trust.clone();
		incoming.community_enriched |= existing.community_enriched;
		incoming.context = existing.context.clone();

		if incoming.source.detail_excerpt.is_none() {
			incoming.source.detail_excerpt = existing.source.detail_excerpt.clone();
		}
	}

	incoming.rederive();

	incoming.refresh = RefreshState {
		status: RefreshStatus::Fresh,
		last_refreshed_at: Some(now),
		next_refresh_at: (!incoming.community_enriched).then(|| now + place_ttl),
		failure_count: 0,
	};

	incoming
}

/// Popularity desc, then rating desc, then id for a total order.
pub fn compare_popularity(left: &PlaceRecord, right: &PlaceRecord) -> Ordering {
	right
		.popularity
		.score
		.total_cmp(&left.popularity.score)
		.then_with(|| right.rating().total_cmp(&left.rating()))
		.then_with(|| left.id.cmp(&right.id))
}

fn is_unchanged(existing: &PlaceRecord, merged: &PlaceRecord, now: OffsetDateTime) -> bool {
	existing.version_hash == merged.version_hash
		&& existing.facets == merged.facets
		&& existing.community_enriched == merged.community_enriched
		&& existing.refresh.status == RefreshStatus::Fresh
		&& existing.refresh.next_refresh_at.is_none_or(|at| at > now)
}
