//! Three-tier lookup of rich place details.

use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tokio_util::sync::CancellationToken;

use roam_domain::PlaceDetails;
use roam_storage::{PlaceStore, StoredDetails};

use crate::{ResultCache, UpstreamProvider};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetailsTier {
	Process,
	Store,
	Upstream,
}
impl DetailsTier {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Process => "process",
			Self::Store => "store",
			Self::Upstream => "upstream",
		}
	}
}

/// Resolves details through the process cache, the shared store, and upstream. Deeper hits
/// back-fill the shallower tiers. Cheap to clone; clones share every tier.
#[derive(Clone)]
pub struct DetailsResolver {
	store: Arc<dyn PlaceStore>,
	upstream: Arc<dyn UpstreamProvider>,
	memory: Arc<ResultCache<PlaceDetails>>,
	ttl: Duration,
}
impl DetailsResolver {
	pub fn new(
		store: Arc<dyn PlaceStore>,
		upstream: Arc<dyn UpstreamProvider>,
		ttl: Duration,
		max_entries: usize,
	) -> Self {
		Self { store, upstream, memory: Arc::new(ResultCache::new(ttl, max_entries)), ttl }
	}

	/// Details for `source_id`, or `None` when no tier has them. Places with community data keep
	/// their details past the TTL.
	pub async fn resolve(
		&self,
		source_id: &str,
		keep_indefinitely: bool,
		cancel: &CancellationToken,
	) -> Option<(PlaceDetails, DetailsTier)> {
		let now = OffsetDateTime::now_utc();

		if let Some(details) = self.memory.get(source_id, now) {
			return Some((details, DetailsTier::Process));
		}

		match self.store.get_details(source_id).await {
			Ok(Some(stored)) if keep_indefinitely || stored.fetched_at + self.ttl > now => {
				self.remember(source_id, &stored.details, keep_indefinitely, now);

				return Some((stored.details, DetailsTier::Store));
			},
			Ok(_) => {},
			Err(err) => {
				tracing::warn!(source_id, error = %err, "Stored details read failed; asking upstream.");
			},
		}

		if cancel.is_cancelled() {
			return None;
		}

		let details = match self.upstream.fetch_details(source_id, cancel).await {
			Ok(Some(details)) => details,
			Ok(None) => return None,
			Err(err) => {
				tracing::warn!(source_id, error = %err, "Upstream details fetch failed.");

				return None;
			},
		};
		let stored = StoredDetails { details, fetched_at: now };

		if let Err(err) = self.store.put_details(&stored).await {
			tracing::warn!(source_id, error = %err, "Failed to store fetched details.");
		}

		self.remember(source_id, &stored.details, keep_indefinitely, now);

		Some((stored.details, DetailsTier::Upstream))
	}

	fn remember(
		&self,
		source_id: &str,
		details: &PlaceDetails,
		keep_indefinitely: bool,
		now: OffsetDateTime,
	) {
		if keep_indefinitely {
			self.memory.insert_pinned(source_id, details.clone(), now);
		} else {
			self.memory.insert(source_id, details.clone(), now);
		}
	}
}
