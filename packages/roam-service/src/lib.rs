pub mod debug;
pub mod details;
pub mod enrichment;
pub mod explore;
pub mod result_cache;
pub mod signature;

mod error;

pub use debug::{EnrichmentDebug, QueryDebug, SearchDebugState, SearchStage};
pub use details::{DetailsResolver, DetailsTier};
pub use enrichment::{EnrichmentCandidate, EnrichmentFinding, EnrichmentWorker};
pub use error::{Error, Result};
pub use explore::{ExploreOptions, ExploreProgress, ExploreRequest, ExploreResponse};
pub use result_cache::ResultCache;

use std::{future::Future, pin::Pin, sync::Arc};

use time::Duration;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use uuid::Uuid;

use roam_config::Config;
use roam_domain::PlaceDetails;
use roam_providers::{SearchPage, SearchRequest, UpstreamClient};
use roam_storage::{GeoIndexCache, PlaceStore};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Upstream place search as seen by the orchestrator. Page fetches never fail; degraded pages
/// carry their error text instead.
pub trait UpstreamProvider
where
	Self: Send + Sync,
{
	fn fetch_page<'a>(
		&'a self,
		request: &'a SearchRequest,
		cancel: &'a CancellationToken,
	) -> BoxFuture<'a, SearchPage>;

	fn fetch_details<'a>(
		&'a self,
		source_id: &'a str,
		cancel: &'a CancellationToken,
	) -> BoxFuture<'a, roam_providers::Result<Option<PlaceDetails>>>;
}

impl UpstreamProvider for UpstreamClient {
	fn fetch_page<'a>(
		&'a self,
		request: &'a SearchRequest,
		cancel: &'a CancellationToken,
	) -> BoxFuture<'a, SearchPage> {
		Box::pin(UpstreamClient::fetch_page(self, request, cancel))
	}

	fn fetch_details<'a>(
		&'a self,
		source_id: &'a str,
		cancel: &'a CancellationToken,
	) -> BoxFuture<'a, roam_providers::Result<Option<PlaceDetails>>> {
		Box::pin(UpstreamClient::fetch_details(self, source_id, cancel))
	}
}

#[derive(Clone)]
pub struct Providers {
	pub upstream: Arc<dyn UpstreamProvider>,
}
impl Providers {
	pub fn new(upstream: Arc<dyn UpstreamProvider>) -> Self {
		Self { upstream }
	}

	pub fn from_config(cfg: &roam_config::Upstream) -> Result<Self> {
		Ok(Self { upstream: Arc::new(UpstreamClient::new(cfg)?) })
	}
}

pub struct RoamService {
	pub cfg: Config,
	pub cache: GeoIndexCache,
	/// Settled search responses keyed by search signature.
	pub results: Arc<ResultCache<ExploreResponse>>,
	pub details: DetailsResolver,
	pub providers: Providers,
	background: TaskTracker,
}
impl RoamService {
	pub fn new(cfg: Config, store: Arc<dyn PlaceStore>) -> Result<Self> {
		let providers = Providers::from_config(&cfg.upstream)?;

		Ok(Self::with_providers(cfg, store, providers))
	}

	pub fn with_providers(cfg: Config, store: Arc<dyn PlaceStore>, providers: Providers) -> Self {
		let cache = GeoIndexCache::new(store.clone(), &cfg.cache);
		let max_entries = cfg.cache.max_entries as usize;
		let results = Arc::new(ResultCache::new(
			Duration::seconds(cfg.cache.signature_ttl_seconds),
			max_entries,
		));
		let details = DetailsResolver::new(
			store,
			providers.upstream.clone(),
			Duration::days(cfg.cache.place_ttl_days),
			max_entries,
		);

		Self { cfg, cache, results, details, providers, background: TaskTracker::new() }
	}

	/// Details for a cached place through the process cache, the shared store, then upstream.
	/// Unknown places and failed upstream calls are `Ok(None)`.
	pub async fn get_place_details(
		&self,
		place_id: Uuid,
		cancel: &CancellationToken,
	) -> Result<Option<PlaceDetails>> {
		let Some(record) = self.cache.store().get_place(place_id).await? else {
			return Ok(None);
		};
		let Some((details, tier)) = self
			.details
			.resolve(&record.source.source_id, record.community_enriched, cancel)
			.await
		else {
			return Ok(None);
		};

		tracing::debug!(%place_id, tier = tier.as_str(), "Resolved place details.");

		let cache = self.cache.clone();

		self.background.spawn(async move {
			if let Err(err) = cache.record_detail_view(place_id).await {
				tracing::warn!(%place_id, error = %err, "Failed to record detail view.");
			}
		});

		Ok(Some(details))
	}

	/// Waits for every side-effect task spawned so far, such as post-search persistence.
	pub async fn flush_background(&self) {
		self.background.close();
		self.background.wait().await;
		self.background.reopen();
	}

	pub(crate) fn spawn_background<F>(&self, task: F)
	where
		F: Future<Output = ()> + Send + 'static,
	{
		self.background.spawn(task);
	}
}
