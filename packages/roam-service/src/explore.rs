//! Progressive explore-intent search.
//!
//! A search walks `cache merge -> core queries -> optional query -> page expansion ->
//! enrichment -> settled`, emitting a progress snapshot after every merge. The coordinator owns
//! the merged set; fetch tasks only hand pages back to it.

use std::{
	collections::{HashMap, HashSet},
	time::Duration as StdDuration,
};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::{sync::mpsc, task::JoinSet};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use roam_domain::{
	Bounds, Category, FilterState, IntentDefinition, KidSignal, PlaceRecord, RankOutcome,
	RequestContext, geohash, intent, rank, text::normalize_query,
};
use roam_providers::{SearchPage, SearchRequest};
use roam_storage::GeoIndexCache;

use crate::{
	Error, Result, RoamService,
	debug::{QueryDebug, SearchDebugState, SearchStage},
	enrichment::{EnrichmentCandidate, EnrichmentWorker},
	signature::{search_signature, signature_prefix},
};

const MAX_RADIUS_KM: f64 = 50.0;
const ALL_CATEGORIES: &str = "all";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExploreOptions {
	/// A category slug, or `"all"`.
	#[serde(default)]
	pub category: Option<String>,
	/// Free text that replaces the intent's core queries.
	#[serde(default)]
	pub query: Option<String>,
	#[serde(default)]
	pub filters: Option<FilterState>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExploreRequest {
	pub intent: String,
	pub lat: f64,
	pub lng: f64,
	pub radius_km: f64,
	#[serde(flatten)]
	pub options: ExploreOptions,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExploreResponse {
	pub places: Vec<PlaceRecord>,
	pub debug: SearchDebugState,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExploreProgress {
	pub places: Vec<PlaceRecord>,
	pub debug: SearchDebugState,
	/// The query whose page was just merged; `None` for cache and enrichment snapshots.
	pub query: Option<String>,
	pub page: u32,
	pub is_background_loading: bool,
	pub from_cache: bool,
}

impl RoamService {
	/// Runs one progressive search. Snapshots go to `progress` as results merge; the settled
	/// result is returned. Only invalid input fails: degraded fetches are recorded in the debug
	/// state, and a cancelled search returns whatever had merged.
	pub async fn search_explore_intent(
		&self,
		request: ExploreRequest,
		progress: Option<mpsc::Sender<ExploreProgress>>,
		cancel: CancellationToken,
	) -> Result<ExploreResponse> {
		let plan = SearchPlan::from_request(&request)?;
		let signature = search_signature(&request)?;

		if let Some(mut cached) = self.results.get(&signature, OffsetDateTime::now_utc()) {
			tracing::debug!(
				signature = signature_prefix(&signature),
				"Serving search from the settled-search cache."
			);

			cached.debug.result_cache_hit = true;

			if let Some(progress) = progress.as_ref() {
				let snapshot = ExploreProgress {
					places: cached.places.clone(),
					debug: cached.debug.clone(),
					query: None,
					page: 0,
					is_background_loading: false,
					from_cache: true,
				};
				let _ = progress.send(snapshot).await;
			}

			return Ok(cached);
		}

		let min_results = self.cfg.search.min_results as usize;
		let mut run = SearchRun::new(self, plan, signature, progress, cancel);

		run.cache_merge().await;

		if run.survivors() < min_results {
			run.core_queries().await;
		}
		if run.survivors() < min_results {
			run.optional_query().await;
		}

		run.expand_pages().await;
		run.enrich().await;

		Ok(run.settle().await)
	}
}

struct SearchPlan {
	intent: &'static IntentDefinition,
	lat: f64,
	lng: f64,
	radius_km: f64,
	bounds: Bounds,
	category: Option<Category>,
	query: Option<String>,
	filters: Option<FilterState>,
}
impl SearchPlan {
	fn from_request(request: &ExploreRequest) -> Result<Self> {
		let intent = intent::intent(&request.intent).ok_or_else(|| Error::InvalidRequest {
			message: format!("Unknown intent {:?}.", request.intent.trim()),
		})?;

		if !geohash::is_valid_coordinate(request.lat, request.lng) {
			return Err(Error::InvalidRequest {
				message: "lat and lng must be finite and within range.".to_string(),
			});
		}
		if !request.radius_km.is_finite()
			|| request.radius_km <= 0.0
			|| request.radius_km > MAX_RADIUS_KM
		{
			return Err(Error::InvalidRequest {
				message: format!("radius_km must be greater than zero and at most {MAX_RADIUS_KM}."),
			});
		}

		let category = parse_category(request.options.category.as_deref())?;
		let query = request
			.options
			.query
			.as_deref()
			.map(normalize_query)
			.filter(|query| !query.is_empty());

		Ok(Self {
			intent,
			lat: request.lat,
			lng: request.lng,
			radius_km: request.radius_km,
			bounds: Bounds::around(request.lat, request.lng, request.radius_km),
			category,
			query,
			filters: request.options.filters.clone(),
		})
	}

	fn core_queries(&self) -> Vec<String> {
		match self.query.as_ref() {
			Some(query) => vec![query.clone()],
			None => self.intent.core_queries.iter().map(|query| query.to_string()).collect(),
		}
	}

	fn context(&self) -> RequestContext {
		RequestContext {
			intent: Some(self.intent.id.to_string()),
			category: self.category,
			query: self.query.clone(),
		}
	}
}

struct QueryCursor {
	request: SearchRequest,
	next_page_token: Option<String>,
	page: u32,
}

struct SearchRun<'a> {
	service: &'a RoamService,
	plan: SearchPlan,
	progress: Option<mpsc::Sender<ExploreProgress>>,
	cancel: CancellationToken,
	merged: Vec<PlaceRecord>,
	index: HashMap<Uuid, usize>,
	/// Records fetched or enriched during this run, persisted after settlement.
	fresh: HashSet<Uuid>,
	cursors: Vec<QueryCursor>,
	outcome: RankOutcome,
	last_page: u32,
	debug: SearchDebugState,
}
impl<'a> SearchRun<'a> {
	fn new(
		service: &'a RoamService,
		plan: SearchPlan,
		signature: String,
		progress: Option<mpsc::Sender<ExploreProgress>>,
		cancel: CancellationToken,
	) -> Self {
		Self {
			service,
			plan,
			progress,
			cancel,
			merged: Vec::new(),
			index: HashMap::new(),
			fresh: HashSet::new(),
			cursors: Vec::new(),
			outcome: RankOutcome::default(),
			last_page: 0,
			debug: SearchDebugState { signature, ..SearchDebugState::default() },
		}
	}

	fn survivors(&self) -> usize {
		self.outcome.places.len()
	}

	fn is_cancelled(&mut self) -> bool {
		if !self.cancel.is_cancelled() {
			return false;
		}
		if !self.debug.cancelled {
			tracing::debug!(
				stage = ?self.debug.stage,
				merged = self.merged.len(),
				"Search cancelled; keeping merged results."
			);

			self.debug.cancelled = true;
		}

		true
	}

	fn enter(&mut self, stage: SearchStage) {
		self.debug.stage = stage;

		tracing::debug!(
			signature = signature_prefix(&self.debug.signature),
			?stage,
			survivors = self.survivors(),
			"Search stage entered."
		);
	}

	async fn cache_merge(&mut self) {
		if self.is_cancelled() {
			return;
		}

		self.enter(SearchStage::CacheMerge);

		let limit = self.service.cfg.search.max_cache_candidates as usize;
		let cached =
			self.service.cache.query_with_stats(&self.plan.bounds, self.plan.category, limit).await;

		match cached {
			Ok((records, stats)) => {
				self.debug.cache_candidates = records.len();
				self.debug.cache_fallback_used = stats.fallback_used;

				for record in records {
					self.admit(record, false);
				}
			},
			Err(err) => {
				tracing::warn!(error = %err, "Cache read failed; searching upstream only.");

				self.debug.cache_error = Some(err.to_string());
			},
		}

		self.rerank();

		let needs_upstream = self.survivors() < self.service.cfg.search.min_results as usize;

		self.emit(None, 0, needs_upstream, true).await;
	}

	async fn core_queries(&mut self) {
		if self.is_cancelled() {
			return;
		}

		self.enter(SearchStage::CoreQuery);

		let queries = self.plan.core_queries();

		self.fetch_first_pages(queries, false).await;
	}

	async fn optional_query(&mut self) {
		let Some(query) = self.plan.intent.optional_query else {
			return;
		};

		if self.is_cancelled() {
			return;
		}

		self.enter(SearchStage::OptionalQuery);
		self.fetch_first_pages(vec![query.to_string()], true).await;
	}

	/// Issues every first page concurrently and merges each one as it completes.
	async fn fetch_first_pages(&mut self, queries: Vec<String>, optional: bool) {
		let mut tasks = JoinSet::new();

		for query in queries {
			let Some(cursor) = self.open_cursor(query, optional) else {
				continue;
			};
			let request = self.cursors[cursor].request.clone();
			let upstream = self.service.providers.upstream.clone();
			let cancel = self.cancel.clone();

			tasks.spawn(async move {
				let page = upstream.fetch_page(&request, &cancel).await;

				(cursor, page)
			});
		}

		while let Some(joined) = tasks.join_next().await {
			if self.is_cancelled() {
				return;
			}

			match joined {
				Ok((cursor, page)) => self.absorb(cursor, page).await,
				Err(err) => {
					tracing::warn!(error = %err, "Search page task failed.");
				},
			}
		}
	}

	/// Follows next-page tokens round by round, pausing before every page, until enough places
	/// survive or every query is exhausted.
	async fn expand_pages(&mut self) {
		if self.cursors.is_empty() || self.is_cancelled() {
			return;
		}

		let target = self.service.cfg.search.target_results as usize;
		let max_pages = self.service.cfg.search.max_pages;
		let delay = StdDuration::from_millis(self.service.cfg.search.inter_page_delay_ms);

		if self.survivors() >= target {
			return;
		}

		self.enter(SearchStage::PageExpansion);

		loop {
			let mut fetched = false;

			for cursor in 0..self.cursors.len() {
				if self.survivors() >= target || self.is_cancelled() {
					return;
				}
				if self.cursors[cursor].page >= max_pages {
					continue;
				}

				let Some(token) = self.cursors[cursor].next_page_token.take() else {
					continue;
				};

				if !pause(delay, &self.cancel).await {
					self.is_cancelled();

					return;
				}

				let request = self.cursors[cursor].request.next_page(token);

				self.cursors[cursor].request = request.clone();

				let page = self.service.providers.upstream.fetch_page(&request, &self.cancel).await;

				if self.is_cancelled() {
					return;
				}

				self.absorb(cursor, page).await;

				fetched = true;
			}

			if !fetched {
				return;
			}
		}
	}

	/// Re-reads detail text for places lacking the play area signal when the kid lens
	/// hard-requires it and the ranked list cannot satisfy it yet.
	async fn enrich(&mut self) {
		let service = self.service;
		let enrichment = &service.cfg.enrichment;
		let requires_play_area =
			self.plan.filters.as_ref().is_some_and(FilterState::requires_play_area);

		if !enrichment.enabled || !requires_play_area || self.is_cancelled() {
			return;
		}

		let scan_top = enrichment.scan_top as usize;
		let top_has_signal = self.outcome.places.iter().take(scan_top).any(has_play_area);

		if !self.outcome.places.is_empty() && top_has_signal {
			return;
		}

		self.enter(SearchStage::Enrichment);

		self.debug.enrichment.triggered = true;

		let candidates: Vec<EnrichmentCandidate> = self
			.merged
			.iter()
			.filter(|record| !has_play_area(record))
			.take(enrichment.max_candidates as usize)
			.map(|record| EnrichmentCandidate {
				id: record.id,
				source_id: record.source.source_id.clone(),
				community_enriched: record.community_enriched,
			})
			.collect();
		let worker = EnrichmentWorker::new(service.details.clone(), enrichment);
		let findings = worker.run(candidates, &self.cancel).await;

		if self.is_cancelled() {
			return;
		}

		for finding in findings {
			self.debug.enrichment.checked += 1;

			if finding.failed {
				self.debug.enrichment.failed += 1;

				continue;
			}

			let Some(excerpt) = finding.excerpt else {
				continue;
			};
			let Some(slot) = self.index.get(&finding.id).copied() else {
				continue;
			};
			let record = &mut self.merged[slot];

			record.source.detail_excerpt = Some(excerpt);
			record.rederive();

			if has_play_area(record) {
				self.debug.enrichment.enriched += 1;
				self.fresh.insert(finding.id);
			}
		}

		tracing::debug!(
			checked = self.debug.enrichment.checked,
			enriched = self.debug.enrichment.enriched,
			"Enrichment pass finished."
		);

		self.rerank();
		self.emit(None, self.last_page, true, false).await;
	}

	async fn settle(mut self) -> ExploreResponse {
		let cancelled = self.is_cancelled();

		self.enter(SearchStage::Settled);

		let response =
			ExploreResponse { places: self.outcome.places.clone(), debug: self.debug.clone() };

		if cancelled {
			return response;
		}

		self.service.results.insert(
			self.debug.signature.clone(),
			response.clone(),
			OffsetDateTime::now_utc(),
		);

		let hits: Vec<Uuid> = response.places.iter().map(|record| record.id).collect();
		let fresh: Vec<PlaceRecord> = self
			.merged
			.iter()
			.filter(|record| self.fresh.contains(&record.id))
			.cloned()
			.collect();

		self.service.spawn_background(persist_settled(self.service.cache.clone(), fresh, hits));
		self.emit(None, self.last_page, false, false).await;

		response
	}

	fn open_cursor(&mut self, query: String, optional: bool) -> Option<usize> {
		if self.cursors.iter().any(|cursor| cursor.request.query == query) {
			return None;
		}

		let request =
			SearchRequest::first_page(query.clone(), self.plan.lat, self.plan.lng, self.plan.radius_km);

		self.cursors.push(QueryCursor { request, next_page_token: None, page: 0 });
		self.debug.queries.push(QueryDebug { query, optional, ..QueryDebug::default() });

		Some(self.cursors.len() - 1)
	}

	async fn absorb(&mut self, cursor: usize, page: SearchPage) {
		let page_number = {
			let cursor = &mut self.cursors[cursor];

			cursor.page += 1;
			cursor.next_page_token = if page.is_degraded() {
				None
			} else {
				page.next_page_token.clone().filter(|_| page.has_more)
			};

			cursor.page
		};
		let exhausted = self.cursors[cursor].next_page_token.is_none();
		let query = self.cursors[cursor].request.query.clone();

		{
			let debug = &mut self.debug.queries[cursor];

			debug.attempts += page.attempts;
			debug.exhausted = exhausted;

			if let Some(error) = page.error.as_ref() {
				debug.errors.push(error.clone());
			}
		}

		if page.cancelled {
			return;
		}
		if page.is_degraded() {
			tracing::debug!(query = %query, page = page_number, "Degraded page merged as empty.");
		}

		let context = self.plan.context();
		let results = page.places.len();
		let mut added = 0;

		for source in page.places {
			if self.admit(PlaceRecord::from_source(source, context.clone()), true) {
				added += 1;
			}
		}

		{
			let debug = &mut self.debug.queries[cursor];

			debug.pages_fetched += 1;
			debug.results += results;
			debug.added += added;
		}

		self.last_page = self.last_page.max(page_number);

		self.rerank();
		self.emit(Some(query), page_number, true, false).await;
	}

	/// Adds a record unless its id is already merged or the intent rejects it.
	fn admit(&mut self, record: PlaceRecord, fresh: bool) -> bool {
		if self.index.contains_key(&record.id) {
			return false;
		}
		if !self.plan.intent.matches(&record.source) {
			self.debug.intent_rejected += 1;

			return false;
		}
		if fresh {
			self.fresh.insert(record.id);
		}

		self.index.insert(record.id, self.merged.len());
		self.merged.push(record);

		true
	}

	fn rerank(&mut self) {
		self.outcome = rank::apply(
			self.merged.clone(),
			self.plan.category,
			self.plan.filters.as_ref(),
			&self.service.cfg.ranking,
		);
		self.debug.merged_count = self.merged.len();
		self.debug.after_filter_count = self.outcome.after_filter_count;
		self.debug.hard_filters_applied = self.outcome.hard_filters_applied;
		self.debug.hard_filtered_out = self.outcome.hard_filtered_out;
	}

	async fn emit(
		&self,
		query: Option<String>,
		page: u32,
		is_background_loading: bool,
		from_cache: bool,
	) {
		let Some(progress) = self.progress.as_ref() else {
			return;
		};
		let snapshot = ExploreProgress {
			places: self.outcome.places.clone(),
			debug: self.debug.clone(),
			query,
			page,
			is_background_loading,
			from_cache,
		};

		if progress.send(snapshot).await.is_err() {
			tracing::debug!("Progress receiver dropped; snapshot discarded.");
		}
	}
}

fn parse_category(raw: Option<&str>) -> Result<Option<Category>> {
	let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
		return Ok(None);
	};

	if raw.eq_ignore_ascii_case(ALL_CATEGORIES) {
		return Ok(None);
	}

	Category::from_slug(raw)
		.map(Some)
		.ok_or_else(|| Error::InvalidRequest { message: format!("Unknown category {raw:?}.") })
}

fn has_play_area(record: &PlaceRecord) -> bool {
	record.facets.kid_signals.contains(&KidSignal::PlayAreaJungleGym)
}

async fn pause(delay: StdDuration, cancel: &CancellationToken) -> bool {
	if delay.is_zero() {
		return !cancel.is_cancelled();
	}

	tokio::select! {
		biased;

		_ = cancel.cancelled() => false,
		_ = tokio::time::sleep(delay) => true,
	}
}

/// Upserts what this search fetched or enriched and counts a search hit for every returned
/// place. Failures are logged and dropped.
async fn persist_settled(cache: GeoIndexCache, fresh: Vec<PlaceRecord>, hits: Vec<Uuid>) {
	let now = OffsetDateTime::now_utc();
	let mut written = 0_usize;

	for record in fresh {
		let id = record.id;

		match cache.upsert(record, now).await {
			Ok(_) => written += 1,
			Err(err) => {
				tracing::warn!(place_id = %id, error = %err, "Failed to persist searched place.");
			},
		}
	}

	if let Err(err) = cache.record_search_hits(&hits).await {
		tracing::warn!(error = %err, "Failed to record search hits.");
	}

	tracing::debug!(written, hits = hits.len(), "Persisted settled search.");
}
