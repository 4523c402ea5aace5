use std::{sync::Arc, time::Duration as StdDuration};

use time::{Duration, OffsetDateTime};
use tokio_util::sync::CancellationToken;

use roam_domain::{KidSignal, PlaceDetails, PlaceRecord, RefreshStatus, facets};
use roam_service::UpstreamProvider;
use roam_storage::{GeoIndexCache, StoredDetails};

use crate::Result;

const MAX_BACKOFF_EXPONENT: u32 = 20;

pub struct WorkerState {
	pub cache: GeoIndexCache,
	pub upstream: Arc<dyn UpstreamProvider>,
	pub cfg: roam_config::Worker,
}

/// Outcome of one polling pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefreshReport {
	pub due: usize,
	pub refreshed: usize,
	pub failed: usize,
}

pub async fn run_worker(state: WorkerState, cancel: CancellationToken) {
	let interval = StdDuration::from_millis(state.cfg.poll_interval_ms);

	tracing::info!(
		poll_interval_ms = state.cfg.poll_interval_ms,
		batch_size = state.cfg.batch_size,
		"Refresh worker started."
	);

	loop {
		match refresh_due_once(&state, OffsetDateTime::now_utc(), &cancel).await {
			Ok(report) if report.due > 0 => {
				tracing::info!(
					due = report.due,
					refreshed = report.refreshed,
					failed = report.failed,
					"Refresh pass finished."
				);
			},
			Ok(_) => {},
			Err(err) => {
				tracing::error!(error = %err, "Refresh pass failed.");
			},
		}

		tokio::select! {
			biased;

			_ = cancel.cancelled() => break,
			_ = tokio::time::sleep(interval) => {},
		}
	}

	tracing::info!("Refresh worker stopped.");
}

/// Refreshes up to `batch_size` places whose refresh is due at `now`. Storage errors abort the
/// pass; upstream failures are recorded on the place and rescheduled with backoff.
pub async fn refresh_due_once(
	state: &WorkerState,
	now: OffsetDateTime,
	cancel: &CancellationToken,
) -> Result<RefreshReport> {
	let due =
		state.cache.store().places_due_for_refresh(now, state.cfg.batch_size as usize).await?;
	let mut report = RefreshReport { due: due.len(), ..RefreshReport::default() };

	for record in due {
		if cancel.is_cancelled() {
			break;
		}

		let place_id = record.id;

		match state.upstream.fetch_details(&record.source.source_id, cancel).await {
			Ok(Some(details)) => {
				refresh_place(state, record, details, now).await?;

				report.refreshed += 1;
			},
			Ok(None) => {
				mark_failed(state, record, now, "Upstream has no details for this place.").await?;

				report.failed += 1;
			},
			Err(_) if cancel.is_cancelled() => break,
			Err(err) => {
				tracing::warn!(%place_id, error = %err, "Place refresh failed.");

				mark_failed(state, record, now, &err.to_string()).await?;

				report.failed += 1;
			},
		}
	}

	Ok(report)
}

/// `min(base * 2^n, max)` where `n` counts the failures before this one.
pub fn backoff_for_failures(failures: u32, cfg: &roam_config::Worker) -> Duration {
	let exp = failures.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
	let base = cfg.base_backoff_ms.saturating_mul(1_i64 << exp);

	Duration::milliseconds(base.min(cfg.max_backoff_ms))
}

async fn refresh_place(
	state: &WorkerState,
	mut record: PlaceRecord,
	details: PlaceDetails,
	now: OffsetDateTime,
) -> Result<()> {
	let phrases = facets::kid_signal_phrases(KidSignal::PlayAreaJungleGym);

	if let Some(excerpt) = details.find_excerpt(&phrases) {
		record.source.detail_excerpt = Some(excerpt);
	}

	state.cache.store().put_details(&StoredDetails { details, fetched_at: now }).await?;

	let (record, outcome) = state.cache.upsert(record, now).await?;

	tracing::debug!(place_id = %record.id, ?outcome, "Place refreshed.");

	Ok(())
}

async fn mark_failed(
	state: &WorkerState,
	mut record: PlaceRecord,
	now: OffsetDateTime,
	reason: &str,
) -> Result<()> {
	let failures = record.refresh.failure_count.saturating_add(1);
	let next_refresh_at = now + backoff_for_failures(failures, &state.cfg);

	record.refresh.status = RefreshStatus::Failed;
	record.refresh.failure_count = failures;
	record.refresh.next_refresh_at = Some(next_refresh_at);

	state.cache.store().put_place(&record).await?;

	tracing::debug!(
		place_id = %record.id,
		failures,
		%next_refresh_at,
		reason,
		"Place refresh rescheduled."
	);

	Ok(())
}
