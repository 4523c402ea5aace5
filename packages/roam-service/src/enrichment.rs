//! Mines place detail text for a signal the light search fields did not carry.

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use roam_domain::{KidSignal, facets};

use crate::DetailsResolver;

#[derive(Clone, Debug, PartialEq)]
pub struct EnrichmentCandidate {
	pub id: Uuid,
	pub source_id: String,
	pub community_enriched: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnrichmentFinding {
	pub id: Uuid,
	/// Detail text mentioning the signal, or `None` when the details had nothing to offer.
	pub excerpt: Option<String>,
	/// No details could be resolved for the place.
	pub failed: bool,
}

/// Fetches details for at most `max_candidates` places, `concurrency` at a time, and reports
/// which of them mention the play area signal.
#[derive(Clone)]
pub struct EnrichmentWorker {
	details: DetailsResolver,
	max_candidates: usize,
	concurrency: usize,
}
impl EnrichmentWorker {
	pub fn new(details: DetailsResolver, cfg: &roam_config::Enrichment) -> Self {
		Self {
			details,
			max_candidates: cfg.max_candidates as usize,
			concurrency: (cfg.concurrency as usize).max(1),
		}
	}

	/// Findings arrive in completion order. A cancelled run returns what finished before the
	/// cancellation.
	pub async fn run(
		&self,
		candidates: Vec<EnrichmentCandidate>,
		cancel: &CancellationToken,
	) -> Vec<EnrichmentFinding> {
		let mut pending = candidates.into_iter().take(self.max_candidates);
		let mut tasks = JoinSet::new();
		let mut findings = Vec::new();

		loop {
			while tasks.len() < self.concurrency && !cancel.is_cancelled() {
				let Some(candidate) = pending.next() else {
					break;
				};
				let details = self.details.clone();
				let cancel = cancel.clone();

				tasks.spawn(async move { mine(details, candidate, cancel).await });
			}

			let Some(joined) = tasks.join_next().await else {
				break;
			};

			if cancel.is_cancelled() {
				break;
			}

			match joined {
				Ok(finding) => findings.push(finding),
				Err(err) => {
					tracing::warn!(error = %err, "Enrichment task failed.");
				},
			}
		}

		findings
	}
}

async fn mine(
	details: DetailsResolver,
	candidate: EnrichmentCandidate,
	cancel: CancellationToken,
) -> EnrichmentFinding {
	let phrases = facets::kid_signal_phrases(KidSignal::PlayAreaJungleGym);
	let resolved =
		details.resolve(&candidate.source_id, candidate.community_enriched, &cancel).await;

	match resolved {
		Some((details, _)) => EnrichmentFinding {
			id: candidate.id,
			excerpt: details.find_excerpt(&phrases),
			failed: false,
		},
		None => EnrichmentFinding { id: candidate.id, excerpt: None, failed: true },
	}
}
