use std::{sync::Arc, time::Duration};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use roam_domain::PlaceRecord;
use roam_service::ExploreOptions;
use roam_storage::MemoryPlaceStore;
use roam_testkit::fixtures;

use super::ScriptedUpstream;

#[tokio::test]
async fn cancelling_after_the_first_snapshot_returns_merged_results() {
	let store = Arc::new(MemoryPlaceStore::new());
	let upstream = Arc::new(
		ScriptedUpstream::default()
			.with_page(
				"playground",
				None,
				super::page(fixtures::playgrounds_near_center("late", 4), None),
			)
			.with_latency(Duration::from_secs(5)),
	);
	let service = Arc::new(super::service_with(store, upstream));

	super::seed(
		&service,
		fixtures::playgrounds_near_center("cached", 2)
			.into_iter()
			.map(|source| PlaceRecord::from_source(source, Default::default()))
			.collect(),
	)
	.await;

	let cancel = CancellationToken::new();
	let (tx, mut rx) = mpsc::channel(16);
	let search = tokio::spawn({
		let service = service.clone();
		let cancel = cancel.clone();

		async move {
			service
				.search_explore_intent(
					super::explore("play_kids", ExploreOptions::default()),
					Some(tx),
					cancel,
				)
				.await
		}
	});
	let first = rx.recv().await.expect("Missing first snapshot.");

	assert!(first.from_cache);

	cancel.cancel();

	let response = tokio::time::timeout(Duration::from_secs(2), search)
		.await
		.expect("Cancelled search did not settle promptly.")
		.expect("Search task panicked.")
		.expect("Cancelled search must not fail.");
	let mut later = Vec::new();

	while let Some(snapshot) = rx.recv().await {
		later.push(snapshot);
	}

	assert!(response.debug.cancelled);
	assert_eq!(response.places.len(), 2);
	assert!(later.is_empty(), "No snapshot may follow the cancellation.");
}

#[tokio::test]
async fn cancelled_search_is_not_cached() {
	let store = Arc::new(MemoryPlaceStore::new());
	let upstream = Arc::new(ScriptedUpstream::default());
	let service = super::service_with(store, upstream);
	let cancel = CancellationToken::new();

	cancel.cancel();

	let response = service
		.search_explore_intent(super::explore("play_kids", ExploreOptions::default()), None, cancel)
		.await
		.expect("Cancelled search must not fail.");

	assert!(response.debug.cancelled);
	assert!(response.places.is_empty());
	assert!(service.results.is_empty());
}
