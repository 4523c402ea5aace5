use std::{
	collections::{BTreeSet, HashSet},
	sync::Arc,
};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use roam_domain::{AccessibilitySignal, FilterState, Lens, place_id_for};
use roam_service::{Error, ExploreOptions, SearchStage};
use roam_storage::{MemoryPlaceStore, PlaceStore};
use roam_testkit::fixtures::{self, CENTER_LAT, CENTER_LNG};

use super::ScriptedUpstream;

fn ids(places: &[roam_domain::PlaceRecord]) -> BTreeSet<Uuid> {
	places.iter().map(|record| record.id).collect()
}

#[tokio::test]
async fn short_cache_still_queries_upstream_and_unions_results() {
	let store = Arc::new(MemoryPlaceStore::new());
	let cached = fixtures::playgrounds_near_center("cached", 3);
	let overlap = cached[0].clone();
	let mut playground_results = fixtures::playgrounds_near_center("fresh", 3);

	playground_results.push(overlap);

	let upstream = Arc::new(
		ScriptedUpstream::default()
			.with_page("playground", None, super::page(playground_results, None))
			.with_page(
				"kids play centre",
				None,
				super::page(fixtures::playgrounds_near_center("centre", 2), None),
			),
	);
	let service = super::service_with(store.clone(), upstream.clone());

	super::seed(
		&service,
		cached
			.iter()
			.map(|source| {
				roam_domain::PlaceRecord::from_source(source.clone(), Default::default())
			})
			.collect(),
	)
	.await;

	let (tx, rx) = mpsc::channel(64);
	let response = service
		.search_explore_intent(
			super::explore("play_kids", ExploreOptions::default()),
			Some(tx),
			CancellationToken::new(),
		)
		.await
		.expect("Search failed.");
	let snapshots = super::drain(rx);

	assert!(upstream.page_calls() >= 2);
	assert_eq!(response.places.len(), 8);
	assert_eq!(
		ids(&response.places).len(),
		response.places.len(),
		"Merged results must be deduplicated by id."
	);
	assert!(response.places.iter().any(|record| record.source.source_id == "cached-0"));
	assert!(response.places.iter().any(|record| record.source.source_id == "centre-1"));
	assert_eq!(response.debug.stage, SearchStage::Settled);
	assert!(response.debug.query("playground").is_some());

	let first = snapshots.first().expect("Missing cache snapshot.");

	assert!(first.from_cache);
	assert!(first.is_background_loading);
	assert_eq!(first.places.len(), 3);
	assert_eq!(first.page, 0);

	let last = snapshots.last().expect("Missing final snapshot.");

	assert!(!last.is_background_loading);
	assert_eq!(ids(&last.places), ids(&response.places));
}

#[tokio::test]
async fn every_snapshot_extends_the_previous_one() {
	let store = Arc::new(MemoryPlaceStore::new());
	let upstream = Arc::new(
		ScriptedUpstream::default()
			.with_page(
				"playground",
				None,
				super::page(fixtures::playgrounds_near_center("p1", 4), Some("p2")),
			)
			.with_page(
				"playground",
				Some("p2"),
				super::page(fixtures::playgrounds_near_center("p2", 4), Some("p3")),
			)
			.with_page(
				"playground",
				Some("p3"),
				super::page(fixtures::playgrounds_near_center("p3", 4), Some("p4")),
			)
			.with_page(
				"kids play centre",
				None,
				super::page(fixtures::playgrounds_near_center("kc", 2), None),
			),
	);
	let service = super::service_with(store, upstream.clone());
	let (tx, rx) = mpsc::channel(64);
	let response = service
		.search_explore_intent(
			super::explore("play_kids", ExploreOptions::default()),
			Some(tx),
			CancellationToken::new(),
		)
		.await
		.expect("Search failed.");
	let snapshots = super::drain(rx);

	assert!(snapshots.len() >= 3);

	for pair in snapshots.windows(2) {
		assert!(
			ids(&pair[0].places).is_subset(&ids(&pair[1].places)),
			"Snapshot for page {} dropped places seen earlier.",
			pair[1].page
		);
	}

	let playground = response.debug.query("playground").expect("Missing playground telemetry.");

	// Three pages at most, so the fourth token is never followed.
	assert_eq!(playground.pages_fetched, 3);
	assert_eq!(response.places.len(), 14);
}

#[tokio::test]
async fn page_expansion_stops_at_the_target() {
	let store = Arc::new(MemoryPlaceStore::new());
	let upstream = Arc::new(
		ScriptedUpstream::default()
			.with_page(
				"playground",
				None,
				super::page(fixtures::playgrounds_near_center("p1", 5), Some("p2")),
			)
			.with_page(
				"playground",
				Some("p2"),
				super::page(fixtures::playgrounds_near_center("p2", 20), Some("p3")),
			),
	);
	let service = super::service_with(store, upstream.clone());
	let response = service
		.search_explore_intent(
			super::explore("play_kids", ExploreOptions::default()),
			None,
			CancellationToken::new(),
		)
		.await
		.expect("Search failed.");
	let playground = response.debug.query("playground").expect("Missing playground telemetry.");

	assert_eq!(playground.pages_fetched, 2);
	assert_eq!(response.places.len(), 25);
}

#[tokio::test]
async fn strict_filter_with_no_match_reports_hard_filtered_out() {
	let store = Arc::new(MemoryPlaceStore::new());
	let upstream = Arc::new(ScriptedUpstream::default());
	let service = super::service_with(store, upstream);

	super::seed(
		&service,
		fixtures::playgrounds_near_center("steps", 15)
			.into_iter()
			.map(|source| roam_domain::PlaceRecord::from_source(source, Default::default()))
			.collect(),
	)
	.await;

	let options = ExploreOptions {
		filters: Some(FilterState {
			accessibility: Lens::strict([AccessibilitySignal::WheelchairFriendly]),
			..FilterState::default()
		}),
		..ExploreOptions::default()
	};
	let response = service
		.search_explore_intent(super::explore("play_kids", options), None, CancellationToken::new())
		.await
		.expect("Search failed.");

	assert!(response.places.is_empty());
	assert!(response.debug.hard_filters_applied);
	assert!(response.debug.hard_filtered_out);
	assert_eq!(response.debug.merged_count, 15);
	assert!(!response.debug.enrichment.triggered);
}

#[tokio::test]
async fn degraded_query_does_not_abort_the_search() {
	let store = Arc::new(MemoryPlaceStore::new());
	let failed = roam_providers::SearchPage {
		error: Some("Upstream returned 500 Internal Server Error: boom".to_string()),
		..roam_providers::SearchPage::default()
	};
	let upstream = Arc::new(
		ScriptedUpstream::default().with_page("playground", None, failed).with_page(
			"kids play centre",
			None,
			super::page(fixtures::playgrounds_near_center("kc", 2), None),
		),
	);
	let service = super::service_with(store, upstream);
	let response = service
		.search_explore_intent(
			super::explore("play_kids", ExploreOptions::default()),
			None,
			CancellationToken::new(),
		)
		.await
		.expect("Search failed.");
	let playground = response.debug.query("playground").expect("Missing playground telemetry.");

	assert_eq!(response.places.len(), 2);
	assert_eq!(playground.errors.len(), 1);
	assert!(playground.exhausted);
}

#[tokio::test]
async fn repeat_search_is_served_from_the_settled_cache() {
	let store = Arc::new(MemoryPlaceStore::new());
	let upstream = Arc::new(ScriptedUpstream::default().with_page(
		"playground",
		None,
		super::page(fixtures::playgrounds_near_center("p1", 4), None),
	));
	let service = super::service_with(store, upstream.clone());
	let request = super::explore("play_kids", ExploreOptions::default());
	let first = service
		.search_explore_intent(request.clone(), None, CancellationToken::new())
		.await
		.expect("Search failed.");
	let calls = upstream.page_calls();
	let (tx, rx) = mpsc::channel(8);
	let second = service
		.search_explore_intent(request, Some(tx), CancellationToken::new())
		.await
		.expect("Search failed.");
	let snapshots = super::drain(rx);

	assert_eq!(upstream.page_calls(), calls);
	assert!(!first.debug.result_cache_hit);
	assert!(second.debug.result_cache_hit);
	assert_eq!(ids(&first.places), ids(&second.places));
	assert_eq!(snapshots.len(), 1);
	assert!(snapshots[0].from_cache);
}

#[tokio::test]
async fn settled_search_persists_fetched_places_with_a_hit() {
	let store = Arc::new(MemoryPlaceStore::new());
	let upstream = Arc::new(ScriptedUpstream::default().with_page(
		"playground",
		None,
		super::page(fixtures::playgrounds_near_center("p1", 2), None),
	));
	let service = super::service_with(store.clone(), upstream);

	service
		.search_explore_intent(
			super::explore("play_kids", ExploreOptions::default()),
			None,
			CancellationToken::new(),
		)
		.await
		.expect("Search failed.");
	service.flush_background().await;

	let stored = store
		.get_place(place_id_for("p1-0"))
		.await
		.expect("Failed to read place.")
		.expect("Searched place was not persisted.");

	assert_eq!(stored.popularity.search_hits, 1);
	assert_eq!(stored.context.intent.as_deref(), Some("play_kids"));
	assert!(stored.refresh.next_refresh_at.is_some());
}

#[tokio::test]
async fn intent_rules_drop_excluded_places() {
	let store = Arc::new(MemoryPlaceStore::new());
	let bar = fixtures::place_source("bar-1", "Harbour Bar", CENTER_LAT, CENTER_LNG, &["bar"]);
	let stall = fixtures::place_source(
		"stall-1",
		"Peregrine Farm Stall",
		CENTER_LAT,
		CENTER_LNG,
		&["farm"],
	);
	let upstream = Arc::new(ScriptedUpstream::default().with_page(
		"playground",
		None,
		super::page(vec![bar, stall], None),
	));
	let service = super::service_with(store, upstream);
	let response = service
		.search_explore_intent(
			super::explore("play_kids", ExploreOptions::default()),
			None,
			CancellationToken::new(),
		)
		.await
		.expect("Search failed.");
	let source_ids: HashSet<&str> =
		response.places.iter().map(|record| record.source.source_id.as_str()).collect();

	assert_eq!(source_ids, HashSet::from(["stall-1"]));
	assert_eq!(response.debug.intent_rejected, 1);
}

#[tokio::test]
async fn invalid_input_is_rejected_before_any_fetch() {
	let store = Arc::new(MemoryPlaceStore::new());
	let upstream = Arc::new(ScriptedUpstream::default());
	let service = super::service_with(store, upstream.clone());
	let mut bad_coordinates = super::explore("play_kids", ExploreOptions::default());

	bad_coordinates.lat = 123.0;

	let unknown_intent = super::explore("nightlife", ExploreOptions::default());

	for request in [bad_coordinates, unknown_intent] {
		let result = service.search_explore_intent(request, None, CancellationToken::new()).await;

		assert!(matches!(result, Err(Error::InvalidRequest { .. })));
	}

	assert_eq!(upstream.page_calls(), 0);
}
