use std::{collections::BTreeMap, sync::Arc};

use tokio_util::sync::CancellationToken;

use roam_domain::{FilterState, KidSignal, Lens, PlaceDetails, PlaceRecord, place_id_for};
use roam_service::{ExploreOptions, SearchStage};
use roam_storage::{MemoryPlaceStore, PlaceStore};
use roam_testkit::fixtures::{self, CENTER_LAT, CENTER_LNG};

use super::ScriptedUpstream;

fn play_area_options() -> ExploreOptions {
	ExploreOptions {
		filters: Some(FilterState {
			kid: Lens::strict([KidSignal::PlayAreaJungleGym]),
			..FilterState::default()
		}),
		..ExploreOptions::default()
	}
}

fn grills(count: usize) -> Vec<PlaceRecord> {
	(0..count)
		.map(|index| {
			fixtures::place_record(
				&format!("grill-{index}"),
				&format!("Harbour Grill {index}"),
				CENTER_LAT + index as f64 * 0.001,
				CENTER_LNG,
				&["restaurant"],
			)
		})
		.collect()
}

#[tokio::test]
async fn detail_text_admits_places_under_a_strict_play_area_lens() {
	let store = Arc::new(MemoryPlaceStore::new());
	let amenity_only = PlaceDetails {
		source_id: "grill-2".to_string(),
		amenities: BTreeMap::from([("play_area".to_string(), true)]),
		..PlaceDetails::default()
	};
	let upstream = Arc::new(
		ScriptedUpstream::default()
			.with_details(fixtures::details_with_review(
				"grill-0",
				"Great burgers and a jungle gym out back for the kids.",
			))
			.with_details(fixtures::details_with_review("grill-1", "Quiet spot with sea views."))
			.with_details(amenity_only),
	);
	let service = super::service_with(store.clone(), upstream.clone());

	super::seed(&service, grills(4)).await;

	let response = service
		.search_explore_intent(
			super::explore("family_dining", play_area_options()),
			None,
			CancellationToken::new(),
		)
		.await
		.expect("Search failed.");
	let mut survivors: Vec<&str> =
		response.places.iter().map(|record| record.source.source_id.as_str()).collect();

	survivors.sort_unstable();

	assert_eq!(survivors, vec!["grill-0", "grill-2"]);
	assert!(response.debug.enrichment.triggered);
	assert_eq!(response.debug.enrichment.checked, 4);
	assert_eq!(response.debug.enrichment.enriched, 2);
	assert_eq!(response.debug.enrichment.failed, 1);
	assert!(!response.debug.hard_filtered_out);
	assert_eq!(response.debug.stage, SearchStage::Settled);
	assert!(
		response
			.places
			.iter()
			.all(|record| record.facets.kid_signals.contains(&KidSignal::PlayAreaJungleGym))
	);

	service.flush_background().await;

	let stored = store
		.get_place(place_id_for("grill-0"))
		.await
		.expect("Failed to read place.")
		.expect("Missing enriched place.");

	assert!(stored.facets.kid_signals.contains(&KidSignal::PlayAreaJungleGym));
	assert!(stored.source.detail_excerpt.is_some());
}

#[tokio::test]
async fn enrichment_checks_at_most_ten_candidates() {
	let store = Arc::new(MemoryPlaceStore::new());
	let mut scripted = ScriptedUpstream::default();

	for index in 0..12 {
		scripted = scripted.with_details(fixtures::details_with_review(
			&format!("grill-{index}"),
			"The jungle gym kept everyone busy.",
		));
	}

	let upstream = Arc::new(scripted);
	let service = super::service_with(store, upstream.clone());

	super::seed(&service, grills(12)).await;

	let response = service
		.search_explore_intent(
			super::explore("family_dining", play_area_options()),
			None,
			CancellationToken::new(),
		)
		.await
		.expect("Search failed.");

	assert_eq!(upstream.detail_calls(), 10);
	assert_eq!(response.debug.enrichment.checked, 10);
	assert_eq!(response.places.len(), 10);
}

#[tokio::test]
async fn enrichment_is_skipped_when_top_places_already_carry_the_signal() {
	let store = Arc::new(MemoryPlaceStore::new());
	let upstream = Arc::new(ScriptedUpstream::default());
	let service = super::service_with(store, upstream.clone());
	let mut records = grills(3);

	for record in &mut records {
		record.source.description = Some("Family restaurant with a jungle gym.".to_string());
		record.rederive();
	}

	super::seed(&service, records).await;

	let response = service
		.search_explore_intent(
			super::explore("family_dining", play_area_options()),
			None,
			CancellationToken::new(),
		)
		.await
		.expect("Search failed.");

	assert_eq!(response.places.len(), 3);
	assert!(!response.debug.enrichment.triggered);
	assert_eq!(upstream.detail_calls(), 0);
}

#[tokio::test]
async fn phrase_late_in_a_long_review_still_admits_the_place() {
	let store = Arc::new(MemoryPlaceStore::new());
	let filler = "Generous portions, quick service and a lovely view of the bay. ".repeat(5);
	let review = format!("{filler}Best part: a big jungle gym right next to the deck.");
	let upstream = Arc::new(
		ScriptedUpstream::default().with_details(fixtures::details_with_review("grill-0", &review)),
	);
	let service = super::service_with(store.clone(), upstream);

	assert!(review.chars().count() > 300);

	super::seed(&service, grills(1)).await;

	let response = service
		.search_explore_intent(
			super::explore("family_dining", play_area_options()),
			None,
			CancellationToken::new(),
		)
		.await
		.expect("Search failed.");

	assert_eq!(response.places.len(), 1);
	assert_eq!(response.debug.enrichment.enriched, 1);

	service.flush_background().await;

	let stored = store
		.get_place(place_id_for("grill-0"))
		.await
		.expect("Failed to read place.")
		.expect("Missing enriched place.");
	let excerpt = stored.source.detail_excerpt.expect("Missing detail excerpt.");

	assert!(excerpt.to_lowercase().contains("jungle gym"), "Excerpt lost the phrase: {excerpt}");
	assert!(stored.facets.kid_signals.contains(&KidSignal::PlayAreaJungleGym));
}
