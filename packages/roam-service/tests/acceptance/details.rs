use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use roam_storage::{MemoryPlaceStore, PlaceStore, StoredDetails};
use roam_testkit::fixtures::{self, CENTER_LAT, CENTER_LNG};

use super::ScriptedUpstream;

fn harbour_playground() -> roam_domain::PlaceRecord {
	fixtures::place_record("harbour", "Harbour Playground", CENTER_LAT, CENTER_LNG, &["playground"])
}

#[tokio::test]
async fn details_fall_through_process_store_then_upstream() {
	let store = Arc::new(MemoryPlaceStore::new());
	let upstream = Arc::new(
		ScriptedUpstream::default()
			.with_details(fixtures::details_with_review("harbour", "Shaded jungle gym.")),
	);
	let service = super::service_with(store.clone(), upstream.clone());
	let record = harbour_playground();
	let cancel = CancellationToken::new();

	super::seed(&service, vec![record.clone()]).await;

	let fetched = service
		.get_place_details(record.id, &cancel)
		.await
		.expect("Details lookup failed.")
		.expect("Missing details.");

	service.flush_background().await;

	let again = service
		.get_place_details(record.id, &cancel)
		.await
		.expect("Details lookup failed.")
		.expect("Missing details.");

	service.flush_background().await;

	assert_eq!(fetched, again);
	assert_eq!(upstream.detail_calls(), 1);

	// A second process shares the store but not the process cache.
	let cold_upstream = Arc::new(ScriptedUpstream::default());
	let cold = super::service_with(store.clone(), cold_upstream.clone());
	let from_store = cold
		.get_place_details(record.id, &cancel)
		.await
		.expect("Details lookup failed.")
		.expect("Missing stored details.");

	assert_eq!(from_store, fetched);
	assert_eq!(cold_upstream.detail_calls(), 0);

	cold.flush_background().await;

	let stored = store
		.get_place(record.id)
		.await
		.expect("Failed to read place.")
		.expect("Missing place.");

	assert_eq!(stored.popularity.detail_views, 3);
}

#[tokio::test]
async fn expired_store_details_are_refetched_unless_community_enriched() {
	let store = Arc::new(MemoryPlaceStore::new());
	let stale = StoredDetails {
		details: fixtures::details_with_review("harbour", "Old review."),
		fetched_at: OffsetDateTime::now_utc() - Duration::days(120),
	};

	store.put_details(&stale).await.expect("Failed to store details.");

	let upstream = Arc::new(
		ScriptedUpstream::default()
			.with_details(fixtures::details_with_review("harbour", "New review.")),
	);
	let service = super::service_with(store.clone(), upstream.clone());
	let mut record = harbour_playground();

	super::seed(&service, vec![record.clone()]).await;

	let refreshed = service
		.get_place_details(record.id, &CancellationToken::new())
		.await
		.expect("Details lookup failed.")
		.expect("Missing details.");

	assert_eq!(refreshed.reviews[0].text, "New review.");
	assert_eq!(upstream.detail_calls(), 1);

	store.put_details(&stale).await.expect("Failed to store details.");

	record.community_enriched = true;

	store.put_place(&record).await.expect("Failed to put place.");

	let community_upstream = Arc::new(ScriptedUpstream::default());
	let community = super::service_with(store, community_upstream.clone());
	let kept = community
		.get_place_details(record.id, &CancellationToken::new())
		.await
		.expect("Details lookup failed.")
		.expect("Missing details.");

	assert_eq!(kept.reviews[0].text, "Old review.");
	assert_eq!(community_upstream.detail_calls(), 0);
}

#[tokio::test]
async fn unknown_places_and_missing_upstream_details_are_none() {
	let store = Arc::new(MemoryPlaceStore::new());
	let upstream = Arc::new(ScriptedUpstream::default());
	let service = super::service_with(store, upstream.clone());
	let record = harbour_playground();
	let cancel = CancellationToken::new();

	assert!(
		service
			.get_place_details(Uuid::new_v4(), &cancel)
			.await
			.expect("Details lookup failed.")
			.is_none()
	);

	super::seed(&service, vec![record.clone()]).await;

	assert!(
		service
			.get_place_details(record.id, &cancel)
			.await
			.expect("Details lookup failed.")
			.is_none()
	);
	assert_eq!(upstream.detail_calls(), 1);
}
