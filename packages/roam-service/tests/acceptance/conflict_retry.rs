use std::{
	collections::HashMap,
	future::IntoFuture,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};

use axum::{
	Json, Router,
	extract::{Query, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing,
};
use serde_json::json;
use tokio::{
	net::TcpListener,
	sync::{oneshot, oneshot::Sender},
};
use tokio_util::sync::CancellationToken;

use roam_service::{ExploreOptions, RoamService};
use roam_storage::{MemoryPlaceStore, PlaceStore};
use roam_testkit::fixtures::{CENTER_LAT, CENTER_LNG};

#[derive(Clone, Default)]
struct MockState {
	paged_requests: Arc<AtomicUsize>,
}

async fn start_upstream(state: MockState) -> (String, Sender<()>) {
	let app = Router::new().route("/search", routing::get(search_handler)).with_state(state);
	let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind upstream server.");
	let addr = listener.local_addr().expect("Failed to read upstream server address.");
	let (tx, rx) = oneshot::channel();
	let server = axum::serve(listener, app).with_graceful_shutdown(async move {
		let _ = rx.await;
	});

	tokio::spawn(async move {
		let _ = server.into_future().await;
	});

	(format!("http://{addr}"), tx)
}

async fn search_handler(
	State(state): State<MockState>,
	Query(params): Query<HashMap<String, String>>,
) -> Response {
	if params.contains_key("pageToken") {
		state.paged_requests.fetch_add(1, Ordering::SeqCst);

		return (StatusCode::CONFLICT, "Page token is not ready.").into_response();
	}
	if params.get("query").map(String::as_str) != Some("restaurant") {
		return Json(json!({ "results": [], "hasMore": false })).into_response();
	}

	let results: Vec<_> = (0..3)
		.map(|index| {
			json!({
				"id": format!("grill-{index}"),
				"name": format!("Harbour Grill {index}"),
				"address": "Cape Town",
				"lat": CENTER_LAT + index as f64 * 0.001,
				"lng": CENTER_LNG,
				"types": ["restaurant"],
				"rating": 4.4,
				"userRatingsTotal": 80,
			})
		})
		.collect();

	Json(json!({ "results": results, "nextPageToken": "tok-2", "hasMore": true })).into_response()
}

#[tokio::test]
async fn conflicting_next_page_is_retried_once_then_abandoned() {
	let state = MockState::default();
	let (api_base, shutdown) = start_upstream(state.clone()).await;
	let store: Arc<dyn PlaceStore> = Arc::new(MemoryPlaceStore::new());
	let service =
		RoamService::new(super::test_config(&api_base), store).expect("Failed to build service.");
	let options =
		ExploreOptions { query: Some("restaurant".to_string()), ..ExploreOptions::default() };
	let response = service
		.search_explore_intent(super::explore("family_dining", options), None, CancellationToken::new())
		.await
		.expect("Search failed.");
	let restaurant = response.debug.query("restaurant").expect("Missing restaurant telemetry.");

	assert_eq!(state.paged_requests.load(Ordering::SeqCst), 2);
	assert_eq!(response.places.len(), 3);
	assert_eq!(restaurant.attempts, 3);
	assert!(restaurant.exhausted);
	assert!(
		restaurant.errors.iter().any(|error| error.contains("Conflict retry exhausted")),
		"Unexpected errors: {:?}",
		restaurant.errors
	);

	let _ = shutdown.send(());
}
