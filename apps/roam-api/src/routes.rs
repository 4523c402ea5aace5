use axum::{
	Json, Router,
	extract::{Path, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use roam_domain::PlaceDetails;
use roam_service::{Error as ServiceError, ExploreRequest, ExploreResponse};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/explore/search", post(explore_search))
		.route("/v1/places/{place_id}/details", get(place_details))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn explore_search(
	State(state): State<AppState>,
	Json(payload): Json<ExploreRequest>,
) -> Result<Json<ExploreResponse>, ApiError> {
	let cancel = CancellationToken::new();
	// Dropping the handler future cancels in-flight upstream work.
	let _guard = cancel.clone().drop_guard();
	let response = state.service.search_explore_intent(payload, None, cancel).await?;

	Ok(Json(response))
}

async fn place_details(
	State(state): State<AppState>,
	Path(place_id): Path<String>,
) -> Result<Json<PlaceDetails>, ApiError> {
	let place_id = Uuid::parse_str(place_id.trim()).map_err(|_| {
		json_error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", "place_id must be a UUID.")
	})?;
	let cancel = CancellationToken::new();
	let _guard = cancel.clone().drop_guard();
	let Some(details) = state.service.get_place_details(place_id, &cancel).await? else {
		return Err(json_error(
			StatusCode::NOT_FOUND,
			"NOT_FOUND",
			format!("No details for place {place_id}."),
		));
	};

	Ok(Json(details))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::InvalidRequest { message } =>
				json_error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message),
			ServiceError::NotFound { message } =>
				json_error(StatusCode::NOT_FOUND, "NOT_FOUND", message),
			ServiceError::Provider { message } => {
				tracing::error!(error = %message, "Upstream provider failed.");

				json_error(
					StatusCode::INTERNAL_SERVER_ERROR,
					"PROVIDER_ERROR",
					"Upstream provider failed.",
				)
			},
			ServiceError::Storage { message } => {
				tracing::error!(error = %message, "Storage request failed.");

				json_error(
					StatusCode::INTERNAL_SERVER_ERROR,
					"STORAGE_ERROR",
					"Storage request failed.",
				)
			},
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}

pub fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
	ApiError { status, error_code: code.to_string(), message: message.into() }
}
