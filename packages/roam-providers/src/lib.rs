pub mod error;
pub mod gate;
pub mod retry;
pub mod search;

pub use error::{Error, Result};
pub use gate::AdmissionGate;
pub use retry::ConflictRetryPolicy;
pub use search::{SearchPage, SearchRequest};

use std::time::Duration;

use reqwest::{
	Client, Response, StatusCode,
	header::{AUTHORIZATION, HeaderMap, HeaderName},
};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use roam_domain::PlaceDetails;

const MAX_ERROR_BODY_CHARS: usize = 512;

pub fn auth_headers(
	api_key: Option<&str>,
	default_headers: &Map<String, Value>,
) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	if let Some(api_key) = api_key {
		headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);
	}

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: "Default header values must be strings.".to_string(),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}

/// HTTP client for the upstream place search and detail endpoints. Every request passes through
/// one shared [`AdmissionGate`], including clones of the client.
#[derive(Clone, Debug)]
pub struct UpstreamClient {
	http: Client,
	cfg: roam_config::Upstream,
	headers: HeaderMap,
	gate: AdmissionGate,
	retry: ConflictRetryPolicy,
}
impl UpstreamClient {
	pub fn new(cfg: &roam_config::Upstream) -> Result<Self> {
		let http = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
		let headers = auth_headers(cfg.api_key.as_deref(), &cfg.default_headers)?;

		Ok(Self {
			http,
			cfg: cfg.clone(),
			headers,
			gate: AdmissionGate::new(cfg.max_concurrency as usize),
			retry: ConflictRetryPolicy::from_config(cfg),
		})
	}

	pub fn with_retry_policy(mut self, retry: ConflictRetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	pub fn gate(&self) -> &AdmissionGate {
		&self.gate
	}

	/// Fetches one page. Never fails: network errors, rejections, and exhausted conflict retries
	/// all degrade to an empty page carrying the error text.
	pub async fn fetch_page(&self, request: &SearchRequest, cancel: &CancellationToken) -> SearchPage {
		let has_page_token = request.page_token.is_some();
		let mut attempt = 0;

		loop {
			if cancel.is_cancelled() {
				return SearchPage::cancelled(attempt);
			}

			attempt += 1;

			// Held until the body is consumed; released before any conflict retry wait.
			let Some(permit) = self.gate.acquire(cancel).await else {
				return SearchPage::cancelled(attempt);
			};
			let response = match self.send_search(request, cancel).await {
				Ok(response) => response,
				Err(Error::Cancelled) => return SearchPage::cancelled(attempt),
				Err(err) => {
					tracing::warn!(query = %request.query, error = %err, "Upstream search request failed.");

					return SearchPage::failed(err.to_string(), attempt);
				},
			};
			let status = response.status();

			if status.is_success() {
				let raw = match response.bytes().await {
					Ok(raw) => raw,
					Err(err) => return SearchPage::failed(err.to_string(), attempt),
				};

				return match search::parse_search_response(&raw) {
					Ok(page) => SearchPage { attempts: attempt, ..page },
					Err(err) => {
						tracing::warn!(query = %request.query, error = %err, "Upstream search response is malformed.");

						SearchPage::failed(format!("Malformed search response: {err}."), attempt)
					},
				};
			}

			let body = error_body(response).await;

			drop(permit);

			if self.retry.should_retry(attempt, status, has_page_token) {
				tracing::debug!(query = %request.query, attempt, "Upstream page is not ready; retrying after delay.");

				if !self.retry.wait(cancel).await {
					return SearchPage::cancelled(attempt);
				}

				continue;
			}

			let error = if status == StatusCode::CONFLICT {
				format!("Conflict retry exhausted after {attempt} attempt(s): {body}")
			} else {
				format!("Upstream returned {status}: {body}")
			};

			tracing::warn!(query = %request.query, %status, "Upstream search page degraded to empty.");

			return SearchPage::failed(error, attempt);
		}
	}

	/// Fetches the rich detail payload for one place. A 404 is `Ok(None)`.
	pub async fn fetch_details(
		&self,
		source_id: &str,
		cancel: &CancellationToken,
	) -> Result<Option<PlaceDetails>> {
		let Some(_permit) = self.gate.acquire(cancel).await else {
			return Err(Error::Cancelled);
		};
		let url = format!("{}{}/{}", self.cfg.api_base, self.cfg.details_path, source_id.trim());
		let send = self.http.get(url).headers(self.headers.clone()).send();
		let response = tokio::select! {
			biased;

			_ = cancel.cancelled() => return Err(Error::Cancelled),
			response = send => response?,
		};
		let status = response.status();

		if status == StatusCode::NOT_FOUND {
			return Ok(None);
		}
		if !status.is_success() {
			return Err(Error::UpstreamRejected {
				status: status.as_u16(),
				body: error_body(response).await,
			});
		}

		let raw = response.bytes().await?;

		Ok(Some(search::parse_details_response(&raw)?))
	}

	async fn send_search(
		&self,
		request: &SearchRequest,
		cancel: &CancellationToken,
	) -> Result<Response> {
		let url = format!("{}{}", self.cfg.api_base, self.cfg.search_path);
		let send = self
			.http
			.get(url)
			.headers(self.headers.clone())
			.query(&request.query_params())
			.send();

		tokio::select! {
			biased;

			_ = cancel.cancelled() => Err(Error::Cancelled),
			response = send => Ok(response?),
		}
	}
}

async fn error_body(response: Response) -> String {
	let text = response.text().await.unwrap_or_default();

	text.chars().take(MAX_ERROR_BODY_CHARS).collect()
}
