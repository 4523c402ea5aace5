use std::time::Duration;

use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

/// Bounded retry for paged requests the upstream answers with 409 ("page token not ready yet").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConflictRetryPolicy {
	/// Total attempts including the first request.
	pub max_attempts: u32,
	pub delay: Duration,
}
impl ConflictRetryPolicy {
	pub fn new(max_attempts: u32, delay: Duration) -> Self {
		Self { max_attempts: max_attempts.max(1), delay }
	}

	pub fn from_config(cfg: &roam_config::Upstream) -> Self {
		Self::new(cfg.conflict_max_attempts, Duration::from_millis(cfg.conflict_retry_delay_ms))
	}

	/// `attempt` is 1-based and counts the request that just returned `status`.
	pub fn should_retry(&self, attempt: u32, status: StatusCode, has_page_token: bool) -> bool {
		status == StatusCode::CONFLICT && has_page_token && attempt < self.max_attempts
	}

	/// Sleeps for the fixed delay. Returns false when cancelled first.
	pub async fn wait(&self, cancel: &CancellationToken) -> bool {
		tokio::select! {
			biased;

			_ = cancel.cancelled() => false,
			_ = tokio::time::sleep(self.delay) => true,
		}
	}
}
impl Default for ConflictRetryPolicy {
	fn default() -> Self {
		Self::new(2, Duration::from_millis(2_000))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn retries_conflicts_once_with_a_page_token() {
		let policy = ConflictRetryPolicy::default();

		assert!(policy.should_retry(1, StatusCode::CONFLICT, true));
		assert!(!policy.should_retry(2, StatusCode::CONFLICT, true));
		assert!(!policy.should_retry(1, StatusCode::CONFLICT, false));
		assert!(!policy.should_retry(1, StatusCode::INTERNAL_SERVER_ERROR, true));
	}

	#[test]
	fn zero_attempts_still_allows_the_first_request() {
		let policy = ConflictRetryPolicy::new(0, Duration::ZERO);

		assert_eq!(policy.max_attempts, 1);
		assert!(!policy.should_retry(1, StatusCode::CONFLICT, true));
	}

	#[tokio::test(start_paused = true)]
	async fn wait_sleeps_for_the_fixed_delay() {
		let policy = ConflictRetryPolicy::default();
		let started = tokio::time::Instant::now();

		assert!(policy.wait(&CancellationToken::new()).await);
		assert!(started.elapsed() >= Duration::from_millis(2_000));
	}

	#[tokio::test]
	async fn wait_aborts_on_cancellation() {
		let policy = ConflictRetryPolicy::new(2, Duration::from_secs(60));
		let cancel = CancellationToken::new();

		cancel.cancel();

		assert!(!policy.wait(&cancel).await);
	}
}
