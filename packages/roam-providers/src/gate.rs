use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

/// Fixed-size FIFO admission gate shared by every upstream call of one client.
#[derive(Clone, Debug)]
pub struct AdmissionGate {
	semaphore: Arc<Semaphore>,
	capacity: usize,
}
impl AdmissionGate {
	pub fn new(capacity: usize) -> Self {
		let capacity = capacity.max(1);

		Self { semaphore: Arc::new(Semaphore::new(capacity)), capacity }
	}

	/// Waits for a slot in arrival order. Returns `None` when cancelled while queued.
	pub async fn acquire(&self, cancel: &CancellationToken) -> Option<OwnedSemaphorePermit> {
		tokio::select! {
			biased;

			_ = cancel.cancelled() => None,
			permit = self.semaphore.clone().acquire_owned() => permit.ok(),
		}
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	pub fn in_flight(&self) -> usize {
		self.capacity - self.semaphore.available_permits()
	}
}
