use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use roam_domain::PlaceDetails;

/// Detail payload as persisted in the shared store, stamped with its fetch time for TTL checks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredDetails {
	pub details: PlaceDetails,
	#[serde(with = "time::serde::rfc3339")]
	pub fetched_at: OffsetDateTime,
}
