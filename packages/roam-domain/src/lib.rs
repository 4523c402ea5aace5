pub mod details;
pub mod facets;
pub mod filter;
pub mod geohash;
pub mod intent;
pub mod place;
pub mod rank;
pub mod text;

pub use details::{PlaceDetails, Review};
pub use facets::{
	AccessibilitySignal, Category, Facets, FoodType, KidSignal, PetSignal, Setting, VenueType,
	compute_facets,
};
pub use filter::{FilterState, Lens};
pub use geohash::Bounds;
pub use intent::IntentDefinition;
pub use place::{
	PlaceRecord, PlaceSource, Popularity, PopularityEvent, RefreshState, RefreshStatus, RequestContext,
	place_id_for,
};
pub use rank::RankOutcome;
