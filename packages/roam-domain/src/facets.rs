//! Facet vocabulary and the classifier that derives [`Facets`] from raw place attributes.
//!
//! Each dimension is a closed enum with a unique snake_case slug. Slugs double as filter chip
//! keys and as keys of crowd report-trust maps, so they must stay unique across dimensions.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
	place::PlaceSource,
	text::{contains_phrase, fold_text, normalize_token},
};

const BASE_CONFIDENCE: f32 = 0.35;
const DIMENSION_CONFIDENCE: f32 = 0.1;
const RATING_CONFIDENCE: f32 = 0.05;
const RATING_COUNT_CONFIDENCE: f32 = 0.05;
const RATING_COUNT_THRESHOLD: u32 = 20;
const MAX_CONFIDENCE: f32 = 0.95;

macro_rules! facet_enum {
	($(#[$meta:meta])* $name:ident { $($variant:ident => $slug:literal),+ $(,)? }) => {
		$(#[$meta])*
		#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(rename_all = "snake_case")]
		pub enum $name {
			$($variant),+
		}
		impl $name {
			pub const ALL: &'static [Self] = &[$(Self::$variant),+];

			pub fn as_str(self) -> &'static str {
				match self {
					$(Self::$variant => $slug),+
				}
			}

			pub fn from_slug(raw: &str) -> Option<Self> {
				match raw.trim() {
					$($slug => Some(Self::$variant),)+
					_ => None,
				}
			}
		}
	};
}

facet_enum!(
	/// Top-level browse category. A requested category of "all" is modelled as `None`.
	Category {
		Restaurants => "restaurants",
		Cafes => "cafes",
		Parks => "parks",
		Playgrounds => "playgrounds",
		Museums => "museums",
		Attractions => "attractions",
		Beaches => "beaches",
		Hiking => "hiking",
		WineFarms => "wine_farms",
		Golf => "golf",
		KidsActivities => "kids_activities",
		Shopping => "shopping",
		Accommodation => "accommodation",
		Other => "other",
	}
);

facet_enum!(VenueType {
	Restaurant => "restaurant",
	Cafe => "cafe",
	Bar => "bar",
	Park => "park",
	Playground => "playground",
	Museum => "museum",
	Zoo => "zoo",
	Aquarium => "aquarium",
	Farm => "farm",
	Beach => "beach",
	Trail => "trail",
	Winery => "winery",
	GolfCourse => "golf_course",
	PlayCentre => "play_centre",
	ShoppingMall => "shopping_mall",
	Hotel => "hotel",
});

facet_enum!(FoodType {
	Pizza => "pizza",
	Burgers => "burgers",
	Seafood => "seafood",
	Coffee => "coffee",
	IceCream => "ice_cream",
	Bakery => "bakery",
	Vegetarian => "vegetarian",
	Breakfast => "breakfast",
});

facet_enum!(KidSignal {
	KidsMenu => "kids_menu",
	PlayAreaJungleGym => "play_area_jungle_gym",
	HighChairs => "high_chairs",
	ChangingTables => "changing_tables",
	FamilyFriendly => "family_friendly",
});

facet_enum!(AccessibilitySignal {
	WheelchairFriendly => "wheelchair_friendly",
	StepFreeAccess => "step_free_access",
	AccessibleToilet => "accessible_toilet",
	StrollerFriendly => "stroller_friendly",
});

facet_enum!(PetSignal {
	DogsAllowed => "dogs_allowed",
	DogPark => "dog_park",
	WaterBowls => "water_bowls",
});

facet_enum!(Setting {
	Indoor => "indoor",
	Outdoor => "outdoor",
});

/// One derived signal, tagged with its dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FacetTag {
	Category(Category),
	Venue(VenueType),
	Food(FoodType),
	Kid(KidSignal),
	Accessibility(AccessibilitySignal),
	Pet(PetSignal),
	Setting(Setting),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Facets {
	pub categories: BTreeSet<Category>,
	pub venue_types: BTreeSet<VenueType>,
	pub food_types: BTreeSet<FoodType>,
	pub kid_signals: BTreeSet<KidSignal>,
	pub accessibility: BTreeSet<AccessibilitySignal>,
	pub pet_signals: BTreeSet<PetSignal>,
	pub settings: BTreeSet<Setting>,
	pub confidence: f32,
}
impl Facets {
	pub fn has_category(&self, category: Category) -> bool {
		self.categories.contains(&category)
	}

	fn insert(&mut self, tag: FacetTag) {
		match tag {
			FacetTag::Category(value) => {
				self.categories.insert(value);
			},
			FacetTag::Venue(value) => {
				self.venue_types.insert(value);
			},
			FacetTag::Food(value) => {
				self.food_types.insert(value);
			},
			FacetTag::Kid(value) => {
				self.kid_signals.insert(value);
			},
			FacetTag::Accessibility(value) => {
				self.accessibility.insert(value);
			},
			FacetTag::Pet(value) => {
				self.pet_signals.insert(value);
			},
			FacetTag::Setting(value) => {
				self.settings.insert(value);
			},
		}
	}

	fn non_empty_dimensions(&self) -> usize {
		[
			self.categories.is_empty(),
			self.venue_types.is_empty(),
			self.food_types.is_empty(),
			self.kid_signals.is_empty(),
			self.accessibility.is_empty(),
			self.pet_signals.is_empty(),
			self.settings.is_empty(),
		]
		.iter()
		.filter(|empty| !**empty)
		.count()
	}
}

use FacetTag as T;

const TYPE_TABLE: &[(&str, &[FacetTag])] = &[
	("restaurant", &[T::Category(Category::Restaurants), T::Venue(VenueType::Restaurant)]),
	("cafe", &[T::Category(Category::Cafes), T::Venue(VenueType::Cafe), T::Food(FoodType::Coffee)]),
	(
		"coffee_shop",
		&[T::Category(Category::Cafes), T::Venue(VenueType::Cafe), T::Food(FoodType::Coffee)],
	),
	("bar", &[T::Category(Category::Restaurants), T::Venue(VenueType::Bar)]),
	("bakery", &[T::Category(Category::Cafes), T::Food(FoodType::Bakery)]),
	("ice_cream_shop", &[T::Category(Category::Cafes), T::Food(FoodType::IceCream)]),
	(
		"pizza_restaurant",
		&[
			T::Category(Category::Restaurants),
			T::Venue(VenueType::Restaurant),
			T::Food(FoodType::Pizza),
		],
	),
	(
		"hamburger_restaurant",
		&[
			T::Category(Category::Restaurants),
			T::Venue(VenueType::Restaurant),
			T::Food(FoodType::Burgers),
		],
	),
	(
		"seafood_restaurant",
		&[
			T::Category(Category::Restaurants),
			T::Venue(VenueType::Restaurant),
			T::Food(FoodType::Seafood),
		],
	),
	(
		"vegetarian_restaurant",
		&[
			T::Category(Category::Restaurants),
			T::Venue(VenueType::Restaurant),
			T::Food(FoodType::Vegetarian),
		],
	),
	(
		"breakfast_restaurant",
		&[
			T::Category(Category::Restaurants),
			T::Venue(VenueType::Restaurant),
			T::Food(FoodType::Breakfast),
		],
	),
	(
		"park",
		&[T::Category(Category::Parks), T::Venue(VenueType::Park), T::Setting(Setting::Outdoor)],
	),
	(
		"playground",
		&[
			T::Category(Category::Playgrounds),
			T::Venue(VenueType::Playground),
			T::Kid(KidSignal::PlayAreaJungleGym),
			T::Setting(Setting::Outdoor),
		],
	),
	(
		"dog_park",
		&[
			T::Category(Category::Parks),
			T::Venue(VenueType::Park),
			T::Pet(PetSignal::DogPark),
			T::Pet(PetSignal::DogsAllowed),
			T::Setting(Setting::Outdoor),
		],
	),
	(
		"museum",
		&[T::Category(Category::Museums), T::Venue(VenueType::Museum), T::Setting(Setting::Indoor)],
	),
	(
		"zoo",
		&[
			T::Category(Category::Attractions),
			T::Venue(VenueType::Zoo),
			T::Kid(KidSignal::FamilyFriendly),
			T::Setting(Setting::Outdoor),
		],
	),
	(
		"aquarium",
		&[
			T::Category(Category::Attractions),
			T::Venue(VenueType::Aquarium),
			T::Kid(KidSignal::FamilyFriendly),
			T::Setting(Setting::Indoor),
		],
	),
	("tourist_attraction", &[T::Category(Category::Attractions)]),
	(
		"amusement_park",
		&[T::Category(Category::Attractions), T::Kid(KidSignal::FamilyFriendly)],
	),
	("farm", &[T::Venue(VenueType::Farm), T::Setting(Setting::Outdoor)]),
	(
		"beach",
		&[T::Category(Category::Beaches), T::Venue(VenueType::Beach), T::Setting(Setting::Outdoor)],
	),
	(
		"hiking_area",
		&[T::Category(Category::Hiking), T::Venue(VenueType::Trail), T::Setting(Setting::Outdoor)],
	),
	("winery", &[T::Category(Category::WineFarms), T::Venue(VenueType::Winery)]),
	(
		"golf_course",
		&[T::Category(Category::Golf), T::Venue(VenueType::GolfCourse), T::Setting(Setting::Outdoor)],
	),
	(
		"play_centre",
		&[
			T::Category(Category::KidsActivities),
			T::Venue(VenueType::PlayCentre),
			T::Kid(KidSignal::PlayAreaJungleGym),
			T::Setting(Setting::Indoor),
		],
	),
	(
		"indoor_playground",
		&[
			T::Category(Category::KidsActivities),
			T::Venue(VenueType::PlayCentre),
			T::Kid(KidSignal::PlayAreaJungleGym),
			T::Setting(Setting::Indoor),
		],
	),
	(
		"shopping_mall",
		&[
			T::Category(Category::Shopping),
			T::Venue(VenueType::ShoppingMall),
			T::Setting(Setting::Indoor),
		],
	),
	("lodging", &[T::Category(Category::Accommodation), T::Venue(VenueType::Hotel)]),
	("hotel", &[T::Category(Category::Accommodation), T::Venue(VenueType::Hotel)]),
];

const KEYWORD_TABLE: &[(&str, FacetTag)] = &[
	("kids menu", T::Kid(KidSignal::KidsMenu)),
	("children's menu", T::Kid(KidSignal::KidsMenu)),
	("jungle gym", T::Kid(KidSignal::PlayAreaJungleGym)),
	("play area", T::Kid(KidSignal::PlayAreaJungleGym)),
	("playground", T::Kid(KidSignal::PlayAreaJungleGym)),
	("soft play", T::Kid(KidSignal::PlayAreaJungleGym)),
	("climbing frame", T::Kid(KidSignal::PlayAreaJungleGym)),
	("high chair", T::Kid(KidSignal::HighChairs)),
	("high chairs", T::Kid(KidSignal::HighChairs)),
	("changing table", T::Kid(KidSignal::ChangingTables)),
	("baby changing", T::Kid(KidSignal::ChangingTables)),
	("family friendly", T::Kid(KidSignal::FamilyFriendly)),
	("kid friendly", T::Kid(KidSignal::FamilyFriendly)),
	("child friendly", T::Kid(KidSignal::FamilyFriendly)),
	("wheelchair", T::Accessibility(AccessibilitySignal::WheelchairFriendly)),
	("step free", T::Accessibility(AccessibilitySignal::StepFreeAccess)),
	("ramp", T::Accessibility(AccessibilitySignal::StepFreeAccess)),
	("accessible toilet", T::Accessibility(AccessibilitySignal::AccessibleToilet)),
	("accessible bathroom", T::Accessibility(AccessibilitySignal::AccessibleToilet)),
	("pram", T::Accessibility(AccessibilitySignal::StrollerFriendly)),
	("stroller", T::Accessibility(AccessibilitySignal::StrollerFriendly)),
	("pushchair", T::Accessibility(AccessibilitySignal::StrollerFriendly)),
	("dog friendly", T::Pet(PetSignal::DogsAllowed)),
	("pet friendly", T::Pet(PetSignal::DogsAllowed)),
	("dogs welcome", T::Pet(PetSignal::DogsAllowed)),
	("dogs allowed", T::Pet(PetSignal::DogsAllowed)),
	("dog park", T::Pet(PetSignal::DogPark)),
	("off leash", T::Pet(PetSignal::DogPark)),
	("water bowl", T::Pet(PetSignal::WaterBowls)),
	("water bowls", T::Pet(PetSignal::WaterBowls)),
	("indoor", T::Setting(Setting::Indoor)),
	("outdoor", T::Setting(Setting::Outdoor)),
	("garden", T::Setting(Setting::Outdoor)),
	("terrace", T::Setting(Setting::Outdoor)),
	("pizza", T::Food(FoodType::Pizza)),
	("burger", T::Food(FoodType::Burgers)),
	("burgers", T::Food(FoodType::Burgers)),
	("seafood", T::Food(FoodType::Seafood)),
	("coffee", T::Food(FoodType::Coffee)),
	("ice cream", T::Food(FoodType::IceCream)),
	("gelato", T::Food(FoodType::IceCream)),
	("bakery", T::Food(FoodType::Bakery)),
	("vegetarian", T::Food(FoodType::Vegetarian)),
	("vegan", T::Food(FoodType::Vegetarian)),
	("breakfast", T::Food(FoodType::Breakfast)),
	("brunch", T::Food(FoodType::Breakfast)),
	("wine farm", T::Venue(VenueType::Winery)),
	("farm", T::Venue(VenueType::Farm)),
	("trail", T::Venue(VenueType::Trail)),
	("beach", T::Venue(VenueType::Beach)),
	("play centre", T::Venue(VenueType::PlayCentre)),
	("play center", T::Venue(VenueType::PlayCentre)),
];

/// Keyword overrides for domains where upstream types are ambiguous or generic.
const CATEGORY_OVERRIDES: &[(&[&str], Category)] = &[
	(&["hike", "hiking", "trail"], Category::Hiking),
	(&["wine", "winery", "wine farm"], Category::WineFarms),
	(&["golf"], Category::Golf),
	(&["kids", "play centre", "playground", "jungle gym"], Category::KidsActivities),
];

/// Free-text phrases that derive `signal`, used to mine detail text during enrichment.
pub fn kid_signal_phrases(signal: KidSignal) -> Vec<&'static str> {
	KEYWORD_TABLE
		.iter()
		.filter(|(_, tag)| *tag == FacetTag::Kid(signal))
		.map(|(phrase, _)| *phrase)
		.collect()
}

/// Derives facets from source fields. Total and deterministic: identical input always yields an
/// identical value, so results can be cached.
pub fn compute_facets(source: &PlaceSource, requested: Option<Category>) -> Facets {
	let mut facets = Facets::default();

	for raw_type in &source.types {
		let token = normalize_token(raw_type);

		for (type_token, tags) in TYPE_TABLE {
			if *type_token == token {
				for tag in *tags {
					facets.insert(*tag);
				}
			}
		}
	}

	let folded = fold_text(&source.searchable_text());

	for (phrase, tag) in KEYWORD_TABLE {
		if contains_phrase(&folded, phrase) {
			facets.insert(*tag);
		}
	}

	if categories_are_generic(&facets.categories) {
		for (phrases, category) in CATEGORY_OVERRIDES {
			if phrases.iter().any(|phrase| contains_phrase(&folded, phrase)) {
				facets.categories.insert(*category);
			}
		}
	}

	if facets.categories.is_empty() {
		facets.categories.insert(requested.unwrap_or(Category::Other));
	}

	facets.confidence = confidence_for(&facets, source);

	facets
}

fn categories_are_generic(categories: &BTreeSet<Category>) -> bool {
	categories.iter().all(|category| matches!(category, Category::Attractions | Category::Other))
}

fn confidence_for(facets: &Facets, source: &PlaceSource) -> f32 {
	let mut confidence = BASE_CONFIDENCE + DIMENSION_CONFIDENCE * facets.non_empty_dimensions() as f32;

	if source.rating.map(f32::is_finite).unwrap_or(false) {
		confidence += RATING_CONFIDENCE;
	}
	if source.rating_count.map(|count| count >= RATING_COUNT_THRESHOLD).unwrap_or(false) {
		confidence += RATING_COUNT_CONFIDENCE;
	}

	confidence.min(MAX_CONFIDENCE)
}
