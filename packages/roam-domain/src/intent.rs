//! Static registry of explore intents.
//!
//! An intent supplies the upstream queries for a search and an admission predicate over raw
//! place attributes. Exclusions beat inclusions unless the text carries one of the intent's
//! override phrases.

use crate::{
	place::PlaceSource,
	text::{contains_phrase, fold_text, normalize_token},
};

#[derive(Debug, PartialEq, Eq)]
pub struct IntentDefinition {
	pub id: &'static str,
	/// Issued concurrently, first page only, when the cache alone is short of results.
	pub core_queries: &'static [&'static str],
	pub optional_query: Option<&'static str>,
	pub include_types: &'static [&'static str],
	pub exclude_types: &'static [&'static str],
	pub include_keywords: &'static [&'static str],
	pub exclude_keywords: &'static [&'static str],
	/// Phrases that re-admit a place hit by an exclusion, e.g. a "farm" typed place whose text
	/// says "farm stall".
	pub override_phrases: &'static [&'static str],
}
impl IntentDefinition {
	pub fn matches(&self, source: &PlaceSource) -> bool {
		let folded = fold_text(&source.searchable_text());
		let types: Vec<String> = source.types.iter().map(|raw| normalize_token(raw)).collect();
		let excluded = types.iter().any(|token| self.exclude_types.contains(&token.as_str()))
			|| self.exclude_keywords.iter().any(|phrase| contains_phrase(&folded, phrase));

		if excluded && !self.override_phrases.iter().any(|phrase| contains_phrase(&folded, phrase))
		{
			return false;
		}
		if self.include_types.is_empty() && self.include_keywords.is_empty() {
			return true;
		}

		types.iter().any(|token| self.include_types.contains(&token.as_str()))
			|| self.include_keywords.iter().any(|phrase| contains_phrase(&folded, phrase))
	}

	/// Core queries followed by the optional one.
	pub fn queries(&self) -> impl Iterator<Item = &'static str> + '_ {
		self.core_queries.iter().copied().chain(self.optional_query)
	}
}

const INTENTS: &[IntentDefinition] = &[
	IntentDefinition {
		id: "play_kids",
		core_queries: &["playground", "kids play centre"],
		optional_query: Some("family restaurant with play area"),
		include_types: &[
			"playground",
			"park",
			"play_centre",
			"indoor_playground",
			"amusement_park",
			"zoo",
			"aquarium",
			"museum",
		],
		exclude_types: &["bar", "night_club", "casino", "liquor_store", "farm"],
		include_keywords: &[
			"kids",
			"play area",
			"jungle gym",
			"playground",
			"family friendly",
			"farm stall",
		],
		exclude_keywords: &["adults only", "nightclub"],
		override_phrases: &["farm stall", "petting zoo"],
	},
	IntentDefinition {
		id: "family_dining",
		core_queries: &["family restaurant", "kids menu restaurant"],
		optional_query: Some("cafe with play area"),
		include_types: &[
			"restaurant",
			"cafe",
			"coffee_shop",
			"pizza_restaurant",
			"hamburger_restaurant",
			"seafood_restaurant",
			"breakfast_restaurant",
			"bakery",
			"ice_cream_shop",
		],
		exclude_types: &["night_club", "liquor_store"],
		include_keywords: &["kids menu", "family friendly", "play area"],
		exclude_keywords: &["adults only", "cocktail bar"],
		override_phrases: &["family friendly"],
	},
	IntentDefinition {
		id: "outdoor_adventures",
		core_queries: &["hiking trail", "nature reserve"],
		optional_query: Some("beach"),
		include_types: &[
			"park",
			"hiking_area",
			"beach",
			"campground",
			"golf_course",
			"zoo",
			"farm",
			"dog_park",
		],
		exclude_types: &["shopping_mall", "night_club"],
		include_keywords: &["trail", "hike", "nature", "outdoor", "garden"],
		exclude_keywords: &["indoor only"],
		override_phrases: &[],
	},
	IntentDefinition {
		id: "pet_friendly",
		core_queries: &["dog friendly cafe", "dog park"],
		optional_query: Some("dog friendly restaurant"),
		include_types: &["dog_park", "park", "beach", "hiking_area"],
		exclude_types: &[],
		include_keywords: &["dog friendly", "pet friendly", "dogs welcome", "dogs allowed"],
		exclude_keywords: &["no dogs", "no pets"],
		override_phrases: &["dogs on leash welcome"],
	},
	IntentDefinition {
		id: "rainy_day",
		core_queries: &["indoor play centre", "museum"],
		optional_query: Some("aquarium"),
		include_types: &[
			"museum",
			"aquarium",
			"play_centre",
			"indoor_playground",
			"shopping_mall",
			"movie_theater",
			"bowling_alley",
			"library",
		],
		exclude_types: &["park", "hiking_area", "beach", "farm", "campground"],
		include_keywords: &["indoor", "soft play"],
		exclude_keywords: &["outdoor only"],
		override_phrases: &["farm stall", "indoor"],
	},
];

pub fn all() -> &'static [IntentDefinition] {
	INTENTS
}

pub fn intent(id: &str) -> Option<&'static IntentDefinition> {
	let id = id.trim();

	INTENTS.iter().find(|definition| definition.id == id)
}
