use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::facets::{AccessibilitySignal, FoodType, KidSignal, Setting, VenueType};

/// One filter dimension: the chips a user selected and whether they are a hard constraint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Ord + Deserialize<'de>"))]
pub struct Lens<T: Ord> {
	#[serde(default)]
	pub selected: BTreeSet<T>,
	#[serde(default)]
	pub strict: bool,
}
impl<T: Ord> Lens<T> {
	pub fn soft(selected: impl IntoIterator<Item = T>) -> Self {
		Self { selected: selected.into_iter().collect(), strict: false }
	}

	pub fn strict(selected: impl IntoIterator<Item = T>) -> Self {
		Self { selected: selected.into_iter().collect(), strict: true }
	}

	pub fn is_active(&self) -> bool {
		!self.selected.is_empty()
	}

	/// A strict lens with an empty selection constrains nothing.
	pub fn is_hard(&self) -> bool {
		self.strict && self.is_active()
	}
}
impl<T: Ord> Default for Lens<T> {
	fn default() -> Self {
		Self { selected: BTreeSet::new(), strict: false }
	}
}

/// Per-search chip selections across the five lenses.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterState {
	pub food: Lens<FoodType>,
	pub venue: Lens<VenueType>,
	pub kid: Lens<KidSignal>,
	pub accessibility: Lens<AccessibilitySignal>,
	pub setting: Lens<Setting>,
}
impl FilterState {
	pub fn has_hard_filters(&self) -> bool {
		self.food.is_hard()
			|| self.venue.is_hard()
			|| self.kid.is_hard()
			|| self.accessibility.is_hard()
			|| self.setting.is_hard()
	}

	/// True when the kid lens hard-requires the play area signal, the one signal the enrichment
	/// pass knows how to mine.
	pub fn requires_play_area(&self) -> bool {
		self.kid.is_hard() && self.kid.selected.contains(&KidSignal::PlayAreaJungleGym)
	}
}
