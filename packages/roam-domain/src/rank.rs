//! Scores candidates against a [`FilterState`] and hard-excludes those failing a strict lens.

use std::{cmp::Ordering, collections::BTreeSet};

use serde::Serialize;

use roam_config::Ranking;

use crate::{
	facets::{AccessibilitySignal, Category, FoodType, KidSignal, Setting, VenueType},
	filter::{FilterState, Lens},
	place::PlaceRecord,
};

const RATING_SCALE: f32 = 5.0;
const RATING_COUNT_WEIGHT: f32 = 0.1;
const RATING_COUNT_SATURATION: f32 = 1_000.0;
const CONFIDENCE_WEIGHT: f32 = 0.1;
const PRESENT_FACET_WEIGHT: f32 = 0.75;
const PRESENT_FACET_TRUST_WEIGHT: f32 = 0.25;

#[derive(Clone, Debug, Default, Serialize)]
pub struct RankOutcome {
	pub places: Vec<PlaceRecord>,
	/// At least one lens is strict with a non-empty selection.
	pub hard_filters_applied: bool,
	/// Hard filters removed every candidate from a non-empty input.
	pub hard_filtered_out: bool,
	pub after_filter_count: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct LensScore {
	matches: usize,
	bonus: f32,
}

/// Runs one rank and filter pass. Without a filter state the candidates are returned unchanged.
pub fn apply(
	candidates: Vec<PlaceRecord>,
	requested: Option<Category>,
	filter: Option<&FilterState>,
	policy: &Ranking,
) -> RankOutcome {
	let Some(filter) = filter else {
		let after_filter_count = candidates.len();

		return RankOutcome {
			places: candidates,
			hard_filters_applied: false,
			hard_filtered_out: false,
			after_filter_count,
		};
	};
	let hard_filters_applied = filter.has_hard_filters();
	let input_len = candidates.len();
	let mut scored: Vec<(f32, PlaceRecord)> = candidates
		.into_iter()
		.filter_map(|record| {
			score_place(&record, requested, filter, policy).map(|score| (score, record))
		})
		.collect();

	scored.sort_by(|(left_score, left), (right_score, right)| {
		compare_ranked(*left_score, left, *right_score, right)
	});

	let places: Vec<PlaceRecord> = scored.into_iter().map(|(_, record)| record).collect();
	let after_filter_count = places.len();

	RankOutcome {
		hard_filtered_out: hard_filters_applied && input_len > 0 && places.is_empty(),
		hard_filters_applied,
		places,
		after_filter_count,
	}
}

/// Score for one candidate, or `None` when a strict lens has zero matches.
pub fn score_place(
	record: &PlaceRecord,
	requested: Option<Category>,
	filter: &FilterState,
	policy: &Ranking,
) -> Option<f32> {
	let facets = &record.facets;
	let lenses = [
		score_lens(&filter.food, &facets.food_types, FoodType::as_str, record, policy),
		score_lens(&filter.venue, &facets.venue_types, VenueType::as_str, record, policy),
		score_lens(&filter.kid, &facets.kid_signals, KidSignal::as_str, record, policy),
		score_lens(
			&filter.accessibility,
			&facets.accessibility,
			AccessibilitySignal::as_str,
			record,
			policy,
		),
		score_lens(&filter.setting, &facets.settings, Setting::as_str, record, policy),
	];
	let strict = [
		filter.food.is_hard(),
		filter.venue.is_hard(),
		filter.kid.is_hard(),
		filter.accessibility.is_hard(),
		filter.setting.is_hard(),
	];

	if lenses.iter().zip(strict).any(|(lens, strict)| strict && lens.matches == 0) {
		return None;
	}

	let mut score = base_score(record) + lenses.iter().map(|lens| lens.bonus).sum::<f32>();

	if let Some(category) = requested
		&& !facets.has_category(category)
	{
		score -= policy.category_penalty;
	}

	Some(score)
}

pub fn base_score(record: &PlaceRecord) -> f32 {
	let rating = record.rating().clamp(0.0, RATING_SCALE) / RATING_SCALE;
	let count = record.source.rating_count.unwrap_or(0) as f32;
	let volume = (1.0 + count).ln() / RATING_COUNT_SATURATION.ln();

	rating + RATING_COUNT_WEIGHT * volume + CONFIDENCE_WEIGHT * record.facets.confidence
}

fn score_lens<T: Copy + Ord>(
	lens: &Lens<T>,
	present: &BTreeSet<T>,
	slug: fn(T) -> &'static str,
	record: &PlaceRecord,
	policy: &Ranking,
) -> LensScore {
	let mut out = LensScore::default();

	for value in &lens.selected {
		let trust = record.trust_for(slug(*value)).clamp(0.0, 1.0);
		let weight = if present.contains(value) {
			PRESENT_FACET_WEIGHT + PRESENT_FACET_TRUST_WEIGHT * trust
		} else if trust >= policy.trust_threshold {
			trust
		} else {
			continue;
		};

		out.matches += 1;
		out.bonus += policy.lens_match_bonus * weight;
	}

	out
}

fn compare_ranked(
	left_score: f32,
	left: &PlaceRecord,
	right_score: f32,
	right: &PlaceRecord,
) -> Ordering {
	right_score
		.total_cmp(&left_score)
		.then_with(|| right.rating().total_cmp(&left.rating()))
		.then_with(|| left.id.cmp(&right.id))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::place::{PlaceSource, RequestContext};

	fn record(id: &str, name: &str, types: &[&str], rating: f32) -> PlaceRecord {
		PlaceRecord::from_source(
			PlaceSource {
				source_id: id.to_string(),
				name: name.to_string(),
				address: "Stellenbosch".to_string(),
				types: types.iter().map(|value| value.to_string()).collect(),
				rating: Some(rating),
				rating_count: Some(40),
				..PlaceSource::default()
			},
			RequestContext::default(),
		)
	}

	#[test]
	fn without_filter_state_order_is_preserved() {
		let candidates =
			vec![record("a", "Low", &["cafe"], 3.0), record("b", "High", &["cafe"], 4.9)];
		let outcome = apply(candidates.clone(), None, None, &Ranking::default());

		assert_eq!(outcome.places, candidates);
		assert_eq!(outcome.after_filter_count, 2);
		assert!(!outcome.hard_filters_applied);
	}

	#[test]
	fn soft_lens_boosts_matches_without_dropping() {
		let filter = FilterState {
			kid: Lens::soft([KidSignal::PlayAreaJungleGym]),
			..FilterState::default()
		};
		let candidates = vec![
			record("a", "Plain Diner", &["restaurant"], 4.8),
			record("b", "Diner with jungle gym", &["restaurant"], 4.0),
		];
		let outcome = apply(candidates, None, Some(&filter), &Ranking::default());

		assert_eq!(outcome.places.len(), 2);
		assert_eq!(outcome.places[0].source.source_id, "b");
		assert!(!outcome.hard_filters_applied);
	}

	#[test]
	fn crowd_trust_satisfies_strict_lens_only_above_threshold() {
		let filter = FilterState {
			accessibility: Lens::strict([AccessibilitySignal::WheelchairFriendly]),
			..FilterState::default()
		};
		let mut trusted = record("a", "Museum One", &["museum"], 4.0);
		let mut doubtful = record("b", "Museum Two", &["museum"], 4.0);

		trusted.report_trust.insert("wheelchair_friendly".to_string(), 0.6);
		doubtful.report_trust.insert("wheelchair_friendly".to_string(), 0.5);

		let outcome = apply(vec![trusted, doubtful], None, Some(&filter), &Ranking::default());

		assert_eq!(outcome.places.len(), 1);
		assert_eq!(outcome.places[0].source.source_id, "a");
		assert!(outcome.hard_filters_applied);
		assert!(!outcome.hard_filtered_out);
	}

	#[test]
	fn category_mismatch_is_a_penalty_not_a_drop() {
		let filter = FilterState::default();
		let candidates =
			vec![record("a", "Top Park", &["park"], 5.0), record("b", "Okay Cafe", &["cafe"], 3.0)];
		let outcome =
			apply(candidates, Some(Category::Cafes), Some(&filter), &Ranking::default());

		assert_eq!(outcome.places.len(), 2);
		assert_eq!(outcome.places[0].source.source_id, "b");
	}

	#[test]
	fn ties_break_on_rating_then_id() {
		let filter = FilterState::default();
		let mut first = record("a", "Twin", &["cafe"], 4.0);
		let mut second = record("b", "Twin", &["cafe"], 4.0);

		first.facets.confidence = 0.5;
		second.facets.confidence = 0.5;

		let expected_first = first.id.min(second.id);
		let outcome = apply(vec![second, first], None, Some(&filter), &Ranking::default());

		assert_eq!(outcome.places[0].id, expected_first);
	}
}
