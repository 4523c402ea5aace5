use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::text::{contains_phrase, fold_text};

const MAX_EXCERPT_CHARS: usize = 280;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Review {
	#[serde(default)]
	pub rating: Option<f32>,
	pub text: String,
}

/// Rich per-place payload from the upstream detail endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceDetails {
	pub source_id: String,
	#[serde(default)]
	pub summary: Option<String>,
	#[serde(default)]
	pub reviews: Vec<Review>,
	#[serde(default)]
	pub opening_hours: Vec<String>,
	/// Boolean amenity flags keyed by upstream name, e.g. `"play_area": true`.
	#[serde(default)]
	pub amenities: BTreeMap<String, bool>,
}
impl PlaceDetails {
	/// First piece of detail text mentioning any of `phrases`. Long texts are cut to a window
	/// that still contains the matched phrase, so facets derived from the excerpt keep the signal.
	pub fn find_excerpt(&self, phrases: &[&str]) -> Option<String> {
		let texts = self.summary.iter().chain(self.reviews.iter().map(|review| &review.text));

		for text in texts {
			let folded = fold_text(text);

			if let Some(phrase) = phrases.iter().find(|phrase| contains_phrase(&folded, phrase)) {
				return Some(excerpt_around(text.trim(), phrase));
			}
		}

		self.amenities.iter().filter(|(_, enabled)| **enabled).find_map(|(key, _)| {
			let folded = fold_text(&key.replace('_', " "));

			phrases
				.iter()
				.find(|phrase| contains_phrase(&folded, phrase))
				.map(|phrase| phrase.to_string())
		})
	}
}

/// The earliest word-aligned window of at most `MAX_EXCERPT_CHARS` that contains `phrase`.
fn excerpt_around(text: &str, phrase: &str) -> String {
	if text.chars().count() <= MAX_EXCERPT_CHARS {
		return text.to_string();
	}

	let words: Vec<(usize, usize)> = text
		.split_word_bound_indices()
		.filter(|(_, word)| word.chars().any(char::is_alphanumeric))
		.map(|(start, word)| (start, start + word.len()))
		.collect();

	for (index, &(start, _)) in words.iter().enumerate() {
		let mut end = start;

		for &(_, word_end) in &words[index..] {
			if text[start..word_end].chars().count() > MAX_EXCERPT_CHARS {
				break;
			}

			end = word_end;
		}

		if end > start && contains_phrase(&fold_text(&text[start..end]), phrase) {
			return text[start..end].to_string();
		}
	}

	truncate_chars(text, MAX_EXCERPT_CHARS)
}

fn truncate_chars(text: &str, max: usize) -> String {
	match text.char_indices().nth(max) {
		Some((end, _)) => text[..end].to_string(),
		None => text.to_string(),
	}
}
