use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};
use unicode_segmentation::UnicodeSegmentation;

/// Folds free text into space-separated lowercase ASCII-ish words, padded with a leading and
/// trailing space so phrase lookups can match on whole words with `contains(" phrase ")`.
pub fn fold_text(raw: &str) -> String {
	let stripped: String = raw.nfkd().filter(|ch| !is_combining_mark(*ch)).collect();
	let lowered = stripped.to_lowercase();
	let mut out = String::with_capacity(lowered.len() + 2);

	out.push(' ');

	for word in lowered.unicode_words() {
		out.push_str(word);
		out.push(' ');
	}

	out
}

/// Returns true when `phrase` occurs in text produced by [`fold_text`] on word boundaries.
pub fn contains_phrase(folded: &str, phrase: &str) -> bool {
	let needle = fold_text(phrase);

	if needle.trim().is_empty() {
		return false;
	}

	folded.contains(needle.as_str())
}

/// Canonical token form for upstream type tags: "Play Centre" and "play-centre" both become
/// "play_centre".
pub fn normalize_token(raw: &str) -> String {
	fold_text(raw).split_whitespace().collect::<Vec<_>>().join("_")
}

/// Normalizes a free-text query for signatures: trimmed, lowercased, whitespace collapsed.
pub fn normalize_query(raw: &str) -> String {
	raw.split_whitespace().map(str::to_lowercase).collect::<Vec<_>>().join(" ")
}
