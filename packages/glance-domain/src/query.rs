use std::collections::HashSet;

use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

/// Marker prepended to OCR-derived text when it is merged into the query, so
/// downstream ranking and prompting can tell screen text from the question.
pub const SCREEN_TEXT_MARKER: &str = "[screen text]";

const MIN_TOKEN_CHARS: usize = 2;

/// The canonical per-request query. Immutable once constructed.
#[derive(Clone, Debug)]
pub struct Query {
	pub raw_text: String,
	pub ocr_text: Option<String>,
	pub normalized_text: String,
	pub normalized_tokens: Vec<String>,
	pub embedding: Option<Vec<f32>>,
	pub dense_disabled: bool,
}

/// The pure half of query normalization: NFKC-normalized merged text plus the
/// lowercase token sequence for the sparse lane.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryParts {
	pub normalized_text: String,
	pub normalized_tokens: Vec<String>,
}

/// Merges the raw question with optional OCR text and tokenizes for the
/// sparse lane. Returns `None` when both inputs are blank; the caller decides
/// whether that is an error.
pub fn normalize_parts(raw_text: &str, ocr_text: Option<&str>) -> Option<QueryParts> {
	let raw: String = raw_text.trim().nfkc().collect();
	let ocr: Option<String> = ocr_text
		.map(|text| text.trim().nfkc().collect::<String>())
		.filter(|text| !text.is_empty());

	if raw.is_empty() && ocr.is_none() {
		return None;
	}

	let normalized_text = match ocr.as_deref() {
		Some(ocr) if raw.is_empty() => format!("{SCREEN_TEXT_MARKER}\n{ocr}"),
		Some(ocr) => format!("{raw}\n\n{SCREEN_TEXT_MARKER}\n{ocr}"),
		None => raw,
	};
	let normalized_tokens = tokenize(&normalized_text);

	Some(QueryParts { normalized_text, normalized_tokens })
}

/// Lowercase word tokens in first-seen order, deduplicated, with one- and
/// zero-character tokens dropped. Deterministic for identical input.
pub fn tokenize(text: &str) -> Vec<String> {
	let mut out = Vec::new();
	let mut seen = HashSet::new();

	for word in text.unicode_words() {
		let token = word.to_lowercase();

		if token.chars().count() < MIN_TOKEN_CHARS {
			continue;
		}
		if seen.insert(token.clone()) {
			out.push(token);
		}
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_blank_input() {
		assert!(normalize_parts("", None).is_none());
		assert!(normalize_parts("   ", Some("  \t")).is_none());
	}

	#[test]
	fn ocr_only_queries_are_valid() {
		let parts = normalize_parts("", Some("Error 403: access denied")).expect("parts");

		assert!(parts.normalized_text.starts_with(SCREEN_TEXT_MARKER));
		assert!(parts.normalized_tokens.contains(&"403".to_string()));
	}

	#[test]
	fn demarcates_screen_text() {
		let parts = normalize_parts("why is this failing", Some("Quota exceeded")).expect("parts");

		assert!(parts.normalized_text.contains(SCREEN_TEXT_MARKER));
		assert!(parts.normalized_text.starts_with("why is this failing"));
	}

	#[test]
	fn tokens_are_lowercase_and_deduplicated() {
		let tokens = tokenize("Reset reset PASSWORD a reset");

		assert_eq!(tokens, vec!["reset".to_string(), "password".to_string()]);
	}
}
