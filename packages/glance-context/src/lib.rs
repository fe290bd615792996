pub use tokenizers::Tokenizer;
use unicode_segmentation::UnicodeSegmentation;

pub type TokenizerError = tokenizers::Error;

const TRIGRAM: usize = 3;

/// Estimates and enforces token budgets for context assembly. Uses a real
/// tokenizer when one is configured, otherwise a chars-per-token heuristic.
pub enum TokenBudgeter {
	Tokenizer(Box<Tokenizer>),
	Heuristic { chars_per_token: u32 },
}

impl TokenBudgeter {
	pub fn heuristic(chars_per_token: u32) -> Self {
		Self::Heuristic { chars_per_token: chars_per_token.max(1) }
	}

	pub fn from_pretrained(repo: &str) -> Result<Self, TokenizerError> {
		Ok(Self::Tokenizer(Box::new(Tokenizer::from_pretrained(repo, None)?)))
	}

	/// Token estimate for `text`. A tokenizer failure falls back to the
	/// heuristic so the estimate never under-counts to zero.
	pub fn estimate(&self, text: &str) -> u32 {
		match self {
			Self::Tokenizer(tokenizer) => match tokenizer.encode(text, false) {
				Ok(encoding) => encoding.len() as u32,
				Err(err) => {
					tracing::error!(error = %err, "Tokenizer failed to encode text.");

					heuristic_estimate(text, 4)
				},
			},
			Self::Heuristic { chars_per_token } => heuristic_estimate(text, *chars_per_token),
		}
	}

	/// Truncates `text` so its estimate fits within `max_tokens`. With a
	/// tokenizer this decodes the leading token ids; the heuristic cuts at
	/// the last word boundary inside the character allowance.
	pub fn truncate(&self, text: &str, max_tokens: u32) -> String {
		if max_tokens == 0 {
			return String::new();
		}

		match self {
			Self::Tokenizer(tokenizer) => {
				let encoding = match tokenizer.encode(text, false) {
					Ok(encoding) => encoding,
					Err(err) => {
						tracing::error!(error = %err, "Tokenizer failed to encode text for truncation.");

						return heuristic_truncate(text, max_tokens, 4);
					},
				};
				let ids = encoding.get_ids();

				if ids.len() as u32 <= max_tokens {
					return text.to_string();
				}

				let head = &ids[..max_tokens as usize];

				match tokenizer.decode(head, true) {
					Ok(decoded) => decoded,
					Err(err) => {
						tracing::error!(error = %err, "Tokenizer failed to decode truncated text.");

						heuristic_truncate(text, max_tokens, 4)
					},
				}
			},
			Self::Heuristic { chars_per_token } => {
				heuristic_truncate(text, max_tokens, *chars_per_token)
			},
		}
	}
}

fn heuristic_estimate(text: &str, chars_per_token: u32) -> u32 {
	let chars = text.chars().count() as u32;

	chars.div_ceil(chars_per_token.max(1))
}

fn heuristic_truncate(text: &str, max_tokens: u32, chars_per_token: u32) -> String {
	let max_chars = (max_tokens as usize).saturating_mul(chars_per_token.max(1) as usize);

	if text.chars().count() <= max_chars {
		return text.to_string();
	}

	let mut cut = 0_usize;

	for (offset, segment) in text.split_word_bound_indices() {
		let end = offset + segment.len();

		if text[..end].chars().count() > max_chars {
			break;
		}

		cut = end;
	}

	text[..cut].trim_end().to_string()
}

/// Word-trigram containment ratio in `[0, 1]`: shared trigrams over the
/// smaller trigram set. Texts with fewer than three tokens compare by
/// case-insensitive equality, so exact duplicates still collide.
pub fn trigram_overlap(lhs: &str, rhs: &str) -> f32 {
	let lhs_tokens = lowercase_words(lhs);
	let rhs_tokens = lowercase_words(rhs);

	if lhs_tokens.len() < TRIGRAM || rhs_tokens.len() < TRIGRAM {
		return if !lhs_tokens.is_empty() && lhs_tokens == rhs_tokens { 1.0 } else { 0.0 };
	}

	let lhs_grams: std::collections::HashSet<&[String]> =
		lhs_tokens.windows(TRIGRAM).collect();
	let rhs_grams: std::collections::HashSet<&[String]> =
		rhs_tokens.windows(TRIGRAM).collect();
	let shared = lhs_grams.intersection(&rhs_grams).count();
	let smaller = lhs_grams.len().min(rhs_grams.len()).max(1);

	shared as f32 / smaller as f32
}

fn lowercase_words(text: &str) -> Vec<String> {
	text.unicode_words().map(|word| word.to_lowercase()).collect()
}
