use std::time::Duration;

use reqwest::Client;

use crate::{Error, Result};

/// One recognized word with its confidence and bounding box, as reported by
/// the OCR collaborator.
#[derive(Clone, Debug, serde::Deserialize)]
pub struct OcrWord {
	pub text: String,
	pub confidence: f32,
	#[serde(default)]
	pub left: i32,
	#[serde(default)]
	pub top: i32,
	#[serde(default)]
	pub width: i32,
	#[serde(default)]
	pub height: i32,
}

#[derive(Clone, Debug, Default, serde::Deserialize)]
pub struct OcrExtraction {
	pub words: Vec<OcrWord>,
}

impl OcrExtraction {
	/// Joins recognized words into query-ready screen text, keeping only
	/// words at or above the confidence floor. Empty output is valid.
	pub fn joined_text(&self, min_confidence: f32) -> String {
		let mut out = String::new();

		for word in &self.words {
			if word.confidence < min_confidence || word.text.trim().is_empty() {
				continue;
			}
			if !out.is_empty() {
				out.push(' ');
			}

			out.push_str(word.text.trim());
		}

		out
	}
}

/// Ships raw image bytes to the OCR collaborator and parses its word-level
/// response. Absence of text is not an error here; blocking decisions belong
/// to the pipeline.
pub async fn extract(cfg: &glance_config::OcrProviderConfig, image: &[u8]) -> Result<OcrExtraction> {
	let client = Client::builder()
		.timeout(Duration::from_millis(cfg.timeout_ms))
		.build()
		.map_err(Error::from_reqwest)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let res = client
		.post(url)
		.headers(crate::auth_headers(cfg.api_key.as_deref(), &serde_json::Map::new())?)
		.header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
		.body(image.to_vec())
		.send()
		.await
		.map_err(Error::from_reqwest)?;

	crate::check_status(res)?
		.json::<OcrExtraction>()
		.await
		.map_err(|err| Error::Payload { message: err.to_string() })
}

#[cfg(test)]
mod tests {
	use super::*;

	fn word(text: &str, confidence: f32) -> OcrWord {
		OcrWord { text: text.to_string(), confidence, left: 0, top: 0, width: 10, height: 10 }
	}

	#[test]
	fn joins_confident_words_in_order() {
		let extraction = OcrExtraction {
			words: vec![word("Quota", 96.0), word("", 99.0), word("exceeded", 91.5)],
		};

		assert_eq!(extraction.joined_text(0.0), "Quota exceeded");
	}

	#[test]
	fn drops_words_below_the_confidence_floor() {
		let extraction = OcrExtraction { words: vec![word("noise", 12.0), word("signal", 88.0)] };

		assert_eq!(extraction.joined_text(50.0), "signal");
	}

	#[test]
	fn empty_extraction_joins_to_empty_text() {
		assert_eq!(OcrExtraction::default().joined_text(0.0), "");
	}
}
