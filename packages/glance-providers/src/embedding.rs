use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

/// Embeds a single query text. The response follows the OpenAI embeddings
/// shape; items are re-ordered by their `index` field before use.
pub async fn embed(cfg: &glance_config::EmbeddingProviderConfig, text: &str) -> Result<Vec<f32>> {
	let client = Client::builder()
		.timeout(Duration::from_millis(cfg.timeout_ms))
		.build()
		.map_err(Error::from_reqwest)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"input": [text],
		"dimensions": cfg.dimensions,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(Some(&cfg.api_key), &cfg.default_headers)?)
		.json(&body)
		.send()
		.await
		.map_err(Error::from_reqwest)?;
	let json: Value = crate::check_status(res)?.json().await.map_err(Error::from_reqwest)?;
	let mut vectors = parse_embedding_response(json)?;

	vectors.pop().ok_or_else(|| Error::Payload {
		message: "Embedding response contained no vectors.".to_string(),
	})
}

fn parse_embedding_response(json: Value) -> Result<Vec<Vec<f32>>> {
	let data = json.get("data").and_then(|v| v.as_array()).ok_or_else(|| Error::Payload {
		message: "Embedding response is missing the data array.".to_string(),
	})?;
	let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());

	for (fallback_index, item) in data.iter().enumerate() {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.map(|v| v as usize)
			.unwrap_or(fallback_index);
		let values = item.get("embedding").and_then(|v| v.as_array()).ok_or_else(|| {
			Error::Payload { message: "Embedding item is missing its vector.".to_string() }
		})?;
		let mut vector = Vec::with_capacity(values.len());

		for value in values {
			let number = value.as_f64().ok_or_else(|| Error::Payload {
				message: "Embedding vector values must be numeric.".to_string(),
			})?;

			vector.push(number as f32);
		}

		indexed.push((index, vector));
	}

	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, vector)| vector).collect())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn orders_vectors_by_index() {
		let json = serde_json::json!({
			"data": [
				{ "index": 1, "embedding": [2.0, 3.0] },
				{ "index": 0, "embedding": [0.5, 1.5] }
			]
		});
		let parsed = parse_embedding_response(json).expect("parse failed");

		assert_eq!(parsed, vec![vec![0.5, 1.5], vec![2.0, 3.0]]);
	}

	#[test]
	fn rejects_non_numeric_values() {
		let json = serde_json::json!({
			"data": [{ "index": 0, "embedding": ["oops"] }]
		});

		assert!(parse_embedding_response(json).is_err());
	}
}
