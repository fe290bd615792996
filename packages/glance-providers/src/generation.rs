use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

/// One raw completion from the generation collaborator. `truncated` reflects
/// the provider's own finish reason, not any local budget.
#[derive(Clone, Debug)]
pub struct Completion {
	pub content: String,
	pub truncated: bool,
}

/// Sends one chat-completion request. No retries happen here: the caller
/// owns the retry budget and its backoff state.
pub async fn complete(
	cfg: &glance_config::GenerationProviderConfig,
	messages: &[Value],
) -> Result<Completion> {
	let client = Client::builder()
		.timeout(Duration::from_millis(cfg.timeout_ms))
		.build()
		.map_err(Error::from_reqwest)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": messages,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(Some(&cfg.api_key), &cfg.default_headers)?)
		.json(&body)
		.send()
		.await
		.map_err(Error::from_reqwest)?;
	let json: Value = crate::check_status(res)?.json().await.map_err(Error::from_reqwest)?;

	parse_completion(json)
}

fn parse_completion(json: Value) -> Result<Completion> {
	let choice = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.ok_or_else(|| Error::Payload {
			message: "Generation response is missing choices.".to_string(),
		})?;
	let content = choice
		.get("message")
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.ok_or_else(|| Error::Payload {
			message: "Generation choice is missing message content.".to_string(),
		})?;
	let truncated = choice
		.get("finish_reason")
		.and_then(|v| v.as_str())
		.map(|reason| reason == "length")
		.unwrap_or(false);

	Ok(Completion { content: content.to_string(), truncated })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_choice_content() {
		let json = serde_json::json!({
			"choices": [
				{ "message": { "content": "Open Settings [1]." }, "finish_reason": "stop" }
			]
		});
		let completion = parse_completion(json).expect("parse failed");

		assert_eq!(completion.content, "Open Settings [1].");
		assert!(!completion.truncated);
	}

	#[test]
	fn flags_length_cutoff() {
		let json = serde_json::json!({
			"choices": [
				{ "message": { "content": "Partial answer" }, "finish_reason": "length" }
			]
		});

		assert!(parse_completion(json).expect("parse failed").truncated);
	}

	#[test]
	fn missing_content_is_a_payload_error() {
		let json = serde_json::json!({ "choices": [{}] });
		let err = parse_completion(json).expect_err("must fail");

		assert!(!err.is_transient());
	}
}
