use std::{sync::OnceLock, time::Duration};

use regex::Regex;
use serde_json::Value;
use tokio::time::{self, Instant};

use crate::{ContextBundle, Error, GenerationResult, GlancePipeline, Result, Stage};

const MAX_BACKOFF_EXPONENT: u32 = 10;

fn citation_marker() -> &'static Regex {
	static MARKER: OnceLock<Regex> = OnceLock::new();

	MARKER.get_or_init(|| Regex::new(r"\[(\d+)\]").expect("Citation marker regex must compile."))
}

/// Renders the bundle into the generation prompt: the question (with any
/// demarcated screen text) plus numbered passage excerpts the model must
/// cite by `[n]`.
pub(crate) fn build_messages(bundle: &ContextBundle) -> Vec<Value> {
	let system_prompt = "You are a product support assistant. \
Answer the user's question using ONLY the numbered documentation excerpts. \
Cite every claim with the excerpt number in square brackets, like [1]. \
If the excerpts do not contain the answer, say that you cannot answer from \
the available documentation. Do not invent excerpt numbers.";
	let mut user_prompt = format!("Question:\n{}\n\nExcerpts:\n", bundle.query.normalized_text);

	for (idx, selected) in bundle.passages.iter().enumerate() {
		user_prompt.push_str(&format!("[{}] {}\n", idx + 1, selected.text));
	}

	vec![
		serde_json::json!({ "role": "system", "content": system_prompt }),
		serde_json::json!({ "role": "user", "content": user_prompt }),
	]
}

/// Resolves `[n]` markers against the bundle's 1-based excerpt numbering.
/// Markers that point outside the bundle are dropped rather than surfacing a
/// fabricated reference. Ids come back in order of first mention.
pub(crate) fn resolve_citations(answer: &str, bundle: &ContextBundle) -> Vec<String> {
	let mut out: Vec<String> = Vec::new();

	for capture in citation_marker().captures_iter(answer) {
		let Ok(number) = capture[1].parse::<usize>() else {
			continue;
		};
		let Some(selected) = number.checked_sub(1).and_then(|idx| bundle.passages.get(idx)) else {
			tracing::debug!(marker = number, "Dropping citation to an excerpt not in the bundle.");

			continue;
		};
		let id = selected.fused.passage.id.as_str();

		if !out.iter().any(|existing| existing.as_str() == id) {
			out.push(id.to_string());
		}
	}

	out
}

impl GlancePipeline {
	/// Drives the generation collaborator with bounded, strictly serial
	/// retries. Transient failures back off exponentially until the retry
	/// budget or the request deadline runs out; malformed responses fail
	/// immediately and are never retried.
	pub(crate) async fn generate_stage(
		&self,
		bundle: &ContextBundle,
		deadline: Instant,
		started: Instant,
	) -> Result<GenerationResult> {
		let cfg = &self.cfg.providers.generation;
		let messages = build_messages(bundle);
		let mut attempts = 0_u32;

		loop {
			if Instant::now() >= deadline {
				return Err(Error::DeadlineExceeded {
					stage: Stage::Generating,
					elapsed_ms: started.elapsed().as_millis() as u64,
				});
			}

			let attempt_started = Instant::now();

			attempts += 1;

			match self.providers.generation.complete(cfg, &messages).await {
				Ok(completion) => {
					let answer_text = completion.content.trim().to_string();

					if answer_text.is_empty() {
						return Err(Error::GenerationFormat {
							message: "Generation returned an empty answer.".to_string(),
						});
					}

					let cited_passage_ids = resolve_citations(&answer_text, bundle);

					return Ok(GenerationResult {
						answer_text,
						cited_passage_ids,
						generation_latency_ms: attempt_started.elapsed().as_millis() as u64,
						truncated: completion.truncated,
					});
				},
				Err(err) if err.is_transient() => {
					if attempts > cfg.max_retries {
						return Err(Error::GenerationUnavailable {
							attempts,
							message: err.to_string(),
						});
					}

					let exponent = (attempts - 1).min(MAX_BACKOFF_EXPONENT);
					let backoff =
						Duration::from_millis(cfg.backoff_base_ms.saturating_mul(1 << exponent));

					tracing::warn!(
						attempt = attempts,
						max_retries = cfg.max_retries,
						backoff_ms = backoff.as_millis() as u64,
						error = %err,
						"Generation attempt failed; backing off."
					);
					time::sleep(backoff).await;
				},
				Err(err) => {
					return Err(Error::GenerationFormat { message: err.to_string() });
				},
			}
		}
	}
}
