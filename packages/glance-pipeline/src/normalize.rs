use glance_domain::query::{self, Query};

use crate::{Error, GlancePipeline, Result};

impl GlancePipeline {
	/// Builds the immutable per-request [`Query`]. The embedding call may
	/// fail without failing normalization: the query then carries
	/// `dense_disabled = true` and dense retrieval degrades to empty.
	///
	/// Returns the query plus an optional degrade note for the diagnostics.
	pub(crate) async fn build_query(
		&self,
		raw_text: &str,
		ocr_text: Option<String>,
	) -> Result<(Query, Option<String>)> {
		let parts =
			query::normalize_parts(raw_text, ocr_text.as_deref()).ok_or_else(|| {
				Error::InvalidQuery {
					message: "Query text and screen text are both empty.".to_string(),
				}
			})?;
		let (embedding, degrade) = match self
			.providers
			.embedding
			.embed(&self.cfg.providers.embedding, &parts.normalized_text)
			.await
		{
			Ok(vector) =>
				if vector.len() == self.cfg.index.vector_dim as usize {
					(Some(vector), None)
				} else {
					(
						None,
						Some(format!(
							"Embedding dimension mismatch: got {}, expected {}.",
							vector.len(),
							self.cfg.index.vector_dim
						)),
					)
				},
			Err(err) => (None, Some(format!("Embedding provider unavailable: {err}"))),
		};

		if let Some(note) = degrade.as_deref() {
			tracing::warn!(note, "Dense retrieval disabled for this request.");
		}

		let query = Query {
			raw_text: raw_text.to_string(),
			ocr_text,
			normalized_text: parts.normalized_text,
			normalized_tokens: parts.normalized_tokens,
			dense_disabled: embedding.is_none(),
			embedding,
		};

		Ok((query, degrade))
	}
}
