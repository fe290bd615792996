use std::time::Duration;

use tokio::time::{self as tokio_time, Instant};

use glance_domain::fusion::{self, FusionParams};

use crate::{
	Error, FormatTarget, GlancePipeline, OutcomeError, OutcomeStatus, PipelineOutcome,
	RetrieverLane, Stage, StageDiagnostic, StageStatus, format,
};

/// One caller request. `ocr_text` wins over `image`; when only an image is
/// supplied the OCR collaborator is asked for the screen text, and its
/// failure degrades the request instead of blocking it.
#[derive(Clone, Debug, Default)]
pub struct AnswerRequest {
	pub query: String,
	pub ocr_text: Option<String>,
	pub image: Option<Vec<u8>>,
	pub format: Option<String>,
}

struct RequestTrace {
	request_id: uuid::Uuid,
	created_at: time::OffsetDateTime,
	started: Instant,
	diagnostics: Vec<StageDiagnostic>,
}

impl RequestTrace {
	fn new() -> Self {
		Self {
			request_id: uuid::Uuid::new_v4(),
			created_at: time::OffsetDateTime::now_utc(),
			started: Instant::now(),
			diagnostics: Vec::new(),
		}
	}

	fn record(&mut self, stage: Stage, status: StageStatus, since: Instant, error: Option<String>) {
		self.diagnostics.push(StageDiagnostic {
			stage,
			status,
			elapsed_ms: since.elapsed().as_millis() as u64,
			error,
		});
	}

	fn abort(mut self, stage: Stage, err: Error) -> PipelineOutcome {
		let elapsed = self.started.elapsed();

		tracing::warn!(
			request_id = %self.request_id,
			stage = stage.as_str(),
			error = %err,
			elapsed_ms = elapsed.as_millis() as u64,
			"Pipeline aborted."
		);
		self.diagnostics.push(StageDiagnostic {
			stage: Stage::Aborted,
			status: StageStatus::Failed,
			elapsed_ms: elapsed.as_millis() as u64,
			error: Some(err.to_string()),
		});

		PipelineOutcome {
			request_id: self.request_id,
			status: OutcomeStatus::Failed,
			result: None,
			answer: None,
			error: Some(OutcomeError { stage, kind: err.kind(), message: err.to_string() }),
			diagnostics: self.diagnostics,
			created_at: self.created_at,
		}
	}

	fn finish(
		self,
		status: OutcomeStatus,
		result: Option<crate::GenerationResult>,
		answer: Option<crate::FormattedAnswer>,
	) -> PipelineOutcome {
		PipelineOutcome {
			request_id: self.request_id,
			status,
			result,
			answer,
			error: None,
			diagnostics: self.diagnostics,
			created_at: self.created_at,
		}
	}

	fn check_deadline(&self, deadline: Instant, stage: Stage) -> Option<Error> {
		(Instant::now() >= deadline).then(|| Error::DeadlineExceeded {
			stage,
			elapsed_ms: self.started.elapsed().as_millis() as u64,
		})
	}
}

impl GlancePipeline {
	/// Runs one request through the full pipeline. Always returns an outcome:
	/// fatal errors surface as `status = failed` with the offending stage and
	/// error kind, never as a fabricated or placeholder answer.
	pub async fn answer(&self, req: AnswerRequest) -> PipelineOutcome {
		let mut trace = RequestTrace::new();
		let deadline = trace.started + Duration::from_millis(self.cfg.pipeline.deadline_ms);
		let target = match req.format.as_deref() {
			None => FormatTarget::Structured,
			Some(raw) => match FormatTarget::parse(raw) {
				Ok(target) => target,
				Err(err) => return trace.abort(Stage::Formatting, err),
			},
		};

		// Normalizing: OCR intake, query merge, embedding (degradable).
		let stage_started = Instant::now();
		let (ocr_text, ocr_note) = self.screen_text(&req).await;
		let (query, embed_note) = match self.build_query(&req.query, ocr_text).await {
			Ok(pair) => pair,
			Err(err) => {
				trace.record(
					Stage::Normalizing,
					StageStatus::Failed,
					stage_started,
					Some(err.to_string()),
				);

				return trace.abort(Stage::Normalizing, err);
			},
		};
		let normalize_note = join_notes(ocr_note, embed_note);

		trace.record(
			Stage::Normalizing,
			if normalize_note.is_some() { StageStatus::Degraded } else { StageStatus::Ok },
			stage_started,
			normalize_note,
		);

		if let Some(err) = trace.check_deadline(deadline, Stage::Normalizing) {
			return trace.abort(Stage::Normalizing, err);
		}

		// Retrieving: both lanes concurrently, joined under the deadline.
		let stage_started = Instant::now();
		let join = self.retrieve_stage(&query, deadline).await;

		for (lane, outcome) in
			[(RetrieverLane::Dense, &join.dense), (RetrieverLane::Sparse, &join.sparse)]
		{
			let (status, error) = match (outcome.error(), outcome.timed_out()) {
				(Some(message), _) => {
					let err =
						Error::RetrieverUnavailable { lane, message: message.to_string() };

					(StageStatus::Degraded, Some(err.to_string()))
				},
				(None, true) => (
					StageStatus::Degraded,
					Some(format!("Retriever {lane} missed the request deadline.")),
				),
				(None, false) => (StageStatus::Ok, None),
			};

			trace.record(Stage::Retrieving, status, stage_started, error);
		}

		if let Some(err) = trace.check_deadline(deadline, Stage::Retrieving) {
			return trace.abort(Stage::Retrieving, err);
		}

		// Fusing: rank-based merge of whatever the lanes contributed.
		let stage_started = Instant::now();
		let params = FusionParams {
			dense_weight: self.cfg.fusion.dense_weight,
			sparse_weight: self.cfg.fusion.sparse_weight,
			rank_constant: self.cfg.fusion.rank_constant,
			min_score: self.cfg.fusion.min_score,
			k_final: self.cfg.fusion.k_final,
		};
		let fused = fusion::fuse(join.dense.passages(), join.sparse.passages(), &params);
		let lane_lost = query.dense_disabled
			|| join.dense.error().is_some()
			|| join.dense.timed_out()
			|| join.sparse.error().is_some()
			|| join.sparse.timed_out();

		trace.record(Stage::Fusing, StageStatus::Ok, stage_started, None);

		if fused.is_empty() {
			// A valid outcome, not an error. Partial only when an evidence
			// lane was lost, so the caller can tell "nothing matched" from
			// "we could not look everywhere".
			trace.record(Stage::AssemblingContext, StageStatus::Skipped, stage_started, None);
			trace.record(Stage::Generating, StageStatus::Skipped, stage_started, None);
			trace.record(Stage::Formatting, StageStatus::Skipped, stage_started, None);

			let status =
				if lane_lost { OutcomeStatus::Partial } else { OutcomeStatus::Succeeded };

			tracing::info!(
				request_id = %trace.request_id,
				status = ?status,
				"No relevant passages found."
			);

			return trace.finish(status, None, None);
		}
		if let Some(err) = trace.check_deadline(deadline, Stage::Fusing) {
			return trace.abort(Stage::Fusing, err);
		}

		// AssemblingContext: budgeted, non-redundant selection.
		let stage_started = Instant::now();
		let bundle = self.assemble_stage(query, fused);

		trace.record(
			Stage::AssemblingContext,
			if bundle.truncated { StageStatus::Degraded } else { StageStatus::Ok },
			stage_started,
			bundle.truncated.then(|| "Head passage truncated to fit the token budget.".to_string()),
		);

		if let Some(err) = trace.check_deadline(deadline, Stage::AssemblingContext) {
			return trace.abort(Stage::AssemblingContext, err);
		}

		// Generating: serial bounded retries, bounded by the deadline.
		let stage_started = Instant::now();
		let result = match tokio_time::timeout_at(
			deadline,
			self.generate_stage(&bundle, deadline, trace.started),
		)
		.await
		{
			Ok(Ok(result)) => result,
			Ok(Err(err)) => {
				trace.record(
					Stage::Generating,
					StageStatus::Failed,
					stage_started,
					Some(err.to_string()),
				);

				return trace.abort(Stage::Generating, err);
			},
			Err(_) => {
				let err = Error::DeadlineExceeded {
					stage: Stage::Generating,
					elapsed_ms: trace.started.elapsed().as_millis() as u64,
				};

				trace.record(
					Stage::Generating,
					StageStatus::Failed,
					stage_started,
					Some(err.to_string()),
				);

				return trace.abort(Stage::Generating, err);
			},
		};

		trace.record(Stage::Generating, StageStatus::Ok, stage_started, None);

		// Formatting: pure, so no deadline check between it and Done.
		let stage_started = Instant::now();
		let formatted =
			format::format(&result, &bundle, self.cfg.context.excerpt_chars, target);

		trace.record(Stage::Formatting, StageStatus::Ok, stage_started, None);

		let status = if lane_lost { OutcomeStatus::Partial } else { OutcomeStatus::Succeeded };

		tracing::info!(
			request_id = %trace.request_id,
			status = ?status,
			cited = result.cited_passage_ids.len(),
			context_tokens = bundle.total_token_estimate,
			"Answer produced."
		);

		trace.finish(status, Some(result), Some(formatted))
	}

	/// OCR intake. Supplied screen text wins; otherwise an attached image is
	/// sent to the OCR collaborator. Failure or empty extraction degrades to
	/// "no screen text" with a note, never a blocked request.
	async fn screen_text(&self, req: &AnswerRequest) -> (Option<String>, Option<String>) {
		let supplied =
			req.ocr_text.as_deref().map(str::trim).filter(|text| !text.is_empty());

		if let Some(text) = supplied {
			return (Some(text.to_string()), None);
		}

		let Some(image) = req.image.as_deref() else {
			return (None, None);
		};

		match self.providers.ocr.extract(&self.cfg.providers.ocr, image).await {
			Ok(extraction) => {
				let text = extraction.joined_text(self.cfg.providers.ocr.min_confidence);

				if text.is_empty() {
					(None, Some("OCR found no text in the shared image.".to_string()))
				} else {
					(Some(text), None)
				}
			},
			Err(err) => {
				tracing::warn!(error = %err, "OCR extraction failed; continuing without screen text.");

				(None, Some(format!("OCR extraction failed: {err}")))
			},
		}
	}
}

fn join_notes(lhs: Option<String>, rhs: Option<String>) -> Option<String> {
	match (lhs, rhs) {
		(Some(lhs), Some(rhs)) => Some(format!("{lhs} {rhs}")),
		(Some(note), None) | (None, Some(note)) => Some(note),
		(None, None) => None,
	}
}
