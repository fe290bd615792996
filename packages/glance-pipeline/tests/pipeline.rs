use std::{sync::Arc, time::Duration};

use glance_pipeline::{
	AnswerRequest, ErrorKind, FormattedAnswer, GlancePipeline, Indexes, OutcomeStatus, Providers,
	Stage, StageStatus,
};
use glance_providers::{Completion, OcrExtraction, OcrWord};
use glance_testkit::{
	FailingDenseIndex, FailingEmbedding, FailingOcr, FailingSparseIndex, ScriptedGeneration,
	StallingDenseIndex, StallingSparseIndex, StaticDenseIndex, StaticSparseIndex, StubEmbedding,
	StubOcr, passage, test_config,
};

fn embedding_ok() -> Arc<StubEmbedding> {
	Arc::new(StubEmbedding { vector: vec![0.1, 0.2, 0.3, 0.4] })
}

fn ocr_none() -> Arc<StubOcr> {
	Arc::new(StubOcr { extraction: OcrExtraction::default() })
}

fn build_pipeline(
	cfg: glance_config::Config,
	indexes: Indexes,
	generation: Arc<ScriptedGeneration>,
) -> GlancePipeline {
	let providers = Providers { embedding: embedding_ok(), generation, ocr: ocr_none() };

	GlancePipeline::with_parts(cfg, indexes, providers)
}

fn ask(query: &str) -> AnswerRequest {
	AnswerRequest { query: query.to_string(), ..Default::default() }
}

#[tokio::test]
async fn fused_order_prefers_passages_seen_by_both_retrievers() {
	// Dense [P1, P2, P3], sparse [P2, P4]: P2 carries both rank terms and
	// must fuse to the top; a two-passage budget then selects P2 and the
	// next-highest non-overlapping passage.
	let p1 = passage("p1", "doc-a", "Open the account settings page from the avatar menu.");
	let p2 = passage("p2", "doc-a", "Use the reset password link on the sign-in screen.");
	let p3 = passage("p3", "doc-b", "Billing invoices are available to workspace owners.");
	let p4 = passage("p4", "doc-c", "Contact support when two-factor codes stop arriving.");
	let mut cfg = test_config();

	// Two ~13-token passages fit; a third would exceed the budget.
	cfg.context.token_budget = 27;

	let generation = Arc::new(ScriptedGeneration::answering(
		"Use the reset link [1]; settings are under your avatar [2].",
	));
	let pipeline = build_pipeline(
		cfg,
		Indexes {
			dense: Arc::new(StaticDenseIndex {
				passages: vec![p1.clone(), p2.clone(), p3.clone()],
			}),
			sparse: Arc::new(StaticSparseIndex { passages: vec![p2.clone(), p4.clone()] }),
		},
		generation,
	);
	let outcome = pipeline.answer(ask("how do I reset my password")).await;

	assert_eq!(outcome.status, OutcomeStatus::Succeeded);

	let result = outcome.result.expect("Expected a generation result.");

	// Excerpt [1] is the fused head, which must be P2.
	assert_eq!(result.cited_passage_ids, vec!["p2".to_string(), "p1".to_string()]);

	let Some(FormattedAnswer::Structured { document }) = outcome.answer else {
		panic!("Expected a structured answer.");
	};

	assert_eq!(document.citations.len(), 2);
	assert_eq!(document.citations[0].passage_id, "p2");
	assert!(!document.truncated);
}

#[tokio::test]
async fn no_contribution_paths_yield_an_empty_succeeded_outcome() {
	// Punctuation-only query: no sparse tokens; embedding provider down: no
	// dense lane. Fusion has nothing to work with and that is a valid result.
	let generation = Arc::new(ScriptedGeneration::answering("unused"));
	let providers = Providers {
		embedding: Arc::new(FailingEmbedding),
		generation: generation.clone(),
		ocr: ocr_none(),
	};
	let pipeline = GlancePipeline::with_parts(
		test_config(),
		Indexes {
			dense: Arc::new(StaticDenseIndex { passages: vec![passage("p1", "doc", "text")] }),
			sparse: Arc::new(StaticSparseIndex { passages: Vec::new() }),
		},
		providers,
	);
	let outcome = pipeline.answer(ask("??!")).await;

	// The embedding lane was lost to an error, so the outcome is partial
	// rather than a clean "nothing matched".
	assert_eq!(outcome.status, OutcomeStatus::Partial);
	assert!(outcome.result.is_none());
	assert!(outcome.answer.is_none());
	assert!(outcome.error.is_none());
	assert_eq!(generation.call_count(), 0);
}

#[tokio::test]
async fn genuinely_empty_retrieval_succeeds_with_no_result() {
	let generation = Arc::new(ScriptedGeneration::answering("unused"));
	let pipeline = build_pipeline(
		test_config(),
		Indexes {
			dense: Arc::new(StaticDenseIndex { passages: Vec::new() }),
			sparse: Arc::new(StaticSparseIndex { passages: Vec::new() }),
		},
		generation.clone(),
	);
	let outcome = pipeline.answer(ask("anything about exports")).await;

	assert_eq!(outcome.status, OutcomeStatus::Succeeded);
	assert!(outcome.result.is_none());
	assert_eq!(generation.call_count(), 0);
	assert!(
		outcome
			.diagnostics
			.iter()
			.any(|d| d.stage == Stage::Generating && d.status == StageStatus::Skipped)
	);
}

#[tokio::test]
async fn one_failed_retriever_degrades_instead_of_aborting() {
	let p = passage("p1", "doc-a", "Use the reset password link on the sign-in screen.");
	let generation = Arc::new(ScriptedGeneration::answering("Reset it via the link [1]."));
	let pipeline = build_pipeline(
		test_config(),
		Indexes {
			dense: Arc::new(FailingDenseIndex),
			sparse: Arc::new(StaticSparseIndex { passages: vec![p] }),
		},
		generation,
	);
	let outcome = pipeline.answer(ask("how do I reset my password")).await;

	assert_eq!(outcome.status, OutcomeStatus::Partial);

	let result = outcome.result.expect("Expected an answer from the surviving lane.");

	assert_eq!(result.cited_passage_ids, vec!["p1".to_string()]);
	assert!(outcome.diagnostics.iter().any(|d| {
		d.stage == Stage::Retrieving
			&& d.status == StageStatus::Degraded
			&& d.error.as_deref().map(|e| e.contains("dense")).unwrap_or(false)
	}));
}

#[tokio::test]
async fn both_retrievers_failing_is_partial_not_fatal() {
	let generation = Arc::new(ScriptedGeneration::answering("unused"));
	let pipeline = build_pipeline(
		test_config(),
		Indexes { dense: Arc::new(FailingDenseIndex), sparse: Arc::new(FailingSparseIndex) },
		generation.clone(),
	);
	let outcome = pipeline.answer(ask("how do I reset my password")).await;

	assert_eq!(outcome.status, OutcomeStatus::Partial);
	assert!(outcome.result.is_none());
	assert!(outcome.error.is_none());
	assert_eq!(generation.call_count(), 0);
}

#[tokio::test]
async fn deadline_expiry_mid_retrieval_fails_with_deadline_exceeded() {
	let p = passage("p1", "doc-a", "Some passage text.");
	let mut cfg = test_config();

	cfg.pipeline.deadline_ms = 50;

	let generation = Arc::new(ScriptedGeneration::answering("unused"));
	let pipeline = build_pipeline(
		cfg,
		Indexes {
			dense: Arc::new(StallingDenseIndex {
				delay: Duration::from_millis(500),
				passages: vec![p.clone()],
			}),
			sparse: Arc::new(StallingSparseIndex {
				delay: Duration::from_millis(500),
				passages: vec![p],
			}),
		},
		generation.clone(),
	);
	let outcome = pipeline.answer(ask("how do I reset my password")).await;

	assert_eq!(outcome.status, OutcomeStatus::Failed);

	let error = outcome.error.expect("Expected a pipeline error.");

	assert_eq!(error.kind, ErrorKind::DeadlineExceeded);
	assert_eq!(error.stage, Stage::Retrieving);
	assert!(outcome.result.is_none(), "No answer may be fabricated from incomplete data.");
	assert_eq!(generation.call_count(), 0);
}

#[tokio::test]
async fn generation_retries_exactly_the_configured_count_on_timeouts() {
	let p = passage("p1", "doc-a", "Use the reset password link on the sign-in screen.");
	let generation = Arc::new(ScriptedGeneration::new(vec![
		Err(glance_providers::Error::Timeout),
		Err(glance_providers::Error::Timeout),
		Err(glance_providers::Error::Timeout),
	]));
	let pipeline = build_pipeline(
		test_config(),
		Indexes {
			dense: Arc::new(StaticDenseIndex { passages: vec![p.clone()] }),
			sparse: Arc::new(StaticSparseIndex { passages: vec![p] }),
		},
		generation.clone(),
	);
	let outcome = pipeline.answer(ask("how do I reset my password")).await;

	// max_retries = 2 in the fixture: one initial attempt plus two retries.
	assert_eq!(generation.call_count(), 3);
	assert_eq!(outcome.status, OutcomeStatus::Failed);
	assert_eq!(outcome.error.expect("error").kind, ErrorKind::GenerationUnavailable);
}

#[tokio::test]
async fn malformed_generation_responses_are_not_retried() {
	let p = passage("p1", "doc-a", "Use the reset password link on the sign-in screen.");
	let generation = Arc::new(ScriptedGeneration::new(vec![Err(
		glance_providers::Error::Payload { message: "missing choices".to_string() },
	)]));
	let pipeline = build_pipeline(
		test_config(),
		Indexes {
			dense: Arc::new(StaticDenseIndex { passages: vec![p.clone()] }),
			sparse: Arc::new(StaticSparseIndex { passages: vec![p] }),
		},
		generation.clone(),
	);
	let outcome = pipeline.answer(ask("how do I reset my password")).await;

	assert_eq!(generation.call_count(), 1);
	assert_eq!(outcome.status, OutcomeStatus::Failed);
	assert_eq!(outcome.error.expect("error").kind, ErrorKind::GenerationFormat);
}

#[tokio::test]
async fn transient_failure_then_success_recovers() {
	let p = passage("p1", "doc-a", "Use the reset password link on the sign-in screen.");
	let generation = Arc::new(ScriptedGeneration::new(vec![
		Err(glance_providers::Error::Status { status: 429 }),
		Ok(Completion { content: "Use the link [1].".to_string(), truncated: false }),
	]));
	let pipeline = build_pipeline(
		test_config(),
		Indexes {
			dense: Arc::new(StaticDenseIndex { passages: vec![p.clone()] }),
			sparse: Arc::new(StaticSparseIndex { passages: vec![p] }),
		},
		generation.clone(),
	);
	let outcome = pipeline.answer(ask("how do I reset my password")).await;

	assert_eq!(generation.call_count(), 2);
	assert_eq!(outcome.status, OutcomeStatus::Succeeded);
	assert_eq!(
		outcome.result.expect("result").cited_passage_ids,
		vec!["p1".to_string()]
	);
}

#[tokio::test]
async fn oversized_head_passage_is_truncated_into_the_budget() {
	let long_text = "Reset your password from the sign-in screen. ".repeat(60);
	let p = passage("p1", "doc-a", &long_text);
	let mut cfg = test_config();

	cfg.context.token_budget = 40;

	let generation = Arc::new(ScriptedGeneration::answering("Follow the steps [1]."));
	let pipeline = build_pipeline(
		cfg,
		Indexes {
			dense: Arc::new(StaticDenseIndex { passages: vec![p.clone()] }),
			sparse: Arc::new(StaticSparseIndex { passages: vec![p] }),
		},
		generation,
	);
	let outcome = pipeline.answer(ask("how do I reset my password")).await;

	assert_eq!(outcome.status, OutcomeStatus::Succeeded);

	let Some(FormattedAnswer::Structured { document }) = outcome.answer else {
		panic!("Expected a structured answer.");
	};

	assert!(document.truncated);
	assert_eq!(document.citations.len(), 1);
	assert!(
		outcome
			.diagnostics
			.iter()
			.any(|d| d.stage == Stage::AssemblingContext && d.status == StageStatus::Degraded)
	);
}

#[tokio::test]
async fn near_duplicate_passages_are_excluded_even_when_they_fit() {
	let p1 = passage("p1", "doc-a", "Use the reset password link on the sign-in screen.");
	let p2 = passage("p2", "doc-b", "Use the reset password link on the sign-in screen today.");
	let p3 = passage("p3", "doc-c", "Billing invoices are available to workspace owners.");
	let generation =
		Arc::new(ScriptedGeneration::answering("Use the link [1]; owners see invoices [2]."));
	let pipeline = build_pipeline(
		test_config(),
		Indexes {
			dense: Arc::new(StaticDenseIndex { passages: vec![p1, p2, p3] }),
			sparse: Arc::new(StaticSparseIndex { passages: Vec::new() }),
		},
		generation,
	);
	let outcome = pipeline.answer(ask("how do I reset my password")).await;
	let result = outcome.result.expect("result");

	// Excerpt [2] must be P3: the near-duplicate P2 was rejected for overlap
	// even though the budget had room for it.
	assert_eq!(result.cited_passage_ids, vec!["p1".to_string(), "p3".to_string()]);
}

#[tokio::test]
async fn citations_to_unknown_excerpts_are_dropped() {
	let p = passage("p1", "doc-a", "Use the reset password link on the sign-in screen.");
	let generation =
		Arc::new(ScriptedGeneration::answering("Use the link [1], see also [7] and [12]."));
	let pipeline = build_pipeline(
		test_config(),
		Indexes {
			dense: Arc::new(StaticDenseIndex { passages: vec![p.clone()] }),
			sparse: Arc::new(StaticSparseIndex { passages: vec![p] }),
		},
		generation,
	);
	let outcome = pipeline.answer(ask("how do I reset my password")).await;
	let result = outcome.result.expect("result");

	assert_eq!(result.cited_passage_ids, vec!["p1".to_string()]);
}

#[tokio::test]
async fn blank_query_without_screen_text_is_an_invalid_query() {
	let generation = Arc::new(ScriptedGeneration::answering("unused"));
	let pipeline = build_pipeline(
		test_config(),
		Indexes {
			dense: Arc::new(StaticDenseIndex { passages: Vec::new() }),
			sparse: Arc::new(StaticSparseIndex { passages: Vec::new() }),
		},
		generation,
	);
	let outcome = pipeline.answer(ask("   ")).await;

	assert_eq!(outcome.status, OutcomeStatus::Failed);

	let error = outcome.error.expect("error");

	assert_eq!(error.kind, ErrorKind::InvalidQuery);
	assert_eq!(error.stage, Stage::Normalizing);
}

#[tokio::test]
async fn unknown_format_target_fails_fast() {
	let generation = Arc::new(ScriptedGeneration::answering("unused"));
	let pipeline = build_pipeline(
		test_config(),
		Indexes {
			dense: Arc::new(StaticDenseIndex { passages: Vec::new() }),
			sparse: Arc::new(StaticSparseIndex { passages: Vec::new() }),
		},
		generation.clone(),
	);
	let outcome = pipeline
		.answer(AnswerRequest {
			query: "how do I reset my password".to_string(),
			format: Some("yaml".to_string()),
			..Default::default()
		})
		.await;

	assert_eq!(outcome.status, OutcomeStatus::Failed);
	assert_eq!(outcome.error.expect("error").kind, ErrorKind::InvalidFormatTarget);
	assert_eq!(generation.call_count(), 0);
}

#[tokio::test]
async fn ocr_text_from_an_image_feeds_the_query() {
	let p = passage("p1", "doc-a", "Quota errors clear after upgrading the workspace plan.");
	let word = |text: &str| OcrWord {
		text: text.to_string(),
		confidence: 95.0,
		left: 0,
		top: 0,
		width: 10,
		height: 10,
	};
	let generation = Arc::new(ScriptedGeneration::answering("Upgrade the plan [1]."));
	let providers = Providers {
		embedding: embedding_ok(),
		generation: generation.clone(),
		ocr: Arc::new(StubOcr {
			extraction: OcrExtraction { words: vec![word("Quota"), word("exceeded")] },
		}),
	};
	let pipeline = GlancePipeline::with_parts(
		test_config(),
		Indexes {
			dense: Arc::new(StaticDenseIndex { passages: vec![p.clone()] }),
			sparse: Arc::new(StaticSparseIndex { passages: vec![p] }),
		},
		providers,
	);
	let outcome = pipeline
		.answer(AnswerRequest {
			query: "what does this error mean".to_string(),
			image: Some(vec![0xFF, 0xD8, 0xFF]),
			..Default::default()
		})
		.await;

	assert_eq!(outcome.status, OutcomeStatus::Succeeded);
	assert_eq!(outcome.result.expect("result").cited_passage_ids, vec!["p1".to_string()]);
}

#[tokio::test]
async fn ocr_failure_degrades_instead_of_blocking() {
	let p = passage("p1", "doc-a", "Use the reset password link on the sign-in screen.");
	let generation = Arc::new(ScriptedGeneration::answering("Use the link [1]."));
	let providers = Providers {
		embedding: embedding_ok(),
		generation: generation.clone(),
		ocr: Arc::new(FailingOcr),
	};
	let pipeline = GlancePipeline::with_parts(
		test_config(),
		Indexes {
			dense: Arc::new(StaticDenseIndex { passages: vec![p.clone()] }),
			sparse: Arc::new(StaticSparseIndex { passages: vec![p] }),
		},
		providers,
	);
	let outcome = pipeline
		.answer(AnswerRequest {
			query: "how do I reset my password".to_string(),
			image: Some(vec![0xFF, 0xD8, 0xFF]),
			..Default::default()
		})
		.await;

	assert_eq!(outcome.status, OutcomeStatus::Succeeded);
	assert!(outcome.result.is_some());
	assert!(outcome.diagnostics.iter().any(|d| {
		d.stage == Stage::Normalizing
			&& d.status == StageStatus::Degraded
			&& d.error.as_deref().map(|e| e.contains("OCR")).unwrap_or(false)
	}));
}

#[tokio::test]
async fn markup_target_renders_sources() {
	let p = passage("p1", "doc-a", "Use the reset password link on the sign-in screen.");
	let generation = Arc::new(ScriptedGeneration::answering("Use the link [1]."));
	let pipeline = build_pipeline(
		test_config(),
		Indexes {
			dense: Arc::new(StaticDenseIndex { passages: vec![p.clone()] }),
			sparse: Arc::new(StaticSparseIndex { passages: vec![p] }),
		},
		generation,
	);
	let outcome = pipeline
		.answer(AnswerRequest {
			query: "how do I reset my password".to_string(),
			format: Some("markup".to_string()),
			..Default::default()
		})
		.await;
	let Some(FormattedAnswer::Markup { markdown }) = outcome.answer else {
		panic!("Expected a markup answer.");
	};

	assert!(markdown.contains("## Sources"));
	assert!(markdown.contains("p1"));
	assert!(markdown.contains("doc-a"));
}
