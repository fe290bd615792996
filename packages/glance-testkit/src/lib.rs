//! In-process stand-ins for the pipeline's external collaborators, plus a
//! ready-made config fixture. Everything here is deterministic so retrieval
//! and orchestration behavior can be asserted exactly.

use std::{
	collections::VecDeque,
	sync::{
		Mutex,
		atomic::{AtomicU32, Ordering},
	},
	time::Duration,
};

use serde_json::{Map, Value};

use glance_config::{
	Config, Context, EmbeddingProviderConfig, Fusion, GenerationProviderConfig, Index,
	OcrProviderConfig, Pipeline, Providers, Retrieval, Service,
};
use glance_domain::passage::PassageRef;
use glance_pipeline::{
	BoxFuture, DenseIndex, EmbeddingProvider, GenerationProvider, OcrProvider, SparseIndex,
};
use glance_providers::{Completion, OcrExtraction};

pub fn passage(id: &str, document_id: &str, text: &str) -> PassageRef {
	PassageRef {
		id: id.to_string(),
		source_document_id: document_id.to_string(),
		text: text.to_string(),
		start_offset: 0,
		end_offset: text.len() as u32,
		score: 0.0,
	}
}

/// A config fixture that validates and keeps every knob small enough for
/// fast tests. Adjust fields per test instead of building from scratch.
pub fn test_config() -> Config {
	let cfg = Config {
		service: Service {
			http_bind: "127.0.0.1:0".to_string(),
			log_level: "info".to_string(),
			bind_localhost_only: true,
		},
		index: Index {
			url: "http://127.0.0.1:6334".to_string(),
			collection: "product_docs_test".to_string(),
			vector_dim: 4,
		},
		providers: Providers {
			embedding: EmbeddingProviderConfig {
				provider_id: "stub".to_string(),
				api_base: "http://127.0.0.1:9".to_string(),
				api_key: "test-key".to_string(),
				path: "/v1/embeddings".to_string(),
				model: "stub-embed".to_string(),
				dimensions: 4,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			generation: GenerationProviderConfig {
				provider_id: "stub".to_string(),
				api_base: "http://127.0.0.1:9".to_string(),
				api_key: "test-key".to_string(),
				path: "/v1/chat/completions".to_string(),
				model: "stub-answer".to_string(),
				temperature: 0.0,
				timeout_ms: 1_000,
				max_retries: 2,
				backoff_base_ms: 1,
				default_headers: Map::new(),
			},
			ocr: OcrProviderConfig {
				api_base: "http://127.0.0.1:9".to_string(),
				api_key: None,
				path: "/v1/extract".to_string(),
				timeout_ms: 1_000,
				min_confidence: 0.0,
			},
		},
		retrieval: Retrieval { dense_k: 10, sparse_k: 10 },
		fusion: Fusion {
			dense_weight: 1.0,
			sparse_weight: 1.0,
			rank_constant: 60.0,
			min_score: 0.0,
			k_final: 10,
		},
		context: Context {
			token_budget: 200,
			overlap_threshold: 0.6,
			chars_per_token: 4,
			tokenizer_repo: None,
			excerpt_chars: 240,
		},
		pipeline: Pipeline { deadline_ms: 5_000 },
	};

	glance_config::validate(&cfg).expect("Test config must validate.");

	cfg
}

pub struct StubEmbedding {
	pub vector: Vec<f32>,
}

impl EmbeddingProvider for StubEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		_text: &'a str,
	) -> BoxFuture<'a, glance_providers::Result<Vec<f32>>> {
		Box::pin(async move { Ok(self.vector.clone()) })
	}
}

pub struct FailingEmbedding;

impl EmbeddingProvider for FailingEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		_text: &'a str,
	) -> BoxFuture<'a, glance_providers::Result<Vec<f32>>> {
		Box::pin(async move { Err(glance_providers::Error::Status { status: 503 }) })
	}
}

/// Returns the scripted responses in order; counts every call. Use this to
/// assert exact retry behavior.
pub struct ScriptedGeneration {
	script: Mutex<VecDeque<glance_providers::Result<Completion>>>,
	pub calls: AtomicU32,
}

impl ScriptedGeneration {
	pub fn new(script: Vec<glance_providers::Result<Completion>>) -> Self {
		Self { script: Mutex::new(script.into_iter().collect()), calls: AtomicU32::new(0) }
	}

	pub fn answering(content: &str) -> Self {
		Self::new(vec![Ok(Completion { content: content.to_string(), truncated: false })])
	}

	pub fn call_count(&self) -> u32 {
		self.calls.load(Ordering::SeqCst)
	}
}

impl GenerationProvider for ScriptedGeneration {
	fn complete<'a>(
		&'a self,
		_cfg: &'a GenerationProviderConfig,
		_messages: &'a [Value],
	) -> BoxFuture<'a, glance_providers::Result<Completion>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			let mut script = self.script.lock().unwrap_or_else(|err| err.into_inner());

			match script.pop_front() {
				Some(response) => response,
				// An exhausted script keeps repeating the last-known shape of
				// failure so retry loops terminate deterministically.
				None => Err(glance_providers::Error::Timeout),
			}
		})
	}
}

pub struct StubOcr {
	pub extraction: OcrExtraction,
}

impl OcrProvider for StubOcr {
	fn extract<'a>(
		&'a self,
		_cfg: &'a OcrProviderConfig,
		_image: &'a [u8],
	) -> BoxFuture<'a, glance_providers::Result<OcrExtraction>> {
		Box::pin(async move { Ok(self.extraction.clone()) })
	}
}

pub struct FailingOcr;

impl OcrProvider for FailingOcr {
	fn extract<'a>(
		&'a self,
		_cfg: &'a OcrProviderConfig,
		_image: &'a [u8],
	) -> BoxFuture<'a, glance_providers::Result<OcrExtraction>> {
		Box::pin(async move {
			Err(glance_providers::Error::Payload { message: "no text layer".to_string() })
		})
	}
}

/// Serves a fixed ranked list, truncated to `k`.
pub struct StaticDenseIndex {
	pub passages: Vec<PassageRef>,
}

impl DenseIndex for StaticDenseIndex {
	fn search<'a>(
		&'a self,
		_embedding: &'a [f32],
		k: u32,
	) -> BoxFuture<'a, glance_retrieval::Result<Vec<PassageRef>>> {
		Box::pin(async move {
			Ok(self.passages.iter().take(k as usize).cloned().collect())
		})
	}
}

pub struct StaticSparseIndex {
	pub passages: Vec<PassageRef>,
}

impl SparseIndex for StaticSparseIndex {
	fn search<'a>(
		&'a self,
		_query_text: &'a str,
		k: u32,
	) -> BoxFuture<'a, glance_retrieval::Result<Vec<PassageRef>>> {
		Box::pin(async move {
			Ok(self.passages.iter().take(k as usize).cloned().collect())
		})
	}
}

pub struct FailingDenseIndex;

impl DenseIndex for FailingDenseIndex {
	fn search<'a>(
		&'a self,
		_embedding: &'a [f32],
		_k: u32,
	) -> BoxFuture<'a, glance_retrieval::Result<Vec<PassageRef>>> {
		Box::pin(async move {
			Err(glance_retrieval::Error::Index { message: "connection refused".to_string() })
		})
	}
}

pub struct FailingSparseIndex;

impl SparseIndex for FailingSparseIndex {
	fn search<'a>(
		&'a self,
		_query_text: &'a str,
		_k: u32,
	) -> BoxFuture<'a, glance_retrieval::Result<Vec<PassageRef>>> {
		Box::pin(async move {
			Err(glance_retrieval::Error::Index { message: "connection refused".to_string() })
		})
	}
}

/// Sleeps past any reasonable test deadline before answering; used to drive
/// deadline-expiry paths.
pub struct StallingDenseIndex {
	pub delay: Duration,
	pub passages: Vec<PassageRef>,
}

impl DenseIndex for StallingDenseIndex {
	fn search<'a>(
		&'a self,
		_embedding: &'a [f32],
		k: u32,
	) -> BoxFuture<'a, glance_retrieval::Result<Vec<PassageRef>>> {
		Box::pin(async move {
			tokio::time::sleep(self.delay).await;

			Ok(self.passages.iter().take(k as usize).cloned().collect())
		})
	}
}

pub struct StallingSparseIndex {
	pub delay: Duration,
	pub passages: Vec<PassageRef>,
}

impl SparseIndex for StallingSparseIndex {
	fn search<'a>(
		&'a self,
		_query_text: &'a str,
		k: u32,
	) -> BoxFuture<'a, glance_retrieval::Result<Vec<PassageRef>>> {
		Box::pin(async move {
			tokio::time::sleep(self.delay).await;

			Ok(self.passages.iter().take(k as usize).cloned().collect())
		})
	}
}
