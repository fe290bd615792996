pub mod answer;
pub mod assemble;
pub mod error;
pub mod format;
pub mod generate;
pub mod normalize;
pub mod outcome;
pub mod retrieve;
pub mod time_serde;

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;

pub use answer::AnswerRequest;
pub use assemble::{ContextBundle, SelectedPassage};
pub use error::{Error, Result, RetrieverLane};
pub use format::{AnswerDocument, Citation, FormatTarget, FormattedAnswer};
pub use outcome::{
	ErrorKind, GenerationResult, OutcomeError, OutcomeStatus, PipelineOutcome, Stage,
	StageDiagnostic, StageStatus,
};

use glance_config::{
	Config, EmbeddingProviderConfig, GenerationProviderConfig, OcrProviderConfig,
};
use glance_context::TokenBudgeter;
use glance_domain::passage::PassageRef;
use glance_providers::{Completion, OcrExtraction, embedding, generation, ocr};
use glance_retrieval::qdrant::QdrantIndex;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, glance_providers::Result<Vec<f32>>>;
}

pub trait GenerationProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a GenerationProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, glance_providers::Result<Completion>>;
}

pub trait OcrProvider
where
	Self: Send + Sync,
{
	fn extract<'a>(
		&'a self,
		cfg: &'a OcrProviderConfig,
		image: &'a [u8],
	) -> BoxFuture<'a, glance_providers::Result<OcrExtraction>>;
}

pub trait DenseIndex
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		embedding: &'a [f32],
		k: u32,
	) -> BoxFuture<'a, glance_retrieval::Result<Vec<PassageRef>>>;
}

pub trait SparseIndex
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		query_text: &'a str,
		k: u32,
	) -> BoxFuture<'a, glance_retrieval::Result<Vec<PassageRef>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub generation: Arc<dyn GenerationProvider>,
	pub ocr: Arc<dyn OcrProvider>,
}

#[derive(Clone)]
pub struct Indexes {
	pub dense: Arc<dyn DenseIndex>,
	pub sparse: Arc<dyn SparseIndex>,
}

/// One process-wide pipeline. Each call to [`answer`](GlancePipeline::answer)
/// runs an isolated request; the only shared state is the read-only index
/// handles and the token budgeter.
pub struct GlancePipeline {
	pub cfg: Config,
	pub indexes: Indexes,
	pub providers: Providers,
	pub budgeter: Arc<TokenBudgeter>,
}

impl GlancePipeline {
	/// Production wiring: HTTP providers and the shared Qdrant index handle.
	pub fn new(cfg: Config, index: QdrantIndex) -> Self {
		let budgeter = Arc::new(build_budgeter(&cfg));
		let index = Arc::new(index);
		let providers = Providers {
			embedding: Arc::new(DefaultProviders),
			generation: Arc::new(DefaultProviders),
			ocr: Arc::new(DefaultProviders),
		};
		let indexes = Indexes { dense: index.clone(), sparse: index };

		Self { cfg, indexes, providers, budgeter }
	}

	/// Wiring with explicit collaborators; tests inject stubs through this.
	pub fn with_parts(cfg: Config, indexes: Indexes, providers: Providers) -> Self {
		let budgeter = Arc::new(build_budgeter(&cfg));

		Self { cfg, indexes, providers, budgeter }
	}
}

fn build_budgeter(cfg: &Config) -> TokenBudgeter {
	if let Some(repo) = cfg.context.tokenizer_repo.as_deref() {
		match TokenBudgeter::from_pretrained(repo) {
			Ok(budgeter) => return budgeter,
			Err(err) => {
				tracing::warn!(
					error = %err,
					repo,
					"Tokenizer load failed; falling back to the heuristic estimator."
				);
			},
		}
	}

	TokenBudgeter::heuristic(cfg.context.chars_per_token)
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, glance_providers::Result<Vec<f32>>> {
		Box::pin(embedding::embed(cfg, text))
	}
}

impl GenerationProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a GenerationProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, glance_providers::Result<Completion>> {
		Box::pin(generation::complete(cfg, messages))
	}
}

impl OcrProvider for DefaultProviders {
	fn extract<'a>(
		&'a self,
		cfg: &'a OcrProviderConfig,
		image: &'a [u8],
	) -> BoxFuture<'a, glance_providers::Result<OcrExtraction>> {
		Box::pin(ocr::extract(cfg, image))
	}
}

impl DenseIndex for QdrantIndex {
	fn search<'a>(
		&'a self,
		embedding: &'a [f32],
		k: u32,
	) -> BoxFuture<'a, glance_retrieval::Result<Vec<PassageRef>>> {
		Box::pin(self.search_dense(embedding.to_vec(), k))
	}
}

impl SparseIndex for QdrantIndex {
	fn search<'a>(
		&'a self,
		query_text: &'a str,
		k: u32,
	) -> BoxFuture<'a, glance_retrieval::Result<Vec<PassageRef>>> {
		Box::pin(self.search_sparse(query_text, k))
	}
}
