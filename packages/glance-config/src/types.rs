use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub index: Index,
	pub providers: Providers,
	pub retrieval: Retrieval,
	pub fusion: Fusion,
	pub context: Context,
	pub pipeline: Pipeline,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
	#[serde(default = "default_bind_localhost_only")]
	pub bind_localhost_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct Index {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub generation: GenerationProviderConfig,
	pub ocr: OcrProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct GenerationProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	pub max_retries: u32,
	pub backoff_base_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct OcrProviderConfig {
	pub api_base: String,
	pub api_key: Option<String>,
	pub path: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub min_confidence: f32,
}

#[derive(Debug, Deserialize)]
pub struct Retrieval {
	pub dense_k: u32,
	pub sparse_k: u32,
}

#[derive(Debug, Deserialize)]
pub struct Fusion {
	#[serde(default = "default_fusion_weight")]
	pub dense_weight: f32,
	#[serde(default = "default_fusion_weight")]
	pub sparse_weight: f32,
	#[serde(default = "default_rank_constant")]
	pub rank_constant: f32,
	#[serde(default)]
	pub min_score: f32,
	pub k_final: u32,
}

#[derive(Debug, Deserialize)]
pub struct Context {
	pub token_budget: u32,
	pub overlap_threshold: f32,
	#[serde(default = "default_chars_per_token")]
	pub chars_per_token: u32,
	pub tokenizer_repo: Option<String>,
	#[serde(default = "default_excerpt_chars")]
	pub excerpt_chars: u32,
}

#[derive(Debug, Deserialize)]
pub struct Pipeline {
	pub deadline_ms: u64,
}

fn default_bind_localhost_only() -> bool {
	true
}

fn default_fusion_weight() -> f32 {
	1.0
}

fn default_rank_constant() -> f32 {
	60.0
}

fn default_chars_per_token() -> u32 {
	4
}

fn default_excerpt_chars() -> u32 {
	240
}
