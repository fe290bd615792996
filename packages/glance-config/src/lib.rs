mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, Context, EmbeddingProviderConfig, Fusion, GenerationProviderConfig, Index,
	OcrProviderConfig, Pipeline, Providers, Retrieval, Service,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.index.url.trim().is_empty() {
		return Err(Error::Validation { message: "index.url must be non-empty.".to_string() });
	}
	if cfg.index.collection.trim().is_empty() {
		return Err(Error::Validation {
			message: "index.collection must be non-empty.".to_string(),
		});
	}
	if cfg.index.vector_dim == 0 {
		return Err(Error::Validation {
			message: "index.vector_dim must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.index.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match index.vector_dim.".to_string(),
		});
	}
	for (label, timeout_ms) in [
		("embedding", cfg.providers.embedding.timeout_ms),
		("generation", cfg.providers.generation.timeout_ms),
		("ocr", cfg.providers.ocr.timeout_ms),
	] {
		if timeout_ms == 0 {
			return Err(Error::Validation {
				message: format!("Provider {label} timeout_ms must be greater than zero."),
			});
		}
	}
	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("generation", &cfg.providers.generation.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}
	if cfg.providers.generation.backoff_base_ms == 0 {
		return Err(Error::Validation {
			message: "providers.generation.backoff_base_ms must be greater than zero.".to_string(),
		});
	}
	if !(0.0..=100.0).contains(&cfg.providers.ocr.min_confidence) {
		return Err(Error::Validation {
			message: "providers.ocr.min_confidence must be in the range 0.0-100.0.".to_string(),
		});
	}
	if cfg.retrieval.dense_k == 0 {
		return Err(Error::Validation {
			message: "retrieval.dense_k must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.sparse_k == 0 {
		return Err(Error::Validation {
			message: "retrieval.sparse_k must be greater than zero.".to_string(),
		});
	}
	for (label, weight) in [
		("fusion.dense_weight", cfg.fusion.dense_weight),
		("fusion.sparse_weight", cfg.fusion.sparse_weight),
	] {
		if !weight.is_finite() {
			return Err(Error::Validation {
				message: format!("{label} must be a finite number."),
			});
		}
		if weight < 0.0 {
			return Err(Error::Validation { message: format!("{label} must be zero or greater.") });
		}
	}
	if cfg.fusion.dense_weight + cfg.fusion.sparse_weight <= 0.0 {
		return Err(Error::Validation {
			message: "fusion weights must not both be zero.".to_string(),
		});
	}
	if !cfg.fusion.rank_constant.is_finite() || cfg.fusion.rank_constant <= 0.0 {
		return Err(Error::Validation {
			message: "fusion.rank_constant must be a positive finite number.".to_string(),
		});
	}
	if !cfg.fusion.min_score.is_finite() || cfg.fusion.min_score < 0.0 {
		return Err(Error::Validation {
			message: "fusion.min_score must be zero or greater.".to_string(),
		});
	}
	if cfg.fusion.k_final == 0 {
		return Err(Error::Validation {
			message: "fusion.k_final must be greater than zero.".to_string(),
		});
	}
	if cfg.context.token_budget == 0 {
		return Err(Error::Validation {
			message: "context.token_budget must be greater than zero.".to_string(),
		});
	}
	if !cfg.context.overlap_threshold.is_finite()
		|| cfg.context.overlap_threshold <= 0.0
		|| cfg.context.overlap_threshold > 1.0
	{
		return Err(Error::Validation {
			message: "context.overlap_threshold must be in the range (0.0, 1.0].".to_string(),
		});
	}
	if cfg.context.chars_per_token == 0 {
		return Err(Error::Validation {
			message: "context.chars_per_token must be greater than zero.".to_string(),
		});
	}
	if cfg.context.excerpt_chars == 0 {
		return Err(Error::Validation {
			message: "context.excerpt_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.pipeline.deadline_ms == 0 {
		return Err(Error::Validation {
			message: "pipeline.deadline_ms must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.context.tokenizer_repo.as_deref().map(|repo| repo.trim().is_empty()).unwrap_or(false) {
		cfg.context.tokenizer_repo = None;
	}
	if cfg.providers.ocr.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.providers.ocr.api_key = None;
	}
}
