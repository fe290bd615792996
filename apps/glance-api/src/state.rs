use std::sync::Arc;

use glance_pipeline::GlancePipeline;
use glance_retrieval::qdrant::QdrantIndex;

#[derive(Clone)]
pub struct AppState {
	pub pipeline: Arc<GlancePipeline>,
}
impl AppState {
	pub fn new(config: glance_config::Config) -> color_eyre::Result<Self> {
		let index = QdrantIndex::new(&config.index)?;
		let pipeline = GlancePipeline::new(config, index);

		Ok(Self { pipeline: Arc::new(pipeline) })
	}

	pub fn with_pipeline(pipeline: GlancePipeline) -> Self {
		Self { pipeline: Arc::new(pipeline) }
	}
}
