pub const DENSE_VECTOR_NAME: &str = "dense";
pub const BM25_VECTOR_NAME: &str = "bm25";
pub const BM25_MODEL: &str = "qdrant/bm25";

use std::collections::{HashMap, HashSet};

use qdrant_client::qdrant::{
	Document, PointId, Query, QueryPointsBuilder, ScoredPoint, Value, point_id::PointIdOptions,
	value::Kind,
};

use glance_domain::{fusion::cmp_f32_desc, passage::PassageRef};

use crate::{Error, Result};

/// Read-only handle over the shared Qdrant collection. Built once at startup
/// and shared across requests; nothing in the pipeline writes through it.
pub struct QdrantIndex {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}

impl QdrantIndex {
	pub fn new(cfg: &glance_config::Index) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url)
			.build()
			.map_err(|err| Error::Index { message: err.to_string() })?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	/// Top-k nearest passages for a query embedding, using the collection's
	/// dense named vector. Ties are broken by passage id ascending.
	pub async fn search_dense(&self, embedding: Vec<f32>, k: u32) -> Result<Vec<PassageRef>> {
		let search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(embedding))
			.using(DENSE_VECTOR_NAME)
			.with_payload(true)
			.limit(k as u64);
		let response = self
			.client
			.query(search)
			.await
			.map_err(|err| Error::Index { message: err.to_string() })?;

		Ok(collect_passages(&response.result))
	}

	/// Top-k lexical passages for the normalized query text, using the
	/// collection's server-side BM25 document vector. Same tie-break rules.
	pub async fn search_sparse(&self, query_text: &str, k: u32) -> Result<Vec<PassageRef>> {
		let search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(Document::new(query_text.to_string(), BM25_MODEL)))
			.using(BM25_VECTOR_NAME)
			.with_payload(true)
			.limit(k as u64);
		let response = self
			.client
			.query(search)
			.await
			.map_err(|err| Error::Index { message: err.to_string() })?;

		Ok(collect_passages(&response.result))
	}
}

fn collect_passages(points: &[ScoredPoint]) -> Vec<PassageRef> {
	let mut out = Vec::with_capacity(points.len());

	for point in points {
		let id = point
			.id
			.as_ref()
			.and_then(point_id_string)
			.or_else(|| payload_string(&point.payload, "passage_id"));
		let Some(id) = id else {
			tracing::warn!("Passage candidate is missing an id.");

			continue;
		};
		let Some(source_document_id) = payload_string(&point.payload, "document_id") else {
			tracing::warn!(passage_id = %id, "Passage candidate is missing document_id.");

			continue;
		};
		let Some(text) = payload_string(&point.payload, "text") else {
			tracing::warn!(passage_id = %id, "Passage candidate is missing text.");

			continue;
		};
		let start_offset = payload_u32(&point.payload, "start_offset").unwrap_or(0);
		let end_offset = payload_u32(&point.payload, "end_offset").unwrap_or(0);

		out.push(PassageRef {
			id,
			source_document_id,
			text,
			start_offset,
			end_offset,
			score: point.score,
		});
	}

	out.sort_by(|a, b| cmp_f32_desc(a.score, b.score).then_with(|| a.id.cmp(&b.id)));

	let mut seen = HashSet::new();

	out.retain(|passage| seen.insert(passage.id.clone()));

	out
}

fn point_id_string(point_id: &PointId) -> Option<String> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Uuid(id)) => Some(id.clone()),
		Some(PointIdOptions::Num(id)) => Some(id.to_string()),
		None => None,
	}
}

fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::StringValue(text)) => Some(text.to_string()),
		_ => None,
	}
}

fn payload_u32(payload: &HashMap<String, Value>, key: &str) -> Option<u32> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::IntegerValue(value)) => u32::try_from(*value).ok(),
		Some(Kind::DoubleValue(value)) =>
			if value.fract() == 0.0 {
				u32::try_from(*value as i64).ok()
			} else {
				None
			},
		_ => None,
	}
}
