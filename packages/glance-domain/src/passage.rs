/// A passage as returned by one retriever. The `score` is scheme-specific
/// (cosine similarity for the dense lane, BM25 for the sparse lane) and is
/// never compared across lanes; fusion works on ranks only.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PassageRef {
	pub id: String,
	pub source_document_id: String,
	pub text: String,
	pub start_offset: u32,
	pub end_offset: u32,
	pub score: f32,
}

/// Fusion output: a wrapper around the retriever-owned [`PassageRef`], never
/// an in-place edit of it. `fused_score` is a function of the two ranks only.
#[derive(Clone, Debug)]
pub struct FusedPassage {
	pub passage: PassageRef,
	pub dense_rank: Option<u32>,
	pub sparse_rank: Option<u32>,
	pub fused_score: f32,
}
