use glance_domain::{
	fusion::{self, FusionParams},
	passage::PassageRef,
	query,
};

fn passage(id: &str, text: &str) -> PassageRef {
	PassageRef {
		id: id.to_string(),
		source_document_id: "doc".to_string(),
		text: text.to_string(),
		start_offset: 0,
		end_offset: text.len() as u32,
		score: 0.0,
	}
}

fn params() -> FusionParams {
	FusionParams {
		dense_weight: 1.0,
		sparse_weight: 1.0,
		rank_constant: 60.0,
		min_score: 0.0,
		k_final: 10,
	}
}

#[test]
fn normalized_tokens_drive_fusion_end_to_end() {
	let parts = query::normalize_parts("How do I reset my password?", None).expect("parts");

	assert!(parts.normalized_tokens.contains(&"reset".to_string()));
	assert!(parts.normalized_tokens.contains(&"password".to_string()));

	// Sparse hits derived from those tokens merge with dense hits by rank.
	let dense = vec![passage("p1", "dense only"), passage("p2", "both lanes")];
	let sparse = vec![passage("p2", "both lanes")];
	let fused = fusion::fuse(&dense, &sparse, &params());

	assert_eq!(fused[0].passage.id, "p2");
}

#[test]
fn duplicate_ids_within_one_lane_keep_the_best_rank() {
	let dense =
		vec![passage("p1", "first copy"), passage("p2", "other"), passage("p1", "second copy")];
	let fused = fusion::fuse(&dense, &[], &params());

	assert_eq!(fused.len(), 2);
	assert_eq!(fused[0].passage.id, "p1");
	assert_eq!(fused[0].dense_rank, Some(1));
	assert_eq!(fused[0].passage.text, "first copy");
}

#[test]
fn weights_shift_the_ordering() {
	let dense = vec![passage("d", "dense hit")];
	let sparse = vec![passage("s", "sparse hit")];
	let mut sparse_heavy = params();

	sparse_heavy.dense_weight = 0.2;
	sparse_heavy.sparse_weight = 1.0;

	let fused = fusion::fuse(&dense, &sparse, &sparse_heavy);

	assert_eq!(fused[0].passage.id, "s");
}
