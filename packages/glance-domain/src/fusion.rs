use std::{cmp::Ordering, collections::HashMap};

use crate::passage::{FusedPassage, PassageRef};

/// Tunable reciprocal-rank-fusion parameters. All of these come from
/// configuration; none are fixed by the algorithm.
#[derive(Clone, Copy, Debug)]
pub struct FusionParams {
	pub dense_weight: f32,
	pub sparse_weight: f32,
	pub rank_constant: f32,
	pub min_score: f32,
	pub k_final: u32,
}

struct FusionEntry {
	passage: PassageRef,
	dense_rank: Option<u32>,
	sparse_rank: Option<u32>,
}

/// Merges the two ranked lists into one ordering by reciprocal-rank fusion.
///
/// Ranks are 1-based positions in each input list. A passage present in both
/// lists carries both rank terms and keeps the first-seen `PassageRef`.
/// Raw retriever scores never enter the fused score; the two lanes' scales
/// are not comparable.
///
/// Ordering is total and deterministic: descending fused score, then
/// dense-ranked passages before sparse-only ones, then passage id ascending.
/// The relevance floor may legitimately empty the result.
pub fn fuse(dense: &[PassageRef], sparse: &[PassageRef], params: &FusionParams) -> Vec<FusedPassage> {
	let mut entries: Vec<FusionEntry> = Vec::with_capacity(dense.len() + sparse.len());
	let mut index_by_id: HashMap<String, usize> = HashMap::new();

	for (pos, passage) in dense.iter().enumerate() {
		let rank = pos as u32 + 1;

		match index_by_id.get(passage.id.as_str()) {
			// Duplicate ids within one lane keep the best (lowest) rank.
			Some(idx) => {
				let entry = &mut entries[*idx];

				entry.dense_rank = Some(entry.dense_rank.map_or(rank, |r| r.min(rank)));
			},
			None => {
				index_by_id.insert(passage.id.clone(), entries.len());
				entries.push(FusionEntry {
					passage: passage.clone(),
					dense_rank: Some(rank),
					sparse_rank: None,
				});
			},
		}
	}
	for (pos, passage) in sparse.iter().enumerate() {
		let rank = pos as u32 + 1;

		match index_by_id.get(passage.id.as_str()) {
			Some(idx) => {
				let entry = &mut entries[*idx];

				entry.sparse_rank = Some(entry.sparse_rank.map_or(rank, |r| r.min(rank)));
			},
			None => {
				index_by_id.insert(passage.id.clone(), entries.len());
				entries.push(FusionEntry {
					passage: passage.clone(),
					dense_rank: None,
					sparse_rank: Some(rank),
				});
			},
		}
	}

	let mut fused: Vec<FusedPassage> = entries
		.into_iter()
		.map(|entry| {
			let fused_score = reciprocal_rank_score(entry.dense_rank, entry.sparse_rank, params);

			FusedPassage {
				passage: entry.passage,
				dense_rank: entry.dense_rank,
				sparse_rank: entry.sparse_rank,
				fused_score,
			}
		})
		.collect();

	fused.sort_by(|a, b| {
		cmp_f32_desc(a.fused_score, b.fused_score)
			.then_with(|| b.dense_rank.is_some().cmp(&a.dense_rank.is_some()))
			.then_with(|| a.passage.id.cmp(&b.passage.id))
	});
	fused.retain(|entry| entry.fused_score >= params.min_score);
	fused.truncate(params.k_final as usize);

	fused
}

fn reciprocal_rank_score(
	dense_rank: Option<u32>,
	sparse_rank: Option<u32>,
	params: &FusionParams,
) -> f32 {
	let dense_term = dense_rank
		.map(|rank| params.dense_weight / (params.rank_constant + rank as f32))
		.unwrap_or(0.0);
	let sparse_term = sparse_rank
		.map(|rank| params.sparse_weight / (params.rank_constant + rank as f32))
		.unwrap_or(0.0);

	dense_term + sparse_term
}

/// Descending float ordering that is total: NaN sorts last among equals so a
/// poisoned score can never destabilize the sort.
pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}
