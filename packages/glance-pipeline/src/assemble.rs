use glance_context::trigram_overlap;
use glance_domain::{passage::FusedPassage, query::Query};

use crate::GlancePipeline;

/// A passage admitted into the context. `text` is usually the passage text
/// verbatim; for an oversized head passage it is the truncated rendering.
#[derive(Clone, Debug)]
pub struct SelectedPassage {
	pub fused: FusedPassage,
	pub text: String,
	pub token_estimate: u32,
}

/// The budget-constrained, non-redundant context handed to generation.
#[derive(Debug)]
pub struct ContextBundle {
	pub query: Query,
	pub passages: Vec<SelectedPassage>,
	pub total_token_estimate: u32,
	pub truncated: bool,
}

impl GlancePipeline {
	/// Greedy selection in fused order: a passage is admitted only if it fits
	/// the remaining token budget and stays under the overlap threshold
	/// against everything already admitted. Rejected passages are skipped,
	/// never revisited. If nothing fits at all, the head passage is truncated
	/// into the budget so a non-empty fused list never yields an empty bundle.
	pub(crate) fn assemble_stage(&self, query: Query, fused: Vec<FusedPassage>) -> ContextBundle {
		let budget = self.cfg.context.token_budget;
		let threshold = self.cfg.context.overlap_threshold;
		let mut selected: Vec<SelectedPassage> = Vec::new();
		let mut total = 0_u32;

		for candidate in &fused {
			let estimate = self.budgeter.estimate(&candidate.passage.text);

			if total.saturating_add(estimate) > budget {
				continue;
			}

			let redundant = selected.iter().any(|kept| {
				trigram_overlap(&kept.text, &candidate.passage.text) >= threshold
			});

			if redundant {
				continue;
			}

			total += estimate;
			selected.push(SelectedPassage {
				fused: candidate.clone(),
				text: candidate.passage.text.clone(),
				token_estimate: estimate,
			});
		}

		let mut truncated = false;

		if selected.is_empty()
			&& let Some(head) = fused.into_iter().next()
		{
			let text = self.budgeter.truncate(&head.passage.text, budget);
			let estimate = self.budgeter.estimate(&text).min(budget);

			total = estimate;
			truncated = true;
			selected.push(SelectedPassage { fused: head, text, token_estimate: estimate });
		}

		ContextBundle { query, passages: selected, total_token_estimate: total, truncated }
	}
}
