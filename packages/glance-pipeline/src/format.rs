use crate::{ContextBundle, Error, GenerationResult, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatTarget {
	Structured,
	Markup,
}

impl FormatTarget {
	/// Parses the caller-supplied target. An unknown value is a caller error,
	/// not something to guess around.
	pub fn parse(value: &str) -> Result<Self> {
		match value {
			"structured" => Ok(Self::Structured),
			"markup" => Ok(Self::Markup),
			other => Err(Error::InvalidFormatTarget { value: other.to_string() }),
		}
	}
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Citation {
	pub passage_id: String,
	pub source_document_id: String,
	pub excerpt: String,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct AnswerDocument {
	pub answer: String,
	pub citations: Vec<Citation>,
	pub truncated: bool,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FormattedAnswer {
	Structured { document: AnswerDocument },
	Markup { markdown: String },
}

/// Pure rendering of a validated generation result plus its bundle. Only the
/// passages the answer actually cites become citations.
pub fn format(
	result: &GenerationResult,
	bundle: &ContextBundle,
	excerpt_chars: u32,
	target: FormatTarget,
) -> FormattedAnswer {
	let document = build_document(result, bundle, excerpt_chars);

	match target {
		FormatTarget::Structured => FormattedAnswer::Structured { document },
		FormatTarget::Markup => FormattedAnswer::Markup { markdown: render_markdown(&document) },
	}
}

fn build_document(
	result: &GenerationResult,
	bundle: &ContextBundle,
	excerpt_chars: u32,
) -> AnswerDocument {
	let citations = result
		.cited_passage_ids
		.iter()
		.filter_map(|id| {
			bundle.passages.iter().find(|selected| &selected.fused.passage.id == id)
		})
		.map(|selected| Citation {
			passage_id: selected.fused.passage.id.clone(),
			source_document_id: selected.fused.passage.source_document_id.clone(),
			excerpt: excerpt_of(&selected.text, excerpt_chars as usize),
		})
		.collect();

	AnswerDocument {
		answer: result.answer_text.clone(),
		citations,
		truncated: result.truncated || bundle.truncated,
	}
}

fn render_markdown(document: &AnswerDocument) -> String {
	let mut out = document.answer.clone();

	if !document.citations.is_empty() {
		out.push_str("\n\n## Sources\n");

		for citation in &document.citations {
			out.push_str(&format!(
				"- `{}` ({}): {}\n",
				citation.passage_id, citation.source_document_id, citation.excerpt
			));
		}
	}
	if document.truncated {
		out.push_str("\n_Context or answer was truncated to fit limits._\n");
	}

	out
}

fn excerpt_of(text: &str, max_chars: usize) -> String {
	if text.chars().count() <= max_chars {
		return text.to_string();
	}

	let cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();

	format!("{}\u{2026}", cut.trim_end())
}
