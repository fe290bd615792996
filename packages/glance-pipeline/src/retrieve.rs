use tokio::time::{self, Instant};

use glance_domain::{passage::PassageRef, query::Query};

use crate::{GlancePipeline, RetrieverLane};

/// What one retriever lane contributed. An errored, skipped, or
/// deadline-incomplete lane contributes an empty list; only `Errored`
/// distinguishes "no matches" from "lane lost".
pub(crate) enum LaneOutcome {
	Hit(Vec<PassageRef>),
	Skipped,
	Errored(String),
	TimedOut,
}

impl LaneOutcome {
	pub(crate) fn passages(&self) -> &[PassageRef] {
		match self {
			Self::Hit(passages) => passages,
			_ => &[],
		}
	}

	pub(crate) fn error(&self) -> Option<&str> {
		match self {
			Self::Errored(message) => Some(message.as_str()),
			_ => None,
		}
	}

	pub(crate) fn timed_out(&self) -> bool {
		matches!(self, Self::TimedOut)
	}
}

pub(crate) struct RetrievalJoin {
	pub(crate) dense: LaneOutcome,
	pub(crate) sparse: LaneOutcome,
}

/// Aborts still-running lane tasks if the owning request is dropped before
/// the join completes. No lane task may outlive its request.
struct LaneAbortGuard {
	handles: Vec<tokio::task::AbortHandle>,
	armed: bool,
}

impl LaneAbortGuard {
	fn new(handles: Vec<tokio::task::AbortHandle>) -> Self {
		Self { handles, armed: true }
	}

	fn disarm(mut self) {
		self.armed = false;
	}
}

impl Drop for LaneAbortGuard {
	fn drop(&mut self) {
		if !self.armed {
			return;
		}

		for handle in &self.handles {
			handle.abort();
		}
	}
}

impl GlancePipeline {
	/// Runs the dense and sparse lanes concurrently and joins them under the
	/// request deadline. Each lane is awaited independently so one lane's
	/// results survive the other timing out; a lane still running at the
	/// deadline is aborted and treated as empty. The orchestrator re-checks
	/// the deadline at the stage boundary.
	pub(crate) async fn retrieve_stage(&self, query: &Query, deadline: Instant) -> RetrievalJoin {
		let dense_task = query.embedding.clone().map(|embedding| {
			let index = self.indexes.dense.clone();
			let k = self.cfg.retrieval.dense_k;

			tokio::spawn(async move { index.search(&embedding, k).await })
		});
		let sparse_task = (!query.normalized_tokens.is_empty()).then(|| {
			let index = self.indexes.sparse.clone();
			let text = query.normalized_tokens.join(" ");
			let k = self.cfg.retrieval.sparse_k;

			tokio::spawn(async move { index.search(&text, k).await })
		});

		let guard = LaneAbortGuard::new(
			dense_task
				.iter()
				.chain(sparse_task.iter())
				.map(|task| task.abort_handle())
				.collect(),
		);
		let (dense, sparse) = tokio::join!(
			join_lane(dense_task, RetrieverLane::Dense, deadline),
			join_lane(sparse_task, RetrieverLane::Sparse, deadline),
		);

		guard.disarm();

		RetrievalJoin { dense, sparse }
	}
}

async fn join_lane(
	task: Option<tokio::task::JoinHandle<glance_retrieval::Result<Vec<PassageRef>>>>,
	lane: RetrieverLane,
	deadline: Instant,
) -> LaneOutcome {
	let Some(task) = task else {
		return LaneOutcome::Skipped;
	};
	let abort = task.abort_handle();

	match time::timeout_at(deadline, task).await {
		Ok(Ok(Ok(passages))) => LaneOutcome::Hit(passages),
		Ok(Ok(Err(err))) => {
			tracing::warn!(lane = lane.as_str(), error = %err, "Retriever lane failed.");

			LaneOutcome::Errored(err.to_string())
		},
		Ok(Err(join_err)) => {
			tracing::error!(lane = lane.as_str(), error = %join_err, "Retriever task panicked.");

			LaneOutcome::Errored(join_err.to_string())
		},
		Err(_) => {
			abort.abort();
			tracing::warn!(lane = lane.as_str(), "Retriever lane missed the request deadline.");

			LaneOutcome::TimedOut
		},
	}
}
