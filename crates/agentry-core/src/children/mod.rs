//! Parallel child sessions and result merging.
//!
//! A parent session can fan a task out into child sessions that run
//! concurrently under a semaphore bound. Each child is seeded with a
//! private copy of the parent's memory plus its own sub-task as task
//! text; when all children finish, the memory each one ADDED folds back
//! into the parent with provenance markers: blackboard content is
//! prefixed `[child-N]`, attributes are namespaced `child-N/<name>`,
//! and scratchpads are appended under labeled headers. A failed child
//! becomes an error entry on the parent blackboard; it never fails the
//! parent run.

use std::collections::HashMap;
use std::sync::Arc;

use agentry_types::event::EngineEvent;
use agentry_types::memory::{BlackboardCategory, BlackboardEntry};
use agentry_types::session::{Session, SessionStatus};
use serde_json::json;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::event::EventBus;
use crate::memory::MemoryStore;

/// Hard cap on children per batch.
pub const MAX_CHILDREN: usize = 100;

/// Default concurrent child executions.
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Coordinator tuning knobs.
#[derive(Debug, Clone)]
pub struct ChildConfig {
    pub max_children: usize,
    pub max_concurrent: usize,
}

impl Default for ChildConfig {
    fn default() -> Self {
        Self {
            max_children: MAX_CHILDREN,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }
}

/// What to run as one child.
#[derive(Debug, Clone)]
pub struct ChildSpec {
    pub task: String,
    pub model: String,
    pub max_iterations: u32,
}

/// Summary of a merge back into the parent.
#[derive(Debug)]
pub struct MergeSummary {
    pub merged: usize,
    pub failed: usize,
}

/// Snapshot of the parent's memory at spawn time, used to merge only
/// what each child added.
struct MergeBaseline {
    entries: usize,
    /// Seeded attribute values by name. A child attribute merges when
    /// its name is new OR its value differs from the seeded one, so an
    /// overwrite of a seeded attribute is not lost.
    attributes: HashMap<String, serde_json::Value>,
    scratchpad: String,
}

/// Runs child sessions under a concurrency bound and merges results.
pub struct ChildCoordinator {
    events: EventBus,
    config: ChildConfig,
}

impl ChildCoordinator {
    pub fn new(events: EventBus) -> Self {
        Self {
            events,
            config: ChildConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ChildConfig) -> Self {
        self.config = config;
        self
    }

    /// Run all children to a stop, then merge their memory into the
    /// parent. The runner owns each child session for the duration of
    /// its run and returns it in whatever state it ended.
    pub async fn run_children<F, Fut>(
        &self,
        parent: &mut Session,
        specs: Vec<ChildSpec>,
        runner: F,
        cancel: &CancellationToken,
    ) -> MergeSummary
    where
        F: Fn(Session, CancellationToken) -> Fut + Clone + Send + Sync + 'static,
        Fut: std::future::Future<Output = Session> + Send + 'static,
    {
        let total = specs.len().min(self.config.max_children);
        if specs.len() > total {
            warn!(
                requested = specs.len(),
                limit = self.config.max_children,
                "child batch exceeds limit, truncating"
            );
        }

        // Children start from a private copy of the parent's memory;
        // only what they add beyond this baseline merges back.
        let seed = parent.memory.clone();
        let baseline = MergeBaseline {
            entries: seed.blackboard.len(),
            attributes: seed
                .attributes
                .iter()
                .map(|a| (a.name.clone(), a.value.clone()))
                .collect(),
            scratchpad: seed.scratchpad.clone(),
        };

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent));
        let mut set: JoinSet<(usize, Session)> = JoinSet::new();

        for (index, spec) in specs.into_iter().take(total).enumerate() {
            let mut child = Session::new(spec.task.clone(), spec.model, spec.max_iterations);
            child.memory = seed.clone();
            self.events.publish(EngineEvent::ChildSpawned {
                parent_id: parent.id,
                child_id: child.id,
                task: spec.task,
                index,
                total,
            });

            let semaphore = Arc::clone(&semaphore);
            let runner = runner.clone();
            let child_cancel = cancel.child_token();
            set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    // The semaphore is never closed while the set runs.
                    Err(_) => return (index, child),
                };
                let finished = runner(child, child_cancel).await;
                (index, finished)
            });
        }

        let mut finished: Vec<(usize, Session)> = Vec::with_capacity(total);
        let mut panicked = 0usize;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(result) => {
                    self.events.publish(EngineEvent::ChildFinished {
                        parent_id: parent.id,
                        child_id: result.1.id,
                        index: result.0,
                        status: result.1.status,
                    });
                    finished.push(result);
                }
                Err(error) => {
                    warn!(%error, "child task aborted");
                    panicked += 1;
                }
            }
        }
        // Deterministic merge order regardless of completion order.
        finished.sort_by_key(|(index, _)| *index);

        let summary = self.merge(parent, finished, panicked, &baseline);
        self.events.publish(EngineEvent::ChildrenMerged {
            parent_id: parent.id,
            merged: summary.merged,
            failed: summary.failed,
        });
        summary
    }

    fn merge(
        &self,
        parent: &mut Session,
        children: Vec<(usize, Session)>,
        panicked: usize,
        baseline: &MergeBaseline,
    ) -> MergeSummary {
        let mut memory = MemoryStore::from_memory(std::mem::take(&mut parent.memory));
        let mut merged = 0usize;
        let mut failed = panicked;

        for (index, child) in children {
            // 1-based labels in merged content.
            let label = index + 1;

            if child.status == SessionStatus::Error {
                let detail = child.error.as_deref().unwrap_or("unknown error");
                let mut entry = BlackboardEntry::new(
                    BlackboardCategory::Error,
                    format!("[child-{label}] failed: {detail}"),
                    parent.iteration,
                );
                entry.data = Some(json!({ "child": label }));
                memory.append_blackboard(entry);
                failed += 1;
                continue;
            }

            for child_entry in child.memory.blackboard.into_iter().skip(baseline.entries) {
                let mut entry = BlackboardEntry::new(
                    child_entry.category,
                    format!("[child-{label}] {}", child_entry.content),
                    parent.iteration,
                );
                entry.data = Some(json!({ "child": label }));
                entry.tools = child_entry.tools;
                entry.auto = child_entry.auto;
                memory.append_blackboard(entry);
            }

            for attribute in child.memory.attributes {
                if baseline
                    .attributes
                    .get(&attribute.name)
                    .is_some_and(|seeded| *seeded == attribute.value)
                {
                    continue;
                }
                memory.set_attribute(
                    format!("child-{label}/{}", attribute.name),
                    attribute.tool,
                    attribute.value,
                    parent.iteration,
                );
            }

            if !child.memory.scratchpad.is_empty()
                && child.memory.scratchpad != baseline.scratchpad
            {
                memory.append_scratchpad(&format!(
                    "\n\n[child-{label}]\n{}",
                    child.memory.scratchpad
                ));
            }

            parent.artifacts.extend(child.artifacts);
            merged += 1;
        }

        parent.memory = memory.into_memory();
        MergeSummary { merged, failed }
    }
}
