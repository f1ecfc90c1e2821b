//! Process-wide task registry.
//!
//! Every submitted job is tracked here from creation to its terminal state.
//! The registry is the only shared mutable resource in the system: the owning
//! orchestrator writes progress, the status endpoint reads snapshots, and the
//! two never block each other (per-entry sharded locking via `DashMap`).

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::pipeline::ResearchResult;
use crate::ClipscoutError;

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Running,
    Complete,
    Error,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Complete | TaskStatus::Error)
    }
}

/// Current pipeline stage of a running task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    Downloading,
    Transcribing,
    FetchingComments,
    Analysing,
    Done,
}

/// Snapshot of one tracked job
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: Uuid,
    pub status: TaskStatus,
    pub step: PipelineStep,
    pub progress: u8,
    pub message: String,
    pub result: Option<ResearchResult>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

struct TaskEntry {
    task: Task,
    cancel: CancellationToken,
}

/// Registry of all tasks in the process
#[derive(Default)]
pub struct TaskRegistry {
    tasks: DashMap<Uuid, TaskEntry>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
        }
    }

    /// Allocate a new task in the `Queued` state and return its id
    pub fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        let task = Task {
            id,
            status: TaskStatus::Queued,
            step: PipelineStep::Downloading,
            progress: 0,
            message: "Queued".to_string(),
            result: None,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        };

        self.tasks.insert(
            id,
            TaskEntry {
                task,
                cancel: CancellationToken::new(),
            },
        );
        id
    }

    /// Overwrite the mutable progress fields of a live task.
    ///
    /// The first update moves a queued task to `Running`. Terminal tasks are
    /// rejected with `AlreadyTerminal` rather than silently ignored, so a
    /// misbehaving writer surfaces instead of disappearing. Progress is
    /// clamped to be non-decreasing within the run.
    pub fn update(
        &self,
        id: Uuid,
        step: PipelineStep,
        progress: u8,
        message: impl Into<String>,
    ) -> Result<(), ClipscoutError> {
        let mut entry = self.tasks.get_mut(&id).ok_or(ClipscoutError::NotFound(id))?;
        if entry.task.status.is_terminal() {
            return Err(ClipscoutError::AlreadyTerminal(id));
        }

        entry.task.status = TaskStatus::Running;
        entry.task.step = step;
        entry.task.progress = entry.task.progress.max(progress.min(100));
        entry.task.message = message.into();
        Ok(())
    }

    /// Transition a task to `Complete` and attach the aggregated result
    pub fn complete(&self, id: Uuid, result: ResearchResult) -> Result<(), ClipscoutError> {
        let mut entry = self.tasks.get_mut(&id).ok_or(ClipscoutError::NotFound(id))?;
        if entry.task.status.is_terminal() {
            return Err(ClipscoutError::AlreadyTerminal(id));
        }

        entry.task.status = TaskStatus::Complete;
        entry.task.step = PipelineStep::Done;
        entry.task.progress = 100;
        entry.task.message = "Complete".to_string();
        entry.task.result = Some(result);
        entry.task.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Transition a task to `Error` with a user-facing message.
    ///
    /// Progress is left at its last reported value and no result is attached.
    pub fn fail(&self, id: Uuid, error: impl Into<String>) -> Result<(), ClipscoutError> {
        let mut entry = self.tasks.get_mut(&id).ok_or(ClipscoutError::NotFound(id))?;
        if entry.task.status.is_terminal() {
            return Err(ClipscoutError::AlreadyTerminal(id));
        }

        entry.task.status = TaskStatus::Error;
        entry.task.error = Some(error.into());
        entry.task.message = "Failed".to_string();
        entry.task.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Read-only snapshot of a task
    pub fn get(&self, id: Uuid) -> Result<Task, ClipscoutError> {
        self.tasks
            .get(&id)
            .map(|entry| entry.task.clone())
            .ok_or(ClipscoutError::NotFound(id))
    }

    /// Cancellation token for the given task, if it exists
    pub fn cancel_token(&self, id: Uuid) -> Option<CancellationToken> {
        self.tasks.get(&id).map(|entry| entry.cancel.clone())
    }

    /// Request cooperative cancellation of a live task.
    ///
    /// The orchestrator observes the token between stages; a stage that has
    /// already started is never interrupted mid-flight.
    pub fn request_cancel(&self, id: Uuid) -> Result<(), ClipscoutError> {
        let entry = self.tasks.get(&id).ok_or(ClipscoutError::NotFound(id))?;
        if entry.task.status.is_terminal() {
            return Err(ClipscoutError::AlreadyTerminal(id));
        }

        entry.cancel.cancel();
        Ok(())
    }

    /// Remove terminal tasks that finished before `cutoff`; returns how many
    /// entries were evicted. Live tasks are never touched.
    pub fn evict_finished_before(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|_, entry| {
            match entry.task.finished_at {
                Some(finished_at) => finished_at >= cutoff,
                None => true,
            }
        });
        before - self.tasks.len()
    }

    /// Remove terminal tasks older than `ttl`
    pub fn evict_expired(&self, ttl: Duration) -> usize {
        self.evict_finished_before(Utc::now() - ttl)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ResearchResult;
    use crate::platform::Platform;

    fn minimal_result() -> ResearchResult {
        ResearchResult {
            platform: Platform::Youtube,
            is_instagram: false,
            has_video: false,
            video: None,
            transcription: None,
            transcription_key_points: None,
            instagram: None,
            sentiment: None,
            key_points: None,
        }
    }

    #[test]
    fn test_create_starts_queued() {
        let registry = TaskRegistry::new();
        let id = registry.create();

        let task = registry.get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(task.progress, 0);
        assert!(task.result.is_none());
        assert!(task.error.is_none());
    }

    #[test]
    fn test_update_moves_to_running_and_clamps_progress() {
        let registry = TaskRegistry::new();
        let id = registry.create();

        registry
            .update(id, PipelineStep::Downloading, 50, "halfway")
            .unwrap();
        let task = registry.get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Running);
        assert_eq!(task.progress, 50);

        // A regressing progress value must not move the task backwards.
        registry
            .update(id, PipelineStep::Downloading, 30, "glitch")
            .unwrap();
        let task = registry.get(id).unwrap();
        assert_eq!(task.progress, 50);
        assert_eq!(task.message, "glitch");
    }

    #[test]
    fn test_terminal_tasks_are_immutable() {
        let registry = TaskRegistry::new();
        let id = registry.create();
        registry.complete(id, minimal_result()).unwrap();

        assert!(matches!(
            registry.update(id, PipelineStep::Done, 100, "late"),
            Err(ClipscoutError::AlreadyTerminal(_))
        ));
        assert!(matches!(
            registry.fail(id, "late failure"),
            Err(ClipscoutError::AlreadyTerminal(_))
        ));
        assert!(matches!(
            registry.complete(id, minimal_result()),
            Err(ClipscoutError::AlreadyTerminal(_))
        ));
    }

    #[test]
    fn test_exactly_one_of_result_or_error() {
        let registry = TaskRegistry::new();

        let completed = registry.create();
        registry.complete(completed, minimal_result()).unwrap();
        let task = registry.get(completed).unwrap();
        assert!(task.result.is_some() && task.error.is_none());
        assert_eq!(task.progress, 100);

        let failed = registry.create();
        registry
            .update(failed, PipelineStep::Downloading, 10, "downloading")
            .unwrap();
        registry.fail(failed, "Download failed: boom").unwrap();
        let task = registry.get(failed).unwrap();
        assert!(task.result.is_none() && task.error.is_some());
        // Progress stays at its last reported value on the fatal path.
        assert_eq!(task.progress, 10);
    }

    #[test]
    fn test_get_unknown_is_not_found() {
        let registry = TaskRegistry::new();
        assert!(matches!(
            registry.get(Uuid::new_v4()),
            Err(ClipscoutError::NotFound(_))
        ));
    }

    #[test]
    fn test_request_cancel_sets_token() {
        let registry = TaskRegistry::new();
        let id = registry.create();

        let token = registry.cancel_token(id).unwrap();
        assert!(!token.is_cancelled());

        registry.request_cancel(id).unwrap();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_request_cancel_rejects_terminal() {
        let registry = TaskRegistry::new();
        let id = registry.create();
        registry.fail(id, "gone").unwrap();

        assert!(matches!(
            registry.request_cancel(id),
            Err(ClipscoutError::AlreadyTerminal(_))
        ));
    }

    #[test]
    fn test_eviction_only_touches_finished_tasks() {
        let registry = TaskRegistry::new();
        let running = registry.create();
        let finished = registry.create();
        registry.complete(finished, minimal_result()).unwrap();

        let evicted = registry.evict_finished_before(Utc::now() + Duration::seconds(1));
        assert_eq!(evicted, 1);
        assert!(registry.get(finished).is_err());
        assert!(registry.get(running).is_ok());
    }

    #[test]
    fn test_eviction_respects_ttl() {
        let registry = TaskRegistry::new();
        let finished = registry.create();
        registry.complete(finished, minimal_result()).unwrap();

        // Freshly finished tasks survive a TTL-based sweep.
        assert_eq!(registry.evict_expired(Duration::seconds(60)), 0);
        assert!(registry.get(finished).is_ok());
    }
}
