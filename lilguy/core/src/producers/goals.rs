//! Goal Tracking
//!
//! Goals live in the `goals` key as a JSON list. Every action changes the
//! local list and applies its effect first, then persists remotely on a
//! spawned task:
//!
//! | action                  | health       | emotion            |
//! |-------------------------|--------------|--------------------|
//! | create                  | +3           | happy 60           |
//! | complete                | +10          | happy 100          |
//! | reopen                  | -3           | sad 60             |
//! | progress Δ              | tiered by Δ  | happy/sad by sign  |
//! | remove                  | -10          | sad 30             |
//! | remote failure          | -3           | sad 40             |
//!
//! A remote success is adopted into the local list only if no newer local
//! action on the same goal happened in the meantime. A remote failure is
//! compensated with a negative effect; the optimistic local change stays.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use super::remote::{GoalService, RemoteError};
use super::sequence::{Sequence, SequenceTracker};
use super::{ActionSink, Effect};
use crate::creature::AnimationName;
use crate::error::{LilGuyError, Result};
use crate::keys::GoalsKey;

const SOURCE: &str = "goals";
const REMOTE_SOURCE: &str = "goals:remote";

/// A user goal
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    /// Stable identifier
    pub id: String,
    /// Title shown to the user
    pub title: String,
    /// Whether the goal is done
    pub completed: bool,
    /// Progress percentage (0-100)
    pub progress: u8,
}

impl Goal {
    /// New open goal with a fresh id
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            completed: false,
            progress: 0,
        }
    }
}

/// How a remote call resolved
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteOutcome {
    /// Succeeded and the result was adopted
    Applied,
    /// Succeeded after a newer local action; result discarded
    Superseded,
    /// Failed; the compensating effect was applied
    Failed(String),
}

/// Handle to a fire-and-forget remote call
///
/// Dropping the handle does not cancel the call.
#[derive(Debug)]
pub struct RemoteCall {
    goal_id: String,
    sequence: Sequence,
    handle: JoinHandle<RemoteOutcome>,
}

impl RemoteCall {
    /// Goal the call is about
    #[must_use]
    pub fn goal_id(&self) -> &str {
        &self.goal_id
    }

    /// Local sequence the call was issued under
    #[must_use]
    pub fn sequence(&self) -> Sequence {
        self.sequence
    }

    /// Wait for the call to resolve
    pub async fn wait(self) -> RemoteOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => RemoteOutcome::Failed(e.to_string()),
        }
    }
}

enum Operation {
    Create(Goal),
    Update(Goal),
    Delete(String),
}

impl Operation {
    fn goal_id(&self) -> &str {
        match self {
            Self::Create(goal) | Self::Update(goal) => &goal.id,
            Self::Delete(id) => id,
        }
    }
}

/// Goal feature bound to one context
#[derive(Clone)]
pub struct GoalTracker {
    sink: ActionSink,
    service: Arc<dyn GoalService>,
    sequences: SequenceTracker,
}

impl GoalTracker {
    /// Tracker applying effects through `sink` and persisting to `service`
    #[must_use]
    pub fn new(sink: ActionSink, service: Arc<dyn GoalService>) -> Self {
        Self {
            sink,
            service,
            sequences: SequenceTracker::new(),
        }
    }

    /// Current goals
    #[must_use]
    pub fn goals(&self) -> Vec<Goal> {
        self.sink.context().store().read::<GoalsKey>()
    }

    /// Goal by id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Goal> {
        self.goals().into_iter().find(|g| g.id == id)
    }

    /// Add a goal
    ///
    /// Must be called from within a Tokio runtime.
    pub fn create(&self, title: &str) -> (Goal, RemoteCall) {
        let goal = Goal::new(title.trim());
        let mut goals = self.goals();
        goals.push(goal.clone());
        self.save(goals);

        self.sink.apply(Effect::new(AnimationName::Happy, 60, 3, SOURCE));
        let call = self.persist(Operation::Create(goal.clone()));
        (goal, call)
    }

    /// Mark a goal complete or reopen it
    ///
    /// Setting the current value again changes nothing locally but is still
    /// persisted.
    ///
    /// # Errors
    ///
    /// Returns `LilGuyError::GoalNotFound` for an unknown id.
    pub fn set_completed(&self, id: &str, completed: bool) -> Result<RemoteCall> {
        let (goal, previous) = self.modify(id, |goal| {
            let previous = goal.completed;
            goal.completed = completed;
            previous
        })?;

        if previous != completed {
            let effect = if completed {
                Effect::new(AnimationName::Happy, 100, 10, SOURCE)
            } else {
                Effect::new(AnimationName::Sad, 60, -3, SOURCE)
            };
            self.sink.apply(effect);
        }
        Ok(self.persist(Operation::Update(goal)))
    }

    /// Move a goal's progress slider (clamped to 100)
    ///
    /// # Errors
    ///
    /// Returns `LilGuyError::GoalNotFound` for an unknown id.
    pub fn set_progress(&self, id: &str, progress: u8) -> Result<RemoteCall> {
        let progress = progress.min(100);
        let (goal, previous) = self.modify(id, |goal| {
            let previous = goal.progress;
            goal.progress = progress;
            previous
        })?;

        let change = i32::from(progress) - i32::from(previous);
        if let Some(effect) = Effect::tiered(change, SOURCE) {
            self.sink.apply(effect);
        }
        Ok(self.persist(Operation::Update(goal)))
    }

    /// Delete a goal
    ///
    /// # Errors
    ///
    /// Returns `LilGuyError::GoalNotFound` for an unknown id.
    pub fn remove(&self, id: &str) -> Result<RemoteCall> {
        let mut goals = self.goals();
        let before = goals.len();
        goals.retain(|g| g.id != id);
        if goals.len() == before {
            return Err(LilGuyError::GoalNotFound(id.to_string()));
        }
        self.save(goals);

        self.sink.apply(Effect::new(AnimationName::Sad, 30, -10, SOURCE));
        Ok(self.persist(Operation::Delete(id.to_string())))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn save(&self, goals: Vec<Goal>) {
        self.sink.context().store().write::<GoalsKey>(&goals);
    }

    fn modify<T>(&self, id: &str, change: impl FnOnce(&mut Goal) -> T) -> Result<(Goal, T)> {
        let mut goals = self.goals();
        let goal = goals
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| LilGuyError::GoalNotFound(id.to_string()))?;
        let previous = change(goal);
        let updated = goal.clone();
        self.save(goals);
        Ok((updated, previous))
    }

    /// Replace the local record with the service's echo, if still present
    fn adopt(&self, stored: Goal) {
        let mut goals = self.goals();
        if let Some(slot) = goals.iter_mut().find(|g| g.id == stored.id) {
            if *slot != stored {
                *slot = stored;
                self.save(goals);
            }
        }
    }

    fn persist(&self, operation: Operation) -> RemoteCall {
        let goal_id = operation.goal_id().to_string();
        let sequence = self.sequences.next(&goal_id);
        let tracker = self.clone();
        let id = goal_id.clone();

        let handle = tokio::spawn(async move {
            let result: std::result::Result<Option<Goal>, RemoteError> = match &operation {
                Operation::Create(goal) => tracker.service.create(goal).await.map(Some),
                Operation::Update(goal) => tracker.service.update(goal).await.map(Some),
                Operation::Delete(id) => tracker.service.delete(id).await.map(|()| None),
            };

            match result {
                Ok(_) if !tracker.sequences.is_latest(&id, sequence) => {
                    tracing::debug!(goal = %id, sequence = sequence, "Discarding superseded goal response");
                    RemoteOutcome::Superseded
                }
                Ok(stored) => {
                    match stored {
                        Some(stored) => tracker.adopt(stored),
                        None => {
                            tracker.sequences.retire(&id, sequence);
                        }
                    }
                    RemoteOutcome::Applied
                }
                Err(e) => {
                    tracing::error!(goal = %id, sequence = sequence, error = %e, "Goal persistence failed");
                    tracker
                        .sink
                        .apply(Effect::new(AnimationName::Sad, 40, -3, REMOTE_SOURCE));
                    RemoteOutcome::Failed(e.to_string())
                }
            }
        });

        RemoteCall {
            goal_id,
            sequence,
            handle,
        }
    }
}

impl std::fmt::Debug for GoalTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoalTracker")
            .field("sink", &self.sink)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Host;
    use crate::health::Health;
    use crate::keys::HealthKey;
    use crate::producers::remote::OfflineGoalService;
    use crate::relay::RelayHub;
    use crate::store::MemoryBackend;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Service whose responses are delayed and can be told to fail
    struct SlowService {
        delay: Duration,
        fail: bool,
    }

    #[async_trait]
    impl GoalService for SlowService {
        async fn create(&self, goal: &Goal) -> std::result::Result<Goal, RemoteError> {
            self.respond(goal).await
        }

        async fn update(&self, goal: &Goal) -> std::result::Result<Goal, RemoteError> {
            self.respond(goal).await
        }

        async fn delete(&self, _id: &str) -> std::result::Result<(), RemoteError> {
            self.respond(&Goal::new("")).await.map(|_| ())
        }
    }

    impl SlowService {
        async fn respond(&self, goal: &Goal) -> std::result::Result<Goal, RemoteError> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(RemoteError::Status {
                    status: 503,
                    url: "http://test/goals".to_string(),
                });
            }
            Ok(goal.clone())
        }
    }

    fn tracker(service: Arc<dyn GoalService>) -> GoalTracker {
        let host = Host::new(Arc::new(MemoryBackend::new()), RelayHub::default());
        GoalTracker::new(ActionSink::new(host.open_context("main")), service)
    }

    fn health(tracker: &GoalTracker) -> u8 {
        tracker.sink.context().store().read::<HealthKey>().value()
    }

    fn set_health(tracker: &GoalTracker, value: u32) {
        tracker
            .sink
            .context()
            .store()
            .write::<HealthKey>(&Health::saturating(value));
    }

    #[tokio::test]
    async fn test_create_complete_reopen() {
        let tracker = tracker(Arc::new(OfflineGoalService));
        set_health(&tracker, 50);

        let (goal, call) = tracker.create("Read a chapter");
        assert_eq!(call.wait().await, RemoteOutcome::Applied);
        assert_eq!(health(&tracker), 53);
        assert_eq!(tracker.goals(), vec![goal.clone()]);

        tracker.set_completed(&goal.id, true).unwrap().wait().await;
        assert_eq!(health(&tracker), 63);
        assert!(tracker.get(&goal.id).unwrap().completed);

        // Unchanged completion has no effect
        tracker.set_completed(&goal.id, true).unwrap().wait().await;
        assert_eq!(health(&tracker), 63);

        tracker.set_completed(&goal.id, false).unwrap().wait().await;
        assert_eq!(health(&tracker), 60);
    }

    #[tokio::test]
    async fn test_progress_tiers() {
        let tracker = tracker(Arc::new(OfflineGoalService));
        set_health(&tracker, 50);
        let (goal, _) = tracker.create("Ship it");
        assert_eq!(health(&tracker), 53);

        tracker.set_progress(&goal.id, 20).unwrap();
        assert_eq!(health(&tracker), 56);
        tracker.set_progress(&goal.id, 80).unwrap();
        assert_eq!(health(&tracker), 66);
        tracker.set_progress(&goal.id, 80).unwrap();
        assert_eq!(health(&tracker), 66);
        tracker.set_progress(&goal.id, 75).unwrap();
        assert_eq!(health(&tracker), 65);
        assert_eq!(
            tracker.sink.context().store().get("lilGuyAnimation").as_deref(),
            Some("sad")
        );
    }

    #[tokio::test]
    async fn test_remove_and_unknown_id() {
        let tracker = tracker(Arc::new(OfflineGoalService));
        let (goal, _) = tracker.create("Temp");
        set_health(&tracker, 100);

        tracker.remove(&goal.id).unwrap().wait().await;
        assert_eq!(health(&tracker), 90);
        assert!(tracker.goals().is_empty());
        assert_eq!(tracker.sequences.latest(&goal.id), None);

        assert!(matches!(
            tracker.remove(&goal.id),
            Err(LilGuyError::GoalNotFound(ref id)) if *id == goal.id
        ));
        assert!(tracker.set_progress("nope", 10).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_compensates_without_rollback() {
        let tracker = tracker(Arc::new(SlowService {
            delay: Duration::from_millis(50),
            fail: true,
        }));
        set_health(&tracker, 50);

        let (goal, call) = tracker.create("Flaky");
        // Local state is visible before the call resolves
        assert_eq!(health(&tracker), 53);
        assert_eq!(tracker.goals().len(), 1);

        assert!(matches!(call.wait().await, RemoteOutcome::Failed(_)));
        assert_eq!(health(&tracker), 50);
        assert_eq!(tracker.get(&goal.id), Some(goal));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_success_is_superseded() {
        let tracker = tracker(Arc::new(SlowService {
            delay: Duration::from_millis(50),
            fail: false,
        }));
        let (goal, create) = tracker.create("Race");
        let first = tracker.set_progress(&goal.id, 30).unwrap();
        let second = tracker.set_progress(&goal.id, 60).unwrap();
        assert!(second.sequence() > first.sequence());

        assert_eq!(create.wait().await, RemoteOutcome::Superseded);
        assert_eq!(first.wait().await, RemoteOutcome::Superseded);
        assert_eq!(second.wait().await, RemoteOutcome::Applied);
        assert_eq!(tracker.get(&goal.id).unwrap().progress, 60);
    }
}
