//! Health and emotion scenarios
//!
//! Each test drives producers against an in-memory origin and checks the
//! persisted health together with the emotion events published on the bus.

use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use lilguy_core::keys::HealthKey;
use lilguy_core::{
    ActionSink, AnimationName, Context, Effect, EmotionEvent, GoalTracker, Health, Host,
    MemoryBackend, OfflineGoalService, RelayHub, RemoteOutcome, EMOTION_TOPIC,
};

// =============================================================================
// Helpers
// =============================================================================

fn origin() -> (Host, Context) {
    let host = Host::new(Arc::new(MemoryBackend::new()), RelayHub::default());
    let context = host.open_context("main");
    (host, context)
}

fn record_events(context: &Context) -> (Arc<Mutex<Vec<EmotionEvent>>>, lilguy_core::Subscription) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let subscription = context
        .bus()
        .subscribe(EMOTION_TOPIC, move |event| sink.lock().push(event.clone()));
    (events, subscription)
}

fn tracker(context: &Context) -> GoalTracker {
    GoalTracker::new(
        ActionSink::new(context.clone()),
        Arc::new(OfflineGoalService),
    )
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_removing_goal_costs_ten_health() {
    let (_host, context) = origin();
    let goals = tracker(&context);
    let (goal, created) = goals.create("Ship the widget");
    assert_eq!(created.wait().await, RemoteOutcome::Applied);
    assert_eq!(context.store().read::<HealthKey>(), Health::MAX);

    let (events, _subscription) = record_events(&context);
    let removed = goals.remove(&goal.id).unwrap();
    assert_eq!(removed.wait().await, RemoteOutcome::Applied);

    assert_eq!(context.store().read::<HealthKey>().value(), 90);
    let events = events.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, AnimationName::Sad);
    assert_eq!(events[0].intensity, 30);
    assert_eq!(events[0].health, Some(90));
    assert!(goals.goals().is_empty());
}

#[test]
fn test_health_never_goes_negative() {
    let (_host, context) = origin();
    context.store().write::<HealthKey>(&Health::saturating(5));
    let sink = ActionSink::new(context.clone());

    let health = sink.apply(Effect::new(AnimationName::Sad, 60, -20, "test"));
    assert_eq!(health, Health::MIN);
    assert_eq!(context.store().get("health").as_deref(), Some("0"));
}

#[test]
fn test_health_never_exceeds_max() {
    let (_host, context) = origin();
    let sink = ActionSink::new(context.clone());
    assert_eq!(
        sink.apply(Effect::new(AnimationName::Happy, 100, 50, "test")),
        Health::MAX
    );
}

#[tokio::test]
async fn test_large_progress_jump_is_tiered_large() {
    let (_host, context) = origin();
    context.store().write::<HealthKey>(&Health::saturating(50));
    let goals = tracker(&context);
    let (goal, _) = goals.create("Read a chapter");
    // +3 for creation
    assert_eq!(context.store().read::<HealthKey>().value(), 53);

    goals.set_progress(&goal.id, 20).unwrap().wait().await;
    assert_eq!(context.store().read::<HealthKey>().value(), 56);

    let (events, _subscription) = record_events(&context);
    goals.set_progress(&goal.id, 80).unwrap().wait().await;

    assert_eq!(context.store().read::<HealthKey>().value(), 66);
    let events = events.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, AnimationName::Happy);
    assert_eq!(events[0].intensity, 100);
    assert_eq!(goals.get(&goal.id).map(|g| g.progress), Some(80));
}

#[tokio::test]
async fn test_unchanged_progress_has_no_effect() {
    let (_host, context) = origin();
    let goals = tracker(&context);
    let (goal, _) = goals.create("Stretch");
    goals.set_progress(&goal.id, 40).unwrap().wait().await;

    let (events, _subscription) = record_events(&context);
    goals.set_progress(&goal.id, 40).unwrap().wait().await;
    assert!(events.lock().is_empty());
}

#[test]
fn test_interleaved_producers_keep_last_commit() {
    let (_host, context) = origin();
    context.store().write::<HealthKey>(&Health::saturating(50));
    let first = ActionSink::new(context.clone());
    let second = ActionSink::new(context.clone());

    // Both read before either writes
    let plus = first.stage(Effect::new(AnimationName::Happy, 30, 5, "first"));
    let minus = second.stage(Effect::new(AnimationName::Sad, 30, -3, "second"));
    assert_eq!(plus.base(), minus.base());

    assert_eq!(plus.commit().value(), 55);
    assert_eq!(minus.commit().value(), 47);

    // Only the -3 survives
    assert_eq!(context.store().read::<HealthKey>().value(), 47);
}

#[tokio::test]
async fn test_completion_toggle_effects() {
    let (_host, context) = origin();
    context.store().write::<HealthKey>(&Health::saturating(50));
    let goals = tracker(&context);
    let (goal, _) = goals.create("Water plants");
    assert_eq!(context.store().read::<HealthKey>().value(), 53);

    goals.set_completed(&goal.id, true).unwrap().wait().await;
    assert_eq!(context.store().read::<HealthKey>().value(), 63);

    goals.set_completed(&goal.id, false).unwrap().wait().await;
    assert_eq!(context.store().read::<HealthKey>().value(), 60);
    assert_eq!(
        context.store().get("lilGuyAnimation").as_deref(),
        Some("sad")
    );
}

#[tokio::test]
async fn test_unknown_goal_is_an_error() {
    let (_host, context) = origin();
    let goals = tracker(&context);
    let err = goals.remove("missing").unwrap_err();
    assert!(matches!(err, lilguy_core::LilGuyError::GoalNotFound(ref id) if id == "missing"));
    assert_eq!(context.store().read::<HealthKey>(), Health::MAX);
}
