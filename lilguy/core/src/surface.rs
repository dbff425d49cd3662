//! Surfaces
//!
//! A surface is one rendered view of the creature (the main panel or the
//! compact widget) owning exactly one animation engine.
//!
//! ```text
//!  mount:  hydrate ──► watch keys ──► [watch bus] ──► [relay task] ──► render loop
//!  unmount / drop: everything above is released
//! ```
//!
//! Key changes arrive through the change relay from every context. Emotion
//! events arrive only when a producer shares the surface's document
//! (`colocated`).

use std::sync::Arc;

use crate::animation::{
    AnimationEngine, Canvas, DisplaySize, RenderLoop, SharedEngine, SheetSlot, SpriteLoader,
};
use crate::config::{LilGuyConfig, SurfaceConfig};
use crate::context::Context;
use crate::creature::CreatureState;
use crate::emotion::EMOTION_TOPIC;
use crate::keys::{AnimationKey, ColorKey, HealthKey, NameKey, StageKey, TypedKey};
use crate::listeners::Subscription;
use crate::relay::ContextId;
use crate::task::ScopedTask;

/// Which host view a surface is
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
    /// Full dashboard panel
    MainPanel,
    /// Compact widget/popup
    Widget,
}

impl SurfaceKind {
    /// Display scale for this kind
    #[must_use]
    pub fn scale(&self, config: &SurfaceConfig) -> u32 {
        match self {
            Self::MainPanel => config.main_scale,
            Self::Widget => config.widget_scale,
        }
    }

    /// Name used in logs
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MainPanel => "main-panel",
            Self::Widget => "widget",
        }
    }
}

/// Mount options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceOptions {
    /// A producer runs in the same document; listen on its emotion bus
    pub colocated: bool,
    /// Deliver cross-context changes on a background task; when `false` the
    /// host drains the relay itself with `deliver_pending`
    pub drive_relay: bool,
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        Self {
            colocated: false,
            drive_relay: true,
        }
    }
}

/// Snapshot of what a surface is showing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SurfaceView {
    /// Surface kind
    pub kind: SurfaceKind,
    /// Owning context
    pub context: ContextId,
    /// Creature as displayed
    pub creature: CreatureState,
    /// Current frame index
    pub frame: u32,
    /// Global tick counter
    pub ticks: u64,
    /// Sheet load state
    pub slot: SheetSlot,
}

/// A mounted surface
///
/// Dropping it releases its subscriptions, relay task and render loop.
#[must_use = "dropping a Surface unmounts it"]
pub struct Surface {
    kind: SurfaceKind,
    context: Context,
    engine: SharedEngine,
    subscriptions: Vec<Subscription>,
    relay_task: Option<ScopedTask>,
    render: RenderLoop,
}

impl Surface {
    /// Mount a surface onto `context`
    ///
    /// Hydrates synchronously from the store before the first frame, so the
    /// first render already shows persisted state. Must be called from within
    /// a Tokio runtime.
    pub fn mount(
        context: &Context,
        kind: SurfaceKind,
        options: SurfaceOptions,
        canvas: Box<dyn Canvas>,
        loader: Arc<dyn SpriteLoader>,
        config: &LilGuyConfig,
    ) -> Self {
        let size = DisplaySize::new(kind.scale(&config.surfaces));
        let mut engine = AnimationEngine::new(&config.animation, size);
        engine.hydrate(CreatureState::hydrate(context.store()));
        let engine = engine.shared();

        let mut subscriptions = vec![
            watch::<HealthKey>(context, &engine, |e, v| e.set_health(v)),
            watch::<StageKey>(context, &engine, |e, v| {
                e.set_stage(v);
            }),
            watch::<ColorKey>(context, &engine, |e, v| {
                e.set_color(v);
            }),
            watch::<AnimationKey>(context, &engine, |e, v| {
                e.request(v);
            }),
            watch::<NameKey>(context, &engine, |e, v| e.set_name(v)),
        ];

        if options.colocated {
            let engine = Arc::clone(&engine);
            subscriptions.push(
                context
                    .bus()
                    .subscribe(EMOTION_TOPIC, move |event| engine.lock().apply_event(event)),
            );
        }

        let relay_task = if options.drive_relay {
            context.store().relay().spawn()
        } else {
            None
        };

        let render = RenderLoop::start(
            Arc::clone(&engine),
            canvas,
            loader,
            config.animation.frame_interval,
        );

        tracing::info!(
            surface = kind.as_str(),
            context = %context.id(),
            scale = size.scale(),
            colocated = options.colocated,
            "Surface mounted"
        );

        Self {
            kind,
            context: context.clone(),
            engine,
            subscriptions,
            relay_task,
            render,
        }
    }

    /// Surface kind
    #[must_use]
    pub fn kind(&self) -> SurfaceKind {
        self.kind
    }

    /// Owning context
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Shared engine handle
    #[must_use]
    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    /// What the surface currently shows
    #[must_use]
    pub fn view(&self) -> SurfaceView {
        let engine = self.engine.lock();
        SurfaceView {
            kind: self.kind,
            context: self.context.id(),
            creature: engine.creature().clone(),
            frame: engine.frame_index(),
            ticks: engine.ticks(),
            slot: engine.slot().clone(),
        }
    }

    /// Release everything and wait for the tasks to stop
    pub async fn unmount(self) {
        let Self {
            kind,
            context,
            subscriptions,
            relay_task,
            render,
            ..
        } = self;

        drop(subscriptions);
        if let Some(task) = relay_task {
            task.stop().await;
        }
        render.stop().await;
        tracing::info!(surface = kind.as_str(), context = %context.id(), "Surface unmounted");
    }
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("kind", &self.kind)
            .field("context", &self.context.id())
            .field("subscriptions", &self.subscriptions.len())
            .finish_non_exhaustive()
    }
}

fn watch<K>(
    context: &Context,
    engine: &SharedEngine,
    apply: fn(&mut AnimationEngine, K::Value),
) -> Subscription
where
    K: TypedKey + 'static,
{
    let engine = Arc::clone(engine);
    context.store().subscribe(K::KEY.as_str(), move |change| {
        let value = K::decode_or_default(Some(&change.value));
        apply(&mut engine.lock(), value);
    })
}
