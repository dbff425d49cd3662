//! Render Loop
//!
//! Drives one engine at a fixed cadence: tick, paint, and service sheet
//! loads. The loop is a scoped resource. It starts when a surface mounts and
//! is cancelled by [`RenderLoop::stop`] or by dropping the handle; in-flight
//! loads live in a `JoinSet` owned by the loop task and are aborted with it.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use super::canvas::Canvas;
use super::engine::{LoadRequest, SharedEngine};
use super::sheet::{AssetError, SpriteLoader, SpriteSheet};
use crate::task::ScopedTask;

type LoadResult = (LoadRequest, Result<SpriteSheet, AssetError>);

/// Handle to a running render loop
#[derive(Debug)]
#[must_use = "dropping a RenderLoop stops rendering"]
pub struct RenderLoop {
    task: ScopedTask,
}

impl RenderLoop {
    /// Start rendering `engine` onto `canvas` every `interval`
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        engine: SharedEngine,
        mut canvas: Box<dyn Canvas>,
        loader: Arc<dyn SpriteLoader>,
        interval: Duration,
    ) -> Self {
        let task = ScopedTask::spawn("render-loop", async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut loads: JoinSet<LoadResult> = JoinSet::new();

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let request = {
                            let mut engine = engine.lock();
                            engine.tick();
                            engine.render(canvas.as_mut());
                            engine.take_load_request()
                        };
                        if let Some(request) = request {
                            let loader = Arc::clone(&loader);
                            loads.spawn(async move {
                                if !request.delay.is_zero() {
                                    tokio::time::sleep(request.delay).await;
                                }
                                let result = loader.load(request.address).await;
                                (request, result)
                            });
                        }
                    }
                    Some(joined) = loads.join_next(), if !loads.is_empty() => {
                        match joined {
                            Ok((request, result)) => {
                                engine.lock().complete_load(request, result);
                            }
                            Err(e) => tracing::warn!(error = %e, "Sprite load task failed"),
                        }
                    }
                }
            }
        });

        Self { task }
    }

    /// Whether the loop task has exited
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the loop and wait until it has stopped
    pub async fn stop(self) {
        self.task.stop().await;
    }
}
