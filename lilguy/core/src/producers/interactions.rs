//! Direct interaction buttons

use super::{ActionSink, Effect};
use crate::creature::AnimationName;
use crate::health::Health;

const SOURCE: &str = "interaction";

/// Pet and walk buttons
#[derive(Clone, Debug)]
pub struct Interactions {
    sink: ActionSink,
}

impl Interactions {
    /// Buttons acting through `sink`
    #[must_use]
    pub fn new(sink: ActionSink) -> Self {
        Self { sink }
    }

    /// +1 health, happy
    pub fn pet(&self) -> Health {
        self.sink.apply(Effect::new(AnimationName::Happy, 60, 1, SOURCE))
    }

    /// +1 health, walk
    pub fn walk(&self) -> Health {
        self.sink.apply(Effect::new(AnimationName::Walk, 30, 1, SOURCE))
    }
}
