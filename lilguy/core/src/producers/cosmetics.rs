//! Cosmetic pickers
//!
//! Stage, color and name changes carry no health delta but still react: a
//! stage change plays `hatch` for an egg and `shocked` otherwise, the other
//! pickers play a short happy bounce.
//!
//! The cosmetic key is written before the effect, so a surface has already
//! switched stage when the reaction animation arrives.

use super::{ActionSink, Effect};
use crate::creature::{AnimationName, CreatureColor, Stage, DEFAULT_NAME};
use crate::keys::{ColorKey, NameKey, StageKey};

const SOURCE: &str = "cosmetics";

/// Stage, color and name pickers
#[derive(Clone, Debug)]
pub struct Cosmetics {
    sink: ActionSink,
}

impl Cosmetics {
    /// Pickers acting through `sink`
    #[must_use]
    pub fn new(sink: ActionSink) -> Self {
        Self { sink }
    }

    /// Change the stage
    pub fn set_stage(&self, stage: Stage) {
        self.sink.context().store().write::<StageKey>(&stage);
        let reaction = if stage == Stage::Egg {
            AnimationName::Hatch
        } else {
            AnimationName::Shocked
        };
        self.sink.apply(Effect::new(reaction, 60, 0, SOURCE));
    }

    /// Change the color
    pub fn set_color(&self, color: CreatureColor) {
        self.sink.context().store().write::<ColorKey>(&color);
        self.sink.apply(Effect::new(AnimationName::Happy, 30, 0, SOURCE));
    }

    /// Rename; a blank name restores the default. Returns the stored name.
    pub fn set_name(&self, name: &str) -> String {
        let trimmed = name.trim();
        let name = if trimmed.is_empty() {
            DEFAULT_NAME.to_string()
        } else {
            trimmed.to_string()
        };
        self.sink.context().store().write::<NameKey>(&name);
        self.sink.apply(Effect::new(AnimationName::Happy, 30, 0, SOURCE));
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Host;
    use crate::creature::CreatureState;
    use crate::health::Health;
    use crate::relay::RelayHub;
    use crate::store::MemoryBackend;
    use std::sync::Arc;

    fn pickers() -> Cosmetics {
        let host = Host::new(Arc::new(MemoryBackend::new()), RelayHub::default());
        Cosmetics::new(ActionSink::new(host.open_context("main")))
    }

    #[test]
    fn test_stage_reaction() {
        let pickers = pickers();
        pickers.set_stage(Stage::Egg);
        let state = CreatureState::hydrate(pickers.sink.context().store());
        assert_eq!(state.stage, Stage::Egg);
        assert_eq!(state.animation, AnimationName::Hatch);
        assert_eq!(state.health, Health::MAX);

        pickers.set_stage(Stage::Angel);
        let state = CreatureState::hydrate(pickers.sink.context().store());
        assert_eq!(state.animation, AnimationName::Shocked);
    }

    #[test]
    fn test_name_is_trimmed_and_defaulted() {
        let pickers = pickers();
        assert_eq!(pickers.set_name("  Gus "), "Gus");
        assert_eq!(pickers.set_name("   "), DEFAULT_NAME);
        pickers.set_color(CreatureColor::Pink);
        let state = CreatureState::hydrate(pickers.sink.context().store());
        assert_eq!(state.color, CreatureColor::Pink);
        assert_eq!(state.name, DEFAULT_NAME);
    }
}
