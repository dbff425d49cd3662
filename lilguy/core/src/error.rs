//! Crate-level error type

use thiserror::Error;

use crate::animation::AssetError;
use crate::config::ConfigError;
use crate::producers::RemoteError;
use crate::relay::ContextId;
use crate::store::StoreError;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, LilGuyError>;

/// Errors surfaced by LilGuy operations
#[derive(Debug, Error)]
pub enum LilGuyError {
    /// Durable backend failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Sprite sheet failure
    #[error(transparent)]
    Asset(#[from] AssetError),

    /// Remote goal service failure
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Configuration failure
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No goal with this id
    #[error("Goal not found: {0}")]
    GoalNotFound(String),

    /// Another context already runs the timer for this counter
    #[error("Timer for {key} is owned by {owner}")]
    TimerOwned {
        /// Counter key
        key: String,
        /// Context holding the lease
        owner: ContextId,
    },
}
