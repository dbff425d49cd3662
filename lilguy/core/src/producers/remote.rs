//! Remote goal persistence
//!
//! The goal service is an opaque create/update/delete API keyed by goal id.
//! Calls are issued fire-and-forget by the [`GoalTracker`](super::GoalTracker);
//! nothing here retries.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::goals::Goal;

/// Errors from the remote goal service
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Connection, timeout or body decoding failure
    #[error("Goal service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-success status
    #[error("Goal service returned {status} for {url}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Request URL
        url: String,
    },
}

/// Opaque remote persistence for goals
#[async_trait]
pub trait GoalService: Send + Sync {
    /// Persist a new goal; returns the stored record
    async fn create(&self, goal: &Goal) -> Result<Goal, RemoteError>;

    /// Replace an existing goal; returns the stored record
    async fn update(&self, goal: &Goal) -> Result<Goal, RemoteError>;

    /// Delete a goal by id
    async fn delete(&self, id: &str) -> Result<(), RemoteError>;
}

// =============================================================================
// HTTP
// =============================================================================

/// JSON-over-HTTP goal service
///
/// `POST {base}/goals`, `PUT {base}/goals/{id}`, `DELETE {base}/goals/{id}`.
#[derive(Clone, Debug)]
pub struct HttpGoalService {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpGoalService {
    /// Create a client for `base_url`
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Transport` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            base_url,
            http_client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    fn goals_url(&self) -> String {
        format!("{}/goals", self.base_url)
    }

    fn goal_url(&self, id: &str) -> String {
        format!("{}/goals/{}", self.base_url, id)
    }

    fn check(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(RemoteError::Status {
                status: status.as_u16(),
                url: response.url().to_string(),
            })
        }
    }
}

#[async_trait]
impl GoalService for HttpGoalService {
    async fn create(&self, goal: &Goal) -> Result<Goal, RemoteError> {
        let response = self
            .http_client
            .post(self.goals_url())
            .json(goal)
            .send()
            .await?;
        Ok(Self::check(response)?.json().await?)
    }

    async fn update(&self, goal: &Goal) -> Result<Goal, RemoteError> {
        let response = self
            .http_client
            .put(self.goal_url(&goal.id))
            .json(goal)
            .send()
            .await?;
        Ok(Self::check(response)?.json().await?)
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        let response = self.http_client.delete(self.goal_url(id)).send().await?;
        Self::check(response)?;
        Ok(())
    }
}

// =============================================================================
// Offline
// =============================================================================

/// Service that accepts everything, used when no remote is configured
#[derive(Clone, Copy, Debug, Default)]
pub struct OfflineGoalService;

#[async_trait]
impl GoalService for OfflineGoalService {
    async fn create(&self, goal: &Goal) -> Result<Goal, RemoteError> {
        Ok(goal.clone())
    }

    async fn update(&self, goal: &Goal) -> Result<Goal, RemoteError> {
        Ok(goal.clone())
    }

    async fn delete(&self, _id: &str) -> Result<(), RemoteError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_trim_trailing_slash() {
        let service = HttpGoalService::new("http://localhost:8080/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(service.goals_url(), "http://localhost:8080/api/goals");
        assert_eq!(service.goal_url("abc"), "http://localhost:8080/api/goals/abc");
    }

    #[tokio::test]
    async fn test_offline_echoes() {
        let goal = Goal::new("Drink water");
        let service = OfflineGoalService;
        assert_eq!(service.create(&goal).await.unwrap(), goal);
        assert!(service.delete(&goal.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_http_is_transport_error() {
        // Port 9 (discard) on localhost is not served in test environments
        let service = HttpGoalService::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        let err = service.delete("g1").await.unwrap_err();
        assert!(matches!(err, RemoteError::Transport(_)));
    }
}
