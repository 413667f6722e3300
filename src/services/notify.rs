//! Notification collaborator.

use async_trait::async_trait;

use crate::auth::identity::UserInfo;
use crate::error::{AppError, AppResult};

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Subscribe the given user to notifications about `target_user_id`'s posts.
    async fn subscribe(&self, target_user_id: i64, subscriber: &UserInfo) -> AppResult<()>;
    /// Register a user for push notifications on first login.
    async fn add_user(&self, user: &UserInfo) -> AppResult<()>;
}

/// HTTP client against the notification service's JSON API.
pub struct HttpNotifier {
    base_uri: Option<String>,
    http: reqwest::Client,
}

impl HttpNotifier {
    pub fn new(base_uri: Option<String>, http: reqwest::Client) -> Self {
        Self { base_uri, http }
    }

    fn base(&self) -> AppResult<&str> {
        self.base_uri.as_deref().ok_or(AppError::Config("BULLETIN_NOTIFY_SERVICE_URI"))
    }
}

fn notify_err(e: reqwest::Error) -> AppError {
    AppError::Collaborator(format!("notification service: {}", e))
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn subscribe(&self, target_user_id: i64, subscriber: &UserInfo) -> AppResult<()> {
        let response = self
            .http
            .post(format!("{}/subscriptions", self.base()?))
            .json(&serde_json::json!({
                "target_user_id": target_user_id,
                "subscriber": subscriber,
            }))
            .send()
            .await
            .map_err(notify_err)?;
        if !response.status().is_success() {
            return Err(AppError::Collaborator(format!(
                "notification service returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn add_user(&self, user: &UserInfo) -> AppResult<()> {
        let response = self
            .http
            .post(format!("{}/users", self.base()?))
            .json(user)
            .send()
            .await
            .map_err(notify_err)?;
        if !response.status().is_success() {
            return Err(AppError::Collaborator(format!(
                "notification service returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
