//! Post storage collaborator.
//!
//! Posts and comments live entirely in an external service; this side
//! forwards submitted form fields opaquely, plus the resolved user profile
//! as author context.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::identity::UserInfo;
use crate::error::{AppError, AppResult};

/// Submitted form data, forwarded without interpretation.
pub type FormFields = HashMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author_id: i64,
    pub author_name: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub author_name: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// A single post together with its comments, as returned for the detail page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDetail {
    pub post: Post,
    pub comments: Vec<Comment>,
}

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn create_post(&self, fields: &FormFields, author: &UserInfo) -> AppResult<()>;
    async fn get_post(&self, post_id: &str, requester: &UserInfo) -> AppResult<PostDetail>;
    async fn list_posts(&self) -> AppResult<Vec<Post>>;
    async fn create_comment(
        &self,
        fields: &FormFields,
        author: &UserInfo,
        post_id: &str,
    ) -> AppResult<()>;
}

/// HTTP client against the post service's JSON API.
pub struct HttpPostStore {
    base_uri: Option<String>,
    http: reqwest::Client,
}

impl HttpPostStore {
    pub fn new(base_uri: Option<String>, http: reqwest::Client) -> Self {
        Self { base_uri, http }
    }

    fn base(&self) -> AppResult<&str> {
        self.base_uri.as_deref().ok_or(AppError::Config("BULLETIN_POST_SERVICE_URI"))
    }
}

fn store_err(e: reqwest::Error) -> AppError {
    AppError::Collaborator(format!("post service: {}", e))
}

fn store_status(status: reqwest::StatusCode) -> AppError {
    AppError::Collaborator(format!("post service returned {}", status))
}

#[async_trait]
impl PostStore for HttpPostStore {
    async fn create_post(&self, fields: &FormFields, author: &UserInfo) -> AppResult<()> {
        let response = self
            .http
            .post(format!("{}/posts", self.base()?))
            .json(&serde_json::json!({ "fields": fields, "author": author }))
            .send()
            .await
            .map_err(store_err)?;
        if !response.status().is_success() {
            return Err(store_status(response.status()));
        }
        Ok(())
    }

    async fn get_post(&self, post_id: &str, requester: &UserInfo) -> AppResult<PostDetail> {
        let response = self
            .http
            .get(format!("{}/posts/{}", self.base()?, urlencoding::encode(post_id)))
            .query(&[("requester_id", requester.id)])
            .send()
            .await
            .map_err(store_err)?;
        if !response.status().is_success() {
            return Err(store_status(response.status()));
        }
        response.json().await.map_err(store_err)
    }

    async fn list_posts(&self) -> AppResult<Vec<Post>> {
        let response =
            self.http.get(format!("{}/posts", self.base()?)).send().await.map_err(store_err)?;
        if !response.status().is_success() {
            return Err(store_status(response.status()));
        }
        response.json().await.map_err(store_err)
    }

    async fn create_comment(
        &self,
        fields: &FormFields,
        author: &UserInfo,
        post_id: &str,
    ) -> AppResult<()> {
        let response = self
            .http
            .post(format!("{}/posts/{}/comments", self.base()?, urlencoding::encode(post_id)))
            .json(&serde_json::json!({ "fields": fields, "author": author }))
            .send()
            .await
            .map_err(store_err)?;
        if !response.status().is_success() {
            return Err(store_status(response.status()));
        }
        Ok(())
    }
}
