//! Typed client for the BrainQuiz backend
//!
//! Reads of list and detail endpoints go through the read cache; writes go
//! through the dispatcher uncached and, once the backend confirms them with
//! `success: true`, invalidate the cached reads of the resource they touched.
//! Joining or leaving a class and submitting answers only touch reads that are
//! never cached, so they invalidate nothing.

use std::sync::Arc;

use reqwest::Method;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use crate::cache::spawn_sweep_task;
use crate::config::Config;
use crate::fetch::Fetcher;
use crate::models::{
    AnswerSubmission, AuditLogPage, AuditLogQuery, NamedInput, QuestionInput, QuizInput, Resource,
    decode_data,
};
use crate::transport::{ApiRequest, HttpTransport, is_logical_success};
use crate::{Error, Result};

const JOINED_CLASSES_PATH: &str = "/kelas/get-kelas-by-user";

/// BrainQuiz API client
#[derive(Clone)]
pub struct ApiClient {
    fetcher: Fetcher,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a client over an existing fetcher
    pub fn new(fetcher: Fetcher, base_url: &str, token: Option<String>) -> Result<Self> {
        Url::parse(base_url)
            .map_err(|e| Error::Config(format!("Invalid base URL '{base_url}': {e}")))?;
        Ok(Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Create an HTTP client from configuration
    ///
    /// Starts the cache sweep task when `cache.sweep_interval` is set, so this
    /// must run inside a tokio runtime in that case.
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(config.api.request_timeout)?);
        let fetcher = Fetcher::from_config(transport, config);

        if let (Some(cache), Some(interval)) = (fetcher.cache(), config.cache.sweep_interval) {
            spawn_sweep_task(Arc::clone(cache), interval);
        }

        Self::new(fetcher, &config.api.base_url, config.api.resolve_token())
    }

    /// The request pipeline
    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, method: Method, url: String) -> ApiRequest {
        let request = ApiRequest::new(method, url).header("Content-Type", "application/json");
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {token}")),
            None => request,
        }
    }

    async fn read(&self, path: &str) -> Result<Value> {
        let request = self.request(Method::GET, self.url(path));
        self.fetcher.cached_fetch(request).await
    }

    async fn read_uncached(&self, url: String) -> Result<Value> {
        let request = self.request(Method::GET, url);
        self.fetcher.execute(request).await
    }

    async fn send_json(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let mut request = self.request(method, self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        self.fetcher.execute(request).await
    }

    /// Send a write and, once the backend reports `success: true`, drop the
    /// cached reads whose key contains `invalidates`
    async fn write(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        invalidates: &str,
    ) -> Result<Value> {
        let result = self.send_json(method, path, body).await?;

        if is_logical_success(&result) {
            let removed = self.fetcher.invalidate(invalidates);
            debug!(path, invalidates, removed, "Write confirmed");
        } else {
            debug!(path, "Write answered without success flag, cache kept");
        }
        Ok(result)
    }

    // ── Generic CRUD ─────────────────────────────────────────────────────────

    /// List every record of `resource` (cached)
    pub async fn list(&self, resource: Resource) -> Result<Value> {
        self.read(&resource.list_path()).await
    }

    /// Create a record
    pub async fn create(&self, resource: Resource, body: Value) -> Result<Value> {
        self.write(
            Method::POST,
            &resource.add_path(),
            Some(body),
            &resource.list_path(),
        )
        .await
    }

    /// Update a record
    pub async fn update(&self, resource: Resource, id: u64, body: Value) -> Result<Value> {
        self.write(
            Method::PATCH,
            &resource.update_path(id),
            Some(body),
            &resource.list_path(),
        )
        .await
    }

    /// Delete a record
    pub async fn delete(&self, resource: Resource, id: u64) -> Result<Value> {
        self.write(
            Method::DELETE,
            &resource.delete_path(id),
            None,
            &resource.list_path(),
        )
        .await
    }

    // ── Taxonomy ─────────────────────────────────────────────────────────────

    /// List categories
    pub async fn list_categories(&self) -> Result<Value> {
        self.list(Resource::Categories).await
    }

    /// Create a category
    pub async fn create_category(&self, input: &NamedInput) -> Result<Value> {
        self.create(Resource::Categories, serde_json::to_value(input)?)
            .await
    }

    /// Update a category
    pub async fn update_category(&self, id: u64, input: &NamedInput) -> Result<Value> {
        self.update(Resource::Categories, id, serde_json::to_value(input)?)
            .await
    }

    /// Delete a category
    pub async fn delete_category(&self, id: u64) -> Result<Value> {
        self.delete(Resource::Categories, id).await
    }

    /// List grade levels
    pub async fn list_grade_levels(&self) -> Result<Value> {
        self.list(Resource::GradeLevels).await
    }

    /// Create a grade level
    pub async fn create_grade_level(&self, input: &NamedInput) -> Result<Value> {
        self.create(Resource::GradeLevels, serde_json::to_value(input)?)
            .await
    }

    /// Update a grade level
    pub async fn update_grade_level(&self, id: u64, input: &NamedInput) -> Result<Value> {
        self.update(Resource::GradeLevels, id, serde_json::to_value(input)?)
            .await
    }

    /// Delete a grade level
    pub async fn delete_grade_level(&self, id: u64) -> Result<Value> {
        self.delete(Resource::GradeLevels, id).await
    }

    /// List education tracks
    pub async fn list_education_tracks(&self) -> Result<Value> {
        self.list(Resource::EducationTracks).await
    }

    /// Create an education track
    pub async fn create_education_track(&self, input: &NamedInput) -> Result<Value> {
        self.create(Resource::EducationTracks, serde_json::to_value(input)?)
            .await
    }

    /// Update an education track
    pub async fn update_education_track(&self, id: u64, input: &NamedInput) -> Result<Value> {
        self.update(Resource::EducationTracks, id, serde_json::to_value(input)?)
            .await
    }

    /// Delete an education track
    pub async fn delete_education_track(&self, id: u64) -> Result<Value> {
        self.delete(Resource::EducationTracks, id).await
    }

    // ── Classes ──────────────────────────────────────────────────────────────

    /// List classes
    pub async fn list_classes(&self) -> Result<Value> {
        self.list(Resource::Classes).await
    }

    /// Fetch one class (cached)
    pub async fn get_class(&self, id: u64) -> Result<Value> {
        self.read(&format!("{}/{id}", Resource::Classes.list_path()))
            .await
    }

    /// Create a class
    pub async fn create_class(&self, input: &NamedInput) -> Result<Value> {
        self.create(Resource::Classes, serde_json::to_value(input)?)
            .await
    }

    /// Update a class
    pub async fn update_class(&self, id: u64, input: &NamedInput) -> Result<Value> {
        self.update(Resource::Classes, id, serde_json::to_value(input)?)
            .await
    }

    /// Delete a class
    pub async fn delete_class(&self, id: u64) -> Result<Value> {
        self.delete(Resource::Classes, id).await
    }

    /// Classes the current user has joined (uncached)
    pub async fn joined_classes(&self) -> Result<Value> {
        self.read_uncached(self.url(JOINED_CLASSES_PATH)).await
    }

    /// Join a class with its join code
    pub async fn join_class(&self, join_code: &str) -> Result<Value> {
        let join_code = join_code.trim();
        if join_code.is_empty() {
            return Err(Error::Validation("Join code is required".to_string()));
        }
        self.send_json(
            Method::POST,
            "/kelas/join-by-code",
            Some(json!({ "join_code": join_code })),
        )
        .await
    }

    /// Leave a class
    pub async fn leave_class(&self, class_id: u64) -> Result<Value> {
        self.send_json(
            Method::DELETE,
            &format!("/kelas/leave-class/{class_id}"),
            None,
        )
        .await
    }

    // ── Quizzes ──────────────────────────────────────────────────────────────

    /// List quizzes
    pub async fn list_quizzes(&self) -> Result<Value> {
        self.list(Resource::Quizzes).await
    }

    /// Quizzes of one class (uncached)
    pub async fn quizzes_by_class(&self, class_id: u64) -> Result<Value> {
        let mut url = Url::parse(&self.url("/kuis/filter-kuis"))
            .map_err(|e| Error::Internal(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("kelas_id", &class_id.to_string());
        self.read_uncached(url.into()).await
    }

    /// Create a quiz
    pub async fn create_quiz(&self, input: &QuizInput) -> Result<Value> {
        self.create(Resource::Quizzes, serde_json::to_value(input)?)
            .await
    }

    /// Update a quiz
    pub async fn update_quiz(&self, id: u64, input: &QuizInput) -> Result<Value> {
        self.update(Resource::Quizzes, id, serde_json::to_value(input)?)
            .await
    }

    /// Delete a quiz
    pub async fn delete_quiz(&self, id: u64) -> Result<Value> {
        self.delete(Resource::Quizzes, id).await
    }

    // ── Questions ────────────────────────────────────────────────────────────

    /// List every question
    pub async fn list_questions(&self) -> Result<Value> {
        self.list(Resource::Questions).await
    }

    /// Questions of one quiz (cached)
    pub async fn questions_by_quiz(&self, quiz_id: u64) -> Result<Value> {
        self.read(&format!("{}/{quiz_id}", Resource::Questions.list_path()))
            .await
    }

    /// Create a question
    pub async fn create_question(&self, input: &QuestionInput) -> Result<Value> {
        self.create(Resource::Questions, input.to_payload()?).await
    }

    /// Update a question
    pub async fn update_question(&self, id: u64, input: &QuestionInput) -> Result<Value> {
        self.update(Resource::Questions, id, input.to_payload()?)
            .await
    }

    /// Delete a question
    pub async fn delete_question(&self, id: u64) -> Result<Value> {
        self.delete(Resource::Questions, id).await
    }

    // ── Results ──────────────────────────────────────────────────────────────

    /// Submit answers for grading
    pub async fn submit_answers(&self, answers: &[AnswerSubmission]) -> Result<Value> {
        if answers.is_empty() {
            return Err(Error::Validation("No answers to submit".to_string()));
        }
        self.send_json(
            Method::POST,
            "/hasil-kuis/submit-jawaban",
            Some(serde_json::to_value(answers)?),
        )
        .await
    }

    /// Results of the current user (uncached)
    pub async fn my_results(&self) -> Result<Value> {
        self.read_uncached(self.url("/hasil-kuis/my-results")).await
    }

    // ── Audit ────────────────────────────────────────────────────────────────

    /// One page of audit logs (uncached)
    pub async fn audit_logs(&self, query: &AuditLogQuery) -> Result<AuditLogPage> {
        let mut url =
            Url::parse(&self.url("/audit/logs")).map_err(|e| Error::Internal(e.to_string()))?;
        query.apply(&mut url);
        let envelope = self.read_uncached(url.into()).await?;
        decode_data(envelope)
    }
}
