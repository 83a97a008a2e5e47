//! Backend resources and request payloads
//!
//! Field names on the wire follow the backend (Indonesian resource names,
//! `Soal_id`-style answer keys); Rust-side names are English.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

use crate::{Error, Result};

/// CRUD resources exposed by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Resource {
    /// Quiz categories (`kategori`)
    Categories,
    /// Grade levels (`tingkatan`)
    GradeLevels,
    /// Education tracks (`pendidikan`)
    EducationTracks,
    /// Classes (`kelas`)
    Classes,
    /// Quizzes (`kuis`)
    Quizzes,
    /// Questions (`soal`)
    Questions,
}

impl Resource {
    /// Path segment used by the backend
    #[must_use]
    pub const fn segment(self) -> &'static str {
        match self {
            Self::Categories => "kategori",
            Self::GradeLevels => "tingkatan",
            Self::EducationTracks => "pendidikan",
            Self::Classes => "kelas",
            Self::Quizzes => "kuis",
            Self::Questions => "soal",
        }
    }

    /// `/kategori/get-kategori` style list path; also the invalidation pattern
    #[must_use]
    pub fn list_path(self) -> String {
        let s = self.segment();
        format!("/{s}/get-{s}")
    }

    /// Create path
    #[must_use]
    pub fn add_path(self) -> String {
        let s = self.segment();
        format!("/{s}/add-{s}")
    }

    /// Update path for `id`
    #[must_use]
    pub fn update_path(self, id: u64) -> String {
        let s = self.segment();
        format!("/{s}/update-{s}/{id}")
    }

    /// Delete path for `id`
    #[must_use]
    pub fn delete_path(self, id: u64) -> String {
        let s = self.segment();
        format!("/{s}/delete-{s}/{id}")
    }
}

/// Payload for categories, grade levels, education tracks and classes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedInput {
    /// Display name
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
}

impl NamedInput {
    /// Create a payload
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Quiz payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizInput {
    /// Quiz title
    pub title: String,
    /// Quiz description
    #[serde(default)]
    pub description: String,
    /// Category id
    #[serde(rename = "kategori_id")]
    pub category_id: u64,
    /// Grade level id
    #[serde(rename = "tingkatan_id")]
    pub grade_level_id: u64,
    /// Class id
    #[serde(rename = "kelas_id")]
    pub class_id: u64,
    /// Education track id
    #[serde(rename = "pendidikan_id")]
    pub education_track_id: u64,
}

/// Answer options for a question
#[derive(Debug, Clone, PartialEq)]
pub enum QuestionOptions {
    /// Already-serialized JSON, sent as is
    Raw(String),
    /// Structured options, serialized before sending
    Structured(Value),
}

/// Question payload
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionInput {
    /// Question text
    pub question: String,
    /// Answer options; required
    pub options: Option<QuestionOptions>,
    /// The correct option
    pub correct_answer: String,
    /// Quiz this question belongs to
    pub quiz_id: u64,
}

impl QuestionInput {
    /// Wire payload with `options_json` always a string
    pub fn to_payload(&self) -> Result<Value> {
        let options_json = match &self.options {
            Some(QuestionOptions::Raw(raw)) => raw.clone(),
            Some(QuestionOptions::Structured(value)) => serde_json::to_string(value)?,
            None => return Err(Error::Validation("Options data is required".to_string())),
        };

        Ok(json!({
            "question": self.question,
            "options_json": options_json,
            "correct_answer": self.correct_answer,
            "kuis_id": self.quiz_id,
        }))
    }
}

/// One answer in a quiz submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSubmission {
    /// Question id
    #[serde(rename = "Soal_id")]
    pub question_id: u64,
    /// Selected option
    #[serde(rename = "Answer")]
    pub answer: String,
    /// Answering user
    #[serde(rename = "User_id")]
    pub user_id: u64,
}

/// Audit-log filters; unset or empty fields are not sent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditLogQuery {
    /// 1-based page
    pub page: Option<u32>,
    /// Page size
    pub limit: Option<u32>,
    /// Filter by username
    pub username: Option<String>,
    /// Filter by action (`login`, `failed_login`, ...)
    pub action: Option<String>,
    /// Lower date bound, as the backend expects it (`YYYY-MM-DD`)
    pub date_from: Option<String>,
    /// Upper date bound
    pub date_to: Option<String>,
    /// Filter by client IP
    pub ip: Option<String>,
}

impl AuditLogQuery {
    /// Append the set filters to `url`'s query string
    pub fn apply(&self, url: &mut Url) {
        let numbers = [("page", self.page), ("limit", self.limit)];
        let strings = [
            ("username", &self.username),
            ("action", &self.action),
            ("date_from", &self.date_from),
            ("date_to", &self.date_to),
            ("ip", &self.ip),
        ];

        let mut pairs = Vec::new();
        for (name, value) in numbers {
            if let Some(v) = value.filter(|v| *v > 0) {
                pairs.push((name, v.to_string()));
            }
        }
        for (name, value) in strings {
            if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                pairs.push((name, v.to_string()));
            }
        }

        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
    }
}

/// One audit-log record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLog {
    /// Creation timestamp as sent by the backend
    #[serde(rename = "CreatedAt", default)]
    pub created_at: String,
    /// Acting user
    #[serde(default)]
    pub username: String,
    /// Action name
    #[serde(default)]
    pub action: String,
    /// Client IP
    #[serde(default)]
    pub ip_address: String,
    /// Role of the acting user
    #[serde(default)]
    pub role: String,
    /// Outcome
    #[serde(default)]
    pub status: String,
    /// Affected resource
    #[serde(default)]
    pub resource: Option<String>,
    /// Client user agent
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// Pagination block of an audit-log page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Current page
    pub page: u32,
    /// Page size
    pub limit: u32,
    /// Total records
    pub total: u64,
    /// Total pages
    #[serde(rename = "totalPages")]
    pub total_pages: u32,
}

/// One page of audit logs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogPage {
    /// Records on this page
    #[serde(default)]
    pub logs: Vec<AuditLog>,
    /// Paging information
    #[serde(default)]
    pub pagination: Pagination,
}

/// Decode the `data` member of a success envelope
pub fn decode_data<T: serde::de::DeserializeOwned>(envelope: Value) -> Result<T> {
    match envelope {
        Value::Object(mut map) => {
            let data = map.remove("data").unwrap_or(Value::Null);
            Ok(serde_json::from_value(data)?)
        }
        _ => Err(Error::InvalidResponse),
    }
}
