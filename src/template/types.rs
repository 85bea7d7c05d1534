//! Template aggregate, value types and error definitions

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Variables supplied to a render call.
pub type Variables = serde_json::Map<String, serde_json::Value>;

/// Content type of every rendered template.
pub const CONTENT_TYPE_HTML: &str = "text/html";

/// Coarse classification of template errors, used by callers to pick a
/// response without matching on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    Conflict,
    Forbidden,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Template-specific error type
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid template type: {0}")]
    InvalidType(String),

    #[error("Invalid template status: {0}")]
    InvalidStatus(String),

    #[error("Template syntax error: {0}")]
    Syntax(String),

    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Template already exists: {0}")]
    AlreadyExists(String),

    #[error("Template is not active: {0}")]
    Inactive(String),

    #[error("Template rendering failed: {0}")]
    RenderFailed(String),

    #[error("Template storage error: {0}")]
    Storage(String),
}

impl TemplateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TemplateError::InvalidArgument(_)
            | TemplateError::InvalidType(_)
            | TemplateError::InvalidStatus(_)
            | TemplateError::Syntax(_) => ErrorKind::InvalidArgument,
            TemplateError::NotFound(_) => ErrorKind::NotFound,
            TemplateError::AlreadyExists(_) => ErrorKind::Conflict,
            TemplateError::Inactive(_) => ErrorKind::Forbidden,
            TemplateError::RenderFailed(_) | TemplateError::Storage(_) => ErrorKind::Internal,
        }
    }
}

/// Result type for template operations
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Delivery channel a template is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateType {
    Email,
    Sms,
    Push,
}

impl TemplateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateType::Email => "email",
            TemplateType::Sms => "sms",
            TemplateType::Push => "push",
        }
    }

    /// Whether `candidate` names one of the template types.
    pub fn is_valid(candidate: &str) -> bool {
        candidate.parse::<TemplateType>().is_ok()
    }
}

impl FromStr for TemplateType {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(TemplateType::Email),
            "sms" => Ok(TemplateType::Sms),
            "push" => Ok(TemplateType::Push),
            other => Err(TemplateError::InvalidType(other.to_string())),
        }
    }
}

impl fmt::Display for TemplateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-function alias of [`TemplateType::is_valid`].
pub fn is_valid_template_type(candidate: &str) -> bool {
    TemplateType::is_valid(candidate)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateStatus {
    #[default]
    Draft,
    Active,
    Inactive,
}

impl TemplateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateStatus::Draft => "draft",
            TemplateStatus::Active => "active",
            TemplateStatus::Inactive => "inactive",
        }
    }
}

impl FromStr for TemplateStatus {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(TemplateStatus::Draft),
            "active" => Ok(TemplateStatus::Active),
            "inactive" => Ok(TemplateStatus::Inactive),
            other => Err(TemplateError::InvalidStatus(other.to_string())),
        }
    }
}

impl fmt::Display for TemplateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A notification template.
///
/// `slug`, `template_type`, `created_by` and `created_at` are fixed at
/// construction; status only moves through [`Template::activate`],
/// [`Template::deactivate`] and [`Template::mark_draft`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Template {
    /// Store-assigned identifier, `0` until the template is created
    id: i64,

    name: String,

    /// Unique, immutable lookup key
    slug: String,

    /// Subject line template (may be empty)
    subject: String,

    /// Body template
    content: String,

    #[serde(rename = "type")]
    template_type: TemplateType,

    status: TemplateStatus,

    /// Variable names the template expects (informational only)
    variables: Vec<String>,

    description: String,

    created_by: i64,

    created_at: DateTime<Utc>,

    updated_at: DateTime<Utc>,
}

impl Template {
    /// Construct a draft template.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        slug: impl Into<String>,
        subject: impl Into<String>,
        content: impl Into<String>,
        template_type: &str,
        variables: Vec<String>,
        description: impl Into<String>,
        created_by: i64,
    ) -> TemplateResult<Self> {
        let name = name.into();
        let slug = slug.into();
        let content = content.into();

        if name.is_empty() {
            return Err(TemplateError::InvalidArgument(
                "template name is required".to_string(),
            ));
        }
        if slug.is_empty() {
            return Err(TemplateError::InvalidArgument(
                "template slug is required".to_string(),
            ));
        }
        if content.is_empty() {
            return Err(TemplateError::InvalidArgument(
                "template content is required".to_string(),
            ));
        }
        let template_type = template_type
            .parse::<TemplateType>()
            .map_err(|_| TemplateError::InvalidArgument("invalid template type".to_string()))?;

        let now = Utc::now();
        Ok(Self {
            id: 0,
            name,
            slug,
            subject: subject.into(),
            content,
            template_type,
            status: TemplateStatus::Draft,
            variables,
            description: description.into(),
            created_by,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuild a stored template without re-running construction checks.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore(
        id: i64,
        name: String,
        slug: String,
        subject: String,
        content: String,
        template_type: TemplateType,
        status: TemplateStatus,
        variables: Vec<String>,
        description: String,
        created_by: i64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            slug,
            subject,
            content,
            template_type,
            status,
            variables,
            description,
            created_by,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn template_type(&self) -> TemplateType {
        self.template_type
    }

    pub fn status(&self) -> TemplateStatus {
        self.status
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn created_by(&self) -> i64 {
        self.created_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Assigned by the store on create.
    pub(crate) fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    /// Stamp `updated_at` with the current time.
    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Copy the fields an update may change from `source`, leaving the
    /// identity fields of `self` alone.
    pub(crate) fn apply_changes(&mut self, source: &Template) {
        self.name.clone_from(&source.name);
        self.subject.clone_from(&source.subject);
        self.content.clone_from(&source.content);
        self.status = source.status;
        self.variables.clone_from(&source.variables);
        self.description.clone_from(&source.description);
        self.updated_at = source.updated_at;
    }

    pub fn activate(&mut self) {
        self.status = TemplateStatus::Active;
        self.updated_at = Utc::now();
    }

    pub fn deactivate(&mut self) {
        self.status = TemplateStatus::Inactive;
        self.updated_at = Utc::now();
    }

    pub fn mark_draft(&mut self) {
        self.status = TemplateStatus::Draft;
        self.updated_at = Utc::now();
    }

    /// Partial update: empty strings and `None` leave the field unchanged.
    pub fn update(
        &mut self,
        name: &str,
        subject: &str,
        content: &str,
        description: &str,
        variables: Option<Vec<String>>,
    ) {
        if !name.is_empty() {
            self.name = name.to_string();
        }
        if !subject.is_empty() {
            self.subject = subject.to_string();
        }
        if !content.is_empty() {
            self.content = content.to_string();
        }
        if !description.is_empty() {
            self.description = description.to_string();
        }
        if let Some(variables) = variables {
            self.variables = variables;
        }
        self.updated_at = Utc::now();
    }

    pub fn is_active(&self) -> bool {
        self.status == TemplateStatus::Active
    }
}

/// Output of a successful render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedTemplate {
    pub subject: String,
    pub content: String,
    pub content_type: String,
}

/// Filters for listing templates. All present filters must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListTemplateFilters {
    pub template_type: Option<TemplateType>,
    pub status: Option<TemplateStatus>,
    pub created_by: Option<i64>,
    /// Case-insensitive substring of name, description or slug
    pub search: String,
}

impl ListTemplateFilters {
    /// In-process evaluation of the filters, matching what the SQL store does.
    pub fn matches(&self, template: &Template) -> bool {
        if self.template_type.is_some_and(|t| t != template.template_type) {
            return false;
        }
        if self.status.is_some_and(|s| s != template.status) {
            return false;
        }
        if self.created_by.is_some_and(|c| c != template.created_by) {
            return false;
        }
        if self.search.is_empty() {
            return true;
        }

        let needle = self.search.to_lowercase();
        [&template.name, &template.description, &template.slug]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}
