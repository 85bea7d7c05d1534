//! Template use cases.
//!
//! `TemplateService` is the only place that combines the repository and the
//! renderer. It validates input, enforces the "only active templates render"
//! rule, logs and records metrics for every operation.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::{outcome_label, TemplateMetrics};
use crate::pagination::Paging;

use super::renderer::TemplateRenderer;
use super::repository::TemplateRepository;
use super::types::{
    ErrorKind, ListTemplateFilters, Template, TemplateError, TemplateResult, TemplateStatus,
    TemplateType, Variables,
};

// ============================================================================
// Commands and queries
// ============================================================================

/// Input for creating a template. `created_by` is set by the caller from the
/// authenticated user, never from the request body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTemplateCommand {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub subject: String,
    pub content: String,
    #[serde(rename = "type")]
    pub template_type: String,
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(skip)]
    pub created_by: i64,
}

/// Partial update. Empty strings leave fields unchanged; `variables: None`
/// keeps the current list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTemplateCommand {
    #[serde(skip)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub variables: Option<Vec<String>>,
    #[serde(default)]
    pub description: String,
    /// `draft`, `active` or `inactive`; empty keeps the current status
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetTemplateQuery {
    pub id: Option<i64>,
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterTemplatesQuery {
    #[serde(rename = "type", default)]
    pub template_type: String,
    #[serde(default)]
    pub status: String,
    pub created_by: Option<i64>,
    #[serde(default)]
    pub search: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RenderTemplateQuery {
    pub template_id: Option<i64>,
    pub template_slug: Option<String>,
    #[serde(default)]
    pub variables: Option<Variables>,
}

// ============================================================================
// Views
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateView {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub subject: String,
    pub content: String,
    #[serde(rename = "type")]
    pub template_type: TemplateType,
    pub status: TemplateStatus,
    pub variables: Vec<String>,
    pub description: String,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Template> for TemplateView {
    fn from(t: Template) -> Self {
        Self {
            id: t.id(),
            name: t.name().to_string(),
            slug: t.slug().to_string(),
            subject: t.subject().to_string(),
            content: t.content().to_string(),
            template_type: t.template_type(),
            status: t.status(),
            variables: t.variables().to_vec(),
            description: t.description().to_string(),
            created_by: t.created_by(),
            created_at: t.created_at(),
            updated_at: t.updated_at(),
        }
    }
}

/// List entry without the template bodies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateListItem {
    pub id: i64,
    pub name: String,
    pub slug: String,
    #[serde(rename = "type")]
    pub template_type: TemplateType,
    pub status: TemplateStatus,
    pub description: String,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Template> for TemplateListItem {
    fn from(t: Template) -> Self {
        Self {
            id: t.id(),
            name: t.name().to_string(),
            slug: t.slug().to_string(),
            template_type: t.template_type(),
            status: t.status(),
            description: t.description().to_string(),
            created_by: t.created_by(),
            created_at: t.created_at(),
            updated_at: t.updated_at(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateListResponse {
    pub templates: Vec<TemplateListItem>,
    pub paging: Paging,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderTemplateResponse {
    pub subject: String,
    pub content: String,
    pub content_type: String,
    pub template_id: i64,
}

// ============================================================================
// Service
// ============================================================================

pub struct TemplateService {
    repository: Arc<dyn TemplateRepository>,
    renderer: Arc<dyn TemplateRenderer>,
}

impl TemplateService {
    pub fn new(
        repository: Arc<dyn TemplateRepository>,
        renderer: Arc<dyn TemplateRenderer>,
    ) -> Self {
        Self {
            repository,
            renderer,
        }
    }

    pub fn repository(&self) -> &Arc<dyn TemplateRepository> {
        &self.repository
    }

    #[tracing::instrument(
        name = "template.create",
        skip(self, command),
        fields(slug = %command.slug, template_type = %command.template_type)
    )]
    pub async fn create(&self, command: CreateTemplateCommand) -> TemplateResult<TemplateView> {
        observe("create", self.do_create(command).await)
    }

    #[tracing::instrument(name = "template.update", skip(self, command), fields(template_id = command.id))]
    pub async fn update(&self, command: UpdateTemplateCommand) -> TemplateResult<TemplateView> {
        observe("update", self.do_update(command).await)
    }

    #[tracing::instrument(name = "template.get", skip(self))]
    pub async fn get(&self, query: GetTemplateQuery) -> TemplateResult<TemplateView> {
        let result = self
            .load(query.id, query.slug.as_deref(), "either id or slug must be provided")
            .await
            .map(TemplateView::from);
        observe("get", result)
    }

    #[tracing::instrument(name = "template.list", skip(self))]
    pub async fn list(
        &self,
        query: FilterTemplatesQuery,
        paging: Paging,
    ) -> TemplateResult<TemplateListResponse> {
        observe("list", self.do_list(query, paging).await)
    }

    #[tracing::instrument(
        name = "template.render",
        skip(self, query),
        fields(template_id = ?query.template_id, slug = ?query.template_slug)
    )]
    pub async fn render(&self, query: RenderTemplateQuery) -> TemplateResult<RenderTemplateResponse> {
        observe("render", self.do_render(query).await)
    }

    #[tracing::instrument(name = "template.delete", skip(self))]
    pub async fn delete(&self, id: i64) -> TemplateResult<()> {
        let result = self.repository.delete(id).await;
        if result.is_ok() {
            tracing::info!(template_id = id, "Template deleted");
        }
        observe("delete", result)
    }

    async fn do_create(&self, command: CreateTemplateCommand) -> TemplateResult<TemplateView> {
        command.template_type.parse::<TemplateType>()?;
        self.renderer.validate_template(&command.content)?;
        if !command.subject.is_empty() {
            self.renderer.validate_template(&command.subject)?;
        }

        let mut template = Template::new(
            command.name,
            command.slug,
            command.subject,
            command.content,
            &command.template_type,
            command.variables,
            command.description,
            command.created_by,
        )?;
        self.repository.create(&mut template).await?;

        tracing::info!(
            template_id = template.id(),
            slug = %template.slug(),
            created_by = template.created_by(),
            "Template created"
        );
        Ok(template.into())
    }

    async fn do_update(&self, command: UpdateTemplateCommand) -> TemplateResult<TemplateView> {
        let mut template = self.repository.get_by_id(command.id).await?;

        if !command.content.is_empty() {
            self.renderer.validate_template(&command.content)?;
        }
        if !command.subject.is_empty() {
            self.renderer.validate_template(&command.subject)?;
        }

        template.update(
            &command.name,
            &command.subject,
            &command.content,
            &command.description,
            command.variables,
        );

        match command.status.as_str() {
            "" => {}
            other => match other.parse::<TemplateStatus>()? {
                TemplateStatus::Active => template.activate(),
                TemplateStatus::Inactive => template.deactivate(),
                TemplateStatus::Draft => template.mark_draft(),
            },
        }

        self.repository.update(&mut template).await?;

        tracing::info!(
            template_id = template.id(),
            status = %template.status(),
            "Template updated"
        );
        Ok(template.into())
    }

    async fn do_list(
        &self,
        query: FilterTemplatesQuery,
        mut paging: Paging,
    ) -> TemplateResult<TemplateListResponse> {
        let template_type = match query.template_type.as_str() {
            "" => None,
            other => Some(other.parse::<TemplateType>()?),
        };
        let status = match query.status.as_str() {
            "" => None,
            other => Some(other.parse::<TemplateStatus>()?),
        };
        let filters = ListTemplateFilters {
            template_type,
            status,
            created_by: query.created_by,
            search: query.search,
        };

        paging.fulfill();
        let templates = self.repository.list(&filters, &mut paging).await?;

        Ok(TemplateListResponse {
            templates: templates.into_iter().map(TemplateListItem::from).collect(),
            paging,
        })
    }

    async fn do_render(&self, query: RenderTemplateQuery) -> TemplateResult<RenderTemplateResponse> {
        let template = self
            .load(
                query.template_id,
                query.template_slug.as_deref(),
                "either template_id or template_slug must be provided",
            )
            .await?;

        if !template.is_active() {
            return Err(TemplateError::Inactive(template.slug().to_string()));
        }

        let started = Instant::now();
        let result = self.renderer.render(&template, query.variables.as_ref());
        TemplateMetrics::record_render(outcome_label(&result), started.elapsed().as_secs_f64());
        let rendered = result?;

        tracing::debug!(template_id = template.id(), slug = %template.slug(), "Template rendered");

        Ok(RenderTemplateResponse {
            subject: rendered.subject,
            content: rendered.content,
            content_type: rendered.content_type,
            template_id: template.id(),
        })
    }

    /// Load by id when given, otherwise by slug.
    async fn load(
        &self,
        id: Option<i64>,
        slug: Option<&str>,
        missing: &str,
    ) -> TemplateResult<Template> {
        match (id, slug) {
            (Some(id), _) if id > 0 => self.repository.get_by_id(id).await,
            (_, Some(slug)) if !slug.is_empty() => self.repository.get_by_slug(slug).await,
            _ => Err(TemplateError::InvalidArgument(missing.to_string())),
        }
    }
}

/// Record the outcome of `operation` and log failures.
fn observe<T>(operation: &'static str, result: TemplateResult<T>) -> TemplateResult<T> {
    TemplateMetrics::record_operation(operation, outcome_label(&result));

    if let Err(e) = &result {
        if e.kind() == ErrorKind::Internal {
            tracing::error!(operation, error = %e, "Template operation failed");
        } else {
            tracing::debug!(operation, error = %e, "Template operation rejected");
        }
    }
    result
}
