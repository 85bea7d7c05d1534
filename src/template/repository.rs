//! Storage contract for templates.

use async_trait::async_trait;

use crate::pagination::Paging;

use super::types::{ListTemplateFilters, Template, TemplateResult};

/// Persistence for [`Template`] aggregates.
///
/// # Thread Safety
///
/// Implementations are shared across request handlers and must be
/// `Send + Sync`.
///
/// # Uniqueness
///
/// Slugs are unique. A duplicate slug must be rejected by the store itself,
/// atomically with the insert, so concurrent creates of one slug yield
/// exactly one success and [`TemplateError::AlreadyExists`] for the rest.
///
/// [`TemplateError::AlreadyExists`]: super::types::TemplateError::AlreadyExists
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    /// Persist a new template and write the assigned id back into it.
    async fn create(&self, template: &mut Template) -> TemplateResult<()>;

    async fn get_by_id(&self, id: i64) -> TemplateResult<Template>;

    async fn get_by_slug(&self, slug: &str) -> TemplateResult<Template>;

    /// One page of templates matching `filters`, newest first.
    ///
    /// Sets `paging.total` to the number of matches across all pages.
    async fn list(
        &self,
        filters: &ListTemplateFilters,
        paging: &mut Paging,
    ) -> TemplateResult<Vec<Template>>;

    /// Overwrite the mutable fields (name, subject, content, status,
    /// variables, description, updated_at) of the template with this id.
    /// Slug, type, creator and creation time are never written.
    async fn update(&self, template: &mut Template) -> TemplateResult<()>;

    async fn delete(&self, id: i64) -> TemplateResult<()>;

    /// Backend identifier for logs and health output.
    fn backend_type(&self) -> &'static str;
}
