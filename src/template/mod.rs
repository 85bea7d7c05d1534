//! Notification template system.
//!
//! This module provides:
//! - The [`Template`] aggregate with its status lifecycle
//! - Storage behind [`TemplateRepository`] (in-memory or PostgreSQL)
//! - A Go-style template language with contextual HTML escaping
//! - [`TemplateService`], the use cases exposed over HTTP
//!
//! # Example
//!
//! ```ignore
//! let service = TemplateService::new(
//!     create_template_repository(&settings.template, None),
//!     Arc::new(HtmlTemplateRenderer::new()),
//! );
//!
//! let created = service.create(CreateTemplateCommand {
//!     name: "Verify email".to_string(),
//!     slug: "mail-verify-otp".to_string(),
//!     subject: "Your code".to_string(),
//!     content: "<p>Code: {{.otp}}</p>".to_string(),
//!     template_type: "email".to_string(),
//!     created_by: 1,
//!     ..Default::default()
//! }).await?;
//!
//! let rendered = service.render(RenderTemplateQuery {
//!     template_slug: Some("mail-verify-otp".to_string()),
//!     variables: json!({"otp": "123456"}).as_object().cloned(),
//!     ..Default::default()
//! }).await?;
//! ```

pub mod engine;
mod factory;
mod memory_repository;
mod postgres_repository;
mod renderer;
mod repository;
mod service;
mod types;

pub use factory::create_template_repository;
pub use memory_repository::{create_memory_repository, MemoryTemplateRepository};
pub use postgres_repository::PostgresTemplateRepository;
pub use renderer::{HtmlTemplateRenderer, TemplateRenderer};
pub use repository::TemplateRepository;
pub use service::{
    CreateTemplateCommand, FilterTemplatesQuery, GetTemplateQuery, RenderTemplateQuery,
    RenderTemplateResponse, TemplateListItem, TemplateListResponse, TemplateService,
    TemplateView, UpdateTemplateCommand,
};
pub use types::{
    is_valid_template_type, ErrorKind, ListTemplateFilters, RenderedTemplate, Template,
    TemplateError, TemplateResult, TemplateStatus, TemplateType, Variables, CONTENT_TYPE_HTML,
};
