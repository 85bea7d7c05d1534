//! Template repository factory

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::TemplateStoreConfig;

use super::memory_repository::MemoryTemplateRepository;
use super::postgres_repository::PostgresTemplateRepository;
use super::repository::TemplateRepository;

/// Create a template repository based on configuration.
///
/// Returns the implementation named by the `backend` setting:
/// - `"postgres"`: a `PostgresTemplateRepository` if a pool is provided
/// - `"memory"` (default): a `MemoryTemplateRepository`
///
/// # Example
///
/// ```rust,ignore
/// let repository = create_template_repository(&settings.template, postgres.map(|p| p.pool().clone()));
/// ```
pub fn create_template_repository(
    settings: &TemplateStoreConfig,
    postgres_pool: Option<PgPool>,
) -> Arc<dyn TemplateRepository> {
    match settings.backend.as_str() {
        "postgres" => {
            if let Some(pool) = postgres_pool {
                tracing::info!(backend = "postgres", "Creating PostgreSQL template repository");
                Arc::new(PostgresTemplateRepository::new(pool))
            } else {
                tracing::warn!(
                    "PostgreSQL backend requested but no pool provided, falling back to memory"
                );
                Arc::new(MemoryTemplateRepository::new())
            }
        }
        "memory" => {
            tracing::info!(backend = "memory", "Creating memory template repository");
            Arc::new(MemoryTemplateRepository::new())
        }
        other => {
            tracing::warn!(backend = %other, "Unknown template backend, using memory");
            Arc::new(MemoryTemplateRepository::new())
        }
    }
}
