//! PostgreSQL-backed template repository.
//!
//! Table structure (see `migrations/0001_create_templates.sql`):
//! - `templates` - one row per template, `slug` unique

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::pagination::Paging;

use super::repository::TemplateRepository;
use super::types::{ListTemplateFilters, Template, TemplateError, TemplateResult};

/// SQLSTATE for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

const SELECT_COLUMNS: &str = "SELECT id, name, slug, subject, content, type, status, variables, \
     description, created_by, created_at, updated_at FROM templates";

#[derive(Debug, sqlx::FromRow)]
struct TemplateRow {
    id: i64,
    name: String,
    slug: String,
    subject: String,
    content: String,
    #[sqlx(rename = "type")]
    template_type: String,
    status: String,
    variables: Vec<String>,
    description: String,
    created_by: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TemplateRow> for Template {
    type Error = TemplateError;

    fn try_from(row: TemplateRow) -> Result<Self, Self::Error> {
        let template_type = row.template_type.parse().map_err(|_| {
            TemplateError::Storage(format!(
                "template {} has unknown type {:?}",
                row.id, row.template_type
            ))
        })?;
        let status = row.status.parse().map_err(|_| {
            TemplateError::Storage(format!(
                "template {} has unknown status {:?}",
                row.id, row.status
            ))
        })?;

        Ok(Template::restore(
            row.id,
            row.name,
            row.slug,
            row.subject,
            row.content,
            template_type,
            status,
            row.variables,
            row.description,
            row.created_by,
            row.created_at,
            row.updated_at,
        ))
    }
}

/// Template repository over a `PgPool`.
pub struct PostgresTemplateRepository {
    pool: PgPool,
}

impl PostgresTemplateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Escape `%`, `_` and `\` so a search term matches literally inside ILIKE.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn map_sqlx_error(err: sqlx::Error, subject: String) -> TemplateError {
    match err {
        sqlx::Error::RowNotFound => TemplateError::NotFound(subject),
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            TemplateError::AlreadyExists(subject)
        }
        other => TemplateError::Storage(other.to_string()),
    }
}

/// Append the WHERE clause for `filters`; parameters are always bound.
fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filters: &ListTemplateFilters) {
    let mut separator = " WHERE ";

    if let Some(template_type) = filters.template_type {
        query.push(separator).push("type = ").push_bind(template_type.as_str());
        separator = " AND ";
    }
    if let Some(status) = filters.status {
        query.push(separator).push("status = ").push_bind(status.as_str());
        separator = " AND ";
    }
    if let Some(created_by) = filters.created_by {
        query.push(separator).push("created_by = ").push_bind(created_by);
        separator = " AND ";
    }
    if !filters.search.is_empty() {
        let pattern = format!("%{}%", escape_like(&filters.search));
        query
            .push(separator)
            .push("(name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR slug ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

#[async_trait]
impl TemplateRepository for PostgresTemplateRepository {
    async fn create(&self, template: &mut Template) -> TemplateResult<()> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO templates (name, slug, subject, content, type, status, variables,
                                   description, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(template.name())
        .bind(template.slug())
        .bind(template.subject())
        .bind(template.content())
        .bind(template.template_type().as_str())
        .bind(template.status().as_str())
        .bind(template.variables())
        .bind(template.description())
        .bind(template.created_by())
        .bind(template.created_at())
        .bind(template.updated_at())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, template.slug().to_string()))?;

        template.set_id(id);

        tracing::debug!(template_id = id, slug = %template.slug(), "Template inserted");
        Ok(())
    }

    async fn get_by_id(&self, id: i64) -> TemplateResult<Template> {
        let row: TemplateRow = sqlx::query_as(&format!("{} WHERE id = $1", SELECT_COLUMNS))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, format!("id {}", id)))?;

        row.try_into()
    }

    async fn get_by_slug(&self, slug: &str) -> TemplateResult<Template> {
        let row: TemplateRow = sqlx::query_as(&format!("{} WHERE slug = $1", SELECT_COLUMNS))
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, format!("slug {}", slug)))?;

        row.try_into()
    }

    async fn list(
        &self,
        filters: &ListTemplateFilters,
        paging: &mut Paging,
    ) -> TemplateResult<Vec<Template>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM templates");
        push_filters(&mut count, filters);
        let (total,): (i64,) = count
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| TemplateError::Storage(e.to_string()))?;

        paging.total = total;

        let mut query = QueryBuilder::<Postgres>::new(SELECT_COLUMNS);
        push_filters(&mut query, filters);
        query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(paging.limit)
            .push(" OFFSET ")
            .push_bind(paging.offset());

        let rows: Vec<TemplateRow> = query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| TemplateError::Storage(e.to_string()))?;

        rows.into_iter().map(Template::try_from).collect()
    }

    async fn update(&self, template: &mut Template) -> TemplateResult<()> {
        template.touch();

        let result = sqlx::query(
            r#"
            UPDATE templates
            SET name = $2, subject = $3, content = $4, status = $5, variables = $6,
                description = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(template.id())
        .bind(template.name())
        .bind(template.subject())
        .bind(template.content())
        .bind(template.status().as_str())
        .bind(template.variables())
        .bind(template.description())
        .bind(template.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| TemplateError::Storage(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(TemplateError::NotFound(format!("id {}", template.id())));
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> TemplateResult<()> {
        let result = sqlx::query("DELETE FROM templates WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| TemplateError::Storage(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(TemplateError::NotFound(format!("id {}", id)));
        }
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::types::{TemplateStatus, TemplateType};

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_filter_sql() {
        let filters = ListTemplateFilters {
            template_type: Some(TemplateType::Email),
            status: Some(TemplateStatus::Active),
            created_by: None,
            search: "otp".to_string(),
        };
        let mut query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM templates");
        push_filters(&mut query, &filters);

        assert_eq!(
            query.sql(),
            "SELECT COUNT(*) FROM templates WHERE type = $1 AND status = $2 AND \
             (name ILIKE $3 OR description ILIKE $4 OR slug ILIKE $5)"
        );
    }

    #[test]
    fn test_no_filters_no_where() {
        let mut query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM templates");
        push_filters(&mut query, &ListTemplateFilters::default());
        assert_eq!(query.sql(), "SELECT COUNT(*) FROM templates");
    }

    fn row(template_type: &str, status: &str) -> TemplateRow {
        let now = Utc::now();
        TemplateRow {
            id: 3,
            name: "n".to_string(),
            slug: "s".to_string(),
            subject: String::new(),
            content: "c".to_string(),
            template_type: template_type.to_string(),
            status: status.to_string(),
            variables: vec!["otp".to_string()],
            description: String::new(),
            created_by: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_row_hydrates_template() {
        let template = Template::try_from(row("sms", "active")).unwrap();
        assert_eq!(template.id(), 3);
        assert_eq!(template.template_type(), TemplateType::Sms);
        assert_eq!(template.status(), TemplateStatus::Active);
        assert_eq!(template.variables(), ["otp".to_string()]);
    }

    #[test]
    fn test_row_with_unknown_status_is_storage_error() {
        let err = Template::try_from(row("email", "archived")).unwrap_err();
        assert!(matches!(err, TemplateError::Storage(_)));
    }
}
