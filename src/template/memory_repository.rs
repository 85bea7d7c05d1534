//! In-memory template repository using DashMap.
//!
//! Templates are lost on restart. Used by default and in tests.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::pagination::Paging;

use super::repository::TemplateRepository;
use super::types::{ListTemplateFilters, Template, TemplateError, TemplateResult};

/// In-memory template storage.
///
/// Rows are keyed by id; a second map from slug to id enforces slug
/// uniqueness. The slug entry is reserved before the row is inserted, so two
/// concurrent creates with the same slug can never both succeed.
pub struct MemoryTemplateRepository {
    templates: DashMap<i64, Template>,
    slugs: DashMap<String, i64>,
    next_id: AtomicI64,
}

impl Default for MemoryTemplateRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTemplateRepository {
    pub fn new() -> Self {
        Self {
            templates: DashMap::new(),
            slugs: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    /// Number of stored templates
    pub fn count(&self) -> usize {
        self.templates.len()
    }
}

#[async_trait]
impl TemplateRepository for MemoryTemplateRepository {
    async fn create(&self, template: &mut Template) -> TemplateResult<()> {
        let id = match self.slugs.entry(template.slug().to_string()) {
            Entry::Occupied(_) => {
                return Err(TemplateError::AlreadyExists(template.slug().to_string()));
            }
            Entry::Vacant(entry) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                entry.insert(id);
                id
            }
        };

        template.set_id(id);
        self.templates.insert(id, template.clone());

        tracing::debug!(template_id = id, slug = %template.slug(), "Template stored in memory");
        Ok(())
    }

    async fn get_by_id(&self, id: i64) -> TemplateResult<Template> {
        self.templates
            .get(&id)
            .map(|t| t.clone())
            .ok_or_else(|| TemplateError::NotFound(format!("id {}", id)))
    }

    async fn get_by_slug(&self, slug: &str) -> TemplateResult<Template> {
        let id = self
            .slugs
            .get(slug)
            .map(|entry| *entry.value())
            .ok_or_else(|| TemplateError::NotFound(format!("slug {}", slug)))?;

        // The slug may be reserved by a create that has not inserted yet.
        self.templates
            .get(&id)
            .map(|t| t.clone())
            .ok_or_else(|| TemplateError::NotFound(format!("slug {}", slug)))
    }

    async fn list(
        &self,
        filters: &ListTemplateFilters,
        paging: &mut Paging,
    ) -> TemplateResult<Vec<Template>> {
        let mut matched: Vec<Template> = self
            .templates
            .iter()
            .filter(|entry| filters.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        matched.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        });

        paging.total = matched.len() as i64;

        let offset = usize::try_from(paging.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(paging.limit).unwrap_or(0);

        Ok(matched.into_iter().skip(offset).take(limit).collect())
    }

    async fn update(&self, template: &mut Template) -> TemplateResult<()> {
        let mut stored = self
            .templates
            .get_mut(&template.id())
            .ok_or_else(|| TemplateError::NotFound(format!("id {}", template.id())))?;

        template.touch();
        stored.apply_changes(template);

        Ok(())
    }

    async fn delete(&self, id: i64) -> TemplateResult<()> {
        let (_, removed) = self
            .templates
            .remove(&id)
            .ok_or_else(|| TemplateError::NotFound(format!("id {}", id)))?;

        self.slugs.remove(removed.slug());
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

/// Create an Arc-wrapped memory repository
pub fn create_memory_repository() -> Arc<MemoryTemplateRepository> {
    Arc::new(MemoryTemplateRepository::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::types::{ErrorKind, TemplateStatus, TemplateType};

    fn template(slug: &str) -> Template {
        Template::new(
            format!("Template {}", slug),
            slug,
            "Subject",
            "<p>{{.Name}}</p>",
            "email",
            vec!["Name".to_string()],
            "",
            1,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = MemoryTemplateRepository::new();

        let mut created = template("welcome");
        repo.create(&mut created).await.unwrap();
        assert!(created.id() > 0);

        let by_id = repo.get_by_id(created.id()).await.unwrap();
        assert_eq!(by_id, created);

        let by_slug = repo.get_by_slug("welcome").await.unwrap();
        assert_eq!(by_slug.id(), created.id());
    }

    #[tokio::test]
    async fn test_duplicate_slug_conflicts() {
        let repo = MemoryTemplateRepository::new();

        repo.create(&mut template("dup")).await.unwrap();
        let err = repo.create(&mut template("dup")).await.unwrap_err();

        assert!(matches!(err, TemplateError::AlreadyExists(_)));
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(repo.count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_creates_yield_one_success() {
        let repo = Arc::new(MemoryTemplateRepository::new());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let repo = repo.clone();
                tokio::spawn(async move { repo.create(&mut template("race")).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => successes += 1,
                Err(e) => assert_eq!(e.kind(), ErrorKind::Conflict),
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn test_missing_rows() {
        let repo = MemoryTemplateRepository::new();

        assert!(matches!(
            repo.get_by_id(42).await,
            Err(TemplateError::NotFound(_))
        ));
        assert!(matches!(
            repo.get_by_slug("nope").await,
            Err(TemplateError::NotFound(_))
        ));
        assert!(matches!(repo.delete(42).await, Err(TemplateError::NotFound(_))));

        let mut ghost = template("ghost");
        ghost.set_id(99);
        assert!(matches!(
            repo.update(&mut ghost).await,
            Err(TemplateError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_keeps_immutable_fields() {
        let repo = MemoryTemplateRepository::new();
        let mut stored = template("immutable");
        repo.create(&mut stored).await.unwrap();

        let mut changed = Template::restore(
            stored.id(),
            "Renamed".to_string(),
            "renamed".to_string(),
            stored.subject().to_string(),
            stored.content().to_string(),
            TemplateType::Sms,
            TemplateStatus::Active,
            vec![],
            String::new(),
            77,
            stored.created_at(),
            stored.updated_at(),
        );
        repo.update(&mut changed).await.unwrap();

        let reloaded = repo.get_by_id(stored.id()).await.unwrap();
        assert_eq!(reloaded.name(), "Renamed");
        assert_eq!(reloaded.status(), TemplateStatus::Active);
        assert_eq!(reloaded.slug(), "immutable");
        assert_eq!(reloaded.template_type(), TemplateType::Email);
        assert_eq!(reloaded.created_by(), 1);
        assert_eq!(reloaded.created_at(), stored.created_at());
    }

    #[tokio::test]
    async fn test_delete_frees_slug() {
        let repo = MemoryTemplateRepository::new();
        let mut stored = template("reuse");
        repo.create(&mut stored).await.unwrap();

        repo.delete(stored.id()).await.unwrap();
        assert!(repo.get_by_id(stored.id()).await.is_err());

        repo.create(&mut template("reuse")).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_orders_newest_first_and_pages() {
        let repo = MemoryTemplateRepository::new();
        for i in 0..5 {
            repo.create(&mut template(&format!("t-{}", i))).await.unwrap();
        }

        let mut paging = Paging::new(1, 2);
        let page = repo
            .list(&ListTemplateFilters::default(), &mut paging)
            .await
            .unwrap();
        assert_eq!(paging.total, 5);
        assert_eq!(page.len(), 2);
        assert!(page[0].created_at() >= page[1].created_at());
        assert_eq!(page[0].slug(), "t-4");

        let mut paging = Paging::new(3, 2);
        let last = repo
            .list(&ListTemplateFilters::default(), &mut paging)
            .await
            .unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].slug(), "t-0");

        let mut paging = Paging::new(9, 2);
        let beyond = repo
            .list(&ListTemplateFilters::default(), &mut paging)
            .await
            .unwrap();
        assert!(beyond.is_empty());
        assert_eq!(paging.total, 5);
    }

    #[tokio::test]
    async fn test_list_filters() {
        let repo = MemoryTemplateRepository::new();

        let mut active = template("order-confirmed");
        active.activate();
        repo.create(&mut active).await.unwrap();
        repo.create(&mut template("password-reset")).await.unwrap();

        let filters = ListTemplateFilters {
            status: Some(TemplateStatus::Active),
            ..Default::default()
        };
        let mut paging = Paging::new(1, 10);
        let found = repo.list(&filters, &mut paging).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].slug(), "order-confirmed");

        let filters = ListTemplateFilters {
            search: "PASSWORD".to_string(),
            ..Default::default()
        };
        let mut paging = Paging::new(1, 10);
        let found = repo.list(&filters, &mut paging).await.unwrap();
        assert_eq!(paging.total, 1);
        assert_eq!(found[0].slug(), "password-reset");
    }
}
