use std::sync::Arc;
use std::time::Instant;

use crate::auth::JwtValidator;
use crate::config::Settings;
use crate::notification::{LogTransport, NotificationTransport, TemplateNotifier};
use crate::postgres::PostgresPool;
use crate::template::{
    create_template_repository, HtmlTemplateRenderer, TemplateRepository, TemplateService,
};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub jwt_validator: Arc<JwtValidator>,
    pub template_service: Arc<TemplateService>,
    pub notifier: Arc<TemplateNotifier>,
    pub postgres_pool: Option<PostgresPool>,
    pub start_time: Instant,
}

impl AppState {
    /// Build the state, choosing the template backend from settings.
    pub fn new(settings: Settings, postgres_pool: Option<PostgresPool>) -> Self {
        let repository = create_template_repository(
            &settings.template,
            postgres_pool.as_ref().map(|p| p.pool().clone()),
        );
        Self::with_parts(settings, repository, Arc::new(LogTransport), postgres_pool)
    }

    pub fn with_parts(
        settings: Settings,
        repository: Arc<dyn TemplateRepository>,
        transport: Arc<dyn NotificationTransport>,
        postgres_pool: Option<PostgresPool>,
    ) -> Self {
        let jwt_validator = Arc::new(JwtValidator::new(&settings.jwt));
        let template_service = Arc::new(TemplateService::new(
            repository,
            Arc::new(HtmlTemplateRenderer::new()),
        ));
        let notifier = Arc::new(TemplateNotifier::new(template_service.clone(), transport));

        Self {
            settings: Arc::new(settings),
            jwt_validator,
            template_service,
            notifier,
            postgres_pool,
            start_time: Instant::now(),
        }
    }
}
