//! Template endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::pagination::Paging;
use crate::server::AppState;
use crate::template::{
    CreateTemplateCommand, FilterTemplatesQuery, GetTemplateQuery, RenderTemplateQuery,
    RenderTemplateResponse, TemplateListResponse, TemplateView, UpdateTemplateCommand,
};

/// Query string of `GET /api/v1/templates`.
#[derive(Debug, Default, Deserialize)]
pub struct ListTemplatesParams {
    #[serde(rename = "type", default)]
    pub template_type: String,
    #[serde(default)]
    pub status: String,
    pub created_by: Option<i64>,
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub limit: i64,
}

fn parse_id(raw: &str) -> Result<i64> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::BadRequest(format!("invalid template id: {}", raw)))
}

/// POST /api/v1/templates/render - Render an active template
#[tracing::instrument(name = "http.render_template", skip(state, query))]
pub async fn render_template(
    State(state): State<AppState>,
    Json(query): Json<RenderTemplateQuery>,
) -> Result<Json<RenderTemplateResponse>> {
    let rendered = state.template_service.render(query).await?;
    Ok(Json(rendered))
}

/// GET /api/v1/templates/by-slug/{slug} - Get a template by slug
#[tracing::instrument(name = "http.get_template_by_slug", skip(state))]
pub async fn get_template_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<TemplateView>> {
    let template = state
        .template_service
        .get(GetTemplateQuery {
            id: None,
            slug: Some(slug),
        })
        .await?;
    Ok(Json(template))
}

/// POST /api/v1/templates - Create a new template
#[tracing::instrument(
    name = "http.create_template",
    skip(state, user, command),
    fields(user_id = user.user_id, slug = %command.slug)
)]
pub async fn create_template(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(mut command): Json<CreateTemplateCommand>,
) -> Result<(StatusCode, Json<TemplateView>)> {
    command.created_by = user.user_id;
    let created = state.template_service.create(command).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/v1/templates - List templates
#[tracing::instrument(name = "http.list_templates", skip(state))]
pub async fn list_templates(
    State(state): State<AppState>,
    Query(params): Query<ListTemplatesParams>,
) -> Result<Json<TemplateListResponse>> {
    let filters = FilterTemplatesQuery {
        template_type: params.template_type,
        status: params.status,
        created_by: params.created_by,
        search: params.search,
    };
    let paging = Paging::new(params.page, params.limit);

    let response = state.template_service.list(filters, paging).await?;
    Ok(Json(response))
}

/// GET /api/v1/templates/{id} - Get a specific template
#[tracing::instrument(name = "http.get_template", skip(state))]
pub async fn get_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TemplateView>> {
    let template = state
        .template_service
        .get(GetTemplateQuery {
            id: Some(parse_id(&id)?),
            slug: None,
        })
        .await?;
    Ok(Json(template))
}

/// PUT /api/v1/templates/{id} - Update an existing template
#[tracing::instrument(name = "http.update_template", skip(state, command))]
pub async fn update_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut command): Json<UpdateTemplateCommand>,
) -> Result<Json<TemplateView>> {
    command.id = parse_id(&id)?;
    let updated = state.template_service.update(command).await?;
    Ok(Json(updated))
}

/// DELETE /api/v1/templates/{id} - Delete a template
#[tracing::instrument(name = "http.delete_template", skip(state))]
pub async fn delete_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.template_service.delete(parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}
