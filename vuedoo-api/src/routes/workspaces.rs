/// Workspace endpoints
///
/// Workspaces are `workspace` blocks; threads are `thread` blocks whose
/// parent is a workspace. Every route requires an access key. Reads show
/// what the caller authored or holds a privilege on; update and delete
/// need authorship or the `admin` capability.
///
/// # Endpoints
///
/// - `GET  /api/workspaces[/:page_no]` - List workspaces with the plan summary
/// - `POST /api/workspaces/add` - Create a workspace
/// - `POST /api/workspaces/delete` - Soft-delete a workspace
/// - `GET  /api/workspace/:slug` - Workspace with its threads and metas
/// - `POST /api/workspace/:slug/update` - Update title, content and attributes
/// - `GET  /api/workspace/:slug/threads/:page` - List a workspace's threads

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use validator::Validate;
use vuedoo_shared::auth::access::AccessContext;
use vuedoo_shared::auth::privilege::{Capability, Privileges, PRIVILEGE_KEY_PREFIX};
use vuedoo_shared::models::block::kinds::{THREAD, WORKSPACE};
use vuedoo_shared::models::block::{Block, BlockDetail, BlockLookup, NewBlock};
use vuedoo_shared::models::meta::{Meta, MetaOwner};
use vuedoo_shared::models::query::Page;
use vuedoo_shared::models::subscription::subscription_info;

/// Attribute metas an update may set as top-level fields
pub const WORKSPACE_ATTRIBUTES: [&str; 6] = [
    "prompt",
    "description",
    "role",
    "tone",
    "collect_information",
    "questionnaire",
];

/// Create workspace request
#[derive(Debug, Deserialize, Validate)]
pub struct AddWorkspaceBody {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,

    /// Metas stored on the new workspace
    #[serde(default)]
    pub metas: BTreeMap<String, Value>,
}

/// Update workspace request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateWorkspaceBody {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: Option<String>,

    pub content: Option<String>,

    #[serde(default)]
    pub metas: BTreeMap<String, Value>,

    /// Top-level fields; only [`WORKSPACE_ATTRIBUTES`] are kept
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

/// Delete workspace request
#[derive(Debug, Deserialize)]
pub struct DeleteWorkspaceBody {
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub struct WorkspaceListResponse {
    pub status: String,
    pub items: Vec<Block>,
    pub limit: i64,
    pub subscription: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct WorkspaceCreatedResponse {
    pub status: String,
    pub block: Block,
}

#[derive(Debug, Serialize)]
pub struct WorkspaceResponse {
    pub status: String,

    /// The workspace, or `{}` when absent
    pub block: Value,
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, Serialize)]
pub struct ThreadListResponse {
    pub status: String,
    pub items: Vec<Block>,
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

fn require_user(ctx: &AccessContext) -> ApiResult<i64> {
    if ctx.is_anonymous() {
        return Err(ApiError::Unauthorized("Access key required".to_string()));
    }
    Ok(ctx.user_id)
}

/// Parses a page segment; anything but a positive integer is page 1
fn page_number(raw: &str) -> i64 {
    raw.parse::<i64>().ok().filter(|n| *n >= 1).unwrap_or(1)
}

/// Rejects meta keys that would write privilege entries
fn check_meta_keys<'a>(keys: impl IntoIterator<Item = &'a String>) -> ApiResult<()> {
    let reserved: Vec<ValidationErrorDetail> = keys
        .into_iter()
        .filter(|key| key.is_empty() || key.starts_with(PRIVILEGE_KEY_PREFIX))
        .map(|key| ValidationErrorDetail {
            field: format!("metas.{}", key),
            message: "Reserved or empty meta key".to_string(),
        })
        .collect();

    if reserved.is_empty() {
        Ok(())
    } else {
        Err(ApiError::ValidationError(reserved))
    }
}

async fn list_workspaces_at(state: AppState, ctx: AccessContext, page: i64) -> ApiResult<Json<WorkspaceListResponse>> {
    let user_id = require_user(&ctx)?;
    let limit = state.page_size();

    let items = Block::list(&state.db, user_id, WORKSPACE, Page::new(page, limit), None).await?;
    let subscription = subscription_info(&state.db, user_id).await?;

    Ok(Json(WorkspaceListResponse {
        status: "success".to_string(),
        items,
        limit,
        subscription,
    }))
}

/// `GET /api/workspaces`
pub async fn list_workspaces(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
) -> ApiResult<Json<WorkspaceListResponse>> {
    list_workspaces_at(state, ctx, 1).await
}

/// `GET /api/workspaces/:page_no`
pub async fn list_workspaces_page(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Path(page_no): Path<String>,
) -> ApiResult<Json<WorkspaceListResponse>> {
    list_workspaces_at(state, ctx, page_number(&page_no)).await
}

/// `POST /api/workspaces/add`
///
/// The creator is granted `["admin"]` on the new workspace.
pub async fn add_workspace(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    body: Result<Json<AddWorkspaceBody>, JsonRejection>,
) -> ApiResult<Json<WorkspaceCreatedResponse>> {
    let user_id = require_user(&ctx)?;
    let Json(body) = body?;
    body.validate()?;
    check_meta_keys(body.metas.keys())?;

    let block = Block::create(&state.db, &mut OsRng, NewBlock::new(user_id, WORKSPACE, body.title)).await?;

    Privileges::grant(&state.db, &block.kind, block.id, user_id, &[Capability::admin()]).await?;

    let owner = MetaOwner::new(block.kind.clone(), block.id);
    for (key, value) in &body.metas {
        Meta::put(&state.db, &owner, key, value).await?;
    }

    tracing::info!(block_id = block.id, user_id, "Workspace created");

    Ok(Json(WorkspaceCreatedResponse {
        status: "success".to_string(),
        block,
    }))
}

/// `GET /api/workspace/:slug`
///
/// The workspace comes with its visible threads and all of its metas.
pub async fn get_workspace(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Path(slug): Path<String>,
) -> ApiResult<Json<WorkspaceResponse>> {
    let user_id = require_user(&ctx)?;

    let lookup = BlockLookup::for_viewer(user_id)
        .kind(WORKSPACE)
        .slug(slug)
        .with_children(THREAD);
    let detail: Option<BlockDetail> = Block::get(&state.db, lookup).await?;

    let (status, block) = match detail {
        Some(detail) => (
            "success",
            serde_json::to_value(&detail)
                .map_err(|e| ApiError::InternalError(format!("Failed to encode workspace: {}", e)))?,
        ),
        None => ("fail", Value::Object(Map::new())),
    };

    Ok(Json(WorkspaceResponse {
        status: status.to_string(),
        block,
        page: 1,
        limit: state.page_size(),
    }))
}

/// `POST /api/workspace/:slug/update`
///
/// Title and content are upserted by slug. Attribute metas given either as
/// top-level fields or under `metas` are written, plus `last_updated_by`.
pub async fn update_workspace(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Path(slug): Path<String>,
    body: Result<Json<UpdateWorkspaceBody>, JsonRejection>,
) -> ApiResult<Json<StatusResponse>> {
    let user_id = require_user(&ctx)?;
    let Json(body) = body?;
    body.validate()?;
    check_meta_keys(body.metas.keys())?;

    let workspace = Block::find_by_slug(&state.db, user_id, WORKSPACE, &slug)
        .await?
        .ok_or_else(|| ApiError::NotFound("Workspace not found".to_string()))?;

    Privileges::require(&state.db, &workspace, user_id, &Capability::admin()).await?;

    let title = body.title.unwrap_or_else(|| workspace.title.clone());
    let content = body.content.unwrap_or_else(|| workspace.content.clone());
    let updated = Block::create(
        &state.db,
        &mut OsRng,
        NewBlock::new(workspace.author, workspace.kind.clone(), title)
            .content(content)
            .slug(workspace.slug.clone()),
    )
    .await?;

    let owner = MetaOwner::new(updated.kind.clone(), updated.id);
    let attributes = body
        .attributes
        .iter()
        .filter(|(key, _)| WORKSPACE_ATTRIBUTES.contains(&key.as_str()));

    for (key, value) in attributes.chain(body.metas.iter()) {
        Meta::put(&state.db, &owner, key, value).await?;
    }
    Meta::put(&state.db, &owner, "last_updated_by", &user_id).await?;

    tracing::info!(block_id = updated.id, user_id, "Workspace updated");

    Ok(Json(StatusResponse {
        status: "success".to_string(),
    }))
}

/// `GET /api/workspace/:slug/threads/:page`
pub async fn list_threads(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Path((slug, page)): Path<(String, String)>,
) -> ApiResult<Json<ThreadListResponse>> {
    let user_id = require_user(&ctx)?;
    let page = page_number(&page);
    let limit = state.page_size();

    let workspace = Block::find_by_slug(&state.db, user_id, WORKSPACE, &slug)
        .await?
        .ok_or_else(|| ApiError::NotFound("Workspace not found".to_string()))?;

    let items = Block::list(&state.db, user_id, THREAD, Page::new(page, limit), Some(workspace.id)).await?;

    Ok(Json(ThreadListResponse {
        status: "success".to_string(),
        items,
        page,
        limit,
    }))
}

/// `POST /api/workspaces/delete`
///
/// Soft delete; threads and metas stay in place but become unreachable
/// through the workspace.
pub async fn delete_workspace(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    body: Result<Json<DeleteWorkspaceBody>, JsonRejection>,
) -> ApiResult<Json<StatusResponse>> {
    let user_id = require_user(&ctx)?;
    let Json(body) = body?;

    let lookup = BlockLookup::for_viewer(user_id).kind(WORKSPACE).id(body.id);
    let workspace = Block::find(&state.db, &lookup)
        .await?
        .ok_or_else(|| ApiError::NotFound("Workspace not found".to_string()))?;

    Privileges::require(&state.db, &workspace, user_id, &Capability::admin()).await?;

    let deleted = Block::delete(&state.db, workspace.id).await?;
    if deleted {
        tracing::info!(block_id = workspace.id, user_id, "Workspace deleted");
    }

    Ok(Json(StatusResponse {
        status: if deleted { "success" } else { "fail" }.to_string(),
    }))
}
