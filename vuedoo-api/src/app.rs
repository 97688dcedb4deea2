/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use vuedoo_api::{app::AppState, config::Config};
/// use vuedoo_shared::mail::LogMailer;
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config, Arc::new(LogMailer));
/// let app = vuedoo_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use vuedoo_shared::auth::access::{self, ACCESS_KEY_HEADER, DOMAIN_HEADER};
use vuedoo_shared::login::LoginSettings;
use vuedoo_shared::mail::Mailer;

/// Shared application state
///
/// Cloned into every handler through `State`; everything heavy sits behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub mailer: Arc<dyn Mailer>,
    pub login: Arc<LoginSettings>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config, mailer: Arc<dyn Mailer>) -> Self {
        let login = Arc::new(config.login_settings());
        Self {
            db,
            config: Arc::new(config),
            mailer,
            login,
        }
    }

    /// Items per page of listings
    pub fn page_size(&self) -> i64 {
        self.config.api.page_size
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /
/// ├── GET  /health
/// └── /api/                              # access context resolved per request
///     ├── POST /login
///     ├── POST /verify
///     ├── GET  /welcome
///     ├── GET  /workspaces[/:page_no]
///     ├── POST /workspaces/add
///     ├── POST /workspaces/delete
///     ├── GET  /workspace/:slug
///     ├── POST /workspace/:slug/update
///     └── GET  /workspace/:slug/threads/:page
/// ```
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let api_routes = Router::new()
        .route("/login", post(routes::auth::login))
        .route("/verify", post(routes::auth::verify))
        .route("/welcome", get(routes::health::welcome))
        .route("/workspaces", get(routes::workspaces::list_workspaces))
        .route("/workspaces/add", post(routes::workspaces::add_workspace))
        .route("/workspaces/delete", post(routes::workspaces::delete_workspace))
        .route("/workspaces/:page_no", get(routes::workspaces::list_workspaces_page))
        .route("/workspace/:slug", get(routes::workspaces::get_workspace))
        .route("/workspace/:slug/update", post(routes::workspaces::update_workspace))
        .route("/workspace/:slug/threads/:page", get(routes::workspaces::list_threads))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            access_context_layer,
        ));

    Router::new()
        .merge(health_routes)
        .nest("/api", api_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.cors_permissive() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(DOMAIN_HEADER),
            HeaderName::from_static(ACCESS_KEY_HEADER),
        ])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Resolves `X-Vuedoo-Domain` and `X-Vuedoo-Access-Key` into an
/// `AccessContext` request extension
///
/// Missing headers resolve to tenant 0 / anonymous; an access key matching
/// no user is rejected with 401.
async fn access_context_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (domain, access_key) = {
        let headers = req.headers();
        (header_value(headers, DOMAIN_HEADER), header_value(headers, ACCESS_KEY_HEADER))
    };

    let ctx = access::resolve(&state.db, &domain, &access_key).await?;
    req.extensions_mut().insert(ctx);

    Ok(next.run(req).await)
}

/// Header value as an owned string; missing or non-ASCII values are empty
fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
