pub mod handler;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header::InvalidHeaderValue},
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_embed::ServeEmbed;
use rust_embed::Embed;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tower_livereload::LiveReloadLayer;

use crate::CONFIG;
use crate::api::HttpApi;
use crate::auth::{AuthError, AuthSession, IdentityProvider, SessionStatus, TokenSource};
use crate::mutate::{MutationError, Mutator};
use crate::settings::Settings;

pub const LOGIN_PATH: &str = "/login";

/// Event fired by successful adds. The results list listens for it.
pub const RESULTS_CHANGED: &str = "results-changed";

#[derive(Embed, Clone)]
#[folder = "static/"]
pub struct StaticDir;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Askama(#[from] askama::Error),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Mutation(#[from] MutationError),
    #[error(transparent)]
    Internal(#[from] InvalidHeaderValue),
}

/// Marks a response that should become a login redirect. The session gate
/// turns it into the right kind of redirect for the request.
#[derive(Debug, Clone, Copy)]
struct LoginRequired;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let login_required = match &self {
            AppError::Auth(_) => true,
            AppError::Mutation(e) => e.is_auth(),
            _ => false,
        };
        if login_required {
            tracing::info!(error = %self, "session no longer valid");
            let mut response = StatusCode::UNAUTHORIZED.into_response();
            response.extensions_mut().insert(LoginRequired);
            return response;
        }

        tracing::error!(error = %self, "request failed");

        #[cfg(debug_assertions)]
        let message = format!("Error: {:?}", self);

        #[cfg(not(debug_assertions))]
        let message = "Internal Server Error".to_string();

        let status = match &self {
            AppError::Mutation(MutationError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Mutation(MutationError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Mutation(MutationError::Api(_)) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, message).into_response()
    }
}

pub struct AppState {
    pub mutator: Mutator,
    pub session: Arc<AuthSession>,
    pub redirect_uri: String,
    pub public_url: String,
}

impl AppState {
    pub fn new(settings: &Settings) -> Result<Self> {
        let provider =
            IdentityProvider::new(&settings.auth).context("invalid identity provider settings")?;
        let session = Arc::new(AuthSession::new(provider));
        let tokens: Arc<dyn TokenSource> = session.clone();
        let api = HttpApi::new(&settings.api_url()?, Some(tokens))
            .context("could not create api client")?;

        Ok(AppState {
            mutator: Mutator::new(Arc::new(api)),
            session,
            redirect_uri: settings.redirect_uri(),
            public_url: settings.public_url.clone(),
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let gated = Router::new()
        .route("/", get(handler::index))
        .route("/organizations", get(handler::results))
        .route("/organization/new", get(handler::organization::new_form))
        .route("/organization", post(handler::organization::create))
        .route("/contact/new", get(handler::contact::new_form))
        .route("/contact/organizations", get(handler::contact::picker))
        .route("/contact", post(handler::contact::create))
        .route(
            "/contact/{id}",
            get(handler::contact::view)
                .put(handler::contact::save)
                .delete(handler::contact::delete),
        )
        .route("/contact/{id}/edit", get(handler::contact::edit))
        .route(
            "/contact/{id}/{field}/edit",
            get(handler::contact::field::edit),
        )
        .route(
            "/contact/{id}/{field}",
            get(handler::contact::field::view).put(handler::contact::field::save),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    Router::new()
        .merge(gated)
        .route(LOGIN_PATH, get(handler::auth::login))
        .route(CONFIG.auth.callback_path, get(handler::auth::callback))
        .route("/logout", get(handler::auth::logout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .nest_service("/static", ServeEmbed::<StaticDir>::new())
}

pub async fn run(settings: Settings, port: Option<&str>) -> Result<()> {
    let state = AppState::new(&settings)?;
    let app = router(Arc::new(state)).layer(LiveReloadLayer::new());

    let port = port.unwrap_or(CONFIG.serve.port);
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("could not listen")?;

    tracing::info!(%addr, public_url = %settings.public_url, api = %settings.api_url, "serving");
    axum::serve(listener, app)
        .await
        .context("could not start server")?;

    Ok(())
}

/// Everything behind this gate needs an authenticated session. Handlers
/// that find the session expired mid-request are redirected the same way.
async fn require_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let htmx = headers.contains_key("hx-request");
    match state.session.status().await {
        SessionStatus::Authenticated => {}
        SessionStatus::Error if !htmx => {
            let message = state.session.error_message().await.unwrap_or_default();
            return handler::auth::error_page(message);
        }
        _ => return login_redirect(htmx),
    }

    let response = next.run(request).await;
    if response.extensions().get::<LoginRequired>().is_some() {
        return login_redirect(htmx);
    }

    response
}

fn login_redirect(htmx: bool) -> Response {
    if htmx {
        hx_redirect(LOGIN_PATH).unwrap_or_else(|e| e.into_response())
    } else {
        Redirect::to(LOGIN_PATH).into_response()
    }
}

pub fn hx_redirect(url: &str) -> Result<Response, AppError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("hx-redirect"),
        HeaderValue::from_str(url)?,
    );

    Ok((StatusCode::OK, headers).into_response())
}

/// Adds an `HX-Trigger` header firing `event` on the client.
pub fn hx_trigger(mut response: Response, event: &'static str) -> Response {
    response.headers_mut().insert(
        HeaderName::from_static("hx-trigger"),
        HeaderValue::from_static(event),
    );

    response
}

#[cfg(test)]
mod tests;
