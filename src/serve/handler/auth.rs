use std::sync::Arc;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use crate::CONFIG;
use crate::auth::AuthError;
use crate::config::Config;
use crate::serve::{AppError, AppState, LOGIN_PATH};

#[derive(Template, WebTemplate)]
#[template(path = "auth/error.html")]
pub struct AuthErrorTemplate {
    config: &'static Config,
    login: &'static str,
    message: String,
}

pub fn error_page(message: String) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        AuthErrorTemplate {
            config: &CONFIG,
            login: LOGIN_PATH,
            message,
        },
    )
        .into_response()
}

#[axum::debug_handler]
pub async fn login(State(state): State<Arc<AppState>>) -> Result<Redirect, AppError> {
    let url = state.session.begin_login(&state.redirect_uri).await?;

    Ok(Redirect::to(url.as_str()))
}

#[derive(Deserialize, Debug)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[axum::debug_handler]
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Response {
    if let Some(error) = params.error {
        let error = AuthError::Refused(params.error_description.unwrap_or(error));
        tracing::warn!(%error, "login refused");
        state.session.fail(&error).await;
        return error_page(error.to_string());
    }

    let (Some(code), Some(returned)) = (params.code, params.state) else {
        let error = AuthError::Refused("missing code".to_string());
        state.session.fail(&error).await;
        return error_page(error.to_string());
    };

    match state
        .session
        .complete_login(&code, &returned, &state.redirect_uri)
        .await
    {
        Ok(()) => Redirect::to("/").into_response(),
        Err(e) => error_page(e.to_string()),
    }
}

#[axum::debug_handler]
pub async fn logout(State(state): State<Arc<AppState>>) -> Result<Redirect, AppError> {
    let url = state.session.logout(&state.public_url).await?;

    Ok(Redirect::to(url.as_str()))
}
