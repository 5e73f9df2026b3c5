use std::sync::Arc;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::CONFIG;
use crate::config::Config;
use crate::data::ContactField;
use crate::mutate::MutationError;
use crate::serve::handler::{FieldCell, filters, inline_error};
use crate::serve::{AppError, AppState};

#[derive(Template, WebTemplate)]
#[template(path = "contact/field_partial.html")]
pub struct FieldPartial {
    contact_id: String,
    cell: FieldCell,
}

#[axum::debug_handler]
pub async fn view(
    State(state): State<Arc<AppState>>,
    Path((id, field)): Path<(String, ContactField)>,
) -> Result<FieldPartial, AppError> {
    let store = state.mutator.store().await;
    let contact = store
        .contact(&id)
        .ok_or_else(|| MutationError::NotFound(id.clone()))?;

    Ok(FieldPartial {
        cell: FieldCell::new(contact, field),
        contact_id: id,
    })
}

#[derive(Template, WebTemplate)]
#[template(path = "contact/field_edit_partial.html")]
pub struct EditFieldPartial {
    config: &'static Config,
    contact_id: String,
    field: ContactField,
    value: String,
    error: Option<String>,
}

#[axum::debug_handler]
pub async fn edit(
    State(state): State<Arc<AppState>>,
    Path((id, field)): Path<(String, ContactField)>,
) -> Result<EditFieldPartial, AppError> {
    let store = state.mutator.store().await;
    let contact = store
        .contact(&id)
        .ok_or_else(|| MutationError::NotFound(id.clone()))?;

    Ok(EditFieldPartial {
        config: &CONFIG,
        value: contact.field_value(field),
        contact_id: id,
        field,
        error: None,
    })
}

#[derive(Deserialize)]
pub struct FieldForm {
    #[serde(default)]
    value: String,
}

#[axum::debug_handler]
pub async fn save(
    State(state): State<Arc<AppState>>,
    Path((id, field)): Path<(String, ContactField)>,
    Form(form): Form<FieldForm>,
) -> Result<Response, AppError> {
    match state
        .mutator
        .edit_contact_field(&id, field, &form.value)
        .await
    {
        Ok(contact) => Ok(FieldPartial {
            cell: FieldCell::new(&contact, field),
            contact_id: id,
        }
        .into_response()),
        Err(e) => {
            let error = inline_error(CONFIG.labels.save, e)?;
            Ok(EditFieldPartial {
                config: &CONFIG,
                contact_id: id,
                field,
                value: form.value,
                error: Some(error),
            }
            .into_response())
        }
    }
}
