use std::sync::Arc;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::CONFIG;
use crate::config::Config;
use crate::data::{ContactField, NewContact, ValidationError, parse_number};
use crate::mutate::MutationError;
use crate::serve::handler::{ContactRow, filters, inline_error};
use crate::serve::{AppError, AppState, RESULTS_CHANGED, hx_trigger};

pub mod field;

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ContactForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub position_name: String,
    pub org_number: Option<String>,
}

impl ContactForm {
    fn parse(&self) -> Result<NewContact, ValidationError> {
        let org_number = match self.org_number.as_deref().map(str::trim) {
            None | Some("") => return Err(ValidationError::NoOrganization),
            Some(raw) => parse_number(raw, "org_number")?,
        };
        let email = self.email.trim();

        Ok(NewContact {
            name: self.name.trim().to_string(),
            phone: parse_number(&self.phone, "phone")?,
            org_number,
            email: (!email.is_empty()).then(|| email.to_string()),
            position_name: self.position_name.trim().to_string(),
        })
    }

    fn org_number(&self) -> Option<i64> {
        self.org_number.as_deref()?.trim().parse().ok()
    }

    /// Field edits for a whole-record update.
    fn edits(&self) -> Vec<(ContactField, String)> {
        vec![
            (ContactField::Name, self.name.clone()),
            (ContactField::Phone, self.phone.clone()),
            (ContactField::Email, self.email.clone()),
            (ContactField::PositionName, self.position_name.clone()),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct PickerOption {
    pub org_number: i64,
    pub org_name: String,
    pub selected: bool,
}

async fn picker_options(state: &AppState, term: &str, selected: Option<i64>) -> Vec<PickerOption> {
    state
        .mutator
        .store()
        .await
        .picker(term)
        .into_iter()
        .map(|o| PickerOption {
            org_number: o.org_number,
            org_name: o.org_name.clone(),
            selected: Some(o.org_number) == selected,
        })
        .collect()
}

#[derive(Template, WebTemplate)]
#[template(path = "contact/new_partial.html")]
pub struct NewContactPartial {
    config: &'static Config,
    form: ContactForm,
    options: Vec<PickerOption>,
    error: Option<String>,
    saved: bool,
}

impl NewContactPartial {
    async fn new(state: &AppState, form: ContactForm, error: Option<String>) -> Self {
        NewContactPartial {
            config: &CONFIG,
            options: picker_options(state, "", form.org_number()).await,
            form,
            error,
            saved: false,
        }
    }
}

#[axum::debug_handler]
pub async fn new_form(State(state): State<Arc<AppState>>) -> Result<NewContactPartial, AppError> {
    Ok(NewContactPartial::new(&state, ContactForm::default(), None).await)
}

#[derive(Deserialize)]
pub struct PickerQuery {
    #[serde(default)]
    q: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "contact/picker_partial.html")]
pub struct PickerPartial {
    options: Vec<PickerOption>,
}

#[axum::debug_handler]
pub async fn picker(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PickerQuery>,
) -> Result<PickerPartial, AppError> {
    Ok(PickerPartial {
        options: picker_options(&state, &query.q, None).await,
    })
}

#[axum::debug_handler]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ContactForm>,
) -> Result<Response, AppError> {
    let result = match form.parse() {
        Ok(contact) => state.mutator.add_contact(contact).await.map(|_| ()),
        Err(e) => Err(MutationError::from(e)),
    };

    match result {
        Ok(()) => {
            let mut partial = NewContactPartial::new(&state, ContactForm::default(), None).await;
            partial.saved = true;
            Ok(hx_trigger(partial.into_response(), RESULTS_CHANGED))
        }
        Err(e) => {
            let error = inline_error(CONFIG.labels.add_contact, e)?;
            Ok(NewContactPartial::new(&state, form, Some(error))
                .await
                .into_response())
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "contact/row_partial.html")]
pub struct ContactRowPartial {
    config: &'static Config,
    contact: ContactRow,
}

impl ContactRowPartial {
    async fn new(state: &AppState, contact_id: &str, error: Option<String>) -> Result<Self, AppError> {
        let store = state.mutator.store().await;
        let contact = store
            .contact(contact_id)
            .ok_or_else(|| MutationError::NotFound(contact_id.to_string()))?;

        Ok(ContactRowPartial {
            config: &CONFIG,
            contact: ContactRow::new(contact, &store).with_error(error),
        })
    }
}

#[axum::debug_handler]
pub async fn view(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<ContactRowPartial, AppError> {
    ContactRowPartial::new(&state, &id, None).await
}

#[derive(Template, WebTemplate)]
#[template(path = "contact/edit_partial.html")]
pub struct EditContactPartial {
    config: &'static Config,
    contact_id: String,
    form: ContactForm,
    error: Option<String>,
}

#[axum::debug_handler]
pub async fn edit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<EditContactPartial, AppError> {
    let store = state.mutator.store().await;
    let contact = store
        .contact(&id)
        .ok_or_else(|| MutationError::NotFound(id.clone()))?;
    let form = ContactForm {
        name: contact.field_value(ContactField::Name),
        phone: contact.field_value(ContactField::Phone),
        email: contact.field_value(ContactField::Email),
        position_name: contact.field_value(ContactField::PositionName),
        org_number: Some(contact.org_number.to_string()),
    };

    Ok(EditContactPartial {
        config: &CONFIG,
        contact_id: id,
        form,
        error: None,
    })
}

#[axum::debug_handler]
pub async fn save(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Form(form): Form<ContactForm>,
) -> Result<Response, AppError> {
    match state.mutator.edit_contact(&id, &form.edits()).await {
        Ok(_) => Ok(ContactRowPartial::new(&state, &id, None)
            .await?
            .into_response()),
        Err(e) => {
            let error = inline_error(CONFIG.labels.save, e)?;
            Ok(EditContactPartial {
                config: &CONFIG,
                contact_id: id,
                form,
                error: Some(error),
            }
            .into_response())
        }
    }
}

/// An empty body removes the row on the page. A failed delete keeps the row
/// and shows why.
#[axum::debug_handler]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    match state.mutator.delete_contact(&id).await {
        Ok(()) => Ok(().into_response()),
        Err(MutationError::NotFound(_)) => Ok(().into_response()),
        Err(e) => {
            let error = inline_error(CONFIG.labels.delete, e)?;
            Ok(ContactRowPartial::new(&state, &id, Some(error))
                .await?
                .into_response())
        }
    }
}
