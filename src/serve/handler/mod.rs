use std::sync::Arc;

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Query, State};
use strum::VariantArray;

use crate::CONFIG;
use crate::config::Config;
use crate::data::{Contact, ContactField, Organization};
use crate::mutate::MutationError;
use crate::search::{TypeFilter, View};
use crate::serve::{AppError, AppState};
use crate::store::Store;

pub mod auth;
pub mod contact;
pub mod filters;
pub mod organization;

/// One editable cell of a contact row.
#[derive(Debug, Clone)]
pub struct FieldCell {
    pub field: ContactField,
    pub value: String,
}

impl FieldCell {
    pub fn new(contact: &Contact, field: ContactField) -> Self {
        FieldCell {
            field,
            value: contact.field_value(field),
        }
    }

    pub fn is_phone(&self) -> bool {
        self.field == ContactField::Phone
    }
}

#[derive(Debug, Clone)]
pub struct ContactRow {
    pub contact_id: String,
    pub cells: Vec<FieldCell>,
    pub contacted_at: Option<String>,
    pub organization: String,
    pub error: Option<String>,
}

impl ContactRow {
    pub fn new(contact: &Contact, store: &Store) -> Self {
        let organization = store
            .organization_name(contact.org_number)
            .unwrap_or(CONFIG.labels.unknown_organization)
            .to_string();

        ContactRow {
            contact_id: contact.contact_id.clone(),
            cells: ContactField::VARIANTS
                .iter()
                .map(|field| FieldCell::new(contact, *field))
                .collect(),
            contacted_at: contact
                .contacted_at
                .map(|at| at.format("%d.%m.%Y").to_string()),
            organization,
            error: None,
        }
    }

    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.error = error;
        self
    }
}

#[derive(Debug, Clone)]
pub struct OrganizationRow {
    pub org_name: String,
    pub org_number: i64,
    pub org_type: String,
    pub contacts: Vec<ContactRow>,
}

impl OrganizationRow {
    fn new(org: &Organization, store: &Store) -> Self {
        OrganizationRow {
            org_name: org.org_name.clone(),
            org_number: org.org_number,
            org_type: org.org_type.clone(),
            contacts: org
                .contacts
                .iter()
                .map(|c| ContactRow::new(c, store))
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TypeOption {
    pub name: String,
    pub selected: bool,
}

/// Query string of the search box and the type filter. `types` may repeat.
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub q: String,
    pub types: TypeFilter,
}

impl SearchParams {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut q = String::new();
        let mut types = Vec::new();
        for (key, value) in pairs {
            match key.as_str() {
                "q" => q = value,
                "types" => types.push(value),
                _ => {}
            }
        }

        SearchParams {
            q,
            types: TypeFilter::new(types),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Results {
    pub view: View,
    pub organizations: Vec<OrganizationRow>,
    pub contacts: Vec<ContactRow>,
}

impl Results {
    pub fn build(store: &Store, params: &SearchParams) -> Self {
        let visible = store.visible(&params.q, &params.types);

        Results {
            view: visible.view(),
            organizations: visible
                .organizations
                .iter()
                .map(|o| OrganizationRow::new(o, store))
                .collect(),
            contacts: visible
                .contacts
                .iter()
                .map(|c| ContactRow::new(c, store))
                .collect(),
        }
    }

    pub fn shows_organizations(&self) -> bool {
        self.view == View::Organizations
    }

    pub fn shows_contacts(&self) -> bool {
        self.view == View::Contacts
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub config: &'static Config,
    pub notice: Option<String>,
    pub query: String,
    pub type_options: Vec<TypeOption>,
    pub selected_types: usize,
    pub results: Results,
}

#[axum::debug_handler]
pub async fn index(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<IndexTemplate, AppError> {
    let notice = match state.mutator.ensure_loaded().await {
        Ok(()) => None,
        Err(e) => Some(inline_error(CONFIG.labels.load_failed, e)?),
    };
    let params = SearchParams::from_pairs(pairs);
    let type_options = state
        .mutator
        .org_types()
        .await
        .into_iter()
        .map(|name| TypeOption {
            selected: params.types.contains(&name),
            name,
        })
        .collect();
    let store = state.mutator.store().await;

    Ok(IndexTemplate {
        config: &CONFIG,
        notice,
        selected_types: params.types.len(),
        results: Results::build(&store, &params),
        query: params.q,
        type_options,
    })
}

#[derive(Template, WebTemplate)]
#[template(path = "results_partial.html")]
pub struct ResultsPartial {
    pub config: &'static Config,
    pub results: Results,
}

#[axum::debug_handler]
pub async fn results(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<ResultsPartial, AppError> {
    let params = SearchParams::from_pairs(pairs);
    let store = state.mutator.store().await;

    Ok(ResultsPartial {
        config: &CONFIG,
        results: Results::build(&store, &params),
    })
}

/// Message shown next to a form. An expired session is not shown inline but
/// passed on so the request ends in a login redirect.
pub fn inline_error(prefix: &str, error: MutationError) -> Result<String, AppError> {
    if error.is_auth() {
        return Err(error.into());
    }

    Ok(format!("{}: {}", prefix, error))
}
