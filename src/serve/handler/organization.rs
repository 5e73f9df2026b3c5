use std::sync::Arc;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::CONFIG;
use crate::config::Config;
use crate::data::{NewOrganization, ValidationError, parse_number};
use crate::mutate::MutationError;
use crate::serve::handler::inline_error;
use crate::serve::{AppError, AppState, RESULTS_CHANGED, hx_trigger};

#[derive(Deserialize, Debug, Clone, Default)]
pub struct OrganizationForm {
    #[serde(default)]
    pub organization_name: String,
    #[serde(default)]
    pub org_number: String,
    #[serde(default)]
    pub org_type: String,
}

impl OrganizationForm {
    fn parse(&self) -> Result<NewOrganization, ValidationError> {
        Ok(NewOrganization {
            organization_name: self.organization_name.trim().to_string(),
            org_number: parse_number(&self.org_number, "org_number")?,
            org_type: self.org_type.trim().to_string(),
        })
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "organization/new_partial.html")]
pub struct NewOrganizationPartial {
    config: &'static Config,
    types: Vec<String>,
    form: OrganizationForm,
    error: Option<String>,
    saved: bool,
}

impl NewOrganizationPartial {
    async fn new(state: &AppState, form: OrganizationForm, error: Option<String>) -> Self {
        NewOrganizationPartial {
            config: &CONFIG,
            types: state.mutator.org_types().await.into_iter().collect(),
            form,
            error,
            saved: false,
        }
    }
}

#[axum::debug_handler]
pub async fn new_form(
    State(state): State<Arc<AppState>>,
) -> Result<NewOrganizationPartial, AppError> {
    Ok(NewOrganizationPartial::new(&state, OrganizationForm::default(), None).await)
}

#[axum::debug_handler]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Form(form): Form<OrganizationForm>,
) -> Result<Response, AppError> {
    let result = match form.parse() {
        Ok(org) => state.mutator.add_organization(org).await,
        Err(e) => Err(MutationError::from(e)),
    };

    match result {
        Ok(()) => {
            let mut partial =
                NewOrganizationPartial::new(&state, OrganizationForm::default(), None).await;
            partial.saved = true;
            Ok(hx_trigger(partial.into_response(), RESULTS_CHANGED))
        }
        Err(e) => {
            let error = inline_error(CONFIG.labels.add_organization, e)?;
            Ok(NewOrganizationPartial::new(&state, form, Some(error))
                .await
                .into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_form() {
        let form = OrganizationForm {
            organization_name: " Acme ".to_string(),
            org_number: "912 345 678".to_string(),
            org_type: "IT".to_string(),
        };
        let org = form.parse().unwrap();
        assert_eq!(org.organization_name, "Acme");
        assert_eq!(org.org_number, 912345678);

        let form = OrganizationForm {
            org_number: "abc".to_string(),
            ..OrganizationForm::default()
        };
        assert!(matches!(form.parse(), Err(ValidationError::NotANumber(_))));
    }
}
