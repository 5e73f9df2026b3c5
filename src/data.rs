use std::fmt::Display;

use chrono::{DateTime, Utc};
use displaydoc::Display as DisplayDoc;
use garde::Validate;
use serde_derive::{Deserialize, Serialize};
use serde_with::{DefaultOnError, DefaultOnNull, NoneAsEmptyString, serde_as};
use strum_macros::{EnumString, VariantArray};
use thiserror::Error;

#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub org_name: String,
    pub org_number: i64,
    #[serde(default)]
    pub org_type: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub contacts: Vec<Contact>,
}

impl Organization {
    pub fn new(org_name: String, org_number: i64, org_type: String) -> Self {
        Organization {
            org_name,
            org_number,
            org_type,
            contacts: Vec::new(),
        }
    }
}

#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(rename = "contactID")]
    pub contact_id: String,
    pub org_number: i64,
    pub name: String,
    pub phone: i64,
    #[serde_as(deserialize_as = "DefaultOnNull<NoneAsEmptyString>")]
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub position_name: String,
    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    pub contacted_at: Option<DateTime<Utc>>,
}

/// The fields an edit touches. Untouched fields stay `None` and are not
/// checked, so records the backend accepted earlier remain editable.
#[derive(Debug, Default, Validate)]
struct ContactPatch {
    #[garde(length(min = 1))]
    name: Option<String>,
    #[garde(range(min = 1))]
    phone: Option<i64>,
    #[garde(email)]
    email: Option<String>,
    #[garde(length(min = 1))]
    position_name: Option<String>,
}

impl Contact {
    /// Value of a single field as it is shown in an inline editor.
    pub fn field_value(&self, field: ContactField) -> String {
        match field {
            ContactField::Name => self.name.clone(),
            ContactField::Phone => self.phone.to_string(),
            ContactField::Email => self.email.clone().unwrap_or_default(),
            ContactField::PositionName => self.position_name.clone(),
        }
    }

    /// Returns a copy with one field replaced by `raw`. Only that field is
    /// checked, and only when its value changes.
    pub fn with_field(&self, field: ContactField, raw: &str) -> Result<Contact, ValidationError> {
        let value = raw.trim();
        let mut contact = self.clone();
        let mut patch = ContactPatch::default();
        match field {
            ContactField::Name => {
                contact.name = value.to_string();
                patch.name = Some(contact.name.clone());
            }
            ContactField::Phone => {
                contact.phone = parse_number(value, field.as_str())?;
                patch.phone = Some(contact.phone);
            }
            ContactField::Email => {
                contact.email = (!value.is_empty()).then(|| value.to_string());
                patch.email = contact.email.clone();
            }
            ContactField::PositionName => {
                contact.position_name = value.to_string();
                patch.position_name = Some(contact.position_name.clone());
            }
        }

        if contact != *self {
            patch.validate()?;
        }

        Ok(contact)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct NewOrganization {
    #[garde(length(min = 1))]
    pub organization_name: String,
    #[garde(range(min = 1))]
    pub org_number: i64,
    #[garde(length(min = 1))]
    pub org_type: String,
}

impl NewOrganization {
    pub fn checked(self) -> Result<Self, ValidationError> {
        self.validate()?;
        Ok(self)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct NewContact {
    #[garde(length(min = 1))]
    pub name: String,
    #[garde(range(min = 1))]
    pub phone: i64,
    #[garde(skip)]
    pub org_number: i64,
    #[garde(email)]
    pub email: Option<String>,
    #[garde(length(min = 1))]
    pub position_name: String,
}

impl NewContact {
    pub fn checked(self) -> Result<Self, ValidationError> {
        if self.org_number <= 0 {
            return Err(ValidationError::NoOrganization);
        }
        self.validate()?;

        Ok(self)
    }

    /// Merges the id the backend assigned with the locally known fields.
    pub fn into_contact(self, contact_id: String) -> Contact {
        Contact {
            contact_id,
            org_number: self.org_number,
            name: self.name,
            phone: self.phone,
            email: self.email,
            position_name: self.position_name,
            contacted_at: None,
        }
    }
}

#[derive(
    Serialize,
    Deserialize,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Clone,
    Copy,
    VariantArray,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContactField {
    Name,
    PositionName,
    Phone,
    Email,
}

impl ContactField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactField::Name => "name",
            ContactField::Phone => "phone",
            ContactField::Email => "email",
            ContactField::PositionName => "position_name",
        }
    }

    pub fn input_type(&self) -> &'static str {
        match self {
            ContactField::Phone => "tel",
            ContactField::Email => "email",
            ContactField::Name | ContactField::PositionName => "text",
        }
    }
}

impl Display for ContactField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, DisplayDoc, Error)]
pub enum ValidationError {
    /// no organization selected
    NoOrganization,
    /// {0} must be a number
    NotANumber(String),
    /// missing or invalid fields: {0}
    Invalid(#[from] garde::Report),
}

pub fn parse_number(raw: &str, field: &str) -> Result<i64, ValidationError> {
    let digits: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    digits
        .parse()
        .map_err(|_| ValidationError::NotANumber(field.to_string()))
}
