use std::fmt;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use calamine::{Reader, open_workbook_auto};
use displaydoc::Display as DisplayDoc;
use garde::Validate;
use thiserror::Error;

use crate::CONFIG;
use crate::api::ApiError;
use crate::data::{NewContact, NewOrganization};
use crate::mutate::{MutationError, Mutator};
use crate::report;
use crate::settings::Settings;

const PROGRESS_EVERY: usize = 100;

/// Directory service tags that sheets append to phone numbers. Longest first.
const DIRECTORY_SUFFIXES: [&str; 6] = ["(18881)", "(1881)", "(881)", "18881", "1881", "881"];

/// The cells of one sheet row that an import reads, as text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    pub org_number: String,
    pub org_name: String,
    pub name: String,
    pub phone: String,
    pub position: String,
    pub email: String,
}

#[derive(Debug, DisplayDoc, Error, PartialEq)]
pub enum RowError {
    /// invalid organization number `{0}`
    OrgNumber(String),
    /// invalid phone number `{0}`
    Phone(String),
    /// missing organization name
    OrgName,
    /// missing contact name
    Name,
}

/// A cleaned row, ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub organization: NewOrganization,
    pub contact: NewContact,
    pub default_position: bool,
}

impl Row {
    pub fn clean(&self, org_type: &str) -> Result<Entry, RowError> {
        let org_number = clean_org_number(&self.org_number)
            .ok_or_else(|| RowError::OrgNumber(self.org_number.clone()))?;
        let phone = clean_phone(&self.phone).ok_or_else(|| RowError::Phone(self.phone.clone()))?;
        let org_name = self.org_name.trim();
        if org_name.is_empty() {
            return Err(RowError::OrgName);
        }
        let name = self.name.trim();
        if name.is_empty() {
            return Err(RowError::Name);
        }

        let position = self.position.trim();
        let default_position = position.is_empty();

        Ok(Entry {
            organization: NewOrganization {
                organization_name: org_name.to_string(),
                org_number,
                org_type: org_type.to_string(),
            },
            contact: NewContact {
                name: name.to_string(),
                phone,
                org_number,
                email: clean_email(&self.email),
                position_name: if default_position {
                    CONFIG.import.default_position.to_string()
                } else {
                    position.to_string()
                },
            },
            default_position,
        })
    }
}

/// Nine digits, whatever separators or prefixes surround them.
pub fn clean_org_number(raw: &str) -> Option<i64> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() != 9 {
        return None;
    }

    digits.parse().ok()
}

/// Eight digit local number. A `47` or `0047` country code and a trailing
/// directory service tag are dropped.
pub fn clean_phone(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    local_phone(raw).or_else(|| {
        DIRECTORY_SUFFIXES
            .iter()
            .find_map(|suffix| raw.strip_suffix(suffix))
            .and_then(local_phone)
    })
}

fn local_phone(raw: &str) -> Option<i64> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let local = match digits.len() {
        8 => digits.as_str(),
        10 => digits.strip_prefix("47")?,
        12 => digits.strip_prefix("0047")?,
        _ => return None,
    };
    let phone: i64 = local.parse().ok()?;

    (10_000_000..=99_999_999).contains(&phone).then_some(phone)
}

#[derive(Validate)]
struct ImportedEmail {
    #[garde(email)]
    email: String,
}

/// Lower-cased address, or `None` when the cell is empty or not an address.
pub fn clean_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return None;
    }

    let checked = ImportedEmail { email };
    match checked.validate() {
        Ok(()) => Some(checked.email),
        Err(e) => {
            tracing::warn!(email = %checked.email, error = %e, "email dropped");
            None
        }
    }
}

/// Positions of the imported columns in the header row.
#[derive(Debug, PartialEq)]
struct Columns {
    org_number: usize,
    org_name: usize,
    name: usize,
    phone: usize,
    position: Option<usize>,
    email: Option<usize>,
}

fn column(header: &[String], name: &str) -> Option<usize> {
    header.iter().position(|h| h.trim() == name.trim())
}

impl Columns {
    fn find(header: &[String]) -> Result<Self> {
        let required =
            |name: &str| column(header, name).with_context(|| format!("column `{}` not found", name));

        Ok(Columns {
            org_number: required(CONFIG.import.org_number)?,
            org_name: required(CONFIG.import.org_name)?,
            name: required(CONFIG.import.name)?,
            phone: required(CONFIG.import.phone)?,
            position: column(header, CONFIG.import.position),
            email: column(header, CONFIG.import.email),
        })
    }

    fn row(&self, cells: &[String]) -> Row {
        let cell = |i: Option<usize>| {
            i.and_then(|i| cells.get(i))
                .map(|c| c.trim().to_string())
                .unwrap_or_default()
        };

        Row {
            org_number: cell(Some(self.org_number)),
            org_name: cell(Some(self.org_name)),
            name: cell(Some(self.name)),
            phone: cell(Some(self.phone)),
            position: cell(self.position),
            email: cell(self.email),
        }
    }
}

fn rows_of(mut cells: impl Iterator<Item = Vec<String>>) -> Result<Vec<Row>> {
    let header = cells.next().context("sheet is empty")?;
    let columns = Columns::find(&header)?;

    Ok(cells.map(|row| columns.row(&row)).collect())
}

/// Rows of the first sheet of a workbook. The first row names the columns.
pub fn read_rows(path: &Path) -> Result<Vec<Row>> {
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("could not open {:?}", path))?;
    let range = workbook
        .worksheet_range_at(0)
        .context("workbook has no sheets")?
        .with_context(|| format!("could not read first sheet of {:?}", path))?;

    rows_of(
        range
            .rows()
            .map(|cells| cells.iter().map(|c| c.to_string()).collect()),
    )
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Summary {
    pub rows: usize,
    pub imported: usize,
    pub invalid_org_number: usize,
    pub invalid_phone: usize,
    pub default_position: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "rows: {}", self.rows)?;
        writeln!(f, "imported: {}", self.imported)?;
        writeln!(f, "failed: {}", self.rows - self.imported)?;
        writeln!(f, "invalid organization numbers: {}", self.invalid_org_number)?;
        writeln!(f, "invalid phone numbers: {}", self.invalid_phone)?;
        writeln!(f, "contacts with default position: {}", self.default_position)
    }
}

/// Adds the organization unless it is already known, then the contact. An
/// organization the backend already has is not an error.
async fn import_entry(mutator: &Mutator, entry: Entry) -> Result<(), MutationError> {
    let org_number = entry.organization.org_number;
    let known = mutator.store().await.organization(org_number).is_some();
    if !known {
        match mutator.add_organization(entry.organization).await {
            Ok(()) => {}
            Err(MutationError::Api(ApiError::Status { status: 409, .. })) => {
                tracing::debug!(org_number, "organization already exists");
            }
            Err(e) => return Err(e),
        }
    }
    mutator.add_contact(entry.contact).await?;

    Ok(())
}

/// Imports rows one by one. Bad rows and rejected calls are counted and
/// skipped; an expired session stops the import.
pub async fn import_rows(
    mutator: &Mutator,
    rows: impl IntoIterator<Item = Row>,
    org_type: &str,
) -> Result<Summary, MutationError> {
    let mut summary = Summary::default();
    for row in rows {
        summary.rows += 1;
        match row.clean(org_type) {
            Ok(entry) => {
                let default_position = entry.default_position;
                match import_entry(mutator, entry).await {
                    Ok(()) => {
                        summary.imported += 1;
                        if default_position {
                            summary.default_position += 1;
                        }
                    }
                    Err(e) if e.is_auth() => return Err(e),
                    Err(e) => tracing::warn!(row = summary.rows, error = %e, "row not imported"),
                }
            }
            Err(e) => {
                match e {
                    RowError::OrgNumber(_) => summary.invalid_org_number += 1,
                    RowError::Phone(_) => summary.invalid_phone += 1,
                    RowError::OrgName | RowError::Name => {}
                }
                tracing::warn!(row = summary.rows, error = %e, "row skipped");
            }
        }

        if summary.rows % PROGRESS_EVERY == 0 {
            tracing::info!(rows = summary.rows, imported = summary.imported, "import progress");
        }
    }

    Ok(summary)
}

pub async fn run(settings: &Settings, path: &Path, org_type: Option<String>) -> Result<()> {
    let rows = read_rows(path)?;
    let mutator = report::connect(settings).await?;
    mutator
        .reload()
        .await
        .context("could not fetch organizations")?;

    let org_type = org_type.unwrap_or_else(|| CONFIG.import.org_type.to_string());
    let summary = import_rows(&mutator, rows, &org_type)
        .await
        .context("import stopped")?;
    write!(io::stdout().lock(), "{}", summary)?;

    Ok(())
}
