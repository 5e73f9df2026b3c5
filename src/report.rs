use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::CONFIG;
use crate::api::HttpApi;
use crate::auth::{ClientCredentials, IdentityProvider, TokenSource};
use crate::data::{Contact, Organization};
use crate::mutate::Mutator;
use crate::search::{TypeFilter, View};
use crate::serve::handler::filters::format_phone;
use crate::settings::Settings;
use crate::store::Store;

pub async fn connect(settings: &Settings) -> Result<Mutator> {
    let provider = IdentityProvider::new(&settings.auth)?;
    let tokens: Arc<dyn TokenSource> = Arc::new(ClientCredentials::new(provider)?);
    let api = HttpApi::new(&settings.api_url()?, Some(tokens))?;

    Ok(Mutator::new(Arc::new(api)))
}

pub async fn organizations(settings: &Settings, types: Vec<String>) -> Result<()> {
    let mutator = connect(settings).await?;
    mutator.reload().await.context("could not fetch organizations")?;
    let store = mutator.store().await;
    let filter = TypeFilter::new(types);
    let visible = store.visible("", &filter);

    write_organizations(&mut io::stdout().lock(), &visible.organizations)?;

    Ok(())
}

pub async fn search(settings: &Settings, query: &str, types: Vec<String>) -> Result<()> {
    let mutator = connect(settings).await?;
    mutator.reload().await.context("could not fetch organizations")?;
    let store = mutator.store().await;
    let visible = store.visible(query, &TypeFilter::new(types));

    let mut out = io::stdout().lock();
    match visible.view() {
        View::Organizations => write_organizations(&mut out, &visible.organizations)?,
        View::Contacts => write_contacts(&mut out, &store, &visible.contacts)?,
        View::Empty => writeln!(out, "{}", CONFIG.labels.no_results)?,
    }

    Ok(())
}

pub async fn types(settings: &Settings) -> Result<()> {
    let mutator = connect(settings).await?;
    mutator
        .load_types()
        .await
        .context("could not fetch organization types")?;

    let mut out = io::stdout().lock();
    for org_type in mutator.org_types().await {
        writeln!(out, "{}", org_type)?;
    }

    Ok(())
}

fn write_organizations(out: &mut impl Write, organizations: &[&Organization]) -> io::Result<()> {
    if organizations.is_empty() {
        return writeln!(out, "{}", CONFIG.labels.no_results);
    }

    for org in organizations {
        let org_type = if org.org_type.is_empty() {
            String::new()
        } else {
            format!(" [{}]", org.org_type)
        };
        writeln!(
            out,
            "{:>10}  {}{}  ({} {})",
            org.org_number,
            org.org_name,
            org_type,
            org.contacts.len(),
            CONFIG.labels.contacts
        )?;
    }

    Ok(())
}

fn write_contacts(out: &mut impl Write, store: &Store, contacts: &[&Contact]) -> io::Result<()> {
    for contact in contacts {
        let organization = store
            .organization_name(contact.org_number)
            .unwrap_or(CONFIG.labels.unknown_organization);
        writeln!(
            out,
            "{}, {}, {}, {}, {}",
            contact.name,
            contact.position_name,
            format_phone(&contact.phone.to_string()),
            contact.email.as_deref().unwrap_or("-"),
            organization
        )?;
    }

    Ok(())
}
