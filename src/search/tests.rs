use super::*;

fn contact(id: &str, org_number: i64, name: &str, phone: i64, position: &str) -> Contact {
    Contact {
        contact_id: id.to_string(),
        org_number,
        name: name.to_string(),
        phone,
        email: None,
        position_name: position.to_string(),
        contacted_at: None,
    }
}

fn org(org_number: i64, name: &str, org_type: &str, contacts: Vec<Contact>) -> Organization {
    Organization {
        org_name: name.to_string(),
        org_number,
        org_type: org_type.to_string(),
        contacts,
    }
}

fn fixture() -> Vec<Organization> {
    let mut ola = contact("c2", 2, "Ola Nordmann", 41234567, "Daglig leder");
    ola.email = Some("ola@fjord.no".to_string());

    vec![
        org(1, "Acme", "IT", vec![contact("c1", 1, "Kari", 98765432, "CEO")]),
        org(2, "Fjord Fisk", "Sjømat", vec![ola]),
        org(3, "Kari Konsult", "Rådgivning", vec![]),
    ]
}

fn names(visible: &Visible) -> Vec<String> {
    visible
        .organizations
        .iter()
        .map(|o| o.org_name.clone())
        .collect()
}

fn contact_ids(visible: &Visible) -> Vec<String> {
    visible
        .contacts
        .iter()
        .map(|c| c.contact_id.clone())
        .collect()
}

#[test]
fn test_empty_query_shows_everything() {
    let orgs = fixture();
    let index = SearchIndex::build(&orgs);
    let visible = visible(&orgs, &index, "", &TypeFilter::default());

    assert_eq!(names(&visible), vec!["Acme", "Fjord Fisk", "Kari Konsult"]);
    assert!(visible.contacts.is_empty());
    assert_eq!(visible.view(), View::Organizations);
}

#[test]
fn test_short_query_is_same_as_empty() {
    let orgs = fixture();
    let index = SearchIndex::build(&orgs);
    let empty = visible(&orgs, &index, "", &TypeFilter::default());

    for query in ["k", " K ", "   ", "\tx\n"] {
        let short = visible(&orgs, &index, query, &TypeFilter::default());
        assert_eq!(names(&short), names(&empty));
        assert!(short.contacts.is_empty());
    }
}

#[test]
fn test_normalize() {
    assert_eq!(normalize("  KA "), Some("ka".to_string()));
    assert_eq!(normalize(" a "), None);
    assert_eq!(normalize("ø"), None);
    assert_eq!(normalize("øy"), Some("øy".to_string()));
}

#[test]
fn test_contact_only_match() {
    let orgs = vec![org(
        1,
        "Acme",
        "IT",
        vec![contact("c1", 1, "Kari", 98765432, "CEO")],
    )];
    let index = SearchIndex::build(&orgs);
    let visible = visible(&orgs, &index, "ka", &TypeFilter::default());

    assert!(visible.organizations.is_empty());
    assert_eq!(contact_ids(&visible), vec!["c1"]);
    assert_eq!(visible.view(), View::Contacts);
}

#[test]
fn test_organization_name_match_is_case_insensitive() {
    let mut orgs = fixture();
    orgs[1].org_name = "Fjord SUPERfisk".to_string();
    let index = SearchIndex::build(&orgs);
    let visible = visible(&orgs, &index, "superFISK", &TypeFilter::default());

    assert_eq!(names(&visible), vec!["Fjord SUPERfisk"]);
}

#[test]
fn test_contacts_collected_even_when_organization_matches() {
    let orgs = fixture();
    let index = SearchIndex::build(&orgs);
    let visible = visible(&orgs, &index, "kari", &TypeFilter::default());

    assert_eq!(names(&visible), vec!["Kari Konsult"]);
    assert_eq!(contact_ids(&visible), vec!["c1"]);
    assert_eq!(visible.view(), View::Organizations);
}

#[test]
fn test_contact_fields_searched() {
    let orgs = fixture();
    let index = SearchIndex::build(&orgs);

    let by_email = visible(&orgs, &index, "@fjord", &TypeFilter::default());
    assert_eq!(contact_ids(&by_email), vec!["c2"]);

    let by_phone = visible(&orgs, &index, "4123", &TypeFilter::default());
    assert_eq!(contact_ids(&by_phone), vec!["c2"]);

    let by_position = visible(&orgs, &index, "daglig", &TypeFilter::default());
    assert_eq!(contact_ids(&by_position), vec!["c2"]);
}

#[test]
fn test_no_match() {
    let orgs = fixture();
    let index = SearchIndex::build(&orgs);
    let visible = visible(&orgs, &index, "zz", &TypeFilter::default());

    assert_eq!(visible.view(), View::Empty);
}

#[test]
fn test_type_filter_narrows_organizations_only() {
    let orgs = fixture();
    let index = SearchIndex::build(&orgs);
    let it = TypeFilter::new(["IT"]);

    let all = visible(&orgs, &index, "", &it);
    assert_eq!(names(&all), vec!["Acme"]);

    let searched = visible(&orgs, &index, "kari", &it);
    assert!(searched.organizations.is_empty());
    assert_eq!(contact_ids(&searched), vec!["c1"]);

    let several = visible(&orgs, &index, "", &TypeFilter::new(["IT", "Sjømat"]));
    assert_eq!(names(&several), vec!["Acme", "Fjord Fisk"]);
}

#[test]
fn test_type_filter_ignores_blank_entries() {
    let filter = TypeFilter::new(["", "IT", "IT"]);

    assert_eq!(filter.len(), 1);
    assert!(filter.contains("IT"));
    assert!(TypeFilter::new([""]).is_empty());
}

#[test]
fn test_index_lookup() {
    let orgs = fixture();
    let index = SearchIndex::build(&orgs);

    assert_eq!(index.position_of(2), Some(1));
    assert_eq!(index.position_of(99), None);
    assert_eq!(index.search("kari").contacts.len(), 1);
}

#[test]
fn test_duplicate_organization_numbers_keep_their_contacts() {
    let orgs = vec![
        org(1, "Acme", "IT", vec![contact("c1", 1, "Kari", 1, "CEO")]),
        org(1, "Acme AS", "IT", vec![contact("c9", 1, "Kari Two", 2, "CFO")]),
    ];
    let index = SearchIndex::build(&orgs);
    let visible = visible(&orgs, &index, "kari", &TypeFilter::default());

    assert_eq!(contact_ids(&visible), vec!["c1", "c9"]);
}

#[test]
fn test_filter_by_name() {
    let orgs = fixture();

    let picked: Vec<&str> = filter_by_name(&orgs, "F")
        .iter()
        .map(|o| o.org_name.as_str())
        .collect();
    assert_eq!(picked, vec!["Fjord Fisk"]);
    assert_eq!(filter_by_name(&orgs, "").len(), 3);
}
