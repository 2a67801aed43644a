use sqlreport::definition::{query_name_for, DefinitionError, Definitions};
use sqlreport::messages::{Level, Messages};
use std::fs;

const QUERIES: &str = "\
::# shop queries
::CUSTOMERS
SELECT id, name
  FROM ${_tableprefix}customer
 ORDER BY id

::ORDERS
SELECT * FROM orders WHERE customer = ${id}
";

const TEMPLATES: &str = "\
::# shop templates
::MAIN
Customers
#{CUSTOMERS}


::CUSTOMERS
${id}: ${name}

   #{ORDERS}
::CUSTOMERS_EMPTY
no customers
";

#[test]
fn test_load_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let sql = dir.path().join("shop.sql");
    let tpl = dir.path().join("shop.tpl");
    fs::write(&sql, QUERIES).unwrap();
    fs::write(&tpl, TEMPLATES).unwrap();

    let mut messages = Messages::new();
    let defs = Definitions::load(Some(&sql), &tpl, &mut messages).unwrap();

    assert_eq!(defs.queries.names(), vec!["CUSTOMERS", "ORDERS"]);
    assert_eq!(
        defs.queries.get("CUSTOMERS"),
        Some("SELECT id, name FROM ${_tableprefix}customer ORDER BY id")
    );
    assert_eq!(
        defs.templates.names(),
        vec!["CUSTOMERS", "CUSTOMERS_EMPTY", "MAIN"]
    );
    assert_eq!(
        defs.templates.get("MAIN").unwrap(),
        &["Customers", "#{CUSTOMERS}"].map(String::from)
    );
    assert_eq!(
        defs.templates.get("CUSTOMERS").unwrap(),
        &["${id}: ${name}", "", "   #{ORDERS}"].map(String::from)
    );
    assert_eq!(messages.error_count(), 0);
}

#[test]
fn test_query_file_is_optional() {
    let dir = tempfile::tempdir().unwrap();
    let tpl = dir.path().join("static.tpl");
    fs::write(&tpl, "::MAIN\nhello\n").unwrap();

    let mut messages = Messages::new();
    let defs = Definitions::load(None, &tpl, &mut messages).unwrap();
    assert!(defs.queries.is_empty());
    assert_eq!(defs.templates.len(), 1);
}

#[test]
fn test_missing_template_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.tpl");

    let mut messages = Messages::new();
    let err = Definitions::load(None, &missing, &mut messages).unwrap_err();
    assert!(matches!(err, DefinitionError::Read { kind: "template", .. }));
    assert!(err.to_string().contains("missing.tpl"));
}

#[test]
fn test_missing_query_file() {
    let dir = tempfile::tempdir().unwrap();
    let tpl = dir.path().join("t.tpl");
    fs::write(&tpl, "::MAIN\nx\n").unwrap();

    let mut messages = Messages::new();
    let err = Definitions::load(Some(&dir.path().join("nope.sql")), &tpl, &mut messages)
        .unwrap_err();
    assert!(matches!(err, DefinitionError::Read { kind: "sql", .. }));
}

#[test]
fn test_crlf_and_latin1_input() {
    let dir = tempfile::tempdir().unwrap();
    let tpl = dir.path().join("legacy.tpl");
    fs::write(&tpl, b"::MAIN\r\nStra\xdfe\r\n\r\n::END\r\n").unwrap();

    let mut messages = Messages::new();
    let defs = Definitions::load(None, &tpl, &mut messages).unwrap();
    let main = defs.templates.get("MAIN").unwrap();
    assert_eq!(main.len(), 1);
    assert_eq!(main[0], "Straße");
    assert!(defs.templates.get("END").unwrap().is_empty());
}

#[test]
fn test_redefinitions_are_reported() {
    let mut messages = Messages::new();
    let defs = Definitions::parse(
        "::Q\nSELECT 1\n::Q\nSELECT 2\n",
        "::T\na\n::T\nb\n",
        &mut messages,
    );
    assert_eq!(defs.queries.get("Q"), Some("SELECT 2"));
    assert_eq!(defs.templates.get("T").unwrap(), &["b".to_string()]);
    assert_eq!(messages.count(Level::Warn), 2);
}

#[test]
fn test_qualified_templates_share_the_base_query() {
    assert_eq!(query_name_for("ARTICLE"), "ARTICLE");
    assert_eq!(query_name_for("ARTICLE.NAMES"), "ARTICLE");
    assert_eq!(query_name_for("ARTICLE.NAMES_EMPTY"), "ARTICLE_EMPTY");

    let mut messages = Messages::new();
    let defs = Definitions::parse(
        "::ARTICLE\nSELECT name FROM article\n",
        "::MAIN\n#{ARTICLE.NAMES}\n::ARTICLE.NAMES\n${name}\n::FOOTER\nend\n",
        &mut messages,
    );
    assert!(defs.is_data_driven("ARTICLE"));
    assert!(defs.is_data_driven("ARTICLE.NAMES"));
    assert!(!defs.is_data_driven("ARTICLE.NAMES_EMPTY"));
    assert!(!defs.is_data_driven("FOOTER"));
    assert!(!defs.is_data_driven("MAIN"));
}
