use std::fs;
use std::path::Path;

use regex::Regex;
use sqlreport::config::{ReportDefinition, Settings, SettingsError};
use sqlreport::db::{Connector, DbError, DbResult, Prepared, ResultSet, Row, Value};
use sqlreport::run::{run_report, RunError, RunOptions, Runner};
use tempfile::TempDir;

const CUSTOMERS_SQL: &str = "\
::CUSTOMERS
SELECT id, name FROM customers WHERE region = '${?region}' ORDER BY id
";

const CUSTOMERS_TPL: &str = "\
::MAIN
Customers ${?region} ${?year}
#{CUSTOMERS}
::CUSTOMERS
${id} ${name}
";

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

/// A config directory with a `customers` report on an in-memory database.
fn setup() -> (TempDir, Settings) {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "customers.sql", CUSTOMERS_SQL);
    write(dir.path(), "customers.tpl", CUSTOMERS_TPL);
    let config = format!(
        r#"
[connections.default]
driver = "sqlite"
database = ":memory:"
init_sql = """
CREATE TABLE customers(id INTEGER, name TEXT, region TEXT);
INSERT INTO customers VALUES (1, 'Anna', 'north'), (2, 'Björn', 'south'), (3, 'Carl', 'south');
"""

[connections.broken]
driver = "sqlite"
database = '{}'

[reports.customers]
sql = "customers.sql"
template = "customers.tpl"
output = "out/customers-${{?region}}.txt"
defines = "region:=north|year:=2024"
"#,
        dir.path().join("missing").join("shop.db").display()
    );
    write(dir.path(), "sqlreport.toml", &config);
    let settings = Settings::from_file(dir.path().join("sqlreport.toml")).unwrap();
    (dir, settings)
}

fn options(settings: &Settings, input: &str) -> RunOptions {
    RunOptions {
        base_path: settings.base_path(),
        input: input.to_string(),
        interactive: false,
        prepare: false,
    }
}

fn customers(settings: &mut Settings) -> &mut ReportDefinition {
    settings.reports.get_mut("customers").unwrap()
}

#[test]
fn test_run_writes_expanded_output() {
    let (dir, settings) = setup();
    let report = Runner::new(&settings, options(&settings, "region:=south"))
        .run("customers")
        .unwrap();

    let expected_file = dir.path().join("out").join("customers-south.txt");
    assert_eq!(report.output_file, expected_file);
    assert_eq!(report.rows, 2);
    assert_eq!(report.error_count(), 0);
    assert!(report.batch.is_none());
    assert_eq!(
        fs::read_to_string(expected_file).unwrap(),
        "Customers south 2024\n2 Björn\n3 Carl\n"
    );
}

#[test]
fn test_defines_apply_without_input() {
    let (dir, settings) = setup();
    let report = Runner::new(&settings, options(&settings, ""))
        .run("customers")
        .unwrap();

    assert_eq!(report.output_file, dir.path().join("out/customers-north.txt"));
    assert_eq!(
        fs::read_to_string(&report.output_file).unwrap(),
        "Customers north 2024\n1 Anna\n"
    );
}

#[test]
fn test_latin1_output() {
    let (_dir, mut settings) = setup();
    customers(&mut settings).utf8 = false;
    let report = Runner::new(&settings, options(&settings, "region:=south"))
        .run("customers")
        .unwrap();

    let bytes = fs::read(&report.output_file).unwrap();
    assert!(bytes.windows(5).any(|w| w == b"Bj\xf6rn"));
}

#[test]
fn test_append_keeps_previous_output() {
    let (_dir, mut settings) = setup();
    customers(&mut settings).append = true;
    let runner = Runner::new(&settings, options(&settings, ""));
    runner.run("customers").unwrap();
    let report = runner.run("customers").unwrap();

    assert_eq!(
        fs::read_to_string(&report.output_file).unwrap(),
        "Customers north 2024\n1 Anna\n".repeat(2)
    );
}

#[test]
fn test_timestamped_file_name() {
    let (dir, mut settings) = setup();
    customers(&mut settings).timestamp = true;
    let report = Runner::new(&settings, options(&settings, ""))
        .run("customers")
        .unwrap();

    assert_eq!(report.output_file.parent(), Some(dir.path().join("out").as_path()));
    let name = report.output_file.file_name().unwrap().to_string_lossy().into_owned();
    let pattern = Regex::new(r"^\d{4}-\d{2}-\d{2}-customers-north-\d{4}\.txt$").unwrap();
    assert!(pattern.is_match(&name), "{}", name);
    assert!(report.output_file.exists());
}

#[test]
fn test_default_output_name() {
    let (dir, mut settings) = setup();
    customers(&mut settings).output = String::new();
    let report = Runner::new(&settings, options(&settings, ""))
        .run("customers")
        .unwrap();
    assert_eq!(report.output_file, dir.path().join("output.txt"));
}

#[test]
fn test_missing_template_aborts_before_output() {
    let (dir, mut settings) = setup();
    customers(&mut settings).template = "nope.tpl".to_string();
    let err = Runner::new(&settings, options(&settings, ""))
        .run("customers")
        .unwrap_err();

    assert!(matches!(err, RunError::Definition(_)));
    assert!(!dir.path().join("out").exists());
}

#[test]
fn test_connect_failure() {
    let (_dir, mut settings) = setup();
    customers(&mut settings).connection = "broken".to_string();
    let err = Runner::new(&settings, options(&settings, ""))
        .run("customers")
        .unwrap_err();
    assert!(matches!(err, RunError::Database(_)));
}

#[test]
fn test_unknown_report_and_connection() {
    let (_dir, mut settings) = setup();
    let runner_options = options(&settings, "");
    let err = Runner::new(&settings, runner_options.clone())
        .run("nope")
        .unwrap_err();
    assert!(matches!(
        err,
        RunError::Settings(SettingsError::ReportNotFound(_))
    ));

    customers(&mut settings).connection = "nowhere".to_string();
    let err = Runner::new(&settings, runner_options)
        .run("customers")
        .unwrap_err();
    assert!(matches!(
        err,
        RunError::Settings(SettingsError::ConnectionNotFound(_))
    ));
}

#[test]
fn test_expansion_errors_do_not_fail_the_run() {
    let (dir, settings) = setup();
    write(dir.path(), "customers.tpl", "::MAIN\nhello ${nobody}\n");
    let report = Runner::new(&settings, options(&settings, ""))
        .run("customers")
        .unwrap();

    assert_eq!(report.error_count(), 1);
    assert_eq!(
        fs::read_to_string(&report.output_file).unwrap(),
        "hello ['nobody' is unknown]"
    );
}

/// Two fixed rows of three columns for any statement.
struct TwoRows;

impl Connector for TwoRows {
    fn connect(&mut self) -> DbResult<()> {
        Ok(())
    }

    fn close(&mut self) {}

    fn execute(&mut self, _sql: &str) -> DbResult<ResultSet> {
        let text = |s: &str| Some(s.as_bytes().to_vec());
        Ok(ResultSet::new(
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            vec![
                Row::new(vec![text("1"), text("x"), text("<y>")]),
                Row::new(vec![text("2"), None, text("z")]),
            ],
        ))
    }

    fn prepare(&mut self, _sql: &str) -> DbResult<Prepared> {
        Err(DbError::NotConnected)
    }

    fn execute_prepared(&mut self, _: &Prepared, _: &[Value]) -> DbResult<ResultSet> {
        Err(DbError::NotConnected)
    }
}

#[test]
fn test_stub_runs_are_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "rows.sql", "::ROWS\nSELECT a, b, c FROM anything\n");
    write(
        dir.path(),
        "rows.tpl",
        "::MAIN\n<rows>\n#{ROWS}\\\n</rows>\n::ROWS\n  <row a=\"${a}\" b=\"${b}\">${c}</row>\n",
    );

    let mut definition = ReportDefinition {
        sql: Some("rows.sql".to_string()),
        template: "rows.tpl".to_string(),
        output: "rows.xml".to_string(),
        xml: true,
        ..ReportDefinition::default()
    };
    let options = RunOptions {
        base_path: dir.path().to_path_buf(),
        ..RunOptions::default()
    };

    let first = run_report(&mut definition, Box::new(TwoRows), &options).unwrap();
    let first_bytes = fs::read(&first.output_file).unwrap();
    let second = run_report(&mut definition, Box::new(TwoRows), &options).unwrap();
    let second_bytes = fs::read(&second.output_file).unwrap();

    assert_eq!(first_bytes, second_bytes);
    assert_eq!(
        String::from_utf8(first_bytes).unwrap(),
        "<rows>\n  <row a=\"1\" b=\"x\">&lt;y&gt;</row>\n  <row a=\"2\" b=\"\">z</row>\n</rows>"
    );
    assert_eq!(definition.last_output_file, Some(dir.path().join("rows.xml")));
    assert_eq!(second.rows, 2);
}
