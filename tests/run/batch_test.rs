use std::fs;
use std::path::Path;

use sqlreport::config::Settings;
use sqlreport::run::{BatchSummary, RunOptions, Runner};

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

const CONFIG: &str = r#"
[connections.default]
driver = "sqlite"
database = ":memory:"
init_sql = """
CREATE TABLE customers(id INTEGER, name TEXT);
INSERT INTO customers VALUES (1, 'Anna'), (2, 'Bob');
"""

[reports.driver]
sql = "driver.sql"
template = "driver.tpl"
output = "batch.txt"
batch = true

[reports.letter]
sql = "letter.sql"
template = "letter.tpl"
output = "letters/letter-${?id}.txt"

[reports.orphan]
template = "letter.tpl"
connection = "nowhere"
"#;

fn setup() -> (tempfile::TempDir, Settings) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "sqlreport.toml", CONFIG);
    write(root, "driver.sql", "::IDS\nSELECT id FROM customers ORDER BY id\n");
    write(
        root,
        "driver.tpl",
        "::MAIN\n#{IDS}\n!!nosuch!!x:=1\n!!orphan\n::IDS\n!!letter!!id:=${id}\n",
    );
    write(
        root,
        "letter.sql",
        "::CUSTOMER\nSELECT name FROM customers WHERE id = ${?id}\n",
    );
    write(
        root,
        "letter.tpl",
        "::MAIN\nDear #{CUSTOMER}, ${?year}\n::CUSTOMER\n${name}\\\n",
    );
    let settings = Settings::from_file(root.join("sqlreport.toml")).unwrap();
    (dir, settings)
}

#[test]
fn test_batch_runs_each_control_line() {
    let (dir, settings) = setup();
    let options = RunOptions {
        base_path: settings.base_path(),
        input: "year:=2024".to_string(),
        interactive: false,
        prepare: false,
    };
    let report = Runner::new(&settings, options).run("driver").unwrap();

    assert_eq!(
        report.batch,
        Some(BatchSummary {
            commands: 4,
            succeeded: 2,
            failed: 2,
        })
    );
    assert!(!dir.path().join("batch.txt").exists());

    let letters = dir.path().join("letters");
    assert_eq!(
        fs::read_to_string(letters.join("letter-1.txt")).unwrap(),
        "Dear Anna, 2024"
    );
    assert_eq!(
        fs::read_to_string(letters.join("letter-2.txt")).unwrap(),
        "Dear Bob, 2024"
    );
}

#[test]
fn test_non_batch_report_keeps_output() {
    let (dir, settings) = setup();
    let options = RunOptions {
        base_path: settings.base_path(),
        input: "id:=2|year:=2025".to_string(),
        ..RunOptions::default()
    };
    let report = Runner::new(&settings, options).run("letter").unwrap();

    assert!(report.batch.is_none());
    assert_eq!(report.output_file, dir.path().join("letters/letter-2.txt"));
    assert_eq!(
        fs::read_to_string(&report.output_file).unwrap(),
        "Dear Bob, 2025"
    );
}
