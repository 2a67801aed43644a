use sqlreport::db::SqliteConnector;
use sqlreport::definition::Definitions;
use sqlreport::engine::{Engine, EngineOptions, MAIN_TEMPLATE};
use sqlreport::messages::{Level, Messages};

const INIT: &str = "
    CREATE TABLE c(id INTEGER, name TEXT);
    INSERT INTO c VALUES (1, 'anna'), (2, 'bob'), (3, 'carl');
    CREATE TABLE o(cid INTEGER, item TEXT);
    INSERT INTO o VALUES (1, 'apple'), (1, 'pear'), (2, 'plum');
";

const QUERIES: &str = "\
::C
SELECT id, name FROM c ORDER BY id
::O
SELECT item FROM o WHERE cid = ${id} ORDER BY item
";

const TEMPLATES: &str = "\
::MAIN
#{C}\\
::C
${name}: #{O,LIST,/}
::O
${item}\\
";

fn engine(prepare: bool, input: &str, queries: &str, templates: &str) -> Engine {
    let options = EngineOptions {
        prepare_queries: prepare,
        ..EngineOptions::default()
    };
    let connector = SqliteConnector::in_memory().with_init_sql(INIT);
    let mut engine = Engine::new(Box::new(connector), options);
    engine.set_input_values(input);
    engine.connect().unwrap();
    let mut messages = Messages::new();
    engine.load_definitions(Definitions::parse(queries, templates, &mut messages));
    engine
}

#[test]
fn test_prepared_output_matches_text_mode() {
    let mut text = engine(false, "", QUERIES, TEMPLATES);
    let mut prepared = engine(true, "", QUERIES, TEMPLATES);

    let expected = "anna: apple/pear\nbob: plum\ncarl: \n";
    assert_eq!(text.output_template(MAIN_TEMPLATE), expected);
    assert_eq!(prepared.output_template(MAIN_TEMPLATE), expected);
    assert_eq!(prepared.messages().error_count(), 0);
}

#[test]
fn test_unbound_parameter_is_null() {
    let queries = "::P\nSELECT count(*) AS n FROM o WHERE cid = ${missing}";
    let templates = "::MAIN\n#{P}\\\n::P\n${n}\\";

    let mut prepared = engine(true, "", queries, templates);
    assert_eq!(prepared.output_template(MAIN_TEMPLATE), "0");
    assert_eq!(prepared.messages().error_count(), 0);

    // Text mode leaves an unknown marker in the SQL.
    let mut text = engine(false, "", queries, templates);
    let out = text.output_template(MAIN_TEMPLATE);
    assert!(out.starts_with("## error executing"));
    assert!(text.messages().error_count() >= 1);
}

#[test]
fn test_user_input_is_fixed_at_prepare_time() {
    let queries = "::C\nSELECT name FROM c WHERE id >= ${?min} ORDER BY id";
    let templates = "::MAIN\n#{C,LIST,+}\\\n::C\n${name}\\";

    let mut prepared = engine(true, "min:=2", queries, templates);
    assert_eq!(prepared.output_template(MAIN_TEMPLATE), "bob+carl");
}

#[test]
fn test_failed_prepare_falls_back_to_text_execution() {
    let queries = "::BAD\nSELECT * FROM nope";
    let templates = "::MAIN\n#{BAD}\\\n::BAD\n${x}";

    let mut prepared = engine(true, "", queries, templates);
    assert_eq!(prepared.messages().error_count(), 1);
    let error = prepared.messages().with_level(Level::Error).next().unwrap();
    assert!(error.text.starts_with("preparing sql query"));

    let out = prepared.output_template(MAIN_TEMPLATE);
    assert!(out.starts_with("## error executing SELECT * FROM nope ## "));
    assert_eq!(prepared.messages().error_count(), 2);
}
