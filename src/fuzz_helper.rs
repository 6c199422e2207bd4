//! Entry points for the fuzz targets. The real fuzzing oracle (feeding the
//! rendered filter through an actual PostgreSQL parser) lives outside this
//! crate; what we check here is that every render outcome is either valid
//! output or one of the stable, documented error messages.

use crate::ast::Expression;
use crate::render::Driver;
use crate::{ParseOptions, PostgresDriver, parse};

/// The error prefixes a fuzz run treats as acceptable outcomes.
pub const EXPECTED_RENDER_ERRORS: &[&str] = &[
    "unable to render operator",
    "literal contains invalid utf8",
    "literal contains null byte",
    "column name contains a double quote",
    "column name is empty",
    "the BETWEEN operator needs a two item list in the right hand side",
];

/// Parse and render a random query string, with and without a default field.
/// Parse failures are uninteresting; render failures must be on the list.
pub fn check_query(input: &str) {
    check_with(input, &ParseOptions::default());
    check_with(input, &ParseOptions::with_default_field("default"));
}

fn check_with(input: &str, opts: &ParseOptions) {
    let Ok(e) = parse(input, opts) else {
        return;
    };

    check_tree(&e);

    // parsed trees can't smuggle placeholder characters into columns, so the
    // placeholder count always matches the parameter list
    if let Ok((sql, params)) = PostgresDriver::new().render_param(&e) {
        assert_eq!(
            sql.matches('$').count(),
            params.len(),
            "placeholder count mismatch for {input:?}: {sql}"
        );
    }
}

/// Render an arbitrary (possibly hand-built) tree and check the outcome.
pub fn check_tree(e: &Expression) {
    let driver = PostgresDriver::new();

    if let Err(err) = driver.render(e) {
        assert_expected(&err.to_string());
    }
    if let Err(err) = driver.render_param(e) {
        assert_expected(&err.to_string());
    }
}

fn assert_expected(msg: &str) {
    assert!(
        EXPECTED_RENDER_ERRORS.iter().any(|p| msg.starts_with(p)),
        "unexpected render error: {msg}"
    );
}
