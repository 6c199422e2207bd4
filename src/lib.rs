//! This crate parses lucene query strings into an expression tree and renders
//!  that tree as a SQL `WHERE`-clause fragment, with PostgreSQL as the first
//!  dialect. The tree also round-trips through a stable JSON encoding.
//!
//! Parsing is a shift-reduce pass over a precedence-ordered token stream
//!  ([lex]), driven by a table of local reduction rules ([reduce] and
//!  [parser]). Rendering walks the validated tree ([ast]) through a
//!  per-operator emitter table ([render]), either inlining literals or
//!  collecting them as positional parameters.
//!
//! ## Rendering a query
//! ```
//! use lucene_expr::{ParseOptions, to_postgres};
//!
//! # fn main() -> Result<(), lucene_expr::Error> {
//! let sql = to_postgres("a:[1 TO 5] AND b:foo*", &ParseOptions::default())?;
//! assert_eq!(sql, r#"("a" >= 1 AND "a" <= 5) AND ("b" SIMILAR TO 'foo%')"#);
//! # Ok(())
//! # }
//! ```
//!
//! ## Parameterized queries
//! ```
//! use lucene_expr::{ParseOptions, to_parameterized_postgres, Value};
//!
//! # fn main() -> Result<(), lucene_expr::Error> {
//! let (sql, params) = to_parameterized_postgres("a:b", &ParseOptions::default())?;
//! assert_eq!(sql, r#""a" = $1"#);
//! assert_eq!(params, vec![Value::String("b".to_string())]);
//! # Ok(())
//! # }
//! ```
//!
//! The scoring-only operators (`^` boost and `~` fuzzy) survive parsing but
//!  have no SQL meaning; the PostgreSQL driver refuses to render them.

pub mod ast;
pub mod fuzz_helper;
pub mod json;
pub mod lex;
pub mod parser;
pub mod reduce;
pub mod render;

pub use ast::{Expression, Operator, Value};
pub use json::{from_json, to_json};
pub use parser::{ParseError, ParseOptions, parse};
pub use render::postgres::PostgresDriver;
pub use render::{Driver, RenderError};

/// The crate-level error: everything the public entry points can fail with.
#[derive(Debug)]
pub enum Error {
    Parse(ParseError),
    Render(RenderError),
}

impl From<ParseError> for Error {
    fn from(value: ParseError) -> Self {
        Self::Parse(value)
    }
}

impl From<RenderError> for Error {
    fn from(value: RenderError) -> Self {
        Self::Render(value)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "{e}"),
            Self::Render(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {}

/// Parse a lucene query and render it as a PostgreSQL filter string.
pub fn to_postgres(input: &str, opts: &ParseOptions) -> Result<String, Error> {
    let e = parse(input, opts)?;
    Ok(PostgresDriver::new().render(&e)?)
}

/// Like [to_postgres] but with `$n` placeholders and the literal values
///  returned separately, in placeholder order.
pub fn to_parameterized_postgres(
    input: &str,
    opts: &ParseOptions,
) -> Result<(String, Vec<Value>), Error> {
    let e = parse(input, opts)?;
    Ok(PostgresDriver::new().render_param(&e)?)
}

/// Render an already-parsed expression with the given driver.
pub fn render<D: Driver>(e: &Expression, driver: &D) -> Result<String, RenderError> {
    driver.render(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pg(input: &str) -> String {
        to_postgres(input, &ParseOptions::default())
            .unwrap_or_else(|err| panic!("wanted no error for {input:?}, got: {err}"))
    }

    macro_rules! to_postgres_cases {
        ($($name:ident: $input:expr => $want:expr;)*) => {
            $(
                #[test]
                fn $name() {
                    assert_eq!(pg($input), $want, "sql does not match for {:?}", $input);
                }
            )*
        };
    }

    to_postgres_cases! {
        scenario_equals: "a:b" => r#""a" = 'b'"#;
        scenario_inclusive_range: "a:[1 TO 5]" => r#""a" >= 1 AND "a" <= 5"#;
        scenario_half_open_range: "a:{* TO 5}" => r#""a" < 5"#;
        scenario_wildcard: "a:b*" => r#""a" SIMILAR TO 'b%'"#;
        scenario_regex: "a:/b [c]/" => r#""a" ~ 'b [c]'"#;
        scenario_in_list: "a:(foo OR baz OR bar)" => r#""a" IN ('foo', 'baz', 'bar')"#;
        scenario_greater_eq: "a:>=22" => r#""a" >= 22"#;
        scenario_full_precedence: "a OR b AND c:[* to -1] OR d AND NOT +e:f" =>
            r#"('a' OR ('b' AND ("c" <= -1))) OR ('d' AND (NOT("e" = 'f')))"#;
        scenario_single_char_wildcard: "a:b?z" => r#""a" SIMILAR TO 'b_z'"#;
        scenario_exclusive_string_range: "a:{foo TO bar}" =>
            r#""a" BETWEEN 'foo' AND 'bar'"#;
        scenario_must_dropped: "+a:b" => r#""a" = 'b'"#;
        scenario_must_not: "-a:b" => r#"NOT("a" = 'b')"#;
    }

    #[test]
    fn scenario_default_field() {
        let opts = ParseOptions::with_default_field("default");
        let sql = to_postgres(r#""jakarta apache" !"Apache Lucene""#, &opts).unwrap();
        assert_eq!(
            sql,
            r#"("default" = 'jakarta apache') AND (NOT("default" = 'Apache Lucene'))"#
        );
    }

    #[test]
    fn scenario_fuzzy_refused() {
        let err = to_postgres("b AND a~", &ParseOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "unable to render operator [FUZZY]");
    }

    #[test]
    fn scenario_parameterized_equals() {
        let (sql, params) =
            to_parameterized_postgres("a:b", &ParseOptions::default()).unwrap();
        assert_eq!(sql, r#""a" = $1"#);
        assert_eq!(params, vec![Value::String("b".to_string())]);
    }

    #[test]
    fn scenario_parameterized_greater_eq() {
        let (sql, params) =
            to_parameterized_postgres("a:>=22", &ParseOptions::default()).unwrap();
        assert_eq!(sql, r#""a" >= $1"#);
        assert_eq!(params, vec![Value::Int(22)]);
    }

    #[test]
    fn parameterized_placeholder_count_matches_params() {
        let inputs = [
            "a:b",
            "a:b AND c:d OR e:f",
            "a:[1 TO 5]",
            "a:{foo TO bar}",
            "a:(foo OR baz OR bar)",
            "a:b* AND c:/d e/",
            "NOT a:b",
        ];
        for input in inputs {
            let (sql, params) =
                to_parameterized_postgres(input, &ParseOptions::default()).unwrap();
            assert_eq!(
                sql.matches('$').count(),
                params.len(),
                "placeholder count mismatch for {input:?}: {sql}"
            );
        }
    }

    // substituting the parameters back into the placeholders reproduces the
    // literal rendering
    #[test]
    fn parameterized_matches_literal_after_substitution() {
        let inputs = [
            "a:b",
            "a:>=22",
            "a:[1 TO 5]",
            "a:{* TO 5}",
            "a:{foo TO bar}",
            "a:(foo OR baz OR bar)",
            "a:b*",
            "a:/b c/",
            "a:b AND c:d",
        ];
        for input in inputs {
            let literal = pg(input);
            let (sql, params) =
                to_parameterized_postgres(input, &ParseOptions::default()).unwrap();
            assert_eq!(
                substitute(&sql, &params),
                literal,
                "substituted query mismatch for {input:?}"
            );
        }
    }

    fn substitute(sql: &str, params: &[Value]) -> String {
        let mut out = sql.to_string();
        for (i, p) in params.iter().enumerate().rev() {
            let placeholder = format!("${}", i + 1);
            let rendered = match p {
                Value::String(s) => format!("'{}'", s.replace('\'', "''")),
                Value::Int(n) => n.to_string(),
                Value::Float(x) => x.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Column(c) => c.clone(),
            };
            out = out.replace(&placeholder, &rendered);
        }
        out
    }

    #[test]
    fn parse_then_render_separately() {
        let e = parse("a:b AND c:d", &ParseOptions::default()).unwrap();
        let sql = render(&e, &PostgresDriver::new()).unwrap();
        assert_eq!(sql, r#"("a" = 'b') AND ("c" = 'd')"#);
    }

    #[test]
    fn errors_carry_their_layer() {
        let err = to_postgres("a AND", &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));

        let err = to_postgres("a~2", &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Render(_)));
    }
}
