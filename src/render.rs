//! The rendering framework. A driver is a table of per-operator emitter
//! functions; the [Base] walker serializes children bottom-up, decides on
//! parenthesization, and hands the two serialized sides to the table entry.
//! The parameterized walk additionally threads a positional argument list.

use std::collections::HashMap;

use crate::ast::{Expression, Operand, Operator, RangeBoundary, Rhs, Value};

pub mod postgres;

/// An emitter takes the serialized left and right side of an operator and
///  produces the rendered text for the whole node.
pub type RenderFn = fn(&str, &str) -> Result<String, RenderError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    UnsupportedOperator(Operator),
    InvalidUtf8(String),
    NullByte(String),
    EmptyColumn,
    QuotedColumn(String),
    MalformedBoundary(String),
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedOperator(op) => write!(f, "unable to render operator [{op}]"),
            Self::InvalidUtf8(s) => write!(f, "literal contains invalid utf8: {s:?}"),
            Self::NullByte(s) => write!(f, "literal contains null byte: {s:?}"),
            Self::EmptyColumn => write!(f, "column name is empty"),
            Self::QuotedColumn(c) => write!(f, "column name contains a double quote: {c:?}"),
            Self::MalformedBoundary(right) => write!(
                f,
                "the BETWEEN operator needs a two item list in the right hand side, have {right}"
            ),
        }
    }
}

impl std::error::Error for RenderError {}

/// A rendering backend for one SQL dialect.
pub trait Driver {
    fn render(&self, e: &Expression) -> Result<String, RenderError>;
    fn render_param(&self, e: &Expression) -> Result<(String, Vec<Value>), RenderError>;
}

/// The table-driven walker shared by all drivers.
pub struct Base {
    fns: HashMap<Operator, RenderFn>,
}

impl Base {
    pub fn with_table(fns: HashMap<Operator, RenderFn>) -> Self {
        Self { fns }
    }

    pub fn render(&self, e: &Expression) -> Result<String, RenderError> {
        let wrap = wraps_children(e.op);

        let left = match &e.left {
            Operand::Value(v) => serialize_value(v)?,
            Operand::Expr(sub) => self.child(sub, wrap)?,
            Operand::List(items) => {
                let rendered: Vec<String> = items
                    .iter()
                    .map(|item| self.render(item))
                    .collect::<Result<_, _>>()?;
                rendered.join(", ")
            }
        };

        let right = match &e.right {
            None => String::new(),
            Some(Rhs::Expr(sub)) => self.child(sub, wrap)?,
            Some(Rhs::Boundary(b)) => self.boundary(b)?,
        };

        let f = self
            .fns
            .get(&e.op)
            .ok_or(RenderError::UnsupportedOperator(e.op))?;
        f(&left, &right)
    }

    fn child(&self, sub: &Expression, wrap: bool) -> Result<String, RenderError> {
        let s = self.render(sub)?;
        if wrap && !is_simple(sub) {
            Ok(format!("({s})"))
        } else {
            Ok(s)
        }
    }

    /// Boundaries serialize to the bracketed comma form that the range
    ///  emitter parses back apart.
    fn boundary(&self, b: &RangeBoundary) -> Result<String, RenderError> {
        let min = self.render(&b.min)?;
        let max = self.render(&b.max)?;
        if b.inclusive {
            Ok(format!("[{min}, {max}]"))
        } else {
            Ok(format!("({min}, {max})"))
        }
    }

    // The parameterized walk. Like and Range get special treatment because
    //  their emitters need to see the captured parameter values: Like to
    //  rewrite wildcard metacharacters and pick its operator, Range to tell
    //  numeric comparisons from a string BETWEEN.

    pub fn render_param(&self, e: &Expression) -> Result<(String, Vec<Value>), RenderError> {
        let mut params = Vec::new();
        let sql = self.param_node(e, &mut params)?;
        Ok((sql, params))
    }

    fn param_node(&self, e: &Expression, params: &mut Vec<Value>) -> Result<String, RenderError> {
        match e.op {
            Operator::Like => return self.like_param(e, params),
            Operator::Range => return self.range_param(e, params),
            _ => {}
        }

        let wrap = wraps_children(e.op);

        let left = match &e.left {
            Operand::Value(v) => serialize_value_param(v, params)?,
            Operand::Expr(sub) => self.param_child(sub, wrap, params)?,
            Operand::List(items) => {
                let rendered: Vec<String> = items
                    .iter()
                    .map(|item| self.param_node(item, params))
                    .collect::<Result<_, _>>()?;
                rendered.join(", ")
            }
        };

        let right = match &e.right {
            None => String::new(),
            Some(Rhs::Expr(sub)) => self.param_child(sub, wrap, params)?,
            Some(Rhs::Boundary(b)) => self.param_boundary(b, params)?,
        };

        let f = self
            .fns
            .get(&e.op)
            .ok_or(RenderError::UnsupportedOperator(e.op))?;
        f(&left, &right)
    }

    fn param_child(
        &self,
        sub: &Expression,
        wrap: bool,
        params: &mut Vec<Value>,
    ) -> Result<String, RenderError> {
        let s = self.param_node(sub, params)?;
        if wrap && !is_simple(sub) {
            Ok(format!("({s})"))
        } else {
            Ok(s)
        }
    }

    fn param_boundary(
        &self,
        b: &RangeBoundary,
        params: &mut Vec<Value>,
    ) -> Result<String, RenderError> {
        let min = self.param_node(&b.min, params)?;
        let max = self.param_node(&b.max, params)?;
        if b.inclusive {
            Ok(format!("[{min}, {max}]"))
        } else {
            Ok(format!("({min}, {max})"))
        }
    }

    fn like_param(&self, e: &Expression, params: &mut Vec<Value>) -> Result<String, RenderError> {
        let left = match &e.left {
            Operand::Expr(sub) => self.param_node(sub, params)?,
            Operand::Value(v) => serialize_value_param(v, params)?,
            Operand::List(_) => return Err(RenderError::UnsupportedOperator(e.op)),
        };

        let Some(Rhs::Expr(value)) = &e.right else {
            return Err(RenderError::UnsupportedOperator(e.op));
        };
        let mark = params.len();
        let right = self.param_node(value, params)?;

        if value.op == Operator::Regexp {
            // the pattern went into the parameter list still wearing its
            // slash delimiters
            if let Some(Value::String(s)) = params.get_mut(mark) {
                *s = strip_regex_delimiters(s).to_string();
            }
            Ok(format!("{left} ~ {right}"))
        } else {
            if value.op == Operator::Wild
                && let Some(Value::String(s)) = params.get_mut(mark)
            {
                *s = s.replace('*', "%").replace('?', "_");
            }
            Ok(format!("{left} SIMILAR TO {right}"))
        }
    }

    fn range_param(&self, e: &Expression, params: &mut Vec<Value>) -> Result<String, RenderError> {
        let left = match &e.left {
            Operand::Expr(sub) => self.param_node(sub, params)?,
            Operand::Value(v) => serialize_value_param(v, params)?,
            Operand::List(_) => return Err(RenderError::UnsupportedOperator(e.op)),
        };

        let Some(Rhs::Boundary(b)) = &e.right else {
            return Err(RenderError::UnsupportedOperator(e.op));
        };
        let mark = params.len();
        let min = self.param_node(&b.min, params)?;
        let max = self.param_node(&b.max, params)?;

        let captured = &params[mark..];
        if captured.is_empty() {
            // both sides unbounded or inline; let the plain emitter have it
            let right = if b.inclusive {
                format!("[{min}, {max}]")
            } else {
                format!("({min}, {max})")
            };
            return rang(&left, &right);
        }

        let numeric = captured
            .iter()
            .all(|p| matches!(p, Value::Int(_) | Value::Float(_)));
        if !numeric {
            return Ok(format!("{left} BETWEEN {min} AND {max}"));
        }

        let (ge, le) = if b.inclusive { (">=", "<=") } else { (">", "<") };
        if min == "'*'" {
            return Ok(format!("{left} {le} {max}"));
        }
        if max == "'*'" {
            return Ok(format!("{left} {ge} {min}"));
        }
        Ok(format!("{left} {ge} {min} AND {left} {le} {max}"))
    }
}

/// Children of these operators are never parenthesized; either the emitter
///  brackets its own output or the operand grammar makes parens wrong.
fn wraps_children(op: Operator) -> bool {
    !matches!(
        op,
        Operator::Range
            | Operator::Not
            | Operator::List
            | Operator::In
            | Operator::Literal
            | Operator::Must
            | Operator::MustNot
    )
}

fn is_simple(e: &Expression) -> bool {
    matches!(
        e.op,
        Operator::Undefined | Operator::Literal | Operator::Regexp | Operator::Wild
    )
}

fn serialize_value(v: &Value) -> Result<String, RenderError> {
    match v {
        Value::Column(c) => serialize_column(c),
        Value::String(s) => Ok(quote_string(s)),
        Value::Int(i) => Ok(i.to_string()),
        Value::Float(x) => Ok(x.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
    }
}

/// Strings and numbers become placeholders; the `*` sentinel, columns, and
///  booleans stay inline.
fn serialize_value_param(v: &Value, params: &mut Vec<Value>) -> Result<String, RenderError> {
    match v {
        Value::Column(c) => serialize_column(c),
        Value::String(s) if s == "*" => Ok("'*'".to_string()),
        Value::String(_) | Value::Int(_) | Value::Float(_) => {
            params.push(v.clone());
            Ok("?".to_string())
        }
        Value::Bool(b) => Ok(b.to_string()),
    }
}

fn serialize_column(name: &str) -> Result<String, RenderError> {
    if name.is_empty() {
        return Err(RenderError::EmptyColumn);
    }
    if name.contains('"') {
        return Err(RenderError::QuotedColumn(name.to_string()));
    }
    Ok(format!("\"{name}\""))
}

fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

// The shared emitter set. Dialect drivers start from this table and override
//  or drop entries.

pub fn shared_table() -> HashMap<Operator, RenderFn> {
    HashMap::from([
        (Operator::Literal, literal as RenderFn),
        (Operator::Wild, noop),
        (Operator::Regexp, regexp_literal),
        (Operator::Equals, equals),
        (Operator::Greater, greater),
        (Operator::Less, less),
        (Operator::GreaterEq, greater_eq),
        (Operator::LessEq, less_eq),
        (Operator::Like, like),
        (Operator::In, in_fn),
        (Operator::List, list),
        (Operator::And, and_fn),
        (Operator::Or, or_fn),
        (Operator::Not, not_fn),
        (Operator::Must, noop),
        (Operator::MustNot, not_fn),
        (Operator::Range, rang),
        // Boost and Fuzzy are deliberately absent: scoring has no SQL
        // counterpart, and a missing entry surfaces as a render error
    ])
}

fn literal(left: &str, _right: &str) -> Result<String, RenderError> {
    if std::str::from_utf8(left.as_bytes()).is_err() {
        return Err(RenderError::InvalidUtf8(left.to_string()));
    }
    if left.contains('\0') {
        return Err(RenderError::NullByte(left.to_string()));
    }
    Ok(left.to_string())
}

fn noop(left: &str, _right: &str) -> Result<String, RenderError> {
    Ok(left.to_string())
}

/// A standalone regex leaf drops its lucene delimiters: the serialized form
///  is `'/.../'`, the dialect expects a bare pattern.
fn regexp_literal(left: &str, right: &str) -> Result<String, RenderError> {
    let left = literal(left, right)?;
    let b = left.as_bytes();
    if b.len() >= 4 && b[1] == b'/' && b[b.len() - 2] == b'/' {
        return Ok(format!("'{}'", &left[2..left.len() - 2]));
    }
    Ok(left)
}

fn equals(left: &str, right: &str) -> Result<String, RenderError> {
    Ok(format!("{left} = {right}"))
}

fn greater(left: &str, right: &str) -> Result<String, RenderError> {
    Ok(format!("{left} > {right}"))
}

fn less(left: &str, right: &str) -> Result<String, RenderError> {
    Ok(format!("{left} < {right}"))
}

fn greater_eq(left: &str, right: &str) -> Result<String, RenderError> {
    Ok(format!("{left} >= {right}"))
}

fn less_eq(left: &str, right: &str) -> Result<String, RenderError> {
    Ok(format!("{left} <= {right}"))
}

fn like(left: &str, right: &str) -> Result<String, RenderError> {
    let b = right.as_bytes();
    if b.len() >= 4 && b[1] == b'/' && b[b.len() - 2] == b'/' {
        let stripped = format!("'{}'", &right[2..right.len() - 2]);
        return Ok(format!("{left} ~ {stripped}"));
    }

    let right = right.replace('*', "%").replace('?', "_");
    Ok(format!("{left} SIMILAR TO {right}"))
}

fn in_fn(left: &str, right: &str) -> Result<String, RenderError> {
    Ok(format!("{left} IN {right}"))
}

fn list(left: &str, _right: &str) -> Result<String, RenderError> {
    Ok(format!("({left})"))
}

fn and_fn(left: &str, right: &str) -> Result<String, RenderError> {
    Ok(format!("{left} AND {right}"))
}

fn or_fn(left: &str, right: &str) -> Result<String, RenderError> {
    Ok(format!("{left} OR {right}"))
}

fn not_fn(left: &str, _right: &str) -> Result<String, RenderError> {
    Ok(format!("NOT({left})"))
}

/// The range emitter has the most work: inclusive and exclusive ranges,
///  integer and float ranges, unbounded sides, and a BETWEEN fallback for
///  anything non-numeric.
fn rang(left: &str, right: &str) -> Result<String, RenderError> {
    if right.len() < 2 {
        return Err(RenderError::MalformedBoundary(right.to_string()));
    }
    let b = right.as_bytes();
    let inclusive = !(b[0] == b'(' && b[b.len() - 1] == b')');

    let stripped = &right[1..right.len() - 1];
    let sides: Vec<&str> = stripped.split(',').collect();
    let [raw_min, raw_max] = sides.as_slice() else {
        return Err(RenderError::MalformedBoundary(right.to_string()));
    };
    let raw_min = raw_min.trim();
    let raw_max = raw_max.trim();

    let (ge, le) = if inclusive { (">=", "<=") } else { (">", "<") };

    if let Some((min, max)) = to_ints(raw_min, raw_max) {
        if raw_min == "'*'" {
            return Ok(format!("{left} {le} {max}"));
        }
        if raw_max == "'*'" {
            return Ok(format!("{left} {ge} {min}"));
        }
        return Ok(format!("{left} {ge} {min} AND {left} {le} {max}"));
    }

    if let Some((min, max)) = to_floats(raw_min, raw_max) {
        if raw_min == "'*'" {
            return Ok(format!("{left} {le} {max:.2}"));
        }
        if raw_max == "'*'" {
            return Ok(format!("{left} {ge} {min:.2}"));
        }
        return Ok(format!("{left} {ge} {min:.2} AND {left} {le} {max:.2}"));
    }

    Ok(format!("{left} BETWEEN {raw_min} AND {raw_max}"))
}

/// Parse both sides as integers, letting the `'*'` sentinel through as a
///  zero that the caller never looks at.
fn to_ints(raw_min: &str, raw_max: &str) -> Option<(i64, i64)> {
    let min = match raw_min.parse::<i64>() {
        Ok(v) => v,
        Err(_) if raw_min == "'*'" => 0,
        Err(_) => return None,
    };
    let max = match raw_max.parse::<i64>() {
        Ok(v) => v,
        Err(_) if raw_max == "'*'" => 0,
        Err(_) => return None,
    };
    Some((min, max))
}

fn to_floats(raw_min: &str, raw_max: &str) -> Option<(f64, f64)> {
    let min = match raw_min.parse::<f64>() {
        Ok(v) => v,
        Err(_) if raw_min == "'*'" => 0.0,
        Err(_) => return None,
    };
    let max = match raw_max.parse::<f64>() {
        Ok(v) => v,
        Err(_) if raw_max == "'*'" => 0.0,
        Err(_) => return None,
    };
    Some((min, max))
}

fn strip_regex_delimiters(s: &str) -> &str {
    let b = s.as_bytes();
    if b.len() >= 2 && b[0] == b'/' && b[b.len() - 1] == b'/' {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_serialization_rules() {
        assert_eq!(serialize_column("a").unwrap(), "\"a\"");
        assert_eq!(serialize_column("a b").unwrap(), "\"a b\"");
        assert_eq!(serialize_column("").unwrap_err(), RenderError::EmptyColumn);
        assert!(matches!(
            serialize_column("a\"b").unwrap_err(),
            RenderError::QuotedColumn(_)
        ));
    }

    #[test]
    fn string_quoting_doubles_single_quotes() {
        assert_eq!(quote_string("it's"), "'it''s'");
        assert_eq!(quote_string("plain"), "'plain'");
    }

    #[test]
    fn rang_emits_comparisons_for_ints() {
        assert_eq!(rang("\"a\"", "[1, 5]").unwrap(), "\"a\" >= 1 AND \"a\" <= 5");
        assert_eq!(rang("\"a\"", "(1, 5)").unwrap(), "\"a\" > 1 AND \"a\" < 5");
    }

    #[test]
    fn rang_elides_unbounded_sides() {
        assert_eq!(rang("\"a\"", "('*', 5)").unwrap(), "\"a\" < 5");
        assert_eq!(rang("\"a\"", "['*', 5]").unwrap(), "\"a\" <= 5");
        assert_eq!(rang("\"a\"", "(5, '*')").unwrap(), "\"a\" > 5");
        assert_eq!(rang("\"a\"", "[5, '*']").unwrap(), "\"a\" >= 5");
        // the float path elides too
        assert_eq!(rang("\"a\"", "('*', 5.5)").unwrap(), "\"a\" < 5.50");
    }

    #[test]
    fn rang_falls_back_to_between() {
        assert_eq!(
            rang("\"a\"", "['foo', 'bar']").unwrap(),
            "\"a\" BETWEEN 'foo' AND 'bar'"
        );
    }

    #[test]
    fn rang_rejects_malformed_boundaries() {
        let err = rang("\"a\"", "['a', 'b', 'c']").unwrap_err();
        assert!(
            err.to_string()
                .starts_with("the BETWEEN operator needs a two item list")
        );
    }

    #[test]
    fn like_translates_wildcards() {
        assert_eq!(
            like("\"a\"", "'b*c?'").unwrap(),
            "\"a\" SIMILAR TO 'b%c_'"
        );
    }

    #[test]
    fn like_strips_regex_delimiters() {
        assert_eq!(like("\"a\"", "'/b [c]/'").unwrap(), "\"a\" ~ 'b [c]'");
    }

    #[test]
    fn literal_rejects_null_bytes() {
        let err = literal("'a\0b'", "").unwrap_err();
        assert!(err.to_string().starts_with("literal contains null byte"));
    }
}
