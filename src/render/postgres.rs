//! The PostgreSQL driver: the shared emitter table plus the dialect's
//! positional `$n` placeholders. Boost and Fuzzy stay out of the table on
//! purpose, so scoring operators surface as a stable render error instead of
//! silently producing SQL that means something else.

use crate::ast::{Expression, Value};
use crate::render::{Base, Driver, RenderError, shared_table};

pub struct PostgresDriver {
    base: Base,
}

impl PostgresDriver {
    pub fn new() -> Self {
        Self {
            base: Base::with_table(shared_table()),
        }
    }
}

impl Default for PostgresDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for PostgresDriver {
    fn render(&self, e: &Expression) -> Result<String, RenderError> {
        self.base.render(e)
    }

    fn render_param(&self, e: &Expression) -> Result<(String, Vec<Value>), RenderError> {
        let (sql, params) = self.base.render_param(e)?;
        Ok((number_placeholders(&sql), params))
    }
}

/// Rewrite the framework's `?` placeholders into `$1, $2, ...` left to right.
fn number_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut n = 0;
    for c in sql.chars() {
        if c == '?' {
            n += 1;
            out.push('$');
            out.push_str(&n.to_string());
        } else {
            out.push(c);
        }
    }
    out
}
