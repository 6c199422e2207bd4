//! Stable structural JSON codec for the expression tree.
//!
//! Leaves serialize as their bare primitive value, inner nodes as an object
//! of `left`/`operator`/`right` with the fuzzy distance and boost power only
//! present when they differ from their defaults. A range's right side is a
//! `{min, max, inclusive}` boundary object rather than a nested expression;
//! the decoder tells the two apart by looking for the boundary keys.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value as Json};

use crate::ast::{
    Expression, Operand, Operator, RangeBoundary, Rhs, Value, classify_string,
};

#[derive(Debug)]
pub enum CodecError {
    Json(serde_json::Error),
    /// The JSON was well formed but does not describe an expression.
    Structure(String),
}

impl From<serde_json::Error> for CodecError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(e) => write!(f, "json error: {e}"),
            Self::Structure(msg) => write!(f, "malformed expression json: {msg}"),
        }
    }
}

impl std::error::Error for CodecError {}

/// Serialize an expression to its canonical JSON text.
pub fn to_json(e: &Expression) -> Result<String, CodecError> {
    Ok(serde_json::to_string(&encode(e)?)?)
}

/// Decode an expression from JSON text. The resulting tree is freshly owned
///  by the caller and is not validated.
pub fn from_json(data: &str) -> Result<Expression, CodecError> {
    let v: Json = serde_json::from_str(data)?;
    decode(&v)
}

impl Serialize for Expression {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        encode(self)
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Expression {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = Json::deserialize(deserializer)?;
        decode(&v).map_err(serde::de::Error::custom)
    }
}

fn encode(e: &Expression) -> Result<Json, CodecError> {
    if e.op.is_leaf() {
        if let Operand::Value(v) = &e.left {
            return value_json(v);
        }
    }

    let mut out = Map::new();
    let left = match &e.left {
        Operand::Value(v) => value_json(v)?,
        Operand::Expr(sub) => encode(sub)?,
        Operand::List(items) => Json::Array(
            items
                .iter()
                .map(encode)
                .collect::<Result<Vec<_>, _>>()?,
        ),
    };
    out.insert("left".to_string(), left);
    out.insert("operator".to_string(), Json::String(e.op.tag().to_string()));

    match &e.right {
        Some(Rhs::Expr(sub)) => {
            out.insert("right".to_string(), encode(sub)?);
        }
        Some(Rhs::Boundary(b)) => {
            let mut boundary = Map::new();
            boundary.insert("min".to_string(), encode(&b.min)?);
            boundary.insert("max".to_string(), encode(&b.max)?);
            // inclusive is the default, only spell out the exception
            if !b.inclusive {
                boundary.insert("inclusive".to_string(), Json::Bool(false));
            }
            out.insert("right".to_string(), Json::Object(boundary));
        }
        None => {}
    }

    if e.op == Operator::Fuzzy && e.distance != 1 {
        out.insert("distance".to_string(), Json::from(e.distance));
    }
    if e.op == Operator::Boost && e.power != 1.0 {
        out.insert(
            "power".to_string(),
            serde_json::Number::from_f64(e.power)
                .map(Json::Number)
                .ok_or_else(|| CodecError::Structure("boost power is not finite".to_string()))?,
        );
    }

    Ok(Json::Object(out))
}

fn value_json(v: &Value) -> Result<Json, CodecError> {
    Ok(match v {
        Value::String(s) | Value::Column(s) => Json::String(s.clone()),
        Value::Int(i) => Json::from(*i),
        Value::Float(x) => serde_json::Number::from_f64(*x)
            .map(Json::Number)
            .ok_or_else(|| CodecError::Structure("float literal is not finite".to_string()))?,
        Value::Bool(b) => Json::Bool(*b),
    })
}

fn decode(v: &Json) -> Result<Expression, CodecError> {
    let Json::Object(map) = v else {
        return decode_leaf(v);
    };

    let op = map
        .get("operator")
        .and_then(Json::as_str)
        .ok_or_else(|| CodecError::Structure("missing operator tag".to_string()))?;
    let op: Operator = op
        .parse()
        .map_err(|()| CodecError::Structure(format!("unknown operator [{op}]")))?;

    let left_json = map
        .get("left")
        .ok_or_else(|| CodecError::Structure("missing left side".to_string()))?;
    let left = match left_json {
        Json::Array(items) => Operand::List(
            items
                .iter()
                .map(decode_leaf)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        other => {
            let mut sub = decode(other)?;
            // a string-payload leaf on the left of a column operator is the
            // column, whatever the classifier made of it
            if op.operates_on_column() {
                if let Operand::Value(Value::String(s)) = &sub.left {
                    sub = Expression::column(s.clone());
                }
            }
            Operand::Expr(Box::new(sub))
        }
    };

    // the boundary historically also appeared under a "boundaries" key
    let right_json = map.get("right").or_else(|| map.get("boundaries"));
    let right = match right_json {
        None => None,
        Some(Json::Object(b)) if looks_like_boundary(b) => {
            let min = decode_boundary_side(b.get("min"))?;
            let max = decode_boundary_side(b.get("max"))?;
            let inclusive = b.get("inclusive").and_then(Json::as_bool).unwrap_or(true);
            Some(Rhs::Boundary(RangeBoundary {
                min: Box::new(min),
                max: Box::new(max),
                inclusive,
            }))
        }
        Some(r) => Some(Rhs::Expr(Box::new(decode(r)?))),
    };

    let mut e = Expression {
        op,
        left,
        right,
        distance: 1,
        power: 1.0,
    };
    if e.op == Operator::Fuzzy {
        e.distance = map.get("distance").and_then(Json::as_i64).unwrap_or(1);
    }
    if e.op == Operator::Boost {
        e.power = map.get("power").and_then(Json::as_f64).unwrap_or(1.0);
    }
    Ok(e)
}

fn decode_leaf(v: &Json) -> Result<Expression, CodecError> {
    match v {
        // integers first so whole numbers don't get demoted to doubles
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Expression::literal(Value::Int(i)))
            } else if let Some(f) = n.as_f64() {
                Ok(Expression::literal(Value::Float(f)))
            } else {
                Err(CodecError::Structure(format!("unrepresentable number {n}")))
            }
        }
        Json::String(s) => Ok(classify_string(s)),
        Json::Bool(b) => Ok(Expression::literal(Value::Bool(*b))),
        other => Err(CodecError::Structure(format!(
            "expected a literal, found {other}"
        ))),
    }
}

fn decode_boundary_side(v: Option<&Json>) -> Result<Expression, CodecError> {
    let v = v.ok_or_else(|| CodecError::Structure("range boundary side missing".to_string()))?;
    Ok(demote_whole_float(decode(v)?))
}

/// JSON has a single number type, so `5.0` and `5` both arrive as numbers; a
///  whole-valued float in a boundary means an integer.
fn demote_whole_float(e: Expression) -> Expression {
    if let Operand::Value(Value::Float(f)) = e.left {
        if e.op == Operator::Literal && f.fract() == 0.0 && f.is_finite() {
            return Expression::literal(Value::Int(f as i64));
        }
    }
    e
}

fn looks_like_boundary(map: &Map<String, Json>) -> bool {
    map.contains_key("min") && map.contains_key("max") && !map.contains_key("left")
}
