use arbitrary::{Arbitrary, Unstructured};

/// Operation is a closed enum over the lucene operations we understand.
/// The discriminant order is stable because the JSON codec and the render
///  tables key off it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Undefined,
    And,
    Or,
    Equals,
    Like,
    Not,
    Range,
    Must,
    MustNot,
    Boost,
    Fuzzy,
    Literal,
    Wild,
    Regexp,
    Greater,
    Less,
    GreaterEq,
    LessEq,
    In,
    List,
}

impl Operator {
    /// The stable upper-snake tag used in JSON and in error messages.
    pub fn tag(self) -> &'static str {
        match self {
            Operator::Undefined => "UNDEFINED",
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::Equals => "EQUALS",
            Operator::Like => "LIKE",
            Operator::Not => "NOT",
            Operator::Range => "RANGE",
            Operator::Must => "MUST",
            Operator::MustNot => "MUST_NOT",
            Operator::Boost => "BOOST",
            Operator::Fuzzy => "FUZZY",
            Operator::Literal => "LITERAL",
            Operator::Wild => "WILD",
            Operator::Regexp => "REGEXP",
            Operator::Greater => "GREATER",
            Operator::Less => "LESS",
            Operator::GreaterEq => "GREATER_EQ",
            Operator::LessEq => "LESS_EQ",
            Operator::In => "IN",
            Operator::List => "LIST",
        }
    }

    /// Whether the operator's left side names a column (e.g. `myColumn = 'foo'`).
    /// Boost, Fuzzy and the boolean combinators do not.
    pub fn operates_on_column(self) -> bool {
        matches!(
            self,
            Operator::Equals
                | Operator::Range
                | Operator::Greater
                | Operator::Less
                | Operator::GreaterEq
                | Operator::LessEq
                | Operator::In
                | Operator::Like
        )
    }

    pub fn is_leaf(self) -> bool {
        matches!(self, Operator::Literal | Operator::Wild | Operator::Regexp)
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl std::str::FromStr for Operator {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "UNDEFINED" => Operator::Undefined,
            "AND" => Operator::And,
            "OR" => Operator::Or,
            "EQUALS" => Operator::Equals,
            "LIKE" => Operator::Like,
            "NOT" => Operator::Not,
            "RANGE" => Operator::Range,
            "MUST" => Operator::Must,
            "MUST_NOT" => Operator::MustNot,
            "BOOST" => Operator::Boost,
            "FUZZY" => Operator::Fuzzy,
            "LITERAL" => Operator::Literal,
            "WILD" => Operator::Wild,
            "REGEXP" => Operator::Regexp,
            "GREATER" => Operator::Greater,
            "LESS" => Operator::Less,
            "GREATER_EQ" => Operator::GreaterEq,
            "LESS_EQ" => Operator::LessEq,
            "IN" => Operator::In,
            "LIST" => Operator::List,
            _ => return Err(()),
        })
    }
}

/// The primitive payload of a leaf expression. `Column` carries the same data
///  as `String` but tells the renderer to quote it as a SQL identifier rather
///  than as a string literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Column(String),
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Column(c) => f.write_str(c),
        }
    }
}

/// The left side of an expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(Value),
    Expr(Box<Expression>),
    /// Homogeneous ordered leaves, only under [Operator::List].
    List(Vec<Expression>),
}

/// The right side of an expression node. A range boundary is deliberately not
///  an expression: folding it into [Expression] breaks both the JSON schema
///  and the validator.
#[derive(Debug, Clone, PartialEq)]
pub enum Rhs {
    Expr(Box<Expression>),
    Boundary(RangeBoundary),
}

/// `{min, max, inclusive}` stored as the right side of a Range node. An
///  unbounded side holds the `*` wildcard leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeBoundary {
    pub min: Box<Expression>,
    pub max: Box<Expression>,
    pub inclusive: bool,
}

/// A node in the query expression tree. Every node has the same shape: an
///  operator tag, a left operand, an optional right side, and the two
///  operator-specific scalars (fuzzy distance, boost power) riding along at
///  their defaults when not meaningful.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub op: Operator,
    pub left: Operand,
    pub right: Option<Rhs>,
    /// Edit distance, meaningful only when `op` is Fuzzy.
    pub distance: i64,
    /// Boost power, meaningful only when `op` is Boost.
    pub power: f64,
}

impl Expression {
    fn node(op: Operator, left: Operand, right: Option<Rhs>) -> Self {
        Self {
            op,
            left,
            right,
            distance: 1,
            power: 1.0,
        }
    }

    pub fn literal(v: impl Into<Value>) -> Self {
        Self::node(Operator::Literal, Operand::Value(v.into()), None)
    }

    pub fn wild(v: impl Into<String>) -> Self {
        Self::node(
            Operator::Wild,
            Operand::Value(Value::String(v.into())),
            None,
        )
    }

    /// A regular expression leaf. The value keeps its `/../` delimiters so
    ///  serialization is lossless; drivers strip them when they render.
    pub fn regexp(v: impl Into<String>) -> Self {
        Self::node(
            Operator::Regexp,
            Operand::Value(Value::String(v.into())),
            None,
        )
    }

    pub fn column(name: impl Into<String>) -> Self {
        Self::node(
            Operator::Literal,
            Operand::Value(Value::Column(name.into())),
            None,
        )
    }

    /// An equality clause. The left side is forced into a column marker and a
    ///  wildcard or regexp value promotes the whole node to a LIKE.
    pub fn eq(term: impl Into<Expression>, value: impl Into<Expression>) -> Self {
        let value = value.into();
        let op = if matches!(value.op, Operator::Wild | Operator::Regexp) {
            Operator::Like
        } else {
            Operator::Equals
        };
        Self::column_node(op, term.into(), value)
    }

    pub fn like(term: impl Into<Expression>, value: impl Into<Expression>) -> Self {
        Self::column_node(Operator::Like, term.into(), value.into())
    }

    pub fn greater(term: impl Into<Expression>, value: impl Into<Expression>) -> Self {
        Self::column_node(Operator::Greater, term.into(), value.into())
    }

    pub fn less(term: impl Into<Expression>, value: impl Into<Expression>) -> Self {
        Self::column_node(Operator::Less, term.into(), value.into())
    }

    pub fn greater_eq(term: impl Into<Expression>, value: impl Into<Expression>) -> Self {
        Self::column_node(Operator::GreaterEq, term.into(), value.into())
    }

    pub fn less_eq(term: impl Into<Expression>, value: impl Into<Expression>) -> Self {
        Self::column_node(Operator::LessEq, term.into(), value.into())
    }

    /// `term IN (values...)`; the values become a List node.
    pub fn in_list(term: impl Into<Expression>, values: Vec<Expression>) -> Self {
        Self::column_node(Operator::In, term.into(), Self::list(values))
    }

    pub fn list(values: Vec<Expression>) -> Self {
        Self::node(Operator::List, Operand::List(values), None)
    }

    pub fn and(left: impl Into<Expression>, right: impl Into<Expression>) -> Self {
        Self::node(
            Operator::And,
            Operand::Expr(Box::new(left.into())),
            Some(Rhs::Expr(Box::new(right.into()))),
        )
    }

    pub fn or(left: impl Into<Expression>, right: impl Into<Expression>) -> Self {
        Self::node(
            Operator::Or,
            Operand::Expr(Box::new(left.into())),
            Some(Rhs::Expr(Box::new(right.into()))),
        )
    }

    pub fn not(sub: impl Into<Expression>) -> Self {
        Self::node(Operator::Not, Operand::Expr(Box::new(sub.into())), None)
    }

    pub fn must(sub: impl Into<Expression>) -> Self {
        Self::node(Operator::Must, Operand::Expr(Box::new(sub.into())), None)
    }

    pub fn must_not(sub: impl Into<Expression>) -> Self {
        Self::node(Operator::MustNot, Operand::Expr(Box::new(sub.into())), None)
    }

    pub fn boost(sub: impl Into<Expression>, power: f64) -> Self {
        let mut e = Self::node(Operator::Boost, Operand::Expr(Box::new(sub.into())), None);
        e.power = power;
        e
    }

    pub fn fuzzy(sub: impl Into<Expression>, distance: i64) -> Self {
        let mut e = Self::node(Operator::Fuzzy, Operand::Expr(Box::new(sub.into())), None);
        e.distance = distance;
        e
    }

    pub fn range(
        term: impl Into<Expression>,
        min: impl Into<Expression>,
        max: impl Into<Expression>,
        inclusive: bool,
    ) -> Self {
        let term = wrap_in_column(term.into());
        Self::node(
            Operator::Range,
            Operand::Expr(Box::new(term)),
            Some(Rhs::Boundary(RangeBoundary {
                min: Box::new(min.into()),
                max: Box::new(max.into()),
                inclusive,
            })),
        )
    }

    fn column_node(op: Operator, term: Expression, value: Expression) -> Self {
        Self::node(
            op,
            Operand::Expr(Box::new(wrap_in_column(term))),
            Some(Rhs::Expr(Box::new(value))),
        )
    }

    /// The column name when this node is a column-marker leaf.
    pub fn as_column(&self) -> Option<&str> {
        match &self.left {
            Operand::Value(Value::Column(c)) if self.op == Operator::Literal => Some(c),
            _ => None,
        }
    }

    /// The primitive payload when this node is a leaf.
    pub fn as_value(&self) -> Option<&Value> {
        match &self.left {
            Operand::Value(v) if self.op.is_leaf() => Some(v),
            _ => None,
        }
    }
}

/// Convert a string-payload leaf into a column marker. Leaves carrying
///  non-string payloads (and anything that already is a column) pass through.
fn wrap_in_column(e: Expression) -> Expression {
    match e.left {
        Operand::Value(Value::String(s)) => Expression::column(s),
        _ => e,
    }
}

/// Classify a raw string into the leaf it denotes: `/../` is a regexp (this
///  must be checked first, a regex body may contain `*` and `?`), a string
///  with an unescaped wildcard is a Wild, anything else is a plain literal.
pub fn classify_string(s: &str) -> Expression {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() >= 2 && chars[0] == '/' && chars[chars.len() - 1] == '/' {
        return Expression::regexp(s);
    }
    if contains_unescaped_wildcard(s) {
        return Expression::wild(s);
    }
    Expression::literal(Value::String(s.to_string()))
}

pub(crate) fn contains_unescaped_wildcard(s: &str) -> bool {
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '*' | '?' => return true,
            _ => {}
        }
    }
    false
}

impl From<&str> for Expression {
    fn from(s: &str) -> Self {
        classify_string(s)
    }
}

impl From<String> for Expression {
    fn from(s: String) -> Self {
        classify_string(&s)
    }
}

impl From<i64> for Expression {
    fn from(i: i64) -> Self {
        Expression::literal(Value::Int(i))
    }
}

impl From<f64> for Expression {
    fn from(x: f64) -> Self {
        Expression::literal(Value::Float(x))
    }
}

impl From<bool> for Expression {
    fn from(b: bool) -> Self {
        Expression::literal(Value::Bool(b))
    }
}

impl From<Value> for Expression {
    fn from(v: Value) -> Self {
        Expression::literal(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub op: Operator,
    pub message: String,
}

impl ValidationError {
    fn new(op: Operator, message: impl Into<String>) -> Self {
        Self {
            op,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} validation: {}", self.op, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check the per-operator structural invariants over the whole tree.
pub fn validate(e: &Expression) -> Result<(), ValidationError> {
    let err = |msg: &str| Err(ValidationError::new(e.op, msg));

    match e.op {
        Operator::Undefined => return err("unsupported operator"),

        Operator::Literal | Operator::Wild | Operator::Regexp => {
            if !matches!(e.left, Operand::Value(_)) {
                return err("value must be a literal");
            }
            if e.right.is_some() {
                return err("must not have two values");
            }
        }

        Operator::Equals
        | Operator::Greater
        | Operator::Less
        | Operator::GreaterEq
        | Operator::LessEq
        | Operator::Like
        | Operator::In => {
            let Operand::Expr(term) = &e.left else {
                return err("left side must be a term expression");
            };
            if !term.op.is_leaf() {
                return err("left side must be a column or literal");
            }
            match &e.right {
                None => return err("right side must not be missing"),
                Some(Rhs::Boundary(_)) => return err("right side must be an expression"),
                Some(Rhs::Expr(value)) => {
                    if e.op == Operator::Like
                        && !matches!(value.op, Operator::Wild | Operator::Regexp)
                    {
                        return err("right side must be a wildcard or regexp");
                    }
                    if e.op == Operator::In && value.op != Operator::List {
                        return err("right side must be a list");
                    }
                }
            }
        }

        Operator::List => {
            let Operand::List(items) = &e.left else {
                return err("left side must be a list of literals");
            };
            for item in items {
                if !item.op.is_leaf() {
                    return err("every element must be a literal");
                }
            }
            if e.right.is_some() {
                return err("must not have a right side");
            }
        }

        Operator::Range => {
            match &e.left {
                Operand::Expr(term) if term.as_column().is_some() => {}
                _ => return err("left side must be a column"),
            }
            match &e.right {
                Some(Rhs::Boundary(_)) => {}
                _ => return err("right side must be a range boundary"),
            }
        }

        Operator::And | Operator::Or => {
            if !matches!(e.left, Operand::Expr(_)) {
                return err("left side must not be missing");
            }
            if !matches!(e.right, Some(Rhs::Expr(_))) {
                return err("right side must not be missing");
            }
        }

        Operator::Not | Operator::Must | Operator::MustNot | Operator::Boost | Operator::Fuzzy => {
            if !matches!(e.left, Operand::Expr(_)) {
                return err("sub expression must not be missing");
            }
            if e.right.is_some() {
                return err("must not have two sub expressions");
            }
        }
    }

    // recurse into whatever children exist
    if let Operand::Expr(sub) = &e.left {
        validate(sub)?;
    }
    if let Operand::List(items) = &e.left {
        for item in items {
            validate(item)?;
        }
    }
    match &e.right {
        Some(Rhs::Expr(sub)) => validate(sub)?,
        Some(Rhs::Boundary(b)) => {
            validate(&b.min)?;
            validate(&b.max)?;
        }
        None => {}
    }

    Ok(())
}

// The printers. The plain Display form reproduces lucene source closely
//  enough to re-parse for everything the grammar can express; the alternate
//  form ({:#}) labels every node with its operator for debugging.

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if f.alternate() {
            fmt_verbose(self, f)
        } else {
            fmt_short(self, f)
        }
    }
}

fn fmt_value_short(v: &Value, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match v {
        Value::String(s) if s.chars().any(char::is_whitespace) => write!(f, "\"{s}\""),
        v => write!(f, "{v}"),
    }
}

fn fmt_short(e: &Expression, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let left = |f: &mut std::fmt::Formatter<'_>| match &e.left {
        Operand::Value(v) => fmt_value_short(v, f),
        Operand::Expr(sub) => fmt_short(sub, f),
        Operand::List(items) => {
            f.write_str("(")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(" OR ")?;
                }
                fmt_short(item, f)?;
            }
            f.write_str(")")
        }
    };
    let right = |f: &mut std::fmt::Formatter<'_>| match &e.right {
        Some(Rhs::Expr(sub)) => fmt_short(sub, f),
        _ => Ok(()),
    };

    match e.op {
        Operator::Undefined => Ok(()),
        Operator::Literal | Operator::Wild | Operator::Regexp => left(f),
        Operator::Equals | Operator::Like | Operator::In => {
            left(f)?;
            f.write_str(":")?;
            right(f)
        }
        Operator::Greater => {
            left(f)?;
            f.write_str(":>")?;
            right(f)
        }
        Operator::Less => {
            left(f)?;
            f.write_str(":<")?;
            right(f)
        }
        Operator::GreaterEq => {
            left(f)?;
            f.write_str(":>=")?;
            right(f)
        }
        Operator::LessEq => {
            left(f)?;
            f.write_str(":<=")?;
            right(f)
        }
        Operator::And | Operator::Or => {
            left(f)?;
            write!(f, " {} ", if e.op == Operator::And { "AND" } else { "OR" })?;
            right(f)
        }
        Operator::Not => {
            f.write_str("NOT(")?;
            left(f)?;
            f.write_str(")")
        }
        Operator::Must => {
            f.write_str("+")?;
            left(f)
        }
        Operator::MustNot => {
            f.write_str("-")?;
            left(f)
        }
        Operator::Boost => {
            left(f)?;
            if e.power != 1.0 {
                write!(f, "^{}", e.power)
            } else {
                f.write_str("^")
            }
        }
        Operator::Fuzzy => {
            left(f)?;
            if e.distance != 1 {
                write!(f, "~{}", e.distance)
            } else {
                f.write_str("~")
            }
        }
        Operator::Range => {
            let Some(Rhs::Boundary(b)) = &e.right else {
                return Ok(());
            };
            left(f)?;
            let (open, close) = if b.inclusive { ("[", "]") } else { ("{", "}") };
            write!(f, ":{open}")?;
            fmt_short(&b.min, f)?;
            f.write_str(" TO ")?;
            fmt_short(&b.max, f)?;
            f.write_str(close)
        }
        Operator::List => left(f),
    }
}

fn fmt_verbose(e: &Expression, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}(", e.op)?;
    match &e.left {
        Operand::Value(Value::Column(c)) => write!(f, "COLUMN({c})")?,
        Operand::Value(v) => write!(f, "{v}")?,
        Operand::Expr(sub) => fmt_verbose(sub, f)?,
        Operand::List(items) => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                fmt_verbose(item, f)?;
            }
        }
    }
    match &e.right {
        Some(Rhs::Expr(sub)) => {
            f.write_str(", ")?;
            fmt_verbose(sub, f)?;
        }
        Some(Rhs::Boundary(b)) => {
            f.write_str(", ")?;
            let (open, close) = if b.inclusive { ("[", "]") } else { ("{", "}") };
            f.write_str(open)?;
            fmt_verbose(&b.min, f)?;
            f.write_str(" TO ")?;
            fmt_verbose(&b.max, f)?;
            f.write_str(close)?;
        }
        None => {}
    }
    match e.op {
        Operator::Boost => write!(f, ", {}", e.power)?,
        Operator::Fuzzy => write!(f, ", {}", e.distance)?,
        _ => {}
    }
    f.write_str(")")
}

// Arbitrary impls feed the ast fuzz target. Generation is depth capped and
//  sticks to the constructors so the trees satisfy the validator.

const MAX_DEPTH: usize = 10;

impl<'a> Arbitrary<'a> for Value {
    fn arbitrary(u: &mut Unstructured<'a>) -> arbitrary::Result<Self> {
        Ok(match u.int_in_range::<u8>(0..=3)? {
            0 => Value::String(String::arbitrary(u)?),
            1 => Value::Int(i64::arbitrary(u)?),
            2 => Value::Float(f64::arbitrary(u)?),
            _ => Value::Bool(bool::arbitrary(u)?),
        })
    }
}

impl<'a> Arbitrary<'a> for Expression {
    fn arbitrary(u: &mut Unstructured<'a>) -> arbitrary::Result<Self> {
        arbitrary_expr(u, 0)
    }
}

fn arbitrary_leaf(u: &mut Unstructured<'_>) -> arbitrary::Result<Expression> {
    Ok(match u.int_in_range::<u8>(0..=2)? {
        0 => Expression::literal(Value::arbitrary(u)?),
        1 => Expression::wild(String::arbitrary(u)?),
        _ => Expression::regexp(format!("/{}/", String::arbitrary(u)?)),
    })
}

fn arbitrary_expr(u: &mut Unstructured<'_>, depth: usize) -> arbitrary::Result<Expression> {
    if depth >= MAX_DEPTH {
        return arbitrary_leaf(u);
    }

    let column = |u: &mut Unstructured<'_>| -> arbitrary::Result<Expression> {
        Ok(Expression::column(String::arbitrary(u)?))
    };

    Ok(match u.int_in_range::<u8>(0..=12)? {
        0 | 1 => arbitrary_leaf(u)?,
        2 => Expression::eq(column(u)?, arbitrary_expr(u, depth + 1)?),
        3 => Expression::and(
            arbitrary_expr(u, depth + 1)?,
            arbitrary_expr(u, depth + 1)?,
        ),
        4 => Expression::or(
            arbitrary_expr(u, depth + 1)?,
            arbitrary_expr(u, depth + 1)?,
        ),
        5 => Expression::not(arbitrary_expr(u, depth + 1)?),
        6 => Expression::must(arbitrary_expr(u, depth + 1)?),
        7 => Expression::must_not(arbitrary_expr(u, depth + 1)?),
        8 => Expression::boost(arbitrary_expr(u, depth + 1)?, f64::arbitrary(u)?),
        9 => Expression::fuzzy(arbitrary_expr(u, depth + 1)?, i64::arbitrary(u)?),
        10 => Expression::range(
            column(u)?,
            Expression::literal(Value::arbitrary(u)?),
            Expression::literal(Value::arbitrary(u)?),
            bool::arbitrary(u)?,
        ),
        11 => {
            let mut items = Vec::new();
            for _ in 0..u.int_in_range::<u8>(1..=4)? {
                items.push(arbitrary_leaf(u)?);
            }
            Expression::in_list(column(u)?, items)
        }
        _ => Expression::greater(column(u)?, arbitrary_expr(u, depth + 1)?),
    })
}
