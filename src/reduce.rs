//! Local rewrite rules for the shift-reduce parser. Each reducer matches a
//! fixed window shape at the top of the parse stack and rewrites it into an
//! expression, reporting how many pending non-terminal tokens it consumed.

use crate::ast::{Expression, Operator};
use crate::lex::{Token, TokenKind};

/// An entry on the parser's mixed stack: either a raw token waiting to be
///  consumed by a reducer, or an already-built expression.
#[derive(Debug, Clone)]
pub enum StackItem {
    Tok(Token),
    Expr(Expression),
}

impl StackItem {
    pub fn is_expr(&self) -> bool {
        matches!(self, StackItem::Expr(_))
    }
}

impl std::fmt::Display for StackItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StackItem::Tok(t) => write!(f, "{t}"),
            StackItem::Expr(e) => write!(f, "{e}"),
        }
    }
}

type Reduction = (Vec<StackItem>, usize);

/// A reducer inspects the window and, on a match, returns the rewritten
///  window plus the number of non-terminals it consumed.
type Reducer = fn(&[StackItem], Option<&str>) -> Option<Reduction>;

/// Reducers are tried in this exact order; the first match wins.
const REDUCERS: &[Reducer] = &[
    and, or, equal, compare, compare_eq, not, sub, must, must_not, fuzzy, boost, range_op,
];

/// Run the reducer table against a window. Returns None when nothing matches
///  and the caller should widen the window.
pub fn reduce(window: &[StackItem], default_field: Option<&str>) -> Option<Reduction> {
    REDUCERS.iter().find_map(|r| r(window, default_field))
}

fn expr(item: &StackItem) -> Option<&Expression> {
    match item {
        StackItem::Expr(e) => Some(e),
        StackItem::Tok(_) => None,
    }
}

fn tok(item: &StackItem) -> Option<&Token> {
    match item {
        StackItem::Tok(t) => Some(t),
        StackItem::Expr(_) => None,
    }
}

fn one(e: Expression) -> Vec<StackItem> {
    vec![StackItem::Expr(e)]
}

/// Wrap a bare literal in an equality against the default field, so that
///  `a:b AND "c"` has something to compare "c" against.
fn wrap_literal(e: &Expression, default_field: Option<&str>) -> Expression {
    match default_field {
        Some(field) if e.op == Operator::Literal => {
            Expression::eq(Expression::column(field), e.clone())
        }
        _ => e.clone(),
    }
}

fn and(w: &[StackItem], df: Option<&str>) -> Option<Reduction> {
    let [l, op, r] = w else { return None };
    if tok(op)?.kind != TokenKind::And {
        return None;
    }
    let left = expr(l)?;
    let right = expr(r)?;
    Some((
        one(Expression::and(wrap_literal(left, df), wrap_literal(right, df))),
        1,
    ))
}

fn or(w: &[StackItem], df: Option<&str>) -> Option<Reduction> {
    let [l, op, r] = w else { return None };
    if tok(op)?.kind != TokenKind::Or {
        return None;
    }
    let left = expr(l)?;
    let right = expr(r)?;
    Some((
        one(Expression::or(wrap_literal(left, df), wrap_literal(right, df))),
        1,
    ))
}

fn equal(w: &[StackItem], _df: Option<&str>) -> Option<Reduction> {
    let [l, op, r] = w else { return None };
    if !matches!(tok(op)?.kind, TokenKind::Equal | TokenKind::Colon) {
        return None;
    }
    let term = expr(l)?;
    let value = expr(r)?;

    // a value that is a chain of ORed plain literals becomes an IN list
    if let Some(literals) = chained_or_literals(value)
        && literals.len() > 1
    {
        return Some((one(Expression::in_list(term.clone(), literals)), 1));
    }

    Some((one(Expression::eq(term.clone(), value.clone())), 1))
}

fn chained_or_literals(e: &Expression) -> Option<Vec<Expression>> {
    match e.op {
        Operator::Literal => Some(vec![e.clone()]),
        Operator::Or => {
            let crate::ast::Operand::Expr(left) = &e.left else {
                return None;
            };
            let Some(crate::ast::Rhs::Expr(right)) = &e.right else {
                return None;
            };
            let mut l = chained_or_literals(left)?;
            l.extend(chained_or_literals(right)?);
            Some(l)
        }
        _ => None,
    }
}

fn compare(w: &[StackItem], _df: Option<&str>) -> Option<Reduction> {
    let [l, colon, cmp, r] = w else { return None };
    if tok(colon)?.kind != TokenKind::Colon {
        return None;
    }
    let cmp = tok(cmp)?;
    if !matches!(cmp.kind, TokenKind::Greater | TokenKind::Less) {
        return None;
    }
    let term = expr(l)?.clone();
    let value = expr(r)?.clone();

    let e = if cmp.kind == TokenKind::Greater {
        Expression::greater(term, value)
    } else {
        Expression::less(term, value)
    };
    // the : and the comparator
    Some((one(e), 2))
}

fn compare_eq(w: &[StackItem], _df: Option<&str>) -> Option<Reduction> {
    let [l, colon, cmp, eq, r] = w else {
        return None;
    };
    if tok(colon)?.kind != TokenKind::Colon || tok(eq)?.kind != TokenKind::Equal {
        return None;
    }
    let cmp = tok(cmp)?;
    if !matches!(cmp.kind, TokenKind::Greater | TokenKind::Less) {
        return None;
    }
    let term = expr(l)?.clone();
    let value = expr(r)?.clone();

    let e = if cmp.kind == TokenKind::Greater {
        Expression::greater_eq(term, value)
    } else {
        Expression::less_eq(term, value)
    };
    // the :, the comparator, and the =
    Some((one(e), 3))
}

fn not(w: &[StackItem], df: Option<&str>) -> Option<Reduction> {
    if w.len() < 2 {
        return None;
    }
    if tok(&w[w.len() - 2])?.kind != TokenKind::Not {
        return None;
    }
    let negated = expr(&w[w.len() - 1])?;

    let mut out = w[..w.len() - 2].to_vec();
    out.push(StackItem::Expr(Expression::not(wrap_literal(negated, df))));
    Some((out, 1))
}

fn sub(w: &[StackItem], _df: Option<&str>) -> Option<Reduction> {
    let [open, inner, close] = w else {
        return None;
    };
    if tok(open)?.kind != TokenKind::LParen || tok(close)?.kind != TokenKind::RParen {
        return None;
    }
    // the ( and )
    Some((vec![inner.clone()], 2))
}

fn must(w: &[StackItem], _df: Option<&str>) -> Option<Reduction> {
    let [plus, rest] = w else { return None };
    if tok(plus)?.kind != TokenKind::Plus {
        return None;
    }
    Some((one(Expression::must(expr(rest)?.clone())), 1))
}

fn must_not(w: &[StackItem], _df: Option<&str>) -> Option<Reduction> {
    let [minus, rest] = w else { return None };
    if tok(minus)?.kind != TokenKind::Minus {
        return None;
    }
    Some((one(Expression::must_not(expr(rest)?.clone())), 1))
}

fn fuzzy(w: &[StackItem], _df: Option<&str>) -> Option<Reduction> {
    // bare suffix: implicit distance of 1
    if let [rest, tilde] = w {
        if tok(tilde)?.kind != TokenKind::Tilde {
            return None;
        }
        return Some((one(Expression::fuzzy(expr(rest)?.clone(), 1)), 1));
    }

    let [rest, tilde, distance] = w else {
        return None;
    };
    if tok(tilde)?.kind != TokenKind::Tilde {
        return None;
    }
    let rest = expr(rest)?;
    let distance = expr(distance)?;

    match distance.to_string().parse::<i64>() {
        Ok(d) => Some((one(Expression::fuzzy(rest.clone(), d)), 1)),
        // not a distance after all; take the implicit 1 and hand the third
        // element back for the outer loop
        Err(_) => Some((
            vec![
                StackItem::Expr(Expression::fuzzy(rest.clone(), 1)),
                StackItem::Expr(distance.clone()),
            ],
            1,
        )),
    }
}

fn boost(w: &[StackItem], _df: Option<&str>) -> Option<Reduction> {
    // bare suffix: implicit power of 1.0
    if let [rest, carrot] = w {
        if tok(carrot)?.kind != TokenKind::Carrot {
            return None;
        }
        return Some((one(Expression::boost(expr(rest)?.clone(), 1.0)), 1));
    }

    let [rest, carrot, power] = w else {
        return None;
    };
    if tok(carrot)?.kind != TokenKind::Carrot {
        return None;
    }
    let rest = expr(rest)?;
    let power = expr(power)?;

    match to_positive_float(&power.to_string()) {
        Some(p) => Some((one(Expression::boost(rest.clone(), p)), 1)),
        None => Some((
            vec![
                StackItem::Expr(Expression::boost(rest.clone(), 1.0)),
                StackItem::Expr(power.clone()),
            ],
            1,
        )),
    }
}

fn to_positive_float(s: &str) -> Option<f64> {
    if let Ok(i) = s.parse::<i64>() {
        return (i > 0).then_some(i as f64);
    }
    if let Ok(f) = s.parse::<f64>() {
        return (f > 0.0).then_some(f);
    }
    None
}

fn range_op(w: &[StackItem], _df: Option<&str>) -> Option<Reduction> {
    // term, :, [ or {, min, TO, max, ] or }
    let [term, colon, open, min, to, max, close] = w else {
        return None;
    };
    if tok(colon)?.kind != TokenKind::Colon || tok(to)?.kind != TokenKind::To {
        return None;
    }
    let open = tok(open)?;
    if !matches!(open.kind, TokenKind::LSquare | TokenKind::LCurly) {
        return None;
    }
    let close = tok(close)?;
    if !matches!(close.kind, TokenKind::RSquare | TokenKind::RCurly) {
        return None;
    }
    let term = expr(term)?.clone();
    let min = expr(min)?.clone();
    let max = expr(max)?.clone();

    let inclusive = open.kind == TokenKind::LSquare && close.kind == TokenKind::RSquare;
    // the :, [, TO, and ]
    Some((one(Expression::range(term, min, max, inclusive)), 4))
}
