//! The shift-reduce driver. Tokens are pulled off the lexer one at a time and
//! either shifted onto a mixed token/expression stack or reduced in place by
//! the table in [crate::reduce]. A parallel stack of pending non-terminals
//! drives the precedence decisions.

use crate::ast::{self, Expression, ValidationError, Value, contains_unescaped_wildcard};
use crate::lex::{Lexer, Token, TokenKind, has_less_precedence};
use crate::reduce::{StackItem, reduce};

/// Options accepted by [parse]. `default_field` names the column that bare
///  literals are compared against; when empty they are left alone.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    pub default_field: Option<String>,
}

impl ParseOptions {
    pub fn with_default_field(field: impl Into<String>) -> Self {
        Self {
            default_field: Some(field.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// The lexer produced an error token; the payload is its message.
    Lex(String),
    /// The stack emptied while looking for a reducible window.
    NoReduction(String),
    /// More than one expression survived to the end of the input.
    MultipleExpressions(String),
    /// The input reduced to a lone token instead of an expression.
    NonExpression(String),
    Validation(ValidationError),
}

impl From<ValidationError> for ParseError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lex(msg) => write!(f, "lexical error: {msg}"),
            Self::NoReduction(state) => {
                write!(f, "no items left to reduce, current state: {state}")
            }
            Self::MultipleExpressions(state) => {
                write!(f, "multiple expressions left after parsing: {state}")
            }
            Self::NonExpression(found) => {
                write!(f, "final parse didn't return an expression, got: {found}")
            }
            Self::Validation(v) => write!(f, "{v}"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Parse a lucene query into a validated expression tree.
pub fn parse(input: &str, opts: &ParseOptions) -> Result<Expression, ParseError> {
    let mut parser = Parser {
        lexer: Lexer::new(input),
        stack: Vec::new(),
        non_terminals: vec![Token {
            kind: TokenKind::Start,
            pos: 0,
            val: String::new(),
        }],
        default_field: opts.default_field.clone(),
    };

    let e = parser.run()?;
    ast::validate(&e)?;
    Ok(e)
}

struct Parser {
    lexer: Lexer,
    stack: Vec<StackItem>,
    non_terminals: Vec<Token>,
    default_field: Option<String>,
}

impl Parser {
    fn run(&mut self) -> Result<Expression, ParseError> {
        loop {
            let next = self.lexer.peek_token();

            if next.kind == TokenKind::Err {
                return Err(ParseError::Lex(next.val));
            }

            if next.kind == TokenKind::Eof && self.stack.len() == 1 {
                return self.accept();
            }

            if self.should_shift(&next) {
                // two expressions back to back mean an implicit AND; decide
                // between shifting the synthetic token and reducing first,
                // exactly as if a real AND were next
                if starts_expression(&next) && self.stack.last().is_some_and(StackItem::is_expr) {
                    let and = Token {
                        kind: TokenKind::And,
                        pos: next.pos,
                        val: "AND".to_string(),
                    };
                    if self.should_shift(&and) {
                        self.push_token(and);
                    } else {
                        self.reduce()?;
                        continue;
                    }
                }

                let tok = self.lexer.next();
                if tok.is_terminal() {
                    self.stack.push(StackItem::Expr(parse_leaf(&tok)));
                } else {
                    self.push_token(tok);
                }
                continue;
            }

            self.reduce()?;
        }
    }

    fn accept(&mut self) -> Result<Expression, ParseError> {
        match self.stack.pop() {
            Some(StackItem::Expr(e)) => Ok(self.wrap_root(e)),
            Some(StackItem::Tok(t)) => Err(ParseError::NonExpression(t.to_string())),
            None => Err(ParseError::NoReduction("[]".to_string())),
        }
    }

    /// A bare literal at the root still needs the default-field treatment;
    ///  the combine-site wrapping never saw it.
    fn wrap_root(&self, e: Expression) -> Expression {
        match &self.default_field {
            Some(field) if e.op == ast::Operator::Literal => {
                Expression::eq(Expression::column(field), e)
            }
            _ => e,
        }
    }

    fn push_token(&mut self, tok: Token) {
        self.non_terminals.push(tok.clone());
        self.stack.push(StackItem::Tok(tok));
    }

    fn should_shift(&self, next: &Token) -> bool {
        if matches!(next.kind, TokenKind::Eof | TokenKind::Err) {
            return false;
        }
        if next.is_terminal() {
            return true;
        }

        let curr = self.non_terminals.last().expect("start sentinel");

        // opening brackets accumulate their interior
        if is_open_bracket(curr.kind) || is_open_bracket(next.kind) {
            return true;
        }

        // a closing range bracket shifts so the range reducer sees the
        // complete window
        if matches!(next.kind, TokenKind::RSquare | TokenKind::RCurly) {
            return true;
        }

        // a finished bracketed group must reduce before anything moves past it
        if matches!(
            curr.kind,
            TokenKind::RParen | TokenKind::RSquare | TokenKind::RCurly
        ) {
            return false;
        }

        has_less_precedence(curr, next)
    }

    /// Pop items into a window until a reducer matches, then push the
    ///  rewritten window back and drop the consumed non-terminals.
    fn reduce(&mut self) -> Result<(), ParseError> {
        let mut window: Vec<StackItem> = Vec::new();
        loop {
            let Some(item) = self.stack.pop() else {
                let state: Vec<String> = window.iter().map(ToString::to_string).collect();
                if window.len() > 1 && window.iter().all(StackItem::is_expr) {
                    return Err(ParseError::MultipleExpressions(format!("{state:?}")));
                }
                return Err(ParseError::NoReduction(format!("{state:?}")));
            };
            window.insert(0, item);

            if let Some((rewritten, consumed)) = reduce(&window, self.default_field.as_deref()) {
                self.stack.extend(rewritten);
                for _ in 0..consumed {
                    self.non_terminals.pop();
                }
                return Ok(());
            }
        }
    }
}

/// Tokens that begin a brand new expression, used for implicit-AND insertion.
fn starts_expression(tok: &Token) -> bool {
    tok.is_terminal()
        || matches!(
            tok.kind,
            TokenKind::Not | TokenKind::Plus | TokenKind::Minus | TokenKind::LParen
        )
}

fn is_open_bracket(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::LParen | TokenKind::LSquare | TokenKind::LCurly
    )
}

/// Turn a terminal token into an AST leaf. Numbers get real types (integers
///  before floats so whole numbers stay integral), wildcards are kept raw for
///  the renderer, everything else has its escapes stripped.
fn parse_leaf(tok: &Token) -> Expression {
    match tok.kind {
        TokenKind::Quoted => {
            let inner = &tok.val[1..tok.val.len() - 1];
            Expression::literal(Value::String(unescape(inner)))
        }
        TokenKind::Regexp => Expression::regexp(tok.val.clone()),
        _ => {
            if let Ok(i) = tok.val.parse::<i64>() {
                Expression::literal(Value::Int(i))
            } else if let Ok(x) = tok.val.parse::<f64>() {
                Expression::literal(Value::Float(x))
            } else if contains_unescaped_wildcard(&tok.val) {
                Expression::wild(tok.val.clone())
            } else {
                Expression::literal(Value::String(unescape(&tok.val)))
            }
        }
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expression as E;

    fn parse_ok(input: &str) -> Expression {
        parse(input, &ParseOptions::default())
            .unwrap_or_else(|err| panic!("wanted no error for {input:?}, got: {err}"))
    }

    macro_rules! parse_cases {
        ($($name:ident: $input:expr => $want:expr;)*) => {
            $(
                #[test]
                fn $name() {
                    let got = parse_ok($input);
                    assert_eq!(got, $want, "parsed expression doesn't match for {:?}", $input);
                }
            )*
        };
    }

    parse_cases! {
        single_literal: "a" => E::literal("a");
        basic_equal: "a:b" => E::eq("a", "b");
        basic_equal_with_number: "a:5" => E::eq("a", 5i64);
        basic_equal_with_float: "a:1.5" => E::eq("a", 1.5f64);
        basic_greater: "a:>22" => E::greater("a", 22i64);
        basic_greater_eq: "a:>=22" => E::greater_eq("a", 22i64);
        basic_less: "a:<22" => E::less("a", 22i64);
        basic_less_eq: "a:<=22" => E::less_eq("a", 22i64);
        equal_operator: "a=b" => E::eq("a", "b");
        basic_wild_equal_with_star: "a:b*" => E::eq("a", E::wild("b*"));
        basic_wild_equal_with_question: "a:b?z" => E::eq("a", E::wild("b?z"));
        basic_inclusive_range: "a:[* TO 5]" => E::range("a", E::wild("*"), 5i64, true);
        basic_exclusive_range: "a:{* TO 5}" => E::range("a", E::wild("*"), 5i64, false);
        range_over_strings: "a:{foo TO bar}" => E::range("a", "foo", "bar", false);
        range_lowercase_to: "c:[* to -1]" => E::range("c", E::wild("*"), -1i64, true);
        basic_fuzzy: "b AND a~" => E::and("b", E::fuzzy(E::literal("a"), 1));
        fuzzy_power: "b AND a~10" => E::and("b", E::fuzzy(E::literal("a"), 10));
        basic_boost: "b AND a^" => E::and("b", E::boost(E::literal("a"), 1.0));
        boost_power: "b AND a^10" => E::and("b", E::boost(E::literal("a"), 10.0));
        regexp: "a:/b [c]/" => E::eq("a", E::regexp("/b [c]/"));
        regexp_with_keywords: r#"a:/b "[c]/"# => E::eq("a", E::regexp(r#"/b "[c]/"#));
        basic_implicit_and: "a b" => E::and("a", "b");
        implicit_and_with_subexpressions: "a:b c:d" =>
            E::and(E::eq("a", "b"), E::eq("c", "d"));
        basic_and: "a AND b" => E::and("a", "b");
        and_with_nesting: "a:foo AND b:bar" =>
            E::and(E::eq("a", "foo"), E::eq("b", "bar"));
        basic_or: "a OR b" => E::or("a", "b");
        or_with_nesting: "a:foo OR b:bar" =>
            E::or(E::eq("a", "foo"), E::eq("b", "bar"));
        range_operator_inclusive: "a:[1 TO 5]" => E::range("a", 1i64, 5i64, true);
        range_operator_exclusive: r#"a:{"ab" TO "az"}"# =>
            E::range("a", E::literal("ab"), E::literal("az"), false);
        range_exclusive_unbound: "a:{2 TO *}" => E::range("a", 2i64, E::wild("*"), false);
        basic_not: "NOT b" => E::not(E::literal("b"));
        bang_not: "!b" => E::not(E::literal("b"));
        nested_not: "a:foo OR NOT b:bar" =>
            E::or(E::eq("a", "foo"), E::not(E::eq("b", "bar")));
        term_grouping: "(a:foo OR b:bar) AND c:baz" =>
            E::and(E::or(E::eq("a", "foo"), E::eq("b", "bar")), E::eq("c", "baz"));
        value_grouping_becomes_in: "a:(foo OR baz OR bar)" =>
            E::in_list("a", vec![E::literal("foo"), E::literal("baz"), E::literal("bar")]);
        value_grouping_mixed_stays_eq: "a:(foo OR b*)" =>
            E::eq("a", E::or(E::literal("foo"), E::wild("b*")));
        basic_must: "+a:b" => E::must(E::eq("a", "b"));
        basic_must_not: "-a:b" => E::must_not(E::eq("a", "b"));
        nested_must_not: "d:e AND (-a:b AND +f:e)" =>
            E::and(
                E::eq("d", "e"),
                E::and(E::must_not(E::eq("a", "b")), E::must(E::eq("f", "e"))),
            );
        adjacent_must_and_must_not: "(+a:b -c:d)" =>
            E::and(E::must(E::eq("a", "b")), E::must_not(E::eq("c", "d")));
        basic_escaping: r"a:\(1\+1\)\:2" => E::eq("a", E::literal("(1+1):2"));
        boost_key_value: "a:b^2 AND foo" =>
            E::and(E::boost(E::eq("a", "b"), 2.0), E::literal("foo"));
        boost_literal: "foo^4" => E::boost(E::literal("foo"), 4.0);
        boost_quoted_literal: r#""foo bar"^4 AND a:b"# =>
            E::and(E::boost(E::literal("foo bar"), 4.0), E::eq("a", "b"));
        boost_sub_expression: "(title:foo OR title:bar)^1.5 AND (body:foo OR body:bar)" =>
            E::and(
                E::boost(E::or(E::eq("title", "foo"), E::eq("title", "bar")), 1.5),
                E::or(E::eq("body", "foo"), E::eq("body", "bar")),
            );
        nested_sub_expressions_with_boost: "((title:foo)^1.2 OR title:bar) AND (body:foo OR body:bar)" =>
            E::and(
                E::or(E::boost(E::eq("title", "foo"), 1.2), E::eq("title", "bar")),
                E::or(E::eq("body", "foo"), E::eq("body", "bar")),
            );
        fuzzy_key_value: "a:b~2 AND foo" =>
            E::and(E::fuzzy(E::eq("a", "b"), 2), E::literal("foo"));
        fuzzy_key_value_default: "a:b~ AND foo" =>
            E::and(E::fuzzy(E::eq("a", "b"), 1), E::literal("foo"));
        fuzzy_literal: "foo~4" => E::fuzzy(E::literal("foo"), 4);
        fuzzy_literal_default: "foo~" => E::fuzzy(E::literal("foo"), 1);
        fuzzy_in_implicit_compound: "a:b foo~4" =>
            E::and(E::eq("a", "b"), E::fuzzy(E::literal("foo"), 4));
        fuzzy_sub_expression: "(title:foo OR title:bar)~2 AND (body:foo OR body:bar)" =>
            E::and(
                E::fuzzy(E::or(E::eq("title", "foo"), E::eq("title", "bar")), 2),
                E::or(E::eq("body", "foo"), E::eq("body", "bar")),
            );
        precedence_works: "a:b AND c:d OR e:f OR h:i AND j:k" =>
            E::or(
                E::or(E::and(E::eq("a", "b"), E::eq("c", "d")), E::eq("e", "f")),
                E::and(E::eq("h", "i"), E::eq("j", "k")),
            );
        precedence_weaving: "a OR b AND c OR d" =>
            E::or(E::or("a", E::and("b", "c")), E::literal("d"));
        precedence_weaving_with_not: "NOT a OR b AND NOT c OR d" =>
            E::or(
                E::or(E::not(E::literal("a")), E::and("b", E::not(E::literal("c")))),
                E::literal("d"),
            );
        parens_in_precedence: "a AND (c OR d)" => E::and("a", E::or("c", "d"));
        equal_precedence_left_associates: "a OR b OR c" =>
            E::or(E::or("a", "b"), E::literal("c"));
        range_precedence: "a OR b AND c:[* to -1] OR d" =>
            E::or(
                E::or("a", E::and("b", E::range("c", E::wild("*"), -1i64, true))),
                E::literal("d"),
            );
        full_precedence: "a OR b AND c:[* to -1] OR d AND NOT +e:f" =>
            E::or(
                E::or("a", E::and("b", E::range("c", E::wild("*"), -1i64, true))),
                E::and("d", E::not(E::must(E::eq("e", "f")))),
            );
        full_precedence_with_suffixes: "a OR b AND c OR d~ AND NOT +(e:f)^10" =>
            E::or(
                E::or("a", E::and("b", "c")),
                E::and(
                    E::fuzzy(E::literal("d"), 1),
                    E::not(E::boost(E::must(E::eq("e", "f")), 10.0)),
                ),
            );
    }

    #[test]
    fn default_field_wraps_bare_literals() {
        let opts = ParseOptions::with_default_field("default");
        let got = parse(r#"a:b AND "c""#, &opts).expect("should parse");
        assert_eq!(
            got,
            E::and(
                E::eq("a", "b"),
                E::eq(E::column("default"), E::literal("c")),
            )
        );
    }

    #[test]
    fn default_field_wraps_bare_root() {
        let opts = ParseOptions::with_default_field("default");
        let got = parse("lonely", &opts).expect("should parse");
        assert_eq!(got, E::eq(E::column("default"), E::literal("lonely")));
    }

    #[test]
    fn implicit_and_before_bang_not() {
        let opts = ParseOptions::with_default_field("default");
        let got = parse(r#""jakarta apache" !"Apache Lucene""#, &opts).expect("should parse");
        assert_eq!(
            got,
            E::and(
                E::eq(E::column("default"), E::literal("jakarta apache")),
                E::not(E::eq(E::column("default"), E::literal("Apache Lucene"))),
            )
        );
    }

    #[test]
    fn parse_failures() {
        let failures = [
            "",
            "(a AND b",
            "(a AND b))",
            "(a AND (b AND c)",
            "a = ",
            "= b",
            "() = ()",
            "a AND",
            "AND a",
            "a OR",
            "OR a",
            "NOT",
            "NOT()",
            "+",
            "+()",
            "-",
            "-()",
            "^2",
            "()^2",
            "~2",
            "~",
            "()~",
            "[ TO 5]",
            "[* TO ]",
            "[(a OR b) TO *]",
            "(A:B AND C:(D OR E)) OR (NOT(+a:[* TO]))",
            "a: b:c",
            "\"unterminated",
            "/unterminated",
            "a & b",
        ];
        for input in failures {
            assert!(
                parse(input, &ParseOptions::default()).is_err(),
                "expected an error for {input:?}"
            );
        }
    }

    #[test]
    fn lex_error_surfaces_message() {
        let err = parse("\"oops", &ParseOptions::default()).unwrap_err();
        assert_eq!(err, ParseError::Lex("unterminated quote".to_string()));
    }

    #[test]
    fn leaf_parsing_types() {
        assert_eq!(parse_ok("42"), E::literal(Value::Int(42)));
        assert_eq!(parse_ok("-42"), E::literal(Value::Int(-42)));
        assert_eq!(parse_ok("4.5"), E::literal(Value::Float(4.5)));
        assert_eq!(parse_ok("b*"), E::wild("b*"));
        assert_eq!(parse_ok("/b/"), E::regexp("/b/"));
        assert_eq!(parse_ok(r#""b c""#), E::literal("b c"));
    }
}
