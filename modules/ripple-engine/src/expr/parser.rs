//! Expression and statement grammar over the token stream.

use chumsky::{pratt::*, prelude::*};
use serde_json::Value;

use super::lexer::Token;
use crate::codec;

/// Name of the store handle inside expressions.
pub(crate) const STORE: &str = "$";

type ParserError<'src> = extra::Err<Rich<'src, Token>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    Ident(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
}

impl Expr {
    /// `$` itself, the store handle.
    pub(crate) fn is_store(&self) -> bool {
        matches!(self, Expr::Ident(name) if name == STORE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AssignOp {
    Set,
    Add,
    Sub,
}

/// Left-hand side of an assignment: always a state key.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Target {
    /// `key`, `$.key` or `$["key"]`
    Key(String),
    /// `$[expr]`
    Computed(Expr),
}

impl Target {
    fn from_expr(expr: Expr) -> Option<Self> {
        match expr {
            Expr::Ident(name) if !name.starts_with('$') => Some(Target::Key(name)),
            Expr::Member(object, field) if object.is_store() => Some(Target::Key(field)),
            Expr::Index(object, index) if object.is_store() => Some(match *index {
                Expr::Literal(Value::String(key)) => Target::Key(key),
                computed => Target::Computed(computed),
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Statement {
    Assign {
        target: Target,
        op: AssignOp,
        value: Expr,
    },
    Expr(Expr),
}

enum Access {
    Member(String),
    Index(Expr),
}

fn unary(op: UnaryOp, operand: Expr) -> Expr {
    Expr::Unary(op, Box::new(operand))
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary(op, Box::new(lhs), Box::new(rhs))
}

pub(crate) fn expression<'src>() -> impl Parser<'src, &'src [Token], Expr, ParserError<'src>> + Clone
{
    recursive(|expression| {
        let ctrl = |c: char| just(Token::Ctrl(c));
        let op = |op: &'static str| just(Token::Op(op));

        let identifier = select! { Token::Ident(name) => name };

        let literal = select! {
            Token::Number(number) => Expr::Literal(codec::number(number)),
            Token::Str(text) => Expr::Literal(Value::String(text)),
        };

        let name = identifier.clone().map(|name: String| match name.as_str() {
            "true" => Expr::Literal(Value::Bool(true)),
            "false" => Expr::Literal(Value::Bool(false)),
            "null" | "undefined" => Expr::Literal(Value::Null),
            _ => Expr::Ident(name),
        });

        let array = expression
            .clone()
            .separated_by(ctrl(','))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(ctrl('['), ctrl(']'))
            .map(Expr::Array);

        let key = identifier.clone().or(select! { Token::Str(key) => key });
        let object = key
            .then_ignore(ctrl(':'))
            .then(expression.clone())
            .separated_by(ctrl(','))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(ctrl('{'), ctrl('}'))
            .map(Expr::Object);

        let nested = expression.clone().delimited_by(ctrl('('), ctrl(')'));

        let atom = choice((literal, name, array, object, nested));

        let access = choice((
            ctrl('.').ignore_then(identifier).map(Access::Member),
            expression
                .clone()
                .delimited_by(ctrl('['), ctrl(']'))
                .map(Access::Index),
        ));

        atom.pratt((
            postfix(8, access, |object, access, _| match access {
                Access::Member(field) => Expr::Member(Box::new(object), field),
                Access::Index(index) => Expr::Index(Box::new(object), Box::new(index)),
            }),
            prefix(7, ctrl('!'), |_, operand, _| unary(UnaryOp::Not, operand)),
            prefix(7, ctrl('-'), |_, operand, _| unary(UnaryOp::Neg, operand)),
            prefix(7, ctrl('+'), |_, operand, _| operand),
            infix(left(6), ctrl('*'), |l, _, r, _| binary(BinaryOp::Mul, l, r)),
            infix(left(6), ctrl('/'), |l, _, r, _| binary(BinaryOp::Div, l, r)),
            infix(left(6), ctrl('%'), |l, _, r, _| binary(BinaryOp::Rem, l, r)),
            infix(left(5), ctrl('+'), |l, _, r, _| binary(BinaryOp::Add, l, r)),
            infix(left(5), ctrl('-'), |l, _, r, _| binary(BinaryOp::Sub, l, r)),
            infix(left(4), ctrl('<'), |l, _, r, _| binary(BinaryOp::Lt, l, r)),
            infix(left(4), op("<="), |l, _, r, _| binary(BinaryOp::Le, l, r)),
            infix(left(4), ctrl('>'), |l, _, r, _| binary(BinaryOp::Gt, l, r)),
            infix(left(4), op(">="), |l, _, r, _| binary(BinaryOp::Ge, l, r)),
            infix(left(3), op("=="), |l, _, r, _| binary(BinaryOp::Eq, l, r)),
            infix(left(3), op("!="), |l, _, r, _| binary(BinaryOp::Ne, l, r)),
            infix(left(2), op("&&"), |l, _, r, _| binary(BinaryOp::And, l, r)),
            infix(left(1), op("||"), |l, _, r, _| binary(BinaryOp::Or, l, r)),
        ))
    })
}

/// `;`-separated statements; assignments write state keys.
pub(crate) fn statements<'src>() -> impl Parser<'src, &'src [Token], Vec<Statement>, ParserError<'src>>
{
    let assign_op = choice((
        just(Token::Ctrl('=')).to(AssignOp::Set),
        just(Token::Op("+=")).to(AssignOp::Add),
        just(Token::Op("-=")).to(AssignOp::Sub),
    ));

    let assignment = expression()
        .then(assign_op)
        .then(expression())
        .try_map(|((target, op), value), span| {
            Target::from_expr(target)
                .map(|target| Statement::Assign { target, op, value })
                .ok_or_else(|| Rich::custom(span, "left side of assignment is not a state key"))
        });

    let statement = assignment.or(expression().map(Statement::Expr));
    let separator = just(Token::Ctrl(';')).repeated().at_least(1).collect::<Vec<_>>();

    statement
        .separated_by(separator)
        .allow_leading()
        .allow_trailing()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::lexer::lexer;
    use super::*;
    use serde_json::json;

    fn tokens(src: &str) -> Vec<Token> {
        lexer().parse(src).into_result().unwrap()
    }

    fn expr(src: &str) -> Expr {
        let toks = tokens(src);
        let parsed = expression().parse(toks.as_slice()).into_result().unwrap();
        parsed
    }

    fn parse_statements(src: &str) -> Option<Vec<Statement>> {
        let toks = tokens(src);
        let parsed = statements().parse(toks.as_slice()).into_result().ok();
        parsed
    }

    #[test]
    fn respects_precedence() {
        assert_eq!(
            expr("1 + 2 * 3"),
            binary(
                BinaryOp::Add,
                Expr::Literal(json!(1)),
                binary(BinaryOp::Mul, Expr::Literal(json!(2)), Expr::Literal(json!(3)))
            )
        );
        assert_eq!(
            expr("-a.b"),
            unary(
                UnaryOp::Neg,
                Expr::Member(Box::new(Expr::Ident("a".into())), "b".into())
            )
        );
    }

    #[test]
    fn comparisons_bind_looser_than_arithmetic() {
        assert_eq!(
            expr("a + 1 >= 2 && !b"),
            binary(
                BinaryOp::And,
                binary(
                    BinaryOp::Ge,
                    binary(BinaryOp::Add, Expr::Ident("a".into()), Expr::Literal(json!(1))),
                    Expr::Literal(json!(2))
                ),
                unary(UnaryOp::Not, Expr::Ident("b".into()))
            )
        );
    }

    #[test]
    fn parses_member_chains() {
        assert_eq!(
            expr("$target.value"),
            Expr::Member(Box::new(Expr::Ident("$target".into())), "value".into())
        );
        assert_eq!(
            expr("[1, 2][0]"),
            Expr::Index(
                Box::new(Expr::Array(vec![Expr::Literal(json!(1)), Expr::Literal(json!(2))])),
                Box::new(Expr::Literal(json!(0)))
            )
        );
    }

    #[test]
    fn parses_statements() {
        let statements = parse_statements("a = 1; b += a;;").unwrap();
        assert_eq!(statements.len(), 2);
        assert!(matches!(statements[1], Statement::Assign { op: AssignOp::Add, .. }));
        assert!(matches!(parse_statements("a == 1").unwrap()[0], Statement::Expr(_)));
    }

    #[test]
    fn store_handle_targets_resolve_to_keys() {
        let statements = parse_statements(r#"$.count = 1; $["total"] -= 2; $[name] = 3"#).unwrap();
        let targets: Vec<&Target> = statements
            .iter()
            .map(|statement| match statement {
                Statement::Assign { target, .. } => target,
                Statement::Expr(_) => panic!("expected assignment"),
            })
            .collect();
        assert_eq!(targets[0], &Target::Key("count".into()));
        assert_eq!(targets[1], &Target::Key("total".into()));
        assert_eq!(targets[2], &Target::Computed(Expr::Ident("name".into())));
    }

    #[test]
    fn rejects_non_key_targets() {
        assert!(parse_statements("$value = 2").is_none());
        assert!(parse_statements("a.b = 2").is_none());
        assert!(parse_statements("1 = 2").is_none());
    }

    #[test]
    fn rejects_trailing_tokens() {
        let toks = tokens("1 2");
        assert!(expression().parse(toks.as_slice()).into_result().is_err());
        let toks = tokens("{a 1}");
        assert!(expression().parse(toks.as_slice()).into_result().is_err());
    }
}
