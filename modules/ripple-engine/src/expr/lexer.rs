//! Tokenizer for inline action and parameter expressions.

use chumsky::prelude::*;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    /// Multi-character operators; `===` and `!==` fold into `==` and `!=`.
    Op(&'static str),
    /// Brackets, punctuation and single-character operators.
    Ctrl(char),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::Number(number) => write!(f, "{number}"),
            Token::Str(text) => write!(f, "{text:?}"),
            Token::Ident(name) => f.write_str(name),
            Token::Op(op) => f.write_str(op),
            Token::Ctrl(c) => write!(f, "{c}"),
        }
    }
}

pub(crate) fn lexer<'src>() -> impl Parser<'src, &'src str, Vec<Token>, extra::Err<Rich<'src, char>>>
{
    let number = text::int(10)
        .then(just('.').then(text::digits(10)).or_not())
        .to_slice()
        .from_str::<f64>()
        .unwrapped()
        .map(Token::Number);

    let escape = just('\\').ignore_then(choice((
        just('n').to('\n'),
        just('t').to('\t'),
        just('r').to('\r'),
        any(),
    )));

    let string = |quote: char| {
        just(quote)
            .ignore_then(
                escape
                    .clone()
                    .or(none_of([quote, '\\']))
                    .repeated()
                    .collect::<String>(),
            )
            .then_ignore(just(quote))
            .map(Token::Str)
    };

    let operator = choice((
        just("===").to(Token::Op("==")),
        just("!==").to(Token::Op("!=")),
        just("==").to(Token::Op("==")),
        just("!=").to(Token::Op("!=")),
        just("<=").to(Token::Op("<=")),
        just(">=").to(Token::Op(">=")),
        just("&&").to(Token::Op("&&")),
        just("||").to(Token::Op("||")),
        just("+=").to(Token::Op("+=")),
        just("-=").to(Token::Op("-=")),
    ));

    let ctrl = one_of("()[]{},:.;!+-*/%<>=").map(Token::Ctrl);

    let identifier = any()
        .filter(|c: &char| c.is_alphabetic() || *c == '_' || *c == '$')
        .then(
            any()
                .filter(|c: &char| c.is_alphanumeric() || *c == '_' || *c == '$')
                .repeated(),
        )
        .to_slice()
        .map(|name: &str| Token::Ident(name.to_string()));

    let token = choice((number, string('"'), string('\''), operator, ctrl, identifier));

    token.padded().repeated().collect().padded()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(src: &str) -> Vec<Token> {
        lexer().parse(src).into_result().unwrap()
    }

    #[test]
    fn tokenizes_mixed_input() {
        let tokens = tokenize(r#"count += $target.value * 2; msg = 'it\'s'"#);
        assert_eq!(
            tokens,
            vec![
                Token::Ident("count".into()),
                Token::Op("+="),
                Token::Ident("$target".into()),
                Token::Ctrl('.'),
                Token::Ident("value".into()),
                Token::Ctrl('*'),
                Token::Number(2.0),
                Token::Ctrl(';'),
                Token::Ident("msg".into()),
                Token::Ctrl('='),
                Token::Str("it's".into()),
            ]
        );
    }

    #[test]
    fn prefers_longest_operator() {
        assert_eq!(tokenize("a === b")[1], Token::Op("=="));
        assert_eq!(tokenize("a<=b")[1], Token::Op("<="));
        assert_eq!(tokenize("$['k']")[1], Token::Ctrl('['));
    }

    #[test]
    fn blank_input_has_no_tokens() {
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn reports_unterminated_strings() {
        assert!(lexer().parse("'open").into_result().is_err());
        assert!(lexer().parse("a # b").into_result().is_err());
    }
}
