use super::*;

fn lex_all(src: &str) -> Vec<Token> {
    Token::lexer(src).filter_map(|r| r.ok()).collect()
}

#[test]
fn keywords_and_identifiers() {
    let tokens = lex_all("func add let if");
    assert_eq!(
        tokens,
        vec![Token::KwFunc, Token::Ident("add".into()), Token::KwLet, Token::KwIf]
    );
}

#[test]
fn integer_and_float_literals() {
    let tokens = lex_all("42 3.14 1e10 2.5e-3");
    assert_eq!(
        tokens,
        vec![
            Token::Number(NumberLit { text: "42".into(), is_float: false }),
            Token::Number(NumberLit { text: "3.14".into(), is_float: true }),
            Token::Number(NumberLit { text: "1e10".into(), is_float: true }),
            Token::Number(NumberLit { text: "2.5e-3".into(), is_float: true }),
        ]
    );
}

#[test]
fn malformed_exponent_is_rejected() {
    let mut lex = Token::lexer("1e");
    assert!(lex.next().unwrap().is_err());
}

#[test]
fn include_directive_is_one_token() {
    assert_eq!(lex_all("#include"), vec![Token::Include]);
}

#[test]
fn operators_tokenize_longest_match_first() {
    let tokens = lex_all("== = != ! <= < >= > && || ->");
    assert_eq!(
        tokens,
        vec![
            Token::EqEq,
            Token::Eq,
            Token::NotEq,
            Token::Bang,
            Token::LtEq,
            Token::Lt,
            Token::GtEq,
            Token::Gt,
            Token::AndAnd,
            Token::OrOr,
            Token::Arrow,
        ]
    );
}
