//! Expression parsing: operator-precedence climbing over [`Precedence`],
//! with unary prefix and postfix call/index handled outside the table.

use super::Parser;
use crate::ast::{BinOp, Expr, UnOp};
use crate::error::{ParseError, ParseResult};
use crate::token::{Precedence, Token};

impl<'a> Parser<'a> {
    pub(super) fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.parse_binary(Precedence::Lowest)
    }

    fn parse_binary(&mut self, min_prec: Precedence) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;

        while let Some((op, prec)) = binary_op(&self.current.token) {
            if prec < min_prec {
                break;
            }
            self.advance();
            let rhs = self.parse_binary(prec.next_tighter())?;
            let span = left.span().merge(&rhs.span());
            left = Expr::Binary {
                op,
                lhs: Box::new(left),
                rhs: Box::new(rhs),
                span,
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let start = self.current_span();
        let op = match &self.current.token {
            Token::Minus => Some(UnOp::Neg),
            Token::Bang => Some(UnOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            let span = start.merge(&operand.span());
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
                span,
            });
        }
        self.parse_postfix()
    }

    /// Handles the single postfix production TL has: `base[index]`. Calls
    /// are not postfix on an arbitrary expression — `name(args)` is parsed
    /// directly in [`Parser::parse_primary`], since TL only allows calling
    /// a bare identifier, not an arbitrary expression.
    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;
        while self.check(&Token::LBracket) {
            self.advance();
            let index = self.parse_expr()?;
            let end = self.current_span();
            self.expect(Token::RBracket, "']' after the index expression")?;
            let span = expr.span().merge(&end);
            expr = Expr::Index {
                base: Box::new(expr),
                index: Box::new(index),
                span,
            };
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let start = self.current_span();
        match self.current.token.clone() {
            Token::Number(n) => {
                self.advance();
                if n.is_float {
                    let value = n.text.parse::<f64>().map_err(|_| ParseError::InvalidSyntax {
                        message: format!("invalid float literal '{}'", n.text),
                        span: start,
                    })?;
                    Ok(Expr::FloatLit { value, span: start })
                } else {
                    let value = n.text.parse::<i64>().map_err(|_| ParseError::InvalidSyntax {
                        message: format!("integer literal '{}' out of range", n.text),
                        span: start,
                    })?;
                    Ok(Expr::IntLit { value, span: start })
                }
            }
            Token::StringLit(value) => {
                self.advance();
                Ok(Expr::StringLit { value, span: start })
            }
            Token::True => {
                self.advance();
                Ok(Expr::BoolLit { value: true, span: start })
            }
            Token::False => {
                self.advance();
                Ok(Expr::BoolLit { value: false, span: start })
            }
            Token::Null => {
                self.advance();
                Ok(Expr::NullLit { span: start })
            }
            Token::Ident(name) => {
                self.advance();
                if self.check(&Token::LParen) {
                    self.parse_call(name, start)
                } else {
                    Ok(Expr::Variable { name, span: start })
                }
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                let end = self.current_span();
                self.expect(Token::RParen, "')' to close the grouped expression")?;
                let span = start.merge(&end);
                Ok(Expr::Group {
                    inner: Box::new(inner),
                    span,
                })
            }
            _ => Err(ParseError::UnexpectedToken {
                found: self.current.token.describe(),
                expected: "an expression".to_string(),
                span: start,
            }),
        }
    }

    fn parse_call(&mut self, callee: String, start: crate::span::Span) -> ParseResult<Expr> {
        self.advance(); // `(`
        let mut args = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if self.check(&Token::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        let end = self.current_span();
        self.expect(Token::RParen, "')' to close the argument list")?;
        let span = start.merge(&end);
        Ok(Expr::Call { callee, args, span })
    }
}

fn binary_op(token: &Token) -> Option<(BinOp, Precedence)> {
    match token {
        Token::OrOr => Some((BinOp::Or, Precedence::Or)),
        Token::AndAnd => Some((BinOp::And, Precedence::And)),
        Token::EqEq => Some((BinOp::Eq, Precedence::Equality)),
        Token::NotEq => Some((BinOp::Ne, Precedence::Equality)),
        Token::Lt => Some((BinOp::Lt, Precedence::Comparison)),
        Token::LtEq => Some((BinOp::Le, Precedence::Comparison)),
        Token::Gt => Some((BinOp::Gt, Precedence::Comparison)),
        Token::GtEq => Some((BinOp::Ge, Precedence::Comparison)),
        Token::Plus => Some((BinOp::Add, Precedence::Additive)),
        Token::Minus => Some((BinOp::Sub, Precedence::Additive)),
        Token::Star => Some((BinOp::Mul, Precedence::Multiplicative)),
        Token::Slash => Some((BinOp::Div, Precedence::Multiplicative)),
        Token::Percent => Some((BinOp::Mod, Precedence::Multiplicative)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::super::Parser;
    use crate::ast::{BinOp, Expr};

    fn parse_expr(src: &str) -> Expr {
        let mut parser = Parser::new(src, "test.tl", true);
        parser.parse_expr().expect("expression should parse")
    }

    #[test]
    fn precedence_climbs_correctly() {
        let expr = parse_expr("1 + 2 * 3");
        match expr {
            Expr::Binary { op: BinOp::Add, rhs, .. } => {
                assert!(matches!(*rhs, Expr::Binary { op: BinOp::Mul, .. }));
            }
            other => panic!("expected addition at the top, got {other:?}"),
        }
    }

    #[test]
    fn unary_binds_tighter_than_binary() {
        let expr = parse_expr("-1 + 2");
        match expr {
            Expr::Binary { op: BinOp::Add, lhs, .. } => {
                assert!(matches!(*lhs, Expr::Unary { .. }));
            }
            other => panic!("expected addition at the top, got {other:?}"),
        }
    }

    #[test]
    fn indexing_chains_left_to_right() {
        let expr = parse_expr("a[0][1]");
        match expr {
            Expr::Index { base, .. } => {
                assert!(matches!(*base, Expr::Index { .. }));
            }
            other => panic!("expected a chained index, got {other:?}"),
        }
    }

    #[test]
    fn call_arguments_are_parsed() {
        let expr = parse_expr("add(1, 2)");
        match expr {
            Expr::Call { callee, args, .. } => {
                assert_eq!(callee, "add");
                assert_eq!(args.len(), 2);
            }
            other => panic!("expected a call, got {other:?}"),
        }
    }
}
