//! Top-level item and statement productions.

use super::Parser;
use crate::ast::{
    AsmOperand, DataType, FfiFunction, Function, IncludeDirective, InlineAsm, Param, Program, Stmt,
};
use crate::error::{ParseError, ParseResult};
use crate::token::Token;

impl<'a> Parser<'a> {
    /// Dispatch on the current token to one of: `#include`, `extern { ... }`,
    /// or a function definition/declaration. TL has no other top-level
    /// items — bare statements may not appear outside a function body.
    pub(super) fn parse_top_level_item(&mut self, program: &mut Program) -> ParseResult<()> {
        match &self.current.token {
            Token::Include => {
                let directive = self.parse_include()?;
                program.includes.push(directive);
                Ok(())
            }
            Token::KwExtern => {
                let ffi = self.parse_extern_block()?;
                program.ffi_functions.extend(ffi);
                Ok(())
            }
            Token::KwFunc => {
                let function = self.parse_function()?;
                program.functions.push(function);
                Ok(())
            }
            _ => Err(ParseError::UnexpectedToken {
                found: self.current.token.describe(),
                expected: "'#include', 'extern', or a function definition".to_string(),
                span: self.current_span(),
            }),
        }
    }

    fn parse_include(&mut self) -> ParseResult<IncludeDirective> {
        let start = self.current_span();
        self.advance(); // `#include`
        let (path, is_system) = self.parse_include_path()?;
        self.expect(Token::Semicolon, "';' after include path")?;
        Ok(IncludeDirective {
            path,
            is_system,
            span: start,
        })
    }

    /// `"local/path.tl"` or `<system/path.tl>`. The lexer has no dedicated
    /// angle-bracket path token, so a system include is recognized as
    /// `< ident (/ ident)* (. ident)? >` and reassembled here.
    fn parse_include_path(&mut self) -> ParseResult<(String, bool)> {
        match self.current.token.clone() {
            Token::StringLit(path) => {
                self.advance();
                Ok((path, false))
            }
            Token::Lt => {
                self.advance();
                let mut path = String::new();
                loop {
                    match self.current.token.clone() {
                        Token::Ident(part) => {
                            path.push_str(&part);
                            self.advance();
                        }
                        Token::Slash => {
                            path.push('/');
                            self.advance();
                        }
                        Token::Gt => {
                            self.advance();
                            break;
                        }
                        _ => {
                            return Err(ParseError::UnexpectedToken {
                                found: self.current.token.describe(),
                                expected: "'>' to close the system include path".to_string(),
                                span: self.current_span(),
                            });
                        }
                    }
                }
                Ok((path, true))
            }
            _ => Err(ParseError::UnexpectedToken {
                found: self.current.token.describe(),
                expected: "a quoted path or '<system/path>'".to_string(),
                span: self.current_span(),
            }),
        }
    }

    /// `extern "cdecl" from "lib.so" { ... }` — a block of declaration-only
    /// function signatures bound to a dynamic library.
    fn parse_extern_block(&mut self) -> ParseResult<Vec<FfiFunction>> {
        self.advance(); // `extern`
        let calling_convention = self.expect_string_lit("a calling convention string")?;
        self.expect(Token::KwFrom, "'from'")?;
        let library = self.expect_string_lit("a library path string")?;
        self.expect(Token::LBrace, "'{' to start the extern block")?;

        let mut functions = Vec::new();
        while !self.check(&Token::RBrace) && !self.at_eof() {
            let span = self.current_span();
            self.expect(Token::KwFunc, "a function signature")?;
            let (name, _) = self.expect_ident("a function name")?;
            let params = self.parse_param_list()?;
            self.expect(Token::Arrow, "'->' before the return type")?;
            let return_type = self.parse_type()?;
            self.expect(Token::Semicolon, "';' after the extern function signature")?;
            functions.push(FfiFunction {
                name,
                library: library.clone(),
                calling_convention: calling_convention.clone(),
                params,
                return_type,
                span,
            });
        }
        self.expect(Token::RBrace, "'}' to close the extern block")?;
        Ok(functions)
    }

    fn expect_string_lit(&mut self, context: &str) -> ParseResult<String> {
        match self.current.token.clone() {
            Token::StringLit(s) => {
                self.advance();
                Ok(s)
            }
            _ => Err(ParseError::UnexpectedToken {
                found: self.current.token.describe(),
                expected: context.to_string(),
                span: self.current_span(),
            }),
        }
    }

    /// `func name(p: T, ...) -> T { stmts }` or, header-only, ending in `;`.
    fn parse_function(&mut self) -> ParseResult<Function> {
        let start = self.current_span();
        self.advance(); // `func`
        let (name, _) = self.expect_ident("a function name")?;
        let params = self.parse_param_list()?;
        self.expect(Token::Arrow, "'->' before the return type")?;
        let return_type = self.parse_type()?;

        if self.check(&Token::Semicolon) {
            self.advance();
            return Ok(Function {
                name,
                return_type,
                params,
                body: Vec::new(),
                is_declaration_only: true,
                span: start,
            });
        }

        let body = self.parse_block_stmts()?;
        Ok(Function {
            name,
            return_type,
            params,
            body,
            is_declaration_only: false,
            span: start,
        })
    }

    fn parse_param_list(&mut self) -> ParseResult<Vec<Param>> {
        self.expect(Token::LParen, "'(' to start the parameter list")?;
        let mut params = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                let (name, _) = self.expect_ident("a parameter name")?;
                self.expect(Token::Colon, "':' before the parameter type")?;
                let ty = self.parse_type()?;
                params.push(Param { name, ty });
                if self.check(&Token::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(Token::RParen, "')' to close the parameter list")?;
        Ok(params)
    }

    /// A scalar type keyword, optionally followed by `[]` for an array type.
    /// All sized-int keywords (`int8`..`int64`) lower to `DataType::Int`,
    /// see the recorded decision in `SPEC_FULL.md` §9.
    pub(super) fn parse_type(&mut self) -> ParseResult<DataType> {
        let base = match &self.current.token {
            Token::KwInt | Token::KwInt8 | Token::KwInt16 | Token::KwInt32 | Token::KwInt64 => {
                self.advance();
                DataType::Int
            }
            Token::KwBool => {
                self.advance();
                DataType::Bool
            }
            Token::KwFloat => {
                self.advance();
                DataType::Float
            }
            Token::KwDouble => {
                self.advance();
                DataType::Double
            }
            Token::KwString => {
                self.advance();
                DataType::String
            }
            Token::KwVoid => {
                self.advance();
                DataType::Void
            }
            _ => {
                return Err(ParseError::UnexpectedToken {
                    found: self.current.token.describe(),
                    expected: "a type".to_string(),
                    span: self.current_span(),
                });
            }
        };
        if self.check(&Token::LBracket) {
            self.advance();
            self.expect(Token::RBracket, "']' in array type")?;
            Ok(DataType::Array(Box::new(base)))
        } else {
            Ok(base)
        }
    }

    /// `{ stmt* }`, returning the contained statements (not wrapped, since
    /// both function bodies and nested blocks need the raw `Vec<Stmt>`).
    fn parse_block_stmts(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect(Token::LBrace, "'{' to start a block")?;
        let mut stmts = Vec::new();
        while !self.check(&Token::RBrace) && !self.at_eof() {
            match self.parse_statement() {
                Ok(stmt) => stmts.push(stmt),
                Err(err) => {
                    self.diagnostics.add_parse_error(&err, self.file.clone());
                    self.consecutive_errors += 1;
                    if self.consecutive_errors >= super::MAX_CONSECUTIVE_ERRORS {
                        return Err(ParseError::InvalidSyntax {
                            message: "too many errors, giving up on this block".to_string(),
                            span: self.current_span(),
                        });
                    }
                    self.synchronize();
                    continue;
                }
            }
            self.consecutive_errors = 0;
        }
        self.expect(Token::RBrace, "'}' to close a block")?;
        Ok(stmts)
    }

    fn parse_block(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        let stmts = self.parse_block_stmts()?;
        Ok(Stmt::Block { stmts, span: start })
    }

    pub(super) fn parse_statement(&mut self) -> ParseResult<Stmt> {
        match &self.current.token {
            Token::KwLet => self.parse_var_or_array_decl(),
            Token::KwIf => self.parse_if(),
            Token::KwWhile => self.parse_while(),
            Token::KwBreak => {
                let span = self.current_span();
                self.advance();
                self.expect(Token::Semicolon, "';' after 'break'")?;
                Ok(Stmt::Break { span })
            }
            Token::KwContinue => {
                let span = self.current_span();
                self.advance();
                self.expect(Token::Semicolon, "';' after 'continue'")?;
                Ok(Stmt::Continue { span })
            }
            Token::KwReturn => self.parse_return(),
            Token::KwPrint => self.parse_print(),
            Token::KwAsm => self.parse_inline_asm(),
            Token::LBrace => self.parse_block(),
            _ => self.parse_assignment_or_expr_stmt(),
        }
    }

    /// `let name: T = expr;` or `let name: T[N] = expr;` (the array form's
    /// initializer is a single expression broadcast to every slot — see
    /// `DESIGN.md`).
    fn parse_var_or_array_decl(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        self.advance(); // `let`
        let (name, _) = self.expect_ident("a variable name")?;
        self.expect(Token::Colon, "':' before the declared type")?;
        let elem_ty = self.parse_scalar_type()?;

        if self.check(&Token::LBracket) {
            self.advance();
            let size = self.parse_array_size()?;
            self.expect(Token::RBracket, "']' after the array size")?;
            let init = self.parse_optional_initializer()?;
            self.expect(Token::Semicolon, "';' after array declaration")?;
            return Ok(Stmt::ArrayDecl {
                name,
                elem_ty,
                size,
                init,
                span: start,
            });
        }

        let init = self.parse_optional_initializer()?;
        self.expect(Token::Semicolon, "';' after variable declaration")?;
        Ok(Stmt::VarDecl {
            name,
            ty: elem_ty,
            init,
            span: start,
        })
    }

    /// Like [`Parser::parse_type`] but rejects a bare `T[]` array-type
    /// suffix here — array *declarations* spell their size inline
    /// (`T[N]`), so the suffix is consumed by the caller instead.
    fn parse_scalar_type(&mut self) -> ParseResult<DataType> {
        match &self.current.token {
            Token::KwInt | Token::KwInt8 | Token::KwInt16 | Token::KwInt32 | Token::KwInt64 => {
                self.advance();
                Ok(DataType::Int)
            }
            Token::KwBool => {
                self.advance();
                Ok(DataType::Bool)
            }
            Token::KwFloat => {
                self.advance();
                Ok(DataType::Float)
            }
            Token::KwDouble => {
                self.advance();
                Ok(DataType::Double)
            }
            Token::KwString => {
                self.advance();
                Ok(DataType::String)
            }
            Token::KwVoid => {
                self.advance();
                Ok(DataType::Void)
            }
            _ => Err(ParseError::UnexpectedToken {
                found: self.current.token.describe(),
                expected: "a type".to_string(),
                span: self.current_span(),
            }),
        }
    }

    fn parse_array_size(&mut self) -> ParseResult<i64> {
        let span = self.current_span();
        match self.current.token.clone() {
            Token::Number(n) if !n.is_float => {
                self.advance();
                n.text.parse::<i64>().map_err(|_| ParseError::InvalidSyntax {
                    message: format!("array size '{}' does not fit in a 64-bit integer", n.text),
                    span,
                })
            }
            _ => Err(ParseError::UnexpectedToken {
                found: self.current.token.describe(),
                expected: "an integer array size".to_string(),
                span,
            }),
        }
    }

    fn parse_optional_initializer(&mut self) -> ParseResult<Option<crate::ast::Expr>> {
        if self.check(&Token::Eq) {
            self.advance();
            Ok(Some(self.parse_expr()?))
        } else {
            Ok(None)
        }
    }

    fn parse_if(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        self.advance(); // `if`
        self.expect(Token::LParen, "'(' after 'if'")?;
        let cond = self.parse_expr()?;
        self.expect(Token::RParen, "')' after the condition")?;
        let then_branch = Box::new(self.parse_block()?);
        let else_branch = if self.check(&Token::KwElse) {
            self.advance();
            if self.check(&Token::KwIf) {
                Some(Box::new(self.parse_if()?))
            } else {
                Some(Box::new(self.parse_block()?))
            }
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_branch,
            else_branch,
            span: start,
        })
    }

    fn parse_while(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        self.advance(); // `while`
        self.expect(Token::LParen, "'(' after 'while'")?;
        let cond = self.parse_expr()?;
        self.expect(Token::RParen, "')' after the condition")?;
        let body = Box::new(self.parse_block()?);
        Ok(Stmt::While {
            cond,
            body,
            span: start,
        })
    }

    fn parse_return(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        self.advance(); // `return`
        let value = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(Token::Semicolon, "';' after 'return'")?;
        Ok(Stmt::Return { value, span: start })
    }

    fn parse_print(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        self.advance(); // `print`
        self.expect(Token::LParen, "'(' after 'print'")?;
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
        self.expect(Token::RParen, "')' after print arguments")?;
        self.expect(Token::Semicolon, "';' after 'print(...)'")?;
        Ok(Stmt::Print { args, span: start })
    }

    /// `asm [volatile] { "code" "parts"... [: outputs] [: inputs] [: clobbers] };`
    ///
    /// The code template is one or more adjacent string literals,
    /// concatenated, the same way a C compiler joins adjacent string
    /// literals — this lets a caller split a long template across several
    /// lines without embedding `\n` escapes everywhere.
    fn parse_inline_asm(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        self.advance(); // `asm`
        let volatile = if self.check(&Token::KwVolatile) {
            self.advance();
            true
        } else {
            false
        };
        self.expect(Token::LBrace, "'{' after 'asm'")?;

        let mut code = self.expect_string_lit("the assembly template string")?;
        while self.check_string_lit() {
            code.push_str(&self.expect_string_lit("another assembly template string")?);
        }

        let mut outputs = Vec::new();
        let mut inputs = Vec::new();
        let mut clobbers = Vec::new();

        if self.check(&Token::Colon) {
            self.advance();
            outputs = self.parse_asm_operand_list()?;
            if self.check(&Token::Colon) {
                self.advance();
                inputs = self.parse_asm_operand_list()?;
                if self.check(&Token::Colon) {
                    self.advance();
                    clobbers = self.parse_clobber_list()?;
                }
            }
        }

        self.expect(Token::RBrace, "'}' to close the asm block")?;
        self.expect(Token::Semicolon, "';' after the asm block")?;
        Ok(Stmt::InlineAsm(InlineAsm {
            code,
            volatile,
            outputs,
            inputs,
            clobbers,
            span: start,
        }))
    }

    fn check_string_lit(&self) -> bool {
        matches!(self.current.token, Token::StringLit(_))
    }

    fn parse_asm_operand_list(&mut self) -> ParseResult<Vec<AsmOperand>> {
        let mut operands = Vec::new();
        if self.check(&Token::Colon) || self.check(&Token::RBrace) {
            return Ok(operands);
        }
        loop {
            let constraint = self.expect_string_lit("an operand constraint string")?;
            self.expect(Token::LParen, "'(' before the operand expression")?;
            let expr = self.parse_expr()?;
            self.expect(Token::RParen, "')' after the operand expression")?;
            operands.push(AsmOperand { constraint, expr });
            if self.check(&Token::Comma) {
                self.advance();
                continue;
            }
            break;
        }
        Ok(operands)
    }

    fn parse_clobber_list(&mut self) -> ParseResult<Vec<String>> {
        let mut clobbers = Vec::new();
        if self.check(&Token::RBrace) {
            return Ok(clobbers);
        }
        loop {
            clobbers.push(self.expect_string_lit("a clobbered register name")?);
            if self.check(&Token::Comma) {
                self.advance();
                continue;
            }
            break;
        }
        Ok(clobbers)
    }

    /// An identifier-led statement is one of: a plain expression statement
    /// (including a call), a simple assignment `name = expr;`, or an
    /// index assignment `name[expr] = expr;`. All three share the same
    /// prefix, so this disambiguates by parsing the primary expression
    /// first and inspecting what comes after it.
    fn parse_assignment_or_expr_stmt(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        let expr = self.parse_expr()?;

        if self.check(&Token::Eq) {
            self.advance();
            let value = self.parse_expr()?;
            self.expect(Token::Semicolon, "';' after assignment")?;
            return match expr {
                crate::ast::Expr::Variable { name, .. } => Ok(Stmt::Assign {
                    name,
                    value,
                    span: start,
                }),
                crate::ast::Expr::Index { base, index, .. } => Ok(Stmt::IndexAssign {
                    base: *base,
                    index: *index,
                    value,
                    span: start,
                }),
                other => Err(ParseError::InvalidSyntax {
                    message: format!("cannot assign to {other:?}"),
                    span: start,
                }),
            };
        }

        self.expect(Token::Semicolon, "';' after expression statement")?;
        Ok(Stmt::Expr(expr))
    }
}
