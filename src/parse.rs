//! Hand-written recursive descent parser producing a located AST.
//!
//! Statements: `prop`, `set`, `for .. in`, `if`/`else`, `import [as]`,
//! `def`, and command invocations. Expressions follow the usual precedence
//! ladder, lowest first: `or`, `and`, `not`, relational (`< > <= >= =`),
//! additive, multiplicative, unary sign, primary.
//!
//! Command argument lists mix commas and juxtaposition, SVG style. The one
//! ambiguity is a bare name, which could be a variable argument or the next
//! command; it joins the list directly after a comma, as a call (`name(`),
//! or as a lone leading argument. A path letter followed by something that
//! itself starts an argument begins the next command instead, so
//! `M 0,0 L 1,2` is two commands while `M a,b` reads `a` as a variable.

use std::rc::Rc;

use crate::ast::*;
use crate::errors::ParseError;
use crate::lexer::{Token, TokenKind, is_path_letter, tokenize};
use crate::log::debug;

/// Parse a template into its top-level statements.
pub fn parse(source: &str) -> Result<Ast, ParseError> {
    let tokens = tokenize(source).collect::<Result<Vec<_>, _>>()?;
    let mut parser = Parser { tokens, pos: 0 };
    let ast = parser.program()?;
    debug!(statements = ast.len(), "parsed template");
    Ok(ast)
}

/// True for tokens that begin an argument no bare name could own: numbers,
/// strings, parenthesized groups, unary signs, `not`, and `default`.
fn starts_plain_argument(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Number
            | TokenKind::Str
            | TokenKind::LParen
            | TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Not
            | TokenKind::Default
    )
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn cur(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn la(&self, n: usize) -> &Token {
        let i = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[i]
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.cur().kind == kind
    }

    fn bump(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token, ParseError> {
        if self.at(kind) {
            Ok(self.bump())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.cur();
        let (line, column) = (token.loc.first_line, token.loc.first_column);
        if token.kind == TokenKind::Eof {
            ParseError::UnexpectedEof {
                expected: expected.to_string(),
                line,
                column,
                file: None,
            }
        } else {
            let found = match token.kind {
                TokenKind::Name | TokenKind::Number => format!("`{}`", token.text),
                TokenKind::Str => "a string".to_string(),
                other => other.describe().to_string(),
            };
            ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found,
                line,
                column,
                file: None,
            }
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn program(&mut self) -> Result<Ast, ParseError> {
        let mut stmts = Vec::new();
        loop {
            if self.at(TokenKind::Semi) {
                self.bump();
                continue;
            }
            if self.at(TokenKind::Eof) {
                break;
            }
            stmts.push(self.statement()?);
        }
        Ok(stmts)
    }

    /// `{ statement* }`, returning the body and the brace-to-brace span.
    fn block(&mut self) -> Result<(Vec<Stmt>, crate::lexer::Location), ParseError> {
        let open = self.expect(TokenKind::LBrace, "`{`")?;
        let mut stmts = Vec::new();
        loop {
            if self.at(TokenKind::Semi) {
                self.bump();
                continue;
            }
            if self.at(TokenKind::RBrace) {
                break;
            }
            if self.at(TokenKind::Eof) {
                return Err(self.unexpected("`}`"));
            }
            stmts.push(self.statement()?);
        }
        let close = self.bump();
        Ok((stmts, open.loc.to(close.loc)))
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        match self.cur().kind {
            TokenKind::Prop => self.prop_statement(),
            TokenKind::Set => self.set_statement(),
            TokenKind::For => self.for_statement(),
            TokenKind::If => self.if_statement(),
            TokenKind::Import => self.import_statement(),
            TokenKind::Def => self.def_statement(),
            TokenKind::Name => self.command_statement(),
            _ => Err(self.unexpected("a statement")),
        }
    }

    fn prop_statement(&mut self) -> Result<Stmt, ParseError> {
        let kw = self.bump();
        let mut defs = vec![self.prop_def()?];
        while self.at(TokenKind::Comma) {
            self.bump();
            defs.push(self.prop_def()?);
        }
        let end = defs.last().map(|d| d.loc).unwrap_or(kw.loc);
        Ok(Stmt {
            loc: kw.loc.to(end),
            kind: StmtKind::Prop(defs),
        })
    }

    fn prop_def(&mut self) -> Result<PropDef, ParseError> {
        let name = self.expect(TokenKind::Name, "a prop name")?;
        let mut loc = name.loc;
        let mut range = None;
        if self.at(TokenKind::LParen) {
            self.bump();
            let start = self.expression()?;
            self.expect(TokenKind::DotDot, "`..`")?;
            let end = self.expression()?;
            let close = self.expect(TokenKind::RParen, "`)`")?;
            loc = loc.to(close.loc);
            range = Some(Range { start, end });
        }
        let mut default = None;
        if self.at(TokenKind::Eq) {
            self.bump();
            let expr = self.expression()?;
            loc = loc.to(expr.loc);
            default = Some(expr);
        }
        Ok(PropDef {
            name: name.text,
            range,
            default,
            loc,
        })
    }

    fn set_statement(&mut self) -> Result<Stmt, ParseError> {
        let kw = self.bump();
        let name = self.expect(TokenKind::Name, "a variable name")?;
        self.expect(TokenKind::Eq, "`=`")?;
        let value = self.expression()?;
        Ok(Stmt {
            loc: kw.loc.to(value.loc),
            kind: StmtKind::Set {
                name: name.text,
                value,
            },
        })
    }

    fn for_statement(&mut self) -> Result<Stmt, ParseError> {
        let kw = self.bump();
        let var = self.expect(TokenKind::Name, "a loop variable")?;
        self.expect(TokenKind::In, "`in`")?;
        let start = self.expression()?;
        self.expect(TokenKind::DotDot, "`..`")?;
        let end = self.expression()?;
        let (body, body_loc) = self.block()?;
        Ok(Stmt {
            loc: kw.loc.to(body_loc),
            kind: StmtKind::For {
                var: var.text,
                range: Range { start, end },
                body,
            },
        })
    }

    fn if_statement(&mut self) -> Result<Stmt, ParseError> {
        let kw = self.bump();
        let condition = self.expression()?;
        let (then_branch, mut end) = self.block()?;
        let mut else_branch = None;
        if self.at(TokenKind::Else) {
            self.bump();
            let (branch, branch_loc) = self.block()?;
            end = branch_loc;
            else_branch = Some(branch);
        }
        Ok(Stmt {
            loc: kw.loc.to(end),
            kind: StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
        })
    }

    fn import_statement(&mut self) -> Result<Stmt, ParseError> {
        let kw = self.bump();
        let path = self.expression()?;
        let mut end = path.loc;
        let mut alias = None;
        if self.at(TokenKind::As) {
            self.bump();
            let name = self.expect(TokenKind::Name, "an import alias")?;
            end = name.loc;
            alias = Some(name.text);
        }
        Ok(Stmt {
            loc: kw.loc.to(end),
            kind: StmtKind::Import { path, alias },
        })
    }

    fn def_statement(&mut self) -> Result<Stmt, ParseError> {
        let kw = self.bump();
        let name = self.expect(TokenKind::Name, "a command name")?;
        let (body, body_loc) = self.block()?;
        Ok(Stmt {
            loc: kw.loc.to(body_loc),
            kind: StmtKind::Def {
                name: name.text,
                body: Rc::new(body),
            },
        })
    }

    fn command_statement(&mut self) -> Result<Stmt, ParseError> {
        let name = self.bump();
        let args = self.command_args()?;
        let loc = args
            .last()
            .map(|a| name.loc.to(a.loc()))
            .unwrap_or(name.loc);
        Ok(Stmt {
            loc,
            kind: StmtKind::Command {
                name: name.text,
                args,
            },
        })
    }

    fn command_args(&mut self) -> Result<Vec<Arg>, ParseError> {
        let mut args = Vec::new();
        loop {
            let kind = self.cur().kind;
            if starts_plain_argument(kind) {
                args.push(self.argument()?);
            } else if kind == TokenKind::Comma && !args.is_empty() {
                self.bump();
                args.push(self.argument()?);
            } else if kind == TokenKind::Name && self.la(1).kind == TokenKind::LParen {
                args.push(self.argument()?);
            } else if kind == TokenKind::Name
                && args.is_empty()
                && !self.begins_next_command()
            {
                args.push(self.argument()?);
            } else {
                break;
            }
        }
        Ok(args)
    }

    /// A lone path letter whose follower starts an argument is the next
    /// command, not a variable reference: `Z L 1,2` closes and draws a line.
    fn begins_next_command(&self) -> bool {
        let text = &self.cur().text;
        let mut chars = text.chars();
        let lone_path_letter =
            matches!((chars.next(), chars.next()), (Some(c), None) if is_path_letter(c));
        lone_path_letter && starts_plain_argument(self.la(1).kind)
    }

    fn argument(&mut self) -> Result<Arg, ParseError> {
        if self.at(TokenKind::Default) {
            let token = self.bump();
            return Ok(Arg::Default(token.loc));
        }
        Ok(Arg::Expr(self.expression()?))
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.and_expr()?;
        while self.at(TokenKind::Or) {
            self.bump();
            let rhs = self.and_expr()?;
            lhs = binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.not_expr()?;
        while self.at(TokenKind::And) {
            self.bump();
            let rhs = self.not_expr()?;
            lhs = binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Expr, ParseError> {
        if self.at(TokenKind::Not) {
            let op = self.bump();
            let operand = self.not_expr()?;
            return Ok(Expr {
                loc: op.loc.to(operand.loc),
                kind: ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
            });
        }
        self.rel_expr()
    }

    fn rel_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.add_expr()?;
        loop {
            let op = match self.cur().kind {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Ge => BinaryOp::Ge,
                TokenKind::Eq => BinaryOp::Eq,
                _ => break,
            };
            self.bump();
            let rhs = self.add_expr()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn add_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.mul_expr()?;
        loop {
            let op = match self.cur().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.bump();
            let rhs = self.mul_expr()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn mul_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.unary_expr()?;
        loop {
            let op = match self.cur().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                _ => break,
            };
            self.bump();
            let rhs = self.unary_expr()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn unary_expr(&mut self) -> Result<Expr, ParseError> {
        let op = match self.cur().kind {
            TokenKind::Plus => UnaryOp::Pos,
            TokenKind::Minus => UnaryOp::Neg,
            _ => return self.primary(),
        };
        let token = self.bump();
        let operand = self.unary_expr()?;
        Ok(Expr {
            loc: token.loc.to(operand.loc),
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
        })
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        match self.cur().kind {
            TokenKind::Number => {
                let token = self.bump();
                let value = token.text.parse().unwrap_or(f64::NAN);
                Ok(Expr {
                    kind: ExprKind::Number(value),
                    loc: token.loc,
                })
            }
            TokenKind::Str => {
                let token = self.bump();
                Ok(Expr {
                    kind: ExprKind::Str(token.text),
                    loc: token.loc,
                })
            }
            TokenKind::Name => {
                if self.la(1).kind == TokenKind::LParen {
                    return self.call();
                }
                let token = self.bump();
                Ok(Expr {
                    kind: ExprKind::Var(token.text),
                    loc: token.loc,
                })
            }
            TokenKind::LParen => {
                self.bump();
                let expr = self.expression()?;
                self.expect(TokenKind::RParen, "`)`")?;
                Ok(expr)
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn call(&mut self) -> Result<Expr, ParseError> {
        let name = self.bump();
        self.bump(); // `(`
        let mut args = Vec::new();
        if !self.at(TokenKind::RParen) {
            args.push(self.argument()?);
            while self.at(TokenKind::Comma) {
                self.bump();
                args.push(self.argument()?);
            }
        }
        let close = self.expect(TokenKind::RParen, "`)`")?;
        Ok(Expr {
            loc: name.loc.to(close.loc),
            kind: ExprKind::Call {
                name: name.text,
                args,
            },
        })
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr {
        loc: lhs.loc.to(rhs.loc),
        kind: ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn commands(source: &str) -> Vec<(String, usize)> {
        parse(source)
            .expect("parse")
            .into_iter()
            .map(|s| match s.kind {
                StmtKind::Command { name, args } => (name, args.len()),
                other => panic!("expected a command, got {other:?}"),
            })
            .collect()
    }

    #[test]
    fn juxtaposed_commands_split_on_the_letter() {
        assert_eq!(
            commands("M0,0 L1,2 3,4 Z"),
            vec![
                ("M".to_string(), 2),
                ("L".to_string(), 4),
                ("Z".to_string(), 0),
            ]
        );
    }

    #[test]
    fn bare_names_after_a_comma_stay_arguments() {
        assert_eq!(
            commands("M a,b M c,d"),
            vec![("M".to_string(), 2), ("M".to_string(), 2)]
        );
    }

    #[test]
    fn lone_name_argument_is_allowed() {
        assert_eq!(
            commands("H x V y"),
            vec![("H".to_string(), 1), ("V".to_string(), 1)]
        );
    }

    #[test]
    fn path_letter_before_an_argument_starts_a_command() {
        assert_eq!(
            commands("Z M 0,0"),
            vec![("Z".to_string(), 0), ("M".to_string(), 2)]
        );
    }

    #[test]
    fn calls_are_arguments_not_commands() {
        assert_eq!(commands("M cos(0), sin(0)"), vec![("M".to_string(), 2)]);
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let ast = parse("M 2 + 3 * 4, 0").expect("parse");
        let StmtKind::Command { args, .. } = &ast[0].kind else {
            panic!("expected a command");
        };
        let Arg::Expr(first) = &args[0] else {
            panic!("expected an expression");
        };
        let ExprKind::Binary { op, rhs, .. } = &first.kind else {
            panic!("expected a binary expression, got {first:?}");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(
            rhs.kind,
            ExprKind::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn parentheses_override_precedence() {
        let ast = parse("M (2 + 3) * 4, 0").expect("parse");
        let StmtKind::Command { args, .. } = &ast[0].kind else {
            panic!("expected a command");
        };
        let Arg::Expr(first) = &args[0] else {
            panic!("expected an expression");
        };
        assert!(matches!(
            first.kind,
            ExprKind::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn not_binds_looser_than_relational() {
        let ast = parse("if not 1 < 2 { Z }").expect("parse");
        let StmtKind::If { condition, .. } = &ast[0].kind else {
            panic!("expected if");
        };
        let ExprKind::Unary {
            op: UnaryOp::Not,
            operand,
        } = &condition.kind
        else {
            panic!("expected not, got {condition:?}");
        };
        assert!(matches!(
            operand.kind,
            ExprKind::Binary {
                op: BinaryOp::Lt,
                ..
            }
        ));
    }

    #[test]
    fn prop_definitions_with_range_and_default() {
        let ast = parse("prop size (1..10) = 4, tilt;").expect("parse");
        let StmtKind::Prop(defs) = &ast[0].kind else {
            panic!("expected prop");
        };
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name, "size");
        assert!(defs[0].range.is_some());
        assert!(defs[0].default.is_some());
        assert_eq!(defs[1].name, "tilt");
        assert!(defs[1].range.is_none());
        assert!(defs[1].default.is_none());
    }

    #[test]
    fn import_with_and_without_alias() {
        let ast = parse("import \"lib/a.path\" as arrow import \"b.path\"").expect("parse");
        assert!(matches!(
            &ast[0].kind,
            StmtKind::Import { alias: Some(a), .. } if a == "arrow"
        ));
        assert!(matches!(&ast[1].kind, StmtKind::Import { alias: None, .. }));
    }

    #[test]
    fn def_wraps_its_body() {
        let ast = parse("def tick { prop x; M x,0 V 1 }").expect("parse");
        let StmtKind::Def { name, body } = &ast[0].kind else {
            panic!("expected def");
        };
        assert_eq!(name, "tick");
        assert_eq!(body.len(), 3);
    }

    #[test]
    fn keywords_terminate_an_argument_list() {
        let ast = parse("M 0,0 if 1 { Z }").expect("parse");
        assert_eq!(ast.len(), 2);
        assert!(matches!(&ast[1].kind, StmtKind::If { .. }));
    }

    #[test]
    fn default_is_rejected_in_plain_expressions() {
        let err = parse("set x = default").expect_err("must fail");
        assert_eq!(
            err,
            ParseError::UnexpectedToken {
                expected: "an expression".to_string(),
                found: "`default`".to_string(),
                line: 1,
                column: 9,
                file: None,
            }
        );
    }

    #[test]
    fn unclosed_block_reports_eof() {
        let err = parse("for i in 1..2 { M i,0").expect_err("must fail");
        assert!(matches!(err, ParseError::UnexpectedEof { .. }));
        assert_eq!(err.position(), (1, 22));
    }

    #[test]
    fn stray_operator_is_a_syntax_error() {
        let err = parse("M 0,0 )").expect_err("must fail");
        assert_eq!(err.position(), (1, 7));
    }

    #[test]
    fn command_span_ends_at_the_last_argument() {
        let ast = parse("L 1,2 3").expect("parse");
        assert_eq!(ast[0].loc.first_column, 1);
        assert_eq!(ast[0].loc.last_column, 8);
    }
}
