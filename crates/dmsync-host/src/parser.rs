//! Recursive-descent parser for the DM-script subset the host runs.
//!
//! Method syntax `tg.TagGroupCountTags()` is sugar for a call with the
//! receiver as first argument and is desugared here.

use crate::lexer::{tokenize, Tok, Token};
use crate::{Error, Result};

// ── AST ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeclType {
    Number,
    String,
    TagGroup,
}

impl DeclType {
    fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "number" => Some(DeclType::Number),
            "string" => Some(DeclType::String),
            "taggroup" => Some(DeclType::TagGroup),
            _ => None,
        }
    }

    pub(crate) fn keyword(self) -> &'static str {
        match self {
            DeclType::Number => "number",
            DeclType::String => "string",
            DeclType::TagGroup => "TagGroup",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Number(f64),
    Str(String),
    Var(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    /// Plain assignment when the operator is `None`.
    Assign(String, Option<BinOp>, Box<Expr>),
    /// `++`/`--`; `prefix` selects whether the new value is the result.
    Step {
        name: String,
        delta: f64,
        prefix: bool,
    },
    Call(String, Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Stmt {
    pub line: usize,
    pub kind: StmtKind,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StmtKind {
    Decl(DeclType, Vec<(String, Option<Expr>)>),
    Expr(Expr),
    If(Expr, Box<Stmt>, Option<Box<Stmt>>),
    While(Expr, Box<Stmt>),
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
    },
    Block(Vec<Stmt>),
    Try(Box<Stmt>, Box<Stmt>),
    Break,
    Continue,
    Empty,
}

// ── Parser ────────────────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Tok {
        self.tokens.get(self.pos).map_or(&Tok::Eof, |t| &t.tok)
    }

    fn peek_at(&self, offset: usize) -> &Tok {
        self.tokens.get(self.pos + offset).map_or(&Tok::Eof, |t| &t.tok)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn advance(&mut self) -> Tok {
        let tok = self.peek().clone();
        self.pos += 1;
        tok
    }

    fn eat(&mut self, expected: &Tok) -> bool {
        if self.peek() == expected {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Tok, what: &str) -> Result<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected {what}, found {:?}", self.peek())))
        }
    }

    fn ident(&mut self, what: &str) -> Result<String> {
        match self.advance() {
            Tok::Ident(name) => Ok(name),
            other => {
                self.pos -= 1;
                Err(self.error(format!("expected {what}, found {other:?}")))
            }
        }
    }

    fn keyword(&self) -> Option<String> {
        match self.peek() {
            Tok::Ident(word) => Some(word.clone()),
            _ => None,
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Syntax {
            line: self.line(),
            message: message.into(),
        }
    }

    // ── Statements ────────────────────────────────────────────────────────────

    fn parse_program(&mut self) -> Result<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while self.peek() != &Tok::Eof {
            stmts.push(self.parse_stmt()?);
        }
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        let line = self.line();
        let kind = match self.keyword().as_deref() {
            Some("if") => {
                self.pos += 1;
                let cond = self.parse_condition()?;
                let then = Box::new(self.parse_stmt()?);
                let otherwise = if self.keyword().as_deref() == Some("else") {
                    self.pos += 1;
                    Some(Box::new(self.parse_stmt()?))
                } else {
                    None
                };
                StmtKind::If(cond, then, otherwise)
            }
            Some("while") => {
                self.pos += 1;
                let cond = self.parse_condition()?;
                StmtKind::While(cond, Box::new(self.parse_stmt()?))
            }
            Some("for") => {
                self.pos += 1;
                self.parse_for()?
            }
            Some("try") => {
                self.pos += 1;
                let body = Box::new(self.parse_block_stmt()?);
                if self.keyword().as_deref() != Some("catch") {
                    return Err(self.error("expected catch after try block"));
                }
                self.pos += 1;
                StmtKind::Try(body, Box::new(self.parse_block_stmt()?))
            }
            Some("break") => {
                self.pos += 1;
                self.expect(&Tok::Semi, "';'")?;
                StmtKind::Break
            }
            Some("continue") => {
                self.pos += 1;
                self.expect(&Tok::Semi, "';'")?;
                StmtKind::Continue
            }
            Some(word) if DeclType::from_keyword(word).is_some() => {
                let kind = self.parse_decl()?;
                self.expect(&Tok::Semi, "';'")?;
                kind
            }
            _ => match self.peek() {
                Tok::LBrace => return self.parse_block_stmt(),
                Tok::Semi => {
                    self.pos += 1;
                    StmtKind::Empty
                }
                _ => {
                    let expr = self.parse_expr()?;
                    self.expect(&Tok::Semi, "';'")?;
                    StmtKind::Expr(expr)
                }
            },
        };
        Ok(Stmt { line, kind })
    }

    fn parse_block_stmt(&mut self) -> Result<Stmt> {
        let line = self.line();
        self.expect(&Tok::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        while !self.eat(&Tok::RBrace) {
            if self.peek() == &Tok::Eof {
                return Err(Error::Syntax {
                    line,
                    message: "unterminated block".into(),
                });
            }
            stmts.push(self.parse_stmt()?);
        }
        Ok(Stmt {
            line,
            kind: StmtKind::Block(stmts),
        })
    }

    fn parse_condition(&mut self) -> Result<Expr> {
        self.expect(&Tok::LParen, "'('")?;
        let cond = self.parse_expr()?;
        self.expect(&Tok::RParen, "')'")?;
        Ok(cond)
    }

    fn parse_decl(&mut self) -> Result<StmtKind> {
        let word = self.ident("type")?;
        let ty = DeclType::from_keyword(&word)
            .ok_or_else(|| self.error(format!("unknown type {word}")))?;
        let mut vars = Vec::new();
        loop {
            let name = self.ident("variable name")?;
            let init = if self.eat(&Tok::Assign) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            vars.push((name, init));
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        Ok(StmtKind::Decl(ty, vars))
    }

    fn parse_for(&mut self) -> Result<StmtKind> {
        self.expect(&Tok::LParen, "'('")?;
        let init = if self.eat(&Tok::Semi) {
            None
        } else {
            let line = self.line();
            let kind = match self.keyword().as_deref() {
                Some(word) if DeclType::from_keyword(word).is_some() => self.parse_decl()?,
                _ => StmtKind::Expr(self.parse_expr()?),
            };
            self.expect(&Tok::Semi, "';'")?;
            Some(Box::new(Stmt { line, kind }))
        };
        let cond = if self.peek() == &Tok::Semi {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(&Tok::Semi, "';'")?;
        let step = if self.peek() == &Tok::RParen {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(&Tok::RParen, "')'")?;
        let body = Box::new(self.parse_stmt()?);
        Ok(StmtKind::For {
            init,
            cond,
            step,
            body,
        })
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_assign()
    }

    fn parse_assign(&mut self) -> Result<Expr> {
        if let Tok::Ident(name) = self.peek().clone() {
            let op = match self.peek_at(1) {
                Tok::Assign => Some(None),
                Tok::PlusAssign => Some(Some(BinOp::Add)),
                Tok::MinusAssign => Some(Some(BinOp::Sub)),
                Tok::StarAssign => Some(Some(BinOp::Mul)),
                Tok::SlashAssign => Some(Some(BinOp::Div)),
                _ => None,
            };
            if let Some(op) = op {
                self.pos += 2;
                let rhs = self.parse_assign()?;
                return Ok(Expr::Assign(name, op, Box::new(rhs)));
            }
        }
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Result<Expr> {
        let cond = self.parse_or()?;
        if self.eat(&Tok::Question) {
            let then = self.parse_assign()?;
            self.expect(&Tok::Colon, "':' in conditional")?;
            let otherwise = self.parse_ternary()?;
            Ok(Expr::Ternary(
                Box::new(cond),
                Box::new(then),
                Box::new(otherwise),
            ))
        } else {
            Ok(cond)
        }
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Tok::OrOr) {
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_equality()?;
        while self.eat(&Tok::AndAnd) {
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Tok::Eq => BinOp::Eq,
                Tok::Ne => BinOp::Ne,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_relational()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_relational(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Tok::Lt => BinOp::Lt,
                Tok::Le => BinOp::Le,
                Tok::Gt => BinOp::Gt,
                Tok::Ge => BinOp::Ge,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Tok::Plus => BinOp::Add,
                Tok::Minus => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Tok::Star => BinOp::Mul,
                Tok::Slash => BinOp::Div,
                Tok::Percent => BinOp::Rem,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        match self.peek() {
            Tok::Minus => {
                self.pos += 1;
                Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.parse_unary()?)))
            }
            Tok::Plus => {
                self.pos += 1;
                self.parse_unary()
            }
            Tok::Bang => {
                self.pos += 1;
                Ok(Expr::Unary(UnaryOp::Not, Box::new(self.parse_unary()?)))
            }
            Tok::PlusPlus | Tok::MinusMinus => {
                let delta = if self.advance() == Tok::PlusPlus { 1.0 } else { -1.0 };
                let name = self.ident("variable after increment")?;
                Ok(Expr::Step {
                    name,
                    delta,
                    prefix: true,
                })
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Tok::Dot => {
                    self.pos += 1;
                    let name = self.ident("method name")?;
                    self.expect(&Tok::LParen, "'(' after method name")?;
                    let mut args = vec![expr];
                    args.extend(self.parse_args(&name)?);
                    expr = Expr::Call(name, args);
                }
                Tok::PlusPlus | Tok::MinusMinus => {
                    let Expr::Var(name) = expr else {
                        return Err(self.error("increment needs a variable"));
                    };
                    let delta = if self.advance() == Tok::PlusPlus { 1.0 } else { -1.0 };
                    expr = Expr::Step {
                        name,
                        delta,
                        prefix: false,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Arguments after an opening parenthesis, consuming the closing one.
    fn parse_args(&mut self, name: &str) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if self.peek() != &Tok::RParen {
            args.push(self.parse_expr()?);
            while self.eat(&Tok::Comma) {
                args.push(self.parse_expr()?);
            }
        }
        self.expect(&Tok::RParen, &format!("')' after arguments to {name}"))?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.advance() {
            Tok::Number(x) => Ok(Expr::Number(x)),
            Tok::Str(s) => Ok(Expr::Str(s)),
            Tok::Ident(name) => {
                if self.eat(&Tok::LParen) {
                    let args = self.parse_args(&name)?;
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Var(name))
                }
            }
            Tok::LParen => {
                let inner = self.parse_expr()?;
                self.expect(&Tok::RParen, "')'")?;
                Ok(inner)
            }
            other => {
                self.pos -= 1;
                Err(self.error(format!("unexpected token {other:?}")))
            }
        }
    }
}

/// Parse a whole script into statements.
pub(crate) fn parse(src: &str) -> Result<Vec<Stmt>> {
    let tokens = tokenize(src)?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(src: &str) -> Expr {
        let stmts = parse(&format!("{src};")).unwrap();
        match stmts.into_iter().next().unwrap().kind {
            StmtKind::Expr(e) => e,
            other => panic!("not an expression: {other:?}"),
        }
    }

    #[test]
    fn multiplication_binds_tighter() {
        assert_eq!(
            expr("a + b * 2"),
            Expr::Binary(
                BinOp::Add,
                Box::new(Expr::Var("a".into())),
                Box::new(Expr::Binary(
                    BinOp::Mul,
                    Box::new(Expr::Var("b".into())),
                    Box::new(Expr::Number(2.0))
                ))
            )
        );
    }

    #[test]
    fn method_calls_pass_the_receiver_first() {
        assert_eq!(
            expr("tg.TagGroupSetTagAsLong(\"a\", 1)"),
            Expr::Call(
                "taggroupsettagaslong".into(),
                vec![
                    Expr::Var("tg".into()),
                    Expr::Str("a".into()),
                    Expr::Number(1.0)
                ]
            )
        );
    }

    #[test]
    fn declarations_take_lists() {
        let stmts = parse("number a = 1, b;\nTagGroup tg = NewTagGroup();").unwrap();
        assert_eq!(stmts.len(), 2);
        match &stmts[0].kind {
            StmtKind::Decl(DeclType::Number, vars) => {
                assert_eq!(vars.len(), 2);
                assert_eq!(vars[1], ("b".to_string(), None));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(stmts[1].line, 2);
        assert!(matches!(stmts[1].kind, StmtKind::Decl(DeclType::TagGroup, _)));
    }

    #[test]
    fn control_flow_parses() {
        let stmts = parse(
            "for (number i = 0; i < 3; i++) { if (i == 1) continue; else break; }\n\
             while (0) ;\n\
             try { Throw(\"x\"); } catch { break; }",
        )
        .unwrap();
        assert!(matches!(stmts[0].kind, StmtKind::For { .. }));
        assert!(matches!(stmts[1].kind, StmtKind::While(..)));
        assert!(matches!(stmts[2].kind, StmtKind::Try(..)));
    }

    #[test]
    fn missing_semicolon_reports_line() {
        let err = parse("number a = 1;\nnumber b = 2\nnumber c;").unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 3, .. }), "{err}");
    }
}
