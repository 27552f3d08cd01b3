//! Recursive-descent parser (A2): token stream → [`Program`].
//!
//! One function per grammar production, precedence climbing for binary
//! operators (low to high: `||`, `&&`, `== !=`, `< > <= >=`, `+ -`, `* / %`,
//! unary `- !`, postfix call/index/member/`::`).

use crate::ast::*;
use crate::error::{EarlError, EarlResult};
use crate::token::{SourceLoc, Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse_program(mut self) -> EarlResult<Program> {
        let mut stmts = Vec::new();
        while !self.at_eof() {
            stmts.push(self.parse_stmt()?);
        }
        Ok(Program { stmts })
    }

    // -- token plumbing -----------------------------------------------------

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn loc(&self) -> SourceLoc {
        self.peek().loc
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.peek_kind()) == std::mem::discriminant(kind)
    }

    fn eat(&mut self, kind: &TokenKind) -> EarlResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(EarlError::syntax(
                format!("expected {kind}, found {}", self.peek_kind()),
                self.loc(),
            ))
        }
    }

    fn matches(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> EarlResult<String> {
        match self.peek().kind.clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(EarlError::syntax(format!("expected identifier, found {other}"), self.loc())),
        }
    }

    // -- attributes / params --------------------------------------------------

    fn parse_attrs(&mut self) -> Attrs {
        let mut attrs = Attrs::default();
        while self.matches(&TokenKind::At) {
            match self.peek().kind.clone() {
                TokenKind::Ref => {
                    self.advance();
                    attrs.is_ref = true;
                }
                TokenKind::Mut => {
                    self.advance();
                    attrs.is_mut = true;
                }
                TokenKind::Const => {
                    self.advance();
                    attrs.is_const = true;
                }
                TokenKind::World => {
                    self.advance();
                    attrs.is_world = true;
                }
                TokenKind::Pub => {
                    self.advance();
                    attrs.is_pub = true;
                }
                _ => {
                    // tolerate an unknown attribute name rather than hard-failing
                    self.advance();
                }
            }
        }
        attrs
    }

    fn parse_params(&mut self) -> EarlResult<Vec<Param>> {
        self.eat(&TokenKind::LParen)?;
        let mut params = Vec::new();
        while !self.check(&TokenKind::RParen) {
            let loc = self.loc();
            let attrs = self.parse_attrs();
            let name = self.ident()?;
            params.push(Param { name, attrs, loc });
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        self.eat(&TokenKind::RParen)?;
        Ok(params)
    }

    fn parse_args(&mut self) -> EarlResult<Vec<Expr>> {
        self.eat(&TokenKind::LParen)?;
        let mut args = Vec::new();
        while !self.check(&TokenKind::RParen) {
            args.push(self.parse_expr()?);
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        self.eat(&TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_block(&mut self) -> EarlResult<Vec<Stmt>> {
        self.eat(&TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            stmts.push(self.parse_stmt()?);
        }
        self.eat(&TokenKind::RBrace)?;
        Ok(stmts)
    }

    // -- statements -----------------------------------------------------------

    /// `@attr1 @attr2 ... def` and `@attr1 @attr2 ... let` share the same
    /// leading `@`-token shape; peek past the attribute run to see which
    /// keyword actually follows before committing to a parse function.
    fn attrs_precede_def(&self) -> bool {
        let mut i = self.pos;
        while let Some(tok) = self.tokens.get(i) {
            if matches!(tok.kind, TokenKind::At) {
                i += 2;
            } else {
                return matches!(tok.kind, TokenKind::Def);
            }
        }
        false
    }

    fn parse_stmt(&mut self) -> EarlResult<Stmt> {
        match self.peek_kind().clone() {
            TokenKind::At => {
                if self.attrs_precede_def() {
                    self.parse_def()
                } else {
                    self.parse_let()
                }
            }
            TokenKind::Let => self.parse_let(),
            TokenKind::Def => self.parse_def(),
            TokenKind::Class => self.parse_class(),
            TokenKind::Import => self.parse_import(),
            TokenKind::Module => self.parse_module(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Foreach => self.parse_foreach(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Break => {
                let loc = self.loc();
                self.advance();
                self.eat(&TokenKind::Semi)?;
                Ok(Stmt::Break(loc))
            }
            TokenKind::Continue => {
                let loc = self.loc();
                self.advance();
                self.eat(&TokenKind::Semi)?;
                Ok(Stmt::Continue(loc))
            }
            TokenKind::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            _ => self.parse_expr_or_assign_stmt(),
        }
    }

    fn parse_let(&mut self) -> EarlResult<Stmt> {
        let loc = self.loc();
        let attrs = self.parse_attrs();
        self.eat(&TokenKind::Let)?;
        let name = self.ident()?;
        self.eat(&TokenKind::Eq)?;
        let value = self.parse_expr()?;
        self.eat(&TokenKind::Semi)?;
        Ok(Stmt::Let { name, attrs, value, loc })
    }

    fn parse_def(&mut self) -> EarlResult<Stmt> {
        let loc = self.loc();
        let attrs = self.parse_attrs();
        self.eat(&TokenKind::Def)?;
        let name = self.ident()?;
        let params = self.parse_params()?;
        let body = self.parse_block()?;
        Ok(Stmt::Def { name, attrs, params, body, loc })
    }

    fn parse_class(&mut self) -> EarlResult<Stmt> {
        let loc = self.loc();
        self.eat(&TokenKind::Class)?;
        let name = self.ident()?;
        let ctor_params = self.parse_params()?;
        self.eat(&TokenKind::LBrace)?;
        let mut members = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            members.push(self.parse_stmt()?);
        }
        self.eat(&TokenKind::RBrace)?;
        Ok(Stmt::Class { name, ctor_params, members, loc })
    }

    fn parse_import(&mut self) -> EarlResult<Stmt> {
        let loc = self.loc();
        self.eat(&TokenKind::Import)?;
        let path = match self.advance().kind {
            TokenKind::Str(s) => s,
            other => return Err(EarlError::syntax(format!("expected string path, found {other}"), loc)),
        };
        let alias = if self.matches(&TokenKind::As) {
            Some(self.ident()?)
        } else {
            None
        };
        self.eat(&TokenKind::Semi)?;
        Ok(Stmt::Import { path, alias, loc })
    }

    fn parse_module(&mut self) -> EarlResult<Stmt> {
        let loc = self.loc();
        self.eat(&TokenKind::Module)?;
        let name = self.ident()?;
        self.eat(&TokenKind::Semi)?;
        Ok(Stmt::Module { name, loc })
    }

    fn parse_if(&mut self) -> EarlResult<Stmt> {
        let loc = self.loc();
        self.eat(&TokenKind::If)?;
        let cond = self.parse_expr()?;
        let then_branch = self.parse_block()?;
        let else_branch = if self.matches(&TokenKind::Else) {
            if self.check(&TokenKind::If) {
                Some(vec![self.parse_if()?])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(Stmt::If { cond, then_branch, else_branch, loc })
    }

    fn parse_while(&mut self) -> EarlResult<Stmt> {
        let loc = self.loc();
        self.eat(&TokenKind::While)?;
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(Stmt::While { cond, body, loc })
    }

    fn parse_foreach(&mut self) -> EarlResult<Stmt> {
        let loc = self.loc();
        self.eat(&TokenKind::Foreach)?;
        let binding = self.ident()?;
        self.eat(&TokenKind::In)?;
        let iterable = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(Stmt::Foreach { binding, iterable, body, loc })
    }

    fn parse_return(&mut self) -> EarlResult<Stmt> {
        let loc = self.loc();
        self.eat(&TokenKind::Return)?;
        let value = if self.check(&TokenKind::Semi) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.eat(&TokenKind::Semi)?;
        Ok(Stmt::Return { value, loc })
    }

    fn parse_expr_or_assign_stmt(&mut self) -> EarlResult<Stmt> {
        let loc = self.loc();
        let expr = self.parse_expr()?;
        let op = match self.peek_kind() {
            TokenKind::Eq => Some(MutOp::Assign),
            TokenKind::PlusEq => Some(MutOp::AddAssign),
            TokenKind::MinusEq => Some(MutOp::SubAssign),
            TokenKind::StarEq => Some(MutOp::MulAssign),
            TokenKind::SlashEq => Some(MutOp::DivAssign),
            TokenKind::PercentEq => Some(MutOp::ModAssign),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let value = self.parse_expr()?;
            self.eat(&TokenKind::Semi)?;
            Ok(Stmt::Assign { target: expr, op, value, loc })
        } else {
            self.eat(&TokenKind::Semi)?;
            Ok(Stmt::Expr(expr))
        }
    }

    // -- expressions: precedence climbing ------------------------------------

    fn parse_expr(&mut self) -> EarlResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> EarlResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.check(&TokenKind::OrOr) {
            let loc = self.loc();
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary { op: BinOp::Or, lhs: Box::new(lhs), rhs: Box::new(rhs), loc };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> EarlResult<Expr> {
        let mut lhs = self.parse_equality()?;
        while self.check(&TokenKind::AndAnd) {
            let loc = self.loc();
            self.advance();
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary { op: BinOp::And, lhs: Box::new(lhs), rhs: Box::new(rhs), loc };
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> EarlResult<Expr> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::EqEq => BinOp::Eq,
                TokenKind::BangEq => BinOp::Ne,
                _ => break,
            };
            let loc = self.loc();
            self.advance();
            let rhs = self.parse_relational()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), loc };
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> EarlResult<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::Le => BinOp::Le,
                TokenKind::Ge => BinOp::Ge,
                _ => break,
            };
            let loc = self.loc();
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), loc };
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> EarlResult<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            let loc = self.loc();
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), loc };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> EarlResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            let loc = self.loc();
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), loc };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> EarlResult<Expr> {
        let loc = self.loc();
        match self.peek_kind() {
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::Unary { op: UnaryOp::Neg, operand: Box::new(operand), loc })
            }
            TokenKind::Bang => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::Unary { op: UnaryOp::Not, operand: Box::new(operand), loc })
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> EarlResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            let loc = self.loc();
            match self.peek_kind() {
                TokenKind::LParen => {
                    let args = self.parse_args()?;
                    expr = Expr::Call { callee: Box::new(expr), args, loc };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.eat(&TokenKind::RBracket)?;
                    expr = Expr::Index { base: Box::new(expr), index: Box::new(index), loc };
                }
                TokenKind::Dot => {
                    self.advance();
                    let name = self.ident()?;
                    expr = Expr::Member { base: Box::new(expr), name, loc };
                }
                TokenKind::ColonColon => {
                    self.advance();
                    let member = self.ident()?;
                    if let Expr::Ident(module, _) = expr {
                        expr = Expr::ModuleAccess { module, name: member, loc };
                    } else {
                        return Err(EarlError::syntax("`::` may only follow a module name", loc));
                    }
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> EarlResult<Expr> {
        let loc = self.loc();
        match self.peek().kind.clone() {
            TokenKind::Int(v) => {
                self.advance();
                Ok(Expr::Int(v, loc))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Str(s, loc))
            }
            TokenKind::Char(c) => {
                self.advance();
                Ok(Expr::Char(c, loc))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Bool(true, loc))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Bool(false, loc))
            }
            TokenKind::NoneLit => {
                self.advance();
                Ok(Expr::NoneLit(loc))
            }
            TokenKind::Some_ => {
                self.advance();
                self.eat(&TokenKind::LParen)?;
                let inner = self.parse_expr()?;
                self.eat(&TokenKind::RParen)?;
                Ok(Expr::SomeLit(Box::new(inner), loc))
            }
            TokenKind::Ident(name) => {
                self.advance();
                if name == "new" && self.check(&TokenKind::Ident(String::new())) {
                    // `new ClassName(args)` — constructor call syntax
                    let class_name = self.ident()?;
                    let args = self.parse_args()?;
                    return Ok(Expr::ClassInit { class_name, args, loc });
                }
                Ok(Expr::Ident(name, loc))
            }
            TokenKind::Def => {
                self.advance();
                let params = self.parse_params()?;
                let body = self.parse_block()?;
                Ok(Expr::ClosureLit { params, body, loc })
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                while !self.check(&TokenKind::RBracket) {
                    items.push(self.parse_expr()?);
                    if !self.matches(&TokenKind::Comma) {
                        break;
                    }
                }
                self.eat(&TokenKind::RBracket)?;
                Ok(Expr::ListLit(items, loc))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.eat(&TokenKind::RParen)?;
                Ok(inner)
            }
            other => Err(EarlError::syntax(format!("unexpected token {other}"), loc)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(src: &str) -> Program {
        let tokens = Lexer::new(src).tokenize().unwrap();
        Parser::new(tokens).parse_program().unwrap()
    }

    #[test]
    fn parses_let_with_attrs() {
        let prog = parse("@mut let x = 1 + 2 * 3;");
        assert_eq!(prog.stmts.len(), 1);
        match &prog.stmts[0] {
            Stmt::Let { attrs, value, .. } => {
                assert!(attrs.is_mut);
                match value {
                    Expr::Binary { op: BinOp::Add, rhs, .. } => {
                        assert!(matches!(**rhs, Expr::Binary { op: BinOp::Mul, .. }));
                    }
                    other => panic!("expected addition at top, got {other:?}"),
                }
            }
            other => panic!("expected let, got {other:?}"),
        }
    }

    #[test]
    fn parses_if_else_chain() {
        let prog = parse("if true { let x = 1; } else if false { let y = 2; } else { let z = 3; }");
        assert_eq!(prog.stmts.len(), 1);
        assert!(matches!(&prog.stmts[0], Stmt::If { else_branch: Some(_), .. }));
    }

    #[test]
    fn parses_index_and_call_postfix_chain() {
        let prog = parse("let x = a[0].foo();");
        match &prog.stmts[0] {
            Stmt::Let { value: Expr::Call { callee, .. }, .. } => {
                assert!(matches!(**callee, Expr::Member { .. }));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn compound_assignment_parses_as_assign_stmt() {
        let prog = parse("x += 1;");
        assert!(matches!(&prog.stmts[0], Stmt::Assign { op: MutOp::AddAssign, .. }));
    }

    #[test]
    fn world_attr_on_def_is_distinguished_from_let() {
        let prog = parse("@world def bump() { x += 1; }");
        match &prog.stmts[0] {
            Stmt::Def { attrs, name, .. } => {
                assert!(attrs.is_world);
                assert_eq!(name, "bump");
            }
            other => panic!("expected def, got {other:?}"),
        }
    }

    #[test]
    fn module_access_requires_identifier_lhs() {
        let tokens = Lexer::new("1::x;").tokenize().unwrap();
        assert!(Parser::new(tokens).parse_program().is_err());
    }
}
