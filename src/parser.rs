use std::rc::Rc;

use tracing::debug;

use crate::ast::{
    BinaryOp, ClassDecl, Expr, FunctionDecl, Literal, LogicalOp, Name, Stmt, UnaryOp,
};
use crate::diag::{Location, SyntaxError, SyntaxErrorKind};
use crate::stack::ensure_sufficient_stack;
use crate::token::{Token, TokenKind};

const MAX_ARGS: usize = 255;

type ParseResult<T> = Result<T, SyntaxError>;

/// Output of a parse: the recovered program and every syntax error met on the way.
///
/// A top-level declaration that had to be discarded leaves a `None` hole in `program` so that
/// statement positions still line up with the source.
#[derive(Debug, Default)]
pub struct Parsed {
    pub program: Vec<Option<Stmt>>,
    pub errors: Vec<SyntaxError>,
}

impl Parsed {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
enum FunctionKind {
    Function,
    Method,
}

impl FunctionKind {
    fn name(self) -> &'static str {
        match self {
            FunctionKind::Function => "function name",
            FunctionKind::Method => "method name",
        }
    }

    fn paren(self) -> &'static str {
        match self {
            FunctionKind::Function => "'(' after function name",
            FunctionKind::Method => "'(' after method name",
        }
    }

    fn body(self) -> &'static str {
        match self {
            FunctionKind::Function => "'{' before function body",
            FunctionKind::Method => "'{' before method body",
        }
    }
}

#[derive(Debug)]
struct ClassScope {
    has_superclass: bool,
}

/// Recursive descent parser with panic-mode error recovery.
#[derive(Debug)]
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    errors: Vec<SyntaxError>,
    function_depth: usize,
    classes: Vec<ClassScope>,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Parser {
        if !tokens.last().is_some_and(Token::is_eof) {
            let line = tokens.last().map_or(1, |t| t.line);
            tokens.push(Token::eof(line));
        }
        Parser {
            tokens,
            current: 0,
            errors: vec![],
            function_depth: 0,
            classes: vec![],
        }
    }

    pub fn parse_program(mut self) -> Parsed {
        let mut program = vec![];
        while !self.is_at_end() {
            program.push(self.declaration());
        }
        Parsed {
            program,
            errors: self.errors,
        }
    }

    #[cfg(test)]
    fn parse_expression(&mut self) -> ParseResult<Expr> {
        self.expression()
    }

    /// Parse one declaration, recovering at the next statement boundary on error.
    fn declaration(&mut self) -> Option<Stmt> {
        let stmt = match self.peek().kind {
            TokenKind::Var => {
                self.advance();
                self.var_decl()
            }
            TokenKind::Fun => {
                self.advance();
                self.function(FunctionKind::Function).map(Stmt::Function)
            }
            TokenKind::Class => {
                self.advance();
                self.class_decl()
            }
            _ => self.statement(),
        };
        match stmt {
            Ok(stmt) => Some(stmt),
            Err(e) => {
                debug!(line = e.line, error = %e.kind, "recovering from syntax error");
                self.errors.push(e);
                self.synchronize();
                None
            }
        }
    }

    /// Parse variable declaration.
    /// `var` has been consumed.
    fn var_decl(&mut self) -> ParseResult<Stmt> {
        let name = self.identifier("variable name")?;
        let init = if self.matches(&TokenKind::Equal) {
            Some(Box::new(self.expression()?))
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "';' after variable declaration")?;
        Ok(Stmt::Var(name, init))
    }

    fn function(&mut self, kind: FunctionKind) -> ParseResult<Rc<FunctionDecl>> {
        let name = self.identifier(kind.name())?;
        self.consume(TokenKind::LeftParen, kind.paren())?;
        let mut params = vec![];
        if !self.check(&TokenKind::RightParen) {
            loop {
                if params.len() >= MAX_ARGS {
                    self.report_at_peek(SyntaxErrorKind::TooMany {
                        what: "parameters",
                        max: MAX_ARGS,
                    });
                }
                params.push(self.identifier("parameter name")?);
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "')' after parameters")?;
        self.consume(TokenKind::LeftCurly, kind.body())?;

        self.function_depth += 1;
        let body = self.block();
        self.function_depth -= 1;

        Ok(Rc::new(FunctionDecl {
            name,
            params,
            body: body?,
        }))
    }

    /// `class` has been consumed.
    fn class_decl(&mut self) -> ParseResult<Stmt> {
        let name = self.identifier("class name")?;
        let superclass = if self.matches(&TokenKind::Less) {
            let superclass = self.identifier("superclass name")?;
            if superclass.sym == name.sym {
                let e = Self::error_at(self.previous(), SyntaxErrorKind::InheritsFromItself);
                self.errors.push(e);
            }
            Some(superclass)
        } else {
            None
        };
        self.consume(TokenKind::LeftCurly, "'{' before class body")?;

        self.classes.push(ClassScope {
            has_superclass: superclass.is_some(),
        });
        let methods = self.methods();
        self.classes.pop();

        Ok(Stmt::Class(ClassDecl {
            name,
            superclass,
            methods: methods?,
        }))
    }

    fn methods(&mut self) -> ParseResult<Vec<Rc<FunctionDecl>>> {
        let mut methods = vec![];
        while !self.check(&TokenKind::RightCurly) && !self.is_at_end() {
            methods.push(self.function(FunctionKind::Method)?);
        }
        self.consume(TokenKind::RightCurly, "'}' after class body")?;
        Ok(methods)
    }

    fn identifier(&mut self, what: &'static str) -> ParseResult<Name> {
        if let TokenKind::Identifier(sym) = &self.peek().kind {
            let name = Name {
                sym: sym.clone(),
                line: self.peek().line,
            };
            self.advance();
            Ok(name)
        } else {
            Err(Self::error_at(self.peek(), SyntaxErrorKind::Expected(what)))
        }
    }

    fn statement(&mut self) -> ParseResult<Stmt> {
        ensure_sufficient_stack(|| self.statement_at_peek())
    }

    fn statement_at_peek(&mut self) -> ParseResult<Stmt> {
        match self.peek().kind {
            TokenKind::Print => {
                let line = self.advance().line;
                let expr = Box::new(self.expression()?);
                self.consume(TokenKind::Semicolon, "';' after value")?;
                Ok(Stmt::Print(line, expr))
            }
            TokenKind::LeftCurly => {
                self.advance();
                Ok(Stmt::Block(self.block()?))
            }
            TokenKind::If => {
                self.advance();
                self.consume(TokenKind::LeftParen, "'(' after 'if'")?;
                let cond = Box::new(self.expression()?);
                self.consume(TokenKind::RightParen, "')' after if condition")?;
                let then_branch = Box::new(self.statement()?);
                let else_branch = if self.matches(&TokenKind::Else) {
                    Some(Box::new(self.statement()?))
                } else {
                    None
                };
                Ok(Stmt::If(cond, then_branch, else_branch))
            }
            TokenKind::While => {
                self.advance();
                self.consume(TokenKind::LeftParen, "'(' after 'while'")?;
                let cond = Box::new(self.expression()?);
                self.consume(TokenKind::RightParen, "')' after condition")?;
                let body = Box::new(self.statement()?);
                Ok(Stmt::While(cond, body))
            }
            TokenKind::For => {
                self.advance();
                self.for_stmt()
            }
            TokenKind::Return => {
                let keyword = self.advance().clone();
                if self.function_depth == 0 {
                    let e = Self::error_at(&keyword, SyntaxErrorKind::ReturnOutsideFunction);
                    self.errors.push(e);
                }
                let value = if self.check(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(Box::new(self.expression()?))
                };
                self.consume(TokenKind::Semicolon, "';' after return value")?;
                Ok(Stmt::Return(value))
            }
            _ => self.expression_stmt(),
        }
    }

    /// `for` has been consumed.  The loop is desugared into a `while` loop.
    fn for_stmt(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenKind::LeftParen, "'(' after 'for'")?;
        let init = match self.peek().kind {
            TokenKind::Semicolon => {
                self.advance();
                None
            }
            TokenKind::Var => {
                self.advance();
                Some(self.var_decl()?)
            }
            _ => Some(self.expression_stmt()?),
        };
        let cond = if self.check(&TokenKind::Semicolon) {
            Expr::Literal(Literal::Bool(true))
        } else {
            self.expression()?
        };
        self.consume(TokenKind::Semicolon, "';' after loop condition")?;
        let increment = if self.check(&TokenKind::RightParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenKind::RightParen, "')' after for clauses")?;

        let mut body = self.statement()?;
        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expr(Box::new(increment))]);
        }
        body = Stmt::While(Box::new(cond), Box::new(body));
        if let Some(init) = init {
            body = Stmt::Block(vec![init, body]);
        }
        Ok(body)
    }

    fn expression_stmt(&mut self) -> ParseResult<Stmt> {
        let expr = Box::new(self.expression()?);
        self.consume(TokenKind::Semicolon, "';' after expression")?;
        Ok(Stmt::Expr(expr))
    }

    /// `{` has been consumed.
    fn block(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut stmts = vec![];
        while !self.check(&TokenKind::RightCurly) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                stmts.push(stmt);
            }
        }
        self.consume(TokenKind::RightCurly, "'}' after block")?;
        Ok(stmts)
    }

    fn expression(&mut self) -> ParseResult<Expr> {
        ensure_sufficient_stack(|| self.assignment())
    }

    fn assignment(&mut self) -> ParseResult<Expr> {
        let lhs = self.or()?;
        if !self.check(&TokenKind::Equal) {
            return Ok(lhs);
        }
        let equals = self.advance().clone();
        let rhs = Box::new(self.expression()?);
        match lhs {
            Expr::Var(name) => Ok(Expr::Assign(name, rhs)),
            Expr::Get(object, name) => Ok(Expr::Set(object, name, rhs)),
            lhs => {
                // Reported without unwinding: the statement itself is still well formed.
                let e = Self::error_at(&equals, SyntaxErrorKind::InvalidAssignmentTarget);
                self.errors.push(e);
                Ok(lhs)
            }
        }
    }

    fn or(&mut self) -> ParseResult<Expr> {
        let mut expr = self.and()?;
        while self.matches(&TokenKind::Or) {
            expr = Expr::Logical(Box::new(expr), LogicalOp::Or, Box::new(self.and()?));
        }
        Ok(expr)
    }

    fn and(&mut self) -> ParseResult<Expr> {
        let mut expr = self.equality()?;
        while self.matches(&TokenKind::And) {
            expr = Expr::Logical(Box::new(expr), LogicalOp::And, Box::new(self.equality()?));
        }
        Ok(expr)
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        let mut expr = self.comparison()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqualEqual => BinaryOp::Equal,
                TokenKind::BangEqual => BinaryOp::NotEqual,
                _ => break,
            };
            let line = self.advance().line;
            expr = Expr::Binary(Box::new(expr), op, Box::new(self.comparison()?), line);
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let mut expr = self.term()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Less => BinaryOp::Less,
                TokenKind::LessEqual => BinaryOp::LessEqual,
                TokenKind::Greater => BinaryOp::Greater,
                TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
                _ => break,
            };
            let line = self.advance().line;
            expr = Expr::Binary(Box::new(expr), op, Box::new(self.term()?), line);
        }
        Ok(expr)
    }

    fn term(&mut self) -> ParseResult<Expr> {
        let mut expr = self.factor()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            let line = self.advance().line;
            expr = Expr::Binary(Box::new(expr), op, Box::new(self.factor()?), line);
        }
        Ok(expr)
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        let mut expr = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => break,
            };
            let line = self.advance().line;
            expr = Expr::Binary(Box::new(expr), op, Box::new(self.unary()?), line);
        }
        Ok(expr)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOp::Negate,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.call(),
        };
        let line = self.advance().line;
        let operand = ensure_sufficient_stack(|| self.unary())?;
        Ok(Expr::Unary(op, Box::new(operand), line))
    }

    fn call(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            match self.peek().kind {
                TokenKind::LeftParen => {
                    self.advance();
                    expr = self.finish_call(expr)?;
                }
                TokenKind::Dot => {
                    self.advance();
                    let name = self.identifier("property name after '.'")?;
                    expr = Expr::Get(Box::new(expr), name);
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// `(` has been consumed.
    fn finish_call(&mut self, callee: Expr) -> ParseResult<Expr> {
        let mut args = vec![];
        if !self.check(&TokenKind::RightParen) {
            loop {
                if args.len() >= MAX_ARGS {
                    self.report_at_peek(SyntaxErrorKind::TooMany {
                        what: "arguments",
                        max: MAX_ARGS,
                    });
                }
                args.push(self.expression()?);
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
        }
        let line = self.consume(TokenKind::RightParen, "')' after arguments")?.line;
        Ok(Expr::Call(Box::new(callee), args, line))
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let line = self.peek().line;
        let expr = match self.peek().kind.clone() {
            TokenKind::False => Expr::Literal(Literal::Bool(false)),
            TokenKind::True => Expr::Literal(Literal::Bool(true)),
            TokenKind::Nil => Expr::Literal(Literal::Nil),
            TokenKind::Number(n) => Expr::Literal(Literal::Number(n)),
            TokenKind::Str(s) => Expr::Literal(Literal::Str(s)),
            TokenKind::Identifier(sym) => Expr::Var(Name { sym, line }),
            TokenKind::This => {
                if self.classes.is_empty() {
                    self.report_at_peek(SyntaxErrorKind::ThisOutsideClass);
                }
                Expr::This(line)
            }
            TokenKind::Super => {
                let misuse = match self.classes.last() {
                    None => Some(SyntaxErrorKind::SuperOutsideClass),
                    Some(class) if !class.has_superclass => {
                        Some(SyntaxErrorKind::SuperWithoutSuperclass)
                    }
                    Some(_) => None,
                };
                if let Some(kind) = misuse {
                    self.report_at_peek(kind);
                }
                self.advance();
                self.consume(TokenKind::Dot, "'.' after 'super'")?;
                let method = self.identifier("superclass method name")?;
                return Ok(Expr::Super(line, method));
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.consume(TokenKind::RightParen, "')' after expression")?;
                return Ok(Expr::Group(Box::new(expr)));
            }
            _ => {
                return Err(Self::error_at(
                    self.peek(),
                    SyntaxErrorKind::ExpectedExpression,
                ))
            }
        };
        self.advance();
        Ok(expr)
    }

    /// Discard tokens until the start of what is likely the next statement.
    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }
            match self.peek().kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn is_at_end(&self) -> bool {
        self.peek().is_eof()
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek().kind == *kind
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn matches(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, expected: TokenKind, what: &'static str) -> ParseResult<&Token> {
        if self.check(&expected) {
            Ok(self.advance())
        } else {
            Err(Self::error_at(self.peek(), SyntaxErrorKind::Expected(what)))
        }
    }

    /// Record an error at the current token without unwinding.
    fn report_at_peek(&mut self, kind: SyntaxErrorKind) {
        let e = Self::error_at(self.peek(), kind);
        self.errors.push(e);
    }

    fn error_at(token: &Token, kind: SyntaxErrorKind) -> SyntaxError {
        let location = if token.is_eof() {
            Location::End
        } else {
            Location::Lexeme(token.lexeme.clone())
        };
        SyntaxError {
            line: token.line,
            location,
            kind,
        }
    }
}
