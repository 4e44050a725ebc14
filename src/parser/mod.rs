//! Recursive-descent parser with Pratt-style precedence climbing.
//!
//! The parser holds the current and one lookahead token. Each prefix handler
//! consumes its own tokens and leaves the cursor on the first token after the
//! expression; infix handlers do the same for their right-hand side. The
//! climb condition compares the *current* token's precedence against the
//! minimum, using `>=`, which makes every binary operator right-associative
//! (this is what lets assignment chains like `x = y = 5` nest correctly).
//!
//! Errors do not abort parsing: they accumulate in [`Parser::errors`] and the
//! parser keeps going so a single run can report every problem in the file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::ast::{
    ArrayLiteral, AssignExpression, BlockStatement, BooleanLiteral, CallExpression, EchoStatement,
    Expression, ExpressionStatement, FloatLiteral, ForStatement, FunctionLiteral, HashLiteral,
    Identifier, IfExpression, IncludeStatement, IndexExpression, InfixExpression, IntegerLiteral,
    LetStatement, NilLiteral, PostfixExpression, PrefixExpression, Program, ReturnStatement,
    Statement, StringLiteral, WhileStatement,
};
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

/// Binding strength of an operator, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    Lowest,
    Assign,
    Or,
    And,
    Equals,
    LessGreater,
    Sum,
    Product,
    Prefix,
    Postfix,
    Highest,
}

/// A parse error anchored to the token where it was detected.
#[derive(Debug, Clone)]
pub struct ParserError {
    pub token: Token,
    pub message: String,
}

impl fmt::Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

pub struct Parser {
    lexer: Lexer,
    file_path: String,

    pub errors: Vec<ParserError>,

    cur_token: Token,
    peek_token: Token,
}

impl Parser {
    pub fn new(lexer: Lexer, file_path: impl Into<String>) -> Self {
        let mut parser = Self {
            lexer,
            file_path: file_path.into(),
            errors: Vec::new(),
            cur_token: Token::empty(),
            peek_token: Token::empty(),
        };

        parser.next_token();
        parser.next_token();

        parser
    }

    pub fn parse_program(&mut self) -> Program {
        let mut program = Program::default();

        while !self.current_token_is(TokenKind::Eof) {
            if let Some(statement) = self.parse_statement() {
                program.statements.push(statement);
            }
        }

        program
    }

    /// All accumulated errors, formatted as `[file PATH:LINE]: MSG`.
    pub fn report_errors(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| format!("[file {}:{}]: {}", self.file_path, e.token.line, e.message))
            .collect()
    }

    fn next_token(&mut self) {
        self.cur_token = std::mem::replace(&mut self.peek_token, self.lexer.next_token());
    }

    fn precedence_of(kind: TokenKind) -> Precedence {
        match kind {
            TokenKind::Eq | TokenKind::NotEq => Precedence::Equals,
            TokenKind::Assign => Precedence::Assign,
            TokenKind::Lt | TokenKind::Gt | TokenKind::LtEq | TokenKind::GtEq => {
                Precedence::LessGreater
            }
            TokenKind::Plus | TokenKind::Minus => Precedence::Sum,
            TokenKind::Slash | TokenKind::Asterisk | TokenKind::Modulo => Precedence::Product,
            TokenKind::PlusPlus | TokenKind::MinusMinus => Precedence::Postfix,
            TokenKind::And => Precedence::And,
            TokenKind::Or => Precedence::Or,
            TokenKind::LParen | TokenKind::LBracket | TokenKind::Dot => Precedence::Highest,
            _ => Precedence::Lowest,
        }
    }

    fn cur_precedence(&self) -> Precedence {
        Self::precedence_of(self.cur_token.kind)
    }

    fn parse_statement(&mut self) -> Option<Statement> {
        match self.cur_token.kind {
            TokenKind::Let | TokenKind::Const => self.parse_var_statement(),
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::For => self.parse_for_statement(),
            TokenKind::LBrace => self.parse_block_statement().map(Statement::Block),
            TokenKind::Include => self.parse_include_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::Function if self.peek_token_is(TokenKind::Ident) => {
                self.parse_function_statement()
            }
            TokenKind::Echo => self.parse_echo_statement(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_var_statement(&mut self) -> Option<Statement> {
        let token = self.cur_token.clone();
        let constant = token.kind == TokenKind::Const;

        self.next_token();

        let name = Identifier {
            token: self.cur_token.clone(),
            value: self.cur_token.literal.clone(),
        };

        self.expect_current(TokenKind::Ident);
        self.expect_current(TokenKind::Assign);

        let value = self.parse_expression(Precedence::Lowest)?;

        self.expect_current(TokenKind::Semicolon);

        Some(Statement::Let(LetStatement {
            token,
            name,
            value,
            constant,
        }))
    }

    /// `fn name(params) { body }` is sugar for `let name = fn(params) { body };`.
    fn parse_function_statement(&mut self) -> Option<Statement> {
        let token = self.cur_token.clone();

        self.next_token();

        let name = Identifier {
            token: self.cur_token.clone(),
            value: self.cur_token.literal.clone(),
        };

        self.next_token();
        self.expect_current(TokenKind::LParen);

        let parameters = self.parse_function_parameters();
        let body = self.parse_block_statement()?;

        let function = FunctionLiteral {
            token: token.clone(),
            parameters: Rc::new(parameters),
            body: Rc::new(body),
        };

        Some(Statement::Let(LetStatement {
            token,
            name,
            value: Expression::Function(function),
            constant: false,
        }))
    }

    fn parse_return_statement(&mut self) -> Option<Statement> {
        let token = self.cur_token.clone();

        self.next_token();

        let value = if self.current_token_is(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression(Precedence::Lowest)?)
        };

        self.expect_current(TokenKind::Semicolon);

        Some(Statement::Return(ReturnStatement { token, value }))
    }

    fn parse_for_statement(&mut self) -> Option<Statement> {
        let token = self.cur_token.clone();

        self.next_token();
        self.expect_current(TokenKind::LParen);

        let initializer = Box::new(self.parse_statement()?);
        let condition = self.parse_expression(Precedence::Lowest)?;

        self.expect_current(TokenKind::Semicolon);

        let increment = self.parse_expression(Precedence::Lowest)?;

        self.expect_current(TokenKind::RParen);

        let body = Box::new(Statement::Block(self.parse_block_statement()?));

        Some(Statement::For(ForStatement {
            token,
            initializer,
            condition,
            increment,
            body,
        }))
    }

    fn parse_while_statement(&mut self) -> Option<Statement> {
        let token = self.cur_token.clone();

        self.next_token();
        self.expect_current(TokenKind::LParen);

        let condition = self.parse_expression(Precedence::Lowest)?;

        self.expect_current(TokenKind::RParen);

        let body = Box::new(Statement::Block(self.parse_block_statement()?));

        Some(Statement::While(WhileStatement {
            token,
            condition,
            body,
        }))
    }

    fn parse_block_statement(&mut self) -> Option<BlockStatement> {
        let token = self.cur_token.clone();
        let mut statements = Vec::new();

        self.expect_current(TokenKind::LBrace);

        while !self.current_token_is(TokenKind::RBrace) && !self.current_token_is(TokenKind::Eof) {
            if let Some(statement) = self.parse_statement() {
                statements.push(statement);
            }
        }

        self.expect_current(TokenKind::RBrace);

        let var_count = statements
            .iter()
            .filter(|s| matches!(s, Statement::Let(_)))
            .count();

        Some(BlockStatement {
            token,
            statements,
            var_count,
        })
    }

    fn parse_include_statement(&mut self) -> Option<Statement> {
        let token = self.cur_token.clone();

        self.next_token();

        let literal = self.cur_token.literal.clone();
        let path = if literal.contains("./") {
            let dir = Path::new(&self.file_path).parent().unwrap_or(Path::new(""));
            // Drop `.` segments the way a path join normalizes them.
            dir.join(&literal)
                .components()
                .collect::<PathBuf>()
                .to_string_lossy()
                .into_owned()
        } else {
            literal
        };

        self.next_token();

        let alias = if self.current_token_is(TokenKind::As) {
            self.next_token();

            let alias = Identifier {
                token: self.cur_token.clone(),
                value: self.cur_token.literal.clone(),
            };

            self.expect_current(TokenKind::Ident);
            Some(alias)
        } else {
            None
        };

        self.expect_current(TokenKind::Semicolon);

        Some(Statement::Include(IncludeStatement { token, path, alias }))
    }

    fn parse_echo_statement(&mut self) -> Option<Statement> {
        let token = self.cur_token.clone();

        self.next_token();

        let value = self.parse_expression(Precedence::Lowest)?;

        self.expect_current(TokenKind::Semicolon);

        Some(Statement::Echo(EchoStatement { token, value }))
    }

    fn parse_expression_statement(&mut self) -> Option<Statement> {
        let token = self.cur_token.clone();

        let expression = self.parse_expression(Precedence::Lowest)?;

        if self.current_token_is(TokenKind::Semicolon) {
            self.next_token();
        }

        Some(Statement::Expression(ExpressionStatement {
            token,
            expression,
        }))
    }

    fn parse_expression(&mut self, precedence: Precedence) -> Option<Expression> {
        let mut left = match self.parse_prefix() {
            Some(expression) => expression,
            None => {
                self.error_current(format!(
                    "cannot parse {} as an expression",
                    self.cur_token.literal
                ));
                self.next_token();
                return None;
            }
        };

        while !self.current_token_is(TokenKind::Semicolon) && self.cur_precedence() >= precedence {
            left = match self.parse_infix(left) {
                Ok(expression) => expression,
                Err(expression) => return Some(expression),
            };
        }

        Some(left)
    }

    /// Dispatch on the current token's prefix role. `None` means the token
    /// cannot begin an expression.
    fn parse_prefix(&mut self) -> Option<Expression> {
        match self.cur_token.kind {
            TokenKind::Ident => self.parse_identifier(),
            TokenKind::Int => self.parse_integer_literal(),
            TokenKind::Float => self.parse_float_literal(),
            TokenKind::Bang | TokenKind::Minus => self.parse_prefix_expression(),
            TokenKind::True | TokenKind::False => self.parse_boolean(),
            TokenKind::LParen => self.parse_grouped_expression(),
            TokenKind::If => self.parse_if_expression(),
            TokenKind::Function => self.parse_function_literal(),
            TokenKind::String => self.parse_string_literal(),
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::Nil => self.parse_nil_literal(),
            TokenKind::LBrace => self.parse_hash_literal(),
            _ => None,
        }
    }

    /// Dispatch on the current token's infix role. `Err(left)` hands the
    /// operand back unchanged when the token has no infix meaning.
    fn parse_infix(&mut self, left: Expression) -> Result<Expression, Expression> {
        match self.cur_token.kind {
            TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Slash
            | TokenKind::Asterisk
            | TokenKind::Eq
            | TokenKind::NotEq
            | TokenKind::Lt
            | TokenKind::LtEq
            | TokenKind::Gt
            | TokenKind::GtEq
            | TokenKind::Modulo
            | TokenKind::And
            | TokenKind::Or => Ok(self.parse_infix_expression(left)),
            TokenKind::LParen => Ok(self.parse_call_expression(left)),
            TokenKind::PlusPlus | TokenKind::MinusMinus => Ok(self.parse_postfix_expression(left)),
            TokenKind::Assign => Ok(self.parse_assign_expression(left)),
            TokenKind::LBracket => Ok(self.parse_index_expression(left)),
            TokenKind::Dot => Ok(self.parse_dot_expression(left)),
            _ => Err(left),
        }
    }

    fn parse_infix_expression(&mut self, left: Expression) -> Expression {
        let token = self.cur_token.clone();
        let operator = token.literal.clone();
        let precedence = self.cur_precedence();

        self.next_token();

        let value = self.parse_expression(precedence);
        let right = value.unwrap_or(Expression::Nil(NilLiteral {
            token: token.clone(),
        }));

        Expression::Infix(InfixExpression {
            token,
            left: Box::new(left),
            operator,
            right: Box::new(right),
        })
    }

    fn parse_identifier(&mut self) -> Option<Expression> {
        let identifier = Identifier {
            token: self.cur_token.clone(),
            value: self.cur_token.literal.clone(),
        };

        self.next_token();

        Some(Expression::Identifier(identifier))
    }

    fn parse_integer_literal(&mut self) -> Option<Expression> {
        let token = self.cur_token.clone();

        let value = match token.literal.parse::<i64>() {
            Ok(value) => value,
            Err(_) => {
                self.error_current(format!("could not parse {:?} as integer", token.literal));
                self.next_token();
                return None;
            }
        };

        self.next_token();

        Some(Expression::Integer(IntegerLiteral { token, value }))
    }

    fn parse_float_literal(&mut self) -> Option<Expression> {
        let token = self.cur_token.clone();

        let value = match token.literal.parse::<f64>() {
            Ok(value) => value,
            Err(_) => {
                self.error_current(format!("could not parse {:?} as float", token.literal));
                self.next_token();
                return None;
            }
        };

        self.next_token();

        Some(Expression::Float(FloatLiteral { token, value }))
    }

    fn parse_string_literal(&mut self) -> Option<Expression> {
        let token = self.cur_token.clone();
        let value = token.literal.clone();

        self.next_token();

        Some(Expression::Str(StringLiteral { token, value }))
    }

    fn parse_boolean(&mut self) -> Option<Expression> {
        let token = self.cur_token.clone();
        let value = self.current_token_is(TokenKind::True);

        self.next_token();

        Some(Expression::Boolean(BooleanLiteral { token, value }))
    }

    fn parse_nil_literal(&mut self) -> Option<Expression> {
        let token = self.cur_token.clone();

        self.next_token();

        Some(Expression::Nil(NilLiteral { token }))
    }

    fn parse_prefix_expression(&mut self) -> Option<Expression> {
        let token = self.cur_token.clone();
        let operator = token.literal.clone();

        self.next_token();

        let right = Box::new(self.parse_expression(Precedence::Prefix)?);

        Some(Expression::Prefix(PrefixExpression {
            token,
            operator,
            right,
        }))
    }

    fn parse_grouped_expression(&mut self) -> Option<Expression> {
        self.next_token();

        let expression = self.parse_expression(Precedence::Lowest)?;

        self.expect_current(TokenKind::RParen);

        Some(expression)
    }

    fn parse_if_expression(&mut self) -> Option<Expression> {
        let token = self.cur_token.clone();

        self.next_token();
        self.expect_current(TokenKind::LParen);

        let condition = Box::new(self.parse_expression(Precedence::Lowest)?);

        self.expect_current(TokenKind::RParen);

        let then_branch = Box::new(self.parse_statement()?);

        let else_branch = if self.current_token_is(TokenKind::Else) {
            self.next_token();
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        Some(Expression::If(IfExpression {
            token,
            condition,
            then_branch,
            else_branch,
        }))
    }

    fn parse_function_literal(&mut self) -> Option<Expression> {
        let token = self.cur_token.clone();

        self.next_token();
        self.expect_current(TokenKind::LParen);

        let parameters = self.parse_function_parameters();
        let body = self.parse_block_statement()?;

        Some(Expression::Function(FunctionLiteral {
            token,
            parameters: Rc::new(parameters),
            body: Rc::new(body),
        }))
    }

    fn parse_function_parameters(&mut self) -> Vec<Identifier> {
        let mut identifiers = Vec::new();

        if self.current_token_is(TokenKind::RParen) {
            self.next_token();
            return identifiers;
        }

        while self.peek_token_is(TokenKind::Comma) {
            identifiers.push(Identifier {
                token: self.cur_token.clone(),
                value: self.cur_token.literal.clone(),
            });

            self.next_token(); // consume IDENT
            self.next_token(); // consume COMMA
        }

        identifiers.push(Identifier {
            token: self.cur_token.clone(),
            value: self.cur_token.literal.clone(),
        });
        self.next_token();

        self.expect_current(TokenKind::RParen);

        identifiers
    }

    fn parse_array_literal(&mut self) -> Option<Expression> {
        let token = self.cur_token.clone();

        self.next_token();

        let elements = self.parse_expression_list(TokenKind::RBracket);

        Some(Expression::Array(ArrayLiteral { token, elements }))
    }

    fn parse_hash_literal(&mut self) -> Option<Expression> {
        let token = self.cur_token.clone();
        let mut pairs = Vec::new();

        self.next_token();

        while !self.current_token_is(TokenKind::RBrace) && !self.current_token_is(TokenKind::Eof) {
            let key = self.parse_expression(Precedence::Lowest)?;

            self.expect_current(TokenKind::Colon);

            let value = self.parse_expression(Precedence::Lowest)?;

            pairs.push((key, value));

            if !self.current_token_is(TokenKind::RBrace) && !self.expect_current(TokenKind::Comma) {
                break;
            }
        }

        self.expect_current(TokenKind::RBrace);

        Some(Expression::Hash(HashLiteral { token, pairs }))
    }

    fn parse_call_expression(&mut self, function: Expression) -> Expression {
        let token = self.cur_token.clone();

        self.next_token();

        let arguments = self.parse_expression_list(TokenKind::RParen);

        Expression::Call(CallExpression {
            token,
            function: Box::new(function),
            arguments,
        })
    }

    fn parse_expression_list(&mut self, end: TokenKind) -> Vec<Expression> {
        let mut expressions = Vec::new();

        if self.current_token_is(end) {
            self.next_token();
            return expressions;
        }

        if let Some(expression) = self.parse_expression(Precedence::Lowest) {
            expressions.push(expression);
        }

        while self.current_token_is(TokenKind::Comma) {
            self.next_token();
            if let Some(expression) = self.parse_expression(Precedence::Lowest) {
                expressions.push(expression);
            }
        }

        self.expect_current(end);

        expressions
    }

    fn parse_postfix_expression(&mut self, left: Expression) -> Expression {
        let token = self.cur_token.clone();
        let operator = token.literal.clone();

        self.next_token();

        Expression::Postfix(PostfixExpression {
            token,
            left: Box::new(left),
            operator,
        })
    }

    fn parse_assign_expression(&mut self, target: Expression) -> Expression {
        let token = self.cur_token.clone();
        let precedence = self.cur_precedence();

        self.next_token(); // consume =

        let value = self
            .parse_expression(precedence)
            .unwrap_or(Expression::Nil(NilLiteral {
                token: token.clone(),
            }));

        Expression::Assign(AssignExpression {
            token,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn parse_index_expression(&mut self, left: Expression) -> Expression {
        let token = self.cur_token.clone();

        self.next_token();

        let index = self
            .parse_expression(Precedence::Lowest)
            .unwrap_or(Expression::Nil(NilLiteral {
                token: token.clone(),
            }));

        self.expect_current(TokenKind::RBracket);

        Expression::Index(IndexExpression {
            token,
            left: Box::new(left),
            index: Box::new(index),
        })
    }

    /// `x.name` desugars to `x["name"]` with a synthesized string key, so
    /// field access and method dispatch share the index machinery.
    fn parse_dot_expression(&mut self, left: Expression) -> Expression {
        let token = self.cur_token.clone();

        self.expect_peek(TokenKind::Ident);

        let mut key_token = self.cur_token.clone();
        key_token.kind = TokenKind::String;

        let index = Expression::Str(StringLiteral {
            value: key_token.literal.clone(),
            token: key_token,
        });

        self.next_token();

        Expression::Index(IndexExpression {
            token,
            left: Box::new(left),
            index: Box::new(index),
        })
    }

    fn current_token_is(&self, kind: TokenKind) -> bool {
        self.cur_token.kind == kind
    }

    fn peek_token_is(&self, kind: TokenKind) -> bool {
        self.peek_token.kind == kind
    }

    /// Consume the current token if it has the expected kind; otherwise
    /// record an error and leave the cursor where it is.
    fn expect_current(&mut self, kind: TokenKind) -> bool {
        if self.current_token_is(kind) {
            self.next_token();
            true
        } else {
            self.error_current(format!(
                "expected token to be {}, got {} instead",
                kind, self.cur_token.kind
            ));
            false
        }
    }

    fn expect_peek(&mut self, kind: TokenKind) -> bool {
        if self.peek_token_is(kind) {
            self.next_token();
            true
        } else {
            let message = format!(
                "expected next token to be {}, got {} instead",
                kind, self.peek_token.kind
            );
            self.errors.push(ParserError {
                token: self.peek_token.clone(),
                message,
            });
            false
        }
    }

    fn error_current(&mut self, message: String) {
        self.errors.push(ParserError {
            token: self.cur_token.clone(),
            message,
        });
    }
}
