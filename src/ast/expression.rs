use std::fmt;
use std::rc::Rc;

use itertools::Itertools;

use crate::token::Token;

use super::statement::{BlockStatement, Statement};

#[derive(Debug, Clone)]
pub enum Expression {
    Identifier(Identifier),
    Integer(IntegerLiteral),
    Float(FloatLiteral),
    Boolean(BooleanLiteral),
    Str(StringLiteral),
    Nil(NilLiteral),
    Prefix(PrefixExpression),
    Infix(InfixExpression),
    Postfix(PostfixExpression),
    If(IfExpression),
    Function(FunctionLiteral),
    Call(CallExpression),
    Assign(AssignExpression),
    Index(IndexExpression),
    Array(ArrayLiteral),
    Hash(HashLiteral),
}

impl Expression {
    /// The token that introduced this node.
    pub fn token(&self) -> &Token {
        match self {
            Expression::Identifier(node) => &node.token,
            Expression::Integer(node) => &node.token,
            Expression::Float(node) => &node.token,
            Expression::Boolean(node) => &node.token,
            Expression::Str(node) => &node.token,
            Expression::Nil(node) => &node.token,
            Expression::Prefix(node) => &node.token,
            Expression::Infix(node) => &node.token,
            Expression::Postfix(node) => &node.token,
            Expression::If(node) => &node.token,
            Expression::Function(node) => &node.token,
            Expression::Call(node) => &node.token,
            Expression::Assign(node) => &node.token,
            Expression::Index(node) => &node.token,
            Expression::Array(node) => &node.token,
            Expression::Hash(node) => &node.token,
        }
    }

    pub fn line(&self) -> usize {
        self.token().line
    }
}

#[derive(Debug, Clone)]
pub struct Identifier {
    pub token: Token,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct IntegerLiteral {
    pub token: Token,
    pub value: i64,
}

#[derive(Debug, Clone)]
pub struct FloatLiteral {
    pub token: Token,
    pub value: f64,
}

#[derive(Debug, Clone)]
pub struct BooleanLiteral {
    pub token: Token,
    pub value: bool,
}

#[derive(Debug, Clone)]
pub struct StringLiteral {
    pub token: Token,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct NilLiteral {
    pub token: Token,
}

#[derive(Debug, Clone)]
pub struct PrefixExpression {
    pub token: Token,
    pub operator: String,
    pub right: Box<Expression>,
}

#[derive(Debug, Clone)]
pub struct InfixExpression {
    pub token: Token,
    pub left: Box<Expression>,
    pub operator: String,
    pub right: Box<Expression>,
}

#[derive(Debug, Clone)]
pub struct PostfixExpression {
    pub token: Token,
    pub left: Box<Expression>,
    pub operator: String,
}

/// `if` parses in prefix position and yields the value of the branch it
/// takes; the branches themselves are statements.
#[derive(Debug, Clone)]
pub struct IfExpression {
    pub token: Token,
    pub condition: Box<Expression>,
    pub then_branch: Box<Statement>,
    pub else_branch: Option<Box<Statement>>,
}

/// Parameters and body are shared so closing over a literal is a pointer
/// copy, not a deep clone of the body.
#[derive(Debug, Clone)]
pub struct FunctionLiteral {
    pub token: Token,
    pub parameters: Rc<Vec<Identifier>>,
    pub body: Rc<BlockStatement>,
}

#[derive(Debug, Clone)]
pub struct CallExpression {
    pub token: Token,
    pub function: Box<Expression>,
    pub arguments: Vec<Expression>,
}

#[derive(Debug, Clone)]
pub struct AssignExpression {
    pub token: Token,
    pub target: Box<Expression>,
    pub value: Box<Expression>,
}

#[derive(Debug, Clone)]
pub struct IndexExpression {
    pub token: Token,
    pub left: Box<Expression>,
    pub index: Box<Expression>,
}

#[derive(Debug, Clone)]
pub struct ArrayLiteral {
    pub token: Token,
    pub elements: Vec<Expression>,
}

#[derive(Debug, Clone)]
pub struct HashLiteral {
    pub token: Token,
    pub pairs: Vec<(Expression, Expression)>,
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Identifier(node) => f.write_str(&node.value),
            Expression::Integer(node) => write!(f, "{}", node.value),
            Expression::Float(node) => write!(f, "{:?}", node.value),
            Expression::Boolean(node) => write!(f, "{}", node.value),
            Expression::Str(node) => write!(f, "\"{}\"", node.value),
            Expression::Nil(_) => f.write_str("nil"),
            Expression::Prefix(node) => write!(f, "({}{})", node.operator, node.right),
            Expression::Infix(node) => {
                write!(f, "({} {} {})", node.left, node.operator, node.right)
            }
            Expression::Postfix(node) => write!(f, "({}{})", node.left, node.operator),
            Expression::If(node) => {
                write!(f, "if ({}) {}", node.condition, node.then_branch)?;
                if let Some(else_branch) = &node.else_branch {
                    write!(f, " else {else_branch}")?;
                }
                Ok(())
            }
            Expression::Function(node) => {
                let params = node.parameters.iter().map(|p| &p.value).join(", ");
                write!(f, "fn({params}) {}", node.body)
            }
            Expression::Call(node) => {
                let args = node.arguments.iter().map(|a| a.to_string()).join(", ");
                write!(f, "{}({args})", node.function)
            }
            Expression::Assign(node) => write!(f, "({} = {})", node.target, node.value),
            Expression::Index(node) => write!(f, "({}[{}])", node.left, node.index),
            Expression::Array(node) => {
                let elements = node.elements.iter().map(|e| e.to_string()).join(", ");
                write!(f, "[{elements}]")
            }
            Expression::Hash(node) => {
                let pairs = node
                    .pairs
                    .iter()
                    .map(|(key, value)| format!("{key}: {value}"))
                    .join(", ");
                write!(f, "{{{pairs}}}")
            }
        }
    }
}
