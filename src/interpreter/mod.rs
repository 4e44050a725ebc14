//! The tree-walking evaluator.
//!
//! `eval_*` walk the AST with an environment chain and an optional `this`
//! receiver. Two kinds of non-local flow travel back up the walk: runtime
//! errors through the `Result` error channel, and `return` as an internal
//! [`Value::Return`] wrapper that blocks and loops pass through untouched and
//! call boundaries unwrap.

pub mod builtins;
pub mod env;
pub mod env_manager;
pub mod stdlib;

mod array_methods;
mod hash_methods;
mod string_methods;

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::ast::{
    AssignExpression, BlockStatement, CallExpression, Expression, ForStatement, HashLiteral,
    IfExpression, IncludeStatement, IndexExpression, PostfixExpression, Program, Statement,
};
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::value::{ops, Function, RuntimeError, TypeTag, Value};

pub use env::{AssignOutcome, EnvRef, Environment};
pub use env_manager::EnvManager;

type EvalResult = Result<Value, RuntimeError>;

pub struct Evaluator {
    env_manager: EnvManager,
    /// Path of the file currently being evaluated, for error locations;
    /// swapped while an include is under evaluation.
    file_path: String,
}

impl Evaluator {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            env_manager: EnvManager::new(),
            file_path: file_path.into(),
        }
    }

    /// Evaluate a whole program in its file environment and unwrap a
    /// top-level `return`.
    pub fn run(&mut self, program: &Program) -> EvalResult {
        let path = self.file_path.clone();
        let (env, _) = self.env_manager.get(&path);
        self.eval_program(program, &env)
    }

    pub fn eval_program(&mut self, program: &Program, env: &EnvRef) -> EvalResult {
        let mut result = Value::Nil;

        for statement in &program.statements {
            result = self.eval_statement(statement, env, None)?;

            if let Value::Return(value) = result {
                return Ok(*value);
            }
        }

        Ok(result)
    }

    fn eval_statement(
        &mut self,
        statement: &Statement,
        env: &EnvRef,
        this: Option<&Value>,
    ) -> EvalResult {
        match statement {
            Statement::Let(node) => {
                let value = self.eval_expression(&node.value, env, this)?;
                env.borrow_mut()
                    .declare(&node.name.value, value, node.constant);
                Ok(Value::Nil)
            }
            Statement::Return(node) => {
                let value = match &node.value {
                    Some(expression) => self.eval_expression(expression, env, this)?,
                    None => Value::Nil,
                };
                Ok(Value::Return(Box::new(value)))
            }
            Statement::Expression(node) => self.eval_expression(&node.expression, env, this),
            Statement::Block(node) => {
                let enclosed = Environment::enclosed(env.clone());
                self.eval_block(node, &enclosed, this)
            }
            Statement::For(node) => self.eval_for(node, env, this),
            Statement::While(node) => {
                loop {
                    let condition = self.eval_expression(&node.condition, env, this)?;
                    if !condition.is_truthy() {
                        break;
                    }

                    let result = self.eval_statement(&node.body, env, this)?;
                    if matches!(result, Value::Return(_)) {
                        return Ok(result);
                    }
                }
                Ok(Value::Nil)
            }
            Statement::Include(node) => self.eval_include(node, env),
            Statement::Echo(node) => {
                let value = self.eval_expression(&node.value, env, this)?;
                println!("{}", value.inspect());
                Ok(Value::Nil)
            }
        }
    }

    /// Evaluate a block's statements in the given (already enclosed)
    /// environment; the block's value is its last statement's value.
    fn eval_block(
        &mut self,
        block: &BlockStatement,
        env: &EnvRef,
        this: Option<&Value>,
    ) -> EvalResult {
        let mut result = Value::Nil;

        for statement in &block.statements {
            result = self.eval_statement(statement, env, this)?;

            if matches!(result, Value::Return(_)) {
                return Ok(result);
            }
        }

        Ok(result)
    }

    fn eval_for(&mut self, node: &ForStatement, env: &EnvRef, this: Option<&Value>) -> EvalResult {
        let loop_env = Environment::enclosed(env.clone());

        self.eval_statement(&node.initializer, &loop_env, this)?;

        match node.body.as_ref() {
            // Block bodies reuse one iteration environment, cleared at the
            // end of every pass.
            Statement::Block(block) => {
                let body_env = Environment::enclosed(loop_env.clone());

                loop {
                    let condition = self.eval_expression(&node.condition, &loop_env, this)?;
                    if !condition.is_truthy() {
                        break;
                    }

                    let result = self.eval_block(block, &body_env, this)?;
                    if matches!(result, Value::Return(_)) {
                        return Ok(result);
                    }

                    body_env.borrow_mut().clear_store();

                    self.eval_expression(&node.increment, &loop_env, this)?;
                }
            }
            body => loop {
                let condition = self.eval_expression(&node.condition, &loop_env, this)?;
                if !condition.is_truthy() {
                    break;
                }

                let result = self.eval_statement(body, &loop_env, this)?;
                if matches!(result, Value::Return(_)) {
                    return Ok(result);
                }

                self.eval_expression(&node.increment, &loop_env, this)?;
            },
        }

        Ok(Value::Nil)
    }

    fn eval_include(&mut self, node: &IncludeStatement, env: &EnvRef) -> EvalResult {
        let line = node.token.line;
        let (file_env, already_evaluated) = self.env_manager.get(&node.path);

        if !already_evaluated {
            debug!(path = %node.path, "evaluating include");

            let source = std::fs::read_to_string(&node.path).map_err(|e| {
                self.error(line, format!("could not read include {}: {e}", node.path))
            })?;

            let mut parser = Parser::new(Lexer::new(&source), node.path.clone());
            let program = parser.parse_program();
            let errors = parser.report_errors();
            if !errors.is_empty() {
                return Err(self.error(
                    line,
                    format!("include {} has parse errors:\n{}", node.path, errors.join("\n")),
                ));
            }

            let saved = std::mem::replace(&mut self.file_path, node.path.clone());
            let result = self.eval_program(&program, &file_env);
            self.file_path = saved;
            result?;
        }

        match &node.alias {
            Some(alias) => env
                .borrow_mut()
                .add_alias(&alias.value, Value::Include(file_env)),
            None => env.borrow_mut().add_include(file_env),
        }

        Ok(Value::Nil)
    }

    fn eval_expression(
        &mut self,
        expression: &Expression,
        env: &EnvRef,
        this: Option<&Value>,
    ) -> EvalResult {
        match expression {
            Expression::Integer(node) => Ok(Value::Integer(node.value)),
            Expression::Float(node) => Ok(Value::Float(node.value)),
            Expression::Boolean(node) => Ok(Value::Boolean(node.value)),
            Expression::Str(node) => Ok(Value::String(Rc::new(node.value.clone()))),
            Expression::Nil(_) => Ok(Value::Nil),
            Expression::Identifier(node) => {
                if node.value == "this" {
                    if let Some(receiver) = this {
                        return Ok(receiver.clone());
                    }
                }

                if let Some(value) = env.borrow().get(&node.value) {
                    return Ok(value);
                }
                if let Some(builtin) = builtins::lookup(&node.value) {
                    return Ok(Value::Native(builtin));
                }

                Err(self.error(
                    node.token.line,
                    format!("identifier not found: {}", node.value),
                ))
            }
            Expression::Prefix(node) => {
                let right = self.eval_expression(&node.right, env, this)?;
                ops::prefix_op(&node.operator, &right)
                    .map_err(|e| e.at(&self.file_path, node.token.line))
            }
            Expression::Infix(node) => {
                let left = self.eval_expression(&node.left, env, this)?;
                let right = self.eval_expression(&node.right, env, this)?;
                ops::binary_op(&node.operator, &left, &right)
                    .map_err(|e| e.at(&self.file_path, node.token.line))
            }
            Expression::Postfix(node) => self.eval_postfix(node, env, this),
            Expression::If(node) => self.eval_if(node, env, this),
            Expression::Function(node) => Ok(Value::Function(Rc::new(Function {
                parameters: node.parameters.clone(),
                body: node.body.clone(),
                env: env.clone(),
                this: this.cloned(),
            }))),
            Expression::Call(node) => self.eval_call(node, env, this),
            Expression::Assign(node) => self.eval_assign(node, env, this),
            Expression::Index(node) => {
                let left = self.eval_expression(&node.left, env, this)?;
                let index = self.eval_expression(&node.index, env, this)?;
                self.eval_index(node, &left, &index)
            }
            Expression::Array(node) => {
                let mut elements = Vec::with_capacity(node.elements.len());
                for element in &node.elements {
                    elements.push(self.eval_expression(element, env, this)?);
                }
                Ok(Value::Array(Rc::new(RefCell::new(elements))))
            }
            Expression::Hash(node) => self.eval_hash(node, env),
        }
    }

    fn eval_if(&mut self, node: &IfExpression, env: &EnvRef, this: Option<&Value>) -> EvalResult {
        let condition = self.eval_expression(&node.condition, env, this)?;

        if condition.is_truthy() {
            self.eval_statement(&node.then_branch, env, this)
        } else if let Some(else_branch) = &node.else_branch {
            self.eval_statement(else_branch, env, this)
        } else {
            Ok(Value::Nil)
        }
    }

    fn eval_call(
        &mut self,
        node: &CallExpression,
        env: &EnvRef,
        this: Option<&Value>,
    ) -> EvalResult {
        let function = self.eval_expression(&node.function, env, this)?;

        let mut args = Vec::with_capacity(node.arguments.len());
        for argument in &node.arguments {
            args.push(self.eval_expression(argument, env, this)?);
        }

        self.apply_function(node.token.line, &function, args)
    }

    /// Call a user function or a native. Public so method tables can call
    /// back into the evaluator for higher-order arguments.
    pub fn apply_function(
        &mut self,
        line: usize,
        function: &Value,
        args: Vec<Value>,
    ) -> EvalResult {
        match function {
            Value::Function(function) => {
                if args.len() != function.parameters.len() {
                    return Err(self.error(
                        line,
                        format!(
                            "expected {} arg(s) got {}",
                            function.parameters.len(),
                            args.len()
                        ),
                    ));
                }

                let call_env = Environment::enclosed(function.env.clone());
                for (parameter, arg) in function.parameters.iter().zip(args) {
                    call_env.borrow_mut().declare(&parameter.value, arg, false);
                }

                let body_env = Environment::enclosed(call_env);
                let result = self.eval_block(&function.body, &body_env, function.this.as_ref())?;

                match result {
                    Value::Return(value) => Ok(*value),
                    value => Ok(value),
                }
            }
            Value::Native(native) => {
                if native.args_count >= 0 && args.len() != native.args_count as usize {
                    return Err(self.error(
                        line,
                        format!(
                            "wrong number of arguments. got={}, want={}",
                            args.len(),
                            native.args_count
                        ),
                    ));
                }

                if native.args_count >= 0 {
                    for (index, (expected, arg)) in
                        native.args_types.iter().zip(&args).enumerate()
                    {
                        if *expected != TypeTag::Any && *expected != arg.type_tag() {
                            return Err(self.error(
                                line,
                                format!(
                                    "argument {} to `{}` must be {expected}, got {}",
                                    index + 1,
                                    native.name,
                                    arg.type_tag()
                                ),
                            ));
                        }
                    }
                }

                let func = native.func.clone();
                func.as_ref()(self, line, &args).map_err(|e| e.at(&self.file_path, line))
            }
            other => Err(self.error(line, format!("not a function: {}", other.inspect()))),
        }
    }

    fn eval_postfix(
        &mut self,
        node: &PostfixExpression,
        env: &EnvRef,
        this: Option<&Value>,
    ) -> EvalResult {
        let line = node.token.line;
        let delta: i64 = match node.operator.as_str() {
            "++" => 1,
            "--" => -1,
            _ => {
                return Err(self.error(line, format!("unknown operator: {}", node.operator)));
            }
        };

        match node.left.as_ref() {
            Expression::Identifier(identifier) => {
                let current = self.eval_expression(&node.left, env, this)?;
                let Value::Integer(value) = current else {
                    return Err(self.error(
                        line,
                        format!("unknown operator: {}{}", node.operator, current.inspect()),
                    ));
                };

                let updated = Value::Integer(value.wrapping_add(delta));
                match env.borrow_mut().set(&identifier.value, updated.clone()) {
                    AssignOutcome::Assigned => Ok(updated),
                    AssignOutcome::Constant => Err(self.error(
                        line,
                        format!("cannot assign to a constant variable {}", identifier.value),
                    )),
                    AssignOutcome::Unbound => Err(self.error(
                        line,
                        format!("identifier not found: {}", identifier.value),
                    )),
                }
            }
            Expression::Index(index_node) => {
                let left = self.eval_expression(&index_node.left, env, this)?;
                let index = self.eval_expression(&index_node.index, env, this)?;

                let current = self.eval_index(index_node, &left, &index)?;
                let Value::Integer(value) = current else {
                    return Err(self.error(
                        line,
                        format!("unknown operator: {}{}", node.operator, current.inspect()),
                    ));
                };

                let updated = Value::Integer(value.wrapping_add(delta));
                self.store_index(line, &left, &index, updated.clone())?;
                Ok(updated)
            }
            _ => Err(self.error(line, "postfix expression must be identifier")),
        }
    }

    fn eval_assign(
        &mut self,
        node: &AssignExpression,
        env: &EnvRef,
        this: Option<&Value>,
    ) -> EvalResult {
        let line = node.token.line;

        match node.target.as_ref() {
            Expression::Identifier(identifier) => {
                let value = self.eval_expression(&node.value, env, this)?;

                match env.borrow_mut().set(&identifier.value, value.clone()) {
                    AssignOutcome::Assigned => Ok(value),
                    AssignOutcome::Constant => Err(self.error(
                        line,
                        format!("cannot assign to a constant variable {}", identifier.value),
                    )),
                    AssignOutcome::Unbound => Err(self.error(
                        line,
                        format!("identifier not found: {}", identifier.value),
                    )),
                }
            }
            Expression::Index(index_node) => {
                let left = self.eval_expression(&index_node.left, env, this)?;
                let index = self.eval_expression(&index_node.index, env, this)?;
                let value = self.eval_expression(&node.value, env, this)?;

                self.store_index(line, &left, &index, value.clone())?;
                Ok(value)
            }
            _ => Err(self.error(line, "invalid assignment target")),
        }
    }

    /// Write through an index: array element (bounds-checked) or hash entry.
    fn store_index(
        &self,
        line: usize,
        left: &Value,
        index: &Value,
        value: Value,
    ) -> Result<(), RuntimeError> {
        match (left, index) {
            (Value::Array(elements), Value::Integer(i)) => {
                let mut elements = elements.borrow_mut();
                if *i < 0 || *i as usize >= elements.len() {
                    return Err(self.error(line, format!("index {i} out of bounds")));
                }
                elements[*i as usize] = value;
                Ok(())
            }
            (Value::Array(_), other) => Err(self.error(
                line,
                format!("index operator not supported: {}", other.inspect()),
            )),
            (Value::Hash(pairs), key) => {
                let key = key.hash_key().ok_or_else(|| {
                    self.error(line, format!("unusable as hash key: {}", key.inspect()))
                })?;
                pairs.borrow_mut().insert(key, value);
                Ok(())
            }
            (other, _) => Err(self.error(
                line,
                format!("index operator not supported: {}", other.inspect()),
            )),
        }
    }

    /// Read through an index, including method-table dispatch for string
    /// keys on values that have one.
    fn eval_index(&self, node: &IndexExpression, left: &Value, index: &Value) -> EvalResult {
        let line = node.token.line;

        match (left, index) {
            (Value::Array(elements), Value::Integer(i)) => {
                let elements = elements.borrow();
                if *i < 0 || *i as usize >= elements.len() {
                    return Ok(Value::Nil);
                }
                Ok(elements[*i as usize].clone())
            }
            (Value::Array(elements), Value::String(name)) => {
                array_methods::lookup(elements, name)
                    .map(Value::Native)
                    .ok_or_else(|| self.error(line, format!("unknown method: {name}")))
            }
            (Value::String(string), Value::Integer(i)) => {
                if *i < 0 {
                    return Ok(Value::Nil);
                }
                match string.chars().nth(*i as usize) {
                    Some(ch) => Ok(Value::String(Rc::new(ch.to_string()))),
                    None => Ok(Value::Nil),
                }
            }
            (Value::String(string), Value::String(name)) => {
                string_methods::lookup(string, name)
                    .map(Value::Native)
                    .ok_or_else(|| self.error(line, format!("unknown method: {name}")))
            }
            (Value::Hash(pairs), key) => {
                let hash_key = key.hash_key().ok_or_else(|| {
                    self.error(line, format!("unusable as hash key: {}", key.inspect()))
                })?;

                if let Some(value) = pairs.borrow().get(&hash_key) {
                    return Ok(value.clone());
                }

                // Missing entry: a string key may still name a hash method.
                if let Value::String(name) = key {
                    if let Some(method) = hash_methods::lookup(pairs, name) {
                        return Ok(Value::Native(method));
                    }
                }

                Ok(Value::Nil)
            }
            (Value::Include(include_env), Value::String(name)) => include_env
                .borrow()
                .get_local(name)
                .ok_or_else(|| self.error(line, format!("identifier not found: {name}"))),
            (other, _) => Err(self.error(
                line,
                format!("index operator not supported: {}", other.inspect()),
            )),
        }
    }

    fn eval_hash(&mut self, node: &HashLiteral, env: &EnvRef) -> EvalResult {
        let pairs = Rc::new(RefCell::new(FxHashMap::default()));
        let hash = Value::Hash(pairs.clone());

        for (key_expression, value_expression) in &node.pairs {
            // The hash under construction is the `this` receiver for its own
            // keys and values, so entries can be defined method-style.
            let key = self.eval_expression(key_expression, env, Some(&hash))?;
            let hash_key = key.hash_key().ok_or_else(|| {
                self.error(
                    key_expression.line(),
                    format!("unusable as hash key: {}", key.inspect()),
                )
            })?;

            let value = self.eval_expression(value_expression, env, Some(&hash))?;

            pairs.borrow_mut().insert(hash_key, value);
        }

        Ok(hash)
    }

    fn error(&self, line: usize, message: impl Into<String>) -> RuntimeError {
        RuntimeError::new(message).at(&self.file_path, line)
    }
}
