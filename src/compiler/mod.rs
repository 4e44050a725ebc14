//! The bytecode compiler: one pass over the AST, emitting flat opcode words
//! into the current frame and appending literals to the constant pool.
//!
//! Forward jumps are emitted with a zero offset and patched once the target
//! is known; backward jumps reuse the recorded loop head. Comparison and
//! logic operators beyond `eq`/`lesseq` lower to those two plus jump
//! sequences over boolean constants.

pub mod frame;

use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::ast::{
    ArrayLiteral, AssignExpression, BlockStatement, CallExpression, Expression, ForStatement,
    FunctionLiteral, IfExpression, InfixExpression, PostfixExpression, PrefixExpression, Program,
    Statement, WhileStatement,
};
use crate::bytecode::{Instructions, Opcode, Word};
use crate::value::{CompiledFunction, Value};

pub use frame::{Frame, Var, VarKind};

/// A construct the bytecode back-end cannot express, anchored to its line.
#[derive(Debug, Clone)]
pub struct CompileError {
    pub file: String,
    pub line: usize,
    pub message: String,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[file {}:{}] {}", self.file, self.line, self.message)
    }
}

impl std::error::Error for CompileError {}

type CompileResult = Result<(), CompileError>;

pub struct Compiler {
    pub constants: Vec<Value>,
    frames: Vec<Frame>,
    file_path: String,
}

impl Compiler {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            constants: Vec::new(),
            frames: vec![Frame::new(true)],
            file_path: file_path.into(),
        }
    }

    /// Compile a program and return the main frame's instructions.
    pub fn compile(&mut self, program: &Program) -> Result<Instructions, CompileError> {
        for statement in &program.statements {
            self.compile_statement(statement)?;
        }

        debug!(globals = self.frames[0].locals.len(), "compiled program");

        Ok(std::mem::take(&mut self.frames[0].instructions))
    }

    /// Slots the main frame needs pre-allocated before execution.
    pub fn main_locals(&self) -> usize {
        self.frames[0].locals.len()
    }

    fn compile_statement(&mut self, statement: &Statement) -> CompileResult {
        match statement {
            Statement::Let(node) => {
                // The initializer compiles before the name is defined, so a
                // shadowing `let a = a;` reads the enclosing binding.
                self.compile_expression(&node.value)?;
                let slot = self.frame_mut().define(&node.name.value);
                self.emit_with(Opcode::Let, slot as Word);
                Ok(())
            }
            Statement::Return(node) => {
                match &node.value {
                    Some(value) => self.compile_expression(value)?,
                    None => self.emit_nil(),
                }
                self.emit(Opcode::Ret);
                Ok(())
            }
            Statement::Expression(node) => {
                self.compile_expression(&node.expression)?;
                // An `if` in statement position leaves nothing to drop.
                if !matches!(node.expression, Expression::If(_)) {
                    self.emit(Opcode::Pop);
                }
                Ok(())
            }
            Statement::Block(node) => self.compile_block(node),
            Statement::For(node) => self.compile_for(node),
            Statement::While(node) => self.compile_while(node),
            Statement::Echo(node) => {
                self.compile_expression(&node.value)?;
                self.emit(Opcode::Echo);
                Ok(())
            }
            Statement::Include(node) => Err(self.error(
                node.token.line,
                "include statements are not supported by the vm backend",
            )),
        }
    }

    fn compile_block(&mut self, block: &BlockStatement) -> CompileResult {
        if block.var_count > 0 {
            self.frame_mut().begin_block();
            for statement in &block.statements {
                self.compile_statement(statement)?;
            }
            self.frame_mut().end_block();
        } else {
            for statement in &block.statements {
                self.compile_statement(statement)?;
            }
        }

        Ok(())
    }

    fn compile_while(&mut self, node: &WhileStatement) -> CompileResult {
        let loop_start = self.position();

        self.compile_expression(&node.condition)?;
        let exit = self.emit_jump(Opcode::JumpFalse);

        self.compile_statement(&node.body)?;
        self.emit_back_jump(loop_start);

        self.patch_jump(exit);

        Ok(())
    }

    fn compile_for(&mut self, node: &ForStatement) -> CompileResult {
        // The header and body share one block, so the induction variable's
        // slot is scoped to the loop.
        self.frame_mut().begin_block();

        self.compile_statement(&node.initializer)?;

        let loop_start = self.position();

        self.compile_expression(&node.condition)?;
        let exit = self.emit_jump(Opcode::JumpFalse);

        self.compile_statement(&node.body)?;

        self.compile_expression(&node.increment)?;
        self.emit(Opcode::Pop);

        self.emit_back_jump(loop_start);
        self.patch_jump(exit);

        self.frame_mut().end_block();

        Ok(())
    }

    fn compile_expression(&mut self, expression: &Expression) -> CompileResult {
        match expression {
            Expression::Integer(node) => {
                self.emit_constant(Value::Integer(node.value));
                Ok(())
            }
            Expression::Float(node) => {
                self.emit_constant(Value::Float(node.value));
                Ok(())
            }
            Expression::Boolean(node) => {
                self.emit_constant(Value::Boolean(node.value));
                Ok(())
            }
            Expression::Str(node) => {
                self.emit_constant(Value::String(Rc::new(node.value.clone())));
                Ok(())
            }
            Expression::Nil(_) => {
                self.emit_nil();
                Ok(())
            }
            Expression::Identifier(node) => {
                let var = self.resolve_name(&node.value, node.token.line)?;
                match var.kind {
                    VarKind::Global => self.emit_with(Opcode::GetGlobal, var.index as Word),
                    VarKind::Local => self.emit_with(Opcode::Get, var.index as Word),
                    VarKind::Free => {
                        return Err(self.error(
                            node.token.line,
                            format!(
                                "cannot capture variable {}: closures are not supported by the vm backend",
                                node.value
                            ),
                        ))
                    }
                };
                Ok(())
            }
            Expression::Prefix(node) => self.compile_prefix(node),
            Expression::Infix(node) => self.compile_infix(node),
            Expression::Postfix(node) => self.compile_postfix(node),
            Expression::If(node) => self.compile_if(node),
            Expression::Function(node) => self.compile_function(node),
            Expression::Call(node) => self.compile_call(node),
            Expression::Assign(node) => self.compile_assign(node),
            Expression::Array(node) => self.compile_array(node),
            Expression::Index(node) => Err(self.error(
                node.token.line,
                "index expressions are not supported by the vm backend",
            )),
            Expression::Hash(node) => Err(self.error(
                node.token.line,
                "hash literals are not supported by the vm backend",
            )),
        }
    }

    fn compile_prefix(&mut self, node: &PrefixExpression) -> CompileResult {
        match node.operator.as_str() {
            "!" => {
                self.compile_expression(&node.right)?;
                self.emit_negate();
            }
            "-" => {
                self.emit_constant(Value::Integer(0));
                self.compile_expression(&node.right)?;
                self.emit(Opcode::Sub);
            }
            other => {
                return Err(
                    self.error(node.token.line, format!("unimplemented operator {other}"))
                )
            }
        }

        Ok(())
    }

    fn compile_infix(&mut self, node: &InfixExpression) -> CompileResult {
        match node.operator.as_str() {
            "+" => self.compile_operands_then(node, Opcode::Add)?,
            "-" => self.compile_operands_then(node, Opcode::Sub)?,
            "*" => self.compile_operands_then(node, Opcode::Mul)?,
            "/" => self.compile_operands_then(node, Opcode::Div)?,
            "%" => self.compile_operands_then(node, Opcode::Mod)?,
            "==" => self.compile_operands_then(node, Opcode::Eq)?,
            "<=" => self.compile_operands_then(node, Opcode::LessEq)?,
            "!=" => {
                self.compile_operands_then(node, Opcode::Eq)?;
                self.emit_negate();
            }
            // a > b  ==  !(a <= b)
            ">" => {
                self.compile_operands_then(node, Opcode::LessEq)?;
                self.emit_negate();
            }
            // a >= b  ==  b <= a; the swap reverses evaluation order.
            ">=" => {
                self.compile_expression(&node.right)?;
                self.compile_expression(&node.left)?;
                self.emit(Opcode::LessEq);
            }
            // a < b  ==  !(b <= a); the swap reverses evaluation order.
            "<" => {
                self.compile_expression(&node.right)?;
                self.compile_expression(&node.left)?;
                self.emit(Opcode::LessEq);
                self.emit_negate();
            }
            "&&" => {
                self.compile_expression(&node.left)?;
                self.compile_expression(&node.right)?;
                self.emit_and();
            }
            "||" => {
                self.compile_expression(&node.left)?;
                self.compile_expression(&node.right)?;
                self.emit_or();
            }
            other => {
                return Err(
                    self.error(node.token.line, format!("unimplemented operator {other}"))
                )
            }
        }

        Ok(())
    }

    fn compile_operands_then(&mut self, node: &InfixExpression, op: Opcode) -> CompileResult {
        self.compile_expression(&node.left)?;
        self.compile_expression(&node.right)?;
        self.emit(op);
        Ok(())
    }

    fn compile_postfix(&mut self, node: &PostfixExpression) -> CompileResult {
        let line = node.token.line;

        let Expression::Identifier(identifier) = node.left.as_ref() else {
            return Err(self.error(line, "postfix expression must be identifier"));
        };

        let var = self.resolve_name(&identifier.value, line)?;

        match (node.operator.as_str(), var.kind) {
            (_, VarKind::Free) => Err(self.error(
                line,
                format!(
                    "cannot capture variable {}: closures are not supported by the vm backend",
                    identifier.value
                ),
            )),
            ("++", VarKind::Local) => {
                self.emit_with(Opcode::Inc, var.index as Word);
                self.emit_with(Opcode::Get, var.index as Word);
                Ok(())
            }
            // Globals (and both decrements) lower to a read-modify-write;
            // there is no `inc` addressing frame 0.
            ("++", VarKind::Global) => {
                self.emit_rmw(&var, Opcode::Add);
                Ok(())
            }
            ("--", _) => {
                self.emit_rmw(&var, Opcode::Sub);
                Ok(())
            }
            (other, _) => Err(self.error(line, format!("unknown operator: {other}"))),
        }
    }

    /// slot op= 1, leaving the new value on the stack.
    fn emit_rmw(&mut self, var: &Var, op: Opcode) {
        let (get, set) = match var.kind {
            VarKind::Global => (Opcode::GetGlobal, Opcode::SetGlobal),
            _ => (Opcode::Get, Opcode::Set),
        };

        self.emit_with(get, var.index as Word);
        self.emit_constant(Value::Integer(1));
        self.emit(op);
        self.emit_with(set, var.index as Word);
    }

    fn compile_if(&mut self, node: &IfExpression) -> CompileResult {
        self.compile_expression(&node.condition)?;
        let skip_then = self.emit_jump(Opcode::JumpFalse);

        self.compile_statement(&node.then_branch)?;
        let skip_else = self.emit_jump(Opcode::Jump);

        self.patch_jump(skip_then);

        if let Some(else_branch) = &node.else_branch {
            self.compile_statement(else_branch)?;
        }

        self.patch_jump(skip_else);

        Ok(())
    }

    fn compile_function(&mut self, node: &FunctionLiteral) -> CompileResult {
        self.frames.push(Frame::new(false));

        for parameter in node.parameters.iter() {
            self.frame_mut().define(&parameter.value);
        }

        self.compile_block(&node.body)?;

        // Falling off the end of a function returns nil; an explicit return
        // earlier makes this tail unreachable.
        self.emit_nil();
        self.emit(Opcode::Ret);

        let frame = self.frames.pop().expect("function frame was just pushed");
        let num_locals = frame.locals.len();
        let num_params = node.parameters.len();

        debug!(num_locals, num_params, "compiled function");

        let index = self.add_constant(Value::Compiled(Rc::new(CompiledFunction {
            instructions: frame.instructions,
            num_locals,
            num_params,
        })));
        self.emit_with(Opcode::Const, index as Word);

        Ok(())
    }

    fn compile_call(&mut self, node: &CallExpression) -> CompileResult {
        for argument in &node.arguments {
            self.compile_expression(argument)?;
        }

        self.compile_expression(&node.function)?;
        self.emit_with(Opcode::Call, node.arguments.len() as Word);

        Ok(())
    }

    fn compile_assign(&mut self, node: &AssignExpression) -> CompileResult {
        let line = node.token.line;

        match node.target.as_ref() {
            Expression::Identifier(identifier) => {
                self.compile_expression(&node.value)?;

                let var = self.resolve_name(&identifier.value, line)?;
                match var.kind {
                    VarKind::Global => self.emit_with(Opcode::SetGlobal, var.index as Word),
                    VarKind::Local => self.emit_with(Opcode::Set, var.index as Word),
                    VarKind::Free => {
                        return Err(self.error(
                            line,
                            format!(
                                "cannot capture variable {}: closures are not supported by the vm backend",
                                identifier.value
                            ),
                        ))
                    }
                };
                Ok(())
            }
            Expression::Index(_) => Err(self.error(
                line,
                "assignment through an index is not supported by the vm backend",
            )),
            _ => Err(self.error(line, "invalid assignment target")),
        }
    }

    fn compile_array(&mut self, node: &ArrayLiteral) -> CompileResult {
        // Elements compile in reverse so the VM pops them back in order.
        for element in node.elements.iter().rev() {
            self.compile_expression(element)?;
        }

        self.emit_with(Opcode::Array, node.elements.len() as Word);

        Ok(())
    }

    fn resolve_name(&mut self, name: &str, line: usize) -> Result<Var, CompileError> {
        let top = self.frames.len() - 1;
        self.resolve_in(top, name)
            .ok_or_else(|| self.error(line, format!("cannot resolve variable {name}")))
    }

    /// Resolve in the given frame, climbing to the parent on a miss. A hit in
    /// the global frame stays global; a hit in any other ancestor is recorded
    /// as a free variable in every intermediate frame.
    fn resolve_in(&mut self, frame_index: usize, name: &str) -> Option<Var> {
        if let Some(var) = self.frames[frame_index].find_local(name) {
            return Some(var);
        }

        if frame_index == 0 {
            return None;
        }

        let parent_var = self.resolve_in(frame_index - 1, name)?;
        if parent_var.kind == VarKind::Global {
            return Some(parent_var);
        }

        Some(self.frames[frame_index].define_free(parent_var))
    }

    fn frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("frame stack is never empty")
    }

    fn position(&self) -> usize {
        self.frames
            .last()
            .expect("frame stack is never empty")
            .instructions
            .len()
    }

    fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    fn emit(&mut self, op: Opcode) {
        self.frame_mut().instructions.push(op.into());
    }

    /// Emit an opcode with one operand; returns the operand's word index for
    /// patching.
    fn emit_with(&mut self, op: Opcode, operand: Word) -> usize {
        let frame = self.frame_mut();
        frame.instructions.push(op.into());
        frame.instructions.push(operand);
        frame.instructions.len() - 1
    }

    fn emit_constant(&mut self, value: Value) {
        let index = self.add_constant(value);
        self.emit_with(Opcode::Const, index as Word);
    }

    fn emit_nil(&mut self) {
        self.emit_constant(Value::Nil);
    }

    fn emit_jump(&mut self, op: Opcode) -> usize {
        self.emit_with(op, 0)
    }

    /// Point a previously emitted jump at the current position.
    fn patch_jump(&mut self, operand_index: usize) {
        let target = self.position();
        self.frame_mut().instructions[operand_index] = (target - operand_index - 1) as Word;
    }

    fn emit_back_jump(&mut self, loop_start: usize) {
        let operand_index = self.position() + 1;
        let offset = loop_start as Word - (operand_index as Word + 1);
        self.emit_with(Opcode::Jump, offset);
    }

    /// Replace the boolean on top of the stack with its negation.
    fn emit_negate(&mut self) {
        let on_false = self.emit_jump(Opcode::JumpFalse);
        self.emit_constant(Value::Boolean(false));
        let end = self.emit_jump(Opcode::Jump);
        self.patch_jump(on_false);
        self.emit_constant(Value::Boolean(true));
        self.patch_jump(end);
    }

    /// Combine the truthiness of the two values on top of the stack; both
    /// operands were already evaluated, matching the evaluator's
    /// non-short-circuit semantics.
    fn emit_and(&mut self) {
        let right_false = self.emit_jump(Opcode::JumpFalse);
        let left_false = self.emit_jump(Opcode::JumpFalse);
        self.emit_constant(Value::Boolean(true));
        let end = self.emit_jump(Opcode::Jump);
        self.patch_jump(right_false);
        self.emit(Opcode::Pop); // left operand is still on the stack
        self.patch_jump(left_false);
        self.emit_constant(Value::Boolean(false));
        self.patch_jump(end);
    }

    fn emit_or(&mut self) {
        let right_false = self.emit_jump(Opcode::JumpFalse);
        self.emit(Opcode::Pop); // right was truthy; the left operand decides nothing
        self.emit_constant(Value::Boolean(true));
        let end_true = self.emit_jump(Opcode::Jump);
        self.patch_jump(right_false);
        let left_false = self.emit_jump(Opcode::JumpFalse);
        self.emit_constant(Value::Boolean(true));
        let end_left = self.emit_jump(Opcode::Jump);
        self.patch_jump(left_false);
        self.emit_constant(Value::Boolean(false));
        self.patch_jump(end_true);
        self.patch_jump(end_left);
    }

    fn error(&self, line: usize, message: impl Into<String>) -> CompileError {
        CompileError {
            file: self.file_path.clone(),
            line,
            message: message.into(),
        }
    }
}
