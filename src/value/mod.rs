//! Runtime values shared by the tree-walking evaluator and the VM.
//!
//! Heap-backed variants (strings, arrays, hashes, functions) are reference
//! counted so bindings, closures, and container entries share one underlying
//! object; mutation through any handle is visible through all of them.

pub mod ops;

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use itertools::Itertools;
use rustc_hash::FxHashMap;

use crate::ast::statement::BlockStatement;
use crate::ast::Identifier;
use crate::bytecode::Instructions;
use crate::interpreter::env::EnvRef;
use crate::interpreter::Evaluator;

/// A runtime fault. Errors produced while walking the AST carry the file and
/// line of the node that failed; errors produced by the VM carry none.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub message: String,
    pub location: Option<(String, usize)>,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }

    /// Attach a source location unless a deeper one is already present.
    pub fn at(mut self, file: &str, line: usize) -> Self {
        if self.location.is_none() {
            self.location = Some((file.to_string(), line));
        }
        self
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some((file, line)) => write!(f, "[file {file}:{line}] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for RuntimeError {}

/// The class of a runtime value, used for native argument checking and error
/// messages. `Any` matches every class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Integer,
    Float,
    Boolean,
    Nil,
    String,
    Array,
    Hash,
    Function,
    Native,
    CompiledFunction,
    Include,
    Return,
    Any,
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeTag::Integer => "integer",
            TypeTag::Float => "float",
            TypeTag::Boolean => "boolean",
            TypeTag::Nil => "nil",
            TypeTag::String => "string",
            TypeTag::Array => "array",
            TypeTag::Hash => "hash",
            TypeTag::Function => "function",
            TypeTag::Native => "builtin",
            TypeTag::CompiledFunction => "compiled function",
            TypeTag::Include => "include",
            TypeTag::Return => "return",
            TypeTag::Any => "any",
        };
        f.write_str(name)
    }
}

pub type HashPairs = FxHashMap<HashKey, Value>;

#[derive(Clone)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Nil,
    String(Rc<String>),
    Array(Rc<RefCell<Vec<Value>>>),
    Hash(Rc<RefCell<HashPairs>>),
    Function(Rc<Function>),
    Native(NativeFunction),
    Compiled(Rc<CompiledFunction>),
    Include(EnvRef),
    /// Internal control-flow wrapper for `return`; never reaches user code.
    Return(Box<Value>),
}

/// A user function value: parameters and body shared with the AST literal,
/// plus the environment and `this` receiver captured at definition.
pub struct Function {
    pub parameters: Rc<Vec<Identifier>>,
    pub body: Rc<BlockStatement>,
    pub env: EnvRef,
    pub this: Option<Value>,
}

/// A host function callable from Wind code. `args_count` of -1 means
/// variadic; otherwise the count is exact and each argument is checked
/// against `args_types` (where `Any` matches anything).
#[derive(Clone)]
pub struct NativeFunction {
    pub name: &'static str,
    pub args_count: isize,
    pub args_types: Vec<TypeTag>,
    pub func: NativeImpl,
}

pub type NativeImpl = Rc<dyn Fn(&mut Evaluator, usize, &[Value]) -> Result<Value, RuntimeError>>;

/// A function compiled to bytecode: its instruction stream and the size of
/// its local window. Parameters occupy the first `num_params` slots.
#[derive(Debug, Clone)]
pub struct CompiledFunction {
    pub instructions: Instructions,
    pub num_locals: usize,
    pub num_params: usize,
}

/// A hash key: the value's type tag plus a 64-bit image. Integers use their
/// bit pattern, booleans 1 and 2, strings FNV-1a 64. The `inspect` text rides
/// along for printing and is excluded from equality and hashing.
#[derive(Debug, Clone)]
pub struct HashKey {
    pub tag: TypeTag,
    pub value: u64,
    pub inspect: String,
}

impl PartialEq for HashKey {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag && self.value == other.value
    }
}

impl Eq for HashKey {}

impl Hash for HashKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tag.hash(state);
        self.value.hash(state);
    }
}

pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    bytes
        .iter()
        .fold(OFFSET_BASIS, |hash, byte| {
            (hash ^ u64::from(*byte)).wrapping_mul(PRIME)
        })
}

impl Value {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Integer(_) => TypeTag::Integer,
            Value::Float(_) => TypeTag::Float,
            Value::Boolean(_) => TypeTag::Boolean,
            Value::Nil => TypeTag::Nil,
            Value::String(_) => TypeTag::String,
            Value::Array(_) => TypeTag::Array,
            Value::Hash(_) => TypeTag::Hash,
            Value::Function(_) => TypeTag::Function,
            Value::Native(_) => TypeTag::Native,
            Value::Compiled(_) => TypeTag::CompiledFunction,
            Value::Include(_) => TypeTag::Include,
            Value::Return(_) => TypeTag::Return,
        }
    }

    /// nil and false are falsey; everything else (including 0 and "") is
    /// truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Boolean(false))
    }

    /// The key image of this value, if its type is hashable.
    pub fn hash_key(&self) -> Option<HashKey> {
        match self {
            Value::Integer(value) => Some(HashKey {
                tag: TypeTag::Integer,
                value: *value as u64,
                inspect: self.inspect(),
            }),
            Value::Boolean(value) => Some(HashKey {
                tag: TypeTag::Boolean,
                value: if *value { 1 } else { 2 },
                inspect: self.inspect(),
            }),
            Value::String(value) => Some(HashKey {
                tag: TypeTag::String,
                value: fnv1a_64(value.as_bytes()),
                inspect: self.inspect(),
            }),
            _ => None,
        }
    }

    /// Human-readable rendering, used by `echo`, `print`, and errors.
    pub fn inspect(&self) -> String {
        match self {
            Value::Integer(value) => value.to_string(),
            Value::Float(value) => format!("{value:?}"),
            Value::Boolean(value) => value.to_string(),
            Value::Nil => "nil".to_string(),
            Value::String(value) => value.to_string(),
            Value::Array(elements) => {
                let elements = elements.borrow().iter().map(Value::inspect).join(", ");
                format!("[{elements}]")
            }
            Value::Hash(pairs) => {
                let pairs = pairs
                    .borrow()
                    .iter()
                    .map(|(key, value)| format!("{}: {}", key.inspect, value.inspect()))
                    .join(", ");
                format!("{{{pairs}}}")
            }
            Value::Function(function) => {
                let params = function.parameters.iter().map(|p| &p.value).join(", ");
                format!("fn({params}) {}", function.body)
            }
            Value::Native(_) => "builtin function".to_string(),
            Value::Compiled(function) => {
                format!("fn<{} locals>", function.num_locals)
            }
            Value::Include(_) => "include".to_string(),
            Value::Return(value) => value.inspect(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inspect())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.type_tag(), self.inspect())
    }
}
