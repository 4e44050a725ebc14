//! Global native functions, visible wherever no binding shadows them.

use std::cell::RefCell;
use std::io::{BufRead, Write};
use std::rc::Rc;

use itertools::Itertools;

use crate::value::{NativeFunction, RuntimeError, TypeTag, Value};

pub fn lookup(name: &str) -> Option<NativeFunction> {
    let builtin = match name {
        "len" => NativeFunction {
            name: "len",
            args_count: 1,
            args_types: vec![TypeTag::Any],
            func: Rc::new(|_, _, args| match &args[0] {
                Value::String(value) => Ok(Value::Integer(value.chars().count() as i64)),
                Value::Array(elements) => Ok(Value::Integer(elements.borrow().len() as i64)),
                _ => Err(RuntimeError::new("argument to `len` not supported")),
            }),
        },
        "println" => NativeFunction {
            name: "println",
            args_count: -1,
            args_types: vec![],
            func: Rc::new(|_, _, args| {
                println!("{}", args.iter().map(Value::inspect).join(" "));
                Ok(Value::Nil)
            }),
        },
        "print" => NativeFunction {
            name: "print",
            args_count: -1,
            args_types: vec![],
            func: Rc::new(|_, _, args| {
                print!("{}", args.iter().map(Value::inspect).join(" "));
                std::io::stdout().flush().ok();
                Ok(Value::Nil)
            }),
        },
        "string" => NativeFunction {
            name: "string",
            args_count: 1,
            args_types: vec![TypeTag::Any],
            func: Rc::new(|_, _, args| match &args[0] {
                Value::Integer(value) => Ok(Value::String(Rc::new(value.to_string()))),
                Value::Float(value) => Ok(Value::String(Rc::new(format!("{value:?}")))),
                _ => Err(RuntimeError::new("argument to `string` not supported")),
            }),
        },
        "input" => NativeFunction {
            name: "input",
            args_count: -1,
            args_types: vec![],
            func: Rc::new(|_, _, args| {
                if let Some(prompt) = args.first() {
                    print!("{}", prompt.inspect());
                    std::io::stdout().flush().ok();
                }

                let mut line = String::new();
                std::io::stdin()
                    .lock()
                    .read_line(&mut line)
                    .map_err(|e| RuntimeError::new(format!("could not read input: {e}")))?;

                while line.ends_with('\n') || line.ends_with('\r') {
                    line.pop();
                }

                Ok(Value::String(Rc::new(line)))
            }),
        },
        "append" => NativeFunction {
            name: "append",
            args_count: 2,
            args_types: vec![TypeTag::Array, TypeTag::Any],
            func: Rc::new(|_, _, args| {
                let Value::Array(elements) = &args[0] else {
                    unreachable!("argument types already checked");
                };
                elements.borrow_mut().push(args[1].clone());

                Ok(args[0].clone())
            }),
        },
        "remove" => NativeFunction {
            name: "remove",
            args_count: 2,
            args_types: vec![TypeTag::Array, TypeTag::Integer],
            func: Rc::new(|_, _, args| {
                let (Value::Array(elements), Value::Integer(index)) = (&args[0], &args[1]) else {
                    unreachable!("argument types already checked");
                };

                let mut elements = elements.borrow_mut();
                if *index >= 0 && (*index as usize) < elements.len() {
                    elements.remove(*index as usize);
                }
                drop(elements);

                Ok(args[0].clone())
            }),
        },
        "clone" => NativeFunction {
            name: "clone",
            args_count: 1,
            args_types: vec![TypeTag::Any],
            func: Rc::new(|_, _, args| match &args[0] {
                Value::Array(elements) => Ok(Value::Array(Rc::new(RefCell::new(
                    elements.borrow().clone(),
                )))),
                Value::Hash(pairs) => Ok(Value::Hash(Rc::new(RefCell::new(pairs.borrow().clone())))),
                _ => Err(RuntimeError::new("argument to `clone` not supported")),
            }),
        },
        _ => return None,
    };

    Some(builtin)
}
