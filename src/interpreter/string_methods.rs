//! The string method table. Each entry binds the receiver into the returned
//! native, so `s.trim` is itself a callable value.

use std::cell::RefCell;
use std::rc::Rc;

use crate::value::{NativeFunction, RuntimeError, TypeTag, Value};

pub fn lookup(this: &Rc<String>, name: &str) -> Option<NativeFunction> {
    let this = this.clone();

    let method = match name {
        "len" => NativeFunction {
            name: "len",
            args_count: 0,
            args_types: vec![],
            func: Rc::new(move |_, _, _| Ok(Value::Integer(this.chars().count() as i64))),
        },
        "charAt" => NativeFunction {
            name: "charAt",
            args_count: 1,
            args_types: vec![TypeTag::Integer],
            func: Rc::new(move |_, _, args| {
                let Value::Integer(index) = &args[0] else {
                    unreachable!("argument types already checked");
                };
                if *index < 0 {
                    return Ok(Value::Nil);
                }

                match this.chars().nth(*index as usize) {
                    Some(ch) => Ok(Value::String(Rc::new(ch.to_string()))),
                    None => Ok(Value::Nil),
                }
            }),
        },
        "contains" => NativeFunction {
            name: "contains",
            args_count: 1,
            args_types: vec![TypeTag::String],
            func: Rc::new(move |_, _, args| {
                let Value::String(needle) = &args[0] else {
                    unreachable!("argument types already checked");
                };
                Ok(Value::Boolean(this.contains(needle.as_str())))
            }),
        },
        "indexOf" => NativeFunction {
            name: "indexOf",
            args_count: 1,
            args_types: vec![TypeTag::String],
            func: Rc::new(move |_, _, args| {
                let Value::String(needle) = &args[0] else {
                    unreachable!("argument types already checked");
                };
                let index = match this.find(needle.as_str()) {
                    Some(byte_index) => this[..byte_index].chars().count() as i64,
                    None => -1,
                };
                Ok(Value::Integer(index))
            }),
        },
        "split" => NativeFunction {
            name: "split",
            args_count: 1,
            args_types: vec![TypeTag::String],
            func: Rc::new(move |_, _, args| {
                let Value::String(separator) = &args[0] else {
                    unreachable!("argument types already checked");
                };

                let parts: Vec<Value> = this
                    .split(separator.as_str())
                    .map(|part| Value::String(Rc::new(part.to_string())))
                    .collect();

                Ok(Value::Array(Rc::new(RefCell::new(parts))))
            }),
        },
        "trim" => NativeFunction {
            name: "trim",
            args_count: 0,
            args_types: vec![],
            func: Rc::new(move |_, _, _| Ok(Value::String(Rc::new(this.trim().to_string())))),
        },
        "toUpperCase" => NativeFunction {
            name: "toUpperCase",
            args_count: 0,
            args_types: vec![],
            func: Rc::new(move |_, _, _| Ok(Value::String(Rc::new(this.to_uppercase())))),
        },
        "toLowerCase" => NativeFunction {
            name: "toLowerCase",
            args_count: 0,
            args_types: vec![],
            func: Rc::new(move |_, _, _| Ok(Value::String(Rc::new(this.to_lowercase())))),
        },
        "replaceAll" => NativeFunction {
            name: "replaceAll",
            args_count: 2,
            args_types: vec![TypeTag::String, TypeTag::String],
            func: Rc::new(move |_, _, args| {
                let (Value::String(from), Value::String(to)) = (&args[0], &args[1]) else {
                    unreachable!("argument types already checked");
                };
                Ok(Value::String(Rc::new(
                    this.replace(from.as_str(), to.as_str()),
                )))
            }),
        },
        "changeAt" => NativeFunction {
            name: "changeAt",
            args_count: 2,
            args_types: vec![TypeTag::Integer, TypeTag::String],
            func: Rc::new(move |_, _, args| {
                let (Value::Integer(index), Value::String(replacement)) = (&args[0], &args[1])
                else {
                    unreachable!("argument types already checked");
                };

                let length = this.chars().count();
                if *index < 0 || *index as usize >= length {
                    return Err(RuntimeError::new(format!(
                        "index out of range: got {index} max {}",
                        length as i64 - 1
                    )));
                }
                if replacement.chars().count() > 1 {
                    return Err(RuntimeError::new("new value can be at most one character"));
                }

                let changed: String = this
                    .chars()
                    .enumerate()
                    .flat_map(|(i, ch)| {
                        if i == *index as usize {
                            replacement.chars().collect::<Vec<_>>()
                        } else {
                            vec![ch]
                        }
                    })
                    .collect();

                Ok(Value::String(Rc::new(changed)))
            }),
        },
        _ => return None,
    };

    Some(method)
}
