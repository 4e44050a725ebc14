//! The array method table. Receivers are shared handles, so mutating methods
//! (`push`, `pop`, `removeAt`) are visible through every binding of the same
//! array. Higher-order methods call back into the evaluator.

use std::cell::RefCell;
use std::rc::Rc;

use itertools::Itertools;

use crate::value::{NativeFunction, RuntimeError, TypeTag, Value};

pub fn lookup(this: &Rc<RefCell<Vec<Value>>>, name: &str) -> Option<NativeFunction> {
    let this = this.clone();

    let method = match name {
        "len" => NativeFunction {
            name: "len",
            args_count: 0,
            args_types: vec![],
            func: Rc::new(move |_, _, _| Ok(Value::Integer(this.borrow().len() as i64))),
        },
        "push" => NativeFunction {
            name: "push",
            args_count: 1,
            args_types: vec![TypeTag::Any],
            func: Rc::new(move |_, _, args| {
                this.borrow_mut().push(args[0].clone());
                Ok(Value::Array(this.clone()))
            }),
        },
        "pop" => NativeFunction {
            name: "pop",
            args_count: 0,
            args_types: vec![],
            func: Rc::new(move |_, _, _| {
                this.borrow_mut()
                    .pop()
                    .ok_or_else(|| RuntimeError::new("pop from an empty array"))
            }),
        },
        "join" => NativeFunction {
            name: "join",
            args_count: 1,
            args_types: vec![TypeTag::String],
            func: Rc::new(move |_, _, args| {
                let Value::String(separator) = &args[0] else {
                    unreachable!("argument types already checked");
                };
                let joined = this.borrow().iter().map(Value::inspect).join(separator.as_str());
                Ok(Value::String(Rc::new(joined)))
            }),
        },
        "map" => NativeFunction {
            name: "map",
            args_count: 1,
            args_types: vec![TypeTag::Function],
            func: Rc::new(move |evaluator, line, args| {
                let mut mapped = Vec::with_capacity(this.borrow().len());
                for element in this.borrow().iter().cloned().collect::<Vec<_>>() {
                    mapped.push(evaluator.apply_function(line, &args[0], vec![element])?);
                }
                Ok(Value::Array(Rc::new(RefCell::new(mapped))))
            }),
        },
        "filter" => NativeFunction {
            name: "filter",
            args_count: 1,
            args_types: vec![TypeTag::Function],
            func: Rc::new(move |evaluator, line, args| {
                let mut filtered = Vec::new();
                for element in this.borrow().iter().cloned().collect::<Vec<_>>() {
                    let keep = evaluator.apply_function(line, &args[0], vec![element.clone()])?;
                    if matches!(keep, Value::Boolean(true)) {
                        filtered.push(element);
                    }
                }
                Ok(Value::Array(Rc::new(RefCell::new(filtered))))
            }),
        },
        "reduce" => NativeFunction {
            name: "reduce",
            args_count: 2,
            args_types: vec![TypeTag::Function, TypeTag::Any],
            func: Rc::new(move |evaluator, line, args| {
                let mut accumulator = args[1].clone();
                for element in this.borrow().iter().cloned().collect::<Vec<_>>() {
                    accumulator =
                        evaluator.apply_function(line, &args[0], vec![accumulator, element])?;
                }
                Ok(accumulator)
            }),
        },
        "contains" => NativeFunction {
            name: "contains",
            args_count: 1,
            args_types: vec![TypeTag::Function],
            func: Rc::new(move |evaluator, line, args| {
                for element in this.borrow().iter().cloned().collect::<Vec<_>>() {
                    let found = evaluator.apply_function(line, &args[0], vec![element])?;
                    if matches!(found, Value::Boolean(true)) {
                        return Ok(Value::Boolean(true));
                    }
                }
                Ok(Value::Boolean(false))
            }),
        },
        "clone" => NativeFunction {
            name: "clone",
            args_count: 0,
            args_types: vec![],
            func: Rc::new(move |_, _, _| {
                Ok(Value::Array(Rc::new(RefCell::new(this.borrow().clone()))))
            }),
        },
        "removeAt" => NativeFunction {
            name: "removeAt",
            args_count: 1,
            args_types: vec![TypeTag::Integer],
            func: Rc::new(move |_, _, args| {
                let Value::Integer(index) = &args[0] else {
                    unreachable!("argument types already checked");
                };

                let mut elements = this.borrow_mut();
                if *index < 0 || *index as usize >= elements.len() {
                    return Err(RuntimeError::new(format!("index {index} out of bounds")));
                }

                Ok(elements.remove(*index as usize))
            }),
        },
        _ => return None,
    };

    Some(method)
}
