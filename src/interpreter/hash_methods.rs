//! The hash method table, consulted only when a string key has no entry in
//! the hash itself.

use std::cell::RefCell;
use std::rc::Rc;

use crate::value::{HashPairs, NativeFunction, TypeTag, Value};

pub fn lookup(this: &Rc<RefCell<HashPairs>>, name: &str) -> Option<NativeFunction> {
    let this = this.clone();

    let method = match name {
        "len" => NativeFunction {
            name: "len",
            args_count: 0,
            args_types: vec![],
            func: Rc::new(move |_, _, _| Ok(Value::Integer(this.borrow().len() as i64))),
        },
        "keys" => NativeFunction {
            name: "keys",
            args_count: 0,
            args_types: vec![],
            // Keys come back in their inspect form, one string per entry.
            func: Rc::new(move |_, _, _| {
                let keys: Vec<Value> = this
                    .borrow()
                    .keys()
                    .map(|key| Value::String(Rc::new(key.inspect.clone())))
                    .collect();
                Ok(Value::Array(Rc::new(RefCell::new(keys))))
            }),
        },
        "contains" => NativeFunction {
            name: "contains",
            args_count: 1,
            args_types: vec![TypeTag::Any],
            func: Rc::new(move |_, _, args| match args[0].hash_key() {
                Some(key) => Ok(Value::Boolean(this.borrow().contains_key(&key))),
                None => Ok(Value::Boolean(false)),
            }),
        },
        "clone" => NativeFunction {
            name: "clone",
            args_count: 0,
            args_types: vec![],
            func: Rc::new(move |_, _, _| {
                Ok(Value::Hash(Rc::new(RefCell::new(this.borrow().clone()))))
            }),
        },
        _ => return None,
    };

    Some(method)
}
