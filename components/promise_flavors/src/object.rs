//! Object-aware promises.

use promise_core::{Api, Flavor, Promise, Value};

use crate::key_arg;

/// Builds the object capability set.
pub fn object_api() -> Api {
    Api::named("object")
        .method("get", |this, args| Ok(get(this, key_arg(args, 0)).into()))
        .method("set", |this, args| {
            let value = args.get(1).cloned().unwrap_or(Value::Undefined);
            Ok(set(this, key_arg(args, 0), value).into())
        })
        .method("delete", |this, args| Ok(delete(this, key_arg(args, 0)).into()))
        .method("invoke", |this, args| {
            let rest = args.get(1..).unwrap_or_default().to_vec();
            Ok(invoke(this, key_arg(args, 0), rest).into())
        })
}

/// Derives the object flavor from `base`.
pub fn object_flavor(base: &Flavor) -> Flavor {
    base.extend(object_api(), None)
}

fn get(this: &Promise, key: String) -> Promise {
    this.and_then(move |object| object.get_property(&key))
}

fn set(this: &Promise, key: String, value: Value) -> Promise {
    this.and_then(move |object| {
        object.set_property(&key, value.clone())?;
        Ok(object)
    })
}

fn delete(this: &Promise, key: String) -> Promise {
    this.and_then(move |object| {
        object.delete_property(&key)?;
        Ok(object)
    })
}

fn invoke(this: &Promise, name: String, args: Vec<Value>) -> Promise {
    this.and_then(move |object| object.get_property(&name)?.call(&object, &args))
}

/// Typed access to the object capabilities of a promise.
pub trait ObjectPromise {
    /// Fulfills with the property `key` of the eventual object.
    fn get(&self, key: &str) -> Promise;
    /// Sets a property and fulfills with the mutated object.
    fn set(&self, key: &str, value: Value) -> Promise;
    /// Deletes a property and fulfills with the mutated object.
    fn delete(&self, key: &str) -> Promise;
    /// Calls the method `name` with the object as `this` and fulfills with
    /// its result.
    fn invoke(&self, name: &str, args: Vec<Value>) -> Promise;
}

impl ObjectPromise for Promise {
    fn get(&self, key: &str) -> Promise {
        self.send("get", &[Value::from(key)])
    }

    fn set(&self, key: &str, value: Value) -> Promise {
        self.send("set", &[Value::from(key), value])
    }

    fn delete(&self, key: &str) -> Promise {
        self.send("delete", &[Value::from(key)])
    }

    fn invoke(&self, name: &str, args: Vec<Value>) -> Promise {
        let mut all = vec![Value::from(name)];
        all.extend(args);
        self.send("invoke", &all)
    }
}
