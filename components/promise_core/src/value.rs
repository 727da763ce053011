//! Dynamic value model the engine resolves promises with.
//!
//! Promises carry arbitrary values: primitives, shared arrays and objects,
//! callables, other promises and engine errors. Reference variants are shared
//! handles and compare by identity; primitives compare by value.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use core_types::JsError;

use crate::promise::Promise;

/// The outcome of calling a [`Function`]: `Err` carries a thrown value.
pub type Completion = Result<Value, Value>;

/// Represents any value a promise can be resolved or rejected with.
///
/// # Examples
///
/// ```
/// use promise_core::Value;
///
/// let undefined = Value::Undefined;
/// let number = Value::from(42);
///
/// assert!(!undefined.is_truthy());
/// assert!(number.is_truthy());
/// assert_eq!(number.type_of(), "number");
/// ```
#[derive(Clone)]
pub enum Value {
    /// The absent value
    Undefined,
    /// The null value
    Null,
    /// A boolean
    Boolean(bool),
    /// An IEEE 754 double
    Number(f64),
    /// A string
    String(String),
    /// A shared, possibly sparse array
    Array(Array),
    /// A shared property map
    Object(Object),
    /// A shared callable
    Function(Function),
    /// A promise from some engine core
    Promise(Promise),
    /// An engine error
    Error(JsError),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "Undefined"),
            Value::Null => write!(f, "Null"),
            Value::Boolean(b) => f.debug_tuple("Boolean").field(b).finish(),
            Value::Number(n) => f.debug_tuple("Number").field(n).finish(),
            Value::String(s) => f.debug_tuple("String").field(s).finish(),
            Value::Array(a) => f.debug_list().entries(a.to_vec()).finish(),
            Value::Object(o) => f.debug_tuple("Object").field(&o.keys()).finish(),
            Value::Function(func) => f.debug_tuple("Function").field(&func.name()).finish(),
            Value::Promise(p) => f.debug_tuple("Promise").field(&p.id()).finish(),
            Value::Error(e) => f.debug_tuple("Error").field(e).finish(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Promise(a), Value::Promise(b)) => a.ptr_eq(b),
            (Value::Error(a), Value::Error(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Returns whether this value is truthy.
    ///
    /// `undefined`, `null`, `false`, `0`, `NaN` and the empty string are
    /// falsy; every reference value is truthy.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_core::Value;
    ///
    /// assert!(!Value::Undefined.is_truthy());
    /// assert!(!Value::Number(f64::NAN).is_truthy());
    /// assert!(!Value::from("").is_truthy());
    /// assert!(Value::from(vec![Value::Null]).is_truthy());
    /// ```
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined => false,
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => !n.is_nan() && *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(_)
            | Value::Object(_)
            | Value::Function(_)
            | Value::Promise(_)
            | Value::Error(_) => true,
        }
    }

    /// Returns the `typeof` name of this value.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
            Value::Array(_) | Value::Object(_) | Value::Promise(_) | Value::Error(_) => "object",
        }
    }

    /// Returns true for `undefined`.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Returns the number if this is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string slice if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the array handle if this is an array.
    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Returns the object handle if this is an object.
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Returns the function handle if this is a function.
    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(func) => Some(func),
            _ => None,
        }
    }

    /// Returns the promise handle if this is a promise.
    pub fn as_promise(&self) -> Option<&Promise> {
        match self {
            Value::Promise(p) => Some(p),
            _ => None,
        }
    }

    /// Returns the engine error if this is one.
    pub fn as_error(&self) -> Option<&JsError> {
        match self {
            Value::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Returns true if the value has an own property named `key`.
    ///
    /// Only objects carry named properties; the check never runs accessors.
    pub fn has_property(&self, key: &str) -> bool {
        match self {
            Value::Object(o) => o.has(key),
            _ => false,
        }
    }

    /// Reads a property, running accessors.
    ///
    /// Arrays expose `length` and their indices. Reading from `undefined` or
    /// `null` throws a `TypeError`; other primitives have no properties.
    pub fn get_property(&self, key: &str) -> Completion {
        match self {
            Value::Object(o) => o.get(key),
            Value::Array(a) => {
                if key == "length" {
                    return Ok(Value::from(a.len()));
                }
                Ok(key
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| a.get(index))
                    .unwrap_or(Value::Undefined))
            }
            Value::Undefined | Value::Null => Err(JsError::type_error(format!(
                "cannot read property '{}' of {}",
                key, self
            ))
            .into()),
            _ => Ok(Value::Undefined),
        }
    }

    /// Writes a property.
    pub fn set_property(&self, key: &str, value: Value) -> Result<(), Value> {
        match self {
            Value::Object(o) => {
                o.set(key, value);
                Ok(())
            }
            Value::Array(a) => match key.parse::<usize>() {
                Ok(index) => {
                    a.set(index, value);
                    Ok(())
                }
                Err(_) => Err(JsError::type_error(format!(
                    "cannot set property '{}' of array",
                    key
                ))
                .into()),
            },
            other => Err(JsError::type_error(format!(
                "cannot set property '{}' of {}",
                key, other
            ))
            .into()),
        }
    }

    /// Deletes a property, returning whether it existed.
    pub fn delete_property(&self, key: &str) -> Result<bool, Value> {
        match self {
            Value::Object(o) => Ok(o.delete(key)),
            Value::Array(a) => Ok(key
                .parse::<usize>()
                .map(|index| a.delete(index))
                .unwrap_or(false)),
            other => Err(JsError::type_error(format!(
                "cannot delete property '{}' of {}",
                key, other
            ))
            .into()),
        }
    }

    /// Calls this value as a function.
    pub fn call(&self, this: &Value, args: &[Value]) -> Completion {
        match self {
            Value::Function(func) => func.call(this, args),
            other => Err(JsError::type_error(format!("{} is not a function", other)).into()),
        }
    }
}

/// Formats a value the way string conversion does.
///
/// # Examples
///
/// ```
/// use promise_core::Value;
///
/// assert_eq!(Value::Undefined.to_string(), "undefined");
/// assert_eq!(Value::from(42).to_string(), "42");
/// assert_eq!(Value::from(vec![Value::from(1), Value::from(2)]).to_string(), "1,2");
/// ```
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => {
                if n.is_nan() {
                    write!(f, "NaN")
                } else if n.is_infinite() {
                    if n.is_sign_positive() {
                        write!(f, "Infinity")
                    } else {
                        write!(f, "-Infinity")
                    }
                } else if n.fract() == 0.0 && n.abs() < 1e15 {
                    // Integer-valued doubles display without decimal point
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::String(s) => write!(f, "{}", s),
            Value::Array(a) => {
                let parts: Vec<String> = a
                    .to_vec()
                    .into_iter()
                    .map(|slot| match slot {
                        None | Some(Value::Undefined) | Some(Value::Null) => String::new(),
                        Some(value) => value.to_string(),
                    })
                    .collect();
                write!(f, "{}", parts.join(","))
            }
            Value::Object(_) => write!(f, "[object Object]"),
            Value::Function(func) => {
                write!(f, "function {}() {{ [native code] }}", func.name())
            }
            Value::Promise(_) => write!(f, "[object Promise]"),
            Value::Error(e) => write!(f, "{}", e),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Undefined
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::Array(Array::from_values(values))
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Value::Array(a)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl From<Function> for Value {
    fn from(func: Function) -> Self {
        Value::Function(func)
    }
}

impl From<Promise> for Value {
    fn from(p: Promise) -> Self {
        Value::Promise(p)
    }
}

impl From<JsError> for Value {
    fn from(e: JsError) -> Self {
        Value::Error(e)
    }
}

/// A shared, growable, possibly sparse array. `None` slots are holes.
#[derive(Clone, Default)]
pub struct Array {
    slots: Rc<RefCell<Vec<Option<Value>>>>,
}

impl Array {
    /// Creates an empty array.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a dense array.
    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        Self::from_slots(values.into_iter().map(Some).collect())
    }

    /// Creates an array from slots, where `None` marks a hole.
    pub fn from_slots(slots: Vec<Option<Value>>) -> Self {
        Self {
            slots: Rc::new(RefCell::new(slots)),
        }
    }

    /// Returns the length, holes included.
    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    /// Returns true if the array has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.borrow().is_empty()
    }

    /// Returns the element at `index`, or None for a hole or out of range.
    pub fn get(&self, index: usize) -> Option<Value> {
        self.slots.borrow().get(index).cloned().flatten()
    }

    /// Stores `value` at `index`, growing the array with holes as needed.
    pub fn set(&self, index: usize, value: Value) {
        let mut slots = self.slots.borrow_mut();
        if index >= slots.len() {
            slots.resize(index + 1, None);
        }
        slots[index] = Some(value);
    }

    /// Turns the slot at `index` into a hole.
    pub fn delete(&self, index: usize) -> bool {
        match self.slots.borrow_mut().get_mut(index) {
            Some(slot) => slot.take().is_some(),
            None => false,
        }
    }

    /// Appends a value.
    pub fn push(&self, value: Value) {
        self.slots.borrow_mut().push(Some(value));
    }

    /// Returns a snapshot of the slots.
    pub fn to_vec(&self) -> Vec<Option<Value>> {
        self.slots.borrow().clone()
    }

    /// Returns a snapshot of the elements with holes read as `undefined`.
    pub fn values(&self) -> Vec<Value> {
        self.slots
            .borrow()
            .iter()
            .map(|slot| slot.clone().unwrap_or(Value::Undefined))
            .collect()
    }

    /// Returns true if both handles refer to the same array.
    pub fn ptr_eq(&self, other: &Array) -> bool {
        Rc::ptr_eq(&self.slots, &other.slots)
    }
}

/// A named property of an [`Object`].
#[derive(Clone)]
pub enum Property {
    /// A plain stored value
    Data(Value),
    /// A getter run on every read
    Accessor(Function),
}

/// A shared property map.
///
/// # Examples
///
/// ```
/// use promise_core::{Object, Value};
///
/// let object = Object::from_entries([("answer", Value::from(42))]);
/// assert_eq!(object.get("answer").unwrap(), Value::from(42));
/// assert!(object.get("missing").unwrap().is_undefined());
/// ```
#[derive(Clone, Default)]
pub struct Object {
    properties: Rc<RefCell<BTreeMap<String, Property>>>,
}

impl Object {
    /// Creates an empty object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an object with data properties.
    pub fn from_entries<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        let object = Self::new();
        for (key, value) in entries {
            object.set(key, value);
        }
        object
    }

    /// Returns true if the object has a property named `key`.
    pub fn has(&self, key: &str) -> bool {
        self.properties.borrow().contains_key(key)
    }

    /// Reads a property. Accessors run with the object as `this` and may fail.
    pub fn get(&self, key: &str) -> Completion {
        let property = self.properties.borrow().get(key).cloned();
        match property {
            Some(Property::Data(value)) => Ok(value),
            Some(Property::Accessor(getter)) => getter.call(&Value::Object(self.clone()), &[]),
            None => Ok(Value::Undefined),
        }
    }

    /// Stores a data property, replacing any accessor.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.properties
            .borrow_mut()
            .insert(key.into(), Property::Data(value));
    }

    /// Installs a getter for `key`.
    pub fn define_getter(&self, key: impl Into<String>, getter: Function) {
        self.properties
            .borrow_mut()
            .insert(key.into(), Property::Accessor(getter));
    }

    /// Removes a property, returning whether it existed.
    pub fn delete(&self, key: &str) -> bool {
        self.properties.borrow_mut().remove(key).is_some()
    }

    /// Returns the property names in order.
    pub fn keys(&self) -> Vec<String> {
        self.properties.borrow().keys().cloned().collect()
    }

    /// Returns true if both handles refer to the same object.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.properties, &other.properties)
    }
}

type NativeFn = dyn Fn(&Value, &[Value]) -> Completion;

struct FunctionInner {
    name: String,
    body: Box<NativeFn>,
}

/// A shared callable taking `this` and an argument list.
///
/// # Examples
///
/// ```
/// use promise_core::{Function, Value};
///
/// let double = Function::new(|x| Ok(Value::from(x.as_number().unwrap_or(0.0) * 2.0)));
/// assert_eq!(double.call1(Value::from(21)).unwrap(), Value::from(42));
/// ```
#[derive(Clone)]
pub struct Function {
    inner: Rc<FunctionInner>,
}

impl Function {
    /// Creates an anonymous function of one argument; `this` is ignored.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Value) -> Completion + 'static,
    {
        Self::native("", move |_this, args| {
            f(args.first().cloned().unwrap_or(Value::Undefined))
        })
    }

    /// Creates a named function receiving `this` and the full argument list.
    pub fn native<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Completion + 'static,
    {
        Self {
            inner: Rc::new(FunctionInner {
                name: name.into(),
                body: Box::new(f),
            }),
        }
    }

    /// Returns the function name; empty for anonymous functions.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Calls the function.
    pub fn call(&self, this: &Value, args: &[Value]) -> Completion {
        (self.inner.body)(this, args)
    }

    /// Calls the function with `this = undefined` and a single argument.
    pub fn call1(&self, arg: Value) -> Completion {
        self.call(&Value::Undefined, &[arg])
    }

    /// Returns a function with a fixed `this` and leading arguments.
    pub fn bind(&self, this: Value, leading: Vec<Value>) -> Function {
        let target = self.clone();
        Self::native(format!("bound {}", self.name()), move |_this, args| {
            let mut all = leading.clone();
            all.extend_from_slice(args);
            target.call(&this, &all)
        })
    }

    /// Returns true if both handles refer to the same function.
    pub fn ptr_eq(&self, other: &Function) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Object").field(&self.keys()).finish()
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function {{ {} }}", self.name())
    }
}
