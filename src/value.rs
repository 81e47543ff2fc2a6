//! Runtime values produced by evaluating compiled JSX
//!
//! Values follow JavaScript's loose typing closely enough for snippet code:
//! truthiness, string coercion, equality and `typeof` behave as a browser
//! would for the subset the interpreter supports.

use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

use crate::error::EvalError;
use crate::interpreter::{call_closure, Closure};

/// Element props and plain objects keep insertion order
pub type Props = IndexMap<String, Value>;

pub type NativeFn = dyn Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync;

#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(Props),
    Function(Function),
    Element(Arc<Element>),
    Component(ComponentRef),
    /// The fragment marker passed as an element type
    Fragment,
}

#[derive(Clone)]
pub enum Function {
    Native(NativeFunction),
    Closure(Closure),
}

#[derive(Clone)]
pub struct NativeFunction {
    name: Arc<str>,
    f: Arc<NativeFn>,
}

impl NativeFunction {
    pub fn new<F>(name: &str, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            f: Arc::new(f),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Function {
    pub fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        match self {
            Function::Native(native) => (native.f)(args),
            Function::Closure(closure) => call_closure(closure, args),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Function::Native(native) => native.name(),
            Function::Closure(closure) => closure.name().unwrap_or("anonymous"),
        }
    }

    fn same(&self, other: &Function) -> bool {
        match (self, other) {
            (Function::Native(a), Function::Native(b)) => Arc::ptr_eq(&a.f, &b.f),
            (Function::Closure(a), Function::Closure(b)) => a.same(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Function: {}]", self.name())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPONENTS & ELEMENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// A UI component supplied by the host's component library
pub trait Component: Send + Sync {
    fn render(&self, props: &Props, children: &[Value]) -> Result<Value, EvalError>;
}

impl<F> Component for F
where
    F: Fn(&Props, &[Value]) -> Result<Value, EvalError> + Send + Sync,
{
    fn render(&self, props: &Props, children: &[Value]) -> Result<Value, EvalError> {
        self(props, children)
    }
}

#[derive(Clone)]
pub struct ComponentRef {
    name: Arc<str>,
    inner: Arc<dyn Component>,
}

impl ComponentRef {
    pub fn new<F>(name: &str, render: F) -> Self
    where
        F: Fn(&Props, &[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        Self::from_component(name, render)
    }

    pub fn from_component(name: &str, component: impl Component + 'static) -> Self {
        Self {
            name: Arc::from(name),
            inner: Arc::new(component),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn render(&self, props: &Props, children: &[Value]) -> Result<Value, EvalError> {
        self.inner.render(props, children)
    }
}

impl fmt::Debug for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.name)
    }
}

#[derive(Debug, Clone)]
pub enum ElementKind {
    Intrinsic(String),
    Component(ComponentRef),
    Function(Function),
    Fragment,
}

#[derive(Debug, Clone)]
pub struct Element {
    pub kind: ElementKind,
    pub props: Props,
    pub children: Vec<Value>,
}

impl Element {
    pub fn intrinsic(tag: &str) -> Self {
        Self {
            kind: ElementKind::Intrinsic(tag.to_string()),
            props: Props::new(),
            children: Vec::new(),
        }
    }

    pub fn fragment(children: Vec<Value>) -> Self {
        Self {
            kind: ElementKind::Fragment,
            props: Props::new(),
            children,
        }
    }

    pub fn prop(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.props.insert(name.to_string(), value.into());
        self
    }

    pub fn child(mut self, value: impl Into<Value>) -> Self {
        self.children.push(value.into());
        self
    }

    pub fn children(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.children.extend(values);
        self
    }
}

impl From<Element> for Value {
    fn from(element: Element) -> Self {
        Value::Element(Arc::new(element))
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

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<NativeFunction> for Value {
    fn from(f: NativeFunction) -> Self {
        Value::Function(Function::Native(f))
    }
}

impl From<ComponentRef> for Value {
    fn from(c: ComponentRef) -> Self {
        Value::Component(c)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// JS SEMANTICS
// ═══════════════════════════════════════════════════════════════════════════════

impl Value {
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) | Value::Component(_) => "function",
            Value::Null
            | Value::Array(_)
            | Value::Object(_)
            | Value::Element(_)
            | Value::Fragment => "object",
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Array(items) if items.is_empty() => 0.0,
            Value::Array(items) if items.len() == 1 => items[0].to_number(),
            _ => f64::NAN,
        }
    }

    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    if item.is_nullish() {
                        String::new()
                    } else {
                        item.to_js_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Function(f) => format!("function {}() {{ [native code] }}", f.name()),
            Value::Component(c) => format!("function {}() {{ [native code] }}", c.name()),
            Value::Object(_) | Value::Element(_) | Value::Fragment => {
                "[object Object]".to_string()
            }
        }
    }

    /// `===`
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.same(b),
            (Value::Component(a), Value::Component(b)) => Arc::ptr_eq(&a.inner, &b.inner),
            (Value::Element(a), Value::Element(b)) => Arc::ptr_eq(a, b),
            (Value::Fragment, Value::Fragment) => true,
            _ => false,
        }
    }

    /// `==`
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_), Value::String(_))
            | (Value::String(_), Value::Number(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => {
                if matches!(self, Value::Bool(_) | Value::Number(_) | Value::String(_))
                    && matches!(other, Value::Bool(_) | Value::Number(_) | Value::String(_))
                {
                    self.to_number() == other.to_number()
                } else {
                    false
                }
            }
            _ => self.strict_equals(other),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => self.strict_equals(other),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Array(items) => f.debug_list().entries(items).finish(),
            Value::Object(props) => f.debug_map().entries(props.iter()).finish(),
            Value::Function(func) => write!(f, "{:?}", func),
            Value::Element(el) => write!(f, "{:?}", el),
            Value::Component(c) => write!(f, "{:?}", c),
            Value::Fragment => f.write_str("Fragment"),
        }
    }
}

/// Number to string the way JavaScript prints it for common values
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{}Infinity", sign)
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
