//! Evaluation scope construction
//!
//! The scope snippet code runs against is the union of the host's user
//! scope and the component registry, plus the JSX pragma functions the
//! compiler emits calls to.

use indexmap::IndexMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::{PragmaSettings, IDENTIFIER_RE};
use crate::error::{EvalError, PlayroomError, Result};
use crate::value::{ComponentRef, Element, ElementKind, NativeFunction, Props, Value};

/// Name of the library object exposing `createElement` and `Fragment`
pub const LIBRARY_NAME: &str = "Playroom";

pub type ScopeFactory = Arc<dyn Fn() -> IndexMap<String, Value> + Send + Sync>;

// ═══════════════════════════════════════════════════════════════════════════════
// EVAL SCOPE
// ═══════════════════════════════════════════════════════════════════════════════

/// Flat, immutable name -> value environment. Cheap to clone.
#[derive(Clone, Default)]
pub struct EvalScope {
    bindings: Arc<IndexMap<String, Value>>,
}

impl EvalScope {
    pub fn from_bindings(bindings: IndexMap<String, Value>) -> Self {
        Self {
            bindings: Arc::new(bindings),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl std::fmt::Debug for EvalScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.bindings.keys()).finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPONENT REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

/// One named export of the host's component module
#[derive(Clone)]
pub enum Export {
    Component(ComponentRef),
    Value(Value),
    /// Type-only exports carry no runtime value
    TypeOnly,
}

#[derive(Clone, Default)]
pub struct ComponentRegistry {
    entries: IndexMap<String, Value>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only exports that can be rendered or hold renderable members
    pub fn from_exports<I, S>(exports: I) -> Self
    where
        I: IntoIterator<Item = (S, Export)>,
        S: Into<String>,
    {
        let mut entries = IndexMap::new();
        for (name, export) in exports {
            let name = name.into();
            if !IDENTIFIER_RE.is_match(&name) {
                debug!("Skipping export '{}': not a valid identifier", name);
                continue;
            }
            match export {
                Export::Component(component) => {
                    entries.insert(name, Value::Component(component));
                }
                Export::Value(value) if is_component_like(&value) => {
                    entries.insert(name, value);
                }
                Export::Value(_) => debug!("Skipping export '{}': not component-like", name),
                Export::TypeOnly => debug!("Skipping type-only export '{}'", name),
            }
        }
        Self { entries }
    }

    pub fn with_component(mut self, component: ComponentRef) -> Self {
        self.entries
            .insert(component.name().to_string(), Value::Component(component));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_component_like(value: &Value) -> bool {
    match value {
        Value::Component(_) | Value::Function(_) => true,
        // namespaces such as `Icons.Star`
        Value::Object(members) => members
            .values()
            .any(|v| matches!(v, Value::Component(_) | Value::Function(_))),
        _ => false,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCOPE BUILDER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct ScopeBuilder {
    pragma: PragmaSettings,
    user_scope: Option<ScopeFactory>,
}

impl ScopeBuilder {
    pub fn new(pragma: &PragmaSettings) -> Self {
        Self {
            pragma: pragma.clone(),
            user_scope: None,
        }
    }

    pub fn with_user_scope<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> IndexMap<String, Value> + Send + Sync + 'static,
    {
        self.user_scope = Some(Arc::new(factory));
        self
    }

    pub fn with_scope_factory(mut self, factory: Option<ScopeFactory>) -> Self {
        self.user_scope = factory;
        self
    }

    /// Merge user scope and registry (registry wins), reject reserved
    /// pragma names, then add the pragma functions and library object.
    pub fn build(&self, registry: &ComponentRegistry) -> Result<EvalScope> {
        let mut bindings = match &self.user_scope {
            Some(factory) => factory(),
            None => IndexMap::new(),
        };
        for (name, value) in &registry.entries {
            bindings.insert(name.clone(), value.clone());
        }

        for reserved in self.pragma.reserved_names() {
            if bindings.contains_key(reserved) {
                return Err(PlayroomError::ReservedIdentifier {
                    name: reserved.to_string(),
                });
            }
        }

        let create_element = Value::from(NativeFunction::new("createElement", create_element));
        bindings.insert(self.pragma.element.clone(), create_element.clone());
        bindings.insert(self.pragma.fragment.clone(), Value::Fragment);

        let mut library = Props::new();
        library.insert("createElement".to_string(), create_element);
        library.insert("Fragment".to_string(), Value::Fragment);
        bindings.insert(LIBRARY_NAME.to_string(), Value::Object(library));

        debug!("Built evaluation scope with {} bindings", bindings.len());
        Ok(EvalScope::from_bindings(bindings))
    }
}

/// `createElement(type, props, ...children)`
pub fn create_element(args: &[Value]) -> std::result::Result<Value, EvalError> {
    let kind = match args.first() {
        Some(Value::String(tag)) => ElementKind::Intrinsic(tag.clone()),
        Some(Value::Component(component)) => ElementKind::Component(component.clone()),
        Some(Value::Function(function)) => ElementKind::Function(function.clone()),
        Some(Value::Fragment) => ElementKind::Fragment,
        other => {
            let got = other.map(|v| v.type_of()).unwrap_or("undefined");
            return Err(EvalError::type_error(format!(
                "Element type is invalid: expected a string or a component but got: {}",
                got
            )));
        }
    };

    let props = match args.get(1) {
        None | Some(Value::Null) | Some(Value::Undefined) => Props::new(),
        Some(Value::Object(props)) => props.clone(),
        Some(other) => {
            return Err(EvalError::type_error(format!(
                "Element props must be an object, got {}",
                other.type_of()
            )))
        }
    };

    let children = args.iter().skip(2).cloned().collect();
    Ok(Value::from(Element {
        kind,
        props,
        children,
    }))
}
