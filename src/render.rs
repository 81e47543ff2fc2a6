//! Materialization of evaluated values into a render tree

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::EvalError;
use crate::value::{format_number, Element, ElementKind, Props, Value};

/// Maximum component nesting before rendering is aborted
pub const MAX_DEPTH: usize = 64;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const UNITLESS_STYLES: &[&str] = &[
    "opacity",
    "zIndex",
    "flex",
    "flexGrow",
    "flexShrink",
    "fontWeight",
    "lineHeight",
    "order",
    "zoom",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RenderNode {
    Element {
        tag: String,
        attributes: IndexMap<String, String>,
        children: Vec<RenderNode>,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderTree {
    pub nodes: Vec<RenderNode>,
}

impl RenderTree {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            write_html(node, &mut out);
        }
        out
    }

    /// Concatenated text of every text node, in document order
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            collect_text(node, &mut out);
        }
        out
    }
}

pub fn render_value(value: &Value) -> Result<RenderTree, EvalError> {
    let mut nodes = Vec::new();
    materialize(value, 0, &mut nodes)?;
    Ok(RenderTree { nodes })
}

fn materialize(value: &Value, depth: usize, out: &mut Vec<RenderNode>) -> Result<(), EvalError> {
    if depth > MAX_DEPTH {
        return Err(EvalError::DepthExceeded(MAX_DEPTH));
    }
    match value {
        Value::Undefined | Value::Null | Value::Bool(_) | Value::Fragment => {}
        // React ignores functions passed as children
        Value::Function(_) | Value::Component(_) => {}
        Value::Number(n) => out.push(RenderNode::Text {
            text: format_number(*n),
        }),
        Value::String(s) => out.push(RenderNode::Text { text: s.clone() }),
        Value::Array(items) => {
            for item in items {
                materialize(item, depth, out)?;
            }
        }
        Value::Object(props) => {
            let keys = props.keys().cloned().collect::<Vec<_>>().join(", ");
            return Err(EvalError::type_error(format!(
                "Objects are not valid as a React child (found: object with keys {{{}}})",
                keys
            )));
        }
        Value::Element(element) => materialize_element(element, depth, out)?,
    }
    Ok(())
}

fn element_children(element: &Element) -> Vec<Value> {
    if element.children.is_empty() {
        match element.props.get("children") {
            Some(Value::Array(items)) => items.clone(),
            Some(value) => vec![value.clone()],
            None => Vec::new(),
        }
    } else {
        element.children.clone()
    }
}

fn materialize_element(
    element: &Element,
    depth: usize,
    out: &mut Vec<RenderNode>,
) -> Result<(), EvalError> {
    let children = element_children(element);
    match &element.kind {
        ElementKind::Fragment => {
            for child in &children {
                materialize(child, depth, out)?;
            }
        }
        ElementKind::Intrinsic(tag) => {
            let mut rendered = Vec::new();
            for child in &children {
                materialize(child, depth + 1, &mut rendered)?;
            }
            out.push(RenderNode::Element {
                tag: tag.clone(),
                attributes: attributes(&element.props),
                children: rendered,
            });
        }
        ElementKind::Component(component) => {
            let result = component
                .render(&element.props, &children)
                .and_then(|value| {
                    let mut rendered = Vec::new();
                    materialize(&value, depth + 1, &mut rendered)?;
                    Ok(rendered)
                });
            out.extend(result.map_err(|e| attribute_error(component.name(), e))?);
        }
        ElementKind::Function(function) => {
            let mut props = element.props.clone();
            if !children.is_empty() {
                props.insert("children".to_string(), Value::Array(children));
            }
            let result = function.call(&[Value::Object(props)]).and_then(|value| {
                let mut rendered = Vec::new();
                materialize(&value, depth + 1, &mut rendered)?;
                Ok(rendered)
            });
            out.extend(result.map_err(|e| attribute_error(function.name(), e))?);
        }
    }
    Ok(())
}

/// Name the innermost failing component, once
fn attribute_error(name: &str, error: EvalError) -> EvalError {
    match error {
        EvalError::Component { .. } | EvalError::DepthExceeded(_) => error,
        other => EvalError::component(name, other.to_string()),
    }
}

fn attributes(props: &Props) -> IndexMap<String, String> {
    let mut attrs = IndexMap::new();
    for (name, value) in props {
        if matches!(name.as_str(), "children" | "key" | "ref") {
            continue;
        }
        let attr_name = match name.as_str() {
            "className" => "class",
            "htmlFor" => "for",
            other => other,
        };
        let boolean_as_string = attr_name.starts_with("aria-") || attr_name.starts_with("data-");
        let rendered = match value {
            Value::Undefined | Value::Null | Value::Function(_) | Value::Component(_) => continue,
            Value::Bool(b) if boolean_as_string => b.to_string(),
            Value::Bool(true) => String::new(),
            Value::Bool(false) => continue,
            Value::Object(style) if attr_name == "style" => style_string(style),
            other => other.to_js_string(),
        };
        attrs.insert(attr_name.to_string(), rendered);
    }
    attrs
}

fn style_string(style: &Props) -> String {
    style
        .iter()
        .filter(|(_, v)| !v.is_nullish() && !matches!(v, Value::Bool(_)))
        .map(|(name, value)| {
            let css_value = match value {
                Value::Number(n) if *n != 0.0 && !UNITLESS_STYLES.contains(&name.as_str()) => {
                    format!("{}px", format_number(*n))
                }
                other => other.to_js_string(),
            };
            format!("{}:{}", kebab_case(name), css_value)
        })
        .collect::<Vec<_>>()
        .join(";")
}

fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn write_html(node: &RenderNode, out: &mut String) {
    match node {
        RenderNode::Text { text } => out.push_str(&escape_text(text)),
        RenderNode::Element {
            tag,
            attributes,
            children,
        } => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in attributes {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape_attribute(value));
                out.push('"');
            }
            if VOID_ELEMENTS.contains(&tag.as_str()) {
                out.push_str(" />");
                return;
            }
            out.push('>');
            for child in children {
                write_html(child, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

fn collect_text(node: &RenderNode, out: &mut String) {
    match node {
        RenderNode::Text { text } => out.push_str(text),
        RenderNode::Element { children, .. } => {
            for child in children {
                collect_text(child, out);
            }
        }
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(text: &str) -> String {
    escape_text(text).replace('"', "&quot;")
}
