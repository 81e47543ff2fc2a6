//! JSX Lowering for the playroom compiler

use oxc_allocator::{Allocator, Box as oxc_box, CloneIn};
use oxc_ast::ast::*;
use oxc_ast::AstBuilder;
use oxc_ast_visit::walk_mut::walk_expression;
use oxc_ast_visit::VisitMut;
use oxc_span::SPAN;

use crate::config::IDENTIFIER_RE;

// ═══════════════════════════════════════════════════════════════════════════════
// JSX LOWERER
// Transforms JSX elements into `pragma(type, props, ...children)` calls
// ═══════════════════════════════════════════════════════════════════════════════

pub struct JsxLowerer<'a> {
    pub ast: AstBuilder<'a>,
    element_pragma: &'a str,
    fragment_pragma: &'a str,
}

impl<'a> JsxLowerer<'a> {
    pub fn new(allocator: &'a Allocator, element_pragma: &str, fragment_pragma: &str) -> Self {
        Self {
            ast: AstBuilder::new(allocator),
            element_pragma: allocator.alloc_str(element_pragma),
            fragment_pragma: allocator.alloc_str(fragment_pragma),
        }
    }

    fn lower_jsx_element(&mut self, element: &JSXElement<'a>) -> Expression<'a> {
        let type_expr = self.element_type(&element.opening_element.name);

        let mut current_obj_props = self.ast.vec();

        for item in &element.opening_element.attributes {
            match item {
                JSXAttributeItem::Attribute(attr) => {
                    let name = match &attr.name {
                        JSXAttributeName::Identifier(id) => id.name.to_string(),
                        JSXAttributeName::NamespacedName(ns) => {
                            format!("{}:{}", ns.namespace.name, ns.name.name)
                        }
                    };
                    let key = self.property_key(&name);

                    let value = match &attr.value {
                        Some(JSXAttributeValue::StringLiteral(s)) => {
                            Expression::StringLiteral(self.ast.alloc((**s).clone()))
                        }
                        Some(JSXAttributeValue::Element(el)) => self.lower_jsx_element(el),
                        Some(JSXAttributeValue::ExpressionContainer(container)) => {
                            self.lower_jsx_expression(&container.expression)
                                .unwrap_or_else(|| self.ast.expression_identifier(SPAN, "undefined"))
                        }
                        Some(JSXAttributeValue::Fragment(frag)) => self.lower_jsx_fragment(frag),
                        None => self.ast.expression_boolean_literal(SPAN, true),
                    };

                    current_obj_props.push(self.ast.object_property_kind_object_property(
                        SPAN,
                        PropertyKind::Init,
                        key,
                        value,
                        false,
                        false,
                        false,
                    ));
                }
                JSXAttributeItem::SpreadAttribute(spread) => {
                    let mut spread_expr = spread.argument.clone_in(self.ast.allocator);
                    self.visit_expression(&mut spread_expr);
                    current_obj_props.push(
                        self.ast
                            .object_property_kind_spread_property(SPAN, spread_expr),
                    );
                }
            }
        }

        let props_expr = if current_obj_props.is_empty() {
            self.ast.expression_identifier(SPAN, "null")
        } else {
            self.ast.expression_object(SPAN, current_obj_props)
        };

        let mut args = self.ast.vec();
        args.push(Argument::from(type_expr));
        args.push(Argument::from(props_expr));
        self.push_children(&element.children, &mut args);

        self.pragma_call(args)
    }

    fn lower_jsx_fragment(&mut self, fragment: &JSXFragment<'a>) -> Expression<'a> {
        let mut args = self.ast.vec();
        args.push(Argument::from(
            self.ast.expression_identifier(SPAN, self.fragment_pragma),
        ));
        args.push(Argument::from(self.ast.expression_identifier(SPAN, "null")));
        self.push_children(&fragment.children, &mut args);

        self.pragma_call(args)
    }

    fn push_children(
        &mut self,
        children: &oxc_allocator::Vec<'a, JSXChild<'a>>,
        args: &mut oxc_allocator::Vec<'a, Argument<'a>>,
    ) {
        for child in children {
            match child {
                JSXChild::Text(t) => {
                    if let Some(text) = clean_jsx_text(&t.value) {
                        let text_atom = self.ast.allocator.alloc_str(&text);
                        args.push(Argument::from(
                            self.ast.expression_string_literal(SPAN, text_atom, None),
                        ));
                    }
                }
                JSXChild::Element(el) => {
                    args.push(Argument::from(self.lower_jsx_element(el)));
                }
                JSXChild::Fragment(frag) => {
                    args.push(Argument::from(self.lower_jsx_fragment(frag)));
                }
                JSXChild::ExpressionContainer(container) => {
                    // `{/* comment */}` contributes no child
                    if let Some(expr) = self.lower_jsx_expression(&container.expression) {
                        args.push(Argument::from(expr));
                    }
                }
                JSXChild::Spread(spread) => {
                    let mut arg = spread.expression.clone_in(self.ast.allocator);
                    self.visit_expression(&mut arg);
                    args.push(Argument::from(arg));
                }
            }
        }
    }

    fn pragma_call(&self, args: oxc_allocator::Vec<'a, Argument<'a>>) -> Expression<'a> {
        let callee = self.ast.expression_identifier(SPAN, self.element_pragma);
        self.ast.expression_call(
            SPAN,
            callee,
            None::<oxc_box<TSTypeParameterInstantiation>>,
            args,
            false,
        )
    }

    /// Lowercase tags are intrinsic and become strings; everything else is a
    /// reference resolved against the evaluation scope.
    fn element_type(&self, name: &JSXElementName<'a>) -> Expression<'a> {
        match name {
            JSXElementName::Identifier(id) => {
                let tag_atom = self.ast.allocator.alloc_str(&id.name);
                self.ast.expression_string_literal(SPAN, tag_atom, None)
            }
            JSXElementName::NamespacedName(ns) => {
                let tag = format!("{}:{}", ns.namespace.name, ns.name.name);
                let tag_atom = self.ast.allocator.alloc_str(&tag);
                self.ast.expression_string_literal(SPAN, tag_atom, None)
            }
            JSXElementName::IdentifierReference(id) => {
                let name_atom = self.ast.allocator.alloc_str(&id.name);
                self.ast.expression_identifier(SPAN, name_atom)
            }
            JSXElementName::MemberExpression(me) => {
                let path = self.get_member_name(me);
                self.member_path(&path)
            }
            JSXElementName::ThisExpression(_) => self.ast.expression_identifier(SPAN, "this"),
        }
    }

    fn get_member_name(&self, me: &JSXMemberExpression<'a>) -> String {
        let object = match &me.object {
            JSXMemberExpressionObject::IdentifierReference(id) => id.name.to_string(),
            JSXMemberExpressionObject::MemberExpression(inner) => self.get_member_name(inner),
            _ => "this".to_string(),
        };
        format!("{}.{}", object, me.property.name)
    }

    fn member_path(&self, path: &str) -> Expression<'a> {
        let mut parts = path.split('.');
        let head = self.ast.allocator.alloc_str(parts.next().unwrap_or("this"));
        let mut expr = self.ast.expression_identifier(SPAN, head);
        for part in parts {
            let part_atom = self.ast.allocator.alloc_str(part);
            expr = Expression::from(self.ast.member_expression_static(
                SPAN,
                expr,
                self.ast.identifier_name(SPAN, part_atom),
                false,
            ));
        }
        expr
    }

    fn property_key(&self, name: &str) -> PropertyKey<'a> {
        let name_atom = self.ast.allocator.alloc_str(name);
        if IDENTIFIER_RE.is_match(name) {
            PropertyKey::StaticIdentifier(self.ast.alloc(self.ast.identifier_name(SPAN, name_atom)))
        } else {
            // `aria-label`, `xlink:href`
            PropertyKey::from(self.ast.expression_string_literal(SPAN, name_atom, None))
        }
    }

    fn lower_jsx_expression(&mut self, jsx_expr: &JSXExpression<'a>) -> Option<Expression<'a>> {
        jsx_expr
            .as_expression()
            .map(|e| e.clone_in(self.ast.allocator))
            .map(|mut e| {
                self.visit_expression(&mut e);
                e
            })
    }
}

impl<'a> VisitMut<'a> for JsxLowerer<'a> {
    fn visit_expression(&mut self, expr: &mut Expression<'a>) {
        match expr {
            Expression::JSXElement(element) => {
                let lowered = self.lower_jsx_element(element);
                *expr = lowered;
            }
            Expression::JSXFragment(fragment) => {
                let lowered = self.lower_jsx_fragment(fragment);
                *expr = lowered;
            }
            _ => {
                walk_expression(self, expr);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// JSX TEXT
// ═══════════════════════════════════════════════════════════════════════════════

/// Applies the JSX whitespace rules: lines are trimmed where they touch a
/// line break, whitespace-only lines vanish and the rest join with a space.
pub fn clean_jsx_text(raw: &str) -> Option<String> {
    let lines: Vec<&str> = raw.split('\n').map(|l| l.trim_end_matches('\r')).collect();
    let last_non_empty = lines.iter().rposition(|l| !l.trim().is_empty())?;

    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        let line = line.replace('\t', " ");
        let mut trimmed: &str = &line;
        if i != 0 {
            trimmed = trimmed.trim_start();
        }
        if i != lines.len() - 1 {
            trimmed = trimmed.trim_end();
        }
        if !trimmed.is_empty() {
            out.push_str(trimmed);
            if i != last_non_empty {
                out.push(' ');
            }
        }
    }

    if out.is_empty() {
        None
    } else {
        Some(decode_entities(&out))
    }
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut result = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        result.push_str(&rest[..start]);
        let after = &rest[start..];
        let decoded = after.find(';').and_then(|end| {
            let entity = &after[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity
                    .strip_prefix("#x")
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                result.push(c);
                rest = &after[end + 1..];
            }
            None => {
                result.push('&');
                rest = &after[1..];
            }
        }
    }
    result.push_str(rest);
    result
}
