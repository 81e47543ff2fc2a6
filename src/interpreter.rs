//! Expression interpreter for compiled playroom code
//!
//! Compiled code is parsed again with oxc and lowered into a small owned IR,
//! then evaluated against an [`EvalScope`]. The IR owns all its data, so
//! closures can outlive the parser's arena and be called later by
//! components or native helpers.
//!
//! Only the expression-level subset that snippet code uses is supported;
//! everything else reports [`EvalError::Unsupported`] instead of guessing.

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Argument, ArrayExpressionElement, ArrowFunctionExpression, BindingPattern, CallExpression,
    ChainElement, ComputedMemberExpression, Expression, FormalParameters,
    Function as JsFunction, ObjectPropertyKind, PropertyKind, Statement, StaticMemberExpression,
};
use oxc_parser::Parser;
use oxc_span::SourceType;
use oxc_syntax::operator::{BinaryOperator, LogicalOperator, UnaryOperator};
use std::cell::Cell;
use std::cmp::Ordering;
use std::sync::Arc;

use crate::builtins;
use crate::error::EvalError;
use crate::scope::EvalScope;
use crate::value::{Function, Props, Value};

// ═══════════════════════════════════════════════════════════════════════════════
// IR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub(crate) enum Expr {
    Literal(Value),
    Ident(String),
    Template {
        quasis: Vec<String>,
        exprs: Vec<Expr>,
    },
    Array(Vec<Item>),
    Object(Vec<ObjectEntry>),
    Member {
        object: Box<Expr>,
        property: Box<Key>,
        optional: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Item>,
        optional: bool,
    },
    /// Boundary of an optional chain: a short-circuit inside yields `undefined`
    Chain(Box<Expr>),
    Unary {
        op: UnaryOperator,
        argument: Box<Expr>,
    },
    Binary {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Sequence(Vec<Expr>),
    Function(Arc<Lambda>),
}

#[derive(Debug)]
pub(crate) enum Item {
    Expr(Expr),
    Spread(Expr),
    Hole,
}

#[derive(Debug)]
pub(crate) enum ObjectEntry {
    Property { key: Key, value: Expr },
    Spread(Expr),
}

#[derive(Debug)]
pub(crate) enum Key {
    Static(String),
    Computed(Expr),
}

#[derive(Debug)]
pub(crate) enum Pattern {
    Ident(String),
    Object {
        properties: Vec<(String, Pattern)>,
        rest: Option<String>,
    },
    Array {
        elements: Vec<Option<Pattern>>,
        rest: Option<String>,
    },
}

#[derive(Debug)]
pub(crate) struct Lambda {
    name: Option<String>,
    params: Vec<Pattern>,
    body: Body,
}

#[derive(Debug)]
pub(crate) enum Body {
    Expr(Expr),
    Block(Vec<Stmt>),
}

#[derive(Debug)]
pub(crate) enum Stmt {
    Declare(Vec<(Pattern, Option<Expr>)>),
    Return(Option<Expr>),
    Expr(Expr),
    If {
        test: Expr,
        consequent: Vec<Stmt>,
        alternate: Option<Vec<Stmt>>,
    },
    Block(Vec<Stmt>),
    Function { name: String, lambda: Arc<Lambda> },
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENVIRONMENT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub(crate) struct Env(Arc<EnvNode>);

enum EnvNode {
    Global(EvalScope),
    Binding {
        name: String,
        value: Value,
        parent: Env,
    },
}

impl Env {
    fn global(scope: EvalScope) -> Self {
        Env(Arc::new(EnvNode::Global(scope)))
    }

    fn bind(&self, name: impl Into<String>, value: Value) -> Env {
        Env(Arc::new(EnvNode::Binding {
            name: name.into(),
            value,
            parent: self.clone(),
        }))
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        let mut node = self;
        loop {
            match &*node.0 {
                EnvNode::Binding {
                    name: bound,
                    value,
                    parent,
                } => {
                    if bound == name {
                        return Some(value.clone());
                    }
                    node = parent;
                }
                EnvNode::Global(scope) => {
                    return scope.get(name).cloned().or_else(|| builtins::global(name));
                }
            }
        }
    }
}

/// A function value created by evaluating an arrow or function expression
#[derive(Clone)]
pub struct Closure {
    lambda: Arc<Lambda>,
    env: Env,
}

impl Closure {
    pub(crate) fn name(&self) -> Option<&str> {
        self.lambda.name.as_deref()
    }

    pub(crate) fn same(&self, other: &Closure) -> bool {
        Arc::ptr_eq(&self.lambda, &other.lambda) && Arc::ptr_eq(&self.env.0, &other.env.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Evaluate compiled code against `scope`
pub fn evaluate(code: &str, scope: &EvalScope) -> Result<Value, EvalError> {
    let expr = parse_expression(code)?;
    match eval(&expr, &Env::global(scope.clone())) {
        Err(EvalError::ShortCircuit) => Ok(Value::Undefined),
        other => other,
    }
}

pub(crate) fn parse_expression(code: &str) -> Result<Expr, EvalError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, code, SourceType::default()).parse();
    if let Some(error) = ret.errors.first() {
        return Err(EvalError::Syntax(error.message.to_string()));
    }

    match ret.program.body.as_slice() {
        [] => Ok(Expr::Literal(Value::Undefined)),
        [Statement::ExpressionStatement(stmt)] => lower_expression(&stmt.expression),
        _ => Err(EvalError::Unsupported(
            "statements outside of an expression".to_string(),
        )),
    }
}

/// Nested closure calls allowed before a call fails with a `RangeError`
pub(crate) const MAX_CALL_DEPTH: usize = 64;

thread_local! {
    static CALL_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Holds one level of call depth; released on drop, unwinding included
struct CallGuard;

impl CallGuard {
    fn enter() -> Result<Self, EvalError> {
        CALL_DEPTH.with(|depth| {
            if depth.get() >= MAX_CALL_DEPTH {
                return Err(EvalError::range_error("Maximum call stack size exceeded"));
            }
            depth.set(depth.get() + 1);
            Ok(CallGuard)
        })
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        CALL_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

pub(crate) fn call_closure(closure: &Closure, args: &[Value]) -> Result<Value, EvalError> {
    let _guard = CallGuard::enter()?;
    let lambda = &closure.lambda;
    let mut env = closure.env.clone();
    for (i, param) in lambda.params.iter().enumerate() {
        let arg = args.get(i).cloned().unwrap_or(Value::Undefined);
        env = bind_pattern(param, arg, &env)?;
    }
    let result = match &lambda.body {
        Body::Expr(expr) => eval(expr, &env),
        Body::Block(stmts) => exec_block(stmts, &env).map(|v| v.unwrap_or(Value::Undefined)),
    };
    match result {
        Err(EvalError::ShortCircuit) => Ok(Value::Undefined),
        other => other,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOWERING (oxc AST -> IR)
// ═══════════════════════════════════════════════════════════════════════════════

fn unsupported<T>(what: &str) -> Result<T, EvalError> {
    Err(EvalError::Unsupported(what.to_string()))
}

fn lower_expression(expr: &Expression<'_>) -> Result<Expr, EvalError> {
    Ok(match expr {
        Expression::BooleanLiteral(b) => Expr::Literal(Value::Bool(b.value)),
        Expression::NullLiteral(_) => Expr::Literal(Value::Null),
        Expression::NumericLiteral(n) => Expr::Literal(Value::Number(n.value)),
        Expression::StringLiteral(s) => Expr::Literal(Value::String(s.value.to_string())),
        Expression::TemplateLiteral(t) => Expr::Template {
            quasis: t
                .quasis
                .iter()
                .map(|q| {
                    q.value
                        .cooked
                        .as_ref()
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| q.value.raw.to_string())
                })
                .collect(),
            exprs: t
                .expressions
                .iter()
                .map(lower_expression)
                .collect::<Result<_, _>>()?,
        },
        Expression::Identifier(id) => match id.name.as_str() {
            "undefined" => Expr::Literal(Value::Undefined),
            "NaN" => Expr::Literal(Value::Number(f64::NAN)),
            "Infinity" => Expr::Literal(Value::Number(f64::INFINITY)),
            name => Expr::Ident(name.to_string()),
        },
        Expression::ArrayExpression(arr) => {
            let mut items = Vec::with_capacity(arr.elements.len());
            for element in &arr.elements {
                items.push(match element {
                    ArrayExpressionElement::SpreadElement(spread) => {
                        Item::Spread(lower_expression(&spread.argument)?)
                    }
                    ArrayExpressionElement::Elision(_) => Item::Hole,
                    other => match other.as_expression() {
                        Some(e) => Item::Expr(lower_expression(e)?),
                        None => return unsupported("array element"),
                    },
                });
            }
            Expr::Array(items)
        }
        Expression::ObjectExpression(obj) => {
            let mut entries = Vec::with_capacity(obj.properties.len());
            for property in &obj.properties {
                entries.push(match property {
                    ObjectPropertyKind::ObjectProperty(p) => {
                        if !matches!(p.kind, PropertyKind::Init) {
                            return unsupported("getters and setters");
                        }
                        let key = if p.computed {
                            match p.key.as_expression() {
                                Some(e) => Key::Computed(lower_expression(e)?),
                                None => return unsupported("computed key"),
                            }
                        } else {
                            match p.key.static_name() {
                                Some(name) => Key::Static(name.to_string()),
                                None => return unsupported("private key"),
                            }
                        };
                        ObjectEntry::Property {
                            key,
                            value: lower_expression(&p.value)?,
                        }
                    }
                    ObjectPropertyKind::SpreadProperty(spread) => {
                        ObjectEntry::Spread(lower_expression(&spread.argument)?)
                    }
                });
            }
            Expr::Object(entries)
        }
        Expression::StaticMemberExpression(m) => lower_static_member(m)?,
        Expression::ComputedMemberExpression(m) => lower_computed_member(m)?,
        Expression::CallExpression(call) => lower_call(call)?,
        Expression::ChainExpression(chain) => {
            let inner = match &chain.expression {
                ChainElement::CallExpression(call) => lower_call(call)?,
                ChainElement::StaticMemberExpression(m) => lower_static_member(m)?,
                ChainElement::ComputedMemberExpression(m) => lower_computed_member(m)?,
                _ => return unsupported("optional chain element"),
            };
            Expr::Chain(Box::new(inner))
        }
        Expression::ParenthesizedExpression(p) => lower_expression(&p.expression)?,
        Expression::ConditionalExpression(c) => Expr::Conditional {
            test: Box::new(lower_expression(&c.test)?),
            consequent: Box::new(lower_expression(&c.consequent)?),
            alternate: Box::new(lower_expression(&c.alternate)?),
        },
        Expression::LogicalExpression(l) => Expr::Logical {
            op: l.operator,
            left: Box::new(lower_expression(&l.left)?),
            right: Box::new(lower_expression(&l.right)?),
        },
        Expression::BinaryExpression(b) => Expr::Binary {
            op: b.operator,
            left: Box::new(lower_expression(&b.left)?),
            right: Box::new(lower_expression(&b.right)?),
        },
        Expression::UnaryExpression(u) => Expr::Unary {
            op: u.operator,
            argument: Box::new(lower_expression(&u.argument)?),
        },
        Expression::SequenceExpression(s) => Expr::Sequence(
            s.expressions
                .iter()
                .map(lower_expression)
                .collect::<Result<_, _>>()?,
        ),
        Expression::ArrowFunctionExpression(arrow) => Expr::Function(Arc::new(lower_arrow(arrow)?)),
        Expression::FunctionExpression(func) => Expr::Function(Arc::new(lower_function(func)?)),
        Expression::JSXElement(_) | Expression::JSXFragment(_) => {
            return unsupported("JSX that has not been compiled")
        }
        Expression::NewExpression(_) => return unsupported("new"),
        Expression::AssignmentExpression(_) => return unsupported("assignment"),
        Expression::UpdateExpression(_) => return unsupported("increment/decrement"),
        Expression::ClassExpression(_) => return unsupported("class"),
        Expression::AwaitExpression(_) => return unsupported("await"),
        Expression::ThisExpression(_) => return unsupported("this"),
        Expression::TaggedTemplateExpression(_) => return unsupported("tagged template"),
        Expression::RegExpLiteral(_) => return unsupported("regular expression"),
        _ => return unsupported("expression"),
    })
}

fn lower_static_member(m: &StaticMemberExpression<'_>) -> Result<Expr, EvalError> {
    Ok(Expr::Member {
        object: Box::new(lower_expression(&m.object)?),
        property: Box::new(Key::Static(m.property.name.to_string())),
        optional: m.optional,
    })
}

fn lower_computed_member(m: &ComputedMemberExpression<'_>) -> Result<Expr, EvalError> {
    Ok(Expr::Member {
        object: Box::new(lower_expression(&m.object)?),
        property: Box::new(Key::Computed(lower_expression(&m.expression)?)),
        optional: m.optional,
    })
}

fn lower_call(call: &CallExpression<'_>) -> Result<Expr, EvalError> {
    let mut args = Vec::with_capacity(call.arguments.len());
    for argument in &call.arguments {
        args.push(match argument {
            Argument::SpreadElement(spread) => Item::Spread(lower_expression(&spread.argument)?),
            other => match other.as_expression() {
                Some(e) => Item::Expr(lower_expression(e)?),
                None => return unsupported("call argument"),
            },
        });
    }
    Ok(Expr::Call {
        callee: Box::new(lower_expression(&call.callee)?),
        args,
        optional: call.optional,
    })
}

fn lower_params(params: &FormalParameters<'_>) -> Result<Vec<Pattern>, EvalError> {
    if params.rest.is_some() {
        return unsupported("rest parameters");
    }
    params
        .items
        .iter()
        .map(|param| lower_pattern(&param.pattern))
        .collect()
}

fn lower_arrow(arrow: &ArrowFunctionExpression<'_>) -> Result<Lambda, EvalError> {
    let params = lower_params(&arrow.params)?;
    let body = if arrow.expression {
        match arrow.body.statements.first() {
            Some(Statement::ExpressionStatement(stmt)) => Body::Expr(lower_expression(&stmt.expression)?),
            _ => Body::Block(Vec::new()),
        }
    } else {
        Body::Block(lower_statements(&arrow.body.statements)?)
    };
    Ok(Lambda {
        name: None,
        params,
        body,
    })
}

fn lower_function(func: &JsFunction<'_>) -> Result<Lambda, EvalError> {
    let params = lower_params(&func.params)?;
    let body = match &func.body {
        Some(body) => lower_statements(&body.statements)?,
        None => Vec::new(),
    };
    Ok(Lambda {
        name: func.id.as_ref().map(|id| id.name.to_string()),
        params,
        body: Body::Block(body),
    })
}

fn lower_pattern(pattern: &BindingPattern<'_>) -> Result<Pattern, EvalError> {
    match pattern {
        BindingPattern::BindingIdentifier(id) => Ok(Pattern::Ident(id.name.to_string())),
        BindingPattern::ObjectPattern(obj) => {
            let mut properties = Vec::with_capacity(obj.properties.len());
            for prop in &obj.properties {
                let Some(key) = prop.key.static_name() else {
                    return unsupported("computed destructuring key");
                };
                properties.push((key.to_string(), lower_pattern(&prop.value)?));
            }
            let rest = match &obj.rest {
                Some(rest) => Some(rest_name(&rest.argument)?),
                None => None,
            };
            Ok(Pattern::Object { properties, rest })
        }
        BindingPattern::ArrayPattern(arr) => {
            let mut elements = Vec::with_capacity(arr.elements.len());
            for element in &arr.elements {
                elements.push(match element {
                    Some(p) => Some(lower_pattern(p)?),
                    None => None,
                });
            }
            let rest = match &arr.rest {
                Some(rest) => Some(rest_name(&rest.argument)?),
                None => None,
            };
            Ok(Pattern::Array { elements, rest })
        }
        _ => unsupported("default values in bindings"),
    }
}

fn rest_name(pattern: &BindingPattern<'_>) -> Result<String, EvalError> {
    match pattern {
        BindingPattern::BindingIdentifier(id) => Ok(id.name.to_string()),
        _ => unsupported("nested rest pattern"),
    }
}

fn lower_statements(stmts: &[Statement<'_>]) -> Result<Vec<Stmt>, EvalError> {
    let mut out = Vec::with_capacity(stmts.len());
    for stmt in stmts {
        if let Some(lowered) = lower_statement(stmt)? {
            out.push(lowered);
        }
    }
    Ok(out)
}

fn lower_branch(stmt: &Statement<'_>) -> Result<Vec<Stmt>, EvalError> {
    match stmt {
        Statement::BlockStatement(block) => lower_statements(&block.body),
        other => Ok(lower_statement(other)?.into_iter().collect()),
    }
}

fn lower_statement(stmt: &Statement<'_>) -> Result<Option<Stmt>, EvalError> {
    Ok(Some(match stmt {
        Statement::ExpressionStatement(s) => Stmt::Expr(lower_expression(&s.expression)?),
        Statement::ReturnStatement(r) => Stmt::Return(match &r.argument {
            Some(e) => Some(lower_expression(e)?),
            None => None,
        }),
        Statement::VariableDeclaration(var_decl) => {
            let mut decls = Vec::with_capacity(var_decl.declarations.len());
            for decl in &var_decl.declarations {
                let init = match &decl.init {
                    Some(e) => Some(lower_expression(e)?),
                    None => None,
                };
                decls.push((lower_pattern(&decl.id)?, init));
            }
            Stmt::Declare(decls)
        }
        Statement::IfStatement(s) => Stmt::If {
            test: lower_expression(&s.test)?,
            consequent: lower_branch(&s.consequent)?,
            alternate: match &s.alternate {
                Some(alt) => Some(lower_branch(alt)?),
                None => None,
            },
        },
        Statement::BlockStatement(block) => Stmt::Block(lower_statements(&block.body)?),
        Statement::FunctionDeclaration(func) => {
            let lambda = lower_function(func)?;
            let Some(name) = lambda.name.clone() else {
                return unsupported("anonymous function declaration");
            };
            Stmt::Function {
                name,
                lambda: Arc::new(lambda),
            }
        }
        Statement::EmptyStatement(_) => return Ok(None),
        _ => return unsupported("statement"),
    }))
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVALUATION
// ═══════════════════════════════════════════════════════════════════════════════

fn eval(expr: &Expr, env: &Env) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Ident(name) => env
            .lookup(name)
            .ok_or_else(|| EvalError::Reference(name.clone())),
        Expr::Template { quasis, exprs } => {
            let mut out = String::new();
            for (i, quasi) in quasis.iter().enumerate() {
                out.push_str(quasi);
                if let Some(e) = exprs.get(i) {
                    out.push_str(&eval(e, env)?.to_js_string());
                }
            }
            Ok(Value::String(out))
        }
        Expr::Array(items) => Ok(Value::Array(eval_items(items, env)?)),
        Expr::Object(entries) => {
            let mut map = Props::new();
            for entry in entries {
                match entry {
                    ObjectEntry::Property { key, value } => {
                        let key = eval_key(key, env)?;
                        map.insert(key, eval(value, env)?);
                    }
                    ObjectEntry::Spread(e) => match eval(e, env)? {
                        Value::Object(other) => map.extend(other),
                        Value::Array(items) => {
                            for (i, item) in items.into_iter().enumerate() {
                                map.insert(i.to_string(), item);
                            }
                        }
                        _ => {}
                    },
                }
            }
            Ok(Value::Object(map))
        }
        Expr::Member {
            object,
            property,
            optional,
        } => {
            let base = eval(object, env)?;
            if *optional && base.is_nullish() {
                return Err(EvalError::ShortCircuit);
            }
            let key = eval_key(property, env)?;
            get_property(&base, &key)
        }
        Expr::Call {
            callee,
            args,
            optional,
        } => eval_call(callee, args, *optional, env),
        Expr::Chain(inner) => match eval(inner, env) {
            Err(EvalError::ShortCircuit) => Ok(Value::Undefined),
            other => other,
        },
        Expr::Unary { op, argument } => {
            if let (UnaryOperator::Typeof, Expr::Ident(name)) = (op, argument.as_ref()) {
                // `typeof undeclared` is not an error
                return Ok(Value::String(
                    env.lookup(name)
                        .map(|v| v.type_of())
                        .unwrap_or("undefined")
                        .to_string(),
                ));
            }
            let value = eval(argument, env)?;
            match op {
                UnaryOperator::UnaryNegation => Ok(Value::Number(-value.to_number())),
                UnaryOperator::UnaryPlus => Ok(Value::Number(value.to_number())),
                UnaryOperator::LogicalNot => Ok(Value::Bool(!value.is_truthy())),
                UnaryOperator::Typeof => Ok(Value::String(value.type_of().to_string())),
                UnaryOperator::Void => Ok(Value::Undefined),
                other => unsupported(&format!("operator {}", other.as_str())),
            }
        }
        Expr::Binary { op, left, right } => {
            let left = eval(left, env)?;
            let right = eval(right, env)?;
            binary(*op, left, right)
        }
        Expr::Logical { op, left, right } => {
            let left = eval(left, env)?;
            match op {
                LogicalOperator::And if !left.is_truthy() => Ok(left),
                LogicalOperator::Or if left.is_truthy() => Ok(left),
                LogicalOperator::Coalesce if !left.is_nullish() => Ok(left),
                _ => eval(right, env),
            }
        }
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            if eval(test, env)?.is_truthy() {
                eval(consequent, env)
            } else {
                eval(alternate, env)
            }
        }
        Expr::Sequence(exprs) => {
            let mut last = Value::Undefined;
            for e in exprs {
                last = eval(e, env)?;
            }
            Ok(last)
        }
        Expr::Function(lambda) => Ok(Value::Function(Function::Closure(Closure {
            lambda: lambda.clone(),
            env: env.clone(),
        }))),
    }
}

fn eval_items(items: &[Item], env: &Env) -> Result<Vec<Value>, EvalError> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Item::Expr(e) => out.push(eval(e, env)?),
            Item::Spread(e) => match eval(e, env)? {
                Value::Array(values) => out.extend(values),
                Value::String(s) => out.extend(s.chars().map(|c| Value::String(c.to_string()))),
                other => {
                    return Err(EvalError::type_error(format!(
                        "{} is not iterable",
                        other.type_of()
                    )))
                }
            },
            Item::Hole => out.push(Value::Undefined),
        }
    }
    Ok(out)
}

fn eval_key(key: &Key, env: &Env) -> Result<String, EvalError> {
    match key {
        Key::Static(name) => Ok(name.clone()),
        Key::Computed(e) => Ok(eval(e, env)?.to_js_string()),
    }
}

fn eval_call(callee: &Expr, args: &[Item], optional: bool, env: &Env) -> Result<Value, EvalError> {
    if let Expr::Member {
        object,
        property,
        optional: member_optional,
    } = callee
    {
        let base = eval(object, env)?;
        if *member_optional && base.is_nullish() {
            return Err(EvalError::ShortCircuit);
        }
        let key = eval_key(property, env)?;
        let args = eval_items(args, env)?;
        if let Some(result) = builtins::call_method(&base, &key, &args) {
            return result;
        }
        let target = get_property(&base, &key)?;
        return invoke(&target, &args, optional, || format!("{}.{}", describe(object), key));
    }

    let target = eval(callee, env)?;
    let args = eval_items(args, env)?;
    invoke(&target, &args, optional, || describe(callee))
}

fn invoke(
    target: &Value,
    args: &[Value],
    optional: bool,
    name: impl FnOnce() -> String,
) -> Result<Value, EvalError> {
    match target {
        Value::Function(f) => f.call(args),
        v if optional && v.is_nullish() => Err(EvalError::ShortCircuit),
        _ => Err(EvalError::type_error(format!("{} is not a function", name()))),
    }
}

fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::Member {
            object, property, ..
        } => match property.as_ref() {
            Key::Static(key) => format!("{}.{}", describe(object), key),
            Key::Computed(_) => format!("{}[...]", describe(object)),
        },
        _ => "expression".to_string(),
    }
}

/// Property read with JavaScript's lookup rules for the supported types
pub(crate) fn get_property(base: &Value, key: &str) -> Result<Value, EvalError> {
    Ok(match base {
        Value::Undefined | Value::Null => {
            return Err(EvalError::type_error(format!(
                "Cannot read properties of {} (reading '{}')",
                base.to_js_string(),
                key
            )))
        }
        Value::Object(map) => map.get(key).cloned().unwrap_or(Value::Undefined),
        Value::Array(items) => {
            if key == "length" {
                Value::Number(items.len() as f64)
            } else {
                key.parse::<usize>()
                    .ok()
                    .and_then(|i| items.get(i).cloned())
                    .unwrap_or(Value::Undefined)
            }
        }
        Value::String(s) => {
            if key == "length" {
                Value::Number(s.encode_utf16().count() as f64)
            } else {
                key.parse::<usize>()
                    .ok()
                    .and_then(|i| s.chars().nth(i))
                    .map(|c| Value::String(c.to_string()))
                    .unwrap_or(Value::Undefined)
            }
        }
        Value::Element(el) if key == "props" => Value::Object(el.props.clone()),
        Value::Function(f) if key == "name" => Value::String(f.name().to_string()),
        Value::Component(c) if key == "displayName" => Value::String(c.name().to_string()),
        _ => Value::Undefined,
    })
}

fn bind_pattern(pattern: &Pattern, value: Value, env: &Env) -> Result<Env, EvalError> {
    match pattern {
        Pattern::Ident(name) => Ok(env.bind(name.clone(), value)),
        Pattern::Object { properties, rest } => {
            if value.is_nullish() {
                let shown = value.to_js_string();
                return Err(EvalError::type_error(format!(
                    "Cannot destructure '{}' as it is {}.",
                    shown, shown
                )));
            }
            let mut env = env.clone();
            for (key, sub) in properties {
                let v = get_property(&value, key)?;
                env = bind_pattern(sub, v, &env)?;
            }
            if let Some(rest) = rest {
                let remaining = match &value {
                    Value::Object(map) => map
                        .iter()
                        .filter(|(k, _)| !properties.iter().any(|(p, _)| p == *k))
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                    _ => Props::new(),
                };
                env = env.bind(rest.clone(), Value::Object(remaining));
            }
            Ok(env)
        }
        Pattern::Array { elements, rest } => {
            let items = match value {
                Value::Array(items) => items,
                Value::String(s) => s.chars().map(|c| Value::String(c.to_string())).collect(),
                other => {
                    return Err(EvalError::type_error(format!(
                        "{} is not iterable",
                        other.type_of()
                    )))
                }
            };
            let mut env = env.clone();
            for (i, element) in elements.iter().enumerate() {
                if let Some(sub) = element {
                    let v = items.get(i).cloned().unwrap_or(Value::Undefined);
                    env = bind_pattern(sub, v, &env)?;
                }
            }
            if let Some(rest) = rest {
                let tail = items.iter().skip(elements.len()).cloned().collect();
                env = env.bind(rest.clone(), Value::Array(tail));
            }
            Ok(env)
        }
    }
}

fn exec_block(stmts: &[Stmt], env: &Env) -> Result<Option<Value>, EvalError> {
    let mut env = env.clone();
    for stmt in stmts {
        match stmt {
            Stmt::Declare(decls) => {
                for (pattern, init) in decls {
                    let value = match init {
                        Some(e) => eval(e, &env)?,
                        None => Value::Undefined,
                    };
                    env = bind_pattern(pattern, value, &env)?;
                }
            }
            Stmt::Return(expr) => {
                return Ok(Some(match expr {
                    Some(e) => eval(e, &env)?,
                    None => Value::Undefined,
                }))
            }
            Stmt::Expr(e) => {
                eval(e, &env)?;
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                let branch = if eval(test, &env)?.is_truthy() {
                    Some(consequent)
                } else {
                    alternate.as_ref()
                };
                if let Some(body) = branch {
                    if let Some(v) = exec_block(body, &env)? {
                        return Ok(Some(v));
                    }
                }
            }
            Stmt::Block(body) => {
                if let Some(v) = exec_block(body, &env)? {
                    return Ok(Some(v));
                }
            }
            Stmt::Function { name, lambda } => {
                let closure = Closure {
                    lambda: lambda.clone(),
                    env: env.clone(),
                };
                env = env.bind(name.clone(), Value::Function(Function::Closure(closure)));
            }
        }
    }
    Ok(None)
}

fn binary(op: BinaryOperator, left: Value, right: Value) -> Result<Value, EvalError> {
    Ok(match op {
        BinaryOperator::Addition => add(&left, &right),
        BinaryOperator::Subtraction => Value::Number(left.to_number() - right.to_number()),
        BinaryOperator::Multiplication => Value::Number(left.to_number() * right.to_number()),
        BinaryOperator::Division => Value::Number(left.to_number() / right.to_number()),
        BinaryOperator::Remainder => Value::Number(left.to_number() % right.to_number()),
        BinaryOperator::Exponential => Value::Number(left.to_number().powf(right.to_number())),
        BinaryOperator::Equality => Value::Bool(left.loose_equals(&right)),
        BinaryOperator::Inequality => Value::Bool(!left.loose_equals(&right)),
        BinaryOperator::StrictEquality => Value::Bool(left.strict_equals(&right)),
        BinaryOperator::StrictInequality => Value::Bool(!left.strict_equals(&right)),
        BinaryOperator::LessThan => compare(&left, &right, |o| o == Ordering::Less),
        BinaryOperator::LessEqualThan => compare(&left, &right, |o| o != Ordering::Greater),
        BinaryOperator::GreaterThan => compare(&left, &right, |o| o == Ordering::Greater),
        BinaryOperator::GreaterEqualThan => compare(&left, &right, |o| o != Ordering::Less),
        other => return unsupported(&format!("operator {}", other.as_str())),
    })
}

fn add(left: &Value, right: &Value) -> Value {
    let numeric = |v: &Value| matches!(v, Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_));
    if numeric(left) && numeric(right) {
        Value::Number(left.to_number() + right.to_number())
    } else {
        Value::String(format!("{}{}", left.to_js_string(), right.to_js_string()))
    }
}

fn compare(left: &Value, right: &Value, pred: fn(Ordering) -> bool) -> Value {
    if let (Value::String(a), Value::String(b)) = (left, right) {
        return Value::Bool(pred(a.cmp(b)));
    }
    match left.to_number().partial_cmp(&right.to_number()) {
        Some(ordering) => Value::Bool(pred(ordering)),
        None => Value::Bool(false),
    }
}
