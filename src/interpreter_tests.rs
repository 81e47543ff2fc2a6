//! Interpreter Tests
//!
//! Snippet code is compiled, evaluated against a scope and rendered, the
//! same path a frame takes.

#[cfg(test)]
mod tests {
    use crate::boundary::render_code;
    use crate::compiler::{compile_jsx, CompileOptions};
    use crate::config::PragmaSettings;
    use crate::error::EvalError;
    use crate::interpreter::evaluate;
    use crate::scope::{ComponentRegistry, EvalScope, ScopeBuilder};
    use crate::value::{ComponentRef, Element, Props, Value};

    fn scope() -> EvalScope {
        let badge = ComponentRef::new("Badge", |props: &Props, children: &[Value]| {
            let tone = props
                .get("tone")
                .map(|v| v.to_js_string())
                .unwrap_or_else(|| "neutral".to_string());
            Ok(Element::intrinsic("span")
                .prop("className", format!("badge-{}", tone))
                .children(children.to_vec())
                .into())
        });
        ScopeBuilder::new(&PragmaSettings::default())
            .build(&ComponentRegistry::new().with_component(badge))
            .unwrap()
    }

    fn html(source: &str) -> String {
        let compiled = compile_jsx(source, &CompileOptions::default()).unwrap();
        render_code(&compiled, &scope()).unwrap().to_html()
    }

    fn render_error(source: &str) -> EvalError {
        let compiled = compile_jsx(source, &CompileOptions::default()).unwrap();
        render_code(&compiled, &scope()).unwrap_err()
    }

    fn eval(code: &str) -> Value {
        evaluate(code, &scope()).unwrap()
    }

    #[test]
    fn test_plain_markup() {
        assert_eq!(html("<p className=\"lead\">Hello</p>"), "<p class=\"lead\">Hello</p>");
        assert_eq!(html(""), "");
    }

    #[test]
    fn test_registered_component() {
        assert_eq!(
            html("<Badge tone=\"positive\">New</Badge>"),
            "<span class=\"badge-positive\">New</span>"
        );
    }

    #[test]
    fn test_map_over_array() {
        assert_eq!(
            html("<ul>{['a', 'b'].map((x, i) => <li key={x}>{i}:{x}</li>)}</ul>"),
            "<ul><li>0:a</li><li>1:b</li></ul>"
        );
    }

    #[test]
    fn test_conditionals() {
        assert_eq!(html("{1 > 2 ? <b>yes</b> : <i>no</i>}"), "<i>no</i>");
        assert_eq!(html("{false && <b>hidden</b>}{null ?? 'fallback'}"), "fallback");
    }

    #[test]
    fn test_template_literal_and_arithmetic() {
        assert_eq!(html("{`${2 * 21} items`}"), "42 items");
    }

    #[test]
    fn test_optional_chaining() {
        assert!(matches!(eval("({ a: null })?.a?.b.c"), Value::Undefined));
        assert!(matches!(eval("({ a: { b: 3 } }).a?.b"), Value::Number(n) if n == 3.0));
        assert!(matches!(eval("undefined?.()"), Value::Undefined));
    }

    #[test]
    fn test_local_component_with_destructured_props() {
        let source = r#"{(() => {
  const Card = ({ title, children }) => <section><h2>{title}</h2>{children}</section>;
  return <Card title="Hi"><p>Body</p></Card>;
})()}"#;
        assert_eq!(html(source), "<section><h2>Hi</h2><p>Body</p></section>");
    }

    #[test]
    fn test_spread_props() {
        assert_eq!(
            html("{(() => { const props = { id: 'x', title: 't' }; return <div {...props} />; })()}"),
            "<div id=\"x\" title=\"t\"></div>"
        );
    }

    #[test]
    fn test_builtins_available() {
        assert!(matches!(eval("Math.max(1, 5, 3)"), Value::Number(n) if n == 5.0));
        assert!(matches!(eval("'a-b'.split('-').join('+')"), Value::String(s) if s == "a+b"));
        assert!(matches!(eval("Object.keys({ x: 1, y: 2 }).length"), Value::Number(n) if n == 2.0));
    }

    #[test]
    fn test_unknown_identifier_is_reference_error() {
        assert_eq!(
            render_error("<Missing />"),
            EvalError::Reference("Missing".into())
        );
        assert_eq!(
            render_error("<Missing />").to_string(),
            "ReferenceError: Missing is not defined"
        );
    }

    #[test]
    fn test_calling_non_function_is_type_error() {
        assert!(matches!(
            evaluate("(1)()", &scope()),
            Err(EvalError::Type(_))
        ));
    }

    #[test]
    fn test_object_child_is_rejected() {
        assert!(matches!(render_error("{{ a: 1 }}"), EvalError::Type(_)));
    }

    #[test]
    fn test_runaway_recursion_is_range_error() {
        let error = render_error("{(f => f(f))(f => f(f))}");
        assert_eq!(
            error,
            EvalError::Range("Maximum call stack size exceeded".into())
        );
        assert_eq!(error.to_string(), "RangeError: Maximum call stack size exceeded");

        // the depth is released again, so later renders are unaffected
        assert_eq!(html("<p>after</p>"), "<p>after</p>");
    }

    #[test]
    fn test_bounded_recursion_still_runs() {
        let sum = eval("((f, n) => f(f, n))((self, n) => n === 0 ? 0 : n + self(self, n - 1), 20)");
        assert!(matches!(sum, Value::Number(n) if n == 210.0));
    }

    #[test]
    fn test_syntax_error_from_raw_code() {
        assert!(matches!(evaluate("(", &scope()), Err(EvalError::Syntax(_))));
    }
}
