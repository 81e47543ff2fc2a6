//! Boundary Tests
//!
//! Freeze-on-error behaviour of the render boundary against real compiled
//! code and a scope with a small component library.

#[cfg(test)]
mod tests {
    use crate::boundary::{BoundaryState, CodeRenderer};
    use crate::compiler::{compile_jsx, CompileOptions};
    use crate::config::PragmaSettings;
    use crate::scope::{ComponentRegistry, EvalScope, ScopeBuilder};
    use crate::value::{ComponentRef, Element, Props, Value};

    fn scope() -> EvalScope {
        let heading = ComponentRef::new("Heading", |_: &Props, children: &[Value]| {
            Ok(Element::intrinsic("h1").children(children.to_vec()).into())
        });
        ScopeBuilder::new(&PragmaSettings::default())
            .build(&ComponentRegistry::new().with_component(heading))
            .unwrap()
    }

    fn compile(source: &str) -> String {
        compile_jsx(source, &CompileOptions::default()).unwrap()
    }

    #[test]
    fn test_valid_invalid_valid_sequence() {
        let scope = scope();
        let mut renderer = CodeRenderer::new();
        let mut errors: Vec<String> = Vec::new();

        let valid_one = compile("<Heading>One</Heading>");
        let invalid = compile("<Heading><Missing /></Heading>");
        let valid_two = compile("<Heading>Two</Heading>");

        let first = renderer.render(&valid_one, &scope, &mut |m| errors.push(m.to_string()));
        assert_eq!(first.to_html(), "<h1>One</h1>");
        assert!(errors.is_empty());

        let frozen = renderer.render(&invalid, &scope, &mut |m| errors.push(m.to_string()));
        assert_eq!(frozen, first);
        assert_eq!(errors, vec!["ReferenceError: Missing is not defined"]);
        assert_eq!(renderer.state(), BoundaryState::Erroring);

        let updated = renderer.render(&valid_two, &scope, &mut |m| errors.push(m.to_string()));
        assert_eq!(updated.to_html(), "<h1>Two</h1>");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[1], "");
        assert_eq!(renderer.state(), BoundaryState::Clean);
    }

    #[test]
    fn test_same_failing_code_reports_once() {
        let scope = scope();
        let mut renderer = CodeRenderer::new();
        let mut count = 0;

        let invalid = compile("<Missing />");
        for _ in 0..3 {
            let tree = renderer.render(&invalid, &scope, &mut |m| {
                if !m.is_empty() {
                    count += 1;
                }
            });
            assert!(tree.is_empty());
        }
        assert_eq!(count, 1);
    }

    #[test]
    fn test_changing_between_invalid_codes_clears_then_reports() {
        let scope = scope();
        let mut renderer = CodeRenderer::new();
        let mut errors: Vec<String> = Vec::new();

        renderer.render(&compile("<p>ok</p>"), &scope, &mut |m| errors.push(m.to_string()));
        renderer.render(&compile("<A />"), &scope, &mut |m| errors.push(m.to_string()));
        let tree = renderer.render(&compile("<B />"), &scope, &mut |m| errors.push(m.to_string()));

        assert_eq!(
            errors,
            vec![
                "ReferenceError: A is not defined".to_string(),
                String::new(),
                "ReferenceError: B is not defined".to_string(),
            ]
        );
        assert_eq!(tree.to_html(), "<p>ok</p>");
        assert_eq!(renderer.last_good(), Some(compile("<p>ok</p>").as_str()));
    }

    #[test]
    fn test_component_failure_is_soft_error() {
        let broken = ComponentRef::new("Broken", |props: &Props, _: &[Value]| {
            match props.get("label") {
                Some(Value::String(label)) => Ok(Value::from(label.clone())),
                _ => Err(crate::error::EvalError::type_error("label is required")),
            }
        });
        let scope = ScopeBuilder::new(&PragmaSettings::default())
            .build(&ComponentRegistry::new().with_component(broken))
            .unwrap();
        let mut renderer = CodeRenderer::new();
        let mut errors: Vec<String> = Vec::new();

        let ok = renderer.render(&compile(r#"<Broken label="fine" />"#), &scope, &mut |m| {
            errors.push(m.to_string())
        });
        let frozen = renderer.render(&compile("<Broken />"), &scope, &mut |m| {
            errors.push(m.to_string())
        });

        assert_eq!(ok.text_content(), "fine");
        assert_eq!(frozen, ok);
        assert_eq!(errors, vec!["Broken: TypeError: label is required"]);
    }
}
