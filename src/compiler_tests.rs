//! Compiler Tests
//!
//! JSX lowering through the public entry points, and agreement between the
//! lenient compile path and the strict validator.

#[cfg(test)]
mod tests {
    use crate::compiler::{compile_jsx, validate_code, CompileOptions};

    fn compile(source: &str) -> String {
        compile_jsx(source, &CompileOptions::default()).unwrap()
    }

    #[test]
    fn test_empty_source_is_empty_fragment() {
        let expected = "__playroomCreateElement(__playroomFragment, null)";
        assert_eq!(compile(""), expected);
        assert_eq!(compile("   "), expected);
        assert_eq!(compile("\n\t\n"), expected);
    }

    #[test]
    fn test_compile_is_deterministic() {
        let source = r#"<Stack space="small">
  <Button tone="critical" onClick={() => alert('hi')}>Delete</Button>
  {[1, 2].map(n => <Text key={n}>{n}</Text>)}
</Stack>"#;
        assert_eq!(compile(source), compile(source));
    }

    #[test]
    fn test_multiple_roots_share_one_fragment() {
        let out = compile("<A />\n<B />");
        assert!(out.starts_with("__playroomCreateElement(__playroomFragment, null"));
        assert!(out.contains("__playroomCreateElement(A, null)"));
        assert!(out.contains("__playroomCreateElement(B, null)"));
        assert!(!out.contains('<'));
    }

    #[test]
    fn test_intrinsic_tags_are_strings() {
        let out = compile("<div className=\"box\" />");
        assert!(out.contains("__playroomCreateElement(\"div\""));
        assert!(out.contains("className"));
    }

    #[test]
    fn test_member_tags_stay_references() {
        let out = compile("<Form.Field label=\"Name\" />");
        assert!(out.contains("__playroomCreateElement(Form.Field"));
    }

    #[test]
    fn test_custom_pragmas() {
        let options = CompileOptions {
            element_pragma: "h".into(),
            fragment_pragma: "Frag".into(),
        };
        let out = compile_jsx("<p>x</p>", &options).unwrap();
        assert!(out.starts_with("h(Frag, null"));
        assert!(out.contains("h(\"p\", null"));
    }

    #[test]
    fn test_invalid_sources_fail_both_paths() {
        for source in [
            "<div>",
            "<div></span>",
            "<Foo bar=>",
            "<p>{</p>",
            "</div>",
            "<a b=\"unterminated />",
        ] {
            assert!(
                compile_jsx(source, &CompileOptions::default()).is_err(),
                "compile accepted {:?}",
                source
            );
            assert!(validate_code(source).is_err(), "validate accepted {:?}", source);
        }
    }

    #[test]
    fn test_valid_sources_pass_both_paths() {
        for source in ["", "text only", "<A />", "<><B /></>", "{1 + 2}", "<a b={{ c: 1 }} />"] {
            assert!(compile_jsx(source, &CompileOptions::default()).is_ok());
            assert!(validate_code(source).is_ok());
        }
    }

    #[test]
    fn test_validate_reports_line() {
        let error = validate_code("\n\n<Foo bar=>").unwrap_err();
        let location = error.location.unwrap();
        assert_eq!(location.line, 3);
        assert!(location.column >= 1);
    }

    #[test]
    fn test_validate_first_line_column() {
        let error = validate_code("<div></span>").unwrap_err();
        assert_eq!(error.location.unwrap().line, 1);
    }
}
