//! Renderer behavior across the public API.

use serde_json::json;

use mason::renderer::lambdas;
use mason::renderer::TemplateRenderer;

#[test]
fn render_is_pure_and_repeatable() {
    let renderer = TemplateRenderer::new();
    let vars = json!({"name": "Dash", "deps": [{"n": "serde"}, {"n": "log"}]});
    let template = "# {{name}}\n{{#deps}}- {{n}}\n{{/deps}}";

    let first = renderer.render(template, &vars).unwrap();
    let second = renderer.render(template, &vars).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, "# Dash\n- serde\n- log\n");
}

#[test]
fn missing_keys_render_as_empty_for_any_vars() {
    let renderer = TemplateRenderer::new();
    for vars in [json!({}), json!({"unrelated": 1}), json!({"k2": "x"})] {
        assert_eq!(renderer.render("{{k}}", &vars).unwrap(), "");
    }
}

#[test]
fn case_lambdas_are_idempotent_on_cased_input() {
    let renderer = TemplateRenderer::new();
    let names = [
        "camelCase",
        "constantCase",
        "dotCase",
        "headerCase",
        "lowerCase",
        "mustacheCase",
        "pascalCase",
        "paramCase",
        "pathCase",
        "sentenceCase",
        "snakeCase",
        "titleCase",
        "upperCase",
    ];
    for name in names {
        for input in ["Hello World", "fooBar", "x"] {
            let once = renderer
                .render(&format!("{{{{s#{name}}}}}"), &json!({"s": input}))
                .unwrap();
            let twice = renderer
                .render(&format!("{{{{s#{name}}}}}"), &json!({"s": once}))
                .unwrap();
            assert_eq!(once, twice, "{name} on {input:?}");
        }
    }
}

#[test]
fn lambda_table_matches_reference_outputs() {
    let cases = [
        ("camelCase", "fooBarBaz"),
        ("constantCase", "FOO_BAR_BAZ"),
        ("dotCase", "foo.bar.baz"),
        ("headerCase", "Foo-Bar-Baz"),
        ("lowerCase", "foo bar baz"),
        ("mustacheCase", "{{ foo bar baz }}"),
        ("pascalCase", "FooBarBaz"),
        ("paramCase", "foo-bar-baz"),
        ("pathCase", "foo/bar/baz"),
        ("sentenceCase", "Foo bar baz"),
        ("snakeCase", "foo_bar_baz"),
        ("titleCase", "Foo Bar Baz"),
        ("upperCase", "FOO BAR BAZ"),
    ];
    let renderer = TemplateRenderer::new();
    for (lambda, expected) in cases {
        let out = renderer
            .render(&format!("{{{{s#{lambda}}}}}"), &json!({"s": "foo bar baz"}))
            .unwrap();
        assert_eq!(out, expected, "{lambda}");
    }
}

#[test]
fn tokenizer_splits_on_case_and_digit_transitions() {
    assert_eq!(lambdas::tokenize("fooBarBaz"), ["foo", "Bar", "Baz"]);
    assert_eq!(lambdas::tokenize("version2point0"), ["version", "2point", "0"]);
    assert_eq!(lambdas::tokenize("foo--bar__baz"), ["foo", "bar", "baz"]);
    assert!(lambdas::tokenize("").is_empty());
}

#[test]
fn sections_and_partials_compose() {
    let mut renderer = TemplateRenderer::new();
    renderer.add_partial("item", "<{{n}}>");
    let vars = json!({"items": [{"n": 1}, {"n": 2}], "empty": []});
    let out = renderer
        .render("{{#items}}{{> item}}{{/items}}{{^empty}}|none{{/empty}}", &vars)
        .unwrap();
    assert_eq!(out, "<1><2>|none");
}

#[test]
fn byte_rendering_leaves_binary_payloads_alone() {
    let renderer = TemplateRenderer::new();
    let binary = vec![0x00, 0xff, 0x10, 0x80];
    assert_eq!(renderer.render_bytes(&binary, &json!({})).unwrap(), binary);
}

#[test]
fn invalid_templates_report_offset_and_message() {
    let renderer = TemplateRenderer::new();
    let err = renderer.render("ok {{#open}}never closed", &json!({})).unwrap_err();
    match err {
        mason::error::Error::Render { offset, message, template } => {
            assert_eq!(offset, 3);
            assert!(message.contains("unclosed section"));
            assert!(template.contains("never closed"));
        }
        other => panic!("expected render error, got {other:?}"),
    }
}
