//! Logic-less template rendering.
//!
//! The engine is a small pipeline: tokenize the template into tag and text
//! spans, parse those into a node tree, then evaluate the tree against a
//! stack of variable scopes. Tags are `{{name}}` (variable, with
//! `{{name#lambda}}` and `{{name.lambda()}}` pipe forms), `{{#x}}…{{/x}}`
//! (section), `{{^x}}…{{/x}}` (inverted section) and `{{> name}}` (partial).
//! Missing keys render as the empty string.

pub mod lambdas;

use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::error::{Error, Result};
use lambdas::Lambda;

const OPEN_DELIM: &str = "{{";
const CLOSE_DELIM: &str = "}}";

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Variable { name: String, lambda: Option<String> },
    Section { name: String, inverted: bool, children: Vec<Node>, offset: usize },
    Partial(String),
}

/// Renders templates against a JSON variable context with registered lambdas
/// and partials.
pub struct TemplateRenderer {
    lambdas: IndexMap<String, Lambda>,
    partials: IndexMap<String, String>,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn lambda_call_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_.]+)\.([A-Za-z_][A-Za-z0-9_]*)\(\)\s*\}\}")
            .expect("valid lambda call regex")
    })
}

impl TemplateRenderer {
    /// Creates a renderer with the built-in case lambdas and no partials.
    pub fn new() -> Self {
        Self { lambdas: lambdas::builtin_lambdas(), partials: IndexMap::new() }
    }

    /// Registers a partial template available as `{{> name}}`.
    pub fn add_partial<N: Into<String>, T: Into<String>>(&mut self, name: N, template: T) {
        self.partials.insert(name.into(), template.into());
    }

    /// Registers an additional lambda.
    pub fn add_lambda<N: Into<String>>(&mut self, name: N, lambda: Lambda) {
        self.lambdas.insert(name.into(), lambda);
    }

    /// Renders `template` against `vars`. Pure: equal inputs produce equal
    /// output and no side effects.
    pub fn render(&self, template: &str, vars: &Value) -> Result<String> {
        // Rewrite the `{{name.lambda()}}` call form to the pipe form before
        // parsing, but only for registered lambda names.
        let rewritten = lambda_call_regex().replace_all(template, |caps: &regex::Captures| {
            let name = &caps[1];
            let lambda = &caps[2];
            if self.lambdas.contains_key(lambda) {
                format!("{{{{{name}#{lambda}}}}}")
            } else {
                caps[0].to_string()
            }
        });

        let nodes = parse(&rewritten)?;
        let mut out = String::new();
        let mut scopes = vec![vars.clone()];
        self.render_nodes(&rewritten, &nodes, &mut scopes, &mut out)?;
        Ok(out)
    }

    /// Renders a byte buffer. Buffers that are not valid UTF-8 or contain no
    /// template delimiter are returned unchanged.
    pub fn render_bytes(&self, buf: &[u8], vars: &Value) -> Result<Vec<u8>> {
        let Ok(text) = std::str::from_utf8(buf) else {
            return Ok(buf.to_vec());
        };
        if !text.contains(OPEN_DELIM) {
            return Ok(buf.to_vec());
        }
        Ok(self.render(text, vars)?.into_bytes())
    }

    fn render_nodes(
        &self,
        template: &str,
        nodes: &[Node],
        scopes: &mut Vec<Value>,
        out: &mut String,
    ) -> Result<()> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Variable { name, lambda } => {
                    let rendered = match lookup(scopes, name) {
                        Some(value) => value_to_string(&value),
                        None => String::new(),
                    };
                    match lambda {
                        Some(lambda_name) => {
                            let f = self.lambdas.get(lambda_name).ok_or_else(|| {
                                Error::Render {
                                    template: template.to_string(),
                                    offset: 0,
                                    message: format!("unknown lambda '{lambda_name}'"),
                                }
                            })?;
                            out.push_str(&f(&rendered));
                        }
                        None => out.push_str(&rendered),
                    }
                }
                Node::Section { name, inverted, children, offset } => {
                    self.render_section(
                        template, name, *inverted, children, *offset, scopes, out,
                    )?;
                }
                Node::Partial(name) => {
                    if let Some(partial) = self.partials.get(name) {
                        let nodes = parse(partial)?;
                        self.render_nodes(partial, &nodes, scopes, out)?;
                    }
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn render_section(
        &self,
        template: &str,
        name: &str,
        inverted: bool,
        children: &[Node],
        _offset: usize,
        scopes: &mut Vec<Value>,
        out: &mut String,
    ) -> Result<()> {
        // A section named after a lambda applies that lambda to its rendered
        // body. Inverted sections never match lambda names.
        if !inverted {
            if let Some(f) = self.lambdas.get(name) {
                let mut body = String::new();
                self.render_nodes(template, children, scopes, &mut body)?;
                out.push_str(&f(&body));
                return Ok(());
            }
        }

        let value = lookup(scopes, name);
        let truthy = value.as_ref().is_some_and(is_truthy);

        if inverted {
            if !truthy {
                self.render_nodes(template, children, scopes, out)?;
            }
            return Ok(());
        }

        match value {
            Some(Value::Array(items)) => {
                for item in items {
                    scopes.push(item);
                    let result = self.render_nodes(template, children, scopes, out);
                    scopes.pop();
                    result?;
                }
            }
            Some(value) if is_truthy(&value) => {
                let scoped = matches!(value, Value::Object(_));
                if scoped {
                    scopes.push(value);
                }
                let result = self.render_nodes(template, children, scopes, out);
                if scoped {
                    scopes.pop();
                }
                result?;
            }
            _ => {}
        }
        Ok(())
    }
}

/// Parses a template into a node tree.
fn parse(template: &str) -> Result<Vec<Node>> {
    let render_err = |offset: usize, message: String| Error::Render {
        template: template.to_string(),
        offset,
        message,
    };

    // Stack of open sections: (name, inverted, open offset, parent nodes).
    let mut stack: Vec<(String, bool, usize, Vec<Node>)> = Vec::new();
    let mut current: Vec<Node> = Vec::new();
    let mut pos = 0;

    while let Some(found) = template[pos..].find(OPEN_DELIM) {
        let tag_start = pos + found;
        if tag_start > pos {
            current.push(Node::Text(template[pos..tag_start].to_string()));
        }

        let content_start = tag_start + OPEN_DELIM.len();
        let close = template[content_start..]
            .find(CLOSE_DELIM)
            .ok_or_else(|| render_err(tag_start, "unclosed tag".to_string()))?;
        let content = template[content_start..content_start + close].trim();
        pos = content_start + close + CLOSE_DELIM.len();

        if content.is_empty() {
            return Err(render_err(tag_start, "empty tag".to_string()));
        }

        match content.as_bytes()[0] {
            b'#' | b'^' => {
                let inverted = content.as_bytes()[0] == b'^';
                let name = content[1..].trim().to_string();
                if name.is_empty() {
                    return Err(render_err(tag_start, "section tag has no name".to_string()));
                }
                stack.push((name, inverted, tag_start, std::mem::take(&mut current)));
            }
            b'/' => {
                let name = content[1..].trim();
                let (open_name, inverted, open_offset, parent) =
                    stack.pop().ok_or_else(|| {
                        render_err(
                            tag_start,
                            format!("closing tag '{name}' has no open section"),
                        )
                    })?;
                if open_name != name {
                    return Err(render_err(
                        tag_start,
                        format!("expected closing tag for '{open_name}', found '{name}'"),
                    ));
                }
                let children = std::mem::replace(&mut current, parent);
                current.push(Node::Section {
                    name: open_name,
                    inverted,
                    children,
                    offset: open_offset,
                });
            }
            b'>' => {
                let name = content[1..].trim().to_string();
                if name.is_empty() {
                    return Err(render_err(tag_start, "partial tag has no name".to_string()));
                }
                current.push(Node::Partial(name));
            }
            _ => {
                let (name, lambda) = match content.split_once('#') {
                    Some((name, lambda)) => {
                        (name.trim().to_string(), Some(lambda.trim().to_string()))
                    }
                    None => (content.to_string(), None),
                };
                current.push(Node::Variable { name, lambda });
            }
        }
    }

    if let Some((name, _, open_offset, _)) = stack.last() {
        return Err(render_err(*open_offset, format!("unclosed section '{name}'")));
    }

    if pos < template.len() {
        current.push(Node::Text(template[pos..].to_string()));
    }
    Ok(current)
}

/// Resolves a (possibly dotted) name against the scope stack, innermost
/// scope first. Only the first segment selects the scope; once it matches,
/// the remaining segments must resolve within that scope or the lookup
/// misses.
fn lookup(scopes: &[Value], name: &str) -> Option<Value> {
    if name == "." {
        return scopes.last().cloned();
    }

    let mut parts = name.split('.');
    let first = parts.next()?;
    let rest: Vec<&str> = parts.collect();

    for scope in scopes.iter().rev() {
        let Some(mut value) = scope.get(first) else {
            continue;
        };
        for part in &rest {
            match value.get(part) {
                Some(inner) => value = inner,
                None => return None,
            }
        }
        return Some(value.clone());
    }
    None
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Number(_) | Value::Object(_) => true,
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(template: &str, vars: Value) -> String {
        TemplateRenderer::new().render(template, &vars).unwrap()
    }

    #[test]
    fn test_renders_plain_text_unchanged() {
        assert_eq!(render("no tags here", json!({})), "no tags here");
    }

    #[test]
    fn test_renders_variable() {
        assert_eq!(render("Hi {{name}}!", json!({"name": "Dash"})), "Hi Dash!");
    }

    #[test]
    fn test_missing_key_renders_empty() {
        assert_eq!(render("{{k}}", json!({})), "");
        assert_eq!(render("a{{missing}}b", json!({"other": 1})), "ab");
    }

    #[test]
    fn test_renders_numbers_and_booleans() {
        assert_eq!(
            render("{{port}} {{secure}}", json!({"port": 8080, "secure": true})),
            "8080 true"
        );
    }

    #[test]
    fn test_dotted_lookup() {
        let vars = json!({"project": {"name": "mason", "owner": {"id": 7}}});
        assert_eq!(render("{{project.name}}", vars.clone()), "mason");
        assert_eq!(render("{{project.owner.id}}", vars.clone()), "7");
        assert_eq!(render("{{project.missing}}", vars), "");
    }

    #[test]
    fn test_section_hidden_when_falsy() {
        for vars in [json!({}), json!({"x": false}), json!({"x": null}), json!({"x": ""})] {
            assert_eq!(render("{{#x}}shown{{/x}}", vars), "");
        }
    }

    #[test]
    fn test_section_shown_when_truthy() {
        assert_eq!(render("{{#x}}shown{{/x}}", json!({"x": true})), "shown");
        assert_eq!(render("{{#x}}shown{{/x}}", json!({"x": "yes"})), "shown");
    }

    #[test]
    fn test_section_repeats_for_arrays() {
        let vars = json!({"items": ["a", "b", "c"]});
        assert_eq!(render("{{#items}}{{.}},{{/items}}", vars), "a,b,c,");
    }

    #[test]
    fn test_section_scopes_objects() {
        let vars = json!({"user": {"name": "Dash"}});
        assert_eq!(render("{{#user}}{{name}}{{/user}}", vars), "Dash");
    }

    #[test]
    fn test_array_of_objects() {
        let vars = json!({"deps": [{"name": "serde"}, {"name": "log"}]});
        assert_eq!(render("{{#deps}}{{name}} {{/deps}}", vars), "serde log ");
    }

    #[test]
    fn test_inverted_section() {
        assert_eq!(render("{{^x}}empty{{/x}}", json!({})), "empty");
        assert_eq!(render("{{^x}}empty{{/x}}", json!({"x": true})), "");
        assert_eq!(render("{{^items}}none{{/items}}", json!({"items": []})), "none");
    }

    #[test]
    fn test_nested_sections() {
        let vars = json!({"outer": true, "items": [1, 2]});
        assert_eq!(
            render("{{#outer}}[{{#items}}{{.}}{{/items}}]{{/outer}}", vars),
            "[12]"
        );
    }

    #[test]
    fn test_outer_scope_visible_inside_section() {
        let vars = json!({"name": "Dash", "items": [{"n": 1}]});
        assert_eq!(render("{{#items}}{{name}}{{n}}{{/items}}", vars), "Dash1");
    }

    #[test]
    fn test_partial() {
        let mut renderer = TemplateRenderer::new();
        renderer.add_partial("header", "== {{title}} ==");
        let out = renderer.render("{{> header}}\nbody", &json!({"title": "Hi"})).unwrap();
        assert_eq!(out, "== Hi ==\nbody");
    }

    #[test]
    fn test_missing_partial_renders_empty() {
        assert_eq!(render("a{{> nothing}}b", json!({})), "ab");
    }

    #[test]
    fn test_lambda_pipe_form() {
        assert_eq!(
            render("{{name#snakeCase}}", json!({"name": "HelloWorld"})),
            "hello_world"
        );
        assert_eq!(
            render("{{name#constantCase}}", json!({"name": "HelloWorld"})),
            "HELLO_WORLD"
        );
    }

    #[test]
    fn test_lambda_call_form() {
        assert_eq!(
            render("{{name.snakeCase()}}.txt", json!({"name": "HelloWorld"})),
            "hello_world.txt"
        );
    }

    #[test]
    fn test_lambda_call_form_unknown_lambda_left_alone() {
        // `.notALambda()` is not registered, so the tag is treated as a
        // plain (missing) dotted variable.
        assert_eq!(render("{{name.notALambda()}}", json!({"name": "x"})), "");
    }

    #[test]
    fn test_lambda_section_form() {
        assert_eq!(
            render("{{#snakeCase}}{{name}}{{/snakeCase}}", json!({"name": "HelloWorld"})),
            "hello_world"
        );
    }

    #[test]
    fn test_unknown_pipe_lambda_is_an_error() {
        let err =
            TemplateRenderer::new().render("{{x#bogus}}", &json!({"x": "v"})).unwrap_err();
        assert!(matches!(err, Error::Render { .. }));
        assert!(format!("{err}").contains("bogus"));
    }

    #[test]
    fn test_unclosed_tag_is_an_error() {
        let err = TemplateRenderer::new().render("text {{name", &json!({})).unwrap_err();
        match err {
            Error::Render { offset, message, .. } => {
                assert_eq!(offset, 5);
                assert_eq!(message, "unclosed tag");
            }
            other => panic!("expected render error, got {other:?}"),
        }
    }

    #[test]
    fn test_unclosed_section_is_an_error() {
        let err =
            TemplateRenderer::new().render("{{#x}}body", &json!({"x": true})).unwrap_err();
        assert!(format!("{err}").contains("unclosed section 'x'"));
    }

    #[test]
    fn test_mismatched_close_is_an_error() {
        let err = TemplateRenderer::new()
            .render("{{#a}}{{/b}}", &json!({}))
            .unwrap_err();
        assert!(format!("{err}").contains("expected closing tag for 'a'"));
    }

    #[test]
    fn test_stray_close_is_an_error() {
        let err = TemplateRenderer::new().render("{{/a}}", &json!({})).unwrap_err();
        assert!(format!("{err}").contains("no open section"));
    }

    #[test]
    fn test_render_is_pure() {
        let renderer = TemplateRenderer::new();
        let vars = json!({"name": "Dash", "items": [1, 2, 3]});
        let template = "{{name}}: {{#items}}{{.}}{{/items}}";
        let first = renderer.render(template, &vars).unwrap();
        let second = renderer.render(template, &vars).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_render_bytes_passthrough_non_utf8() {
        let renderer = TemplateRenderer::new();
        let buf = vec![0xff, 0xfe, 0x00, 0x7b, 0x7b];
        assert_eq!(renderer.render_bytes(&buf, &json!({})).unwrap(), buf);
    }

    #[test]
    fn test_render_bytes_passthrough_without_delimiter() {
        let renderer = TemplateRenderer::new();
        let buf = b"plain bytes with } and { but no tags".to_vec();
        assert_eq!(renderer.render_bytes(&buf, &json!({})).unwrap(), buf);
    }

    #[test]
    fn test_render_bytes_renders_utf8_templates() {
        let renderer = TemplateRenderer::new();
        let out = renderer
            .render_bytes(b"Hi {{name}}!", &json!({"name": "Dash"}))
            .unwrap();
        assert_eq!(out, b"Hi Dash!");
    }
}
