//! Built-in case-transform lambdas.
//!
//! Lambdas are named string-to-string functions invoked from templates via
//! `{{var#lambda}}` (or the `{{var.lambda()}}` call form). The case
//! transforms all tokenize their input the same way: split on
//! lower-to-upper and letter-to-digit transitions and on runs of
//! non-alphanumeric characters, then rejoin with the target separator and
//! casing. `lowerCase`/`upperCase` recase the whole string and
//! `mustacheCase` wraps it verbatim.

use indexmap::IndexMap;

pub type Lambda = fn(&str) -> String;

/// Splits an identifier into lowercase-preserving word tokens.
pub fn tokenize(input: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev: Option<char> = None;

    for ch in input.chars() {
        if !ch.is_alphanumeric() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            prev = None;
            continue;
        }

        let boundary = match prev {
            Some(p) => {
                (p.is_lowercase() && ch.is_uppercase())
                    || (p.is_alphabetic() && ch.is_numeric())
            }
            None => false,
        };

        if boundary && !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        current.push(ch);
        prev = Some(ch);
    }

    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn capitalize(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => {
            first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
        }
        None => String::new(),
    }
}

fn join_lower(input: &str, separator: &str) -> String {
    tokenize(input)
        .iter()
        .map(|t| t.to_lowercase())
        .collect::<Vec<_>>()
        .join(separator)
}

fn join_capitalized(input: &str, separator: &str) -> String {
    tokenize(input).iter().map(|t| capitalize(t)).collect::<Vec<_>>().join(separator)
}

pub fn camel_case(input: &str) -> String {
    let tokens = tokenize(input);
    let mut out = String::new();
    for (i, token) in tokens.iter().enumerate() {
        if i == 0 {
            out.push_str(&token.to_lowercase());
        } else {
            out.push_str(&capitalize(token));
        }
    }
    out
}

pub fn constant_case(input: &str) -> String {
    tokenize(input)
        .iter()
        .map(|t| t.to_uppercase())
        .collect::<Vec<_>>()
        .join("_")
}

pub fn dot_case(input: &str) -> String {
    join_lower(input, ".")
}

pub fn header_case(input: &str) -> String {
    join_capitalized(input, "-")
}

pub fn lower_case(input: &str) -> String {
    input.to_lowercase()
}

pub fn pascal_case(input: &str) -> String {
    join_capitalized(input, "")
}

pub fn param_case(input: &str) -> String {
    join_lower(input, "-")
}

pub fn path_case(input: &str) -> String {
    join_lower(input, "/")
}

pub fn sentence_case(input: &str) -> String {
    let tokens = tokenize(input);
    let mut out = String::new();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        if i == 0 {
            out.push_str(&capitalize(token));
        } else {
            out.push_str(&token.to_lowercase());
        }
    }
    out
}

pub fn snake_case(input: &str) -> String {
    join_lower(input, "_")
}

pub fn title_case(input: &str) -> String {
    join_capitalized(input, " ")
}

pub fn upper_case(input: &str) -> String {
    input.to_uppercase()
}

/// Wraps the input verbatim in mustache delimiters. Input that already
/// carries them is left untouched, so the tag syntax survives a render
/// pass unchanged.
pub fn mustache_case(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }
    let trimmed = input.trim();
    if trimmed.starts_with("{{") && trimmed.ends_with("}}") {
        return input.to_string();
    }
    format!("{{{{ {input} }}}}")
}

/// The built-in lambda registry. Each lambda is registered under its
/// canonical name and a snake_case alias.
pub fn builtin_lambdas() -> IndexMap<String, Lambda> {
    let entries: &[(&str, Lambda)] = &[
        ("camelCase", camel_case),
        ("constantCase", constant_case),
        ("dotCase", dot_case),
        ("headerCase", header_case),
        ("lowerCase", lower_case),
        ("mustacheCase", mustache_case),
        ("pascalCase", pascal_case),
        ("paramCase", param_case),
        ("pathCase", path_case),
        ("sentenceCase", sentence_case),
        ("snakeCase", snake_case),
        ("titleCase", title_case),
        ("upperCase", upper_case),
    ];

    let mut lambdas = IndexMap::new();
    for (name, f) in entries {
        lambdas.insert((*name).to_string(), *f);
        lambdas.insert(snake_case(name), *f);
    }
    lambdas
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_camel_input() {
        assert_eq!(tokenize("helloWorld"), ["hello", "World"]);
        assert_eq!(tokenize("HelloWorld"), ["Hello", "World"]);
    }

    #[test]
    fn test_tokenize_separators() {
        assert_eq!(tokenize("hello_world"), ["hello", "world"]);
        assert_eq!(tokenize("hello--world  again"), ["hello", "world", "again"]);
        assert_eq!(tokenize("{{ Hello World }}"), ["Hello", "World"]);
    }

    #[test]
    fn test_tokenize_letter_digit_transition() {
        assert_eq!(tokenize("hello2world"), ["hello", "2world"]);
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("---").is_empty());
    }

    #[test]
    fn test_all_transforms_on_reference_input() {
        let input = "Hello World";
        assert_eq!(camel_case(input), "helloWorld");
        assert_eq!(constant_case(input), "HELLO_WORLD");
        assert_eq!(dot_case(input), "hello.world");
        assert_eq!(header_case(input), "Hello-World");
        assert_eq!(lower_case(input), "hello world");
        assert_eq!(mustache_case(input), "{{ Hello World }}");
        assert_eq!(pascal_case(input), "HelloWorld");
        assert_eq!(param_case(input), "hello-world");
        assert_eq!(path_case(input), "hello/world");
        assert_eq!(sentence_case(input), "Hello world");
        assert_eq!(snake_case(input), "hello_world");
        assert_eq!(title_case(input), "Hello World");
        assert_eq!(upper_case(input), "HELLO WORLD");
    }

    #[test]
    fn test_transforms_on_camel_input() {
        let input = "fooBarBaz";
        assert_eq!(snake_case(input), "foo_bar_baz");
        assert_eq!(constant_case(input), "FOO_BAR_BAZ");
        assert_eq!(header_case(input), "Foo-Bar-Baz");
        assert_eq!(pascal_case(input), "FooBarBaz");
    }

    #[test]
    fn test_mustache_case_wraps_verbatim() {
        // No case transform is applied to the wrapped input.
        assert_eq!(mustache_case("fooBar"), "{{ fooBar }}");
        assert_eq!(mustache_case("hello world"), "{{ hello world }}");
        // Already-delimited input keeps its escaping untouched.
        assert_eq!(mustache_case("{{ fooBar }}"), "{{ fooBar }}");
        assert_eq!(mustache_case("{{name}}"), "{{name}}");
    }

    #[test]
    fn test_transforms_are_idempotent() {
        let lambdas = builtin_lambdas();
        for input in ["Hello World", "fooBarBaz", "already_snake", "SCREAMING"] {
            for (name, lambda) in &lambdas {
                let once = lambda(input);
                let twice = lambda(&once);
                assert_eq!(once, twice, "{name} not idempotent on {input:?}");
            }
        }
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        for (name, lambda) in builtin_lambdas() {
            assert_eq!(lambda(""), "", "{name}");
        }
    }

    #[test]
    fn test_aliases_are_registered() {
        let lambdas = builtin_lambdas();
        assert!(lambdas.contains_key("snakeCase"));
        assert!(lambdas.contains_key("snake_case"));
        assert!(lambdas.contains_key("constantCase"));
        assert!(lambdas.contains_key("constant_case"));
    }
}
