//! Conversion of decoded JSON data into SCSS source.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Lists and maps become parenthesized SASS lists/maps with a trailing comma
//! after every item, so a single-element list is still a list and not a
//! parenthesized scalar. Strings are left bare when SASS would read them the
//! same way (hex colors, identifiers, already-quoted literals) and are
//! JSON-quoted otherwise.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static HEX_COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^#([0-9a-f]{3,4}|[0-9a-f]{6}|[0-9a-f]{8})$").unwrap());

// `[^ -~]` is anything outside printable ASCII: non-ASCII characters, and also
// ASCII control characters such as tab and newline, which stay unquoted too.
static UNQUOTED_STRING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(-?([a-z_]|[^ -~])|--)([a-z0-9_-]|[^ -~])*$").unwrap());

static QUOTED_STRING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)^("([^"\\]|\\.)*"|'([^'\\]|\\.)*')$"#).unwrap());

/// Render the top-level entries of a module's data as SCSS variable declarations.
///
/// Each key becomes `$key: <value>;`, one declaration per line, in map order.
pub fn to_scss_variables(data: &Map<String, Value>) -> String {
    data.iter()
        .map(|(key, value)| format!("${}: {};", key, to_scss_value(value)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a single JSON value as an SCSS literal.
pub fn to_scss_value(value: &Value) -> String {
    match value {
        Value::Array(items) => to_scss_list(items),
        Value::Object(map) => to_scss_map(map),
        Value::String(s) if is_bare_string(s) => s.clone(),
        // null, booleans, numbers and the remaining strings: JSON text is valid SCSS
        other => other.to_string(),
    }
}

fn to_scss_list(items: &[Value]) -> String {
    let body: String = items
        .iter()
        .map(|item| format!("{},", to_scss_value(item)))
        .collect();
    format!("({})", body)
}

fn to_scss_map(map: &Map<String, Value>) -> String {
    let body: String = map
        .iter()
        .map(|(key, value)| format!("'{}': {},", key.replace('\'', "\\'"), to_scss_value(value)))
        .collect();
    format!("({})", body)
}

fn is_bare_string(s: &str) -> bool {
    HEX_COLOR_RE.is_match(s) || UNQUOTED_STRING_RE.is_match(s) || QUOTED_STRING_RE.is_match(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;
    use serde_json::json;

    #[test]
    fn test_list_has_trailing_commas() {
        assert_eq!(to_scss_value(&json!([1, 2, 3])), "(1,2,3,)");
        assert_eq!(to_scss_value(&json!(["#c33"])), "(#c33,)");
        assert_eq!(to_scss_value(&json!([])), "()");
    }

    #[test]
    fn test_map_keys_are_single_quoted() {
        assert_eq!(
            to_scss_value(&json!({"a": 1, "b": "x"})),
            "('a': 1,'b': x,)"
        );
        assert_eq!(
            to_scss_value(&json!({"it's": true})),
            r"('it\'s': true,)"
        );
        assert_eq!(to_scss_value(&json!({})), "()");
    }

    #[test]
    fn test_hex_colors_stay_bare() {
        for color in ["#fff", "#FFFA", "#c0ffee", "#C0FFEE80"] {
            assert_eq!(to_scss_value(&json!(color)), color);
        }
        // five digits is not a color
        assert_eq!(to_scss_value(&json!("#fffff")), r##""#fffff""##);
    }

    #[test]
    fn test_identifiers_stay_bare() {
        assert_eq!(to_scss_value(&json!("red")), "red");
        assert_eq!(to_scss_value(&json!("sans-serif")), "sans-serif");
        assert_eq!(to_scss_value(&json!("-webkit-box")), "-webkit-box");
        assert_eq!(to_scss_value(&json!("--custom")), "--custom");
        assert_eq!(to_scss_value(&json!("_private")), "_private");
        assert_eq!(to_scss_value(&json!("größe")), "größe");
    }

    #[test]
    fn test_control_characters_count_as_identifier_characters() {
        assert_eq!(to_scss_value(&json!("a\tb")), "a\tb");
        assert_eq!(to_scss_value(&json!("red\nblue")), "red\nblue");
        // a space is printable ASCII, so it still forces quoting
        assert_eq!(to_scss_value(&json!("red blue")), "\"red blue\"");
    }

    #[test]
    fn test_other_strings_are_json_quoted() {
        assert_eq!(to_scss_value(&json!("hello world")), r#""hello world""#);
        assert_eq!(to_scss_value(&json!("1px")), r#""1px""#);
        assert_eq!(to_scss_value(&json!("")), r#""""#);
        assert_eq!(to_scss_value(&json!("-1")), r#""-1""#);
        assert_eq!(to_scss_value(&json!("50%")), r#""50%""#);
        assert_eq!(to_scss_value(&json!(r"back\slash")), r#""back\\slash""#);
    }

    #[test]
    fn test_quoted_strings_pass_through() {
        assert_eq!(to_scss_value(&json!(r#""red""#)), r#""red""#);
        assert_eq!(to_scss_value(&json!("'really red'")), "'really red'");
        assert_eq!(to_scss_value(&json!(r#""say \"hi\"""#)), r#""say \"hi\"""#);
        // an unescaped inner quote means it is not a single literal
        assert_eq!(
            to_scss_value(&json!(r#""a" "b""#)),
            r#""\"a\" \"b\"""#
        );
    }

    #[test]
    fn test_scalars_use_json_text() {
        assert_eq!(to_scss_value(&json!(null)), "null");
        assert_eq!(to_scss_value(&json!(true)), "true");
        assert_eq!(to_scss_value(&json!(false)), "false");
        assert_eq!(to_scss_value(&json!(42)), "42");
        assert_eq!(to_scss_value(&json!(-1.5)), "-1.5");
    }

    #[test]
    fn test_nested_containers() {
        let value = json!({
            "breakpoints": {"sm": 576, "md": 768},
            "fonts": ["Helvetica Neue", "sans-serif"],
        });
        assert_eq!(
            to_scss_value(&value),
            r#"('breakpoints': ('sm': 576,'md': 768,),'fonts': ("Helvetica Neue",sans-serif,),)"#
        );
    }

    #[test]
    fn test_variables_keep_module_order() {
        let data = json!({
            "primary": "#c33",
            "spacing": [4, 8],
            "font": "Times New Roman",
            "theme": {"dark": false},
        });
        let map = data.as_object().unwrap();

        assert_snapshot!(to_scss_variables(map), @r#"
        $primary: #c33;
        $spacing: (4,8,);
        $font: "Times New Roman";
        $theme: ('dark': false,);
        "#);
    }

    #[test]
    fn test_empty_module_renders_nothing() {
        assert_eq!(to_scss_variables(&Map::new()), "");
    }
}
