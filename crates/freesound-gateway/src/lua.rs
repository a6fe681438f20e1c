//! Rendering of JSON values into Lua table literal syntax.
//!
//! The host script `load()`s the printed chunk, so the output must be a
//! single valid Lua expression. Rendering is a plain visitor over
//! [`serde_json::Value`]; string escaping is table-driven.

use serde_json::Value;

/// Characters with dedicated short escapes. Any other control character is
/// emitted as a decimal `\ddd` escape, which Lua's lexer accepts.
const SHORT_ESCAPES: &[(char, &str)] = &[
    ('\\', "\\\\"),
    ('"', "\\\""),
    ('\n', "\\n"),
    ('\r', "\\r"),
];

/// Render a JSON value as a Lua literal.
pub fn render(value: &Value) -> String {
    let mut out = String::new();
    render_into(value, &mut out);
    out
}

fn render_into(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("nil"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => {
            out.push('"');
            out.push_str(&escape(s));
            out.push('"');
        }
        Value::Array(items) => {
            out.push('{');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                render_into(item, out);
            }
            out.push('}');
        }
        Value::Object(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str("[\"");
                out.push_str(&escape(key));
                out.push_str("\"] = ");
                render_into(item, out);
            }
            out.push('}');
        }
    }
}

/// Escape a string for inclusion in a double-quoted Lua literal.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    'chars: for c in s.chars() {
        for (raw, escaped) in SHORT_ESCAPES {
            if c == *raw {
                out.push_str(escaped);
                continue 'chars;
            }
        }
        if c.is_control() {
            out.push('\\');
            out.push_str(&(c as u32).to_string());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Undo Lua's own string-escape rules, so tests can verify the escaped
    /// form round-trips.
    fn lua_unescape(s: &str) -> String {
        let mut out = String::new();
        let mut chars = s.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some(d) if d.is_ascii_digit() => {
                    let mut code = d.to_digit(10).unwrap();
                    for _ in 0..2 {
                        match chars.peek() {
                            Some(next) if next.is_ascii_digit() => {
                                code = code * 10 + next.to_digit(10).unwrap();
                                chars.next();
                            }
                            _ => break,
                        }
                    }
                    out.push(char::from_u32(code).unwrap());
                }
                Some(other) => out.push(other),
                None => {}
            }
        }
        out
    }

    #[test]
    fn scalars() {
        assert_eq!(render(&json!(null)), "nil");
        assert_eq!(render(&json!(true)), "true");
        assert_eq!(render(&json!(false)), "false");
        assert_eq!(render(&json!(42)), "42");
        assert_eq!(render(&json!(2.5)), "2.5");
        assert_eq!(render(&json!("hello")), "\"hello\"");
    }

    #[test]
    fn nested_map_and_list() {
        let value = json!({"a": "quote\"here", "b": [1, null, true]});
        assert_eq!(
            render(&value),
            r#"{["a"] = "quote\"here", ["b"] = {1, nil, true}}"#
        );
    }

    #[test]
    fn empty_containers() {
        assert_eq!(render(&json!([])), "{}");
        assert_eq!(render(&json!({})), "{}");
    }

    #[test]
    fn control_characters_escaped_by_code_point() {
        assert_eq!(escape("a\u{1}b"), "a\\1b");
        assert_eq!(escape("line\nbreak"), "line\\nbreak");
        assert_eq!(escape("back\\slash \"q\""), "back\\\\slash \\\"q\\\"");
    }

    #[test]
    fn escaped_string_round_trips_under_lua_rules() {
        let original = "quote\"here\\and\nnewline\u{7}bell";
        assert_eq!(lua_unescape(&escape(original)), original);
    }
}
