//! Context-aware escaping for slot values

use serde::{Deserialize, Serialize};

/// Output context a slot value is written into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EscapeMode {
    /// HTML text and double/single-quoted attributes
    Html,
    /// Blade view text; `{{`, `{!!` and `@` directives must stay inert
    Blade,
    /// JSX text; braces would open expression containers
    Jsx,
    /// Vue template text; `{{` would open an interpolation
    Vue,
    /// Inside a single- or double-quoted JavaScript string literal
    JsString,
    /// Inside a single-quoted PHP string literal
    PhpString,
    /// A CSS property value
    Css,
}

impl EscapeMode {
    pub fn escape(&self, input: &str) -> String {
        match self {
            EscapeMode::Html | EscapeMode::Blade | EscapeMode::Jsx | EscapeMode::Vue => {
                escape_markup(input, *self)
            }
            EscapeMode::JsString => escape_js_string(input),
            EscapeMode::PhpString => escape_php_string(input),
            EscapeMode::Css => escape_css(input),
        }
    }
}

fn escape_markup(input: &str, mode: EscapeMode) -> String {
    let braces = mode != EscapeMode::Html;
    // Blade directive arguments are PHP strings; a trailing backslash would
    // escape their closing quote
    let blade = mode == EscapeMode::Blade;
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '{' if braces => out.push_str("&#123;"),
            '}' if braces => out.push_str("&#125;"),
            '@' if blade => out.push_str("&#64;"),
            '\\' if blade => out.push_str("&#92;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_js_string(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '`' => out.push_str("\\`"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '$' => out.push_str("\\u0024"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            _ => out.push(c),
        }
    }
    out
}

/// Single-quoted PHP strings cannot spell control characters, so those are
/// spliced in as double-quoted escapes: `'a' . "\n" . 'b'`. The output never
/// contains a raw line break.
fn escape_php_string(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("' . \"\\n\" . '"),
            '\r' => out.push_str("' . \"\\r\" . '"),
            '\t' => out.push_str("' . \"\\t\" . '"),
            c if c.is_control() => out.push_str(&format!("' . \"\\u{{{:x}}}\" . '", c as u32)),
            _ => out.push(c),
        }
    }
    out
}

fn escape_css(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\\' | '"' | '\'' | '{' | '}' | ';' | '<' | '>' | '@' => {
                out.push_str(&format!("\\{:x} ", c as u32))
            }
            c if c.is_control() => {}
            _ => out.push(c),
        }
    }
    out
}

/// JSON-encode a value so it is safe inside script blocks, JSX expression
/// containers, Blade views and single-quoted attributes without further
/// escaping
pub fn json_literal(value: &serde_json::Value) -> String {
    let encoded = value.to_string();
    let mut out = String::with_capacity(encoded.len());
    let mut in_string = false;
    let mut escaped = false;
    for c in encoded.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else {
                match c {
                    '\\' => escaped = true,
                    '"' => in_string = false,
                    // Compact JSON never puts `{{` outside a string
                    '{' => {
                        out.push_str("\\u007b");
                        continue;
                    }
                    '}' => {
                        out.push_str("\\u007d");
                        continue;
                    }
                    '@' => {
                        out.push_str("\\u0040");
                        continue;
                    }
                    _ => {}
                }
            }
        } else if c == '"' {
            in_string = true;
        }
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\'' => out.push_str("\\u0027"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            _ => out.push(c),
        }
    }
    out
}
