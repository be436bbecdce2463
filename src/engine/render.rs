//! Document Renderer
//!
//! Turns a [`Value`] tree into the text the installer reads. Two encodings
//! are supported and one is chosen per document:
//!
//! | Style      | Output |
//! |------------|--------|
//! | `Compact`  | single-line JSON, which every YAML 1.2 reader accepts |
//! | `Indented` | block-style YAML, two spaces per level |
//!
//! # Scalar Rules
//!
//! - `Null` → `null`, booleans and integers → bare literals
//! - Strings → double-quoted with escapes in compact form; in indented form
//!   only when they contain a newline, a structural or comment character, or
//!   would otherwise read back as a non-string
//!
//! The escape set is the intersection of JSON and YAML double-quoted escapes,
//! so a quoted string reads back identically under either grammar.
//!
//! # Determinism
//!
//! Output depends only on the tree: mappings render in insertion order and no
//! hashing or sorting happens here.

use crate::document::Value;
use crate::types::RenderStyle;
use std::fmt::Write as _;

/// First line of every rendered plan.
pub const DOCUMENT_MARKER: &str = "#cloud-config";

/// Spaces per nesting level in the indented encoding.
const INDENT: usize = 2;

/// Characters that force quoting in the indented encoding.
const STRUCTURAL_CHARS: &[char] = &[
    ':', '#', ',', '[', ']', '{', '}', '"', '\'', '\\', '&', '*', '!', '|', '>', '%', '@', '`',
];

/// Plain scalars YAML 1.1 readers resolve to something other than a string
/// (booleans, null, and the `value` and `merge` keys).
const RESERVED_WORDS: &[&str] = &[
    "null", "~", "true", "false", "yes", "no", "on", "off", "y", "n", "=", "<<",
];

/// Render a complete plan: marker line, body, trailing newline.
pub fn render_document(value: &Value, style: RenderStyle) -> String {
    format!("{}\n{}\n", DOCUMENT_MARKER, render(value, style))
}

/// Render a value without the marker line or a trailing newline.
pub fn render(value: &Value, style: RenderStyle) -> String {
    let mut out = String::new();
    match style {
        RenderStyle::Compact => write_compact(&mut out, value),
        RenderStyle::Indented => {
            if value.is_inline() {
                write_inline(&mut out, value);
            } else {
                write_block(&mut out, value, 0);
                // Block lines are newline-terminated; the document adds its own
                out.truncate(out.trim_end_matches('\n').len());
            }
        }
    }
    out
}

// ============================================================================
// Compact (JSON) encoding
// ============================================================================

fn write_compact(out: &mut String, value: &Value) {
    match value {
        Value::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_compact(out, item);
            }
            out.push(']');
        }
        Value::Map(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_quoted(out, key);
                out.push(':');
                write_compact(out, item);
            }
            out.push('}');
        }
        Value::Str(s) => write_quoted(out, s),
        scalar => write_literal(out, scalar),
    }
}

// ============================================================================
// Indented (block YAML) encoding
// ============================================================================

/// Write a non-inline value as block lines at `indent`.
///
/// List items that are themselves blocks are rendered one level deeper and
/// then have their first line's indentation replaced by the `- ` marker, so
/// the item's keys line up one level past the marker.
fn write_block(out: &mut String, value: &Value, indent: usize) {
    match value {
        Value::Map(map) => {
            for (key, item) in map.iter() {
                pad(out, indent);
                write_plain_or_quoted(out, key);
                out.push(':');
                if item.is_inline() {
                    out.push(' ');
                    write_inline(out, item);
                    out.push('\n');
                } else {
                    out.push('\n');
                    write_block(out, item, indent + INDENT);
                }
            }
        }
        Value::List(items) => {
            for item in items {
                pad(out, indent);
                out.push_str("- ");
                if item.is_inline() {
                    write_inline(out, item);
                    out.push('\n');
                } else {
                    let mut nested = String::new();
                    write_block(&mut nested, item, indent + INDENT);
                    out.push_str(&nested[indent + INDENT..]);
                }
            }
        }
        scalar => {
            pad(out, indent);
            write_inline(out, scalar);
            out.push('\n');
        }
    }
}

/// Write a value that fits on the current line.
fn write_inline(out: &mut String, value: &Value) {
    match value {
        Value::Str(s) => write_plain_or_quoted(out, s),
        Value::List(items) if items.is_empty() => out.push_str("[]"),
        Value::Map(map) if map.is_empty() => out.push_str("{}"),
        // Flow-style JSON is valid YAML
        Value::List(_) | Value::Map(_) => write_compact(out, value),
        scalar => write_literal(out, scalar),
    }
}

fn write_plain_or_quoted(out: &mut String, s: &str) {
    if needs_quotes(s) {
        write_quoted(out, s);
    } else {
        out.push_str(s);
    }
}

/// Whether a string must be quoted to survive as the same string in YAML.
pub fn needs_quotes(s: &str) -> bool {
    if s.is_empty() || s.trim() != s {
        return true;
    }
    if s.chars().any(|c| STRUCTURAL_CHARS.contains(&c) || needs_escape(c)) {
        return true;
    }
    if s.starts_with(['-', '?']) {
        return true;
    }
    let lower = s.to_ascii_lowercase();
    if RESERVED_WORDS.contains(&lower.as_str()) {
        return true;
    }
    looks_numeric(s) || looks_like_date(s)
}

/// Plain scalars a YAML reader would resolve to an int or float.
fn looks_numeric(s: &str) -> bool {
    let unsigned = s.strip_prefix(['+', '-']).unwrap_or(s);
    if unsigned.starts_with("0x") || unsigned.starts_with("0o") || unsigned.starts_with("0b") {
        return true;
    }
    if unsigned.starts_with('.') {
        // .inf, .nan, .5
        return true;
    }
    s.parse::<f64>().is_ok() || s.replace('_', "").parse::<f64>().is_ok()
}

/// YAML 1.1 timestamps (`2024-01-31`) resolve to dates in some readers.
fn looks_like_date(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 5 && bytes[..4].iter().all(u8::is_ascii_digit) && bytes[4] == b'-'
}

fn pad(out: &mut String, indent: usize) {
    out.extend(std::iter::repeat_n(' ', indent));
}

// ============================================================================
// Shared scalar output
// ============================================================================

fn write_literal(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(n) => {
            let _ = write!(out, "{}", n);
        }
        Value::Str(s) => write_quoted(out, s),
        Value::List(_) | Value::Map(_) => write_compact(out, value),
    }
}

/// Double-quote and escape a string.
fn write_quoted(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if needs_escape(c) => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{:04x}", unit);
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Characters that are not printable in YAML or not allowed raw in JSON.
fn needs_escape(c: char) -> bool {
    c.is_control() || !is_yaml_printable(c) || matches!(c, '\u{2028}' | '\u{2029}' | '\u{feff}')
}

/// The YAML 1.2 `c-printable` set. Anything else may only appear escaped.
fn is_yaml_printable(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\r'
            | '\u{20}'..='\u{7e}'
            | '\u{85}'
            | '\u{a0}'..='\u{d7ff}'
            | '\u{e000}'..='\u{fffd}'
            | '\u{10000}'..
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Mapping;

    fn sample() -> Value {
        Value::from(
            Mapping::new()
                .with("version", 1)
                .with("keyboard", Mapping::new().with("layout", "us"))
                .with(
                    "config",
                    vec![Value::from(
                        Mapping::new().with("type", "disk").with("id", "disk0"),
                    )],
                )
                .with("late-commands", vec!["echo hi", "a: b"])
                .with("empty", Value::List(vec![])),
        )
    }

    #[test]
    fn test_compact_rendering() {
        assert_eq!(
            render(&sample(), RenderStyle::Compact),
            r#"{"version":1,"keyboard":{"layout":"us"},"config":[{"type":"disk","id":"disk0"}],"late-commands":["echo hi","a: b"],"empty":[]}"#
        );
    }

    #[test]
    fn test_indented_rendering() {
        let expected = "\
version: 1
keyboard:
  layout: us
config:
  - type: disk
    id: disk0
late-commands:
  - echo hi
  - \"a: b\"
empty: []";
        assert_eq!(render(&sample(), RenderStyle::Indented), expected);
    }

    #[test]
    fn test_nested_lists_indent_under_marker() {
        let value = Value::from(vec![
            Value::from(vec!["a", "b"]),
            Value::from(Mapping::new().with("k", vec![Value::from(Mapping::new().with("x", 1).with("y", 2))])),
        ]);
        let expected = "\
- - a
  - b
- k:
    - x: 1
      \"y\": 2";
        assert_eq!(render(&value, RenderStyle::Indented), expected);
    }

    #[test]
    fn test_document_has_marker_and_trailing_newline() {
        let doc = render_document(&sample(), RenderStyle::Compact);
        assert!(doc.starts_with("#cloud-config\n{"));
        assert!(doc.ends_with("}\n"));
        assert_eq!(doc.lines().count(), 2);
    }

    #[test]
    fn test_literals() {
        let value = Value::from(vec![Value::Null, Value::Bool(false), Value::Int(-1)]);
        assert_eq!(render(&value, RenderStyle::Compact), "[null,false,-1]");
        assert_eq!(render(&value, RenderStyle::Indented), "- null\n- false\n- -1");
    }

    #[test]
    fn test_multiline_string_is_escaped() {
        let value = Value::from("cat > /f << 'EOF'\necho \"hi\"\\\nEOF");
        let expected = r#""cat > /f << 'EOF'\necho \"hi\"\\\nEOF""#;
        assert_eq!(render(&value, RenderStyle::Compact), expected);
        assert_eq!(render(&value, RenderStyle::Indented), expected);
    }

    #[test]
    fn test_control_characters_use_unicode_escapes() {
        let value = Value::from("a\u{7f}b\u{1}c\u{2028}");
        assert_eq!(render(&value, RenderStyle::Compact), r#""a\u007fb\u0001c\u2028""#);
    }

    #[test]
    fn test_non_printable_characters_are_escaped() {
        let value = Value::from(Mapping::new().with("k", "echo a\n# \u{fffe}\u{ffff}\n"));
        assert_eq!(
            render(&value, RenderStyle::Compact),
            r#"{"k":"echo a\n# \ufffe\uffff\n"}"#
        );
        assert_eq!(
            render(&value, RenderStyle::Indented),
            r#"k: "echo a\n# \ufffe\uffff\n""#
        );
        // Printable non-ASCII stays raw
        assert_eq!(render(&Value::from("caf\u{e9} \u{1f600}"), RenderStyle::Indented), "caf\u{e9} \u{1f600}");
        assert!(needs_quotes("a\u{fffe}"));
        assert!(!needs_quotes("\u{fffd}"));
    }

    #[test]
    fn test_needs_quotes() {
        // bare
        for s in ["us", "en_US.UTF-8", "Etc/UTC", "/boot/efi", "512M", "superblock-recursive",
            "curtin in-target -- systemctl enable ssh", "$y$j9T$abc."]
        {
            assert!(!needs_quotes(s), "{s} should stay bare");
        }
        // quoted
        for s in ["", " lead", "trail ", "a: b", "# comment", "x # y", "true", "No", "~", "null",
            "1", "-1", "1.5", "0x1f", "1_000", ".inf", "2024-01-31", "- item", "a\nb", "it's",
            "cp a b || true", "{x}", "=", "<<"]
        {
            assert!(needs_quotes(s), "{s:?} should be quoted");
        }
    }

    #[test]
    fn test_keys_follow_scalar_rules() {
        let value = Value::from(Mapping::new().with("install-server", true).with("a:b", 1));
        assert_eq!(
            render(&value, RenderStyle::Indented),
            "install-server: true\n\"a:b\": 1"
        );
    }

    #[test]
    fn test_render_is_deterministic() {
        let tree = sample();
        for style in [RenderStyle::Compact, RenderStyle::Indented] {
            assert_eq!(render(&tree, style), render(&tree.clone(), style));
        }
    }

    #[test]
    fn test_top_level_empty_and_scalar() {
        assert_eq!(render(&Value::Map(Mapping::new()), RenderStyle::Indented), "{}");
        assert_eq!(render(&Value::from("yes"), RenderStyle::Indented), "\"yes\"");
    }
}
