//! Reflection manifest (`reflect-config.json`) merging
//!
//! The manifest is a JSON array of per-class objects. Merging only ever touches
//! the objects whose top-level `"name"` is requested, and within those only the
//! `allDeclaredConstructors` field; every other byte of an existing element is
//! kept as written. Scanning is limited to what that needs: splitting the
//! top-level array into elements and listing one object's top-level fields,
//! both aware of string literals and their escapes.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::ops::Range;

use tracing::debug;

/// Directive switched on for every requested class
pub const DIRECTIVE: &str = "allDeclaredConstructors";

const NAME_FIELD: &str = "name";

/// Merge `required` dotted class names into an existing manifest.
///
/// Existing elements keep their order and text; matching objects get the
/// directive enabled in place; names with no existing object are appended in
/// sorted order. Malformed or absent `existing` text counts as an empty manifest.
pub fn merge_reflect_config<'a, I>(required: I, existing: Option<&str>) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let required: BTreeSet<&str> = required.into_iter().collect();

    let elements = match existing.map(|text| is_json(text).then(|| split_array(text)).flatten()) {
        Some(Some(elements)) => elements,
        Some(None) => {
            debug!("existing reflect config is not a valid JSON array, starting fresh");
            Vec::new()
        }
        None => Vec::new(),
    };

    let mut present: BTreeSet<String> = BTreeSet::new();
    let mut entries: Vec<Cow<'_, str>> = Vec::with_capacity(elements.len() + required.len());

    for element in elements {
        let fields = object_fields(element);
        let name = fields.as_deref().and_then(|fields| name_of(element, fields));

        match (name, fields) {
            (Some(name), Some(fields)) if required.contains(name.as_str()) => {
                entries.push(enable_directive(element, &fields));
                present.insert(name);
            }
            _ => entries.push(Cow::Borrowed(element)),
        }
    }

    for name in required.iter().filter(|name| !present.contains(**name)) {
        entries.push(Cow::Owned(minimal_entry(name)));
    }

    render(&entries)
}

fn render(entries: &[Cow<'_, str>]) -> String {
    if entries.is_empty() {
        return "[]\n".to_string();
    }
    let body: Vec<String> = entries.iter().map(|entry| format!("  {}", entry)).collect();
    format!("[\n{}\n]\n", body.join(",\n"))
}

fn minimal_entry(name: &str) -> String {
    let quoted = serde_json::Value::String(name.to_string()).to_string();
    format!("{{\"{}\":{},\"{}\":true}}", NAME_FIELD, quoted, DIRECTIVE)
}

/// Ensure `"allDeclaredConstructors": true` on an object, editing as little as possible
fn enable_directive<'a>(object: &'a str, fields: &[Field]) -> Cow<'a, str> {
    match fields.iter().find(|field| field.key == DIRECTIVE) {
        Some(field) if &object[field.value.clone()] == "true" => Cow::Borrowed(object),
        Some(field) => Cow::Owned(format!(
            "{}true{}",
            &object[..field.value.start],
            &object[field.value.end..]
        )),
        None => {
            let close = object.len() - 1;
            let head = object[..close].trim_end();
            let separator = if fields.is_empty() { "" } else { "," };
            Cow::Owned(format!(
                "{}{}\"{}\":true{}",
                head,
                separator,
                DIRECTIVE,
                &object[head.len()..]
            ))
        }
    }
}

/// The object's top-level `"name"`, if it is a string
fn name_of(object: &str, fields: &[Field]) -> Option<String> {
    let field = fields.iter().find(|field| field.key == NAME_FIELD)?;
    let value = &object[field.value.clone()];
    if value.starts_with('"') {
        decode_string(value)
    } else {
        None
    }
}

#[derive(Debug)]
struct Field {
    key: String,
    /// Byte range of the raw value within the object text
    value: Range<usize>,
}

/// Split a top-level JSON array into its raw element slices
fn is_json(text: &str) -> bool {
    serde_json::from_str::<serde::de::IgnoredAny>(text).is_ok()
}

fn split_array(text: &str) -> Option<Vec<&str>> {
    let bytes = text.as_bytes();
    let mut pos = skip_ws(bytes, 0);
    if bytes.get(pos) != Some(&b'[') {
        return None;
    }
    pos += 1;

    let mut elements = Vec::new();
    loop {
        pos = skip_ws(bytes, pos);
        match *bytes.get(pos)? {
            b']' => {
                return (skip_ws(bytes, pos + 1) == bytes.len()).then_some(elements);
            }
            b',' => pos += 1,
            _ => {
                let end = value_end(bytes, pos)?;
                elements.push(&text[pos..end]);
                pos = skip_ws(bytes, end);
                if !matches!(bytes.get(pos), Some(b',') | Some(b']')) {
                    return None;
                }
            }
        }
    }
}

/// List the top-level fields of a raw JSON object; `None` if it is not one
fn object_fields(object: &str) -> Option<Vec<Field>> {
    let bytes = object.as_bytes();
    if bytes.first() != Some(&b'{') {
        return None;
    }

    let mut fields = Vec::new();
    let mut pos = 1;
    loop {
        pos = skip_ws(bytes, pos);
        match *bytes.get(pos)? {
            b'}' => return Some(fields),
            b',' => pos += 1,
            b'"' => {
                let key_end = string_end(bytes, pos)?;
                let key = decode_string(&object[pos..key_end])?;
                pos = skip_ws(bytes, key_end);
                if bytes.get(pos) != Some(&b':') {
                    return None;
                }
                pos = skip_ws(bytes, pos + 1);
                let end = value_end(bytes, pos)?;
                fields.push(Field {
                    key,
                    value: pos..end,
                });
                pos = end;
            }
            _ => return None,
        }
    }
}

fn skip_ws(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

/// End (exclusive) of the value starting at `start`
fn value_end(bytes: &[u8], start: usize) -> Option<usize> {
    match *bytes.get(start)? {
        b'"' => string_end(bytes, start),
        b'{' | b'[' => container_end(bytes, start),
        _ => {
            let mut pos = start;
            while pos < bytes.len()
                && !bytes[pos].is_ascii_whitespace()
                && !matches!(bytes[pos], b',' | b']' | b'}' | b'{' | b'[' | b'"')
            {
                pos += 1;
            }
            (pos > start).then_some(pos)
        }
    }
}

/// End (exclusive) of the string literal whose opening quote is at `start`
fn string_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut pos = start + 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            b'"' => return Some(pos + 1),
            _ => pos += 1,
        }
    }
    None
}

/// End (exclusive) of the object or array opened at `start`
fn container_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut pos = start;
    while pos < bytes.len() {
        match bytes[pos] {
            b'"' => {
                pos = string_end(bytes, pos)?;
                continue;
            }
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(pos + 1);
                }
            }
            _ => {}
        }
        pos += 1;
    }
    None
}

/// Decode a quoted JSON string literal, including its quotes
fn decode_string(literal: &str) -> Option<String> {
    let inner = literal.strip_prefix('"')?.strip_suffix('"')?;
    if !inner.contains('\\') {
        return Some(inner.to_string());
    }

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            '"' => out.push('"'),
            '\\' => out.push('\\'),
            '/' => out.push('/'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'u' => {
                let mut units = vec![hex4(&mut chars)?];
                if (0xD800..0xDC00).contains(&units[0]) {
                    if chars.next()? != '\\' || chars.next()? != 'u' {
                        return None;
                    }
                    units.push(hex4(&mut chars)?);
                }
                for decoded in char::decode_utf16(units) {
                    out.push(decoded.ok()?);
                }
            }
            _ => return None,
        }
    }
    Some(out)
}

fn hex4(chars: &mut std::str::Chars<'_>) -> Option<u16> {
    let digits: String = chars.by_ref().take(4).collect();
    if digits.len() != 4 {
        return None;
    }
    u16::from_str_radix(&digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::Value;

    fn parse(text: &str) -> Vec<Value> {
        match serde_json::from_str::<Value>(text).expect("merged output is valid JSON") {
            Value::Array(items) => items,
            other => panic!("expected array, got {}", other),
        }
    }

    #[test]
    fn test_merges_with_existing_entries() {
        let existing = r#"[{"name":"com.example.Existing","allDeclaredConstructors":false},{"name":"com.example.Other"}]"#;
        let merged = merge_reflect_config(["com.example.Existing", "com.example.NewOne"], Some(existing));

        assert_eq!(
            merged,
            concat!(
                "[\n",
                "  {\"name\":\"com.example.Existing\",\"allDeclaredConstructors\":true},\n",
                "  {\"name\":\"com.example.Other\"},\n",
                "  {\"name\":\"com.example.NewOne\",\"allDeclaredConstructors\":true}\n",
                "]\n"
            )
        );

        let again = merge_reflect_config(["com.example.NewOne", "com.example.Existing"], Some(&merged));
        assert_eq!(again, merged);
    }

    #[test]
    fn test_merges_when_existing_content_missing() {
        let merged = merge_reflect_config(["com.example.Solo"], None);
        insta::assert_snapshot!(merged.trim_end(), @r#"
        [
          {"name":"com.example.Solo","allDeclaredConstructors":true}
        ]
        "#);
    }

    #[test]
    fn test_preserves_objects_without_name() {
        let merged = merge_reflect_config(["com.example.Added"], Some(r#"[{"foo":"bar"}]"#));
        let items = parse(&merged);

        assert!(merged.contains(r#"{"foo":"bar"}"#));
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["name"], "com.example.Added");
    }

    #[test]
    fn test_inserts_directive_when_absent() {
        let existing = "[\n  {\n    \"name\": \"a.B\",\n    \"allPublicMethods\": true\n  }\n]";
        let merged = merge_reflect_config(["a.B"], Some(existing));
        let items = parse(&merged);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0][DIRECTIVE], true);
        assert_eq!(items[0]["allPublicMethods"], true);
        assert!(merged.contains("\"allPublicMethods\": true,\"allDeclaredConstructors\":true\n  }"));
    }

    #[test]
    fn test_leaves_enabled_object_byte_identical() {
        let object = r#"{ "allDeclaredConstructors" : true, "name" : "a.B", "fields": [{"name":"x"}] }"#;
        let merged = merge_reflect_config(["a.B"], Some(&format!("[{}]", object)));
        assert_eq!(merged, format!("[\n  {}\n]\n", object));
    }

    #[test]
    fn test_flips_non_true_values_in_place() {
        let merged = merge_reflect_config(["a.B"], Some(r#"[{"name":"a.B","allDeclaredConstructors": null}]"#));
        assert!(merged.contains(r#"{"name":"a.B","allDeclaredConstructors": true}"#));
    }

    #[test]
    fn test_structure_inside_strings_is_ignored() {
        let existing = r#"[{"note":"}{\"name\":\"x.Y\"},[","name":"a.B"},{"type":{"name":"x.Y"}}]"#;
        let merged = merge_reflect_config(["x.Y", "a.B"], Some(existing));
        let items = parse(&merged);

        assert_eq!(items.len(), 3);
        assert_eq!(items[0]["name"], "a.B");
        assert_eq!(items[0][DIRECTIVE], true);
        // nested name is not the object's own name
        assert_eq!(items[1], serde_json::json!({"type": {"name": "x.Y"}}));
        assert_eq!(items[2]["name"], "x.Y");
    }

    #[test]
    fn test_escaped_names_are_matched_and_minted_consistently() {
        let merged = merge_reflect_config(["a.\u{e9}"], Some(r#"[{"name":"a.\u00e9"}]"#));
        let items = parse(&merged);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0][DIRECTIVE], true);

        let minted = merge_reflect_config(["quote\"d"], None);
        assert_eq!(parse(&minted)[0]["name"], "quote\"d");
        assert_eq!(merge_reflect_config(["quote\"d"], Some(&minted)), minted);
    }

    #[test]
    fn test_non_object_elements_and_odd_names_are_preserved() {
        let existing = r#"[42, "text", null, {"name": 7}, [1, {"name":"a.B"}]]"#;
        let merged = merge_reflect_config(["a.B"], Some(existing));
        let items = parse(&merged);

        assert_eq!(items.len(), 6);
        assert_eq!(items[0], 42);
        assert_eq!(items[3], serde_json::json!({"name": 7}));
        assert_eq!(items[5]["name"], "a.B");
    }

    #[test]
    fn test_malformed_existing_counts_as_empty() {
        for broken in ["", "not json", "{\"name\":\"a.B\"}", "[{\"name\":\"a.B\"", "[1 2]", "[] trailing"] {
            let merged = merge_reflect_config(["a.B"], Some(broken));
            assert_eq!(
                merged,
                "[\n  {\"name\":\"a.B\",\"allDeclaredConstructors\":true}\n]\n",
                "input {:?}",
                broken
            );
        }
    }

    #[test]
    fn test_invalid_element_text_discards_existing_manifest() {
        for broken in [
            "[{\"x\":1], 2]",
            "[foo]",
            "[{\"name\":\"a.B\",\"x\":tru}]",
            "[,{\"name\":\"a.B\"}]",
            "[{\"name\":\"a.B\"},,1]",
        ] {
            let merged = merge_reflect_config(["a.B"], Some(broken));
            assert_eq!(
                merged,
                "[\n  {\"name\":\"a.B\",\"allDeclaredConstructors\":true}\n]\n",
                "input {:?}",
                broken
            );
            assert!(serde_json::from_str::<serde_json::Value>(&merged).is_ok());
        }
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(merge_reflect_config([], None), "[]\n");
        assert_eq!(merge_reflect_config([], Some("[ ]")), "[]\n");
    }

    #[test]
    fn test_every_matching_object_is_enabled() {
        let existing = r#"[{"name":"a.B"},{"name":"a.B","allDeclaredConstructors":false}]"#;
        let merged = merge_reflect_config(["a.B"], Some(existing));
        let items = parse(&merged);
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|item| item[DIRECTIVE] == true));
    }

    proptest! {
        #[test]
        fn merge_is_idempotent(names in proptest::collection::btree_set("[a-z]{1,6}(\\.[A-Za-z]{1,6}){0,3}", 0..8)) {
            let first = merge_reflect_config(names.iter().map(String::as_str), None);
            let second = merge_reflect_config(names.iter().map(String::as_str), Some(&first));
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(parse(&first).len(), names.len());
        }
    }
}
