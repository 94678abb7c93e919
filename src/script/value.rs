//! Conversion of interpreter values into configuration trees.

use mlua::{Function, Table, Value as LuaValue};
use serde_json::{Map, Number, Value};

/// Prefix of the tagged textual form of function-valued fields.
pub const FUNCTION_TAG: &str = "__fn:";

/// Deepest table nesting accepted (cyclic tables hit this).
const MAX_DEPTH: usize = 64;

/// Source text of the chunk the values came from, used to render functions.
#[derive(Debug, Clone, Copy)]
pub struct ChunkSource<'a> {
    /// Chunk name the artifact was loaded under
    pub name: &'a str,
    /// Full artifact text
    pub text: &'a str,
}

/// Convert an interpreter value into a configuration tree.
///
/// Sequence tables become arrays, other tables objects; functions become
/// [`FUNCTION_TAG`]-prefixed strings holding their source text, so two
/// functions compare equal exactly when their text is identical.
pub fn to_json(value: &LuaValue, chunk: ChunkSource<'_>) -> Result<Value, String> {
    convert(value, chunk, 0)
}

fn convert(value: &LuaValue, chunk: ChunkSource<'_>, depth: usize) -> Result<Value, String> {
    if depth > MAX_DEPTH {
        return Err(format!("table nesting deeper than {} levels (cyclic table?)", MAX_DEPTH));
    }
    Ok(match value {
        LuaValue::Nil => Value::Null,
        LuaValue::Boolean(b) => Value::Bool(*b),
        LuaValue::Integer(i) => Value::from(*i),
        LuaValue::Number(n) => Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null),
        LuaValue::String(s) => Value::String(s.to_string_lossy().to_string()),
        LuaValue::Table(table) => convert_table(table, chunk, depth)?,
        LuaValue::Function(function) => Value::String(function_text(function, chunk)),
        other => Value::String(format!("<{}>", other.type_name())),
    })
}

fn convert_table(table: &Table, chunk: ChunkSource<'_>, depth: usize) -> Result<Value, String> {
    let len = table.raw_len();
    let mut entries = Vec::new();
    for pair in table.pairs::<LuaValue, LuaValue>() {
        let (key, value) = pair.map_err(|e| e.to_string())?;
        entries.push((key, value));
    }

    if len > 0 && entries.len() == len {
        let mut items: Vec<(i64, Value)> = Vec::with_capacity(len);
        for (key, value) in &entries {
            let LuaValue::Integer(index) = key else {
                return convert_object(&entries, chunk, depth);
            };
            items.push((*index, convert(value, chunk, depth + 1)?));
        }
        items.sort_by_key(|(index, _)| *index);
        return Ok(Value::Array(items.into_iter().map(|(_, v)| v).collect()));
    }

    convert_object(&entries, chunk, depth)
}

fn convert_object(entries: &[(LuaValue, LuaValue)], chunk: ChunkSource<'_>, depth: usize) -> Result<Value, String> {
    let mut map = Map::new();
    let mut keyed: Vec<(String, &LuaValue)> = entries
        .iter()
        .map(|(key, value)| {
            let key = match key {
                LuaValue::String(s) => s.to_string_lossy().to_string(),
                LuaValue::Integer(i) => i.to_string(),
                LuaValue::Number(n) => n.to_string(),
                LuaValue::Boolean(b) => b.to_string(),
                other => format!("<{}>", other.type_name()),
            };
            (key, value)
        })
        .collect();
    // table iteration order is unspecified; sort for stable trees and snapshots
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    for (key, value) in keyed {
        map.insert(key, convert(value, chunk, depth + 1)?);
    }
    Ok(Value::Object(map))
}

/// Tagged textual form of a function.
fn function_text(function: &Function, chunk: ChunkSource<'_>) -> String {
    let info = function.info();
    if info.what == "C" {
        return format!("{}<native>", FUNCTION_TAG);
    }
    let (Some(first), Some(last)) = (info.line_defined, info.last_line_defined) else {
        return format!("{}<unknown>", FUNCTION_TAG);
    };
    if info.source.as_deref() == Some(chunk.name) && first > 0 {
        let body: Vec<&str> =
            chunk.text.lines().skip(first - 1).take(last.saturating_sub(first) + 1).map(str::trim).collect();
        return format!("{}{}", FUNCTION_TAG, body.join("\n"));
    }
    format!("{}{}:{}", FUNCTION_TAG, info.short_src.unwrap_or_default(), first)
}
