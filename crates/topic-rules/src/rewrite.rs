use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use serde_json::Value;

/// Apply JSON-pointer edits to a copy of `payload`.
///
/// Existing targets are replaced. A missing final segment is created when
/// its parent is an object; `-` appends to an array. Nothing is returned
/// unless every edit applies.
pub fn apply_edits(payload: &Value, edits: &BTreeMap<String, Value>) -> Result<Value> {
    let mut edited = payload.clone();
    for (pointer, value) in edits {
        set_pointer(&mut edited, pointer, value.clone())
            .with_context(|| format!("failed to apply edit at '{pointer}'"))?;
    }
    Ok(edited)
}

fn set_pointer(root: &mut Value, pointer: &str, value: Value) -> Result<()> {
    if let Some(slot) = root.pointer_mut(pointer) {
        *slot = value;
        return Ok(());
    }

    let (parent, last) = pointer
        .rsplit_once('/')
        .context("JSON pointer must start with '/'")?;
    let key = last.replace("~1", "/").replace("~0", "~");

    match root.pointer_mut(parent) {
        Some(Value::Object(map)) => {
            map.insert(key, value);
            Ok(())
        }
        Some(Value::Array(items)) if key == "-" => {
            items.push(value);
            Ok(())
        }
        Some(_) => bail!("parent is not an object"),
        None => bail!("parent does not exist"),
    }
}
