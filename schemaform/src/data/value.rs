use serde_json::Value;

use crate::data::path::DataPath;

/// Read the value at `path`. Missing keys, out-of-range indices and
/// traversal through scalars yield `None`.
pub fn resolve_data<'a>(data: &'a Value, path: &DataPath) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(data, |current, seg| step(current, seg))
}

fn step<'a>(current: &'a Value, seg: &str) -> Option<&'a Value> {
    match current {
        Value::Object(map) => map.get(seg),
        Value::Array(items) => items.get(seg.parse::<usize>().ok()?),
        _ => None,
    }
}

fn step_mut<'a>(current: &'a mut Value, seg: &str) -> Option<&'a mut Value> {
    match current {
        Value::Object(map) => map.get_mut(seg),
        Value::Array(items) => items.get_mut(seg.parse::<usize>().ok()?),
        _ => None,
    }
}

/// Replace the value at `path` with the result of `updater`.
///
/// The updater receives the current value (`None` when absent) and returns
/// the new one; returning `None` removes the key from its owner object or
/// nulls the array slot. Returns `false` and leaves `data` untouched when
/// the path is the root or its owner object/array does not exist.
pub fn update_data<F>(data: &mut Value, path: &DataPath, updater: F) -> bool
where
    F: FnOnce(Option<&Value>) -> Option<Value>,
{
    let Some((last, parents)) = path.segments().split_last() else {
        return false;
    };

    let mut owner = data;
    for seg in parents {
        owner = match step_mut(owner, seg) {
            Some(next) => next,
            None => return false,
        };
    }

    match owner {
        Value::Object(map) => {
            let new = updater(map.get(last.as_str()));
            match new {
                Some(v) => {
                    map.insert(last.clone(), v);
                }
                None => {
                    map.remove(last.as_str());
                }
            }
            true
        }
        Value::Array(items) => {
            let Ok(idx) = last.parse::<usize>() else {
                return false;
            };
            if idx < items.len() {
                let new = updater(items.get(idx)).unwrap_or(Value::Null);
                items[idx] = new;
                true
            } else if idx == items.len() {
                items.push(updater(None).unwrap_or(Value::Null));
                true
            } else {
                false
            }
        }
        _ => false,
    }
}
