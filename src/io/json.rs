//! JSON export
//!
//! Each stat becomes an object keyed by dimension label, plus `value` (null
//! when missing) and `flags`. Absent coordinates are left out.

use std::io::Write;

use serde_json::{Map, Value};

use crate::error::Result;
use crate::hypercube::Hypercube;

fn row_objects<S: AsRef<str>>(hc: &Hypercube, order: &[S]) -> Vec<Value> {
    let labels: Vec<String> = if order.is_empty() {
        hc.sorted_labels()
    } else {
        order.iter().map(|s| s.as_ref().to_string()).collect()
    };

    hc.rows(&labels)
        .into_iter()
        .map(|row| {
            let mut obj = Map::new();
            for (label, coord) in labels.iter().zip(row.coords) {
                if let Some(coord) = coord {
                    obj.insert(label.clone(), Value::String(coord));
                }
            }
            let value = serde_json::Number::from_f64(row.value).map_or(Value::Null, Value::Number);
            obj.insert("value".to_string(), value);
            if !row.flags.is_empty() {
                obj.insert("flags".to_string(), Value::String(row.flags));
            }
            Value::Object(obj)
        })
        .collect()
}

/// Rows of the hypercube as a JSON array
pub fn rows_to_json<S: AsRef<str>>(hc: &Hypercube, order: &[S]) -> Result<String> {
    Ok(serde_json::to_string(&row_objects(hc, order))?)
}

/// Write the rows of the hypercube as a pretty printed JSON array
pub fn write_json<W: Write, S: AsRef<str>>(hc: &Hypercube, order: &[S], out: W) -> Result<()> {
    serde_json::to_writer_pretty(out, &row_objects(hc, order))?;
    Ok(())
}
