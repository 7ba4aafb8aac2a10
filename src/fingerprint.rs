// src/fingerprint.rs
//! Job fingerprints: `<class>:<murmur3 x64 128 hex>` over the reduced
//! argument list.

use crate::{JobPayload, Result, UniqueJobsError, UniqueOn};
use serde_json::{Map, Value};
use std::io::Cursor;

const SEED: u32 = 0;

impl UniqueOn {
    /// Reduce the argument list to the view that identifies the job.
    pub fn reduce(&self, args: &[Value]) -> Vec<Value> {
        match self {
            UniqueOn::AllArgs => args.to_vec(),
            UniqueOn::Positions(positions) => positions
                .iter()
                .filter_map(|&i| args.get(i).cloned())
                .collect(),
            UniqueOn::Fields(fields) => args
                .iter()
                .map(|arg| match arg {
                    Value::Object(map) => Value::Object(
                        map.iter()
                            .filter(|(k, _)| fields.iter().any(|f| f == *k))
                            .map(|(k, v)| (k.clone(), v.clone()))
                            .collect::<Map<_, _>>(),
                    ),
                    other => other.clone(),
                })
                .collect(),
        }
    }
}

/// Fingerprint for `class` over `args` reduced by `unique_on`.
///
/// The canonical form is the compact JSON rendering of the reduced list;
/// object keys are emitted in sorted order, so field order in the producer's
/// struct does not matter.
pub fn fingerprint(class: &str, args: &[Value], unique_on: &UniqueOn) -> Result<String> {
    let canonical = serde_json::to_string(&unique_on.reduce(args))?;
    let hash = murmur3::murmur3_x64_128(&mut Cursor::new(canonical.as_bytes()), SEED)
        .map_err(UniqueJobsError::Hash)?;
    Ok(format!("{class}:{hash:032x}"))
}

/// Set `payload.unique_key` if it is not set yet and return it.
///
/// A key that is already present is never recomputed: it was derived from
/// the same class and arguments at first enqueue and must stay stable
/// across scheduling and retries.
pub fn ensure_unique_key(payload: &mut JobPayload) -> Result<&str> {
    if payload.unique_key.is_none() {
        let unique_on = payload
            .unique_for
            .as_ref()
            .map(|cfg| cfg.unique_on.clone())
            .unwrap_or_default();
        let key = fingerprint(&payload.class, &payload.args, &unique_on)?;
        payload.unique_key = Some(key);
    }
    payload
        .unique_key
        .as_deref()
        .ok_or(UniqueJobsError::MissingField("unique_key"))
}
