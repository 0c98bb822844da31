use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, warn};
use serde_json::Value;

use crate::config::CollectionSpec;
use crate::error::ReconError;
use crate::model::{MergeReport, FECHA_ACTUALIZACION, FECHA_CREACION, STATUS_FIELDS};
use crate::store::{Document, DocumentStore};

pub fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Reconcile `incoming` into the record stored under `key`.
///
/// Loads, merges and writes back with a single upsert. Store faults
/// propagate untouched.
pub fn reconcile<S: DocumentStore + ?Sized>(
    store: &mut S,
    spec: &CollectionSpec,
    key: &str,
    incoming: &Document,
    now: DateTime<Utc>,
) -> Result<MergeReport, ReconError> {
    let existing = store.find_one(&spec.name, key)?;
    let (merged, mut report) = merge_record(existing.as_ref(), incoming, spec, key, now);
    let upsert = store.upsert(&spec.name, key, &merged)?;
    report.inserted_new = upsert.inserted_new;

    debug!(
        "{}/{key}: inserted_new={} appended={} changed={}",
        spec.name,
        report.inserted_new,
        report.total_appended(),
        report.changed
    );
    Ok(report)
}

/// Pure merge of one incoming field set into an optional stored record.
pub fn merge_record(
    existing: Option<&Document>,
    incoming: &Document,
    spec: &CollectionSpec,
    key: &str,
    now: DateTime<Utc>,
) -> (Document, MergeReport) {
    let mut report = MergeReport { inserted_new: existing.is_none(), ..MergeReport::default() };
    let mut merged = Document::new();
    merged.insert(spec.key_field.clone(), Value::String(key.to_string()));

    // Carry over everything except the previous outcome and update time.
    if let Some(existing) = existing {
        for (field, value) in existing {
            if STATUS_FIELDS.contains(&field.as_str()) || field == FECHA_ACTUALIZACION {
                continue;
            }
            if field == &spec.key_field {
                continue;
            }
            merged.insert(field.clone(), value.clone());
        }
    }

    for (field, value) in incoming {
        if field == &spec.key_field || field == FECHA_CREACION || field == FECHA_ACTUALIZACION {
            continue;
        }
        match spec.repeating.get(field) {
            Some(keys) => {
                let (entities, appended) = merge_entities(merged.get(field), value, keys);
                if appended > 0 {
                    report.appended.insert(field.clone(), appended);
                }
                merged.insert(field.clone(), entities);
            }
            None => {
                merged.insert(field.clone(), value.clone());
            }
        }
    }

    let stamp = timestamp(now);
    if !merged.contains_key(FECHA_CREACION) {
        merged.insert(FECHA_CREACION.into(), Value::String(stamp.clone()));
    }

    report.changed = match existing {
        None => true,
        Some(existing) => {
            let before = existing.iter().filter(|(k, _)| k.as_str() != FECHA_ACTUALIZACION);
            let after = merged.iter().filter(|(k, _)| k.as_str() != FECHA_ACTUALIZACION);
            let before: Document = before.map(|(k, v)| (k.clone(), v.clone())).collect();
            let after: Document = after.map(|(k, v)| (k.clone(), v.clone())).collect();
            before != after
        }
    };

    merged.insert(FECHA_ACTUALIZACION.into(), Value::String(stamp));
    (merged, report)
}

/// Append incoming entities whose composite key matches nothing stored.
///
/// Returns the merged array and how many entities were added. A stored
/// array is never replaced by a non-array value.
pub fn merge_entities(existing: Option<&Value>, incoming: &Value, keys: &[String]) -> (Value, usize) {
    let Value::Array(incoming) = incoming else {
        if let Some(stored @ Value::Array(_)) = existing {
            warn!("ignoring non-array value {incoming} for a repeating field");
            return (stored.clone(), 0);
        }
        return (incoming.clone(), 0);
    };

    let mut fresh: Vec<Value> = Vec::with_capacity(incoming.len());
    for entity in incoming {
        if !fresh.iter().any(|seen| same_entity(seen, entity, keys)) {
            fresh.push(entity.clone());
        }
    }

    let Some(Value::Array(stored)) = existing else {
        let added = fresh.len();
        return (Value::Array(fresh), added);
    };

    let mut merged = stored.clone();
    let mut added = 0;
    for entity in fresh {
        if !merged.iter().any(|seen| same_entity(seen, &entity, keys)) {
            merged.push(entity);
            added += 1;
        }
    }
    (Value::Array(merged), added)
}

/// Entities are equal when every composite key field matches. A field
/// missing on both sides counts as a match.
fn same_entity(a: &Value, b: &Value, keys: &[String]) -> bool {
    match (a, b) {
        (Value::Object(a), Value::Object(b)) => keys.iter().all(|k| a.get(k) == b.get(k)),
        _ => a == b,
    }
}
