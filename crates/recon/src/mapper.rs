// Per-portal translation of extracted tables into record fields

use std::collections::HashMap;

use consulta_extract::{ExtractedTable, Row};
use serde_json::{json, Map, Value};

use crate::config::{ArrayRule, MapperConfig, ScalarRule};
use crate::model::{QueryOutcome, ERROR, ESTADO, MOTIVO, TIPO_PERSONA, TOTAL_REGISTROS};
use crate::store::Document;
use crate::subject::SubjectId;

/// Turns a portal's tables into the domain fields of a stored record.
///
/// Mappers never write status fields, the key field or timestamps.
pub trait FieldMapper: Send + Sync {
    fn map_tables(&self, subject: &SubjectId, tables: &[ExtractedTable]) -> Document;

    /// Domain fields for a subject the portal has nothing on.
    fn map_absent(&self, _subject: &SubjectId) -> Document {
        Document::new()
    }
}

pub fn mapper_for(config: &MapperConfig) -> Box<dyn FieldMapper> {
    match config {
        MapperConfig::Tables => Box::new(TablesMapper),
        MapperConfig::Entities { scalars, arrays } => Box::new(EntitiesMapper {
            scalars: scalars.clone(),
            arrays: arrays.clone(),
        }),
    }
}

/// Record fields for one classified query: domain fields plus status.
///
/// An error carries no domain fields so whatever was stored before survives.
pub fn outcome_document(
    mapper: &dyn FieldMapper,
    subject: &SubjectId,
    outcome: &QueryOutcome,
) -> Document {
    let mut doc = match outcome {
        QueryOutcome::Success(tables) => mapper.map_tables(subject, tables),
        QueryOutcome::Empty(_) => mapper.map_absent(subject),
        QueryOutcome::Error(_) => Document::new(),
    };
    for field in [ESTADO, ERROR, MOTIVO] {
        doc.remove(field);
    }

    doc.insert(ESTADO.into(), Value::String(outcome.estado().as_str().into()));
    match outcome {
        QueryOutcome::Success(_) => {}
        QueryOutcome::Empty(reason) => {
            doc.insert(MOTIVO.into(), Value::String(reason.as_str().into()));
        }
        QueryOutcome::Error(message) => {
            doc.insert(ERROR.into(), Value::String(message.clone()));
        }
    }
    doc
}

// ---------------------------------------------------------------------------
// Generic tables
// ---------------------------------------------------------------------------

/// Stores every table as `{titulo, headers, filas, totalFilas}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TablesMapper;

impl FieldMapper for TablesMapper {
    fn map_tables(&self, subject: &SubjectId, tables: &[ExtractedTable]) -> Document {
        let tablas: Vec<Value> = tables
            .iter()
            .map(|t| {
                json!({
                    "titulo": t.title,
                    "headers": t.headers,
                    "filas": t.rows.iter().map(|r| Value::Object(r.to_json())).collect::<Vec<_>>(),
                    "totalFilas": t.row_count(),
                })
            })
            .collect();
        let total_rows: usize = tables.iter().map(ExtractedTable::row_count).sum();

        let mut doc = Document::new();
        doc.insert(TIPO_PERSONA.into(), subject.persona_type().as_str().into());
        doc.insert("tablas".into(), Value::Array(tablas));
        doc.insert("totalTablas".into(), tables.len().into());
        doc.insert(TOTAL_REGISTROS.into(), total_rows.into());
        doc
    }

    fn map_absent(&self, subject: &SubjectId) -> Document {
        self.map_tables(subject, &[])
    }
}

// ---------------------------------------------------------------------------
// Named entities
// ---------------------------------------------------------------------------

/// Picks tables by title: first rows become scalar fields, whole tables
/// become entity arrays.
#[derive(Debug, Clone, Default)]
pub struct EntitiesMapper {
    pub scalars: Vec<ScalarRule>,
    pub arrays: Vec<ArrayRule>,
}

fn title_matches(pattern: &str, title: &str) -> bool {
    pattern == "*" || title.to_lowercase().contains(&pattern.to_lowercase())
}

fn rename_row(row: &Row, columns: &HashMap<String, String>) -> Map<String, Value> {
    let mut out = Map::new();
    for (header, text) in row.fields() {
        let name = columns.get(header).map_or(header, String::as_str);
        out.insert(name.to_string(), Value::String(text.to_string()));
    }
    out
}

impl FieldMapper for EntitiesMapper {
    fn map_tables(&self, subject: &SubjectId, tables: &[ExtractedTable]) -> Document {
        let mut doc = Document::new();
        doc.insert(TIPO_PERSONA.into(), subject.persona_type().as_str().into());

        for rule in &self.scalars {
            let first_row = tables
                .iter()
                .filter(|t| title_matches(&rule.table, &t.title))
                .find_map(|t| t.rows.first());
            let Some(row) = first_row else { continue };
            let fields = rename_row(row, &rule.columns);
            match &rule.field {
                Some(name) => {
                    doc.insert(name.clone(), Value::Object(fields));
                }
                None => doc.extend(fields),
            }
        }

        for rule in &self.arrays {
            let matching: Vec<&ExtractedTable> =
                tables.iter().filter(|t| title_matches(&rule.table, &t.title)).collect();
            // No table means no evidence; the stored array stays as it is.
            if matching.is_empty() {
                continue;
            }
            let entities: Vec<Value> = matching
                .iter()
                .flat_map(|t| t.rows.iter())
                .map(|row| Value::Object(rename_row(row, &rule.columns)))
                .collect();
            doc.insert(rule.field.clone(), Value::Array(entities));
        }

        doc
    }

    fn map_absent(&self, subject: &SubjectId) -> Document {
        let mut doc = Document::new();
        doc.insert(TIPO_PERSONA.into(), subject.persona_type().as_str().into());
        doc
    }
}
