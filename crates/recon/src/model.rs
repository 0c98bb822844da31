use std::collections::BTreeMap;

use consulta_extract::ExtractedTable;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Persisted field names
// ---------------------------------------------------------------------------

pub const ESTADO: &str = "estado";
pub const ERROR: &str = "error";
pub const MOTIVO: &str = "motivo";
pub const FECHA_CREACION: &str = "fechaCreacion";
pub const FECHA_ACTUALIZACION: &str = "fechaActualizacion";
pub const TIPO_PERSONA: &str = "tipoPersona";
pub const TOTAL_REGISTROS: &str = "totalRegistros";

/// Fields describing the last query's outcome; always rewritten together.
pub const STATUS_FIELDS: [&str; 3] = [ESTADO, ERROR, MOTIVO];

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Why a query ended with no data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
    /// Page loaded, no table carried data.
    NoRecords,
    /// The portal printed an explicit "no records" message.
    PortalMessage,
    /// Data region never appeared; read as "not registered".
    Timeout,
}

impl EmptyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoRecords => "no registros",
            Self::PortalMessage => "sin registros según el portal",
            Self::Timeout => "timeout, asumido no registrado",
        }
    }
}

impl std::fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of one query. Exactly one per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum QueryOutcome {
    Success(Vec<ExtractedTable>),
    Empty(EmptyReason),
    Error(String),
}

impl QueryOutcome {
    pub fn estado(&self) -> Estado {
        match self {
            Self::Success(_) => Estado::Exitoso,
            Self::Empty(_) => Estado::NoRegistrado,
            Self::Error(_) => Estado::Error,
        }
    }

    pub fn total_rows(&self) -> usize {
        match self {
            Self::Success(tables) => tables.iter().map(ExtractedTable::row_count).sum(),
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Estado {
    Exitoso,
    NoRegistrado,
    Error,
}

impl Estado {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exitoso => "exitoso",
            Self::NoRegistrado => "no_registrado",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "exitoso" => Some(Self::Exitoso),
            "no_registrado" => Some(Self::NoRegistrado),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for Estado {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Merge + Report
// ---------------------------------------------------------------------------

/// What one reconciliation did to the stored record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub inserted_new: bool,
    /// Entities appended per repeating field.
    pub appended: BTreeMap<String, usize>,
    /// Anything besides the update timestamp changed.
    pub changed: bool,
}

impl MergeReport {
    pub fn total_appended(&self) -> usize {
        self.appended.values().sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryReport {
    pub portal: String,
    pub subject: String,
    pub estado: Estado,
    pub outcome: QueryOutcome,
    pub merge: MergeReport,
}
