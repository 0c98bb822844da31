use std::collections::{BTreeMap, HashMap};

use consulta_extract::TableLayout;
use serde::Deserialize;

use crate::classify::TimeoutPolicy;
use crate::error::ReconError;
use crate::model::{FECHA_ACTUALIZACION, FECHA_CREACION, STATUS_FIELDS};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeConfig {
    pub portals: BTreeMap<String, PortalSpec>,
}

// ---------------------------------------------------------------------------
// Portal
// ---------------------------------------------------------------------------

/// One query target: where to load, how to read it, where results go.
#[derive(Debug, Clone, Deserialize)]
pub struct PortalSpec {
    /// Filled from the `[portals.<name>]` table key.
    #[serde(skip)]
    pub name: String,
    /// Page to load. `{id}` is replaced with the subject identifier.
    pub url: String,
    pub collection: String,
    #[serde(default = "default_key_field")]
    pub key_field: String,
    /// Selector marking the data region. Defaults to the layout's row selector.
    #[serde(default)]
    pub wait_for: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub timeout_policy: TimeoutPolicy,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default = "default_empty_markers")]
    pub empty_markers: Vec<String>,
    #[serde(default)]
    pub mapper: MapperConfig,
    /// Array field → composite key fields.
    #[serde(default)]
    pub repeating: BTreeMap<String, Vec<String>>,
}

fn default_key_field() -> String {
    "id".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_empty_markers() -> Vec<String> {
    ["no se encontr", "sin registros", "no existe", "no hay datos", "no hay información"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl PortalSpec {
    pub fn url_for(&self, subject: &str) -> String {
        self.url.replace("{id}", subject)
    }

    pub fn table_layout(&self) -> Result<TableLayout, ReconError> {
        match &self.layout {
            LayoutConfig::Preset(name) => TableLayout::preset(name).ok_or_else(|| {
                ReconError::ConfigValidation(format!(
                    "portal '{}': unknown layout preset '{name}'",
                    self.name
                ))
            }),
            LayoutConfig::Custom(layout) => Ok(layout.clone()),
        }
    }

    /// Selector awaited before extraction.
    pub fn wait_selector(&self) -> Result<String, ReconError> {
        match &self.wait_for {
            Some(selector) => Ok(selector.clone()),
            None => Ok(self.table_layout()?.row),
        }
    }

    pub fn collection_spec(&self) -> CollectionSpec {
        CollectionSpec {
            name: self.collection.clone(),
            key_field: self.key_field.clone(),
            repeating: self.repeating.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Layout + Mapper
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LayoutConfig {
    /// `"zk"`, `"zk_listbox"`, `"html"` or `"html_table"`.
    Preset(String),
    Custom(TableLayout),
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self::Preset("html".into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MapperConfig {
    /// Store every table generically.
    #[default]
    Tables,
    /// Turn named tables into scalar fields and entity arrays.
    Entities {
        #[serde(default)]
        scalars: Vec<ScalarRule>,
        #[serde(default)]
        arrays: Vec<ArrayRule>,
    },
}

/// First row of a matching table becomes fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScalarRule {
    /// Case-insensitive substring of the table title, or `"*"`.
    pub table: String,
    /// Nest the fields under this name. `None` writes them at top level.
    #[serde(default)]
    pub field: Option<String>,
    /// Header → field name. Unlisted headers keep their header text.
    #[serde(default)]
    pub columns: HashMap<String, String>,
}

/// Every row of a matching table becomes one entity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArrayRule {
    pub table: String,
    pub field: String,
    #[serde(default)]
    pub columns: HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

/// Where and how records of one portal are reconciled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: String,
    pub key_field: String,
    pub repeating: BTreeMap<String, Vec<String>>,
}

impl CollectionSpec {
    pub fn new(name: impl Into<String>, key_field: impl Into<String>) -> Self {
        Self { name: name.into(), key_field: key_field.into(), repeating: BTreeMap::new() }
    }

    pub fn with_repeating<I, K>(mut self, field: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.repeating.insert(field.into(), keys.into_iter().map(Into::into).collect());
        self
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ScrapeConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let mut config: ScrapeConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        for (name, portal) in config.portals.iter_mut() {
            portal.name = name.clone();
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self, ReconError> {
        let input = std::fs::read_to_string(path)
            .map_err(|e| ReconError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml(&input)
    }

    pub fn portal(&self, name: &str) -> Result<&PortalSpec, ReconError> {
        self.portals
            .get(name)
            .ok_or_else(|| ReconError::UnknownPortal(name.to_string()))
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.portals.is_empty() {
            return Err(ReconError::ConfigValidation("no portals defined".into()));
        }

        let mut key_fields: HashMap<&str, (&str, &str)> = HashMap::new();
        for (name, portal) in &self.portals {
            let invalid = |msg: String| ReconError::ConfigValidation(format!("portal '{name}': {msg}"));

            if portal.url.trim().is_empty() {
                return Err(invalid("url is empty".into()));
            }
            if portal.collection.trim().is_empty() {
                return Err(invalid("collection is empty".into()));
            }
            if portal.key_field.trim().is_empty() {
                return Err(invalid("key_field is empty".into()));
            }
            if portal.timeout_ms == 0 {
                return Err(invalid("timeout_ms must be greater than 0".into()));
            }
            portal.table_layout()?;

            for (field, keys) in &portal.repeating {
                if keys.is_empty() || keys.iter().any(|k| k.trim().is_empty()) {
                    return Err(invalid(format!("repeating field '{field}' has an empty composite key")));
                }
                let reserved = field == &portal.key_field
                    || STATUS_FIELDS.contains(&field.as_str())
                    || field == FECHA_CREACION
                    || field == FECHA_ACTUALIZACION;
                if reserved {
                    return Err(invalid(format!("repeating field '{field}' is reserved")));
                }
            }

            // Records in one collection share a key field.
            match key_fields.get(portal.collection.as_str()) {
                Some((other, key)) if *key != portal.key_field => {
                    return Err(invalid(format!(
                        "collection '{}' already keyed by '{key}' in portal '{other}'",
                        portal.collection
                    )));
                }
                Some(_) => {}
                None => {
                    key_fields.insert(portal.collection.as_str(), (name.as_str(), portal.key_field.as_str()));
                }
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
[portals.antecedentes]
url = "https://certificados.example.test/consulta?cedula={id}"
collection = "antecedentes"
key_field = "cedula"
timeout_ms = 20000
layout = "html"

[portals.sri]
url = "https://srienlinea.example.test/ruc/{id}"
collection = "datosSRI"
key_field = "ruc"
timeout_policy = "fail"
layout = "zk"

[portals.sri.repeating]
establecimientos = ["numEstablecimiento"]

[portals.sri.mapper]
kind = "entities"

[[portals.sri.mapper.scalars]]
table = "contribuyente"

[[portals.sri.mapper.arrays]]
table = "establecimientos"
field = "establecimientos"
columns = { "No. Establecimiento" = "numEstablecimiento", "Nombre" = "nombre" }
"#;

    #[test]
    fn parse_valid() {
        let config = ScrapeConfig::from_toml(VALID).unwrap();
        assert_eq!(config.portals.len(), 2);

        let antecedentes = config.portal("antecedentes").unwrap();
        assert_eq!(antecedentes.name, "antecedentes");
        assert_eq!(antecedentes.timeout_policy, TimeoutPolicy::AssumeNotRegistered);
        assert_eq!(antecedentes.mapper, MapperConfig::Tables);
        assert_eq!(antecedentes.empty_markers.len(), 5);
        assert_eq!(
            antecedentes.url_for("1102961867"),
            "https://certificados.example.test/consulta?cedula=1102961867"
        );
        assert_eq!(antecedentes.wait_selector().unwrap(), "tbody tr");

        let sri = config.portal("sri").unwrap();
        assert_eq!(sri.timeout_policy, TimeoutPolicy::Fail);
        assert_eq!(sri.table_layout().unwrap(), TableLayout::zk_listbox());
        let spec = sri.collection_spec();
        assert_eq!(spec.key_field, "ruc");
        assert_eq!(spec.repeating["establecimientos"], vec!["numEstablecimiento"]);
        match &sri.mapper {
            MapperConfig::Entities { scalars, arrays } => {
                assert_eq!(scalars.len(), 1);
                assert_eq!(scalars[0].field, None);
                assert_eq!(arrays[0].columns["Nombre"], "nombre");
            }
            other => panic!("unexpected mapper {other:?}"),
        }
    }

    #[test]
    fn key_field_defaults_to_id() {
        let config = ScrapeConfig::from_toml(
            "[portals.p]\nurl = \"https://x.test/{id}\"\ncollection = \"c\"\n",
        )
        .unwrap();
        assert_eq!(config.portal("p").unwrap().key_field, "id");
        assert_eq!(config.portal("p").unwrap().timeout_ms, 20_000);
    }

    #[test]
    fn custom_layout() {
        let input = r#"
[portals.p]
url = "https://x.test/{id}"
collection = "c"

[portals.p.layout]
container = "div.grid"
row = "div.grid-row"
header_cell = "div.grid-head span"
cell = "div.grid-cell"
"#;
        let config = ScrapeConfig::from_toml(input).unwrap();
        let layout = config.portal("p").unwrap().table_layout().unwrap();
        assert_eq!(layout.container, "div.grid");
        assert_eq!(layout.caption, None);
    }

    #[test]
    fn unknown_portal() {
        let config = ScrapeConfig::from_toml(VALID).unwrap();
        assert!(matches!(config.portal("nope"), Err(ReconError::UnknownPortal(_))));
    }

    #[test]
    fn reject_unknown_layout_preset() {
        let input = VALID.replace("layout = \"zk\"", "layout = \"bootstrap\"");
        let err = ScrapeConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("unknown layout preset 'bootstrap'"));
    }

    #[test]
    fn reject_empty_composite_key() {
        let input = VALID.replace("[\"numEstablecimiento\"]", "[]");
        assert!(matches!(
            ScrapeConfig::from_toml(&input),
            Err(ReconError::ConfigValidation(_))
        ));
    }

    #[test]
    fn reject_zero_timeout() {
        let input = VALID.replace("timeout_ms = 20000", "timeout_ms = 0");
        assert!(matches!(
            ScrapeConfig::from_toml(&input),
            Err(ReconError::ConfigValidation(_))
        ));
    }

    #[test]
    fn reject_reserved_repeating_field() {
        let input = VALID.replace("establecimientos = [", "estado = [");
        let err = ScrapeConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("reserved"));
    }

    #[test]
    fn reject_conflicting_key_fields() {
        let input = format!(
            "{VALID}\n[portals.sri2]\nurl = \"https://x.test\"\ncollection = \"datosSRI\"\nkey_field = \"id\"\n"
        );
        let err = ScrapeConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("already keyed by"));
    }

    #[test]
    fn reject_bad_toml() {
        assert!(matches!(
            ScrapeConfig::from_toml("[portals.p\nurl ="),
            Err(ReconError::ConfigParse(_))
        ));
    }
}
