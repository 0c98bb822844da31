use serde::{Deserialize, Serialize};

use crate::cell::CellStrategy;

/// Selector set describing how one markup family lays out its tables.
///
/// All selectors except `container` are evaluated inside the container (or
/// inside the header/row/cell they refine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableLayout {
    pub container: String,
    pub row: String,
    pub header_cell: String,
    /// Element inside a header cell holding its label. `None` means the
    /// header cell itself.
    #[serde(default)]
    pub header_content: Option<String>,
    /// Stacked sub-labels forming a composite header.
    #[serde(default)]
    pub header_sublabel: Option<String>,
    pub cell: String,
    /// Nested element holding a cell's text when visible text is unavailable.
    #[serde(default)]
    pub cell_content: Option<String>,
    /// Caption-like marker searched for while walking back from a container.
    #[serde(default)]
    pub caption: Option<String>,
}

impl TableLayout {
    /// ZK framework listboxes, as rendered by the company registry portal.
    pub fn zk_listbox() -> Self {
        Self {
            container: ".z-listbox".into(),
            row: "tr.z-listitem".into(),
            header_cell: "tr.z-listhead th.z-listheader".into(),
            header_content: Some(".z-listheader-cnt".into()),
            header_sublabel: Some(".z-vlayout .z-label".into()),
            cell: "td.z-listcell".into(),
            cell_content: Some(".z-listcell-cnt".into()),
            caption: Some("td.z-caption-l".into()),
        }
    }

    /// Plain `<table>` markup with `<th>` headers.
    pub fn html_table() -> Self {
        Self {
            container: "table".into(),
            row: "tbody tr".into(),
            header_cell: "tr th".into(),
            header_content: None,
            header_sublabel: None,
            cell: "td".into(),
            cell_content: None,
            caption: Some("caption".into()),
        }
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "zk" | "zk_listbox" => Some(Self::zk_listbox()),
            "html" | "html_table" => Some(Self::html_table()),
            _ => None,
        }
    }

    /// Cell text strategies in the order they are tried.
    pub fn cell_strategies(&self) -> Vec<CellStrategy> {
        let mut strategies = vec![CellStrategy::VisibleText];
        if let Some(content) = &self.cell_content {
            strategies.push(CellStrategy::ContentElement(content.clone()));
        }
        strategies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_by_name() {
        assert_eq!(TableLayout::preset("zk"), Some(TableLayout::zk_listbox()));
        assert_eq!(TableLayout::preset("html_table"), Some(TableLayout::html_table()));
        assert!(TableLayout::preset("xlsx").is_none());
    }

    #[test]
    fn strategies_follow_cell_content() {
        assert_eq!(
            TableLayout::zk_listbox().cell_strategies(),
            vec![
                CellStrategy::VisibleText,
                CellStrategy::ContentElement(".z-listcell-cnt".into())
            ]
        );
        assert_eq!(TableLayout::html_table().cell_strategies(), vec![CellStrategy::VisibleText]);
    }
}
