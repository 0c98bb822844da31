use log::{debug, warn};
use serde::ser::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::cell::{resolve_cell, CellStrategy};
use crate::driver::{DriverError, Page};
use crate::layout::TableLayout;

/// Title given to containers with no caption.
pub const UNTITLED: &str = "untitled";

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// One data row: `(header, text)` pairs in column order.
///
/// Headers may repeat; lookups return the first match, and the JSON form
/// keeps the first position with the last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    fields: Vec<(String, String)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, header: impl Into<String>, text: impl Into<String>) {
        self.fields.push((header.into(), text.into()));
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, header: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, text)| text.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(h, t)| (h.as_str(), t.as_str()))
    }

    /// At least one field carries text.
    pub fn is_populated(&self) -> bool {
        self.fields.iter().any(|(_, text)| !text.is_empty())
    }

    pub fn to_json(&self) -> Map<String, Value> {
        let mut map = Map::new();
        for (header, text) in &self.fields {
            map.insert(header.clone(), Value::String(text.clone()));
        }
        map
    }
}

impl<H: Into<String>, T: Into<String>> FromIterator<(H, T)> for Row {
    fn from_iter<I: IntoIterator<Item = (H, T)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (header, text) in iter {
            row.push(header, text);
        }
        row
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ExtractedTable {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl ExtractedTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// A non-empty header label and the source column it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResolvedHeader {
    column: usize,
    label: String,
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

pub struct TableExtractor {
    layout: TableLayout,
    strategies: Vec<CellStrategy>,
}

impl TableExtractor {
    pub fn new(layout: TableLayout) -> Self {
        let strategies = layout.cell_strategies();
        Self { layout, strategies }
    }

    pub fn layout(&self) -> &TableLayout {
        &self.layout
    }

    /// Every container on `page` that yields at least one populated row.
    ///
    /// Only the container enumeration itself can fail; faults inside a
    /// container are absorbed (container skipped, header or cell blank).
    pub fn extract<P: Page>(&self, page: &P) -> Result<Vec<ExtractedTable>, DriverError> {
        let containers = page.find_all(&self.layout.container)?;
        debug!("found {} table containers", containers.len());

        let mut tables = Vec::new();
        for (index, container) in containers.iter().enumerate() {
            let raw_rows = match page.find_within(container, &self.layout.row) {
                Ok(rows) => rows,
                Err(e) => {
                    warn!("container {index}: cannot enumerate rows: {e}");
                    continue;
                }
            };
            // Layout artifact; skip before any title/header work.
            if raw_rows.is_empty() {
                continue;
            }

            let title = self.resolve_title(page, container);
            let headers = self.resolve_headers(page, container);
            debug!("processing '{title}' ({} rows, {} headers)", raw_rows.len(), headers.len());

            let rows: Vec<Row> = raw_rows
                .iter()
                .map(|row| self.extract_row(page, row, &headers))
                .filter(Row::is_populated)
                .collect();

            if rows.is_empty() {
                debug!("container {index} ('{title}') produced no populated rows, discarded");
                continue;
            }

            tables.push(ExtractedTable {
                title,
                headers: headers.into_iter().map(|h| h.label).collect(),
                rows,
            });
        }

        Ok(tables)
    }

    /// A caption inside the container wins; otherwise walk from the
    /// container's parent backwards through preceding siblings until one
    /// holds a caption.
    fn resolve_title<P: Page>(&self, page: &P, container: &P::Node) -> String {
        let Some(caption) = &self.layout.caption else {
            return UNTITLED.to_string();
        };

        let mut cursor = Some(container.clone());
        let mut on_container = true;
        while let Some(node) = cursor {
            match page.find_within(&node, caption) {
                Ok(found) => {
                    if let Some(first) = found.first() {
                        let title = page
                            .text_content(first)
                            .map(|t| normalize_ws(&t))
                            .unwrap_or_default();
                        if title.is_empty() {
                            return UNTITLED.to_string();
                        }
                        return title;
                    }
                }
                Err(e) => {
                    debug!("title lookup aborted: {e}");
                    return UNTITLED.to_string();
                }
            }
            cursor = if on_container {
                on_container = false;
                page.parent(&node)
            } else {
                page.previous_sibling(&node)
            };
        }

        UNTITLED.to_string()
    }

    fn resolve_headers<P: Page>(&self, page: &P, container: &P::Node) -> Vec<ResolvedHeader> {
        let cells = match page.find_within(container, &self.layout.header_cell) {
            Ok(cells) => cells,
            Err(e) => {
                warn!("cannot enumerate header cells: {e}");
                return Vec::new();
            }
        };

        cells
            .iter()
            .enumerate()
            .filter_map(|(column, cell)| {
                let label = self.header_label(page, cell);
                (!label.is_empty()).then_some(ResolvedHeader { column, label })
            })
            .collect()
    }

    fn header_label<P: Page>(&self, page: &P, cell: &P::Node) -> String {
        let content = match &self.layout.header_content {
            Some(selector) => match page.find_within(cell, selector) {
                Ok(found) => match found.into_iter().next() {
                    Some(node) => node,
                    None => return String::new(),
                },
                Err(_) => return String::new(),
            },
            None => cell.clone(),
        };

        // Composite header: vertically stacked labels read as one.
        if let Some(sublabel) = &self.layout.header_sublabel {
            if let Ok(labels) = page.find_within(&content, sublabel) {
                if !labels.is_empty() {
                    return labels
                        .iter()
                        .filter_map(|label| page.text_content(label).ok())
                        .map(|text| normalize_ws(&text))
                        .filter(|text| !text.is_empty())
                        .collect::<Vec<_>>()
                        .join(" ");
                }
            }
        }

        page.text_content(&content)
            .map(|t| normalize_ws(&t))
            .unwrap_or_default()
    }

    fn extract_row<P: Page>(&self, page: &P, row: &P::Node, headers: &[ResolvedHeader]) -> Row {
        let cells = page.find_within(row, &self.layout.cell).unwrap_or_else(|e| {
            debug!("row {row:?}: cannot enumerate cells: {e}");
            Vec::new()
        });

        let mut out = Row::new();
        // Extra cells past the last header are dropped.
        for header in headers.iter().take(cells.len()) {
            if let Some(cell) = cells.get(header.column) {
                out.push(header.label.clone(), resolve_cell(page, cell, &self.strategies));
            }
        }
        out
    }
}

fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
