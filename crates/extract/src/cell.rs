use log::debug;

use crate::driver::{DriverError, Page};

/// One way of reading a cell's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellStrategy {
    /// The driver's rendered text for the cell.
    VisibleText,
    /// Text content of the first descendant matching the selector.
    ContentElement(String),
}

impl CellStrategy {
    fn attempt<P: Page>(&self, page: &P, cell: &P::Node) -> Result<String, DriverError> {
        match self {
            Self::VisibleText => page.visible_text(cell),
            Self::ContentElement(selector) => match page.find_within(cell, selector)?.first() {
                Some(content) => page.text_content(content),
                None => Ok(String::new()),
            },
        }
    }
}

/// Trimmed text of `cell` from the first strategy that neither faults nor
/// comes back empty. Never fails; an unreadable cell is `""`.
pub fn resolve_cell<P: Page>(page: &P, cell: &P::Node, strategies: &[CellStrategy]) -> String {
    for strategy in strategies {
        match strategy.attempt(page, cell) {
            Ok(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    return text.to_string();
                }
            }
            Err(e) => debug!("cell {cell:?}: {strategy:?} failed: {e}"),
        }
    }
    String::new()
}
