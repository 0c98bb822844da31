// Driver over already-rendered HTML snapshots

use std::collections::HashMap;
use std::time::Duration;

use ego_tree::NodeId;
use log::debug;
use scraper::{ElementRef, Html, Node, Selector};

use crate::driver::{Driver, DriverError, Page};

/// Elements whose text never renders.
const NON_RENDERED: &[&str] = &["script", "style", "template", "noscript", "head"];

/// Elements that break the text flow the way a browser's `innerText` does.
const BLOCK_LEVEL: &[&str] = &[
    "br", "div", "p", "td", "th", "tr", "li", "table", "tbody", "thead", "section",
    "h1", "h2", "h3", "h4", "h5", "h6",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotNode(NodeId);

/// A parsed HTML document exposed through [`Page`].
pub struct SnapshotPage {
    html: Html,
}

impl SnapshotPage {
    pub fn parse(document: &str) -> Self {
        Self { html: Html::parse_document(document) }
    }

    fn element(&self, node: &SnapshotNode) -> Result<ElementRef<'_>, DriverError> {
        self.html
            .tree
            .get(node.0)
            .and_then(ElementRef::wrap)
            .ok_or(DriverError::Detached)
    }
}

fn parse_selector(selector: &str) -> Result<Selector, DriverError> {
    Selector::parse(selector)
        .map_err(|e| DriverError::Markup(format!("invalid selector '{selector}': {e:?}")))
}

fn collect_rendered(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if NON_RENDERED.contains(&name) || el.attr("hidden").is_some() {
                    continue;
                }
                let block = BLOCK_LEVEL.contains(&name);
                if block {
                    out.push(' ');
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_rendered(child_el, out);
                }
                if block {
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}

fn rendered_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_rendered(element, &mut raw);
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl Page for SnapshotPage {
    type Node = SnapshotNode;

    fn find_all(&self, selector: &str) -> Result<Vec<SnapshotNode>, DriverError> {
        let selector = parse_selector(selector)?;
        Ok(self.html.select(&selector).map(|el| SnapshotNode(el.id())).collect())
    }

    fn find_within(
        &self,
        scope: &SnapshotNode,
        selector: &str,
    ) -> Result<Vec<SnapshotNode>, DriverError> {
        let selector = parse_selector(selector)?;
        let scope = self.element(scope)?;
        Ok(scope
            .select(&selector)
            .filter(|el| el.id() != scope.id())
            .map(|el| SnapshotNode(el.id()))
            .collect())
    }

    fn visible_text(&self, node: &SnapshotNode) -> Result<String, DriverError> {
        Ok(rendered_text(self.element(node)?))
    }

    fn text_content(&self, node: &SnapshotNode) -> Result<String, DriverError> {
        Ok(self.element(node)?.text().collect())
    }

    fn parent(&self, node: &SnapshotNode) -> Option<SnapshotNode> {
        let parent = self.html.tree.get(node.0)?.parent()?;
        ElementRef::wrap(parent).map(|el| SnapshotNode(el.id()))
    }

    fn previous_sibling(&self, node: &SnapshotNode) -> Option<SnapshotNode> {
        self.html
            .tree
            .get(node.0)?
            .prev_siblings()
            .find_map(ElementRef::wrap)
            .map(|el| SnapshotNode(el.id()))
    }

    fn body_text(&self) -> Result<String, DriverError> {
        let body = parse_selector("body")?;
        let root = self
            .html
            .select(&body)
            .next()
            .unwrap_or_else(|| self.html.root_element());
        Ok(rendered_text(root))
    }
}

/// Serves snapshots by URL, optionally falling back to one document for any
/// URL. Waiting never sleeps: a selector either matches the snapshot or the
/// wait times out immediately.
#[derive(Debug, Default, Clone)]
pub struct SnapshotDriver {
    pages: HashMap<String, String>,
    fallback: Option<String>,
}

impl SnapshotDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `document` for every URL.
    pub fn single(document: impl Into<String>) -> Self {
        Self { pages: HashMap::new(), fallback: Some(document.into()) }
    }

    pub fn with_page(mut self, url: impl Into<String>, document: impl Into<String>) -> Self {
        self.pages.insert(url.into(), document.into());
        self
    }
}

impl Driver for SnapshotDriver {
    type Page = SnapshotPage;

    fn load_and_settle(&mut self, url: &str) -> Result<SnapshotPage, DriverError> {
        let document = self
            .pages
            .get(url)
            .or(self.fallback.as_ref())
            .ok_or_else(|| DriverError::Navigation(format!("no snapshot recorded for {url}")))?;
        debug!("loaded snapshot for {url} ({} bytes)", document.len());
        Ok(SnapshotPage::parse(document))
    }

    fn wait_for(
        &mut self,
        page: &SnapshotPage,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        if page.find_all(selector)?.is_empty() {
            return Err(DriverError::Timeout {
                selector: selector.to_string(),
                waited_ms: timeout.as_millis() as u64,
            });
        }
        Ok(())
    }
}
