use std::fmt;
use std::time::Duration;

/// Faults raised by a rendering driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// Waited `waited_ms` for `selector` and it never appeared.
    Timeout { selector: String, waited_ms: u64 },
    /// Page could not be loaded (bad URL, HTTP failure, crashed tab).
    Navigation(String),
    /// Markup did not have the expected shape, or a selector was rejected.
    Markup(String),
    /// Connection to the rendering agent was lost.
    Connection(String),
    /// Node handle no longer refers to an element on the page.
    Detached,
}

impl DriverError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The underlying fault text, without the category prefix `Display` adds.
    pub fn message(&self) -> String {
        match self {
            Self::Timeout { selector, waited_ms } => {
                format!("Timeout {waited_ms}ms exceeded waiting for selector \"{selector}\"")
            }
            Self::Navigation(msg) | Self::Markup(msg) | Self::Connection(msg) => msg.clone(),
            Self::Detached => "element is not attached to the DOM".to_string(),
        }
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { .. } => write!(f, "{}", self.message()),
            Self::Navigation(msg) => write!(f, "navigation failed: {msg}"),
            Self::Markup(msg) => write!(f, "unexpected markup: {msg}"),
            Self::Connection(msg) => write!(f, "driver connection lost: {msg}"),
            Self::Detached => write!(f, "{}", self.message()),
        }
    }
}

impl std::error::Error for DriverError {}

/// A settled page as seen through the rendering agent.
///
/// Node handles are opaque; they are only meaningful to the page that
/// produced them.
pub trait Page {
    type Node: Clone + fmt::Debug;

    /// Every element on the page matching `selector`, in document order.
    fn find_all(&self, selector: &str) -> Result<Vec<Self::Node>, DriverError>;

    /// Descendants of `scope` matching `selector`, in document order.
    fn find_within(&self, scope: &Self::Node, selector: &str)
        -> Result<Vec<Self::Node>, DriverError>;

    /// Rendered ("inner") text of a node.
    fn visible_text(&self, node: &Self::Node) -> Result<String, DriverError>;

    /// Raw text content of a node, hidden descendants included.
    fn text_content(&self, node: &Self::Node) -> Result<String, DriverError>;

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Closest preceding sibling that is an element.
    fn previous_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Visible text of the whole document body.
    fn body_text(&self) -> Result<String, DriverError>;
}

/// One browser session. Implementations release their session on `Drop`.
pub trait Driver {
    type Page: Page;

    /// Navigate to `url` and return once the page has settled.
    fn load_and_settle(&mut self, url: &str) -> Result<Self::Page, DriverError>;

    /// Block until `selector` matches something on `page`, or fail with
    /// [`DriverError::Timeout`] after `timeout`.
    fn wait_for(
        &mut self,
        page: &Self::Page,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), DriverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_drops_category_prefix() {
        let err = DriverError::Navigation("net::ERR_CONNECTION_RESET".into());
        assert_eq!(err.message(), "net::ERR_CONNECTION_RESET");
        assert_eq!(err.to_string(), "navigation failed: net::ERR_CONNECTION_RESET");
    }

    #[test]
    fn timeout_message() {
        let err = DriverError::Timeout { selector: "tr.z-listitem".into(), waited_ms: 20000 };
        assert!(err.is_timeout());
        assert_eq!(
            err.to_string(),
            "Timeout 20000ms exceeded waiting for selector \"tr.z-listitem\""
        );
    }
}
