use consulta_extract::{DriverError, ExtractedTable};
use serde::{Deserialize, Serialize};

use crate::model::{EmptyReason, QueryOutcome};

/// What to make of a wait that timed out before the data region appeared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// The portal never renders a result table for unknown subjects.
    #[default]
    AssumeNotRegistered,
    /// Surface the timeout as an error outcome.
    Fail,
}

/// Everything the pipeline learned from one page load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evidence {
    Extracted(Vec<ExtractedTable>),
    /// Body text matched one of the portal's empty-state markers.
    EmptyStateMessage(String),
    Fault(DriverError),
}

impl From<Result<Vec<ExtractedTable>, DriverError>> for Evidence {
    fn from(result: Result<Vec<ExtractedTable>, DriverError>) -> Self {
        match result {
            Ok(tables) => Self::Extracted(tables),
            Err(fault) => Self::Fault(fault),
        }
    }
}

/// Map evidence to exactly one outcome.
pub fn classify(evidence: Evidence, policy: TimeoutPolicy) -> QueryOutcome {
    match evidence {
        Evidence::Extracted(tables) => {
            let rows: usize = tables.iter().map(ExtractedTable::row_count).sum();
            if tables.is_empty() || rows == 0 {
                QueryOutcome::Empty(EmptyReason::NoRecords)
            } else {
                QueryOutcome::Success(tables)
            }
        }
        Evidence::EmptyStateMessage(_) => QueryOutcome::Empty(EmptyReason::PortalMessage),
        Evidence::Fault(fault) if fault.is_timeout() => match policy {
            TimeoutPolicy::AssumeNotRegistered => QueryOutcome::Empty(EmptyReason::Timeout),
            TimeoutPolicy::Fail => QueryOutcome::Error(fault.message()),
        },
        Evidence::Fault(fault) => QueryOutcome::Error(fault.message()),
    }
}

/// First marker found in `body`, compared case-insensitively.
pub fn find_empty_marker<'a>(body: &str, markers: &'a [String]) -> Option<&'a str> {
    let body = body.to_lowercase();
    markers
        .iter()
        .map(String::as_str)
        .filter(|m| !m.trim().is_empty())
        .find(|m| body.contains(&m.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use consulta_extract::Row;

    fn table(rows: usize) -> ExtractedTable {
        ExtractedTable {
            title: "Antecedentes".into(),
            headers: vec!["Resultado".into()],
            rows: (0..rows)
                .map(|_| [("Resultado".to_string(), "NO".to_string())].into_iter().collect::<Row>())
                .collect(),
        }
    }

    fn timeout() -> DriverError {
        DriverError::Timeout { selector: "table".into(), waited_ms: 20000 }
    }

    #[test]
    fn tables_with_rows_succeed() {
        let outcome = classify(Evidence::Extracted(vec![table(1)]), TimeoutPolicy::default());
        assert_eq!(outcome, QueryOutcome::Success(vec![table(1)]));
    }

    #[test]
    fn no_tables_is_empty_not_error() {
        assert_eq!(
            classify(Evidence::Extracted(vec![]), TimeoutPolicy::default()),
            QueryOutcome::Empty(EmptyReason::NoRecords)
        );
        assert_eq!(
            classify(Evidence::Extracted(vec![table(0)]), TimeoutPolicy::Fail),
            QueryOutcome::Empty(EmptyReason::NoRecords)
        );
    }

    #[test]
    fn timeout_follows_policy() {
        assert_eq!(
            classify(Evidence::Fault(timeout()), TimeoutPolicy::AssumeNotRegistered),
            QueryOutcome::Empty(EmptyReason::Timeout)
        );
        assert_eq!(
            classify(Evidence::Fault(timeout()), TimeoutPolicy::Fail),
            QueryOutcome::Error("Timeout 20000ms exceeded waiting for selector \"table\"".into())
        );
    }

    #[test]
    fn other_faults_keep_message_verbatim() {
        let fault = DriverError::Navigation("net::ERR_NAME_NOT_RESOLVED".into());
        assert_eq!(
            classify(Err(fault).into(), TimeoutPolicy::default()),
            QueryOutcome::Error("net::ERR_NAME_NOT_RESOLVED".into())
        );
    }

    #[test]
    fn portal_message_is_empty() {
        let evidence = Evidence::EmptyStateMessage("no se encontr".into());
        assert_eq!(
            classify(evidence, TimeoutPolicy::Fail),
            QueryOutcome::Empty(EmptyReason::PortalMessage)
        );
    }

    #[test]
    fn marker_search_ignores_case_and_blank_markers() {
        let markers = vec!["  ".to_string(), "no se encontr".to_string()];
        assert_eq!(
            find_empty_marker("NO SE ENCONTRARON resultados", &markers),
            Some("no se encontr")
        );
        assert_eq!(find_empty_marker("Resultado: NO", &markers), None);
    }
}
