//! CLI Exit Code Registry
//!
//! Single source of truth for `consulta` exit codes. Scripts rely on them.
//!
//! | Code | Meaning                                                  |
//! |------|----------------------------------------------------------|
//! | 0    | Success                                                  |
//! | 1    | General error (missing record, unreadable input)         |
//! | 2    | Usage error (bad arguments, invalid identifier)          |
//! | 3    | Store error (database unreachable or corrupt)            |
//! | 4    | Config error (portals file or settings invalid)          |
//! | 5    | Query ended with `estado = error`; the record was stored |

use consulta_recon::ReconError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, malformed identifier.
pub const EXIT_USAGE: u8 = 2;

/// The document store failed.
pub const EXIT_STORE: u8 = 3;

/// Portal definitions or settings could not be loaded.
pub const EXIT_CONFIG: u8 = 4;

/// The portal query failed. Its error state was persisted.
pub const EXIT_QUERY_FAILED: u8 = 5;

/// Map a library error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) | ReconError::UnknownPortal(_) => {
            EXIT_CONFIG
        }
        ReconError::InvalidSubject(_) => EXIT_USAGE,
        ReconError::Store(_) => EXIT_STORE,
        ReconError::Io(_) => EXIT_ERROR,
    }
}
