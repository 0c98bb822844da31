//! `consulta-extract` reads variable-shape tables off rendered portal pages.
//!
//! The browser is an external capability (see [`driver`]); this crate only
//! walks whatever the driver exposes. [`snapshot`] provides a driver over
//! already-rendered HTML.

pub mod cell;
pub mod driver;
pub mod layout;
pub mod snapshot;
pub mod table;

pub use cell::{resolve_cell, CellStrategy};
pub use driver::{Driver, DriverError, Page};
pub use layout::TableLayout;
pub use snapshot::{SnapshotDriver, SnapshotPage};
pub use table::{ExtractedTable, Row, TableExtractor, UNTITLED};
