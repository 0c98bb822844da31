use std::path::PathBuf;
use std::time::Duration;

use consulta_extract::{Driver, SnapshotDriver, TableExtractor, TableLayout};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn registro() -> String {
    std::fs::read_to_string(fixtures_dir().join("registro_mercantil.html")).unwrap()
}

#[test]
fn zk_registry_page() {
    let mut driver = SnapshotDriver::single(registro());
    let page = driver.load_and_settle("https://registro.example.test/").unwrap();
    driver
        .wait_for(&page, "tr.z-listitem", Duration::from_secs(20))
        .unwrap();

    let tables = TableExtractor::new(TableLayout::zk_listbox()).extract(&page).unwrap();
    // The header-only "Accionistas" listbox is a layout artifact.
    assert_eq!(tables.len(), 2);

    let general = &tables[0];
    assert_eq!(general.title, "Información General");
    assert_eq!(general.headers, vec!["Expediente", "Fecha de Constitución", "Capital"]);
    let row = &general.rows[0];
    assert_eq!(row.get("Expediente"), Some("94561"));
    assert_eq!(row.get("Fecha de Constitución"), Some("2001-05-04"));
    // Blank header column is skipped; hidden text comes from the content element.
    assert_eq!(row.get("Capital"), Some("800.00"));
    assert_eq!(row.len(), 3);

    let admins = &tables[1];
    assert_eq!(admins.title, "Administradores");
    assert_eq!(admins.rows[0].len(), 1);
    assert_eq!(admins.rows[0].get("Cargo"), None);
}

#[test]
fn extraction_serializes_in_page_order() {
    let mut driver = SnapshotDriver::single(registro());
    let page = driver.load_and_settle("https://registro.example.test/").unwrap();
    let extractor = TableExtractor::new(TableLayout::zk_listbox());

    let first = serde_json::to_string(&extractor.extract(&page).unwrap()).unwrap();
    let second = serde_json::to_string(&extractor.extract(&page).unwrap()).unwrap();
    assert_eq!(first, second);
    assert!(first.contains(r#"{"Expediente":"94561","Fecha de Constitución":"2001-05-04","Capital":"800.00"}"#));
}
