use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use consulta_extract::{Driver, DriverError, SnapshotDriver, SnapshotPage};
use consulta_recon::store::Document;
use consulta_recon::{
    DocumentStore, EmptyReason, Estado, MemoryStore, Pipeline, QueryOutcome, ReconError,
    ScrapeConfig, StoreError, SubjectId, UpsertOutcome,
};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture(name: &str) -> String {
    let path = fixtures_dir().join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
}

fn pipeline(portal: &str) -> Pipeline {
    let config = ScrapeConfig::from_file(&fixtures_dir().join("portals.toml")).unwrap();
    Pipeline::new(config.portal(portal).unwrap().clone()).unwrap()
}

fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, minute, 0).unwrap()
}

fn id(raw: &str) -> SubjectId {
    SubjectId::parse(raw).unwrap()
}

// -------------------------------------------------------------------------
// Test doubles
// -------------------------------------------------------------------------

/// Wraps a driver and records when it is released.
struct Tracked<D> {
    inner: D,
    released: Rc<Cell<bool>>,
}

impl<D> Tracked<D> {
    fn new(inner: D) -> (Self, Rc<Cell<bool>>) {
        let released = Rc::new(Cell::new(false));
        (Self { inner, released: released.clone() }, released)
    }
}

impl<D> Drop for Tracked<D> {
    fn drop(&mut self) {
        self.released.set(true);
    }
}

impl<D: Driver> Driver for Tracked<D> {
    type Page = D::Page;

    fn load_and_settle(&mut self, url: &str) -> Result<D::Page, DriverError> {
        self.inner.load_and_settle(url)
    }

    fn wait_for(&mut self, page: &D::Page, selector: &str, timeout: Duration) -> Result<(), DriverError> {
        self.inner.wait_for(page, selector, timeout)
    }
}

/// Every navigation fails with the same fault.
struct Unreachable(DriverError);

impl Driver for Unreachable {
    type Page = SnapshotPage;

    fn load_and_settle(&mut self, _url: &str) -> Result<SnapshotPage, DriverError> {
        Err(self.0.clone())
    }

    fn wait_for(&mut self, _page: &SnapshotPage, _selector: &str, _timeout: Duration) -> Result<(), DriverError> {
        Ok(())
    }
}

struct BrokenStore;

impl DocumentStore for BrokenStore {
    fn find_one(&self, _collection: &str, _key: &str) -> Result<Option<Document>, StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }

    fn upsert(&mut self, _collection: &str, _key: &str, _document: &Document) -> Result<UpsertOutcome, StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }
}

// -------------------------------------------------------------------------
// Query scenarios
// -------------------------------------------------------------------------

#[test]
fn antecedentes_found() {
    let mut store = MemoryStore::new();
    let report = pipeline("antecedentes")
        .run_at(SnapshotDriver::single(fixture("antecedentes.html")), &mut store, &id("1102961867"), at(0))
        .unwrap();

    assert_eq!(report.estado, Estado::Exitoso);
    let QueryOutcome::Success(tables) = &report.outcome else {
        panic!("expected success, got {:?}", report.outcome);
    };
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].title, "Antecedentes");
    assert_eq!(tables[0].headers, vec!["Resultado"]);
    assert_eq!(tables[0].rows[0].get("Resultado"), Some("NO"));

    let stored = store.get("antecedentes", "1102961867").unwrap();
    assert_eq!(stored["cedula"], "1102961867");
    assert_eq!(stored["estado"], "exitoso");
    assert_eq!(stored["tablas"][0]["filas"][0]["Resultado"], "NO");
    assert!(!stored.contains_key("error"));
    assert!(!stored.contains_key("motivo"));
}

#[test]
fn timeout_is_not_registered() {
    let mut store = MemoryStore::new();
    let report = pipeline("antecedentes")
        .run_at(SnapshotDriver::single(fixture("cargando.html")), &mut store, &id("1102961867"), at(0))
        .unwrap();

    assert_eq!(report.outcome, QueryOutcome::Empty(EmptyReason::Timeout));
    let stored = store.get("antecedentes", "1102961867").unwrap();
    assert_eq!(stored["estado"], "no_registrado");
    assert_eq!(stored["motivo"], "timeout, asumido no registrado");
    assert!(!stored.contains_key("error"));
}

#[test]
fn portal_empty_message_is_not_registered() {
    let mut store = MemoryStore::new();
    let report = pipeline("sri")
        .run_at(SnapshotDriver::single(fixture("sin_registros.html")), &mut store, &id("1790011674001"), at(0))
        .unwrap();

    assert_eq!(report.outcome, QueryOutcome::Empty(EmptyReason::PortalMessage));
    let stored = store.get("datosSRI", "1790011674001").unwrap();
    assert_eq!(stored["estado"], "no_registrado");
    assert_eq!(stored["tipoPersona"], "Persona Jurídica");
}

#[test]
fn establecimientos_accumulate_without_duplicates() {
    let pipeline = pipeline("sri");
    let subject = id("1713449831001");
    let mut store = MemoryStore::new();

    let first = pipeline
        .run_at(SnapshotDriver::single(fixture("sri_matriz.html")), &mut store, &subject, at(0))
        .unwrap();
    assert!(first.merge.inserted_new);

    let second = pipeline
        .run_at(SnapshotDriver::single(fixture("sri_sucursales.html")), &mut store, &subject, at(10))
        .unwrap();
    assert!(!second.merge.inserted_new);
    assert_eq!(second.merge.appended.get("establecimientos"), Some(&1));

    let stored = store.get("datosSRI", "1713449831001").unwrap();
    let establecimientos = stored["establecimientos"].as_array().unwrap();
    assert_eq!(establecimientos.len(), 2);
    assert_eq!(establecimientos[0]["numEstablecimiento"], "001");
    assert_eq!(establecimientos[0]["nombre"], "Matriz");
    assert_eq!(establecimientos[1]["numEstablecimiento"], "002");
    assert_eq!(establecimientos[1]["nombre"], "Sucursal");
    assert_eq!(stored["razonSocial"], "ACME CIA. LTDA.");
    assert_eq!(stored["tipoPersona"], "Persona Natural");
    assert_eq!(stored["fechaCreacion"], "2026-03-14T09:00:00.000Z");
    assert_eq!(stored["fechaActualizacion"], "2026-03-14T09:10:00.000Z");
}

#[test]
fn navigation_fault_is_persisted_verbatim() {
    let mut store = MemoryStore::new();
    let fault = DriverError::Navigation("net::ERR_CONNECTION_REFUSED at https://srienlinea.example.test".into());
    let report = pipeline("sri")
        .run_at(Unreachable(fault), &mut store, &id("1713449831001"), at(0))
        .unwrap();

    assert_eq!(report.estado, Estado::Error);
    let stored = store.get("datosSRI", "1713449831001").unwrap();
    assert_eq!(stored["estado"], "error");
    assert_eq!(stored["error"], "net::ERR_CONNECTION_REFUSED at https://srienlinea.example.test");
}

#[test]
fn error_after_success_keeps_previous_data() {
    let pipeline = pipeline("sri");
    let subject = id("1713449831001");
    let mut store = MemoryStore::new();

    pipeline
        .run_at(SnapshotDriver::single(fixture("sri_matriz.html")), &mut store, &subject, at(0))
        .unwrap();
    pipeline
        .run_at(Unreachable(DriverError::Connection("browser closed".into())), &mut store, &subject, at(1))
        .unwrap();

    let stored = store.get("datosSRI", "1713449831001").unwrap();
    assert_eq!(stored["estado"], "error");
    assert_eq!(stored["error"], "browser closed");
    assert_eq!(stored["razonSocial"], "ACME CIA. LTDA.");
    assert_eq!(stored["establecimientos"].as_array().unwrap().len(), 1);

    // A later success clears the error.
    pipeline
        .run_at(SnapshotDriver::single(fixture("sri_matriz.html")), &mut store, &subject, at(2))
        .unwrap();
    let stored = store.get("datosSRI", "1713449831001").unwrap();
    assert_eq!(stored["estado"], "exitoso");
    assert!(!stored.contains_key("error"));
}

#[test]
fn store_fault_propagates() {
    let result = pipeline("antecedentes").run_at(
        SnapshotDriver::single(fixture("antecedentes.html")),
        &mut BrokenStore,
        &id("1102961867"),
        at(0),
    );
    match result {
        Err(ReconError::Store(StoreError::Backend(msg))) => assert_eq!(msg, "connection refused"),
        other => panic!("expected store error, got {other:?}"),
    }
}

#[test]
fn driver_released_on_every_path() {
    let pipeline = pipeline("antecedentes");
    let subject = id("1102961867");

    let (driver, released) = Tracked::new(SnapshotDriver::single(fixture("antecedentes.html")));
    pipeline.query(driver, &subject);
    assert!(released.get());

    let (driver, released) = Tracked::new(SnapshotDriver::single(fixture("cargando.html")));
    pipeline.query(driver, &subject);
    assert!(released.get());

    let (driver, released) = Tracked::new(Unreachable(DriverError::Detached));
    let result = pipeline.run_at(driver, &mut BrokenStore, &subject, at(0));
    assert!(result.is_err());
    assert!(released.get());
}

#[test]
fn repeated_query_is_idempotent() {
    let pipeline = pipeline("sri");
    let subject = id("1713449831001");
    let mut store = MemoryStore::new();

    pipeline
        .run_at(SnapshotDriver::single(fixture("sri_sucursales.html")), &mut store, &subject, at(0))
        .unwrap();
    let before = store.get("datosSRI", "1713449831001").unwrap().clone();

    let report = pipeline
        .run_at(SnapshotDriver::single(fixture("sri_sucursales.html")), &mut store, &subject, at(30))
        .unwrap();
    let after = store.get("datosSRI", "1713449831001").unwrap();

    assert!(!report.merge.changed);
    assert_eq!(before["establecimientos"], after["establecimientos"]);
    assert_eq!(before["fechaCreacion"], after["fechaCreacion"]);
    assert_ne!(before["fechaActualizacion"], after["fechaActualizacion"]);
}
