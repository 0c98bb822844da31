use std::time::Duration;

use chrono::{DateTime, Utc};
use consulta_extract::{Driver, Page, TableExtractor};
use log::{debug, info, warn};

use crate::classify::{classify, find_empty_marker, Evidence};
use crate::config::{CollectionSpec, PortalSpec};
use crate::engine::reconcile;
use crate::error::ReconError;
use crate::mapper::{mapper_for, outcome_document, FieldMapper};
use crate::model::{MergeReport, QueryOutcome, QueryReport};
use crate::store::DocumentStore;
use crate::subject::SubjectId;

/// One portal's query: load, extract, classify, map, reconcile.
pub struct Pipeline {
    portal: PortalSpec,
    extractor: TableExtractor,
    wait_selector: String,
    collection: CollectionSpec,
    mapper: Box<dyn FieldMapper>,
}

impl Pipeline {
    pub fn new(portal: PortalSpec) -> Result<Self, ReconError> {
        let extractor = TableExtractor::new(portal.table_layout()?);
        let wait_selector = portal.wait_selector()?;
        let collection = portal.collection_spec();
        let mapper = mapper_for(&portal.mapper);
        Ok(Self { portal, extractor, wait_selector, collection, mapper })
    }

    /// Replace the configured mapper with a custom one.
    pub fn with_mapper(mut self, mapper: Box<dyn FieldMapper>) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn portal(&self) -> &PortalSpec {
        &self.portal
    }

    pub fn collection(&self) -> &CollectionSpec {
        &self.collection
    }

    pub fn run<D: Driver, S: DocumentStore + ?Sized>(
        &self,
        driver: D,
        store: &mut S,
        subject: &SubjectId,
    ) -> Result<QueryReport, ReconError> {
        self.run_at(driver, store, subject, Utc::now())
    }

    /// [`Pipeline::run`] with an explicit clock.
    pub fn run_at<D: Driver, S: DocumentStore + ?Sized>(
        &self,
        driver: D,
        store: &mut S,
        subject: &SubjectId,
        now: DateTime<Utc>,
    ) -> Result<QueryReport, ReconError> {
        info!("{}: querying {subject}", self.portal.name);
        let outcome = self.query(driver, subject);
        let merge = self.persist(store, subject, &outcome, now)?;
        let estado = outcome.estado();

        info!(
            "{}: {subject} -> {estado} ({} rows, new={})",
            self.portal.name,
            outcome.total_rows(),
            merge.inserted_new
        );
        Ok(QueryReport {
            portal: self.portal.name.clone(),
            subject: subject.to_string(),
            estado,
            outcome,
            merge,
        })
    }

    /// Load and classify without touching any store. The driver is dropped,
    /// and so released, before this returns.
    pub fn query<D: Driver>(&self, driver: D, subject: &SubjectId) -> QueryOutcome {
        let evidence = self.gather(driver, subject);
        classify(evidence, self.portal.timeout_policy)
    }

    /// Map `outcome` to fields and reconcile them into the subject's record.
    pub fn persist<S: DocumentStore + ?Sized>(
        &self,
        store: &mut S,
        subject: &SubjectId,
        outcome: &QueryOutcome,
        now: DateTime<Utc>,
    ) -> Result<MergeReport, ReconError> {
        let document = outcome_document(self.mapper.as_ref(), subject, outcome);
        reconcile(store, &self.collection, subject.as_str(), &document, now)
    }

    fn gather<D: Driver>(&self, mut driver: D, subject: &SubjectId) -> Evidence {
        let url = self.portal.url_for(subject.as_str());
        let page = match driver.load_and_settle(&url) {
            Ok(page) => page,
            Err(fault) => {
                warn!("{}: load failed for {subject}: {fault}", self.portal.name);
                return Evidence::Fault(fault);
            }
        };

        let timeout = Duration::from_millis(self.portal.timeout_ms);
        if let Err(fault) = driver.wait_for(&page, &self.wait_selector, timeout) {
            if !fault.is_timeout() {
                return Evidence::Fault(fault);
            }
            warn!("{}: {fault}", self.portal.name);

            let row_selector = &self.extractor.layout().row;
            let late_rows = page.find_all(row_selector).map(|rows| !rows.is_empty()).unwrap_or(false);
            if !late_rows {
                let body = page.body_text().unwrap_or_default();
                if let Some(marker) = find_empty_marker(&body, &self.portal.empty_markers) {
                    debug!("{}: empty-state marker '{marker}' found", self.portal.name);
                    return Evidence::EmptyStateMessage(marker.to_string());
                }
                return Evidence::Fault(fault);
            }
            debug!("{}: rows rendered after the wait, extracting anyway", self.portal.name);
        }

        self.extractor.extract(&page).into()
    }
}
