//! `consulta extract`, `consulta run` and `consulta validate`.

use std::path::{Path, PathBuf};

use log::info;
use serde_json::json;

use consulta_extract::{SnapshotDriver, SnapshotPage, TableExtractor, TableLayout};
use consulta_recon::{classify, DocumentStore, Estado, Pipeline, ScrapeConfig, SubjectId, TimeoutPolicy};

use crate::exit_codes::EXIT_QUERY_FAILED;
use crate::{print_json, read_file, CliError, Context, LayoutArg};

pub fn cmd_extract(html: &Path, layout: LayoutArg) -> Result<(), CliError> {
    let document = read_file(html)?;
    let layout = match layout {
        LayoutArg::Zk => TableLayout::zk_listbox(),
        LayoutArg::Html => TableLayout::html_table(),
    };

    let page = SnapshotPage::parse(&document);
    let evidence = TableExtractor::new(layout).extract(&page).into();
    let outcome = classify(evidence, TimeoutPolicy::default());

    print_json(&json!({
        "estado": outcome.estado(),
        "totalRegistros": outcome.total_rows(),
        "resultado": outcome,
    }))
}

pub fn cmd_run(
    ctx: &Context,
    portal: &str,
    id: &str,
    html: &Path,
    timeout_ms: Option<u64>,
) -> Result<(), CliError> {
    let portals_file = ctx.portals_file();
    let config = ScrapeConfig::from_file(&portals_file)
        .map_err(|e| CliError::recon(e).with_hint(format!("portals file: {}", portals_file.display())))?;
    let mut spec = config.portal(portal).map_err(CliError::recon)?.clone();

    if let Some(ms) = timeout_ms.or(ctx.settings.timeout_ms) {
        if ms == 0 {
            return Err(CliError::args("--timeout-ms must be greater than 0"));
        }
        spec.timeout_ms = ms;
    }

    let subject = SubjectId::parse(id).map_err(CliError::recon)?;
    let document = read_file(html)?;
    let pipeline = Pipeline::new(spec).map_err(CliError::recon)?;
    let mut store = ctx.open_store()?;

    let report = pipeline
        .run(SnapshotDriver::single(document), &mut store, &subject)
        .map_err(CliError::recon)?;
    let record = store
        .find_one(&pipeline.collection().name, subject.as_str())
        .map_err(CliError::store)?;
    print_json(&record)?;

    if report.estado == Estado::Error {
        let detail = record
            .as_ref()
            .and_then(|r| r.get("error"))
            .and_then(|e| e.as_str())
            .unwrap_or("unknown");
        return Err(CliError::new(EXIT_QUERY_FAILED, format!("{portal} query failed: {detail}")));
    }
    Ok(())
}

pub fn cmd_validate(ctx: &Context, file: Option<PathBuf>) -> Result<(), CliError> {
    let path = file.unwrap_or_else(|| ctx.portals_file());
    let config = ScrapeConfig::from_file(&path).map_err(CliError::recon)?;
    for (name, portal) in &config.portals {
        info!("{name}: collection={} key={}", portal.collection, portal.key_field);
    }
    println!("{}: {} portals OK", path.display(), config.portals.len());
    Ok(())
}
