//! Read-side commands over the record store.

use chrono::Utc;

use consulta_recon::{DocumentStore, Estado, SubjectId};

use crate::exit_codes::EXIT_ERROR;
use crate::{print_json, CliError, Context};

/// Stored keys are normalized identifiers; accept the same separators
/// `run` accepts.
fn record_key(id: &str) -> String {
    SubjectId::parse(id).map_or_else(|_| id.trim().to_string(), |s| s.to_string())
}

pub fn cmd_show(ctx: &Context, collection: &str, id: &str) -> Result<(), CliError> {
    let store = ctx.open_store()?;
    let key = record_key(id);
    match store.find_one(collection, &key).map_err(CliError::store)? {
        Some(record) => print_json(&record),
        None => Err(CliError::new(EXIT_ERROR, format!("no record for {key} in {collection}"))),
    }
}

pub fn cmd_list(
    ctx: &Context,
    collection: &str,
    estado: Option<Estado>,
    limit: Option<usize>,
) -> Result<(), CliError> {
    let store = ctx.open_store()?;
    let records = store.list(collection, estado, limit).map_err(CliError::store)?;
    print_json(&records)
}

pub fn cmd_stats(ctx: &Context, collection: &str, json: bool) -> Result<(), CliError> {
    let store = ctx.open_store()?;
    let stats = store.stats(collection).map_err(CliError::store)?;
    if json {
        return print_json(&stats);
    }

    println!("{collection}");
    println!("  total:       {}", stats.total);
    for (estado, count) in &stats.by_estado {
        println!("  {estado:<12} {count}");
    }
    println!("  tasa éxito:  {:.1}%", stats.success_rate);
    println!("  con error:   {}", stats.with_error);
    println!("  con datos:   {}", stats.with_data);
    println!("  naturales:   {}", stats.personas_naturales);
    println!("  jurídicas:   {}", stats.personas_juridicas);
    Ok(())
}

pub fn cmd_cleanup(ctx: &Context, collection: &str, days: Option<u32>) -> Result<(), CliError> {
    let days = days.unwrap_or(ctx.settings.retention_days);
    let store = ctx.open_store()?;
    let deleted = store
        .clean_old_data(collection, days, Utc::now())
        .map_err(CliError::store)?;
    println!("{collection}: removed {deleted} records not updated in {days} days");
    Ok(())
}
