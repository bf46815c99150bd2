use std::sync::Arc;

use anyhow::Context;
use engine_logging::{engine_info, engine_warn};
use parcel_core::{ApiStatus, BoundingBox, TileGrid};
use parcel_engine::{
    run_harvest, run_tile_enumeration, CancellationToken, HarvestReport, ReqwestAttributeClient,
    ReqwestTileSource, TileReport,
};

use crate::cli::{HarvestArgs, TilesArgs};
use crate::config::AppConfig;
use crate::progress::LogProgress;

const HARVEST_LOG_EVERY: usize = 500;
const TILES_LOG_EVERY: usize = 50;

pub async fn tiles(args: &TilesArgs, config: &AppConfig) -> anyhow::Result<()> {
    let settings = config.tile_settings(args)?;
    let zoom = config.zoom(args);
    let bbox = BoundingBox {
        north: args.north,
        south: args.south,
        east: args.east,
        west: args.west,
    };
    let source = ReqwestTileSource::new(&settings).context("failed to build tile client")?;
    let grid = TileGrid::covering(&bbox, zoom)?;
    let progress = LogProgress::new(TILES_LOG_EVERY).with_total(grid.len() as usize);

    let report = run_tile_enumeration(&source, &bbox, zoom, &settings, &args.output, &progress)
        .await
        .context("tile enumeration failed")?;
    print_tile_report(&report);
    Ok(())
}

pub async fn harvest(
    args: &HarvestArgs,
    config: &AppConfig,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let api = config.api_settings(args);
    let settings = config.harvest_settings(args);
    engine_info!(
        "Harvesting from {} with {} workers, {} rows per write, {} attempts per entity",
        api.base_url,
        settings.concurrency,
        settings.chunk_size,
        settings.retry.max_retries
    );
    let client = ReqwestAttributeClient::new(&api).context("failed to build API client")?;

    // The pending count is only known inside the run.
    let progress = Arc::new(LogProgress::new(HARVEST_LOG_EVERY));
    let report = run_harvest(
        Arc::new(client),
        &args.input,
        &args.output,
        &settings,
        progress,
        cancel,
    )
    .await
    .context("harvest failed")?;
    print_harvest_report(&report);
    Ok(())
}

/// Cancel `token` on the first Ctrl-C.
pub fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            engine_warn!("Interrupted; finishing in-flight requests and saving");
            token.cancel();
        }
    });
}

fn print_tile_report(report: &TileReport) {
    println!(
        "Scanned {} tiles at zoom {}: {} features, {} entities",
        report.tiles_scanned, report.grid.zoom, report.features_seen, report.entities
    );
    if !report.failures.is_empty() {
        println!("{} tiles could not be read", report.failures.len());
    }
    println!("Wrote {}", report.output.display());
}

fn print_harvest_report(report: &HarvestReport) {
    println!(
        "{} entities in input, {} already harvested",
        report.input_entities, report.already_completed
    );
    if !report.resume_enabled {
        println!("Existing output could not be read; appended without resuming");
    }
    let summary = &report.summary;
    println!(
        "Processed {} entities, {} rows",
        summary.entities, summary.rows
    );
    for status in ApiStatus::ALL {
        println!("  {:<22}{}", status.as_str(), summary.count(status));
    }
    if summary.cancelled {
        println!("Run was interrupted; rerun to continue");
    }
}
