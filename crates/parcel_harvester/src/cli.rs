use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "parcel-harvester",
    about = "Collect parcels from vector tiles and harvest their building rules",
    version
)]
pub struct Cli {
    /// RON file with default settings; flags override it.
    #[arg(long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Also write the log to this file.
    #[arg(long, global = true, value_name = "path")]
    pub log_file: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan the vector tiles covering a bounding box and write an entity table.
    Tiles(TilesArgs),
    /// Fetch building rules for every entity of an input table.
    Harvest(HarvestArgs),
}

#[derive(Debug, Clone, Args)]
pub struct TilesArgs {
    #[arg(long, allow_negative_numbers = true)]
    pub north: f64,
    #[arg(long, allow_negative_numbers = true)]
    pub south: f64,
    #[arg(long, allow_negative_numbers = true)]
    pub east: f64,
    #[arg(long, allow_negative_numbers = true)]
    pub west: f64,

    /// Zoom level of the scanned tiles [default: 15]
    #[arg(long)]
    pub zoom: Option<u8>,

    /// Tile server prefix; tiles are read from `{url}/{z}/{x}/{y}.vector.pbf`.
    #[arg(long, value_name = "url")]
    pub tiles_url: Option<String>,

    /// Entity table to write.
    #[arg(long, value_name = "path")]
    pub output: PathBuf,

    /// Coordinate range of one tile [default: 4096]
    #[arg(long)]
    pub extent: Option<u32>,

    /// Tiles fetched in parallel [default: 8]
    #[arg(long)]
    pub concurrency: Option<usize>,
}

#[derive(Debug, Clone, Args)]
pub struct HarvestArgs {
    /// Entity table with a `parcel_objectid` column.
    #[arg(long, value_name = "path")]
    pub input: PathBuf,

    /// Output table; an existing one is resumed.
    #[arg(long, value_name = "path")]
    pub output: PathBuf,

    /// Attribute API base url.
    #[arg(long, value_name = "url")]
    pub api_url: Option<String>,

    /// Entities fetched in parallel [default: 40]
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Rows buffered between writes [default: 1000]
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Attempts per entity [default: 5]
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Per-request timeout in seconds [default: 20]
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}
