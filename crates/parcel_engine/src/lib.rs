//! Parcel engine: tile scanning, HTTP fetching, resume and persistence.
mod collect;
mod commit;
mod decode;
mod fetch;
mod persist;
mod pipeline;
mod pool;
mod resume;
mod settings;
mod sink;
mod source;
mod types;

pub use collect::{collect_entities, EntityCollection, TileFailure};
pub use commit::{recover_output, CommitMarker, Recovery};
pub use decode::{decode_tile, DecodeError, RawFeature, ENTITY_ID_KEYS, OBJECT_ID_KEYS};
pub use fetch::{AttributeClient, ReqwestAttributeClient, ReqwestTileSource, TileSource};
pub use persist::{ensure_output_dir, parent_dir, AtomicFileWriter, PersistError};
pub use pipeline::{run_harvest, run_tile_enumeration, HarvestReport, PipelineError, TileReport};
pub use pool::{fetch_with_retry, FetchWorkerPool, HarvestSummary};
pub use resume::{filter_pending, load_resume_state, ResumeState};
pub use settings::{
    ApiSettings, HarvestSettings, HttpSettings, TileSettings, DEFAULT_API_BASE, DEFAULT_REFERER,
    DEFAULT_USER_AGENT,
};
pub use sink::{ChunkedSink, FlushReport, HarvestState, SinkError};
pub use source::{read_entities, write_entities, EntityTable, InputError};
pub use types::{FailureKind, FetchError, HarvestEvent, NullProgressSink, ProgressSink};
pub use tokio_util::sync::CancellationToken;
