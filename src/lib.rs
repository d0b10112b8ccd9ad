pub mod export;
pub mod ingest;
pub mod load;
pub mod logging;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod record;
pub mod sentiment;
