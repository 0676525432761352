//! The five load stages, run strictly in order by
//! [`ProcessUploadUseCase`](crate::app::process_upload_use_case::ProcessUploadUseCase).

pub mod fetcher;
pub mod loader;
pub mod parser;
pub mod receiver;
pub mod transform;

pub use fetcher::SourceFetcher;
pub use loader::{LoadSummary, SinkLoader};
pub use parser::RecordParser;
pub use receiver::{EventReceiver, Reception};
pub use transform::Transformer;
