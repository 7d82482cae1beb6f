pub mod conversation;
pub mod errors;
pub mod extractor;
pub mod ingestion;
pub mod prompts;

pub use conversation::{ChatService, Exchange, StreamEvent, StreamStatus};
pub use errors::ChatError;
pub use extractor::{DocumentExtractor, PdfExtractor};
pub use ingestion::{IngestRequest, IngestionService, UploadCheck, UploadOutcome};
