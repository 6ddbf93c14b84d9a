use crate::mail::DeliveryResult;
use crate::parser::ParsedRecord;
use crate::render::DocumentArtifact;
use crate::worker::job::WatchedFile;

/// State carried from one pipeline step to the next.
pub struct PipelineContext {
    // Input
    pub file: WatchedFile,

    // Step 1: false if the file was still changing when the checks ran out
    pub stable: bool,

    // Step 2
    pub content: Option<String>,

    // Step 3
    pub record: Option<ParsedRecord>,

    // Step 4: kept on disk whatever happens afterwards
    pub artifact: Option<DocumentArtifact>,

    // Step 5
    pub delivery: Option<DeliveryResult>,
}

impl PipelineContext {
    pub fn new(file: WatchedFile) -> Self {
        Self {
            file,
            stable: false,
            content: None,
            record: None,
            artifact: None,
            delivery: None,
        }
    }
}
