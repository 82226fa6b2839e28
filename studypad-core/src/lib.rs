pub mod activation;
pub mod config;
pub mod controller;
pub mod document;
pub mod error;
pub mod path;
pub mod store;
pub mod stroke;
pub mod textflow;
pub mod timing;

pub use activation::{Activation, ActivationTracker, PageBounds, ScrollWindow};
pub use config::ReaderConfig;
pub use controller::{
    ContextSink, EncodedFrame, FrameSource, ReaderController, ReaderEvent, FIT_SCALE_MAX,
    FIT_SCALE_MIN, ZOOM_SCALE_MAX, ZOOM_SCALE_MIN,
};
pub use document::{
    document_id_for_bytes, DocumentId, DocumentInfo, DocumentMetadata, DocumentOpener,
    DocumentSession, RasterImage, RenderRequest, Viewport,
};
pub use error::ReaderError;
pub use path::{midpoint_path, PathSegment};
pub use store::{DocumentRecord, DocumentStore, FileDocumentStore, MemoryDocumentStore};
pub use stroke::{Annotation, NormPoint, RawPoint, Stroke, StrokeRecorder, Tool, ToolSettings};
pub use textflow::{compose_context, reconstruct_page_text, TextItem};
pub use timing::{Clock, Debouncer, IntervalTimer, SystemClock, VirtualClock};
