//! Purpose: Define the stable public Rust API boundary for carve.
//! Exports: The types and operations the binary and tests need.
//! Role: Public, additive-only surface; callers never reach into `core` paths.

pub use crate::core::assemble::assemble;
pub use crate::core::decode::{CompressionBackend, ContainerDecoder, FileDecoder};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::extract::Extractor;
pub use crate::core::fetch::{Fetcher, Origin, RawFile, acquire_embedded, redacted_url};
pub use crate::core::limits::{
    DEFAULT_DOWNLOAD_TIMEOUT, DEFAULT_MAX_RESPONSE_BYTES, DEFAULT_MAX_UPLOAD_BYTES, Limits,
};
pub use crate::core::query::{
    FieldOutcome, FieldResult, LocatedValue, PathSeg, evaluate, evaluate_fields,
};
pub use crate::core::request::{
    ExtractionRequest, PayloadSource, normalize_get, normalize_post,
};
