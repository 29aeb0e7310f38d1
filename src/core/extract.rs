//! Purpose: Drive one request through acquire, decode, evaluate, assemble.
//! Exports: `Extractor`.
//! Role: The only component that sequences stages; each stage's typed failure
//! short-circuits the request, and nothing here retries.
//! Invariants: Built once at startup and shared read-only across requests;
//! all per-request state lives in the arguments.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::core::assemble::assemble;
use crate::core::decode::{ContainerDecoder, FileDecoder};
use crate::core::error::Error;
use crate::core::fetch::{Fetcher, acquire_embedded};
use crate::core::limits::Limits;
use crate::core::query::evaluate_fields;
use crate::core::request::{ExtractionRequest, PayloadSource};

#[derive(Clone)]
pub struct Extractor {
    decoder: Arc<dyn FileDecoder>,
    fetcher: Fetcher,
    limits: Limits,
}

impl Extractor {
    pub fn new(limits: Limits) -> Result<Self, Error> {
        Ok(Self {
            decoder: Arc::new(ContainerDecoder::new()),
            fetcher: Fetcher::new(limits.download_timeout)?,
            limits,
        })
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn FileDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub async fn extract(&self, request: ExtractionRequest) -> Result<Value, Error> {
        let raw = match request.source {
            PayloadSource::Embedded { bytes, base64 } => {
                acquire_embedded(bytes, base64, &self.limits)?
            }
            PayloadSource::Remote { url } => self.fetcher.acquire_remote(&url).await?,
        };
        debug!(bytes = raw.bytes.len(), origin = ?raw.origin, "payload acquired");

        let tree = self.decoder.decode(&raw)?;
        let results = evaluate_fields(&tree, &request.fields);
        assemble(results, self.limits.max_response_bytes)
    }
}
