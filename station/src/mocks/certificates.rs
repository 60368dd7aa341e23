//! In-memory certificate sink.

use crate::certificates::{CertificateDocument, CertificateSink};
use crate::error::CertificateError;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

/// Keeps delivered certificates in memory
#[derive(Clone, Debug, Default)]
pub struct MemoryCertificateSink {
    delivered: Arc<Mutex<Vec<CertificateDocument>>>,
    failure: Arc<Mutex<Option<CertificateError>>>,
}

impl MemoryCertificateSink {
    /// Empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every delivery with `error`
    pub fn fail_with(&self, error: CertificateError) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    /// Documents delivered so far
    #[must_use]
    pub fn delivered(&self) -> Vec<CertificateDocument> {
        self.delivered.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl CertificateSink for MemoryCertificateSink {
    fn deliver(
        &self,
        document: CertificateDocument,
    ) -> Pin<Box<dyn Future<Output = Result<String, CertificateError>> + Send>> {
        let failure = self.failure.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let result = match failure {
            Some(error) => Err(error),
            None => {
                let location = format!("memory://{}", document.file_name());
                self.delivered
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(document);
                Ok(location)
            },
        };
        Box::pin(async move { result })
    }
}
