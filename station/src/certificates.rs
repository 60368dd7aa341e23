//! Delivery of generated certificate PDFs.

use crate::error::CertificateError;
use crate::types::{EventId, RegistrationId, ResourceOptionId};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

/// Instruction shown with every generated certificate
pub const PRINT_INSTRUCTION: &str = "Print in landscape orientation";

/// A generated certificate ready to hand to the operator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CertificateDocument {
    /// Event the certificate belongs to
    pub event: EventId,
    /// Who it was generated for
    pub registration: RegistrationId,
    /// Template used
    pub template: ResourceOptionId,
    /// PDF bytes
    pub pdf: Vec<u8>,
}

impl CertificateDocument {
    /// File name the document is saved under
    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "certificate-{}-{}.pdf",
            sanitize(self.registration.as_str()),
            sanitize(self.template.as_str())
        )
    }
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Where generated certificates go
pub trait CertificateSink: Send + Sync {
    /// Hand a certificate to the operator, returning where it ended up
    ///
    /// # Errors
    ///
    /// Returns [`CertificateError::Io`] if the document cannot be delivered.
    fn deliver(
        &self,
        document: CertificateDocument,
    ) -> Pin<Box<dyn Future<Output = Result<String, CertificateError>> + Send>>;
}

/// Writes certificates into a directory for the station's print queue
#[derive(Clone, Debug)]
pub struct DirectoryCertificateSink {
    directory: PathBuf,
}

impl DirectoryCertificateSink {
    /// Sink writing into `directory`, created on first delivery
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Output directory
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl CertificateSink for DirectoryCertificateSink {
    fn deliver(
        &self,
        document: CertificateDocument,
    ) -> Pin<Box<dyn Future<Output = Result<String, CertificateError>> + Send>> {
        let directory = self.directory.clone();

        Box::pin(async move {
            tokio::fs::create_dir_all(&directory)
                .await
                .map_err(|e| CertificateError::Io(format!("{}: {e}", directory.display())))?;

            let path = directory.join(document.file_name());
            tokio::fs::write(&path, &document.pdf)
                .await
                .map_err(|e| CertificateError::Io(format!("{}: {e}", path.display())))?;

            let location = path.display().to_string();
            tracing::info!(
                path = %location,
                registration = %document.registration,
                size = document.pdf.len(),
                "Certificate saved. {}",
                PRINT_INSTRUCTION
            );
            Ok(location)
        })
    }
}
