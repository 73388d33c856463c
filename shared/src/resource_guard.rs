//! Exclusive ownership of the preview handle for the selected image.
//!
//! Every path that changes or drops the image goes through [`ResourceGuard::set`]
//! or [`ResourceGuard::clear`], and both emit the revocation for the outgoing
//! handle before anything else. A guard can therefore never hold two live
//! handles, and a handle is never revoked twice.

use tracing::{debug, warn};

use crate::capabilities::AppPreview;
use crate::event::PreviewHandle;
use crate::model::SelectedImage;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ResourceGuard {
    current: Option<PreviewHandle>,
    issued_total: u64,
    revoked_total: u64,
}

impl ResourceGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Revoke the current handle (if any), then create and return a new one
    /// bound to `image`.
    pub fn set(&mut self, preview: &AppPreview, image: &SelectedImage) -> PreviewHandle {
        self.release(preview);

        let handle = PreviewHandle::generate();
        preview.create(handle.clone(), image);
        self.issued_total += 1;
        debug!(%handle, file_name = image.file_name(), "preview handle issued");

        self.current = Some(handle.clone());
        handle
    }

    /// Revoke the current handle and return to empty.
    pub fn clear(&mut self, preview: &AppPreview) {
        self.release(preview);
    }

    fn release(&mut self, preview: &AppPreview) {
        if let Some(handle) = self.current.take() {
            debug!(%handle, "preview handle revoked");
            preview.revoke(handle);
            self.revoked_total += 1;
        }
    }

    #[must_use]
    pub fn current(&self) -> Option<&PreviewHandle> {
        self.current.as_ref()
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.current.is_some()
    }

    #[must_use]
    pub fn issued_total(&self) -> u64 {
        self.issued_total
    }

    #[must_use]
    pub fn revoked_total(&self) -> u64 {
        self.revoked_total
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        if let Some(handle) = &self.current {
            warn!(%handle, "preview guard dropped with a live handle; teardown was skipped");
        }
    }
}
