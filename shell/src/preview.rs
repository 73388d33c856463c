use std::collections::HashMap;

use derma_core::capabilities::PreviewOperation;
use derma_core::PreviewHandle;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreviewError {
    #[error("preview {0} already exists")]
    Duplicate(PreviewHandle),
    #[error("preview {0} is not live")]
    UnknownHandle(PreviewHandle),
}

#[derive(Debug, Clone)]
struct LivePreview {
    file_name: String,
    mime_type: String,
    bytes: usize,
}

/// Platform side of preview handles. On a GUI this would own textures;
/// here it only tracks what is live.
#[derive(Debug, Default)]
pub struct PreviewRegistry {
    live: HashMap<PreviewHandle, LivePreview>,
    created_total: u64,
    revoked_total: u64,
}

impl PreviewRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, operation: PreviewOperation) -> Result<(), PreviewError> {
        match operation {
            PreviewOperation::Create {
                handle,
                file_name,
                mime_type,
                data,
            } => {
                if self.live.contains_key(&handle) {
                    return Err(PreviewError::Duplicate(handle));
                }
                debug!(%handle, %file_name, "preview created");
                self.live.insert(
                    handle,
                    LivePreview {
                        file_name,
                        mime_type,
                        bytes: data.len(),
                    },
                );
                self.created_total += 1;
                Ok(())
            }
            PreviewOperation::Revoke { handle } => {
                if self.live.remove(&handle).is_none() {
                    warn!(%handle, "revoke for a preview that is not live");
                    return Err(PreviewError::UnknownHandle(handle));
                }
                debug!(%handle, "preview revoked");
                self.revoked_total += 1;
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    #[must_use]
    pub fn is_live(&self, handle: &PreviewHandle) -> bool {
        self.live.contains_key(handle)
    }

    /// File name and MIME type of a live preview.
    #[must_use]
    pub fn describe(&self, handle: &PreviewHandle) -> Option<(&str, &str, usize)> {
        self.live
            .get(handle)
            .map(|p| (p.file_name.as_str(), p.mime_type.as_str(), p.bytes))
    }

    #[must_use]
    pub fn created_total(&self) -> u64 {
        self.created_total
    }

    #[must_use]
    pub fn revoked_total(&self) -> u64 {
        self.revoked_total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn create(handle: &PreviewHandle) -> PreviewOperation {
        PreviewOperation::Create {
            handle: handle.clone(),
            file_name: "a.png".into(),
            mime_type: "image/png".into(),
            data: Bytes::from_static(b"png"),
        }
    }

    #[test]
    fn create_then_revoke() {
        let mut registry = PreviewRegistry::new();
        let handle = PreviewHandle::new("preview-1");

        registry.apply(create(&handle)).unwrap();
        assert!(registry.is_live(&handle));
        assert_eq!(registry.describe(&handle), Some(("a.png", "image/png", 3)));

        registry
            .apply(PreviewOperation::Revoke {
                handle: handle.clone(),
            })
            .unwrap();
        assert_eq!(registry.live_count(), 0);
        assert_eq!((registry.created_total(), registry.revoked_total()), (1, 1));
    }

    #[test]
    fn double_revoke_is_rejected() {
        let mut registry = PreviewRegistry::new();
        let handle = PreviewHandle::new("preview-1");
        registry.apply(create(&handle)).unwrap();
        registry
            .apply(PreviewOperation::Revoke {
                handle: handle.clone(),
            })
            .unwrap();

        assert_eq!(
            registry.apply(PreviewOperation::Revoke {
                handle: handle.clone()
            }),
            Err(PreviewError::UnknownHandle(handle))
        );
    }

    #[test]
    fn duplicate_create_is_rejected() {
        let mut registry = PreviewRegistry::new();
        let handle = PreviewHandle::new("preview-1");
        registry.apply(create(&handle)).unwrap();
        assert_eq!(
            registry.apply(create(&handle)),
            Err(PreviewError::Duplicate(handle))
        );
    }
}
