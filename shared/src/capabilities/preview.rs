//! Preview capability: the platform side of the revocable display reference
//! for the selected image (an object URL on the web, a texture elsewhere).

use bytes::Bytes;
use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

use crate::event::PreviewHandle;
use crate::model::SelectedImage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreviewOperation {
    Create {
        handle: PreviewHandle,
        file_name: String,
        mime_type: String,
        data: Bytes,
    },
    Revoke {
        handle: PreviewHandle,
    },
}

impl PreviewOperation {
    #[must_use]
    pub fn handle(&self) -> &PreviewHandle {
        match self {
            PreviewOperation::Create { handle, .. } | PreviewOperation::Revoke { handle } => handle,
        }
    }
}

impl Operation for PreviewOperation {
    type Output = ();
}

pub struct Preview<Ev> {
    context: CapabilityContext<PreviewOperation, Ev>,
}

impl<Ev> Clone for Preview<Ev> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
        }
    }
}

impl<Ev> Capability<Ev> for Preview<Ev> {
    type Operation = PreviewOperation;
    type MappedSelf<MappedEv> = Preview<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Preview::new(self.context.map_event(f))
    }
}

impl<Ev> Preview<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<PreviewOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn create(&self, handle: PreviewHandle, image: &SelectedImage) {
        self.notify(PreviewOperation::Create {
            handle,
            file_name: image.file_name().to_string(),
            mime_type: image.mime_type().to_string(),
            data: image.data().clone(),
        });
    }

    pub fn revoke(&self, handle: PreviewHandle) {
        self.notify(PreviewOperation::Revoke { handle });
    }

    // Spawned in call order, so a revoke issued before a create reaches the
    // shell first.
    fn notify(&self, operation: PreviewOperation) {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            ctx.notify_shell(operation).await;
        });
    }
}
