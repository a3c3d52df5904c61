//! Local previews of prepared media, shown while an upload is in flight.
//!
//! A preview lives exactly as long as its [`PreviewHandle`]. Registering a
//! new selection for a slot releases the slot's previous preview.

use bytes::Bytes;
use quillpost_core::models::PreparedAsset;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// What a preview handle points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub slot: String,
    pub name: String,
    pub mime_type: String,
    pub data: Bytes,
}

#[derive(Debug, Default)]
struct RegistryState {
    previews: HashMap<Uuid, Preview>,
    slots: HashMap<String, Uuid>,
}

type SharedState = Arc<Mutex<RegistryState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, RegistryState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Registry of live previews.
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    state: SharedState,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `prepared` as the preview of `slot`, superseding whatever
    /// the slot showed before.
    pub fn register(&self, slot: &str, prepared: &PreparedAsset) -> PreviewHandle {
        let id = Uuid::new_v4();
        let mut state = lock(&self.state);

        if let Some(previous) = state.slots.insert(slot.to_string(), id) {
            state.previews.remove(&previous);
            tracing::debug!(slot, preview_id = %previous, "Preview superseded");
        }
        state.previews.insert(
            id,
            Preview {
                slot: slot.to_string(),
                name: prepared.name.clone(),
                mime_type: prepared.mime_type().to_string(),
                data: prepared.data.clone(),
            },
        );

        PreviewHandle {
            id,
            state: self.state.clone(),
        }
    }

    pub fn get(&self, id: Uuid) -> Option<Preview> {
        lock(&self.state).previews.get(&id).cloned()
    }

    /// The preview currently shown for `slot`.
    pub fn current(&self, slot: &str) -> Option<Preview> {
        let state = lock(&self.state);
        let id = state.slots.get(slot)?;
        state.previews.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.state).previews.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Owning handle to a registered preview; dropping it releases the preview.
#[derive(Debug)]
pub struct PreviewHandle {
    id: Uuid,
    state: SharedState,
}

impl PreviewHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Local address of the preview.
    pub fn url(&self) -> String {
        format!("preview:{}", self.id)
    }

    /// False once a newer selection replaced this preview.
    pub fn is_live(&self) -> bool {
        lock(&self.state).previews.contains_key(&self.id)
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        if let Some(preview) = state.previews.remove(&self.id) {
            if state.slots.get(&preview.slot) == Some(&self.id) {
                state.slots.remove(&preview.slot);
            }
            tracing::debug!(slot = %preview.slot, preview_id = %self.id, "Preview released");
        }
    }
}
