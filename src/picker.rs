//! Part picker session state.
//!
//! Only one slot's picker is open at a time. Opening a picker issues a fresh
//! lookup request; any response for an older request is stale and gets
//! dropped, so the latest open always wins. This lives outside the
//! configurator, which never needs to know which slot is being edited.

use crate::lookup_executor::{LookupRequest, LookupResponse, RequestId};
use crate::slots::{SlotDefinition, SlotId};

#[derive(Debug, Clone, PartialEq, Eq)]
struct ActivePicker {
    slot: SlotId,
    request: RequestId,
}

#[derive(Debug, Clone, Default)]
pub struct PickerSession {
    next_request: RequestId,
    active: Option<ActivePicker>,
}

impl PickerSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the picker for `slot`, superseding whatever was open.
    ///
    /// Returns the lookup request to hand to the executor.
    pub fn open(&mut self, slot: &SlotDefinition) -> LookupRequest {
        self.next_request += 1;
        let request = LookupRequest::for_slot(self.next_request, slot);
        if let Some(previous) = self.active.replace(ActivePicker {
            slot: slot.id.clone(),
            request: request.id,
        }) {
            tracing::debug!(
                "Picker for {} superseded by {} (request {})",
                previous.slot,
                slot.id,
                request.id
            );
        }
        request
    }

    pub fn close(&mut self) {
        self.active = None;
    }

    pub fn active_slot(&self) -> Option<&SlotId> {
        self.active.as_ref().map(|active| &active.slot)
    }

    pub fn is_current(&self, id: RequestId) -> bool {
        self.active.as_ref().is_some_and(|active| active.request == id)
    }

    /// Pass through a response only if it answers the latest open request.
    pub fn accept(&self, response: LookupResponse) -> Option<LookupResponse> {
        if self.is_current(response.id) {
            Some(response)
        } else {
            tracing::debug!(
                "Discarding stale lookup {} for {}",
                response.id,
                response.slot
            );
            None
        }
    }
}
