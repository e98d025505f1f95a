//! Per-slot persistence strings.
//!
//! The persistence collaborator stores one string per slot: the
//! selected definition name, the selected layout name, the selected
//! texture-set name, and the encoded color-channel blob, joined with
//! `|`. The codec round-trips exactly; whatever storage format the
//! host uses around these strings is its own business.

use crate::diag::{self, ModelError};
use crate::slot::{ModelSlot, SlotCollaborators};

/// The persisted selection state of one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotState {
    pub definition_name: String,
    pub layout_name: String,
    pub texture_set_name: String,
    pub color_blob: String,
}

/// Capture a slot's current selection state as one string.
pub fn encode_slot(slot: &ModelSlot) -> String {
    format!(
        "{}|{}|{}|{}",
        slot.definition().name,
        slot.layout_name(),
        slot.texture_set_name(),
        slot.encode_colors()
    )
}

/// Parse a persisted slot string. `None` when the field count is off.
pub fn decode_state(text: &str) -> Option<SlotState> {
    let mut parts = text.splitn(4, '|');
    Some(SlotState {
        definition_name: parts.next()?.to_string(),
        layout_name: parts.next()?.to_string(),
        texture_set_name: parts.next()?.to_string(),
        color_blob: parts.next()?.to_string(),
    })
}

/// Re-apply a persisted state to a slot. Every field goes through the
/// slot's own fallback-on-miss operations, so a state referencing
/// models that no longer exist still leaves the slot usable.
pub fn apply_state(slot: &mut ModelSlot, text: &str, collab: &mut SlotCollaborators) {
    let Some(state) = decode_state(text) else {
        diag::report(&ModelError::Configuration(format!(
            "slot '{}': malformed persisted state '{text}'",
            slot.name
        )));
        return;
    };
    slot.select_definition(&state.definition_name, collab);
    slot.select_layout(&state.layout_name, collab);
    slot.apply_texture_set(&state.texture_set_name, false, collab);
    if !state.color_blob.is_empty() {
        slot.decode_colors(&state.color_blob, collab);
    }
}
