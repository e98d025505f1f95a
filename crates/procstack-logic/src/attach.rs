//! Attach points: templates, inversion, and placement offsets.
//!
//! A definition carries attach templates at base scale; the slot turns
//! them into concrete, positioned points every time its scale or
//! position changes. Two orientation rules apply:
//!
//! - **Inversion**: when a slot's nominal orientation is opposite the
//!   definition's declared orientation (a Top-style model used in a
//!   Bottom slot), the model is flipped 180° around the definition's
//!   invert axis. Attach templates then negate their X and Y positions
//!   and flip the Y component of their orientation vector.
//! - **Placement offset**: a definition's local origin sits at the end
//!   named by its orientation, but the slot it lands in may expect the
//!   origin elsewhere. The (definition, slot) orientation pair maps to
//!   a fixed vertical offset so the geometry lines up.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::config::ConfigNode;
use crate::definition::Orientation;

/// Which attach point of a definition is being placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachKind {
    Top,
    Bottom,
    /// Index into the definition's body attach list.
    Body(usize),
    Surface,
}

impl AttachKind {
    /// Stable point name handed to the attach-point collaborator.
    pub fn point_name(&self) -> String {
        match self {
            AttachKind::Top => "top".to_string(),
            AttachKind::Bottom => "bottom".to_string(),
            AttachKind::Body(i) => format!("body{i}"),
            AttachKind::Surface => "surface".to_string(),
        }
    }
}

/// One attach template at base scale: local position, local orientation
/// vector, integer size class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttachTemplate {
    pub position: Vec3,
    pub orientation: Vec3,
    pub size: i32,
}

impl AttachTemplate {
    pub fn from_config(node: &ConfigNode) -> Self {
        Self {
            position: node.vec3_or("position", Vec3::ZERO),
            orientation: node.vec3_or("orientation", Vec3::Y),
            size: node.i32_or("size", 1),
        }
    }
}

/// Whether a definition must be flipped to satisfy the slot it sits in.
///
/// Only the Top/Bottom pair is "opposite"; Central never inverts.
pub fn inverted(slot: Orientation, definition: Orientation) -> bool {
    matches!(
        (slot, definition),
        (Orientation::Top, Orientation::Bottom) | (Orientation::Bottom, Orientation::Top)
    )
}

/// Vertical placement offset for a definition of one orientation sitting
/// in a slot of another, given the model's current (scaled) height.
///
/// Own-orientation pairs and the opposite Top/Bottom pair need no
/// offset (the latter is handled by inversion); only landing in a
/// Central slot re-centers the origin by half the height.
pub fn placement_offset(
    definition: Orientation,
    slot: Orientation,
    current_height: f32,
) -> f32 {
    match (definition, slot) {
        (Orientation::Top, Orientation::Central) => -current_height / 2.0,
        (Orientation::Bottom, Orientation::Central) => current_height / 2.0,
        _ => 0.0,
    }
}

/// A fully placed attach point, ready for the collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedAttach {
    pub position: Vec3,
    pub orientation: Vec3,
    pub size: i32,
}

/// Scale and place an attach template.
///
/// `h_scale` applies to the cross-section (X/Z), `v_scale` to the long
/// axis (Y). `y_offset` is the slot's vertical position plus the
/// orientation-pair placement offset.
pub fn place_template(
    template: &AttachTemplate,
    h_scale: f32,
    v_scale: f32,
    invert: bool,
    y_offset: f32,
) -> PlacedAttach {
    let mut position = Vec3::new(
        template.position.x * h_scale,
        template.position.y * v_scale,
        template.position.z * h_scale,
    );
    let mut orientation = template.orientation;
    if invert {
        position.x = -position.x;
        position.y = -position.y;
        orientation.y = -orientation.y;
    }
    position.y += y_offset;
    PlacedAttach {
        position,
        orientation,
        size: template.size,
    }
}

/// Attach-point collaborator: creates, repositions and removes named
/// attachment points in the host.
pub trait AttachBackend {
    /// Create the point if absent, otherwise reposition it.
    /// `user_initiated` distinguishes a direct user edit from a
    /// cascade-driven refresh.
    fn upsert_point(&mut self, name: &str, point: PlacedAttach, user_initiated: bool);

    fn remove_point(&mut self, name: &str);

    /// The surface attach point moved radially; siblings attached to
    /// the surface must shift by `delta` along the radial axis.
    fn surface_offset_changed(&mut self, delta: f32);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> AttachTemplate {
        AttachTemplate {
            position: Vec3::new(1.0, 2.0, 3.0),
            orientation: Vec3::Y,
            size: 2,
        }
    }

    #[test]
    fn inversion_is_the_opposite_pair_only() {
        assert!(inverted(Orientation::Top, Orientation::Bottom));
        assert!(inverted(Orientation::Bottom, Orientation::Top));
        assert!(!inverted(Orientation::Top, Orientation::Top));
        assert!(!inverted(Orientation::Central, Orientation::Top));
        assert!(!inverted(Orientation::Bottom, Orientation::Central));
    }

    #[test]
    fn placement_offset_table() {
        assert_eq!(placement_offset(Orientation::Top, Orientation::Top, 4.0), 0.0);
        assert_eq!(
            placement_offset(Orientation::Top, Orientation::Central, 4.0),
            -2.0
        );
        assert_eq!(
            placement_offset(Orientation::Bottom, Orientation::Central, 4.0),
            2.0
        );
        assert_eq!(
            placement_offset(Orientation::Top, Orientation::Bottom, 4.0),
            0.0
        );
    }

    #[test]
    fn placement_scales_axes_independently() {
        let placed = place_template(&template(), 2.0, 3.0, false, 0.0);
        assert_eq!(placed.position, Vec3::new(2.0, 6.0, 6.0));
        assert_eq!(placed.orientation, Vec3::Y);
        assert_eq!(placed.size, 2);
    }

    #[test]
    fn inversion_negates_x_y_and_flips_orientation() {
        let placed = place_template(&template(), 1.0, 1.0, true, 0.0);
        assert_eq!(placed.position, Vec3::new(-1.0, -2.0, 3.0));
        assert_eq!(placed.orientation, Vec3::new(0.0, -1.0, 0.0));
    }

    #[test]
    fn vertical_offset_applied_after_inversion() {
        let placed = place_template(&template(), 1.0, 1.0, true, 10.0);
        assert_eq!(placed.position.y, 8.0);
    }
}
