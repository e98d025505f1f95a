//! Assembly cascade — diameter/height constraint propagation across a
//! chain of slots.
//!
//! The composite owns an ordered chain of slots, top → bottom (nose,
//! core, mount in the three-slot case). One slot is the core: the
//! user's diameter (and length, when the composite is length-driven)
//! applies there, and every other slot is scaled so its connecting face
//! matches the neighbor toward the core. After scaling, the stack is
//! placed top-down around the vertical center.
//!
//! Rapid repeated edits within one host frame are expected to be
//! coalesced by the composite's needs-update flag ([`mark_dirty`] +
//! [`refresh`]); the individual update operations always do the full
//! synchronous work when invoked.
//!
//! Intermediate diameters are not clamped against any assembly-level
//! bounds here; whether an out-of-range derived diameter should clamp
//! or be rejected is unresolved, so the cascade propagates whatever the
//! neighbor face yields.
//!
//! [`mark_dirty`]: AssemblyCascade::mark_dirty
//! [`refresh`]: AssemblyCascade::refresh

use glam::Vec3;

use crate::attach::{AttachKind, PlacedAttach};
use crate::definition::Orientation;
use crate::diag::{self, ModelError};
use crate::slot::{DerivedStats, ModelSlot, NeighborEdge, SlotCollaborators};

/// Diameter of one attachment size class. Size 1 ≙ a 1.25 m face.
const SIZE_CLASS_DIAMETER: f32 = 1.25;

/// A chain of 2+ slots with one designated core.
pub struct AssemblyCascade {
    /// Slots ordered top → bottom.
    slots: Vec<ModelSlot>,
    core_index: usize,

    /// User-chosen core diameter.
    pub diameter: f32,
    /// User-chosen overall core length; `None` means diameter-driven.
    pub length: Option<f32>,
    /// Vertical-scale bias in [−1, 1] applied to every slot.
    pub aspect_bias: f32,
    /// When set, the composite reports summed scale-driven stats.
    pub scale_driven_stats: bool,

    dirty: bool,
    last_surface_radius: f32,
}

impl AssemblyCascade {
    /// Build a cascade over `slots` (top → bottom) with the core at
    /// `core_index`. Fewer than two slots or an out-of-range core
    /// index is a programmer error; the index clamps to the chain.
    pub fn new(slots: Vec<ModelSlot>, core_index: usize) -> Self {
        if slots.len() < 2 {
            diag::report(&ModelError::Programmer(format!(
                "assembly cascade needs at least 2 slots, got {}",
                slots.len()
            )));
        }
        let core_index = if core_index >= slots.len() {
            diag::report(&ModelError::Programmer(format!(
                "core index {core_index} out of range for {} slots",
                slots.len()
            )));
            slots.len().saturating_sub(1)
        } else {
            core_index
        };
        Self {
            slots,
            core_index,
            diameter: 1.0,
            length: None,
            aspect_bias: 0.0,
            scale_driven_stats: true,
            dirty: false,
            last_surface_radius: 0.0,
        }
    }

    pub fn slots(&self) -> &[ModelSlot] {
        &self.slots
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut ModelSlot> {
        self.slots.get_mut(index)
    }

    pub fn core(&self) -> Option<&ModelSlot> {
        self.slots.get(self.core_index)
    }

    // An empty chain is already reported in `new`; every update entry
    // point still has to no-op instead of indexing the core.
    fn check_core(&self) -> bool {
        if self.slots.is_empty() {
            diag::report(&ModelError::Programmer(
                "assembly cascade update on an empty slot chain".to_string(),
            ));
            return false;
        }
        true
    }

    /// Flag the cascade for a coalesced update at the next `refresh`.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Run a full update if anything was flagged since the last one.
    pub fn refresh(&mut self, collab: &mut SlotCollaborators) {
        if self.dirty {
            self.update(collab);
        }
    }

    /// Full synchronous update: scales, positions, attach points.
    pub fn update(&mut self, collab: &mut SlotCollaborators) {
        self.update_positions(collab);
        self.update_attach_nodes(collab);
        self.dirty = false;
    }

    /// Propagate the user diameter through the chain and restack.
    ///
    /// The core scales first (diameter, plus length when the composite
    /// is length-driven). Slots above it then match their lower face
    /// to the face below; slots below match their upper face to the
    /// face above. Finally the stack is placed top-down starting at
    /// +total/2 so the assembly stays centered.
    pub fn update_positions(&mut self, collab: &mut SlotCollaborators) {
        if !self.check_core() {
            return;
        }

        // Core scale.
        match self.length {
            Some(length) => {
                let def = self.slots[self.core_index].definition().clone();
                let h_scale = if def.base_diameter > 0.0 {
                    self.diameter / def.base_diameter
                } else {
                    diag::config_fallback(
                        format!("core definition '{}' has zero base diameter", def.name),
                        1.0,
                    )
                };
                let v_raw = length / def.base_height;
                self.slots[self.core_index].set_scale(h_scale, v_raw, collab);
            }
            None => {
                let bias = self.aspect_bias;
                let diameter = self.diameter;
                self.slots[self.core_index].set_scale_for_diameter(diameter, bias, collab);
            }
        }

        // Upward from the core: match each slot's lower face to the
        // upper face of the slot below it.
        for i in (0..self.core_index).rev() {
            let target = self.slots[i + 1].face_diameters().0;
            let bias = self.aspect_bias;
            self.slots[i].set_diameter_matching_neighbor(
                target,
                bias,
                NeighborEdge::Lower,
                collab,
            );
        }

        // Downward from the core: symmetric, against the lower face.
        for i in self.core_index + 1..self.slots.len() {
            let target = self.slots[i - 1].face_diameters().1;
            let bias = self.aspect_bias;
            self.slots[i].set_diameter_matching_neighbor(
                target,
                bias,
                NeighborEdge::Upper,
                collab,
            );
        }

        // Stack top-down around the vertical center.
        let total: f32 = self.slots.iter().map(|s| s.current_height()).sum();
        let mut y = total / 2.0;
        for slot in &mut self.slots {
            let height = slot.current_height();
            let origin = match slot.orientation {
                Orientation::Top => y - height,
                Orientation::Central => y - height / 2.0,
                Orientation::Bottom => y,
            };
            slot.set_position(origin);
            y -= height;
        }
    }

    /// Refresh every attach point: ends delegate to the end slots, the
    /// core contributes body and surface points plus two synthesized
    /// interstage points at its top and bottom faces.
    pub fn update_attach_nodes(&mut self, collab: &mut SlotCollaborators) {
        if !self.check_core() {
            return;
        }

        for (index, slot) in self.slots.iter().enumerate() {
            if index < self.core_index {
                slot.compute_attach_point(AttachKind::Top, false, collab);
            } else if index > self.core_index {
                slot.compute_attach_point(AttachKind::Bottom, false, collab);
            } else {
                for i in 0..slot.definition().body_attach.len() {
                    slot.compute_attach_point(AttachKind::Body(i), false, collab);
                }
                slot.compute_attach_point(AttachKind::Surface, false, collab);
            }
        }

        let core = &self.slots[self.core_index];
        let size = (core.current_diameter() / SIZE_CLASS_DIAMETER).round() as i32;
        collab.attach.upsert_point(
            "interstage_top",
            PlacedAttach {
                position: Vec3::new(0.0, core.top_y(), 0.0),
                orientation: Vec3::Y,
                size,
            },
            false,
        );
        collab.attach.upsert_point(
            "interstage_bottom",
            PlacedAttach {
                position: Vec3::new(0.0, core.bottom_y(), 0.0),
                orientation: Vec3::NEG_Y,
                size,
            },
            false,
        );

        // Surface-attached siblings track the hull radially.
        let radius = core.current_diameter() / 2.0;
        let delta = radius - self.last_surface_radius;
        if delta.abs() > f32::EPSILON {
            collab.attach.surface_offset_changed(delta);
            self.last_surface_radius = radius;
        }
    }

    /// Summed mass/cost/volume across the chain, when the composite
    /// opted in to scale-driven stats.
    pub fn update_derived_stats(&self) -> DerivedStats {
        if !self.scale_driven_stats {
            return DerivedStats::default();
        }
        let mut total = DerivedStats::default();
        for slot in &self.slots {
            let stats = slot.stats();
            total.mass += stats.mass;
            total.cost += stats.cost;
            total.volume += stats.volume;
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Orientation;
    use crate::slot::tests::{nose_definition, tank_definition, TestWorld};
    use crate::slot::ModelSlot;

    fn three_slot_cascade(world: &mut TestWorld) -> AssemblyCascade {
        let nose = ModelSlot::new(
            "nose",
            Orientation::Top,
            nose_definition(),
            &mut world.collab(),
        );
        let core = ModelSlot::new(
            "core",
            Orientation::Top,
            tank_definition(),
            &mut world.collab(),
        );
        let mount = ModelSlot::new(
            "mount",
            Orientation::Bottom,
            tank_definition(),
            &mut world.collab(),
        );
        AssemblyCascade::new(vec![nose, core, mount], 1)
    }

    #[test]
    fn diameter_cascades_through_the_chain() {
        let mut world = TestWorld::new();
        let mut cascade = three_slot_cascade(&mut world);
        cascade.diameter = 5.0;
        cascade.update_positions(&mut world.collab());

        // core: base 2.5 → h 2.0; its upper face becomes 5.0
        assert!((cascade.slots()[1].horizontal_scale() - 2.0).abs() < 1e-6);
        assert!((cascade.slots()[1].face_diameters().0 - 5.0).abs() < 1e-6);
        // nose: lower face 1.25 matches 5.0 → h 4.0
        assert!((cascade.slots()[0].horizontal_scale() - 4.0).abs() < 1e-6);
        // mount: inverted tank, upper face 1.25 matches core lower 2.5 → h 2.0
        assert!((cascade.slots()[2].horizontal_scale() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn stack_is_centered_and_contiguous() {
        let mut world = TestWorld::new();
        let mut cascade = three_slot_cascade(&mut world);
        cascade.diameter = 5.0;
        cascade.update_positions(&mut world.collab());

        let total: f32 = cascade.slots().iter().map(|s| s.current_height()).sum();
        let nose = &cascade.slots()[0];
        let core = &cascade.slots()[1];
        let mount = &cascade.slots()[2];
        assert!((nose.top_y() - total / 2.0).abs() < 1e-5);
        assert!((nose.bottom_y() - core.top_y()).abs() < 1e-5);
        assert!((core.bottom_y() - mount.top_y()).abs() < 1e-5);
        assert!((mount.bottom_y() - (-total / 2.0)).abs() < 1e-5);
    }

    #[test]
    fn length_driven_core_scales_vertically() {
        let mut world = TestWorld::new();
        let mut cascade = three_slot_cascade(&mut world);
        cascade.diameter = 2.5;
        cascade.length = Some(3.0);
        cascade.update_positions(&mut world.collab());
        // core base height 1.0, requested length 3.0, h=1 → v=3 (within ratio band)
        assert!((cascade.slots()[1].current_height() - 3.0).abs() < 1e-6);
    }

    #[test]
    fn interstage_points_synthesized_at_core_faces() {
        let mut world = TestWorld::new();
        let mut cascade = three_slot_cascade(&mut world);
        cascade.diameter = 5.0;
        cascade.update(&mut world.collab());

        let core = cascade.core().unwrap();
        let core_top = core.top_y();
        let core_bottom = core.bottom_y();
        let top = world
            .attach
            .points
            .iter()
            .find(|(n, _, _)| n == "interstage_top")
            .unwrap();
        let bottom = world
            .attach
            .points
            .iter()
            .find(|(n, _, _)| n == "interstage_bottom")
            .unwrap();
        assert!((top.1.position.y - core_top).abs() < 1e-5);
        assert!((bottom.1.position.y - core_bottom).abs() < 1e-5);
        // 5.0 m face → size class 4
        assert_eq!(top.1.size, 4);
    }

    #[test]
    fn surface_delta_notifies_once_per_change() {
        let mut world = TestWorld::new();
        let mut cascade = three_slot_cascade(&mut world);
        cascade.diameter = 5.0;
        cascade.update(&mut world.collab());
        assert_eq!(world.attach.surface_deltas.len(), 1);
        assert!((world.attach.surface_deltas[0] - 2.5).abs() < 1e-6);

        // same diameter again: no new notification
        cascade.update(&mut world.collab());
        assert_eq!(world.attach.surface_deltas.len(), 1);

        cascade.diameter = 2.5;
        cascade.update(&mut world.collab());
        assert_eq!(world.attach.surface_deltas.len(), 2);
        assert!((world.attach.surface_deltas[1] - (-1.25)).abs() < 1e-6);
    }

    #[test]
    fn derived_stats_sum_when_opted_in() {
        let mut world = TestWorld::new();
        let mut cascade = three_slot_cascade(&mut world);
        cascade.diameter = 2.5;
        cascade.update_positions(&mut world.collab());

        let by_hand: f32 = cascade.slots().iter().map(|s| s.stats().mass).sum();
        assert!((cascade.update_derived_stats().mass - by_hand).abs() < 1e-5);

        cascade.scale_driven_stats = false;
        assert_eq!(cascade.update_derived_stats().mass, 0.0);
    }

    #[test]
    fn empty_chain_updates_are_no_ops() {
        let mut world = TestWorld::new();
        let mut cascade = AssemblyCascade::new(vec![], 0);
        cascade.diameter = 5.0;
        cascade.update(&mut world.collab());
        assert!(cascade.core().is_none());
        assert!(world.attach.points.is_empty());
        assert!(world.attach.surface_deltas.is_empty());
    }

    #[test]
    fn dirty_flag_coalesces_refreshes() {
        let mut world = TestWorld::new();
        let mut cascade = three_slot_cascade(&mut world);
        cascade.diameter = 5.0;

        // no flag, no work
        cascade.refresh(&mut world.collab());
        assert!(world.attach.points.is_empty());

        cascade.mark_dirty();
        cascade.refresh(&mut world.collab());
        assert!(!world.attach.points.is_empty());

        // flag cleared by the update
        world.attach.points.clear();
        cascade.refresh(&mut world.collab());
        assert!(world.attach.points.is_empty());
    }
}
