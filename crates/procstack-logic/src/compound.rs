//! Compound-segment height redistribution.
//!
//! A compound definition is a stack of named segments; only some of
//! them are allowed to stretch when the overall height changes (tank
//! walls stretch, end caps keep their aspect ratio). Given a target
//! overall height, this module decides every segment's vertical scale
//! and its position along the stack axis.
//!
//! Algorithm ("distribute then walk"):
//! 1. `static_height` = Σ hᵢ·Sh over segments that cannot scale.
//! 2. `scalable_base_height` = Σ hᵢ over segments that can.
//! 3. `needed_scale_height` = Ht − static_height.
//! 4. Each scalable segment gets its proportional share of the needed
//!    height: `svᵢ = (hᵢ/scalable_base_height · needed) / hᵢ`. When
//!    `scalable_base_height` is zero there is nothing to allocate —
//!    those segments take `Sh` like the static branch (no division by
//!    zero).
//! 5. Each static segment keeps its aspect ratio: `svᵢ = Sh`.
//! 6. Walk segments in ascending `order`, accumulating a running
//!    offset: position = running + segment.offset·Sh, then advance the
//!    running offset by `dir` times the segment's scaled height.
//! 7. The scale-axis component of each segment's scale vector receives
//!    `svᵢ`; the two cross-section components receive `Sh`.
//!
//! If `Ht < static_height` the needed height goes negative and the
//! scalable segments come out with a negative vertical scale. No clamp
//! is applied here; the call site owns that decision.

use glam::Vec3;

use crate::definition::CompoundSegment;

/// Resolved placement for one segment: position along the stack axis
/// and the full 3-component local scale.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentPlacement {
    /// Segment name, for matching against the node tree.
    pub name: String,
    /// Local position along the stack axis.
    pub position: f32,
    /// Local scale; the scale-axis component carries the vertical
    /// scale, the other two the horizontal scale.
    pub scale: Vec3,
    /// The segment's height after scaling.
    pub scaled_height: f32,
}

/// Distribute `target_height` across a definition's segments.
///
/// `h_scale` is the uniform horizontal scale; `dir` is the stacking
/// direction along the axis: −1.0 when the owning slot's effective
/// origin sits at the top of the stack, +1.0 otherwise.
///
/// Placements are returned in the input's order (not stacking order).
pub fn distribute_heights(
    segments: &[CompoundSegment],
    target_height: f32,
    h_scale: f32,
    dir: f32,
) -> Vec<SegmentPlacement> {
    let static_height: f32 = segments
        .iter()
        .filter(|s| !s.can_scale_height)
        .map(|s| s.base_height * h_scale)
        .sum();
    let scalable_base_height: f32 = segments
        .iter()
        .filter(|s| s.can_scale_height)
        .map(|s| s.base_height)
        .sum();
    let needed_scale_height = target_height - static_height;

    // Vertical scale per segment, in input order.
    let vertical: Vec<f32> = segments
        .iter()
        .map(|s| {
            if s.can_scale_height && scalable_base_height > 0.0 && s.base_height > 0.0 {
                let share = s.base_height / scalable_base_height;
                share * needed_scale_height / s.base_height
            } else {
                h_scale
            }
        })
        .collect();

    // Walk the stack in ascending order to place each segment.
    let mut stacked: Vec<usize> = (0..segments.len()).collect();
    stacked.sort_by_key(|&i| segments[i].order);

    let mut positions = vec![0.0f32; segments.len()];
    let mut running = 0.0f32;
    for &i in &stacked {
        positions[i] = running + segments[i].offset * h_scale;
        running += dir * segments[i].base_height * vertical[i];
    }

    segments
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let axis = s.scale_axis.abs();
            let mut scale = Vec3::splat(h_scale);
            // the dominant axis component receives the vertical scale
            if axis.x >= axis.y && axis.x >= axis.z {
                scale.x = vertical[i];
            } else if axis.y >= axis.z {
                scale.y = vertical[i];
            } else {
                scale.z = vertical[i];
            }
            SegmentPlacement {
                name: s.name.clone(),
                position: positions[i],
                scale,
                scaled_height: s.base_height * vertical[i],
            }
        })
        .collect()
}
