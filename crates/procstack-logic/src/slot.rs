//! Model slot — the runtime unit bound to one named position in a
//! composite assembly.
//!
//! A slot owns its current selection (definition + layout), scale and
//! position state, color channels, and the spatial-node tree built from
//! the selected definition's sub-models. Every mutating operation is
//! synchronous and leaves the slot in a fully consistent, usable state:
//! a bad name falls back (with a logged lookup error), a missing
//! collaborator no-ops (with a logged programmer error), and nothing
//! here can panic the host.
//!
//! Scale convention: `horizontal_scale` applies to the cross-section
//! (X/Z), `vertical_scale` to the long axis (Y). The slot maintains the
//! invariant
//! `vertical_scale ∈ [horizontal·min_ratio, horizontal·max_ratio]`
//! at all times by clamping in [`ModelSlot::set_scale`], the single
//! funnel every scale change goes through.

use std::sync::Arc;

use glam::Vec3;

use crate::attach::{self, AttachBackend, AttachKind};
use crate::colors::{self, ColorChannel};
use crate::compound;
use crate::definition::{Definition, Layout, Orientation};
use crate::diag::{self, ModelError};
use crate::scene::{self, ModelSource, NodeId, NodeTree};

/// Which connecting face of a neighbor drives a diameter match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborEdge {
    Upper,
    Lower,
}

/// Material collaborator: recolors every surface under the slot's
/// nodes with a named texture set and its channel tuples.
pub trait MaterialBackend {
    fn apply(&mut self, texture_set: &str, channels: &[ColorChannel]);
}

/// Supplies the definitions currently valid for a slot (the host may
/// filter by tech level, slot role, anything). Required for
/// [`ModelSlot::select_definition`].
pub trait CandidateProvider {
    fn candidates(&self) -> Vec<Arc<Definition>>;
}

/// Yields the slot's symmetry counterparts. Required for
/// [`ModelSlot::broadcast`]. Counterparts must not trigger a nested
/// broadcast from inside the callback; that is unsupported.
pub trait SymmetryResolver {
    fn for_each_counterpart(&mut self, apply: &mut dyn FnMut(&mut ModelSlot));
}

/// The external services a mutating slot operation may need, passed in
/// per call so the slot itself stays plain data.
pub struct SlotCollaborators<'a> {
    pub models: &'a mut dyn ModelSource,
    pub attach: &'a mut dyn AttachBackend,
    pub material: &'a mut dyn MaterialBackend,
}

/// Mass/cost/volume derived from the current scale.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DerivedStats {
    pub mass: f32,
    pub cost: f32,
    pub volume: f32,
}

/// A structural change that can be broadcast across symmetry
/// counterparts. Actions carry the values they were created with, so a
/// counterpart ends up in the same logical state regardless of which
/// slot the broadcast started from.
#[derive(Debug, Clone)]
pub enum SlotAction {
    SelectDefinition(String),
    SelectLayout(String),
    SetScale { horizontal: f32, vertical: f32 },
    SetScaleForDiameter { diameter: f32, aspect_bias: f32 },
    ApplyTextureSet { name: String, use_default_colors: bool },
    SetColors(Vec<ColorChannel>),
}

/// Runtime state for one named slot of a composite assembly.
pub struct ModelSlot {
    /// Slot name within the composite, e.g. "nose", "core", "mount".
    pub name: String,
    /// The slot's nominal orientation — which mounting convention the
    /// composite expects at this position.
    pub orientation: Orientation,

    definition: Arc<Definition>,
    layout_name: String,
    horizontal_scale: f32,
    vertical_scale: f32,
    vertical_position: f32,
    texture_set_name: String,
    color_channels: Vec<ColorChannel>,
    /// True once the user set explicit colors; texture-set changes then
    /// keep them instead of resetting to presets.
    custom_colors: bool,

    current_diameter: f32,
    current_height: f32,
    stats: DerivedStats,

    tree: NodeTree,
    instance_roots: Vec<NodeId>,

    candidates: Option<Box<dyn CandidateProvider>>,
    symmetry: Option<Box<dyn SymmetryResolver>>,
}

impl ModelSlot {
    /// Build a slot around an initial definition. The node tree is
    /// built immediately; the slot is ready as soon as this returns.
    pub fn new(
        name: &str,
        orientation: Orientation,
        definition: Arc<Definition>,
        collab: &mut SlotCollaborators,
    ) -> Self {
        let layout_name = definition.default_layout_name.clone();
        let texture_set_name = definition.default_texture_set_name.clone();
        let color_channels = definition
            .default_texture_set()
            .filter(|s| !s.preset_colors.is_empty())
            .map(|s| s.preset_colors.clone())
            .unwrap_or_else(colors::neutral_channels);

        let mut slot = Self {
            name: name.to_string(),
            orientation,
            definition,
            layout_name,
            horizontal_scale: 1.0,
            vertical_scale: 1.0,
            vertical_position: 0.0,
            texture_set_name,
            color_channels,
            custom_colors: false,
            current_diameter: 0.0,
            current_height: 0.0,
            stats: DerivedStats::default(),
            tree: NodeTree::new(),
            instance_roots: Vec::new(),
            candidates: None,
            symmetry: None,
        };
        slot.rebuild_nodes(collab);
        slot.set_scale(1.0, 1.0, collab);
        slot
    }

    pub fn set_candidate_provider(&mut self, provider: Box<dyn CandidateProvider>) {
        self.candidates = Some(provider);
    }

    pub fn set_symmetry_resolver(&mut self, resolver: Box<dyn SymmetryResolver>) {
        self.symmetry = Some(resolver);
    }

    // ── Read-side accessors ─────────────────────────────────────────

    pub fn definition(&self) -> &Arc<Definition> {
        &self.definition
    }

    pub fn layout_name(&self) -> &str {
        &self.layout_name
    }

    pub fn texture_set_name(&self) -> &str {
        &self.texture_set_name
    }

    pub fn color_channels(&self) -> &[ColorChannel] {
        &self.color_channels
    }

    pub fn horizontal_scale(&self) -> f32 {
        self.horizontal_scale
    }

    pub fn vertical_scale(&self) -> f32 {
        self.vertical_scale
    }

    pub fn vertical_position(&self) -> f32 {
        self.vertical_position
    }

    pub fn current_diameter(&self) -> f32 {
        self.current_diameter
    }

    pub fn current_height(&self) -> f32 {
        self.current_height
    }

    pub fn stats(&self) -> DerivedStats {
        self.stats
    }

    pub fn tree(&self) -> &NodeTree {
        &self.tree
    }

    /// Whether the selected definition is mounted flipped 180° to
    /// satisfy an opposite-orientation slot.
    pub fn is_inverted(&self) -> bool {
        attach::inverted(self.orientation, self.definition.orientation)
    }

    /// The upper/lower face diameters at the current scale, as the
    /// composite sees them (inversion already applied).
    pub fn face_diameters(&self) -> (f32, f32) {
        let (upper, lower) = self.definition.face_diameters(self.is_inverted());
        (upper * self.horizontal_scale, lower * self.horizontal_scale)
    }

    fn current_layout(&self) -> &Layout {
        self.definition
            .layout(&self.layout_name)
            .unwrap_or_else(|| self.definition.default_layout())
    }

    pub fn instance_count(&self) -> usize {
        self.current_layout().instances.len()
    }

    // ── Vertical extent ─────────────────────────────────────────────
    //
    // Where the slot's origin sits depends on its orientation:
    // Top-oriented → origin at the bottom, Central → at the middle,
    // Bottom-oriented → at the top.

    pub fn top_y(&self) -> f32 {
        match self.orientation {
            Orientation::Top => self.vertical_position + self.current_height,
            Orientation::Central => self.vertical_position + self.current_height / 2.0,
            Orientation::Bottom => self.vertical_position,
        }
    }

    pub fn bottom_y(&self) -> f32 {
        self.top_y() - self.current_height
    }

    pub fn center_y(&self) -> f32 {
        self.top_y() - self.current_height / 2.0
    }

    // ── Selection ───────────────────────────────────────────────────

    /// Select a definition by name from the current candidate set.
    ///
    /// A missing candidate provider is a programmer error (logged,
    /// no-op). An unknown name falls back to the first candidate. On
    /// success the node tree is rebuilt, scale and position reapplied,
    /// and the texture-set selection re-validated.
    pub fn select_definition(&mut self, name: &str, collab: &mut SlotCollaborators) {
        let Some(provider) = self.candidates.as_ref() else {
            diag::report(&ModelError::Programmer(format!(
                "slot '{}': select_definition('{name}') called without a candidate provider; \
                 supply one at construction",
                self.name
            )));
            return;
        };
        let candidates = provider.candidates();
        if candidates.is_empty() {
            diag::report(&ModelError::Lookup(format!(
                "slot '{}': candidate set is empty, keeping '{}'",
                self.name, self.definition.name
            )));
            return;
        }
        let definition = match candidates.iter().find(|d| d.name == name) {
            Some(def) => def.clone(),
            None => diag::lookup_fallback(
                format!(
                    "slot '{}': no candidate named '{name}', falling back to '{}'",
                    self.name, candidates[0].name
                ),
                candidates[0].clone(),
            ),
        };

        self.definition = definition;

        // Keep the layout if the new definition has one by that name.
        if self.definition.layout(&self.layout_name).is_none() {
            self.layout_name = self.definition.default_layout_name.clone();
        }

        self.rebuild_nodes(collab);
        self.set_scale(self.horizontal_scale, self.vertical_scale, collab);
        self.apply_node_positions();

        // Re-validate the texture-set selection against the new
        // definition; presets replace colors unless the user customized.
        if self.definition.texture_set(&self.texture_set_name).is_none() {
            let name = self.definition.default_texture_set_name.clone();
            self.apply_texture_set(&name, false, collab);
        }
    }

    /// Select a layout by name on the current definition. Rebuilds
    /// instance count/positions only; the definition is untouched.
    pub fn select_layout(&mut self, name: &str, collab: &mut SlotCollaborators) {
        self.layout_name = match self.definition.layout(name) {
            Some(layout) => layout.name.clone(),
            None => diag::lookup_fallback(
                format!(
                    "slot '{}': definition '{}' has no layout '{name}', using default",
                    self.name, self.definition.name
                ),
                self.definition.default_layout_name.clone(),
            ),
        };
        self.rebuild_nodes(collab);
        self.set_scale(self.horizontal_scale, self.vertical_scale, collab);
        self.apply_node_positions();
    }

    // ── Scaling and positioning ─────────────────────────────────────

    /// Set the horizontal scale and a requested vertical scale; the
    /// vertical scale is clamped into the definition's allowed ratio
    /// band. A non-positive horizontal scale would invert the clamp
    /// bounds, so it is rejected and replaced with 1.0. Recomputes
    /// diameter, height, derived stats, and every node transform.
    pub fn set_scale(&mut self, h_scale: f32, v_scale_raw: f32, _collab: &mut SlotCollaborators) {
        let h_scale = if h_scale > 0.0 {
            h_scale
        } else {
            diag::config_fallback(
                format!(
                    "slot '{}': non-positive horizontal scale {h_scale}, using 1.0",
                    self.name
                ),
                1.0,
            )
        };
        let def = &self.definition;
        let v_scale = v_scale_raw.clamp(
            h_scale * def.min_vertical_scale_ratio,
            h_scale * def.max_vertical_scale_ratio,
        );
        self.horizontal_scale = h_scale;
        self.vertical_scale = v_scale;
        self.current_diameter = def.base_diameter * h_scale;
        self.current_height = def.base_height * v_scale;

        let count = self.instance_count() as f32;
        let mean = (h_scale * h_scale * v_scale).cbrt();
        let factor = mean.powf(def.scale_power);
        self.stats = DerivedStats {
            mass: def.base_mass * factor * count,
            cost: def.base_cost * factor * count,
            volume: def.base_volume * factor * count,
        };

        self.apply_node_scaling();
    }

    /// Scale so the base diameter hits `target_diameter`; the vertical
    /// scale follows the aspect bias (see [`ratio_for_bias`]).
    pub fn set_scale_for_diameter(
        &mut self,
        target_diameter: f32,
        aspect_bias: f32,
        collab: &mut SlotCollaborators,
    ) {
        let base = self.definition.base_diameter;
        let h_scale = if base > 0.0 {
            target_diameter / base
        } else {
            diag::config_fallback(
                format!(
                    "slot '{}': definition '{}' has zero base diameter",
                    self.name, self.definition.name
                ),
                1.0,
            )
        };
        let ratio = ratio_for_bias(
            aspect_bias,
            self.definition.min_vertical_scale_ratio,
            self.definition.max_vertical_scale_ratio,
        );
        self.set_scale(h_scale, h_scale * ratio, collab);
    }

    /// Scale so the named connecting face matches a neighbor's
    /// diameter. The matching face comes from the definition's
    /// upper/lower diameters, swapped first when the slot mounts the
    /// definition inverted.
    pub fn set_diameter_matching_neighbor(
        &mut self,
        target_diameter: f32,
        aspect_bias: f32,
        edge: NeighborEdge,
        collab: &mut SlotCollaborators,
    ) {
        let (upper, lower) = self.definition.face_diameters(self.is_inverted());
        let matching = match edge {
            NeighborEdge::Upper => upper,
            NeighborEdge::Lower => lower,
        };
        let h_scale = if matching > 0.0 {
            target_diameter / matching
        } else {
            diag::config_fallback(
                format!(
                    "slot '{}': definition '{}' has zero {edge:?} face diameter",
                    self.name, self.definition.name
                ),
                1.0,
            )
        };
        let ratio = ratio_for_bias(
            aspect_bias,
            self.definition.min_vertical_scale_ratio,
            self.definition.max_vertical_scale_ratio,
        );
        self.set_scale(h_scale, h_scale * ratio, collab);
    }

    /// Place the slot's local origin along the shared vertical axis.
    pub fn set_position(&mut self, y: f32) {
        self.vertical_position = y;
        self.apply_node_positions();
    }

    // ── Attach points ───────────────────────────────────────────────

    /// Place one attach point from the definition's template: scaled by
    /// the current h/v scale, inverted when the mounting is inverted,
    /// offset by the slot position plus the orientation-pair placement
    /// offset, then handed to the attach collaborator.
    pub fn compute_attach_point(
        &self,
        kind: AttachKind,
        user_initiated: bool,
        collab: &mut SlotCollaborators,
    ) {
        let template = match kind {
            AttachKind::Top => self.definition.top_attach,
            AttachKind::Bottom => self.definition.bottom_attach,
            AttachKind::Body(i) => self.definition.body_attach.get(i).copied(),
            AttachKind::Surface => self.definition.surface_attach,
        };
        let Some(template) = template else {
            return;
        };
        let y_offset = self.vertical_position
            + attach::placement_offset(
                self.definition.orientation,
                self.orientation,
                self.current_height,
            );
        let placed = attach::place_template(
            &template,
            self.horizontal_scale,
            self.vertical_scale,
            self.is_inverted(),
            y_offset,
        );
        let point_name = format!("{}_{}", self.name, kind.point_name());
        collab.attach.upsert_point(&point_name, placed, user_initiated);
    }

    /// Place every attach point the definition defines.
    pub fn compute_all_attach_points(&self, user_initiated: bool, collab: &mut SlotCollaborators) {
        self.compute_attach_point(AttachKind::Top, user_initiated, collab);
        self.compute_attach_point(AttachKind::Bottom, user_initiated, collab);
        for i in 0..self.definition.body_attach.len() {
            self.compute_attach_point(AttachKind::Body(i), user_initiated, collab);
        }
        self.compute_attach_point(AttachKind::Surface, user_initiated, collab);
    }

    // ── Colors and texture sets ─────────────────────────────────────

    /// Select a texture set by name (falling back to the default on a
    /// miss). Preset mask colors replace the channels when
    /// `use_default_colors` is set or the user never customized them.
    pub fn apply_texture_set(
        &mut self,
        name: &str,
        use_default_colors: bool,
        collab: &mut SlotCollaborators,
    ) {
        let set = match self.definition.texture_set(name) {
            Some(set) => Some(set),
            None => {
                if !name.is_empty() {
                    diag::report(&ModelError::Lookup(format!(
                        "slot '{}': definition '{}' has no texture set '{name}', using default",
                        self.name, self.definition.name
                    )));
                }
                self.definition.default_texture_set()
            }
        };
        self.texture_set_name = set.map(|s| s.name.clone()).unwrap_or_default();
        if use_default_colors || !self.custom_colors {
            self.color_channels = set
                .filter(|s| !s.preset_colors.is_empty())
                .map(|s| s.preset_colors.clone())
                .unwrap_or_else(colors::neutral_channels);
            self.custom_colors = false;
        }
        collab
            .material
            .apply(&self.texture_set_name, &self.color_channels);
    }

    /// Set explicit user colors; these survive texture-set changes.
    pub fn set_colors(&mut self, channels: Vec<ColorChannel>, collab: &mut SlotCollaborators) {
        self.color_channels = channels;
        self.custom_colors = true;
        collab
            .material
            .apply(&self.texture_set_name, &self.color_channels);
    }

    pub fn encode_colors(&self) -> String {
        colors::encode_channels(&self.color_channels)
    }

    /// Restore channels from an encoded blob. A malformed blob is a
    /// configuration error: logged, channels untouched, `false`
    /// returned.
    pub fn decode_colors(&mut self, text: &str, collab: &mut SlotCollaborators) -> bool {
        match colors::decode_channels(text) {
            Some(channels) => {
                self.set_colors(channels, collab);
                true
            }
            None => {
                diag::report(&ModelError::Configuration(format!(
                    "slot '{}': malformed color blob '{text}'",
                    self.name
                )));
                false
            }
        }
    }

    // ── Broadcast ───────────────────────────────────────────────────

    /// Apply one captured action to this slot.
    pub fn apply(&mut self, action: &SlotAction, collab: &mut SlotCollaborators) {
        match action {
            SlotAction::SelectDefinition(name) => self.select_definition(name, collab),
            SlotAction::SelectLayout(name) => self.select_layout(name, collab),
            SlotAction::SetScale {
                horizontal,
                vertical,
            } => self.set_scale(*horizontal, *vertical, collab),
            SlotAction::SetScaleForDiameter {
                diameter,
                aspect_bias,
            } => self.set_scale_for_diameter(*diameter, *aspect_bias, collab),
            SlotAction::ApplyTextureSet {
                name,
                use_default_colors,
            } => self.apply_texture_set(name, *use_default_colors, collab),
            SlotAction::SetColors(channels) => self.set_colors(channels.clone(), collab),
        }
    }

    /// Apply an action to this slot and every symmetry counterpart.
    ///
    /// The action carries its own captured values, so counterparts end
    /// up in the same logical state regardless of invocation order. A
    /// missing resolver is a programmer error; the whole operation
    /// no-ops. Plain sequential loop, no reentrancy guard — a
    /// counterpart must not broadcast from inside the callback.
    pub fn broadcast(&mut self, action: &SlotAction, collab: &mut SlotCollaborators) {
        let Some(mut resolver) = self.symmetry.take() else {
            diag::report(&ModelError::Programmer(format!(
                "slot '{}': broadcast called without a symmetry resolver; \
                 supply one at construction",
                self.name
            )));
            return;
        };
        self.apply(action, collab);
        resolver.for_each_counterpart(&mut |counterpart| {
            counterpart.apply(action, collab);
        });
        self.symmetry = Some(resolver);
    }

    // ── Node tree maintenance ───────────────────────────────────────

    /// Destroy and rebuild the owned node tree from the current
    /// definition's sub-models and merge groups: one root per layout
    /// instance, each holding cloned sub-model geometry. A sub-model
    /// whose asset fails to clone is skipped; the rest still build.
    fn rebuild_nodes(&mut self, collab: &mut SlotCollaborators) {
        self.tree.clear();
        self.instance_roots.clear();

        let layout = self.current_layout().clone();
        let definition = self.definition.clone();
        for (index, instance) in layout.instances.iter().enumerate() {
            let root = self.tree.add_node(&format!("{}_{index}", self.name), None);
            if let Some(node) = self.tree.node_mut(root) {
                node.position = instance.position;
                node.rotation = instance.rotation;
                node.scale = instance.scale;
            }
            for sub_model in &definition.sub_models {
                scene::build_sub_model(&mut self.tree, root, sub_model, collab.models);
            }
            for group in &definition.merge_groups {
                scene::apply_merge_group(&mut self.tree, root, group);
            }
            self.instance_roots.push(root);
        }
    }

    /// Push the current scale into node transforms. Plain definitions
    /// scale at the instance root; compound definitions keep the root
    /// at the instance scale and place each segment from the height
    /// distribution.
    fn apply_node_scaling(&mut self) {
        let definition = self.definition.clone();
        let layout = self.current_layout().clone();
        let h = self.horizontal_scale;
        let v = self.vertical_scale;

        if definition.compound_segments.is_empty() {
            for (index, &root) in self.instance_roots.iter().enumerate() {
                let instance_scale = layout.instances[index].scale;
                if let Some(node) = self.tree.node_mut(root) {
                    node.scale = instance_scale * Vec3::new(h, v, h);
                }
            }
            return;
        }

        let static_height: f32 = definition
            .compound_segments
            .iter()
            .filter(|s| !s.can_scale_height)
            .map(|s| s.base_height * h)
            .sum();
        if self.current_height < static_height {
            // Unresolved upstream: the distribution will hand scalable
            // segments a negative vertical scale. Surfaced here so the
            // host can decide what to do about the request.
            log::warn!(
                "slot '{}': target height {} is below the static segment height {}; \
                 scalable segments will receive a negative scale",
                self.name,
                self.current_height,
                static_height
            );
        }

        // Origin at the top of the stack means segments stack downward.
        let dir = if self.orientation == Orientation::Bottom {
            -1.0
        } else {
            1.0
        };
        let placements =
            compound::distribute_heights(&definition.compound_segments, self.current_height, h, dir);

        for &root in &self.instance_roots {
            for placement in &placements {
                let Some(id) = self
                    .tree
                    .descendants(root)
                    .into_iter()
                    .find(|&id| self.tree.node(id).is_some_and(|n| n.name == placement.name))
                else {
                    continue;
                };
                if let Some(node) = self.tree.node_mut(id) {
                    node.position.y = placement.position;
                    node.scale = placement.scale;
                }
            }
        }
    }

    /// Push the slot origin into the instance-root transforms.
    fn apply_node_positions(&mut self) {
        let layout = self.current_layout().clone();
        for (index, &root) in self.instance_roots.iter().enumerate() {
            let base = layout.instances[index].position;
            if let Some(node) = self.tree.node_mut(root) {
                node.position = base + Vec3::Y * self.vertical_position;
            }
        }
    }
}

/// Map an aspect bias in [−1, 1] to a vertical/horizontal scale ratio:
/// −1 → the minimum ratio, 0 → 1 (square), +1 → the maximum ratio,
/// linear on each side.
pub fn ratio_for_bias(bias: f32, min_ratio: f32, max_ratio: f32) -> f32 {
    let bias = bias.clamp(-1.0, 1.0);
    if bias >= 0.0 {
        1.0 + bias * (max_ratio - 1.0)
    } else {
        1.0 + bias * (1.0 - min_ratio)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::attach::PlacedAttach;
    use crate::config::ConfigNode;
    use crate::scene::TemplateSource;
    use std::cell::RefCell;
    use std::rc::Rc;

    // ── Test doubles ────────────────────────────────────────────────

    #[derive(Default)]
    pub(crate) struct RecordingAttach {
        pub points: Vec<(String, PlacedAttach, bool)>,
        pub surface_deltas: Vec<f32>,
    }

    impl AttachBackend for RecordingAttach {
        fn upsert_point(&mut self, name: &str, point: PlacedAttach, user_initiated: bool) {
            self.points.retain(|(n, _, _)| n != name);
            self.points.push((name.to_string(), point, user_initiated));
        }

        fn remove_point(&mut self, name: &str) {
            self.points.retain(|(n, _, _)| n != name);
        }

        fn surface_offset_changed(&mut self, delta: f32) {
            self.surface_deltas.push(delta);
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingMaterial {
        pub applied: Vec<(String, Vec<ColorChannel>)>,
    }

    impl MaterialBackend for RecordingMaterial {
        fn apply(&mut self, texture_set: &str, channels: &[ColorChannel]) {
            self.applied.push((texture_set.to_string(), channels.to_vec()));
        }
    }

    pub(crate) struct StaticCandidates(pub Vec<Arc<Definition>>);

    impl CandidateProvider for StaticCandidates {
        fn candidates(&self) -> Vec<Arc<Definition>> {
            self.0.clone()
        }
    }

    /// Resolver over a shared pool of counterpart slots, so tests can
    /// inspect the pool after a broadcast.
    pub(crate) struct SharedResolver(pub Rc<RefCell<Vec<ModelSlot>>>);

    impl SymmetryResolver for SharedResolver {
        fn for_each_counterpart(&mut self, apply: &mut dyn FnMut(&mut ModelSlot)) {
            for slot in self.0.borrow_mut().iter_mut() {
                apply(slot);
            }
        }
    }

    pub(crate) struct TestWorld {
        pub models: TemplateSource,
        pub attach: RecordingAttach,
        pub material: RecordingMaterial,
    }

    impl TestWorld {
        pub(crate) fn new() -> Self {
            let mut models = TemplateSource::new();
            models.register("tank-mesh", &["hull", "cap"]);
            models.register("nose-mesh", &["cone"]);
            Self {
                models,
                attach: RecordingAttach::default(),
                material: RecordingMaterial::default(),
            }
        }

        pub(crate) fn collab(&mut self) -> SlotCollaborators<'_> {
            SlotCollaborators {
                models: &mut self.models,
                attach: &mut self.attach,
                material: &mut self.material,
            }
        }
    }

    pub(crate) fn definition_from_json(json: &str) -> Arc<Definition> {
        Definition::from_config(&ConfigNode::from_json(json).unwrap())
    }

    pub(crate) fn tank_definition() -> Arc<Definition> {
        definition_from_json(
            r#"{
                "name": "MODEL",
                "values": [
                    ["name", "tank-std"],
                    ["baseDiameter", "2.5"],
                    ["upperDiameter", "2.5"],
                    ["lowerDiameter", "1.25"],
                    ["baseHeight", "1.0"],
                    ["mass", "4.0"],
                    ["cost", "800"],
                    ["volume", "3.2"],
                    ["orientation", "top"]
                ],
                "nodes": [
                    {"name": "SUBMODEL", "values": [["model", "tank-mesh"]], "nodes": []},
                    {"name": "TOPATTACH", "values": [["position", "0, 1, 0"], ["size", "2"]], "nodes": []},
                    {"name": "BOTTOMATTACH", "values": [["position", "0, 0, 0"], ["orientation", "0, -1, 0"]], "nodes": []},
                    {"name": "TEXTURESET", "values": [["name", "bare"], ["color", "1,1,1,1,0"]], "nodes": []},
                    {"name": "TEXTURESET", "values": [["name", "striped"], ["color", "1,0,0,1,0"], ["color", "0,0,1,1,0"]], "nodes": []}
                ]
            }"#,
        )
    }

    pub(crate) fn nose_definition() -> Arc<Definition> {
        definition_from_json(
            r#"{
                "name": "MODEL",
                "values": [
                    ["name", "nose-a"],
                    ["baseDiameter", "2.5"],
                    ["lowerDiameter", "1.25"],
                    ["baseHeight", "2.0"],
                    ["orientation", "top"]
                ],
                "nodes": [
                    {"name": "SUBMODEL", "values": [["model", "nose-mesh"]], "nodes": []}
                ]
            }"#,
        )
    }

    fn tank_slot(world: &mut TestWorld) -> ModelSlot {
        let def = tank_definition();
        ModelSlot::new("core", Orientation::Top, def, &mut world.collab())
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[test]
    fn scale_clamps_vertical_into_ratio_band() {
        let mut world = TestWorld::new();
        let mut slot = tank_slot(&mut world);
        for (h, v_raw) in [(1.0, 100.0), (2.0, 0.01), (0.5, 3.0), (4.0, -2.0)] {
            slot.set_scale(h, v_raw, &mut world.collab());
            let min = h * slot.definition().min_vertical_scale_ratio;
            let max = h * slot.definition().max_vertical_scale_ratio;
            assert!(slot.vertical_scale() >= min && slot.vertical_scale() <= max);
        }
    }

    #[test]
    fn diameter_scenario_from_base() {
        // baseDiameter 2.5, target 5.0, bias 0 → h=v=2, diameter 5, height 2
        let mut world = TestWorld::new();
        let mut slot = tank_slot(&mut world);
        slot.set_scale_for_diameter(5.0, 0.0, &mut world.collab());
        assert!((slot.horizontal_scale() - 2.0).abs() < 1e-6);
        assert!((slot.vertical_scale() - 2.0).abs() < 1e-6);
        assert!((slot.current_diameter() - 5.0).abs() < 1e-6);
        assert!((slot.current_height() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn non_positive_scale_falls_back_to_unit() {
        // a negative target diameter would invert the clamp band; the
        // slot must recover instead of crashing the host
        let mut world = TestWorld::new();
        let mut slot = tank_slot(&mut world);
        slot.set_scale_for_diameter(-5.0, 0.0, &mut world.collab());
        assert!((slot.horizontal_scale() - 1.0).abs() < 1e-6);
        assert!(slot.vertical_scale() >= slot.definition().min_vertical_scale_ratio);

        slot.set_scale(0.0, 1.0, &mut world.collab());
        assert!((slot.horizontal_scale() - 1.0).abs() < 1e-6);
        assert!((slot.current_diameter() - 2.5).abs() < 1e-6);
    }

    #[test]
    fn neighbor_matching_uses_the_lower_face() {
        // nose lowerDiameter 1.25; matching a 5.0 neighbor → h = 4.0
        let mut world = TestWorld::new();
        let def = nose_definition();
        let mut slot = ModelSlot::new("nose", Orientation::Top, def, &mut world.collab());
        slot.set_diameter_matching_neighbor(5.0, 0.0, NeighborEdge::Lower, &mut world.collab());
        assert!((slot.horizontal_scale() - 4.0).abs() < 1e-6);
    }

    #[test]
    fn neighbor_matching_swaps_faces_when_inverted() {
        // a Top-style definition in a Bottom slot mounts inverted, so
        // its faces swap: the "lower" face is the definition's upper
        let mut world = TestWorld::new();
        let def = tank_definition();
        let mut slot = ModelSlot::new("mount", Orientation::Bottom, def, &mut world.collab());
        assert!(slot.is_inverted());
        slot.set_diameter_matching_neighbor(5.0, 0.0, NeighborEdge::Lower, &mut world.collab());
        // matching face is upper_diameter (2.5) after the swap
        assert!((slot.horizontal_scale() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn derived_stats_scale_volumetrically() {
        let mut world = TestWorld::new();
        let mut slot = tank_slot(&mut world);
        slot.set_scale(2.0, 2.0, &mut world.collab());
        // mean scale 2, power 3 → factor 8
        assert!((slot.stats().mass - 4.0 * 8.0).abs() < 1e-3);
        assert!((slot.stats().cost - 800.0 * 8.0).abs() < 1e-1);
        assert!((slot.stats().volume - 3.2 * 8.0).abs() < 1e-3);
    }

    #[test]
    fn vertical_extent_by_orientation() {
        let mut world = TestWorld::new();
        let mut slot = tank_slot(&mut world); // Top-oriented: origin at bottom
        slot.set_scale(1.0, 2.0, &mut world.collab());
        slot.set_position(10.0);
        assert!((slot.top_y() - 12.0).abs() < 1e-6);
        assert!((slot.bottom_y() - 10.0).abs() < 1e-6);
        assert!((slot.center_y() - 11.0).abs() < 1e-6);

        let def = tank_definition();
        let mut central =
            ModelSlot::new("core", Orientation::Central, def, &mut world.collab());
        central.set_scale(1.0, 2.0, &mut world.collab());
        central.set_position(10.0);
        assert!((central.top_y() - 11.0).abs() < 1e-6);
        assert!((central.bottom_y() - 9.0).abs() < 1e-6);
    }

    #[test]
    fn select_missing_definition_falls_back_to_first_candidate() {
        let mut world = TestWorld::new();
        let mut slot = tank_slot(&mut world);
        slot.set_candidate_provider(Box::new(StaticCandidates(vec![
            nose_definition(),
            tank_definition(),
        ])));
        slot.select_definition("no-such-model", &mut world.collab());
        assert_eq!(slot.definition().name, "nose-a");
        // slot is still fully usable
        slot.set_scale(1.0, 1.0, &mut world.collab());
        assert!(slot.tree().len() > 0);
    }

    #[test]
    fn select_definition_without_provider_no_ops() {
        let mut world = TestWorld::new();
        let mut slot = tank_slot(&mut world);
        slot.select_definition("nose-a", &mut world.collab());
        assert_eq!(slot.definition().name, "tank-std");
    }

    #[test]
    fn select_definition_rebuilds_nodes_and_revalidates_texture() {
        let mut world = TestWorld::new();
        let mut slot = tank_slot(&mut world);
        assert_eq!(slot.texture_set_name(), "bare");
        slot.set_candidate_provider(Box::new(StaticCandidates(vec![
            nose_definition(),
            tank_definition(),
        ])));
        slot.select_definition("nose-a", &mut world.collab());
        // nose has one mesh under one instance root
        assert_eq!(slot.tree().len(), 3);
        // nose has no texture sets: selection clears, colors go neutral
        assert_eq!(slot.texture_set_name(), "");
        assert_eq!(slot.color_channels(), colors::neutral_channels());
    }

    #[test]
    fn select_missing_layout_falls_back_to_default() {
        let mut world = TestWorld::new();
        let mut slot = tank_slot(&mut world);
        slot.select_layout("radial-x6", &mut world.collab());
        assert_eq!(slot.layout_name(), "single");
        assert_eq!(slot.instance_count(), 1);
    }

    #[test]
    fn attach_point_scales_and_offsets() {
        let mut world = TestWorld::new();
        let mut slot = tank_slot(&mut world);
        slot.set_scale(2.0, 3.0, &mut world.collab());
        slot.set_position(5.0);
        slot.compute_attach_point(AttachKind::Top, true, &mut world.collab());
        let (name, placed, user) = world.attach.points.last().unwrap().clone();
        assert_eq!(name, "core_top");
        assert!(user);
        // template y=1 scaled by v=3, plus position 5 (Top-in-Top: no pair offset)
        assert!((placed.position.y - 8.0).abs() < 1e-6);
    }

    #[test]
    fn texture_set_miss_falls_back_and_presets_apply() {
        let mut world = TestWorld::new();
        let mut slot = tank_slot(&mut world);
        slot.apply_texture_set("striped", false, &mut world.collab());
        assert_eq!(slot.texture_set_name(), "striped");
        assert_eq!(slot.color_channels().len(), 2);

        slot.apply_texture_set("nonexistent", false, &mut world.collab());
        assert_eq!(slot.texture_set_name(), "bare");
        assert_eq!(slot.color_channels().len(), 1);
    }

    #[test]
    fn custom_colors_survive_texture_changes() {
        let mut world = TestWorld::new();
        let mut slot = tank_slot(&mut world);
        let custom = vec![ColorChannel::new(0.9, 0.1, 0.2, 1.0, 0.5)];
        slot.set_colors(custom.clone(), &mut world.collab());
        slot.apply_texture_set("striped", false, &mut world.collab());
        assert_eq!(slot.color_channels(), custom);
        // explicit request for defaults resets them
        slot.apply_texture_set("striped", true, &mut world.collab());
        assert_eq!(slot.color_channels().len(), 2);
    }

    #[test]
    fn color_blob_round_trips_through_the_slot() {
        let mut world = TestWorld::new();
        let mut slot = tank_slot(&mut world);
        let custom = vec![
            ColorChannel::new(0.123, 0.456, 0.789, 1.0, 0.25),
            ColorChannel::new(0.0, 1.0, 0.5, 0.75, 0.0),
        ];
        slot.set_colors(custom.clone(), &mut world.collab());
        let blob = slot.encode_colors();
        let mut other = tank_slot(&mut world);
        assert!(other.decode_colors(&blob, &mut world.collab()));
        assert_eq!(other.color_channels(), custom);
    }

    #[test]
    fn broadcast_brings_counterparts_to_the_same_state() {
        let mut world = TestWorld::new();
        let pool = Rc::new(RefCell::new(vec![
            tank_slot(&mut world),
            tank_slot(&mut world),
        ]));
        // counterparts start in different states
        pool.borrow_mut()[0].set_scale(3.0, 3.0, &mut world.collab());

        let mut lead = tank_slot(&mut world);
        lead.set_symmetry_resolver(Box::new(SharedResolver(pool.clone())));
        let action = SlotAction::SetScaleForDiameter {
            diameter: 5.0,
            aspect_bias: 0.0,
        };
        lead.broadcast(&action, &mut world.collab());

        // reference: the same action applied to a fresh slot in isolation
        let mut reference = tank_slot(&mut world);
        reference.apply(&action, &mut world.collab());

        assert!((lead.horizontal_scale() - reference.horizontal_scale()).abs() < 1e-6);
        for counterpart in pool.borrow().iter() {
            assert!(
                (counterpart.horizontal_scale() - reference.horizontal_scale()).abs() < 1e-6
            );
            assert!((counterpart.vertical_scale() - reference.vertical_scale()).abs() < 1e-6);
        }
    }

    #[test]
    fn broadcast_without_resolver_no_ops() {
        let mut world = TestWorld::new();
        let mut slot = tank_slot(&mut world);
        let before = slot.horizontal_scale();
        slot.broadcast(
            &SlotAction::SetScale {
                horizontal: 9.0,
                vertical: 9.0,
            },
            &mut world.collab(),
        );
        assert!((slot.horizontal_scale() - before).abs() < 1e-6);
    }

    #[test]
    fn ratio_for_bias_endpoints() {
        assert!((ratio_for_bias(0.0, 0.25, 4.0) - 1.0).abs() < 1e-6);
        assert!((ratio_for_bias(-1.0, 0.25, 4.0) - 0.25).abs() < 1e-6);
        assert!((ratio_for_bias(1.0, 0.25, 4.0) - 4.0).abs() < 1e-6);
        assert!((ratio_for_bias(0.5, 0.25, 4.0) - 2.5).abs() < 1e-6);
    }
}
