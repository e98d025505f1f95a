//! Immutable model definitions parsed from the config source.
//!
//! A [`Definition`] is the template for one selectable model: base
//! geometry, scale bounds, economy figures, attach templates, sub-model
//! assets, optional compound segments and layouts. Definitions are
//! created once at load time, shared behind `Arc`, and destroyed only
//! on a full registry reload. Parsing never fails hard — a malformed
//! field is a configuration error that logs and takes the built-in
//! default, because a bad data file must not take down the host.

use std::sync::Arc;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::attach::AttachTemplate;
use crate::colors::{decode_channels, ColorChannel};
use crate::config::ConfigNode;
use crate::diag;

/// Which end of a definition is its local origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    /// Origin at the bottom face (the model points up).
    Top,
    /// Origin at the vertical center.
    Central,
    /// Origin at the top face (the model points down).
    Bottom,
}

impl Orientation {
    pub fn parse(raw: &str, node_name: &str) -> Orientation {
        match raw.trim().to_ascii_lowercase().as_str() {
            "top" => Orientation::Top,
            "central" => Orientation::Central,
            "bottom" => Orientation::Bottom,
            _ => diag::config_fallback(
                format!("node '{node_name}': unknown orientation '{raw}'"),
                Orientation::Central,
            ),
        }
    }

    pub fn opposite(self) -> Orientation {
        match self {
            Orientation::Top => Orientation::Bottom,
            Orientation::Central => Orientation::Central,
            Orientation::Bottom => Orientation::Top,
        }
    }
}

/// A named portion of a definition that stacks along the vertical axis.
/// `can_scale_height` marks whether height-driven scaling may stretch
/// this segment or must leave its aspect ratio alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundSegment {
    pub name: String,
    pub base_height: f32,
    pub can_scale_height: bool,
    pub order: i32,
    /// Pre-scale stacking offset added to the segment's position.
    pub offset: f32,
    /// Unit-ish vector marking which local axis receives the vertical
    /// scale; the other two axes track the horizontal scale.
    pub scale_axis: Vec3,
}

impl CompoundSegment {
    pub fn from_config(node: &ConfigNode) -> Self {
        Self {
            name: node.str_or("name", "segment"),
            base_height: node.f32_or("height", 1.0),
            can_scale_height: node.bool_or("canScaleHeight", false),
            order: node.i32_or("order", 0),
            offset: node.f32_or("offset", 0.0),
            scale_axis: node.vec3_or("scaleAxis", Vec3::Y),
        }
    }
}

/// One placed copy of the model within a layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutInstance {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl LayoutInstance {
    pub fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    fn from_config(node: &ConfigNode) -> Self {
        let euler = node.vec3_or("rotation", Vec3::ZERO);
        Self {
            position: node.vec3_or("position", Vec3::ZERO),
            rotation: Quat::from_euler(
                glam::EulerRot::YXZ,
                euler.y.to_radians(),
                euler.x.to_radians(),
                euler.z.to_radians(),
            ),
            scale: node.vec3_or("scale", Vec3::ONE),
        }
    }
}

/// A named set of per-instance placements — one slot rendering several
/// positioned copies of the same definition (radial arrays and the
/// like). Always holds at least one instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub name: String,
    pub instances: Vec<LayoutInstance>,
}

impl Layout {
    /// The implicit single-copy layout every definition can fall back to.
    pub fn single() -> Self {
        Self {
            name: "single".to_string(),
            instances: vec![LayoutInstance::identity()],
        }
    }

    pub fn from_config(node: &ConfigNode) -> Self {
        let name = node.str_or("name", "single");
        let mut instances: Vec<LayoutInstance> = node
            .children("INSTANCE")
            .map(LayoutInstance::from_config)
            .collect();
        if instances.is_empty() {
            instances = diag::config_fallback(
                format!("layout '{name}' has no instances"),
                vec![LayoutInstance::identity()],
            );
        }
        Self { name, instances }
    }
}

/// Mesh rename rule: a child mesh of a cloned asset gets a new name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshRename {
    pub from: String,
    pub to: String,
}

/// One external asset cloned into the slot's node tree, with its local
/// transform and mesh include/exclude/rename rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubModelSpec {
    pub asset: String,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    /// When non-empty, only these child meshes are kept.
    pub include_meshes: Vec<String>,
    /// Child meshes removed after cloning.
    pub exclude_meshes: Vec<String>,
    pub renames: Vec<MeshRename>,
    /// When set, the cloned node is moved under this named node instead
    /// of staying under the instance root.
    pub reparent_to: Option<String>,
}

impl SubModelSpec {
    pub fn from_config(node: &ConfigNode) -> Self {
        let euler = node.vec3_or("rotation", Vec3::ZERO);
        let renames = node
            .strings("rename")
            .iter()
            .filter_map(|r| {
                let (from, to) = r.split_once("->")?;
                Some(MeshRename {
                    from: from.trim().to_string(),
                    to: to.trim().to_string(),
                })
            })
            .collect();
        Self {
            asset: node.str_or("model", ""),
            position: node.vec3_or("position", Vec3::ZERO),
            rotation: Quat::from_euler(
                glam::EulerRot::YXZ,
                euler.y.to_radians(),
                euler.x.to_radians(),
                euler.z.to_radians(),
            ),
            scale: node.vec3_or("scale", Vec3::ONE),
            include_meshes: node.strings("includeMesh"),
            exclude_meshes: node.strings("excludeMesh"),
            renames,
            reparent_to: node.str_opt("reparentTo"),
        }
    }
}

/// Named child meshes collapsed into one node under a named parent,
/// sharing a material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeGroup {
    pub name: String,
    pub parent: String,
    pub meshes: Vec<String>,
}

impl MergeGroup {
    pub fn from_config(node: &ConfigNode) -> Self {
        Self {
            name: node.str_or("name", "merged"),
            parent: node.str_or("parent", ""),
            meshes: node.strings("mesh"),
        }
    }
}

/// A selectable paint scheme plus its preset mask colors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureSet {
    pub name: String,
    pub preset_colors: Vec<ColorChannel>,
}

impl TextureSet {
    pub fn from_config(node: &ConfigNode) -> Self {
        let name = node.str_or("name", "default");
        let preset_colors = node
            .strings("color")
            .iter()
            .filter_map(|c| decode_channels(c))
            .flatten()
            .collect();
        Self { name, preset_colors }
    }
}

/// Immutable template describing one selectable model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    pub name: String,
    pub title: String,

    // Geometry at scale 1.
    pub base_diameter: f32,
    pub upper_diameter: f32,
    pub lower_diameter: f32,
    pub base_height: f32,
    pub actual_height: f32,

    /// Vertical scale allowed relative to horizontal scale.
    pub min_vertical_scale_ratio: f32,
    pub max_vertical_scale_ratio: f32,

    // Economy at scale 1.
    pub base_mass: f32,
    pub base_cost: f32,
    pub base_volume: f32,
    /// Exponent applied to the mean scale when deriving mass/cost/
    /// volume. 3 = volumetric.
    pub scale_power: f32,

    pub orientation: Orientation,
    /// Axis the model flips around when used in an opposite-orientation
    /// slot.
    pub invert_axis: Vec3,

    pub top_attach: Option<AttachTemplate>,
    pub bottom_attach: Option<AttachTemplate>,
    pub body_attach: Vec<AttachTemplate>,
    pub surface_attach: Option<AttachTemplate>,

    /// May be empty: proxy/no-geometry definitions are valid.
    pub sub_models: Vec<SubModelSpec>,
    pub merge_groups: Vec<MergeGroup>,
    pub compound_segments: Vec<CompoundSegment>,

    pub layouts: Vec<Layout>,
    pub default_layout_name: String,

    pub texture_sets: Vec<TextureSet>,
    pub default_texture_set_name: String,
}

impl Definition {
    /// Parse one MODEL node. Never fails: every malformed field logs a
    /// configuration error and takes its default.
    pub fn from_config(node: &ConfigNode) -> Arc<Definition> {
        let name = node.str_or("name", "unnamed");
        let base_diameter = node.f32_or("baseDiameter", 1.0);
        let mut base_height = node.f32_or("baseHeight", 1.0);
        if base_height <= 0.0 {
            base_height = diag::config_fallback(
                format!("model '{name}': baseHeight {base_height} must be positive"),
                1.0,
            );
        }

        let mut min_ratio = node.f32_or("minVerticalScaleRatio", 0.25);
        let mut max_ratio = node.f32_or("maxVerticalScaleRatio", 4.0);
        if min_ratio > max_ratio {
            (min_ratio, max_ratio) = diag::config_fallback(
                format!(
                    "model '{name}': minVerticalScaleRatio {min_ratio} > maxVerticalScaleRatio {max_ratio}"
                ),
                (0.25, 4.0),
            );
        }

        let mut layouts: Vec<Layout> =
            node.children("LAYOUT").map(Layout::from_config).collect();
        if layouts.is_empty() {
            layouts.push(Layout::single());
        }
        let default_layout_name = node.str_or("defaultLayout", &layouts[0].name);

        let texture_sets: Vec<TextureSet> = node
            .children("TEXTURESET")
            .map(TextureSet::from_config)
            .collect();
        let default_texture_set_name = node.str_or(
            "defaultTextureSet",
            texture_sets.first().map(|t| t.name.as_str()).unwrap_or(""),
        );

        Arc::new(Definition {
            title: node.str_or("title", &name),
            base_diameter,
            upper_diameter: node.f32_or("upperDiameter", base_diameter),
            lower_diameter: node.f32_or("lowerDiameter", base_diameter),
            base_height,
            actual_height: node.f32_or("actualHeight", base_height),
            min_vertical_scale_ratio: min_ratio,
            max_vertical_scale_ratio: max_ratio,
            base_mass: node.f32_or("mass", 0.0),
            base_cost: node.f32_or("cost", 0.0),
            base_volume: node.f32_or("volume", 0.0),
            scale_power: node.f32_or("scalePower", 3.0),
            orientation: Orientation::parse(&node.str_or("orientation", "central"), &name),
            invert_axis: node.vec3_or("invertAxis", Vec3::Z),
            top_attach: node.child("TOPATTACH").map(AttachTemplate::from_config),
            bottom_attach: node.child("BOTTOMATTACH").map(AttachTemplate::from_config),
            body_attach: node
                .children("BODYATTACH")
                .map(AttachTemplate::from_config)
                .collect(),
            surface_attach: node.child("SURFACEATTACH").map(AttachTemplate::from_config),
            sub_models: node
                .children("SUBMODEL")
                .map(SubModelSpec::from_config)
                .collect(),
            merge_groups: node
                .children("MERGEGROUP")
                .map(MergeGroup::from_config)
                .collect(),
            compound_segments: node
                .children("SEGMENT")
                .map(CompoundSegment::from_config)
                .collect(),
            layouts,
            default_layout_name,
            texture_sets,
            default_texture_set_name,
            name,
        })
    }

    pub fn layout(&self, name: &str) -> Option<&Layout> {
        self.layouts.iter().find(|l| l.name == name)
    }

    /// The default layout; definitions always hold at least one.
    pub fn default_layout(&self) -> &Layout {
        self.layout(&self.default_layout_name)
            .unwrap_or(&self.layouts[0])
    }

    pub fn texture_set(&self, name: &str) -> Option<&TextureSet> {
        self.texture_sets.iter().find(|t| t.name == name)
    }

    pub fn default_texture_set(&self) -> Option<&TextureSet> {
        self.texture_set(&self.default_texture_set_name)
            .or_else(|| self.texture_sets.first())
    }

    /// Upper/lower face diameters as seen by the slot, swapped when the
    /// model is inverted to satisfy an opposite-orientation slot.
    pub fn face_diameters(&self, inverted: bool) -> (f32, f32) {
        if inverted {
            (self.lower_diameter, self.upper_diameter)
        } else {
            (self.upper_diameter, self.lower_diameter)
        }
    }
}
