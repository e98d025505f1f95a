//! procstack Headless Validation Harness
//!
//! Exercises the modeling engine end-to-end without any rendering
//! host. Runs entirely in-process — no scene graph, no UI, no files.
//!
//! Usage:
//!   cargo run -p procstack-simtest
//!   cargo run -p procstack-simtest -- --verbose

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use glam::Vec3;

use procstack_logic::attach::{AttachBackend, PlacedAttach};
use procstack_logic::cascade::AssemblyCascade;
use procstack_logic::colors::{decode_channels, encode_channels, ColorChannel};
use procstack_logic::compound::distribute_heights;
use procstack_logic::definition::{CompoundSegment, Definition, Orientation};
use procstack_logic::persist;
use procstack_logic::registry::DefinitionRegistry;
use procstack_logic::scene::TemplateSource;
use procstack_logic::slot::{
    CandidateProvider, MaterialBackend, ModelSlot, SlotAction, SlotCollaborators,
    SymmetryResolver,
};
use procstack_logic::validate::{validate_definitions, Severity};

// ── Model catalog (same document shape a host would ship) ───────────────
const CATALOG_JSON: &str = r#"{
    "name": "catalog",
    "values": [],
    "nodes": [
        {"name": "MODEL", "values": [
            ["name", "nose-cone"],
            ["title", "Aerodynamic Nose"],
            ["baseDiameter", "2.5"],
            ["lowerDiameter", "1.25"],
            ["baseHeight", "2.0"],
            ["mass", "0.8"], ["cost", "320"], ["volume", "1.1"],
            ["orientation", "top"]
        ], "nodes": [
            {"name": "SUBMODEL", "values": [["model", "nose-mesh"]], "nodes": []},
            {"name": "BOTTOMATTACH", "values": [["position", "0, 0, 0"], ["orientation", "0, -1, 0"], ["size", "1"]], "nodes": []}
        ]},
        {"name": "MODEL", "values": [
            ["name", "tank-compound"],
            ["title", "Stretchable Tank"],
            ["baseDiameter", "2.5"],
            ["lowerDiameter", "1.25"],
            ["baseHeight", "4.0"],
            ["mass", "4.0"], ["cost", "800"], ["volume", "3.2"],
            ["orientation", "top"]
        ], "nodes": [
            {"name": "SUBMODEL", "values": [["model", "tank-mesh"]], "nodes": []},
            {"name": "SEGMENT", "values": [["name", "cap-lower"], ["height", "1.0"], ["order", "0"]], "nodes": []},
            {"name": "SEGMENT", "values": [["name", "wall"], ["height", "2.0"], ["order", "1"], ["canScaleHeight", "true"]], "nodes": []},
            {"name": "SEGMENT", "values": [["name", "cap-upper"], ["height", "1.0"], ["order", "2"]], "nodes": []},
            {"name": "TOPATTACH", "values": [["position", "0, 4, 0"], ["size", "2"]], "nodes": []},
            {"name": "BOTTOMATTACH", "values": [["position", "0, 0, 0"], ["orientation", "0, -1, 0"], ["size", "2"]], "nodes": []},
            {"name": "SURFACEATTACH", "values": [["position", "1.25, 2, 0"], ["orientation", "1, 0, 0"], ["size", "1"]], "nodes": []},
            {"name": "TEXTURESET", "values": [["name", "bare"], ["color", "1,1,1,1,0"]], "nodes": []},
            {"name": "TEXTURESET", "values": [["name", "striped"], ["color", "1,0,0,1,0"], ["color", "0,0,1,1,0"]], "nodes": []}
        ]},
        {"name": "MODEL", "values": [
            ["name", "engine-mount"],
            ["title", "Engine Mount"],
            ["baseDiameter", "2.5"],
            ["upperDiameter", "2.5"],
            ["lowerDiameter", "1.25"],
            ["baseHeight", "1.0"],
            ["mass", "1.5"], ["cost", "450"], ["volume", "0.6"],
            ["orientation", "top"]
        ], "nodes": [
            {"name": "SUBMODEL", "values": [["model", "mount-mesh"]], "nodes": []},
            {"name": "BOTTOMATTACH", "values": [["position", "0, 0, 0"], ["orientation", "0, -1, 0"], ["size", "2"]], "nodes": []}
        ]},
        {"name": "MODEL", "values": [
            ["name", "tank-compound"],
            ["title", "Duplicate To Be Skipped"]
        ], "nodes": []}
    ]
}"#;

// A catalog with deliberate data problems for the validation sweep.
const DIRTY_CATALOG_JSON: &str = r#"{
    "name": "catalog",
    "values": [],
    "nodes": [
        {"name": "MODEL", "values": [
            ["name", "broken"],
            ["upperDiameter", "0"],
            ["baseHeight", "2.0"]
        ], "nodes": [
            {"name": "SEGMENT", "values": [["name", "a"], ["height", "1"], ["order", "0"]], "nodes": []},
            {"name": "SEGMENT", "values": [["name", "b"], ["height", "0.5"], ["order", "0"]], "nodes": []}
        ]}
    ]
}"#;

// ── Collaborator doubles ────────────────────────────────────────────────

#[derive(Default)]
struct RecordingAttach {
    points: Vec<(String, PlacedAttach)>,
    surface_deltas: Vec<f32>,
}

impl AttachBackend for RecordingAttach {
    fn upsert_point(&mut self, name: &str, point: PlacedAttach, _user_initiated: bool) {
        self.points.retain(|(n, _)| n != name);
        self.points.push((name.to_string(), point));
    }

    fn remove_point(&mut self, name: &str) {
        self.points.retain(|(n, _)| n != name);
    }

    fn surface_offset_changed(&mut self, delta: f32) {
        self.surface_deltas.push(delta);
    }
}

#[derive(Default)]
struct RecordingMaterial {
    applied: Vec<(String, Vec<ColorChannel>)>,
}

impl MaterialBackend for RecordingMaterial {
    fn apply(&mut self, texture_set: &str, channels: &[ColorChannel]) {
        self.applied.push((texture_set.to_string(), channels.to_vec()));
    }
}

struct StaticCandidates(Vec<Arc<Definition>>);

impl CandidateProvider for StaticCandidates {
    fn candidates(&self) -> Vec<Arc<Definition>> {
        self.0.clone()
    }
}

struct SharedResolver(Rc<RefCell<Vec<ModelSlot>>>);

impl SymmetryResolver for SharedResolver {
    fn for_each_counterpart(&mut self, apply: &mut dyn FnMut(&mut ModelSlot)) {
        for slot in self.0.borrow_mut().iter_mut() {
            apply(slot);
        }
    }
}

struct World {
    models: TemplateSource,
    attach: RecordingAttach,
    material: RecordingMaterial,
}

impl World {
    fn new() -> Self {
        let mut models = TemplateSource::new();
        models.register("nose-mesh", &["cone"]);
        models.register(
            "tank-mesh",
            &["cap-lower", "wall", "cap-upper"],
        );
        models.register("mount-mesh", &["shroud"]);
        Self {
            models,
            attach: RecordingAttach::default(),
            material: RecordingMaterial::default(),
        }
    }

    fn collab(&mut self) -> SlotCollaborators<'_> {
        SlotCollaborators {
            models: &mut self.models,
            attach: &mut self.attach,
            material: &mut self.material,
        }
    }
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn check(name: &str, passed: bool, detail: String) -> TestResult {
    TestResult {
        name: name.to_string(),
        passed,
        detail,
    }
}

fn main() {
    let verbose = std::env::args().any(|a| a == "--verbose");
    println!("=== procstack Validation Harness ===\n");

    let mut results = Vec::new();

    // 1. Registry & catalog parsing
    results.extend(validate_registry(verbose));

    // 2. Compound height redistribution
    results.extend(validate_compound_scaler(verbose));

    // 3. Slot scaling and diameter matching
    results.extend(validate_slot_scaling(verbose));

    // 4. Full cascade propagation
    results.extend(validate_cascade(verbose));

    // 5. Color and persistence round trips
    results.extend(validate_round_trips(verbose));

    // 6. Symmetry broadcast
    results.extend(validate_broadcast(verbose));

    // 7. Definition validation sweep
    results.extend(validate_dirty_catalog(verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── 1. Registry ─────────────────────────────────────────────────────────

fn validate_registry(_verbose: bool) -> Vec<TestResult> {
    println!("--- Registry & Catalog ---");
    let mut results = Vec::new();

    // cross-check the raw document before the engine sees it
    let raw: serde_json::Value = match serde_json::from_str(CATALOG_JSON) {
        Ok(v) => v,
        Err(e) => {
            results.push(check("catalog_parse", false, format!("JSON error: {e}")));
            return results;
        }
    };
    let raw_models = raw["nodes"]
        .as_array()
        .map(|n| n.iter().filter(|m| m["name"] == "MODEL").count())
        .unwrap_or(0);
    results.push(check(
        "catalog_parse",
        raw_models == 4,
        format!("{raw_models} MODEL nodes in the raw document"),
    ));

    let mut registry = DefinitionRegistry::new();
    registry.load(CATALOG_JSON);

    results.push(check(
        "registry_dedups",
        registry.len() == 3,
        format!("{} definitions after duplicate skip", registry.len()),
    ));

    let first = registry.get("tank-compound");
    results.push(check(
        "registry_first_wins",
        first
            .as_ref()
            .is_some_and(|d| d.title == "Stretchable Tank"),
        format!(
            "duplicate name resolves to '{}'",
            first.map(|d| d.title.clone()).unwrap_or_default()
        ),
    ));

    let group = registry.get_many(&["nose-cone", "ghost", "nose-cone", "engine-mount"]);
    results.push(check(
        "registry_get_many",
        group.len() == 2 && group[0].name == "nose-cone",
        format!("group resolved to {} definitions", group.len()),
    ));

    registry.load("{}");
    results.push(check(
        "registry_load_idempotent",
        registry.len() == 3,
        "second load is a no-op".to_string(),
    ));

    results
}

// ── 2. Compound scaler ──────────────────────────────────────────────────

fn validate_compound_scaler(_verbose: bool) -> Vec<TestResult> {
    println!("--- Compound Scaler ---");
    let mut results = Vec::new();

    let segment = |name: &str, h: f32, scalable: bool, order: i32| CompoundSegment {
        name: name.to_string(),
        base_height: h,
        can_scale_height: scalable,
        order,
        offset: 0.0,
        scale_axis: Vec3::Y,
    };

    // cap/wall/cap stack: [1 static, 2 scalable, 1 static], Ht=8, Sh=1
    let segments = vec![
        segment("a", 1.0, false, 0),
        segment("b", 2.0, true, 1),
        segment("c", 1.0, false, 2),
    ];
    let placed = distribute_heights(&segments, 8.0, 1.0, 1.0);
    let total: f32 = placed.iter().map(|p| p.scaled_height).sum();
    results.push(check(
        "compound_redistributes",
        (placed[1].scale.y - 3.0).abs() < 1e-6 && (total - 8.0).abs() < 1e-6,
        format!("wall sv={}, stack total={total}", placed[1].scale.y),
    ));

    let all_static = vec![segment("a", 1.0, false, 0), segment("b", 3.0, false, 1)];
    let placed = distribute_heights(&all_static, 40.0, 2.0, 1.0);
    let total: f32 = placed.iter().map(|p| p.scaled_height).sum();
    results.push(check(
        "compound_all_static",
        (total - 8.0).abs() < 1e-6,
        format!("all-static stack ignores the target: total={total}"),
    ));

    let placed = distribute_heights(
        &[segment("zero", 0.0, true, 0)],
        5.0,
        1.5,
        1.0,
    );
    results.push(check(
        "compound_zero_scalable_base",
        (placed[0].scale.y - 1.5).abs() < 1e-6,
        "zero scalable base height falls back to Sh".to_string(),
    ));

    results
}

// ── 3. Slot scaling ─────────────────────────────────────────────────────

fn validate_slot_scaling(_verbose: bool) -> Vec<TestResult> {
    println!("--- Slot Scaling ---");
    let mut results = Vec::new();
    let mut world = World::new();
    let mut registry = DefinitionRegistry::new();
    registry.load(CATALOG_JSON);

    let tank = registry.get("tank-compound").expect("catalog loaded");
    let mut slot = ModelSlot::new("core", Orientation::Top, tank, &mut world.collab());

    // clamp property over a sweep of requested scales
    let mut clamped_ok = true;
    for h in [0.25f32, 0.5, 1.0, 2.0, 5.0] {
        for v_raw in [-10.0f32, 0.0, 0.1, 1.0, 7.0, 100.0] {
            slot.set_scale(h, v_raw, &mut world.collab());
            let min = h * slot.definition().min_vertical_scale_ratio;
            let max = h * slot.definition().max_vertical_scale_ratio;
            if slot.vertical_scale() < min - 1e-6 || slot.vertical_scale() > max + 1e-6 {
                clamped_ok = false;
            }
        }
    }
    results.push(check(
        "slot_scale_clamped",
        clamped_ok,
        "vertical scale stays inside the ratio band".to_string(),
    ));

    slot.set_scale_for_diameter(5.0, 0.0, &mut world.collab());
    results.push(check(
        "slot_diameter_scenario",
        (slot.horizontal_scale() - 2.0).abs() < 1e-6
            && (slot.current_diameter() - 5.0).abs() < 1e-6
            && (slot.current_height() - 8.0).abs() < 1e-6,
        format!(
            "d=5.0 → h={}, diameter={}, height={}",
            slot.horizontal_scale(),
            slot.current_diameter(),
            slot.current_height()
        ),
    ));

    // unknown selection must not break the slot
    slot.set_candidate_provider(Box::new(StaticCandidates(registry.all())));
    slot.select_definition("no-such-model", &mut world.collab());
    results.push(check(
        "slot_missing_name_falls_back",
        slot.definition().name == "nose-cone" && slot.tree().len() > 0,
        format!("fell back to '{}'", slot.definition().name),
    ));

    results
}

// ── 4. Cascade ──────────────────────────────────────────────────────────

fn validate_cascade(_verbose: bool) -> Vec<TestResult> {
    println!("--- Assembly Cascade ---");
    let mut results = Vec::new();
    let mut world = World::new();
    let mut registry = DefinitionRegistry::new();
    registry.load(CATALOG_JSON);

    let nose = ModelSlot::new(
        "nose",
        Orientation::Top,
        registry.get("nose-cone").expect("catalog loaded"),
        &mut world.collab(),
    );
    let core = ModelSlot::new(
        "core",
        Orientation::Top,
        registry.get("tank-compound").expect("catalog loaded"),
        &mut world.collab(),
    );
    let mount = ModelSlot::new(
        "mount",
        Orientation::Bottom,
        registry.get("engine-mount").expect("catalog loaded"),
        &mut world.collab(),
    );
    let mut cascade = AssemblyCascade::new(vec![nose, core, mount], 1);
    cascade.diameter = 5.0;
    cascade.update(&mut world.collab());

    let slots = cascade.slots();
    results.push(check(
        "cascade_diameter_chain",
        (slots[1].horizontal_scale() - 2.0).abs() < 1e-6
            && (slots[0].horizontal_scale() - 4.0).abs() < 1e-6,
        format!(
            "core h={}, nose h={}, mount h={}",
            slots[1].horizontal_scale(),
            slots[0].horizontal_scale(),
            slots[2].horizontal_scale()
        ),
    ));

    let total: f32 = slots.iter().map(|s| s.current_height()).sum();
    let contiguous = (slots[0].bottom_y() - slots[1].top_y()).abs() < 1e-4
        && (slots[1].bottom_y() - slots[2].top_y()).abs() < 1e-4;
    results.push(check(
        "cascade_stack_contiguous",
        contiguous && (slots[0].top_y() - total / 2.0).abs() < 1e-4,
        format!("total height {total}, top at {}", slots[0].top_y()),
    ));

    let interstage = world
        .attach
        .points
        .iter()
        .filter(|(n, _)| n.starts_with("interstage_"))
        .count();
    results.push(check(
        "cascade_interstage_points",
        interstage == 2,
        format!("{interstage} interstage points"),
    ));

    let stats = cascade.update_derived_stats();
    results.push(check(
        "cascade_stats_positive",
        stats.mass > 0.0 && stats.cost > 0.0 && stats.volume > 0.0,
        format!("mass={:.2} cost={:.0} volume={:.2}", stats.mass, stats.cost, stats.volume),
    ));

    results
}

// ── 5. Round trips ──────────────────────────────────────────────────────

fn validate_round_trips(_verbose: bool) -> Vec<TestResult> {
    println!("--- Round Trips ---");
    let mut results = Vec::new();

    let channels = vec![
        ColorChannel::new(0.125, 0.25, 0.5, 1.0, 0.0),
        ColorChannel::new(0.1234567, 1.0e-7, 0.9999999, 0.5, 3.25),
    ];
    let decoded = decode_channels(&encode_channels(&channels));
    results.push(check(
        "color_blob_exact",
        decoded.as_deref() == Some(channels.as_slice()),
        "decode(encode(x)) == x".to_string(),
    ));

    let mut world = World::new();
    let mut registry = DefinitionRegistry::new();
    registry.load(CATALOG_JSON);
    let mut slot = ModelSlot::new(
        "core",
        Orientation::Top,
        registry.get("tank-compound").expect("catalog loaded"),
        &mut world.collab(),
    );
    slot.apply_texture_set("striped", true, &mut world.collab());
    results.push(check(
        "material_received_presets",
        world
            .material
            .applied
            .last()
            .is_some_and(|(name, channels)| name == "striped" && channels.len() == 2),
        "texture set handed to the material collaborator".to_string(),
    ));

    let text = persist::encode_slot(&slot);
    let state = persist::decode_state(&text);
    results.push(check(
        "persist_state_round_trip",
        state.as_ref().is_some_and(|s| {
            s.definition_name == "tank-compound" && s.texture_set_name == "striped"
        }),
        format!("state '{text}'"),
    ));

    results
}

// ── 6. Broadcast ────────────────────────────────────────────────────────

fn validate_broadcast(_verbose: bool) -> Vec<TestResult> {
    println!("--- Symmetry Broadcast ---");
    let mut results = Vec::new();
    let mut world = World::new();
    let mut registry = DefinitionRegistry::new();
    registry.load(CATALOG_JSON);
    let def = registry.get("tank-compound").expect("catalog loaded");

    let make = |world: &mut World| {
        ModelSlot::new("core", Orientation::Top, def.clone(), &mut world.collab())
    };
    let pool = Rc::new(RefCell::new(vec![make(&mut world), make(&mut world)]));
    pool.borrow_mut()[0].set_scale(3.0, 5.0, &mut world.collab());

    let mut lead = make(&mut world);
    lead.set_symmetry_resolver(Box::new(SharedResolver(pool.clone())));
    let action = SlotAction::SetScaleForDiameter {
        diameter: 3.75,
        aspect_bias: 0.5,
    };
    lead.broadcast(&action, &mut world.collab());

    let mut reference = make(&mut world);
    reference.apply(&action, &mut world.collab());

    let all_match = pool.borrow().iter().all(|s| {
        (s.horizontal_scale() - reference.horizontal_scale()).abs() < 1e-6
            && (s.vertical_scale() - reference.vertical_scale()).abs() < 1e-6
    });
    results.push(check(
        "broadcast_counterparts_converge",
        all_match && (lead.horizontal_scale() - reference.horizontal_scale()).abs() < 1e-6,
        format!(
            "all slots at h={}, v={}",
            reference.horizontal_scale(),
            reference.vertical_scale()
        ),
    ));

    results
}

// ── 7. Validation sweep ─────────────────────────────────────────────────

fn validate_dirty_catalog(verbose: bool) -> Vec<TestResult> {
    println!("--- Validation Sweep ---");
    let mut results = Vec::new();
    let mut registry = DefinitionRegistry::new();
    registry.load(DIRTY_CATALOG_JSON);

    let findings = validate_definitions(&registry.all());
    if verbose {
        for f in &findings {
            println!("    [{:?}] {}: {}", f.severity, f.category, f.message);
        }
    }
    let errors = findings
        .iter()
        .filter(|f| f.severity == Severity::Error)
        .count();
    results.push(check(
        "dirty_catalog_flagged",
        errors >= 2,
        format!("{} findings, {errors} errors", findings.len()),
    ));

    results
}
