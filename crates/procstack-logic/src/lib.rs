//! Parametric model-composition and scaling engine for procstack.
//!
//! This crate contains all modeling logic that is independent of any
//! engine, renderer, or storage backend. A procedural assembly — a
//! body segment composed of interchangeable nose / core / mount
//! pieces — is reshaped at runtime by a user-chosen diameter, length
//! and vertical-scale bias, while every piece's connecting faces stay
//! diameter-matched and its derived mass/cost/volume stays consistent.
//! The host (rendering, UI, persistence) talks to the engine through
//! small collaborator traits; everything here is synchronous,
//! single-threaded, and deterministic.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`attach`] | Attach-point templates, inversion rule, placement offsets |
//! | [`cascade`] | Diameter/height constraint propagation across chained slots |
//! | [`colors`] | RGBA(+glow) mask channels and their text blob codec |
//! | [`compound`] | Height redistribution across a definition's segments |
//! | [`config`] | Hierarchical key/value config tree with typed getters |
//! | [`definition`] | Immutable model definitions parsed from config nodes |
//! | [`diag`] | Error taxonomy and the logged-fallback side channel |
//! | [`persist`] | One-string-per-slot selection state codec |
//! | [`registry`] | Parse-once definition cache with name/group lookup |
//! | [`scene`] | Owned spatial-node tree and asset cloning |
//! | [`slot`] | Per-slot runtime state machine (selection, scale, attach) |
//! | [`validate`] | Definition sanity sweep producing finding lists |

pub mod attach;
pub mod cascade;
pub mod colors;
pub mod compound;
pub mod config;
pub mod definition;
pub mod diag;
pub mod persist;
pub mod registry;
pub mod scene;
pub mod slot;
pub mod validate;
