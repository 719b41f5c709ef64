// crates/transfer-mesh-config/src/lib.rs
// ============================================================================
// Module: Transfer Mesh Config Library
// Description: Canonical agent configuration model and validation.
// Purpose: Single source of truth for transfer-mesh.toml semantics.
// Dependencies: transfer-mesh-core, transfer-mesh-store-sqlite, serde, toml, url
// ============================================================================

//! ## Overview
//! `transfer-mesh-config` defines the configuration model for a transfer
//! mesh agent. Loading is strict and fail-closed: unknown keys, oversized
//! files, and out-of-range values are rejected before any runtime component
//! is built.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
