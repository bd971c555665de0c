//! IES4 Entity Registry
//!
//! Edits per-region IES4 JSON documents. Each document maps collection names
//! (`vehicles`, `aircraft`, `militaryUnits`, ...) to arrays of records, with
//! sibling `*Types` collections holding shared type definitions.
//!
//! ```text
//!   EntityDefinition ──► IdentityMatcher ─┐
//!         │                               ▼
//!   RegistryConfig ──► RegionContext ──► RegistryEditor ──► RegionDocument
//!         │                               │                    (in place)
//!   PathResolver ─────────┘               └─► backup::snapshot
//! ```
//!
//! ## Guarantees
//!
//! - **Idempotent upsert**: re-adding the same logical entity replaces it and
//!   keeps its id.
//! - **Orphan pruning**: a type definition is removed exactly when the last
//!   record referencing it is removed.
//! - **Lossless round trip**: unknown keys are written back verbatim.
//! - **Single writer**: a save is refused if the file changed since it was
//!   loaded (unless disabled in [`RegistryConfig`]).

pub mod backup;
pub mod config;
pub mod document;
pub mod editor;
pub mod error;
pub mod inspect;
pub mod kind;
pub mod matcher;
pub mod model;
pub mod paths;


pub use config::{RegionEntry, RegistryConfig};
pub use document::RegionDocument;
pub use editor::{
    apply_removal, apply_upsert, inspect_residuals, RegistryEditor, RemovalOutcome,
    UpsertOutcome, UpsertRequest, VerificationReport, WriteOptions,
};
pub use error::RegistryError;
pub use kind::{EntityDefinition, EntityKind, KindRef, MatchSpec};
pub use matcher::{IdentityMatcher, IdentityPredicate};
pub use model::{EntityName, EntityRecord, Identifier, TemporalState, TypeDefinition};
pub use paths::{PathResolver, RegionContext};
