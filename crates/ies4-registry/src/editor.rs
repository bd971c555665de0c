//! Upsert, removal and verification against a region document.
//!
//! Each public operation is one read-modify-write cycle: load, mutate in
//! memory, back up, save. The `apply_*` functions hold the algorithms and
//! work on an already loaded [`RegionDocument`].

use crate::backup;
use crate::config::RegistryConfig;
use crate::document::RegionDocument;
use crate::error::{RegistryError, Result};
use crate::kind::{EntityDefinition, EntityKind};
use crate::matcher::IdentityPredicate;
use crate::model::{record_id, EntityRecord, TypeDefinition};
use crate::paths::RegionContext;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Result of an upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpsertOutcome {
    pub id: String,
    /// An existing record was replaced (its id kept).
    pub replaced: bool,
    /// The type definition was appended by this call.
    pub type_created: bool,
    /// The replaced record's previous type, dropped because nothing
    /// references it any more.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_pruned: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<PathBuf>,
}

/// Result of a removal. `removed == 0` means there was nothing to do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemovalOutcome {
    pub removed: usize,
    pub removed_ids: Vec<String>,
    pub type_pruned: bool,
    /// The region file did not exist; nothing was written.
    pub document_missing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<PathBuf>,
}

/// Diagnostic re-read after a write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub collection_sizes: BTreeMap<String, usize>,
    /// Records in the kind's collection that still match the identity.
    pub residual_ids: Vec<String>,
    pub type_present: bool,
}

impl VerificationReport {
    pub fn residual_matches(&self) -> usize {
        self.residual_ids.len()
    }
}

/// What to write into the document for one upsert.
#[derive(Debug, Clone, Copy)]
pub struct UpsertRequest<'a> {
    pub kind: &'a EntityKind,
    pub slug: &'a str,
    pub record: &'a EntityRecord,
    pub type_definition: &'a TypeDefinition,
}

/// Write policy for the read-modify-write cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    pub backup: bool,
    pub guard_concurrent_writes: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            backup: true,
            guard_concurrent_writes: true,
        }
    }
}

impl From<&RegistryConfig> for WriteOptions {
    fn from(config: &RegistryConfig) -> Self {
        Self {
            backup: config.backup,
            guard_concurrent_writes: config.guard_concurrent_writes,
        }
    }
}

// ============================================================================
// In-memory algorithms
// ============================================================================

/// Insert or replace `request.record` in `doc`.
pub fn apply_upsert<P>(
    doc: &mut RegionDocument,
    region: &str,
    request: UpsertRequest<'_>,
    identity: &P,
) -> Result<UpsertOutcome>
where
    P: IdentityPredicate + ?Sized,
{
    let kind = request.kind;
    doc.collection_mut(&kind.type_collection)?;
    let records = doc.collection_mut(&kind.collection)?;

    let existing = records.iter().position(|r| identity.matches(r));
    let (id, replaced, previous_type) = match existing {
        Some(idx) => {
            let id = record_id(&records[idx])
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| next_free_id(records, kind, request.slug, region));
            let previous_type = kind.type_of(&records[idx]).map(str::to_string);
            let mut record = request.record.clone();
            record.id = id.clone();
            records[idx] = record.to_value()?;
            (id, true, previous_type)
        }
        None => {
            let id = next_free_id(records, kind, request.slug, region);
            let mut record = request.record.clone();
            record.id = id.clone();
            records.push(record.to_value()?);
            (id, false, None)
        }
    };

    let type_id = request.type_definition.id.as_str();
    let types = doc.collection_mut(&kind.type_collection)?;
    let type_created = if types.iter().any(|t| record_id(t) == Some(type_id)) {
        false
    } else {
        types.push(serde_json::to_value(request.type_definition)?);
        true
    };

    // A retyped record may leave its old type with no references.
    let mut type_pruned = None;
    if let Some(old) = previous_type.filter(|old| old != type_id) {
        let still_referenced = doc
            .collection(&kind.collection)?
            .iter()
            .any(|r| kind.references(r, &old));
        if !still_referenced {
            let types = doc.collection_mut(&kind.type_collection)?;
            let before = types.len();
            types.retain(|t| record_id(t) != Some(old.as_str()));
            if types.len() < before {
                type_pruned = Some(old);
            }
        }
    }

    tracing::info!(
        collection = %kind.collection,
        id = %id,
        replaced,
        type_created,
        type_pruned = type_pruned.as_deref(),
        "upserted entity"
    );
    Ok(UpsertOutcome {
        id,
        replaced,
        type_created,
        type_pruned,
        backup: None,
    })
}

/// Lowest sequence whose id is not already taken in `records`.
fn next_free_id(records: &[Value], kind: &EntityKind, slug: &str, region: &str) -> String {
    (1..)
        .map(|seq| kind.record_id(slug, region, seq))
        .find(|candidate| !records.iter().any(|r| record_id(r) == Some(candidate.as_str())))
        .unwrap_or_else(|| kind.record_id(slug, region, 1))
}

/// Drop every record matching `identity`, then prune `type_id` if nothing in
/// the collection references it any more.
pub fn apply_removal<P>(
    doc: &mut RegionDocument,
    kind: &EntityKind,
    identity: &P,
    type_id: &str,
) -> Result<RemovalOutcome>
where
    P: IdentityPredicate + ?Sized,
{
    let Some(records) = doc.existing_collection_mut(&kind.collection)? else {
        return Ok(RemovalOutcome::default());
    };

    let before = records.len();
    let mut removed_ids = Vec::new();
    records.retain(|r| {
        if identity.matches(r) {
            removed_ids.push(record_id(r).unwrap_or_default().to_string());
            false
        } else {
            true
        }
    });
    let removed = before - records.len();

    let mut type_pruned = false;
    if removed > 0 {
        let still_referenced = records.iter().any(|r| kind.references(r, type_id));
        if !still_referenced {
            if let Some(types) = doc.existing_collection_mut(&kind.type_collection)? {
                let before = types.len();
                types.retain(|t| record_id(t) != Some(type_id));
                type_pruned = types.len() < before;
            }
        }
    }

    tracing::info!(
        collection = %kind.collection,
        removed,
        type_pruned,
        "removed matching entities"
    );
    Ok(RemovalOutcome {
        removed,
        removed_ids,
        type_pruned,
        document_missing: false,
        backup: None,
    })
}

/// Sizes of every array collection plus residual matches; never mutates.
pub fn inspect_residuals<P>(
    doc: &RegionDocument,
    kind: &EntityKind,
    identity: &P,
    type_id: &str,
) -> Result<VerificationReport>
where
    P: IdentityPredicate + ?Sized,
{
    let collection_sizes = doc
        .root()
        .iter()
        .filter_map(|(k, v)| v.as_array().map(|a| (k.clone(), a.len())))
        .collect();
    let residual_ids = doc
        .collection(&kind.collection)?
        .iter()
        .filter(|r| identity.matches(r))
        .map(|r| record_id(r).unwrap_or_default().to_string())
        .collect();
    let type_present = doc
        .collection(&kind.type_collection)?
        .iter()
        .any(|t| record_id(t) == Some(type_id));
    Ok(VerificationReport {
        collection_sizes,
        residual_ids,
        type_present,
    })
}

// ============================================================================
// Read-modify-write operations
// ============================================================================

/// Runs edits against region files with a fixed write policy.
#[derive(Debug, Clone, Default)]
pub struct RegistryEditor {
    options: WriteOptions,
}

impl RegistryEditor {
    pub fn new(options: WriteOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> WriteOptions {
        self.options
    }

    /// Upsert into an existing region file. A missing file is fatal here.
    pub fn upsert<P>(
        &self,
        ctx: &RegionContext,
        request: UpsertRequest<'_>,
        identity: &P,
    ) -> Result<UpsertOutcome>
    where
        P: IdentityPredicate + ?Sized,
    {
        let mut doc = RegionDocument::load(&ctx.path)?;
        let mut outcome = apply_upsert(&mut doc, &ctx.code, request, identity)?;
        outcome.backup = self.backup(ctx);
        doc.save(self.options.guard_concurrent_writes)?;
        Ok(outcome)
    }

    /// Remove every match. A missing region file counts as zero removed.
    pub fn remove<P>(
        &self,
        ctx: &RegionContext,
        kind: &EntityKind,
        identity: &P,
        type_id: &str,
    ) -> Result<RemovalOutcome>
    where
        P: IdentityPredicate + ?Sized,
    {
        let mut doc = match RegionDocument::load(&ctx.path) {
            Ok(doc) => doc,
            Err(RegistryError::PathNotFound { path }) => {
                tracing::info!(path = %path.display(), "region file absent; nothing to remove");
                return Ok(RemovalOutcome {
                    document_missing: true,
                    ..RemovalOutcome::default()
                });
            }
            Err(e) => return Err(e),
        };
        let mut outcome = apply_removal(&mut doc, kind, identity, type_id)?;
        if outcome.removed > 0 {
            outcome.backup = self.backup(ctx);
        }
        doc.save(self.options.guard_concurrent_writes)?;
        Ok(outcome)
    }

    /// Re-read the file and report what is there now.
    pub fn verify<P>(
        &self,
        ctx: &RegionContext,
        kind: &EntityKind,
        identity: &P,
        type_id: &str,
    ) -> Result<VerificationReport>
    where
        P: IdentityPredicate + ?Sized,
    {
        let doc = RegionDocument::load(&ctx.path)?;
        inspect_residuals(&doc, kind, identity, type_id)
    }

    /// Upsert an entity definition.
    pub fn upsert_definition(
        &self,
        ctx: &RegionContext,
        def: &EntityDefinition,
    ) -> Result<UpsertOutcome> {
        let kind = def.kind()?;
        let record = def.build_record(&kind);
        let request = UpsertRequest {
            kind: &kind,
            slug: &def.slug,
            record: &record,
            type_definition: &def.type_definition,
        };
        self.upsert(ctx, request, &def.matcher())
    }

    /// Remove an entity definition; the orphan check uses the same kind.
    pub fn remove_definition(
        &self,
        ctx: &RegionContext,
        def: &EntityDefinition,
    ) -> Result<RemovalOutcome> {
        let kind = def.kind()?;
        self.remove(ctx, &kind, &def.matcher(), &def.type_definition.id)
    }

    pub fn verify_definition(
        &self,
        ctx: &RegionContext,
        def: &EntityDefinition,
    ) -> Result<VerificationReport> {
        let kind = def.kind()?;
        self.verify(ctx, &kind, &def.matcher(), &def.type_definition.id)
    }

    fn backup(&self, ctx: &RegionContext) -> Option<PathBuf> {
        if !self.options.backup {
            return None;
        }
        match backup::snapshot(&ctx.path) {
            Ok(path) => path,
            Err(err) => {
                tracing::warn!(error = %err, "continuing without backup");
                None
            }
        }
    }
}
