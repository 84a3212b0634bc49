//! Opaque references correlating declared entities and columns with their
//! physical tables and columns across renames.
//!
//! A reference is written into the schema document once and stored as the
//! table or column comment in MySQL. Renaming an entity or a column keeps
//! the reference, which is how the reconciler recognises the rename.

use rand::Rng;
use std::collections::HashSet;

use crate::ir::SchemaDocument;

pub const REFERENCE_LEN: usize = 8;

/// Generate a short random reference. Uniqueness is best-effort only;
/// [`allocate_references`] re-draws on collision within a document.
pub fn generate_reference() -> String {
    format!("{:08x}", rand::thread_rng().gen::<u32>())
}

fn fresh_reference(taken: &mut HashSet<String>) -> String {
    loop {
        let candidate = generate_reference();
        if taken.insert(candidate.clone()) {
            return candidate;
        }
    }
}

/// Give every entity and column without a reference a new one.
///
/// Existing references are never touched, so running this twice is a no-op
/// the second time. Returns the number of references allocated and marks
/// the document dirty when it is non-zero.
pub fn allocate_references(doc: &mut SchemaDocument) -> usize {
    let mut taken: HashSet<String> = HashSet::new();
    for (_, _, entity) in doc.entities() {
        if let Some(r) = entity.reference() {
            taken.insert(r.to_string());
        }
        for column in entity.columns.values() {
            if let Some(r) = column.reference() {
                taken.insert(r.to_string());
            }
        }
    }

    let mut allocated = 0;
    for entities in doc.bundles.values_mut() {
        for entity in entities.values_mut() {
            if entity.reference().is_none() {
                entity.set_reference(fresh_reference(&mut taken));
                allocated += 1;
            }
            for column in entity.columns.values_mut() {
                if column.reference().is_none() {
                    column.reference = Some(fresh_reference(&mut taken));
                    allocated += 1;
                }
            }
        }
    }

    if allocated > 0 {
        tracing::debug!(allocated, "allocated schema references");
        doc.dirty = true;
    }
    allocated
}

/// Strip every reference from the document. Entity `_params` left empty
/// are removed. Returns the number of references removed.
pub fn remove_references(doc: &mut SchemaDocument) -> usize {
    let mut removed = 0;
    for entities in doc.bundles.values_mut() {
        for entity in entities.values_mut() {
            if let Some(params) = entity.params.as_mut() {
                if params.reference.take().is_some() {
                    removed += 1;
                }
                if params.is_empty() {
                    entity.params = None;
                }
            }
            for column in entity.columns.values_mut() {
                if column.reference.take().is_some() {
                    removed += 1;
                }
            }
        }
    }
    if removed > 0 {
        doc.dirty = true;
    }
    removed
}

/// References declared more than once: table references across the whole
/// document, column references within their table.
pub fn duplicate_references(doc: &SchemaDocument) -> Vec<String> {
    let mut errors = Vec::new();
    let mut table_refs: HashSet<&str> = HashSet::new();
    for (bundle, name, entity) in doc.entities() {
        if let Some(r) = entity.reference() {
            if !table_refs.insert(r) {
                errors.push(format!(
                    "Entity {}.{} reuses table reference {}",
                    bundle, name, r
                ));
            }
        }
        let mut column_refs: HashSet<&str> = HashSet::new();
        for (column, spec) in &entity.columns {
            if let Some(r) = spec.reference() {
                if !column_refs.insert(r) {
                    errors.push(format!(
                        "Column {}.{}.{} reuses column reference {}",
                        bundle, name, column, r
                    ));
                }
            }
        }
    }
    errors
}
