//! Tag collection: ancestor scopes first, then own tags, with source
//! references expanded in place.

use crate::catalog::{Catalog, ContextId, ScopeId};
use crate::facet::{FacetTag, TagKind};

/// The full ordered tag chain of a scope: its ancestors' chains (root
/// first), then its own tags. Source references are replaced by the
/// referenced scopes' chains.
///
/// Returns an empty list for an id `catalog` did not issue.
pub fn scope_tags(catalog: &Catalog, scope: ScopeId) -> Vec<FacetTag> {
    let mut out = Vec::new();
    if catalog.scope(scope).is_some() {
        collect_scope(catalog, scope, &mut out);
    }
    out
}

/// Tags visible to a property: the declaring context's chain followed by
/// the property's own tags, source references expanded.
///
/// Returns an empty list for an unknown property or context.
pub fn property_tags(catalog: &Catalog, context: ContextId, property: &str) -> Vec<FacetTag> {
    let Some(descriptor) = catalog.context(context) else {
        return Vec::new();
    };
    let Some(prop) = descriptor.property(property) else {
        return Vec::new();
    };
    let mut out = scope_tags(catalog, descriptor.scope);
    splice(catalog, &prop.tags, &mut out);
    tracing::debug!(
        context = %descriptor.name,
        property,
        tags = out.len(),
        "collected property tags"
    );
    out
}

fn collect_scope(catalog: &Catalog, id: ScopeId, out: &mut Vec<FacetTag>) {
    let scope = catalog.scope_at(id);
    if let Some(parent) = scope.parent {
        collect_scope(catalog, parent, out);
    }
    splice(catalog, &scope.tags, out);
}

// Scope cycles are rejected when the catalog is built, so this terminates.
fn splice(catalog: &Catalog, tags: &[FacetTag], out: &mut Vec<FacetTag>) {
    for tag in tags {
        match &tag.kind {
            TagKind::Source { scopes } => {
                for scope in scopes {
                    collect_scope(catalog, *scope, out);
                }
            }
            _ => out.push(tag.clone()),
        }
    }
}
