use thiserror::Error;

use crate::lockfile::LockConflict;
use crate::tree::ImportCycle;

/// Errors the manifest loader can raise. These are the library-side members
/// of `spec.md` §7's error taxonomy; the binary crate wraps them into the
/// full `JiriError` aggregate and attaches `miette::Diagnostic` codes.
#[derive(Debug, Error)]
pub enum LoaderError<E: std::error::Error + 'static> {
    #[error("malformed manifest XML in {file}: {source}")]
    ManifestParse {
        file: String,
        #[source]
        source: quick_xml::DeError,
    },

    #[error(transparent)]
    Cycle(#[from] ImportCycle),

    #[error(
        "import {name} is required with conflicting refs by {parent_a} ({ref_a}) and {parent_b} ({ref_b})"
    )]
    ImportConflict {
        name: String,
        parent_a: String,
        ref_a: String,
        parent_b: String,
        ref_b: String,
    },

    #[error(transparent)]
    Lock(#[from] LockConflict),

    #[error("overrides are only allowed in the top-level manifest, found in {file}")]
    NonRootOverride { file: String },

    #[error("project {name} declared twice with different content (remote {remote})")]
    DuplicateProject { name: String, remote: String },

    #[error("source error: {0}")]
    Source(#[source] E),
}
