// Stable video identifiers using BLAKE3
//
// Ids must survive re-scans of an unchanged tree, so they are derived from
// the file path or source URL, never from file contents or scan order.

use crate::constants::VIDEO_ID_LEN;

/// Derive a stable id from a path or URL string.
pub fn stable_id(input: &str) -> String {
    let hash = blake3::hash(input.as_bytes());
    hash.to_hex().as_str()[..VIDEO_ID_LEN].to_string()
}

/// Derive a stable id scoped to an owning document.
///
/// Used for annotation records: the same source file re-merged must
/// reproduce the same ids, and two documents referencing the same URL must
/// not collide within one catalog.
pub fn scoped_id(scope: &str, identity: &str) -> String {
    stable_id(&format!("{}:{}", scope, identity))
}
