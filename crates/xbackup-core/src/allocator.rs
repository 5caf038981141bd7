//! Sequential name allocation inside a directory.
//!
//! Names have the form `<prefix><N>`. The next name is one past the highest
//! `N` already present among the directory's immediate children, or
//! `<prefix>0` if there is none. Allocation is a plain directory scan with no
//! locking: it is collision-free for sequential use from one process only.

use std::path::Path;

use tracing::debug;

use crate::Result;

/// Default prefix for top-level backup directories
pub const BACKUP_PREFIX: &str = "backup";
/// Prefix for per-backup prepare and merge logs
pub const PREPARE_PREFIX: &str = "prepare";
/// Prefix for per-backup restore logs
pub const RESTORE_PREFIX: &str = "restore";

/// Parse the numeric suffix of `name` if it is exactly `<prefix><digits>`.
pub fn sequence_number(name: &str, prefix: &str) -> Option<u64> {
    let suffix = name.strip_prefix(prefix)?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

/// Compute the next free name from an iterator of existing names.
pub fn next_name<'a, I>(existing: I, prefix: &str) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let next = existing
        .into_iter()
        .filter_map(|name| sequence_number(name, prefix))
        .max()
        .map_or(0, |max| max + 1);
    format!("{}{}", prefix, next)
}

/// Allocate the next `<prefix><N>` name among the children of `root`.
///
/// Both files and directories count. A missing `root` is treated as empty.
pub async fn allocate_name(root: &Path, prefix: &str) -> Result<String> {
    let mut names = Vec::new();

    match tokio::fs::read_dir(root).await {
        Ok(mut entries) => {
            while let Some(entry) = entries.next_entry().await? {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let name = next_name(names.iter().map(String::as_str), prefix);
    debug!("Allocated {} in {}", name, root.display());
    Ok(name)
}
