//! Mount point detection.
//!
//! [`MountChecker`] is the predicate the provisioner uses to tell whether a
//! volume directory is currently mounted.  [`ProcMounts`] answers it from
//! `/proc/self/mounts`.

use std::io;
use std::path::Path;

use async_trait::async_trait;

const PROC_MOUNTS: &str = "/proc/self/mounts";

/// Answers whether a path is currently the attachment point of a mount.
#[async_trait]
pub trait MountChecker: Send + Sync {
    /// Return `Ok(true)` if `path` is a mount point.
    ///
    /// A path that does not exist yields an error of kind
    /// [`io::ErrorKind::NotFound`]; callers decide whether that is fatal.
    async fn is_mount_point(&self, path: &Path) -> io::Result<bool>;
}

/// [`MountChecker`] backed by the kernel's mount table.
#[derive(Debug, Clone, Default)]
pub struct ProcMounts;

#[async_trait]
impl MountChecker for ProcMounts {
    async fn is_mount_point(&self, path: &Path) -> io::Result<bool> {
        // Surfaces NotFound and permission errors for the path itself.
        tokio::fs::metadata(path).await?;
        // The kernel lists absolute paths with symlinks resolved.
        let path = tokio::fs::canonicalize(path).await?;

        let contents = tokio::fs::read_to_string(PROC_MOUNTS).await?;
        Ok(mount_table_contains(&contents, &path))
    }
}

/// Return `true` if any entry of a `/proc/self/mounts` style table has
/// `path` as its mount point.
fn mount_table_contains(table: &str, path: &Path) -> bool {
    let Some(wanted) = path.to_str() else {
        return false;
    };
    let wanted = wanted.trim_end_matches('/');
    let wanted = if wanted.is_empty() { "/" } else { wanted };

    // Format: <device> <mountpoint> <fstype> <options> <dump> <pass>
    table
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .any(|mnt| unescape_mount_field(mnt) == wanted)
}

/// Decode the octal escapes the kernel uses for whitespace and backslashes
/// in mount table fields (`\040`, `\011`, `\012`, `\134`).
fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && i + 3 < bytes.len()
            && bytes[i + 1..=i + 3].iter().all(|b| (b'0'..=b'7').contains(b))
        {
            let value = (bytes[i + 1] - b'0') as u32 * 64
                + (bytes[i + 2] - b'0') as u32 * 8
                + (bytes[i + 3] - b'0') as u32;
            if let Ok(b) = u8::try_from(value) {
                out.push(b);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
