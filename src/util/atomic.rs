use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Atomically replaces `dst` with `contents` using write-to-temp-then-rename.
///
/// The temp file lives next to the destination (same filesystem, so the
/// rename is atomic on POSIX), is synced to disk before the rename, and is
/// removed again on any failure. `dst` is therefore either left exactly as it
/// was or holds the complete new contents, never a truncated mix.
///
/// Missing parent directories are created first.
pub fn write_atomic(dst: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    // SEC-009: Randomized temp filename to prevent TOCTOU race conditions.
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = dst.with_extension(format!("tmp.{:016x}", random_suffix));

    let mut temp_file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true) // Fails atomically if file exists (prevents symlink race)
        .open(&temp_path)?;

    let written = temp_file
        .write_all(contents)
        .and_then(|()| temp_file.sync_all());
    drop(temp_file);

    if let Err(e) = written {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e);
    }

    // rename replaces an existing dst in one step on every platform
    std::fs::rename(&temp_path, dst).inspect_err(|_| {
        let _ = std::fs::remove_file(&temp_path);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("topstory_atomic_{}_{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let dir = scratch_dir("parents");
        let path = dir.join("nested").join("feed.xml");

        write_atomic(&path, b"<rss/>").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"<rss/>");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_write_replaces_existing_and_leaves_no_temp_files() {
        let dir = scratch_dir("replace");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("state.json");
        std::fs::write(&path, "old").unwrap();

        write_atomic(&path, b"new contents").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new contents");

        let leftovers: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty(), "temp files left behind: {:?}", leftovers);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_failed_write_leaves_destination_untouched() {
        let dir = scratch_dir("failure");
        std::fs::create_dir_all(&dir).unwrap();
        // A directory at the destination makes the final rename fail.
        let path = dir.join("feed.xml");
        std::fs::create_dir_all(path.join("occupied")).unwrap();

        assert!(write_atomic(&path, b"data").is_err());
        assert!(path.join("occupied").is_dir());

        std::fs::remove_dir_all(&dir).ok();
    }
}
