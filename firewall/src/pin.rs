use std::{
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::debug;

/// Create the directories a pin path lives in.
///
/// Returns the directories that did not exist before, deepest first, so they
/// can be handed to [`remove_dirs`] once the pin is gone. Nothing is created for
/// the pin itself; refusing an occupied path is left to the kernel.
pub fn prepare(path: &Path) -> Result<Vec<PathBuf>> {
    let missing: Vec<PathBuf> = path
        .ancestors()
        .skip(1)
        .filter(|dir| !dir.as_os_str().is_empty())
        .take_while(|dir| !dir.exists())
        .map(Path::to_path_buf)
        .collect();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    Ok(missing)
}

/// Remove a pinned object. The kernel frees the map once the last reference
/// (pin or descriptor) is gone.
pub fn unpin(path: &Path) -> io::Result<()> {
    fs::remove_file(path)
}

/// Remove directories created by [`prepare`], stopping at the first one that
/// is not empty.
pub fn remove_dirs(dirs: &[PathBuf]) {
    for dir in dirs {
        if let Err(e) = fs::remove_dir(dir) {
            debug!("keeping {}: {}", dir.display(), e);
            return;
        }
    }
}

#[cfg(test)]
mod test {
    use std::{fs, io};

    use super::{prepare, remove_dirs, unpin};

    #[test]
    fn test_prepare_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("firewall").join("maps").join("pkt_count");

        let created = prepare(&path).unwrap();
        assert!(path.parent().unwrap().is_dir());
        assert!(!path.exists());
        assert_eq!(
            created,
            vec![
                dir.path().join("firewall").join("maps"),
                dir.path().join("firewall"),
            ]
        );

        remove_dirs(&created);
        assert!(!dir.path().join("firewall").exists());
        assert!(dir.path().is_dir());
    }

    #[test]
    fn test_prepare_existing_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pkt_count");

        assert!(prepare(&path).unwrap().is_empty());
    }

    #[test]
    fn test_remove_dirs_keeps_foreign_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("firewall").join("pkt_count");
        let created = prepare(&path).unwrap();
        fs::write(dir.path().join("firewall").join("other"), b"").unwrap();

        remove_dirs(&created);
        assert!(dir.path().join("firewall").join("other").exists());
    }

    #[test]
    fn test_unpin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pkt_count");
        fs::write(&path, b"").unwrap();

        unpin(&path).unwrap();
        assert!(!path.exists());

        let err = unpin(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
