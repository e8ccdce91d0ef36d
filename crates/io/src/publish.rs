// Atomic output: write into a temp file next to the destination, then persist.

use std::path::Path;

use crate::error::IoError;

/// Run `write` against a temp file in `dest`'s directory and move the result
/// onto `dest`. On any failure the temp file is removed and `dest` is left as
/// it was.
pub fn write_atomic<F>(dest: &Path, write: F) -> Result<(), IoError>
where
    F: FnOnce(&Path) -> Result<(), IoError>,
{
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::env::current_dir().map_err(|e| IoError::write(dest, e))?,
    };
    std::fs::create_dir_all(&dir).map_err(|e| IoError::write(dest, e))?;

    let tmp = tempfile::Builder::new()
        .prefix(".racematch-")
        .suffix(".tmp")
        .tempfile_in(&dir)
        .map_err(|e| IoError::write(dest, e))?;

    write(tmp.path())?;

    tmp.persist(dest).map_err(|e| IoError::persist(dest, e.error))?;
    log::debug!("wrote {}", dest.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn replaces_destination() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("out.txt");
        fs::write(&dest, "old").unwrap();

        write_atomic(&dest, |tmp| fs::write(tmp, "new").map_err(|e| IoError::write(tmp, e))).unwrap();

        assert_eq!(fs::read_to_string(&dest).unwrap(), "new");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn failure_leaves_no_partial_file() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("out.txt");
        fs::write(&dest, "old").unwrap();

        let err = write_atomic(&dest, |tmp| {
            fs::write(tmp, "half").unwrap();
            Err(IoError::write(tmp, "boom"))
        })
        .unwrap_err();

        assert!(matches!(err, IoError::Write { .. }));
        assert_eq!(fs::read_to_string(&dest).unwrap(), "old");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn creates_missing_directory() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("nested/out/report.txt");
        write_atomic(&dest, |tmp| fs::write(tmp, "x").map_err(|e| IoError::write(tmp, e))).unwrap();
        assert!(dest.exists());
    }
}
