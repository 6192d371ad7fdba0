use std::fs;
use std::path::{Path, PathBuf};

use crate::models::error::SessionError;
use crate::storage::metadata::metadata_path;

const RECORDING_EXTENSIONS: [&str; 2] = ["wav", "m4a"];

fn is_recording(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| RECORDING_EXTENSIONS.iter().any(|r| e.eq_ignore_ascii_case(r)))
}

/// Recordings (`.wav`/`.m4a`) in `dir`, sorted by path. A missing directory is empty.
pub fn list_recordings(dir: &Path) -> Result<Vec<PathBuf>, SessionError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir)
        .map_err(|e| SessionError::FileIoFailure(format!("failed to list {}: {}", dir.display(), e)))?;

    let mut recordings = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if is_recording(&path) {
            recordings.push(path);
        }
    }
    recordings.sort();
    Ok(recordings)
}

/// Delete one recording and its metadata sidecar, if any.
pub fn delete_recording(path: &Path) -> Result<(), SessionError> {
    fs::remove_file(path)
        .map_err(|e| SessionError::FileIoFailure(format!("failed to delete {}: {}", path.display(), e)))?;
    let sidecar = metadata_path(path);
    if sidecar.exists() {
        if let Err(e) = fs::remove_file(&sidecar) {
            log::warn!("Failed to delete metadata {}: {}", sidecar.display(), e);
        }
    }
    Ok(())
}

/// Delete every recording in `dir`. Returns how many were removed.
pub fn clear_recordings(dir: &Path) -> Result<usize, SessionError> {
    let recordings = list_recordings(dir)?;
    for path in &recordings {
        delete_recording(path)?;
    }
    log::info!("Cleared {} recording(s) from {}", recordings.len(), dir.display());
    Ok(recordings.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_only_audio_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.wav"), b"x").unwrap();
        fs::write(dir.path().join("a.m4a"), b"x").unwrap();
        fs::write(dir.path().join("a.metadata.json"), b"{}").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let names: Vec<String> = list_recordings(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.m4a", "b.wav"]);
    }

    #[test]
    fn missing_directory_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_recordings(&dir.path().join("absent")).unwrap().is_empty());
    }

    #[test]
    fn delete_removes_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("take.wav");
        fs::write(&path, b"x").unwrap();
        fs::write(dir.path().join("take.metadata.json"), b"{}").unwrap();

        delete_recording(&path).unwrap();

        assert!(!path.exists());
        assert!(!dir.path().join("take.metadata.json").exists());
    }

    #[test]
    fn clear_counts_and_keeps_other_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("1.wav"), b"x").unwrap();
        fs::write(dir.path().join("2.m4a"), b"x").unwrap();
        fs::write(dir.path().join("keep.txt"), b"x").unwrap();

        assert_eq!(clear_recordings(dir.path()).unwrap(), 2);
        assert!(dir.path().join("keep.txt").exists());
    }

    #[test]
    fn deleting_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(delete_recording(&dir.path().join("nope.wav")).is_err());
    }
}
