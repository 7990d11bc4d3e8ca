use log::info;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("failed to read save file {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write save file {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// Where battery RAM for `rom` lives. An explicit path wins; otherwise the
/// ROM's file name with a `.sav` extension, inside `save_dir` when given or
/// next to the ROM.
pub fn save_path(rom: &Path, explicit: Option<&Path>, save_dir: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let sav = rom.with_extension("sav");
    match (save_dir, sav.file_name()) {
        (Some(dir), Some(name)) => dir.join(name),
        _ => sav,
    }
}

/// Read persisted RAM. A missing file is not an error.
pub fn load(path: &Path) -> Result<Option<Vec<u8>>, SaveError> {
    match std::fs::read(path) {
        Ok(data) => {
            info!("Loaded {} bytes of save RAM from {}", data.len(), path.display());
            Ok(Some(data))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(SaveError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

pub fn store(path: &Path, data: &[u8]) -> Result<(), SaveError> {
    let wrap = |source| SaveError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(wrap)?;
    }
    std::fs::write(path, data).map_err(wrap)?;
    info!("Wrote {} bytes of save RAM to {}", data.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_path_derivation() {
        let rom = Path::new("roms/tetris.gb");
        assert_eq!(save_path(rom, None, None), PathBuf::from("roms/tetris.sav"));
        assert_eq!(
            save_path(rom, None, Some(Path::new("saves"))),
            PathBuf::from("saves/tetris.sav")
        );
        assert_eq!(
            save_path(rom, Some(Path::new("x.bin")), Some(Path::new("saves"))),
            PathBuf::from("x.bin")
        );
    }

    #[test]
    fn store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("game.sav");
        let data: Vec<u8> = (0..=255u8).collect();
        store(&path, &data).unwrap();
        assert_eq!(load(&path).unwrap(), Some(data));
    }

    #[test]
    fn missing_save_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("none.sav")).unwrap().is_none());
    }

    #[test]
    fn read_error_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        // Reading a directory fails with something other than NotFound.
        let err = load(dir.path()).unwrap_err();
        assert!(matches!(err, SaveError::Read { .. }));
        assert!(err.to_string().contains(&dir.path().display().to_string()));
    }
}
