use std::fs;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::{debug, info};

use crate::error::{CorpusError, CorpusResult};

/// Extract every `*.tar.gz` in `archives_dir` into `unpacked_dir`
///
/// Returns the number of archives extracted.
pub fn unpack_archives(archives_dir: &Path, unpacked_dir: &Path) -> CorpusResult<usize> {
    fs::create_dir_all(unpacked_dir).map_err(|e| CorpusError::io(unpacked_dir, e))?;

    let archives = find_archives(archives_dir)?;
    for archive_path in &archives {
        debug!("Unpacking {:?}", archive_path);
        let file = fs::File::open(archive_path).map_err(|e| CorpusError::io(archive_path, e))?;
        let mut archive = Archive::new(GzDecoder::new(file));
        archive
            .unpack(unpacked_dir)
            .map_err(|e| CorpusError::Archive {
                path: archive_path.clone(),
                message: e.to_string(),
            })?;
    }

    info!(
        "Unpacked {} archives from {:?} into {:?}",
        archives.len(),
        archives_dir,
        unpacked_dir
    );
    Ok(archives.len())
}

fn find_archives(archives_dir: &Path) -> CorpusResult<Vec<PathBuf>> {
    let mut archives = Vec::new();
    for entry in fs::read_dir(archives_dir).map_err(|e| CorpusError::io(archives_dir, e))? {
        let path = entry.map_err(|e| CorpusError::io(archives_dir, e))?.path();
        let is_tar_gz = path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().ends_with(".tar.gz"));
        if is_tar_gz && path.is_file() {
            archives.push(path);
        }
    }
    archives.sort();
    Ok(archives)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn write_archive(path: &Path, entries: &[(&str, &str)]) {
        let file = fs::File::create(path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        for (name, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, name, content.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_unpack_archives() {
        let archives = tempfile::tempdir().unwrap();
        let unpacked = tempfile::tempdir().unwrap();
        let target = unpacked.path().join("protocols");
        write_archive(
            &archives.path().join("p1.tar.gz"),
            &[
                ("p1/protocol.txt", "ועדת הכספים\n"),
                ("p1/annotationcollections/a.xml", "<TEI/>"),
            ],
        );
        fs::write(archives.path().join("readme.txt"), "not an archive").unwrap();

        let count = unpack_archives(archives.path(), &target).unwrap();

        assert_eq!(count, 1);
        assert_eq!(
            fs::read_to_string(target.join("p1/protocol.txt")).unwrap(),
            "ועדת הכספים\n"
        );
        assert!(target.join("p1/annotationcollections/a.xml").is_file());
    }

    #[test]
    fn test_corrupt_archive() {
        let archives = tempfile::tempdir().unwrap();
        let unpacked = tempfile::tempdir().unwrap();
        fs::write(archives.path().join("bad.tar.gz"), "garbage").unwrap();

        assert!(matches!(
            unpack_archives(archives.path(), unpacked.path()),
            Err(CorpusError::Archive { .. })
        ));
    }
}
