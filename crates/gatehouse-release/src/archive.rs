//! Byte-reproducible archives: fixed timestamps, permissions and ownership, members in the given order.

use std::fs::File;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use flate2::{Compression, GzBuilder};
use tar::{EntryType, Header};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::select::SelectedFile;

const FILE_MODE: u32 = 0o644;

/// Deflate level 9, every entry stamped 1980-01-01 00:00:00 with mode 0644.
pub fn write_zip(dest: &Path, files: &[SelectedFile]) -> Result<()> {
    let out = File::create(dest).with_context(|| format!("create {}", dest.display()))?;
    let mut zip = ZipWriter::new(out);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9))
        .last_modified_time(DateTime::default())
        .unix_permissions(FILE_MODE);
    for f in files {
        zip.start_file(f.rel.as_str(), options)
            .with_context(|| format!("zip entry {}", f.rel))?;
        let mut src = File::open(&f.path).with_context(|| format!("open {}", f.path.display()))?;
        io::copy(&mut src, &mut zip).with_context(|| format!("zip {}", f.rel))?;
    }
    zip.finish().with_context(|| format!("finish {}", dest.display()))?;
    Ok(())
}

/// GNU tar headers (mtime 0, uid/gid 0, owner root, mode 0644) inside gzip level 9 with a zeroed mtime.
pub fn write_tar_gz(dest: &Path, files: &[SelectedFile]) -> Result<()> {
    let out = File::create(dest).with_context(|| format!("create {}", dest.display()))?;
    let gz = GzBuilder::new().mtime(0).write(out, Compression::best());
    let mut tar = tar::Builder::new(gz);
    for f in files {
        let src = File::open(&f.path).with_context(|| format!("open {}", f.path.display()))?;
        let len = src.metadata()?.len();
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(len);
        header.set_mode(FILE_MODE);
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);
        header.set_username("root")?;
        header.set_groupname("root")?;
        tar.append_data(&mut header, &f.rel, src)
            .with_context(|| format!("tar {}", f.rel))?;
    }
    let gz = tar.into_inner().context("finish tar stream")?;
    gz.finish().context("finish gzip stream")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    fn fixture(root: &Path) -> Vec<SelectedFile> {
        ["a.txt", "dir/b.txt"]
            .iter()
            .map(|rel| {
                let path = root.join(rel);
                std::fs::create_dir_all(path.parent().unwrap()).unwrap();
                std::fs::write(&path, format!("content of {rel}")).unwrap();
                SelectedFile {
                    rel: rel.to_string(),
                    size: std::fs::metadata(&path).unwrap().len(),
                    path,
                }
            })
            .collect()
    }

    #[test]
    fn archives_ignore_file_mtimes() {
        let dir = tempdir().unwrap();
        let files = fixture(dir.path());
        write_zip(&dir.path().join("1.zip"), &files).unwrap();
        write_tar_gz(&dir.path().join("1.tar.gz"), &files).unwrap();

        let later = SystemTime::now() + Duration::from_secs(86_400);
        for f in &files {
            File::options().write(true).open(&f.path).unwrap().set_modified(later).unwrap();
        }
        write_zip(&dir.path().join("2.zip"), &files).unwrap();
        write_tar_gz(&dir.path().join("2.tar.gz"), &files).unwrap();

        let read = |n: &str| std::fs::read(dir.path().join(n)).unwrap();
        assert_eq!(read("1.zip"), read("2.zip"));
        assert_eq!(read("1.tar.gz"), read("2.tar.gz"));
    }

    #[test]
    fn tar_members_are_normalized() {
        let dir = tempdir().unwrap();
        let files = fixture(dir.path());
        let dest = dir.path().join("x.tar.gz");
        write_tar_gz(&dest, &files).unwrap();

        let gz = flate2::read::GzDecoder::new(File::open(&dest).unwrap());
        let mut archive = tar::Archive::new(gz);
        let mut names = vec![];
        for entry in archive.entries().unwrap() {
            let entry = entry.unwrap();
            let h = entry.header();
            assert_eq!(h.mtime().unwrap(), 0);
            assert_eq!(h.mode().unwrap(), 0o644);
            assert_eq!(h.uid().unwrap(), 0);
            assert_eq!(h.username().unwrap(), Some("root"));
            names.push(entry.path().unwrap().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["a.txt", "dir/b.txt"]);
    }
}
