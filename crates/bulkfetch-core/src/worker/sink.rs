//! Response body to disk: `<dest>.part`, renamed once the transfer is done.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::transport::{with_disposition_extension, ResponseSink};

pub const TEMP_SUFFIX: &str = ".part";

/// `file.pdf` -> `file.pdf.part`
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Remove every `*.part` file under `dir`. For runs that end without the
/// sinks being dropped (process exit on interrupt). A missing `dir` is fine.
pub fn sweep_temp_files(dir: &Path) -> anyhow::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in walkdir::WalkDir::new(dir) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_part = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.ends_with(TEMP_SUFFIX));
        if is_part {
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                // The owning worker finished and renamed it meanwhile.
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(removed)
}

/// Writes a 2xx body to a temp file. Bodies of other statuses are dropped
/// and nothing touches the disk.
pub(crate) struct FileSink<'a> {
    dest: PathBuf,
    on_bytes: &'a dyn Fn(u64),
    status: u32,
    final_path: Option<PathBuf>,
    part_path: Option<PathBuf>,
    file: Option<BufWriter<File>>,
    bytes: u64,
}

impl<'a> FileSink<'a> {
    pub(crate) fn new(dest: &Path, on_bytes: &'a dyn Fn(u64)) -> Self {
        Self {
            dest: dest.to_path_buf(),
            on_bytes,
            status: 0,
            final_path: None,
            part_path: None,
            file: None,
            bytes: 0,
        }
    }

    /// Flush, then move the temp file to its final name.
    /// Returns `None` if no body was being saved.
    pub(crate) fn finish(mut self) -> io::Result<Option<(PathBuf, u64)>> {
        let Some(mut file) = self.file.take() else {
            return Ok(None);
        };
        file.flush()?;
        drop(file);
        let (Some(part), Some(final_path)) = (self.part_path.take(), self.final_path.take()) else {
            return Ok(None);
        };
        if let Err(e) = fs::rename(&part, &final_path) {
            let _ = fs::remove_file(&part);
            return Err(e);
        }
        Ok(Some((final_path, self.bytes)))
    }
}

impl ResponseSink for FileSink<'_> {
    fn begin(&mut self, status: u32, content_disposition: Option<&str>) -> io::Result<()> {
        self.status = status;
        if !(200..300).contains(&status) {
            return Ok(());
        }
        let final_path = with_disposition_extension(&self.dest, content_disposition);
        if let Some(parent) = final_path.parent() {
            if !parent.as_os_str().is_empty() {
                // create_dir_all succeeds when another worker got there first.
                fs::create_dir_all(parent)?;
            }
        }
        let part = temp_path(&final_path);
        let file = File::create(&part)?;
        self.file = Some(BufWriter::new(file));
        self.part_path = Some(part);
        self.final_path = Some(final_path);
        Ok(())
    }

    fn data(&mut self, chunk: &[u8]) -> io::Result<()> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        file.write_all(chunk)?;
        self.bytes += chunk.len() as u64;
        (self.on_bytes)(chunk.len() as u64);
        Ok(())
    }
}

impl Drop for FileSink<'_> {
    fn drop(&mut self) {
        self.file.take();
        if let Some(part) = self.part_path.take() {
            let _ = fs::remove_file(part);
        }
    }
}
