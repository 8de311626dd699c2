//! Output sinks for a publication archive.

use std::fs::File;
use std::io::{self, Cursor, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

/// A seekable destination for the archive with a final commit step.
///
/// `commit` runs once, after the archive's central directory has been
/// written. Sinks that stage output elsewhere make it visible here.
pub trait Sink: Write + Seek {
    fn commit(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl Sink for File {
    fn commit(&mut self) -> io::Result<()> {
        self.flush()?;
        self.sync_all()
    }
}

impl Sink for Cursor<Vec<u8>> {}

impl Sink for Cursor<&mut Vec<u8>> {}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn commit(&mut self) -> io::Result<()> {
        (**self).commit()
    }
}

/// A file that only appears at its destination once committed.
///
/// Bytes go to a temporary file in the destination's directory; `commit`
/// renames it into place. Dropping an uncommitted `AtomicFile` removes the
/// temporary file and leaves the destination untouched.
#[derive(Debug)]
pub struct AtomicFile {
    temp: Option<NamedTempFile>,
    destination: PathBuf,
}

impl AtomicFile {
    pub fn create<P: AsRef<Path>>(destination: P) -> io::Result<Self> {
        let destination = destination.as_ref().to_path_buf();
        let dir = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let temp = tempfile::Builder::new()
            .prefix(".quire-")
            .suffix(".tmp")
            .tempfile_in(dir)?;
        Ok(Self {
            temp: Some(temp),
            destination,
        })
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Whether the file has been renamed to its destination.
    pub fn is_committed(&self) -> bool {
        self.temp.is_none()
    }

    fn file(&mut self) -> io::Result<&mut File> {
        self.temp
            .as_mut()
            .map(NamedTempFile::as_file_mut)
            .ok_or_else(|| io::Error::other("atomic file already committed"))
    }
}

impl Write for AtomicFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file()?.flush()
    }
}

impl Seek for AtomicFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file()?.seek(pos)
    }
}

impl Sink for AtomicFile {
    fn commit(&mut self) -> io::Result<()> {
        let mut temp = self
            .temp
            .take()
            .ok_or_else(|| io::Error::other("atomic file already committed"))?;
        temp.as_file_mut().flush()?;
        temp.as_file().sync_all()?;
        temp.persist(&self.destination).map_err(|e| e.error)?;
        Ok(())
    }
}
