//! Drop-directory delivery: one file per payload.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::trace;

use super::DeliverySink;
use crate::error::SinkError;

/// Writes each payload to `<dir>/<name>`.
///
/// The payload is first written to a hidden `.<name>.partial` file in the same
/// directory and then renamed into place, so a collector scanning the
/// directory only ever sees complete payloads.
#[derive(Debug, Clone)]
pub struct DirectorySink
{
    dir: PathBuf,
}

impl DirectorySink
{
    /// Sink writing into `dir`. The directory is checked on every write, not
    /// here, so it may be created after the agent starts.
    pub fn new(dir: impl Into<PathBuf>) -> Self
    {
        Self { dir: dir.into() }
    }

    /// Target directory.
    #[must_use]
    pub fn dir(&self) -> &Path
    {
        &self.dir
    }

    fn check_writable(&self) -> Result<(), SinkError>
    {
        match fs::metadata(&self.dir) {
            Ok(meta) if meta.is_dir() && !meta.permissions().readonly() => Ok(()),
            _ => Err(SinkError::NotWritable(self.dir.clone())),
        }
    }
}

impl DeliverySink for DirectorySink
{
    fn write(&self, name: &str, bytes: &[u8]) -> Result<(), SinkError>
    {
        self.check_writable()?;

        let target = self.dir.join(name);
        let partial = self.dir.join(format!(".{name}.partial"));

        let written = fs::File::create(&partial).and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        });
        if let Err(e) = written.and_then(|()| fs::rename(&partial, &target)) {
            let _ = fs::remove_file(&partial);
            return Err(SinkError::Io(e));
        }

        trace!(path = %target.display(), size = bytes.len(), "payload written");
        Ok(())
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_writes_named_file()
    {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path());
        assert_eq!(sink.dir(), dir.path());

        sink.write("a.dump", b"{}").unwrap();

        assert_eq!(fs::read(dir.path().join("a.dump")).unwrap(), b"{}");
        let names: Vec<_> = fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(names.len(), 1, "no partial file left behind");
    }

    #[test]
    fn test_missing_directory()
    {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path().join("missing"));

        assert!(matches!(sink.write("a.dump", b"{}"), Err(SinkError::NotWritable(_))));
    }

    #[test]
    fn test_file_instead_of_directory()
    {
        let file = tempfile::NamedTempFile::new().unwrap();
        let sink = DirectorySink::new(file.path());

        assert!(matches!(sink.write("a.dump", b"{}"), Err(SinkError::NotWritable(_))));
    }
}
