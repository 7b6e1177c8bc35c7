use anyhow::anyhow;
use formatx::formatx;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt::Debug;
use std::fs::File;
use std::io;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::rc::Rc;

pub trait Output: Debug {
    fn writer_for_location_key(&self, location_key: &str) -> anyhow::Result<impl Write>;
    /// Whether this output can be considered a no-op and therefore that any code that only writes to the output can be skipped.
    fn is_noop(&self) -> bool {
        false
    }
}

/// Writes each location to its own file in `directory_path`, named by filling the location key
/// into `file_template` (e.g. `"{}.csv"`).
#[derive(Debug)]
pub struct FileOutput {
    directory_path: PathBuf,
    file_template: String,
}

impl FileOutput {
    pub fn new(directory_path: PathBuf, file_template: String) -> Self {
        Self {
            directory_path,
            file_template,
        }
    }
}

impl Output for FileOutput {
    fn writer_for_location_key(&self, location_key: &str) -> anyhow::Result<impl Write> {
        let file_name = formatx!(&self.file_template, location_key).map_err(|err| {
            anyhow!(
                "Could not name the '{location_key}' output from template '{}': {err:?}",
                self.file_template
            )
        })?;
        Ok(BufWriter::new(File::create(
            self.directory_path.join(file_name),
        )?))
    }
}

impl Output for &FileOutput {
    fn writer_for_location_key(&self, location_key: &str) -> anyhow::Result<impl Write> {
        <FileOutput as Output>::writer_for_location_key(self, location_key)
    }
}

/// An output that goes to nowhere/ a "sink"/ /dev/null.
#[derive(Debug, Default)]
pub struct SinkOutput;

impl Output for SinkOutput {
    fn writer_for_location_key(&self, _location_key: &str) -> anyhow::Result<impl Write> {
        Ok(io::sink())
    }

    fn is_noop(&self) -> bool {
        true
    }
}

/// Keeps everything written in memory, one buffer per location key.
#[derive(Clone, Debug, Default)]
pub struct MemoryOutput(Rc<RefCell<IndexMap<String, Vec<u8>>>>);

impl MemoryOutput {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn location_keys(&self) -> Vec<String> {
        self.0.borrow().keys().cloned().collect()
    }

    /// Everything written to `location_key`, if anything was.
    pub fn contents(&self, location_key: &str) -> Option<String> {
        self.0
            .borrow()
            .get(location_key)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

impl Output for MemoryOutput {
    fn writer_for_location_key(&self, location_key: &str) -> anyhow::Result<impl Write> {
        self.0
            .borrow_mut()
            .insert(location_key.to_string(), Default::default());
        Ok(MemoryWriter {
            buffers: self.0.clone(),
            location_key: location_key.to_string(),
        })
    }
}

impl Output for &MemoryOutput {
    fn writer_for_location_key(&self, location_key: &str) -> anyhow::Result<impl Write> {
        <MemoryOutput as Output>::writer_for_location_key(self, location_key)
    }
}

/// Appends to the buffer of one location of a [`MemoryOutput`].
struct MemoryWriter {
    buffers: Rc<RefCell<IndexMap<String, Vec<u8>>>>,
    location_key: String,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffers
            .borrow_mut()
            .entry(self.location_key.clone())
            .or_default()
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
