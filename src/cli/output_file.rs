//! Output file opened on first use

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::PathBuf,
};

/// Writes to `path`, creating or truncating it only once the first write or
/// flush arrives. A run that fails before producing anything leaves an
/// existing file as it was.
#[derive(Debug)]
pub struct OutputFile {
    path: PathBuf,
    file: Option<BufWriter<File>>,
}

impl OutputFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        OutputFile {
            path: path.into(),
            file: None,
        }
    }

    fn file(&mut self) -> io::Result<&mut BufWriter<File>> {
        let file = match self.file.take() {
            Some(file) => file,
            None => BufWriter::new(File::create(&self.path)?),
        };
        Ok(self.file.insert(file))
    }
}

impl Write for OutputFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file()?.flush()
    }
}
