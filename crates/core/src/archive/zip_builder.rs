//! Building a zip archive from a workspace directory.

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::error::PipelineError;

/// Write every regular file under `source_dir` into a new zip at `dest`.
///
/// Entries are named by their path relative to `source_dir`, with `/`
/// separators, in sorted order. A partially written archive is removed on
/// failure. Returns the number of entries written.
///
/// This is blocking; call it from `spawn_blocking` in async code.
pub fn build_zip(source_dir: &Path, dest: &Path) -> Result<usize, PipelineError> {
    let mut files = Vec::new();
    collect_files(source_dir, &mut files)?;
    files.sort();

    let result = write_archive(source_dir, &files, dest);
    if result.is_err() {
        let _ = fs::remove_file(dest);
    }
    result
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), PipelineError> {
    let io_err = |source| PipelineError::Io {
        path: dir.to_path_buf(),
        source,
    };

    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let file_type = entry.file_type().map_err(io_err)?;
        let path = entry.path();
        if file_type.is_dir() {
            collect_files(&path, out)?;
        } else if file_type.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

fn entry_name(source_dir: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(source_dir).ok()?;
    let parts: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
    Some(parts?.join("/"))
}

fn write_archive(source_dir: &Path, files: &[PathBuf], dest: &Path) -> Result<usize, PipelineError> {
    let zip_err = |source| PipelineError::Zip {
        path: dest.to_path_buf(),
        source,
    };

    let file = File::create(dest).map_err(|source| PipelineError::Io {
        path: dest.to_path_buf(),
        source,
    })?;
    let mut writer = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for path in files {
        let name = entry_name(source_dir, path).ok_or_else(|| PipelineError::Io {
            path: path.clone(),
            source: io::Error::new(io::ErrorKind::InvalidData, "file name is not valid UTF-8"),
        })?;

        writer.start_file(name, options).map_err(zip_err)?;
        let mut input = File::open(path).map_err(|source| PipelineError::Io {
            path: path.clone(),
            source,
        })?;
        io::copy(&mut input, &mut writer).map_err(|source| PipelineError::Io {
            path: path.clone(),
            source,
        })?;
    }

    let mut inner = writer.finish().map_err(zip_err)?;
    io::Write::flush(&mut inner).map_err(|source| PipelineError::Io {
        path: dest.to_path_buf(),
        source,
    })?;

    Ok(files.len())
}
