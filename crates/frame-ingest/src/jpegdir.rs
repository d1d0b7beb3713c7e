//! Directory-backed JPEG source: the host-side stand-in for a sensor whose
//! pixel format is already JPEG.

use std::{
    ffi::OsStr,
    fs,
    io::Read,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use chrono::Utc;
use tracing::warn;

use crate::{
    pacer::Pacer,
    pool::BufferPool,
    types::{Frame, FrameFormat, SourceError},
    FrameSource,
};

const POOL_CAPACITY: usize = 4;

struct Entry {
    path: PathBuf,
    width: u32,
    height: u32,
}

/// Cycles the JPEG files of a directory at a fixed rate, in sorted order.
pub struct JpegDirSource {
    entries: Vec<Entry>,
    cursor: AtomicUsize,
    pacer: Pacer,
    pool: BufferPool,
}

impl JpegDirSource {
    /// Scan `dir` for `.jpg`/`.jpeg` files and record their dimensions.
    /// Fails when the directory holds no JPEGs or one of them is unreadable.
    pub fn open(dir: impl AsRef<Path>, fps: u32) -> Result<Self, SourceError> {
        let dir = dir.as_ref();
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(OsStr::to_str)
                    .is_some_and(|ext| {
                        ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg")
                    })
            })
            .collect();
        paths.sort();
        if paths.is_empty() {
            return Err(SourceError::EmptyDir {
                dir: dir.to_path_buf(),
            });
        }

        let mut entries = Vec::with_capacity(paths.len());
        for path in paths {
            let (width, height) =
                image::image_dimensions(&path).map_err(|source| SourceError::BadImage {
                    path: path.clone(),
                    source,
                })?;
            entries.push(Entry {
                path,
                width,
                height,
            });
        }

        Ok(Self {
            entries,
            cursor: AtomicUsize::new(0),
            pacer: Pacer::new(fps),
            pool: BufferPool::new(POOL_CAPACITY),
        })
    }
}

impl FrameSource for JpegDirSource {
    fn acquire(&self) -> Option<Frame> {
        self.pacer.wait();
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.entries.len();
        let entry = &self.entries[idx];
        let mut data = self.pool.checkout();
        let read = fs::File::open(&entry.path).and_then(|mut file| file.read_to_end(&mut data));
        if let Err(err) = read {
            warn!("failed to read {}: {err}", entry.path.display());
            self.pool.restore(data);
            return None;
        }
        Some(Frame {
            data,
            width: entry.width,
            height: entry.height,
            timestamp_ms: Utc::now().timestamp_millis(),
            format: FrameFormat::Jpeg,
        })
    }

    fn release(&self, frame: Frame) {
        self.pool.restore(frame.data);
    }
}
