//! Direct I/O probe.
//!
//! Each probe opens the path, reads one block from offset 0 bypassing the
//! page cache and closes it again, so a path that disappears, reappears or
//! stops responding is noticed on the very next tick.

use std::{
    fs::{File, OpenOptions},
    io::{self, Read},
    os::unix::fs::OpenOptionsExt,
    path::Path,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use tracing::debug;

use super::Probe;
use crate::{config::DaemonConfig, protocol::Errno};

#[cfg(target_os = "linux")]
const DIRECT_FLAG: libc::c_int = libc::O_DIRECT;
#[cfg(not(target_os = "linux"))]
const DIRECT_FLAG: libc::c_int = 0;

/// Reads the first block of a path with `O_DIRECT`
#[derive(Debug, Clone)]
pub struct DirectIoProbe {
    size: usize,
    align: usize,
    direct: bool,
    buffered_fallback: bool,
}

impl DirectIoProbe {
    pub fn new(size: usize, align: usize) -> Self {
        Self {
            size,
            align,
            direct: true,
            buffered_fallback: true,
        }
    }

    pub fn from_config(config: &DaemonConfig) -> Self {
        Self {
            size: config.probe_size,
            align: config.probe_align,
            direct: config.direct_io,
            buffered_fallback: config.buffered_fallback,
        }
    }

    /// Time one open + read of `path`. Blocks the calling thread.
    pub fn read_delay(&self, path: &Path) -> Result<Duration, Errno> {
        let start = Instant::now();

        let mut file = self.open(path).map_err(|e| Errno::from_io_error(&e))?;

        let mut buf = vec![0u8; self.size + self.align];
        let offset = buf.as_ptr().align_offset(self.align);
        if offset > self.align {
            return Err(Errno::EIO);
        }
        let block = &mut buf[offset..offset + self.size];

        // A short read, or none at all on an empty file, still proves the
        // storage answered.
        let refused = |e: &io::Error| {
            self.direct && self.buffered_fallback && e.raw_os_error() == Some(libc::EINVAL)
        };
        match read_block(&mut file, block) {
            Err(e) if refused(&e) => {
                debug!("{} refused a direct read, reading uncached", path.display());
                let mut file = self.open_uncached(path).map_err(|e| Errno::from_io_error(&e))?;
                read_block(&mut file, block)
            }
            other => other,
        }
        .map_err(|e| Errno::from_io_error(&e))?;

        Ok(start.elapsed())
    }

    fn open(&self, path: &Path) -> io::Result<File> {
        if !self.direct {
            return OpenOptions::new().read(true).open(path);
        }

        match OpenOptions::new().read(true).custom_flags(DIRECT_FLAG).open(path) {
            Err(e) if self.buffered_fallback && e.raw_os_error() == Some(libc::EINVAL) => {
                debug!("{} does not support direct I/O, reading uncached", path.display());
                self.open_uncached(path)
            }
            other => other,
        }
    }

    fn open_uncached(&self, path: &Path) -> io::Result<File> {
        let file = OpenOptions::new().read(true).open(path)?;
        drop_cache(&file, self.size);
        Ok(file)
    }
}

fn read_block(file: &mut File, block: &mut [u8]) -> io::Result<usize> {
    loop {
        match file.read(block) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

impl Default for DirectIoProbe {
    fn default() -> Self {
        Self::from_config(&DaemonConfig::default())
    }
}

#[async_trait]
impl Probe for DirectIoProbe {
    async fn probe(&self, path: &str) -> Result<Duration, Errno> {
        let probe = self.clone();
        let path = path.to_string();

        tokio::task::spawn_blocking(move || probe.read_delay(Path::new(&path)))
            .await
            .map_err(|e| {
                debug!("probe task failed: {}", e);
                Errno::EIO
            })?
    }
}

#[cfg(target_os = "linux")]
fn drop_cache(file: &File, len: usize) {
    use std::os::fd::AsRawFd;

    let len = libc::off_t::try_from(len).unwrap_or(libc::off_t::MAX);
    // SAFETY: the descriptor belongs to `file`, which outlives the call.
    let rc = unsafe { libc::posix_fadvise(file.as_raw_fd(), 0, len, libc::POSIX_FADV_DONTNEED) };
    if rc != 0 {
        debug!("posix_fadvise failed: {}", Errno::new(rc).description());
    }
}

#[cfg(not(target_os = "linux"))]
fn drop_cache(_file: &File, _len: usize) {}
