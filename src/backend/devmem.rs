//! `/dev/mem` register window backed by `memmap2`.

use super::RegisterBackend;
use crate::error::{FifoError, Result};
use memmap2::{MmapOptions, MmapRaw};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Fallback when the page size cannot be queried.
const DEFAULT_PAGE_SIZE: usize = 4096;

/// Memory-mapped physical register window.
///
/// Maps `len` bytes starting at physical address `base`. The mapping itself
/// starts at the enclosing page boundary; accesses are checked against the
/// requested window, must be 4-byte aligned, and are performed with volatile
/// loads and stores.
pub struct DevMemBackend {
    /// Raw shared mapping (valid for the lifetime of self)
    map: MmapRaw,
    /// Physical address of the first accessible byte
    base: usize,
    /// Accessible window length in bytes
    len: usize,
    /// Distance from the mapping start to `base`
    page_offset: usize,
    /// Device path, for diagnostics
    path: PathBuf,
}

impl DevMemBackend {
    /// Map `len` bytes at physical address `base` from `path`.
    ///
    /// `path` is normally `/dev/mem`; any regular file of sufficient size works
    /// too.
    pub fn open(path: impl AsRef<Path>, base: usize, len: usize) -> Result<Self> {
        let path = path.as_ref();
        if len == 0 {
            return Err(FifoError::Config(
                "register window length must be non-zero".to_string(),
            ));
        }

        let page = page_size();
        let page_offset = base % page;
        let map_base = base - page_offset;
        let map_len = page_offset
            .checked_add(len)
            .ok_or_else(|| FifoError::invalid_address(base, "window length overflows"))?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| FifoError::Io(format!("Failed to open {}: {}", path.display(), e)))?;

        let map = MmapOptions::new()
            .offset(map_base as u64)
            .len(map_len)
            .map_raw(&file)
            .map_err(|e| FifoError::Io(format!("Failed to map {}: {}", path.display(), e)))?;

        debug!(
            device = %path.display(),
            base = format_args!("{:#x}", base),
            len,
            "Mapped register window"
        );

        Ok(Self {
            map,
            base,
            len,
            page_offset,
            path: path.to_path_buf(),
        })
    }

    /// Physical address of the first byte of the window.
    pub fn base(&self) -> usize {
        self.base
    }

    /// Window length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the window is empty (never true for an opened backend).
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Device the window was mapped from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Byte offset into the mapping for a checked 32-bit access.
    fn map_offset(&self, address: usize) -> Result<usize> {
        if address % 4 != 0 {
            return Err(FifoError::backend(address, "unaligned 32-bit access"));
        }
        if !self.contains(address) {
            return Err(FifoError::backend(
                address,
                format!(
                    "outside mapped window {:#x}..{:#x}",
                    self.base,
                    self.base + self.len
                ),
            ));
        }
        Ok(self.page_offset + (address - self.base))
    }
}

#[allow(unsafe_code)]
impl RegisterBackend for DevMemBackend {
    fn name(&self) -> &'static str {
        "devmem"
    }

    fn read32(&self, address: usize) -> Result<u32> {
        let offset = self.map_offset(address)?;
        // SAFETY: offset + 4 lies within the mapping (checked by map_offset) and
        // is 4-byte aligned because the mapping starts on a page boundary.
        let value = unsafe { std::ptr::read_volatile(self.map.as_ptr().add(offset) as *const u32) };
        Ok(value)
    }

    fn write32(&self, address: usize, value: u32) -> Result<()> {
        let offset = self.map_offset(address)?;
        // SAFETY: same bounds and alignment argument as read32; the mapping is
        // shared and writable.
        unsafe {
            std::ptr::write_volatile(self.map.as_mut_ptr().add(offset) as *mut u32, value);
        }
        Ok(())
    }

    fn contains(&self, address: usize) -> bool {
        address >= self.base
            && address
                .checked_add(4)
                .is_some_and(|end| end <= self.base + self.len)
    }
}

impl std::fmt::Debug for DevMemBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevMemBackend")
            .field("path", &self.path)
            .field("base", &format_args!("{:#x}", self.base))
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn page_size() -> usize {
    // SAFETY: sysconf has no memory-safety preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        DEFAULT_PAGE_SIZE
    }
}

#[cfg(not(unix))]
fn page_size() -> usize {
    DEFAULT_PAGE_SIZE
}
