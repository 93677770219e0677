//! Direct /dev/mem access for the IP core's register block
//!
//! Maps the physical register range into the process so the region can use
//! volatile 32-bit reads and writes from userspace.

use std::fs::OpenOptions;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use crate::bus::RegisterBus;
use crate::regmap::WORD_SIZE;

/// Memory-mapped register range
pub struct DevMem {
    ptr: *mut u8,
    size: usize,
    page_offset: usize,
}

// Safety: all access goes through volatile reads/writes of whole words on a
// mapping that lives until Drop.
unsafe impl Send for DevMem {}
unsafe impl Sync for DevMem {}

impl DevMem {
    /// Map `size` bytes of physical memory at `base_addr` through `path`
    /// (normally `/dev/mem`).
    pub fn open(path: &Path, base_addr: usize, size: usize) -> io::Result<Self> {
        if base_addr % WORD_SIZE != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("base address 0x{:08X} is not word aligned", base_addr),
            ));
        }

        let fd = OpenOptions::new().read(true).write(true).open(path)?;

        let page_size = page_size();
        let page_offset = base_addr % page_size;
        let map_base = base_addr - page_offset;
        let map_size = size + page_offset;

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                map_size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd.as_raw_fd(),
                map_base as libc::off_t,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        tracing::info!(
            "got memory location [0x{:08X} - 0x{:08X}] from {}",
            base_addr,
            base_addr + size - 1,
            path.display()
        );

        Ok(Self {
            ptr: unsafe { (ptr as *mut u8).add(page_offset) },
            size,
            page_offset,
        })
    }

    fn in_range(&self, offset: usize) -> bool {
        offset % WORD_SIZE == 0 && offset + WORD_SIZE <= self.size
    }
}

impl RegisterBus for DevMem {
    #[inline]
    fn read32(&self, offset: usize) -> Option<u32> {
        if !self.in_range(offset) {
            return None;
        }
        Some(unsafe { std::ptr::read_volatile(self.ptr.add(offset) as *const u32) })
    }

    #[inline]
    fn write32(&self, offset: usize, value: u32) -> bool {
        if !self.in_range(offset) {
            return false;
        }
        unsafe {
            std::ptr::write_volatile(self.ptr.add(offset) as *mut u32, value);
        }
        true
    }

    fn size(&self) -> usize {
        self.size
    }
}

impl Drop for DevMem {
    fn drop(&mut self) {
        let map_ptr = unsafe { self.ptr.sub(self.page_offset) };
        let map_size = self.size + self.page_offset;

        unsafe {
            libc::munmap(map_ptr as *mut libc::c_void, map_size);
        }
    }
}

fn page_size() -> usize {
    match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
        n if n > 0 => n as usize,
        _ => 4096,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unaligned_base_is_rejected_before_open() {
        let err = DevMem::open(Path::new("/nonexistent/mem"), 0x4000_0002, 4)
            .err()
            .unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn missing_device_reports_io_error() {
        let err = DevMem::open(Path::new("/nonexistent/mem"), 0x4000_0000, 4)
            .err()
            .unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
