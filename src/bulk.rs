//! Whole-region transfer handles
//!
//! A [`BulkHandle`] behaves like an open file on the device's register block:
//! every read or write moves the entire region, and the byte count must equal
//! the region size exactly. Any number of handles may be open at once; they
//! share the device's single region lock.

use std::io;
use std::pin::pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Notify;

use crate::device::Device;
use crate::error::{Error, Result};
use crate::region::RegisterRegion;

/// Kind of bulk transaction seen by observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    Read,
    Write,
}

/// Result of a readiness query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Readiness {
    pub readable: bool,
    pub writable: bool,
}

/// Per-device wait queues, one per direction, plus a release for removal.
#[derive(Default)]
pub struct ActivityQueues {
    read_wait: Notify,
    write_wait: Notify,
    close_wait: Notify,
    closed: AtomicBool,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl ActivityQueues {
    pub fn wake(&self, activity: Activity) {
        match activity {
            Activity::Read => {
                self.reads.fetch_add(1, Ordering::Relaxed);
                self.read_wait.notify_waiters();
            }
            Activity::Write => {
                self.writes.fetch_add(1, Ordering::Relaxed);
                self.write_wait.notify_waiters();
            }
        }
    }

    /// Release every current and future waiter with `Closed`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.close_wait.notify_waiters();
    }

    /// Wait until the next bulk read or write on the device.
    pub async fn next(&self) -> Result<Activity> {
        let read = self.read_wait.notified();
        let write = self.write_wait.notified();
        let mut closed = pin!(self.close_wait.notified());
        // Registered before the flag check so a concurrent close is not lost.
        closed.as_mut().enable();
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }
        tokio::select! {
            _ = read => Ok(Activity::Read),
            _ = write => Ok(Activity::Write),
            _ = closed => Err(Error::Closed),
        }
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

/// An open bulk transfer endpoint. Dropping it closes it.
pub struct BulkHandle {
    device: Arc<Device>,
}

impl BulkHandle {
    pub(crate) fn new(device: Arc<Device>) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Pull the region and copy it into `buf`, which must be exactly the
    /// region size.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let count = buf.len();
        self.check_len(count, "read")?;
        self.device.queues().wake(Activity::Read);
        self.device.region().transfer_out(&mut &mut buf[..])?;
        Ok(count)
    }

    /// Copy `buf`, which must be exactly the region size, into the region
    /// and push it.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        self.write_from(buf.len(), &mut &buf[..])
    }

    /// Like [`write`](Self::write) with the payload streamed from `src`.
    /// A source that runs dry or errors is reported as a fault.
    pub fn write_from<R: io::Read>(&self, count: usize, src: &mut R) -> Result<usize> {
        self.check_len(count, "write")?;
        self.device.queues().wake(Activity::Write);
        self.device.region().transfer_in(src)?;
        Ok(count)
    }

    /// Like [`read`](Self::read) with the region streamed to `dst`.
    pub fn read_to<W: io::Write>(&self, count: usize, dst: &mut W) -> Result<usize> {
        self.check_len(count, "read")?;
        self.device.queues().wake(Activity::Read);
        self.device.region().transfer_out(dst)?;
        Ok(count)
    }

    /// Register state can be observed or changed at any time.
    pub fn poll(&self) -> Readiness {
        Readiness {
            readable: true,
            writable: true,
        }
    }

    pub fn close(self) {}

    fn check_len(&self, count: usize, op: &str) -> Result<()> {
        if self.device.is_closed() {
            return Err(Error::Closed);
        }
        let expected = self.device.region().size();
        if count != expected {
            tracing::error!(
                device = %self.device.name(),
                "incorrect {}-value for region: {} instead of {}",
                op,
                count,
                expected
            );
            return Err(Error::InvalidLength {
                expected,
                actual: count,
            });
        }
        Ok(())
    }
}

impl Drop for BulkHandle {
    fn drop(&mut self) {
        self.device.release_handle();
    }
}

impl io::Read for BulkHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        BulkHandle::read(self, buf).map_err(Into::into)
    }
}

impl io::Write for BulkHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        BulkHandle::write(self, buf).map_err(Into::into)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
