//! Indicator IP core register server
//!
//! Maps an indicator IP core's register block and keeps a lock-guarded
//! mirror of it. Two surfaces reach the hardware:
//!
//! - **bulk**: [`BulkHandle`](bulk::BulkHandle) moves the whole region per
//!   transaction, pulling or pushing every register under the region lock;
//! - **fields**: [`FieldAttr`](attr::FieldAttr) reads or writes one masked
//!   field straight from hardware as hex text, without the lock.
//!
//! [`RegionClient`](client::RegionClient) is the user-space side: its own
//! mirror plus a transport with bulk semantics. Both it and the device
//! [`Region`](region::Region) implement [`RegisterRegion`](region::RegisterRegion).
//!
//! ```text
//!  hardware ──pull──▶ Region mirror ──read──▶ BulkHandle ──▶ RegionClient
//!           ◀─push──               ◀─write──            ◀──
//!  hardware ◀──────── FieldAttr show/store (no lock) ──────▶ text
//! ```

pub mod api;
pub mod attr;
pub mod bulk;
pub mod bus;
pub mod client;
pub mod config;
pub mod devmem;
pub mod device;
pub mod error;
pub mod field;
pub mod indicator;
pub mod region;
pub mod regmap;

pub use error::{Error, Result};
