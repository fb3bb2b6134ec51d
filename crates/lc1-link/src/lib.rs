//! LC-1 Link
//!
//! This crate drives a connection to an LC-1 wideband lambda controller.
//!
//! # Architecture
//!
//! Each [`Lc1Link`] runs one I/O task that owns the transport:
//!
//! - Incoming bytes go through a [`FrameDemux`](lc1_protocol::FrameDemux)
//!   and are interpreted in arrival order
//! - Telemetry updates the [`DeviceMonitor`], which callers poll for a
//!   [`DeviceStatus`] snapshot
//! - Replies complete the single outstanding request held by the
//!   [`Correlator`]; concurrent callers queue for their turn
//!
//! A transport fault ends the task. Waiting and later requests then fail
//! with [`LinkError::Disconnected`].
//!
//! # Example
//!
//! ```rust,no_run
//! use lc1_link::{Lc1Link, LinkConfig};
//!
//! # async fn demo() -> Result<(), lc1_link::LinkError> {
//! let link = Lc1Link::open("/dev/ttyUSB0", LinkConfig::default())?;
//! let info = link.identify().await?;
//! println!("{:02X?}", info.id);
//! println!("{}", link.status_line());
//! link.shutdown().await
//! # }
//! ```

pub mod config;
pub mod correlator;
pub mod device;
pub mod error;
pub mod link;

pub use config::LinkConfig;
pub use correlator::{Correlator, Reply};
pub use device::{DeviceMode, DeviceMonitor, DeviceStatus};
pub use error::LinkError;
pub use link::{DeviceInfo, Lc1Link};
