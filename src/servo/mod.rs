//! Servo bus and per-device register cache.

pub mod bus;
pub mod channel;
pub mod device;

pub use bus::{Bus, DeviceHandle};
pub use channel::{Channel, Link};
pub use device::{Device, Snapshot};
