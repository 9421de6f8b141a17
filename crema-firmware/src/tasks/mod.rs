//! Embassy async tasks
//!
//! The sequencer state lives behind one blocking mutex; tasks lock it for
//! short synchronous sections and talk to each other through channels and
//! signals.

pub mod control;
pub mod link;
pub mod mains;
pub mod meters;
pub mod sensors;
pub mod storage;

pub use control::control_task;
pub use link::{link_rx_task, link_tx_task};
pub use mains::{pump_compare_task, zero_cross_task};
pub use meters::{efast_task, flow_meter_task};
pub use sensors::sensor_task;
pub use storage::storage_task;
