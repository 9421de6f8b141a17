//! Crema Hardware Abstraction Layer
//!
//! Traits implemented by chip-specific HALs so that the control core and
//! the drivers never touch peripheral registers directly.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  crema-firmware / crema-drivers         │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  crema-hal (this crate - traits)        │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//!             ┌───────────────┐
//!             │  crema-hal-   │
//!             │   stm32l1     │
//!             └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::OutputPin`], [`gpio::InputPin`] - Digital I/O
//! - [`storage::KeyValueStore`] - Persisted parameters
//! - [`image::ImageFlash`] - Firmware image partitions

#![no_std]
#![deny(unsafe_code)]

pub mod gpio;
pub mod image;
pub mod storage;
pub mod uart;

pub use gpio::{InputPin, OutputPin};
pub use image::{ImageFlash, ImageFlashError};
pub use storage::{KeyValueStore, StorageError, StorageKey};
pub use uart::{LinkError, UartConfig};
