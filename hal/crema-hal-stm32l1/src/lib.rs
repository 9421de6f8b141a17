//! STM32L1-specific HAL for the crema controller
//!
//! Implements the `crema-hal` storage and image traits on top of the
//! internal flash, and wraps embassy GPIO types in the `crema-hal` pin
//! traits.
//!
//! # Features
//!
//! - `stm32l152re` - Enable support for the STM32L152RE controller MCU
//! - `defmt` - Enable debug formatting support

#![no_std]
#![deny(unsafe_code)]

pub mod flash;
pub mod gpio;
pub mod uart;

pub use crema_hal::storage::StorageKey;
pub use flash::BoardFlash;
