//! # Joystick Link Library
//!
//! Host-side serial link and calibration engine for a microcontroller
//! joystick.
//!
//! This library provides the core functionality for exchanging line-delimited
//! text commands with the device, fanning received lines out to any number of
//! listeners, and turning raw analog samples into a bounded, deadzone-corrected
//! 2D stick position.

pub mod broadcast;
pub mod calibration;
pub mod command;
pub mod config;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod wizard;
