//! Protocol module for building commands and decoding status.
//!
//! This module contains the implementations for:
//! - Command envelope construction
//! - Status envelope decoding
//! - Mode and fan tables

pub mod command;
pub mod modes;
pub mod status;

pub use command::{encode_command, Changes, Command, CommandType, DEFAULT_ZONE};
pub use modes::{FanSpeed, OperatingMode};
pub use status::{decode_status, StatusRecord};
