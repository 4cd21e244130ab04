//! Data Transfer Objects for the relay wire protocol.
//!
//! - `wire`: frame envelope and tagged event schemas
//! - `conversion`: DTO ↔ domain entity conversion

pub mod conversion;
pub mod wire;

pub use wire::{ChatMessageDto, InboundEvent, OutboundEvent, WireFrame};
