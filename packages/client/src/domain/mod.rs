//! Domain layer for the chat session.
//!
//! This module contains value objects and entities that are independent of
//! wire DTOs and transport concerns.

pub mod error;
pub mod message;

pub use error::ValueObjectError;
pub use message::{Message, MessageText, Timestamp};
