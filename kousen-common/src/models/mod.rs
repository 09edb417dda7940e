// File: kousen-common/src/models/mod.rs
pub mod message;
pub mod twilight;

pub use message::{Author, CurrentUser, MessageEvent, SentMessage};
