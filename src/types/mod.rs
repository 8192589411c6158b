//! Core types for the deferral engine.
//!
//! - [`value`]: Dynamically typed settlement payload
//! - [`fault`]: Error payload carried by rejections
//! - [`settlement`]: The one-time transition out of pending
//! - [`completion`]: Tagged result variant returned by continuation handlers

pub mod completion;
pub mod fault;
pub mod settlement;
pub mod value;

pub use completion::Completion;
pub use fault::Fault;
pub use settlement::Settlement;
pub use value::Value;
