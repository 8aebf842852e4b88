//! Core types for autohelm.

pub mod message;
pub mod stream;
pub mod task;
pub mod todo;

pub use message::*;
pub use stream::*;
pub use task::*;
pub use todo::*;
