pub mod conversation;
pub mod workflow;

pub use conversation::*;
pub use workflow::*;
