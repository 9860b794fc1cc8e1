pub mod error;
pub mod factory;
pub mod poll;

pub use poll::{PollLoop, PollPhase, PollReport};
