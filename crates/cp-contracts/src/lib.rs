//! # cp-contracts
//!
//! Contracts check the principal's role and the shape of a request before
//! any core operation reads or writes the store.

pub mod assignments;
pub mod base;
pub mod completion;
pub mod deletion;
pub mod progress;
pub mod schedule;

pub use assignments::*;
pub use base::*;
pub use completion::*;
pub use deletion::*;
pub use progress::*;
pub use schedule::*;
