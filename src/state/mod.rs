//! State module for tracking session progress
//!
//! # Components
//!
//! - `SessionState`: Lifecycle of a leech session

mod session_state;

pub use session_state::SessionState;
