//! Resource lifecycle engines built on the coordination core.

pub mod recordings;
pub mod rooms;
