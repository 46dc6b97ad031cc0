//! Preview rendering surface: frames, layout measurement, and the script sandbox.

pub mod frame;
pub mod layout;

#[cfg(feature = "scripting")]
pub mod sandbox;

pub use frame::{Frame, FrameGeometry, FrameLoad, LoadSettings};
