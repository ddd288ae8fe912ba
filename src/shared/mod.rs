//! Plain data shared by the window manager core and the X11 backend.

pub mod geometry;

pub use geometry::{Gravity, Rect};
