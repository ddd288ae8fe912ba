//! Client Flags
//!
//! Bitfield flags for bind functions, maximise requests, size hints and
//! window types.

use bitflags::bitflags;

bitflags! {
    /// Modifiers attached to a bound function.  The low byte of a bind's
    /// flag word carries its numeric value and is kept separately.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FuncFlags: u32 {
        const UP       = 1 << 8;
        const DOWN     = 1 << 9;
        const LEFT     = 1 << 10;
        const RIGHT    = 1 << 11;
        const TOP      = 1 << 12;
        const BOTTOM   = 1 << 13;
        const RELATIVE = 1 << 14;
        const TOGGLE   = 1 << 18;

        const VERT = Self::TOP.bits() | Self::BOTTOM.bits();
        const HORZ = Self::LEFT.bits() | Self::RIGHT.bits();
    }
}

impl FuncFlags {
    pub fn from_token(name: &str) -> Option<Self> {
        Some(match name {
            "up" => Self::UP,
            "down" => Self::DOWN,
            "left" => Self::LEFT,
            "right" => Self::RIGHT,
            "top" => Self::TOP,
            "bottom" => Self::BOTTOM,
            "relative" | "rel" => Self::RELATIVE,
            "toggle" => Self::TOGGLE,
            "vertical" | "v" => Self::VERT,
            "horizontal" | "h" => Self::HORZ,
            _ => return None,
        })
    }
}

bitflags! {
    /// Axes (and target) of a maximise request.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Maximise: u8 {
        const HORZ   = 1 << 0;
        const VERT   = 1 << 1;
        /// Use the whole screen rather than the client's monitor.
        const SCREEN = 1 << 2;
    }
}

bitflags! {
    /// WM_NORMAL_HINTS flag word (ICCCM 4.1.2.3).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SizeHintFlags: u32 {
        const US_POSITION  = 1 << 0;
        const US_SIZE      = 1 << 1;
        const P_POSITION   = 1 << 2;
        const P_SIZE       = 1 << 3;
        const P_MIN_SIZE   = 1 << 4;
        const P_MAX_SIZE   = 1 << 5;
        const P_RESIZE_INC = 1 << 6;
        const P_ASPECT     = 1 << 7;
        const P_BASE_SIZE  = 1 << 8;
        const P_WIN_GRAVITY = 1 << 9;
    }
}

bitflags! {
    /// The subset of _NET_WM_WINDOW_TYPE values that change policy.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WindowType: u8 {
        const DESKTOP      = 1 << 0;
        const DOCK         = 1 << 1;
        const NOTIFICATION = 1 << 2;
    }
}

bitflags! {
    /// Values published in a client's _NET_WM_STATE.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NetWmState: u8 {
        const MAXIMIZED_VERT = 1 << 0;
        const MAXIMIZED_HORZ = 1 << 1;
        const FULLSCREEN     = 1 << 2;
        const FOCUSED        = 1 << 3;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_names() {
        assert_eq!(FuncFlags::from_token("v"), Some(FuncFlags::TOP | FuncFlags::BOTTOM));
        assert_eq!(FuncFlags::from_token("rel"), Some(FuncFlags::RELATIVE));
        assert_eq!(FuncFlags::from_token("sideways"), None);
    }
}
