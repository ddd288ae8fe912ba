//! Hints Module
//!
//! Decoding of WM_NORMAL_HINTS and _MOTIF_WM_HINTS into the constraints the
//! window manager actually applies.

use crate::shared::Gravity;
use crate::wm::client_flags::SizeHintFlags;

/// WM_NORMAL_HINTS as stored on the window (XSizeHints layout).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SizeHints {
    pub flags: SizeHintFlags,
    pub min_width: i32,
    pub min_height: i32,
    pub max_width: i32,
    pub max_height: i32,
    pub width_inc: i32,
    pub height_inc: i32,
    pub base_width: i32,
    pub base_height: i32,
    pub win_gravity: u32,
}

impl SizeHints {
    /// Parse the property's 32-bit values.  Pre-ICCCM clients write 15 values
    /// without base size and gravity; those flags are masked off.
    pub fn from_values(values: &[u32]) -> Option<Self> {
        if values.len() < 15 {
            return None;
        }
        let v = |i: usize| values.get(i).copied().unwrap_or(0) as i32;
        let mut flags = SizeHintFlags::from_bits_truncate(values[0]);
        if values.len() < 18 {
            flags -= SizeHintFlags::P_BASE_SIZE | SizeHintFlags::P_WIN_GRAVITY;
        }
        Some(Self {
            flags,
            min_width: v(5),
            min_height: v(6),
            max_width: v(7),
            max_height: v(8),
            width_inc: v(9),
            height_inc: v(10),
            base_width: v(15),
            base_height: v(16),
            win_gravity: values.get(17).copied().unwrap_or(0),
        })
    }
}

/// Size constraints derived from a client's normal hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalHints {
    pub flags: SizeHintFlags,
    pub min_width: i32,
    pub min_height: i32,
    /// Zero means unbounded.
    pub max_width: i32,
    pub max_height: i32,
    pub base_width: i32,
    pub base_height: i32,
    pub width_inc: i32,
    pub height_inc: i32,
    pub gravity: Gravity,
}

impl NormalHints {
    pub fn from_size_hints(hints: Option<&SizeHints>) -> Self {
        let empty = SizeHints::default();
        let size = hints.unwrap_or(&empty);
        let flags = size.flags;

        let (mut min_width, mut min_height) = if flags.contains(SizeHintFlags::P_MIN_SIZE) {
            (size.min_width, size.min_height)
        } else {
            (0, 0)
        };
        let (max_width, max_height) = if flags.contains(SizeHintFlags::P_MAX_SIZE) {
            (size.max_width, size.max_height)
        } else {
            (0, 0)
        };
        let (base_width, base_height) = if flags.contains(SizeHintFlags::P_BASE_SIZE) {
            (size.base_width, size.base_height)
        } else {
            (min_width, min_height)
        };
        let (mut width_inc, mut height_inc) = (1, 1);
        if flags.contains(SizeHintFlags::P_RESIZE_INC) {
            width_inc = if size.width_inc > 0 { size.width_inc } else { 1 };
            height_inc = if size.height_inc > 0 { size.height_inc } else { 1 };
        }
        if !flags.contains(SizeHintFlags::P_MIN_SIZE) {
            min_width = base_width + width_inc;
            min_height = base_height + height_inc;
        }
        let gravity = if flags.contains(SizeHintFlags::P_WIN_GRAVITY) {
            Gravity::from_u32(size.win_gravity).unwrap_or_default()
        } else {
            Gravity::NorthWest
        };

        Self {
            flags,
            min_width,
            min_height,
            max_width,
            max_height,
            base_width,
            base_height,
            width_inc,
            height_inc,
            gravity,
        }
    }

    /// A window whose minimum and maximum sizes agree cannot be resized.
    pub fn is_fixed_size(&self) -> bool {
        self.max_width != 0
            && self.max_height != 0
            && self.max_width == self.min_width
            && self.max_height == self.min_height
    }
}

pub const MWM_HINTS_DECORATIONS: u32 = 1 << 1;
pub const MWM_DECOR_ALL: u32 = 1 << 0;
pub const MWM_DECOR_BORDER: u32 = 1 << 1;

/// Motif WM hints (_MOTIF_WM_HINTS)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotifWmHints {
    pub flags: u32,
    pub functions: u32,
    pub decorations: u32,
}

impl MotifWmHints {
    pub fn from_values(values: &[u32]) -> Option<Self> {
        if values.len() < 3 {
            return None;
        }
        Some(Self {
            flags: values[0],
            functions: values[1],
            decorations: values[2],
        })
    }

    /// Border the client should get, given the configured border width.
    pub fn border(hints: Option<&Self>, border_width: i32) -> i32 {
        match hints {
            Some(h)
                if h.flags & MWM_HINTS_DECORATIONS != 0
                    && h.decorations & (MWM_DECOR_ALL | MWM_DECOR_BORDER) == 0 =>
            {
                0
            }
            _ => border_width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(flags: SizeHintFlags) -> Vec<u32> {
        let mut v = vec![0u32; 18];
        v[0] = flags.bits();
        v
    }

    #[test]
    fn missing_hints_use_defaults() {
        let h = NormalHints::from_size_hints(None);
        assert_eq!((h.min_width, h.min_height), (1, 1));
        assert_eq!((h.max_width, h.max_height), (0, 0));
        assert_eq!((h.width_inc, h.height_inc), (1, 1));
        assert_eq!(h.gravity, Gravity::NorthWest);
    }

    #[test]
    fn base_size_without_min_derives_min() {
        let mut v = values(SizeHintFlags::P_BASE_SIZE | SizeHintFlags::P_RESIZE_INC);
        v[9] = 6;
        v[10] = 13;
        v[15] = 4;
        v[16] = 2;
        let h = NormalHints::from_size_hints(SizeHints::from_values(&v).as_ref());
        assert_eq!((h.base_width, h.base_height), (4, 2));
        assert_eq!((h.min_width, h.min_height), (10, 15));
    }

    #[test]
    fn zero_increment_becomes_one() {
        let mut v = values(SizeHintFlags::P_RESIZE_INC | SizeHintFlags::P_MIN_SIZE);
        v[5] = 50;
        v[6] = 40;
        let h = NormalHints::from_size_hints(SizeHints::from_values(&v).as_ref());
        assert_eq!((h.width_inc, h.height_inc), (1, 1));
        assert_eq!((h.base_width, h.base_height), (50, 40));
    }

    #[test]
    fn short_property_drops_gravity() {
        let mut v = values(SizeHintFlags::P_WIN_GRAVITY);
        v.truncate(15);
        let h = SizeHints::from_values(&v).unwrap();
        assert!(!h.flags.contains(SizeHintFlags::P_WIN_GRAVITY));
        assert!(SizeHints::from_values(&v[..10]).is_none());
    }

    #[test]
    fn fixed_size_detection() {
        let mut v = values(SizeHintFlags::P_MIN_SIZE | SizeHintFlags::P_MAX_SIZE);
        v[5] = 200;
        v[6] = 100;
        v[7] = 200;
        v[8] = 100;
        let h = NormalHints::from_size_hints(SizeHints::from_values(&v).as_ref());
        assert!(h.is_fixed_size());
    }

    #[test]
    fn motif_border() {
        let none = MotifWmHints { flags: MWM_HINTS_DECORATIONS, functions: 0, decorations: 0 };
        let border = MotifWmHints { decorations: MWM_DECOR_BORDER, ..none };
        assert_eq!(MotifWmHints::border(Some(&none), 2), 0);
        assert_eq!(MotifWmHints::border(Some(&border), 2), 2);
        assert_eq!(MotifWmHints::border(None, 2), 2);
    }
}
