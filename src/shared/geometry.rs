//! Rectangle math and ICCCM window gravity.

/// An axis-aligned rectangle in root window coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn area(&self) -> i64 {
        i64::from(self.width) * i64::from(self.height)
    }

    /// Area shared with `other`, zero when they do not overlap.
    pub fn intersection_area(&self, other: &Rect) -> i64 {
        let x0 = self.x.max(other.x);
        let x1 = (self.x + self.width).min(other.x + other.width);
        let y0 = self.y.max(other.y);
        let y1 = (self.y + self.height).min(other.y + other.height);
        if x1 <= x0 || y1 <= y0 {
            return 0;
        }
        i64::from(x1 - x0) * i64::from(y1 - y0)
    }

    pub fn midpoint(&self) -> (f64, f64) {
        (
            f64::from(self.x) + f64::from(self.width) / 2.0,
            f64::from(self.y) + f64::from(self.height) / 2.0,
        )
    }

    /// Euclidean distance between the centres of two rectangles.
    pub fn midpoint_distance(&self, other: &Rect) -> f64 {
        let (ax, ay) = self.midpoint();
        let (bx, by) = other.midpoint();
        ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
    }
}

/// Window gravity as carried in WM_NORMAL_HINTS and ConfigureRequest handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gravity {
    #[default]
    NorthWest,
    North,
    NorthEast,
    West,
    Center,
    East,
    SouthWest,
    South,
    SouthEast,
    Static,
}

impl Gravity {
    /// Decode the protocol value.  ForgetGravity (0) and anything unknown map
    /// to `None`; callers fall back to the client's hinted gravity.
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            1 => Gravity::NorthWest,
            2 => Gravity::North,
            3 => Gravity::NorthEast,
            4 => Gravity::West,
            5 => Gravity::Center,
            6 => Gravity::East,
            7 => Gravity::SouthWest,
            8 => Gravity::South,
            9 => Gravity::SouthEast,
            10 => Gravity::Static,
            _ => return None,
        })
    }

    /// Offset applied to a client's position when its border changes by `bw`.
    pub fn border_offset(self, bw: i32) -> (i32, i32) {
        match self {
            Gravity::NorthWest | Gravity::Static => (bw, bw),
            Gravity::North => (0, bw),
            Gravity::NorthEast => (-bw, bw),
            Gravity::East => (-bw, 0),
            Gravity::Center => (0, 0),
            Gravity::West => (bw, 0),
            Gravity::SouthWest => (bw, -bw),
            Gravity::South => (0, -bw),
            Gravity::SouthEast => (-bw, -bw),
        }
    }

    /// Amount to subtract from a window's position when it grows by
    /// (`dw`, `dh`) and its reference point must stay put.
    pub fn resize_offset(self, dw: i32, dh: i32) -> (i32, i32) {
        match self {
            Gravity::NorthWest | Gravity::Static => (0, 0),
            Gravity::North => (dw / 2, 0),
            Gravity::NorthEast => (dw, 0),
            Gravity::West => (0, dh / 2),
            Gravity::Center => (dw / 2, dh / 2),
            Gravity::East => (dw, dh / 2),
            Gravity::SouthWest => (0, dh),
            Gravity::South => (dw / 2, dh),
            Gravity::SouthEast => (dw, dh),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_of_disjoint_rects_is_empty() {
        let a = Rect::new(0, 0, 100, 100);
        let b = Rect::new(100, 0, 100, 100);
        assert_eq!(a.intersection_area(&b), 0);
        assert_eq!(a.intersection_area(&Rect::new(50, 50, 100, 100)), 2500);
    }

    #[test]
    fn midpoint_distance() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(30, 40, 10, 10);
        assert_eq!(a.midpoint_distance(&b), 50.0);
    }

    #[test]
    fn gravity_border_offsets_cancel() {
        for g in 1..=9 {
            let gravity = Gravity::from_u32(g).unwrap();
            let (x, y) = gravity.border_offset(3);
            let (bx, by) = gravity.border_offset(-3);
            assert_eq!((x + bx, y + by), (0, 0));
        }
        assert_eq!(Gravity::from_u32(0), None);
    }

    #[test]
    fn resize_offset_follows_anchor() {
        assert_eq!(Gravity::SouthEast.resize_offset(20, 10), (20, 10));
        assert_eq!(Gravity::Center.resize_offset(20, 10), (10, 5));
        assert_eq!(Gravity::NorthWest.resize_offset(20, 10), (0, 0));
    }
}
