use std::collections::{BTreeMap, HashMap};

use x11rb::protocol::xproto::{Colormap, Window};

use crate::shared::{Gravity, Rect};
use crate::wm::hints::NormalHints;

/// vdesk value for clients visible on every virtual desktop.
pub const VDESK_FIXED: u32 = 0xffff_ffff;
/// vdesk value in application rules meaning "leave it alone".
pub const VDESK_NONE: u32 = 0xffff_fffe;

/// Window Manager client state
/// Represents a window being managed by the WM
#[derive(Debug, Clone)]
pub struct Client {
    /// Application window
    pub window: Window,
    /// Frame we reparent the application window into; it carries the border
    pub frame: Window,
    /// Index into the manager's screen list
    pub screen: usize,
    pub colormap: Colormap,

    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub border: i32,
    /// Border used whenever the client is not fully maximised
    pub normal_border: i32,
    /// Border width the window had before we managed it
    pub old_border: i32,

    /// Geometry saved by maximise.  A non-zero `oldw`/`oldh` means the
    /// client is maximised along that axis.
    pub oldx: i32,
    pub oldy: i32,
    pub oldw: i32,
    pub oldh: i32,

    /// Position within the owning monitor as a fraction of its size, kept
    /// across a screen resize.
    pub mon_offx: f64,
    pub mon_offy: f64,

    pub hints: NormalHints,
    pub win_gravity: Gravity,

    pub vdesk: u32,
    pub ignore_unmap: u32,
    pub remove: bool,
    pub is_dock: bool,
}

impl Client {
    pub fn new(window: Window, screen: usize, hints: NormalHints) -> Self {
        Self {
            window,
            frame: 0,
            screen,
            colormap: 0,
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            border: 0,
            normal_border: 0,
            old_border: 0,
            oldx: 0,
            oldy: 0,
            oldw: 0,
            oldh: 0,
            mon_offx: 0.0,
            mon_offy: 0.0,
            win_gravity: hints.gravity,
            hints,
            vdesk: 0,
            ignore_unmap: 0,
            remove: false,
            is_dock: false,
        }
    }

    pub fn is_fixed(&self) -> bool {
        self.vdesk == VDESK_FIXED
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    /// Client area plus border, in root coordinates.
    pub fn outer_rect(&self) -> Rect {
        Rect::new(
            self.x - self.border,
            self.y - self.border,
            self.width + 2 * self.border,
            self.height + 2 * self.border,
        )
    }

    /// Replace size constraints after WM_NORMAL_HINTS changed.
    pub fn set_hints(&mut self, hints: NormalHints) {
        self.hints = hints;
        self.win_gravity = hints.gravity;
    }

    /// Shift the client to account for a border of `bw` according to its
    /// gravity.  An axis is left alone when the client exactly covers the
    /// screen along it.
    pub fn gravitate(&mut self, bw: i32, screen_width: i32, screen_height: i32) {
        let (dx, dy) = self.win_gravity.border_offset(bw);
        if self.x != 0 || self.width != screen_width {
            self.x += dx;
        }
        if self.y != 0 || self.height != screen_height {
            self.y += dy;
        }
    }

    pub fn clamp_size(&mut self) {
        let h = &self.hints;
        if self.width < h.min_width {
            self.width = h.min_width;
        }
        if h.max_width != 0 && self.width > h.max_width {
            self.width = h.max_width;
        }
        if self.height < h.min_height {
            self.height = h.min_height;
        }
        if h.max_height != 0 && self.height > h.max_height {
            self.height = h.max_height;
        }
    }

    /// Keyboard move/resize step: the hinted increment, or 16 pixels for
    /// clients that resize freely.
    pub fn step(&self) -> (i32, i32) {
        let w = if self.hints.width_inc > 1 { self.hints.width_inc } else { 16 };
        let h = if self.hints.height_inc > 1 { self.hints.height_inc } else { 16 };
        (w, h)
    }

    /// Size expressed in resize increments above the base size.
    pub fn size_in_increments(&self) -> (i32, i32) {
        (
            (self.width - self.hints.base_width) / self.hints.width_inc,
            (self.height - self.hints.base_height) / self.hints.height_inc,
        )
    }
}

/// All managed clients plus the three orderings the manager maintains.
///
/// `tab` is most-recently-used first; `mapping` is in order of management;
/// `stacking` runs bottom to top.
#[derive(Debug, Default)]
pub struct Clients {
    map: BTreeMap<Window, Client>,
    frames: HashMap<Window, Window>,
    pub tab: Vec<Window>,
    pub mapping: Vec<Window>,
    pub stacking: Vec<Window>,
}

impl Clients {
    pub fn insert(&mut self, client: Client) {
        let window = client.window;
        if client.frame != 0 {
            self.frames.insert(client.frame, window);
        }
        self.map.insert(window, client);
        self.tab.insert(0, window);
        self.mapping.push(window);
        self.stacking.push(window);
    }

    /// Record the frame once it has been created.
    pub fn set_frame(&mut self, window: Window, frame: Window) {
        if let Some(c) = self.map.get_mut(&window) {
            c.frame = frame;
            self.frames.insert(frame, window);
        }
    }

    pub fn remove(&mut self, window: Window) -> Option<Client> {
        let client = self.map.remove(&window)?;
        self.frames.remove(&client.frame);
        self.tab.retain(|w| *w != window);
        self.mapping.retain(|w| *w != window);
        self.stacking.retain(|w| *w != window);
        Some(client)
    }

    /// Resolve either an application window or a frame to the client window.
    pub fn find(&self, window: Window) -> Option<Window> {
        if self.map.contains_key(&window) {
            Some(window)
        } else {
            self.frames.get(&window).copied()
        }
    }

    pub fn get(&self, window: Window) -> Option<&Client> {
        self.map.get(&window)
    }

    pub fn get_mut(&mut self, window: Window) -> Option<&mut Client> {
        self.map.get_mut(&window)
    }

    pub fn contains(&self, window: Window) -> bool {
        self.map.contains_key(&window)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Client> {
        self.map.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Client> {
        self.map.values_mut()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn to_tab_head(&mut self, window: Window) {
        move_to_front(&mut self.tab, window);
    }

    pub fn to_stacking_top(&mut self, window: Window) {
        if let Some(pos) = self.stacking.iter().position(|w| *w == window) {
            let w = self.stacking.remove(pos);
            self.stacking.push(w);
        }
    }

    pub fn to_stacking_bottom(&mut self, window: Window) {
        move_to_front(&mut self.stacking, window);
    }
}

fn move_to_front(list: &mut Vec<Window>, window: Window) {
    if let Some(pos) = list.iter().position(|w| *w == window) {
        let w = list.remove(pos);
        list.insert(0, w);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(window: Window, frame: Window) -> Client {
        let mut c = Client::new(window, 0, NormalHints::from_size_hints(None));
        c.frame = frame;
        c
    }

    #[test]
    fn orderings_track_insertion() {
        let mut clients = Clients::default();
        clients.insert(client(1, 101));
        clients.insert(client(2, 102));
        clients.insert(client(3, 103));
        assert_eq!(clients.tab, vec![3, 2, 1]);
        assert_eq!(clients.mapping, vec![1, 2, 3]);
        assert_eq!(clients.stacking, vec![1, 2, 3]);

        clients.to_stacking_top(1);
        clients.to_tab_head(1);
        assert_eq!(clients.stacking, vec![2, 3, 1]);
        assert_eq!(clients.tab, vec![1, 3, 2]);
        clients.to_stacking_bottom(3);
        assert_eq!(clients.stacking, vec![3, 2, 1]);
    }

    #[test]
    fn find_by_frame_and_remove() {
        let mut clients = Clients::default();
        clients.insert(client(1, 101));
        clients.insert(client(2, 102));
        assert_eq!(clients.find(102), Some(2));
        assert_eq!(clients.find(2), Some(2));
        assert_eq!(clients.find(999), None);

        let removed = clients.remove(2).unwrap();
        assert_eq!(removed.frame, 102);
        assert_eq!(clients.find(102), None);
        assert_eq!(clients.tab, vec![1]);
        assert_eq!(clients.mapping, vec![1]);
        assert_eq!(clients.stacking, vec![1]);
    }

    #[test]
    fn gravitate_skips_screen_spanning_axis() {
        let mut c = client(1, 101);
        c.width = 1024;
        c.height = 100;
        c.gravitate(2, 1024, 768);
        assert_eq!((c.x, c.y), (0, 2));

        c.win_gravity = Gravity::SouthEast;
        c.x = 10;
        c.gravitate(2, 1024, 768);
        assert_eq!((c.x, c.y), (8, 0));
    }

    #[test]
    fn keyboard_step_defaults_to_sixteen() {
        let mut c = client(1, 101);
        assert_eq!(c.step(), (16, 16));
        c.hints.width_inc = 7;
        assert_eq!(c.step(), (7, 16));
    }
}
