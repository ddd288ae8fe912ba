//! Move/Resize Module
//!
//! Geometry operations on clients: programmatic move and resize, maximise,
//! snapping, and the interactive drag, sweep and info modes.
//!
//! Interactive operations do not block.  Starting one grabs the pointer or
//! keyboard and records a [`Mode`]; the event loop feeds motion and release
//! events back here until the initiating button or key is released.

use tracing::debug;
use x11rb::protocol::xproto::{ConfigureWindowAux, Keycode, Window};

use crate::error::Result;
use crate::shared::Rect;
use crate::wm::client::Client;
use crate::wm::client_flags::Maximise;
use crate::wm::display::{
    Axis, ButtonEvent, CursorShape, DisplayServer, KeyEvent, MotionEvent, Outline, Property,
    PropertyName,
};
use crate::wm::{tolerate, WindowManager};

/// _NET_WM_STATE style action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateAction {
    Remove,
    Add,
    Toggle,
}

impl StateAction {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(StateAction::Remove),
            1 => Some(StateAction::Add),
            2 => Some(StateAction::Toggle),
            _ => None,
        }
    }
}

/// What ends an info display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Key(Keycode),
    Button(u8),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Drag {
    pub window: Window,
    pub root: Window,
    pub button: u8,
    /// Pointer position when the drag started
    pub origin: (i32, i32),
    /// Client position when the drag started
    pub start: (i32, i32),
    pub monitor: Rect,
    /// Outline currently on screen (outline mode only)
    pub outline: Option<Outline>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sweep {
    pub window: Window,
    pub root: Window,
    pub button: u8,
    /// Corner that stays put
    pub anchor: (i32, i32),
    pub outline: Outline,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InfoDisplay {
    pub window: Window,
    pub root: Window,
    pub trigger: Trigger,
    pub outline: Outline,
}

/// Interaction state driven by the event loop.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Mode {
    #[default]
    Idle,
    Dragging(Drag),
    Sweeping(Sweep),
    ShowingInfo(InfoDisplay),
    /// Cycling through clients while the keyboard is grabbed
    Cycling { root: Window, keycode: Keycode },
}

impl Mode {
    pub fn is_idle(&self) -> bool {
        matches!(self, Mode::Idle)
    }

    pub(crate) fn window(&self) -> Option<Window> {
        match self {
            Mode::Dragging(d) => Some(d.window),
            Mode::Sweeping(s) => Some(s.window),
            Mode::ShowingInfo(i) => Some(i.window),
            Mode::Idle | Mode::Cycling { .. } => None,
        }
    }
}

/// Outline for a client, labelled with its size in resize increments and
/// its position.
pub fn outline_for(c: &Client) -> Outline {
    let (w, h) = c.size_in_increments();
    Outline {
        rect: c.rect(),
        border: c.border,
        label: Some(format!("{}x{}+{}+{}", w, h, c.x, c.y)),
    }
}

/// Resize from the fixed corner (x1, y1) towards the pointer (x2, y2).  Only
/// axes that are not maximised change, unless `force` is set; a changed axis
/// stops being maximised.
pub fn recalculate_sweep(c: &mut Client, x1: i32, y1: i32, x2: i32, y2: i32, force: bool) {
    let h = c.hints;
    if force || c.oldw == 0 {
        c.oldw = 0;
        c.width = (x1 - x2).abs();
        c.width -= (c.width - h.base_width) % h.width_inc;
        if h.min_width != 0 && c.width < h.min_width {
            c.width = h.min_width;
        }
        if h.max_width != 0 && c.width > h.max_width {
            c.width = h.max_width;
        }
        c.x = if x1 <= x2 { x1 } else { x1 - c.width };
    }
    if force || c.oldh == 0 {
        c.oldh = 0;
        c.height = (y1 - y2).abs();
        c.height -= (c.height - h.base_height) % h.height_inc;
        if h.min_height != 0 && c.height < h.min_height {
            c.height = h.min_height;
        }
        if h.max_height != 0 && c.height > h.max_height {
            c.height = h.max_height;
        }
        c.y = if y1 <= y2 { y1 } else { y1 - c.height };
    }
}

fn absmin(a: i32, b: i32) -> i32 {
    if a.abs() < b.abs() { a } else { b }
}

/// Snap a client to nearby edges of `others`, then to the monitor edges,
/// when within `snap` pixels.
pub fn snap_client<'a>(
    c: &mut Client,
    others: impl IntoIterator<Item = &'a Client>,
    monitor: Rect,
    snap: i32,
) {
    let (mut dx, mut dy) = (snap, snap);
    for ci in others {
        if ci.y - ci.border - c.border - c.height - c.y <= snap
            && c.y - c.border - ci.border - ci.height - ci.y <= snap
        {
            dx = absmin(dx, ci.x + ci.width - c.x + c.border + ci.border);
            dx = absmin(dx, ci.x + ci.width - c.x - c.width);
            dx = absmin(dx, ci.x - c.x - c.width - c.border - ci.border);
            dx = absmin(dx, ci.x - c.x);
        }
        if ci.x - ci.border - c.border - c.width - c.x <= snap
            && c.x - c.border - ci.border - ci.width - ci.x <= snap
        {
            dy = absmin(dy, ci.y + ci.height - c.y + c.border + ci.border);
            dy = absmin(dy, ci.y + ci.height - c.y - c.height);
            dy = absmin(dy, ci.y - c.y - c.height - c.border - ci.border);
            dy = absmin(dy, ci.y - c.y);
        }
    }
    if dx.abs() < snap {
        c.x += dx;
    }
    if dy.abs() < snap {
        c.y += dy;
    }

    let m = monitor;
    if (c.x - c.border - m.x).abs() < snap {
        c.x = m.x + c.border;
    }
    if (c.y - c.border - m.y).abs() < snap {
        c.y = m.y + c.border;
    }
    if (c.x + c.width + c.border - m.x - m.width).abs() < snap {
        c.x = m.x + m.width - c.width - c.border;
    }
    if (c.y + c.height + c.border - m.y - m.height).abs() < snap {
        c.y = m.y + m.height - c.height - c.border;
    }

    if c.x.abs() == m.x + c.border && c.width == m.width {
        c.x = m.x;
    }
    if c.y.abs() == m.y + c.border && c.height == m.height {
        c.y = m.y;
    }
}

impl<D: DisplayServer> WindowManager<D> {
    /// Push the client's geometry to its frame and window.
    pub fn moveresize(&mut self, window: Window) -> Result<()> {
        let Some(c) = self.clients.get(window) else {
            return Ok(());
        };
        let (frame, x, y, w, h, bw) = (c.frame, c.x, c.y, c.width, c.height, c.border);
        self.display.configure(
            frame,
            &ConfigureWindowAux::new()
                .x(x - bw)
                .y(y - bw)
                .width(w.max(1) as u32)
                .height(h.max(1) as u32),
        )?;
        self.display.configure(
            window,
            &ConfigureWindowAux::new()
                .x(0)
                .y(0)
                .width(w.max(1) as u32)
                .height(h.max(1) as u32),
        )?;
        self.send_config(window)
    }

    pub fn moveresizeraise(&mut self, window: Window) -> Result<()> {
        self.raise(window)?;
        self.moveresize(window)
    }

    /// Apply the client's position after a keyboard move or resize: keep
    /// maximised axes flush with the edge, honour size limits, and drop the
    /// enter events the move will cause.
    pub fn place_client(&mut self, window: Window) -> Result<()> {
        let Some(c) = self.clients.get_mut(window) else {
            return Ok(());
        };
        if c.x.abs() == c.border && c.oldw != 0 {
            c.x = 0;
        }
        if c.y.abs() == c.border && c.oldh != 0 {
            c.y = 0;
        }
        c.clamp_size();
        self.moveresizeraise(window)?;
        self.discard_enter_events(window)
    }

    /// Maximise or restore a client along the given axes, to its monitor or
    /// (with `Maximise::SCREEN`) the whole screen.
    pub fn maximise(&mut self, window: Window, action: StateAction, axes: Maximise) -> Result<()> {
        let Some(c) = self.clients.get(window) else {
            return Ok(());
        };
        let screen = &self.screens[c.screen];
        let target = if axes.contains(Maximise::SCREEN) {
            screen.bounds()
        } else {
            screen.client_monitor(c).0
        };
        let restore = matches!(action, StateAction::Remove | StateAction::Toggle);
        let save = matches!(action, StateAction::Add | StateAction::Toggle);

        let mut writes: Vec<Property> = Vec::new();
        let mut deletes: Vec<PropertyName> = Vec::new();
        let Some(c) = self.clients.get_mut(window) else {
            return Ok(());
        };
        if axes.contains(Maximise::HORZ) {
            if c.oldw != 0 {
                if restore {
                    c.x = c.oldx;
                    c.width = c.oldw;
                    c.oldw = 0;
                    deletes.push(PropertyName::Unmaximised(Axis::Horz));
                }
            } else if save {
                c.oldx = c.x;
                c.oldw = c.width;
                c.x = target.x;
                c.width = target.width;
                writes.push(Property::Unmaximised(Axis::Horz, c.oldx, c.oldw));
            }
        }
        if axes.contains(Maximise::VERT) {
            if c.oldh != 0 {
                if restore {
                    c.y = c.oldy;
                    c.height = c.oldh;
                    c.oldh = 0;
                    deletes.push(PropertyName::Unmaximised(Axis::Vert));
                }
            } else if save {
                c.oldy = c.y;
                c.oldh = c.height;
                c.y = target.y;
                c.height = target.height;
                writes.push(Property::Unmaximised(Axis::Vert, c.oldy, c.oldh));
            }
        }

        let mut border_changed = false;
        if c.oldw != 0 && c.oldh != 0 {
            if c.border != 0 {
                c.border = 0;
                border_changed = true;
            }
        } else if c.border == 0 && c.normal_border != 0 {
            c.border = c.normal_border;
            border_changed = true;
        }
        let (frame, border) = (c.frame, c.border);
        debug!("Maximise 0x{:x} {:?} {:?}", window, action, axes);

        for name in deletes {
            self.display.delete_property(window, name)?;
        }
        for property in writes {
            self.display.set_property(window, property)?;
        }
        if border_changed {
            self.display.configure(
                frame,
                &ConfigureWindowAux::new().border_width(border as u32),
            )?;
            self.display.set_property(window, Property::FrameExtents(border))?;
        }
        self.update_net_wm_state(window)?;
        self.moveresizeraise(window)?;
        self.discard_enter_events(window)
    }

    fn draw(&mut self, root: Window, outline: &Outline) -> Result<()> {
        self.display.draw_outline(root, outline)
    }

    /// Begin moving a client with the pointer.
    pub fn start_drag(&mut self, window: Window, button: u8) -> Result<()> {
        if !self.mode.is_idle() {
            return Ok(());
        }
        let Some(c) = self.clients.get(window) else {
            return Ok(());
        };
        let screen = &self.screens[c.screen];
        let root = screen.root;
        let monitor = screen.client_monitor(c).0;
        if !self.display.grab_pointer(root, CursorShape::Move)? {
            return Ok(());
        }
        self.raise(window)?;
        let Some(c) = self.clients.get(window) else {
            return Ok(());
        };
        let start = (c.x, c.y);
        let outline = (!self.config.behavior.solid_drag).then(|| outline_for(c));
        let pointer = self.display.query_pointer(root)?;
        if let Some(outline) = &outline {
            self.display.grab_server()?;
            self.draw(root, outline)?;
        }
        self.mode = Mode::Dragging(Drag {
            window,
            root,
            button,
            origin: (pointer.x, pointer.y),
            start,
            monitor,
            outline,
        });
        Ok(())
    }

    /// Begin resizing a client with the pointer, which is warped to the
    /// client's bottom-right corner.
    pub fn start_sweep(&mut self, window: Window, button: u8) -> Result<()> {
        if !self.mode.is_idle() {
            return Ok(());
        }
        let Some(root) = self.clients.get(window).map(|c| self.screens[c.screen].root) else {
            return Ok(());
        };
        if !self.display.grab_pointer(root, CursorShape::Resize)? {
            return Ok(());
        }
        self.raise(window)?;
        let Some(c) = self.clients.get(window) else {
            return Ok(());
        };
        let anchor = (c.x, c.y);
        let (w, h) = (c.width, c.height);
        let outline = outline_for(c);
        self.display.grab_server()?;
        self.draw(root, &outline)?;
        self.display.warp_pointer(window, w, h)?;
        self.mode = Mode::Sweeping(Sweep { window, root, button, anchor, outline });
        Ok(())
    }

    /// Show a client's geometry until the key or button that asked for it
    /// is released.
    pub fn start_info(&mut self, window: Window, trigger: Trigger) -> Result<()> {
        if !self.mode.is_idle() {
            return Ok(());
        }
        let Some(root) = self.clients.get(window).map(|c| self.screens[c.screen].root) else {
            return Ok(());
        };
        let grabbed = match trigger {
            Trigger::Key(_) => self.display.grab_keyboard(root)?,
            Trigger::Button(_) => self.display.grab_pointer(root, CursorShape::Unchanged)?,
        };
        if !grabbed {
            return Ok(());
        }
        let Some(outline) = self.clients.get(window).map(outline_for) else {
            return Ok(());
        };
        self.display.grab_server()?;
        self.draw(root, &outline)?;
        self.mode = Mode::ShowingInfo(InfoDisplay { window, root, trigger, outline });
        Ok(())
    }

    /// Begin most-recently-used cycling from a key press.
    pub fn start_cycle(&mut self, key: &KeyEvent) -> Result<()> {
        if !self.mode.is_idle() {
            return Ok(());
        }
        self.select_next()?;
        if self.display.grab_keyboard(key.root)? {
            self.mode = Mode::Cycling { root: key.root, keycode: key.keycode };
            Ok(())
        } else {
            self.finish_cycle()
        }
    }

    fn finish_cycle(&mut self) -> Result<()> {
        if let Some(current) = self.current {
            self.clients.to_tab_head(current);
        }
        Ok(())
    }

    pub(crate) fn mode_motion(&mut self, ev: &MotionEvent) -> Result<()> {
        match self.mode.clone() {
            Mode::Dragging(drag) if drag.root == ev.root => self.drag_motion(drag, ev),
            Mode::Sweeping(sweep) if sweep.root == ev.root => self.sweep_motion(sweep, ev),
            _ => Ok(()),
        }
    }

    fn drag_motion(&mut self, mut drag: Drag, ev: &MotionEvent) -> Result<()> {
        let window = drag.window;
        if let Some(outline) = drag.outline.take() {
            self.draw(drag.root, &outline)?;
            self.display.ungrab_server()?;
        }

        let snap = self.config.behavior.snap as i32;
        let use_snap = snap > 0 && ev.state & self.binds.modifiers.altmask == 0;
        let Some(mut c) = self.clients.get(window).cloned() else {
            self.mode = Mode::Idle;
            return self.display.ungrab_pointer();
        };
        c.x = drag.start.0 + (ev.root_x - drag.origin.0);
        c.y = drag.start.1 + (ev.root_y - drag.origin.1);
        if use_snap {
            let index = c.screen;
            let screen = &self.screens[index];
            let others = self.clients.tab.iter().filter_map(|w| self.clients.get(*w)).filter(|ci| {
                ci.window != window
                    && ci.screen == index
                    && screen.shows(ci)
                    && !(ci.is_dock && !screen.docks_visible)
            });
            snap_client(&mut c, others, drag.monitor, snap);
        }
        let (x, y, frame, bw) = (c.x, c.y, c.frame, c.border);
        let solid = self.config.behavior.solid_drag;
        let outline = (!solid).then(|| outline_for(&c));
        if let Some(stored) = self.clients.get_mut(window) {
            stored.x = x;
            stored.y = y;
        }

        if let Some(outline) = outline {
            self.display.sync()?;
            self.display.grab_server()?;
            self.draw(drag.root, &outline)?;
            drag.outline = Some(outline);
        } else {
            self.display
                .configure(frame, &ConfigureWindowAux::new().x(x - bw).y(y - bw))?;
            self.send_config(window)?;
        }
        self.mode = Mode::Dragging(drag);
        Ok(())
    }

    fn sweep_motion(&mut self, mut sweep: Sweep, ev: &MotionEvent) -> Result<()> {
        self.draw(sweep.root, &sweep.outline)?;
        self.display.ungrab_server()?;
        let force = ev.state & self.binds.modifiers.altmask != 0;
        let Some(c) = self.clients.get_mut(sweep.window) else {
            self.mode = Mode::Idle;
            return self.display.ungrab_pointer();
        };
        recalculate_sweep(c, sweep.anchor.0, sweep.anchor.1, ev.root_x, ev.root_y, force);
        sweep.outline = outline_for(c);
        self.display.sync()?;
        self.display.grab_server()?;
        self.draw(sweep.root, &sweep.outline)?;
        self.mode = Mode::Sweeping(sweep);
        Ok(())
    }

    pub(crate) fn mode_button_release(&mut self, ev: &ButtonEvent) -> Result<()> {
        match self.mode.clone() {
            Mode::Dragging(drag) if drag.button == ev.button => {
                self.mode = Mode::Idle;
                if let Some(outline) = &drag.outline {
                    self.draw(drag.root, outline)?;
                    self.display.ungrab_server()?;
                }
                self.display.ungrab_pointer()?;
                if drag.outline.is_some() {
                    self.moveresizeraise(drag.window)?;
                }
                Ok(())
            }
            Mode::Sweeping(sweep) if sweep.button == ev.button => {
                self.mode = Mode::Idle;
                self.draw(sweep.root, &sweep.outline)?;
                self.display.ungrab_server()?;
                self.display.ungrab_pointer()?;
                self.moveresizeraise(sweep.window)?;
                self.update_net_wm_state(sweep.window)
            }
            Mode::ShowingInfo(info) if info.trigger == Trigger::Button(ev.button) => {
                self.mode = Mode::Idle;
                self.draw(info.root, &info.outline)?;
                self.display.ungrab_server()?;
                self.display.ungrab_pointer()
            }
            _ => Ok(()),
        }
    }

    /// Key presses while a keyboard-driven mode is active.  Returns true
    /// when the press was consumed by the mode.
    pub(crate) fn mode_key_press(&mut self, ev: &KeyEvent) -> Result<bool> {
        match self.mode {
            Mode::Cycling { keycode, .. } => {
                if ev.keycode == keycode {
                    self.select_next()?;
                }
                Ok(true)
            }
            Mode::ShowingInfo(InfoDisplay { trigger: Trigger::Key(_), .. }) => Ok(true),
            _ => Ok(false),
        }
    }

    pub(crate) fn mode_key_release(&mut self, ev: &KeyEvent) -> Result<()> {
        match self.mode.clone() {
            Mode::ShowingInfo(info) if info.trigger == Trigger::Key(ev.keycode) => {
                self.mode = Mode::Idle;
                self.draw(info.root, &info.outline)?;
                self.display.ungrab_server()?;
                self.display.ungrab_keyboard()
            }
            Mode::Cycling { keycode, .. } if ev.keycode != keycode => {
                self.mode = Mode::Idle;
                self.display.ungrab_keyboard()?;
                self.finish_cycle()
            }
            _ => Ok(()),
        }
    }

    /// Drop whatever interaction is in progress, releasing its grabs.
    pub(crate) fn end_mode(&mut self) -> Result<()> {
        let mode = std::mem::take(&mut self.mode);
        match mode {
            Mode::Idle => Ok(()),
            Mode::Dragging(drag) => {
                if let Some(outline) = &drag.outline {
                    tolerate(self.draw(drag.root, outline))?;
                    self.display.ungrab_server()?;
                }
                self.display.ungrab_pointer()
            }
            Mode::Sweeping(sweep) => {
                tolerate(self.draw(sweep.root, &sweep.outline))?;
                self.display.ungrab_server()?;
                self.display.ungrab_pointer()
            }
            Mode::ShowingInfo(info) => {
                tolerate(self.draw(info.root, &info.outline))?;
                self.display.ungrab_server()?;
                match info.trigger {
                    Trigger::Key(_) => self.display.ungrab_keyboard(),
                    Trigger::Button(_) => self.display.ungrab_pointer(),
                }
            }
            Mode::Cycling { .. } => {
                self.display.ungrab_keyboard()?;
                self.finish_cycle()
            }
        }
    }

    /// End the current interaction if it concerns `window`, which is about
    /// to be unmanaged.
    pub(crate) fn abandon_mode(&mut self, window: Window) -> Result<()> {
        if self.mode.window() == Some(window) {
            debug!("Interaction target 0x{:x} went away", window);
            self.end_mode()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wm::hints::NormalHints;

    fn client(window: Window, x: i32, y: i32, width: i32, height: i32) -> Client {
        let mut c = Client::new(window, 0, NormalHints::from_size_hints(None));
        c.x = x;
        c.y = y;
        c.width = width;
        c.height = height;
        c
    }

    const MONITOR: Rect = Rect { x: 0, y: 0, width: 1000, height: 800 };

    #[test]
    fn sweep_rounds_down_to_increment() {
        let mut c = client(1, 0, 0, 100, 100);
        c.hints.min_width = 50;
        c.hints.base_width = 50;
        c.hints.width_inc = 10;
        recalculate_sweep(&mut c, 0, 0, 145, 100, false);
        assert_eq!(c.width, 140);
        assert_eq!(c.x, 0);
    }

    #[test]
    fn sweep_leftwards_moves_origin_and_respects_minimum() {
        let mut c = client(1, 200, 200, 100, 100);
        c.hints.min_width = 50;
        c.hints.min_height = 50;
        recalculate_sweep(&mut c, 200, 200, 180, 120, false);
        assert_eq!((c.width, c.x), (50, 150));
        assert_eq!((c.height, c.y), (80, 120));
    }

    #[test]
    fn sweep_skips_maximised_axis_unless_forced() {
        let mut c = client(1, 0, 0, 1000, 100);
        c.oldw = 300;
        recalculate_sweep(&mut c, 0, 0, 400, 400, false);
        assert_eq!((c.width, c.oldw), (1000, 300));
        recalculate_sweep(&mut c, 0, 0, 400, 400, true);
        assert_eq!((c.width, c.oldw), (400, 0));
    }

    #[test]
    fn snaps_within_threshold() {
        let other = client(2, 0, 0, 100, 100);
        let mut c = client(1, 103, 20, 50, 50);
        snap_client(&mut c, [&other], MONITOR, 4);
        assert_eq!((c.x, c.y), (100, 20));
    }

    #[test]
    fn does_not_snap_beyond_threshold() {
        let other = client(2, 0, 0, 100, 100);
        let mut c = client(1, 105, 20, 50, 50);
        snap_client(&mut c, [&other], MONITOR, 4);
        assert_eq!((c.x, c.y), (105, 20));
    }

    #[test]
    fn snaps_to_monitor_edge() {
        let mut c = client(1, 998 - 50, 797 - 50, 50, 50);
        c.border = 1;
        snap_client(&mut c, std::iter::empty(), MONITOR, 4);
        assert_eq!((c.x, c.y), (1000 - 50 - 1, 800 - 50 - 1));
    }

    #[test]
    fn outline_label_uses_increments() {
        let mut c = client(1, 10, 20, 90, 60);
        c.hints.base_width = 10;
        c.hints.base_height = 0;
        c.hints.width_inc = 8;
        c.hints.height_inc = 12;
        assert_eq!(outline_for(&c).label.as_deref(), Some("10x5+10+20"));
    }

    #[test]
    fn state_actions() {
        assert_eq!(StateAction::from_u32(0), Some(StateAction::Remove));
        assert_eq!(StateAction::from_u32(2), Some(StateAction::Toggle));
        assert_eq!(StateAction::from_u32(3), None);
    }
}
