//! Display Module
//!
//! The seam between window management policy and the X server.  Everything
//! the manager asks of the server goes through [`DisplayServer`]; the x11rb
//! backend lives in `wm::x11`, and tests use a recording mock.

use std::collections::VecDeque;

use x11rb::protocol::xproto::{
    Colormap, ConfigWindow, ConfigureWindowAux, Keycode, StackMode, Timestamp, Window,
};

use crate::error::Result;
use crate::shared::Rect;
use crate::wm::client_flags::{Maximise, NetWmState, WindowType};
use crate::wm::hints::{MotifWmHints, SizeHints};

pub type Keysym = u32;

pub const SHIFT_MASK: u16 = 1 << 0;
pub const LOCK_MASK: u16 = 1 << 1;
pub const CONTROL_MASK: u16 = 1 << 2;
pub const MOD1_MASK: u16 = 1 << 3;
pub const MOD2_MASK: u16 = 1 << 4;
pub const MOD3_MASK: u16 = 1 << 5;
pub const MOD4_MASK: u16 = 1 << 6;
pub const MOD5_MASK: u16 = 1 << 7;

/// Root window and size of one X screen, as reported at connection setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenInfo {
    pub root: Window,
    pub width: i32,
    pub height: i32,
    pub default_colormap: Colormap,
}

/// Merged GetWindowAttributes and GetGeometry reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowAttributes {
    pub root: Window,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub border_width: i32,
    pub override_redirect: bool,
    pub viewable: bool,
    pub colormap: Colormap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pointer {
    pub root: Window,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    PointerRoot,
    Window(Window),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorShape {
    Move,
    Resize,
    /// Keep whatever cursor is showing
    Unchanged,
}

/// ICCCM WM_STATE values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WmState {
    Withdrawn = 0,
    Normal = 1,
    Iconic = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Horz,
    Vert,
}

/// Properties the manager writes.  The backend owns atom and type selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Property {
    WmState(WmState),
    NetWmDesktop(u32),
    NetWmState(NetWmState),
    AllowedActions { resize: bool },
    FrameExtents(i32),
    /// Saved pre-maximise position and size along one axis.
    Unmaximised(Axis, i32, i32),
    ClientList(Vec<Window>),
    ClientListStacking(Vec<Window>),
    /// `None` publishes an empty active window.
    ActiveWindow(Option<Window>),
    Supported,
    SupportingWmCheck(Window),
    WmName(String),
    WmPid(u32),
    NumberOfDesktops(u32),
    CurrentDesktop(u32),
    DesktopGeometry(i32, i32),
    DesktopViewport,
    Workarea(Rect),
}

/// Property names, for reads and deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyName {
    WmState,
    NetWmDesktop,
    NetWmState,
    AllowedActions,
    FrameExtents,
    Unmaximised(Axis),
    ClientList,
    ClientListStacking,
    ActiveWindow,
    Supported,
    SupportingWmCheck,
    WmName,
    WmPid,
    NumberOfDesktops,
    CurrentDesktop,
    DesktopGeometry,
    DesktopViewport,
    Workarea,
}

impl Property {
    pub fn name(&self) -> PropertyName {
        match self {
            Property::WmState(_) => PropertyName::WmState,
            Property::NetWmDesktop(_) => PropertyName::NetWmDesktop,
            Property::NetWmState(_) => PropertyName::NetWmState,
            Property::AllowedActions { .. } => PropertyName::AllowedActions,
            Property::FrameExtents(_) => PropertyName::FrameExtents,
            Property::Unmaximised(axis, _, _) => PropertyName::Unmaximised(*axis),
            Property::ClientList(_) => PropertyName::ClientList,
            Property::ClientListStacking(_) => PropertyName::ClientListStacking,
            Property::ActiveWindow(_) => PropertyName::ActiveWindow,
            Property::Supported => PropertyName::Supported,
            Property::SupportingWmCheck(_) => PropertyName::SupportingWmCheck,
            Property::WmName(_) => PropertyName::WmName,
            Property::WmPid(_) => PropertyName::WmPid,
            Property::NumberOfDesktops(_) => PropertyName::NumberOfDesktops,
            Property::CurrentDesktop(_) => PropertyName::CurrentDesktop,
            Property::DesktopGeometry(..) => PropertyName::DesktopGeometry,
            Property::DesktopViewport => PropertyName::DesktopViewport,
            Property::Workarea(_) => PropertyName::Workarea,
        }
    }
}

/// Outline drawn with an inverting GC during interactive operations.  Drawing
/// the same outline twice erases it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outline {
    /// Client area; the border is drawn around it.
    pub rect: Rect,
    pub border: i32,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub root: Window,
    pub keycode: Keycode,
    /// Keysym for the keycode at group 0, level 0.
    pub keysym: Keysym,
    pub state: u16,
    pub time: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub root: Window,
    pub window: Window,
    pub button: u8,
    pub state: u16,
    pub root_x: i32,
    pub root_y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionEvent {
    pub root: Window,
    pub root_x: i32,
    pub root_y: i32,
    pub state: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigureRequest {
    pub window: Window,
    pub value_mask: ConfigWindow,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub sibling: Window,
    pub stack_mode: StackMode,
}

/// Properties whose change the manager reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchedProperty {
    NormalHints,
    WindowType,
}

/// Decoded client messages.  `source` is the EWMH source indication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMessage {
    CurrentDesktop(u32),
    RequestFrameExtents,
    ActiveWindow { source: u32 },
    CloseWindow { source: u32 },
    MoveResizeWindow { flags: u32, x: i32, y: i32, width: i32, height: i32 },
    RestackWindow { source: u32, sibling: Window, detail: u32 },
    WmDesktop { desktop: u32, source: u32 },
    /// `action` is 0 (remove), 1 (add) or 2 (toggle).
    WmState { action: u32, axes: Maximise },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    MapRequest { window: Window, parent: Window },
    ConfigureRequest(ConfigureRequest),
    UnmapNotify { window: Window },
    ColormapNotify { window: Window, colormap: Colormap, new: bool },
    PropertyNotify { window: Window, property: WatchedProperty },
    EnterNotify { window: Window },
    KeyboardMapping,
    ShapeNotify { window: Window },
    /// RandR reported a new root size.
    ScreenChange { root: Window, width: i32, height: i32 },
    KeyPress(KeyEvent),
    KeyRelease(KeyEvent),
    ButtonPress(ButtonEvent),
    ButtonRelease(ButtonEvent),
    Motion(MotionEvent),
    ClientMessage { window: Window, message: ClientMessage },
    /// An asynchronous protocol error.
    Error { resource: u32, major: u8 },
}

pub trait DisplayServer {
    // -- connection --------------------------------------------------------

    fn screens(&self) -> Vec<ScreenInfo>;
    fn next_event(&mut self) -> Result<Option<DisplayEvent>>;
    fn flush(&mut self) -> Result<()>;
    fn sync(&mut self) -> Result<()>;
    /// DISPLAY value for processes launched from `screen`.
    fn display_name(&self, screen: usize) -> String;
    fn numlock_mask(&self) -> u16;
    fn refresh_keyboard_mapping(&mut self) -> Result<()>;

    // -- screen setup ------------------------------------------------------

    /// Select substructure redirection on `root`.  Fails if another window
    /// manager holds it.
    fn become_wm(&mut self, screen: usize, root: Window) -> Result<()>;
    fn create_supporting_window(&mut self, root: Window) -> Result<Window>;
    fn alloc_color(&mut self, colormap: Colormap, name: &str) -> Result<u32>;
    /// Active monitors, empty when RandR is unavailable.
    fn monitors(&mut self, root: Window) -> Result<Vec<Rect>>;
    fn query_tree(&mut self, root: Window) -> Result<Vec<Window>>;

    // -- queries -----------------------------------------------------------

    fn window_attributes(&mut self, window: Window) -> Result<WindowAttributes>;
    fn size_hints(&mut self, window: Window) -> Result<Option<SizeHints>>;
    fn motif_hints(&mut self, window: Window) -> Result<Option<MotifWmHints>>;
    fn window_type(&mut self, window: Window) -> Result<WindowType>;
    fn cardinals(&mut self, window: Window, name: PropertyName) -> Result<Option<Vec<u32>>>;
    /// WM_CLASS as (instance, class).
    fn wm_class(&mut self, window: Window) -> Result<Option<(String, String)>>;
    fn supports_delete(&mut self, window: Window) -> Result<bool>;
    fn query_pointer(&mut self, root: Window) -> Result<Pointer>;

    // -- windows -----------------------------------------------------------

    fn create_frame(&mut self, root: Window, rect: Rect, border: i32, border_pixel: u32) -> Result<Window>;
    fn reparent(&mut self, window: Window, parent: Window, x: i32, y: i32) -> Result<()>;
    fn change_save_set(&mut self, window: Window, insert: bool) -> Result<()>;
    fn map(&mut self, window: Window) -> Result<()>;
    fn unmap(&mut self, window: Window) -> Result<()>;
    fn destroy(&mut self, window: Window) -> Result<()>;
    fn configure(&mut self, window: Window, changes: &ConfigureWindowAux) -> Result<()>;
    fn set_border_color(&mut self, window: Window, pixel: u32) -> Result<()>;
    /// Synthetic ConfigureNotify telling the client where it really is.
    fn send_configure_notify(&mut self, window: Window, rect: Rect) -> Result<()>;
    fn set_input_focus(&mut self, focus: Focus) -> Result<()>;
    fn install_colormap(&mut self, colormap: Colormap) -> Result<()>;
    fn set_property(&mut self, window: Window, property: Property) -> Result<()>;
    fn delete_property(&mut self, window: Window, name: PropertyName) -> Result<()>;
    fn select_client_input(&mut self, window: Window) -> Result<()>;
    /// Copy the bounding shape of `window` onto `frame`, if it has one.
    fn mirror_shape(&mut self, window: Window, frame: Window) -> Result<()>;
    fn send_delete(&mut self, window: Window) -> Result<()>;
    fn kill_client(&mut self, window: Window) -> Result<()>;

    // -- input -------------------------------------------------------------

    /// Replace all key grabs on `root` with the given (modifiers, keysym)
    /// chords, including their Lock and NumLock variants.
    fn grab_keys(&mut self, root: Window, keys: &[(u16, Keysym)]) -> Result<()>;
    fn grab_buttons(&mut self, window: Window, buttons: &[(u16, u8)]) -> Result<()>;
    fn grab_pointer(&mut self, root: Window, cursor: CursorShape) -> Result<bool>;
    fn ungrab_pointer(&mut self) -> Result<()>;
    fn grab_keyboard(&mut self, root: Window) -> Result<bool>;
    fn ungrab_keyboard(&mut self) -> Result<()>;
    fn grab_server(&mut self) -> Result<()>;
    fn ungrab_server(&mut self) -> Result<()>;
    fn warp_pointer(&mut self, window: Window, x: i32, y: i32) -> Result<()>;
    fn draw_outline(&mut self, root: Window, outline: &Outline) -> Result<()>;
    /// Drop queued EnterNotify events, keeping only the latest one for `frame`.
    fn discard_enter_events(&mut self, frame: Window) -> Result<()>;

    fn raise(&mut self, window: Window) -> Result<()> {
        self.configure(window, &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE))
    }

    fn lower(&mut self, window: Window) -> Result<()> {
        self.configure(window, &ConfigureWindowAux::new().stack_mode(StackMode::BELOW))
    }
}

/// Remove every queued EnterNotify, then put back the most recent one that
/// names `frame`.
pub fn retain_latest_enter(queue: &mut VecDeque<DisplayEvent>, frame: Window) {
    let mut keep = None;
    queue.retain(|event| match event {
        DisplayEvent::EnterNotify { window } => {
            if *window == frame {
                keep = Some(event.clone());
            }
            false
        }
        _ => true,
    });
    if let Some(event) = keep {
        queue.push_front(event);
    }
}

/// A KeyRelease immediately followed by a KeyPress of the same key with the
/// same timestamp is keyboard autorepeat.
pub fn is_autorepeat(release: &KeyEvent, next: &DisplayEvent) -> bool {
    matches!(next, DisplayEvent::KeyPress(press)
        if press.keycode == release.keycode && press.time == release.time)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(keycode: u8, time: u32) -> KeyEvent {
        KeyEvent { root: 1, keycode, keysym: 0, state: 0, time }
    }

    #[test]
    fn discards_enters_but_keeps_latest_for_frame() {
        let mut queue: VecDeque<DisplayEvent> = vec![
            DisplayEvent::EnterNotify { window: 10 },
            DisplayEvent::UnmapNotify { window: 3 },
            DisplayEvent::EnterNotify { window: 20 },
            DisplayEvent::EnterNotify { window: 10 },
        ]
        .into();
        retain_latest_enter(&mut queue, 10);
        assert_eq!(
            queue.into_iter().collect::<Vec<_>>(),
            vec![DisplayEvent::EnterNotify { window: 10 }, DisplayEvent::UnmapNotify { window: 3 }]
        );
    }

    #[test]
    fn autorepeat_needs_same_key_and_time() {
        let release = key(38, 100);
        assert!(is_autorepeat(&release, &DisplayEvent::KeyPress(key(38, 100))));
        assert!(!is_autorepeat(&release, &DisplayEvent::KeyPress(key(38, 101))));
        assert!(!is_autorepeat(&release, &DisplayEvent::KeyPress(key(39, 100))));
        assert!(!is_autorepeat(&release, &DisplayEvent::KeyRelease(key(38, 100))));
    }
}
