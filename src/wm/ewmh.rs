//! EWMH (Extended Window Manager Hints) implementation
//!
//! Atom interning, encoding of the properties the manager publishes, and
//! decoding of the client messages it reacts to.

use x11rb::connection::Connection;
use x11rb::protocol::xproto::{Atom, AtomEnum, ConnectionExt as _};

use crate::error::Result;
use crate::wm::client_flags::{Maximise, NetWmState, WindowType};
use crate::wm::display::{Axis, ClientMessage, Property, PropertyName};

/// Holds all interned atoms
#[derive(Debug, Clone)]
pub struct Atoms {
    // ICCCM and Motif
    pub wm_state: Atom,
    pub wm_protocols: Atom,
    pub wm_delete_window: Atom,
    pub motif_wm_hints: Atom,
    pub utf8_string: Atom,
    // Saved geometry of maximised clients
    pub evilwm_unmaximised_horz: Atom,
    pub evilwm_unmaximised_vert: Atom,
    // Root window properties
    pub net_supported: Atom,
    pub net_client_list: Atom,
    pub net_client_list_stacking: Atom,
    pub net_number_of_desktops: Atom,
    pub net_desktop_geometry: Atom,
    pub net_desktop_viewport: Atom,
    pub net_current_desktop: Atom,
    pub net_active_window: Atom,
    pub net_workarea: Atom,
    pub net_supporting_wm_check: Atom,
    // Root window messages
    pub net_close_window: Atom,
    pub net_moveresize_window: Atom,
    pub net_restack_window: Atom,
    pub net_request_frame_extents: Atom,
    // Application window properties
    pub net_wm_name: Atom,
    pub net_wm_desktop: Atom,
    pub net_wm_window_type: Atom,
    pub net_wm_window_type_desktop: Atom,
    pub net_wm_window_type_dock: Atom,
    pub net_wm_window_type_notification: Atom,
    pub net_wm_state: Atom,
    pub net_wm_state_maximized_vert: Atom,
    pub net_wm_state_maximized_horz: Atom,
    pub net_wm_state_hidden: Atom,
    pub net_wm_state_fullscreen: Atom,
    pub net_wm_state_focused: Atom,
    pub net_wm_allowed_actions: Atom,
    pub net_wm_action_move: Atom,
    pub net_wm_action_resize: Atom,
    pub net_wm_action_maximize_horz: Atom,
    pub net_wm_action_maximize_vert: Atom,
    pub net_wm_action_fullscreen: Atom,
    pub net_wm_action_change_desktop: Atom,
    pub net_wm_action_close: Atom,
    pub net_wm_pid: Atom,
    pub net_frame_extents: Atom,
}

/// Encoded property contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Format 32 data
    Long(Vec<u32>),
    /// Format 8 data
    Text(String),
}

/// A property ready to be written: (name, type, data).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub name: Atom,
    pub kind: Atom,
    pub payload: Payload,
}

impl Atoms {
    /// Intern all required atoms
    pub fn new<C: Connection>(conn: &C) -> Result<Self> {
        // Helper to intern a single atom
        let intern = |name: &str| -> Result<Atom> {
            Ok(conn.intern_atom(false, name.as_bytes())?.reply()?.atom)
        };
        Self::from_fn(intern)
    }

    pub(crate) fn from_fn(mut intern: impl FnMut(&str) -> Result<Atom>) -> Result<Self> {
        Ok(Self {
            wm_state: intern("WM_STATE")?,
            wm_protocols: intern("WM_PROTOCOLS")?,
            wm_delete_window: intern("WM_DELETE_WINDOW")?,
            motif_wm_hints: intern("_MOTIF_WM_HINTS")?,
            utf8_string: intern("UTF8_STRING")?,
            evilwm_unmaximised_horz: intern("_EVILWM_UNMAXIMISED_HORZ")?,
            evilwm_unmaximised_vert: intern("_EVILWM_UNMAXIMISED_VERT")?,
            net_supported: intern("_NET_SUPPORTED")?,
            net_client_list: intern("_NET_CLIENT_LIST")?,
            net_client_list_stacking: intern("_NET_CLIENT_LIST_STACKING")?,
            net_number_of_desktops: intern("_NET_NUMBER_OF_DESKTOPS")?,
            net_desktop_geometry: intern("_NET_DESKTOP_GEOMETRY")?,
            net_desktop_viewport: intern("_NET_DESKTOP_VIEWPORT")?,
            net_current_desktop: intern("_NET_CURRENT_DESKTOP")?,
            net_active_window: intern("_NET_ACTIVE_WINDOW")?,
            net_workarea: intern("_NET_WORKAREA")?,
            net_supporting_wm_check: intern("_NET_SUPPORTING_WM_CHECK")?,
            net_close_window: intern("_NET_CLOSE_WINDOW")?,
            net_moveresize_window: intern("_NET_MOVERESIZE_WINDOW")?,
            net_restack_window: intern("_NET_RESTACK_WINDOW")?,
            net_request_frame_extents: intern("_NET_REQUEST_FRAME_EXTENTS")?,
            net_wm_name: intern("_NET_WM_NAME")?,
            net_wm_desktop: intern("_NET_WM_DESKTOP")?,
            net_wm_window_type: intern("_NET_WM_WINDOW_TYPE")?,
            net_wm_window_type_desktop: intern("_NET_WM_WINDOW_TYPE_DESKTOP")?,
            net_wm_window_type_dock: intern("_NET_WM_WINDOW_TYPE_DOCK")?,
            net_wm_window_type_notification: intern("_NET_WM_WINDOW_TYPE_NOTIFICATION")?,
            net_wm_state: intern("_NET_WM_STATE")?,
            net_wm_state_maximized_vert: intern("_NET_WM_STATE_MAXIMIZED_VERT")?,
            net_wm_state_maximized_horz: intern("_NET_WM_STATE_MAXIMIZED_HORZ")?,
            net_wm_state_hidden: intern("_NET_WM_STATE_HIDDEN")?,
            net_wm_state_fullscreen: intern("_NET_WM_STATE_FULLSCREEN")?,
            net_wm_state_focused: intern("_NET_WM_STATE_FOCUSED")?,
            net_wm_allowed_actions: intern("_NET_WM_ALLOWED_ACTIONS")?,
            net_wm_action_move: intern("_NET_WM_ACTION_MOVE")?,
            net_wm_action_resize: intern("_NET_WM_ACTION_RESIZE")?,
            net_wm_action_maximize_horz: intern("_NET_WM_ACTION_MAXIMIZE_HORZ")?,
            net_wm_action_maximize_vert: intern("_NET_WM_ACTION_MAXIMIZE_VERT")?,
            net_wm_action_fullscreen: intern("_NET_WM_ACTION_FULLSCREEN")?,
            net_wm_action_change_desktop: intern("_NET_WM_ACTION_CHANGE_DESKTOP")?,
            net_wm_action_close: intern("_NET_WM_ACTION_CLOSE")?,
            net_wm_pid: intern("_NET_WM_PID")?,
            net_frame_extents: intern("_NET_FRAME_EXTENTS")?,
        })
    }

    pub fn property(&self, name: PropertyName) -> Atom {
        match name {
            PropertyName::WmState => self.wm_state,
            PropertyName::NetWmDesktop => self.net_wm_desktop,
            PropertyName::NetWmState => self.net_wm_state,
            PropertyName::AllowedActions => self.net_wm_allowed_actions,
            PropertyName::FrameExtents => self.net_frame_extents,
            PropertyName::Unmaximised(Axis::Horz) => self.evilwm_unmaximised_horz,
            PropertyName::Unmaximised(Axis::Vert) => self.evilwm_unmaximised_vert,
            PropertyName::ClientList => self.net_client_list,
            PropertyName::ClientListStacking => self.net_client_list_stacking,
            PropertyName::ActiveWindow => self.net_active_window,
            PropertyName::Supported => self.net_supported,
            PropertyName::SupportingWmCheck => self.net_supporting_wm_check,
            PropertyName::WmName => self.net_wm_name,
            PropertyName::WmPid => self.net_wm_pid,
            PropertyName::NumberOfDesktops => self.net_number_of_desktops,
            PropertyName::CurrentDesktop => self.net_current_desktop,
            PropertyName::DesktopGeometry => self.net_desktop_geometry,
            PropertyName::DesktopViewport => self.net_desktop_viewport,
            PropertyName::Workarea => self.net_workarea,
        }
    }

    /// Everything advertised in _NET_SUPPORTED.
    fn supported(&self) -> Vec<Atom> {
        vec![
            self.net_supported,
            self.net_client_list,
            self.net_client_list_stacking,
            self.net_number_of_desktops,
            self.net_desktop_geometry,
            self.net_desktop_viewport,
            self.net_current_desktop,
            self.net_active_window,
            self.net_workarea,
            self.net_supporting_wm_check,
            self.net_close_window,
            self.net_moveresize_window,
            self.net_restack_window,
            self.net_request_frame_extents,
            self.net_wm_desktop,
            self.net_wm_window_type,
            self.net_wm_window_type_desktop,
            self.net_wm_window_type_dock,
            self.net_wm_state,
            self.net_wm_state_maximized_vert,
            self.net_wm_state_maximized_horz,
            self.net_wm_state_hidden,
            self.net_wm_state_fullscreen,
            self.net_wm_state_focused,
            self.net_wm_allowed_actions,
            self.net_wm_action_move,
            self.net_wm_action_resize,
            self.net_wm_action_maximize_horz,
            self.net_wm_action_maximize_vert,
            self.net_wm_action_fullscreen,
            self.net_wm_action_change_desktop,
            self.net_wm_action_close,
            self.net_frame_extents,
        ]
    }

    fn allowed_actions(&self, resize: bool) -> Vec<Atom> {
        let mut actions = vec![
            self.net_wm_action_move,
            self.net_wm_action_maximize_horz,
            self.net_wm_action_maximize_vert,
            self.net_wm_action_fullscreen,
            self.net_wm_action_change_desktop,
            self.net_wm_action_close,
        ];
        if resize {
            actions.push(self.net_wm_action_resize);
        }
        actions
    }

    fn net_wm_state_atoms(&self, state: NetWmState) -> Vec<Atom> {
        [
            (NetWmState::MAXIMIZED_VERT, self.net_wm_state_maximized_vert),
            (NetWmState::MAXIMIZED_HORZ, self.net_wm_state_maximized_horz),
            (NetWmState::FULLSCREEN, self.net_wm_state_fullscreen),
            (NetWmState::FOCUSED, self.net_wm_state_focused),
        ]
        .into_iter()
        .filter(|(flag, _)| state.contains(*flag))
        .map(|(_, atom)| atom)
        .collect()
    }

    pub fn encode(&self, property: &Property) -> Encoded {
        let cardinal: Atom = AtomEnum::CARDINAL.into();
        let window: Atom = AtomEnum::WINDOW.into();
        let atom: Atom = AtomEnum::ATOM.into();
        let (kind, payload) = match property {
            Property::WmState(state) => (self.wm_state, Payload::Long(vec![*state as u32, 0])),
            Property::NetWmDesktop(v) => (cardinal, Payload::Long(vec![*v])),
            Property::NetWmState(state) => (atom, Payload::Long(self.net_wm_state_atoms(*state))),
            Property::AllowedActions { resize } => {
                (atom, Payload::Long(self.allowed_actions(*resize)))
            }
            Property::FrameExtents(border) => {
                let b = (*border).max(0) as u32;
                (cardinal, Payload::Long(vec![b; 4]))
            }
            Property::Unmaximised(_, pos, size) => {
                (cardinal, Payload::Long(vec![*pos as u32, *size as u32]))
            }
            Property::ClientList(windows) | Property::ClientListStacking(windows) => {
                (window, Payload::Long(windows.clone()))
            }
            Property::ActiveWindow(active) => (window, Payload::Long(vec![active.unwrap_or(0)])),
            Property::Supported => (atom, Payload::Long(self.supported())),
            Property::SupportingWmCheck(w) => (window, Payload::Long(vec![*w])),
            Property::WmName(name) => (self.utf8_string, Payload::Text(name.clone())),
            Property::WmPid(pid) => (cardinal, Payload::Long(vec![*pid])),
            Property::NumberOfDesktops(n) => (cardinal, Payload::Long(vec![*n])),
            Property::CurrentDesktop(v) => (cardinal, Payload::Long(vec![*v])),
            Property::DesktopGeometry(w, h) => {
                (cardinal, Payload::Long(vec![*w as u32, *h as u32]))
            }
            Property::DesktopViewport => (cardinal, Payload::Long(vec![0, 0])),
            Property::Workarea(r) => (
                cardinal,
                Payload::Long(vec![r.x as u32, r.y as u32, r.width as u32, r.height as u32]),
            ),
        };
        Encoded { name: self.property(property.name()), kind, payload }
    }

    /// Policy-relevant bits of a _NET_WM_WINDOW_TYPE list.
    pub fn window_type(&self, types: &[Atom]) -> WindowType {
        let mut result = WindowType::empty();
        for t in types {
            if *t == self.net_wm_window_type_desktop {
                result |= WindowType::DESKTOP;
            } else if *t == self.net_wm_window_type_dock {
                result |= WindowType::DOCK;
            } else if *t == self.net_wm_window_type_notification {
                result |= WindowType::NOTIFICATION;
            }
        }
        result
    }

    /// Decode a format-32 client message.  Unknown types give `None`.
    pub fn client_message(&self, kind: Atom, data: [u32; 5]) -> Option<ClientMessage> {
        let message = if kind == self.net_current_desktop {
            ClientMessage::CurrentDesktop(data[0])
        } else if kind == self.net_request_frame_extents {
            ClientMessage::RequestFrameExtents
        } else if kind == self.net_active_window {
            ClientMessage::ActiveWindow { source: data[0] }
        } else if kind == self.net_close_window {
            ClientMessage::CloseWindow { source: data[1] }
        } else if kind == self.net_moveresize_window {
            ClientMessage::MoveResizeWindow {
                flags: data[0],
                x: data[1] as i32,
                y: data[2] as i32,
                width: data[3] as i32,
                height: data[4] as i32,
            }
        } else if kind == self.net_restack_window {
            ClientMessage::RestackWindow { source: data[0], sibling: data[1], detail: data[2] }
        } else if kind == self.net_wm_desktop {
            ClientMessage::WmDesktop { desktop: data[0], source: data[1] }
        } else if kind == self.net_wm_state {
            let mut axes = Maximise::empty();
            for state in &data[1..3] {
                if *state == self.net_wm_state_maximized_vert {
                    axes |= Maximise::VERT;
                } else if *state == self.net_wm_state_maximized_horz {
                    axes |= Maximise::HORZ;
                } else if *state == self.net_wm_state_fullscreen {
                    axes |= Maximise::VERT | Maximise::HORZ;
                }
            }
            ClientMessage::WmState { action: data[0], axes }
        } else {
            return None;
        };
        Some(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::Rect;
    use crate::wm::display::WmState;

    fn atoms() -> Atoms {
        let mut next = 100;
        Atoms::from_fn(|_| {
            next += 1;
            Ok(next)
        })
        .unwrap()
    }

    #[test]
    fn resize_action_depends_on_hints() {
        let a = atoms();
        let fixed = a.encode(&Property::AllowedActions { resize: false });
        let free = a.encode(&Property::AllowedActions { resize: true });
        let (Payload::Long(fixed), Payload::Long(free)) = (fixed.payload, free.payload) else {
            panic!("allowed actions are atoms");
        };
        assert_eq!(fixed.len() + 1, free.len());
        assert!(!fixed.contains(&a.net_wm_action_resize));
        assert_eq!(free.last(), Some(&a.net_wm_action_resize));
    }

    #[test]
    fn wm_state_has_own_type() {
        let a = atoms();
        let e = a.encode(&Property::WmState(WmState::Iconic));
        assert_eq!((e.name, e.kind), (a.wm_state, a.wm_state));
        assert_eq!(e.payload, Payload::Long(vec![3, 0]));
    }

    #[test]
    fn net_wm_state_lists_flags() {
        let a = atoms();
        let state = NetWmState::MAXIMIZED_HORZ | NetWmState::FOCUSED;
        let e = a.encode(&Property::NetWmState(state));
        assert_eq!(
            e.payload,
            Payload::Long(vec![a.net_wm_state_maximized_horz, a.net_wm_state_focused])
        );
    }

    #[test]
    fn geometry_properties() {
        let a = atoms();
        let e = a.encode(&Property::Workarea(Rect::new(0, 0, 1024, 768)));
        assert_eq!(e.name, a.net_workarea);
        assert_eq!(e.payload, Payload::Long(vec![0, 0, 1024, 768]));
        let e = a.encode(&Property::ActiveWindow(None));
        assert_eq!(e.payload, Payload::Long(vec![0]));
        let e = a.encode(&Property::FrameExtents(2));
        assert_eq!(e.payload, Payload::Long(vec![2, 2, 2, 2]));
    }

    #[test]
    fn fullscreen_request_covers_both_axes() {
        let a = atoms();
        let msg = a.client_message(a.net_wm_state, [2, a.net_wm_state_fullscreen, 0, 0, 0]);
        assert_eq!(
            msg,
            Some(ClientMessage::WmState { action: 2, axes: Maximise::VERT | Maximise::HORZ })
        );
        let msg = a.client_message(
            a.net_wm_state,
            [1, a.net_wm_state_maximized_horz, a.net_wm_state_hidden, 0, 0],
        );
        assert_eq!(msg, Some(ClientMessage::WmState { action: 1, axes: Maximise::HORZ }));
    }

    #[test]
    fn message_sources_come_from_the_right_slot() {
        let a = atoms();
        assert_eq!(
            a.client_message(a.net_close_window, [0, 2, 0, 0, 0]),
            Some(ClientMessage::CloseWindow { source: 2 })
        );
        assert_eq!(
            a.client_message(a.net_wm_desktop, [3, 2, 0, 0, 0]),
            Some(ClientMessage::WmDesktop { desktop: 3, source: 2 })
        );
        assert_eq!(a.client_message(a.wm_protocols, [0; 5]), None);
    }

    #[test]
    fn window_types() {
        let a = atoms();
        let t = a.window_type(&[a.net_wm_window_type_dock, a.net_wm_state]);
        assert_eq!(t, WindowType::DOCK);
        assert_eq!(a.window_type(&[]), WindowType::empty());
    }
}
