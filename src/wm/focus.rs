//! Focus Module
//!
//! Selection of the current client, its border colours and the EWMH state
//! that advertises it, plus most-recently-used cycling.

use tracing::debug;
use x11rb::protocol::xproto::Window;

use crate::error::Result;
use crate::wm::client::Client;
use crate::wm::client_flags::NetWmState;
use crate::wm::display::{DisplayServer, Focus, Property};
use crate::wm::WindowManager;

impl<D: DisplayServer> WindowManager<D> {
    /// Make `window` the current client, or deselect with `None`.
    ///
    /// The previously current client gets the unfocused border colour.  The
    /// new one gets the focused colour (or the fixed colour when it is on
    /// every vdesk), its colormap installed and the input focus.
    pub fn select_client(&mut self, window: Option<Window>) -> Result<()> {
        let window = window.filter(|w| self.clients.contains(*w));
        let old = self.current;

        if let Some(c) = old.and_then(|w| self.clients.get(w)) {
            let (frame, pixel) = (c.frame, self.screens[c.screen].bg);
            self.display.set_border_color(frame, pixel)?;
        }
        if let Some(c) = window.and_then(|w| self.clients.get(w)) {
            let screen = &self.screens[c.screen];
            let pixel = if c.is_fixed() { screen.fc } else { screen.fg };
            let (w, frame, colormap) = (c.window, c.frame, c.colormap);
            debug!("Selecting 0x{:x}", w);
            self.display.set_border_color(frame, pixel)?;
            self.display.install_colormap(colormap)?;
            self.display.set_input_focus(Focus::Window(w))?;
        }
        self.current = window;

        if let Some(c) = old.and_then(|w| self.clients.get(w)).cloned() {
            self.publish_net_wm_state(&c)?;
        }
        if let Some(c) = window.and_then(|w| self.clients.get(w)).cloned() {
            self.publish_net_wm_state(&c)?;
        }
        Ok(())
    }

    pub(crate) fn update_net_wm_state(&mut self, window: Window) -> Result<()> {
        match self.clients.get(window).cloned() {
            Some(c) => self.publish_net_wm_state(&c),
            None => Ok(()),
        }
    }

    /// Write _NET_WM_STATE for a client and keep its screen's
    /// _NET_ACTIVE_WINDOW in step with the current client.  Takes the client
    /// by value-copy so it also works for one that was just unmanaged.
    pub(crate) fn publish_net_wm_state(&mut self, c: &Client) -> Result<()> {
        let mut state = NetWmState::empty();
        if c.oldh != 0 {
            state |= NetWmState::MAXIMIZED_VERT;
        }
        if c.oldw != 0 {
            state |= NetWmState::MAXIMIZED_HORZ;
        }
        if c.oldh != 0 && c.oldw != 0 {
            state |= NetWmState::FULLSCREEN;
        }

        let Some(screen) = self.screens.get_mut(c.screen) else {
            return Ok(());
        };
        let root = screen.root;
        if self.current == Some(c.window) {
            state |= NetWmState::FOCUSED;
            if screen.active != Some(c.window) {
                screen.active = Some(c.window);
                self.display.set_property(root, Property::ActiveWindow(Some(c.window)))?;
            }
        } else if screen.active == Some(c.window) {
            screen.active = None;
            self.display.set_property(root, Property::ActiveWindow(None))?;
        }

        if self.clients.contains(c.window) {
            self.display.set_property(c.window, Property::NetWmState(state))?;
        }
        Ok(())
    }

    /// Whether a client could be chosen by cycling: on its screen's vdesk (or
    /// fixed), and not a hidden dock.
    fn selectable(&self, window: Window) -> bool {
        let Some(c) = self.clients.get(window) else {
            return false;
        };
        let screen = &self.screens[c.screen];
        screen.shows(c) && !(c.is_dock && !screen.docks_visible)
    }

    /// Select the client after the current one in most-recently-used order.
    pub fn select_next(&mut self) -> Result<()> {
        let tab = self.clients.tab.clone();
        if tab.is_empty() {
            return Ok(());
        }
        let start = self
            .current
            .and_then(|cur| tab.iter().position(|w| *w == cur));

        let mut index = start;
        let next = loop {
            index = match index {
                Some(i) if i + 1 < tab.len() => Some(i + 1),
                Some(_) if self.current.is_none() => return Ok(()),
                _ => Some(0),
            };
            let Some(candidate) = index.map(|i| tab[i]) else {
                return Ok(());
            };
            if Some(candidate) == self.current {
                return Ok(());
            }
            if self.selectable(candidate) {
                break candidate;
            }
            if start.is_none() && index == Some(tab.len() - 1) {
                return Ok(());
            }
        };

        self.show(next)?;
        self.raise(next)?;
        self.select_client(Some(next))?;
        self.discard_enter_events(next)
    }

    /// Drop queued EnterNotify events caused by moving things under the
    /// pointer, keeping only one for this client's frame.
    pub(crate) fn discard_enter_events(&mut self, window: Window) -> Result<()> {
        let Some(frame) = self.clients.get(window).map(|c| c.frame) else {
            return Ok(());
        };
        self.display.discard_enter_events(frame)
    }
}
