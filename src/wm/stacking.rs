//! Stacking Module
//!
//! Mapping state and z-order of client frames, and the EWMH client lists
//! that mirror them.

use tracing::debug;
use x11rb::protocol::xproto::Window;

use crate::error::Result;
use crate::wm::display::{DisplayServer, Property, WmState};
use crate::wm::WindowManager;

impl<D: DisplayServer> WindowManager<D> {
    /// Map the frame and flag the client Normal.
    pub fn show(&mut self, window: Window) -> Result<()> {
        let Some(frame) = self.clients.get(window).map(|c| c.frame) else {
            return Ok(());
        };
        self.display.map(frame)?;
        self.set_wm_state(window, WmState::Normal)
    }

    /// Unmap the frame and flag the client Iconic.  The resulting
    /// UnmapNotify is expected and must not withdraw the client.
    pub fn hide(&mut self, window: Window) -> Result<()> {
        let Some(c) = self.clients.get_mut(window) else {
            return Ok(());
        };
        c.ignore_unmap += 1;
        let frame = c.frame;
        self.display.unmap(frame)?;
        self.set_wm_state(window, WmState::Iconic)
    }

    pub fn raise(&mut self, window: Window) -> Result<()> {
        let Some(c) = self.clients.get(window) else {
            return Ok(());
        };
        let (frame, screen) = (c.frame, c.screen);
        debug!("Raising 0x{:x}", window);
        self.display.raise(frame)?;
        self.clients.to_stacking_top(window);
        self.update_client_list_stacking(screen)
    }

    pub fn lower(&mut self, window: Window) -> Result<()> {
        let Some(c) = self.clients.get(window) else {
            return Ok(());
        };
        let (frame, screen) = (c.frame, c.screen);
        debug!("Lowering 0x{:x}", window);
        self.display.lower(frame)?;
        self.clients.to_stacking_bottom(window);
        self.update_client_list_stacking(screen)
    }

    pub(crate) fn set_wm_state(&mut self, window: Window, state: WmState) -> Result<()> {
        self.display.set_property(window, Property::WmState(state))
    }

    /// Tell the client where it is, in root coordinates.
    pub(crate) fn send_config(&mut self, window: Window) -> Result<()> {
        let Some(rect) = self.clients.get(window).map(|c| c.rect()) else {
            return Ok(());
        };
        self.display.send_configure_notify(window, rect)
    }

    /// _NET_CLIENT_LIST: this screen's clients in the order they were managed.
    pub(crate) fn update_client_list(&mut self, screen: usize) -> Result<()> {
        let Some(root) = self.screens.get(screen).map(|s| s.root) else {
            return Ok(());
        };
        let windows = self.windows_on(screen, &self.clients.mapping);
        self.display.set_property(root, Property::ClientList(windows))
    }

    /// _NET_CLIENT_LIST_STACKING: this screen's clients bottom to top.
    pub(crate) fn update_client_list_stacking(&mut self, screen: usize) -> Result<()> {
        let Some(root) = self.screens.get(screen).map(|s| s.root) else {
            return Ok(());
        };
        let windows = self.windows_on(screen, &self.clients.stacking);
        self.display.set_property(root, Property::ClientListStacking(windows))
    }

    fn windows_on(&self, screen: usize, order: &[Window]) -> Vec<Window> {
        order
            .iter()
            .copied()
            .filter(|w| self.clients.get(*w).is_some_and(|c| c.screen == screen))
            .collect()
    }
}
