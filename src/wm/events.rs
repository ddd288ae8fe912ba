//! Events Module
//!
//! One handler per event type.  Handlers run to completion on the event
//! thread; afterwards every client flagged for removal is unmanaged.

use tracing::{debug, trace, warn};
use x11rb::protocol::xproto::{ConfigWindow, ConfigureWindowAux, StackMode, Window};

use crate::error::Result;
use crate::shared::Gravity;
use crate::wm::display::{
    ClientMessage, ConfigureRequest, DisplayEvent, DisplayServer, Property, WatchedProperty,
};
use crate::wm::moveresize::StateAction;
use crate::wm::WindowManager;

/// Protocol errors from SetInputFocus are expected when focusing a window
/// that is going away.
const X_SET_INPUT_FOCUS: u8 = 42;

/// EWMH source indication for requests made on behalf of the user.
const SOURCE_USER: u32 = 2;

/// Frame changes for a client-requested configure.  Only the fields named in
/// `mask` are included.
fn frame_changes(
    mask: ConfigWindow,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    border: i32,
    sibling: Window,
    stack_mode: StackMode,
) -> ConfigureWindowAux {
    let mut aux = ConfigureWindowAux::new();
    if mask.contains(ConfigWindow::X) {
        aux = aux.x(x);
    }
    if mask.contains(ConfigWindow::Y) {
        aux = aux.y(y);
    }
    if mask.contains(ConfigWindow::WIDTH) {
        aux = aux.width(width.max(1) as u32);
    }
    if mask.contains(ConfigWindow::HEIGHT) {
        aux = aux.height(height.max(1) as u32);
    }
    if mask.contains(ConfigWindow::BORDER_WIDTH) {
        aux = aux.border_width(border.max(0) as u32);
    }
    if mask.contains(ConfigWindow::SIBLING) {
        aux = aux.sibling(sibling);
    }
    if mask.contains(ConfigWindow::STACK_MODE) {
        aux = aux.stack_mode(stack_mode);
    }
    aux
}

impl<D: DisplayServer> WindowManager<D> {
    /// Handle one event, then sweep away clients that were flagged for
    /// removal while handling it.
    pub fn handle_event(&mut self, event: DisplayEvent) -> Result<()> {
        trace!("Event: {:?}", event);
        let target = self.event_window(&event);
        let result = self.dispatch_event(event);
        match target {
            Some(window) => self.guard(window, result)?,
            None => match result {
                Err(e) if e.is_protocol() => warn!("Ignoring failed request: {}", e),
                other => other?,
            },
        }
        self.tidy()
    }

    /// Window a failure while handling `event` should be blamed on.
    fn event_window(&self, event: &DisplayEvent) -> Option<Window> {
        match event {
            DisplayEvent::MapRequest { window, .. }
            | DisplayEvent::UnmapNotify { window }
            | DisplayEvent::ColormapNotify { window, .. }
            | DisplayEvent::PropertyNotify { window, .. }
            | DisplayEvent::EnterNotify { window }
            | DisplayEvent::ShapeNotify { window }
            | DisplayEvent::ClientMessage { window, .. } => Some(*window),
            DisplayEvent::ConfigureRequest(req) => Some(req.window),
            DisplayEvent::ButtonPress(ev) => Some(ev.window),
            DisplayEvent::KeyPress(_)
            | DisplayEvent::KeyRelease(_)
            | DisplayEvent::ButtonRelease(_)
            | DisplayEvent::Motion(_) => self.mode.window().or(self.current),
            DisplayEvent::KeyboardMapping
            | DisplayEvent::ScreenChange { .. }
            | DisplayEvent::Error { .. } => None,
        }
    }

    fn dispatch_event(&mut self, event: DisplayEvent) -> Result<()> {
        match event {
            DisplayEvent::MapRequest { window, .. } => self.handle_map_request(window),
            DisplayEvent::ConfigureRequest(req) => self.handle_configure_request(&req),
            DisplayEvent::UnmapNotify { window } => {
                self.handle_unmap(window);
                Ok(())
            }
            DisplayEvent::ColormapNotify { window, colormap, new } => {
                let Some(w) = self.clients.find(window).filter(|_| new) else {
                    return Ok(());
                };
                if let Some(c) = self.clients.get_mut(w) {
                    c.colormap = colormap;
                }
                self.display.install_colormap(colormap)
            }
            DisplayEvent::PropertyNotify { window, property } => {
                let Some(w) = self.clients.find(window) else {
                    return Ok(());
                };
                match property {
                    WatchedProperty::NormalHints => self.refresh_normal_hints(w),
                    WatchedProperty::WindowType => self.refresh_window_type(w),
                }
            }
            DisplayEvent::EnterNotify { window } => self.handle_enter(window),
            DisplayEvent::KeyboardMapping => {
                self.display.refresh_keyboard_mapping()?;
                let grabs = self.binds.key_grabs();
                let roots: Vec<Window> = self.screens.iter().map(|s| s.root).collect();
                for root in roots {
                    self.display.grab_keys(root, &grabs)?;
                }
                Ok(())
            }
            DisplayEvent::ShapeNotify { window } => {
                let Some(c) = self.clients.find(window).and_then(|w| self.clients.get(w)) else {
                    return Ok(());
                };
                let (window, frame) = (c.window, c.frame);
                self.display.mirror_shape(window, frame)
            }
            DisplayEvent::ScreenChange { root, width, height } => match self.find_screen(root) {
                Some(index) => self.screen_changed(index, width, height),
                None => Ok(()),
            },
            DisplayEvent::KeyPress(ev) => self.dispatch_key(&ev),
            DisplayEvent::KeyRelease(ev) => self.mode_key_release(&ev),
            DisplayEvent::ButtonPress(ev) => self.dispatch_button(&ev),
            DisplayEvent::ButtonRelease(ev) => self.mode_button_release(&ev),
            DisplayEvent::Motion(ev) => self.mode_motion(&ev),
            DisplayEvent::ClientMessage { window, message } => {
                self.handle_client_message(window, message)
            }
            DisplayEvent::Error { resource, major } => {
                if major != X_SET_INPUT_FOCUS {
                    self.mark_removed(resource);
                }
                Ok(())
            }
        }
    }

    fn handle_map_request(&mut self, window: Window) -> Result<()> {
        if let Some(c) = self.clients.get(window) {
            let (screen, vdesk, fixed) = (c.screen, c.vdesk, c.is_fixed());
            if !fixed && self.screens[screen].vdesk != vdesk {
                self.switch_vdesk(screen, vdesk)?;
            }
            self.show(window)?;
            return self.raise(window);
        }
        let attrs = self.display.window_attributes(window)?;
        match self.find_screen(attrs.root) {
            Some(index) => self.manage(window, index),
            None => {
                warn!("MapRequest for 0x{:x} on an unknown root", window);
                Ok(())
            }
        }
    }

    fn handle_configure_request(&mut self, req: &ConfigureRequest) -> Result<()> {
        let Some(w) = self.clients.find(req.window) else {
            debug!("Passing through configure of unmanaged 0x{:x}", req.window);
            let changes = frame_changes(
                req.value_mask,
                req.x,
                req.y,
                req.width,
                req.height,
                0,
                req.sibling,
                req.stack_mode,
            );
            return self.display.configure(req.window, &changes);
        };

        let mut req = *req;
        req.window = w;
        if req.value_mask.contains(ConfigWindow::STACK_MODE)
            && req.value_mask.contains(ConfigWindow::SIBLING)
            && let Some(sibling) = self.clients.find(req.sibling).and_then(|s| self.clients.get(s))
        {
            req.sibling = sibling.frame;
        }
        self.do_window_changes(&req, 0)?;
        if self.current == Some(w) {
            self.discard_enter_events(w)?;
        }
        Ok(())
    }

    /// Apply a client's requested geometry.  `gravity` 0 means the one from
    /// its size hints.  A resize without an explicit position keeps the
    /// gravity's reference point in place.
    pub(crate) fn do_window_changes(&mut self, req: &ConfigureRequest, gravity: u32) -> Result<()> {
        let Some(c) = self.clients.get(req.window) else {
            return Ok(());
        };
        let (sw, sh) = (self.screens[c.screen].width, self.screens[c.screen].height);
        let Some(c) = self.clients.get_mut(req.window) else {
            return Ok(());
        };

        let gravity = Gravity::from_u32(gravity).unwrap_or(c.hints.gravity);
        c.win_gravity = gravity;
        let mut mask = req.value_mask;
        let positioned = mask.intersects(ConfigWindow::X | ConfigWindow::Y);
        let sized = mask.intersects(ConfigWindow::WIDTH | ConfigWindow::HEIGHT);
        if mask.contains(ConfigWindow::X) {
            c.x = req.x;
        }
        if mask.contains(ConfigWindow::Y) {
            c.y = req.y;
        }
        if sized {
            if !positioned {
                c.gravitate(-c.border, sw, sh);
            }
            let (mut dw, mut dh) = (0, 0);
            if mask.contains(ConfigWindow::WIDTH) {
                let mut width = req.width.max(c.hints.min_width);
                if c.hints.max_width != 0 {
                    width = width.min(c.hints.max_width);
                }
                dw = width - c.width;
                c.width = width;
            }
            if mask.contains(ConfigWindow::HEIGHT) {
                let mut height = req.height.max(c.hints.min_height);
                if c.hints.max_height != 0 {
                    height = height.min(c.hints.max_height);
                }
                dh = height - c.height;
                c.height = height;
            }
            if !positioned {
                let (ox, oy) = gravity.resize_offset(dw, dh);
                c.x -= ox;
                c.y -= oy;
                mask = mask | ConfigWindow::X | ConfigWindow::Y;
                c.gravitate(c.border, sw, sh);
            }
        }
        debug!(
            "Window changes for 0x{:x}: {}x{}+{}+{}",
            c.window, c.width, c.height, c.x, c.y
        );

        let changes = frame_changes(
            mask,
            c.x - c.border,
            c.y - c.border,
            c.width,
            c.height,
            c.border,
            req.sibling,
            req.stack_mode,
        );
        let (window, frame, screen, width, height) = (c.window, c.frame, c.screen, c.width, c.height);
        self.display.configure(frame, &changes)?;
        self.display.configure(
            window,
            &ConfigureWindowAux::new()
                .x(0)
                .y(0)
                .width(width.max(1) as u32)
                .height(height.max(1) as u32),
        )?;
        if mask.contains(ConfigWindow::STACK_MODE) && !mask.contains(ConfigWindow::SIBLING) {
            if req.stack_mode == StackMode::ABOVE {
                self.clients.to_stacking_top(window);
            } else if req.stack_mode == StackMode::BELOW {
                self.clients.to_stacking_bottom(window);
            }
            self.update_client_list_stacking(screen)?;
        }
        let moved = mask.intersects(ConfigWindow::X | ConfigWindow::Y);
        if moved && !sized {
            self.send_config(window)?;
        }
        Ok(())
    }

    fn handle_unmap(&mut self, window: Window) {
        let Some(c) = self.clients.find(window).and_then(|w| self.clients.get_mut(w)) else {
            return;
        };
        if c.ignore_unmap > 0 {
            c.ignore_unmap -= 1;
            debug!("Expected unmap of 0x{:x}, {} more to ignore", c.window, c.ignore_unmap);
        } else {
            debug!("Client 0x{:x} withdrew", c.window);
            c.remove = true;
        }
    }

    fn handle_enter(&mut self, window: Window) -> Result<()> {
        if matches!(self.mode, crate::wm::moveresize::Mode::Cycling { .. }) {
            return Ok(());
        }
        let Some(c) = self.clients.find(window).and_then(|w| self.clients.get(w)) else {
            return Ok(());
        };
        if !self.screens[c.screen].shows(c) {
            return Ok(());
        }
        let w = c.window;
        if self.current != Some(w) {
            self.select_client(Some(w))?;
        }
        self.clients.to_tab_head(w);
        Ok(())
    }

    fn handle_client_message(&mut self, window: Window, message: ClientMessage) -> Result<()> {
        debug!("Client message for 0x{:x}: {:?}", window, message);
        if let ClientMessage::CurrentDesktop(vdesk) = message {
            let screen = self.current_screen()?;
            return self.switch_vdesk(screen, vdesk);
        }

        let Some(w) = self.clients.find(window) else {
            if message == ClientMessage::RequestFrameExtents {
                let border = self.config.appearance.border_width as i32;
                self.display.set_property(window, Property::FrameExtents(border))?;
            }
            return Ok(());
        };

        match message {
            ClientMessage::ActiveWindow { source } if source == SOURCE_USER => {
                let screen = self.current_screen()?;
                if self.clients.get(w).is_some_and(|c| c.screen == screen) {
                    self.select_client(Some(w))?;
                }
                Ok(())
            }
            ClientMessage::CloseWindow { source } if source == SOURCE_USER => {
                self.delete_client(w, false)
            }
            ClientMessage::MoveResizeWindow { flags, x, y, width, height }
                if (flags >> 12) & 3 == SOURCE_USER =>
            {
                let req = ConfigureRequest {
                    window: w,
                    value_mask: ConfigWindow::from(((flags >> 8) & 0x0f) as u16),
                    x,
                    y,
                    width,
                    height,
                    sibling: 0,
                    stack_mode: StackMode::ABOVE,
                };
                self.do_window_changes(&req, flags & 0xff)
            }
            ClientMessage::RestackWindow { source, sibling, detail } if source == SOURCE_USER => {
                let mut value_mask = ConfigWindow::STACK_MODE;
                let mut sibling_frame = 0;
                if let Some(s) = self.clients.find(sibling).and_then(|s| self.clients.get(s)) {
                    value_mask = value_mask | ConfigWindow::SIBLING;
                    sibling_frame = s.frame;
                }
                let req = ConfigureRequest {
                    window: w,
                    value_mask,
                    x: 0,
                    y: 0,
                    width: 0,
                    height: 0,
                    sibling: sibling_frame,
                    stack_mode: StackMode::from(detail as u8),
                };
                self.do_window_changes(&req, 0)
            }
            ClientMessage::WmDesktop { desktop, source } if source == SOURCE_USER => {
                self.client_to_vdesk(w, desktop)
            }
            ClientMessage::WmState { action, axes } if !axes.is_empty() => {
                match StateAction::from_u32(action) {
                    Some(action) => self.maximise(w, action, axes),
                    None => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::Rect;
    use crate::wm::client_flags::{Maximise, SizeHintFlags};
    use crate::wm::display::PropertyName;
    use crate::wm::hints::SizeHints;
    use crate::wm::mock_display_server::{test_manager, Call, ROOT};

    fn configure(window: Window, mask: ConfigWindow, x: i32, y: i32, w: i32, h: i32) -> DisplayEvent {
        DisplayEvent::ConfigureRequest(ConfigureRequest {
            window,
            value_mask: mask,
            x,
            y,
            width: w,
            height: h,
            sibling: 0,
            stack_mode: StackMode::ABOVE,
        })
    }

    #[test]
    fn map_request_manages_new_window() {
        let mut wm = test_manager();
        let w = wm.display.add_window(100, 0, 0, 300, 200);
        wm.handle_event(DisplayEvent::MapRequest { window: w, parent: ROOT }).unwrap();
        assert!(wm.clients.contains(w));
        assert_eq!(wm.current, Some(w));
    }

    #[test]
    fn unexpected_unmap_withdraws_client() {
        let mut wm = test_manager();
        let w = wm.display.add_window(100, 10, 10, 300, 200);
        wm.manage(w, 0).unwrap();
        // The window was already viewable, so one unmap is expected
        wm.handle_event(DisplayEvent::UnmapNotify { window: w }).unwrap();
        assert!(wm.clients.contains(w));
        wm.handle_event(DisplayEvent::UnmapNotify { window: w }).unwrap();
        assert!(!wm.clients.contains(w));
        assert_eq!(wm.current, None);
    }

    #[test]
    fn unmanaged_configure_passes_through() {
        let mut wm = test_manager();
        let w = wm.display.add_window(100, 10, 10, 300, 200);
        let mask = ConfigWindow::X | ConfigWindow::WIDTH;
        wm.handle_event(configure(w, mask, 50, 60, 70, 80)).unwrap();
        let call = wm.display.calls.iter().rev().find_map(|c| match c {
            Call::Configure(win, changes) if *win == w => Some(*changes),
            _ => None,
        });
        let aux = call.unwrap();
        assert_eq!((aux.x, aux.y, aux.width), (Some(50), None, Some(70)));
    }

    #[test]
    fn resize_without_position_honours_gravity() {
        let mut wm = test_manager();
        let w = wm.display.add_window(100, 100, 100, 300, 200);
        wm.manage(w, 0).unwrap();
        let before = wm.clients.get(w).unwrap().rect();

        let req = ConfigureRequest {
            window: w,
            value_mask: ConfigWindow::WIDTH | ConfigWindow::HEIGHT,
            x: 0,
            y: 0,
            width: 400,
            height: 260,
            sibling: 0,
            stack_mode: StackMode::ABOVE,
        };
        // SouthEast: the bottom-right corner stays put
        wm.do_window_changes(&req, 9).unwrap();
        let c = wm.clients.get(w).unwrap();
        assert_eq!((c.width, c.height), (400, 260));
        assert_eq!(c.x + c.width, before.x + before.width);
        assert_eq!(c.y + c.height, before.y + before.height);
    }

    #[test]
    fn move_only_sends_synthetic_configure() {
        let mut wm = test_manager();
        let w = wm.display.add_window(100, 100, 100, 300, 200);
        wm.manage(w, 0).unwrap();
        wm.display.calls.clear();

        wm.handle_event(configure(w, ConfigWindow::X | ConfigWindow::Y, 30, 40, 0, 0)).unwrap();
        let c = wm.clients.get(w).unwrap();
        assert_eq!((c.x, c.y), (30, 40));
        assert!(wm.display.calls.contains(&Call::SendConfigure(w, c.rect())));
    }

    #[test]
    fn client_messages_need_user_source() {
        let mut wm = test_manager();
        let a = wm.display.add_window(100, 10, 10, 300, 200);
        let b = wm.display.add_window(101, 20, 20, 300, 200);
        wm.manage(a, 0).unwrap();
        wm.manage(b, 0).unwrap();
        assert_eq!(wm.current, Some(b));

        let app = ClientMessage::ActiveWindow { source: 1 };
        wm.handle_event(DisplayEvent::ClientMessage { window: a, message: app }).unwrap();
        assert_eq!(wm.current, Some(b));

        let user = ClientMessage::ActiveWindow { source: 2 };
        wm.handle_event(DisplayEvent::ClientMessage { window: a, message: user }).unwrap();
        assert_eq!(wm.current, Some(a));
    }

    #[test]
    fn state_message_maximises() {
        let mut wm = test_manager();
        let w = wm.display.add_window(100, 10, 10, 300, 200);
        wm.manage(w, 0).unwrap();

        let add = ClientMessage::WmState { action: 1, axes: Maximise::VERT };
        wm.handle_event(DisplayEvent::ClientMessage { window: w, message: add }).unwrap();
        let c = wm.clients.get(w).unwrap();
        assert_eq!((c.y, c.height), (0, 768));
        assert_ne!(c.oldh, 0);
    }

    #[test]
    fn frame_extents_for_unmanaged_window() {
        let mut wm = test_manager();
        let message = ClientMessage::RequestFrameExtents;
        wm.handle_event(DisplayEvent::ClientMessage { window: 555, message }).unwrap();
        assert_eq!(wm.display.property(555, PropertyName::FrameExtents), Some(Property::FrameExtents(1)));
    }

    #[test]
    fn focus_errors_are_ignored() {
        let mut wm = test_manager();
        let w = wm.display.add_window(100, 10, 10, 300, 200);
        wm.manage(w, 0).unwrap();

        wm.handle_event(DisplayEvent::Error { resource: w, major: X_SET_INPUT_FOCUS }).unwrap();
        assert!(wm.clients.contains(w));
        wm.handle_event(DisplayEvent::Error { resource: w, major: 12 }).unwrap();
        assert!(!wm.clients.contains(w));
    }

    #[test]
    fn root_shrink_refits_stranded_and_maximised_clients() {
        let mut wm = test_manager();
        let stranded = wm.display.add_window(100, 900, 700, 100, 50);
        wm.manage(stranded, 0).unwrap();
        let big = wm.display.add_window(101, 10, 10, 100, 100);
        wm.manage(big, 0).unwrap();
        wm.maximise(big, StateAction::Add, Maximise::HORZ | Maximise::VERT).unwrap();

        wm.handle_event(DisplayEvent::ScreenChange { root: ROOT, width: 800, height: 600 })
            .unwrap();
        assert_eq!(wm.screens[0].monitors, vec![Rect::new(0, 0, 800, 600)]);

        // 901/1024 and 701/768 of the old monitor, scaled onto the new one
        let c = wm.clients.get(stranded).unwrap();
        assert_eq!((c.x, c.y, c.width, c.height), (703, 547, 100, 50));

        let c = wm.clients.get(big).unwrap();
        assert_eq!((c.x, c.y, c.width, c.height), (0, 0, 800, 600));
        assert_eq!((c.oldx, c.oldy), (8, 8));
        assert_eq!(
            wm.display.property(ROOT, PropertyName::Workarea),
            Some(Property::Workarea(Rect::new(0, 0, 800, 600)))
        );
    }

    #[test]
    fn normal_hints_change_updates_client() {
        let mut wm = test_manager();
        let w = wm.display.add_window(100, 10, 10, 300, 200);
        wm.manage(w, 0).unwrap();
        assert_eq!(wm.clients.get(w).unwrap().hints.width_inc, 1);

        wm.display.size_hints.insert(
            w,
            SizeHints {
                flags: SizeHintFlags::P_RESIZE_INC | SizeHintFlags::P_BASE_SIZE,
                width_inc: 8,
                height_inc: 16,
                base_width: 4,
                base_height: 2,
                ..Default::default()
            },
        );
        let property = WatchedProperty::NormalHints;
        wm.handle_event(DisplayEvent::PropertyNotify { window: w, property }).unwrap();

        let hints = &wm.clients.get(w).unwrap().hints;
        assert_eq!((hints.width_inc, hints.height_inc), (8, 16));
        assert_eq!((hints.base_width, hints.base_height), (4, 2));
        assert_eq!((hints.min_width, hints.min_height), (12, 18));
    }

    #[test]
    fn enter_selects_visible_client() {
        let mut wm = test_manager();
        let a = wm.display.add_window(100, 10, 10, 300, 200);
        let b = wm.display.add_window(101, 20, 20, 300, 200);
        wm.manage(a, 0).unwrap();
        wm.manage(b, 0).unwrap();

        let frame = wm.clients.get(a).unwrap().frame;
        wm.handle_event(DisplayEvent::EnterNotify { window: frame }).unwrap();
        assert_eq!(wm.current, Some(a));
        assert_eq!(wm.clients.tab.first(), Some(&a));
    }
}
