//! Manage Module
//!
//! Bringing a window under management (frame, border, initial geometry,
//! application rules) and handing it back to the root afterwards.

use tracing::{debug, info, warn};
use x11rb::protocol::xproto::{ConfigureWindowAux, Window};

use crate::error::Result;
use crate::shared::Rect;
use crate::wm::client::{Client, VDESK_NONE};
use crate::wm::client_flags::{SizeHintFlags, WindowType};
use crate::wm::display::{
    Axis, DisplayServer, Focus, Pointer, Property, PropertyName, WindowAttributes, WmState,
};
use crate::wm::hints::{MotifWmHints, NormalHints};
use crate::wm::screen::Screen;
use crate::wm::{tolerate, WindowManager};

/// Size and position for a window that is about to be framed.  Returns the
/// geometry the client must be told about when it differs from what it
/// asked for.
pub(crate) fn place_new_client(
    c: &mut Client,
    attrs: &WindowAttributes,
    user_position: bool,
    pointer: Option<&Pointer>,
    screen: Rect,
) -> Option<Rect> {
    let mut need_send_config = false;

    if attrs.width >= c.hints.min_width && attrs.height >= c.hints.min_height {
        c.width = attrs.width;
        c.height = attrs.height;
    } else {
        c.width = c.hints.min_width;
        c.height = c.hints.min_height;
        need_send_config = true;
    }

    if attrs.viewable || user_position {
        c.x = attrs.x;
        c.y = attrs.y;
    } else {
        let (px, py) = pointer.map(|p| (p.x, p.y)).unwrap_or((0, 0));
        let (xmax, ymax) = (screen.width.max(1), screen.height.max(1));
        c.x = px * (xmax - c.border - c.width) / xmax;
        c.y = py * (ymax - c.border - c.height) / ymax;
        need_send_config = true;
    }

    let notify = need_send_config.then(|| c.rect());
    if attrs.viewable {
        c.ignore_unmap += 1;
    }

    c.x += c.old_border;
    c.y += c.old_border;
    c.gravitate(-c.old_border, screen.width, screen.height);
    c.gravitate(c.border, screen.width, screen.height);
    notify
}

impl<D: DisplayServer> WindowManager<D> {
    /// Start managing `window` on `screen`.
    ///
    /// The window is probed with the server grabbed; if it has already gone
    /// away we simply do nothing.  Protocol errors once the client exists
    /// flag it for removal instead of failing.
    pub fn manage(&mut self, window: Window, screen: usize) -> Result<()> {
        if self.clients.contains(window) || screen >= self.screens.len() {
            return Ok(());
        }
        self.display.grab_server()?;
        let probe = self
            .display
            .window_attributes(window)
            .and_then(|attrs| Ok((attrs, self.display.window_type(window)?)));
        let (attrs, window_type) = match probe {
            Ok(found) => found,
            Err(e) if e.is_protocol() => {
                debug!("Window 0x{:x} vanished before it could be managed", window);
                return self.display.ungrab_server();
            }
            Err(e) => {
                tolerate(self.display.ungrab_server())?;
                return Err(e);
            }
        };
        if window_type.contains(WindowType::DESKTOP) {
            debug!("Not managing desktop window 0x{:x}", window);
            self.display.map(window)?;
            return self.display.ungrab_server();
        }
        self.display.ungrab_server()?;

        let result = self.manage_client(window, screen, attrs, window_type);
        self.guard(window, result)
    }

    fn manage_client(
        &mut self,
        window: Window,
        index: usize,
        attrs: WindowAttributes,
        window_type: WindowType,
    ) -> Result<()> {
        let size_hints = self.display.size_hints(window)?;
        let hints = NormalHints::from_size_hints(size_hints.as_ref());
        let user_position = size_hints
            .as_ref()
            .is_some_and(|h| h.flags.contains(SizeHintFlags::US_POSITION));
        let motif = self.display.motif_hints(window)?;

        let mut c = Client::new(window, index, hints);
        c.is_dock = window_type.contains(WindowType::DOCK);
        c.normal_border =
            MotifWmHints::border(motif.as_ref(), self.config.appearance.border_width as i32);

        c.vdesk = self.screens[index].vdesk;
        if let Some(&v) = self
            .display
            .cardinals(window, PropertyName::NetWmDesktop)?
            .as_deref()
            .and_then(|v| v.first())
            && self.valid_vdesk(v)
        {
            c.vdesk = v;
        }

        c.old_border = attrs.border_width;
        c.colormap = attrs.colormap;

        if let Some([x, w]) = self.unmaximised(window, Axis::Horz)? {
            c.oldx = x;
            c.oldw = w;
        }
        if let Some([y, h]) = self.unmaximised(window, Axis::Vert)? {
            c.oldy = y;
            c.oldh = h;
        }
        c.border = if c.oldw != 0 && c.oldh != 0 { 0 } else { c.normal_border };

        let screen = self.screens[index].clone();
        let pointer = if attrs.viewable || user_position {
            None
        } else {
            Some(self.display.query_pointer(screen.root)?)
        };
        let notify =
            place_new_client(&mut c, &attrs, user_position, pointer.as_ref(), screen.bounds());
        if let Some(rect) = notify {
            self.display.send_configure_notify(window, rect)?;
        }
        self.display.set_property(window, Property::FrameExtents(c.border))?;

        debug!(
            "New window 0x{:x} {}x{}+{}+{}",
            window, c.width, c.height, c.x, c.y
        );
        let outer = Rect::new(c.x - c.border, c.y - c.border, c.width, c.height);
        let border = c.border;
        self.clients.insert(c);

        self.display.select_client_input(window)?;
        let frame = match self.display.create_frame(screen.root, outer, border, screen.bg) {
            Ok(frame) => frame,
            Err(e) if e.is_protocol() => {
                warn!("Could not create a frame for 0x{:x}: {}", window, e);
                self.clients.remove(window);
                return self.display.map(window);
            }
            Err(e) => return Err(e),
        };
        self.clients.set_frame(window, frame);
        self.display.change_save_set(window, true)?;
        self.display
            .configure(window, &ConfigureWindowAux::new().border_width(0))?;
        self.display.reparent(window, frame, 0, 0)?;
        self.display.map(window)?;
        self.display.grab_buttons(frame, &self.binds.button_grabs())?;
        self.display.mirror_shape(window, frame)?;

        self.apply_app_rules(window, &screen)?;

        let resize = !hints.is_fixed_size();
        self.display
            .set_property(window, Property::AllowedActions { resize })?;
        self.update_client_list(index)?;
        self.update_client_list_stacking(index)?;

        let Some(c) = self.clients.get(window) else {
            return Ok(());
        };
        if screen.shows(c) {
            self.show(window)?;
            self.raise(window)?;
            let pointer = self.display.query_pointer(screen.root)?;
            let quiet = window_type.intersects(WindowType::DOCK | WindowType::NOTIFICATION);
            if pointer.root == screen.root && !quiet {
                self.select_client(Some(window))?;
                self.discard_enter_events(window)?;
            }
        } else {
            self.set_wm_state(window, WmState::Iconic)?;
        }

        let vdesk = self.clients.get(window).map_or(screen.vdesk, |c| c.vdesk);
        self.display.set_property(window, Property::NetWmDesktop(vdesk))?;
        info!("Managing 0x{:x} (frame 0x{:x}) on vdesk {}", window, frame, vdesk);
        Ok(())
    }

    /// Saved [position, size] from a previous maximise along `axis`.
    fn unmaximised(&mut self, window: Window, axis: Axis) -> Result<Option<[i32; 2]>> {
        let values = self.display.cardinals(window, PropertyName::Unmaximised(axis))?;
        Ok(match values.as_deref() {
            Some(&[pos, size]) => Some([pos as i32, size as i32]),
            _ => None,
        })
    }

    /// Every rule matching WM_CLASS is applied, in configuration order.
    fn apply_app_rules(&mut self, window: Window, screen: &Screen) -> Result<()> {
        if self.app_rules().is_empty() {
            return Ok(());
        }
        let Some((instance, class)) = self.display.wm_class(window)? else {
            return Ok(());
        };
        let rules: Vec<_> = self
            .app_rules()
            .iter()
            .filter(|rule| rule.matches(&instance, &class))
            .cloned()
            .collect();
        for rule in rules {
            debug!("Applying rule {:?} to 0x{:x}", rule, window);
            let Some(c) = self.clients.get_mut(window) else {
                return Ok(());
            };
            let g = rule.geometry;
            if let Some(w) = g.width {
                c.width = w * c.hints.width_inc;
            }
            if let Some(h) = g.height {
                c.height = h * c.hints.height_inc;
            }
            if let Some(x) = g.x {
                c.x = if g.x_negative {
                    x + screen.width - c.width - c.border
                } else {
                    x + c.border
                };
            }
            if let Some(y) = g.y {
                c.y = if g.y_negative {
                    y + screen.height - c.height - c.border
                } else {
                    y + c.border
                };
            }
            if rule.dock {
                c.is_dock = true;
            }
            if rule.vdesk != VDESK_NONE {
                c.vdesk = rule.vdesk;
            }
            self.moveresizeraise(window)?;
        }
        Ok(())
    }

    /// Stop managing `window` and restore it to the state we found it in.
    ///
    /// A client flagged for removal is being withdrawn by its application;
    /// otherwise the manager itself is letting go (shutdown or reload).
    pub fn unmanage(&mut self, window: Window) -> Result<()> {
        let Some(mut c) = self.clients.get(window).cloned() else {
            return Ok(());
        };
        self.abandon_mode(window)?;
        debug!(
            "Unmanaging 0x{:x} ({})",
            window,
            if c.remove { "withdrawn" } else { "releasing" }
        );

        self.display.grab_server()?;
        if c.remove {
            if self.current == Some(window) {
                tolerate(self.display.set_input_focus(Focus::PointerRoot))?;
            }
            tolerate(self.set_wm_state(window, WmState::Withdrawn))?;
            tolerate(self.display.delete_property(window, PropertyName::NetWmDesktop))?;
            tolerate(self.display.delete_property(window, PropertyName::NetWmState))?;
        } else {
            tolerate(self.display.delete_property(window, PropertyName::AllowedActions))?;
        }

        let (root, sw, sh) = {
            let s = &self.screens[c.screen];
            (s.root, s.width, s.height)
        };
        c.gravitate(-c.border, sw, sh);
        c.gravitate(c.old_border, sw, sh);
        c.x -= c.old_border;
        c.y -= c.old_border;

        tolerate(self.display.reparent(window, root, c.x, c.y))?;
        tolerate(self.display.configure(
            window,
            &ConfigureWindowAux::new().border_width(c.old_border.max(0) as u32),
        ))?;
        tolerate(self.display.change_save_set(window, false))?;
        if c.frame != 0 {
            tolerate(self.display.destroy(c.frame))?;
        }

        self.clients.remove(window);
        if c.remove {
            self.update_client_list(c.screen)?;
            self.update_client_list_stacking(c.screen)?;
        }
        if self.current == Some(window) {
            self.current = None;
            self.publish_net_wm_state(&c)?;
        }

        self.display.ungrab_server()?;
        tolerate(self.display.sync())
    }

    /// WM_NORMAL_HINTS changed.
    pub(crate) fn refresh_normal_hints(&mut self, window: Window) -> Result<()> {
        let size_hints = self.display.size_hints(window)?;
        if let Some(c) = self.clients.get_mut(window) {
            c.set_hints(NormalHints::from_size_hints(size_hints.as_ref()));
        }
        Ok(())
    }

    /// _NET_WM_WINDOW_TYPE changed: a client may have stopped being a dock.
    pub(crate) fn refresh_window_type(&mut self, window: Window) -> Result<()> {
        let window_type = self.display.window_type(window)?;
        let Some(c) = self.clients.get_mut(window) else {
            return Ok(());
        };
        c.is_dock = window_type.contains(WindowType::DOCK);
        let show = !c.is_dock && self.screens[c.screen].shows(c);
        if show {
            self.show(window)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(border: i32) -> Client {
        let mut c = Client::new(5, 0, NormalHints::from_size_hints(None));
        c.border = border;
        c.normal_border = border;
        c
    }

    fn attrs(x: i32, y: i32, width: i32, height: i32, viewable: bool) -> WindowAttributes {
        WindowAttributes { x, y, width, height, viewable, ..Default::default() }
    }

    const SCREEN: Rect = Rect { x: 0, y: 0, width: 1000, height: 800 };

    #[test]
    fn viewable_window_keeps_position() {
        let mut c = client(1);
        let notify = place_new_client(&mut c, &attrs(100, 50, 300, 200, true), false, None, SCREEN);
        assert_eq!(notify, None);
        assert_eq!((c.x, c.y, c.width, c.height), (101, 51, 300, 200));
        assert_eq!(c.ignore_unmap, 1);
    }

    #[test]
    fn new_window_follows_pointer() {
        let mut c = client(1);
        let pointer = Pointer { root: 1, x: 500, y: 400 };
        let notify = place_new_client(
            &mut c,
            &attrs(0, 0, 200, 100, false),
            false,
            Some(&pointer),
            SCREEN,
        );
        assert_eq!(notify, Some(Rect::new(399, 349, 200, 100)));
        // 500 * (1000 - 1 - 200) / 1000 = 399, then the border offset
        assert_eq!((c.x, c.y), (400, 400 * (800 - 1 - 100) / 800 + 1));
        assert_eq!(c.ignore_unmap, 0);
    }

    #[test]
    fn undersized_window_gets_minimum() {
        let mut c = client(0);
        c.hints.min_width = 50;
        c.hints.min_height = 60;
        let notify = place_new_client(&mut c, &attrs(10, 10, 20, 20, false), true, None, SCREEN);
        assert_eq!(notify, Some(Rect::new(10, 10, 50, 60)));
        assert_eq!((c.width, c.height), (50, 60));
        assert_eq!((c.x, c.y), (10, 10));
    }

    #[test]
    fn old_border_is_absorbed() {
        let mut c = client(2);
        c.old_border = 3;
        place_new_client(&mut c, &attrs(10, 10, 100, 100, true), false, None, SCREEN);
        // +3 for the old border, -3 then +2 for NorthWest gravity
        assert_eq!((c.x, c.y), (12, 12));
    }
}
