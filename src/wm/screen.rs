//! Screen Module
//!
//! Per-root state: monitors, virtual desktops, dock visibility and the
//! re-layout performed when RandR reports a new screen size.

use tracing::{debug, info};
use x11rb::protocol::xproto::{Colormap, Window};

use crate::error::Result;
use crate::shared::Rect;
use crate::wm::client::{Client, VDESK_FIXED};
use crate::wm::display::{DisplayServer, Property, PropertyName, ScreenInfo};
use crate::wm::WindowManager;

/// Root properties we own and remove again on shutdown.
const ROOT_PROPERTIES: &[PropertyName] = &[
    PropertyName::Supported,
    PropertyName::ClientList,
    PropertyName::ClientListStacking,
    PropertyName::NumberOfDesktops,
    PropertyName::DesktopGeometry,
    PropertyName::DesktopViewport,
    PropertyName::CurrentDesktop,
    PropertyName::ActiveWindow,
    PropertyName::Workarea,
    PropertyName::SupportingWmCheck,
];

/// Per-screen window manager state, one per X root window.
#[derive(Debug, Clone)]
pub struct Screen {
    pub index: usize,
    pub root: Window,
    /// Window advertised through _NET_SUPPORTING_WM_CHECK
    pub supporting: Window,
    /// Last value published as _NET_ACTIVE_WINDOW
    pub active: Option<Window>,
    pub width: i32,
    pub height: i32,
    pub colormap: Colormap,

    /// Border pixels: focused, unfocused, focused-and-fixed
    pub fg: u32,
    pub bg: u32,
    pub fc: u32,

    pub vdesk: u32,
    pub old_vdesk: u32,
    pub docks_visible: bool,

    /// Never empty once the screen is initialised.
    pub monitors: Vec<Rect>,

    /// DISPLAY value for programs spawned from this screen
    pub display: String,
}

impl Screen {
    pub fn new(index: usize, info: &ScreenInfo, display: String) -> Self {
        Self {
            index,
            root: info.root,
            supporting: 0,
            active: None,
            width: info.width,
            height: info.height,
            colormap: info.default_colormap,
            fg: 0,
            bg: 0,
            fc: 0,
            vdesk: 0,
            old_vdesk: 0,
            docks_visible: true,
            monitors: vec![Rect::new(0, 0, info.width, info.height)],
            display,
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    /// Monitor a client belongs to: the largest intersection relative to the
    /// monitor's area wins, then the nearest midpoint.  The flag reports
    /// whether the client intersects any monitor at all.
    pub fn client_monitor(&self, client: &Client) -> (Rect, bool) {
        let rect = client.outer_rect();
        let mut best: Option<usize> = None;
        let mut have_intersection = false;
        let mut best_ratio = 0.0;
        let mut best_distance = 0.0;

        for (i, m) in self.monitors.iter().enumerate() {
            let iarea = rect.intersection_area(m);
            if iarea > 0 {
                let ratio = iarea as f64 / m.area().max(1) as f64;
                if !have_intersection || ratio > best_ratio {
                    have_intersection = true;
                    best_ratio = ratio;
                    best = Some(i);
                    continue;
                }
            }
            if have_intersection {
                continue;
            }
            let d = rect.midpoint_distance(m);
            if best.is_none() || d < best_distance {
                best_distance = d;
                best = Some(i);
            }
        }

        let monitor = best
            .and_then(|i| self.monitors.get(i).copied())
            .unwrap_or_else(|| self.bounds());
        (monitor, have_intersection)
    }

    /// Whether a client on this screen should currently be mapped.
    pub fn shows(&self, client: &Client) -> bool {
        client.is_fixed() || client.vdesk == self.vdesk
    }
}

impl<D: DisplayServer> WindowManager<D> {
    /// Take over one root window and publish the EWMH root properties.
    pub(crate) fn init_screen(&mut self, index: usize, info: &ScreenInfo) -> Result<()> {
        let display_name = self.display.display_name(index);
        let mut screen = Screen::new(index, info, display_name);

        self.display.become_wm(index, screen.root)?;
        screen.monitors = self.query_monitors(&screen)?;

        let appearance = &self.config.appearance;
        screen.fg = self.display.alloc_color(screen.colormap, &appearance.fg)?;
        screen.bg = self.display.alloc_color(screen.colormap, &appearance.bg)?;
        screen.fc = self.display.alloc_color(screen.colormap, &appearance.fc)?;

        self.display.grab_keys(screen.root, &self.binds.key_grabs())?;

        screen.supporting = self.display.create_supporting_window(screen.root)?;
        let (root, supporting) = (screen.root, screen.supporting);
        self.display.set_property(root, Property::Supported)?;
        self.display
            .set_property(root, Property::NumberOfDesktops(self.config.behavior.vdesks))?;
        self.display.set_property(root, Property::CurrentDesktop(screen.vdesk))?;
        self.display.set_property(root, Property::ActiveWindow(None))?;
        self.display.set_property(root, Property::SupportingWmCheck(supporting))?;
        self.display.set_property(supporting, Property::SupportingWmCheck(supporting))?;
        self.display.set_property(supporting, Property::WmName("evilwm".to_string()))?;
        self.display.set_property(supporting, Property::WmPid(std::process::id()))?;

        info!(
            "Managing screen {} (root 0x{:x}, {}x{}, {} monitor(s))",
            index,
            root,
            screen.width,
            screen.height,
            screen.monitors.len()
        );
        self.screens.push(screen);
        self.set_workarea(index)
    }

    /// Remove everything `init_screen` published.
    pub(crate) fn deinit_screen(&mut self, index: usize) -> Result<()> {
        let Some(screen) = self.screens.get(index) else {
            return Ok(());
        };
        let (root, supporting) = (screen.root, screen.supporting);
        for name in ROOT_PROPERTIES {
            self.display.delete_property(root, *name)?;
        }
        if supporting != 0 {
            self.display.destroy(supporting)?;
        }
        Ok(())
    }

    fn query_monitors(&mut self, screen: &Screen) -> Result<Vec<Rect>> {
        let monitors = if self.config.behavior.wholescreen {
            Vec::new()
        } else {
            self.display.monitors(screen.root)?
        };
        if monitors.is_empty() {
            return Ok(vec![screen.bounds()]);
        }
        Ok(monitors)
    }

    pub(crate) fn probe_monitors(&mut self, index: usize) -> Result<()> {
        let Some(screen) = self.screens.get(index).cloned() else {
            return Ok(());
        };
        let monitors = self.query_monitors(&screen)?;
        debug!("Screen {} monitors: {:?}", index, monitors);
        self.screens[index].monitors = monitors;
        Ok(())
    }

    pub fn find_screen(&self, root: Window) -> Option<usize> {
        self.screens.iter().position(|s| s.root == root)
    }

    /// Screen the pointer is on, falling back to the first.
    pub fn current_screen(&mut self) -> Result<usize> {
        let Some(root) = self.screens.first().map(|s| s.root) else {
            return Ok(0);
        };
        let pointer = self.display.query_pointer(root)?;
        Ok(self.find_screen(pointer.root).unwrap_or(0))
    }

    pub fn valid_vdesk(&self, vdesk: u32) -> bool {
        vdesk == VDESK_FIXED || vdesk < self.config.behavior.vdesks
    }

    pub fn switch_vdesk(&mut self, index: usize, vdesk: u32) -> Result<()> {
        let Some(screen) = self.screens.get(index) else {
            return Ok(());
        };
        if vdesk >= self.config.behavior.vdesks || vdesk == screen.vdesk {
            return Ok(());
        }
        let (old, docks_visible) = (screen.vdesk, screen.docks_visible);
        debug!("Screen {}: switching vdesk {} -> {}", index, old, vdesk);

        if let Some(current) = self.current
            && self.clients.get(current).is_some_and(|c| !c.is_fixed())
        {
            self.select_client(None)?;
        }

        let windows: Vec<Window> = self
            .clients
            .iter()
            .filter(|c| c.screen == index)
            .map(|c| c.window)
            .collect();
        for w in windows {
            let Some(c) = self.clients.get(w) else { continue };
            let (on_old, on_new, is_dock) = (c.vdesk == old, c.vdesk == vdesk, c.is_dock);
            if on_old {
                self.hide(w)?;
            } else if on_new && (!is_dock || docks_visible) {
                self.show(w)?;
            }
        }

        let screen = &mut self.screens[index];
        screen.old_vdesk = old;
        screen.vdesk = vdesk;
        let root = screen.root;
        self.display.set_property(root, Property::CurrentDesktop(vdesk))
    }

    pub fn set_docks_visible(&mut self, index: usize, visible: bool) -> Result<()> {
        let Some(screen) = self.screens.get_mut(index) else {
            return Ok(());
        };
        screen.docks_visible = visible;
        let vdesk = screen.vdesk;
        let docks: Vec<(Window, bool)> = self
            .clients
            .iter()
            .filter(|c| c.screen == index && c.is_dock)
            .map(|c| (c.window, c.is_fixed() || c.vdesk == vdesk))
            .collect();
        for (w, on_vdesk) in docks {
            if !visible {
                self.hide(w)?;
            } else if on_vdesk {
                self.show(w)?;
                self.raise(w)?;
            }
        }
        Ok(())
    }

    pub fn client_to_vdesk(&mut self, window: Window, vdesk: u32) -> Result<()> {
        if !self.valid_vdesk(vdesk) {
            return Ok(());
        }
        let Some(c) = self.clients.get_mut(window) else {
            return Ok(());
        };
        c.vdesk = vdesk;
        let visible = self.screens[c.screen].shows(c);
        if visible {
            self.show(window)?;
        } else {
            self.hide(window)?;
        }
        self.display.set_property(window, Property::NetWmDesktop(vdesk))?;
        self.select_client(self.current)
    }

    /// RandR changed the size of a root: remember where each client sat on
    /// its monitor, re-probe, then put maximised and stranded clients back.
    pub fn screen_changed(&mut self, index: usize, width: i32, height: i32) -> Result<()> {
        info!("Screen {} resized to {}x{}", index, width, height);
        self.scan_before_resize(index);
        if let Some(screen) = self.screens.get_mut(index) {
            screen.width = width;
            screen.height = height;
        }
        self.probe_monitors(index)?;
        self.fix_after_resize(index)?;
        self.set_workarea(index)
    }

    fn scan_before_resize(&mut self, index: usize) {
        let Some(screen) = self.screens.get(index) else {
            return;
        };
        for c in self.clients.iter_mut().filter(|c| c.screen == index) {
            let (m, _) = screen.client_monitor(c);
            let cx = if c.oldw != 0 { c.oldx } else { c.x };
            let cy = if c.oldh != 0 { c.oldy } else { c.y };
            c.mon_offx = f64::from(cx - m.x) / f64::from(m.width.max(1));
            c.mon_offy = f64::from(cy - m.y) / f64::from(m.height.max(1));
        }
    }

    fn fix_after_resize(&mut self, index: usize) -> Result<()> {
        let Some(screen) = self.screens.get(index) else {
            return Ok(());
        };
        let mut moved = Vec::new();
        for w in self.clients.tab.clone() {
            let Some(c) = self.clients.get_mut(w) else { continue };
            if c.screen != index {
                continue;
            }
            let (m, intersects) = screen.client_monitor(c);
            if c.oldw != 0 {
                c.x = m.x - c.border;
                c.width = m.width;
                c.oldx = m.x + (c.mon_offx * f64::from(m.width)) as i32;
            } else if !intersects {
                c.x = m.x + (c.mon_offx * f64::from(m.width)) as i32;
            }
            if c.oldh != 0 {
                c.y = m.y - c.border;
                c.height = m.height;
                c.oldy = m.y + (c.mon_offy * f64::from(m.height)) as i32;
            } else if !intersects {
                c.y = m.y + (c.mon_offy * f64::from(m.height)) as i32;
            }
            moved.push(w);
        }
        for w in moved {
            self.moveresize(w)?;
        }
        Ok(())
    }

    /// Publish desktop geometry, viewport and work area for a screen.
    pub(crate) fn set_workarea(&mut self, index: usize) -> Result<()> {
        let Some(screen) = self.screens.get(index) else {
            return Ok(());
        };
        let (root, bounds) = (screen.root, screen.bounds());
        self.display
            .set_property(root, Property::DesktopGeometry(bounds.width, bounds.height))?;
        self.display.set_property(root, Property::DesktopViewport)?;
        self.display.set_property(root, Property::Workarea(bounds))
    }
}
