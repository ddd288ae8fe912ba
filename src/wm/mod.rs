//! Window Manager Module
//!
//! The [`WindowManager`] context owns every piece of manager state: screens,
//! clients and their orderings, the focused client, binds and the current
//! interaction mode.  Behaviour is split across the submodules as further
//! `impl` blocks on the same type.

pub mod bind;
pub mod client;
pub mod client_flags;
pub mod display;
pub mod events;
pub mod ewmh;
pub mod focus;
pub mod func;
pub mod hints;
pub mod keysym;
pub mod manage;
pub mod moveresize;
pub mod screen;
pub mod stacking;
pub mod x11;

#[cfg(test)]
pub(crate) mod mock_display_server;

use tracing::{debug, info, warn};
use x11rb::protocol::xproto::Window;

use crate::config::{AppRule, Config};
use crate::error::Result;
use crate::wm::bind::Binds;
use crate::wm::client::Clients;
use crate::wm::display::{DisplayServer, Focus, Property};
use crate::wm::moveresize::Mode;
use crate::wm::screen::Screen;

pub struct WindowManager<D: DisplayServer> {
    pub display: D,
    pub config: Config,
    apps: Vec<AppRule>,
    pub screens: Vec<Screen>,
    pub clients: Clients,
    /// Focused client, if any.  Always present in `clients`.
    pub current: Option<Window>,
    pub binds: Binds,
    pub mode: Mode,
    quit: bool,
}

impl<D: DisplayServer> WindowManager<D> {
    pub fn new(display: D, config: Config) -> Self {
        let binds = Binds::from_config(&config);
        let apps = config.app_rules();
        Self {
            display,
            config,
            apps,
            screens: Vec::new(),
            clients: Clients::default(),
            current: None,
            binds,
            mode: Mode::Idle,
            quit: false,
        }
    }

    /// Take over every screen, then manage the windows that already exist.
    pub fn start(&mut self) -> Result<()> {
        let infos = self.display.screens();
        for (index, info) in infos.iter().enumerate() {
            self.init_screen(index, info)?;
        }
        self.manage_existing()?;
        self.display.flush()
    }

    /// Manage every viewable, non-override-redirect child of each root.
    pub fn manage_existing(&mut self) -> Result<()> {
        for index in 0..self.screens.len() {
            let root = self.screens[index].root;
            let children = self.display.query_tree(root)?;
            debug!("Screen {}: {} existing windows", index, children.len());
            for window in children {
                let attrs = match self.display.window_attributes(window) {
                    Ok(attrs) => attrs,
                    Err(e) if e.is_protocol() => continue,
                    Err(e) => return Err(e),
                };
                if !attrs.override_redirect && attrs.viewable {
                    self.manage(window, index)?;
                }
            }
        }
        Ok(())
    }

    /// Give every client back to the root, bottom of the stack first.
    fn unmanage_all(&mut self) -> Result<()> {
        self.end_mode()?;
        while let Some(&window) = self.clients.stacking.first() {
            if let Some(c) = self.clients.get_mut(window) {
                c.remove = false;
            }
            self.unmanage(window)?;
        }
        Ok(())
    }

    /// Leave the display as we found it.
    pub fn shutdown(&mut self) -> Result<()> {
        info!("Shutting down");
        self.unmanage_all()?;
        self.display.set_input_focus(Focus::PointerRoot)?;
        for index in 0..self.screens.len() {
            self.deinit_screen(index)?;
            let colormap = self.screens[index].colormap;
            self.display.install_colormap(colormap)?;
        }
        self.display.flush()
    }

    /// Swap in a new configuration without dropping the connection.
    pub fn reload(&mut self, config: Config) -> Result<()> {
        info!("Reloading configuration");
        self.unmanage_all()?;

        self.binds = Binds::from_config(&config);
        self.apps = config.app_rules();
        self.config = config;

        let vdesks = self.config.behavior.vdesks;
        for index in 0..self.screens.len() {
            let screen = &mut self.screens[index];
            if screen.vdesk >= vdesks {
                screen.vdesk = 0;
            }
            if screen.old_vdesk >= vdesks {
                screen.old_vdesk = 0;
            }
            let (root, colormap, vdesk) = (screen.root, screen.colormap, screen.vdesk);

            let appearance = &self.config.appearance;
            let fg = self.display.alloc_color(colormap, &appearance.fg)?;
            let bg = self.display.alloc_color(colormap, &appearance.bg)?;
            let fc = self.display.alloc_color(colormap, &appearance.fc)?;
            let screen = &mut self.screens[index];
            (screen.fg, screen.bg, screen.fc) = (fg, bg, fc);

            self.display.grab_keys(root, &self.binds.key_grabs())?;
            self.display.set_property(root, Property::NumberOfDesktops(vdesks))?;
            self.display.set_property(root, Property::CurrentDesktop(vdesk))?;
            self.probe_monitors(index)?;
            self.set_workarea(index)?;
        }

        self.manage_existing()?;
        self.display.flush()
    }

    /// Unmanage every client flagged for removal.
    pub fn tidy(&mut self) -> Result<()> {
        let doomed: Vec<Window> = self
            .clients
            .iter()
            .filter(|c| c.remove)
            .map(|c| c.window)
            .collect();
        for window in doomed {
            self.unmanage(window)?;
        }
        Ok(())
    }

    /// Flag the client owning `window` (application window or frame) for
    /// removal at the next sweep.
    pub(crate) fn mark_removed(&mut self, window: Window) {
        let Some(w) = self.clients.find(window) else {
            return;
        };
        if let Some(c) = self.clients.get_mut(w) {
            debug!("Flagging client 0x{:x} for removal", w);
            c.remove = true;
        }
    }

    /// Turn a protocol error from a request about `window` into a removal
    /// flag.  Anything else is passed on.
    pub(crate) fn guard(&mut self, window: Window, result: Result<()>) -> Result<()> {
        match result {
            Err(e) if e.is_protocol() => {
                warn!("Window 0x{:x} vanished: {}", window, e);
                self.mark_removed(window);
                Ok(())
            }
            other => other,
        }
    }

    pub fn quit(&mut self) {
        self.quit = true;
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub(crate) fn app_rules(&self) -> &[AppRule] {
        &self.apps
    }
}

/// Requests made while tearing a client down may fail because the window is
/// already gone; those failures are expected.
pub(crate) fn tolerate(result: Result<()>) -> Result<()> {
    match result {
        Err(e) if e.is_protocol() => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wm::client::VDESK_FIXED;
    use crate::wm::client_flags::Maximise;
    use crate::wm::display::{
        Axis, ButtonEvent, DisplayEvent, KeyEvent, PropertyName, CONTROL_MASK, MOD1_MASK,
    };
    use crate::wm::mock_display_server::{test_manager, Call, MockDisplayServer, ROOT};
    use crate::wm::moveresize::StateAction;

    fn managed(wm: &mut WindowManager<MockDisplayServer>, id: Window) -> Window {
        let w = wm.display.add_window(id, 10, 10, 100, 100);
        wm.manage(w, 0).unwrap();
        w
    }

    #[test]
    fn selecting_recolours_borders() {
        let mut wm = test_manager();
        let a = managed(&mut wm, 100);
        let b = managed(&mut wm, 200);
        assert_eq!(wm.current, Some(b));
        let (fa, fb) = (wm.clients.get(a).unwrap().frame, wm.clients.get(b).unwrap().frame);
        let (fg, bg) = (wm.screens[0].fg, wm.screens[0].bg);

        wm.display.calls.clear();
        wm.select_client(Some(a)).unwrap();
        assert!(wm.display.calls.contains(&Call::BorderColor(fb, bg)));
        assert!(wm.display.calls.contains(&Call::BorderColor(fa, fg)));
        assert!(wm.display.calls.contains(&Call::Focus(Focus::Window(a))));
        assert_eq!(
            wm.display.property(ROOT, PropertyName::ActiveWindow),
            Some(Property::ActiveWindow(Some(a)))
        );
    }

    #[test]
    fn maximise_saves_and_restores_geometry() {
        let mut wm = test_manager();
        let w = managed(&mut wm, 100);
        let both = Maximise::HORZ | Maximise::VERT;

        wm.maximise(w, StateAction::Add, both).unwrap();
        let c = wm.clients.get(w).unwrap();
        assert_eq!((c.x, c.y, c.width, c.height, c.border), (0, 0, 1024, 768, 0));
        assert_eq!(
            wm.display.property(w, PropertyName::Unmaximised(Axis::Horz)),
            Some(Property::Unmaximised(Axis::Horz, 11, 100))
        );

        wm.maximise(w, StateAction::Remove, both).unwrap();
        let c = wm.clients.get(w).unwrap();
        assert_eq!((c.x, c.y, c.width, c.height, c.border), (11, 11, 100, 100, 1));
        assert_eq!(wm.display.property(w, PropertyName::Unmaximised(Axis::Vert)), None);

        wm.maximise(w, StateAction::Toggle, Maximise::VERT).unwrap();
        wm.maximise(w, StateAction::Toggle, Maximise::VERT).unwrap();
        let c = wm.clients.get(w).unwrap();
        assert_eq!((c.y, c.height, c.oldh), (11, 100, 0));
    }

    #[test]
    fn vdesk_switch_hides_and_shows() {
        let mut wm = test_manager();
        let w = managed(&mut wm, 100);
        let frame = wm.clients.get(w).unwrap().frame;

        wm.switch_vdesk(0, 1).unwrap();
        assert!(!wm.display.is_mapped(frame));
        assert_eq!(wm.current, None);
        assert_eq!(wm.clients.get(w).unwrap().ignore_unmap, 2);
        assert_eq!(
            wm.display.property(ROOT, PropertyName::CurrentDesktop),
            Some(Property::CurrentDesktop(1))
        );

        wm.display.calls.clear();
        wm.switch_vdesk(0, 1).unwrap();
        assert!(wm.display.calls.is_empty());

        wm.switch_vdesk(0, 0).unwrap();
        assert!(wm.display.is_mapped(frame));
        assert_eq!(wm.screens[0].old_vdesk, 1);
    }

    #[test]
    fn out_of_range_vdesk_is_ignored() {
        let mut wm = test_manager();
        wm.switch_vdesk(0, 8).unwrap();
        assert_eq!(wm.screens[0].vdesk, 0);
    }

    #[test]
    fn protocol_errors_flag_removal() {
        let mut wm = test_manager();
        let w = managed(&mut wm, 100);
        let gone: Result<()> = Err(crate::error::WmError::Protocol("BadWindow".into()));
        wm.guard(w, gone).unwrap();
        assert!(wm.clients.get(w).unwrap().remove);
        wm.tidy().unwrap();
        assert!(wm.clients.is_empty());
        assert_eq!(wm.display.property(w, PropertyName::NetWmDesktop), None);
    }

    #[test]
    fn shutdown_returns_windows_to_root() {
        let mut wm = test_manager();
        let w = managed(&mut wm, 100);
        let frame = wm.clients.get(w).unwrap().frame;

        wm.shutdown().unwrap();
        assert!(wm.clients.is_empty());
        assert!(wm.display.calls.contains(&Call::Reparent(w, ROOT)));
        assert!(wm.display.calls.contains(&Call::Destroy(frame)));
        assert_eq!(wm.display.focus, Some(Focus::PointerRoot));
        assert_eq!(wm.display.windows.get(&w).map(|a| (a.x, a.y)), Some((10, 10)));
    }

    #[test]
    fn reload_remanages_existing_windows() {
        let mut wm = test_manager();
        let w = managed(&mut wm, 100);
        let old_frame = wm.clients.get(w).unwrap().frame;

        let mut config = Config::default();
        config.behavior.vdesks = 4;
        wm.reload(config).unwrap();

        assert_eq!(wm.clients.len(), 1);
        let c = wm.clients.get(w).unwrap();
        assert_ne!(c.frame, old_frame);
        assert_eq!((c.x, c.y), (11, 11));
        assert_eq!(
            wm.display.property(ROOT, PropertyName::NumberOfDesktops),
            Some(Property::NumberOfDesktops(4))
        );
    }

    #[test]
    fn full_vdesk_cycle_keeps_fixed_clients_shown() {
        let mut wm = test_manager();
        let fixed = managed(&mut wm, 100);
        let normal = managed(&mut wm, 200);
        wm.client_to_vdesk(fixed, VDESK_FIXED).unwrap();
        let (ff, nf) = (wm.clients.get(fixed).unwrap().frame, wm.clients.get(normal).unwrap().frame);

        for v in (1..8).chain([0]) {
            wm.switch_vdesk(0, v).unwrap();
            assert!(wm.display.is_mapped(ff), "fixed client hidden on vdesk {v}");
            assert_eq!(wm.display.is_mapped(nf), v == 0, "vdesk {v}");
        }
    }

    #[test]
    fn release_ends_drag_after_vdesk_switch() {
        let mut wm = test_manager();
        let w = managed(&mut wm, 100);
        wm.start_drag(w, 1).unwrap();
        assert!(!wm.mode.is_idle());

        wm.switch_vdesk(0, 3).unwrap();
        let release = ButtonEvent { root: ROOT, window: ROOT, button: 1, state: 0, root_x: 600, root_y: 400 };
        wm.handle_event(DisplayEvent::ButtonRelease(release)).unwrap();
        assert!(wm.mode.is_idle());
        assert!(wm.display.calls.contains(&Call::UngrabPointer));
    }

    #[test]
    fn info_and_next_keys_wait_for_drag_to_end() {
        let mut wm = test_manager();
        let a = managed(&mut wm, 100);
        let w = managed(&mut wm, 200);
        wm.start_drag(w, 1).unwrap();
        let press = |keycode, keysym, state| {
            DisplayEvent::KeyPress(KeyEvent { root: ROOT, keycode, keysym, state, time: 0 })
        };

        wm.display.calls.clear();
        wm.handle_event(press(31, 0x69, CONTROL_MASK | MOD1_MASK)).unwrap();
        wm.handle_event(press(23, 0xff09, MOD1_MASK)).unwrap();
        assert!(matches!(wm.mode, Mode::Dragging(_)));
        assert_eq!(wm.current, Some(w));
        assert!(!wm.display.calls.contains(&Call::GrabKeyboard));

        let release = ButtonEvent { root: ROOT, window: ROOT, button: 1, state: 0, root_x: 40, root_y: 40 };
        wm.handle_event(DisplayEvent::ButtonRelease(release)).unwrap();
        assert!(wm.mode.is_idle());
        assert!(wm.display.calls.contains(&Call::UngrabPointer));
        assert!(!wm.display.calls.contains(&Call::UngrabKeyboard));
        assert_ne!(wm.current, Some(a));
    }

    #[test]
    fn unbound_key_does_nothing() {
        let mut wm = test_manager();
        let w = managed(&mut wm, 100);
        let press = |keysym| {
            DisplayEvent::KeyPress(KeyEvent {
                root: ROOT,
                keycode: 44,
                keysym,
                state: CONTROL_MASK | MOD1_MASK,
                time: 0,
            })
        };

        wm.handle_event(press(0x6a)).unwrap();
        assert_eq!(wm.clients.get(w).unwrap().y, 27);

        wm.binds.bind("mask1+j", "");
        wm.handle_event(press(0x6a)).unwrap();
        assert_eq!(wm.clients.get(w).unwrap().y, 27);
    }
}
