//! Func Module
//!
//! Resolution of key and button presses to bound operations, and the
//! operations themselves.

use tracing::{debug, info, warn};
use x11rb::protocol::xproto::Window;

use crate::error::Result;
use crate::spawn::spawn;
use crate::wm::bind::{ContextKind, Operation, ResizeOp, Step, VdeskOp};
use crate::wm::client::VDESK_FIXED;
use crate::wm::client_flags::FuncFlags;
use crate::wm::display::{ButtonEvent, DisplayServer, KeyEvent};
use crate::wm::moveresize::{StateAction, Trigger};
use crate::wm::WindowManager;

/// What an operation acts upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    Client(Window),
    Screen(usize),
    None,
}

/// The event that triggered an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Key(KeyEvent),
    Button(ButtonEvent),
}

impl<D: DisplayServer> WindowManager<D> {
    pub(crate) fn dispatch_key(&mut self, ev: &KeyEvent) -> Result<()> {
        if self.mode_key_press(ev)? {
            return Ok(());
        }
        let numlock = self.display.numlock_mask();
        let Some(bind) = self.binds.find_key(ev.keysym, ev.state, numlock).copied() else {
            return Ok(());
        };
        let context = match bind.function.context() {
            ContextKind::Client => match self.current {
                Some(w) => Context::Client(w),
                None => return Ok(()),
            },
            ContextKind::Screen => Context::Screen(self.current_screen()?),
            ContextKind::None => Context::None,
        };
        self.execute(bind.operation(), context, Input::Key(*ev))
    }

    pub(crate) fn dispatch_button(&mut self, ev: &ButtonEvent) -> Result<()> {
        if !self.mode.is_idle() {
            return Ok(());
        }
        let numlock = self.display.numlock_mask();
        let Some(bind) = self.binds.find_button(ev.button, ev.state, numlock).copied() else {
            return Ok(());
        };
        let context = match bind.function.context() {
            ContextKind::Client => match self.clients.find(ev.window) {
                Some(w) => Context::Client(w),
                None => return Ok(()),
            },
            ContextKind::Screen => Context::Screen(self.current_screen()?),
            // Cycling and spawning only make sense from the keyboard
            ContextKind::None => return Ok(()),
        };
        self.execute(bind.operation(), context, Input::Button(*ev))
    }

    /// Carry out one bound operation.
    pub fn execute(&mut self, op: Operation, context: Context, input: Input) -> Result<()> {
        debug!("Executing {:?} on {:?}", op, context);
        match (op, context) {
            (Operation::Nothing, _) => Ok(()),
            (Operation::Delete { kill }, Context::Client(w)) => self.delete_client(w, kill),
            (Operation::ToggleDocks, Context::Screen(s)) => {
                let visible = self.screens.get(s).is_some_and(|screen| screen.docks_visible);
                self.set_docks_visible(s, !visible)
            }
            (Operation::Info, Context::Client(w)) => {
                let trigger = match input {
                    Input::Key(ev) => Trigger::Key(ev.keycode),
                    Input::Button(ev) => Trigger::Button(ev.button),
                };
                self.start_info(w, trigger)
            }
            (Operation::Lower, Context::Client(w)) => self.lower(w),
            (Operation::Raise, Context::Client(w)) => self.raise(w),
            (Operation::Move(step), Context::Client(w)) => match input {
                Input::Button(ev) => self.start_drag(w, ev.button),
                Input::Key(_) => self.move_client(w, step),
            },
            (Operation::Resize(op), Context::Client(w)) => match input {
                Input::Button(ev) => self.start_sweep(w, ev.button),
                Input::Key(_) => self.resize_client(w, op),
            },
            (Operation::Next, _) => match input {
                Input::Key(ev) => self.start_cycle(&ev),
                Input::Button(_) => Ok(()),
            },
            (Operation::Spawn, _) => self.spawn_terminal(),
            (Operation::Vdesk(op), Context::Screen(s)) => self.change_vdesk(s, op),
            (Operation::ToggleFixed, Context::Client(w)) => {
                let Some(c) = self.clients.get(w) else {
                    return Ok(());
                };
                let target = if c.is_fixed() { self.screens[c.screen].vdesk } else { VDESK_FIXED };
                self.client_to_vdesk(w, target)
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn delete_client(&mut self, window: Window, kill: bool) -> Result<()> {
        if !kill && self.display.supports_delete(window)? {
            info!("Asking 0x{:x} to close", window);
            self.display.send_delete(window)
        } else {
            info!("Killing client of 0x{:x}", window);
            self.display.kill_client(window)
        }
    }

    fn move_client(&mut self, window: Window, step: Step) -> Result<()> {
        let Some(c) = self.clients.get(window) else {
            return Ok(());
        };
        let monitor = self.screens[c.screen].client_monitor(c).0;
        let Some(c) = self.clients.get_mut(window) else {
            return Ok(());
        };
        match step {
            Step::Relative { dx, dy } => {
                let (xs, ys) = c.step();
                c.x += dx * xs;
                c.y += dy * ys;
            }
            Step::Edges(edges) => {
                if edges.contains(FuncFlags::RIGHT) {
                    c.x = monitor.x + monitor.width - c.width - c.border;
                }
                if edges.contains(FuncFlags::LEFT) {
                    c.x = monitor.x + c.border;
                }
                if edges.contains(FuncFlags::BOTTOM) {
                    c.y = monitor.y + monitor.height - c.height - c.border;
                }
                if edges.contains(FuncFlags::TOP) {
                    c.y = monitor.y + c.border;
                }
            }
        }
        self.place_client(window)
    }

    fn resize_client(&mut self, window: Window, op: ResizeOp) -> Result<()> {
        match op {
            ResizeOp::ToggleMaximise(axes) => self.maximise(window, StateAction::Toggle, axes),
            ResizeOp::Relative { dw, dh } => {
                let Some(c) = self.clients.get_mut(window) else {
                    return Ok(());
                };
                let (ws, hs) = c.step();
                c.width += dw * ws;
                c.height += dh * hs;
                self.place_client(window)
            }
            ResizeOp::Constrain => self.place_client(window),
        }
    }

    fn change_vdesk(&mut self, screen: usize, op: VdeskOp) -> Result<()> {
        let Some(s) = self.screens.get(screen) else {
            return Ok(());
        };
        let target = match op {
            VdeskOp::Toggle => Some(s.old_vdesk),
            VdeskOp::Relative(delta) if delta < 0 => s.vdesk.checked_sub(1),
            VdeskOp::Relative(delta) if delta > 0 => s.vdesk.checked_add(1),
            VdeskOp::Relative(_) => None,
            VdeskOp::Goto(v) => Some(v),
        };
        match target {
            Some(v) => self.switch_vdesk(screen, v),
            None => Ok(()),
        }
    }

    fn spawn_terminal(&mut self) -> Result<()> {
        let screen = self.current_screen()?;
        let display = match self.screens.get(screen) {
            Some(s) => s.display.clone(),
            None => self.display.display_name(screen),
        };
        if let Err(e) = spawn(&self.config.behavior.term, &display) {
            warn!("Failed to launch {:?}: {}", self.config.behavior.term, e);
        }
        Ok(())
    }
}
