//! Bind Module
//!
//! Key and button chords mapped to window manager operations.  Binds are
//! parsed from strings such as `"mask1+altmask+k"` / `"resize,relative+up"`
//! and can be replaced or removed at runtime.

use tracing::{debug, warn};

use crate::config::Config;
use crate::wm::client_flags::{FuncFlags, Maximise};
use crate::wm::display::{
    Keysym, CONTROL_MASK, LOCK_MASK, MOD1_MASK, MOD2_MASK, MOD3_MASK, MOD4_MASK, MOD5_MASK,
    SHIFT_MASK,
};
use crate::wm::keysym::into_keysym;

const KEY_STATE_MASK: u16 =
    SHIFT_MASK | CONTROL_MASK | MOD1_MASK | MOD2_MASK | MOD3_MASK | MOD4_MASK | MOD5_MASK;

const BUILTIN_BINDS: &[(&str, &str)] = &[
    // Move client
    ("mask1+k", "move,relative+up"),
    ("mask1+j", "move,relative+down"),
    ("mask1+h", "move,relative+left"),
    ("mask1+l", "move,relative+right"),
    ("mask1+y", "move,top+left"),
    ("mask1+u", "move,top+right"),
    ("mask1+b", "move,bottom+left"),
    ("mask1+n", "move,bottom+right"),
    // Resize client
    ("mask1+altmask+k", "resize,relative+up"),
    ("mask1+altmask+j", "resize,relative+down"),
    ("mask1+altmask+h", "resize,relative+left"),
    ("mask1+altmask+l", "resize,relative+right"),
    ("mask1+x", "resize,toggle+v+h"),
    ("mask1+equal", "resize,toggle+v"),
    ("mask1+altmask+equal", "resize,toggle+h"),
    // Client misc
    ("mask1+Escape", "delete"),
    ("mask1+altmask+Escape", "kill"),
    ("mask1+i", "info"),
    ("mask1+Insert", "lower"),
    ("mask1+KP_Insert", "lower"),
    ("mask2+Tab", "next"),
    ("mask1+Return", "spawn"),
    ("mask1+f", "fix,toggle"),
    // Virtual desktops
    ("mask1+1", "vdesk,0"),
    ("mask1+2", "vdesk,1"),
    ("mask1+3", "vdesk,2"),
    ("mask1+4", "vdesk,3"),
    ("mask1+5", "vdesk,4"),
    ("mask1+6", "vdesk,5"),
    ("mask1+7", "vdesk,6"),
    ("mask1+8", "vdesk,7"),
    ("mask1+a", "vdesk,toggle"),
    ("mask1+Left", "vdesk,relative+down"),
    ("mask1+Right", "vdesk,relative+up"),
    // Screen misc
    ("mask1+d", "dock,toggle"),
    // Button controls
    ("button1", "move"),
    ("button2", "resize"),
    ("button3", "lower"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Key(Keysym),
    Button(u8),
}

impl Control {
    fn button_by_name(name: &str) -> Option<u8> {
        Some(match name {
            "button1" => 1,
            "button2" => 2,
            "button3" => 3,
            "button4" => 4,
            "button5" => 5,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Delete,
    Kill,
    Dock,
    Info,
    Lower,
    Raise,
    Move,
    Next,
    Resize,
    Spawn,
    Vdesk,
    Fix,
}

/// What a bound function operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Client,
    Screen,
    None,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "delete" => Function::Delete,
            "kill" => Function::Kill,
            "dock" => Function::Dock,
            "info" => Function::Info,
            "lower" => Function::Lower,
            "raise" => Function::Raise,
            "move" => Function::Move,
            "next" => Function::Next,
            "resize" => Function::Resize,
            "spawn" => Function::Spawn,
            "vdesk" => Function::Vdesk,
            "fix" => Function::Fix,
            _ => return None,
        })
    }

    pub fn context(self) -> ContextKind {
        match self {
            Function::Dock | Function::Vdesk => ContextKind::Screen,
            Function::Next | Function::Spawn => ContextKind::None,
            _ => ContextKind::Client,
        }
    }

    fn base_value(self) -> u8 {
        match self {
            Function::Kill => 1,
            _ => 0,
        }
    }
}

/// Keyboard moves: either a step in increments, or alignment to monitor edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Relative { dx: i32, dy: i32 },
    Edges(FuncFlags),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeOp {
    Relative { dw: i32, dh: i32 },
    ToggleMaximise(Maximise),
    /// Reapply size limits without changing anything else.
    Constrain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VdeskOp {
    Toggle,
    Relative(i32),
    Goto(u32),
}

/// A bound function with its flags resolved into a typed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Delete { kill: bool },
    ToggleDocks,
    Info,
    Lower,
    Raise,
    Move(Step),
    Resize(ResizeOp),
    Next,
    Spawn,
    Vdesk(VdeskOp),
    ToggleFixed,
    Nothing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bind {
    pub control: Control,
    pub state: u16,
    pub function: Function,
    pub flags: FuncFlags,
    pub value: u8,
}

fn direction(flags: FuncFlags, minus: FuncFlags, plus: FuncFlags) -> i32 {
    i32::from(flags.contains(plus)) - i32::from(flags.contains(minus))
}

impl Bind {
    pub fn operation(&self) -> Operation {
        let f = self.flags;
        match self.function {
            Function::Delete | Function::Kill => Operation::Delete { kill: self.value != 0 },
            Function::Dock if f.contains(FuncFlags::TOGGLE) => Operation::ToggleDocks,
            Function::Fix if f.contains(FuncFlags::TOGGLE) => Operation::ToggleFixed,
            Function::Dock | Function::Fix => Operation::Nothing,
            Function::Info => Operation::Info,
            Function::Lower => Operation::Lower,
            Function::Raise => Operation::Raise,
            Function::Next => Operation::Next,
            Function::Spawn => Operation::Spawn,
            Function::Move if f.contains(FuncFlags::RELATIVE) => Operation::Move(Step::Relative {
                dx: direction(f, FuncFlags::LEFT, FuncFlags::RIGHT),
                dy: direction(f, FuncFlags::UP, FuncFlags::DOWN),
            }),
            Function::Move => Operation::Move(Step::Edges(f & (FuncFlags::HORZ | FuncFlags::VERT))),
            Function::Resize if f.contains(FuncFlags::RELATIVE) => {
                Operation::Resize(ResizeOp::Relative {
                    dw: direction(f, FuncFlags::LEFT, FuncFlags::RIGHT),
                    dh: direction(f, FuncFlags::UP, FuncFlags::DOWN),
                })
            }
            Function::Resize if f.contains(FuncFlags::TOGGLE) => {
                let mut axes = Maximise::empty();
                if f.contains(FuncFlags::HORZ) {
                    axes |= Maximise::HORZ;
                }
                if f.contains(FuncFlags::VERT) {
                    axes |= Maximise::VERT;
                }
                Operation::Resize(ResizeOp::ToggleMaximise(axes))
            }
            Function::Resize => Operation::Resize(ResizeOp::Constrain),
            Function::Vdesk if f.contains(FuncFlags::TOGGLE) => Operation::Vdesk(VdeskOp::Toggle),
            Function::Vdesk if f.contains(FuncFlags::RELATIVE) => {
                Operation::Vdesk(VdeskOp::Relative(direction(f, FuncFlags::DOWN, FuncFlags::UP)))
            }
            Function::Vdesk => Operation::Vdesk(VdeskOp::Goto(u32::from(self.value))),
        }
    }
}

/// Values of the redefinable modifier names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modifiers {
    pub mask1: u16,
    pub mask2: u16,
    pub altmask: u16,
}

impl Default for Modifiers {
    fn default() -> Self {
        Self {
            mask1: CONTROL_MASK | MOD1_MASK,
            mask2: MOD1_MASK,
            altmask: SHIFT_MASK,
        }
    }
}

impl Modifiers {
    pub fn by_name(&self, name: &str) -> Option<u16> {
        Some(match name {
            "mask1" => self.mask1,
            "mask2" => self.mask2,
            "altmask" => self.altmask,
            "shift" => SHIFT_MASK,
            "lock" => LOCK_MASK,
            "control" | "ctrl" => CONTROL_MASK,
            "alt" | "mod1" => MOD1_MASK,
            "mod2" => MOD2_MASK,
            "mod3" => MOD3_MASK,
            "mod4" => MOD4_MASK,
            "mod5" => MOD5_MASK,
            _ => return None,
        })
    }

    /// Redefine `mask1`, `mask2` or `altmask` from a list such as
    /// `"control+alt"`.  Unknown names in the list are ignored.
    pub fn set(&mut self, name: &str, spec: &str) {
        let value = spec
            .split([',', '+'])
            .filter_map(|token| self.by_name(token))
            .fold(0, |acc, m| acc | m);
        match name {
            "mask1" => self.mask1 = value,
            "mask2" => self.mask2 = value,
            "altmask" => self.altmask = value,
            _ => warn!("Unknown modifier name {:?}", name),
        }
    }
}

/// The active bind list.  Earlier binds take precedence.
#[derive(Debug, Clone, Default)]
pub struct Binds {
    pub binds: Vec<Bind>,
    pub modifiers: Modifiers,
}

impl Binds {
    /// Built-in binds with configured modifiers and binds applied on top.
    pub fn from_config(config: &Config) -> Self {
        let mut binds = Self::default();
        let m = &config.modifiers;
        for (name, spec) in [("mask1", &m.mask1), ("mask2", &m.mask2), ("altmask", &m.altmask)] {
            if let Some(spec) = spec {
                binds.modifiers.set(name, spec);
            }
        }
        for (control, function) in BUILTIN_BINDS {
            binds.bind(control, function);
        }
        for b in &config.binds {
            binds.bind(&b.control, &b.function);
        }
        binds
    }

    /// Bind `control` to `function`, replacing any bind of the same chord.
    /// An empty `function` just removes the existing bind.
    pub fn bind(&mut self, control: &str, function: &str) {
        let mut state = 0u16;
        let mut parsed = None;
        for token in control.split([',', '+']).filter(|t| !t.is_empty()) {
            if let Some(m) = self.modifiers.by_name(token) {
                state |= m;
                continue;
            }
            if parsed.is_some() {
                continue;
            }
            if let Some(button) = Control::button_by_name(token) {
                parsed = Some(Control::Button(button));
            } else if let Some(keysym) = into_keysym(token) {
                parsed = Some(Control::Key(keysym));
            }
        }
        let Some(control_value) = parsed else {
            warn!("No key or button in bind control {:?}", control);
            return;
        };

        if let Some(pos) = self
            .binds
            .iter()
            .position(|b| b.control == control_value && b.state == state)
        {
            self.binds.remove(pos);
        }

        let mut new: Option<Bind> = None;
        for token in function.split([',', '+']).filter(|t| !t.is_empty()) {
            if let Some(f) = Function::from_name(token) {
                new = Some(Bind {
                    control: control_value,
                    state,
                    function: f,
                    flags: FuncFlags::empty(),
                    value: f.base_value(),
                });
                continue;
            }
            let Some(bind) = new.as_mut() else {
                continue;
            };
            if token.starts_with(|c: char| c.is_ascii_digit()) {
                bind.value = (parse_c_integer(token) & 0xff) as u8;
            } else if let Some(flag) = FuncFlags::from_token(token) {
                bind.flags |= flag;
            } else {
                warn!("Unknown flag {:?} in bind {:?}", token, function);
            }
        }

        if let Some(bind) = new {
            debug!("Bound {:?} to {:?}", control, bind.operation());
            self.binds.insert(0, bind);
        }
    }

    fn key_state(state: u16, numlock: u16) -> u16 {
        state & KEY_STATE_MASK & !numlock
    }

    pub fn find_key(&self, keysym: Keysym, state: u16, numlock: u16) -> Option<&Bind> {
        let state = Self::key_state(state, numlock);
        self.binds
            .iter()
            .find(|b| b.control == Control::Key(keysym) && b.state == state)
    }

    pub fn find_button(&self, button: u8, state: u16, numlock: u16) -> Option<&Bind> {
        let state = Self::key_state(state, numlock) & !self.modifiers.mask2;
        self.binds
            .iter()
            .find(|b| b.control == Control::Button(button) && b.state == state)
    }

    /// (modifiers, keysym) for every key bind.
    pub fn key_grabs(&self) -> Vec<(u16, Keysym)> {
        self.binds
            .iter()
            .filter_map(|b| match b.control {
                Control::Key(k) => Some((b.state, k)),
                Control::Button(_) => None,
            })
            .collect()
    }

    /// Button grabs for client frames.  Bind modifiers are not used; every
    /// button is grabbed with `mask2` and `mask2+altmask`.
    pub fn button_grabs(&self) -> Vec<(u16, u8)> {
        let m = self.modifiers;
        self.binds
            .iter()
            .filter_map(|b| match b.control {
                Control::Button(button) => Some(button),
                Control::Key(_) => None,
            })
            .flat_map(|button| [(m.mask2, button), (m.mask2 | m.altmask, button)])
            .collect()
    }
}

/// Leading integer in C notation: `0x` hex, leading `0` octal, else decimal.
fn parse_c_integer(token: &str) -> u32 {
    let (digits, radix) = if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        (hex, 16)
    } else if token.len() > 1 && token.starts_with('0') {
        (&token[1..], 8)
    } else {
        (token, 10)
    };
    let end = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());
    u32::from_str_radix(&digits[..end], radix).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtin() -> Binds {
        Binds::from_config(&Config::default())
    }

    const K: Keysym = 0x6b;

    #[test]
    fn builtins_dispatch() {
        let binds = builtin();
        let mask1 = CONTROL_MASK | MOD1_MASK;
        let b = binds.find_key(K, mask1, 0).unwrap();
        assert_eq!(b.operation(), Operation::Move(Step::Relative { dx: 0, dy: -1 }));

        let b = binds.find_key(K, mask1 | SHIFT_MASK, 0).unwrap();
        assert_eq!(b.operation(), Operation::Resize(ResizeOp::Relative { dw: 0, dh: -1 }));

        let b = binds.find_key(u32::from(b'x'), mask1, 0).unwrap();
        assert_eq!(
            b.operation(),
            Operation::Resize(ResizeOp::ToggleMaximise(Maximise::HORZ | Maximise::VERT))
        );

        let b = binds.find_key(u32::from(b'3'), mask1, 0).unwrap();
        assert_eq!(b.operation(), Operation::Vdesk(VdeskOp::Goto(2)));
        assert_eq!(b.function.context(), ContextKind::Screen);

        let b = binds.find_key(0xff1b, mask1 | SHIFT_MASK, 0).unwrap();
        assert_eq!(b.operation(), Operation::Delete { kill: true });
    }

    #[test]
    fn numlock_and_lock_are_ignored() {
        let binds = builtin();
        let mask1 = CONTROL_MASK | MOD1_MASK;
        assert!(binds.find_key(K, mask1 | MOD2_MASK | LOCK_MASK, MOD2_MASK).is_some());
        assert!(binds.find_key(K, CONTROL_MASK, MOD2_MASK).is_none());
    }

    #[test]
    fn buttons_ignore_mask2() {
        let binds = builtin();
        let b = binds.find_button(1, MOD1_MASK, 0).unwrap();
        assert_eq!(b.function, Function::Move);
        assert!(binds.find_button(1, MOD1_MASK | CONTROL_MASK, 0).is_none());
        assert_eq!(binds.button_grabs().len(), 6);
        assert!(binds.button_grabs().contains(&(MOD1_MASK | SHIFT_MASK, 2)));
    }

    #[test]
    fn rebinding_leaves_one_bind() {
        let mut binds = builtin();
        let before = binds.binds.len();
        binds.bind("mask1+k", "raise");
        binds.bind("mask1+k", "lower");
        assert_eq!(binds.binds.len(), before);
        let matches = binds
            .binds
            .iter()
            .filter(|b| b.control == Control::Key(K) && b.state == CONTROL_MASK | MOD1_MASK)
            .count();
        assert_eq!(matches, 1);
        assert_eq!(binds.find_key(K, CONTROL_MASK | MOD1_MASK, 0).unwrap().function, Function::Lower);
    }

    #[test]
    fn unbind_then_dispatch_finds_nothing() {
        let mut binds = builtin();
        binds.bind("mask1+k", "");
        assert!(binds.find_key(K, CONTROL_MASK | MOD1_MASK, 0).is_none());
        assert!(!binds.key_grabs().contains(&(CONTROL_MASK | MOD1_MASK, K)));
    }

    #[test]
    fn only_first_control_counts() {
        let mut binds = Binds::default();
        binds.bind("mod4+t+button1", "spawn");
        assert_eq!(binds.binds.len(), 1);
        assert_eq!(binds.binds[0].control, Control::Key(0x74));
        assert_eq!(binds.binds[0].state, MOD4_MASK);

        binds.bind("mod4+nosuchkey", "spawn");
        assert_eq!(binds.binds.len(), 1);
    }

    #[test]
    fn values_and_flags() {
        let mut binds = Binds::default();
        binds.bind("mod4+v", "vdesk,0x0a");
        assert_eq!(binds.binds[0].operation(), Operation::Vdesk(VdeskOp::Goto(10)));
        binds.bind("mod4+w", "move,bottom+right");
        assert_eq!(
            binds.binds[0].operation(),
            Operation::Move(Step::Edges(FuncFlags::BOTTOM | FuncFlags::RIGHT))
        );
        binds.bind("mod4+d", "dock");
        assert_eq!(binds.binds[0].operation(), Operation::Nothing);
    }

    #[test]
    fn redefined_modifiers_apply_to_builtins() {
        let mut config = Config::default();
        config.modifiers.mask1 = Some("mod4".into());
        let binds = Binds::from_config(&config);
        assert!(binds.find_key(K, MOD4_MASK, 0).is_some());
        assert!(binds.find_key(K, CONTROL_MASK | MOD1_MASK, 0).is_none());
    }

    #[test]
    fn c_integers() {
        assert_eq!(parse_c_integer("12"), 12);
        assert_eq!(parse_c_integer("0x1f"), 31);
        assert_eq!(parse_c_integer("010"), 8);
        assert_eq!(parse_c_integer("7abc"), 7);
    }
}
