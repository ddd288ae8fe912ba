//! X11 Backend
//!
//! [`DisplayServer`] over an x11rb `RustConnection`.  Owns everything that
//! only makes sense on a live server: atoms, the keyboard map, cursors, the
//! outline font and the inverting GCs, plus translation of raw protocol
//! events into [`DisplayEvent`]s.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tracing::{debug, info, warn};
use x11rb::connection::{Connection, RequestConnection};
use x11rb::errors::ReplyError;
use x11rb::protocol::randr::{self, ConnectionExt as _, NotifyMask};
use x11rb::protocol::shape::{self, ConnectionExt as _, SK, SO};
use x11rb::protocol::xproto::*;
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;
use x11rb::{COPY_DEPTH_FROM_PARENT, COPY_FROM_PARENT, CURRENT_TIME, NONE};

use crate::error::{Result, WmError};
use crate::shared::Rect;
use crate::spawn::display_for_screen;
use crate::wm::client_flags::WindowType;
use crate::wm::display::{
    is_autorepeat, retain_latest_enter, ButtonEvent, ClientMessage as Message, ConfigureRequest,
    CursorShape, DisplayEvent, DisplayServer, Focus, KeyEvent, Keysym, MotionEvent, Outline,
    Pointer, Property, PropertyName, ScreenInfo, WatchedProperty, WindowAttributes, LOCK_MASK,
};
use crate::wm::ewmh::{Atoms, Payload};
use crate::wm::hints::{MotifWmHints, SizeHints};

/// Glyphs in the standard cursor font.
const XC_FLEUR: u16 = 52;
const XC_PLUS: u16 = 90;

const XK_NUM_LOCK: Keysym = 0xff7f;

/// Gap between the outline label and the outline's bottom-right corner.
const LABEL_SPACE: i32 = 3;

/// PointerRoot as a focus target.
const POINTER_ROOT: Window = 1;

/// Keycode to keysym table from GetKeyboardMapping.
#[derive(Debug, Clone, Default)]
struct Keymap {
    min_keycode: u8,
    per_keycode: u8,
    keysyms: Vec<Keysym>,
}

impl Keymap {
    fn load(conn: &RustConnection) -> Result<Self> {
        let setup = conn.setup();
        let (min, max) = (setup.min_keycode, setup.max_keycode);
        let reply = conn.get_keyboard_mapping(min, max - min + 1)?.reply()?;
        Ok(Self {
            min_keycode: min,
            per_keycode: reply.keysyms_per_keycode,
            keysyms: reply.keysyms,
        })
    }

    /// Level 0 keysym for `keycode`.
    fn keysym(&self, keycode: Keycode) -> Keysym {
        if keycode < self.min_keycode || self.per_keycode == 0 {
            return 0;
        }
        let index = (keycode - self.min_keycode) as usize * self.per_keycode as usize;
        self.keysyms.get(index).copied().unwrap_or(0)
    }

    /// Every keycode that produces `keysym` at any level.
    fn keycodes(&self, keysym: Keysym) -> Vec<Keycode> {
        if self.per_keycode == 0 {
            return Vec::new();
        }
        self.keysyms
            .chunks(self.per_keycode as usize)
            .enumerate()
            .filter(|(_, syms)| syms.contains(&keysym))
            .filter_map(|(i, _)| u8::try_from(i + self.min_keycode as usize).ok())
            .collect()
    }
}

/// The modifier bit NumLock is mapped to, or 0.
fn numlock_mask(modifier_keycodes: &[Keycode], per_modifier: usize, numlock: &[Keycode]) -> u16 {
    if per_modifier == 0 {
        return 0;
    }
    modifier_keycodes
        .chunks(per_modifier)
        .position(|codes| codes.iter().any(|kc| *kc != 0 && numlock.contains(kc)))
        .map_or(0, |bit| 1 << bit)
}

/// Encode a string as a single PolyText8 item.
fn text_item(text: &str) -> Vec<u8> {
    let bytes: Vec<u8> = text.bytes().take(254).collect();
    let mut item = Vec::with_capacity(bytes.len() + 2);
    item.push(bytes.len() as u8);
    item.push(0);
    item.extend(bytes);
    item
}

/// Translate a protocol event into what the manager acts on.  Events the
/// manager has no use for give `None`.
fn translate(atoms: &Atoms, keymap: &Keymap, event: Event) -> Option<DisplayEvent> {
    let key = |e: &KeyPressEvent| KeyEvent {
        root: e.root,
        keycode: e.detail,
        keysym: keymap.keysym(e.detail),
        state: u16::from(e.state),
        time: e.time,
    };
    let button = |e: &ButtonPressEvent| ButtonEvent {
        root: e.root,
        window: e.event,
        button: e.detail,
        state: u16::from(e.state),
        root_x: e.root_x as i32,
        root_y: e.root_y as i32,
    };

    let translated = match event {
        Event::MapRequest(e) => DisplayEvent::MapRequest { window: e.window, parent: e.parent },
        Event::ConfigureRequest(e) => DisplayEvent::ConfigureRequest(ConfigureRequest {
            window: e.window,
            value_mask: e.value_mask,
            x: e.x as i32,
            y: e.y as i32,
            width: e.width as i32,
            height: e.height as i32,
            sibling: e.sibling,
            stack_mode: e.stack_mode,
        }),
        Event::UnmapNotify(e) => DisplayEvent::UnmapNotify { window: e.window },
        Event::ColormapNotify(e) => DisplayEvent::ColormapNotify {
            window: e.window,
            colormap: e.colormap,
            new: e.new,
        },
        Event::PropertyNotify(e) => {
            let property = if e.atom == Atom::from(AtomEnum::WM_NORMAL_HINTS) {
                WatchedProperty::NormalHints
            } else if e.atom == atoms.net_wm_window_type {
                WatchedProperty::WindowType
            } else {
                return None;
            };
            DisplayEvent::PropertyNotify { window: e.window, property }
        }
        Event::EnterNotify(e) => DisplayEvent::EnterNotify { window: e.event },
        Event::MappingNotify(e) if e.request != Mapping::POINTER => DisplayEvent::KeyboardMapping,
        Event::ShapeNotify(e) if e.shape_kind == SK::BOUNDING => {
            DisplayEvent::ShapeNotify { window: e.affected_window }
        }
        Event::RandrScreenChangeNotify(e) => DisplayEvent::ScreenChange {
            root: e.root,
            width: e.width as i32,
            height: e.height as i32,
        },
        Event::KeyPress(e) => DisplayEvent::KeyPress(key(&e)),
        Event::KeyRelease(e) => DisplayEvent::KeyRelease(key(&e)),
        Event::ButtonPress(e) => DisplayEvent::ButtonPress(button(&e)),
        Event::ButtonRelease(e) => DisplayEvent::ButtonRelease(button(&e)),
        Event::MotionNotify(e) => DisplayEvent::Motion(MotionEvent {
            root: e.root,
            root_x: e.root_x as i32,
            root_y: e.root_y as i32,
            state: u16::from(e.state),
        }),
        Event::ClientMessage(e) if e.format == 32 => {
            let message: Message = atoms.client_message(e.type_, e.data.as_data32())?;
            DisplayEvent::ClientMessage { window: e.window, message }
        }
        Event::Error(e) => DisplayEvent::Error { resource: e.bad_value, major: e.major_opcode },
        _ => return None,
    };
    Some(translated)
}

struct Cursors {
    moving: Cursor,
    resizing: Cursor,
}

impl Cursors {
    fn new(conn: &RustConnection) -> Result<Self> {
        let font = conn.generate_id()?;
        conn.open_font(font, b"cursor")?;
        let create_cursor = |glyph: u16| -> Result<Cursor> {
            let cursor = conn.generate_id()?;
            conn.create_glyph_cursor(
                cursor, font, font, glyph, glyph + 1, 0, 0, 0, 0xffff, 0xffff, 0xffff,
            )?;
            Ok(cursor)
        };
        let cursors = Self { moving: create_cursor(XC_FLEUR)?, resizing: create_cursor(XC_PLUS)? };
        conn.close_font(font)?;
        Ok(cursors)
    }
}

pub struct X11Display {
    conn: Arc<RustConnection>,
    atoms: Atoms,
    screens: Vec<ScreenInfo>,
    /// DISPLAY as given to us, for launched programs.
    display: String,
    keymap: Keymap,
    numlock: u16,
    cursors: Cursors,
    font: Font,
    /// Inverting GC per root, for outlines.
    gcs: HashMap<Window, Gcontext>,
    shape: bool,
    randr: Option<(u32, u32)>,
    pending: VecDeque<DisplayEvent>,
}

impl X11Display {
    /// Connect to `display` (or $DISPLAY) and set up per-connection state.
    pub fn connect(display: Option<&str>, font_name: &str) -> Result<Self> {
        let (conn, default_screen) = x11rb::connect(display)?;
        let conn = Arc::new(conn);
        let display = display
            .map(String::from)
            .or_else(|| std::env::var("DISPLAY").ok())
            .unwrap_or_else(|| ":0".into());
        let display_name = &display;
        info!("Connected to {} (default screen {})", display_name, default_screen);

        let atoms = Atoms::new(conn.as_ref())?;
        let screens: Vec<ScreenInfo> = conn
            .setup()
            .roots
            .iter()
            .map(|s| ScreenInfo {
                root: s.root,
                width: s.width_in_pixels as i32,
                height: s.height_in_pixels as i32,
                default_colormap: s.default_colormap,
            })
            .collect();

        let shape = conn.extension_information(shape::X11_EXTENSION_NAME)?.is_some();
        let randr = if conn.extension_information(randr::X11_EXTENSION_NAME)?.is_some() {
            let version = conn.randr_query_version(1, 5)?.reply()?;
            Some((version.major_version, version.minor_version))
        } else {
            None
        };
        debug!("Extensions: shape={} randr={:?}", shape, randr);

        let font = Self::open_font(&conn, font_name)?;
        let cursors = Cursors::new(&conn)?;
        let mut gcs = HashMap::new();
        for screen in &screens {
            let gc = conn.generate_id()?;
            conn.create_gc(
                gc,
                screen.root,
                &CreateGCAux::new()
                    .function(GX::INVERT)
                    .subwindow_mode(SubwindowMode::INCLUDE_INFERIORS)
                    .line_width(1)
                    .font(font),
            )?;
            gcs.insert(screen.root, gc);
        }

        let mut backend = Self {
            conn,
            atoms,
            screens,
            display,
            keymap: Keymap::default(),
            numlock: 0,
            cursors,
            font,
            gcs,
            shape,
            randr,
            pending: VecDeque::new(),
        };
        backend.refresh_keyboard_mapping()?;
        Ok(backend)
    }

    /// The connection, for readiness polling.
    pub fn connection(&self) -> Arc<RustConnection> {
        self.conn.clone()
    }

    fn open_font(conn: &RustConnection, name: &str) -> Result<Font> {
        let font = conn.generate_id()?;
        for candidate in [name, "fixed"] {
            match conn.open_font(font, candidate.as_bytes())?.check() {
                Ok(()) => {
                    debug!("Using font {}", candidate);
                    return Ok(font);
                }
                Err(ReplyError::X11Error(_)) => {
                    warn!("Failed to load font {}", candidate);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(WmError::NoFont(name.to_string()))
    }

    /// Format-32 property values, or `None` when unset.
    fn values32(&self, window: Window, property: Atom, kind: Atom, len: u32) -> Result<Option<Vec<u32>>> {
        let reply = self.conn.get_property(false, window, property, kind, 0, len)?.reply()?;
        Ok(reply
            .value32()
            .map(|values| values.collect::<Vec<u32>>())
            .filter(|values| !values.is_empty()))
    }

    fn text_width(&self, text: &str) -> Result<i32> {
        let chars: Vec<Char2b> = text.bytes().map(|b| Char2b { byte1: 0, byte2: b }).collect();
        let reply = self.conn.query_text_extents(self.font, &chars)?.reply()?;
        Ok(reply.overall_width)
    }

    fn modifier_variants(&self, modifiers: u16) -> Vec<u16> {
        let mut variants = vec![modifiers, modifiers | LOCK_MASK];
        if self.numlock != 0 {
            variants.push(modifiers | self.numlock);
            variants.push(modifiers | self.numlock | LOCK_MASK);
        }
        variants
    }

    /// Read one raw event off the connection.
    fn poll_raw(&mut self) -> Result<Option<DisplayEvent>> {
        while let Some(event) = self.conn.poll_for_event()? {
            if let Some(translated) = translate(&self.atoms, &self.keymap, event) {
                return Ok(Some(translated));
            }
        }
        Ok(None)
    }
}

impl DisplayServer for X11Display {
    fn screens(&self) -> Vec<ScreenInfo> {
        self.screens.clone()
    }

    fn next_event(&mut self) -> Result<Option<DisplayEvent>> {
        let event = match self.pending.pop_front() {
            Some(event) => event,
            None => match self.poll_raw()? {
                Some(event) => event,
                None => return Ok(None),
            },
        };
        if let DisplayEvent::KeyRelease(release) = &event {
            let next = match self.pending.pop_front() {
                Some(next) => Some(next),
                None => self.poll_raw()?,
            };
            if let Some(next) = next {
                let repeat = is_autorepeat(release, &next);
                self.pending.push_front(next);
                if repeat {
                    return self.next_event();
                }
            }
        }
        Ok(Some(event))
    }

    fn flush(&mut self) -> Result<()> {
        self.conn.flush()?;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.conn.sync()?;
        Ok(())
    }

    fn display_name(&self, screen: usize) -> String {
        display_for_screen(&self.display, screen, self.screens.len())
    }

    fn numlock_mask(&self) -> u16 {
        self.numlock
    }

    fn refresh_keyboard_mapping(&mut self) -> Result<()> {
        self.keymap = Keymap::load(&self.conn)?;
        let modmap = self.conn.get_modifier_mapping()?.reply()?;
        let per_modifier = modmap.keycodes_per_modifier() as usize;
        let numlock_codes = self.keymap.keycodes(XK_NUM_LOCK);
        self.numlock = numlock_mask(&modmap.keycodes, per_modifier, &numlock_codes);
        debug!("NumLock is modifier mask 0x{:x}", self.numlock);
        Ok(())
    }

    fn become_wm(&mut self, screen: usize, root: Window) -> Result<()> {
        let mask = EventMask::SUBSTRUCTURE_REDIRECT
            | EventMask::SUBSTRUCTURE_NOTIFY
            | EventMask::ENTER_WINDOW
            | EventMask::COLOR_MAP_CHANGE;
        match self
            .conn
            .change_window_attributes(root, &ChangeWindowAttributesAux::new().event_mask(mask))?
            .check()
        {
            Ok(()) => {}
            Err(ReplyError::X11Error(_)) => return Err(WmError::OtherWmRunning(screen)),
            Err(e) => return Err(e.into()),
        }
        if self.randr.is_some() {
            self.conn.randr_select_input(root, NotifyMask::SCREEN_CHANGE)?;
        }
        Ok(())
    }

    fn create_supporting_window(&mut self, root: Window) -> Result<Window> {
        let window = self.conn.generate_id()?;
        self.conn.create_window(
            COPY_DEPTH_FROM_PARENT,
            window,
            root,
            -200,
            -200,
            1,
            1,
            0,
            WindowClass::INPUT_ONLY,
            COPY_FROM_PARENT,
            &CreateWindowAux::new().override_redirect(1),
        )?;
        Ok(window)
    }

    fn alloc_color(&mut self, colormap: Colormap, name: &str) -> Result<u32> {
        match self.conn.alloc_named_color(colormap, name.as_bytes())?.reply() {
            Ok(reply) => Ok(reply.pixel),
            Err(ReplyError::X11Error(_)) => {
                warn!("Unknown colour {:?}, using pixel 0", name);
                Ok(0)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn monitors(&mut self, root: Window) -> Result<Vec<Rect>> {
        match self.randr {
            Some((major, minor)) if (major, minor) >= (1, 5) => {}
            _ => return Ok(Vec::new()),
        }
        let reply = self.conn.randr_get_monitors(root, true)?.reply()?;
        Ok(reply
            .monitors
            .iter()
            .map(|m| Rect::new(m.x as i32, m.y as i32, m.width as i32, m.height as i32))
            .collect())
    }

    fn query_tree(&mut self, root: Window) -> Result<Vec<Window>> {
        Ok(self.conn.query_tree(root)?.reply()?.children)
    }

    fn window_attributes(&mut self, window: Window) -> Result<WindowAttributes> {
        let attrs = self.conn.get_window_attributes(window)?;
        let geometry = self.conn.get_geometry(window)?;
        let (attrs, geometry) = (attrs.reply()?, geometry.reply()?);
        Ok(WindowAttributes {
            root: geometry.root,
            x: geometry.x as i32,
            y: geometry.y as i32,
            width: geometry.width as i32,
            height: geometry.height as i32,
            border_width: geometry.border_width as i32,
            override_redirect: attrs.override_redirect,
            viewable: attrs.map_state == MapState::VIEWABLE,
            colormap: attrs.colormap,
        })
    }

    fn size_hints(&mut self, window: Window) -> Result<Option<SizeHints>> {
        let values = self.values32(
            window,
            AtomEnum::WM_NORMAL_HINTS.into(),
            AtomEnum::WM_SIZE_HINTS.into(),
            18,
        )?;
        Ok(values.as_deref().and_then(SizeHints::from_values))
    }

    fn motif_hints(&mut self, window: Window) -> Result<Option<MotifWmHints>> {
        let values = self.values32(window, self.atoms.motif_wm_hints, AtomEnum::ANY.into(), 5)?;
        Ok(values.as_deref().and_then(MotifWmHints::from_values))
    }

    fn window_type(&mut self, window: Window) -> Result<WindowType> {
        let types = self.values32(window, self.atoms.net_wm_window_type, AtomEnum::ATOM.into(), 32)?;
        Ok(types.map_or(WindowType::empty(), |t| self.atoms.window_type(&t)))
    }

    fn cardinals(&mut self, window: Window, name: PropertyName) -> Result<Option<Vec<u32>>> {
        let property = self.atoms.property(name);
        self.values32(window, property, AtomEnum::CARDINAL.into(), 16)
    }

    fn wm_class(&mut self, window: Window) -> Result<Option<(String, String)>> {
        let reply = self
            .conn
            .get_property(false, window, AtomEnum::WM_CLASS, AtomEnum::STRING, 0, 256)?
            .reply()?;
        if reply.format != 8 || reply.value.is_empty() {
            return Ok(None);
        }
        let mut parts = reply.value.split(|b| *b == 0).map(|s| String::from_utf8_lossy(s).into_owned());
        let instance = parts.next().unwrap_or_default();
        let class = parts.next().unwrap_or_default();
        Ok(Some((instance, class)))
    }

    fn supports_delete(&mut self, window: Window) -> Result<bool> {
        let protocols = self.values32(window, self.atoms.wm_protocols, AtomEnum::ATOM.into(), 32)?;
        Ok(protocols.is_some_and(|p| p.contains(&self.atoms.wm_delete_window)))
    }

    fn query_pointer(&mut self, root: Window) -> Result<Pointer> {
        let reply = self.conn.query_pointer(root)?.reply()?;
        Ok(Pointer { root: reply.root, x: reply.root_x as i32, y: reply.root_y as i32 })
    }

    fn create_frame(&mut self, root: Window, rect: Rect, border: i32, border_pixel: u32) -> Result<Window> {
        let frame = self.conn.generate_id()?;
        let mask = EventMask::SUBSTRUCTURE_REDIRECT
            | EventMask::SUBSTRUCTURE_NOTIFY
            | EventMask::BUTTON_PRESS
            | EventMask::ENTER_WINDOW;
        self.conn.create_window(
            COPY_DEPTH_FROM_PARENT,
            frame,
            root,
            rect.x as i16,
            rect.y as i16,
            rect.width.max(1) as u16,
            rect.height.max(1) as u16,
            border.max(0) as u16,
            WindowClass::INPUT_OUTPUT,
            COPY_FROM_PARENT,
            &CreateWindowAux::new()
                .override_redirect(1)
                .border_pixel(border_pixel)
                .event_mask(mask),
        )?;
        Ok(frame)
    }

    fn reparent(&mut self, window: Window, parent: Window, x: i32, y: i32) -> Result<()> {
        self.conn.reparent_window(window, parent, x as i16, y as i16)?;
        Ok(())
    }

    fn change_save_set(&mut self, window: Window, insert: bool) -> Result<()> {
        let mode = if insert { SetMode::INSERT } else { SetMode::DELETE };
        self.conn.change_save_set(mode, window)?;
        Ok(())
    }

    fn map(&mut self, window: Window) -> Result<()> {
        self.conn.map_window(window)?;
        Ok(())
    }

    fn unmap(&mut self, window: Window) -> Result<()> {
        self.conn.unmap_window(window)?;
        Ok(())
    }

    fn destroy(&mut self, window: Window) -> Result<()> {
        self.conn.destroy_window(window)?;
        Ok(())
    }

    fn configure(&mut self, window: Window, changes: &ConfigureWindowAux) -> Result<()> {
        self.conn.configure_window(window, changes)?;
        Ok(())
    }

    fn set_border_color(&mut self, window: Window, pixel: u32) -> Result<()> {
        self.conn.change_window_attributes(
            window,
            &ChangeWindowAttributesAux::new().border_pixel(pixel),
        )?;
        Ok(())
    }

    fn send_configure_notify(&mut self, window: Window, rect: Rect) -> Result<()> {
        let event = ConfigureNotifyEvent {
            response_type: CONFIGURE_NOTIFY_EVENT,
            sequence: 0,
            event: window,
            window,
            above_sibling: NONE,
            x: rect.x as i16,
            y: rect.y as i16,
            width: rect.width as u16,
            height: rect.height as u16,
            border_width: 0,
            override_redirect: false,
        };
        self.conn.send_event(false, window, EventMask::STRUCTURE_NOTIFY, event)?;
        Ok(())
    }

    fn set_input_focus(&mut self, focus: Focus) -> Result<()> {
        let target = match focus {
            Focus::PointerRoot => POINTER_ROOT,
            Focus::Window(window) => window,
        };
        self.conn.set_input_focus(InputFocus::POINTER_ROOT, target, CURRENT_TIME)?;
        Ok(())
    }

    fn install_colormap(&mut self, colormap: Colormap) -> Result<()> {
        self.conn.install_colormap(colormap)?;
        Ok(())
    }

    fn set_property(&mut self, window: Window, property: Property) -> Result<()> {
        let encoded = self.atoms.encode(&property);
        match encoded.payload {
            Payload::Long(values) => {
                self.conn.change_property32(
                    PropMode::REPLACE,
                    window,
                    encoded.name,
                    encoded.kind,
                    &values,
                )?;
            }
            Payload::Text(text) => {
                self.conn.change_property8(
                    PropMode::REPLACE,
                    window,
                    encoded.name,
                    encoded.kind,
                    text.as_bytes(),
                )?;
            }
        }
        Ok(())
    }

    fn delete_property(&mut self, window: Window, name: PropertyName) -> Result<()> {
        self.conn.delete_property(window, self.atoms.property(name))?;
        Ok(())
    }

    fn select_client_input(&mut self, window: Window) -> Result<()> {
        let mask = EventMask::COLOR_MAP_CHANGE | EventMask::ENTER_WINDOW | EventMask::PROPERTY_CHANGE;
        self.conn
            .change_window_attributes(window, &ChangeWindowAttributesAux::new().event_mask(mask))?;
        if self.shape {
            self.conn.shape_select_input(window, true)?;
        }
        Ok(())
    }

    fn mirror_shape(&mut self, window: Window, frame: Window) -> Result<()> {
        if !self.shape {
            return Ok(());
        }
        let extents = self.conn.shape_query_extents(window)?.reply()?;
        if extents.bounding_shaped {
            self.conn
                .shape_combine(SO::SET, SK::BOUNDING, SK::BOUNDING, frame, 0, 0, window)?;
        }
        Ok(())
    }

    fn send_delete(&mut self, window: Window) -> Result<()> {
        let event = ClientMessageEvent::new(
            32,
            window,
            self.atoms.wm_protocols,
            [self.atoms.wm_delete_window, CURRENT_TIME, 0, 0, 0],
        );
        self.conn.send_event(false, window, EventMask::NO_EVENT, event)?;
        Ok(())
    }

    fn kill_client(&mut self, window: Window) -> Result<()> {
        self.conn.kill_client(window)?;
        Ok(())
    }

    fn grab_keys(&mut self, root: Window, keys: &[(u16, Keysym)]) -> Result<()> {
        self.conn.ungrab_key(Grab::ANY, root, ModMask::ANY)?;
        for &(modifiers, keysym) in keys {
            let keycodes = self.keymap.keycodes(keysym);
            if keycodes.is_empty() {
                debug!("No keycode for keysym 0x{:x}", keysym);
            }
            for keycode in keycodes {
                for mods in self.modifier_variants(modifiers) {
                    self.conn.grab_key(
                        true,
                        root,
                        ModMask::from(mods),
                        keycode,
                        GrabMode::ASYNC,
                        GrabMode::ASYNC,
                    )?;
                }
            }
        }
        Ok(())
    }

    fn grab_buttons(&mut self, window: Window, buttons: &[(u16, u8)]) -> Result<()> {
        for &(modifiers, button) in buttons {
            for mods in self.modifier_variants(modifiers) {
                self.conn.grab_button(
                    false,
                    window,
                    EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE,
                    GrabMode::ASYNC,
                    GrabMode::SYNC,
                    NONE,
                    NONE,
                    ButtonIndex::from(button),
                    ModMask::from(mods),
                )?;
            }
        }
        Ok(())
    }

    fn grab_pointer(&mut self, root: Window, cursor: CursorShape) -> Result<bool> {
        let cursor = match cursor {
            CursorShape::Move => self.cursors.moving,
            CursorShape::Resize => self.cursors.resizing,
            CursorShape::Unchanged => NONE,
        };
        let reply = self
            .conn
            .grab_pointer(
                false,
                root,
                EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE | EventMask::POINTER_MOTION,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
                NONE,
                cursor,
                CURRENT_TIME,
            )?
            .reply()?;
        Ok(reply.status == GrabStatus::SUCCESS)
    }

    fn ungrab_pointer(&mut self) -> Result<()> {
        self.conn.ungrab_pointer(CURRENT_TIME)?;
        Ok(())
    }

    fn grab_keyboard(&mut self, root: Window) -> Result<bool> {
        let reply = self
            .conn
            .grab_keyboard(false, root, CURRENT_TIME, GrabMode::ASYNC, GrabMode::ASYNC)?
            .reply()?;
        Ok(reply.status == GrabStatus::SUCCESS)
    }

    fn ungrab_keyboard(&mut self) -> Result<()> {
        self.conn.ungrab_keyboard(CURRENT_TIME)?;
        Ok(())
    }

    fn grab_server(&mut self) -> Result<()> {
        self.conn.grab_server()?;
        Ok(())
    }

    fn ungrab_server(&mut self) -> Result<()> {
        self.conn.ungrab_server()?;
        Ok(())
    }

    fn warp_pointer(&mut self, window: Window, x: i32, y: i32) -> Result<()> {
        self.conn.warp_pointer(NONE, window, 0, 0, 0, 0, x as i16, y as i16)?;
        Ok(())
    }

    fn draw_outline(&mut self, root: Window, outline: &Outline) -> Result<()> {
        let Some(&gc) = self.gcs.get(&root) else {
            return Ok(());
        };
        let (r, b) = (outline.rect, outline.border);
        let frame = Rectangle {
            x: (r.x - b) as i16,
            y: (r.y - b) as i16,
            width: (r.width + 2 * b - 1).max(0) as u16,
            height: (r.height + 2 * b - 1).max(0) as u16,
        };
        self.conn.poly_rectangle(root, gc, &[frame])?;
        if let Some(label) = &outline.label {
            let x = r.x + r.width - self.text_width(label)? - LABEL_SPACE;
            let y = r.y + r.height - LABEL_SPACE;
            self.conn.poly_text8(root, gc, x as i16, y as i16, &text_item(label))?;
        }
        Ok(())
    }

    fn discard_enter_events(&mut self, frame: Window) -> Result<()> {
        self.conn.sync()?;
        while let Some(event) = self.poll_raw()? {
            self.pending.push_back(event);
        }
        retain_latest_enter(&mut self.pending, frame);
        Ok(())
    }
}
