//! Recording in-memory display server for manager tests.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use x11rb::protocol::xproto::{Colormap, ConfigureWindowAux, StackMode, Window};

use crate::config::Config;
use crate::error::{Result, WmError};
use crate::shared::Rect;
use crate::wm::client_flags::WindowType;
use crate::wm::display::{
    retain_latest_enter, CursorShape, DisplayEvent, DisplayServer, Focus, Keysym, Outline,
    Pointer, Property, PropertyName, ScreenInfo, WindowAttributes, MOD2_MASK,
};
use crate::wm::hints::{MotifWmHints, SizeHints};
use crate::wm::WindowManager;

pub const ROOT: Window = 1;
pub const COLORMAP: Colormap = 0x20;

/// The fields of a ConfigureWindow request that were set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Changes {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub border_width: Option<u32>,
    pub sibling: Option<Window>,
    pub stack_mode: Option<StackMode>,
}

impl From<&ConfigureWindowAux> for Changes {
    fn from(aux: &ConfigureWindowAux) -> Self {
        Self {
            x: aux.x,
            y: aux.y,
            width: aux.width,
            height: aux.height,
            border_width: aux.border_width,
            sibling: aux.sibling,
            stack_mode: aux.stack_mode,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateFrame(Window),
    Reparent(Window, Window),
    Map(Window),
    Unmap(Window),
    Destroy(Window),
    Configure(Window, Changes),
    BorderColor(Window, u32),
    SendConfigure(Window, Rect),
    Focus(Focus),
    InstallColormap(Colormap),
    SendDelete(Window),
    KillClient(Window),
    GrabPointer,
    UngrabPointer,
    GrabKeyboard,
    UngrabKeyboard,
    GrabServer,
    UngrabServer,
    Warp(Window, i32, i32),
    DrawOutline(Window, Outline),
}

pub struct MockDisplayServer {
    pub screens: Vec<ScreenInfo>,
    pub events: VecDeque<DisplayEvent>,
    pub calls: Vec<Call>,
    pub windows: BTreeMap<Window, WindowAttributes>,
    pub parents: HashMap<Window, Window>,
    pub properties: HashMap<(Window, PropertyName), Property>,
    pub size_hints: HashMap<Window, SizeHints>,
    pub window_types: HashMap<Window, WindowType>,
    pub classes: HashMap<Window, (String, String)>,
    pub delete_protocol: HashSet<Window>,
    pub key_grabs: HashMap<Window, Vec<(u16, Keysym)>>,
    pub colors: Vec<String>,
    pub monitors: Vec<Rect>,
    pub pointer: Pointer,
    pub focus: Option<Focus>,
    pub grabs_succeed: bool,
    pub other_wm: bool,
    pub server_grabbed: bool,
    next_id: Window,
}

impl MockDisplayServer {
    pub fn new() -> Self {
        Self {
            screens: vec![ScreenInfo {
                root: ROOT,
                width: 1024,
                height: 768,
                default_colormap: COLORMAP,
            }],
            events: VecDeque::new(),
            calls: Vec::new(),
            windows: BTreeMap::new(),
            parents: HashMap::new(),
            properties: HashMap::new(),
            size_hints: HashMap::new(),
            window_types: HashMap::new(),
            classes: HashMap::new(),
            delete_protocol: HashSet::new(),
            key_grabs: HashMap::new(),
            colors: Vec::new(),
            monitors: Vec::new(),
            pointer: Pointer { root: ROOT, x: 512, y: 384 },
            focus: None,
            grabs_succeed: true,
            other_wm: false,
            server_grabbed: false,
            next_id: 0x1000,
        }
    }

    /// A viewable top-level window at the given position.
    pub fn add_window(&mut self, window: Window, x: i32, y: i32, width: i32, height: i32) -> Window {
        self.windows.insert(
            window,
            WindowAttributes {
                root: ROOT,
                x,
                y,
                width,
                height,
                border_width: 0,
                override_redirect: false,
                viewable: true,
                colormap: COLORMAP,
            },
        );
        self.parents.insert(window, ROOT);
        window
    }

    pub fn property(&self, window: Window, name: PropertyName) -> Option<Property> {
        self.properties.get(&(window, name)).cloned()
    }

    pub fn is_mapped(&self, window: Window) -> bool {
        self.windows.get(&window).is_some_and(|a| a.viewable)
    }

    pub fn pixel(&self, name: &str) -> Option<u32> {
        self.colors.iter().position(|c| c == name).map(|i| i as u32 + 1)
    }

    fn alloc_id(&mut self) -> Window {
        self.next_id += 1;
        self.next_id
    }

    fn attrs_mut(&mut self, window: Window) -> Result<&mut WindowAttributes> {
        self.windows
            .get_mut(&window)
            .ok_or_else(|| WmError::Protocol(format!("BadWindow 0x{window:x}")))
    }
}

impl DisplayServer for MockDisplayServer {
    fn screens(&self) -> Vec<ScreenInfo> {
        self.screens.clone()
    }

    fn next_event(&mut self) -> Result<Option<DisplayEvent>> {
        Ok(self.events.pop_front())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }

    fn display_name(&self, screen: usize) -> String {
        format!(":0.{screen}")
    }

    fn numlock_mask(&self) -> u16 {
        MOD2_MASK
    }

    fn refresh_keyboard_mapping(&mut self) -> Result<()> {
        Ok(())
    }

    fn become_wm(&mut self, screen: usize, _root: Window) -> Result<()> {
        if self.other_wm {
            return Err(WmError::OtherWmRunning(screen));
        }
        Ok(())
    }

    fn create_supporting_window(&mut self, root: Window) -> Result<Window> {
        let id = self.alloc_id();
        self.windows.insert(
            id,
            WindowAttributes { root, width: 1, height: 1, override_redirect: true, ..Default::default() },
        );
        self.parents.insert(id, root);
        Ok(id)
    }

    fn alloc_color(&mut self, _colormap: Colormap, name: &str) -> Result<u32> {
        if let Some(pixel) = self.pixel(name) {
            return Ok(pixel);
        }
        self.colors.push(name.to_string());
        Ok(self.colors.len() as u32)
    }

    fn monitors(&mut self, _root: Window) -> Result<Vec<Rect>> {
        Ok(self.monitors.clone())
    }

    fn query_tree(&mut self, root: Window) -> Result<Vec<Window>> {
        Ok(self
            .windows
            .keys()
            .copied()
            .filter(|w| self.parents.get(w) == Some(&root))
            .collect())
    }

    fn window_attributes(&mut self, window: Window) -> Result<WindowAttributes> {
        Ok(*self.attrs_mut(window)?)
    }

    fn size_hints(&mut self, window: Window) -> Result<Option<SizeHints>> {
        self.attrs_mut(window)?;
        Ok(self.size_hints.get(&window).cloned())
    }

    fn motif_hints(&mut self, _window: Window) -> Result<Option<MotifWmHints>> {
        Ok(None)
    }

    fn window_type(&mut self, window: Window) -> Result<WindowType> {
        self.attrs_mut(window)?;
        Ok(self.window_types.get(&window).copied().unwrap_or_default())
    }

    fn cardinals(&mut self, window: Window, name: PropertyName) -> Result<Option<Vec<u32>>> {
        Ok(match self.property(window, name) {
            Some(Property::NetWmDesktop(v)) => Some(vec![v]),
            Some(Property::Unmaximised(_, pos, size)) => Some(vec![pos as u32, size as u32]),
            _ => None,
        })
    }

    fn wm_class(&mut self, window: Window) -> Result<Option<(String, String)>> {
        Ok(self.classes.get(&window).cloned())
    }

    fn supports_delete(&mut self, window: Window) -> Result<bool> {
        Ok(self.delete_protocol.contains(&window))
    }

    fn query_pointer(&mut self, _root: Window) -> Result<Pointer> {
        Ok(self.pointer)
    }

    fn create_frame(&mut self, root: Window, rect: Rect, border: i32, border_pixel: u32) -> Result<Window> {
        let id = self.alloc_id();
        self.windows.insert(
            id,
            WindowAttributes {
                root,
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
                border_width: border,
                override_redirect: true,
                viewable: false,
                colormap: COLORMAP,
            },
        );
        self.parents.insert(id, root);
        self.calls.push(Call::CreateFrame(id));
        self.calls.push(Call::BorderColor(id, border_pixel));
        Ok(id)
    }

    fn reparent(&mut self, window: Window, parent: Window, x: i32, y: i32) -> Result<()> {
        let attrs = self.attrs_mut(window)?;
        attrs.x = x;
        attrs.y = y;
        self.parents.insert(window, parent);
        self.calls.push(Call::Reparent(window, parent));
        Ok(())
    }

    fn change_save_set(&mut self, window: Window, _insert: bool) -> Result<()> {
        self.attrs_mut(window).map(|_| ())
    }

    fn map(&mut self, window: Window) -> Result<()> {
        self.attrs_mut(window)?.viewable = true;
        self.calls.push(Call::Map(window));
        Ok(())
    }

    fn unmap(&mut self, window: Window) -> Result<()> {
        self.attrs_mut(window)?.viewable = false;
        self.calls.push(Call::Unmap(window));
        Ok(())
    }

    fn destroy(&mut self, window: Window) -> Result<()> {
        self.windows.remove(&window);
        self.parents.remove(&window);
        self.calls.push(Call::Destroy(window));
        Ok(())
    }

    fn configure(&mut self, window: Window, changes: &ConfigureWindowAux) -> Result<()> {
        let attrs = self.attrs_mut(window)?;
        if let Some(x) = changes.x {
            attrs.x = x;
        }
        if let Some(y) = changes.y {
            attrs.y = y;
        }
        if let Some(w) = changes.width {
            attrs.width = w as i32;
        }
        if let Some(h) = changes.height {
            attrs.height = h as i32;
        }
        if let Some(b) = changes.border_width {
            attrs.border_width = b as i32;
        }
        self.calls.push(Call::Configure(window, changes.into()));
        Ok(())
    }

    fn set_border_color(&mut self, window: Window, pixel: u32) -> Result<()> {
        self.attrs_mut(window)?;
        self.calls.push(Call::BorderColor(window, pixel));
        Ok(())
    }

    fn send_configure_notify(&mut self, window: Window, rect: Rect) -> Result<()> {
        self.calls.push(Call::SendConfigure(window, rect));
        Ok(())
    }

    fn set_input_focus(&mut self, focus: Focus) -> Result<()> {
        self.focus = Some(focus);
        self.calls.push(Call::Focus(focus));
        Ok(())
    }

    fn install_colormap(&mut self, colormap: Colormap) -> Result<()> {
        self.calls.push(Call::InstallColormap(colormap));
        Ok(())
    }

    fn set_property(&mut self, window: Window, property: Property) -> Result<()> {
        self.properties.insert((window, property.name()), property);
        Ok(())
    }

    fn delete_property(&mut self, window: Window, name: PropertyName) -> Result<()> {
        self.properties.remove(&(window, name));
        Ok(())
    }

    fn select_client_input(&mut self, window: Window) -> Result<()> {
        self.attrs_mut(window).map(|_| ())
    }

    fn mirror_shape(&mut self, _window: Window, _frame: Window) -> Result<()> {
        Ok(())
    }

    fn send_delete(&mut self, window: Window) -> Result<()> {
        self.calls.push(Call::SendDelete(window));
        Ok(())
    }

    fn kill_client(&mut self, window: Window) -> Result<()> {
        self.calls.push(Call::KillClient(window));
        Ok(())
    }

    fn grab_keys(&mut self, root: Window, keys: &[(u16, Keysym)]) -> Result<()> {
        self.key_grabs.insert(root, keys.to_vec());
        Ok(())
    }

    fn grab_buttons(&mut self, _window: Window, _buttons: &[(u16, u8)]) -> Result<()> {
        Ok(())
    }

    fn grab_pointer(&mut self, _root: Window, _cursor: CursorShape) -> Result<bool> {
        self.calls.push(Call::GrabPointer);
        Ok(self.grabs_succeed)
    }

    fn ungrab_pointer(&mut self) -> Result<()> {
        self.calls.push(Call::UngrabPointer);
        Ok(())
    }

    fn grab_keyboard(&mut self, _root: Window) -> Result<bool> {
        self.calls.push(Call::GrabKeyboard);
        Ok(self.grabs_succeed)
    }

    fn ungrab_keyboard(&mut self) -> Result<()> {
        self.calls.push(Call::UngrabKeyboard);
        Ok(())
    }

    fn grab_server(&mut self) -> Result<()> {
        self.server_grabbed = true;
        self.calls.push(Call::GrabServer);
        Ok(())
    }

    fn ungrab_server(&mut self) -> Result<()> {
        self.server_grabbed = false;
        self.calls.push(Call::UngrabServer);
        Ok(())
    }

    fn warp_pointer(&mut self, window: Window, x: i32, y: i32) -> Result<()> {
        self.calls.push(Call::Warp(window, x, y));
        Ok(())
    }

    fn draw_outline(&mut self, root: Window, outline: &Outline) -> Result<()> {
        self.calls.push(Call::DrawOutline(root, outline.clone()));
        Ok(())
    }

    fn discard_enter_events(&mut self, frame: Window) -> Result<()> {
        retain_latest_enter(&mut self.events, frame);
        Ok(())
    }
}

/// A started manager on one 1024x768 screen with default configuration.
pub(crate) fn test_manager() -> WindowManager<MockDisplayServer> {
    test_manager_with(Config::default())
}

pub(crate) fn test_manager_with(config: Config) -> WindowManager<MockDisplayServer> {
    let mut wm = WindowManager::new(MockDisplayServer::new(), config);
    wm.start().expect("manager starts on the mock display");
    wm
}
