//! Configuration system for evilwm
//!
//! Loads configuration from TOML file at `~/.config/evilwm/config.toml`
//! Auto-generates default config file on first run if missing.
//! Command line flags override values from the file.

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::wm::client::{VDESK_FIXED, VDESK_NONE};

/// Command line options.  Anything given here wins over the config file.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about = "Minimalist window manager for X11", long_about = None)]
pub struct Args {
    /// X display to manage
    #[arg(long)]
    pub display: Option<String>,

    /// Configuration file (default: ~/.config/evilwm/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Font for the geometry label
    #[arg(long = "fn")]
    pub font: Option<String>,

    /// Border colour of the focused client
    #[arg(long)]
    pub fg: Option<String>,

    /// Border colour of unfocused clients
    #[arg(long)]
    pub bg: Option<String>,

    /// Border colour of the focused client when fixed
    #[arg(long)]
    pub fc: Option<String>,

    /// Border width
    #[arg(long)]
    pub bw: Option<u32>,

    /// Terminal command, split on whitespace
    #[arg(long)]
    pub term: Option<String>,

    /// Snap distance in pixels (0 disables snapping)
    #[arg(long)]
    pub snap: Option<u32>,

    /// Number of virtual desktops
    #[arg(long)]
    pub numvdesks: Option<u32>,

    /// Ignore monitor layout and treat each screen as one monitor
    #[arg(long)]
    pub wholescreen: bool,

    /// Draw an outline instead of moving windows while dragging
    #[arg(long)]
    pub nosoliddrag: bool,

    /// Modifiers for keyboard binds
    #[arg(long)]
    pub mask1: Option<String>,

    /// Modifiers for mouse binds
    #[arg(long)]
    pub mask2: Option<String>,

    /// Modifiers selecting alternate behaviour
    #[arg(long)]
    pub altmask: Option<String>,

    /// Bind a control to a function, as CONTROL=FUNCTION (empty FUNCTION unbinds)
    #[arg(long = "bind", value_name = "CONTROL=FUNCTION")]
    pub binds: Vec<String>,
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    pub appearance: AppearanceConfig,
    pub behavior: BehaviorConfig,
    pub modifiers: ModifierConfig,
    #[serde(rename = "bind", skip_serializing_if = "Vec::is_empty")]
    pub binds: Vec<BindConfig>,
    #[serde(rename = "app", skip_serializing_if = "Vec::is_empty")]
    pub apps: Vec<AppConfig>,
}

impl Config {
    /// Load configuration from file, or use defaults if file doesn't exist,
    /// then apply command line overrides.
    pub fn load(args: &Args) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load_from(path)?,
            None => Self::load_default()?,
        };
        config.apply_args(args)?;
        config.validate()?;
        Ok(config)
    }

    fn load_default() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            info!("Config file not found at {:?}, using defaults", config_path);
            // Auto-generate default config file
            if let Err(e) = Self::save_default(&config_path) {
                warn!("Failed to create default config file: {}", e);
            }
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        info!("Configuration loaded from {:?}", path);
        debug!("Config: {:?}", config);

        Ok(config)
    }

    /// Get the path to the config file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("evilwm");

        Ok(config_dir.join("config.toml"))
    }

    /// Save default configuration to file
    fn save_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(&Self::default())
            .context("Failed to serialize default config")?;

        fs::write(path, toml_string)
            .context("Failed to write default config file")?;

        info!("Created default config file at {:?}", path);
        Ok(())
    }

    pub fn apply_args(&mut self, args: &Args) -> Result<()> {
        if let Some(display) = &args.display {
            self.display = Some(display.clone());
        }
        let a = &mut self.appearance;
        if let Some(font) = &args.font {
            a.font = font.clone();
        }
        if let Some(fg) = &args.fg {
            a.fg = fg.clone();
        }
        if let Some(bg) = &args.bg {
            a.bg = bg.clone();
        }
        if let Some(fc) = &args.fc {
            a.fc = fc.clone();
        }
        if let Some(bw) = args.bw {
            a.border_width = bw;
        }
        let b = &mut self.behavior;
        if let Some(term) = &args.term {
            b.term = term.split_whitespace().map(str::to_owned).collect();
        }
        if let Some(snap) = args.snap {
            b.snap = snap;
        }
        if let Some(vdesks) = args.numvdesks {
            b.vdesks = vdesks;
        }
        if args.wholescreen {
            b.wholescreen = true;
        }
        if args.nosoliddrag {
            b.solid_drag = false;
        }
        let m = &mut self.modifiers;
        if args.mask1.is_some() {
            m.mask1 = args.mask1.clone();
        }
        if args.mask2.is_some() {
            m.mask2 = args.mask2.clone();
        }
        if args.altmask.is_some() {
            m.altmask = args.altmask.clone();
        }
        for bind in &args.binds {
            let Some((control, function)) = bind.split_once('=') else {
                bail!("--bind expects CONTROL=FUNCTION, got {:?}", bind);
            };
            self.binds.push(BindConfig {
                control: control.to_owned(),
                function: function.to_owned(),
            });
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.behavior.vdesks == 0 {
            bail!("vdesks must be at least 1");
        }
        if self.behavior.term.is_empty() {
            bail!("terminal command must not be empty");
        }
        for app in &self.apps {
            if let Some(geometry) = &app.geometry {
                parse_geometry(geometry)
                    .with_context(|| format!("bad geometry for app {:?}/{:?}", app.name, app.class))?;
            }
        }
        Ok(())
    }

    /// Application rules in the form the window manager applies them.
    /// Rules with a vdesk outside the configured range keep the client's own.
    pub fn app_rules(&self) -> Vec<AppRule> {
        self.apps
            .iter()
            .map(|app| {
                let vdesk = if app.fixed {
                    VDESK_FIXED
                } else {
                    match app.vdesk {
                        Some(v) if v < self.behavior.vdesks => v,
                        _ => VDESK_NONE,
                    }
                };
                AppRule {
                    name: app.name.clone(),
                    class: app.class.clone(),
                    geometry: app
                        .geometry
                        .as_deref()
                        .and_then(|g| parse_geometry(g).ok())
                        .unwrap_or_default(),
                    dock: app.dock,
                    vdesk,
                }
            })
            .collect()
    }
}

/// Border and font configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppearanceConfig {
    /// Font used to label the outline during move/resize/info
    pub font: String,
    /// Border colour of the focused client
    pub fg: String,
    /// Border colour of unfocused clients
    pub bg: String,
    /// Border colour of the focused client when fixed
    pub fc: String,
    pub border_width: u32,
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        Self {
            font: "variable".to_string(),
            fg: "goldenrod".to_string(),
            bg: "grey50".to_string(),
            fc: "blue".to_string(),
            border_width: 1,
        }
    }
}

/// Window behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Snap distance in pixels, 0 disables snapping
    pub snap: u32,
    /// Number of virtual desktops
    pub vdesks: u32,
    /// Ignore RandR monitors
    pub wholescreen: bool,
    /// Move windows while dragging rather than drawing an outline
    pub solid_drag: bool,
    /// Command (and arguments) run by the spawn function
    pub term: Vec<String>,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            snap: 0,
            vdesks: 8,
            wholescreen: false,
            solid_drag: true,
            term: vec!["xterm".to_string()],
        }
    }
}

/// Redefinitions of the bind modifier names `mask1`, `mask2` and `altmask`,
/// e.g. `mask1 = "mod4"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ModifierConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altmask: Option<String>,
}

/// One `[[bind]]` entry, applied on top of the built-in binds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BindConfig {
    /// e.g. `"mask1+t"` or `"mask2+button1"`
    pub control: String,
    /// e.g. `"move,relative+up"`; empty removes the bind
    #[serde(default)]
    pub function: String,
}

/// One `[[app]]` entry matched against WM_CLASS.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub name: Option<String>,
    pub class: Option<String>,
    /// X geometry string, size in resize increments
    pub geometry: Option<String>,
    pub dock: bool,
    pub vdesk: Option<u32>,
    pub fixed: bool,
}

/// A parsed X geometry specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AppGeometry {
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub x: Option<i32>,
    pub y: Option<i32>,
    /// Offset measured from the right edge
    pub x_negative: bool,
    /// Offset measured from the bottom edge
    pub y_negative: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppRule {
    pub name: Option<String>,
    pub class: Option<String>,
    pub geometry: AppGeometry,
    pub dock: bool,
    /// `VDESK_NONE` leaves the client's vdesk alone
    pub vdesk: u32,
}

impl AppRule {
    /// Unset fields match anything.
    pub fn matches(&self, instance: &str, class: &str) -> bool {
        self.name.as_deref().is_none_or(|n| n == instance)
            && self.class.as_deref().is_none_or(|c| c == class)
    }
}

/// Parse `[=][<width>{xX}<height>][{+-}<xoffset>{+-}<yoffset>]`.
pub fn parse_geometry(spec: &str) -> Result<AppGeometry> {
    let mut geometry = AppGeometry::default();
    let s = spec.strip_prefix('=').unwrap_or(spec);
    let bytes = s.as_bytes();
    let mut pos = 0;

    let read_number = |pos: &mut usize| -> Option<i32> {
        let start = *pos;
        while *pos < bytes.len() && bytes[*pos].is_ascii_digit() {
            *pos += 1;
        }
        s[start..*pos].parse().ok()
    };

    if pos < bytes.len() && bytes[pos].is_ascii_digit() {
        geometry.width = read_number(&mut pos);
    }
    if pos < bytes.len() && (bytes[pos] == b'x' || bytes[pos] == b'X') {
        pos += 1;
        geometry.height = read_number(&mut pos);
        if geometry.height.is_none() {
            bail!("missing height in geometry {:?}", spec);
        }
    }

    for axis in 0..2 {
        if pos >= bytes.len() {
            break;
        }
        let negative = match bytes[pos] {
            b'+' => false,
            b'-' => true,
            _ => bail!("unexpected {:?} in geometry {:?}", &s[pos..], spec),
        };
        pos += 1;
        let Some(value) = read_number(&mut pos) else {
            bail!("missing offset in geometry {:?}", spec);
        };
        let value = if negative { -value } else { value };
        if axis == 0 {
            geometry.x = Some(value);
            geometry.x_negative = negative;
        } else {
            geometry.y = Some(value);
            geometry.y_negative = negative;
        }
    }
    if pos != bytes.len() {
        bail!("trailing characters in geometry {:?}", spec);
    }
    Ok(geometry)
}
