//! Keysym names accepted in bind controls.

use x11_dl::keysym::*;

use crate::wm::display::Keysym;

/// Look up a keysym by its X name (`"Return"`, `"KP_Insert"`, `"a"`).
/// Any other single Latin-1 character maps to its own code point.
pub fn into_keysym(name: &str) -> Option<Keysym> {
    let sym = match name {
        "BackSpace" => XK_BackSpace,
        "Tab" => XK_Tab,
        "Return" => XK_Return,
        "Escape" => XK_Escape,
        "Delete" => XK_Delete,
        "Insert" => XK_Insert,
        "Home" => XK_Home,
        "End" => XK_End,
        "Prior" | "Page_Up" => XK_Prior,
        "Next" | "Page_Down" => XK_Next,
        "Left" => XK_Left,
        "Right" => XK_Right,
        "Up" => XK_Up,
        "Down" => XK_Down,
        "Print" => XK_Print,
        "Pause" => XK_Pause,
        "Menu" => XK_Menu,
        "space" => XK_space,
        "exclam" => XK_exclam,
        "quotedbl" => XK_quotedbl,
        "numbersign" => XK_numbersign,
        "dollar" => XK_dollar,
        "percent" => XK_percent,
        "ampersand" => XK_ampersand,
        "apostrophe" => XK_apostrophe,
        "parenleft" => XK_parenleft,
        "parenright" => XK_parenright,
        "asterisk" => XK_asterisk,
        "plus" => XK_plus,
        "comma" => XK_comma,
        "minus" => XK_minus,
        "period" => XK_period,
        "slash" => XK_slash,
        "colon" => XK_colon,
        "semicolon" => XK_semicolon,
        "less" => XK_less,
        "equal" => XK_equal,
        "greater" => XK_greater,
        "question" => XK_question,
        "at" => XK_at,
        "bracketleft" => XK_bracketleft,
        "backslash" => XK_backslash,
        "bracketright" => XK_bracketright,
        "asciicircum" => XK_asciicircum,
        "underscore" => XK_underscore,
        "grave" => XK_grave,
        "braceleft" => XK_braceleft,
        "bar" => XK_bar,
        "braceright" => XK_braceright,
        "asciitilde" => XK_asciitilde,
        "F1" => XK_F1,
        "F2" => XK_F2,
        "F3" => XK_F3,
        "F4" => XK_F4,
        "F5" => XK_F5,
        "F6" => XK_F6,
        "F7" => XK_F7,
        "F8" => XK_F8,
        "F9" => XK_F9,
        "F10" => XK_F10,
        "F11" => XK_F11,
        "F12" => XK_F12,
        "KP_Enter" => XK_KP_Enter,
        "KP_Insert" => XK_KP_Insert,
        "KP_Delete" => XK_KP_Delete,
        "KP_Home" => XK_KP_Home,
        "KP_End" => XK_KP_End,
        "KP_Prior" => XK_KP_Prior,
        "KP_Next" => XK_KP_Next,
        "KP_Left" => XK_KP_Left,
        "KP_Right" => XK_KP_Right,
        "KP_Up" => XK_KP_Up,
        "KP_Down" => XK_KP_Down,
        "KP_Add" => XK_KP_Add,
        "KP_Subtract" => XK_KP_Subtract,
        "KP_Multiply" => XK_KP_Multiply,
        "KP_Divide" => XK_KP_Divide,
        "KP_0" => XK_KP_0,
        "KP_1" => XK_KP_1,
        "KP_2" => XK_KP_2,
        "KP_3" => XK_KP_3,
        "KP_4" => XK_KP_4,
        "KP_5" => XK_KP_5,
        "KP_6" => XK_KP_6,
        "KP_7" => XK_KP_7,
        "KP_8" => XK_KP_8,
        "KP_9" => XK_KP_9,
        "Super_L" => XK_Super_L,
        "Super_R" => XK_Super_R,
        "XF86AudioRaiseVolume" => XF86XK_AudioRaiseVolume,
        "XF86AudioLowerVolume" => XF86XK_AudioLowerVolume,
        "XF86AudioMute" => XF86XK_AudioMute,
        "XF86AudioPlay" => XF86XK_AudioPlay,
        "XF86AudioNext" => XF86XK_AudioNext,
        "XF86AudioPrev" => XF86XK_AudioPrev,
        _ => return latin1(name),
    };
    Some(sym)
}

fn latin1(name: &str) -> Option<Keysym> {
    let mut chars = name.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    let code = c as u32;
    ((0x20..0x7f).contains(&code) || (0xa0..=0xff).contains(&code)).then_some(code)
}
