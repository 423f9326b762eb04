//! Interaction layer
//!
//! Each operation dispatches native input and returns once the browser has
//! accepted it. None of them wait for what the page does in response.

use std::time::Duration;
use tracing::{debug, instrument};

use super::dom::{DomOp, Interaction, Point};
use super::{Locator, Page};
use crate::cdp::types::{KeyEventParams, MouseEventParams};
use crate::{Error, Result};

const ALT: u32 = 1;
const CONTROL: u32 = 2;
const META: u32 = 4;
const SHIFT: u32 = 8;

/// One physical key as Input.dispatchKeyEvent wants it
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KeyDefinition {
    pub key: String,
    pub code: String,
    pub key_code: u32,
    pub text: Option<String>,
}

/// A key plus held modifiers, parsed from "ArrowRight" or "Control+a"
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KeyChord {
    pub modifiers: Vec<(u32, KeyDefinition)>,
    pub key: KeyDefinition,
}

impl KeyChord {
    pub fn parse(spec: &str) -> Result<Self> {
        // A trailing "+" is the plus key itself: "+" or "Control++"
        let (held, last) = if spec == "+" {
            ("", "+")
        } else if let Some(prefix) = spec.strip_suffix("++") {
            (prefix, "+")
        } else {
            spec.rsplit_once('+').unwrap_or(("", spec))
        };
        if last.is_empty() {
            return Err(Error::configuration(format!("Empty key in {:?}", spec)));
        }

        let mut modifiers = Vec::new();
        for name in held.split('+').filter(|_| !held.is_empty()) {
            let held = modifier(name)
                .ok_or_else(|| Error::configuration(format!("Unknown modifier {:?} in {:?}", name, spec)))?;
            modifiers.push(held);
        }

        let mut key = key_definition(last).ok_or_else(|| Error::configuration(format!("Unknown key {:?}", last)))?;
        let mask = mask_of(&modifiers);
        // Shortcuts produce no text
        if mask & (CONTROL | META) != 0 {
            key.text = None;
        } else if mask & SHIFT != 0 {
            key.text = key.text.map(|t| t.to_uppercase());
            if key.key.chars().count() == 1 {
                key.key = key.key.to_uppercase();
            }
        }

        Ok(Self { modifiers, key })
    }

    pub fn mask(&self) -> u32 {
        mask_of(&self.modifiers)
    }
}

fn mask_of(modifiers: &[(u32, KeyDefinition)]) -> u32 {
    modifiers.iter().fold(0, |acc, (bit, _)| acc | bit)
}

fn modifier(name: &str) -> Option<(u32, KeyDefinition)> {
    let (bit, key, code, key_code) = match name {
        "Alt" => (ALT, "Alt", "AltLeft", 18),
        "Control" | "Ctrl" => (CONTROL, "Control", "ControlLeft", 17),
        "Meta" | "Command" => (META, "Meta", "MetaLeft", 91),
        "Shift" => (SHIFT, "Shift", "ShiftLeft", 16),
        _ => return None,
    };
    Some((
        bit,
        KeyDefinition {
            key: key.to_string(),
            code: code.to_string(),
            key_code,
            text: None,
        },
    ))
}

pub(crate) fn key_definition(name: &str) -> Option<KeyDefinition> {
    let named = |key: &str, code: &str, key_code: u32, text: Option<&str>| KeyDefinition {
        key: key.to_string(),
        code: code.to_string(),
        key_code,
        text: text.map(str::to_string),
    };

    let def = match name {
        "ArrowLeft" => named("ArrowLeft", "ArrowLeft", 37, None),
        "ArrowUp" => named("ArrowUp", "ArrowUp", 38, None),
        "ArrowRight" => named("ArrowRight", "ArrowRight", 39, None),
        "ArrowDown" => named("ArrowDown", "ArrowDown", 40, None),
        "Enter" => named("Enter", "Enter", 13, Some("\r")),
        "Escape" => named("Escape", "Escape", 27, None),
        "Tab" => named("Tab", "Tab", 9, None),
        "Backspace" => named("Backspace", "Backspace", 8, None),
        "Delete" => named("Delete", "Delete", 46, None),
        "Home" => named("Home", "Home", 36, None),
        "End" => named("End", "End", 35, None),
        "PageUp" => named("PageUp", "PageUp", 33, None),
        "PageDown" => named("PageDown", "PageDown", 34, None),
        "Space" | " " => named(" ", "Space", 32, Some(" ")),
        _ => {
            let mut chars = name.chars();
            let c = chars.next()?;
            if chars.next().is_some() {
                return None;
            }
            let text = Some(c.to_string());
            if c.is_ascii_alphabetic() {
                let upper = c.to_ascii_uppercase();
                KeyDefinition {
                    key: c.to_string(),
                    code: format!("Key{}", upper),
                    key_code: upper as u32,
                    text,
                }
            } else if c.is_ascii_digit() {
                KeyDefinition {
                    key: c.to_string(),
                    code: format!("Digit{}", c),
                    key_code: c as u32,
                    text,
                }
            } else {
                // Punctuation and non-ASCII: text only, no physical key
                KeyDefinition {
                    key: c.to_string(),
                    code: String::new(),
                    key_code: 0,
                    text,
                }
            }
        }
    };
    Some(def)
}

fn key_event(kind: &str, def: &KeyDefinition, modifiers: u32, with_text: bool) -> KeyEventParams {
    KeyEventParams {
        r#type: kind.to_string(),
        key: def.key.clone(),
        code: def.code.clone(),
        windows_virtual_key_code: def.key_code,
        text: if with_text { def.text.clone() } else { None },
        modifiers,
    }
}

impl Page {
    /// Press and release `key` on whatever element has focus
    #[instrument(skip(self), fields(page = %self.id))]
    pub async fn press(&self, key: &str) -> Result<()> {
        let chord = KeyChord::parse(key)?;
        let _guard = self.exclusive().await?;
        self.press_unlocked(&chord).await
    }

    async fn press_unlocked(&self, chord: &KeyChord) -> Result<()> {
        let mut held = 0;
        for (bit, def) in &chord.modifiers {
            held |= bit;
            self.client.dispatch_key_event(key_event("rawKeyDown", def, held, false)).await?;
        }

        let down = if chord.key.text.is_some() { "keyDown" } else { "rawKeyDown" };
        self.client.dispatch_key_event(key_event(down, &chord.key, held, true)).await?;
        self.client.dispatch_key_event(key_event("keyUp", &chord.key, held, false)).await?;

        for (bit, def) in chord.modifiers.iter().rev() {
            held &= !bit;
            self.client.dispatch_key_event(key_event("keyUp", def, held, false)).await?;
        }
        Ok(())
    }

    /// Resize the viewport; layout reflows asynchronously
    pub async fn set_viewport_size(&self, width: u32, height: u32) -> Result<()> {
        let _guard = self.exclusive().await?;
        self.client.set_viewport(width, height).await
    }

    /// Fixed delay for transitions that cannot be observed; bounded by the case deadline
    pub async fn settle(&self, delay: Duration) -> Result<()> {
        let delay = self.deadline.clamp(delay);
        tokio::time::sleep(delay).await;
        self.ensure_alive()
    }
}

impl<'p> Locator<'p> {
    async fn prepare(&self, action: Interaction) -> Result<Point> {
        let reply = self.query_unlocked(DomOp::Prepare { action }).await?;
        serde_json::from_value(reply.value).map_err(|e| {
            Error::script_execution_failed(format!("Bad {} target for {}: {}", action.as_str(), self, e))
        })
    }

    /// Left click at the centre of the first match
    #[instrument(skip(self), fields(locator = %self))]
    pub async fn click(&self) -> Result<()> {
        let page = self.page;
        let _guard = page.exclusive().await?;
        let Point { x, y } = self.prepare(Interaction::Click).await?;
        debug!("Clicking {} at ({:.1}, {:.1})", self, x, y);

        page.client.dispatch_mouse_event(MouseEventParams::moved(x, y)).await?;
        page.client.dispatch_mouse_event(MouseEventParams::pressed(x, y)).await?;
        page.client.dispatch_mouse_event(MouseEventParams::released(x, y)).await
    }

    /// Move the pointer over the first match
    #[instrument(skip(self), fields(locator = %self))]
    pub async fn hover(&self) -> Result<()> {
        let page = self.page;
        let _guard = page.exclusive().await?;
        let Point { x, y } = self.prepare(Interaction::Hover).await?;
        page.client.dispatch_mouse_event(MouseEventParams::moved(x, y)).await
    }

    pub async fn focus(&self) -> Result<()> {
        let _guard = self.page.exclusive().await?;
        self.prepare(Interaction::Focus).await.map(|_| ())
    }

    /// Replace the content of an input, textarea or editable element
    #[instrument(skip(self, text), fields(locator = %self))]
    pub async fn fill(&self, text: &str) -> Result<()> {
        let page = self.page;
        let _guard = page.exclusive().await?;
        self.prepare(Interaction::Fill).await?;

        if text.is_empty() {
            self.query_unlocked(DomOp::SetValue { value: String::new() }).await?;
            Ok(())
        } else {
            // Typed over the selection so the page sees real input events
            page.client.insert_text(text).await
        }
    }

    /// Focus the first match, then press `key`
    #[instrument(skip(self), fields(locator = %self))]
    pub async fn press(&self, key: &str) -> Result<()> {
        let chord = KeyChord::parse(key)?;
        let page = self.page;
        let _guard = page.exclusive().await?;
        self.prepare(Interaction::Focus).await?;
        page.press_unlocked(&chord).await
    }
}
