//! Keyboard bindings.
//!
//! A binding is written as space-separated modifier names followed by the
//! DOM key value: `"ctrl z"`, `"shift A"`, `"ctrl shift Delete"`. Bindings
//! are checked in insertion order and the first match wins. A binding
//! matches when the key is equal and every modifier it names is held;
//! extra held modifiers do not prevent the match.

use crate::input::Modifiers;
use std::fmt;
use std::str::FromStr;
use winnow::ascii::space1;
use winnow::combinator::{alt, repeat, terminated};
use winnow::prelude::*;
use winnow::token::take_till;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid key binding {binding:?}: {reason}")]
pub struct KeymapError {
    pub binding: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBinding {
    pub modifiers: Modifiers,
    pub key: String,
}

impl KeyBinding {
    pub fn matches(&self, key: &str, held: Modifiers) -> bool {
        self.key == key && held.contains(self.modifiers)
    }
}

impl FromStr for KeyBinding {
    type Err = KeymapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_binding.parse(s.trim()).map_err(|e| KeymapError {
            binding: s.to_owned(),
            reason: e.to_string(),
        })
    }
}

impl fmt::Display for KeyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.modifiers;
        for (held, name) in [(m.ctrl, "ctrl"), (m.alt, "alt"), (m.shift, "shift"), (m.meta, "meta")] {
            if held {
                write!(f, "{name} ")?;
            }
        }
        f.write_str(&self.key)
    }
}

fn parse_modifier(input: &mut &str) -> ModalResult<Modifiers> {
    terminated(
        alt((
            "ctrl".value(Modifiers::CTRL),
            "shift".value(Modifiers::SHIFT),
            "alt".value(Modifiers::ALT),
            "meta".value(Modifiers {
                meta: true,
                ..Modifiers::NONE
            }),
        )),
        space1,
    )
    .parse_next(input)
}

fn parse_binding(input: &mut &str) -> ModalResult<KeyBinding> {
    let modifiers = repeat(0.., parse_modifier)
        .fold(|| Modifiers::NONE, |acc: Modifiers, m| acc.union(m))
        .parse_next(input)?;
    let key = take_till(1.., char::is_whitespace).parse_next(input)?;
    Ok(KeyBinding {
        modifiers,
        key: key.to_owned(),
    })
}

/// Ordered `binding → action name` table.
#[derive(Debug, Clone, Default)]
pub struct Keymap {
    entries: Vec<(KeyBinding, String)>,
}

impl Keymap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(binding, action)` pairs, e.g. [`EditorConfig::keymap`](crate::EditorConfig).
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, KeymapError>
    where
        I: IntoIterator<Item = &'a (String, String)>,
    {
        let mut keymap = Self::new();
        for (binding, action) in pairs {
            keymap.bind(binding, action)?;
        }
        Ok(keymap)
    }

    pub fn bind(&mut self, binding: &str, action: &str) -> Result<(), KeymapError> {
        let binding: KeyBinding = binding.parse()?;
        self.entries.push((binding, action.to_owned()));
        Ok(())
    }

    /// Action of the first binding matching this key press.
    pub fn resolve(&self, key: &str, held: Modifiers) -> Option<&str> {
        self.entries
            .iter()
            .find(|(binding, _)| binding.matches(key, held))
            .map(|(_, action)| action.as_str())
    }

    pub fn entries(&self) -> &[(KeyBinding, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;

    #[test]
    fn parse_modifiers_and_key() {
        let b: KeyBinding = "ctrl shift z".parse().unwrap();
        assert_eq!(b.modifiers, Modifiers::CTRL.union(Modifiers::SHIFT));
        assert_eq!(b.key, "z");
        assert_eq!(b.to_string(), "ctrl shift z");

        let plain: KeyBinding = "Delete".parse().unwrap();
        assert_eq!(plain.modifiers, Modifiers::NONE);
        assert_eq!(plain.key, "Delete");
    }

    #[test]
    fn modifier_name_alone_is_a_key() {
        let b: KeyBinding = "shift".parse().unwrap();
        assert_eq!(b.key, "shift");
        assert_eq!(b.modifiers, Modifiers::NONE);
    }

    #[test]
    fn reject_malformed() {
        assert!("".parse::<KeyBinding>().is_err());
        assert!("ctrl z extra".parse::<KeyBinding>().is_err());
    }

    #[test]
    fn first_match_wins_and_extra_modifiers_allowed() {
        let mut keymap = Keymap::new();
        keymap.bind("ctrl z", "undo").unwrap();
        keymap.bind("ctrl shift z", "redo").unwrap();
        assert_eq!(keymap.resolve("z", Modifiers::CTRL), Some("undo"));
        // Shadowed by the earlier, less specific binding.
        assert_eq!(
            keymap.resolve("z", Modifiers::CTRL.union(Modifiers::SHIFT)),
            Some("undo")
        );
        assert_eq!(keymap.resolve("z", Modifiers::NONE), None);
    }

    #[test]
    fn default_config_parses() {
        let config = EditorConfig::default();
        let keymap = Keymap::from_pairs(&config.keymap).unwrap();
        assert_eq!(keymap.len(), 7);
        assert_eq!(keymap.resolve("Delete", Modifiers::NONE), Some("delete-node"));
        assert_eq!(keymap.resolve("B", Modifiers::SHIFT), Some("select-all"));
        assert_eq!(keymap.resolve("p", Modifiers::ALT), Some("remove-from-frame"));
    }
}
