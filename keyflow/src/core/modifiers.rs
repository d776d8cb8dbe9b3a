//! Key decorations that wrap control flow around a launched command.
//!
//! A command key may carry one prefix (`^` auto-return, `~` anchor) and one
//! suffix (`*` auto-menu, `!` required). Decorations are parsed once at
//! dispatch entry; downstream code only sees the bare key and a
//! [`PostAction`].

use serde::Serialize;
use serde_json::Value;

use crate::core::session::Session;
use crate::core::types::{Mode, Outcome};

pub const AUTO_RETURN: char = '^';
pub const ANCHOR: char = '~';
pub const AUTO_MENU: char = '*';
pub const REQUIRED: char = '!';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Prefix {
    AutoReturn,
    Anchor,
}

impl Prefix {
    fn from_char(c: char) -> Option<Self> {
        match c {
            AUTO_RETURN => Some(Prefix::AutoReturn),
            ANCHOR => Some(Prefix::Anchor),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Prefix::AutoReturn => AUTO_RETURN,
            Prefix::Anchor => ANCHOR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Suffix {
    AutoMenu,
    Required,
}

impl Suffix {
    fn from_char(c: char) -> Option<Self> {
        match c {
            AUTO_MENU => Some(Suffix::AutoMenu),
            REQUIRED => Some(Suffix::Required),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Suffix::AutoMenu => AUTO_MENU,
            Suffix::Required => REQUIRED,
        }
    }
}

/// Parsed decorations of a single key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Modifiers {
    pub prefix: Option<Prefix>,
    pub suffix: Option<Suffix>,
}

impl Modifiers {
    pub fn is_empty(&self) -> bool {
        self.prefix.is_none() && self.suffix.is_none()
    }

    pub fn auto_return(&self) -> bool {
        self.prefix == Some(Prefix::AutoReturn)
    }

    pub fn anchor(&self) -> bool {
        self.prefix == Some(Prefix::Anchor)
    }

    pub fn auto_menu(&self) -> bool {
        self.suffix == Some(Suffix::AutoMenu)
    }

    pub fn required(&self) -> bool {
        self.suffix == Some(Suffix::Required)
    }

    /// Re-apply the decorations to a bare key.
    pub fn decorate(&self, bare: &str) -> String {
        let mut key = String::with_capacity(bare.len() + 2);
        if let Some(prefix) = self.prefix {
            key.push(prefix.as_char());
        }
        key.push_str(bare);
        if let Some(suffix) = self.suffix {
            key.push(suffix.as_char());
        }
        key
    }
}

/// Split decorations off `key`.
///
/// At most one prefix and one suffix character are stripped, and only when
/// the remaining bare key stays non-empty. Anything else is a literal key
/// character, so parsing never fails.
pub fn parse_key(key: &str) -> (&str, Modifiers) {
    let mut bare = key;
    let mut modifiers = Modifiers::default();

    if let Some(first) = bare.chars().next()
        && let Some(prefix) = Prefix::from_char(first)
        && bare.len() > first.len_utf8()
    {
        modifiers.prefix = Some(prefix);
        bare = &bare[first.len_utf8()..];
    }

    if let Some(last) = bare.chars().next_back()
        && let Some(suffix) = Suffix::from_char(last)
        && bare.len() > last.len_utf8()
    {
        modifiers.suffix = Some(suffix);
        bare = &bare[..bare.len() - last.len_utf8()];
    }

    (bare, modifiers)
}

/// Wrapping behaviour the engine applies around a launched command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PostAction {
    pub modifiers: Modifiers,
    pub mode: Mode,
}

impl PostAction {
    pub fn auto_return(&self) -> bool {
        self.modifiers.auto_return()
    }

    pub fn anchor(&self) -> bool {
        self.modifiers.anchor()
    }

    pub fn auto_menu(&self) -> bool {
        self.modifiers.auto_menu()
    }

    pub fn required(&self) -> bool {
        self.modifiers.required()
    }

    /// Back-option signal contributed by the key: anchor disables it.
    pub fn allows_back(&self) -> bool {
        !self.anchor()
    }

    /// Apply auto-return once the launched action has finished.
    ///
    /// Blocking mode replaces a finished result with the `Back` sentinel.
    /// Non-blocking mode hands the launched result back unchanged because the
    /// remote client owns navigation. Aborts, failures and pending prompts
    /// are never rewritten.
    pub fn finish(&self, outcome: Outcome) -> Outcome {
        if !self.auto_return() {
            return outcome;
        }
        match outcome {
            Outcome::Abort | Outcome::Failed { .. } | Outcome::Pending { .. } => outcome,
            other => match self.mode {
                Mode::Blocking => Outcome::Back,
                Mode::NonBlocking => other,
            },
        }
    }
}

/// A key and command with decorations removed.
#[derive(Debug, Clone, PartialEq)]
pub struct Processed {
    pub key: String,
    pub command: Value,
    pub post: PostAction,
}

/// Strip decorations from `key` and decide the post-execution behaviour.
pub fn process(key: &str, command: &Value, session: &Session) -> Processed {
    let (bare, modifiers) = parse_key(key);
    Processed {
        key: bare.to_string(),
        command: command.clone(),
        post: PostAction {
            modifiers,
            mode: session.mode(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn parses_prefix_and_suffix_independently() {
        assert_eq!(
            parse_key("^start*"),
            (
                "start",
                Modifiers {
                    prefix: Some(Prefix::AutoReturn),
                    suffix: Some(Suffix::AutoMenu),
                }
            )
        );
        assert_eq!(
            parse_key("~save!"),
            (
                "save",
                Modifiers {
                    prefix: Some(Prefix::Anchor),
                    suffix: Some(Suffix::Required),
                }
            )
        );
        assert_eq!(parse_key("plain"), ("plain", Modifiers::default()));
    }

    #[test]
    fn duplicate_decorations_strip_only_once() {
        let (bare, modifiers) = parse_key("^^menu**");
        assert_eq!(bare, "^menu*");
        assert!(modifiers.auto_return());
        assert!(modifiers.auto_menu());
    }

    #[test]
    fn lone_decoration_is_a_literal_key() {
        assert_eq!(parse_key("^"), ("^", Modifiers::default()));
        assert_eq!(parse_key("*"), ("*", Modifiers::default()));
        let (bare, modifiers) = parse_key("~!");
        assert_eq!(bare, "!");
        assert!(modifiers.anchor());
        assert_eq!(modifiers.suffix, None);
    }

    #[test]
    fn unknown_characters_are_not_decorations() {
        assert_eq!(parse_key("#key?"), ("#key?", Modifiers::default()));
    }

    #[test]
    fn decorated_and_bare_keys_share_a_bare_form() {
        for key in ["~menu*", "menu*", "~menu", "menu"] {
            assert_eq!(parse_key(key).0, "menu");
        }
    }

    #[test]
    fn auto_return_depends_on_mode() {
        let (_, modifiers) = parse_key("^go");
        let blocking = PostAction {
            modifiers,
            mode: Mode::Blocking,
        };
        let remote = PostAction {
            modifiers,
            mode: Mode::NonBlocking,
        };
        let launched = Outcome::Done { value: json!("hi") };
        assert_eq!(blocking.finish(launched.clone()), Outcome::Back);
        assert_eq!(remote.finish(launched.clone()), launched);
        assert_eq!(blocking.finish(Outcome::Abort), Outcome::Abort);
    }

    #[test]
    fn process_uses_session_mode() {
        let session = Session::new(Mode::NonBlocking);
        let processed = process("^greet!", &json!("call(greet)"), &session);
        assert_eq!(processed.key, "greet");
        assert_eq!(processed.command, json!("call(greet)"));
        assert_eq!(processed.post.mode, Mode::NonBlocking);
        assert!(processed.post.required());
    }

    proptest! {
        #[test]
        fn parsing_never_panics_and_round_trips(key in ".{0,12}") {
            let (bare, modifiers) = parse_key(&key);
            prop_assert_eq!(modifiers.decorate(bare), key.clone());
            if !modifiers.is_empty() {
                prop_assert!(!bare.is_empty());
            }
        }

        #[test]
        fn decorated_keys_parse_back(bare in "[A-Za-z][A-Za-z0-9_]{0,8}", prefix in 0usize..3, suffix in 0usize..3) {
            let modifiers = Modifiers {
                prefix: [None, Some(Prefix::AutoReturn), Some(Prefix::Anchor)][prefix],
                suffix: [None, Some(Suffix::AutoMenu), Some(Suffix::Required)][suffix],
            };
            let key = modifiers.decorate(&bare);
            prop_assert_eq!(parse_key(&key), (bare.as_str(), modifiers));
        }
    }
}
