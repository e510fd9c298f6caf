//! Context-based keymap.
//!
//! Each binding may be limited to one context. A key resolves to the binding
//! in the most specific active context: Help > Comments > Stories > Global.

use crate::ports::{KeyCode, KeyModifiers};
use std::collections::{BTreeMap, HashSet};

/// Binding scopes, ordered by discriminant from least to most specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Context {
    /// Always in effect
    Global = 0,
    /// Page lists stories
    Stories = 1,
    /// Page is a comment thread
    Comments = 2,
    /// Help overlay is shown
    Help = 3,
}

/// Section headings of the help overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HelpCategory {
    Navigation = 0,
    Actions = 1,
    General = 2,
}

impl HelpCategory {
    pub fn display_name(self) -> &'static str {
        match self {
            HelpCategory::Navigation => "Navigation",
            HelpCategory::Actions => "Actions",
            HelpCategory::General => "General",
        }
    }
}

impl Context {
    pub fn specificity(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    // Navigation
    Next,
    Previous,
    NextIncludingHidden,
    PreviousIncludingHidden,
    NextSibling,
    PreviousSibling,
    ClosestCollapsedUp,
    ClosestCollapsedDown,
    ScrollTop,

    // Entity actions
    Reply,
    Favorite,
    Flag,
    VoteUp,
    VoteDown,
    ToggleCollapse,
    OpenReference(u8),
    OpenLink,
    OpenComments,

    // General
    Escape,
    ShowHelp,
    DismissHelp,
    Quit,
}

/// One key, optionally scoped to a context.
#[derive(Debug, Clone)]
pub struct KeyBinding {
    pub key: KeyCode,
    /// Requires a combo modifier (Ctrl or Alt).
    pub combo: bool,
    /// `None` binds in every context.
    pub context: Option<Context>,
    pub action: Action,
    /// Unlisted in the help overlay when `None`.
    pub help_text: Option<&'static str>,
    pub category: Option<HelpCategory>,
}

impl KeyBinding {
    pub fn new(key: KeyCode, action: Action) -> Self {
        Self {
            key,
            combo: false,
            context: None,
            action,
            help_text: None,
            category: None,
        }
    }

    pub fn with_combo(mut self) -> Self {
        self.combo = true;
        self
    }

    pub fn in_context(mut self, ctx: Context) -> Self {
        self.context = Some(ctx);
        self
    }

    pub fn help(mut self, category: HelpCategory, text: &'static str) -> Self {
        self.category = Some(category);
        self.help_text = Some(text);
        self
    }
}

/// Ordered list of bindings. Lookups are resolved against the contexts
/// currently in effect.
pub struct Keymap {
    bindings: Vec<KeyBinding>,
}

impl Keymap {
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    /// When two bindings tie on specificity, the one bound last wins.
    pub fn bind(&mut self, binding: KeyBinding) {
        self.bindings.push(binding);
    }

    /// Resolve a key press. Bindings whose context is not in
    /// `active_contexts` are ignored; among the rest the most specific
    /// context wins.
    pub fn lookup(
        &self,
        key: KeyCode,
        modifiers: KeyModifiers,
        active_contexts: &[Context],
    ) -> Option<Action> {
        self.bindings
            .iter()
            .enumerate()
            .filter(|(_, binding)| Self::key_matches(binding, key, modifiers))
            .filter_map(|(order, binding)| {
                let rank = match binding.context {
                    None => 0,
                    Some(ctx) if active_contexts.contains(&ctx) => ctx.specificity(),
                    Some(_) => return None,
                };
                Some(((rank, order), binding.action))
            })
            .max_by_key(|(priority, _)| *priority)
            .map(|(_, action)| action)
    }

    /// Char keys match case-sensitively; shift is carried by the char itself
    /// and never part of the combo check.
    fn key_matches(binding: &KeyBinding, key: KeyCode, modifiers: KeyModifiers) -> bool {
        binding.key == key && binding.combo == modifiers.combo()
    }

    /// Documented bindings grouped by category, one line per key and
    /// context.
    pub fn help_entries(&self) -> Vec<(HelpCategory, Vec<HelpEntry>)> {
        let mut grouped: BTreeMap<HelpCategory, Vec<HelpEntry>> = BTreeMap::new();
        let mut listed: HashSet<(String, Option<Context>)> = HashSet::new();

        for binding in &self.bindings {
            let (Some(category), Some(description)) = (binding.category, binding.help_text) else {
                continue;
            };
            let key_display = format_key_display(&binding.key, binding.combo);
            if !listed.insert((key_display.clone(), binding.context)) {
                continue;
            }
            grouped.entry(category).or_default().push(HelpEntry {
                key_display,
                description,
                context_hint: binding.context.and_then(context_hint),
            });
        }

        grouped.into_iter().collect()
    }
}

/// One help overlay line.
#[derive(Debug, Clone)]
pub struct HelpEntry {
    pub key_display: String,
    pub description: &'static str,
    pub context_hint: Option<&'static str>,
}

fn format_key_display(key: &KeyCode, combo: bool) -> String {
    let key_str = match key {
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Esc => "Esc".to_string(),
        KeyCode::Up => "↑".to_string(),
        KeyCode::Down => "↓".to_string(),
        KeyCode::Home => "Home".to_string(),
        _ => "?".to_string(),
    };

    if combo {
        format!("Ctrl+{key_str}")
    } else {
        key_str
    }
}

fn context_hint(ctx: Context) -> Option<&'static str> {
    match ctx {
        Context::Comments => Some("comments"),
        Context::Stories => Some("stories"),
        _ => None,
    }
}

impl Default for Keymap {
    fn default() -> Self {
        Self::new()
    }
}

/// Bindings for thread and front-page navigation.
pub fn build_default_keymap() -> Keymap {
    use HelpCategory::*;

    let mut km = Keymap::new();

    let key = |k: KeyCode, a: Action| KeyBinding::new(k, a);
    let ch = |c: char, a: Action| KeyBinding::new(KeyCode::Char(c), a);

    // Navigation
    km.bind(ch('j', Action::Next).help(Navigation, "Next item"));
    km.bind(ch('k', Action::Previous).help(Navigation, "Previous item"));
    km.bind(ch('J', Action::NextIncludingHidden).help(Navigation, "Next item, including hidden"));
    km.bind(ch('K', Action::PreviousIncludingHidden).help(Navigation, "Previous item, including hidden"));
    km.bind(ch('n', Action::NextSibling).in_context(Context::Comments).help(Navigation, "Next sibling"));
    km.bind(ch('p', Action::PreviousSibling).in_context(Context::Comments).help(Navigation, "Previous sibling"));
    km.bind(ch('[', Action::ClosestCollapsedUp).in_context(Context::Comments).help(Navigation, "Closest collapsed above"));
    km.bind(ch(']', Action::ClosestCollapsedDown).in_context(Context::Comments).help(Navigation, "Closest collapsed below"));
    km.bind(ch('t', Action::ScrollTop).help(Navigation, "Scroll to top"));

    // Item actions
    km.bind(ch('u', Action::VoteUp).help(Actions, "Vote up / unvote"));
    km.bind(ch('d', Action::VoteDown).help(Actions, "Vote down / unvote"));
    km.bind(ch('f', Action::Favorite).help(Actions, "Toggle favorite"));
    km.bind(ch('X', Action::Flag).with_combo().help(Actions, "Toggle flag"));
    km.bind(ch('r', Action::Reply).in_context(Context::Comments).help(Actions, "Reply"));
    km.bind(ch('c', Action::ToggleCollapse).in_context(Context::Comments).help(Actions, "Collapse / expand thread"));
    km.bind(ch('o', Action::OpenLink).in_context(Context::Stories).help(Actions, "Open story link"));
    km.bind(ch('c', Action::OpenComments).in_context(Context::Stories).help(Actions, "Open comments"));
    km.bind(ch('1', Action::OpenReference(1)).in_context(Context::Comments).help(Actions, "Open reference [n] (0-9)"));

    // General
    km.bind(key(KeyCode::Esc, Action::Escape).help(General, "Close reply / deactivate"));
    km.bind(ch('?', Action::ShowHelp).with_combo().help(General, "Show help"));
    km.bind(ch('q', Action::Quit).help(General, "Quit"));

    // Unlisted aliases
    km.bind(key(KeyCode::Down, Action::Next));
    km.bind(key(KeyCode::Up, Action::Previous));
    km.bind(ch('x', Action::Flag).with_combo());
    km.bind(ch('c', Action::Quit).with_combo());

    for n in 0..=9u8 {
        let c = char::from(b'0' + n);
        km.bind(ch(c, Action::OpenReference(n)).in_context(Context::Comments));
    }

    // While the overlay is open
    km.bind(key(KeyCode::Esc, Action::DismissHelp).in_context(Context::Help));
    km.bind(ch('q', Action::DismissHelp).in_context(Context::Help));
    km.bind(key(KeyCode::Enter, Action::DismissHelp).in_context(Context::Help));

    km
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: KeyModifiers = KeyModifiers::NONE;

    #[test]
    fn test_global_binding() {
        let km = build_default_keymap();
        let contexts = vec![Context::Global, Context::Comments];

        let action = km.lookup(KeyCode::Char('j'), NONE, &contexts);
        assert_eq!(action, Some(Action::Next));
    }

    #[test]
    fn test_capital_variants_include_hidden() {
        let km = build_default_keymap();
        let contexts = vec![Context::Global, Context::Comments];

        let shift = KeyModifiers {
            shift: true,
            ..NONE
        };
        let action = km.lookup(KeyCode::Char('J'), shift, &contexts);
        assert_eq!(action, Some(Action::NextIncludingHidden));
        let action = km.lookup(KeyCode::Char('K'), shift, &contexts);
        assert_eq!(action, Some(Action::PreviousIncludingHidden));
    }

    #[test]
    fn test_context_decides_meaning_of_c() {
        let km = build_default_keymap();

        let action = km.lookup(KeyCode::Char('c'), NONE, &[Context::Global, Context::Comments]);
        assert_eq!(action, Some(Action::ToggleCollapse));

        let action = km.lookup(KeyCode::Char('c'), NONE, &[Context::Global, Context::Stories]);
        assert_eq!(action, Some(Action::OpenComments));
    }

    #[test]
    fn test_combo_is_required_for_flag_and_help() {
        let km = build_default_keymap();
        let contexts = vec![Context::Global, Context::Comments];

        assert_eq!(km.lookup(KeyCode::Char('X'), NONE, &contexts), None);
        assert_eq!(km.lookup(KeyCode::Char('?'), NONE, &contexts), None);

        let alt = KeyModifiers {
            alt: true,
            shift: true,
            ..NONE
        };
        assert_eq!(km.lookup(KeyCode::Char('X'), alt, &contexts), Some(Action::Flag));
        assert_eq!(
            km.lookup(KeyCode::Char('?'), KeyModifiers::CTRL, &contexts),
            Some(Action::ShowHelp)
        );
    }

    #[test]
    fn test_combo_blocks_plain_bindings() {
        let km = build_default_keymap();
        let contexts = vec![Context::Global, Context::Comments];

        assert_eq!(
            km.lookup(KeyCode::Char('c'), KeyModifiers::CTRL, &contexts),
            Some(Action::Quit)
        );
        assert_eq!(km.lookup(KeyCode::Char('j'), KeyModifiers::CTRL, &contexts), None);
    }

    #[test]
    fn test_digits_open_references_in_comments_only() {
        let km = build_default_keymap();

        let action = km.lookup(KeyCode::Char('3'), NONE, &[Context::Global, Context::Comments]);
        assert_eq!(action, Some(Action::OpenReference(3)));
        let action = km.lookup(KeyCode::Char('0'), NONE, &[Context::Global, Context::Comments]);
        assert_eq!(action, Some(Action::OpenReference(0)));

        let action = km.lookup(KeyCode::Char('3'), NONE, &[Context::Global, Context::Stories]);
        assert_eq!(action, None);
    }

    #[test]
    fn test_help_mode_captures_escape() {
        let km = build_default_keymap();

        let contexts = vec![Context::Global, Context::Comments, Context::Help];
        let action = km.lookup(KeyCode::Esc, NONE, &contexts);
        assert_eq!(action, Some(Action::DismissHelp));

        let contexts = vec![Context::Global, Context::Comments];
        let action = km.lookup(KeyCode::Esc, NONE, &contexts);
        assert_eq!(action, Some(Action::Escape));
    }

    #[test]
    fn test_help_entries_generated() {
        let km = build_default_keymap();
        let entries = km.help_entries();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].0, HelpCategory::Navigation);
        assert_eq!(entries[1].0, HelpCategory::Actions);
        assert_eq!(entries[2].0, HelpCategory::General);

        let nav_entries = &entries[0].1;
        let next = nav_entries.iter().find(|e| e.description == "Next item");
        assert_eq!(next.map(|e| e.key_display.as_str()), Some("j"));

        let actions = &entries[1].1;
        let flag = actions.iter().find(|e| e.description == "Toggle flag");
        assert_eq!(flag.map(|e| e.key_display.as_str()), Some("Ctrl+X"));

        // `c` is listed for both page kinds.
        let c_hints: Vec<_> = actions
            .iter()
            .filter(|e| e.key_display == "c")
            .map(|e| e.context_hint)
            .collect();
        assert_eq!(c_hints, vec![Some("comments"), Some("stories")]);
    }
}
