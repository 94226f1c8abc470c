//! Appearance configuration and its application to a live session
//!
//! `ThemeApplicator::apply` is called on every host refresh. It diffs the
//! requested appearance against what the surface already shows and pushes
//! only the changed groups to the engine, so a steady-state refresh costs a
//! comparison and nothing else.

use crate::color::Color;
use crate::engine::TerminalEngine;
use crate::session::Session;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSpec {
    pub family: String,
    pub size: f32,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            family: "monospace".to_string(),
            size: 13.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub foreground: Color,
    pub background: Color,
    pub ansi: [Color; 16],
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            foreground: Color::white(),
            background: Color::black(),
            ansi: std::array::from_fn(|i| Color::from_ansi_index(i as u8)),
        }
    }
}

/// Cursor display shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorShape {
    #[default]
    Block,
    Underline,
    Bar,
}

/// Cursor blink behavior.
///
/// `System` follows the platform accessibility preference. The explicit
/// variants are only used when the caller opts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorBlink {
    #[default]
    System,
    Always,
    Never,
}

impl CursorBlink {
    /// Explicit override, or `None` to defer to the system setting
    pub fn override_value(self) -> Option<bool> {
        match self {
            CursorBlink::System => None,
            CursorBlink::Always => Some(true),
            CursorBlink::Never => Some(false),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorConfig {
    pub shape: CursorShape,
    pub blink: CursorBlink,
    pub color: Option<Color>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionStyle {
    pub background: Color,
    /// Keep the cell's own foreground when unset
    pub foreground: Option<Color>,
}

impl Default for SelectionStyle {
    fn default() -> Self {
        Self {
            background: Color::new(68, 71, 90),
            foreground: None,
        }
    }
}

/// Complete visual configuration the host supplies on each `reconcile`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppearanceConfig {
    pub font: FontSpec,
    pub palette: Palette,
    pub cursor: CursorConfig,
    pub selection: SelectionStyle,
}

/// Changed appearance groups handed to the engine; `None` means unchanged
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppearanceUpdate {
    pub font: Option<FontSpec>,
    pub palette: Option<Palette>,
    pub cursor: Option<CursorConfig>,
    pub selection: Option<SelectionStyle>,
}

impl AppearanceUpdate {
    /// Everything in `config`, used for the first application
    pub fn full(config: &AppearanceConfig) -> Self {
        Self {
            font: Some(config.font.clone()),
            palette: Some(config.palette.clone()),
            cursor: Some(config.cursor),
            selection: Some(config.selection),
        }
    }

    /// Only the groups that differ between `old` and `new`
    pub fn diff(old: &AppearanceConfig, new: &AppearanceConfig) -> Self {
        Self {
            font: (old.font != new.font).then(|| new.font.clone()),
            palette: (old.palette != new.palette).then(|| new.palette.clone()),
            cursor: (old.cursor != new.cursor).then_some(new.cursor),
            selection: (old.selection != new.selection).then_some(new.selection),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes() == AppearanceChanges::default()
    }

    pub fn changes(&self) -> AppearanceChanges {
        AppearanceChanges {
            font: self.font.is_some(),
            palette: self.palette.is_some(),
            cursor: self.cursor.is_some(),
            selection: self.selection.is_some(),
        }
    }
}

/// Which appearance groups an `apply` call touched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AppearanceChanges {
    pub font: bool,
    pub palette: bool,
    pub cursor: bool,
    pub selection: bool,
}

impl AppearanceChanges {
    pub fn any(&self) -> bool {
        self.font || self.palette || self.cursor || self.selection
    }
}

/// Applies appearance to a session surface without touching process or focus
#[derive(Debug, Default)]
pub struct ThemeApplicator;

impl ThemeApplicator {
    pub fn new() -> Self {
        Self
    }

    /// Bring the surface in line with `config`.
    ///
    /// Identical configs produce no engine call at all.
    pub fn apply<E: TerminalEngine>(
        &self,
        session: &mut Session,
        engine: &mut E,
        config: &AppearanceConfig,
    ) -> AppearanceChanges {
        let update = match session.appearance() {
            Some(current) if current == config => return AppearanceChanges::default(),
            Some(current) => AppearanceUpdate::diff(current, config),
            None => AppearanceUpdate::full(config),
        };

        let changes = update.changes();
        tracing::debug!(session = %session.identity(), ?changes, "applying appearance");
        engine.configure_appearance(&update);
        session.set_appearance(config.clone());
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingEngine;

    #[test]
    fn test_first_apply_sends_everything() {
        let mut session = Session::new((80, 24));
        let mut engine = RecordingEngine::new();
        let config = AppearanceConfig::default();

        let changes = ThemeApplicator::new().apply(&mut session, &mut engine, &config);

        assert!(changes.font && changes.palette && changes.cursor && changes.selection);
        assert_eq!(engine.appearance_updates, vec![AppearanceUpdate::full(&config)]);
        assert_eq!(session.appearance(), Some(&config));
    }

    #[test]
    fn test_identical_config_is_a_no_op() {
        let mut session = Session::new((80, 24));
        let mut engine = RecordingEngine::new();
        let config = AppearanceConfig::default();
        let theme = ThemeApplicator::new();

        theme.apply(&mut session, &mut engine, &config);
        for _ in 0..10 {
            let changes = theme.apply(&mut session, &mut engine, &config);
            assert!(!changes.any());
        }

        assert_eq!(engine.appearance_updates.len(), 1);
        assert_eq!(engine.redraws, 0);
    }

    #[test]
    fn test_only_changed_groups_are_sent() {
        let mut session = Session::new((80, 24));
        let mut engine = RecordingEngine::new();
        let theme = ThemeApplicator::new();
        let mut config = AppearanceConfig::default();
        theme.apply(&mut session, &mut engine, &config);

        config.font.size = 15.0;
        let changes = theme.apply(&mut session, &mut engine, &config);

        assert_eq!(
            changes,
            AppearanceChanges {
                font: true,
                ..Default::default()
            }
        );
        let update = engine.appearance_updates.last().unwrap();
        assert_eq!(update.font.as_ref().map(|f| f.size), Some(15.0));
        assert!(update.palette.is_none() && update.cursor.is_none() && update.selection.is_none());
    }

    #[test]
    fn test_cursor_blink_defaults_to_system() {
        let config = AppearanceConfig::default();
        assert_eq!(config.cursor.blink, CursorBlink::System);
        assert_eq!(config.cursor.blink.override_value(), None);
        assert_eq!(CursorBlink::Never.override_value(), Some(false));
    }

    #[test]
    fn test_apply_leaves_process_and_attachment_alone() {
        let mut session = Session::new((80, 24));
        session.set_attached(true);
        let mut engine = RecordingEngine::new();
        let theme = ThemeApplicator::new();

        let mut config = AppearanceConfig::default();
        for size in [12.0, 14.0, 16.0] {
            config.font.size = size;
            theme.apply(&mut session, &mut engine, &config);
        }

        assert!(session.is_attached());
        assert!(session.process().is_none());
        assert!(engine.starts.is_empty());
        assert!(engine.fed.is_empty());
    }

    #[test]
    fn test_deserialize_partial_appearance() {
        let config: AppearanceConfig = toml::from_str(
            r##"
            [font]
            family = "JetBrains Mono"

            [palette]
            background = "#1e1e2e"

            [cursor]
            shape = "bar"
            blink = "never"
            "##,
        )
        .unwrap();

        assert_eq!(config.font.family, "JetBrains Mono");
        assert_eq!(config.font.size, FontSpec::default().size);
        assert_eq!(config.palette.background, Color::new(30, 30, 46));
        assert_eq!(config.palette.foreground, Color::white());
        assert_eq!(config.cursor.shape, CursorShape::Bar);
        assert_eq!(config.cursor.blink, CursorBlink::Never);
    }
}
