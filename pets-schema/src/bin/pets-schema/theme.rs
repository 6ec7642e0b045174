//! Terminal colors and glyphs shared by command output and help text.

use colored::{Color, Colorize};

/// What a piece of output means; each role has one color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tone {
    Success,
    Error,
    Warning,
    Info,
    Heading,
    Progress,
    Muted,
    Key,
    Value,
}

impl Tone {
    pub const fn color(self) -> Color {
        match self {
            Tone::Success => Color::Green,
            Tone::Error => Color::Red,
            Tone::Warning => Color::Yellow,
            Tone::Info => Color::Blue,
            Tone::Heading => Color::BrightBlue,
            Tone::Progress => Color::Cyan,
            Tone::Muted => Color::BrightBlack,
            Tone::Key => Color::BrightCyan,
            Tone::Value => Color::White,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Icon {
    Success,
    Error,
    Warning,
    Info,
    Arrow,
    Bullet,
    Loading,
    /// A step that created something.
    Created,
    /// A step that dropped something.
    Dropped,
    /// A step whose target was already in the wanted state.
    Unchanged,
    /// A dry-run step.
    Planned,
}

impl Icon {
    pub const fn glyph(self) -> &'static str {
        match self {
            Icon::Success => "✓",
            Icon::Error => "✗",
            Icon::Warning => "⚠",
            Icon::Info => "ℹ",
            Icon::Arrow => "→",
            Icon::Bullet => "•",
            Icon::Loading => "⟳",
            Icon::Created => "+",
            Icon::Dropped => "-",
            Icon::Unchanged => "=",
            Icon::Planned => "~",
        }
    }

    pub const fn tone(self) -> Tone {
        match self {
            Icon::Success | Icon::Created => Tone::Success,
            Icon::Error | Icon::Dropped => Tone::Error,
            Icon::Warning => Tone::Warning,
            Icon::Info => Tone::Info,
            Icon::Loading => Tone::Progress,
            Icon::Arrow | Icon::Bullet | Icon::Unchanged | Icon::Planned => Tone::Muted,
        }
    }
}

/// Colors `text` unless color is disabled.
pub fn paint(text: &str, tone: Tone, bold: bool, color: bool) -> String {
    match (color, bold) {
        (false, _) => text.to_string(),
        (true, false) => text.color(tone.color()).to_string(),
        (true, true) => text.color(tone.color()).bold().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_when_color_is_off() {
        assert_eq!(paint("users", Tone::Key, true, false), "users");
    }

    #[test]
    fn step_glyphs_are_distinct() {
        let glyphs = [Icon::Created, Icon::Dropped, Icon::Unchanged, Icon::Planned].map(Icon::glyph);
        for (i, glyph) in glyphs.iter().enumerate() {
            assert!(!glyphs[i + 1..].contains(glyph), "{glyph} is reused");
        }
    }
}
