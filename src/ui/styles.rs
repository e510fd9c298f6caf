//! Color palettes.
//! Uses basic terminal colors for maximum compatibility.

use ratatui::style::{Color, Modifier, Style};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub name: &'static str,
    pub fg: Color,
    pub muted: Color,
    pub accent: Color,
    pub author: Color,
    pub bg_active: Color,
    pub bg_status: Color,
    pub favorite: Color,
    pub flag: Color,
    pub dead: Color,
    pub key: Color,
}

const THEME_ORDER: &[&str] = &["dark", "light", "orange"];

pub fn available_themes() -> Vec<String> {
    THEME_ORDER.iter().map(|s| s.to_string()).collect()
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase().replace('_', "-")
}

pub fn find_palette(name: &str) -> Option<Palette> {
    match normalize(name).as_str() {
        "dark" | "default" => Some(dark()),
        "light" => Some(light()),
        "orange" | "hn" | "classic" => Some(orange()),
        _ => None,
    }
}

pub fn palette(name: &str) -> Result<Palette, String> {
    find_palette(name).ok_or_else(|| {
        format!(
            "Unknown theme '{}'. Available: {}",
            name,
            available_themes().join(", ")
        )
    })
}

fn dark() -> Palette {
    Palette {
        name: "dark",
        fg: Color::White,
        muted: Color::Gray,
        accent: Color::Cyan,
        author: Color::Yellow,
        bg_active: Color::DarkGray,
        bg_status: Color::Black,
        favorite: Color::Yellow,
        flag: Color::Red,
        dead: Color::DarkGray,
        key: Color::Yellow,
    }
}

fn light() -> Palette {
    Palette {
        name: "light",
        fg: Color::Black,
        muted: Color::DarkGray,
        accent: Color::Blue,
        author: Color::Magenta,
        bg_active: Color::Gray,
        bg_status: Color::White,
        favorite: Color::Magenta,
        flag: Color::Red,
        dead: Color::Gray,
        key: Color::Blue,
    }
}

fn orange() -> Palette {
    Palette {
        name: "orange",
        fg: Color::Black,
        muted: Color::DarkGray,
        accent: Color::Rgb(255, 102, 0),
        author: Color::Rgb(130, 130, 130),
        bg_active: Color::Rgb(246, 246, 239),
        bg_status: Color::Rgb(255, 102, 0),
        favorite: Color::Rgb(255, 102, 0),
        flag: Color::Red,
        dead: Color::Gray,
        key: Color::Rgb(255, 102, 0),
    }
}

impl Palette {
    pub fn style_default(&self) -> Style {
        Style::default().fg(self.fg)
    }

    pub fn style_muted(&self) -> Style {
        Style::default().fg(self.muted)
    }

    pub fn style_title(&self) -> Style {
        Style::default().fg(self.fg).add_modifier(Modifier::BOLD)
    }

    pub fn style_author(&self) -> Style {
        Style::default().fg(self.author)
    }

    pub fn style_active(&self) -> Style {
        Style::default().bg(self.bg_active)
    }

    pub fn style_status(&self) -> Style {
        Style::default().bg(self.bg_status).fg(self.fg)
    }

    pub fn style_dead(&self) -> Style {
        Style::default()
            .fg(self.dead)
            .add_modifier(Modifier::ITALIC)
    }

    pub fn style_key(&self) -> Style {
        Style::default().fg(self.key)
    }

    pub fn style_accent(&self) -> Style {
        Style::default().fg(self.accent).add_modifier(Modifier::BOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theme_names_are_normalized() {
        assert_eq!(find_palette(" Dark ").map(|p| p.name), Some("dark"));
        assert_eq!(find_palette("HN").map(|p| p.name), Some("orange"));
        assert!(find_palette("solarized").is_none());
    }

    #[test]
    fn unknown_theme_lists_available() {
        let err = palette("nope").unwrap_err();
        assert!(err.contains("dark, light, orange"));
    }

    #[test]
    fn every_listed_theme_resolves() {
        for name in available_themes() {
            assert!(find_palette(&name).is_some(), "{name}");
        }
    }
}
