use serde::Serialize;

/// Identifier of the theme used when a profile has none or an unknown one.
pub const DEFAULT_THEME: &str = "minimal";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Rounded,
    Pill,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    Centered,
    Wide,
}

/// Color, font and layout tokens applied to a public profile page.
#[derive(Debug, Clone, Serialize)]
pub struct Theme {
    pub id: &'static str,
    pub name: &'static str,
    pub background: &'static str,
    pub surface: &'static str,
    pub text: &'static str,
    pub accent: &'static str,
    pub font_family: &'static str,
    pub button_style: ButtonStyle,
    pub layout: Layout,
}

static THEMES: &[Theme] = &[
    Theme {
        id: "minimal",
        name: "Minimal",
        background: "#ffffff",
        surface: "#f4f4f5",
        text: "#18181b",
        accent: "#18181b",
        font_family: "Inter, system-ui, sans-serif",
        button_style: ButtonStyle::Rounded,
        layout: Layout::Centered,
    },
    Theme {
        id: "midnight",
        name: "Midnight",
        background: "#0b1120",
        surface: "#1e293b",
        text: "#e2e8f0",
        accent: "#38bdf8",
        font_family: "Inter, system-ui, sans-serif",
        button_style: ButtonStyle::Pill,
        layout: Layout::Centered,
    },
    Theme {
        id: "sunset",
        name: "Sunset",
        background: "linear-gradient(160deg, #ff9a8b 0%, #ff6a88 55%, #ff99ac 100%)",
        surface: "rgba(255, 255, 255, 0.85)",
        text: "#3b0a1a",
        accent: "#c2185b",
        font_family: "Poppins, system-ui, sans-serif",
        button_style: ButtonStyle::Pill,
        layout: Layout::Centered,
    },
    Theme {
        id: "forest",
        name: "Forest",
        background: "#14281d",
        surface: "#1f3d2b",
        text: "#e8f5e9",
        accent: "#81c784",
        font_family: "Merriweather, Georgia, serif",
        button_style: ButtonStyle::Rounded,
        layout: Layout::Wide,
    },
    Theme {
        id: "paper",
        name: "Paper",
        background: "#faf7f0",
        surface: "#ffffff",
        text: "#2d2a26",
        accent: "#b45309",
        font_family: "\"IBM Plex Serif\", Georgia, serif",
        button_style: ButtonStyle::Square,
        layout: Layout::Wide,
    },
    Theme {
        id: "neon",
        name: "Neon",
        background: "#000000",
        surface: "#111111",
        text: "#f5f5f5",
        accent: "#39ff14",
        font_family: "\"Space Mono\", monospace",
        button_style: ButtonStyle::Square,
        layout: Layout::Centered,
    },
];

pub fn all() -> &'static [Theme] {
    THEMES
}

pub fn get(id: &str) -> Option<&'static Theme> {
    THEMES.iter().find(|t| t.id == id)
}

pub fn exists(id: &str) -> bool {
    get(id).is_some()
}

/// Look up a theme, falling back to the default one.
pub fn resolve(id: &str) -> &'static Theme {
    get(id).unwrap_or(&THEMES[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique() {
        let ids: HashSet<_> = all().iter().map(|t| t.id).collect();
        assert_eq!(ids.len(), all().len());
    }

    #[test]
    fn default_theme_is_first() {
        assert_eq!(all()[0].id, DEFAULT_THEME);
        assert!(exists(DEFAULT_THEME));
    }

    #[test]
    fn unknown_theme_resolves_to_default() {
        assert!(get("vaporwave").is_none());
        assert_eq!(resolve("vaporwave").id, DEFAULT_THEME);
        assert_eq!(resolve("midnight").accent, "#38bdf8");
    }
}
