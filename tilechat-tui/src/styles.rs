use ratatui::style::{Color, Modifier, Style};

/// Colour set for one theme. Light mode uses darker foregrounds so text stays
/// readable on a light terminal background.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    dark: bool,
}

impl Palette {
    pub fn new(dark: bool) -> Self {
        Self { dark }
    }

    pub fn name(&self) -> &'static str {
        if self.dark { "dark" } else { "light" }
    }

    fn pick(&self, dark: Color, light: Color) -> Color {
        if self.dark { dark } else { light }
    }

    pub fn base(&self) -> Style {
        Style::default()
            .fg(self.pick(Color::White, Color::Black))
            .bg(self.pick(Color::Black, Color::White))
    }

    pub fn user_header(&self) -> Style {
        Style::default()
            .fg(self.pick(Color::Cyan, Color::Blue))
            .add_modifier(Modifier::BOLD)
    }

    pub fn user_text(&self) -> Style {
        Style::default().fg(self.pick(Color::Cyan, Color::Blue))
    }

    pub fn assistant_header(&self) -> Style {
        Style::default()
            .fg(self.pick(Color::LightGreen, Color::Green))
            .add_modifier(Modifier::BOLD)
    }

    pub fn assistant_text(&self) -> Style {
        Style::default().fg(self.pick(Color::White, Color::Black))
    }

    pub fn title(&self) -> Style {
        Style::default()
            .fg(self.pick(Color::LightMagenta, Color::Magenta))
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
    }

    pub fn subsection(&self) -> Style {
        Style::default().fg(self.pick(Color::LightYellow, Color::Rgb(150, 90, 0)))
    }

    pub fn label(&self) -> Style {
        Style::default()
            .fg(self.pick(Color::Yellow, Color::Rgb(150, 90, 0)))
            .add_modifier(Modifier::BOLD)
    }

    pub fn value(&self) -> Style {
        self.assistant_text()
    }

    pub fn dim(&self) -> Style {
        Style::default().fg(self.pick(Color::DarkGray, Color::Gray))
    }

    pub fn system(&self) -> Style {
        Style::default().fg(self.pick(Color::Gray, Color::DarkGray))
    }

    pub fn error(&self) -> Style {
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
    }

    pub fn accent(&self) -> Style {
        Style::default()
            .fg(self.pick(Color::Cyan, Color::Blue))
            .add_modifier(Modifier::BOLD)
    }

    pub fn busy(&self) -> Style {
        Style::default().fg(self.pick(Color::Yellow, Color::Rgb(150, 90, 0)))
    }

    pub fn idle(&self) -> Style {
        Style::default().fg(Color::Green)
    }
}

/// `style` with bold added, for emphasised spans.
pub fn emphasis(style: Style) -> Style {
    style.add_modifier(Modifier::BOLD)
}
