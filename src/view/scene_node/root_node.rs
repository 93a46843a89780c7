use crate::style::Color;

/// State specific to the scene root.
#[derive(Debug, Clone, PartialEq)]
pub struct RootNode {
    pub(crate) clear_color: Color,
}

impl RootNode {
    pub(crate) fn new(clear_color: Color) -> Self {
        Self { clear_color }
    }

    pub fn clear_color(&self) -> Color {
        self.clear_color
    }

    /// Color the frame is cleared with. A non-transparent root background replaces the
    /// configured clear color.
    pub fn effective_clear_color(&self, background: Color) -> Color {
        if background.is_transparent() {
            self.clear_color
        } else {
            background
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RootNode;
    use crate::style::Color;

    #[test]
    fn background_overrides_clear_color() {
        let root = RootNode::new(Color::BLACK);
        assert_eq!(root.effective_clear_color(Color::TRANSPARENT), Color::BLACK);
        let red = Color::rgb(255, 0, 0);
        assert_eq!(root.effective_clear_color(red), red);
    }
}
