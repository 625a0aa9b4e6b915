use eframe::egui::{self, Color32, CornerRadius, FontId, Frame, Margin, Stroke, TextStyle};

#[derive(Debug, Clone)]
pub struct Theme {
    pub page: Color32,
    pub surface: Color32,
    pub border: Color32,
    pub divider: Color32,
    pub accent: Color32,
    pub danger: Color32,
    pub text_primary: Color32,
    pub text_muted: Color32,
    pub badge_fill: Color32,
    pub badge_text: Color32,
    pub counter_fill: Color32,
    pub user_bubble: Color32,
    pub bot_bubble: Color32,
    pub spacing_4: f32,
    pub spacing_8: f32,
    pub spacing_12: f32,
    pub radius_4: u8,
    pub radius_8: u8,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            page: Color32::from_rgb(0xF3, 0xF4, 0xF6),
            surface: Color32::WHITE,
            border: Color32::from_rgb(0xD1, 0xD5, 0xDB),
            divider: Color32::from_rgb(0xE5, 0xE7, 0xEB),
            accent: Color32::from_rgb(0x25, 0x63, 0xEB),
            danger: Color32::from_rgb(0xEF, 0x44, 0x44),
            text_primary: Color32::from_rgb(0x11, 0x18, 0x27),
            text_muted: Color32::from_rgb(0x6B, 0x72, 0x80),
            badge_fill: Color32::from_rgb(0x1F, 0x29, 0x37),
            badge_text: Color32::WHITE,
            counter_fill: Color32::from_rgb(0xF3, 0xF4, 0xF6),
            user_bubble: Color32::from_rgb(0xDB, 0xEA, 0xFE),
            bot_bubble: Color32::from_rgb(0xF9, 0xFA, 0xFB),
            spacing_4: 4.0,
            spacing_8: 8.0,
            spacing_12: 12.0,
            radius_4: 4,
            radius_8: 8,
        }
    }
}

impl Theme {
    pub fn apply_visuals(&self, ctx: &egui::Context) {
        let mut visuals = egui::Visuals::light();
        visuals.panel_fill = self.page;
        visuals.window_fill = self.surface;
        visuals.override_text_color = Some(self.text_primary);
        visuals.hyperlink_color = self.accent;
        visuals.selection.bg_fill = self.accent.gamma_multiply(0.35);
        visuals.widgets.inactive.bg_stroke = Stroke::new(1.0, self.divider);
        visuals.widgets.hovered.bg_stroke = Stroke::new(1.0, self.border);
        visuals.widgets.active.bg_stroke = Stroke::new(1.0, self.accent);

        let mut style = (*ctx.style()).clone();
        style.visuals = visuals;
        style.spacing.item_spacing = egui::vec2(6.0, 6.0);
        style.spacing.button_padding = egui::vec2(8.0, 4.0);
        style.text_styles.insert(TextStyle::Heading, FontId::proportional(22.0));
        style.text_styles.insert(TextStyle::Body, FontId::proportional(13.0));
        style.text_styles.insert(TextStyle::Button, FontId::proportional(12.0));
        style.text_styles.insert(TextStyle::Small, FontId::proportional(11.0));
        ctx.set_style(style);
    }

    pub fn section_fill(&self, section_id: &str) -> Color32 {
        match section_id {
            "problem" => Color32::from_rgb(0xFF, 0xF7, 0xED),
            "solution" => Color32::from_rgb(0xEF, 0xF6, 0xFF),
            "unique-value-proposition" => Color32::from_rgb(0xFE, 0xFC, 0xE8),
            "unfair-advantage" => Color32::from_rgb(0xFA, 0xF5, 0xFF),
            "customer-segments" => Color32::from_rgb(0xEE, 0xF2, 0xFF),
            "key-metrics" => Color32::from_rgb(0xF0, 0xFD, 0xFA),
            "channels" => Color32::from_rgb(0xEC, 0xFE, 0xFF),
            "cost-structure" => Color32::from_rgb(0xFE, 0xF2, 0xF2),
            "revenue-streams" => Color32::from_rgb(0xF0, 0xFD, 0xF4),
            _ => self.surface,
        }
    }

    pub fn section_frame(&self, section_id: &str) -> Frame {
        Frame::new()
            .fill(self.section_fill(section_id))
            .inner_margin(Margin::same(self.spacing_12 as i8))
            .stroke(Stroke::new(2.0, self.border))
    }

    pub fn card_frame(&self) -> Frame {
        Frame::new()
            .fill(self.surface)
            .inner_margin(Margin::same(self.spacing_12 as i8))
            .corner_radius(CornerRadius::same(self.radius_8))
            .stroke(Stroke::NONE)
            .shadow(egui::epaint::Shadow {
                offset: [0, 4],
                blur: 12,
                spread: 0,
                color: Color32::from_rgba_premultiplied(0, 0, 0, 24),
            })
    }

    pub fn bubble_frame(&self, fill: Color32) -> Frame {
        Frame::new()
            .fill(fill)
            .inner_margin(Margin::symmetric(self.spacing_8 as i8, self.spacing_4 as i8))
            .corner_radius(CornerRadius::same(self.radius_8))
    }

    pub fn chip_frame(&self, fill: Color32) -> Frame {
        Frame::new()
            .fill(fill)
            .inner_margin(Margin::symmetric(6, 2))
            .corner_radius(CornerRadius::same(self.radius_4))
    }
}
