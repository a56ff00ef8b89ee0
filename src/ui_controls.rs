use egui::{vec2, Color32, Frame, Margin, Response, RichText, Rounding, Sense, Stroke, Ui, Vec2};

use crate::theme::AppTheme;

pub fn toolbar_frame(theme: &AppTheme) -> Frame {
    panel_frame(theme, theme.layout.panel_padding_y)
}

pub fn action_bar_frame(theme: &AppTheme) -> Frame {
    let vertical_padding = ((theme.layout.action_bar_height - theme.controls.action_height) * 0.5)
        .round()
        .max(theme.layout.space_1);
    panel_frame(theme, vertical_padding)
}

fn panel_frame(theme: &AppTheme, vertical_padding: f32) -> Frame {
    Frame::none()
        .fill(theme.surfaces.panel_bg)
        .rounding(Rounding::ZERO)
        .inner_margin(Margin::symmetric(
            theme.layout.panel_padding_x,
            vertical_padding,
        ))
}

/// Shared base for the selectable chip family: accent fill plus a ring when
/// selected, flat card fill otherwise.
fn selectable_chip(
    ui: &mut Ui,
    theme: &AppTheme,
    label: RichText,
    min_size: Vec2,
    rounding: f32,
    selected: bool,
    ring: Color32,
) -> Response {
    let mut button = egui::Button::new(label)
        .min_size(min_size)
        .rounding(Rounding::same(rounding));
    button = if selected {
        button
            .fill(theme.surfaces.accent_soft)
            .stroke(Stroke::new(1.0, ring))
    } else {
        button.fill(theme.surfaces.card_bg_alt)
    };
    ui.add(button)
}

pub fn tool_chip(ui: &mut Ui, theme: &AppTheme, label: &str, selected: bool) -> Response {
    selectable_chip(
        ui,
        theme,
        RichText::new(label).size(theme.controls.toolbar_icon_size),
        vec2(theme.layout.chip_w_tool, theme.layout.chip_h),
        theme.controls.chip_rounding,
        selected,
        theme.shadows.focus_ring,
    )
}

pub fn segmented(ui: &mut Ui, theme: &AppTheme, label: &str, selected: bool) -> Response {
    selectable_chip(
        ui,
        theme,
        RichText::new(label).size(14.0),
        vec2(theme.layout.chip_w_segment, theme.layout.chip_h),
        theme.controls.button_rounding,
        selected,
        theme.surfaces.accent,
    )
}

pub fn color_chip(ui: &mut Ui, theme: &AppTheme, color: Color32, selected: bool) -> Response {
    let diameter = theme.layout.chip_h - 6.0;
    let ring = if selected {
        Stroke::new(2.0, theme.shadows.focus_ring)
    } else {
        Stroke::new(1.0, theme.surfaces.stroke_soft)
    };
    ui.add(
        egui::Button::new("")
            .min_size(Vec2::splat(diameter))
            .fill(color)
            .stroke(ring)
            .rounding(Rounding::same(diameter * 0.5)),
    )
}

pub fn primary_button(ui: &mut Ui, theme: &AppTheme, label: &str, min_size: Vec2) -> Response {
    ui.add(
        egui::Button::new(RichText::new(label).strong().color(theme.text.primary))
            .min_size(min_size)
            .fill(theme.surfaces.accent_soft)
            .stroke(Stroke::new(1.0, theme.surfaces.accent))
            .rounding(Rounding::same(theme.controls.button_rounding)),
    )
}

pub fn ghost_button(ui: &mut Ui, theme: &AppTheme, label: &str, min_size: Vec2) -> Response {
    ui.add(
        egui::Button::new(RichText::new(label).color(theme.text.secondary))
            .min_size(min_size)
            .fill(theme.surfaces.card_bg_alt)
            .stroke(Stroke::new(1.0, theme.surfaces.stroke_soft))
            .rounding(Rounding::same(theme.controls.button_rounding)),
    )
}

pub fn subtle_badge(ui: &mut Ui, theme: &AppTheme, text: &str) {
    let accent = theme.surfaces.accent;
    Frame::none()
        .fill(Color32::from_rgba_unmultiplied(
            accent.r(),
            accent.g(),
            accent.b(),
            34,
        ))
        .rounding(Rounding::same(10.0))
        .stroke(Stroke::new(1.0, theme.surfaces.accent_soft))
        .inner_margin(Margin::symmetric(theme.layout.space_2, theme.layout.space_1))
        .show(ui, |ui| {
            ui.label(
                RichText::new(text)
                    .size(12.0)
                    .color(theme.text.accent)
                    .strong(),
            );
        });
}

pub fn vertical_divider(ui: &mut Ui, theme: &AppTheme, height: f32) {
    let (rect, _) = ui.allocate_exact_size(vec2(1.0, height), Sense::hover());
    ui.painter().line_segment(
        [rect.center_top(), rect.center_bottom()],
        Stroke::new(1.0, theme.surfaces.stroke_soft),
    );
}

pub fn keycap(ui: &mut Ui, theme: &AppTheme, label: &str) {
    Frame::none()
        .fill(theme.surfaces.card_bg)
        .stroke(Stroke::new(1.0, theme.surfaces.stroke_strong))
        .rounding(Rounding::same(5.0))
        .inner_margin(Margin::symmetric(6.0, 2.0))
        .show(ui, |ui| {
            ui.label(
                RichText::new(label)
                    .size(11.0)
                    .strong()
                    .color(theme.text.secondary),
            );
        });
}
