use egui::{vec2, Align, Align2, Color32, FontId, Layout, Pos2, Rect, RichText, Shape, Stroke, Ui};

use crate::annotation::{BlurMode, MarkSize, Tool};
use crate::state::EditorState;
use crate::theme::{self, WidthClass};
use crate::ui_controls;

const PALETTE: [[u8; 4]; 8] = [
    [0xE5, 0x3E, 0x3E, 0xFF],
    [0xDD, 0x6B, 0x20, 0xFF],
    [0xD6, 0x9E, 0x2E, 0xFF],
    [0x38, 0xA1, 0x69, 0xFF],
    [0x31, 0x82, 0xCE, 0xFF],
    [0x80, 0x5A, 0xD5, 0xFF],
    [0xFF, 0xFF, 0xFF, 0xFF],
    [0x1A, 0x20, 0x2C, 0xFF],
];

#[derive(Clone, Copy, Debug)]
pub struct ToolbarPlan {
    pub visible_color_count: usize,
    pub show_size_inline: bool,
    pub show_blur_inline: bool,
    pub show_overflow: bool,
}

pub fn plan_toolbar_items(width_class: WidthClass, state: &EditorState) -> ToolbarPlan {
    let needs_blur_controls = state.active_tool == Tool::Blur;
    let visible_color_count = match width_class {
        WidthClass::Compact => 4,
        WidthClass::Regular => 6,
        WidthClass::Wide => PALETTE.len(),
    };
    let show_size_inline = width_class != WidthClass::Compact;
    let show_blur_inline = needs_blur_controls && width_class != WidthClass::Compact;

    let hidden_for_overflow = visible_color_count < PALETTE.len()
        || !show_size_inline
        || (needs_blur_controls && !show_blur_inline);

    ToolbarPlan {
        visible_color_count,
        show_size_inline,
        show_blur_inline,
        show_overflow: hidden_for_overflow,
    }
}

pub fn show_toolbar(ui: &mut Ui, state: &mut EditorState, width_class: WidthClass) {
    let theme = theme::editor_theme();
    let plan = plan_toolbar_items(width_class, state);

    ui.with_layout(Layout::left_to_right(Align::Center), |ui| {
        ui.spacing_mut().interact_size.y = theme.layout.chip_h;
        ui.spacing_mut().button_padding.y = theme.layout.space_1;
        ui.spacing_mut().item_spacing = vec2(theme.layout.control_gap, 0.0);

        render_tool_group(ui, state);

        if plan.visible_color_count > 0 && tool_uses_color(state.active_tool) {
            group_separator(ui, &theme);
            render_palette_group(ui, state, &theme, plan.visible_color_count);
        }

        if plan.show_size_inline && tool_uses_size(state.active_tool) {
            group_separator(ui, &theme);
            ui.label(RichText::new("Size").color(theme.text.muted).size(12.0));
            for size in [MarkSize::S, MarkSize::M, MarkSize::L] {
                size_button(ui, state, size);
            }
        }

        if plan.show_blur_inline {
            group_separator(ui, &theme);
            render_blur_controls(ui, state, &theme);
        }

        ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
            if plan.show_overflow {
                ui.menu_button("…", |ui| {
                    ui.spacing_mut().item_spacing =
                        vec2(theme.layout.control_gap, theme.layout.space_2);

                    if plan.visible_color_count < PALETTE.len() && tool_uses_color(state.active_tool)
                    {
                        ui.label(RichText::new("Colors").color(theme.text.muted).size(12.0));
                        ui.horizontal_wrapped(|ui| {
                            ui.spacing_mut().item_spacing =
                                vec2(theme.layout.control_gap, theme.layout.space_1);
                            for color in PALETTE.iter().skip(plan.visible_color_count) {
                                let color32 = Color32::from_rgba_unmultiplied(
                                    color[0], color[1], color[2], color[3],
                                );
                                let selected = active_color(state) == *color;
                                if ui_controls::color_chip(ui, &theme, color32, selected)
                                    .on_hover_text("Choose color")
                                    .clicked()
                                {
                                    set_active_color(state, *color);
                                    ui.close_menu();
                                }
                            }
                        });
                    }

                    if !plan.show_size_inline && tool_uses_size(state.active_tool) {
                        ui.separator();
                        ui.label(RichText::new("Size").color(theme.text.muted).size(12.0));
                        ui.horizontal(|ui| {
                            for size in [MarkSize::S, MarkSize::M, MarkSize::L] {
                                size_button(ui, state, size);
                            }
                        });
                    }

                    if state.active_tool == Tool::Blur && !plan.show_blur_inline {
                        ui.separator();
                        render_blur_controls(ui, state, &theme);
                    }
                });
            }
        });
    });
}

fn tool_uses_color(tool: Tool) -> bool {
    !matches!(tool, Tool::Select | Tool::Blur)
}

fn tool_uses_size(tool: Tool) -> bool {
    !matches!(tool, Tool::Select)
}

fn active_color(state: &EditorState) -> [u8; 4] {
    match state.active_tool {
        Tool::Highlighter => state.options.highlighter_color,
        Tool::Text => state.options.text_color,
        Tool::Step => state.options.step_color,
        _ => state.options.pen_color,
    }
}

fn set_active_color(state: &mut EditorState, color: [u8; 4]) {
    match state.active_tool {
        Tool::Highlighter => state.options.highlighter_color = color,
        Tool::Text => state.options.text_color = color,
        Tool::Step => state.options.step_color = color,
        _ => state.options.pen_color = color,
    }
    state.persist_options();
}

fn active_size(state: &EditorState) -> MarkSize {
    match state.active_tool {
        Tool::Highlighter => state.options.highlighter_size,
        Tool::Text => state.options.text_size,
        Tool::Step => state.options.step_size,
        _ => state.options.pen_size,
    }
}

fn set_active_size(state: &mut EditorState, size: MarkSize) {
    match state.active_tool {
        Tool::Highlighter => state.options.highlighter_size = size,
        Tool::Text => state.options.text_size = size,
        Tool::Step => state.options.step_size = size,
        _ => state.options.pen_size = size,
    }
    state.persist_options();
}

fn render_tool_group(ui: &mut Ui, state: &mut EditorState) {
    tool_button(ui, state, Tool::Select, "Select (V / Esc)");
    tool_button(ui, state, Tool::Pen, "Pen (P)");
    tool_button(ui, state, Tool::Highlighter, "Highlighter (H)");
    tool_button(ui, state, Tool::Arrow, "Arrow (A)");
    tool_button(ui, state, Tool::Rectangle, "Rectangle (R)");
    tool_button(ui, state, Tool::Ellipse, "Ellipse (E)");
    tool_button(ui, state, Tool::Text, "Text (T)");
    tool_button(ui, state, Tool::Step, "Step marker (S)");
    tool_button(ui, state, Tool::Blur, "Blur (B)");
}

fn render_palette_group(
    ui: &mut Ui,
    state: &mut EditorState,
    theme: &theme::AppTheme,
    count: usize,
) {
    for color in PALETTE.iter().take(count) {
        let color32 = Color32::from_rgba_unmultiplied(color[0], color[1], color[2], color[3]);
        let selected = active_color(state) == *color;
        if ui_controls::color_chip(ui, theme, color32, selected)
            .on_hover_text("Choose color")
            .clicked()
        {
            set_active_color(state, *color);
        }
    }
}

fn render_blur_controls(ui: &mut Ui, state: &mut EditorState, theme: &theme::AppTheme) {
    ui.label(RichText::new("Blur").color(theme.text.muted).size(12.0));
    for (mode, label, hint) in [
        (BlurMode::Spot, "Spot", "Brush blurred patches"),
        (BlurMode::Focus, "Focus", "Blur everything outside drawn windows"),
    ] {
        if ui_controls::segmented(ui, theme, label, state.options.blur_mode == mode)
            .on_hover_text(hint)
            .clicked()
        {
            state.options.blur_mode = mode;
            state.persist_options();
        }
    }
    let mut strength = state.options.blur_strength;
    ui.add_space(theme.layout.space_2);
    if ui
        .add(egui::Slider::new(&mut strength, 1.0..=15.0).show_value(false))
        .on_hover_text("Blur strength")
        .changed()
    {
        state.set_blur_strength(strength);
    }
}

fn group_separator(ui: &mut Ui, theme: &theme::AppTheme) {
    ui.separator();
    let extra = (theme.layout.group_gap - theme.layout.control_gap).max(0.0);
    if extra > 0.0 {
        ui.add_space(extra);
    }
}

fn tool_button(ui: &mut Ui, state: &mut EditorState, tool: Tool, hint: &str) {
    let theme = theme::editor_theme();
    let selected = state.active_tool == tool;
    let response = ui_controls::tool_chip(ui, &theme, "", selected).on_hover_text(hint);
    draw_tool_icon(ui, response.rect, tool, selected);
    if response.clicked() {
        state.set_tool(tool);
    }
}

fn draw_tool_icon(ui: &Ui, rect: Rect, tool: Tool, selected: bool) {
    let theme = theme::editor_theme();
    let color = if selected {
        theme.text.primary
    } else {
        theme.text.secondary
    };
    let stroke = Stroke::new(1.65, color);
    let painter = ui.painter();
    let icon_rect = rect.shrink2(vec2(8.0, 5.0));

    match tool {
        Tool::Select => {
            let tip = Pos2::new(icon_rect.left() + 2.0, icon_rect.top() + 1.0);
            let base = Pos2::new(icon_rect.left() + 8.6, icon_rect.bottom() - 1.6);
            let inner = Pos2::new(icon_rect.left() + 10.8, icon_rect.center().y + 1.8);
            let wing = Pos2::new(icon_rect.right() - 1.8, icon_rect.center().y - 0.6);
            painter.add(Shape::convex_polygon(
                vec![tip, base, inner, wing],
                Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), 40),
                Stroke::NONE,
            ));
            painter.line_segment([tip, base], stroke);
            painter.line_segment([base, inner], stroke);
            painter.line_segment([inner, wing], stroke);
            painter.line_segment([wing, tip], stroke);
        }
        Tool::Pen => {
            let from = Pos2::new(icon_rect.left() + 1.5, icon_rect.bottom() - 1.5);
            let to = Pos2::new(icon_rect.right() - 2.0, icon_rect.top() + 2.0);
            painter.line_segment([from, to], stroke);
            painter.circle_filled(from, 1.6, color);
        }
        Tool::Highlighter => {
            let y = icon_rect.center().y;
            painter.line_segment(
                [
                    Pos2::new(icon_rect.left() + 1.0, y),
                    Pos2::new(icon_rect.right() - 1.0, y),
                ],
                Stroke::new(
                    6.0,
                    Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), 110),
                ),
            );
        }
        Tool::Arrow => {
            let y = icon_rect.center().y + 0.5;
            let start = Pos2::new(icon_rect.left() + 2.0, y);
            let tip = Pos2::new(icon_rect.right() - 2.0, y);
            painter.line_segment([start, tip], stroke);
            painter.add(Shape::convex_polygon(
                vec![
                    tip,
                    Pos2::new(tip.x - 6.0, tip.y - 4.5),
                    Pos2::new(tip.x - 6.0, tip.y + 4.5),
                ],
                color,
                Stroke::NONE,
            ));
        }
        Tool::Rectangle => {
            let r = icon_rect.shrink2(vec2(2.0, 3.0));
            painter.rect_stroke(r, 2.5, stroke);
        }
        Tool::Ellipse => {
            let radius = icon_rect.width().min(icon_rect.height()) * 0.40;
            painter.circle_stroke(icon_rect.center(), radius, stroke);
        }
        Tool::Text => {
            painter.text(
                icon_rect.center(),
                Align2::CENTER_CENTER,
                "T",
                FontId::proportional(14.5),
                color,
            );
        }
        Tool::Step => {
            let radius = icon_rect.width().min(icon_rect.height()) * 0.42;
            painter.circle_filled(icon_rect.center(), radius, color);
            painter.text(
                icon_rect.center(),
                Align2::CENTER_CENTER,
                "1",
                FontId::proportional(10.0),
                theme.surfaces.panel_bg,
            );
        }
        Tool::Blur => {
            // Droplet of dots.
            for (dx, dy) in [(-3.0, 0.0), (0.0, -3.0), (3.0, 0.0), (0.0, 3.0), (0.0, 0.0)] {
                painter.circle_filled(icon_rect.center() + vec2(dx, dy), 1.4, color);
            }
        }
    }
}

fn size_button(ui: &mut Ui, state: &mut EditorState, size: MarkSize) {
    let theme = theme::editor_theme();
    if ui_controls::segmented(ui, &theme, size.label(), active_size(state) == size)
        .on_hover_text(format!("Size {}", size.label()))
        .clicked()
    {
        set_active_size(state, size);
    }
}

#[cfg(test)]
mod tests {
    use super::plan_toolbar_items;
    use crate::annotation::Tool;
    use crate::state::EditorState;
    use crate::theme::WidthClass;

    #[test]
    fn compact_layout_moves_blur_controls_to_overflow() {
        let mut state = EditorState::default();
        state.active_tool = Tool::Blur;
        let plan = plan_toolbar_items(WidthClass::Compact, &state);

        assert!(plan.show_overflow);
        assert!(!plan.show_size_inline);
        assert!(!plan.show_blur_inline);
    }

    #[test]
    fn wide_layout_shows_full_palette() {
        let state = EditorState::default();
        let plan = plan_toolbar_items(WidthClass::Wide, &state);
        assert_eq!(plan.visible_color_count, super::PALETTE.len());
        assert!(!plan.show_overflow);
    }
}
