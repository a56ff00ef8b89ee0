use egui::{
    vec2, Align2, Color32, Context, Event, FontId, Key, Pos2, Rect, ScrollArea, Sense, Shape,
    Stroke, Ui,
};

use crate::coords::CanvasView;
use crate::render::{self, SceneOverlay, SceneTextures};
use crate::state::EditorState;
use crate::theme;

pub fn show_canvas(ui: &mut Ui, ctx: &Context, state: &mut EditorState) {
    let (texture_id, image_size) = match state.image.as_mut() {
        Some(image) => {
            image.ensure_texture(ctx);
            let Some(texture) = image.texture.as_ref() else {
                return;
            };
            (texture.id(), image.size_vec2())
        }
        None => {
            empty_canvas(ui);
            return;
        }
    };

    let available = ui.available_size();
    if state.fit_zoom_to_view {
        state.set_fit_zoom(image_size, available - vec2(48.0, 48.0));
        state.fit_zoom_to_view = false;
    }

    let scaled = image_size * state.zoom;
    let canvas_size = vec2(
        (scaled.x + 48.0).max(available.x),
        (scaled.y + 48.0).max(available.y),
    );

    ScrollArea::both()
        .id_source("snapink_canvas_scroll")
        .show(ui, |ui| {
            let (canvas_rect, response) =
                ui.allocate_exact_size(canvas_size, Sense::click_and_drag());

            let origin = Pos2::new(
                canvas_rect.center().x - scaled.x * 0.5,
                canvas_rect.center().y - scaled.y * 0.5,
            );
            let image_rect = Rect::from_min_size(origin, scaled);
            let view = CanvasView::new(image_rect, image_size, egui::Vec2::ZERO);

            let painter = ui.painter_at(canvas_rect);
            draw_canvas_background(&painter, canvas_rect);
            let image_card = image_rect.expand(14.0);
            painter.rect_filled(
                image_card,
                18.0,
                Color32::from_rgba_unmultiplied(24, 28, 35, 190),
            );
            painter.rect_stroke(
                image_card,
                18.0,
                Stroke::new(1.0, Color32::from_rgba_unmultiplied(255, 255, 255, 38)),
            );

            let blurred = if state.needs_blur_texture() {
                state.image.as_ref().map(|image| {
                    state
                        .compositor
                        .texture(ctx, &image.rgba, state.options.blur_strength)
                })
            } else {
                None
            };

            handle_pointer_interaction(ctx, state, &response, &view);
            handle_text_editing(ctx, state);

            let now = ui.input(|input| input.time);
            let live_spot = if state.tools.is_drawing() {
                state
                    .store
                    .items()
                    .last()
                    .filter(|annotation| annotation.is_spot_blur())
                    .map(|annotation| (annotation.id, state.tools.spot_committed_points()))
            } else {
                None
            };
            let overlay = SceneOverlay {
                selection: state.tools.selection,
                editing_text: state.tools.editing_text,
                live_spot,
                now,
            };
            render::draw_scene(
                &painter,
                &view,
                state.store.items(),
                SceneTextures {
                    base: texture_id,
                    blurred,
                },
                &overlay,
            );

            draw_gesture_previews(&painter, state, &view, now);

            // Keep the caret blinking while an edit session is open.
            if state.tools.editing_text.is_some() {
                ctx.request_repaint_after(std::time::Duration::from_millis(100));
            }
        });
}

fn empty_canvas(ui: &mut Ui) {
    let theme = theme::editor_theme();
    let (rect, _) = ui.allocate_exact_size(ui.available_size(), Sense::hover());
    let painter = ui.painter_at(rect);
    painter.rect_filled(rect, 16.0, theme.surfaces.canvas_bg);
    painter.rect_stroke(rect, 16.0, Stroke::new(1.0, theme.surfaces.stroke_soft));
    painter.text(
        rect.center(),
        Align2::CENTER_CENTER,
        "Paste an image (Cmd+V) or open one (Cmd+O)",
        FontId::proportional(19.0),
        theme.text.secondary,
    );
}

fn draw_canvas_background(painter: &egui::Painter, rect: Rect) {
    let theme = theme::editor_theme();
    painter.rect_filled(rect, 16.0, theme.surfaces.canvas_bg);
}

fn handle_pointer_interaction(
    ctx: &Context,
    state: &mut EditorState,
    response: &egui::Response,
    view: &CanvasView,
) {
    let now = ctx.input(|input| input.time);
    let pointer = ctx.input(|input| input.pointer.clone());

    // Pointer leaving the canvas mid-gesture counts as pointer-up at the
    // last recorded point.
    if state.tools.is_drawing() && pointer.latest_pos().is_none() {
        let depth_before = state.store.history_depth();
        state.tools.cancel(&mut state.store, &state.options);
        if state.store.history_depth() != depth_before {
            state.mark_changed();
        }
        return;
    }

    let Some(pointer_pos) = pointer.interact_pos() else {
        return;
    };
    let image_pos = view.to_image_clamped(pointer_pos);
    let depth_before = state.store.history_depth();

    if pointer.primary_pressed() && response.hovered() && view.screen_rect.contains(pointer_pos) {
        state.tools.pointer_down(
            &mut state.store,
            state.active_tool,
            &state.options,
            image_pos,
            now,
        );
    } else if state.tools.is_drawing() {
        if pointer.primary_released() {
            state
                .tools
                .pointer_up(&mut state.store, image_pos, &state.options);
        } else if pointer.primary_down() {
            state.tools.pointer_move(&mut state.store, image_pos, now);
        }
    }

    if state.store.history_depth() != depth_before {
        state.mark_changed();
    }
}

/// Routes keyboard input to the open text-edit session. Printable input
/// appends, Backspace deletes, Enter or Escape finishes.
fn handle_text_editing(ctx: &Context, state: &mut EditorState) {
    if state.tools.editing_text.is_none() {
        return;
    }
    let events = ctx.input(|input| input.events.clone());
    let depth_before = state.store.history_depth();
    for event in events {
        match event {
            Event::Text(text) => state.tools.text_insert(&mut state.store, &text),
            Event::Key {
                key: Key::Backspace,
                pressed: true,
                ..
            } => state.tools.text_backspace(&mut state.store),
            Event::Key {
                key: Key::Enter | Key::Escape,
                pressed: true,
                ..
            } => state.tools.finish_text_edit(&mut state.store),
            _ => {}
        }
        if state.tools.editing_text.is_none() {
            break;
        }
    }
    if state.store.history_depth() != depth_before {
        state.mark_changed();
    }
}

fn draw_gesture_previews(painter: &egui::Painter, state: &EditorState, view: &CanvasView, now: f64) {
    if let Some(preview) = state.tools.shape_preview(&state.options) {
        render::draw_annotation(painter, &preview, view, true, false, now);
    }
    if let Some(rect) = state.tools.drag_rect_preview() {
        let screen = view.to_screen_rect(rect);
        let stroke = Stroke::new(1.5, Color32::from_rgba_unmultiplied(0, 100, 255, 178));
        let corners = [
            screen.left_top(),
            screen.right_top(),
            screen.right_bottom(),
            screen.left_bottom(),
            screen.left_top(),
        ];
        painter.extend(Shape::dashed_line(&corners, stroke, 4.0, 4.0));
    }
}
