use anyhow::{Context as _, Result};
use chrono::Local;
use eframe::egui::{self, Context as EguiContext, Key, TopBottomPanel};
use eframe::{App, Frame};
use tracing::info;

use crate::action_bar;
use crate::annotation::Tool;
use crate::canvas;
use crate::clipboard;
use crate::flatten;
use crate::state::{EditorState, SaveFormat};
use crate::theme;
use crate::toolbar;
use crate::ui_controls;

pub struct SnapInkApp {
    pub state: EditorState,
    theme: theme::AppTheme,
}

impl SnapInkApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let theme = theme::editor_theme();
        theme::apply_theme(&cc.egui_ctx, &theme);

        let mut state = EditorState::default();
        // Start from whatever image is already on the clipboard, if any.
        if let Ok(Some(rgba)) = clipboard::read_image_from_clipboard() {
            state.reset_for_new_image(&cc.egui_ctx, rgba);
        }

        Self { state, theme }
    }

    fn handle_shortcuts(&mut self, ctx: &EguiContext) {
        // The open text-edit session owns the keyboard; the canvas routes
        // those events itself.
        if self.state.tools.editing_text.is_some() {
            return;
        }

        let cmd = ctx.input(|input| input.modifiers.command || input.modifiers.ctrl);
        let shift = ctx.input(|input| input.modifiers.shift);

        if ctx.input(|input| input.key_pressed(Key::Escape)) {
            self.state.set_tool(Tool::Select);
        }

        if !cmd {
            let tool_keys = [
                (Key::V, Tool::Select),
                (Key::P, Tool::Pen),
                (Key::H, Tool::Highlighter),
                (Key::A, Tool::Arrow),
                (Key::R, Tool::Rectangle),
                (Key::E, Tool::Ellipse),
                (Key::T, Tool::Text),
                (Key::S, Tool::Step),
                (Key::B, Tool::Blur),
            ];
            for (key, tool) in tool_keys {
                if ctx.input(|input| input.key_pressed(key)) {
                    self.state.set_tool(tool);
                }
            }

            if ctx
                .input(|input| input.key_pressed(Key::Delete) || input.key_pressed(Key::Backspace))
            {
                self.state.delete_selected();
            }

            return;
        }

        if ctx.input(|input| input.key_pressed(Key::C)) {
            if let Err(err) = self.copy_to_clipboard(ctx) {
                show_error("Copy failed", &format!("{err:#}"));
            }
        }

        if ctx.input(|input| input.key_pressed(Key::S)) {
            if let Err(err) = self.save_to_file() {
                show_error("Save failed", &format!("{err:#}"));
            }
        }

        if ctx.input(|input| input.key_pressed(Key::V)) {
            self.paste_image(ctx);
        }

        if ctx.input(|input| input.key_pressed(Key::O)) {
            self.open_image(ctx);
        }

        if ctx.input(|input| input.key_pressed(Key::Z)) {
            if shift {
                self.state.redo();
            } else {
                self.state.undo();
            }
        }

        if ctx.input(|input| input.key_pressed(Key::Plus) || input.key_pressed(Key::Equals)) {
            self.state.zoom_in();
        }

        if ctx.input(|input| input.key_pressed(Key::Minus)) {
            self.state.zoom_out();
        }

        if ctx.input(|input| input.key_pressed(Key::Num0)) {
            self.state.fit_zoom_to_view = true;
        }
    }

    fn paste_image(&mut self, ctx: &EguiContext) {
        match clipboard::read_image_from_clipboard() {
            Ok(Some(rgba)) => {
                if self.state.image.is_some()
                    && !self.state.store.is_empty()
                    && self.state.has_unsaved_changes()
                {
                    let replace = rfd::MessageDialog::new()
                        .set_title("Replace current image")
                        .set_description("Replace the current image? Existing annotations will be lost.")
                        .set_buttons(rfd::MessageButtons::OkCancel)
                        .show();
                    if replace != rfd::MessageDialogResult::Ok {
                        return;
                    }
                }
                self.state.reset_for_new_image(ctx, rgba);
            }
            Ok(None) => {}
            Err(err) => show_error("Paste failed", &format!("Cannot paste image: {err:#}")),
        }
    }

    fn open_image(&mut self, ctx: &EguiContext) {
        let file = rfd::FileDialog::new()
            .set_title("Open image")
            .add_filter("Images", &["png", "jpg", "jpeg", "bmp", "webp"])
            .pick_file();
        let Some(path) = file else {
            return;
        };

        match image::open(&path) {
            Ok(dynamic) => {
                info!(path = %path.display(), "opened image");
                self.state.reset_for_new_image(ctx, dynamic.to_rgba8());
            }
            Err(err) => show_error(
                "Open failed",
                &format!("Cannot open {}: {err}", path.display()),
            ),
        }
    }

    fn copy_to_clipboard(&mut self, ctx: &EguiContext) -> Result<()> {
        let Some(image) = self.state.image.as_ref() else {
            return Ok(());
        };

        let flattened = flatten::flatten(
            &image.rgba,
            self.state.store.items(),
            self.state.options.blur_strength,
        )
        .context("flatten failed")?;
        let png = flatten::encode_png(&flattened)?;
        clipboard::write_png_to_clipboard(&png)?;

        self.state.exported = true;
        self.state.ui.copy_feedback_until = Some(ctx.input(|input| input.time) + 1.5);
        Ok(())
    }

    fn save_to_file(&mut self) -> Result<()> {
        let Some(image) = self.state.image.as_ref() else {
            return Ok(());
        };

        let format = self.state.settings.save_format;
        let default_name = format!(
            "Screenshot {}.{}",
            Local::now().format("%Y-%m-%d at %H.%M.%S"),
            format.extension()
        );

        let mut dialog = rfd::FileDialog::new()
            .set_title("Save annotated screenshot")
            .set_file_name(&default_name);
        dialog = match format {
            SaveFormat::Png => dialog
                .add_filter("PNG", &["png"])
                .add_filter("JPEG", &["jpg", "jpeg"]),
            SaveFormat::Jpeg => dialog
                .add_filter("JPEG", &["jpg", "jpeg"])
                .add_filter("PNG", &["png"]),
        };

        let Some(path) = dialog.save_file() else {
            return Ok(());
        };

        let flattened = flatten::flatten(
            &image.rgba,
            self.state.store.items(),
            self.state.options.blur_strength,
        )
        .context("flatten failed")?;

        let ext = path
            .extension()
            .and_then(|item| item.to_str())
            .unwrap_or(format.extension())
            .to_ascii_lowercase();

        let bytes = if ext == "jpg" || ext == "jpeg" {
            self.state.settings.save_format = SaveFormat::Jpeg;
            flatten::encode_jpeg(&flattened)?
        } else {
            self.state.settings.save_format = SaveFormat::Png;
            flatten::encode_png(&flattened)?
        };
        std::fs::write(&path, bytes)
            .with_context(|| format!("cannot write {}", path.display()))?;
        self.state.persist_options();

        self.state.exported = true;
        info!(path = %path.display(), "saved annotated image");
        Ok(())
    }
}

fn show_error(title: &str, message: &str) {
    rfd::MessageDialog::new()
        .set_level(rfd::MessageLevel::Error)
        .set_title(title)
        .set_description(message)
        .show();
}

impl App for SnapInkApp {
    fn update(&mut self, ctx: &EguiContext, _frame: &mut Frame) {
        self.handle_shortcuts(ctx);

        TopBottomPanel::top("toolbar")
            .exact_height(self.theme.layout.toolbar_height)
            .frame(ui_controls::toolbar_frame(&self.theme))
            .show(ctx, |ui| {
                let width_class = self.theme.width_class(ui.available_width());
                toolbar::show_toolbar(ui, &mut self.state, width_class);
            });

        let copied_feedback = self
            .state
            .ui
            .copy_feedback_until
            .is_some_and(|deadline| ctx.input(|input| input.time) <= deadline);

        let action_output = TopBottomPanel::bottom("action_bar")
            .exact_height(self.theme.layout.action_bar_height)
            .frame(ui_controls::action_bar_frame(&self.theme))
            .show(ctx, |ui| {
                let width_class = self.theme.width_class(ui.available_width());
                action_bar::show_action_bar(ui, &self.state, copied_feedback, width_class)
            })
            .inner;

        egui::CentralPanel::default()
            .frame(
                egui::Frame::none()
                    .fill(self.theme.surfaces.app_bg)
                    .inner_margin(egui::Margin::symmetric(
                        self.theme.layout.panel_padding_x,
                        self.theme.layout.panel_padding_y + 2.0,
                    )),
            )
            .show(ctx, |ui| {
                canvas::show_canvas(ui, ctx, &mut self.state);
            });

        if action_output.undo {
            self.state.undo();
        }
        if action_output.redo {
            self.state.redo();
        }
        if action_output.clear {
            self.state.clear_all();
        }
        if action_output.delete {
            self.state.delete_selected();
        }
        if action_output.zoom_in {
            self.state.zoom_in();
        }
        if action_output.zoom_out {
            self.state.zoom_out();
        }
        if action_output.copy {
            if let Err(err) = self.copy_to_clipboard(ctx) {
                show_error("Copy failed", &format!("{err:#}"));
            }
        }
        if action_output.save {
            if let Err(err) = self.save_to_file() {
                show_error("Save failed", &format!("{err:#}"));
            }
        }
    }
}
