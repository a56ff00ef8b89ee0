use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use egui::{ColorImage, Context as EguiContext, TextureHandle, TextureOptions, Vec2};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::annotation::{BlurMode, MarkSize, Tool};
use crate::blur::BlurCompositor;
use crate::store::AnnotationStore;
use crate::tools::{ToolController, ToolOptions};

pub const ZOOM_STEPS: &[f32] = &[0.25, 0.33, 0.5, 0.67, 0.75, 1.0, 1.5, 2.0, 3.0, 4.0];

#[derive(Default)]
pub struct AppUiFlags {
    pub copy_feedback_until: Option<f64>,
}

pub struct EditorImage {
    pub rgba: RgbaImage,
    pub texture: Option<TextureHandle>,
}

impl EditorImage {
    pub fn new(rgba: RgbaImage) -> Self {
        Self {
            rgba,
            texture: None,
        }
    }

    pub fn size_vec2(&self) -> Vec2 {
        Vec2::new(self.rgba.width() as f32, self.rgba.height() as f32)
    }

    pub fn ensure_texture(&mut self, ctx: &EguiContext) {
        if self.texture.is_some() {
            return;
        }
        let size = [self.rgba.width() as usize, self.rgba.height() as usize];
        let color = ColorImage::from_rgba_unmultiplied(size, self.rgba.as_raw());
        let texture = ctx.load_texture("screenshot", color, TextureOptions::LINEAR);
        self.texture = Some(texture);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaveFormat {
    Png,
    Jpeg,
}

impl SaveFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub pen_color: [u8; 4],
    pub pen_size: MarkSize,
    pub highlighter_color: [u8; 4],
    pub highlighter_size: MarkSize,
    pub text_color: [u8; 4],
    pub text_size: MarkSize,
    pub step_color: [u8; 4],
    pub step_size: MarkSize,
    pub blur_mode: BlurMode,
    pub blur_strength: f32,
    pub save_format: SaveFormat,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            pen_color: [255, 0, 0, 255],
            pen_size: MarkSize::M,
            highlighter_color: [255, 235, 59, 255],
            highlighter_size: MarkSize::M,
            text_color: [255, 0, 0, 255],
            text_size: MarkSize::M,
            step_color: [255, 0, 0, 255],
            step_size: MarkSize::M,
            blur_mode: BlurMode::Spot,
            blur_strength: 5.0,
            save_format: SaveFormat::Png,
        }
    }
}

impl UserSettings {
    pub fn to_options(&self) -> ToolOptions {
        ToolOptions {
            pen_color: self.pen_color,
            pen_size: self.pen_size,
            highlighter_color: self.highlighter_color,
            highlighter_size: self.highlighter_size,
            text_color: self.text_color,
            text_size: self.text_size,
            step_color: self.step_color,
            step_size: self.step_size,
            blur_mode: self.blur_mode,
            blur_strength: self.blur_strength,
        }
    }

    pub fn capture_options(&mut self, options: &ToolOptions) {
        self.pen_color = options.pen_color;
        self.pen_size = options.pen_size;
        self.highlighter_color = options.highlighter_color;
        self.highlighter_size = options.highlighter_size;
        self.text_color = options.text_color;
        self.text_size = options.text_size;
        self.step_color = options.step_color;
        self.step_size = options.step_size;
        self.blur_mode = options.blur_mode;
        self.blur_strength = options.blur_strength;
    }

    fn file_path() -> Option<PathBuf> {
        let dirs = ProjectDirs::from("com", "snapink", "snapink")?;
        let config_dir = dirs.config_dir();
        std::fs::create_dir_all(config_dir).ok()?;
        Some(config_dir.join("settings.json"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::file_path().context("cannot resolve settings path")?;
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::file_path().context("cannot resolve settings path")?;
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

pub struct EditorState {
    pub image: Option<EditorImage>,
    pub store: AnnotationStore,
    pub tools: ToolController,
    pub options: ToolOptions,
    pub active_tool: Tool,
    pub compositor: BlurCompositor,
    pub zoom: f32,
    pub fit_zoom_to_view: bool,
    pub exported: bool,
    pub has_edited: bool,
    pub settings: UserSettings,
    pub ui: AppUiFlags,
}

impl Default for EditorState {
    fn default() -> Self {
        let settings = UserSettings::load().unwrap_or_default();
        Self {
            image: None,
            store: AnnotationStore::default(),
            tools: ToolController::default(),
            options: settings.to_options(),
            active_tool: Tool::Pen,
            compositor: BlurCompositor::default(),
            zoom: 1.0,
            fit_zoom_to_view: true,
            exported: false,
            has_edited: false,
            settings,
            ui: AppUiFlags::default(),
        }
    }
}

impl EditorState {
    pub fn mark_changed(&mut self) {
        self.has_edited = true;
        self.exported = false;
    }

    /// Edits made since the last copy or save. Gates the replace-image
    /// confirmation on paste.
    pub fn has_unsaved_changes(&self) -> bool {
        self.has_edited && !self.exported
    }

    pub fn can_undo(&self) -> bool {
        self.store.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.store.can_redo()
    }

    pub fn undo(&mut self) {
        // A drag in flight would otherwise keep writing into whatever
        // annotation the restored snapshot puts on top.
        self.tools.abort_gesture(&mut self.store);
        if self.store.undo() {
            self.tools.selection = None;
            self.tools.editing_text = None;
            self.mark_changed();
        }
    }

    pub fn redo(&mut self) {
        self.tools.abort_gesture(&mut self.store);
        if self.store.redo() {
            self.tools.selection = None;
            self.tools.editing_text = None;
            self.mark_changed();
        }
    }

    pub fn clear_all(&mut self) {
        self.tools.abort_gesture(&mut self.store);
        self.tools.selection = None;
        self.tools.editing_text = None;
        self.store.clear();
        self.mark_changed();
    }

    pub fn delete_selected(&mut self) {
        if let Some(selected) = self.tools.selection.take() {
            self.store.remove(selected);
            self.mark_changed();
        }
    }

    pub fn reset_for_new_image(&mut self, ctx: &EguiContext, rgba: RgbaImage) {
        let mut image = EditorImage::new(rgba);
        image.ensure_texture(ctx);
        self.image = Some(image);
        self.store.reset();
        self.tools = ToolController::default();
        self.compositor.invalidate();
        self.has_edited = false;
        self.exported = false;
        self.zoom = 1.0;
        self.fit_zoom_to_view = true;
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.active_tool = tool;
        if tool != Tool::Select {
            self.tools.selection = None;
        }
    }

    pub fn persist_options(&mut self) {
        self.settings.capture_options(&self.options);
        if let Err(error) = self.settings.save() {
            warn!(%error, "failed to save settings");
        }
    }

    pub fn set_blur_strength(&mut self, strength: f32) {
        // The cache keys on strength, so a change alone regenerates it.
        self.options.blur_strength = strength;
        self.persist_options();
    }

    pub fn nearest_zoom_step(&self) -> usize {
        let mut best_idx = 0usize;
        let mut best_diff = f32::MAX;
        for (idx, step) in ZOOM_STEPS.iter().enumerate() {
            let diff = (self.zoom - step).abs();
            if diff < best_diff {
                best_diff = diff;
                best_idx = idx;
            }
        }
        best_idx
    }

    pub fn zoom_in(&mut self) {
        let idx = self.nearest_zoom_step();
        if idx + 1 < ZOOM_STEPS.len() {
            self.zoom = ZOOM_STEPS[idx + 1];
        }
    }

    pub fn zoom_out(&mut self) {
        let idx = self.nearest_zoom_step();
        if idx > 0 {
            self.zoom = ZOOM_STEPS[idx - 1];
        }
    }

    pub fn set_fit_zoom(&mut self, image_size: Vec2, view_size: Vec2) {
        let width_scale = (view_size.x / image_size.x).max(0.1);
        let height_scale = (view_size.y / image_size.y).max(0.1);
        self.zoom = width_scale.min(height_scale).clamp(0.25, 4.0);
    }

    /// True when the scene needs the blurred background texture this frame.
    pub fn needs_blur_texture(&self) -> bool {
        let drawing_blur = self.active_tool == Tool::Blur;
        drawing_blur
            || self
                .store
                .items()
                .iter()
                .any(|annotation| annotation.is_blur())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{AnnotationKind, Point};

    fn draw_pen_stroke(state: &mut EditorState, from: Point, to: Point) {
        let options = state.options;
        state
            .tools
            .pointer_down(&mut state.store, Tool::Pen, &options, from, 0.0);
        state.tools.pointer_move(&mut state.store, to, 0.0);
        state.tools.pointer_up(&mut state.store, to, &options);
    }

    #[test]
    fn redo_mid_drag_drops_the_live_stroke() {
        let mut state = EditorState::default();
        let options = state.options;
        draw_pen_stroke(&mut state, Point::new(10.0, 10.0), Point::new(20.0, 20.0));
        draw_pen_stroke(&mut state, Point::new(50.0, 50.0), Point::new(60.0, 60.0));
        state.undo();
        assert_eq!(state.store.len(), 1);

        // A new drag is in flight when redo arrives; it must be dropped,
        // not left appending into the restored stroke.
        state
            .tools
            .pointer_down(&mut state.store, Tool::Pen, &options, Point::new(100.0, 100.0), 0.0);
        state.redo();
        state
            .tools
            .pointer_move(&mut state.store, Point::new(200.0, 200.0), 0.0);
        state
            .tools
            .pointer_up(&mut state.store, Point::new(200.0, 200.0), &options);

        assert!(!state.tools.is_drawing());
        assert_eq!(state.store.len(), 2);
        match &state.store.items()[1].kind {
            AnnotationKind::Pen { points, .. } => {
                assert_eq!(
                    points,
                    &vec![Point::new(50.0, 50.0), Point::new(60.0, 60.0)]
                );
            }
            other => panic!("expected pen, got {other:?}"),
        }
    }

    #[test]
    fn undo_mid_drag_drops_the_live_stroke() {
        let mut state = EditorState::default();
        let options = state.options;
        draw_pen_stroke(&mut state, Point::new(10.0, 10.0), Point::new(20.0, 20.0));

        state
            .tools
            .pointer_down(&mut state.store, Tool::Pen, &options, Point::new(100.0, 100.0), 0.0);
        state.undo();

        assert!(!state.tools.is_drawing());
        assert!(state.store.is_empty());
    }

    #[test]
    fn unsaved_changes_track_edits_and_exports() {
        let mut state = EditorState::default();
        assert!(!state.has_unsaved_changes());
        state.mark_changed();
        assert!(state.has_unsaved_changes());
        state.exported = true;
        assert!(!state.has_unsaved_changes());
    }

    #[test]
    fn settings_round_trip_through_options() {
        let mut settings = UserSettings::default();
        let mut options = settings.to_options();
        options.pen_color = [0, 128, 255, 255];
        options.blur_strength = 9.0;
        settings.capture_options(&options);
        assert_eq!(settings.pen_color, [0, 128, 255, 255]);
        assert_eq!(settings.blur_strength, 9.0);
    }

    #[test]
    fn zoom_steps_clamp_at_ends() {
        let mut state = EditorState::default();
        state.zoom = 4.0;
        state.zoom_in();
        assert_eq!(state.zoom, 4.0);
        state.zoom = 0.25;
        state.zoom_out();
        assert_eq!(state.zoom, 0.25);
    }
}
