use ab_glyph::FontArc;
use anyhow::{anyhow, Context, Result};
use image::{ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::draw_text_mut;
use tiny_skia::{FillRule, LineCap, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};

use crate::annotation::{Annotation, AnnotationKind, Point};
use crate::blur::{blurred_copy, stamp_spot_stroke};
use crate::render::{annotation_visible, focus_rects, partition};

/// Rasterizes the annotated scene onto a copy of the background, in the same
/// compositing order as the live renderer: focus-composited background,
/// ordinary annotations, text, spot-blur stamps last.
pub fn flatten(
    base: &RgbaImage,
    annotations: &[Annotation],
    blur_strength: f32,
) -> Result<RgbaImage> {
    let needs_blur = annotations.iter().any(|annotation| annotation.is_blur());
    let blurred = needs_blur.then(|| blurred_copy(base, blur_strength));

    let windows = focus_rects(annotations);
    let background = match (&blurred, windows.is_empty()) {
        (Some(blurred), false) => crate::blur::focus_composite(base, blurred, &windows),
        _ => base.clone(),
    };

    let mut pixmap = Pixmap::new(base.width(), base.height())
        .ok_or_else(|| anyhow!("cannot allocate pixmap"))?;
    copy_image_to_pixmap(&background, &mut pixmap)?;

    let (ordinary, spots) = partition(annotations);
    for annotation in &ordinary {
        if !annotation_visible(annotation, annotations) {
            continue;
        }
        draw_annotation_shape(&mut pixmap, annotation)?;
    }

    let mut output = RgbaImage::from_raw(base.width(), base.height(), pixmap.data().to_vec())
        .ok_or_else(|| anyhow!("cannot construct output image"))?;

    draw_text_annotations(&mut output, &ordinary, annotations);

    if let Some(blurred) = &blurred {
        for annotation in spots {
            if let AnnotationKind::SpotBlur {
                points,
                brush_radius,
            } = &annotation.kind
            {
                if points.len() >= 2 {
                    stamp_spot_stroke(&mut output, blurred, points, *brush_radius);
                }
            }
        }
    }

    Ok(output)
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .context("cannot encode PNG")?;
    Ok(buffer.into_inner())
}

pub fn encode_jpeg(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = std::io::Cursor::new(Vec::new());
    // JPEG has no alpha channel.
    let rgb = image::DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    rgb.write_to(&mut buffer, ImageFormat::Jpeg)
        .context("cannot encode JPEG")?;
    Ok(buffer.into_inner())
}

fn copy_image_to_pixmap(image: &RgbaImage, pixmap: &mut Pixmap) -> Result<()> {
    let data = pixmap.data_mut();
    if data.len() != image.as_raw().len() {
        return Err(anyhow!("source image and pixmap size mismatch"));
    }
    data.copy_from_slice(image.as_raw());
    Ok(())
}

fn solid_paint(color: [u8; 4]) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color[0], color[1], color[2], color[3]);
    paint.anti_alias = true;
    paint
}

fn draw_annotation_shape(pixmap: &mut Pixmap, annotation: &Annotation) -> Result<()> {
    match &annotation.kind {
        AnnotationKind::Pen {
            points,
            color,
            width,
        } => {
            let stroke = Stroke {
                width: *width,
                line_cap: LineCap::Round,
                ..Default::default()
            };
            stroke_polyline(pixmap, points, &solid_paint(*color), &stroke)?;
        }
        AnnotationKind::Highlighter {
            points,
            color,
            width,
        } => {
            let mut color = *color;
            color[3] = (color[3] as f32 * 0.4) as u8;
            // Butt caps keep the stroke from overshooting its endpoints.
            let stroke = Stroke {
                width: *width,
                line_cap: LineCap::Butt,
                ..Default::default()
            };
            stroke_polyline(pixmap, points, &solid_paint(color), &stroke)?;
        }
        AnnotationKind::Arrow {
            from,
            to,
            color,
            width,
        } => {
            let paint = solid_paint(*color);
            let stroke = Stroke {
                width: *width,
                ..Default::default()
            };
            stroke_polyline(pixmap, &[*from, *to], &paint, &stroke)?;
            fill_arrow_head(pixmap, *from, *to, *width, &paint)?;
        }
        AnnotationKind::Rectangle {
            rect,
            color,
            line_width,
        } => {
            let rect = rect.normalize();
            let tiny_rect = Rect::from_ltrb(rect.min.x, rect.min.y, rect.max.x, rect.max.y)
                .ok_or_else(|| anyhow!("invalid rectangle"))?;
            let path = PathBuilder::from_rect(tiny_rect);
            let stroke = Stroke {
                width: *line_width,
                ..Default::default()
            };
            pixmap.stroke_path(
                &path,
                &solid_paint(*color),
                &stroke,
                Transform::identity(),
                None,
            );
        }
        AnnotationKind::Ellipse {
            center,
            rx,
            ry,
            color,
            line_width,
        } => {
            let mut pb = PathBuilder::new();
            pb.push_circle(0.0, 0.0, 1.0);
            let path = pb
                .finish()
                .ok_or_else(|| anyhow!("cannot build ellipse path"))?;
            let transform =
                Transform::from_scale(rx.max(1.0), ry.max(1.0)).post_translate(center.x, center.y);
            let stroke = Stroke {
                width: *line_width / rx.max(*ry).max(1.0),
                ..Default::default()
            };
            // The unit circle is scaled into place, so the stroke width is
            // divided back out of the larger radius.
            pixmap.stroke_path(&path, &solid_paint(*color), &stroke, transform, None);
        }
        AnnotationKind::Step {
            center,
            radius,
            color,
            ..
        } => {
            let mut pb = PathBuilder::new();
            pb.push_circle(center.x, center.y, *radius);
            let path = pb
                .finish()
                .ok_or_else(|| anyhow!("cannot build step circle"))?;
            pixmap.fill_path(
                &path,
                &solid_paint(*color),
                FillRule::Winding,
                Transform::identity(),
                None,
            );
        }
        // Text goes through the imageproc pass; blur variants through the
        // stamp pass.
        AnnotationKind::Text { .. }
        | AnnotationKind::SpotBlur { .. }
        | AnnotationKind::FocusRect { .. } => {}
    }

    Ok(())
}

fn stroke_polyline(
    pixmap: &mut Pixmap,
    points: &[Point],
    paint: &Paint,
    stroke: &Stroke,
) -> Result<()> {
    if points.len() < 2 {
        return Ok(());
    }
    let mut pb = PathBuilder::new();
    pb.move_to(points[0].x, points[0].y);
    for point in &points[1..] {
        pb.line_to(point.x, point.y);
    }
    let path = pb.finish().ok_or_else(|| anyhow!("cannot build path"))?;
    pixmap.stroke_path(&path, paint, stroke, Transform::identity(), None);
    Ok(())
}

fn fill_arrow_head(
    pixmap: &mut Pixmap,
    from: Point,
    to: Point,
    width: f32,
    paint: &Paint,
) -> Result<()> {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let length = (dx * dx + dy * dy).sqrt().max(1.0);
    let ux = dx / length;
    let uy = dy / length;
    let head_len = 8.0 + 2.0 * width;
    let angle = std::f32::consts::FRAC_PI_6;
    let (sin, cos) = angle.sin_cos();

    let left = (
        to.x - (ux * cos - uy * sin) * head_len,
        to.y - (ux * sin + uy * cos) * head_len,
    );
    let right = (
        to.x - (ux * cos + uy * sin) * head_len,
        to.y - (-ux * sin + uy * cos) * head_len,
    );

    let mut pb = PathBuilder::new();
    pb.move_to(to.x, to.y);
    pb.line_to(left.0, left.1);
    pb.line_to(right.0, right.1);
    pb.close();
    let path = pb
        .finish()
        .ok_or_else(|| anyhow!("cannot build arrow head path"))?;
    pixmap.fill_path(&path, paint, FillRule::Winding, Transform::identity(), None);
    Ok(())
}

fn draw_text_annotations(image: &mut RgbaImage, ordinary: &[&Annotation], all: &[Annotation]) {
    let Some(font) = load_system_font() else {
        return;
    };

    for annotation in ordinary {
        if !annotation_visible(annotation, all) {
            continue;
        }
        match &annotation.kind {
            AnnotationKind::Text {
                pos,
                content,
                color,
                font_px,
            } => {
                // pos is the baseline; draw_text_mut wants the top edge.
                let top = pos.y - font_px * 0.8;
                for (line_idx, line) in content.split('\n').enumerate() {
                    draw_text_mut(
                        image,
                        Rgba(*color),
                        pos.x as i32,
                        (top + line_idx as f32 * font_px * 1.3) as i32,
                        *font_px,
                        &font,
                        line,
                    );
                }
            }
            AnnotationKind::Step {
                center,
                number,
                font_px,
                ..
            } => {
                let label = number.to_string();
                let approx_width = label.chars().count() as f32 * font_px * 0.55;
                draw_text_mut(
                    image,
                    Rgba([255, 255, 255, 255]),
                    (center.x - approx_width / 2.0) as i32,
                    (center.y - font_px / 2.0) as i32,
                    *font_px,
                    &font,
                    &label,
                );
            }
            _ => {}
        }
    }
}

fn load_system_font() -> Option<FontArc> {
    let candidates = [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/System/Library/Fonts/Supplemental/Arial Unicode.ttf",
        "/System/Library/Fonts/Supplemental/Arial.ttf",
        "/System/Library/Fonts/SFNS.ttf",
        "C:\\Windows\\Fonts\\arial.ttf",
    ];

    for path in candidates {
        if let Ok(bytes) = std::fs::read(path) {
            if let Ok(font) = FontArc::try_from_vec(bytes) {
                return Some(font);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use image::RgbaImage;

    use super::{encode_png, flatten};
    use crate::annotation::{Annotation, AnnotationKind, Point, RectData};

    fn white(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, image::Rgba([255, 255, 255, 255]))
    }

    #[test]
    fn flatten_keeps_image_size() {
        let base = white(320, 200);
        let annotations = vec![Annotation {
            id: 1,
            kind: AnnotationKind::Rectangle {
                rect: RectData::from_points(Point::new(8.0, 8.0), Point::new(120.0, 80.0)),
                color: [229, 62, 62, 255],
                line_width: 5.0,
            },
        }];

        let result = flatten(&base, &annotations, 5.0).expect("flatten should succeed");
        assert_eq!(result.width(), 320);
        assert_eq!(result.height(), 200);
    }

    #[test]
    fn flatten_draws_the_stroke() {
        let base = white(100, 100);
        let annotations = vec![Annotation {
            id: 1,
            kind: AnnotationKind::Pen {
                points: vec![Point::new(10.0, 50.0), Point::new(90.0, 50.0)],
                color: [255, 0, 0, 255],
                width: 6.0,
            },
        }];
        let result = flatten(&base, &annotations, 5.0).unwrap();
        let pixel = result.get_pixel(50, 50);
        assert!(pixel[0] > 200 && pixel[1] < 100 && pixel[2] < 100);
    }

    #[test]
    fn focus_windows_filter_outside_annotations() {
        let base = white(200, 200);
        let annotations = vec![
            Annotation {
                id: 1,
                kind: AnnotationKind::Pen {
                    points: vec![Point::new(140.0, 150.0), Point::new(160.0, 150.0)],
                    color: [255, 0, 0, 255],
                    width: 6.0,
                },
            },
            Annotation {
                id: 2,
                kind: AnnotationKind::FocusRect {
                    rect: RectData::from_points(Point::new(0.0, 0.0), Point::new(100.0, 100.0)),
                },
            },
        ];
        let result = flatten(&base, &annotations, 5.0).unwrap();
        // The stroke outside the focus window must not appear.
        let pixel = result.get_pixel(150, 150);
        assert!(pixel[1] > 100 && pixel[2] > 100);
    }

    #[test]
    fn flatten_without_annotations_is_the_background() {
        let base = white(64, 64);
        let result = flatten(&base, &[], 5.0).unwrap();
        assert_eq!(result.as_raw(), base.as_raw());
    }

    #[test]
    fn png_encoding_produces_a_png_header() {
        let base = white(16, 16);
        let bytes = encode_png(&base).unwrap();
        assert_eq!(&bytes[..4], &[0x89, b'P', b'N', b'G']);
    }
}
