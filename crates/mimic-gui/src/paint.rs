//! Painting a [`RenderFrame`] with the egui painter.

use eframe::egui::{Align2, Color32, FontId, Painter, Pos2, Shape, Stroke};
use mimic_trace::{Geometry, Layer, RenderFrame, SeriesKind};

const GRID: Color32 = Color32::from_rgb(0x1b, 0x29, 0x33);
const TICK: Color32 = Color32::from_rgb(0x29, 0x40, 0x4a);
const LABEL: Color32 = Color32::from_rgb(0x8a, 0x9a, 0xa5);

/// `#rrggbb` to a color
pub fn parse_hex(color: &str) -> Option<Color32> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some(Color32::from_rgb(channel(0)?, channel(2)?, channel(4)?))
}

fn stroke_of(layer: &Layer, opacity: f32) -> Stroke {
    let color = parse_hex(&layer.stroke.color).unwrap_or(Color32::WHITE);
    Stroke::new(layer.stroke.width, color.gamma_multiply(opacity))
}

fn paint_layer(painter: &Painter, at: impl Fn(f64, f64) -> Pos2, layer: &Layer, opacity: f32) {
    let stroke = stroke_of(layer, opacity);
    match &layer.geometry {
        Geometry::Path(line) => {
            let points: Vec<Pos2> = line.points.iter().map(|&(x, y)| at(x, y)).collect();
            if points.len() >= 2 {
                painter.add(Shape::line(points, stroke));
            }
        }
        Geometry::Marks(marks) => {
            for m in marks {
                painter.line_segment([at(m.x, m.y0), at(m.x, m.y1)], stroke);
            }
        }
    }
}

/// Paint `frame` with its top-left corner at `origin`. The overlay is drawn
/// at `overlay_opacity`, which the caller animates toward the frame's
/// visibility flag.
pub fn paint_frame(painter: &Painter, origin: Pos2, frame: &RenderFrame, overlay_opacity: f32) {
    let at = |x: f64, y: f64| Pos2::new(origin.x + x as f32, origin.y + y as f32);
    let (left, top, right, bottom) = frame.plot_area;
    let font = FontId::proportional(11.0);

    match frame.kind {
        SeriesKind::Trace => {
            painter.line_segment([at(left, top), at(left, bottom)], Stroke::new(1.5, GRID));
            for tick in &frame.y_ticks {
                painter.line_segment([at(left, tick.position), at(right, tick.position)], Stroke::new(1.0, GRID));
                painter.text(
                    at(left - 6.0, tick.position),
                    Align2::RIGHT_CENTER,
                    tick.label.to_string(),
                    font.clone(),
                    LABEL,
                );
            }
        }
        SeriesKind::Raster => {
            for row in &frame.rows {
                let width = if row.emphasized { 1.0 } else { 0.5 };
                painter.line_segment([at(left, row.y), at(right, row.y)], Stroke::new(width, GRID));
            }
        }
    }

    painter.line_segment([at(left, bottom), at(right, bottom)], Stroke::new(1.5, GRID));
    for tick in &frame.x_ticks {
        painter.line_segment([at(tick.position, bottom), at(tick.position, bottom + 4.0)], Stroke::new(1.0, TICK));
        painter.text(
            at(tick.label_position, bottom + 8.0),
            Align2::CENTER_TOP,
            tick.label.to_string(),
            font.clone(),
            LABEL,
        );
    }

    paint_layer(painter, at, &frame.base, 1.0);
    if let Some(overlay) = &frame.overlay {
        if overlay_opacity > 0.0 {
            paint_layer(painter, at, overlay, overlay_opacity);
        }
    }

    painter.text(
        at((left + right) / 2.0, bottom + 26.0),
        Align2::CENTER_TOP,
        &frame.x_title,
        font.clone(),
        LABEL,
    );
    painter.text(at(4.0, top), Align2::LEFT_TOP, &frame.y_title, font, LABEL);
}
