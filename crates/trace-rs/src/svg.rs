//! SVG serialization of a [`RenderFrame`].

use std::fmt::Write;

use crate::render::{Geometry, Layer, RenderFrame};
use crate::series::SeriesKind;

const GRID: &str = "#1b2933";
const TICK: &str = "#29404a";
const LABEL: &str = "#8a9aa5";

fn layer_svg(out: &mut String, layer: &Layer, opacity: Option<f64>) {
    let opacity = opacity.map(|o| format!(" opacity=\"{o}\"")).unwrap_or_default();
    match &layer.geometry {
        Geometry::Path(line) => {
            let _ = writeln!(
                out,
                r#"<path d="{}" fill="none" stroke="{}" stroke-width="{}" stroke-linecap="round" stroke-linejoin="round"{opacity}/>"#,
                line.to_svg_path(),
                layer.stroke.color,
                layer.stroke.width,
            );
        }
        Geometry::Marks(marks) => {
            let _ = writeln!(out, r#"<g stroke="{}" stroke-width="{}"{opacity}>"#, layer.stroke.color, layer.stroke.width);
            for m in marks {
                let _ = writeln!(
                    out,
                    r#"<line x1="{x:.2}" x2="{x:.2}" y1="{:.2}" y2="{:.2}"/>"#,
                    m.y0,
                    m.y1,
                    x = m.x
                );
            }
            out.push_str("</g>\n");
        }
    }
}

/// Standalone SVG document of a frame. A hidden overlay is written with
/// zero opacity.
pub fn render_svg(frame: &RenderFrame) -> String {
    let (w, h) = (frame.width, frame.height);
    let (left, top, right, bottom) = frame.plot_area;
    let mut out = String::new();

    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#
    );
    let _ = writeln!(out, r#"<rect x="0" y="0" width="{w}" height="{h}" fill="transparent"/>"#);

    match frame.kind {
        SeriesKind::Trace => {
            let _ = writeln!(
                out,
                r#"<line x1="{left}" x2="{left}" y1="{top}" y2="{bottom}" stroke="{GRID}" stroke-width="1.5"/>"#
            );
            for tick in &frame.y_ticks {
                let _ = writeln!(
                    out,
                    r#"<line x1="{left}" x2="{right}" y1="{y:.2}" y2="{y:.2}" stroke="{GRID}" stroke-width="1"/>"#,
                    y = tick.position
                );
                let _ = writeln!(
                    out,
                    r#"<text x="{}" y="{:.2}" fill="{LABEL}" font-size="10" text-anchor="end">{}</text>"#,
                    left - 8.0,
                    tick.position + 4.0,
                    tick.label
                );
            }
        }
        SeriesKind::Raster => {
            for row in &frame.rows {
                let alpha = if row.emphasized { 0.06 } else { 0.03 };
                let _ = writeln!(
                    out,
                    r#"<line x1="{left}" x2="{right}" y1="{y:.2}" y2="{y:.2}" stroke="rgba(0,0,0,{alpha})"/>"#,
                    y = row.y
                );
            }
        }
    }

    for tick in &frame.x_ticks {
        let _ = writeln!(
            out,
            r#"<line x1="{x:.2}" x2="{x:.2}" y1="{bottom}" y2="{}" stroke="{TICK}"/>"#,
            bottom + 6.0,
            x = tick.position
        );
        let _ = writeln!(
            out,
            r#"<text x="{:.2}" y="{}" fill="{LABEL}" font-size="10" text-anchor="middle">{}</text>"#,
            tick.label_position,
            bottom + 12.0,
            tick.label
        );
    }

    layer_svg(&mut out, &frame.base, None);
    if let Some(overlay) = &frame.overlay {
        layer_svg(&mut out, overlay, Some(if frame.overlay_visible { 1.0 } else { 0.0 }));
    }

    let _ = writeln!(
        out,
        r#"<text x="{}" y="{}" fill="{LABEL}" font-size="11" text-anchor="start">{}</text>"#,
        left - 24.0,
        bottom + 34.0,
        frame.x_title
    );
    let (tx, ty) = (left - 36.0, bottom - 20.0);
    let _ = writeln!(
        out,
        r#"<text transform="rotate(-90 {tx} {ty})" x="{tx}" y="{ty}" fill="{LABEL}" font-size="11" text-anchor="middle">{}</text>"#,
        frame.y_title
    );
    out.push_str("</svg>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::{PlotSize, TracePlot};
    use crate::render::Palette;
    use crate::series::{Series, TraceSeries};

    #[test]
    fn test_svg_contains_paths_and_ticks() {
        let mut plot = TracePlot::new(PlotSize::default(), Palette::default());
        let base = TraceSeries::new(&[0.0, 1000.0], &[-65.0, -60.0]).unwrap();
        plot.set_base(Some(Series::Trace(base)));
        let svg = render_svg(&plot.frame().unwrap());

        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(r#"d="M 48.00 "#));
        assert!(svg.contains(">1000</text>"));
        assert!(svg.contains(">-90</text>"));
        assert!(svg.contains("#ff3b3b"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn test_hidden_overlay_has_zero_opacity() {
        let mut plot = TracePlot::new(PlotSize::default(), Palette::default());
        let trace = |v: f64| Series::Trace(TraceSeries::new(&[0.0, 1.0], &[v, v]).unwrap());
        plot.set_base(Some(trace(-65.0)));
        plot.set_compare(Some(trace(-60.0)));
        let svg = render_svg(&plot.frame().unwrap());
        assert!(svg.contains(r#"opacity="0""#));
    }
}
