use anyhow::{Context, Result, anyhow};
use image::RgbImage;
use resvg::render;
use tiny_skia::Pixmap;
use usvg::{Options, Tree};

use super::color::{parse_color_or_white, to_hex};
use super::font::FontBook;
use crate::elements::TextElement;

pub const DEFAULT_OUTLINE_RADIUS: u32 = 2;
const OUTLINE_COLOR: &str = "#000000";
const LINE_HEIGHT: f32 = 1.2;

/// Draws text elements, each with a black outline, over a copy of a base image.
#[derive(Clone)]
pub struct Compositor {
    fonts: FontBook,
    outline_radius: u32,
}

impl Compositor {
    pub fn new(fonts: FontBook, outline_radius: u32) -> Self {
        Self {
            fonts,
            outline_radius,
        }
    }

    /// Elements are drawn in slice order; later elements paint over earlier ones.
    pub fn render(&self, base: &RgbImage, elements: &[TextElement]) -> Result<RgbImage> {
        let (width, height) = base.dimensions();
        if width == 0 || height == 0 || elements.iter().all(|element| element.text.is_empty()) {
            return Ok(base.clone());
        }

        let svg = self.text_layer_svg(width, height, elements);
        let options = Options {
            fontdb: self.fonts.database(),
            ..Options::default()
        };
        let tree = Tree::from_str(&svg, &options).with_context(|| "failed to parse text layer")?;
        let mut pixmap =
            Pixmap::new(width, height).ok_or_else(|| anyhow!("empty text layer size"))?;
        let mut pixmap_mut = pixmap.as_mut();
        render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);

        let mut output = base.clone();
        for (pixel, layer) in output.pixels_mut().zip(pixmap.pixels()) {
            let alpha = layer.alpha() as u32;
            if alpha == 0 {
                continue;
            }
            let inverse = 255 - alpha;
            let premul = [layer.red(), layer.green(), layer.blue()];
            for (channel, top) in pixel.0.iter_mut().zip(premul) {
                let mixed = top as u32 * 255 + *channel as u32 * inverse;
                *channel = ((mixed + 127) / 255).min(255) as u8;
            }
        }
        Ok(output)
    }

    pub(crate) fn text_layer_svg(&self, width: u32, height: u32, elements: &[TextElement]) -> String {
        let mut svg = String::new();
        svg.push_str(&format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = width,
            h = height
        ));

        let radius = self.outline_radius as i32;
        for element in elements {
            if element.text.is_empty() {
                continue;
            }
            let family = self.fonts.resolve(&element.font, element.weight);
            let fill = to_hex(parse_color_or_white(&element.color));
            let run = GlyphRun {
                lines: element.text.split('\n').collect(),
                family: &family,
                size: element.size.max(1) as f32,
                weight: element.weight.as_str(),
            };
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    run.push_svg(
                        &mut svg,
                        element.position.x + dx,
                        element.position.y + dy,
                        OUTLINE_COLOR,
                    );
                }
            }
            run.push_svg(&mut svg, element.position.x, element.position.y, &fill);
        }

        svg.push_str("</svg>");
        svg
    }
}

struct GlyphRun<'a> {
    lines: Vec<&'a str>,
    family: &'a str,
    size: f32,
    weight: &'a str,
}

impl GlyphRun<'_> {
    fn push_svg(&self, svg: &mut String, x: i32, y: i32, color: &str) {
        svg.push_str(&format!(
            r#"<text x="{x}" y="{y}" font-size="{size}" font-family="{family}" font-weight="{weight}" fill="{color}" xml:space="preserve">"#,
            size = self.size,
            family = escape_xml(self.family),
            weight = self.weight,
        ));
        for (idx, line) in self.lines.iter().enumerate() {
            let escaped = escape_xml(line);
            if idx == 0 {
                svg.push_str(&escaped);
            } else {
                svg.push_str(&format!(
                    r#"<tspan x="{x}" dy="{dy}">{escaped}</tspan>"#,
                    dy = self.size * LINE_HEIGHT
                ));
            }
        }
        svg.push_str("</text>");
    }
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
