//! Text compositing.
//!
//! Frames are described as a small SVG scene (background image as a data URL,
//! shapes, text lines) and rasterized with `resvg`. Line wrapping uses an average
//! glyph width estimate, since the final font is only known to the renderer.

use std::io::Cursor;
use std::sync::Arc;

use base64::Engine as _;
use common::OverlayStyle;
use image::{GenericImageView, ImageFormat};
use resvg::tiny_skia;
use resvg::usvg;

use crate::error::{PipelineError, PipelineResult};

const TITLE_FONT: &str = "Helvetica, Arial, sans-serif";
const TITLE_FONT_SIZE: f32 = 34.0;
const TITLE_LINE_HEIGHT: f32 = 60.0;
const TITLE_COLOR: &str = "rgb(0, 220, 255)";
const TITLE_Y_RATIO: f32 = 0.7;
const TITLE_MAX_WIDTH_RATIO: f32 = 0.8;
const BAND_PADDING: f32 = 15.0;
const BAND_OPACITY: f32 = 0.8;

/// Width of 9:16, the vertical video frame.
const TARGET_ASPECT: f64 = 9.0 / 16.0;

fn compositing_err(msg: impl std::fmt::Display) -> PipelineError {
    PipelineError::ImageGeneration(format!("compositing failed: {}", msg))
}

/// Rough rendered width of `text`. Bold glyphs run wider.
pub fn estimate_width(text: &str, font_size: f32, bold: bool) -> f32 {
    let factor = if bold { 0.6 } else { 0.53 };
    text.chars().count() as f32 * font_size * factor
}

fn is_bold(weight: &str) -> bool {
    match weight.trim() {
        "bold" | "bolder" => true,
        w => w.parse::<u32>().map(|n| n >= 600).unwrap_or(false),
    }
}

/// Greedy word wrap on spaces. A single word wider than `max_width` keeps its own line.
pub fn wrap_text(text: &str, max_width: f32, font_size: f32, bold: bool) -> Vec<String> {
    let mut lines = Vec::new();
    let mut words = text.split_whitespace();
    let Some(first) = words.next() else {
        return lines;
    };

    let mut current = first.to_string();
    for word in words {
        let candidate = format!("{} {}", current, word);
        if estimate_width(&candidate, font_size, bold) > max_width {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        } else {
            current = candidate;
        }
    }
    lines.push(current);
    lines
}

/// Largest 9:16 region of a `width` x `height` image.
pub fn vertical_dims(width: u32, height: u32) -> (u32, u32) {
    let aspect = width as f64 / height as f64;
    if (aspect - TARGET_ASPECT).abs() < f64::EPSILON {
        (width, height)
    } else if aspect > TARGET_ASPECT {
        (((height as f64) * TARGET_ASPECT).round() as u32, height)
    } else {
        (width, ((width as f64) / TARGET_ASPECT).round() as u32)
    }
}

pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn text_element(line: &str, x: f32, y: f32, family: &str, size: f32, weight: &str, fill: &str) -> String {
    format!(
        r#"<text x="{x:.1}" y="{y:.1}" text-anchor="middle" dominant-baseline="middle" font-family="{family}" font-size="{size}" font-weight="{weight}" fill="{fill}">{text}</text>"#,
        x = x,
        y = y,
        family = escape_xml(family),
        size = size,
        weight = escape_xml(weight),
        fill = escape_xml(fill),
        text = escape_xml(line),
    )
}

fn image_dims(bytes: &[u8]) -> PipelineResult<(u32, u32)> {
    let img = image::load_from_memory(bytes).map_err(compositing_err)?;
    Ok(img.dimensions())
}

/// `data:` URL for the background. Formats other than PNG/JPEG are re-encoded as PNG.
fn data_url(bytes: &[u8]) -> PipelineResult<String> {
    let engine = base64::engine::general_purpose::STANDARD;
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => Ok(format!("data:image/png;base64,{}", engine.encode(bytes))),
        Ok(ImageFormat::Jpeg) => Ok(format!("data:image/jpeg;base64,{}", engine.encode(bytes))),
        _ => {
            let img = image::load_from_memory(bytes).map_err(compositing_err)?;
            let mut png = Vec::new();
            img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
                .map_err(compositing_err)?;
            Ok(format!("data:image/png;base64,{}", engine.encode(&png)))
        }
    }
}

fn rasterize(svg: &str, fontdb: &Arc<usvg::fontdb::Database>) -> PipelineResult<Vec<u8>> {
    let opt = usvg::Options {
        fontdb: fontdb.clone(),
        ..Default::default()
    };
    let tree = usvg::Tree::from_str(svg, &opt).map_err(compositing_err)?;
    let size = tree.size().to_int_size();
    let mut pixmap = tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| compositing_err("zero-sized frame"))?;
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());
    pixmap.encode_png().map_err(compositing_err)
}

/// Title-only frame: the background with a translucent band at 70% height
/// carrying the title in cyan.
pub fn render_title_frame(
    image: &[u8],
    title: &str,
    fontdb: &Arc<usvg::fontdb::Database>,
) -> PipelineResult<Vec<u8>> {
    let (width, height) = image_dims(image)?;
    let (w, h) = (width as f32, height as f32);

    let x = w * 0.5;
    let y = h * TITLE_Y_RATIO;
    let lines = wrap_text(title, w * TITLE_MAX_WIDTH_RATIO, TITLE_FONT_SIZE, true);
    let n = lines.len() as f32;

    let band_y = y - n * TITLE_LINE_HEIGHT - BAND_PADDING;
    let band_h = n * TITLE_LINE_HEIGHT + BAND_PADDING * 4.0;

    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    );
    svg.push_str(&format!(
        r#"<image x="0" y="0" width="{width}" height="{height}" xlink:href="{}"/>"#,
        data_url(image)?
    ));
    svg.push_str(&format!(
        r#"<rect x="0" y="{band_y:.1}" width="{width}" height="{band_h:.1}" fill="black" fill-opacity="{opacity}"/>"#,
        opacity = BAND_OPACITY
    ));
    for (i, line) in lines.iter().enumerate() {
        let line_y = y - (n - 1.0 - i as f32) * TITLE_LINE_HEIGHT;
        svg.push_str(&text_element(line, x, line_y, TITLE_FONT, TITLE_FONT_SIZE, "bold", TITLE_COLOR));
    }
    svg.push_str("</svg>");

    rasterize(&svg, fontdb)
}

/// Title + summary card on black, cropped to the largest 9:16 area of the
/// base image. Both blocks are centred together on `y_ratio`.
pub fn render_text_card(
    image: &[u8],
    title: &str,
    summary: &str,
    style: &OverlayStyle,
    fontdb: &Arc<usvg::fontdb::Database>,
) -> PipelineResult<Vec<u8>> {
    let (src_w, src_h) = image_dims(image)?;
    let (width, height) = vertical_dims(src_w, src_h);
    let (w, h) = (width as f32, height as f32);

    let x = w * style.x_ratio;
    let max_width = w * style.max_width_ratio;

    let title_lines = wrap_text(title, max_width, style.title_font_size, is_bold(&style.title_font_weight));
    let summary_lines = wrap_text(
        summary,
        max_width,
        style.summary_font_size,
        is_bold(&style.summary_font_weight),
    );
    let title_height = title_lines.len() as f32 * style.title_line_height;
    let summary_height = summary_lines.len() as f32 * style.summary_line_height;
    let total = title_height + style.gap_between_title_and_summary + summary_height;
    let start_y = h * style.y_ratio - total / 2.0 + style.title_line_height / 2.0;
    let summary_start_y = start_y + title_height + style.gap_between_title_and_summary;

    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}"><rect x="0" y="0" width="{width}" height="{height}" fill="black"/>"#
    );
    for (i, line) in title_lines.iter().enumerate() {
        svg.push_str(&text_element(
            line,
            x,
            start_y + i as f32 * style.title_line_height,
            &style.title_font_family,
            style.title_font_size,
            &style.title_font_weight,
            &style.title_color,
        ));
    }
    for (i, line) in summary_lines.iter().enumerate() {
        svg.push_str(&text_element(
            line,
            x,
            summary_start_y + i as f32 * style.summary_line_height,
            &style.summary_font_family,
            style.summary_font_size,
            &style.summary_font_weight,
            &style.summary_color,
        ));
    }
    svg.push_str("</svg>");

    rasterize(&svg, fontdb)
}
