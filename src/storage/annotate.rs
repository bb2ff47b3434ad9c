//! Screenshot annotation
//!
//! Draws a red five-pointed star at the pointer position and a
//! semi-transparent banner, top-centered, describing the action.

use crate::recorder::record::ActionContent;
use crate::storage::glyphs;
use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_polygon_mut, draw_text_mut, text_size};
use imageproc::point::Point;
use std::f64::consts::PI;

const STAR_OUTER_RADIUS: f64 = 60.0;
const STAR_INNER_RADIUS: f64 = 20.0;
const STAR_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const BANNER_ALPHA: u16 = 128;
const BANNER_TOP: i64 = 50;
const BANNER_PADDING: i64 = 10;

/// Banner text for an action, or `None` when there is nothing to say
pub fn banner_text(content: &ActionContent) -> Option<String> {
    let mut parts = Vec::new();

    if let Some(pos) = &content.position {
        let (px, py) = pos.percent();
        let mut text = format!(
            "Mouse: ({:.0}, {:.0}) | X: {:.2}% | Y: {:.2}%",
            pos.x, pos.y, px, py
        );
        if let Some(button) = &content.button {
            text.push_str(&format!(" | Button: {}", button));
        }
        if let Some(delta) = &content.delta {
            text.push_str(&format!(" | Scroll delta: ({}, {})", delta.dx, delta.dy));
        }
        parts.push(text);
    }

    if let Some(key) = &content.key {
        parts.push(format!("Key: {}", key));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" | "))
    }
}

/// Annotate `image` in place. Key presses carry a position for the record
/// but get no star.
pub fn annotate(image: &mut RgbImage, content: &ActionContent, font: Option<&FontVec>, font_size: f32) {
    if content.key.is_none() {
        if let Some(pos) = &content.position {
            let (px, py) = pos.percent();
            let x = px / 100.0 * image.width() as f64;
            let y = py / 100.0 * image.height() as f64;
            draw_star(image, x, y);
        }
    }

    if let Some(text) = banner_text(content) {
        draw_banner(image, &text, font, font_size);
    }
}

fn star_points(cx: f64, cy: f64) -> Vec<Point<i32>> {
    (0..10)
        .map(|i| {
            let radius = if i % 2 == 0 {
                STAR_OUTER_RADIUS
            } else {
                STAR_INNER_RADIUS
            };
            // Start pointing straight up.
            let angle = -PI / 2.0 + i as f64 * PI / 5.0;
            Point::new(
                (cx + radius * angle.cos()).round() as i32,
                (cy + radius * angle.sin()).round() as i32,
            )
        })
        .collect()
}

fn draw_star(image: &mut RgbImage, x: f64, y: f64) {
    draw_polygon_mut(image, &star_points(x, y), STAR_COLOR);
}

fn draw_banner(image: &mut RgbImage, text: &str, font: Option<&FontVec>, font_size: f32) {
    let scale = PxScale::from(font_size);
    let (text_w, text_h) = match font {
        Some(font) => text_size(scale, font, text),
        None => glyphs::text_size(text, glyphs::dot_size(font_size)),
    };

    let text_x = (image.width() as i64 - text_w as i64) / 2;
    let left = text_x - BANNER_PADDING;
    let top = BANNER_TOP - BANNER_PADDING;
    let right = text_x + text_w as i64 + BANNER_PADDING;
    let bottom = BANNER_TOP + text_h as i64 + BANNER_PADDING;
    darken_rect(image, left, top, right, bottom);

    match font {
        Some(font) => draw_text_mut(
            image,
            TEXT_COLOR,
            text_x as i32,
            BANNER_TOP as i32,
            scale,
            font,
            text,
        ),
        None => glyphs::draw_text(
            image,
            TEXT_COLOR,
            text_x,
            BANNER_TOP,
            glyphs::dot_size(font_size),
            text,
        ),
    }
}

/// Blend black over the clipped rectangle at `BANNER_ALPHA`.
fn darken_rect(image: &mut RgbImage, left: i64, top: i64, right: i64, bottom: i64) {
    let x0 = left.clamp(0, image.width() as i64) as u32;
    let x1 = right.clamp(0, image.width() as i64) as u32;
    let y0 = top.clamp(0, image.height() as i64) as u32;
    let y1 = bottom.clamp(0, image.height() as i64) as u32;

    for y in y0..y1 {
        for x in x0..x1 {
            let pixel = image.get_pixel_mut(x, y);
            for channel in pixel.0.iter_mut() {
                *channel = (*channel as u16 * (255 - BANNER_ALPHA) / 255) as u8;
            }
        }
    }
}
