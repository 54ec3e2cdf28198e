#![allow(dead_code)]

use coverkit::ingest::bytes_to_embeddable_image;
use coverkit::rendering::Bitmap;
use image::{Rgba, RgbaImage};

/// PNG data URI of a `w`x`h` image filled with `px`
pub fn solid_png(w: u32, h: u32, px: [u8; 4]) -> String {
    let png = Bitmap::from_image(RgbaImage::from_pixel(w, h, Rgba(px)))
        .to_png()
        .expect("encode png");
    bytes_to_embeddable_image(&png).expect("embed png")
}

/// Horizontal gradient, so scaling and cropping are visible in digests
pub fn gradient_png(w: u32, h: u32) -> String {
    let img = RgbaImage::from_fn(w, h, |x, y| {
        Rgba([(x * 255 / w.max(1)) as u8, (y * 255 / h.max(1)) as u8, 128, 255])
    });
    let png = Bitmap::from_image(img).to_png().expect("encode png");
    bytes_to_embeddable_image(&png).expect("embed png")
}

const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Path of an installed TrueType font, if any
pub fn system_font() -> Option<&'static str> {
    SYSTEM_FONTS
        .iter()
        .copied()
        .find(|p| std::path::Path::new(p).exists())
}
