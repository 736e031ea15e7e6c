use ab_glyph::{FontVec, InvalidFont, PxScale};
use image::{imageops::FilterType, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use ndarray::Array4;
use rand::Rng;

use crate::domain::detection::Detection;

const PAD_COLOR: Rgb<u8> = Rgb([114, 114, 114]);
const TEXT_COLOR: Rgb<u8> = Rgb([225, 255, 255]);

/// DejaVu Sans, see `assets/DejaVuSans-LICENSE`.
const BUNDLED_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

/// Caption font used unless `output.font_path` names another one.
pub fn bundled_font() -> Result<FontVec, InvalidFont> {
    FontVec::try_from_vec(BUNDLED_FONT.to_vec())
}

/// Aspect-preserving resize onto a `size x size` grey canvas, centred.
pub fn letterbox(img: &RgbImage, size: u32) -> RgbImage {
    let (w, h) = img.dimensions();
    let r = (size as f32 / h as f32).min(size as f32 / w as f32);
    let new_w = ((w as f32 * r).round() as u32).clamp(1, size);
    let new_h = ((h as f32 * r).round() as u32).clamp(1, size);

    let resized = image::imageops::resize(img, new_w, new_h, FilterType::Triangle);

    let dw = (size - new_w) as f32 / 2.0;
    let dh = (size - new_h) as f32 / 2.0;
    let left = (dw - 0.1).round().max(0.0) as i64;
    let top = (dh - 0.1).round().max(0.0) as i64;

    let mut canvas = RgbImage::from_pixel(size, size, PAD_COLOR);
    image::imageops::replace(&mut canvas, &resized, left, top);
    canvas
}

/// NCHW tensor in `[0, 1]`.
pub fn to_tensor(img: &RgbImage) -> Array4<f32> {
    let (w, h) = img.dimensions();
    let mut input = Array4::<f32>::zeros((1, 3, h as usize, w as usize));
    for (x, y, pixel) in img.enumerate_pixels() {
        input[[0, 0, y as usize, x as usize]] = pixel[0] as f32 / 255.0;
        input[[0, 1, y as usize, x as usize]] = pixel[1] as f32 / 255.0;
        input[[0, 2, y as usize, x as usize]] = pixel[2] as f32 / 255.0;
    }
    input
}

/// Draws labeled boxes in a fixed per-class colour.
pub struct Annotator {
    font: FontVec,
    font_size: f32,
    line_thickness: u32,
    palette: Vec<Rgb<u8>>,
}

impl Annotator {
    pub fn new(font: FontVec, font_size: f32, line_thickness: u32, num_classes: usize) -> Self {
        let mut rng = rand::thread_rng();
        let palette = (0..num_classes.max(1))
            .map(|_| Rgb([rng.gen(), rng.gen(), rng.gen()]))
            .collect();
        Self {
            font,
            font_size,
            line_thickness: line_thickness.max(1),
            palette,
        }
    }

    pub fn color(&self, class_id: usize) -> Rgb<u8> {
        self.palette[class_id % self.palette.len()]
    }

    /// `dets` are expected highest score first; they are painted in reverse
    /// so the strongest box ends on top.
    pub fn draw(&self, img: &mut RgbImage, dets: &[Detection]) {
        for d in dets.iter().rev() {
            let color = self.color(d.class_id);
            let (x1, y1) = (d.x1 as i32, d.y1 as i32);
            let w = ((d.x2 - d.x1) as u32).max(1);
            let h = ((d.y2 - d.y1) as u32).max(1);

            for i in 0..self.line_thickness {
                let rect = Rect::at(x1 - i as i32, y1 - i as i32).of_size(w + 2 * i, h + 2 * i);
                draw_hollow_rect_mut(img, rect, color);
            }

            // caption sits above the box, or inside its top edge near the image border
            let caption = d.caption();
            let scale = PxScale::from(self.font_size);
            let (tw, th) = text_size(scale, &self.font, &caption);
            let bg_h = th + 4;
            let top = if y1 - bg_h as i32 >= 0 { y1 - bg_h as i32 } else { y1 };
            draw_filled_rect_mut(img, Rect::at(x1, top).of_size(tw.max(1) + 4, bg_h), color);
            draw_text_mut(img, TEXT_COLOR, x1 + 2, top + 2, scale, &self.font, &caption);
        }
    }
}
