// Annotation of display frames: one green box per counted motion region.

use crate::core_modules::motion_classifier::BoundingBox;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

pub const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const BOX_THICKNESS: u32 = 3;

pub fn draw_motion_boxes(frame: &mut RgbImage, boxes: &[BoundingBox]) {
    for bbox in boxes {
        for inset in 0..BOX_THICKNESS {
            let (width, height) = (bbox.width + 2 * inset, bbox.height + 2 * inset);
            let rect = Rect::at(bbox.x as i32 - inset as i32, bbox.y as i32 - inset as i32)
                .of_size(width, height);
            draw_hollow_rect_mut(frame, rect, BOX_COLOR);
        }
    }
}
