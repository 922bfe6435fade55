//! Binary masks, bounding boxes and connected-component extraction.

use image::{GrayImage, Luma};
use std::collections::VecDeque;

/// Axis-aligned box in pixel coordinates, `(x, y)` being the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// From exclusive corner coordinates; inverted corners give an empty box.
    pub fn from_corners(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self::new(x1, y1, x2.saturating_sub(x1), y2.saturating_sub(y1))
    }

    pub fn x2(&self) -> u32 {
        self.x + self.width
    }

    pub fn y2(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether `other` lies entirely within `self` (edges may touch).
    pub fn contains(&self, other: &BBox) -> bool {
        other.x >= self.x && other.x2() <= self.x2() && other.y >= self.y && other.y2() <= self.y2()
    }

    /// The part of the box inside a `width` x `height` image.
    pub fn clamp_to(&self, width: u32, height: u32) -> BBox {
        let x = self.x.min(width);
        let y = self.y.min(height);
        BBox::from_corners(x, y, self.x2().min(width), self.y2().min(height))
    }
}

pub fn bbox_contains(a: &BBox, b: &BBox) -> bool {
    a.contains(b)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    data: Vec<bool>,
}

impl Mask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![false; width as usize * height as usize],
        }
    }

    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let mut mask = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                mask.set(x, y, f(x, y));
            }
        }
        mask
    }

    /// Non-zero pixels are set.
    pub fn from_luma(image: &GrayImage) -> Self {
        Self::from_fn(image.width(), image.height(), |x, y| image.get_pixel(x, y).0[0] > 0)
    }

    pub fn to_luma(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([if self.get(x, y) { 255 } else { 0 }])
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.data[self.index(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        if x < self.width && y < self.height {
            let i = self.index(x, y);
            self.data[i] = value;
        }
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|v| **v).count()
    }

    pub fn invert(&self) -> Mask {
        Mask {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|v| !v).collect(),
        }
    }
}

/// A single connected foreground region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub mask: Mask,
    pub bbox: BBox,
    pub area: usize,
}

/// Keeps the largest 4-connected foreground component of `mask`, with its
/// bounding box. Components are discovered in row-major order and the
/// earliest one wins a tie. `None` when the mask is empty.
pub fn get_largest_mask_segment(mask: &Mask) -> Option<Segment> {
    let (width, height) = (mask.width, mask.height);
    let mut labels = vec![0u32; mask.data.len()];
    let mut queue = VecDeque::new();
    let mut best: Option<(u32, usize, BBox)> = None;
    let mut next_label = 0u32;

    for start_y in 0..height {
        for start_x in 0..width {
            let start = mask.index(start_x, start_y);
            if !mask.data[start] || labels[start] != 0 {
                continue;
            }

            next_label += 1;
            labels[start] = next_label;
            queue.push_back((start_x, start_y));
            let mut area = 0usize;
            let (mut min_x, mut min_y, mut max_x, mut max_y) = (start_x, start_y, start_x, start_y);

            while let Some((x, y)) = queue.pop_front() {
                area += 1;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);

                let neighbours = [
                    (x.checked_sub(1), Some(y)),
                    (Some(x + 1).filter(|nx| *nx < width), Some(y)),
                    (Some(x), y.checked_sub(1)),
                    (Some(x), Some(y + 1).filter(|ny| *ny < height)),
                ];
                for (nx, ny) in neighbours {
                    if let (Some(nx), Some(ny)) = (nx, ny) {
                        let i = mask.index(nx, ny);
                        if mask.data[i] && labels[i] == 0 {
                            labels[i] = next_label;
                            queue.push_back((nx, ny));
                        }
                    }
                }
            }

            if best.as_ref().map_or(true, |(_, best_area, _)| area > *best_area) {
                let bbox = BBox::from_corners(min_x, min_y, max_x + 1, max_y + 1);
                best = Some((next_label, area, bbox));
            }
        }
    }

    let (label, area, bbox) = best?;
    let data = labels.iter().map(|l| *l == label).collect();
    Some(Segment {
        mask: Mask {
            width,
            height,
            data,
        },
        bbox,
        area,
    })
}
