use anyhow::{Result, anyhow};
use image::{GrayImage, RgbImage};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::Inpainter;

const UNREACHED: f32 = 1.0e6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flag {
    Known,
    Band,
    Inside,
}

#[derive(Debug, Clone, Copy)]
struct Front {
    t: f32,
    x: u32,
    y: u32,
}

impl PartialEq for Front {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Front {}

impl PartialOrd for Front {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Front {
    // Reversed so `BinaryHeap` pops the smallest arrival time first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .t
            .total_cmp(&self.t)
            .then_with(|| (other.y, other.x).cmp(&(self.y, self.x)))
    }
}

/// Fast-marching inpainting: the unknown region is filled from its boundary
/// inward in order of arrival time.
#[derive(Debug, Clone, Copy, Default)]
pub struct TeleaInpainter;

impl Inpainter for TeleaInpainter {
    fn inpaint(&self, image: &RgbImage, mask: &GrayImage, radius: u32) -> Result<RgbImage> {
        if image.dimensions() != mask.dimensions() {
            return Err(anyhow!(
                "mask is {}x{} but image is {}x{}",
                mask.width(),
                mask.height(),
                image.width(),
                image.height()
            ));
        }
        let mut field = Field::new(image, mask)?;
        field.march(radius.max(1) as i64);
        Ok(field.finish())
    }
}

struct Field {
    width: i64,
    height: i64,
    flags: Vec<Flag>,
    times: Vec<f32>,
    pixels: Vec<[f32; 3]>,
    heap: BinaryHeap<Front>,
}

impl Field {
    fn new(image: &RgbImage, mask: &GrayImage) -> Result<Self> {
        let (w, h) = image.dimensions();
        let len = (w as usize) * (h as usize);
        let mut flags = Vec::with_capacity(len);
        let mut times = Vec::with_capacity(len);
        for pixel in mask.pixels() {
            if pixel[0] > 0 {
                flags.push(Flag::Inside);
                times.push(UNREACHED);
            } else {
                flags.push(Flag::Known);
                times.push(0.0);
            }
        }
        if !flags.contains(&Flag::Known) {
            return Err(anyhow!("mask covers the whole image"));
        }
        let pixels = image
            .pixels()
            .map(|pixel| [pixel[0] as f32, pixel[1] as f32, pixel[2] as f32])
            .collect();

        let mut field = Self {
            width: w as i64,
            height: h as i64,
            flags,
            times,
            pixels,
            heap: BinaryHeap::new(),
        };
        for y in 0..field.height {
            for x in 0..field.width {
                let idx = field.index(x, y);
                if field.flags[idx] == Flag::Known && field.touches_inside(x, y) {
                    field.flags[idx] = Flag::Band;
                    field.heap.push(Front {
                        t: 0.0,
                        x: x as u32,
                        y: y as u32,
                    });
                }
            }
        }
        Ok(field)
    }

    fn index(&self, x: i64, y: i64) -> usize {
        (y * self.width + x) as usize
    }

    fn flag(&self, x: i64, y: i64) -> Flag {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return Flag::Inside;
        }
        self.flags[self.index(x, y)]
    }

    fn time(&self, x: i64, y: i64) -> f32 {
        if self.flag(x, y) == Flag::Inside {
            return UNREACHED;
        }
        self.times[self.index(x, y)]
    }

    fn touches_inside(&self, x: i64, y: i64) -> bool {
        neighbours(x, y).iter().any(|&(nx, ny)| {
            nx >= 0
                && ny >= 0
                && nx < self.width
                && ny < self.height
                && self.flags[self.index(nx, ny)] == Flag::Inside
        })
    }

    fn march(&mut self, radius: i64) {
        while let Some(front) = self.heap.pop() {
            let (x, y) = (front.x as i64, front.y as i64);
            let idx = self.index(x, y);
            self.flags[idx] = Flag::Known;

            for (nx, ny) in neighbours(x, y) {
                if nx < 0 || ny < 0 || nx >= self.width || ny >= self.height {
                    continue;
                }
                let nidx = self.index(nx, ny);
                if self.flags[nidx] != Flag::Inside {
                    continue;
                }
                let t = self
                    .solve(nx - 1, ny, nx, ny - 1)
                    .min(self.solve(nx + 1, ny, nx, ny - 1))
                    .min(self.solve(nx - 1, ny, nx, ny + 1))
                    .min(self.solve(nx + 1, ny, nx, ny + 1));
                self.times[nidx] = t;
                self.pixels[nidx] = self.estimate(nx, ny, radius);
                self.flags[nidx] = Flag::Band;
                self.heap.push(Front {
                    t,
                    x: nx as u32,
                    y: ny as u32,
                });
            }
        }
    }

    /// First-order upwind solution of |grad T| = 1 from two neighbours.
    fn solve(&self, x1: i64, y1: i64, x2: i64, y2: i64) -> f32 {
        let known1 = self.flag(x1, y1) != Flag::Inside;
        let known2 = self.flag(x2, y2) != Flag::Inside;
        let a = self.time(x1, y1);
        let b = self.time(x2, y2);
        match (known1, known2) {
            (true, true) => {
                let diff = a - b;
                if diff.abs() >= 1.0 {
                    1.0 + a.min(b)
                } else {
                    (a + b + (2.0 - diff * diff).sqrt()) * 0.5
                }
            }
            (true, false) => 1.0 + a,
            (false, true) => 1.0 + b,
            (false, false) => UNREACHED,
        }
    }

    fn gradient(&self, x: i64, y: i64) -> (f32, f32) {
        let t = self.times[self.index(x, y)];
        let axis = |prev: (i64, i64), next: (i64, i64)| {
            let has_prev = self.flag(prev.0, prev.1) != Flag::Inside;
            let has_next = self.flag(next.0, next.1) != Flag::Inside;
            match (has_prev, has_next) {
                (true, true) => (self.time(next.0, next.1) - self.time(prev.0, prev.1)) * 0.5,
                (false, true) => self.time(next.0, next.1) - t,
                (true, false) => t - self.time(prev.0, prev.1),
                (false, false) => 0.0,
            }
        };
        (axis((x - 1, y), (x + 1, y)), axis((x, y - 1), (x, y + 1)))
    }

    fn estimate(&self, x: i64, y: i64, radius: i64) -> [f32; 3] {
        let (gx, gy) = self.gradient(x, y);
        let t = self.times[self.index(x, y)];
        let radius_sq = (radius * radius) as f32;
        let mut sum = [0.0f32; 3];
        let mut weight_sum = 0.0f32;
        let mut nearest: Option<[f32; 3]> = None;

        for ky in (y - radius)..=(y + radius) {
            for kx in (x - radius)..=(x + radius) {
                if self.flag(kx, ky) == Flag::Inside || (kx == x && ky == y) {
                    continue;
                }
                let rx = (x - kx) as f32;
                let ry = (y - ky) as f32;
                let len_sq = rx * rx + ry * ry;
                if len_sq > radius_sq {
                    continue;
                }
                let kidx = self.index(kx, ky);
                if len_sq <= 1.0 {
                    nearest = Some(self.pixels[kidx]);
                }
                let mut direction = (rx * gx + ry * gy) / len_sq.sqrt();
                if direction.abs() <= 0.01 {
                    direction = 1.0e-6;
                }
                let distance = 1.0 / (len_sq * len_sq.sqrt());
                let level = 1.0 / (1.0 + (self.times[kidx] - t).abs());
                let weight = (direction * distance * level).abs();
                for (acc, value) in sum.iter_mut().zip(self.pixels[kidx]) {
                    *acc += weight * value;
                }
                weight_sum += weight;
            }
        }

        if weight_sum > f32::EPSILON {
            sum.map(|value| value / weight_sum)
        } else {
            nearest.unwrap_or(self.pixels[self.index(x, y)])
        }
    }

    fn finish(self) -> RgbImage {
        let (w, h) = (self.width as u32, self.height as u32);
        RgbImage::from_fn(w, h, |x, y| {
            let value = self.pixels[(y as usize) * (w as usize) + x as usize];
            image::Rgb(value.map(|channel| channel.round().clamp(0.0, 255.0) as u8))
        })
    }
}

fn neighbours(x: i64, y: i64) -> [(i64, i64); 4] {
    [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    #[test]
    fn uniform_background_is_restored_exactly() {
        let mut image = RgbImage::from_pixel(16, 16, Rgb([90, 120, 150]));
        let mut mask = GrayImage::new(16, 16);
        for y in 4..9 {
            for x in 3..12 {
                image.put_pixel(x, y, Rgb([0, 0, 0]));
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let out = TeleaInpainter.inpaint(&image, &mask, 5).unwrap();
        assert!(out.pixels().all(|pixel| *pixel == Rgb([90, 120, 150])));
    }

    #[test]
    fn pixels_outside_the_mask_are_untouched() {
        let image = RgbImage::from_fn(8, 8, |x, y| Rgb([x as u8 * 30, y as u8 * 30, 5]));
        let mut mask = GrayImage::new(8, 8);
        mask.put_pixel(4, 4, Luma([255]));
        let out = TeleaInpainter.inpaint(&image, &mask, 3).unwrap();
        for (x, y, pixel) in out.enumerate_pixels() {
            if (x, y) != (4, 4) {
                assert_eq!(pixel, image.get_pixel(x, y));
            }
        }
    }

    #[test]
    fn full_mask_is_rejected() {
        let image = RgbImage::new(3, 3);
        let mask = GrayImage::from_pixel(3, 3, Luma([255]));
        assert!(TeleaInpainter.inpaint(&image, &mask, 3).is_err());
    }

    #[test]
    fn mismatched_mask_is_rejected() {
        let image = RgbImage::new(3, 3);
        let mask = GrayImage::new(2, 3);
        assert!(TeleaInpainter.inpaint(&image, &mask, 3).is_err());
    }

    #[test]
    fn heap_pops_earliest_arrival_first() {
        let mut heap = BinaryHeap::new();
        heap.push(Front { t: 2.0, x: 0, y: 0 });
        heap.push(Front { t: 0.5, x: 1, y: 0 });
        heap.push(Front { t: 1.0, x: 2, y: 0 });
        let order = std::iter::from_fn(|| heap.pop()).map(|front| front.x).collect::<Vec<_>>();
        assert_eq!(order, vec![1, 2, 0]);
    }
}
