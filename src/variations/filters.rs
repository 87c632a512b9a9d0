use image::{Rgb, RgbImage, imageops};

pub const BLUR_SIGMA: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
    Smooth,
    Sharpen,
}

impl Kernel {
    fn weights(&self) -> ([f32; 9], f32) {
        match self {
            Kernel::Smooth => ([1.0, 1.0, 1.0, 1.0, 5.0, 1.0, 1.0, 1.0, 1.0], 13.0),
            Kernel::Sharpen => (
                [-2.0, -2.0, -2.0, -2.0, 32.0, -2.0, -2.0, -2.0, -2.0],
                16.0,
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterStep {
    Kernel(Kernel),
    Color(f32),
    Contrast(f32),
    Brightness(f32),
    Sharpness(f32),
    Blur,
}

impl FilterStep {
    pub fn apply(&self, image: &RgbImage) -> RgbImage {
        match *self {
            FilterStep::Kernel(kernel) => convolve3x3(image, kernel),
            FilterStep::Color(factor) => enhance_color(image, factor),
            FilterStep::Contrast(factor) => enhance_contrast(image, factor),
            FilterStep::Brightness(factor) => enhance_brightness(image, factor),
            FilterStep::Sharpness(factor) => enhance_sharpness(image, factor),
            FilterStep::Blur => imageops::blur(image, BLUR_SIGMA),
        }
    }
}

pub fn apply_steps(image: &RgbImage, steps: &[FilterStep]) -> RgbImage {
    steps
        .iter()
        .fold(image.clone(), |current, step| step.apply(&current))
}

fn luma(pixel: &Rgb<u8>) -> u8 {
    let [r, g, b] = pixel.0;
    ((r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16) as u8
}

/// `degenerate + factor * (image - degenerate)`, truncated into 0..=255.
fn blend_with(image: &RgbImage, factor: f32, degenerate: impl Fn(u32, u32, usize) -> f32) -> RgbImage {
    let mut output = image.clone();
    for (x, y, pixel) in output.enumerate_pixels_mut() {
        for (channel, value) in pixel.0.iter_mut().enumerate() {
            let base = degenerate(x, y, channel);
            let mixed = base + factor * (*value as f32 - base);
            *value = mixed.clamp(0.0, 255.0) as u8;
        }
    }
    output
}

pub fn enhance_color(image: &RgbImage, factor: f32) -> RgbImage {
    let gray = image.pixels().map(luma).collect::<Vec<_>>();
    let width = image.width();
    blend_with(image, factor, |x, y, _| {
        gray[(y * width + x) as usize] as f32
    })
}

pub fn enhance_contrast(image: &RgbImage, factor: f32) -> RgbImage {
    let count = (image.width() as u64 * image.height() as u64).max(1);
    let total: u64 = image.pixels().map(|pixel| luma(pixel) as u64).sum();
    let mean = (total as f64 / count as f64 + 0.5).floor() as f32;
    blend_with(image, factor, |_, _, _| mean)
}

pub fn enhance_brightness(image: &RgbImage, factor: f32) -> RgbImage {
    blend_with(image, factor, |_, _, _| 0.0)
}

pub fn enhance_sharpness(image: &RgbImage, factor: f32) -> RgbImage {
    let smooth = convolve3x3(image, Kernel::Smooth);
    blend_with(image, factor, |x, y, channel| {
        smooth.get_pixel(x, y)[channel] as f32
    })
}

/// 3x3 convolution that copies the outermost pixel ring unchanged.
pub fn convolve3x3(image: &RgbImage, kernel: Kernel) -> RgbImage {
    let (width, height) = image.dimensions();
    let mut output = image.clone();
    if width < 3 || height < 3 {
        return output;
    }
    let (weights, scale) = kernel.weights();
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut sums = [0.0f32; 3];
            for (idx, weight) in weights.iter().enumerate() {
                let sx = x + idx as u32 % 3 - 1;
                let sy = y + idx as u32 / 3 - 1;
                let source = image.get_pixel(sx, sy);
                for (sum, value) in sums.iter_mut().zip(source.0) {
                    *sum += weight * value as f32;
                }
            }
            output.put_pixel(
                x,
                y,
                Rgb(sums.map(|sum| (sum / scale).round().clamp(0.0, 255.0) as u8)),
            );
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient() -> RgbImage {
        RgbImage::from_fn(6, 5, |x, y| Rgb([x as u8 * 40, y as u8 * 50, 100]))
    }

    #[test]
    fn factor_one_is_identity() {
        let image = gradient();
        assert_eq!(enhance_color(&image, 1.0), image);
        assert_eq!(enhance_contrast(&image, 1.0), image);
        assert_eq!(enhance_brightness(&image, 1.0), image);
        assert_eq!(enhance_sharpness(&image, 1.0), image);
    }

    #[test]
    fn brightness_scales_and_saturates() {
        let image = RgbImage::from_pixel(2, 2, Rgb([100, 200, 10]));
        let out = enhance_brightness(&image, 1.5);
        assert_eq!(out.get_pixel(0, 0), &Rgb([150, 255, 15]));
    }

    #[test]
    fn zero_color_is_grayscale() {
        let image = RgbImage::from_pixel(1, 1, Rgb([255, 0, 0]));
        let out = enhance_color(&image, 0.0);
        assert_eq!(out.get_pixel(0, 0), &Rgb([76, 76, 76]));
    }

    #[test]
    fn contrast_pulls_toward_mean_luma() {
        let mut image = RgbImage::from_pixel(2, 1, Rgb([0, 0, 0]));
        image.put_pixel(1, 0, Rgb([255, 255, 255]));
        let out = enhance_contrast(&image, 0.0);
        assert_eq!(out.get_pixel(0, 0), &Rgb([128, 128, 128]));
        assert_eq!(out.get_pixel(1, 0), &Rgb([128, 128, 128]));
    }

    #[test]
    fn kernels_keep_the_border_and_flat_areas() {
        let flat = RgbImage::from_pixel(5, 5, Rgb([80, 90, 100]));
        assert_eq!(convolve3x3(&flat, Kernel::Smooth), flat);
        assert_eq!(convolve3x3(&flat, Kernel::Sharpen), flat);

        let mut spot = flat.clone();
        spot.put_pixel(2, 2, Rgb([200, 200, 200]));
        let sharpened = convolve3x3(&spot, Kernel::Sharpen);
        assert_eq!(sharpened.get_pixel(2, 2)[0], 255);
        assert_eq!(sharpened.get_pixel(0, 0), spot.get_pixel(0, 0));
        let smoothed = convolve3x3(&spot, Kernel::Smooth);
        assert!(smoothed.get_pixel(2, 2)[0] < 200);
        assert!(smoothed.get_pixel(1, 1)[0] > 80);
    }

    #[test]
    fn steps_apply_in_order() {
        let image = RgbImage::from_pixel(3, 3, Rgb([100, 100, 100]));
        let out = apply_steps(
            &image,
            &[FilterStep::Brightness(2.0), FilterStep::Brightness(0.5)],
        );
        assert_eq!(out, image);
        assert_eq!(apply_steps(&image, &[FilterStep::Blur]).dimensions(), (3, 3));
    }
}
