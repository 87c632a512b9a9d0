use super::Quad;

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// Inclusive pixel rectangle used for the removal mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PaddedBox {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

pub fn bounding_box(quad: &Quad) -> BoundingBox {
    let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
    let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for point in quad {
        min_x = min_x.min(point.x);
        min_y = min_y.min(point.y);
        max_x = max_x.max(point.x);
        max_y = max_y.max(point.y);
    }
    BoundingBox {
        x: min_x,
        y: min_y,
        w: max_x - min_x,
        h: max_y - min_y,
    }
}

pub fn padded_box(quad: &Quad, pad: u32, img_w: u32, img_h: u32) -> PaddedBox {
    let bbox = bounding_box(quad);
    let pad = pad as i64;
    let clamp = |value: i64, limit: u32| value.clamp(0, limit as i64) as u32;
    let x0 = bbox.x.floor() as i64 - pad;
    let y0 = bbox.y.floor() as i64 - pad;
    let x1 = (bbox.x + bbox.w).floor() as i64 + pad;
    let y1 = (bbox.y + bbox.h).floor() as i64 + pad;
    PaddedBox {
        x0: clamp(x0, img_w),
        y0: clamp(y0, img_h),
        x1: clamp(x1, img_w),
        y1: clamp(y1, img_h),
    }
}
