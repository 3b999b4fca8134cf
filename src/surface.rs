use crate::error::{ReelError, ReelResult};

/// A fixed-size straight-alpha RGBA8 raster. Slides and frames are both
/// surfaces; the transition renderer draws into one with the primitives
/// below.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Surface {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> ReelResult<Self> {
        if width == 0 || height == 0 {
            return Err(ReelError::validation("surface width/height must be > 0"));
        }
        Ok(Self {
            width,
            height,
            data: vec![0u8; (width as usize) * (height as usize) * 4],
        })
    }

    pub fn from_rgba8(width: u32, height: u32, data: Vec<u8>) -> ReelResult<Self> {
        if width == 0 || height == 0 {
            return Err(ReelError::validation("surface width/height must be > 0"));
        }
        if data.len() != (width as usize) * (height as usize) * 4 {
            return Err(ReelError::validation(
                "surface data size mismatch with width*height*4",
            ));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn from_rgba_image(img: &image::RgbaImage) -> ReelResult<Self> {
        Self::from_rgba8(img.width(), img.height(), img.as_raw().clone())
    }

    pub fn to_rgba_image(&self) -> image::RgbaImage {
        image::RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .expect("surface buffer always matches its dimensions")
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn same_size(&self, other: &Surface) -> bool {
        self.width == other.width && self.height == other.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    pub fn fill(&mut self, rgba: [u8; 4]) {
        for px in self.data.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
    }

    /// Overwrite this surface with another of identical dimensions.
    pub fn copy_from(&mut self, src: &Surface) -> ReelResult<()> {
        if !self.same_size(src) {
            return Err(ReelError::validation(format!(
                "surface size mismatch: got {}x{}, expected {}x{}",
                src.width, src.height, self.width, self.height
            )));
        }
        self.data.copy_from_slice(&src.data);
        Ok(())
    }

    /// Draw `src` at an integer offset, opaque, clipped to bounds.
    pub fn blit(&mut self, src: &Surface, dx: i64, dy: i64) {
        self.blit_alpha(src, dx, dy, 1.0);
    }

    /// Source-over draw of `src` at an integer offset with a global alpha,
    /// clipped to bounds. The destination is assumed opaque (frames start
    /// from an opaque fill), so the blend reduces to a per-pixel lerp.
    pub fn blit_alpha(&mut self, src: &Surface, dx: i64, dy: i64, alpha: f32) {
        let alpha = alpha.clamp(0.0, 1.0);
        if alpha <= 0.0 {
            return;
        }
        let op = ((alpha * 255.0).round() as i32).clamp(0, 255) as u16;

        let x0 = dx.max(0);
        let y0 = dy.max(0);
        let x1 = (dx + i64::from(src.width)).min(i64::from(self.width));
        let y1 = (dy + i64::from(src.height)).min(i64::from(self.height));
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        for y in y0..y1 {
            let sy = (y - dy) as usize;
            let row = (y as usize) * (self.width as usize);
            let srow = sy * (src.width as usize);
            for x in x0..x1 {
                let sx = (x - dx) as usize;
                let di = (row + x as usize) * 4;
                let si = (srow + sx) * 4;

                let w = mul_div255(u16::from(src.data[si + 3]), op);
                if w == 0 {
                    continue;
                }
                if w == 255 {
                    self.data[di..di + 4].copy_from_slice(&src.data[si..si + 4]);
                    continue;
                }
                for c in 0..3 {
                    self.data[di + c] = lerp255(self.data[di + c], src.data[si + c], w);
                }
                // Opaque destination stays opaque.
            }
        }
    }

    /// Draw `src` scaled about this surface's center with a global alpha,
    /// nearest-neighbor sampled. A scale of zero draws nothing.
    pub fn blit_scaled_center(&mut self, src: &Surface, scale: f64, alpha: f32) {
        let alpha = alpha.clamp(0.0, 1.0);
        if alpha <= 0.0 || scale <= 0.0 {
            return;
        }
        let op = ((alpha * 255.0).round() as i32).clamp(0, 255) as u16;

        let cx = f64::from(self.width) / 2.0;
        let cy = f64::from(self.height) / 2.0;
        let scx = f64::from(src.width) / 2.0;
        let scy = f64::from(src.height) / 2.0;

        let x0 = ((cx - scx * scale).floor().max(0.0)) as u32;
        let y0 = ((cy - scy * scale).floor().max(0.0)) as u32;
        let x1 = ((cx + scx * scale).ceil().min(f64::from(self.width))) as u32;
        let y1 = ((cy + scy * scale).ceil().min(f64::from(self.height))) as u32;

        for y in y0..y1 {
            let sy = (f64::from(y) + 0.5 - cy) / scale + scy;
            if sy < 0.0 || sy >= f64::from(src.height) {
                continue;
            }
            let sy = sy as usize;
            let row = (y as usize) * (self.width as usize);
            let srow = sy * (src.width as usize);
            for x in x0..x1 {
                let sx = (f64::from(x) + 0.5 - cx) / scale + scx;
                if sx < 0.0 || sx >= f64::from(src.width) {
                    continue;
                }
                let si = (srow + sx as usize) * 4;
                let di = (row + x as usize) * 4;

                let w = mul_div255(u16::from(src.data[si + 3]), op);
                if w == 0 {
                    continue;
                }
                if w == 255 {
                    self.data[di..di + 4].copy_from_slice(&src.data[si..si + 4]);
                    continue;
                }
                for c in 0..3 {
                    self.data[di + c] = lerp255(self.data[di + c], src.data[si + c], w);
                }
            }
        }
    }

    /// Overwrite this surface with the per-pixel linear blend of `a` and
    /// `b` at weight `t` (0 = all `a`, 1 = all `b`).
    pub fn mix_from(&mut self, a: &Surface, b: &Surface, t: f32) -> ReelResult<()> {
        if !self.same_size(a) || !self.same_size(b) {
            return Err(ReelError::validation(
                "mix_from expects surfaces of identical dimensions",
            ));
        }
        let t = t.clamp(0.0, 1.0);
        let w = ((t * 255.0).round() as i32).clamp(0, 255) as u8;
        for ((d, a), b) in self
            .data
            .chunks_exact_mut(4)
            .zip(a.data.chunks_exact(4))
            .zip(b.data.chunks_exact(4))
        {
            for c in 0..4 {
                d[c] = lerp255(a[c], b[c], w);
            }
        }
        Ok(())
    }
}

/// Allocates frame surfaces of one fixed size for a whole export. Rejects
/// slides whose dimensions do not match.
#[derive(Clone, Copy, Debug)]
pub struct FrameFactory {
    width: u32,
    height: u32,
}

impl FrameFactory {
    pub fn new(width: u32, height: u32) -> ReelResult<Self> {
        if width == 0 || height == 0 {
            return Err(ReelError::validation("frame width/height must be > 0"));
        }
        Ok(Self { width, height })
    }

    /// Factory sized to a slide deck. Fails on an empty deck or mixed
    /// slide dimensions.
    pub fn for_slides(slides: &[Surface]) -> ReelResult<Self> {
        let first = slides
            .first()
            .ok_or_else(|| ReelError::validation("slide list must be non-empty"))?;
        for (i, slide) in slides.iter().enumerate() {
            if !first.same_size(slide) {
                return Err(ReelError::validation(format!(
                    "slide {} is {}x{}, expected {}x{} (all slides must match)",
                    i,
                    slide.width(),
                    slide.height(),
                    first.width(),
                    first.height()
                )));
            }
        }
        Self::new(first.width(), first.height())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn blank(&self) -> Surface {
        Surface {
            width: self.width,
            height: self.height,
            data: vec![0u8; (self.width as usize) * (self.height as usize) * 4],
        }
    }

    /// A fresh frame holding a copy of `slide`. Downstream consumers may
    /// retain or overwrite frames, so slides are never shared by reference.
    pub fn frame_of(&self, slide: &Surface) -> ReelResult<Surface> {
        if slide.width() != self.width || slide.height() != self.height {
            return Err(ReelError::validation(format!(
                "slide size mismatch: got {}x{}, expected {}x{}",
                slide.width(),
                slide.height(),
                self.width,
                self.height
            )));
        }
        Ok(slide.clone())
    }
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

fn lerp255(a: u8, b: u8, w: u8) -> u8 {
    let w = u16::from(w);
    let inv = 255u16 - w;
    mul_div255(u16::from(a), inv).saturating_add(mul_div255(u16::from(b), w))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Surface {
        let mut s = Surface::new(width, height).unwrap();
        s.fill(rgba);
        s
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        assert!(Surface::new(0, 10).is_err());
        assert!(Surface::new(10, 0).is_err());
        assert!(Surface::from_rgba8(2, 2, vec![0u8; 15]).is_err());
    }

    #[test]
    fn blit_alpha_0_is_noop() {
        let mut dst = solid(4, 4, [10, 20, 30, 255]);
        let src = solid(4, 4, [200, 200, 200, 255]);
        let before = dst.clone();
        dst.blit_alpha(&src, 0, 0, 0.0);
        assert_eq!(dst, before);
    }

    #[test]
    fn blit_alpha_half_blends_toward_src() {
        let mut dst = solid(4, 4, [0, 0, 0, 255]);
        let src = solid(4, 4, [255, 255, 255, 255]);
        dst.blit_alpha(&src, 0, 0, 0.5);
        let [r, g, b, a] = dst.pixel(1, 1);
        assert_eq!(a, 255);
        for c in [r, g, b] {
            assert!((127..=128).contains(&c), "expected mid blend, got {c}");
        }
    }

    #[test]
    fn blit_alpha_1_replaces_dst() {
        let mut dst = solid(4, 4, [10, 20, 30, 255]);
        let src = solid(4, 4, [200, 100, 50, 255]);
        dst.blit_alpha(&src, 0, 0, 1.0);
        assert_eq!(dst, src);
    }

    #[test]
    fn blit_offset_is_clipped() {
        let mut dst = solid(4, 4, [0, 0, 0, 255]);
        let src = solid(4, 4, [255, 255, 255, 255]);
        dst.blit(&src, 2, 0);
        assert_eq!(dst.pixel(1, 0), [0, 0, 0, 255]);
        assert_eq!(dst.pixel(2, 0), [255, 255, 255, 255]);
        assert_eq!(dst.pixel(3, 3), [255, 255, 255, 255]);

        // Fully off-surface draw touches nothing.
        let before = dst.clone();
        dst.blit(&src, 10, -10);
        assert_eq!(dst, before);
    }

    #[test]
    fn mix_endpoints_match_inputs() {
        let a = solid(3, 3, [10, 20, 30, 255]);
        let b = solid(3, 3, [200, 210, 220, 255]);
        let mut out = Surface::new(3, 3).unwrap();
        out.mix_from(&a, &b, 0.0).unwrap();
        assert_eq!(out, a);
        out.mix_from(&a, &b, 1.0).unwrap();
        assert_eq!(out, b);
    }

    #[test]
    fn scaled_center_full_scale_covers_surface() {
        let mut dst = solid(8, 8, [0, 0, 0, 255]);
        let src = solid(8, 8, [9, 9, 9, 255]);
        dst.blit_scaled_center(&src, 1.0, 1.0);
        assert_eq!(dst, src);
    }

    #[test]
    fn scaled_center_zero_scale_draws_nothing() {
        let mut dst = solid(8, 8, [0, 0, 0, 255]);
        let before = dst.clone();
        let src = solid(8, 8, [9, 9, 9, 255]);
        dst.blit_scaled_center(&src, 0.0, 1.0);
        assert_eq!(dst, before);
    }

    #[test]
    fn factory_rejects_mixed_slide_sizes() {
        let slides = vec![solid(4, 4, [1, 1, 1, 255]), solid(4, 2, [1, 1, 1, 255])];
        assert!(FrameFactory::for_slides(&slides).is_err());
        assert!(FrameFactory::for_slides(&[]).is_err());
    }

    #[test]
    fn frame_of_is_a_fresh_copy() {
        let slide = solid(4, 4, [5, 5, 5, 255]);
        let factory = FrameFactory::for_slides(std::slice::from_ref(&slide)).unwrap();
        let mut frame = factory.frame_of(&slide).unwrap();
        frame.fill([0, 0, 0, 255]);
        assert_eq!(slide.pixel(0, 0), [5, 5, 5, 255]);
    }
}
