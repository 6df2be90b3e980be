use ndarray::{Array2, ArrayView2, Zip};

pub(crate) struct Interpolator;

impl Interpolator {
    /// Sample count that covers `count` samples `spacing` mm apart when
    /// resampled to `target` mm.
    pub(crate) fn isotropic_len(count: usize, spacing: f64, target: f64) -> usize {
        if count == 0 || !(spacing > 0.0) || !(target > 0.0) {
            return count;
        }
        ((count as f64 * spacing / target).round() as usize).max(1)
    }

    #[inline]
    pub(crate) fn bilinear_interpolate(slice: &ArrayView2<f32>, y: f32, x: f32) -> f32 {
        let (height, width) = slice.dim();

        let y = y.clamp(0.0, (height - 1) as f32);
        let x = x.clamp(0.0, (width - 1) as f32);
        let y0 = y.floor() as usize;
        let x0 = x.floor() as usize;
        let y1 = (y0 + 1).min(height - 1);
        let x1 = (x0 + 1).min(width - 1);

        let dy = y - y0 as f32;
        let dx = x - x0 as f32;
        let one_minus_dx = 1.0 - dx;
        let one_minus_dy = 1.0 - dy;

        let v00 = slice[[y0, x0]];
        let v01 = slice[[y0, x1]];
        let v10 = slice[[y1, x0]];
        let v11 = slice[[y1, x1]];

        let v0 = v00.mul_add(one_minus_dx, v01 * dx);
        let v1 = v10.mul_add(one_minus_dx, v11 * dx);

        v0.mul_add(one_minus_dy, v1 * dy)
    }

    /// Resamples `source` to `height` x `width`, sampling at pixel centres.
    pub(crate) fn resize(source: &ArrayView2<f32>, height: usize, width: usize) -> Array2<f32> {
        let (source_height, source_width) = source.dim();
        let mut resized = Array2::<f32>::zeros((height, width));
        if source_height == 0 || source_width == 0 {
            return resized;
        }

        let scale_y = source_height as f32 / height as f32;
        let scale_x = source_width as f32 / width as f32;
        Zip::indexed(&mut resized).par_for_each(|(y, x), value| {
            let src_y = (y as f32 + 0.5) * scale_y - 0.5;
            let src_x = (x as f32 + 0.5) * scale_x - 0.5;
            *value = Self::bilinear_interpolate(source, src_y, src_x);
        });
        resized
    }
}
