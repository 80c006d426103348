//! Fixed color enhancement applied to live captures before encoding.
//!
//! Follows the CSS filter-effects definitions of `contrast()`, `brightness()`
//! and `saturate()`, applied in that order with clamping after each step.
//! The transform is pure: the same frame always enhances to the same pixels.

use crate::camera::Frame;

/// Enhancement parameters, as CSS filter amounts (1.0 = unchanged).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Enhancement {
    pub contrast: f32,
    pub brightness: f32,
    pub saturation: f32,
}

impl Enhancement {
    /// `contrast(1.1) brightness(1.05) saturate(1.1)`
    pub const STANDARD: Enhancement = Enhancement {
        contrast: 1.1,
        brightness: 1.05,
        saturation: 1.1,
    };

    pub const IDENTITY: Enhancement = Enhancement {
        contrast: 1.0,
        brightness: 1.0,
        saturation: 1.0,
    };

    /// Enhance an RGB frame in place.
    pub fn apply(&self, frame: &mut Frame) {
        let lut = self.tone_lut();
        let matrix = saturation_matrix(self.saturation);

        for px in frame.data.chunks_exact_mut(Frame::BYTES_PER_PIXEL) {
            let r = lut[px[0] as usize];
            let g = lut[px[1] as usize];
            let b = lut[px[2] as usize];
            for (out, row) in px.iter_mut().zip(matrix.iter()) {
                let v = row[0] * r + row[1] * g + row[2] * b;
                *out = to_channel(v);
            }
        }
    }

    /// Contrast then brightness, per channel, as a 256-entry table.
    fn tone_lut(&self) -> [f32; 256] {
        let mut lut = [0.0f32; 256];
        for (i, slot) in lut.iter_mut().enumerate() {
            let v = i as f32 / 255.0;
            let v = ((v - 0.5) * self.contrast + 0.5).clamp(0.0, 1.0);
            let v = (v * self.brightness).clamp(0.0, 1.0);
            *slot = v;
        }
        lut
    }
}

impl Default for Enhancement {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Row-major `saturate()` matrix from Filter Effects Level 1.
fn saturation_matrix(s: f32) -> [[f32; 3]; 3] {
    [
        [0.213 + 0.787 * s, 0.715 - 0.715 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 + 0.285 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 - 0.715 * s, 0.072 + 0.928 * s],
    ]
}

fn to_channel(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(pixels: &[[u8; 3]]) -> Frame {
        let data = pixels.iter().flatten().copied().collect();
        Frame::new(data, pixels.len() as u32, 1)
    }

    #[test]
    fn test_identity_is_lossless() {
        let original = frame(&[[0, 0, 0], [12, 130, 250], [255, 255, 255]]);
        let mut enhanced = original.clone();
        Enhancement::IDENTITY.apply(&mut enhanced);
        assert_eq!(enhanced.data, original.data);
    }

    #[test]
    fn test_standard_is_deterministic() {
        let mut a = frame(&[[10, 100, 200], [40, 40, 40]]);
        let mut b = a.clone();
        Enhancement::STANDARD.apply(&mut a);
        Enhancement::STANDARD.apply(&mut b);
        assert_eq!(a.data, b.data);
    }

    #[test]
    fn test_standard_gray_values() {
        // Gray stays gray under saturation; contrast pushes dark down, light up.
        let mut f = frame(&[[64, 64, 64], [128, 128, 128], [200, 200, 200]]);
        Enhancement::STANDARD.apply(&mut f);
        // 64: (0.251-0.5)*1.1+0.5 = 0.2261, *1.05 = 0.2374 -> 61
        assert_eq!(&f.data[0..3], &[61, 61, 61]);
        // 128: (0.502-0.5)*1.1+0.5 = 0.5022, *1.05 = 0.5273 -> 134
        assert_eq!(&f.data[3..6], &[134, 134, 134]);
        // 200: (0.7843-0.5)*1.1+0.5 = 0.8127, *1.05 = 0.8534 -> 218
        assert_eq!(&f.data[6..9], &[218, 218, 218]);
    }

    #[test]
    fn test_standard_clamps_highlights() {
        let mut f = frame(&[[255, 255, 255]]);
        Enhancement::STANDARD.apply(&mut f);
        assert_eq!(f.data, vec![255, 255, 255]);
    }

    #[test]
    fn test_saturation_spreads_channels() {
        let mut f = frame(&[[200, 100, 100]]);
        let before = (f.data[0] as i32) - (f.data[1] as i32);
        Enhancement {
            contrast: 1.0,
            brightness: 1.0,
            saturation: 1.5,
        }
        .apply(&mut f);
        let after = (f.data[0] as i32) - (f.data[1] as i32);
        assert!(after > before);
    }

    #[test]
    fn test_dimensions_untouched() {
        let mut f = Frame::new(vec![90; 4 * 3 * 3], 4, 3);
        Enhancement::STANDARD.apply(&mut f);
        assert_eq!((f.width, f.height), (4, 3));
        assert_eq!(f.data.len(), 36);
    }
}
