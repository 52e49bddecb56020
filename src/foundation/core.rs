use crate::foundation::error::{SlidecastError, SlidecastResult};

/// Output raster dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> SlidecastResult<Self> {
        if width == 0 || height == 0 {
            return Err(SlidecastError::validation("canvas width/height must be > 0"));
        }
        if !width.is_multiple_of(2) || !height.is_multiple_of(2) {
            // yuv420p output requires even dimensions.
            return Err(SlidecastError::validation(
                "canvas width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        Ok(Self { width, height })
    }
}

/// One rendered frame as tightly packed RGBA8 bytes.
#[derive(Clone, Debug)]
pub struct FrameRgba {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub premultiplied: bool,
}

/// Frame count covering `secs` at `fps`, rounded up so visuals never end
/// before the audio they accompany.
pub fn secs_to_frames(fps: u32, secs: f64) -> u64 {
    ((secs.max(0.0)) * f64::from(fps)).ceil() as u64
}

pub fn frames_to_secs(fps: u32, frames: u64) -> f64 {
    if fps == 0 {
        return 0.0;
    }
    (frames as f64) / f64::from(fps)
}

pub fn premul_rgba8(r: u8, g: u8, b: u8, a: u8) -> [u8; 4] {
    fn premul(c: u8, a: u8) -> u8 {
        let c = u16::from(c);
        let a = u16::from(a);
        (((c * a) + 127) / 255) as u8
    }
    [premul(r, a), premul(g, a), premul(b, a), a]
}

pub fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canvas_rejects_zero_and_odd_dims() {
        assert!(Canvas::new(0, 720).is_err());
        assert!(Canvas::new(1280, 0).is_err());
        assert!(Canvas::new(1281, 720).is_err());
        assert!(Canvas::new(1280, 720).is_ok());
    }

    #[test]
    fn secs_to_frames_rounds_up() {
        assert_eq!(secs_to_frames(24, 3.0), 72);
        assert_eq!(secs_to_frames(24, 3.01), 73);
        assert_eq!(secs_to_frames(24, 0.0), 0);
        assert_eq!(secs_to_frames(24, -1.0), 0);
    }

    #[test]
    fn premul_is_identity_at_full_alpha() {
        assert_eq!(premul_rgba8(10, 20, 30, 255), [10, 20, 30, 255]);
        assert_eq!(premul_rgba8(255, 0, 0, 128), [128, 0, 0, 128]);
    }
}
