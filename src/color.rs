/// An 8-bit RGBA color.
///
/// Used for vertex colors, material tints and target clear colors.
///
/// ```
/// use strata::Color;
///
/// let red = Color::rgb(255, 0, 0);
/// assert_eq!(red.normalize(), [1.0, 0.0, 0.0, 1.0]);
/// assert_eq!(Color::from_normalized([0.0, 0.0, 1.0, 1.0]), Color::rgb(0, 0, 255));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const TRANSPARENT: Self = Self([0, 0, 0, 0]);
    pub const BLACK: Self = Self([0, 0, 0, 255]);
    pub const WHITE: Self = Self([255, 255, 255, 255]);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self([r, g, b, a])
    }

    /// Channels mapped to `[0.0, 1.0]`.
    pub fn normalize(&self) -> [f32; 4] {
        normalize_rgba_color(&self.0)
    }

    /// Inverse of [`Color::normalize`]. Values are clamped and rounded.
    pub fn from_normalized(rgba: [f32; 4]) -> Self {
        let channel = |value: f32| (value.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self([
            channel(rgba[0]),
            channel(rgba[1]),
            channel(rgba[2]),
            channel(rgba[3]),
        ])
    }

    pub fn to_array(&self) -> [u8; 4] {
        self.0
    }

    pub fn alpha(&self) -> u8 {
        self.0[3]
    }

    pub(crate) fn to_wgpu(self) -> wgpu::Color {
        let [r, g, b, a] = self.normalize();
        wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: b as f64,
            a: a as f64,
        }
    }
}

impl From<[u8; 4]> for Color {
    fn from(value: [u8; 4]) -> Self {
        Self(value)
    }
}

pub(crate) fn normalize_rgba_color(color: &[u8; 4]) -> [f32; 4] {
    [
        color[0] as f32 / 255.0,
        color[1] as f32 / 255.0,
        color[2] as f32 / 255.0,
        color[3] as f32 / 255.0,
    ]
}

/// Component-wise product of two normalized colors.
#[inline]
pub(crate) fn modulate(left: [f32; 4], right: [f32; 4]) -> [f32; 4] {
    [
        left[0] * right[0],
        left[1] * right[1],
        left[2] * right[2],
        left[3] * right[3],
    ]
}

/// Straight-alpha "source over destination".
#[inline]
pub(crate) fn blend_over(src: [f32; 4], dst: [f32; 4]) -> [f32; 4] {
    let src_alpha = src[3];
    let out_alpha = src_alpha + dst[3] * (1.0 - src_alpha);
    if out_alpha <= f32::EPSILON {
        return [0.0; 4];
    }

    let mut out = [0.0; 4];
    for channel in 0..3 {
        out[channel] = (src[channel] * src_alpha + dst[channel] * dst[3] * (1.0 - src_alpha))
            / out_alpha;
    }
    out[3] = out_alpha;
    out
}
