use strata::{Canvas, Color};

/// Anything a rendered frame can be read back from.
pub trait PixelSource {
    fn dimensions(&self) -> (u32, u32);

    /// Straight-alpha color at `(x, y)`, `None` outside the image.
    fn color_at(&self, x: u32, y: u32) -> Option<Color>;
}

impl PixelSource for Canvas {
    fn dimensions(&self) -> (u32, u32) {
        self.size()
    }

    fn color_at(&self, x: u32, y: u32) -> Option<Color> {
        self.pixel(x, y)
    }
}

/// Tightly packed RGBA8 rows, as returned by a GPU target readback.
pub struct RgbaPixels<'a> {
    bytes: &'a [u8],
    width: u32,
    height: u32,
}

impl<'a> RgbaPixels<'a> {
    pub fn new(bytes: &'a [u8], width: u32, height: u32) -> Self {
        Self {
            bytes,
            width,
            height,
        }
    }
}

impl PixelSource for RgbaPixels<'_> {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn color_at(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let [r, g, b, a]: [u8; 4] = self.bytes.get(offset..offset + 4)?.try_into().ok()?;
        Some(Color::rgba(r, g, b, a))
    }
}

/// Color a pixel must have after rendering, within a per-channel tolerance.
pub struct PixelExpectation {
    pub x: u32,
    pub y: u32,
    pub color: Color,
    /// Defaults to 2, enough to absorb rounding in blends.
    pub tolerance: u8,
    /// Prefixed with the tile, e.g. `t03_...`.
    pub label: &'static str,
}

impl PixelExpectation {
    pub fn new(x: u32, y: u32, color: Color, label: &'static str) -> Self {
        Self {
            x,
            y,
            color,
            tolerance: 2,
            label,
        }
    }

    pub fn opaque(x: u32, y: u32, r: u8, g: u8, b: u8, label: &'static str) -> Self {
        Self::new(x, y, Color::rgb(r, g, b), label)
    }

    pub fn transparent(x: u32, y: u32, label: &'static str) -> Self {
        Self::new(x, y, Color::TRANSPARENT, label)
    }

    pub fn with_tolerance(mut self, tolerance: u8) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn matches(&self, actual: Color) -> bool {
        self.color
            .to_array()
            .iter()
            .zip(actual.to_array())
            .all(|(expected, actual)| expected.abs_diff(actual) <= self.tolerance)
    }

    fn failure(&self, actual: Option<Color>, (width, height): (u32, u32)) -> Option<String> {
        match actual {
            Some(actual) if self.matches(actual) => None,
            Some(actual) => Some(format!(
                "[{}] pixel ({},{}) expected rgba{:?} ±{} but got rgba{:?}",
                self.label,
                self.x,
                self.y,
                self.color.to_array(),
                self.tolerance,
                actual.to_array(),
            )),
            None => Some(format!(
                "[{}] pixel ({},{}) is outside the {width}x{height} image",
                self.label, self.x, self.y,
            )),
        }
    }
}

/// Checks every expectation against `source`. Returns one message per
/// mismatch; an empty list means the frame is as expected.
pub fn check_pixels<S: PixelSource + ?Sized>(
    source: &S,
    expectations: &[PixelExpectation],
) -> Vec<String> {
    let dimensions = source.dimensions();
    expectations
        .iter()
        .filter_map(|expectation| {
            expectation.failure(source.color_at(expectation.x, expectation.y), dimensions)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readback_bytes_and_canvas_agree() {
        let mut canvas = Canvas::new(3, 2);
        canvas.fill(Color::rgba(10, 20, 30, 255));
        let bytes = canvas.to_rgba_bytes();
        let readback = RgbaPixels::new(&bytes, 3, 2);

        let expectations = [
            PixelExpectation::opaque(2, 1, 11, 19, 30, "corner"),
            PixelExpectation::opaque(3, 0, 0, 0, 0, "outside"),
        ];
        let from_canvas = check_pixels(&canvas, &expectations);
        let from_bytes = check_pixels(&readback, &expectations);

        assert_eq!(from_canvas, from_bytes);
        assert_eq!(from_canvas.len(), 1);
        assert!(from_canvas[0].starts_with("[outside]"));
    }

    #[test]
    fn tolerance_is_per_channel() {
        let expectation = PixelExpectation::opaque(0, 0, 100, 100, 100, "grey");
        assert!(expectation.matches(Color::rgb(102, 98, 100)));
        assert!(!expectation.matches(Color::rgb(103, 100, 100)));
        assert!(expectation.with_tolerance(3).matches(Color::rgb(103, 100, 100)));
    }
}
