use crate::Color;

/// A pixel that can be stored in a [Channel](crate::Channel).
pub trait Pixel {
    /// Converts the pixel into the channel's native color format.
    ///
    /// IMPORTANT: This is the logical color. The wire order of the strip
    /// (GRB, RGB, ...) is applied during rendering.
    fn into_color(self) -> Color;
}

impl Pixel for Color {
    fn into_color(self) -> Color {
        self
    }
}

/// Raw `0xWWRRGGBB` data.
impl Pixel for u32 {
    fn into_color(self) -> Color {
        Color(self)
    }
}

/// Raw RGB data.
impl Pixel for [u8; 3] {
    fn into_color(self) -> Color {
        Color::rgb(self[0], self[1], self[2])
    }
}

/// Raw RGBW data.
impl Pixel for [u8; 4] {
    fn into_color(self) -> Color {
        Color::rgbw(self[0], self[1], self[2], self[3])
    }
}

/// 8-bit Linear sRGB, which is the color space
/// most NeoPixel strips are in.
///
/// Be aware that this differs from normal,
/// gamma-corrected sRGB. A conversion has to take place.
///
/// More info can be found in the documentation of the
/// [palette] crate.
impl Pixel for palette::LinSrgb<u8> {
    fn into_color(self) -> Color {
        Color::rgb(self.red, self.green, self.blue)
    }
}

impl<'a, P> Pixel for &'a P
where
    P: Pixel + Clone,
{
    fn into_color(self) -> Color {
        self.clone().into_color()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrays_are_rgb() {
        assert_eq!([1u8, 2, 3].into_color(), Color::rgb(1, 2, 3));
        assert_eq!([1u8, 2, 3, 4].into_color(), Color::rgbw(1, 2, 3, 4));
    }

    #[test]
    fn linsrgb_is_not_reordered() {
        let pixel = palette::LinSrgb::new(10u8, 20, 30);
        assert_eq!(pixel.into_color(), Color::rgb(10, 20, 30));
        assert_eq!((&pixel).into_color(), Color::rgb(10, 20, 30));
    }
}
