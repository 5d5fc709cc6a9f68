use core::ops::Rem;

use palette::{Hsv, IntoColor, LinSrgb, Srgb};

/// Fills `pixels` with a rainbow that moves by one full cycle every 500 steps.
pub fn rainbow(t: u32, pixels: &mut [LinSrgb<u8>]) {
    let t = (t as f32) / 500.;
    let len = pixels.len().max(1) as f32;

    for (pixel_pos, pixel_data) in pixels.iter_mut().enumerate() {
        let offset = (t + (pixel_pos as f32) / len).rem(1.0);

        let color: Srgb<f32> = Hsv::new_srgb(360.0 * offset, 1.0, 1.0).into_color();
        *pixel_data = color.into_linear::<f32>().into_format();
    }
}
