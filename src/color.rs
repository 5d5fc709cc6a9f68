/// A single LED color, stored as `0xWWRRGGBB`.
///
/// The white component is ignored by strips without a white channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color(pub u32);

impl Color {
    /// All channels off.
    pub const BLACK: Color = Color(0);

    /// Creates a color from its red, green and blue components.
    pub const fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self::rgbw(red, green, blue, 0)
    }

    /// Creates a color from its red, green, blue and white components.
    pub const fn rgbw(red: u8, green: u8, blue: u8, white: u8) -> Self {
        Self((white as u32) << 24 | (red as u32) << 16 | (green as u32) << 8 | blue as u32)
    }

    /// The red component.
    pub const fn red(self) -> u8 {
        (self.0 >> 16) as u8
    }

    /// The green component.
    pub const fn green(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// The blue component.
    pub const fn blue(self) -> u8 {
        self.0 as u8
    }

    /// The white component.
    pub const fn white(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub(crate) const fn component(self, component: Component) -> u8 {
        match component {
            Component::Red => self.red(),
            Component::Green => self.green(),
            Component::Blue => self.blue(),
            Component::White => self.white(),
        }
    }
}

impl From<u32> for Color {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<Color> for u32 {
    fn from(color: Color) -> Self {
        color.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Component {
    Red,
    Green,
    Blue,
    White,
}

/// The order in which a strip expects its color bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorOrder {
    /// Red, green, blue.
    Rgb,
    /// Red, blue, green.
    Rbg,
    /// Green, red, blue. Used by most WS2812 strips.
    #[default]
    Grb,
    /// Green, blue, red.
    Gbr,
    /// Blue, red, green.
    Brg,
    /// Blue, green, red.
    Bgr,
}

impl ColorOrder {
    const fn components(self) -> [Component; 3] {
        use Component::*;
        match self {
            ColorOrder::Rgb => [Red, Green, Blue],
            ColorOrder::Rbg => [Red, Blue, Green],
            ColorOrder::Grb => [Green, Red, Blue],
            ColorOrder::Gbr => [Green, Blue, Red],
            ColorOrder::Brg => [Blue, Red, Green],
            ColorOrder::Bgr => [Blue, Green, Red],
        }
    }
}

/// The kind of LED strip attached to the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripType {
    /// Wire order of the color components.
    pub order: ColorOrder,
    /// Whether every LED has an additional white channel, sent last.
    pub white: bool,
}

impl StripType {
    /// WS2812 / WS2812B, GRB.
    pub const WS2812: StripType = StripType::rgb(ColorOrder::Grb);
    /// WS2811 driver ICs, usually RGB.
    pub const WS2811: StripType = StripType::rgb(ColorOrder::Rgb);
    /// SK6812 RGBW strips.
    pub const SK6812_RGBW: StripType = StripType::rgbw(ColorOrder::Grb);

    /// A strip with three color channels.
    pub const fn rgb(order: ColorOrder) -> Self {
        Self {
            order,
            white: false,
        }
    }

    /// A strip with three color channels plus white.
    pub const fn rgbw(order: ColorOrder) -> Self {
        Self { order, white: true }
    }

    /// Number of bytes every LED consumes on the wire.
    pub const fn bytes_per_led(self) -> usize {
        if self.white {
            4
        } else {
            3
        }
    }

    /// Returns the wire bytes of the given color, in transmission order.
    ///
    /// Only the first [`bytes_per_led`](Self::bytes_per_led) bytes are valid.
    pub(crate) fn wire_components(self) -> ([Component; 4], usize) {
        let [a, b, c] = self.order.components();
        ([a, b, c, Component::White], self.bytes_per_led())
    }
}

impl Default for StripType {
    fn default() -> Self {
        Self::WS2812
    }
}
