// THEORY (HSV Pixel Heuristics):
// The `hsv_pixel` module is the lowest layer of the servo engine. It converts a
// single RGB8 pixel into the hue/saturation/value space the color filter works in.
// Like the rest of the 1D layer it never reads neighbors or history.
//
// Channel conventions follow the 8-bit OpenCV encoding, because that is the scale
// operators already use when they tune a color filter by hand:
//   • hue:        0..=179 (degrees / 2)
//   • saturation: 0..=255 (chroma / value, scaled)
//   • value:      0..=255 (max channel)
//
// The hue formula is the classic sector form: find the dominant channel, take the
// difference of the other two over the chroma, and add the sector offset.

pub mod hsv_pixel {
    pub type Channel = u8;
    pub type Hue = u8;
    pub type Saturation = u8;
    pub type Value = u8;

    /// Largest hue the 8-bit encoding can produce.
    pub const HUE_MAX: u16 = 179;
    pub const SATURATION_MAX: u16 = 255;
    pub const VALUE_MAX: u16 = 255;

    /// A single pixel in 8-bit HSV.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HsvPixel {
        pub hue: Hue,
        pub saturation: Saturation,
        pub value: Value,
    }

    impl HsvPixel {
        pub fn new(hue: Hue, saturation: Saturation, value: Value) -> Self {
            Self {
                hue,
                saturation,
                value,
            }
        }

        /// Converts one RGB8 pixel.
        pub fn from_rgb(red: Channel, green: Channel, blue: Channel) -> Self {
            let max_channel = red.max(green).max(blue);
            let min_channel = red.min(green).min(blue);
            let chroma = (max_channel - min_channel) as f32;

            let value = max_channel;
            let saturation = if max_channel == 0 {
                0
            } else {
                (255.0 * chroma / max_channel as f32).round() as u8
            };

            if chroma == 0.0 {
                return Self::new(0, saturation, value);
            }

            let (r, g, b) = (red as f32, green as f32, blue as f32);
            let inverse_chroma = 1.0 / chroma;
            let (base_difference, sector_offset) = if max_channel == red {
                (g - b, 0.0)
            } else if max_channel == green {
                (b - r, 2.0)
            } else {
                (r - g, 4.0)
            };

            let mut hue_degrees = (base_difference * inverse_chroma + sector_offset) * 60.0;
            if hue_degrees < 0.0 {
                hue_degrees += 360.0;
            }

            // Halve into the 8-bit range; 360 rounds onto 180, which is hue 0.
            let mut hue = (hue_degrees / 2.0).round() as u16;
            if hue > HUE_MAX {
                hue -= HUE_MAX + 1;
            }

            Self::new(hue as u8, saturation, value)
        }

        pub fn as_triple(&self) -> [u8; 3] {
            [self.hue, self.saturation, self.value]
        }
    }

    impl From<image::Rgb<u8>> for HsvPixel {
        fn from(pixel: image::Rgb<u8>) -> Self {
            let [red, green, blue] = pixel.0;
            Self::from_rgb(red, green, blue)
        }
    }
}
