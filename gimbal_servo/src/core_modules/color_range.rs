// THEORY:
// A `ColorRange` is the only piece of "knowledge" the servo engine has about the
// object it chases: a box in HSV space. Operators hand it over as two strings of
// the form `h,s,v`, which are parsed and checked exactly once at startup. After
// that the range is an immutable value shared by every control cycle.

use crate::core_modules::hsv_pixel::hsv_pixel::{HUE_MAX, HsvPixel, SATURATION_MAX, VALUE_MAX};
use crate::error::ConfigError;
use std::fmt;
use std::str::FromStr;

const CHANNEL_NAMES: [char; 3] = ['h', 's', 'v'];
const CHANNEL_MAX: [u16; 3] = [HUE_MAX, SATURATION_MAX, VALUE_MAX];

/// One `h,s,v` bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HsvTriple(pub [u8; 3]);

impl HsvTriple {
    pub fn new(h: u8, s: u8, v: u8) -> Self {
        Self([h, s, v])
    }
}

impl FromStr for HsvTriple {
    type Err = ConfigError;

    /// Parses `h,s,v`. Components must be plain integers with no padding.
    fn from_str(hsv_string: &str) -> Result<Self, Self::Err> {
        let components: Vec<&str> = hsv_string.split(',').collect();
        if components.len() != 3 {
            return Err(ConfigError::Arity(components.len()));
        }

        let mut triple = [0u8; 3];
        for (i, raw) in components.iter().enumerate() {
            let channel = CHANNEL_NAMES[i];
            let parsed: i64 = raw.parse().map_err(|_| ConfigError::Component {
                channel,
                value: raw.to_string(),
            })?;

            if parsed < 0 || parsed > CHANNEL_MAX[i] as i64 {
                return Err(ConfigError::OutOfDomain {
                    channel,
                    value: parsed.clamp(0, u16::MAX as i64) as u16,
                    max: CHANNEL_MAX[i],
                });
            }
            triple[i] = parsed as u8;
        }

        Ok(Self(triple))
    }
}

impl fmt::Display for HsvTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.0[0], self.0[1], self.0[2])
    }
}

/// An inclusive HSV box. Construction guarantees `lower <= upper` per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorRange {
    lower: HsvTriple,
    upper: HsvTriple,
}

impl ColorRange {
    pub fn new(lower: HsvTriple, upper: HsvTriple) -> Result<Self, ConfigError> {
        for i in 0..3 {
            if lower.0[i] > upper.0[i] {
                return Err(ConfigError::InvertedRange {
                    channel: CHANNEL_NAMES[i],
                    lower: lower.0[i],
                    upper: upper.0[i],
                });
            }
        }
        Ok(Self { lower, upper })
    }

    /// Parses both bounds from their flag strings.
    pub fn parse(lower: &str, upper: &str) -> Result<Self, ConfigError> {
        Self::new(lower.parse()?, upper.parse()?)
    }

    pub fn lower(&self) -> HsvTriple {
        self.lower
    }

    pub fn upper(&self) -> HsvTriple {
        self.upper
    }

    #[inline]
    pub fn contains(&self, pixel: HsvPixel) -> bool {
        let value = pixel.as_triple();
        (0..3).all(|i| self.lower.0[i] <= value[i] && value[i] <= self.upper.0[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_default_flags() {
        let range = ColorRange::parse("35,219,90", "119,255,255").unwrap();
        assert_eq!(range.lower(), HsvTriple::new(35, 219, 90));
        assert_eq!(range.upper(), HsvTriple::new(119, 255, 255));
    }

    #[test]
    fn rejects_wrong_arity() {
        assert_eq!("1,2".parse::<HsvTriple>(), Err(ConfigError::Arity(2)));
        assert_eq!("1,2,3,4".parse::<HsvTriple>(), Err(ConfigError::Arity(4)));
        assert_eq!("".parse::<HsvTriple>(), Err(ConfigError::Arity(1)));
    }

    #[test]
    fn rejects_non_integer_components() {
        assert!(matches!(
            "1,2.5,3".parse::<HsvTriple>(),
            Err(ConfigError::Component { channel: 's', .. })
        ));
        assert!(matches!(
            "h,2,3".parse::<HsvTriple>(),
            Err(ConfigError::Component { channel: 'h', .. })
        ));
        assert!(matches!(
            "1,2,".parse::<HsvTriple>(),
            Err(ConfigError::Component { channel: 'v', .. })
        ));
    }

    #[test]
    fn rejects_padded_components() {
        assert_eq!(
            "35, 219,90".parse::<HsvTriple>(),
            Err(ConfigError::Component {
                channel: 's',
                value: " 219".into()
            })
        );
        assert!("35,219,90 ".parse::<HsvTriple>().is_err());
    }

    #[test]
    fn rejects_values_outside_the_8bit_domain() {
        assert!(matches!(
            "180,0,0".parse::<HsvTriple>(),
            Err(ConfigError::OutOfDomain { channel: 'h', .. })
        ));
        assert!(matches!(
            "0,-1,0".parse::<HsvTriple>(),
            Err(ConfigError::OutOfDomain { channel: 's', .. })
        ));
    }

    #[test]
    fn rejects_inverted_bounds() {
        let err = ColorRange::parse("50,0,0", "40,255,255").unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvertedRange {
                channel: 'h',
                lower: 50,
                upper: 40
            }
        );
    }

    #[test]
    fn contains_is_inclusive() {
        let range = ColorRange::parse("10,20,30", "10,20,30").unwrap();
        assert!(range.contains(HsvPixel::new(10, 20, 30)));
        assert!(!range.contains(HsvPixel::new(11, 20, 30)));
    }

    proptest! {
        #[test]
        fn valid_triples_round_trip(h in 0u8..=179, s in any::<u8>(), v in any::<u8>()) {
            let text = format!("{h},{s},{v}");
            let parsed: HsvTriple = text.parse().unwrap();
            prop_assert_eq!(parsed, HsvTriple::new(h, s, v));
            prop_assert_eq!(parsed.to_string(), text);
        }

        #[test]
        fn wrong_arity_always_fails(parts in proptest::collection::vec(0u8..=179, 0..8)) {
            prop_assume!(parts.len() != 3);
            let text = parts.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(",");
            prop_assert!(text.parse::<HsvTriple>().is_err());
        }
    }
}
