//! Typed access to the indicator LED on any register region.

use crate::error::Result;
use crate::field::INDICATOR_COLOR;
use crate::region::{FieldValue, RegisterRegion};

/// LED color, one bit per channel: red, green, blue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Color {
    Off = 0x00,
    Red = 0x01,
    Green = 0x02,
    GreenRed = 0x03,
    Blue = 0x04,
    BlueRed = 0x05,
    Turquoise = 0x06,
    TurquoiseRed = 0x07,
}

impl Color {
    pub const ALL: [Color; 8] = [
        Color::Off,
        Color::Red,
        Color::Green,
        Color::GreenRed,
        Color::Blue,
        Color::BlueRed,
        Color::Turquoise,
        Color::TurquoiseRed,
    ];
}

impl FieldValue for Color {
    fn from_bits(bits: u32) -> Option<Self> {
        Self::ALL.get(bits as usize).copied()
    }

    fn into_bits(self) -> u32 {
        self as u32
    }
}

/// The indicator core seen through a region. Accessors work on the region's
/// mirror; call `region().push()` / `pull()` to reach hardware.
pub struct Indicator<R> {
    region: R,
}

impl<R: RegisterRegion> Indicator<R> {
    pub fn new(region: R) -> Self {
        Self { region }
    }

    pub fn color(&self) -> Result<Color> {
        self.region.get_as(&INDICATOR_COLOR)
    }

    pub fn set_color(&self, color: Color) -> Result<()> {
        self.region.set_as(&INDICATOR_COLOR, color)
    }

    pub fn region(&self) -> &R {
        &self.region
    }

    pub fn into_region(self) -> R {
        self.region
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{RegisterBus, SimBus};
    use crate::client::RegionClient;
    use crate::device::Device;
    use crate::regmap::INDICATOR_MAP;
    use std::sync::Arc;

    #[test]
    fn color_bits() {
        for (i, c) in Color::ALL.iter().enumerate() {
            assert_eq!(c.into_bits(), i as u32);
            assert_eq!(Color::from_bits(i as u32), Some(*c));
        }
        assert_eq!(Color::from_bits(8), None);
    }

    #[test]
    fn cycle_colors_through_the_client() {
        let bus = Arc::new(SimBus::new(4));
        let device = Device::probe_indicator(0x4000_0000, bus.clone()).unwrap();
        let led = Indicator::new(RegionClient::new(INDICATOR_MAP, device.open().unwrap()));

        led.region().reset().unwrap();
        led.region().send().unwrap();

        for color in Color::ALL {
            led.set_color(color).unwrap();
            led.region().send().unwrap();
            led.region().reset().unwrap();
            led.region().recv().unwrap();
            assert_eq!(led.color().unwrap(), color);
            assert_eq!(bus.read32(0), Some(color as u32));
            assert_eq!(device.show("indicator_led").unwrap(), format!("0x{:x}\n", color as u32));
        }
    }

    #[test]
    fn works_on_the_device_region_too() {
        let bus = Arc::new(SimBus::with_words(&[0xF4]));
        let device = Device::probe_indicator(0x4000_0000, bus.clone()).unwrap();
        let led = Indicator::new(device.region());
        assert_eq!(led.color().unwrap(), Color::Blue);
        led.set_color(Color::Red).unwrap();
        led.region().push().unwrap();
        assert_eq!(bus.read32(0), Some(0xF1));
    }
}
