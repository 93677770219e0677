//! Per-field text attributes
//!
//! Each attribute reads or writes one masked field straight from hardware,
//! without the region lock. Values are rendered as `0x%x\n` and accepted as
//! decimal, `0x` hex or `0` octal text with an optional trailing newline.

use crate::bus::RegisterBus;
use crate::error::{Error, Result};
use crate::field::Field;

/// Parse an unsigned integer, picking the radix from its prefix.
pub fn parse_unsigned(text: &str) -> Result<u64> {
    let trimmed = text.strip_suffix('\n').unwrap_or(text);
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);

    let (digits, radix) = if let Some(hex) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        (hex, 16)
    } else if unsigned.len() > 1 && unsigned.starts_with('0') {
        (&unsigned[1..], 8)
    } else {
        (unsigned, 10)
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(Error::Parse(text.to_string()));
    }
    u64::from_str_radix(digits, radix).map_err(|_| Error::Parse(text.to_string()))
}

/// Text endpoint for one field.
#[derive(Debug, Clone, Copy)]
pub struct FieldAttr {
    field: Field,
}

impl FieldAttr {
    pub const fn new(field: Field) -> Self {
        Self { field }
    }

    pub fn name(&self) -> &'static str {
        self.field.name()
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    /// Read the field from hardware and render it.
    pub fn show(&self, bus: &dyn RegisterBus) -> Result<String> {
        let word = self.read_word(bus)?;
        Ok(format!("0x{:x}\n", self.field.extract(word)))
    }

    /// Parse `text`, range check it and read-modify-write the register.
    /// Returns the number of bytes consumed.
    pub fn store(&self, bus: &dyn RegisterBus, text: &str) -> Result<usize> {
        let parsed = parse_unsigned(text)?;
        let value = u32::try_from(parsed)
            .ok()
            .filter(|v| self.field.fits(*v))
            .ok_or(Error::OutOfRange {
                value: parsed,
                mask: self.field.mask(),
            })?;

        let word = self.read_word(bus)?;
        let offset = self.field.offset();
        if !bus.write32(offset, self.field.insert(word, value)) {
            return Err(Error::OutOfBounds { offset });
        }
        Ok(text.len())
    }

    fn read_word(&self, bus: &dyn RegisterBus) -> Result<u32> {
        let offset = self.field.offset();
        bus.read32(offset).ok_or(Error::OutOfBounds { offset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::SimBus;
    use crate::field::INDICATOR_LED;

    #[test]
    fn parse_radix_prefixes() {
        assert_eq!(parse_unsigned("5").unwrap(), 5);
        assert_eq!(parse_unsigned("0").unwrap(), 0);
        assert_eq!(parse_unsigned("0x05\n").unwrap(), 5);
        assert_eq!(parse_unsigned("0XfF").unwrap(), 0xFF);
        assert_eq!(parse_unsigned("010").unwrap(), 8);
        assert_eq!(parse_unsigned("+12").unwrap(), 12);
    }

    #[test]
    fn parse_rejects_garbage() {
        for bad in ["", "\n", "0x", "abc", "12z", "-1", "0x+5", "09", "1 ", "5\n\n"] {
            assert!(
                matches!(parse_unsigned(bad), Err(Error::Parse(_))),
                "{:?} should not parse",
                bad
            );
        }
        assert!(parse_unsigned("0x10000000000000000").is_err());
    }

    #[test]
    fn led_attribute_scenario() {
        let bus = SimBus::with_words(&[0xA500]);
        let attr = FieldAttr::new(INDICATOR_LED);

        assert_eq!(attr.store(&bus, "0x05").unwrap(), 4);
        assert_eq!(attr.show(&bus).unwrap(), "0x5\n");
        assert_eq!(bus.read32(0), Some(0xA505));

        let err = attr.store(&bus, "0x107").unwrap_err();
        assert!(matches!(err, Error::OutOfRange { value: 0x107, mask: 0xFF }));
        assert_eq!(bus.read32(0), Some(0xA505));

        attr.store(&bus, "255\n").unwrap();
        assert_eq!(attr.show(&bus).unwrap(), "0xff\n");
    }

    #[test]
    fn values_wider_than_a_word_are_out_of_range() {
        let bus = SimBus::new(4);
        let attr = FieldAttr::new(Field::new("wide", 0, 0xFFFF_FFFF));
        assert!(matches!(
            attr.store(&bus, "0x100000000"),
            Err(Error::OutOfRange { value: 0x1_0000_0000, .. })
        ));
        attr.store(&bus, "0xffffffff").unwrap();
        assert_eq!(attr.show(&bus).unwrap(), "0xffffffff\n");
    }

    #[test]
    fn shifted_field() {
        let bus = SimBus::with_words(&[0xFFFF_FFFF]);
        let attr = FieldAttr::new(Field::new("mid", 0, 0x0000_0F00));
        attr.store(&bus, "3").unwrap();
        assert_eq!(bus.read32(0), Some(0xFFFF_F3FF));
        assert_eq!(attr.show(&bus).unwrap(), "0x3\n");
    }
}
