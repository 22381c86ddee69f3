//! Typed register values, decoded from cache bytes for printing.
use std::fmt;

use strum::EnumDiscriminants;

use crate::arch::{ByteOrder, RegisterType};
use crate::error::Result;
use crate::regcache::RegisterCache;

/// Strongly typed representation of register values in their native sizes.
#[derive(Clone, Copy, Debug, EnumDiscriminants, PartialEq)]
#[strum_discriminants(name(RegisterFormat))]
pub enum RegisterValue {
    Void,

    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),

    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),

    /// Code or data pointer.
    Address(u64),

    Float(f32),
    Double(f64),

    /// On x86, most C compilers implement long double as the 80-bit extended precision type.
    /// Kept as little-endian bytes; see [`RegisterValue::long_double_to_f64`].
    LongDouble([u8; 10]),
    Byte64([u8; 8]),
    Byte128([u8; 16]),
}

impl RegisterValue {
    /// Decode `bytes` (exactly `ty.byte_width()` of them, in `order`).
    pub fn from_bytes(ty: RegisterType, order: ByteOrder, bytes: &[u8]) -> Self {
        assert_eq!(bytes.len(), ty.byte_width(), "wrong byte count for {ty}");

        let unsigned = || order.read_unsigned(bytes);
        let signed = || order.read_signed(bytes);
        match ty {
            RegisterType::Void => RegisterValue::Void,
            RegisterType::Uint8 => RegisterValue::Uint8(unsigned() as u8),
            RegisterType::Uint16 => RegisterValue::Uint16(unsigned() as u16),
            RegisterType::Uint32 => RegisterValue::Uint32(unsigned() as u32),
            RegisterType::Uint64 => RegisterValue::Uint64(unsigned()),
            RegisterType::Int8 => RegisterValue::Int8(signed() as i8),
            RegisterType::Int16 => RegisterValue::Int16(signed() as i16),
            RegisterType::Int32 => RegisterValue::Int32(signed() as i32),
            RegisterType::Int64 => RegisterValue::Int64(signed()),
            RegisterType::CodePtr | RegisterType::DataPtr => RegisterValue::Address(unsigned()),
            RegisterType::Float => RegisterValue::Float(f32::from_bits(unsigned() as u32)),
            RegisterType::Double => RegisterValue::Double(f64::from_bits(unsigned())),
            RegisterType::I387Ext => {
                let mut buf = [0u8; 10];
                buf.copy_from_slice(bytes);
                if order == ByteOrder::Big {
                    buf.reverse();
                }
                RegisterValue::LongDouble(buf)
            }
            RegisterType::Vec64 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                RegisterValue::Byte64(buf)
            }
            RegisterType::Vec128 => {
                let mut buf = [0u8; 16];
                buf.copy_from_slice(bytes);
                RegisterValue::Byte128(buf)
            }
        }
    }

    pub fn format(&self) -> RegisterFormat {
        self.into()
    }

    /// Nearest `f64` to an x87 extended precision value.
    pub fn long_double_to_f64(bytes: &[u8; 10]) -> f64 {
        let mut mantissa = [0u8; 8];
        mantissa.copy_from_slice(&bytes[..8]);
        let mantissa = u64::from_le_bytes(mantissa);
        let sign_exp = u16::from_le_bytes([bytes[8], bytes[9]]);

        let sign = if sign_exp & 0x8000 != 0 { -1.0 } else { 1.0 };
        let exponent = i32::from(sign_exp & 0x7fff);
        match (exponent, mantissa) {
            (0, 0) => sign * 0.0,
            (0x7fff, m) if m << 1 == 0 => sign * f64::INFINITY,
            (0x7fff, _) => f64::NAN,
            // denormals have an effective exponent of 1
            (0, m) => sign * scale(m, 1 - 16383),
            (e, m) => sign * scale(m, e - 16383),
        }
    }
}

/// `m * 2^(exp - 63)`. The mantissa is brought into `[0, 2)` first and the
/// power of two applied in halves, so no intermediate leaves f64 range before
/// the final product does.
fn scale(m: u64, exp: i32) -> f64 {
    let fraction = (m as f64) / 2f64.powi(63);
    let half = exp / 2;
    fraction * 2f64.powi(half) * 2f64.powi(exp - half)
}

fn write_bytes(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    write!(f, "{{")?;
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{b:#04x}")?;
    }
    write!(f, "}}")
}

impl fmt::Display for RegisterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use RegisterValue::*;
        match self {
            Void => write!(f, "void"),
            Uint8(v) => write!(f, "{v:#04x}"),
            Uint16(v) => write!(f, "{v:#06x}"),
            Uint32(v) => write!(f, "{v:#010x}"),
            Uint64(v) => write!(f, "{v:#018x}"),
            Int8(v) => write!(f, "{v}"),
            Int16(v) => write!(f, "{v}"),
            Int32(v) => write!(f, "{v}"),
            Int64(v) => write!(f, "{v}"),
            Address(v) => write!(f, "{v:#018x}"),
            Float(v) => write!(f, "{v}"),
            Double(v) => write!(f, "{v}"),
            LongDouble(raw) => write!(f, "{}", RegisterValue::long_double_to_f64(raw)),
            Byte64(raw) => write_bytes(f, raw),
            Byte128(raw) => write_bytes(f, raw),
        }
    }
}

/// Render a register for the user. A register the target cannot provide
/// shows as `<unavailable>`, never as a made-up value.
pub fn display_register(cache: &mut RegisterCache, regnum: usize) -> Result<String> {
    match cache.cooked_read_value(regnum) {
        Ok(value) => Ok(value.to_string()),
        Err(e) if e.is_unavailable() => Ok("<unavailable>".to_string()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_by_type_and_byte_order() {
        let bytes = [0xff, 0xfe];
        assert_eq!(
            RegisterValue::from_bytes(RegisterType::Uint16, ByteOrder::Big, &bytes),
            RegisterValue::Uint16(0xfffe)
        );
        assert_eq!(
            RegisterValue::from_bytes(RegisterType::Int16, ByteOrder::Little, &bytes),
            RegisterValue::Int16(-257)
        );

        let one = 1.5f64.to_bits().to_be_bytes();
        assert_eq!(
            RegisterValue::from_bytes(RegisterType::Double, ByteOrder::Big, &one),
            RegisterValue::Double(1.5)
        );
    }

    #[test]
    fn long_double_conversion() {
        // 1.0: explicit integer bit set, biased exponent 0x3fff
        let mut one = [0u8; 10];
        one[7] = 0x80;
        one[8] = 0xff;
        one[9] = 0x3f;
        assert_eq!(RegisterValue::long_double_to_f64(&one), 1.0);

        let mut minus_two = one;
        minus_two[8] = 0x00;
        minus_two[9] = 0xc0;
        assert_eq!(RegisterValue::long_double_to_f64(&minus_two), -2.0);

        assert_eq!(RegisterValue::long_double_to_f64(&[0; 10]), 0.0);
    }

    fn long_double(biased_exponent: u16, mantissa: u64) -> [u8; 10] {
        let mut bytes = [0u8; 10];
        bytes[..8].copy_from_slice(&mantissa.to_le_bytes());
        bytes[8..].copy_from_slice(&biased_exponent.to_le_bytes());
        bytes
    }

    #[test]
    fn long_double_near_the_bottom_of_f64_range() {
        let one = 1u64 << 63;
        // 2^-1020 is a normal f64 even though 2^(-1020 - 63) is not
        assert_eq!(
            RegisterValue::long_double_to_f64(&long_double(16383 - 1020, one)),
            2f64.powi(-1020)
        );
        assert_eq!(
            RegisterValue::long_double_to_f64(&long_double(16383 - 1022, one | (1 << 62))),
            1.5 * 2f64.powi(-1022)
        );
        // smallest f64 subnormal
        assert_eq!(
            RegisterValue::long_double_to_f64(&long_double(16383 - 1074, one)),
            f64::from_bits(1)
        );
        // too small for any f64
        assert_eq!(RegisterValue::long_double_to_f64(&long_double(1, one)), 0.0);
    }

    #[test]
    fn long_double_near_the_top_of_f64_range() {
        let one = 1u64 << 63;
        assert_eq!(
            RegisterValue::long_double_to_f64(&long_double(16383 + 1023, one)),
            2f64.powi(1023)
        );
        assert_eq!(
            RegisterValue::long_double_to_f64(&long_double(16383 + 1024, one)),
            f64::INFINITY
        );
    }

    #[test]
    fn display_formats() {
        assert_eq!(RegisterValue::Uint32(0x2a).to_string(), "0x0000002a");
        assert_eq!(RegisterValue::Int8(-3).to_string(), "-3");
        assert_eq!(RegisterValue::Byte64([1, 0, 0, 0, 0, 0, 0, 0xff]).to_string(),
            "{0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff}");
        assert_eq!(RegisterValue::Uint8(7).format(), RegisterFormat::Uint8);
    }
}
