use crate::error::DecodeError;

/// Numeric interpretation applied to the raw bytes of a successful read
///
/// Any tag other than the eight recognised ones maps onto [`DecodeType::Unrecognized`],
/// which always decodes to an empty string.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum DecodeType {
    /// unsigned 16-bit integer
    #[default]
    Uint16,
    /// signed 16-bit integer
    Int16,
    /// unsigned 32-bit integer
    Uint32,
    /// signed 32-bit integer
    Int32,
    /// unsigned 64-bit integer
    Uint64,
    /// signed 64-bit integer
    Int64,
    /// IEEE-754 single precision
    Float32,
    /// IEEE-754 double precision
    Float64,
    /// tag that is not one of the above, kept verbatim
    Unrecognized(String),
}

impl DecodeType {
    /// Map a textual tag (`uint16`, `float32`, ...) to a decode type
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "uint16" => DecodeType::Uint16,
            "int16" => DecodeType::Int16,
            "uint32" => DecodeType::Uint32,
            "int32" => DecodeType::Int32,
            "uint64" => DecodeType::Uint64,
            "int64" => DecodeType::Int64,
            "float32" => DecodeType::Float32,
            "float64" => DecodeType::Float64,
            other => DecodeType::Unrecognized(other.to_string()),
        }
    }

    /// The textual tag of the type
    pub fn tag(&self) -> &str {
        match self {
            DecodeType::Uint16 => "uint16",
            DecodeType::Int16 => "int16",
            DecodeType::Uint32 => "uint32",
            DecodeType::Int32 => "int32",
            DecodeType::Uint64 => "uint64",
            DecodeType::Int64 => "int64",
            DecodeType::Float32 => "float32",
            DecodeType::Float64 => "float64",
            DecodeType::Unrecognized(tag) => tag.as_str(),
        }
    }

    /// Number of leading bytes consumed, `None` for an unrecognized tag
    pub fn width(&self) -> Option<usize> {
        match self {
            DecodeType::Uint16 | DecodeType::Int16 => Some(2),
            DecodeType::Uint32 | DecodeType::Int32 | DecodeType::Float32 => Some(4),
            DecodeType::Uint64 | DecodeType::Int64 | DecodeType::Float64 => Some(8),
            DecodeType::Unrecognized(_) => None,
        }
    }

    /// True for one of the eight recognised tags
    pub fn is_recognized(&self) -> bool {
        self.width().is_some()
    }
}

impl std::fmt::Display for DecodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl std::str::FromStr for DecodeType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(DecodeType::from_tag(s))
    }
}

/// Interpret the leading bytes of `raw` as a big-endian value of the given type
///
/// Only the first value is rendered, trailing bytes are ignored. Floats use the shortest
/// representation that round-trips, never exponent notation.
pub fn decode(raw: &[u8], decode_type: &DecodeType) -> Result<String, DecodeError> {
    let width = match decode_type.width() {
        Some(x) => x,
        None => return Ok(String::new()),
    };

    let bytes = raw.get(..width).ok_or(DecodeError::InsufficientData {
        needed: width,
        actual: raw.len(),
    })?;

    let text = match decode_type {
        DecodeType::Uint16 => u16::from_be_bytes(take(bytes)).to_string(),
        DecodeType::Int16 => i16::from_be_bytes(take(bytes)).to_string(),
        DecodeType::Uint32 => u32::from_be_bytes(take(bytes)).to_string(),
        DecodeType::Int32 => i32::from_be_bytes(take(bytes)).to_string(),
        DecodeType::Uint64 => u64::from_be_bytes(take(bytes)).to_string(),
        DecodeType::Int64 => i64::from_be_bytes(take(bytes)).to_string(),
        DecodeType::Float32 => f32::from_be_bytes(take(bytes)).to_string(),
        DecodeType::Float64 => f64::from_be_bytes(take(bytes)).to_string(),
        DecodeType::Unrecognized(_) => String::new(),
    };

    Ok(text)
}

// caller has already sliced exactly N bytes
fn take<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut array = [0; N];
    array.copy_from_slice(bytes);
    array
}
