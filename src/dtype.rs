//! Element data types

use std::fmt;

use bytemuck::Pod;
use serde::{Deserialize, Serialize};

/// Scalar type stored in one field element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl DataType {
    /// Size of one element in bytes
    pub const fn size(self) -> usize {
        match self {
            DataType::I8 | DataType::U8 => 1,
            DataType::I16 | DataType::U16 => 2,
            DataType::I32 | DataType::U32 | DataType::F32 => 4,
            DataType::I64 | DataType::U64 | DataType::F64 => 8,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            DataType::I8 => "i8",
            DataType::I16 => "i16",
            DataType::I32 => "i32",
            DataType::I64 => "i64",
            DataType::U8 => "u8",
            DataType::U16 => "u16",
            DataType::U32 => "u32",
            DataType::U64 => "u64",
            DataType::F32 => "f32",
            DataType::F64 => "f64",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rust scalar that can be read from and written to a field
pub trait Element: Pod {
    const DTYPE: DataType;
}

macro_rules! impl_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: DataType = DataType::$dtype;
            }
        )*
    };
}

impl_element! {
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes_match_rust_types() {
        assert_eq!(<f32 as Element>::DTYPE.size(), std::mem::size_of::<f32>());
        assert_eq!(<u8 as Element>::DTYPE.size(), std::mem::size_of::<u8>());
        assert_eq!(<i64 as Element>::DTYPE.size(), std::mem::size_of::<i64>());
        assert_eq!(<u16 as Element>::DTYPE.size(), std::mem::size_of::<u16>());
    }

    #[test]
    fn test_serde_names() {
        let dtype: DataType = serde_json::from_str("\"f64\"").unwrap();
        assert_eq!(dtype, DataType::F64);
        assert_eq!(serde_json::to_string(&DataType::U16).unwrap(), "\"u16\"");
    }
}
