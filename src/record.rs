//! Caller-shaped record materialization.
//!
//! A lookup projects the decoded map into either a record struct
//! declared with [`record!`](crate::record!) or the dynamic
//! [`Value`] fallback. Both shapes share the primitive readers in
//! [`Decoder`]; the structured path additionally matches wire keys
//! against declared field names and can skip unwanted top-level
//! fields without allocating.

use crate::decoder::Decoder;
use crate::error::Result;
use crate::value::{Map, Value};

/// Options accepted by `lookup` and `within`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LookupOptions<'a> {
    /// Top-level fields to decode; `None` decodes all fields.
    pub only: Option<&'a [&'a str]>,
}

impl<'a> LookupOptions<'a> {
    /// Decode only the named top-level fields.
    pub fn only(fields: &'a [&'a str]) -> Self {
        LookupOptions {
            only: Some(fields),
        }
    }
}

/// Types decodable from a single data-section value.
///
/// Implemented for the primitive Rust bindings of every wire type,
/// for `Vec<T>` (wire arrays), for [`Map`] (wire maps), for
/// [`Value`], and by [`record!`](crate::record!) for record structs.
pub trait FromData<'a>: Sized {
    /// Decode one value at `cursor`, advancing it past the value.
    fn from_data(dec: &Decoder<'a>, cursor: &mut usize) -> Result<Self>;
}

/// Record shapes a lookup can produce.
///
/// Implemented by [`record!`](crate::record!)-declared structs and by
/// [`Value`] (the dynamic fallback). The projection applies to the
/// outermost map only; nested values always decode in full.
pub trait Record<'a>: FromData<'a> {
    /// Decode one record at `cursor`, honoring the projection.
    fn read(dec: &Decoder<'a>, cursor: &mut usize, only: Option<&[&str]>) -> Result<Self>;
}

impl<'a> FromData<'a> for &'a str {
    fn from_data(dec: &Decoder<'a>, cursor: &mut usize) -> Result<Self> {
        dec.read_str(cursor)
    }
}

impl<'a> FromData<'a> for &'a [u8] {
    fn from_data(dec: &Decoder<'a>, cursor: &mut usize) -> Result<Self> {
        dec.read_bytes(cursor)
    }
}

impl<'a> FromData<'a> for bool {
    fn from_data(dec: &Decoder<'a>, cursor: &mut usize) -> Result<Self> {
        dec.read_bool(cursor)
    }
}

impl<'a> FromData<'a> for u16 {
    fn from_data(dec: &Decoder<'a>, cursor: &mut usize) -> Result<Self> {
        dec.read_u16(cursor)
    }
}

impl<'a> FromData<'a> for u32 {
    fn from_data(dec: &Decoder<'a>, cursor: &mut usize) -> Result<Self> {
        dec.read_u32(cursor)
    }
}

impl<'a> FromData<'a> for i32 {
    fn from_data(dec: &Decoder<'a>, cursor: &mut usize) -> Result<Self> {
        dec.read_i32(cursor)
    }
}

impl<'a> FromData<'a> for u64 {
    fn from_data(dec: &Decoder<'a>, cursor: &mut usize) -> Result<Self> {
        dec.read_u64(cursor)
    }
}

impl<'a> FromData<'a> for u128 {
    fn from_data(dec: &Decoder<'a>, cursor: &mut usize) -> Result<Self> {
        dec.read_u128(cursor)
    }
}

impl<'a> FromData<'a> for f32 {
    fn from_data(dec: &Decoder<'a>, cursor: &mut usize) -> Result<Self> {
        dec.read_f32(cursor)
    }
}

impl<'a> FromData<'a> for f64 {
    fn from_data(dec: &Decoder<'a>, cursor: &mut usize) -> Result<Self> {
        dec.read_f64(cursor)
    }
}

impl<'a> FromData<'a> for Value<'a> {
    fn from_data(dec: &Decoder<'a>, cursor: &mut usize) -> Result<Self> {
        dec.read_value(cursor)
    }
}

impl<'a, T: FromData<'a>> FromData<'a> for Vec<T> {
    fn from_data(dec: &Decoder<'a>, cursor: &mut usize) -> Result<Self> {
        let mut items = Vec::new();
        dec.read_array_items(cursor, crate::Error::ExpectedArray, |cur| {
            items.push(T::from_data(dec, cur)?);
            Ok(())
        })?;
        Ok(items)
    }
}

impl<'a, V: FromData<'a>> FromData<'a> for Map<'a, V> {
    fn from_data(dec: &Decoder<'a>, cursor: &mut usize) -> Result<Self> {
        let mut entries = Vec::new();
        dec.read_map_entries(cursor, crate::Error::ExpectedMap, |key, cur| {
            entries.push((key, V::from_data(dec, cur)?));
            Ok(())
        })?;
        Ok(Map(entries))
    }
}

impl<'a> Record<'a> for Value<'a> {
    fn read(dec: &Decoder<'a>, cursor: &mut usize, only: Option<&[&str]>) -> Result<Self> {
        match only {
            Some(names) => dec.read_value_filtered(cursor, names),
            None => dec.read_value(cursor),
        }
    }
}

/// Fold a projection name set into a bitmask over the declared
/// fields. `None` selects everything.
#[doc(hidden)]
pub fn field_mask(fields: &[&str], only: Option<&[&str]>) -> u64 {
    match only {
        None => u64::MAX,
        Some(names) => {
            let mut mask = 0u64;
            for (idx, field) in fields.iter().take(64).enumerate() {
                if names.contains(field) {
                    mask |= 1 << idx;
                }
            }
            mask
        }
    }
}

/// Whether `key` names a declared field that survives the projection.
/// Fields past the 64-bit mask are always decoded.
#[doc(hidden)]
pub fn field_selected(fields: &[&str], mask: u64, key: &str) -> bool {
    match fields.iter().position(|f| *f == key) {
        Some(idx) => idx >= 64 || (mask >> idx) & 1 == 1,
        None => false,
    }
}

/// Declare a record struct decodable by `Reader::lookup` and
/// `Reader::within`.
///
/// Field names double as wire keys. Fields whose name starts with an
/// underscore are bookkeeping and are never decoded; wire keys with
/// no matching field are skipped; fields absent from the wire keep
/// their `Default` value. Field types are anything implementing
/// [`FromData`], including other `record!` structs (which decode in
/// full, ignoring the projection).
///
/// ```
/// use mmdb_reader::{record, Map};
///
/// record! {
///     pub struct Country<'a> {
///         pub iso_code: &'a str,
///         pub geoname_id: u32,
///         pub names: Map<'a, &'a str>,
///     }
/// }
/// ```
#[macro_export]
macro_rules! record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident<'a> {
            $( $(#[$fmeta:meta])* $fvis:vis $field:ident : $ftype:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        $vis struct $name<'a> {
            $( $(#[$fmeta])* $fvis $field : $ftype, )*
        }

        impl<'a> $name<'a> {
            /// Declared field names, in declaration order.
            #[doc(hidden)]
            pub const FIELDS: &'static [&'static str] = &[ $( stringify!($field) ),* ];

            #[doc(hidden)]
            pub fn __read_map(
                dec: &$crate::Decoder<'a>,
                cursor: &mut usize,
                only: ::core::option::Option<&[&str]>,
                mismatch: $crate::Error,
            ) -> $crate::Result<Self> {
                let mask = $crate::record::field_mask(Self::FIELDS, only);
                let mut out = Self::default();
                dec.read_map_entries(cursor, mismatch, |key, cur| {
                    if !key.starts_with('_')
                        && $crate::record::field_selected(Self::FIELDS, mask, key)
                    {
                        $(
                            if key == stringify!($field) {
                                out.$field = $crate::FromData::from_data(dec, cur)?;
                                return Ok(());
                            }
                        )*
                    }
                    dec.skip_value(cur)
                })?;
                Ok(out)
            }
        }

        impl<'a> $crate::FromData<'a> for $name<'a> {
            fn from_data(dec: &$crate::Decoder<'a>, cursor: &mut usize) -> $crate::Result<Self> {
                Self::__read_map(dec, cursor, ::core::option::Option::None, $crate::Error::ExpectedMap)
            }
        }

        impl<'a> $crate::Record<'a> for $name<'a> {
            fn read(
                dec: &$crate::Decoder<'a>,
                cursor: &mut usize,
                only: ::core::option::Option<&[&str]>,
            ) -> $crate::Result<Self> {
                Self::__read_map(dec, cursor, only, $crate::Error::ExpectedStructType)
            }
        }
    };

    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $(#[$fmeta:meta])* $fvis:vis $field:ident : $ftype:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        $vis struct $name {
            $( $(#[$fmeta])* $fvis $field : $ftype, )*
        }

        impl $name {
            /// Declared field names, in declaration order.
            #[doc(hidden)]
            pub const FIELDS: &'static [&'static str] = &[ $( stringify!($field) ),* ];

            #[doc(hidden)]
            pub fn __read_map<'a>(
                dec: &$crate::Decoder<'a>,
                cursor: &mut usize,
                only: ::core::option::Option<&[&str]>,
                mismatch: $crate::Error,
            ) -> $crate::Result<Self> {
                let mask = $crate::record::field_mask(Self::FIELDS, only);
                let mut out = Self::default();
                dec.read_map_entries(cursor, mismatch, |key, cur| {
                    if !key.starts_with('_')
                        && $crate::record::field_selected(Self::FIELDS, mask, key)
                    {
                        $(
                            if key == stringify!($field) {
                                out.$field = $crate::FromData::from_data(dec, cur)?;
                                return Ok(());
                            }
                        )*
                    }
                    dec.skip_value(cur)
                })?;
                Ok(out)
            }
        }

        impl<'a> $crate::FromData<'a> for $name {
            fn from_data(dec: &$crate::Decoder<'a>, cursor: &mut usize) -> $crate::Result<Self> {
                Self::__read_map(dec, cursor, ::core::option::Option::None, $crate::Error::ExpectedMap)
            }
        }

        impl<'a> $crate::Record<'a> for $name {
            fn read(
                dec: &$crate::Decoder<'a>,
                cursor: &mut usize,
                only: ::core::option::Option<&[&str]>,
            ) -> $crate::Result<Self> {
                Self::__read_map(dec, cursor, only, $crate::Error::ExpectedStructType)
            }
        }
    };
}
