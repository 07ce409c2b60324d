// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Deterministic argument encoding
//!
//! [`to_canonical_bytes`] writes the bincode wire layout (fixed-width little
//! endian integers, `u64` length prefixes, `u32` variant tags) with two
//! differences:
//! - map entries are written sorted by their encoded key, so a `HashMap`
//!   encodes the same way whatever order its entries are iterated in;
//! - every NaN is written as the one canonical NaN.
//!
//! Sequences keep their order. A `HashSet` is indistinguishable from a `Vec`
//! at this level, so unordered sets must be passed as `BTreeSet`.
//!
//! The output decodes with bincode, which is how [`decode_exact`] reads
//! keyword values back.

use crate::error::{CacheError, CacheResult};
use bincode::Options;
use serde::de::DeserializeOwned;
use serde::ser::{self, Serialize};

impl ser::Error for CacheError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        CacheError::Serialization(msg.to_string())
    }
}

/// Encode `value` deterministically
pub fn to_canonical_bytes<T: Serialize + ?Sized>(value: &T) -> CacheResult<Vec<u8>> {
    let mut encoder = Encoder::default();
    value.serialize(&mut encoder)?;
    Ok(encoder.out)
}

/// Decode bytes produced by [`to_canonical_bytes`]
///
/// Trailing bytes are an error, which catches most reads with the wrong type.
pub fn decode_exact<T: DeserializeOwned>(bytes: &[u8]) -> CacheResult<T> {
    Ok(bincode::options()
        .with_fixint_encoding()
        .reject_trailing_bytes()
        .deserialize(bytes)?)
}

#[derive(Default)]
struct Encoder {
    out: Vec<u8>,
}

impl Encoder {
    fn put(&mut self, bytes: &[u8]) {
        self.out.extend_from_slice(bytes);
    }

    fn put_len(&mut self, len: usize) {
        self.put(&(len as u64).to_le_bytes());
    }

    fn put_tag(&mut self, variant_index: u32) {
        self.put(&variant_index.to_le_bytes());
    }
}

impl<'a> ser::Serializer for &'a mut Encoder {
    type Ok = ();
    type Error = CacheError;
    type SerializeSeq = SeqEncoder<'a>;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = MapEncoder<'a>;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn serialize_bool(self, v: bool) -> CacheResult<()> {
        self.out.push(v as u8);
        Ok(())
    }

    fn serialize_i8(self, v: i8) -> CacheResult<()> {
        self.put(&v.to_le_bytes());
        Ok(())
    }

    fn serialize_i16(self, v: i16) -> CacheResult<()> {
        self.put(&v.to_le_bytes());
        Ok(())
    }

    fn serialize_i32(self, v: i32) -> CacheResult<()> {
        self.put(&v.to_le_bytes());
        Ok(())
    }

    fn serialize_i64(self, v: i64) -> CacheResult<()> {
        self.put(&v.to_le_bytes());
        Ok(())
    }

    fn serialize_i128(self, v: i128) -> CacheResult<()> {
        self.put(&v.to_le_bytes());
        Ok(())
    }

    fn serialize_u8(self, v: u8) -> CacheResult<()> {
        self.out.push(v);
        Ok(())
    }

    fn serialize_u16(self, v: u16) -> CacheResult<()> {
        self.put(&v.to_le_bytes());
        Ok(())
    }

    fn serialize_u32(self, v: u32) -> CacheResult<()> {
        self.put(&v.to_le_bytes());
        Ok(())
    }

    fn serialize_u64(self, v: u64) -> CacheResult<()> {
        self.put(&v.to_le_bytes());
        Ok(())
    }

    fn serialize_u128(self, v: u128) -> CacheResult<()> {
        self.put(&v.to_le_bytes());
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> CacheResult<()> {
        let v = if v.is_nan() { f32::NAN } else { v };
        self.put(&v.to_le_bytes());
        Ok(())
    }

    fn serialize_f64(self, v: f64) -> CacheResult<()> {
        let v = if v.is_nan() { f64::NAN } else { v };
        self.put(&v.to_le_bytes());
        Ok(())
    }

    fn serialize_char(self, v: char) -> CacheResult<()> {
        let mut buf = [0u8; 4];
        self.put(v.encode_utf8(&mut buf).as_bytes());
        Ok(())
    }

    fn serialize_str(self, v: &str) -> CacheResult<()> {
        self.put_len(v.len());
        self.put(v.as_bytes());
        Ok(())
    }

    fn serialize_bytes(self, v: &[u8]) -> CacheResult<()> {
        self.put_len(v.len());
        self.put(v);
        Ok(())
    }

    fn serialize_none(self) -> CacheResult<()> {
        self.out.push(0);
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> CacheResult<()> {
        self.out.push(1);
        value.serialize(self)
    }

    fn serialize_unit(self) -> CacheResult<()> {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> CacheResult<()> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
    ) -> CacheResult<()> {
        self.put_tag(variant_index);
        Ok(())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> CacheResult<()> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
        value: &T,
    ) -> CacheResult<()> {
        self.put_tag(variant_index);
        value.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> CacheResult<SeqEncoder<'a>> {
        // Length is patched in at the end, so unsized sequences work too
        let start = self.out.len();
        self.put(&[0; 8]);
        Ok(SeqEncoder {
            encoder: self,
            start,
            count: 0,
        })
    }

    fn serialize_tuple(self, _len: usize) -> CacheResult<Self> {
        Ok(self)
    }

    fn serialize_tuple_struct(self, _name: &'static str, _len: usize) -> CacheResult<Self> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> CacheResult<Self> {
        self.put_tag(variant_index);
        Ok(self)
    }

    fn serialize_map(self, _len: Option<usize>) -> CacheResult<MapEncoder<'a>> {
        Ok(MapEncoder {
            encoder: self,
            entries: Vec::new(),
            pending_key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> CacheResult<Self> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> CacheResult<Self> {
        self.put_tag(variant_index);
        Ok(self)
    }
}

struct SeqEncoder<'a> {
    encoder: &'a mut Encoder,
    start: usize,
    count: u64,
}

impl ser::SerializeSeq for SeqEncoder<'_> {
    type Ok = ();
    type Error = CacheError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> CacheResult<()> {
        self.count += 1;
        value.serialize(&mut *self.encoder)
    }

    fn end(self) -> CacheResult<()> {
        self.encoder.out[self.start..self.start + 8].copy_from_slice(&self.count.to_le_bytes());
        Ok(())
    }
}

/// Buffers entries so they can be written in key order
struct MapEncoder<'a> {
    encoder: &'a mut Encoder,
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    pending_key: Option<Vec<u8>>,
}

impl ser::SerializeMap for MapEncoder<'_> {
    type Ok = ();
    type Error = CacheError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> CacheResult<()> {
        self.pending_key = Some(to_canonical_bytes(key)?);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> CacheResult<()> {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| CacheError::Serialization("map value without a key".to_string()))?;
        self.entries.push((key, to_canonical_bytes(value)?));
        Ok(())
    }

    fn end(self) -> CacheResult<()> {
        let MapEncoder {
            encoder,
            mut entries,
            ..
        } = self;
        entries.sort();
        encoder.put_len(entries.len());
        for (key, value) in entries {
            encoder.put(&key);
            encoder.put(&value);
        }
        Ok(())
    }
}

impl ser::SerializeTuple for &mut Encoder {
    type Ok = ();
    type Error = CacheError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> CacheResult<()> {
        value.serialize(&mut **self)
    }

    fn end(self) -> CacheResult<()> {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for &mut Encoder {
    type Ok = ();
    type Error = CacheError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> CacheResult<()> {
        value.serialize(&mut **self)
    }

    fn end(self) -> CacheResult<()> {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for &mut Encoder {
    type Ok = ();
    type Error = CacheError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> CacheResult<()> {
        value.serialize(&mut **self)
    }

    fn end(self) -> CacheResult<()> {
        Ok(())
    }
}

impl ser::SerializeStruct for &mut Encoder {
    type Ok = ();
    type Error = CacheError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> CacheResult<()> {
        value.serialize(&mut **self)
    }

    fn end(self) -> CacheResult<()> {
        Ok(())
    }
}

impl ser::SerializeStructVariant for &mut Encoder {
    type Ok = ();
    type Error = CacheError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> CacheResult<()> {
        value.serialize(&mut **self)
    }

    fn end(self) -> CacheResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize, Serializer};
    use std::collections::{BTreeMap, HashMap};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    enum Shape {
        Point,
        Circle(f64),
        Rect { w: u16, h: u16 },
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Job {
        id: u64,
        name: String,
        tags: Vec<char>,
        shape: Shape,
        parent: Option<i128>,
    }

    fn job() -> Job {
        Job {
            id: 42,
            name: "nightly".to_string(),
            tags: vec!['a', 'é'],
            shape: Shape::Rect { w: 3, h: 4 },
            parent: Some(-7),
        }
    }

    #[test]
    fn test_layout_matches_bincode_without_maps() {
        let value = (job(), Shape::Circle(1.5), Shape::Point, ());
        assert_eq!(
            to_canonical_bytes(&value).unwrap(),
            bincode::serialize(&value).unwrap()
        );
    }

    #[test]
    fn test_hash_map_order_does_not_matter() {
        let encodings: std::collections::HashSet<Vec<u8>> = (0..20)
            .map(|_| {
                let map: HashMap<String, i32> = (0..16).map(|i| (format!("k{i}"), i)).collect();
                to_canonical_bytes(&map).unwrap()
            })
            .collect();
        assert_eq!(encodings.len(), 1);

        let sorted: BTreeMap<String, i32> = (0..16).map(|i| (format!("k{i}"), i)).collect();
        assert!(encodings.contains(&to_canonical_bytes(&sorted).unwrap()));
    }

    #[test]
    fn test_maps_decode_with_bincode() {
        let map: HashMap<u8, Vec<String>> =
            [(2, vec!["b".to_string()]), (1, vec![])].into_iter().collect();
        let back: HashMap<u8, Vec<String>> = decode_exact(&to_canonical_bytes(&map).unwrap()).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_unsized_sequence_gets_its_length() {
        struct Evens;
        impl Serialize for Evens {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_seq((0u32..10).filter(|n| n % 2 == 0))
            }
        }

        let back: Vec<u32> = decode_exact(&to_canonical_bytes(&Evens).unwrap()).unwrap();
        assert_eq!(back, vec![0, 2, 4, 6, 8]);
    }

    #[test]
    fn test_nan_is_canonical() {
        let quiet = to_canonical_bytes(&f64::NAN).unwrap();
        assert_eq!(to_canonical_bytes(&-f64::NAN).unwrap(), quiet);
        assert_eq!(to_canonical_bytes(&f64::from_bits(0x7ff8_dead_beef_0001)).unwrap(), quiet);
        assert_ne!(to_canonical_bytes(&f64::INFINITY).unwrap(), quiet);
    }

    #[test]
    fn test_trailing_bytes_are_rejected() {
        let bytes = to_canonical_bytes(&"abc").unwrap();
        assert!(decode_exact::<u32>(&bytes).is_err());
        assert_eq!(decode_exact::<String>(&bytes).unwrap(), "abc");
    }

    #[test]
    fn test_custom_serialize_error_is_serialization() {
        struct Refuses;
        impl Serialize for Refuses {
            fn serialize<S: Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
                Err(ser::Error::custom("handle cannot be encoded"))
            }
        }

        let err = to_canonical_bytes(&(1, Refuses)).unwrap_err();
        assert!(matches!(err, CacheError::Serialization(ref m) if m.contains("handle")));
    }
}
