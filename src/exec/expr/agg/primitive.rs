// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
use std::fmt;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float32Array, Float64Array, Int8Array, Int16Array, Int32Array,
    Int64Array,
};
use arrow::datatypes::DataType;

use crate::exec::expr::agg::layout::SlotType;
use crate::exec::expr::scalar::{self, ScalarValue};

/// A fixed-width value that can live in a state record slot.
///
/// `NULL` is the type's sentinel from the table in [`scalar`]; Arrow nulls
/// read from input become `NULL`.
pub trait SlotPrimitive: Copy + PartialOrd + Send + Sync + fmt::Debug + 'static {
    const SLOT: SlotType;
    const NULL: Self;

    fn data_type() -> DataType;

    /// False for every value of types without an out-of-band sentinel.
    fn is_null(self) -> bool;

    fn load(bytes: &[u8]) -> Self;

    fn store(self, bytes: &mut [u8]);

    fn read_column(array: &dyn Array, row: usize) -> Result<Self, String>;

    fn into_scalar(self) -> ScalarValue;

    fn build_array(values: Vec<Self>) -> ArrayRef;
}

macro_rules! impl_numeric_slot {
    ($ty:ty, $slot:ident, $null:expr, $dt:ident, $array:ty, $scalar:ident, |$v:ident| $is_null:expr) => {
        impl SlotPrimitive for $ty {
            const SLOT: SlotType = SlotType::$slot;
            const NULL: Self = $null;

            fn data_type() -> DataType {
                DataType::$dt
            }

            fn is_null(self) -> bool {
                let $v = self;
                $is_null
            }

            fn load(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                buf.copy_from_slice(&bytes[..std::mem::size_of::<$ty>()]);
                <$ty>::from_le_bytes(buf)
            }

            fn store(self, bytes: &mut [u8]) {
                bytes[..std::mem::size_of::<$ty>()].copy_from_slice(&self.to_le_bytes());
            }

            fn read_column(array: &dyn Array, row: usize) -> Result<Self, String> {
                let typed = array.as_any().downcast_ref::<$array>().ok_or_else(|| {
                    format!(
                        "expected {} input, got {:?}",
                        stringify!($dt),
                        array.data_type()
                    )
                })?;
                if row >= typed.len() {
                    return Err(format!("row {} out of range {}", row, typed.len()));
                }
                if typed.is_null(row) {
                    Ok(Self::NULL)
                } else {
                    Ok(typed.value(row))
                }
            }

            fn into_scalar(self) -> ScalarValue {
                ScalarValue::$scalar(self)
            }

            fn build_array(values: Vec<Self>) -> ArrayRef {
                Arc::new(<$array>::from(values))
            }
        }
    };
}

impl_numeric_slot!(i8, Byte, scalar::BYTE_NULL, Int8, Int8Array, Int8, |_v| false);
impl_numeric_slot!(i16, Short, scalar::SHORT_NULL, Int16, Int16Array, Int16, |_v| false);
impl_numeric_slot!(i32, Int, scalar::INT_NULL, Int32, Int32Array, Int32, |v| v == scalar::INT_NULL);
impl_numeric_slot!(i64, Long, scalar::LONG_NULL, Int64, Int64Array, Int64, |v| v == scalar::LONG_NULL);
impl_numeric_slot!(f32, Float, scalar::FLOAT_NULL, Float32, Float32Array, Float32, |v| v.is_nan());
impl_numeric_slot!(f64, Double, scalar::DOUBLE_NULL, Float64, Float64Array, Float64, |v| v.is_nan());

impl SlotPrimitive for bool {
    const SLOT: SlotType = SlotType::Bool;
    const NULL: Self = scalar::BOOL_NULL;

    fn data_type() -> DataType {
        DataType::Boolean
    }

    fn is_null(self) -> bool {
        false
    }

    fn load(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    fn store(self, bytes: &mut [u8]) {
        bytes[0] = u8::from(self);
    }

    fn read_column(array: &dyn Array, row: usize) -> Result<Self, String> {
        let typed = array
            .as_any()
            .downcast_ref::<BooleanArray>()
            .ok_or_else(|| format!("expected Boolean input, got {:?}", array.data_type()))?;
        if row >= typed.len() {
            return Err(format!("row {} out of range {}", row, typed.len()));
        }
        Ok(if typed.is_null(row) {
            Self::NULL
        } else {
            typed.value(row)
        })
    }

    fn into_scalar(self) -> ScalarValue {
        ScalarValue::Boolean(self)
    }

    fn build_array(values: Vec<Self>) -> ArrayRef {
        Arc::new(BooleanArray::from(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_column_maps_arrow_null() {
        let ints = Int32Array::from(vec![Some(3), None]);
        assert_eq!(i32::read_column(&ints, 0).unwrap(), 3);
        assert!(i32::read_column(&ints, 1).unwrap().is_null());
        let bytes = Int8Array::from(vec![None]);
        assert_eq!(i8::read_column(&bytes, 0).unwrap(), 0);
        assert!(!i8::read_column(&bytes, 0).unwrap().is_null());
        assert!(i64::read_column(&ints, 0).is_err());
    }

    #[test]
    fn test_load_store_little_endian() {
        let mut bytes = [0u8; 8];
        (-2_i64).store(&mut bytes);
        assert_eq!(i64::load(&bytes), -2);
        f32::NAN.store(&mut bytes);
        assert!(f32::load(&bytes).is_null());
        true.store(&mut bytes);
        assert!(bool::load(&bytes));
    }
}
