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
//! Typed scalar read surface shared by group-by and analytic functions.
//!
//! Null policy per primitive type:
//!
//! | type    | sentinel    | out-of-band |
//! |---------|-------------|-------------|
//! | bool    | `false`     | no          |
//! | byte    | `0`         | no          |
//! | short   | `0`         | no          |
//! | int     | `i32::MIN`  | yes         |
//! | long    | `i64::MIN`  | yes         |
//! | float   | `NaN`       | yes         |
//! | double  | `NaN`       | yes         |
//! | string  | absent      | yes         |
//!
//! Types without an out-of-band value fall back to their zero, so "no value"
//! and a real zero are indistinguishable there. Arrow nulls read from input
//! columns collapse to the sentinel of the column type.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float32Array, Float64Array, Int8Array, Int16Array, Int32Array,
    Int64Array, StringArray,
};
use arrow::datatypes::DataType;

pub const BOOL_NULL: bool = false;
pub const BYTE_NULL: i8 = 0;
pub const SHORT_NULL: i16 = 0;
pub const INT_NULL: i32 = i32::MIN;
pub const LONG_NULL: i64 = i64::MIN;
pub const FLOAT_NULL: f32 = f32::NAN;
pub const DOUBLE_NULL: f64 = f64::NAN;

#[derive(Clone, Debug, PartialEq)]
pub enum ScalarValue {
    Boolean(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Utf8(Option<String>),
}

/// Whether functions can read and emit values of `data_type`.
pub fn is_supported_value_type(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Boolean
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::Float32
            | DataType::Float64
            | DataType::Utf8
    )
}

fn downcast<'a, T: 'static>(array: &'a dyn Array, what: &str) -> Result<&'a T, String> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| format!("failed to downcast to {what}"))
}

impl ScalarValue {
    /// Sentinel of `data_type`.
    pub fn null_of(data_type: &DataType) -> Result<Self, String> {
        Ok(match data_type {
            DataType::Boolean => Self::Boolean(BOOL_NULL),
            DataType::Int8 => Self::Int8(BYTE_NULL),
            DataType::Int16 => Self::Int16(SHORT_NULL),
            DataType::Int32 => Self::Int32(INT_NULL),
            DataType::Int64 => Self::Int64(LONG_NULL),
            DataType::Float32 => Self::Float32(FLOAT_NULL),
            DataType::Float64 => Self::Float64(DOUBLE_NULL),
            DataType::Utf8 => Self::Utf8(None),
            other => return Err(format!("unsupported scalar type: {:?}", other)),
        })
    }

    /// Read `array[row]`, mapping an Arrow null to the type's sentinel.
    pub fn from_array(array: &dyn Array, row: usize) -> Result<Self, String> {
        if row >= array.len() {
            return Err(format!(
                "row {} out of range for array of length {}",
                row,
                array.len()
            ));
        }
        if array.is_null(row) {
            return Self::null_of(array.data_type());
        }
        Ok(match array.data_type() {
            DataType::Boolean => {
                Self::Boolean(downcast::<BooleanArray>(array, "BooleanArray")?.value(row))
            }
            DataType::Int8 => Self::Int8(downcast::<Int8Array>(array, "Int8Array")?.value(row)),
            DataType::Int16 => Self::Int16(downcast::<Int16Array>(array, "Int16Array")?.value(row)),
            DataType::Int32 => Self::Int32(downcast::<Int32Array>(array, "Int32Array")?.value(row)),
            DataType::Int64 => Self::Int64(downcast::<Int64Array>(array, "Int64Array")?.value(row)),
            DataType::Float32 => {
                Self::Float32(downcast::<Float32Array>(array, "Float32Array")?.value(row))
            }
            DataType::Float64 => {
                Self::Float64(downcast::<Float64Array>(array, "Float64Array")?.value(row))
            }
            DataType::Utf8 => Self::Utf8(Some(
                downcast::<StringArray>(array, "StringArray")?
                    .value(row)
                    .to_string(),
            )),
            other => return Err(format!("unsupported scalar type: {:?}", other)),
        })
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Self::Boolean(_) => DataType::Boolean,
            Self::Int8(_) => DataType::Int8,
            Self::Int16(_) => DataType::Int16,
            Self::Int32(_) => DataType::Int32,
            Self::Int64(_) => DataType::Int64,
            Self::Float32(_) => DataType::Float32,
            Self::Float64(_) => DataType::Float64,
            Self::Utf8(_) => DataType::Utf8,
        }
    }

    /// True only for types with an out-of-band sentinel holding it.
    pub fn is_null(&self) -> bool {
        match self {
            Self::Boolean(_) | Self::Int8(_) | Self::Int16(_) => false,
            Self::Int32(v) => *v == INT_NULL,
            Self::Int64(v) => *v == LONG_NULL,
            Self::Float32(v) => v.is_nan(),
            Self::Float64(v) => v.is_nan(),
            Self::Utf8(v) => v.is_none(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i8(&self) -> Option<i8> {
        match self {
            Self::Int8(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i16(&self) -> Option<i16> {
        match self {
            Self::Int16(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::Float32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Utf8(v) => v.as_deref(),
            _ => None,
        }
    }

    /// Materialize `values` as an array of `data_type`.
    ///
    /// Sentinels are written as ordinary values; only a missing string
    /// becomes an Arrow null.
    pub fn build_array(data_type: &DataType, values: &[ScalarValue]) -> Result<ArrayRef, String> {
        fn collect<T>(
            values: &[ScalarValue],
            pick: impl Fn(&ScalarValue) -> Option<T>,
            data_type: &DataType,
        ) -> Result<Vec<T>, String> {
            values
                .iter()
                .map(|v| {
                    pick(v).ok_or_else(|| {
                        format!("scalar {:?} does not match output type {:?}", v, data_type)
                    })
                })
                .collect()
        }

        let array: ArrayRef = match data_type {
            DataType::Boolean => Arc::new(BooleanArray::from(collect(
                values,
                ScalarValue::as_bool,
                data_type,
            )?)),
            DataType::Int8 => Arc::new(Int8Array::from(collect(
                values,
                ScalarValue::as_i8,
                data_type,
            )?)),
            DataType::Int16 => Arc::new(Int16Array::from(collect(
                values,
                ScalarValue::as_i16,
                data_type,
            )?)),
            DataType::Int32 => Arc::new(Int32Array::from(collect(
                values,
                ScalarValue::as_i32,
                data_type,
            )?)),
            DataType::Int64 => Arc::new(Int64Array::from(collect(
                values,
                ScalarValue::as_i64,
                data_type,
            )?)),
            DataType::Float32 => Arc::new(Float32Array::from(collect(
                values,
                ScalarValue::as_f32,
                data_type,
            )?)),
            DataType::Float64 => Arc::new(Float64Array::from(collect(
                values,
                ScalarValue::as_f64,
                data_type,
            )?)),
            DataType::Utf8 => {
                let strings = collect(
                    values,
                    |v| match v {
                        ScalarValue::Utf8(s) => Some(s.clone()),
                        _ => None,
                    },
                    data_type,
                )?;
                Arc::new(StringArray::from(strings))
            }
            other => return Err(format!("unsupported scalar type: {:?}", other)),
        };
        Ok(array)
    }
}

/// Replace Arrow nulls with the column type's sentinel.
pub fn fill_nulls_with_sentinel(array: &ArrayRef) -> Result<ArrayRef, String> {
    if array.null_count() == 0 || matches!(array.data_type(), DataType::Utf8) {
        return Ok(Arc::clone(array));
    }
    let values = (0..array.len())
        .map(|row| ScalarValue::from_array(array.as_ref(), row))
        .collect::<Result<Vec<_>, _>>()?;
    ScalarValue::build_array(array.data_type(), &values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_table() {
        assert_eq!(
            ScalarValue::null_of(&DataType::Int8).unwrap(),
            ScalarValue::Int8(0)
        );
        assert_eq!(
            ScalarValue::null_of(&DataType::Int16).unwrap(),
            ScalarValue::Int16(0)
        );
        assert_eq!(
            ScalarValue::null_of(&DataType::Boolean).unwrap(),
            ScalarValue::Boolean(false)
        );
        assert_eq!(
            ScalarValue::null_of(&DataType::Int32).unwrap(),
            ScalarValue::Int32(i32::MIN)
        );
        assert_eq!(
            ScalarValue::null_of(&DataType::Int64).unwrap(),
            ScalarValue::Int64(i64::MIN)
        );
        assert!(ScalarValue::null_of(&DataType::Float64).unwrap().is_null());
        assert!(ScalarValue::null_of(&DataType::Float32).unwrap().is_null());
        assert_eq!(
            ScalarValue::null_of(&DataType::Utf8).unwrap(),
            ScalarValue::Utf8(None)
        );
        assert!(ScalarValue::null_of(&DataType::Date32).is_err());
    }

    #[test]
    fn test_narrow_types_never_report_null() {
        assert!(!ScalarValue::Int8(0).is_null());
        assert!(!ScalarValue::Int16(0).is_null());
        assert!(!ScalarValue::Boolean(false).is_null());
        assert!(ScalarValue::Int32(i32::MIN).is_null());
        assert!(!ScalarValue::Int32(0).is_null());
    }

    #[test]
    fn test_from_array_maps_arrow_null_to_sentinel() {
        let ints = Int32Array::from(vec![Some(7), None]);
        assert_eq!(
            ScalarValue::from_array(&ints, 0).unwrap(),
            ScalarValue::Int32(7)
        );
        assert_eq!(
            ScalarValue::from_array(&ints, 1).unwrap(),
            ScalarValue::Int32(INT_NULL)
        );
        let bytes = Int8Array::from(vec![None, Some(-3)]);
        assert_eq!(
            ScalarValue::from_array(&bytes, 0).unwrap(),
            ScalarValue::Int8(0)
        );
        assert!(ScalarValue::from_array(&bytes, 2).is_err());
        let strs = StringArray::from(vec![Some("AX"), None]);
        assert_eq!(ScalarValue::from_array(&strs, 0).unwrap().as_str(), Some("AX"));
        assert!(ScalarValue::from_array(&strs, 1).unwrap().is_null());
    }

    #[test]
    fn test_fill_nulls_keeps_strings_null() {
        let ints: ArrayRef = Arc::new(Int64Array::from(vec![Some(1), None]));
        let filled = fill_nulls_with_sentinel(&ints).unwrap();
        assert_eq!(filled.null_count(), 0);
        let filled = filled.as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(filled.value(1), LONG_NULL);

        let strs: ArrayRef = Arc::new(StringArray::from(vec![Some("a"), None]));
        assert_eq!(fill_nulls_with_sentinel(&strs).unwrap().null_count(), 1);
    }

    #[test]
    fn test_build_array_rejects_mismatched_scalar() {
        let err = ScalarValue::build_array(&DataType::Int32, &[ScalarValue::Int64(1)])
            .expect_err("type mismatch");
        assert!(err.contains("does not match"), "err={err}");
    }
}
