//! Typed readers and writers over TOML tables
//!
//! Every persisted shape and affector is a table whose `type` key selects the
//! variant. These helpers read the variant's own fields and name the exact
//! field when something is missing or has the wrong shape.

use crate::error::{Result, WarpError};
use crate::types::{Color, Vec3};
use toml::value::{Table, Value};

/// Discriminator key shared by every tagged table
pub const TYPE_KEY: &str = "type";

/// Read a TOML number as `f32`. TOML writes `0` and `0.0` differently, accept both.
pub fn value_f32(v: &Value) -> Option<f32> {
    v.as_float()
        .map(|f| f as f32)
        .or_else(|| v.as_integer().map(|i| i as f32))
}

fn value_array<const N: usize>(v: &Value) -> Option<[f32; N]> {
    let arr = v.as_array()?;
    if arr.len() != N {
        return None;
    }
    let mut out = [0.0; N];
    for (slot, item) in out.iter_mut().zip(arr) {
        *slot = value_f32(item)?;
    }
    Some(out)
}

pub fn optional_f32(table: &Table, context: &str, key: &str) -> Result<Option<f32>> {
    match table.get(key) {
        None => Ok(None),
        Some(v) => value_f32(v)
            .map(Some)
            .ok_or_else(|| WarpError::invalid(context, key, "a number")),
    }
}

pub fn require_f32(table: &Table, context: &str, key: &str) -> Result<f32> {
    optional_f32(table, context, key)?.ok_or_else(|| WarpError::missing(context, key))
}

pub fn optional_vec3(table: &Table, context: &str, key: &str) -> Result<Option<Vec3>> {
    match table.get(key) {
        None => Ok(None),
        Some(v) => value_array::<3>(v)
            .map(|a| Some(Vec3::from_array(a)))
            .ok_or_else(|| WarpError::invalid(context, key, "an array of 3 numbers")),
    }
}

pub fn require_vec3(table: &Table, context: &str, key: &str) -> Result<Vec3> {
    optional_vec3(table, context, key)?.ok_or_else(|| WarpError::missing(context, key))
}

pub fn optional_color(table: &Table, context: &str, key: &str) -> Result<Option<Color>> {
    match table.get(key) {
        None => Ok(None),
        Some(v) => value_array::<4>(v)
            .map(|a| Some(Color::from_array(a)))
            .ok_or_else(|| WarpError::invalid(context, key, "an array of 4 numbers")),
    }
}

pub fn require_color(table: &Table, context: &str, key: &str) -> Result<Color> {
    optional_color(table, context, key)?.ok_or_else(|| WarpError::missing(context, key))
}

pub fn optional_bool(table: &Table, context: &str, key: &str) -> Result<Option<bool>> {
    match table.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_bool()
            .map(Some)
            .ok_or_else(|| WarpError::invalid(context, key, "a boolean")),
    }
}

pub fn require_bool(table: &Table, context: &str, key: &str) -> Result<bool> {
    optional_bool(table, context, key)?.ok_or_else(|| WarpError::missing(context, key))
}

/// Non-negative integer field
pub fn optional_u32(table: &Table, context: &str, key: &str) -> Result<Option<u32>> {
    match table.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_integer()
            .and_then(|i| u32::try_from(i).ok())
            .map(Some)
            .ok_or_else(|| WarpError::invalid(context, key, "a non-negative integer")),
    }
}

pub fn optional_str<'a>(table: &'a Table, context: &str, key: &str) -> Result<Option<&'a str>> {
    match table.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_str()
            .map(Some)
            .ok_or_else(|| WarpError::invalid(context, key, "a string")),
    }
}

pub fn require_str<'a>(table: &'a Table, context: &str, key: &str) -> Result<&'a str> {
    optional_str(table, context, key)?.ok_or_else(|| WarpError::missing(context, key))
}

/// Read the `type` discriminator of a tagged table
pub fn variant_tag<'a>(table: &'a Table, context: &str) -> Result<&'a str> {
    require_str(table, context, TYPE_KEY)
}

pub fn f32_value(v: f32) -> Value {
    Value::Float(v as f64)
}

pub fn vec3_value(v: Vec3) -> Value {
    Value::Array(v.to_array().iter().map(|c| f32_value(*c)).collect())
}

pub fn color_value(c: Color) -> Value {
    Value::Array(c.to_array().iter().map(|v| f32_value(*v)).collect())
}

/// Start a tagged table with its discriminator set
pub fn tagged_table(tag: &str) -> Table {
    let mut table = Table::new();
    table.insert(TYPE_KEY.to_string(), Value::String(tag.to_string()));
    table
}
