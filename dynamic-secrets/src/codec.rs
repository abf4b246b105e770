//! Credential payload encoding and display masking.
//!
//! Dynamic credentials arrive as a JSON object (`access_key`, `secret_key`,
//! `security_token`, ...). The cache stores them as one canonical JSON string
//! so consumers expecting a single blob can decode the fields back.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Encode a credential payload as canonical JSON (keys sorted).
///
/// # Errors
///
/// Returns an error if a value cannot be serialized.
pub fn encode(payload: &Map<String, Value>) -> Result<String, serde_json::Error> {
    let sorted: BTreeMap<&String, &Value> = payload.iter().collect();
    serde_json::to_string(&sorted)
}

/// Decode a string produced by [`encode`] back into its fields.
///
/// # Errors
///
/// Returns an error if `value` is not a JSON object.
pub fn decode(value: &str) -> Result<Map<String, Value>, serde_json::Error> {
    serde_json::from_str(value)
}

/// Options for [`obscure`].
#[derive(Debug, Clone)]
pub struct ObscureOptions {
    /// Characters left visible at the start
    pub visible_left: usize,
    /// Characters left visible at the end
    pub visible_right: usize,
    /// Replacement character
    pub mask: char,
    /// Render every value with this total length regardless of input length
    pub fixed_length: Option<usize>,
}

impl Default for ObscureOptions {
    fn default() -> Self {
        Self {
            visible_left: 0,
            visible_right: 4,
            mask: '*',
            fixed_length: None,
        }
    }
}

impl ObscureOptions {
    /// Set visible character counts.
    #[must_use]
    pub const fn with_visible(mut self, left: usize, right: usize) -> Self {
        self.visible_left = left;
        self.visible_right = right;
        self
    }

    /// Set replacement character.
    #[must_use]
    pub const fn with_mask(mut self, mask: char) -> Self {
        self.mask = mask;
        self
    }

    /// Render values with a fixed total length.
    #[must_use]
    pub const fn with_fixed_length(mut self, length: usize) -> Self {
        self.fixed_length = Some(length);
        self
    }
}

/// Produce a masked rendering of `value` for display.
///
/// A JSON object is obscured field by field and re-encoded with the same
/// keys. Nested objects and arrays keep their shape with every leaf masked,
/// nulls stay null, and other scalars are masked as their JSON text.
/// Anything else is masked as a flat string.
///
/// A value no longer than `visible_left + visible_right` is masked entirely,
/// as is any value when `fixed_length` is shorter than that window.
#[must_use]
pub fn obscure(value: &str, options: &ObscureOptions) -> String {
    if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(value) {
        let masked: Map<String, Value> = fields
            .into_iter()
            .map(|(name, field)| (name, mask_value(field, options)))
            .collect();
        if let Ok(encoded) = encode(&masked) {
            return encoded;
        }
    }
    mask(value, options)
}

fn mask_value(value: Value, options: &ObscureOptions) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::String(s) => Value::String(mask(&s, options)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| mask_value(item, options))
                .collect(),
        ),
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(name, field)| (name, mask_value(field, options)))
                .collect(),
        ),
        other => Value::String(mask(&other.to_string(), options)),
    }
}

fn mask(value: &str, options: &ObscureOptions) -> String {
    let chars: Vec<char> = value.chars().collect();
    let len = chars.len();
    let visible = options.visible_left + options.visible_right;

    // Nothing can be revealed without exposing the whole value or
    // overrunning the fixed length.
    if len <= visible || options.fixed_length.is_some_and(|fixed| fixed < visible) {
        let masked_len = options.fixed_length.unwrap_or(len);
        return std::iter::repeat_n(options.mask, masked_len).collect();
    }

    let masked_len = options.fixed_length.map_or(len - visible, |fixed| fixed - visible);

    let mut out = String::with_capacity(len);
    out.extend(&chars[..options.visible_left]);
    out.extend(std::iter::repeat_n(options.mask, masked_len));
    out.extend(&chars[len - options.visible_right..]);
    out
}
