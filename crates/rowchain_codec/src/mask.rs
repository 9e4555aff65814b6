//! Field masks for partial record decoding.
//!
//! A mask is an ordered list of `(pattern, enabled)` rules. A field's
//! status is decided by the last rule whose pattern matches its name;
//! fields that no rule matches stay enabled. Patterns support `*` (any
//! run of characters) and `?` (one character), so
//!
//! ```text
//! set("*", false); set("charge", true);
//! ```
//!
//! disables everything except `charge`.
//!
//! Disabled fields are not taken from the stored bytes. The decoder
//! substitutes the value the field has in `T::default()`, so the record
//! type needs no `#[serde(default)]` annotations to be read partially.

use crate::cbor::{from_cbor, to_value};
use crate::error::{CodecError, CodecResult};
use ciborium::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// Ordered enable/disable rules over top-level record field names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMask {
    rules: Vec<(String, bool)>,
}

impl FieldMask {
    /// Creates a mask with every field enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a rule; later rules take precedence over earlier ones.
    ///
    /// A rule that re-enables everything (`"*"`, `true`) resets the mask.
    pub fn set(&mut self, pattern: impl Into<String>, enabled: bool) {
        let pattern = pattern.into();
        if enabled && pattern == "*" {
            self.rules.clear();
            return;
        }
        self.rules.push((pattern, enabled));
    }

    /// Returns whether `field` is decoded from storage.
    #[must_use]
    pub fn is_enabled(&self, field: &str) -> bool {
        self.rules
            .iter()
            .rev()
            .find(|(pattern, _)| wildcard_match(pattern, field))
            .map_or(true, |(_, enabled)| *enabled)
    }

    /// Returns whether the mask enables every field.
    #[must_use]
    pub fn is_pass_through(&self) -> bool {
        self.rules.iter().all(|(_, enabled)| *enabled)
    }

    /// Returns the rules in application order.
    #[must_use]
    pub fn rules(&self) -> &[(String, bool)] {
        &self.rules
    }
}

/// Decodes records of type `T`, honoring a [`FieldMask`].
///
/// The default-valued template used for disabled fields is computed on
/// first use and kept for the decoder's lifetime.
#[derive(Debug)]
pub struct RecordDecoder<T> {
    mask: FieldMask,
    defaults: Option<Vec<(Value, Value)>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for RecordDecoder<T> {
    fn default() -> Self {
        Self {
            mask: FieldMask::new(),
            defaults: None,
            _marker: PhantomData,
        }
    }
}

impl<T> RecordDecoder<T>
where
    T: Default + Serialize + DeserializeOwned,
{
    /// Creates a decoder with every field enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the active mask.
    #[must_use]
    pub fn mask(&self) -> &FieldMask {
        &self.mask
    }

    /// Enables or disables the fields matching `pattern`.
    pub fn set_field_enabled(&mut self, pattern: impl Into<String>, enabled: bool) {
        self.mask.set(pattern, enabled);
    }

    /// Decodes one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid encoding of `T`, or
    /// if a restrictive mask is active and the record is not map-shaped.
    pub fn decode(&mut self, bytes: &[u8]) -> CodecResult<T> {
        if self.mask.is_pass_through() {
            return from_cbor(bytes);
        }

        let Value::Map(mut entries) = from_cbor::<Value>(bytes)? else {
            return Err(CodecError::invalid_structure(
                "field masks apply only to map-shaped records",
            ));
        };

        self.load_defaults()?;
        let defaults = self.defaults.as_deref().unwrap_or_default();
        let mask = &self.mask;
        entries.retain_mut(|(key, value)| {
            let Some(name) = key.as_text() else {
                return true;
            };
            if mask.is_enabled(name) {
                return true;
            }
            match lookup(defaults, name) {
                Some(default) => {
                    *value = default.clone();
                    true
                }
                None => false,
            }
        });

        Value::Map(entries)
            .deserialized()
            .map_err(|e| CodecError::decoding_failed(e.to_string()))
    }

    /// Decodes one record into `slot`, replacing its previous content.
    ///
    /// `slot` is left untouched when decoding fails.
    ///
    /// # Errors
    ///
    /// Same as [`RecordDecoder::decode`].
    pub fn decode_into(&mut self, bytes: &[u8], slot: &mut T) -> CodecResult<()> {
        *slot = self.decode(bytes)?;
        Ok(())
    }

    fn load_defaults(&mut self) -> CodecResult<()> {
        if self.defaults.is_none() {
            let Value::Map(entries) = to_value(&T::default())? else {
                return Err(CodecError::invalid_structure(
                    "field masks apply only to map-shaped records",
                ));
            };
            self.defaults = Some(entries);
        }
        Ok(())
    }
}

fn lookup<'a>(entries: &'a [(Value, Value)], name: &str) -> Option<&'a Value> {
    entries
        .iter()
        .find(|(key, _)| key.as_text() == Some(name))
        .map(|(_, value)| value)
}

/// Glob-style match supporting `*` and `?`.
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            t = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cbor::to_cbor;
    use proptest::prelude::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Pulse {
        channel: u32,
        charge: i64,
        trace: Vec<u16>,
        trace_gain: u8,
    }

    impl Default for Pulse {
        fn default() -> Self {
            Self {
                channel: 0,
                charge: -1,
                trace: Vec::new(),
                trace_gain: 0,
            }
        }
    }

    fn sample() -> Pulse {
        Pulse {
            channel: 3,
            charge: 250,
            trace: vec![1, 2, 3],
            trace_gain: 4,
        }
    }

    #[test]
    fn wildcard_patterns() {
        assert!(wildcard_match("*", "anything"));
        assert!(wildcard_match("*", ""));
        assert!(wildcard_match("trace*", "trace_gain"));
        assert!(wildcard_match("*gain", "trace_gain"));
        assert!(wildcard_match("ch?rge", "charge"));
        assert!(wildcard_match("t*c*", "trace"));
        assert!(!wildcard_match("trace", "trace_gain"));
        assert!(!wildcard_match("*x", "trace"));
    }

    #[test]
    fn later_rules_win() {
        let mut mask = FieldMask::new();
        mask.set("*", false);
        mask.set("charge", true);

        assert!(mask.is_enabled("charge"));
        assert!(!mask.is_enabled("channel"));
        assert!(!mask.is_pass_through());

        mask.set("*", true);
        assert!(mask.is_pass_through());
        assert!(mask.rules().is_empty());
    }

    #[test]
    fn pass_through_decodes_everything() {
        let mut decoder = RecordDecoder::<Pulse>::new();
        let bytes = to_cbor(&sample()).unwrap();
        assert_eq!(decoder.decode(&bytes).unwrap(), sample());
    }

    #[test]
    fn disabled_fields_take_default_values() {
        let mut decoder = RecordDecoder::<Pulse>::new();
        decoder.set_field_enabled("trace*", false);
        decoder.set_field_enabled("charge", false);

        let bytes = to_cbor(&sample()).unwrap();
        let pulse = decoder.decode(&bytes).unwrap();

        assert_eq!(pulse.channel, 3);
        assert_eq!(pulse.charge, -1);
        assert!(pulse.trace.is_empty());
        assert_eq!(pulse.trace_gain, 0);
    }

    #[test]
    fn reenabled_field_is_read_again() {
        let mut decoder = RecordDecoder::<Pulse>::new();
        decoder.set_field_enabled("*", false);
        decoder.set_field_enabled("trace", true);

        let pulse = decoder.decode(&to_cbor(&sample()).unwrap()).unwrap();
        assert_eq!(pulse.trace, vec![1, 2, 3]);
        assert_eq!(pulse.channel, 0);
    }

    #[test]
    fn decode_into_keeps_slot_on_error() {
        let mut decoder = RecordDecoder::<Pulse>::new();
        let mut slot = sample();
        assert!(decoder.decode_into(&[0xff, 0x00], &mut slot).is_err());
        assert_eq!(slot, sample());

        let other = Pulse {
            channel: 9,
            ..sample()
        };
        decoder
            .decode_into(&to_cbor(&other).unwrap(), &mut slot)
            .unwrap();
        assert_eq!(slot.channel, 9);
    }

    #[test]
    fn masks_need_map_shaped_records() {
        #[derive(Debug, Default, Serialize, Deserialize)]
        struct Wrapped(u32);

        let mut decoder = RecordDecoder::<Wrapped>::new();
        decoder.set_field_enabled("0", false);
        let result = decoder.decode(&to_cbor(&Wrapped(5)).unwrap());
        assert!(matches!(result, Err(CodecError::InvalidStructure { .. })));
    }

    proptest! {
        #[test]
        fn masked_fields_read_as_defaults(
            channel in any::<u32>(),
            charge in any::<i64>(),
            trace in prop::collection::vec(any::<u16>(), 0..16),
            trace_gain in any::<u8>(),
        ) {
            let pulse = Pulse { channel, charge, trace, trace_gain };
            let mut decoder = RecordDecoder::<Pulse>::new();
            decoder.set_field_enabled("trace*", false);

            let decoded = decoder.decode(&to_cbor(&pulse).unwrap()).unwrap();
            prop_assert_eq!(decoded, Pulse { channel, charge, ..Pulse::default() });
        }
    }
}
