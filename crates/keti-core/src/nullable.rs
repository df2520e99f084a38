//! Serde helper for patch fields that distinguish "absent" from "null".
//!
//! With `#[serde(default, deserialize_with = "crate::nullable::deserialize")]`
//! a missing key stays `None`, while an explicit `null` becomes `Some(None)`.

use serde::{Deserialize, Deserializer};

pub fn deserialize<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
  T: Deserialize<'de>,
  D: Deserializer<'de>,
{
  Option::<T>::deserialize(de).map(Some)
}
