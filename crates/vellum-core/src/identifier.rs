//! Interned layer names.
//!
//! Layers carry a user-facing identifier that copying uses to find the
//! matching layer in a destination document. [`LayerName`] interns the
//! string so that matching is a symbol comparison.

use std::{
    fmt,
    sync::{Mutex, MutexGuard, OnceLock},
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use string_interner::{DefaultStringInterner, DefaultSymbol};

/// Process-wide interner shared by all documents.
static INTERNER: OnceLock<Mutex<DefaultStringInterner>> = OnceLock::new();

fn interner() -> MutexGuard<'static, DefaultStringInterner> {
    INTERNER
        .get_or_init(|| Mutex::new(DefaultStringInterner::new()))
        .lock()
        // A poisoned interner still holds valid symbols.
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The identifier of a layer.
///
/// # Examples
///
/// ```
/// use vellum_core::identifier::LayerName;
///
/// let background = LayerName::new("background");
/// assert_eq!(background, LayerName::new("background"));
/// assert_eq!(background.to_string(), "background");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerName(DefaultSymbol);

impl LayerName {
    /// Interns `name` and returns its identifier.
    pub fn new(name: &str) -> Self {
        Self(interner().get_or_intern(name))
    }

    /// Returns the name assigned to layers created without one, `layer{index}`.
    pub fn numbered(index: usize) -> Self {
        Self::new(&format!("layer{index}"))
    }

    /// Returns an owned copy of the interned string.
    pub fn as_string(&self) -> String {
        interner().resolve(self.0).unwrap_or_default().to_owned()
    }
}

impl fmt::Display for LayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl fmt::Debug for LayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LayerName({:?})", self.as_string())
    }
}

impl From<&str> for LayerName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl PartialEq<&str> for LayerName {
    fn eq(&self, other: &&str) -> bool {
        interner().get(*other) == Some(self.0)
    }
}

impl Serialize for LayerName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_string())
    }
}

impl<'de> Deserialize<'de> for LayerName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::new(&name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_string_same_name() {
        assert_eq!(LayerName::new("links"), LayerName::new("links"));
        assert_ne!(LayerName::new("links"), LayerName::new("nodes"));
    }

    #[test]
    fn test_numbered() {
        assert_eq!(LayerName::numbered(3), "layer3");
    }

    #[test]
    fn test_compare_with_str() {
        let name = LayerName::new("foreground");
        assert!(name == "foreground");
        assert!(name != "background");
    }

    #[test]
    fn test_display_and_debug() {
        let name = LayerName::new("grid");
        assert_eq!(format!("{name}"), "grid");
        assert_eq!(format!("{name:?}"), "LayerName(\"grid\")");
    }
}
