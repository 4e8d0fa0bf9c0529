//! The fixed namespace registry.

use std::fmt;

/// A named partition of the key space.
///
/// The same key string in two namespaces addresses two unrelated records.
/// The set is fixed at compile time; the store creates one sub-store per
/// variant when it is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Scenes,
    Rooms,
    Files,
    Settings,
}

impl Namespace {
    /// Every namespace, in registry order.
    pub const ALL: [Namespace; 4] = [
        Namespace::Scenes,
        Namespace::Rooms,
        Namespace::Files,
        Namespace::Settings,
    ];

    /// The identifier used as the physical key prefix.
    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Scenes => "SCENES",
            Namespace::Rooms => "ROOMS",
            Namespace::Files => "FILES",
            Namespace::Settings => "SETTINGS",
        }
    }

    /// Position of this namespace in [`Namespace::ALL`].
    #[inline]
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_matches_registry_order() {
        for (i, ns) in Namespace::ALL.iter().enumerate() {
            assert_eq!(ns.index(), i);
        }
    }

    #[test]
    fn test_identifiers_are_distinct() {
        let mut names: Vec<_> = Namespace::ALL.iter().map(|ns| ns.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Namespace::ALL.len());
        assert_eq!(Namespace::Files.to_string(), "FILES");
    }
}
