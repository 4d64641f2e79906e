//! Read policy and read results.

/// How a read treats the local tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadPolicy {
    /// Answer from the local tier when it has an entry.
    #[default]
    PreferLocal,

    /// Refresh the local tier from the remote store first.
    ///
    /// Non-persistent groups have no remote copy, so for them this behaves
    /// like `PreferLocal`.
    Force,
}

impl ReadPolicy {
    pub fn is_forced(&self) -> bool {
        matches!(self, Self::Force)
    }
}

impl From<bool> for ReadPolicy {
    fn from(force: bool) -> Self {
        if force {
            Self::Force
        } else {
            Self::PreferLocal
        }
    }
}

/// Which tier answered a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    Local,
    Remote,
}

/// Result of a single-key read.
///
/// `value` is `None` for "false": nothing usable is cached. `found` tells a
/// real absence apart from a cached negative or a falsy stored value, the
/// same way the remote store's not-found signal does.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRead<T> {
    value: Option<T>,
    found: bool,
    source: ReadSource,
}

impl<T> CacheRead<T> {
    pub(crate) fn new(value: Option<T>, found: bool, source: ReadSource) -> Self {
        Self {
            value,
            found,
            source,
        }
    }

    /// Consume the wrapper and return the value.
    pub fn into_value(self) -> Option<T> {
        self.value
    }

    /// Get a reference to the value.
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Whether the cache had an answer for the key.
    pub fn found(&self) -> bool {
        self.found
    }

    /// Whether a usable value came back.
    pub fn is_hit(&self) -> bool {
        self.value.is_some()
    }

    pub fn source(&self) -> ReadSource {
        self.source
    }

    /// Map the value, keeping the read metadata.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheRead<U> {
        CacheRead {
            value: self.value.map(f),
            found: self.found,
            source: self.source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_from_bool() {
        assert_eq!(ReadPolicy::from(true), ReadPolicy::Force);
        assert_eq!(ReadPolicy::from(false), ReadPolicy::PreferLocal);
        assert_eq!(ReadPolicy::default(), ReadPolicy::PreferLocal);
        assert!(ReadPolicy::Force.is_forced());
    }

    #[test]
    fn test_found_without_value() {
        let read: CacheRead<u32> = CacheRead::new(None, true, ReadSource::Remote);
        assert!(read.found());
        assert!(!read.is_hit());
        assert_eq!(read.into_value(), None);
    }

    #[test]
    fn test_map_keeps_metadata() {
        let read = CacheRead::new(Some(2), true, ReadSource::Local).map(|n| n * 10);
        assert_eq!(read.value(), Some(&20));
        assert_eq!(read.source(), ReadSource::Local);
    }
}
