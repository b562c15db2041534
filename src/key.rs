use std::{borrow::Cow, fmt};

const IDENTITY_SEED: u64 = 0x6c61_7a79_6d6f_64;

/// Stable name of one lazily resolved unit.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleKey(Cow<'static, str>);

impl ModuleKey {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 64-bit hash of the key, used to index loaders in a [`Registry`](crate::Registry).
    pub fn identity(&self) -> u64 {
        wyhash::wyhash(self.0.as_bytes(), IDENTITY_SEED)
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ModuleKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for ModuleKey {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for ModuleKey {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<&ModuleKey> for ModuleKey {
    fn from(key: &ModuleKey) -> Self {
        key.clone()
    }
}
