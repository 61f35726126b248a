//! Selectors
//!
//! Selector names are interned for the life of the process, so a `Selector`
//! is a pointer-sized copyable value and equality is a pointer compare.

use std::fmt;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;

static INTERNED: Lazy<Mutex<FxHashSet<&'static str>>> = Lazy::new(|| Mutex::new(FxHashSet::default()));

/// Dynamically named method identifier
#[derive(Clone, Copy, Eq)]
pub struct Selector(&'static str);

impl Selector {
    /// Intern `name` (`"add::"`, `"name"`).
    ///
    /// Like `sel_registerName`, interned names are never freed: every
    /// distinct name seen, including names arriving through
    /// [`entry::send_message`](crate::entry::send_message) or the C API,
    /// stays in the table until the process exits.
    pub fn new(name: &str) -> Self {
        let mut interned = INTERNED.lock();
        if let Some(existing) = interned.get(name) {
            return Selector(existing);
        }
        let leaked: &'static str = Box::leak(name.to_owned().into_boxed_str());
        interned.insert(leaked);
        Selector(leaked)
    }

    /// Selector name
    pub fn name(&self) -> &'static str {
        self.0
    }

    /// Number of arguments, one per `:`
    pub fn arity(&self) -> usize {
        self.0.bytes().filter(|b| *b == b':').count()
    }
}

impl PartialEq for Selector {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.0, other.0)
    }
}

impl std::hash::Hash for Selector {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (self.0.as_ptr() as usize).hash(state);
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@selector({})", self.0)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl From<&str> for Selector {
    fn from(name: &str) -> Self {
        Selector::new(name)
    }
}
