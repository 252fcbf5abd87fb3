//! Element identifiers backed by a string interner.
//!
//! BPMN element ids (`Task_1`, `Flow_0x8f2`) are compared and hashed on every
//! traversal step, so they are interned once and handled as a `Copy` symbol.

use std::{
    fmt,
    sync::{Mutex, OnceLock},
};

use string_interner::{DefaultStringInterner, DefaultSymbol};

/// Global string interner for identifier storage.
///
/// The interner is append-only; layout state never lives here.
static INTERNER: OnceLock<Mutex<DefaultStringInterner>> = OnceLock::new();

fn interner() -> std::sync::MutexGuard<'static, DefaultStringInterner> {
    INTERNER
        .get_or_init(|| Mutex::new(DefaultStringInterner::new()))
        .lock()
        .expect("Failed to acquire interner lock")
}

/// Interned BPMN element identifier.
///
/// Ids live in a process-wide interner that is never cleared. Laying out the
/// same diagram again reuses its symbols, but every distinct id string seen
/// by the process stays resident until exit. Long-running hosts that lay out
/// many unrelated diagrams should expect memory to grow with the total number
/// of distinct ids.
///
/// # Examples
///
/// ```
/// use bpmn_layout_core::identifier::Id;
///
/// let task = Id::new("Task_1");
/// assert_eq!(task, "Task_1");
/// assert_eq!(task.to_string(), "Task_1");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Id(DefaultSymbol);

impl Id {
    /// Creates an `Id` from an element id string.
    pub fn new(name: &str) -> Self {
        Self(interner().get_or_intern(name))
    }

    /// Returns the element id as an owned string.
    pub fn as_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let interner = interner();
        let value = interner
            .resolve(self.0)
            .expect("Symbol should exist in interner");
        write!(f, "{value}")
    }
}

impl From<&str> for Id {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<&String> for Id {
    fn from(name: &String) -> Self {
        Self::new(name)
    }
}

impl PartialEq<str> for Id {
    fn eq(&self, other: &str) -> bool {
        let interner = interner();
        interner
            .resolve(self.0)
            .is_some_and(|value| value == other)
    }
}

impl PartialEq<&str> for Id {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}
