use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wraps customer contact data (mobile, email) so it never leaks through
/// `Debug`/`Display` in log lines. Serialization passes the real value through,
/// since API responses and courier payloads need it.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Masked<T>(pub T);

impl<T: AsRef<str>> Masked<T> {
    /// Last four characters, for support screens ("******3210").
    pub fn hint(&self) -> String {
        let raw = self.0.as_ref();
        let tail: String = raw.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
        format!("******{}", tail)
    }

    pub fn expose(&self) -> &str {
        self.0.as_ref()
    }
}

impl<T> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl From<String> for Masked<String> {
    fn from(value: String) -> Self {
        Masked(value)
    }
}
