use std::fmt::{self, Debug, Display};

/// Holds a credential (courier API key, Paystack secret, platform key) so that it cannot leak through `Debug` or
/// `Display` formatting. Both render a redaction marker; the wrapped value only comes out via [`Secret::reveal`].
#[derive(Clone, Default)]
pub struct Secret<T> {
    value: T,
}

impl<T> Secret<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn reveal(&self) -> &T {
        &self.value
    }
}

impl Secret<String> {
    /// A fragment that is safe to log: the last four characters of the credential. Lets an operator confirm which
    /// key an instance loaded without printing the key itself. Short values stay fully redacted.
    pub fn hint(&self) -> String {
        let n = self.value.chars().count();
        if n <= 4 {
            return REDACTED.to_string();
        }
        let tail: String = self.value.chars().skip(n - 4).collect();
        format!("…{tail}")
    }
}

const REDACTED: &str = "[redacted]";

impl<T> Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl<T> Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn formatting_never_prints_the_value() {
        let key = Secret::new("sk_live_deadbeef".to_string());
        assert_eq!(format!("{key}"), "[redacted]");
        assert_eq!(format!("{key:?}"), "[redacted]");
    }

    #[test]
    fn hint_shows_only_the_tail() {
        let key = Secret::new("sk_live_deadbeef".to_string());
        assert_eq!(key.hint(), "…beef");
        // too short to reveal anything at all
        assert_eq!(Secret::new("abcd".to_string()).hint(), "[redacted]");
    }
}
