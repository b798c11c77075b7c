/// Request header block with case-insensitive names.
///
/// A name may repeat; each occurrence appends a value, in arrival order.
/// The spelling of the first occurrence is kept so it can be echoed back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, Vec<String>)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value under `name`.
    pub fn append(&mut self, name: &str, value: &str) {
        match self.position(name) {
            Some(i) => self.entries[i].1.push(value.to_string()),
            None => self
                .entries
                .push((name.to_string(), vec![value.to_string()])),
        }
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    /// All values for `name`, in arrival order. Empty if absent.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.position(name)
            .map(|i| self.entries[i].1.as_slice())
            .unwrap_or(&[])
    }

    /// Name as the client spelled it, plus its first value.
    pub fn get_entry(&self, name: &str) -> Option<(&str, &str)> {
        let (stored, values) = &self.entries[self.position(name)?];
        values.first().map(|v| (stored.as_str(), v.as_str()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Extend the most recent value of the last header (folded line).
    ///
    /// Returns `false` if there is no header to continue.
    pub(crate) fn continue_last(&mut self, text: &str) -> bool {
        let Some(value) = self
            .entries
            .last_mut()
            .and_then(|(_, values)| values.last_mut())
        else {
            return false;
        };
        if !value.is_empty() && !text.is_empty() {
            value.push(' ');
        }
        value.push_str(text);
        true
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(key, _)| key.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_names_accumulate_in_order() {
        let mut h = Headers::new();
        h.append("X-Apple-Device", "a");
        h.append("x-apple-device", "b");
        h.append("CSeq", "3");
        assert_eq!(h.len(), 2);
        assert_eq!(h.get_all("X-APPLE-DEVICE"), ["a", "b"]);
        assert_eq!(h.get("x-apple-device"), Some("a"));
    }

    #[test]
    fn entry_keeps_first_spelling() {
        let mut h = Headers::new();
        h.append("Cseq", "1");
        assert_eq!(h.get_entry("CSEQ"), Some(("Cseq", "1")));
        assert!(h.get_entry("Session").is_none());
    }

    #[test]
    fn continuation_without_header_is_rejected() {
        let mut h = Headers::new();
        assert!(!h.continue_last("orphan"));
        h.append("User-Agent", "iTunes/12.0");
        assert!(h.continue_last("(Macintosh)"));
        assert_eq!(h.get("user-agent"), Some("iTunes/12.0 (Macintosh)"));
    }
}
