use serde::{Deserialize, Serialize};

/// Metric name → value for one hook invocation, in insertion order.
///
/// Validation metrics are conventionally prefixed with `val_`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Logs {
    entries: Vec<(String, f64)>,
}

impl Logs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, keeping its original position when it already exists.
    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: f64) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copies every entry of `other` in, overwriting shared keys.
    pub fn extend(&mut self, other: &Logs) {
        for (k, v) in other.iter() {
            self.insert(k, v);
        }
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for Logs {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        let mut logs = Logs::new();
        for (k, v) in iter {
            logs.insert(k, v);
        }
        logs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overwrite_keeps_position() {
        let mut logs = Logs::new().with("loss", 1.0).with("val_loss", 2.0);
        logs.insert("loss", 0.5);
        assert_eq!(logs.keys().collect::<Vec<_>>(), ["loss", "val_loss"]);
        assert_eq!(logs.get("loss"), Some(0.5));
        assert_eq!(logs.get("accuracy"), None);
    }
}
