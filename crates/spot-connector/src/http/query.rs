/*
[INPUT]:  Request parameters supplied by callers
[OUTPUT]: Sanitized parameter lists and deterministic query strings
[POS]:    HTTP layer - query string canonicalization shared by public and signed requests
[UPDATE]: When changing parameter encoding or empty-value policy
*/

use url::form_urlencoded;

/// Ordered request parameters.
///
/// Insertion order is kept so that the encoded query string, and therefore
/// the signature computed over it, is reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    pairs: Vec<(String, Option<String>)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter. A later insert with the same key replaces the value in place.
    pub fn insert(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set(key.into(), Some(value.to_string()));
        self
    }

    /// Append a parameter whose value may be absent.
    pub fn insert_opt<V: ToString>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.set(key.into(), value.map(|v| v.to_string()));
        self
    }

    /// Append a list parameter, serialized as a JSON array (`["BTCUSDT","ETHUSDT"]`).
    pub fn insert_list<V: ToString>(mut self, key: impl Into<String>, values: &[V]) -> Self {
        let items: Vec<String> = values.iter().map(ToString::to_string).collect();
        let encoded = serde_json::Value::from(items).to_string();
        self.set(key.into(), Some(encoded));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    fn set(&mut self, key: String, value: Option<String>) {
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.pairs.push((key, value)),
        }
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Params::new(), |params, (k, v)| params.insert(k, v))
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Params {
    fn from(pairs: [(&str, &str); N]) -> Self {
        pairs.into_iter().collect()
    }
}

/// Drop every parameter whose value is absent or the empty string.
pub fn remove_empty_value(params: &Params) -> Params {
    Params {
        pairs: params
            .pairs
            .iter()
            .filter(|(_, v)| v.as_deref().is_some_and(|v| !v.is_empty()))
            .cloned()
            .collect(),
    }
}

/// Encode parameters as `key=value&...` in insertion order.
pub fn build_query_string(params: &Params) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in params.iter() {
        serializer.append_pair(key, value.unwrap_or_default());
    }
    serializer.finish()
}
