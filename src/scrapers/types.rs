use reqwest::Url;

/// Ordered list of query string pairs.
///
/// Values are passed through untouched; the only encoding applied is the
/// standard form encoding done when the pairs are written into a URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

/// Filter criteria, e.g. `region`, `kind`, `rentprice`
pub type FilterParams = QueryParams;

/// Sort criteria, applied in the order they were added
pub type SortParams = QueryParams;

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`QueryParams::push`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// Append every pair of `other` after the existing ones
    pub fn extend_from(&mut self, other: &QueryParams) {
        self.pairs.extend(other.pairs.iter().cloned());
    }

    /// First value stored under `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copy of `base` with these pairs appended to its query string
    pub fn to_url(&self, base: &Url) -> Url {
        let mut url = base.clone();
        if !self.pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(self.iter());
        }
        url
    }
}

impl<K, V> FromIterator<(K, V)> for QueryParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
