/// Caller-owned memo of computed results keyed by `(method, parameters)`.
///
/// Keys only need `PartialEq`, so float parameters work as keys. The number
/// of distinct requests per signal is tiny, hence the linear scan.
#[derive(Debug, Clone)]
pub struct ResultCache<K, V> {
    entries: Vec<(K, V)>,
}

impl<K, V> Default for ResultCache<K, V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<K: PartialEq, V> ResultCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Return the cached value for `key`, computing and storing it first if
    /// needed. Failed computations are not cached.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        key: K,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<&V, E> {
        let pos = match self.entries.iter().position(|(k, _)| *k == key) {
            Some(pos) => pos,
            None => {
                let value = compute()?;
                self.entries.push((key, value));
                self.entries.len() - 1
            }
        };
        Ok(&self.entries[pos].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
