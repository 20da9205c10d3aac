use indexmap::IndexMap;

use crate::error::Error;
use crate::object::Object;
use crate::Result;

/// A PDF dictionary: a mapping from Name to Object.
///
/// Backed by an `IndexMap` so that writers produce deterministic byte
/// output; the PDF grammar itself assigns no meaning to key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary(IndexMap<Vec<u8>, Object>);

impl Dictionary {
    pub fn new() -> Self {
        Dictionary(IndexMap::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, &Object)> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&Vec<u8>, &mut Object)> {
        self.0.iter_mut()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Vec<u8>> {
        self.0.keys()
    }

    pub fn has(&self, key: &[u8]) -> bool {
        self.0.contains_key(key)
    }

    pub fn get(&self, key: &[u8]) -> Result<&Object> {
        self.0.get(key).ok_or_else(|| Error::Validation(format!("missing key {:?}", String::from_utf8_lossy(key))))
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Result<&mut Object> {
        self.0
            .get_mut(key)
            .ok_or_else(|| Error::Validation(format!("missing key {:?}", String::from_utf8_lossy(key))))
    }

    pub fn set<K, V>(&mut self, key: K, value: V) -> Option<Object>
    where
        K: Into<Vec<u8>>,
        V: Into<Object>,
    {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<Object> {
        self.0.shift_remove(key)
    }

    /// True if `/Type` (or, for the catalog's `/Pages`, any of the given
    /// names passed through `type_is`) equals `name`.
    pub fn has_type(&self, name: &[u8]) -> bool {
        matches!(self.get(b"Type"), Ok(Object::Name(n)) if n == name)
    }

    /// True if `/Subtype` equals `name`.
    pub fn has_subtype(&self, name: &[u8]) -> bool {
        matches!(self.get(b"Subtype"), Ok(Object::Name(n)) if n == name)
    }

    /// The dictionary's `/Type` name, if present.
    pub fn get_type(&self) -> Result<&[u8]> {
        self.get(b"Type")?.as_name()
    }
}

impl<K, V> FromIterator<(K, V)> for Dictionary
where
    K: Into<Vec<u8>>,
    V: Into<Object>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut dict = Dictionary::new();
        for (k, v) in iter {
            dict.set(k, v);
        }
        dict
    }
}

/// Build a [`Dictionary`] with a map-literal syntax.
///
/// ```
/// use pdfcore::dictionary;
/// let dict = dictionary! {
///     "Type" => "Catalog",
///     "Count" => 0,
/// };
/// assert!(dict.has_type(b"Catalog"));
/// ```
#[macro_export]
macro_rules! dictionary {
    () => { $crate::Dictionary::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut dict = $crate::Dictionary::new();
        $(
            dict.set($key, $value);
        )+
        dict
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_round_trips() {
        let mut dict = Dictionary::new();
        dict.set("Count", 3);
        assert_eq!(dict.get(b"Count").unwrap().as_i64().unwrap(), 3);
    }

    #[test]
    fn remove_drops_the_key() {
        let mut dict = dictionary! { "A" => 1 };
        assert!(dict.has(b"A"));
        dict.remove(b"A");
        assert!(!dict.has(b"A"));
    }

    #[test]
    fn has_type_matches_name() {
        let dict = dictionary! { "Type" => "Catalog" };
        assert!(dict.has_type(b"Catalog"));
        assert!(!dict.has_type(b"Page"));
    }

    #[test]
    fn preserves_insertion_order() {
        let dict = dictionary! { "Z" => 1, "A" => 2 };
        let keys: Vec<_> = dict.keys().cloned().collect();
        assert_eq!(keys, vec![b"Z".to_vec(), b"A".to_vec()]);
    }
}
