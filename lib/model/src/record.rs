//! The generic record type: an ordered field-name to [`Value`] mapping.

use crate::path::ColumnPath;
use crate::value::Value;

/// An error produced while descending a [`ColumnPath`] through a [`Record`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PathError {
    #[error("non-group traversal at '{0}'")]
    NonGroupTraversal(String),
}

/// A mapping from field name to [`Value`], preserving insertion order.
///
/// Field counts in practice are small (a handful to a few dozen columns),
/// so a `Vec` with linear lookup is the simplest correct representation —
/// there is no call for an index map here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Record { fields: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn fields(&self) -> impl Iterator<Item = &(String, Value)> {
        self.fields.iter()
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.fields.iter_mut().find(|(k, _)| *k == name) {
            slot.1 = value;
        } else {
            self.fields.push((name, value));
        }
    }

    /// Removes the field addressed by `path`, descending through nested
    /// groups as needed.
    ///
    /// Returns `(None, self)` unchanged if the leaf does not exist. If
    /// removing the leaf empties its enclosing group, the now-empty group is
    /// dropped from its own parent rather than left behind as `Group([])`.
    /// Fails if the path descends through a field that holds anything other
    /// than a `Group`.
    pub fn remove(mut self, path: &ColumnPath) -> Result<(Option<Value>, Record), PathError> {
        if path.is_empty() {
            return Ok((None, self));
        }

        let head = path.head();
        let tail = path.tail();
        let Some(idx) = self.fields.iter().position(|(k, _)| k == head) else {
            return Ok((None, self));
        };

        if tail.is_empty() {
            let (_, value) = self.fields.remove(idx);
            return Ok((Some(value), self));
        }

        match self.fields[idx].1.clone() {
            Value::Group(inner) => {
                let (removed, remaining) = inner.remove(&tail)?;
                if remaining.is_empty() {
                    self.fields.remove(idx);
                } else {
                    self.fields[idx].1 = Value::Group(remaining);
                }
                Ok((removed, self))
            }
            _ => Err(PathError::NonGroupTraversal(head.to_string())),
        }
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Record {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(fields: Vec<(&str, Value)>) -> Record {
        fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn remove_missing_leaf_is_noop() {
        let r = rec(vec![("id", Value::Int32(1))]);
        let (removed, remaining) = r.clone().remove(&ColumnPath::parse("color").unwrap()).unwrap();
        assert_eq!(removed, None);
        assert_eq!(remaining, r);
    }

    #[test]
    fn remove_single_component_leaf() {
        let r = rec(vec![("id", Value::Int32(1)), ("color", Value::string("red"))]);
        let (removed, remaining) = r.remove(&ColumnPath::parse("color").unwrap()).unwrap();
        assert_eq!(removed, Some(Value::string("red")));
        assert_eq!(remaining.get("color"), None);
        assert_eq!(remaining.get("id"), Some(&Value::Int32(1)));
    }

    #[test]
    fn remove_nested_drops_emptied_parent() {
        let address = rec(vec![("postcode", Value::string("XY"))]);
        let user = rec(vec![("address", Value::Group(address))]);
        let r = rec(vec![
            ("user", Value::Group(user)),
            ("color", Value::string("red")),
        ]);

        let (removed, remaining) = r
            .remove(&ColumnPath::parse("user.address.postcode").unwrap())
            .unwrap();

        assert_eq!(removed, Some(Value::string("XY")));
        assert_eq!(remaining.get("user"), None, "emptied 'address' should drop 'user' too");
        assert_eq!(remaining.get("color"), Some(&Value::string("red")));
    }

    #[test]
    fn remove_nested_keeps_nonempty_parent() {
        let address = rec(vec![
            ("postcode", Value::string("XY")),
            ("city", Value::string("Metropolis")),
        ]);
        let user = rec(vec![("address", Value::Group(address))]);
        let r = rec(vec![("user", Value::Group(user))]);

        let (removed, remaining) = r
            .remove(&ColumnPath::parse("user.address.postcode").unwrap())
            .unwrap();

        assert_eq!(removed, Some(Value::string("XY")));
        let user_remaining = remaining.get("user").unwrap().as_group().unwrap();
        let address_remaining = user_remaining.get("address").unwrap().as_group().unwrap();
        assert_eq!(address_remaining.get("city"), Some(&Value::string("Metropolis")));
        assert_eq!(address_remaining.get("postcode"), None);
    }

    #[test]
    fn remove_through_non_group_fails() {
        let r = rec(vec![("color", Value::string("red"))]);
        let err = r.remove(&ColumnPath::parse("color.hue").unwrap()).unwrap_err();
        assert_eq!(err, PathError::NonGroupTraversal("color".to_string()));
    }
}
