//! Result rows.

use core::fmt;

use indexmap::IndexMap;
use sqlit_core::Value;

/// A single result row: an ordered map of column name to [`Value`].
///
/// Cell order is the projection order of the query that produced the row.
/// Rows coming out of a JOIN carry qualified cell names (`alias.column`);
/// everything else uses bare column names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: IndexMap<String, Value>,
}

impl Row {
    /// Creates an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a cell.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.cells.insert(name.into(), value);
    }

    /// Builder-style [`Row::set`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.set(name, value);
        self
    }

    /// Returns the cell with exactly this name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.cells.get(name)
    }

    /// Returns the cell at a projection position.
    #[must_use]
    pub fn get_index(&self, index: usize) -> Option<(&str, &Value)> {
        self.cells
            .get_index(index)
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Returns the first cell's value, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Value> {
        self.cells.first().map(|(_, value)| value)
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// `true` when the row has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterates cells in projection order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.cells.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Column names in projection order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    /// Values in projection order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.cells.values()
    }

    /// Consumes the row, yielding values in projection order.
    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.cells.into_values().collect()
    }

    /// Removes a cell by name, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.cells.shift_remove(name)
    }

    /// A stable text key identifying this row's content, used for DISTINCT
    /// and set-operation deduplication.
    #[must_use]
    pub(crate) fn content_key(&self) -> String {
        let mut key = String::new();
        for value in self.cells.values() {
            key.push_str(&crate::value_ops::serialize_value(value));
            key.push('\u{1f}');
        }
        key
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.into_iter()
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.cells.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {}", value.to_sql_inline())?;
        }
        write!(f, "}}")
    }
}

/// Convenience constructor used pervasively in tests and table setup.
#[macro_export]
macro_rules! row {
    ($($name:expr => $value:expr),* $(,)?) => {{
        let mut r = $crate::Row::new();
        $(r.set($name, $crate::ToValue::to_value($value));)*
        r
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_insertion_order() {
        let row = row!("b" => 1, "a" => 2);
        let names: Vec<_> = row.columns().collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(row.first(), Some(&Value::Int(1)));
    }

    #[test]
    fn content_key_distinguishes_rows() {
        let a = row!("x" => 1, "y" => "a");
        let b = row!("x" => 1, "y" => "b");
        assert_ne!(a.content_key(), b.content_key());
        assert_eq!(a.content_key(), a.clone().content_key());
    }
}
