//! Class names, label maps, and the first-match filename policy.
//!
//! Both the partitioner and the batch loader decide a file's class the same way: scan the
//! candidate names in caller order and take the first one that occurs anywhere in the file's
//! base name. Order is always explicit; nothing here iterates a hash map.

use crate::error::PrepError;
use serde::{Deserialize, Serialize};

/// Return the first candidate that occurs as a substring of `file_name`.
pub fn first_match<'a, I>(file_name: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    candidates.into_iter().find(|name| file_name.contains(*name))
}

/// Check a list of class names before it is used to build directories.
pub fn validate_class_names<S: AsRef<str>>(names: &[S]) -> Result<(), PrepError> {
    if names.is_empty() {
        return Err(PrepError::invalid_input("class list is empty"));
    }
    for (i, name) in names.iter().enumerate() {
        let name = name.as_ref();
        if name.is_empty() {
            return Err(PrepError::invalid_input(format!(
                "class name at position {i} is empty"
            )));
        }
        if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
            return Err(PrepError::invalid_input(format!(
                "class name '{name}' is not a valid directory name"
            )));
        }
        if names[..i].iter().any(|prev| prev.as_ref() == name) {
            return Err(PrepError::invalid_input(format!(
                "class name '{name}' is listed twice"
            )));
        }
    }
    Ok(())
}

/// One entry of a [`ClassLabelMap`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassLabel {
    pub name: String,
    pub index: usize,
}

/// Ordered mapping from class name to integer label.
///
/// Lookup order is insertion order, so `[("dog", 0), ("hotdog", 1)]` labels
/// `hotdog_01.jpg` as `0`. Put the more specific names first when names overlap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ClassLabel>", into = "Vec<ClassLabel>")]
pub struct ClassLabelMap {
    entries: Vec<ClassLabel>,
}

impl ClassLabelMap {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Build a map from `(name, index)` pairs, rejecting duplicate names or indices.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, PrepError>
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        let mut map = Self::new();
        for (name, index) in pairs {
            map.insert(name, index)?;
        }
        Ok(map)
    }

    /// Label classes `0..n` in the order given.
    pub fn from_names<I, S>(names: I) -> Result<Self, PrepError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_pairs(names.into_iter().enumerate().map(|(i, n)| (n, i)))
    }

    /// Append a class at the end of the lookup order.
    pub fn insert(&mut self, name: impl Into<String>, index: usize) -> Result<(), PrepError> {
        let name = name.into();
        if name.is_empty() {
            return Err(PrepError::invalid_input("class name is empty"));
        }
        if self.entries.iter().any(|e| e.name == name) {
            return Err(PrepError::invalid_input(format!(
                "class '{name}' is already mapped"
            )));
        }
        if let Some(existing) = self.entries.iter().find(|e| e.index == index) {
            return Err(PrepError::invalid_input(format!(
                "label {index} is already used by class '{}'",
                existing.name
            )));
        }
        self.entries.push(ClassLabel { name, index });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassLabel> {
        self.entries.iter()
    }

    /// Class names in lookup order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Label for an exact class name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.index)
    }

    /// Class name for a label, used to render predictions.
    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.index == index)
            .map(|e| e.name.as_str())
    }

    /// Label for a file name under the first-match policy.
    pub fn label_for(&self, file_name: &str) -> Option<usize> {
        first_match(file_name, self.names()).and_then(|name| self.index_of(name))
    }

    /// Smallest class count that covers every label in the map.
    pub fn num_classes(&self) -> usize {
        self.entries.iter().map(|e| e.index + 1).max().unwrap_or(0)
    }
}

impl TryFrom<Vec<ClassLabel>> for ClassLabelMap {
    type Error = PrepError;

    fn try_from(entries: Vec<ClassLabel>) -> Result<Self, Self::Error> {
        Self::from_pairs(entries.into_iter().map(|e| (e.name, e.index)))
    }
}

impl From<ClassLabelMap> for Vec<ClassLabel> {
    fn from(map: ClassLabelMap) -> Self {
        map.entries
    }
}

impl std::str::FromStr for ClassLabel {
    type Err = PrepError;

    /// Parse `name=index`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, index) = s
            .rsplit_once('=')
            .ok_or_else(|| PrepError::invalid_input(format!("expected name=index, got '{s}'")))?;
        let index = index
            .trim()
            .parse::<usize>()
            .map_err(|e| PrepError::invalid_input(format!("bad label index in '{s}': {e}")))?;
        Ok(Self {
            name: name.trim().to_string(),
            index,
        })
    }
}
