use std::{
    fs::File,
    io::{self, BufRead},
    path::Path,
};

const EMBEDDED_BREEDS: &str = include_str!("../models/breeds.txt");

/// Breed names in the order of the model's output positions.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassLabelTable {
    labels: Vec<String>,
}

impl ClassLabelTable {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// The 120 breeds of the training set, sorted alphabetically.
    pub fn embedded() -> Self {
        Self::new(parse_labels(EMBEDDED_BREEDS.lines().map(str::to_string)))
    }

    pub fn from_file(filepath: &Path) -> io::Result<Self> {
        let file = File::open(filepath)?;
        let reader = io::BufReader::new(file);
        let lines = reader.lines().collect::<io::Result<Vec<_>>>()?;

        let labels = parse_labels(lines);
        if labels.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("No labels found in {:?}", filepath),
            ));
        }

        Ok(Self::new(labels))
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

fn parse_labels(lines: impl IntoIterator<Item = String>) -> Vec<String> {
    lines
        .into_iter()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}
