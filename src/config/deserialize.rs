// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Rejects empty lists where a section needs at least one entry.

use nonempty::NonEmpty;
use serde::Deserialize;

pub fn deserialize_nonempty<'de, D, T>(deserializer: D) -> Result<NonEmpty<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    let values: Vec<T> = Vec::deserialize(deserializer)?;
    NonEmpty::from_vec(values).ok_or_else(|| serde::de::Error::custom("at least one entry is required"))
}

/// A command line given either as an argv list or a whitespace-separated string.
pub fn deserialize_argv<'de, D>(deserializer: D) -> Result<NonEmpty<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let entry = ArgvEntry::deserialize(deserializer)?;
    let argv = match entry {
        ArgvEntry::Line(line) => line.split_whitespace().map(str::to_string).collect(),
        ArgvEntry::List(list) => list,
    };
    NonEmpty::from_vec(argv).ok_or_else(|| serde::de::Error::custom("command cannot be empty"))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ArgvEntry {
    Line(String),
    List(Vec<String>),
}
