use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Bytes of code per language for a single repository, in the order the API
/// reported them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageBreakdown {
    entries: Vec<(String, u64)>,
}

impl LanguageBreakdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `bytes` to `language`, keeping the first-seen position.
    pub fn add(&mut self, language: &str, bytes: u64) {
        match self.entries.iter_mut().find(|(name, _)| name == language) {
            Some((_, total)) => *total += bytes,
            None => self.entries.push((language.to_string(), bytes)),
        }
    }

    pub fn get(&self, language: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|(name, _)| name == language)
            .map(|(_, bytes)| *bytes)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(name, bytes)| (name.as_str(), *bytes))
    }

    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|(_, bytes)| bytes).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<(S, u64)> for LanguageBreakdown {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        let mut breakdown = Self::new();
        for (language, bytes) in iter {
            breakdown.add(language.as_ref(), bytes);
        }
        breakdown
    }
}

impl Serialize for LanguageBreakdown {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (language, bytes) in &self.entries {
            map.serialize_entry(language, bytes)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for LanguageBreakdown {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BreakdownVisitor;

        impl<'de> Visitor<'de> for BreakdownVisitor {
            type Value = LanguageBreakdown;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of language names to byte counts")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut breakdown = LanguageBreakdown::new();
                while let Some((language, bytes)) = access.next_entry::<String, u64>()? {
                    breakdown.add(&language, bytes);
                }
                Ok(breakdown)
            }
        }

        deserializer.deserialize_map(BreakdownVisitor)
    }
}

/// One week of the `stats/commit_activity` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitActivity {
    #[serde(default)]
    pub days: Vec<u32>,
    pub total: u32,
    /// Start of the week, unix seconds.
    pub week: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    pub login: String,
    #[serde(default)]
    pub contributions: u32,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub html_url: String,
}
