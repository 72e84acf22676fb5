//! Canonical join keys for free-text region names.
//!
//! Every source spells regions its own way ("Республика Татарстан (Татарстан)",
//! "Татарстан", "Hижегородская обл." with a Latin H, "New York" vs "NY").
//! [`RegionNormalizer`] maps all of them onto one [`RegionKey`] and classifies
//! administrative aggregates as [`Normalized::Excluded`].
//!
//! The alias, strip and exclusion tables are static data loaded from a CSV
//! with the columns `kind,pattern,value`:
//!
//! - `alias`: `pattern` is replaced by `value` (whole-name match)
//! - `strip`: administrative-unit word or phrase removed when it is a modifier
//! - `exclude-exact`: stripped name equal to `pattern` is excluded
//! - `exclude-suffix`: stripped name ending with `pattern` is excluded
//! - `exclude-raw`: trimmed raw name equal to `pattern` is excluded

use crate::error::{EngineError, Result};
use csv::ReaderBuilder;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Naming tables for Russian federal subjects.
pub static NAMING_RU: &str = include_str!("../../fixtures/naming_ru.csv");

/// Naming tables for US states and jurisdictions.
pub static NAMING_US: &str = include_str!("../../fixtures/naming_us.csv");

const BRACKETS: [char; 6] = ['(', ')', '[', ']', '{', '}'];

/// Which set of naming tables applies to a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NamingConvention {
    #[default]
    Russia,
    UnitedStates,
}

impl NamingConvention {
    pub fn tables(&self) -> &'static str {
        match self {
            NamingConvention::Russia => NAMING_RU,
            NamingConvention::UnitedStates => NAMING_US,
        }
    }
}

/// Canonical region identifier used for every join.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionKey(String);

impl RegionKey {
    /// Wrap a name that is already canonical, such as a key read back from storage.
    pub fn new(key: impl Into<String>) -> Self {
        RegionKey(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of normalising one raw name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Key(RegionKey),
    /// An aggregate or nested unit that must not take part in joins
    Excluded,
}

impl Normalized {
    pub fn key(self) -> Option<RegionKey> {
        match self {
            Normalized::Key(key) => Some(key),
            Normalized::Excluded => None,
        }
    }

    pub fn is_excluded(&self) -> bool {
        matches!(self, Normalized::Excluded)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegionNormalizer {
    aliases: HashMap<String, String>,
    /// Token sequences, longest first
    strip: Vec<Vec<String>>,
    exclude_exact: HashSet<String>,
    exclude_suffix: Vec<String>,
    exclude_raw: HashSet<String>,
}

impl RegionNormalizer {
    pub fn for_convention(convention: NamingConvention) -> Result<Self> {
        RegionNormalizer::from_csv(convention.tables())
    }

    /// Parse naming tables from a `kind,pattern,value` CSV.
    pub fn from_csv(csv_object: &str) -> Result<Self> {
        let mut normalizer = RegionNormalizer::default();
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(csv_object.as_bytes());
        for (row, record) in rdr.records().enumerate() {
            let record = record.map_err(|e| EngineError::UnparsableRecord {
                row,
                reason: e.to_string(),
            })?;
            let kind = record.get(0).unwrap_or("").trim();
            let pattern = record.get(1).unwrap_or("");
            let value = record.get(2).unwrap_or("").trim();
            if pattern.trim().is_empty() {
                return Err(EngineError::UnparsableRecord {
                    row,
                    reason: format!("empty pattern for {kind}"),
                });
            }
            match kind {
                "alias" => {
                    normalizer
                        .aliases
                        .insert(collapse_whitespace(pattern), value.to_string());
                }
                "strip" => normalizer
                    .strip
                    .push(pattern.split_whitespace().map(String::from).collect()),
                "exclude-exact" => {
                    normalizer.exclude_exact.insert(collapse_whitespace(pattern));
                }
                // kept verbatim: a leading space marks a separate word
                "exclude-suffix" => normalizer.exclude_suffix.push(pattern.to_string()),
                "exclude-raw" => {
                    normalizer.exclude_raw.insert(pattern.trim().to_string());
                }
                other => {
                    return Err(EngineError::UnparsableRecord {
                        row,
                        reason: format!("unknown table kind {other:?}"),
                    })
                }
            }
        }
        normalizer
            .strip
            .sort_by(|a, b| b.len().cmp(&a.len()).then(b.concat().len().cmp(&a.concat().len())));
        Ok(normalizer)
    }

    /// Map a raw name to its canonical key, or classify it as excluded.
    pub fn normalize(&self, raw: &str) -> Normalized {
        let trimmed = raw.trim();
        if self.exclude_raw.contains(trimmed) {
            return Normalized::Excluded;
        }

        let aliased = self.alias(clean(trimmed));
        let stripped = self.strip_unit_words(&aliased);
        let key = self.alias(stripped);
        if self.is_excluded(&key) {
            debug!("excluding region {raw:?}");
            return Normalized::Excluded;
        }
        Normalized::Key(RegionKey(key))
    }

    /// Normalise and fail on excluded names.
    pub fn key(&self, raw: &str) -> Result<RegionKey> {
        self.normalize(raw)
            .key()
            .ok_or_else(|| EngineError::ExcludedEntity(raw.to_string()))
    }

    fn is_excluded(&self, cleaned: &str) -> bool {
        cleaned.chars().count() <= 1
            || self.exclude_exact.contains(cleaned)
            || self
                .exclude_suffix
                .iter()
                .any(|suffix| cleaned.ends_with(suffix.as_str()))
    }

    fn alias(&self, name: String) -> String {
        match self.aliases.get(&name) {
            Some(canonical) => canonical.clone(),
            None => name,
        }
    }

    /// Remove administrative-unit words. A name made only of such words is
    /// returned unchanged.
    fn strip_unit_words(&self, name: &str) -> String {
        let mut tokens: Vec<String> = name.split_whitespace().map(String::from).collect();
        for phrase in &self.strip {
            let width = phrase.len();
            let mut i = 0;
            while i + width <= tokens.len() {
                if tokens[i..i + width] == phrase[..] {
                    tokens.drain(i..i + width);
                } else {
                    i += 1;
                }
            }
            // abbreviations glued to the next word, "г.Москва"
            if let [abbreviation] = &phrase[..] {
                if abbreviation.ends_with('.') {
                    for token in tokens.iter_mut() {
                        if token.len() > abbreviation.len() && token.starts_with(abbreviation.as_str()) {
                            *token = token[abbreviation.len()..].to_string();
                        }
                    }
                }
            }
        }
        if tokens.is_empty() {
            name.to_string()
        } else {
            tokens.join(" ")
        }
    }
}

/// Cut a parenthetical suffix, drop digits and bracket characters, and
/// collapse whitespace.
fn clean(raw: &str) -> String {
    let head = match raw.find('(') {
        Some(pos) => &raw[..pos],
        None => raw,
    };
    let filtered: String = head
        .chars()
        .filter(|c| !c.is_ascii_digit() && !BRACKETS.contains(c))
        .collect();
    collapse_whitespace(&filtered)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ru() -> RegionNormalizer {
        RegionNormalizer::for_convention(NamingConvention::Russia).unwrap()
    }

    fn key(normalizer: &RegionNormalizer, raw: &str) -> String {
        match normalizer.normalize(raw) {
            Normalized::Key(key) => key.to_string(),
            Normalized::Excluded => panic!("{raw:?} unexpectedly excluded"),
        }
    }

    #[test]
    fn test_parenthetical_and_digits() {
        let normalizer = ru();
        assert_eq!(key(&normalizer, "Название (детали) 2021"), "Название");
        assert_eq!(key(&normalizer, "Название 2021 [1]"), "Название");
        assert_eq!(key(&normalizer, "Республика Татарстан (Татарстан)"), "Татарстан");
    }

    #[test]
    fn test_unit_words_and_aliases() {
        let normalizer = ru();
        assert_eq!(key(&normalizer, "Тверская область"), "Тверская");
        assert_eq!(key(&normalizer, "Тверская обл."), "Тверская");
        assert_eq!(key(&normalizer, "Краснодарский край"), "Краснодарский");
        assert_eq!(key(&normalizer, "г. Москва"), "Москва");
        assert_eq!(key(&normalizer, "г.Санкт-Петербург"), "Санкт-Петербург");
        assert_eq!(key(&normalizer, "Чувашская Республика - Чувашия"), "Чувашия");
        assert_eq!(key(&normalizer, "Удмуртская Республика"), "Удмуртия");
        assert_eq!(key(&normalizer, "Hижегородская область"), "Нижегородская");
        assert_eq!(key(&normalizer, "Ямало-Hенецкий АО"), "Ямало-Ненецкий");
        assert_eq!(
            key(&normalizer, "Ханты-Мансийский автономный округ - Югра"),
            "Ханты-Мансийский"
        );
        assert_eq!(key(&normalizer, "Ханты-Мансийский авт.округ - Югра"), "Ханты-Мансийский");
        assert_eq!(key(&normalizer, "Еврейская автономная область"), "Еврейская");
        assert_eq!(
            key(&normalizer, "Республика Северная Осетия-Алания"),
            key(&normalizer, "Республика Северная Осетия- Алания")
        );
    }

    #[test]
    fn test_autonomous_okrug_spellings_share_a_key() {
        let normalizer = ru();
        let spellings = [
            (
                "Ямало-Ненецкий",
                &[
                    "Ямало-Ненецкий автономный округ",
                    "Ямало-Hенецкий АО",
                    "Ямало-Ненецкий авт.округ",
                    "Ямало-Ненецкий АО",
                ][..],
            ),
            (
                "Ненецкий",
                &["Ненецкий автономный округ", "Hенецкий АО", "Ненецкий авт.округ"][..],
            ),
            (
                "Ханты-Мансийский",
                &[
                    "Ханты-Мансийский автономный округ",
                    "Ханты-Мансийский автономный округ - Югра",
                    "Ханты-Мансийский АО - Югра",
                    "Ханты-Мансийский авт.округ - Югра",
                ][..],
            ),
            ("Чукотский", &["Чукотский автономный округ", "Чукотский АО"][..]),
        ];
        for (expected, raws) in spellings {
            for raw in raws {
                assert_eq!(
                    normalizer.normalize(raw),
                    Normalized::Key(RegionKey::new(expected)),
                    "{raw:?}"
                );
            }
        }
    }

    #[test]
    fn test_unit_word_alone_is_kept() {
        let normalizer = ru();
        assert_eq!(key(&normalizer, "Республика"), "Республика");
    }

    #[test]
    fn test_exclusions() {
        let normalizer = ru();
        assert!(normalizer.normalize("А").is_excluded());
        assert!(normalizer.normalize("Российская Федерация").is_excluded());
        assert!(normalizer.normalize("Тюменская область без автономии").is_excluded());
        assert!(normalizer.normalize("Архангельская область без автономного округа").is_excluded());
        assert!(normalizer.normalize("Центральный федеральный округ").is_excluded());
        assert!(normalizer.normalize("Северо-Кавказский федеральный округ").is_excluded());
        assert_eq!(
            normalizer.key("Российская Федерация"),
            Err(EngineError::ExcludedEntity("Российская Федерация".into()))
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let normalizer = ru();
        let raws = [
            "Название (детали) 2021",
            "Республика Саха (Якутия)",
            "Республика Саха /Якутия/",
            "Кемеровская область - Кузбасс",
            "Ханты-Мансийский автономный округ - Югра",
            "Чувашская Республика",
            "г. Севастополь",
            "Hенецкий АО",
            "Республика",
            "Алтайский край",
        ];
        for raw in raws {
            let once = key(&normalizer, raw);
            assert_eq!(key(&normalizer, &once), once, "not a fixed point for {raw:?}");
        }
        for canonical in normalizer.aliases.values() {
            assert_eq!(&key(&normalizer, canonical), canonical);
        }
    }

    #[test]
    fn test_united_states_convention() {
        let normalizer = RegionNormalizer::for_convention(NamingConvention::UnitedStates).unwrap();
        assert_eq!(key(&normalizer, "New York"), "NY");
        assert_eq!(key(&normalizer, "NY"), "NY");
        assert_eq!(key(&normalizer, "District of Columbia"), "DC");
        assert!(normalizer.normalize("United States").is_excluded());
        assert!(normalizer.normalize("New York City").is_excluded());
        assert!(normalizer.normalize("US").is_excluded());
        // federal agency allotments collide with state codes once digits go
        assert!(normalizer.normalize("VA2").is_excluded());
        assert_eq!(key(&normalizer, "VA"), "VA");
        for canonical in normalizer.aliases.values() {
            assert_eq!(&key(&normalizer, canonical), canonical);
        }
    }

    #[test]
    fn test_unknown_table_kind_is_rejected() {
        let err = RegionNormalizer::from_csv("kind,pattern,value\nrename,a,b\n").unwrap_err();
        assert!(matches!(err, EngineError::UnparsableRecord { row: 0, .. }));
    }
}
