//! Troops: the organizational sub-groups of the roster, each with its own billing code.

use crate::Result;
use anyhow::{bail, Context};
use std::collections::HashMap;
use std::str::FromStr;

/// One troop, loaded from a comma-separated config line:
/// `name, text code, numeric code, leader name, leader email`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Troop {
    name: String,
    text_code: String,
    num_code: String,
    leader_name: String,
    leader_email: String,
}

impl Troop {
    pub fn new(
        name: impl Into<String>,
        text_code: impl Into<String>,
        num_code: impl Into<String>,
        leader_name: impl Into<String>,
        leader_email: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            text_code: text_code.into(),
            num_code: num_code.into(),
            leader_name: leader_name.into(),
            leader_email: leader_email.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The short text code interpolated into payment messages.
    pub fn text_code(&self) -> &str {
        &self.text_code
    }

    /// The numeric billing code of the troop.
    pub fn num_code(&self) -> &str {
        &self.num_code
    }

    pub fn leader_name(&self) -> &str {
        &self.leader_name
    }

    pub fn leader_email(&self) -> &str {
        &self.leader_email
    }

    /// The specific symbol of the troop's payments: the configured prefix concatenated with the
    /// troop's numeric code.
    pub fn specific_symbol(&self, prefix: &str) -> String {
        format!("{prefix}{}", self.num_code)
    }
}

impl FromStr for Troop {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        let fields: Vec<&str> = s.split(',').map(str::trim).collect();
        let [name, text_code, num_code, leader_name, leader_email] = fields.as_slice() else {
            bail!(
                "A troop line must have exactly 5 comma-separated fields \
                (name, text code, numeric code, leader name, leader email), got '{s}'"
            );
        };
        Ok(Troop::new(
            *name,
            *text_code,
            *num_code,
            *leader_name,
            *leader_email,
        ))
    }
}

/// The troop table keyed by troop name. Loaded once from configuration; immutable.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct TroopTable {
    troops: HashMap<String, Troop>,
}

impl TroopTable {
    /// Parses the config's troop lines. Duplicate troop names are a configuration error.
    pub fn parse<S: AsRef<str>>(lines: &[S]) -> Result<Self> {
        let mut troops = HashMap::new();
        for line in lines {
            let troop = Troop::from_str(line.as_ref())
                .with_context(|| format!("Invalid troop line '{}'", line.as_ref()))?;
            if let Some(previous) = troops.insert(troop.name.clone(), troop) {
                bail!("Duplicate troop name '{}' in the config", previous.name);
            }
        }
        Ok(Self { troops })
    }

    pub fn get(&self, name: &str) -> Option<&Troop> {
        self.troops.get(name)
    }

    pub fn len(&self) -> usize {
        self.troops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.troops.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_troop_from_str() {
        let troop = Troop::from_str("Sokol, SK, 07, Jana Vedoucí, vedouci@example.com").unwrap();
        assert_eq!(troop.name(), "Sokol");
        assert_eq!(troop.text_code(), "SK");
        assert_eq!(troop.num_code(), "07");
        assert_eq!(troop.leader_name(), "Jana Vedoucí");
        assert_eq!(troop.leader_email(), "vedouci@example.com");
    }

    #[test]
    fn test_troop_from_str_wrong_field_count() {
        assert!(Troop::from_str("Sokol, SK, 07").is_err());
        assert!(Troop::from_str("Sokol, SK, 07, a, b, extra").is_err());
    }

    #[test]
    fn test_specific_symbol() {
        let troop = Troop::from_str("Sokol, SK, 07, Jana, j@example.com").unwrap();
        assert_eq!(troop.specific_symbol("99"), "9907");
    }

    #[test]
    fn test_table_lookup() {
        let table = TroopTable::parse(&[
            "Sokol, SK, 07, Jana, j@example.com",
            "Orel, OR, 08, Petr, p@example.com",
        ])
        .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("Orel").unwrap().num_code(), "08");
        assert!(table.get("Neznámá").is_none());
    }

    #[test]
    fn test_table_duplicate_name() {
        let result = TroopTable::parse(&[
            "Sokol, SK, 07, Jana, j@example.com",
            "Sokol, SO, 09, Petr, p@example.com",
        ]);
        assert!(result.is_err());
    }
}
