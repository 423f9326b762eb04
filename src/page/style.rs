//! Computed style snapshots

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::SystemTime;

use crate::{Error, Result};

/// Resolved style values of one locator's first match, captured at one instant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputedStyleSnapshot {
    locator: String,
    values: BTreeMap<String, String>,
    #[serde(skip)]
    captured_at: SystemTime,
}

impl ComputedStyleSnapshot {
    pub(crate) fn new(locator: &str, values: BTreeMap<String, String>) -> Self {
        Self {
            locator: locator.to_string(),
            values,
            captured_at: SystemTime::now(),
        }
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn captured_at(&self) -> SystemTime {
        self.captured_at
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// Value of `property` (camelCase or kebab-case)
    pub fn get(&self, property: &str) -> Option<&str> {
        self.values.get(&kebab_case(property)).map(String::as_str)
    }

    /// Like [`get`](Self::get) but an absent property is an error
    pub fn require(&self, property: &str) -> Result<&str> {
        self.get(property).ok_or_else(|| {
            Error::internal(format!(
                "Property {} was not captured for {}",
                kebab_case(property),
                self.locator
            ))
        })
    }

    /// Leading number of the value ("0.6", "1200px", "-2px 0px")
    pub fn number(&self, property: &str) -> Result<f64> {
        let value = self.require(property)?;
        leading_number(value).ok_or_else(|| {
            Error::internal(format!("{} of {} is not numeric: {:?}", property, self.locator, value))
        })
    }

    /// Pixel value; fails unless the value is expressed in px
    pub fn px(&self, property: &str) -> Result<f64> {
        let value = self.require(property)?.trim();
        value
            .strip_suffix("px")
            .and_then(|n| n.trim().parse::<f64>().ok())
            .ok_or_else(|| Error::internal(format!("{} of {} is not a px value: {:?}", property, self.locator, value)))
    }

    /// Properties whose value changed between `earlier` and `self`.
    ///
    /// Snapshots of different locators are not comparable.
    pub fn differs_from(&self, earlier: &ComputedStyleSnapshot) -> Result<Vec<String>> {
        if self.locator != earlier.locator {
            return Err(Error::internal(format!(
                "Cannot compare style snapshots of {} and {}",
                earlier.locator, self.locator
            )));
        }
        Ok(self
            .values
            .iter()
            .filter(|(name, value)| earlier.values.get(*name) != Some(*value))
            .map(|(name, _)| name.clone())
            .collect())
    }
}

/// `borderLeft` -> `border-left`; custom properties and kebab-case pass through
pub(crate) fn kebab_case(property: &str) -> String {
    if property.starts_with("--") {
        return property.to_string();
    }
    let mut out = String::with_capacity(property.len() + 4);
    for c in property.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn leading_number(value: &str) -> Option<f64> {
    let value = value.trim_start();
    let end = value
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || ((c == '-' || c == '+') && i == 0)))
        .map(|(i, _)| i)
        .unwrap_or(value.len());
    value[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(locator: &str, pairs: &[(&str, &str)]) -> ComputedStyleSnapshot {
        ComputedStyleSnapshot::new(
            locator,
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        )
    }

    #[test]
    fn test_property_names_normalise() {
        assert_eq!(kebab_case("borderLeft"), "border-left");
        assert_eq!(kebab_case("max-width"), "max-width");
        assert_eq!(kebab_case("--accent"), "--accent");

        let snap = snapshot("#balatapa-section", &[("border-left", "4px solid rgb(255, 193, 7)")]);
        assert_eq!(snap.get("borderLeft"), Some("4px solid rgb(255, 193, 7)"));
        assert!(snap.require("opacity").is_err());
    }

    #[test]
    fn test_numeric_accessors() {
        let snap = snapshot(".content", &[("max-width", "1200px"), ("opacity", "0.5"), ("right", "auto")]);
        assert_eq!(snap.px("max-width").unwrap(), 1200.0);
        assert_eq!(snap.number("opacity").unwrap(), 0.5);
        assert!(snap.px("opacity").is_err());
        assert!(snap.number("right").is_err());
    }

    #[test]
    fn test_differs_from_same_locator_only() {
        let before = snapshot("#nextBtn", &[("transform", "none"), ("opacity", "1")]);
        let after = snapshot("#nextBtn", &[("transform", "matrix(1, 0, 0, 1, 0, -2)"), ("opacity", "1")]);
        assert_eq!(after.differs_from(&before).unwrap(), vec!["transform".to_string()]);
        assert!(before.differs_from(&before.clone()).unwrap().is_empty());

        let other = snapshot("#prevBtn", &[("transform", "none")]);
        assert!(other.differs_from(&before).is_err());
    }
}
