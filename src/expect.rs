//! Assertion evaluator
//!
//! A failed expectation becomes [`Error::Assertion`] carrying the expected and
//! actual values plus the selector (or other context) being checked.
//!
//! ```
//! use naamani_e2e::expect::expect;
//!
//! # fn main() -> naamani_e2e::Result<()> {
//! expect(0.6_f64).context("#prevBtn opacity").to_be_less_than(1.0)?;
//! expect("rgb(240, 248, 255) none").to_contain("rgb(240, 248, 255)")?;
//! # Ok(())
//! # }
//! ```

use regex::Regex;
use serde::Serialize;
use std::fmt::{self, Debug};

use crate::{Error, Result};

/// An expectation that did not hold
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssertionFailure {
    /// Selector or description of what was observed
    pub context: String,
    pub expected: String,
    pub actual: String,
    pub message: String,
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.context.is_empty() {
            write!(f, "{}", self.message)?;
        } else {
            write!(f, "{}: {}", self.context, self.message)?;
        }
        write!(f, " (expected {}, actual {})", self.expected, self.actual)
    }
}

/// Start an expectation on `actual`
pub fn expect<T>(actual: T) -> Expectation<T> {
    Expectation {
        actual,
        context: String::new(),
    }
}

#[derive(Debug)]
pub struct Expectation<T> {
    actual: T,
    context: String,
}

impl<T: Debug> Expectation<T> {
    /// Attach the selector or description reported on failure
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    fn fail(&self, message: &str, expected: String) -> Error {
        Error::from(AssertionFailure {
            context: self.context.clone(),
            expected,
            actual: format!("{:?}", self.actual),
            message: message.to_string(),
        })
    }

    fn check(&self, holds: bool, message: &str, expected: impl FnOnce() -> String) -> Result<()> {
        if holds {
            Ok(())
        } else {
            Err(self.fail(message, expected()))
        }
    }

    pub fn to_equal<E: Debug>(&self, expected: E) -> Result<()>
    where
        T: PartialEq<E>,
    {
        self.check(self.actual == expected, "values differ", || format!("{:?}", expected))
    }

    pub fn not_to_equal<E: Debug>(&self, unexpected: E) -> Result<()>
    where
        T: PartialEq<E>,
    {
        self.check(self.actual != unexpected, "values are equal", || {
            format!("anything but {:?}", unexpected)
        })
    }
}

impl<T: AsRef<str> + Debug> Expectation<T> {
    fn text(&self) -> &str {
        self.actual.as_ref()
    }

    pub fn to_contain(&self, needle: &str) -> Result<()> {
        self.check(self.text().contains(needle), "substring missing", || {
            format!("text containing {:?}", needle)
        })
    }

    pub fn not_to_contain(&self, needle: &str) -> Result<()> {
        self.check(!self.text().contains(needle), "unexpected substring", || {
            format!("text without {:?}", needle)
        })
    }

    pub fn to_start_with(&self, prefix: &str) -> Result<()> {
        self.check(self.text().starts_with(prefix), "prefix missing", || {
            format!("text starting with {:?}", prefix)
        })
    }

    /// Unanchored regular expression search
    pub fn to_match(&self, pattern: &str) -> Result<()> {
        let regex = Regex::new(pattern)
            .map_err(|e| Error::internal(format!("Invalid pattern {:?}: {}", pattern, e)))?;
        self.check(regex.is_match(self.text()), "pattern not matched", || format!("/{}/", pattern))
    }

    pub fn to_be_empty(&self) -> Result<()> {
        self.check(self.text().is_empty(), "text is not empty", || "\"\"".to_string())
    }

    pub fn not_to_be_empty(&self) -> Result<()> {
        self.check(!self.text().trim().is_empty(), "text is empty", || "non-empty text".to_string())
    }
}

impl Expectation<bool> {
    pub fn to_be_true(&self) -> Result<()> {
        self.check(self.actual, "condition is false", || "true".to_string())
    }

    pub fn to_be_false(&self) -> Result<()> {
        self.check(!self.actual, "condition is true", || "false".to_string())
    }
}

impl<T: Debug> Expectation<Option<T>> {
    /// Unwrap the value, failing when absent
    pub fn to_be_some(self) -> Result<T> {
        match self.actual {
            Some(value) => Ok(value),
            None => Err(Error::from(AssertionFailure {
                context: self.context,
                expected: "a value".to_string(),
                actual: "None".to_string(),
                message: "value is absent".to_string(),
            })),
        }
    }

    pub fn to_be_none(&self) -> Result<()> {
        self.check(self.actual.is_none(), "value is present", || "None".to_string())
    }
}

/// Values compared by magnitude
pub trait Numeric: Copy + Debug {
    fn as_f64(self) -> f64;
}

macro_rules! impl_numeric {
    ($($t:ty),*) => {
        $(impl Numeric for $t {
            fn as_f64(self) -> f64 {
                self as f64
            }
        })*
    };
}

impl_numeric!(f64, f32, i32, i64, u16, u32, u64, usize);

impl<T: Numeric> Expectation<T> {
    fn value(&self) -> f64 {
        self.actual.as_f64()
    }

    pub fn to_be_less_than(&self, bound: impl Numeric) -> Result<()> {
        let bound = bound.as_f64();
        self.check(self.value() < bound, "not less than bound", || format!("< {}", bound))
    }

    pub fn to_be_greater_than(&self, bound: impl Numeric) -> Result<()> {
        let bound = bound.as_f64();
        self.check(self.value() > bound, "not greater than bound", || format!("> {}", bound))
    }

    pub fn to_be_at_least(&self, bound: impl Numeric) -> Result<()> {
        let bound = bound.as_f64();
        self.check(self.value() >= bound, "below bound", || format!(">= {}", bound))
    }

    pub fn to_be_at_most(&self, bound: impl Numeric) -> Result<()> {
        let bound = bound.as_f64();
        self.check(self.value() <= bound, "above bound", || format!("<= {}", bound))
    }

    /// Equality within `epsilon`
    pub fn to_be_close_to(&self, expected: impl Numeric, epsilon: f64) -> Result<()> {
        let expected = expected.as_f64();
        self.check((self.value() - expected).abs() <= epsilon, "outside tolerance", || {
            format!("{} ± {}", expected, epsilon)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(err: Error) -> AssertionFailure {
        match err {
            Error::Assertion(failure) => *failure,
            other => panic!("expected assertion failure, got {}", other),
        }
    }

    #[test]
    fn test_equality_reports_both_values() {
        assert!(expect(1000usize).to_equal(1000usize).is_ok());

        let f = failure(expect("Loading...").context(".name-title").to_equal("ललिता").unwrap_err());
        assert_eq!(f.context, ".name-title");
        assert_eq!(f.actual, "\"Loading...\"");
        assert_eq!(f.expected, "\"ललिता\"");
        assert!(f.to_string().starts_with(".name-title: values differ"));

        assert!(expect(String::from("Loading...")).not_to_equal("Loading...").is_err());
    }

    #[test]
    fn test_text_expectations() {
        let text = String::from("नाममन्त्रः » ॐ श्रीमात्रे नमः");
        assert!(expect(&text).to_contain("नाममन्त्रः").is_ok());
        assert!(expect(&text).not_to_contain("Error loading").is_ok());
        assert!(expect("http://localhost:8000/naamani/").to_match(r"/naamani/?$").is_ok());
        assert!(expect("").to_be_empty().is_ok());
        assert!(expect("   ").not_to_be_empty().is_err());
        assert!(expect("abc").to_match("(").is_err());

        let f = failure(expect("0px").context(".nav").to_contain("4px").unwrap_err());
        assert_eq!(f.expected, "text containing \"4px\"");
    }

    #[test]
    fn test_numeric_thresholds() {
        assert!(expect(0.6_f64).to_be_less_than(1).is_ok());
        assert!(expect(0.6_f64).to_be_greater_than(0.6).is_err());
        assert!(expect(1200u32).to_be_at_most(1200u32).is_ok());
        assert!(expect(0.1_f64 + 0.2).to_be_close_to(0.3, 1e-9).is_ok());
        assert!(expect(0.1_f64 + 0.2).to_equal(0.3).is_err());

        let f = failure(expect(1.0_f64).context("#prevBtn opacity").to_be_less_than(1.0).unwrap_err());
        assert_eq!(f.expected, "< 1");
        assert_eq!(f.actual, "1.0");
    }

    #[test]
    fn test_bool_and_option() {
        assert!(expect(true).to_be_true().is_ok());
        assert!(expect(true).context("#prevBtn disabled").to_be_false().is_err());
        assert_eq!(expect(Some("2")).to_be_some().unwrap(), "2");
        assert!(expect(None::<String>).to_be_some().is_err());
        assert!(expect(None::<u8>).to_be_none().is_ok());
    }
}
