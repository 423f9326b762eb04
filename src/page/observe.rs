//! Observation layer
//!
//! Read-only queries against a locator. Nothing here mutates the page.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::instrument;

use super::dom::{reply_error, CollectField, DomOp, DomReply};
use super::style::{kebab_case, ComputedStyleSnapshot};
use super::wait::{poll_until, Probe};
use super::Locator;
use crate::{Error, Result};

impl<'p> Locator<'p> {
    /// Run `op` against this locator, turning script failures into errors
    pub(crate) async fn query(&self, op: DomOp) -> Result<DomReply> {
        let reply = self.page.dom(op, Some(&self.target)).await?;
        self.check(reply)
    }

    /// Same as [`query`](Self::query) for callers already holding the page lock
    pub(crate) async fn query_unlocked(&self, op: DomOp) -> Result<DomReply> {
        let reply = self.page.dom_unlocked(op, Some(&self.target)).await?;
        self.check(reply)
    }

    fn check(&self, reply: DomReply) -> Result<DomReply> {
        if reply.ok {
            Ok(reply)
        } else {
            Err(reply_error(&reply, self.selector()))
        }
    }

    /// Number of elements matching right now; may be zero
    #[instrument(skip(self), fields(locator = %self))]
    pub async fn count(&self) -> Result<usize> {
        Ok(self.query(DomOp::Count).await?.count)
    }

    #[instrument(skip(self), fields(locator = %self))]
    pub async fn text_content(&self) -> Result<String> {
        let reply = self.query(DomOp::Text).await?;
        Ok(as_string(reply.value))
    }

    pub async fn inner_html(&self) -> Result<String> {
        let reply = self.query(DomOp::InnerHtml).await?;
        Ok(as_string(reply.value))
    }

    /// Attribute of the first match; `None` when the attribute is absent
    #[instrument(skip(self), fields(locator = %self))]
    pub async fn get_attribute(&self, name: &str) -> Result<Option<String>> {
        let reply = self
            .query(DomOp::Attribute {
                name: name.to_string(),
            })
            .await?;
        Ok(reply.value.as_str().map(str::to_string))
    }

    /// Current value of an input or textarea
    pub async fn input_value(&self) -> Result<String> {
        let reply = self.query(DomOp::InputValue).await?;
        Ok(as_string(reply.value))
    }

    /// Rendered and non-empty; false when nothing matches
    #[instrument(skip(self), fields(locator = %self))]
    pub async fn is_visible(&self) -> Result<bool> {
        let reply = self.query(DomOp::Visible).await?;
        Ok(reply.value.as_bool().unwrap_or(false))
    }

    #[instrument(skip(self), fields(locator = %self))]
    pub async fn is_disabled(&self) -> Result<bool> {
        let reply = self.query(DomOp::Disabled).await?;
        Ok(reply.value.as_bool().unwrap_or(false))
    }

    pub async fn is_enabled(&self) -> Result<bool> {
        Ok(!self.is_disabled().await?)
    }

    pub async fn has_class(&self, name: &str) -> Result<bool> {
        let reply = self
            .query(DomOp::HasClass {
                name: name.to_string(),
            })
            .await?;
        Ok(reply.value.as_bool().unwrap_or(false))
    }

    /// Resolved values of `properties` on the first match
    #[instrument(skip(self), fields(locator = %self))]
    pub async fn computed_style(&self, properties: &[&str]) -> Result<ComputedStyleSnapshot> {
        let properties: Vec<String> = properties.iter().map(|p| kebab_case(p)).collect();
        let reply = self.query(DomOp::Style { properties }).await?;

        let values = match reply.value {
            Value::Object(map) => map
                .into_iter()
                .map(|(name, value)| (name, as_string(value)))
                .collect::<BTreeMap<_, _>>(),
            other => {
                return Err(Error::script_execution_failed(format!(
                    "Unexpected computed style reply for {}: {}",
                    self, other
                )))
            }
        };
        Ok(ComputedStyleSnapshot::new(self.selector(), values))
    }

    /// `textContent` of every match, in document order
    pub async fn all_text_contents(&self) -> Result<Vec<String>> {
        let reply = self
            .query(DomOp::Collect {
                field: CollectField::Text,
            })
            .await?;
        Ok(collect(reply.value, as_string))
    }

    /// Attribute of every match, in document order
    pub async fn all_attributes(&self, name: &str) -> Result<Vec<Option<String>>> {
        let reply = self
            .query(DomOp::Collect {
                field: CollectField::Attribute {
                    name: name.to_string(),
                },
            })
            .await?;
        Ok(collect(reply.value, |v| v.as_str().map(str::to_string)))
    }

    /// Wait until at least one element matches
    #[instrument(skip(self), fields(locator = %self))]
    pub async fn wait_for(&self, timeout: Duration) -> Result<()> {
        self.wait_for_count_where(&format!("{} to be attached", self), timeout, |n| n > 0)
            .await
    }

    /// Wait until exactly `expected` elements match
    #[instrument(skip(self), fields(locator = %self))]
    pub async fn wait_for_count(&self, expected: usize, timeout: Duration) -> Result<()> {
        self.wait_for_count_where(&format!("{} to match {} elements", self, expected), timeout, |n| {
            n == expected
        })
        .await
    }

    async fn wait_for_count_where<F>(&self, what: &str, timeout: Duration, accept: F) -> Result<()>
    where
        F: Fn(usize) -> bool,
    {
        let timeout = self.page.deadline().clamp(timeout);
        let accept = &accept;
        poll_until(what, timeout, self.page.poll_interval(), move || async move {
            let n = self.count().await?;
            if accept(n) {
                Ok(Probe::Ready(()))
            } else {
                Ok(Probe::Pending(Some(format!("{} matching", n))))
            }
        })
        .await
    }

    /// Wait until the first match has (`present`) or lacks the class `name`
    #[instrument(skip(self), fields(locator = %self))]
    pub async fn wait_for_class(&self, name: &str, present: bool, timeout: Duration) -> Result<()> {
        let what = format!(
            "{} to {} class {:?}",
            self,
            if present { "have" } else { "lose" },
            name
        );
        let timeout = self.page.deadline().clamp(timeout);

        poll_until(&what, timeout, self.page.poll_interval(), move || async move {
            let reply = self
                .page
                .dom(
                    DomOp::HasClass {
                        name: name.to_string(),
                    },
                    Some(&self.target),
                )
                .await?;
            if !reply.ok {
                return match reply.code.as_deref() {
                    Some("not_found") => Ok(Probe::Pending(Some("no matching element".to_string()))),
                    _ => Err(reply_error(&reply, self.selector())),
                };
            }
            if reply.value.as_bool() == Some(present) {
                Ok(Probe::Ready(()))
            } else {
                Ok(Probe::Pending(Some(format!("class present: {}", !present))))
            }
        })
        .await
    }

    /// Wait until `property` differs from `baseline` and holds the same value
    /// for two consecutive samples, i.e. the transition has finished
    #[instrument(skip(self, baseline), fields(locator = %self))]
    pub async fn wait_for_style_change(
        &self,
        property: &str,
        baseline: &ComputedStyleSnapshot,
        timeout: Duration,
    ) -> Result<ComputedStyleSnapshot> {
        if baseline.locator() != self.selector() {
            return Err(Error::internal(format!(
                "Baseline was captured for {}, not {}",
                baseline.locator(),
                self
            )));
        }
        let before = baseline.require(property)?.to_string();
        let what = format!("{} of {} to change from {:?}", kebab_case(property), self, before);
        let timeout = self.page.deadline().clamp(timeout);
        let previous: Mutex<Option<String>> = Mutex::new(None);

        let previous = &previous;
        let before = before.as_str();
        poll_until(&what, timeout, self.page.poll_interval(), move || async move {
            let snapshot = self.computed_style(&[property]).await?;
            let current = snapshot.require(property)?.to_string();
            let mut last = previous
                .lock()
                .map_err(|_| Error::internal("style sample lock poisoned"))?;
            let settled = current != before && last.as_deref() == Some(current.as_str());
            *last = Some(current.clone());
            if settled {
                Ok(Probe::Ready(snapshot))
            } else {
                Ok(Probe::Pending(Some(current)))
            }
        })
        .await
    }
}

fn as_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn collect<T>(value: Value, f: impl Fn(Value) -> T) -> Vec<T> {
    match value {
        Value::Array(items) => items.into_iter().map(f).collect(),
        _ => Vec::new(),
    }
}
