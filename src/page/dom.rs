//! Page-side element resolution
//!
//! All element work happens inside the page through one script. The Rust side
//! sends a serialized [`DomRequest`]; the script re-resolves the target from
//! scratch on every call, so no element handle ever outlives a single
//! operation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// One step of a locator chain: a CSS selector, an optional text filter and
/// an optional index narrowing the step's matches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorStep {
    pub css: String,
    pub has_text: Option<String>,
    /// Negative counts from the end
    pub nth: Option<i64>,
}

/// A resolved-on-demand element set; each step searches inside the previous one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Target {
    pub steps: Vec<SelectorStep>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Interaction {
    Click,
    Hover,
    Focus,
    Fill,
}

impl Interaction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interaction::Click => "click",
            Interaction::Hover => "hover",
            Interaction::Focus => "focus",
            Interaction::Fill => "fill",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DocumentField {
    Title,
    Url,
    ReadyState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CollectField {
    Text,
    Attribute { name: String },
}

/// What to do with the resolved elements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DomOp {
    Count,
    Text,
    InnerHtml,
    Attribute { name: String },
    InputValue,
    Visible,
    Disabled,
    HasClass { name: String },
    Style { properties: Vec<String> },
    Collect { field: CollectField },
    Prepare { action: Interaction },
    SetValue { value: String },
    Document { field: DocumentField },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomRequest {
    pub op: DomOp,
    pub target: Option<Target>,
}

/// Script reply envelope
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct DomReply {
    pub ok: bool,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub message: Option<String>,
}

/// Center point returned by a successful `Prepare`
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

pub const DOM_SCRIPT: &str = r#"function (req) {
  function norm(s) { return (s || '').replace(/\s+/g, ' ').trim().toLowerCase(); }
  function resolve(target) {
    var scope = [document];
    for (var i = 0; i < target.steps.length; i++) {
      var step = target.steps[i], found = [];
      for (var j = 0; j < scope.length; j++) {
        var list = scope[j].querySelectorAll(step.css);
        for (var k = 0; k < list.length; k++) {
          if (found.indexOf(list[k]) === -1) found.push(list[k]);
        }
      }
      if (step.hasText !== null && step.hasText !== undefined) {
        var needle = norm(step.hasText);
        found = found.filter(function (el) { return norm(el.textContent).indexOf(needle) !== -1; });
      }
      if (step.nth !== null && step.nth !== undefined) {
        var idx = step.nth < 0 ? found.length + step.nth : step.nth;
        found = (idx >= 0 && idx < found.length) ? [found[idx]] : [];
      }
      scope = found;
    }
    return scope;
  }
  function visible(el) {
    if (!el.isConnected) return false;
    var style = getComputedStyle(el);
    if (style.display === 'none' || style.visibility === 'hidden' || style.visibility === 'collapse') return false;
    var rect = el.getBoundingClientRect();
    return rect.width > 0 && rect.height > 0;
  }
  function editable(el) {
    if (el.isContentEditable) return true;
    if (el.tagName === 'TEXTAREA') return !el.readOnly;
    if (el.tagName === 'INPUT') return !el.readOnly && ['checkbox', 'radio', 'button', 'submit', 'reset', 'file', 'image', 'hidden'].indexOf(el.type) === -1;
    return false;
  }
  function fail(code, count, message) { return { ok: false, code: code, count: count, message: message || null }; }
  function describe(el) {
    var s = el.tagName.toLowerCase();
    if (el.id) s += '#' + el.id;
    if (typeof el.className === 'string' && el.className.trim()) s += '.' + el.className.trim().split(/\s+/).join('.');
    return s;
  }
  function prepare(el, action) {
    if (!el.isConnected) return fail('detached', 1);
    el.scrollIntoView({ block: 'center', inline: 'center' });
    if (!visible(el)) return fail('not_visible', 1);
    if ((action === 'click' || action === 'fill') && el.disabled === true) return fail('disabled', 1);
    if (action === 'fill') {
      if (!editable(el)) return fail('not_editable', 1);
      el.focus();
      if (el.isContentEditable) {
        var range = document.createRange();
        range.selectNodeContents(el);
        var sel = window.getSelection();
        sel.removeAllRanges();
        sel.addRange(range);
      } else {
        el.select();
      }
    }
    if (action === 'focus') el.focus();
    var rect = el.getBoundingClientRect();
    var x = rect.left + rect.width / 2, y = rect.top + rect.height / 2;
    if (action === 'click') {
      var hit = document.elementFromPoint(x, y);
      if (!hit || (hit !== el && !el.contains(hit))) {
        return fail('obscured', 1, hit ? 'covered by ' + describe(hit) : 'outside the viewport');
      }
    }
    return { ok: true, count: 1, value: { x: x, y: y } };
  }
  var op = req.op;
  if (op.kind === 'document') {
    var doc = op.field === 'title' ? document.title : op.field === 'url' ? location.href : document.readyState;
    return { ok: true, count: 0, value: doc };
  }
  var els;
  try { els = resolve(req.target); } catch (e) { return fail('invalid_selector', 0, String(e && e.message || e)); }
  var n = els.length;
  switch (op.kind) {
    case 'count': return { ok: true, count: n, value: n };
    case 'visible': return { ok: true, count: n, value: n > 0 && visible(els[0]) };
    case 'collect':
      return { ok: true, count: n, value: els.map(function (el) {
        return op.field.kind === 'text' ? el.textContent : el.getAttribute(op.field.name);
      }) };
  }
  if (n === 0) return fail('not_found', 0);
  var el = els[0];
  switch (op.kind) {
    case 'text': return { ok: true, count: n, value: el.textContent };
    case 'innerHtml': return { ok: true, count: n, value: el.innerHTML };
    case 'attribute': return { ok: true, count: n, value: el.getAttribute(op.name) };
    case 'inputValue':
      if (!('value' in el)) return fail('not_input', n);
      return { ok: true, count: n, value: String(el.value) };
    case 'disabled': return { ok: true, count: n, value: el.disabled === true };
    case 'hasClass': return { ok: true, count: n, value: el.classList.contains(op.name) };
    case 'style':
      var cs = getComputedStyle(el), out = {};
      op.properties.forEach(function (p) { out[p] = cs.getPropertyValue(p); });
      return { ok: true, count: n, value: out };
    case 'prepare': return prepare(el, op.action);
    case 'setValue':
      if (!editable(el)) return fail('not_editable', n);
      el.focus();
      if (el.isContentEditable) { el.textContent = op.value; } else { el.value = op.value; }
      el.dispatchEvent(new Event('input', { bubbles: true }));
      el.dispatchEvent(new Event('change', { bubbles: true }));
      return { ok: true, count: n, value: null };
  }
  return fail('unsupported', n, op.kind);
}"#;

/// Build the expression evaluated for `request`
pub fn expression(request: &DomRequest) -> Result<String> {
    Ok(format!("({})({})", DOM_SCRIPT, serde_json::to_string(request)?))
}

/// Recover the request from an expression built by [`expression`]
pub fn parse_expression(expression: &str) -> Option<DomRequest> {
    let body = expression
        .strip_prefix('(')?
        .strip_prefix(DOM_SCRIPT)?
        .strip_prefix(")(")?
        .strip_suffix(')')?;
    serde_json::from_str(body).ok()
}

/// Map a failed reply onto the error taxonomy
pub fn reply_error(reply: &DomReply, selector: &str) -> Error {
    let code = reply.code.as_deref().unwrap_or("unknown");
    match code {
        "not_found" => Error::element_not_found(selector),
        "not_visible" => Error::not_interactable(selector, "element is not visible"),
        "disabled" => Error::not_interactable(selector, "element is disabled"),
        "detached" => Error::not_interactable(selector, "element is detached from the document"),
        "not_editable" => Error::not_interactable(selector, "element is not editable"),
        "obscured" => Error::not_interactable(
            selector,
            format!(
                "element is obscured ({})",
                reply.message.as_deref().unwrap_or("hit test failed")
            ),
        ),
        "invalid_selector" => Error::script_execution_failed(format!(
            "Invalid selector {}: {}",
            selector,
            reply.message.as_deref().unwrap_or("")
        )),
        other => Error::script_execution_failed(format!(
            "{} failed for {}: {}",
            other,
            selector,
            reply.message.as_deref().unwrap_or("")
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expression_roundtrip() {
        let request = DomRequest {
            op: DomOp::Style {
                properties: vec!["opacity".to_string(), "background-color".to_string()],
            },
            target: Some(Target {
                steps: vec![SelectorStep {
                    css: "#mantra-section button".to_string(),
                    has_text: Some("✕ Cancel".to_string()),
                    nth: Some(0),
                }],
            }),
        };
        let expr = expression(&request).unwrap();
        assert!(expr.starts_with("(function (req)"));
        assert_eq!(parse_expression(&expr), Some(request));
        assert_eq!(parse_expression("document.title"), None);
    }

    #[test]
    fn test_request_wire_shape() {
        let request = DomRequest {
            op: DomOp::HasClass {
                name: "collapsed".to_string(),
            },
            target: Some(Target::default()),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["op"], json!({ "kind": "hasClass", "name": "collapsed" }));
        assert_eq!(value["target"]["steps"], json!([]));
    }

    #[test]
    fn test_reply_error_mapping() {
        let reply = DomReply {
            ok: false,
            code: Some("disabled".to_string()),
            count: 1,
            ..Default::default()
        };
        let err = reply_error(&reply, "#prevBtn");
        assert!(matches!(err, Error::ElementNotInteractable { ref reason, .. } if reason.contains("disabled")));

        let reply = DomReply {
            ok: false,
            code: Some("not_found".to_string()),
            ..Default::default()
        };
        assert!(matches!(reply_error(&reply, ".name-card"), Error::ElementNotFound { .. }));
    }
}
