use crate::browser::driver::Driver;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A declarative way to find elements on the page
///
/// Locators deserialize from plain strings: anything starting with `/` or `(`
/// is treated as XPath, everything else as a CSS selector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Locator {
    /// CSS selector
    Css(String),
    /// XPath expression
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Locator::XPath(expression.into())
    }

    /// The raw selector or expression
    pub fn value(&self) -> &str {
        match self {
            Locator::Css(s) | Locator::XPath(s) => s,
        }
    }

    /// JavaScript expression evaluating to an array of the matched nodes under `root`
    pub fn js_nodes_within(&self, root: &str) -> String {
        let quoted = serde_json::to_string(self.value()).unwrap_or_else(|_| "\"\"".to_string());
        match self {
            Locator::Css(_) => format!("Array.from(({root}).querySelectorAll({quoted}))"),
            Locator::XPath(_) => format!(
                "(function(r){{var s=document.evaluate({quoted},r,null,XPathResult.ORDERED_NODE_SNAPSHOT_TYPE,null);\
                 var a=[];for(var i=0;i<s.snapshotLength;i++){{a.push(s.snapshotItem(i));}}return a;}})({root})"
            ),
        }
    }

    /// JavaScript expression evaluating to an array of the matched nodes in the document
    pub fn js_nodes(&self) -> String {
        self.js_nodes_within("document")
    }

    /// Locator for a link below this element whose `href` is exactly `href`
    pub fn link_with_href(&self, href: &str) -> Locator {
        match self {
            Locator::Css(s) => {
                let escaped = href.replace('\\', "\\\\").replace('"', "\\\"");
                Locator::Css(format!("{} a[href=\"{}\"]", s, escaped))
            }
            Locator::XPath(s) => Locator::XPath(format!("{}//a[@href={}]", s, xpath_literal(href))),
        }
    }
}

fn xpath_literal(value: &str) -> String {
    if !value.contains('"') {
        format!("\"{}\"", value)
    } else if !value.contains('\'') {
        format!("'{}'", value)
    } else {
        let parts: Vec<String> = value.split('"').map(|p| format!("\"{}\"", p)).collect();
        format!("concat({})", parts.join(", '\"', "))
    }
}

impl From<String> for Locator {
    fn from(value: String) -> Self {
        let trimmed = value.trim_start();
        if trimmed.starts_with('/') || trimmed.starts_with('(') {
            Locator::XPath(value)
        } else {
            Locator::Css(value)
        }
    }
}

impl From<&str> for Locator {
    fn from(value: &str) -> Self {
        Locator::from(value.to_string())
    }
}

impl From<Locator> for String {
    fn from(locator: Locator) -> Self {
        match locator {
            Locator::Css(s) | Locator::XPath(s) => s,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css `{}`", s),
            Locator::XPath(s) => write!(f, "xpath `{}`", s),
        }
    }
}

/// Return the first locator of the chain that currently matches at least one element.
///
/// Lookup errors on individual locators are treated as "no match" so the chain
/// keeps escalating.
pub fn first_present<'l>(driver: &dyn Driver, chain: &'l [Locator]) -> Option<&'l Locator> {
    chain.iter().find(|locator| match driver.count(locator) {
        Ok(n) => n > 0,
        Err(e) => {
            log::debug!("Locator {} failed: {}", locator, e);
            false
        }
    })
}
