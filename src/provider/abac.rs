//! Attribute-based access control policy.
//!
//! The policy file holds one JSON object per line:
//!
//! ```text
//! {"apiVersion":"abac.authorization.kubernetes.io/v1beta1","kind":"Policy","spec":{"user":"alice","namespace":"*","resource":"*"}}
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.
//!
//! # Matching
//! A rule matches when its subject matches (user and/or group, `*` for
//! any), its `readonly` flag admits the verb, and either the resource
//! fields (namespace, resource, apiGroup) or the non-resource path match.
//! Any matching rule allows the request.

use std::path::Path;

use serde::Deserialize;

use super::{
    AccessAttributes, AuthorizationProvider, Decision, FileProvider, LoadError, ProviderError,
    RequestAttributes,
};

pub const POLICY_API_VERSION: &str = "abac.authorization.kubernetes.io/v1beta1";
pub const POLICY_KIND: &str = "Policy";

/// Reason given when no rule allows a request.
pub const NO_POLICY_MATCHED: &str = "No policy matched.";

const WILDCARD: &str = "*";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PolicyLine {
    #[serde(default)]
    api_version: String,
    #[serde(default)]
    kind: String,
    spec: PolicyRule,
}

/// A single rule. Empty strings are neither wildcards nor matches for
/// non-empty attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PolicyRule {
    pub user: String,
    pub group: String,
    pub readonly: bool,
    pub api_group: String,
    pub namespace: String,
    pub resource: String,
    pub non_resource_path: String,
}

impl PolicyRule {
    pub fn matches(&self, attrs: &AccessAttributes) -> bool {
        if !self.subject_matches(attrs) {
            return false;
        }
        if self.readonly && !attrs.is_read_only() {
            return false;
        }
        match &attrs.request {
            RequestAttributes::Resource(r) => {
                field_matches(&self.namespace, &r.namespace)
                    && field_matches(&self.resource, &r.resource)
                    && field_matches(&self.api_group, &r.api_group)
            }
            RequestAttributes::NonResource { path, .. } => self.path_matches(path),
        }
    }

    fn subject_matches(&self, attrs: &AccessAttributes) -> bool {
        let mut matched = false;

        if !self.user.is_empty() {
            if self.user != WILDCARD && self.user != attrs.subject_name {
                return false;
            }
            matched = true;
        }

        if !self.group.is_empty() {
            if self.group != WILDCARD && !attrs.subject_groups.iter().any(|g| *g == self.group) {
                return false;
            }
            matched = true;
        }

        matched
    }

    fn path_matches(&self, path: &str) -> bool {
        let rule = self.non_resource_path.as_str();
        if rule == WILDCARD || rule == path {
            return true;
        }
        match rule.strip_suffix('*') {
            Some(prefix) => path.starts_with(prefix),
            None => false,
        }
    }
}

fn field_matches(rule: &str, value: &str) -> bool {
    rule == WILDCARD || rule == value
}

/// An immutable set of rules.
#[derive(Debug, Clone, Default)]
pub struct AbacPolicy {
    rules: Vec<PolicyRule>,
}

impl AbacPolicy {
    pub fn new(rules: Vec<PolicyRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }
}

impl FileProvider for AbacPolicy {
    fn from_bytes(path: &Path, content: &[u8]) -> Result<Self, LoadError> {
        let text = std::str::from_utf8(content)
            .map_err(|e| LoadError::parse(path, 0, format!("invalid utf-8: {}", e)))?;

        let mut rules = Vec::new();
        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let parsed: PolicyLine = serde_json::from_str(trimmed)
                .map_err(|e| LoadError::parse(path, line, e.to_string()))?;

            if parsed.api_version != POLICY_API_VERSION || parsed.kind != POLICY_KIND {
                return Err(LoadError::parse(
                    path,
                    line,
                    format!(
                        "unsupported policy {}/{}, expected {}/{}",
                        parsed.api_version, parsed.kind, POLICY_API_VERSION, POLICY_KIND
                    ),
                ));
            }
            rules.push(parsed.spec);
        }

        tracing::debug!(path = %path.display(), rules = rules.len(), "Policy file parsed");
        Ok(Self { rules })
    }
}

impl AuthorizationProvider for AbacPolicy {
    fn authorize(&self, attributes: &AccessAttributes) -> Result<Decision, ProviderError> {
        if self.rules.iter().any(|rule| rule.matches(attributes)) {
            return Ok(Decision::Allow);
        }
        Ok(Decision::Deny {
            reason: NO_POLICY_MATCHED.to_string(),
        })
    }
}
