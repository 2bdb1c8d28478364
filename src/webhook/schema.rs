//! Wire records for token and access reviews.
//!
//! Field names follow the `authentication.k8s.io/v1beta1` and
//! `authorization.k8s.io/v1beta1` review objects so API servers can call
//! the service directly.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

pub const TOKEN_REVIEW_API_VERSION: &str = "authentication.k8s.io/v1beta1";
pub const TOKEN_REVIEW_KIND: &str = "TokenReview";
pub const ACCESS_REVIEW_API_VERSION: &str = "authorization.k8s.io/v1beta1";
pub const ACCESS_REVIEW_KIND: &str = "SubjectAccessReview";

/// Error text for unknown tokens.
pub const TOKEN_NOT_FOUND: &str = "token not found";

fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// Go clients send `null` for empty lists and maps.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenReview {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "is_default")]
    pub spec: TokenReviewSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TokenReviewStatus>,
}

impl TokenReview {
    pub fn with_status(status: TokenReviewStatus) -> Self {
        Self {
            api_version: TOKEN_REVIEW_API_VERSION.to_string(),
            kind: TOKEN_REVIEW_KIND.to_string(),
            spec: TokenReviewSpec::default(),
            status: Some(status),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenReviewSpec {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenReviewStatus {
    pub authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAccessReview {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "is_default")]
    pub spec: SubjectAccessReviewSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SubjectAccessReviewStatus>,
}

impl SubjectAccessReview {
    pub fn with_status(status: SubjectAccessReviewStatus) -> Self {
        Self {
            api_version: ACCESS_REVIEW_API_VERSION.to_string(),
            kind: ACCESS_REVIEW_KIND.to_string(),
            spec: SubjectAccessReviewSpec::default(),
            status: Some(status),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubjectAccessReviewSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_attributes: Option<ResourceAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub non_resource_attributes: Option<NonResourceAttributes>,
    pub user: String,
    /// v1beta1 clients name this field `group`.
    #[serde(alias = "group", deserialize_with = "nullable")]
    pub groups: Vec<String>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceAttributes {
    pub namespace: String,
    pub verb: String,
    pub group: String,
    pub version: String,
    pub resource: String,
    pub subresource: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NonResourceAttributes {
    pub path: String,
    pub verb: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectAccessReviewStatus {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn negative_token_review_shape() {
        let review = TokenReview::with_status(TokenReviewStatus {
            authenticated: false,
            user: None,
            error: TOKEN_NOT_FOUND.into(),
        });
        assert_eq!(
            serde_json::to_value(&review).unwrap(),
            json!({
                "apiVersion": "authentication.k8s.io/v1beta1",
                "kind": "TokenReview",
                "status": { "authenticated": false, "error": "token not found" }
            })
        );
    }

    #[test]
    fn access_review_decodes_kubernetes_payload() {
        let review: SubjectAccessReview = serde_json::from_value(json!({
            "apiVersion": "authorization.k8s.io/v1beta1",
            "kind": "SubjectAccessReview",
            "spec": {
                "resourceAttributes": { "namespace": "default", "verb": "get", "resource": "pods" },
                "user": "jane",
                "groups": ["dev"],
                "extra": { "scopes": ["a"] }
            }
        }))
        .unwrap();

        let attrs = review.spec.resource_attributes.unwrap();
        assert_eq!(attrs.namespace, "default");
        assert_eq!(attrs.group, "");
        assert_eq!(review.spec.user, "jane");
        assert!(review.spec.non_resource_attributes.is_none());
    }

    #[test]
    fn go_style_nulls_and_group_alias() {
        let review: SubjectAccessReview = serde_json::from_value(json!({
            "spec": {
                "nonResourceAttributes": { "path": "/v1/api", "verb": "get" },
                "group": null,
                "extra": null
            }
        }))
        .unwrap();
        assert!(review.spec.groups.is_empty());
        assert_eq!(review.spec.non_resource_attributes.unwrap().path, "/v1/api");

        let review: SubjectAccessReview =
            serde_json::from_value(json!({ "spec": { "group": ["ops"] } })).unwrap();
        assert_eq!(review.spec.groups, vec!["ops".to_string()]);
    }

    #[test]
    fn allowed_status_omits_reason() {
        let review = SubjectAccessReview::with_status(SubjectAccessReviewStatus {
            allowed: true,
            reason: String::new(),
        });
        assert_eq!(
            serde_json::to_value(&review).unwrap()["status"],
            json!({ "allowed": true })
        );
    }
}
