//! Review dispatch: decode, consult the current providers, encode.

use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::provider::{
    AccessAttributes, Decision, ProviderError, RequestAttributes, ResourceRequest,
};
use crate::state::{ServiceState, StateStore};
use crate::webhook::schema::{
    SubjectAccessReview, SubjectAccessReviewSpec, SubjectAccessReviewStatus, TokenReview,
    TokenReviewStatus, UserInfo, TOKEN_NOT_FOUND,
};

/// Review kinds served under `/authorize/{kind}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewKind {
    Token,
    Policy,
}

impl ReviewKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewKind::Token => "token",
            ReviewKind::Policy => "policy",
        }
    }
}

impl FromStr for ReviewKind {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "token" => Ok(ReviewKind::Token),
            "policy" => Ok(ReviewKind::Policy),
            other => Err(DispatchError::UnknownKind(other.to_string())),
        }
    }
}

/// A decoded review request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewRequest {
    Token(TokenReview),
    Access(SubjectAccessReview),
}

impl ReviewRequest {
    /// Decode `body` as the schema belonging to `kind`.
    pub fn decode(kind: ReviewKind, body: &[u8]) -> Result<Self, DispatchError> {
        Ok(match kind {
            ReviewKind::Token => ReviewRequest::Token(serde_json::from_slice(body)?),
            ReviewKind::Policy => ReviewRequest::Access(serde_json::from_slice(body)?),
        })
    }
}

/// A review answer, serialized as the bare review object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReviewResponse {
    Token(TokenReview),
    Access(SubjectAccessReview),
}

impl ReviewResponse {
    /// Short label for metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            ReviewResponse::Token(r) if r.status.as_ref().is_some_and(|s| s.authenticated) => {
                "authenticated"
            }
            ReviewResponse::Token(_) => "unauthenticated",
            ReviewResponse::Access(r) if r.status.as_ref().is_some_and(|s| s.allowed) => "allowed",
            ReviewResponse::Access(_) => "denied",
        }
    }
}

/// Reasons a review could not be answered. Negative decisions are not errors.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown review kind: {0}")]
    UnknownKind(String),
    #[error("unable to decode request: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("authorization is not configured")]
    AuthorizationDisabled,
}

impl DispatchError {
    /// Short label for metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            DispatchError::UnknownKind(_) => "unknown_kind",
            DispatchError::Decode(_) => "decode_error",
            DispatchError::Provider(_) | DispatchError::AuthorizationDisabled => "provider_error",
        }
    }
}

/// Answers reviews from whatever state is current when the call starts.
#[derive(Clone)]
pub struct WebhookDispatcher {
    store: StateStore,
}

impl WebhookDispatcher {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Resolve `kind`, decode `body` and answer it.
    ///
    /// The kind is checked before the body is looked at, and no provider is
    /// consulted unless decoding succeeds.
    pub fn dispatch(&self, kind: &str, body: &[u8]) -> Result<ReviewResponse, DispatchError> {
        self.answer(kind.parse()?, body)
    }

    /// Decode `body` for an already resolved `kind` and answer it.
    pub fn answer(&self, kind: ReviewKind, body: &[u8]) -> Result<ReviewResponse, DispatchError> {
        let request = ReviewRequest::decode(kind, body)?;
        self.review(request)
    }

    pub fn review(&self, request: ReviewRequest) -> Result<ReviewResponse, DispatchError> {
        let state = self.store.get();
        match request {
            ReviewRequest::Token(review) => {
                authenticate(&state, &review.spec.token).map(ReviewResponse::Token)
            }
            ReviewRequest::Access(review) => {
                authorize(&state, &review.spec).map(ReviewResponse::Access)
            }
        }
    }
}

fn authenticate(state: &ServiceState, token: &str) -> Result<TokenReview, DispatchError> {
    let status = match state.authn().authenticate_token(token)? {
        Some(identity) => TokenReviewStatus {
            authenticated: true,
            user: Some(UserInfo {
                username: identity.name,
                uid: identity.uid,
                groups: identity.groups,
            }),
            error: String::new(),
        },
        None => TokenReviewStatus {
            authenticated: false,
            user: None,
            error: TOKEN_NOT_FOUND.to_string(),
        },
    };
    Ok(TokenReview::with_status(status))
}

fn authorize(
    state: &ServiceState,
    spec: &SubjectAccessReviewSpec,
) -> Result<SubjectAccessReview, DispatchError> {
    let authz = state.authz().ok_or(DispatchError::AuthorizationDisabled)?;

    let status = match authz.authorize(&access_attributes(spec))? {
        Decision::Allow => SubjectAccessReviewStatus {
            allowed: true,
            reason: String::new(),
        },
        Decision::Deny { reason } => SubjectAccessReviewStatus {
            allowed: false,
            reason,
        },
    };
    Ok(SubjectAccessReview::with_status(status))
}

/// Build authorizer input from a review spec.
///
/// Resource attributes win when both kinds are present; a spec with
/// neither is treated as a non-resource request for an empty path.
pub fn access_attributes(spec: &SubjectAccessReviewSpec) -> AccessAttributes {
    let request = match (&spec.resource_attributes, &spec.non_resource_attributes) {
        (Some(r), _) => RequestAttributes::Resource(ResourceRequest {
            verb: r.verb.clone(),
            namespace: r.namespace.clone(),
            api_group: r.group.clone(),
            api_version: r.version.clone(),
            resource: r.resource.clone(),
            subresource: r.subresource.clone(),
            name: r.name.clone(),
        }),
        (None, Some(n)) => RequestAttributes::NonResource {
            path: n.path.clone(),
            verb: n.verb.clone(),
        },
        (None, None) => RequestAttributes::NonResource {
            path: String::new(),
            verb: String::new(),
        },
    };

    AccessAttributes {
        subject_name: spec.user.clone(),
        subject_groups: spec.groups.clone(),
        request,
    }
}
