//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use authz_webhook::config::Options;
use authz_webhook::lifecycle::{self, Shutdown};
use authz_webhook::StateStore;
use serde_json::{json, Value};
use tempfile::TempDir;

pub const DEFAULT_TOKENS: &str = "
token1,user1,uuid1
token2,user2,uuid2
token3,user3,uuid3,group3
";

pub const DEFAULT_POLICY: &str = r#"
{"apiVersion":"abac.authorization.kubernetes.io/v1beta1","kind":"Policy","spec":{ "user":"admin", "namespace": "*", "resource": "*" }}
{"apiVersion":"abac.authorization.kubernetes.io/v1beta1","kind":"Policy","spec":{ "user":"user1", "namespace": "adm", "resource": "*" }}
{"apiVersion":"abac.authorization.kubernetes.io/v1beta1","kind":"Policy","spec":{ "user":"user1", "namespace": "adm-dev", "resource": "*" }}
{"apiVersion":"abac.authorization.kubernetes.io/v1beta1","kind":"Policy","spec":{ "user":"user2", "namespace": "adm-preprod", "resource": "*" }}
{"apiVersion":"abac.authorization.kubernetes.io/v1beta1","kind":"Policy","spec":{ "user":"user3", "namespace": "te", "resource": "*" }}
{"apiVersion":"abac.authorization.kubernetes.io/v1beta1","kind":"Policy","spec":{ "user":"user3", "namespace": "te-dev", "resource": "*" }}
{"apiVersion":"abac.authorization.kubernetes.io/v1beta1","kind":"Policy","spec":{ "user":"user3", "namespace": "te-preprod", "resource": "*" }}
{"apiVersion":"abac.authorization.kubernetes.io/v1beta1","kind":"Policy","spec":{ "user":"user2", "namespace": "sip-demo", "resource": "*" }}
{"apiVersion":"abac.authorization.kubernetes.io/v1beta1","kind":"Policy","spec":{ "group":"group3", "namespace": "sip-demo", "resource": "*" }}
{"apiVersion":"abac.authorization.kubernetes.io/v1beta1","kind":"Policy","spec":{ "user":"*", "nonResourcePath": "*", "readonly": true }}
"#;

/// A running service on an ephemeral port, backed by files in a temp dir.
pub struct TestService {
    pub url: String,
    pub token_file: PathBuf,
    pub policy_file: PathBuf,
    pub store: StateStore,
    shutdown: Shutdown,
    _dir: TempDir,
}

impl TestService {
    pub async fn start() -> Self {
        Self::with_files(DEFAULT_TOKENS, DEFAULT_POLICY).await
    }

    pub async fn with_files(tokens: &str, policy: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let token_file = dir.path().join("tokens.csv");
        let policy_file = dir.path().join("policy.jsonl");
        std::fs::write(&token_file, tokens).unwrap();
        std::fs::write(&policy_file, policy).unwrap();

        let options = Options {
            listen: "127.0.0.1:0".into(),
            token_file: Some(token_file.clone()),
            auth_policy: Some(policy_file.clone()),
            ..Options::default()
        };
        let service = lifecycle::start(options).await.unwrap();
        let url = format!("http://{}", service.local_addr());
        let store = service.store().clone();

        let shutdown = Shutdown::new();
        tokio::spawn(service.run(shutdown.clone()));

        Self {
            url,
            token_file,
            policy_file,
            store,
            shutdown,
            _dir: dir,
        }
    }

    pub async fn token_review(&self, token: &str) -> Value {
        let res = client()
            .post(format!("{}/authorize/token", self.url))
            .json(&json!({ "spec": { "token": token } }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200, "token review failed");
        res.json().await.unwrap()
    }

    pub async fn access_review(&self, review: Value) -> Value {
        let res = client()
            .post(format!("{}/authorize/policy", self.url))
            .json(&review)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200, "access review failed");
        res.json().await.unwrap()
    }

    pub fn generation(&self) -> u64 {
        self.store.get().generation()
    }

    /// Wait until a reload publishes a generation newer than `seen`.
    pub async fn wait_for_reload(&self, seen: u64) -> bool {
        for _ in 0..50 {
            if self.generation() > seen {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        false
    }
}

impl Drop for TestService {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Append `content` to `path` in place, the way an editor or script would.
pub fn append(path: &Path, content: &str) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
}

/// Swap in new content with a rename so readers never see a partial file.
pub fn replace(path: &Path, content: &str) {
    let staging = path.with_extension("staging");
    std::fs::write(&staging, content).unwrap();
    std::fs::rename(&staging, path).unwrap();
}

pub fn resource_review(user: &str, groups: &[&str], namespace: &str) -> Value {
    json!({
        "apiVersion": "authorization.k8s.io/v1beta1",
        "kind": "SubjectAccessReview",
        "spec": {
            "user": user,
            "groups": groups,
            "resourceAttributes": { "resource": "pods", "namespace": namespace, "verb": "get" }
        }
    })
}
