//! Integration tests for the GitHub collaborator.
//!
//! These tests run `GitHubForge` against a local wiremock server standing in
//! for the REST API.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use early_adopter::core::reference::RepoRef;
use early_adopter::forge::github::GitHubForge;
use early_adopter::forge::{
    CreatePrRequest, ForgeError, ManifestSource, RepositoryHost, WriteFileRequest,
};

const PACKAGE: &str = "{\n  \"name\": \"app\",\n  \"dependencies\": {\n    \"bar\": \"baz/bar#1.0.0\"\n  }\n}\n";

fn repo() -> RepoRef {
    RepoRef::parse("acme/app").unwrap()
}

async fn forge() -> (MockServer, GitHubForge) {
    let server = MockServer::start().await;
    let forge = GitHubForge::with_api_base("ghp_test", server.uri());
    (server, forge)
}

/// Base64 wrapped at 60 columns, the way the contents API returns it.
fn wrapped_base64(text: &str) -> String {
    let encoded = BASE64.encode(text);
    encoded
        .as_bytes()
        .chunks(60)
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect::<Vec<_>>()
        .join("\n")
}

mod manifest_source {
    use super::*;

    #[tokio::test]
    async fn fetches_and_decodes_manifest() {
        let (server, forge) = forge().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/app/contents/package.json"))
            .and(header("authorization", "Bearer ghp_test"))
            .and(header("x-github-api-version", "2022-11-28"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "path": "package.json",
                "sha": "3d21ec53a331a6f037a91c368710b99387d012c1",
                "content": wrapped_base64(PACKAGE),
                "encoding": "base64"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let fetched = forge.fetch_manifest(&repo(), "package.json").await.unwrap();
        assert_eq!(fetched.manifest.dependency("bar"), Some("baz/bar#1.0.0"));
        assert_eq!(fetched.manifest.to_json(), PACKAGE);
        assert_eq!(fetched.sha, "3d21ec53a331a6f037a91c368710b99387d012c1");
    }

    #[tokio::test]
    async fn missing_manifest_is_not_found() {
        let (server, forge) = forge().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/app/contents/package.json"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
            .mount(&server)
            .await;

        let err = forge.fetch_manifest(&repo(), "package.json").await.unwrap_err();
        assert_eq!(err, ForgeError::NotFound("Not Found".into()));
    }

    #[tokio::test]
    async fn non_object_manifest_is_invalid_content() {
        let (server, forge) = forge().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/app/contents/package.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "path": "package.json",
                "sha": "abc",
                "content": BASE64.encode("[1, 2, 3]"),
                "encoding": "base64"
            })))
            .mount(&server)
            .await;

        let err = forge.fetch_manifest(&repo(), "package.json").await.unwrap_err();
        assert!(matches!(err, ForgeError::InvalidContent(_)));
    }

    #[tokio::test]
    async fn exhausted_rate_limit_is_rate_limited() {
        let (server, forge) = forge().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(403)
                    .insert_header("x-ratelimit-remaining", "0")
                    .set_body_json(json!({"message": "API rate limit exceeded"})),
            )
            .mount(&server)
            .await;

        let err = forge.fetch_manifest(&repo(), "package.json").await.unwrap_err();
        assert_eq!(err, ForgeError::RateLimited);
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn empty_token_is_auth_required() {
        let server = MockServer::start().await;
        let forge = GitHubForge::with_api_base("", server.uri());
        let err = forge.fetch_manifest(&repo(), "package.json").await.unwrap_err();
        assert_eq!(err, ForgeError::AuthRequired);
    }

    #[tokio::test]
    async fn unreachable_server_is_network_error() {
        let forge = GitHubForge::with_api_base("ghp_test", "http://127.0.0.1:1");
        let err = forge.fetch_manifest(&repo(), "package.json").await.unwrap_err();
        assert!(matches!(err, ForgeError::NetworkError(_)));
    }
}

mod repository_host {
    use super::*;

    #[tokio::test]
    async fn discovers_default_branch_tip() {
        let (server, forge) = forge().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/app"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "full_name": "acme/app",
                "default_branch": "trunk"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/app/git/ref/heads/trunk"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ref": "refs/heads/trunk",
                "object": {"sha": "aa218f56b14c9653891f9e74264a383fa43fefbd", "type": "commit"}
            })))
            .mount(&server)
            .await;

        let tip = forge.default_branch_tip(&repo()).await.unwrap();
        assert_eq!(tip.branch, "trunk");
        assert_eq!(tip.sha, "aa218f56b14c9653891f9e74264a383fa43fefbd");
    }

    #[tokio::test]
    async fn file_handle_reads_ref() {
        let (server, forge) = forge().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/app/contents/package.json"))
            .and(query_param("ref", "main"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "path": "package.json",
                "sha": "3d21ec53a331a6f037a91c368710b99387d012c1",
                "content": "",
                "encoding": "base64"
            })))
            .mount(&server)
            .await;

        let handle = forge.file_handle(&repo(), "package.json", "main").await.unwrap();
        assert_eq!(handle.sha, "3d21ec53a331a6f037a91c368710b99387d012c1");
    }

    #[tokio::test]
    async fn create_branch_posts_ref() {
        let (server, forge) = forge().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/app/git/refs"))
            .and(body_partial_json(json!({
                "ref": "refs/heads/earlyad/bar-1.0.1-abc",
                "sha": "aa218f56"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "ref": "refs/heads/earlyad/bar-1.0.1-abc",
                "object": {"sha": "aa218f56"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        forge
            .create_branch(&repo(), "earlyad/bar-1.0.1-abc", "aa218f56")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn existing_branch_is_conflict() {
        let (server, forge) = forge().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/app/git/refs"))
            .respond_with(
                ResponseTemplate::new(422)
                    .set_body_json(json!({"message": "Reference already exists"})),
            )
            .mount(&server)
            .await;

        let err = forge
            .create_branch(&repo(), "earlyad/bar-1.0.1-abc", "aa218f56")
            .await
            .unwrap_err();
        assert_eq!(err, ForgeError::Conflict("Reference already exists".into()));
    }

    #[tokio::test]
    async fn write_file_sends_precondition() {
        let (server, forge) = forge().await;
        Mock::given(method("PUT"))
            .and(path("/repos/acme/app/contents/package.json"))
            .and(body_partial_json(json!({
                "sha": "3d21ec53",
                "branch": "earlyad/bar-1.0.1-abc",
                "message": "Update bar",
                "content": BASE64.encode(PACKAGE)
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": {"path": "package.json", "sha": "95b966ae"},
                "commit": {"sha": "7638417db6d59f3c431d3e1f261cc637155684cd"}
            })))
            .mount(&server)
            .await;

        let commit = forge
            .write_file(
                &repo(),
                WriteFileRequest {
                    path: "package.json".into(),
                    branch: "earlyad/bar-1.0.1-abc".into(),
                    content: PACKAGE.into(),
                    message: "Update bar".into(),
                    expected_sha: "3d21ec53".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(commit.sha, "7638417db6d59f3c431d3e1f261cc637155684cd");
    }

    #[tokio::test]
    async fn stale_sha_is_conflict() {
        let (server, forge) = forge().await;
        Mock::given(method("PUT"))
            .and(path("/repos/acme/app/contents/package.json"))
            .respond_with(
                ResponseTemplate::new(409)
                    .set_body_json(json!({"message": "package.json does not match 3d21ec53"})),
            )
            .mount(&server)
            .await;

        let err = forge
            .write_file(
                &repo(),
                WriteFileRequest {
                    path: "package.json".into(),
                    branch: "earlyad/bar-1.0.1-abc".into(),
                    content: PACKAGE.into(),
                    message: "Update bar".into(),
                    expected_sha: "3d21ec53".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::Conflict(_)));
    }

    #[tokio::test]
    async fn opens_pull_request() {
        let (server, forge) = forge().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/app/pulls"))
            .and(body_partial_json(json!({
                "head": "earlyad/bar-1.0.1-abc",
                "base": "main",
                "title": "Update dependency on git://github.com/baz/bar.git to new version 1.0.1",
                "draft": false
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "number": 42,
                "html_url": "https://github.com/acme/app/pull/42",
                "head": {"ref": "earlyad/bar-1.0.1-abc"},
                "base": {"ref": "main"},
                "title": "Update dependency on git://github.com/baz/bar.git to new version 1.0.1"
            })))
            .mount(&server)
            .await;

        let pr = forge
            .open_pull_request(
                &repo(),
                CreatePrRequest {
                    head: "earlyad/bar-1.0.1-abc".into(),
                    base: "main".into(),
                    title: "Update dependency on git://github.com/baz/bar.git to new version 1.0.1"
                        .into(),
                    body: Some("Updates `bar`.".into()),
                    draft: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(pr.number, 42);
        assert_eq!(pr.url, "https://github.com/acme/app/pull/42");
        assert_eq!(pr.base, "main");
    }

    #[tokio::test]
    async fn unauthorized_is_permission_denied() {
        let (server, forge) = forge().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/app"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Bad credentials"})))
            .mount(&server)
            .await;

        let err = forge.default_branch_tip(&repo()).await.unwrap_err();
        assert!(matches!(err, ForgeError::PermissionDenied(_)));
    }
}
