//! A minimal GitHub API client used purely to confirm that a pinned commit
//! SHA exists upstream, with a per-repo, process-wide, guarded
//! compute-if-absent cache so that concurrent first-touches on the same
//! repository collapse into a single network call.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use http_cache_reqwest::{CACacheManager, Cache, CacheMode, HttpCache, HttpCacheOptions};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, USER_AGENT};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use serde::Deserialize;
use tokio::sync::{Mutex, OnceCell};
use tracing::warn;

/// The closed set of reasons the verifier can attach to an outcome,
/// covering both hard failures and intentional bypasses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerifyReason {
    RefNotFound,
    ApiUnreachable,
    ApiUnreachableLocalSkip,
    Unauthorized,
    ForbiddenOrRateLimited,
    RateLimited,
    UnexpectedStatus,
    InvalidActionRef,
    Disabled,
    NotSha,
    LocalAction,
    MissingInputs,
}

impl VerifyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RefNotFound => "ref_not_found",
            Self::ApiUnreachable => "api_unreachable",
            Self::ApiUnreachableLocalSkip => "api_unreachable_local_skip",
            Self::Unauthorized => "unauthorized",
            Self::ForbiddenOrRateLimited => "forbidden_or_rate_limited",
            Self::RateLimited => "rate_limited",
            Self::UnexpectedStatus => "unexpected_status",
            Self::InvalidActionRef => "invalid_action_ref",
            Self::Disabled => "disabled",
            Self::NotSha => "not_a_sha_ref",
            Self::LocalAction => "local_action",
            Self::MissingInputs => "missing_inputs",
        }
    }
}

#[derive(Clone, Debug)]
pub struct VerifyOutcome {
    pub ok: bool,
    pub error: Option<VerifyReason>,
}

impl VerifyOutcome {
    fn success() -> Self {
        Self { ok: true, error: None }
    }
    fn bypass(reason: VerifyReason) -> Self {
        Self { ok: true, error: Some(reason) }
    }
    fn failure(reason: VerifyReason) -> Self {
        Self { ok: false, error: Some(reason) }
    }
}

#[derive(Deserialize)]
struct RefObject {
    sha: String,
}

#[derive(Deserialize)]
struct GitRef {
    object: RefObject,
}

#[derive(Clone)]
enum RepoFetch {
    Refs(Arc<HashSet<String>>),
    Unreachable,
    Unauthorized,
    ForbiddenOrRateLimited,
    RateLimited,
    UnexpectedStatus(u16),
}

/// Confirms pinned commit SHAs exist upstream via the GitHub REST API.
pub struct RemoteVerifier {
    http: ClientWithMiddleware,
    api_base: String,
    token: Option<String>,
    /// CI strictness: unreachable network is a hard failure rather than a
    /// logged, ok:true bypass.
    strict: bool,
    cache: Mutex<HashMap<String, Arc<OnceCell<RepoFetch>>>>,
    logged_unreachable: std::sync::Mutex<HashSet<String>>,
}

impl RemoteVerifier {
    pub fn new(api_base: impl Into<String>, token: Option<String>, strict: bool, cache_dir: &camino::Utf8Path) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, "validate-ci".parse().unwrap());
        headers.insert(ACCEPT, "application/vnd.github+json".parse().unwrap());
        if let Some(token) = &token {
            if let Ok(value) = format!("Bearer {token}").parse() {
                headers.insert(AUTHORIZATION, value);
            }
        }

        let inner = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build HTTP client");

        let http = ClientBuilder::new(inner)
            .with(Cache(HttpCache {
                mode: CacheMode::Default,
                manager: CACacheManager {
                    path: cache_dir.as_std_path().to_path_buf(),
                },
                options: HttpCacheOptions::default(),
            }))
            .build();

        Self {
            http,
            api_base: api_base.into(),
            token,
            strict,
            cache: Mutex::new(HashMap::new()),
            logged_unreachable: std::sync::Mutex::new(HashSet::new()),
        }
    }

    /// Verifies that `sha` exists in `action` (an `owner/repo[/subpath]`
    /// reference). `enabled` gates the whole feature off when remote
    /// verification has been disabled by the caller.
    pub async fn verify(&self, action: &str, sha: &str, enabled: bool) -> VerifyOutcome {
        if !enabled {
            return VerifyOutcome::bypass(VerifyReason::Disabled);
        }

        if sha.is_empty() {
            return VerifyOutcome::bypass(VerifyReason::MissingInputs);
        }

        if !is_sha_shaped(sha) {
            return VerifyOutcome::bypass(VerifyReason::NotSha);
        }

        let owner_repo = match normalize_owner_repo(action) {
            Some(s) => s,
            None => return VerifyOutcome::failure(VerifyReason::InvalidActionRef),
        };

        let fetch = self.fetch_repo_refs_cached(&owner_repo).await;

        match fetch {
            RepoFetch::Refs(shas) => {
                if shas.contains(sha) {
                    VerifyOutcome::success()
                } else {
                    VerifyOutcome::failure(VerifyReason::RefNotFound)
                }
            }
            RepoFetch::Unreachable => {
                self.log_unreachable_once(&owner_repo);
                if self.strict {
                    VerifyOutcome::failure(VerifyReason::ApiUnreachable)
                } else {
                    VerifyOutcome::bypass(VerifyReason::ApiUnreachableLocalSkip)
                }
            }
            RepoFetch::Unauthorized => VerifyOutcome::failure(VerifyReason::Unauthorized),
            RepoFetch::ForbiddenOrRateLimited => {
                VerifyOutcome::failure(VerifyReason::ForbiddenOrRateLimited)
            }
            RepoFetch::RateLimited => VerifyOutcome::failure(VerifyReason::RateLimited),
            RepoFetch::UnexpectedStatus(_) => VerifyOutcome::failure(VerifyReason::UnexpectedStatus),
        }
    }

    fn log_unreachable_once(&self, owner_repo: &str) {
        let mut logged = self.logged_unreachable.lock().unwrap();
        if logged.insert(owner_repo.to_string()) {
            warn!("remote ref verification unreachable for {owner_repo}; continuing");
        }
    }

    /// Guarded compute-if-absent: the first caller to touch `owner_repo`
    /// performs the fetch; concurrent callers await the same future.
    async fn fetch_repo_refs_cached(&self, owner_repo: &str) -> RepoFetch {
        let cell = {
            let mut cache = self.cache.lock().await;
            cache
                .entry(owner_repo.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        cell.get_or_init(|| self.fetch_repo_refs(owner_repo)).await.clone()
    }

    async fn fetch_repo_refs(&self, owner_repo: &str) -> RepoFetch {
        let url = format!("{}/repos/{owner_repo}/git/refs", self.api_base);
        let response = match self.http.get(&url).send().await {
            Ok(r) => r,
            Err(_) => return RepoFetch::Unreachable,
        };

        match response.status().as_u16() {
            200 => {
                let refs: Vec<GitRef> = match response.json().await {
                    Ok(r) => r,
                    Err(_) => return RepoFetch::Unreachable,
                };
                RepoFetch::Refs(Arc::new(refs.into_iter().map(|r| r.object.sha).collect()))
            }
            401 => RepoFetch::Unauthorized,
            403 => RepoFetch::ForbiddenOrRateLimited,
            404 => RepoFetch::Refs(Arc::new(HashSet::new())),
            429 => RepoFetch::RateLimited,
            other => RepoFetch::UnexpectedStatus(other),
        }
    }
}

fn is_sha_shaped(s: &str) -> bool {
    s.len() == 40 && s.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
}

/// Normalizes an action reference to its `owner/repo` projection, ignoring
/// any subpath beyond the first two segments.
fn normalize_owner_repo(action: &str) -> Option<String> {
    let action = action.split('@').next().unwrap_or(action);
    let mut parts = action.splitn(3, '/');
    let owner = parts.next()?;
    let repo = parts.next()?;
    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    Some(format!("{owner}/{repo}"))
}
