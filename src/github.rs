//! `gh` helpers: listing the current user's pull requests and repointing a PR's base.
//!
//! `gh pr list --json` output is decoded into raw structs first and then converted to
//! [`PullRequest`], so the rest of the crate never sees the GraphQL field names.

use serde::Deserialize;

use crate::error::GatewayError;
use crate::git::Runner;
use crate::types::{PrState, PullRequest};

const PR_FIELDS: &str =
    "number,title,url,author,state,isDraft,mergeCommit,baseRefName,headRefName,commits";

#[derive(Debug, Deserialize)]
struct RawLogin {
    #[serde(default)]
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawOid {
    oid: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPr {
    number: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    author: Option<RawLogin>,
    state: PrState,
    #[serde(default)]
    is_draft: bool,
    merge_commit: Option<RawOid>,
    base_ref_name: String,
    head_ref_name: String,
    #[serde(default)]
    commits: Vec<RawOid>,
}

impl From<RawPr> for PullRequest {
    fn from(raw: RawPr) -> Self {
        Self {
            number: raw.number,
            title: raw.title,
            url: raw.url,
            author: raw.author.map(|a| a.login).unwrap_or_default(),
            state: raw.state,
            is_draft: raw.is_draft,
            base: raw.base_ref_name,
            head: raw.head_ref_name,
            merge_commit: raw.merge_commit.map(|m| m.oid).filter(|s| !s.is_empty()),
            commits: raw.commits.into_iter().map(|c| c.oid).collect(),
        }
    }
}

/// Decode `gh pr list --json` output, sorted ascending by PR number.
pub fn parse_pr_list(json: &str, what: &'static str) -> Result<Vec<PullRequest>, GatewayError> {
    let raws: Vec<RawPr> =
        serde_json::from_str(json).map_err(|source| GatewayError::Decode { what, source })?;
    let mut prs: Vec<PullRequest> = raws.into_iter().map(PullRequest::from).collect();
    prs.sort_by_key(|p| p.number);
    Ok(prs)
}

/// Open PRs authored by the current user.
pub fn list_open_prs(runner: &Runner) -> Result<Vec<PullRequest>, GatewayError> {
    let json = runner.gh(
        [
            "pr", "list", "--author", "@me", "--state", "open", "--limit", "200", "--json",
            PR_FIELDS,
        ]
        .as_slice(),
    )?;
    parse_pr_list(&json, "open pull request list")
}

/// The `limit` most recently merged PRs authored by the current user.
pub fn list_merged_prs(runner: &Runner, limit: usize) -> Result<Vec<PullRequest>, GatewayError> {
    let limit = limit.to_string();
    let json = runner.gh(
        [
            "pr", "list", "--author", "@me", "--state", "merged", "--limit", &limit, "--json",
            PR_FIELDS,
        ]
        .as_slice(),
    )?;
    parse_pr_list(&json, "merged pull request list")
}

pub fn update_pr_base(runner: &Runner, number: u64, base: &str) -> Result<(), GatewayError> {
    let number = number.to_string();
    runner.gh(["pr", "edit", &number, "--base", base].as_slice())?;
    Ok(())
}
