//! Dependency tree of open PRs.
//!
//! Nodes live in an arena indexed by [`NodeId`]; each node lists its children by index
//! and nothing points back to a parent. A root is any node that appears in no child list.
//!
//! Besides the literal parent/child edges, the builder annotates nodes whose base branch
//! is not another open PR with the merged PR they were most likely stacked on before that
//! PR merged and its branch was deleted (the "original base").

use std::collections::{HashMap, HashSet};

use crate::error::GatewayError;
use crate::gateway::Gateway;
use crate::ledger::HeadShaLedger;
use crate::style::Style;
use crate::types::PullRequest;

pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackNode {
    pub pr: PullRequest,
    pub children: Vec<NodeId>,
    pub original_base: Option<PullRequest>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackForest {
    nodes: Vec<StackNode>,
}

impl StackForest {
    pub fn node(&self, id: NodeId) -> &StackNode {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &StackNode)> {
        self.nodes.iter().enumerate()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes that are nobody's child, in PR-number order.
    pub fn roots(&self) -> Vec<NodeId> {
        let children: HashSet<NodeId> = self
            .nodes
            .iter()
            .flat_map(|n| n.children.iter().copied())
            .collect();
        (0..self.nodes.len())
            .filter(|id| !children.contains(id))
            .collect()
    }

    #[cfg(test)]
    pub fn find(&self, number: u64) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.pr.number == number)
    }

    /// Render the forest as an indented tree under a `Pull Requests` heading.
    pub fn render(&self, style: &Style) -> String {
        let mut out = style.bold("Pull Requests");
        let roots = self.roots();
        for (i, root) in roots.iter().enumerate() {
            self.render_node(&mut out, *root, "", i + 1 == roots.len(), style);
        }
        out
    }

    fn render_node(&self, out: &mut String, id: NodeId, indent: &str, last: bool, style: &Style) {
        let node = &self.nodes[id];
        out.push('\n');
        out.push_str(indent);
        out.push_str(if last { "└─ " } else { "├─ " });
        out.push_str(&style.pr(&node.pr));
        if let Some(original) = &node.original_base {
            out.push_str(&format!(" [was on {}]", style.number(original)));
        }
        let child_indent = format!("{}{}", indent, if last { "   " } else { "│  " });
        for (i, child) in node.children.iter().enumerate() {
            self.render_node(out, *child, &child_indent, i + 1 == node.children.len(), style);
        }
    }
}

/// Build the forest from one snapshot of open and merged PRs.
///
/// `merged` must be ascending by number: when several merged PRs could be the original
/// base of a node, the lowest-numbered one wins.
pub fn build(
    open: &[PullRequest],
    merged: &[PullRequest],
    default_branch: &str,
    ledger: &HeadShaLedger,
    gateway: &dyn Gateway,
) -> Result<StackForest, GatewayError> {
    let mut nodes: Vec<StackNode> = open
        .iter()
        .map(|pr| StackNode {
            pr: pr.clone(),
            children: vec![],
            original_base: None,
        })
        .collect();

    let mut by_head: HashMap<&str, NodeId> = HashMap::new();
    for (id, pr) in open.iter().enumerate() {
        by_head.entry(pr.head.as_str()).or_insert(id);
    }
    let merged_by_head: HashMap<&str, &PullRequest> =
        merged.iter().map(|pr| (pr.head.as_str(), pr)).collect();

    for (id, pr) in open.iter().enumerate() {
        if pr.base == pr.head {
            continue;
        }
        if let Some(&parent) = by_head.get(pr.base.as_str()) {
            if parent != id {
                nodes[parent].children.push(id);
            }
        }
    }

    for (id, pr) in open.iter().enumerate() {
        let stacked = by_head
            .get(pr.base.as_str())
            .is_some_and(|&parent| parent != id);
        if stacked {
            continue;
        }
        nodes[id].original_base =
            resolve_original_base(pr, merged, &merged_by_head, default_branch, ledger, gateway)?;
    }

    Ok(StackForest { nodes })
}

/// Best effort for roots on the default branch: a merged PR into the same base whose first
/// commit the head still carries, and whose merge commit (if any) it does not.
fn resolve_original_base(
    pr: &PullRequest,
    merged: &[PullRequest],
    merged_by_head: &HashMap<&str, &PullRequest>,
    default_branch: &str,
    ledger: &HeadShaLedger,
    gateway: &dyn Gateway,
) -> Result<Option<PullRequest>, GatewayError> {
    // The merged PR's branch still exists and this PR still points at it.
    if let Some(base_pr) = merged_by_head.get(pr.base.as_str()) {
        return Ok(Some((*base_pr).clone()));
    }
    if pr.base != default_branch {
        return Ok(None);
    }
    let Some(head_sha) = ledger.get(&pr.head) else {
        return Ok(None);
    };
    for candidate in merged.iter().filter(|m| m.base == pr.base) {
        let Some(first) = candidate.first_commit() else {
            continue;
        };
        if !gateway.is_ancestor(first, head_sha)? {
            continue;
        }
        // With a true merge commit, a PR that already contains the merge was started from
        // the updated default branch and was never stacked on the merged PR.
        if let Some(merge) = candidate.merge_commit.as_deref() {
            if gateway.is_ancestor(merge, head_sha)? {
                continue;
            }
        }
        return Ok(Some(candidate.clone()));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::fake::FakeGateway;
    use crate::types::{merged_pr, pr};

    fn ledger(entries: &[(&str, &str)]) -> HeadShaLedger {
        entries.iter().copied().collect()
    }

    fn numbers(forest: &StackForest, ids: &[NodeId]) -> Vec<u64> {
        ids.iter().map(|id| forest.node(*id).pr.number).collect()
    }

    #[test]
    fn stacked_prs_become_children_of_their_base() {
        let open = vec![
            pr(51, "main", "stack-1"),
            pr(52, "stack-1", "stack-2"),
            pr(53, "stack-2", "stack-3"),
        ];
        let gw = FakeGateway::new("main");
        let forest = build(&open, &[], "main", &HeadShaLedger::new(), &gw).expect("build");

        assert_eq!(numbers(&forest, &forest.roots()), vec![51]);
        let root = forest.node(forest.find(51).unwrap());
        assert_eq!(numbers(&forest, &root.children), vec![52]);
        let mid = forest.node(forest.find(52).unwrap());
        assert_eq!(numbers(&forest, &mid.children), vec![53]);
        assert!(forest.nodes().all(|(_, n)| n.original_base.is_none()));
    }

    #[test]
    fn unrelated_prs_are_all_roots() {
        let open = vec![
            pr(1, "main", "a"),
            pr(2, "develop", "b"),
            pr(3, "release", "c"),
        ];
        let gw = FakeGateway::new("main");
        let forest = build(&open, &[], "main", &HeadShaLedger::new(), &gw).expect("build");
        assert_eq!(numbers(&forest, &forest.roots()), vec![1, 2, 3]);
        assert!(forest.nodes().all(|(_, n)| n.children.is_empty()));
    }

    #[test]
    fn self_parenting_pr_is_a_root_without_children() {
        let open = vec![pr(7, "loop", "loop"), pr(8, "loop", "next")];
        let gw = FakeGateway::new("main");
        let forest = build(&open, &[], "main", &HeadShaLedger::new(), &gw).expect("build");

        let looped = forest.find(7).unwrap();
        assert!(forest.roots().contains(&looped));
        assert!(!forest.node(looped).children.contains(&looped));
        assert_eq!(numbers(&forest, &forest.node(looped).children), vec![8]);
    }

    #[test]
    fn base_on_merged_branch_sets_original_base() {
        let open = vec![pr(56, "stack-1", "stack-2"), pr(57, "stack-2", "stack-3")];
        let merged = vec![merged_pr(55, "main", "stack-1", Some("m55"), &["c1"])];
        let gw = FakeGateway::new("main");
        let forest = build(&open, &merged, "main", &HeadShaLedger::new(), &gw).expect("build");

        let root = forest.node(forest.find(56).unwrap());
        assert_eq!(root.original_base.as_ref().map(|p| p.number), Some(55));
        // Only roots are annotated.
        assert!(forest.node(forest.find(57).unwrap()).original_base.is_none());
    }

    #[test]
    fn retargeted_root_infers_original_base_from_ancestry() {
        let open = vec![pr(52, "main", "stack-2")];
        let merged = vec![
            merged_pr(40, "develop", "old", Some("m40"), &["d1"]),
            merged_pr(50, "main", "other", Some("m50"), &["o1"]),
            merged_pr(51, "main", "stack-1", None, &["c1", "c2"]),
        ];
        let gw = FakeGateway::new("main")
            .with_ancestor("d1", "h52")
            .with_ancestor("c1", "h52");
        let ledger = ledger(&[("stack-2", "h52")]);
        let forest = build(&open, &merged, "main", &ledger, &gw).expect("build");

        // #40 targets another base, #50's first commit is not an ancestor.
        let root = forest.node(0);
        assert_eq!(root.original_base.as_ref().map(|p| p.number), Some(51));
    }

    #[test]
    fn branch_started_after_a_merge_commit_is_not_attributed_to_it() {
        let open = vec![pr(70, "main", "later")];
        let merged = vec![merged_pr(69, "main", "early", Some("m69"), &["e1"])];
        // The merge commit brought e1 into main; `later` branched off after it.
        let gw = FakeGateway::new("main")
            .with_ancestor("e1", "h70")
            .with_ancestor("m69", "h70");
        let forest =
            build(&open, &merged, "main", &ledger(&[("later", "h70")]), &gw).expect("build");
        assert!(forest.node(0).original_base.is_none());
    }

    #[test]
    fn first_matching_merged_pr_wins() {
        let open = vec![pr(60, "main", "feature")];
        let merged = vec![
            merged_pr(58, "main", "a", None, &["a1"]),
            merged_pr(59, "main", "b", None, &["b1"]),
        ];
        let gw = FakeGateway::new("main")
            .with_ancestor("a1", "h60")
            .with_ancestor("b1", "h60");
        let forest = build(&open, &merged, "main", &ledger(&[("feature", "h60")]), &gw)
            .expect("build");
        assert_eq!(
            forest.node(0).original_base.as_ref().map(|p| p.number),
            Some(58)
        );
    }

    #[test]
    fn no_inference_for_non_default_base() {
        let open = vec![pr(9, "develop", "x")];
        let merged = vec![merged_pr(8, "develop", "w", None, &["w1"])];
        let gw = FakeGateway::new("main").with_ancestor("w1", "hx");
        let forest =
            build(&open, &merged, "main", &ledger(&[("x", "hx")]), &gw).expect("build");
        assert!(forest.node(0).original_base.is_none());
    }

    #[test]
    fn ancestry_failure_is_propagated() {
        let open = vec![pr(9, "main", "x")];
        let merged = vec![merged_pr(8, "main", "w", None, &["w1"])];
        let gw = FakeGateway::new("main").failing("is_ancestor");
        let err = build(&open, &merged, "main", &ledger(&[("x", "hx")]), &gw)
            .expect_err("oracle failure");
        assert!(matches!(err, GatewayError::Command { .. }));
    }

    #[test]
    fn render_draws_nested_stacks_and_annotations() {
        let open = vec![
            pr(78, "main", "stack-1"),
            pr(79, "stack-1", "stack-2"),
            pr(80, "stack-2", "stack-3"),
            pr(82, "feature-a", "feature-b"),
            pr(83, "feature-b", "feature-c"),
        ];
        let merged = vec![merged_pr(81, "main", "feature-a", Some("m81"), &["f1"])];
        let gw = FakeGateway::new("main");
        let forest = build(&open, &merged, "main", &HeadShaLedger::new(), &gw).expect("build");

        let expected = "\
Pull Requests
├─ #78 pr 78 (main ← stack-1)
│  └─ #79 pr 79 (stack-1 ← stack-2)
│     └─ #80 pr 80 (stack-2 ← stack-3)
└─ #82 pr 82 (feature-a ← feature-b) [was on #81]
   └─ #83 pr 83 (feature-b ← feature-c)";
        assert_eq!(forest.render(&Style::plain()), expected);
    }
}
