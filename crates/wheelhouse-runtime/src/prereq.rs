use crate::tools::{find_on_path, Tool};
use std::fmt;

/// A missing prerequisite with actionable install instructions.
#[derive(Debug)]
pub struct MissingPrereq {
    pub name: &'static str,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {})",
            self.name, self.purpose, self.install_hint
        )
    }
}

fn prereq_for(tool: Tool) -> MissingPrereq {
    match tool {
        Tool::Helmfile => MissingPrereq {
            name: "helmfile",
            purpose: "reconciling releases declared in helmfile.yaml",
            install_hint: "https://github.com/helmfile/helmfile/releases, or set helmfile_bin / helmfile_version",
        },
        Tool::Helm => MissingPrereq {
            name: "helm",
            purpose: "installing and upgrading charts on behalf of helmfile",
            install_hint: "https://helm.sh/docs/intro/install/, or set helm_bin / helm_version",
        },
        Tool::HelmDiff => MissingPrereq {
            name: "helm-diff",
            purpose: "computing release diffs for helmfile apply",
            install_hint: "helm plugin install https://github.com/databus23/helm-diff, or set helm_diff_version",
        },
    }
}

/// Check that each tool in `tools` can be found on `PATH`.
/// Returns a list of missing items. Empty list means all prerequisites are met.
pub fn check_path_prereqs(tools: &[Tool]) -> Vec<MissingPrereq> {
    tools
        .iter()
        .filter(|tool| find_on_path(tool.name()).is_none())
        .map(|tool| prereq_for(*tool))
        .collect()
}

/// Format a list of missing prerequisites into a user-friendly error message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg.push_str("\nwheelhouse needs these tools to run helmfile deployments.");
    msg
}
