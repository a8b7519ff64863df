//! Document-wide policies that are persisted with the document.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which kinds of link cycles a document accepts.
///
/// # Examples
///
/// ```
/// use vellum_core::policy::ValidCycle;
///
/// assert_eq!(ValidCycle::default(), ValidCycle::All);
/// assert!(ValidCycle::NotDirectedFast.forbids_directed_cycles());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidCycle {
    /// Any link is acceptable.
    #[default]
    All,
    /// No directed cycles, checked with a visited set.
    NotDirected,
    /// No directed cycles, checked without a visited set; the graph must
    /// already be acyclic.
    NotDirectedFast,
    /// No cycles, ignoring link direction.
    NotUndirected,
    /// Every node has at most one incoming link and no directed cycles.
    DestinationTree,
    /// Every node has at most one outgoing link and no directed cycles.
    SourceTree,
}

impl ValidCycle {
    /// Returns true if the mode rejects links closing a directed cycle.
    pub fn forbids_directed_cycles(self) -> bool {
        !matches!(self, Self::All)
    }
}

impl fmt::Display for ValidCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::All => "all",
            Self::NotDirected => "not_directed",
            Self::NotDirectedFast => "not_directed_fast",
            Self::NotUndirected => "not_undirected",
            Self::DestinationTree => "destination_tree",
            Self::SourceTree => "source_tree",
        };
        f.write_str(name)
    }
}
