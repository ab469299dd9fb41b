mod identifiers;
mod records;
mod status;

pub use identifiers::{ArtifactId, BranchId, JobId, NodeId, ProjectId};
pub use records::{
    Artifact, Branch, Job, NewArtifact, NewBranch, NewNode, NewProject, Node, NodeUpdate,
    PlanStep, Project, ResponseRef,
};
pub use status::{BranchStatus, JobStatus, NodeStatus};
