use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            #[must_use]
            pub const fn value(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "-{}"), self.0)
            }
        }
    };
}

row_id!(
    /// Primary key of a project row.
    ProjectId,
    "project"
);
row_id!(
    /// Primary key of a branch row.
    BranchId,
    "branch"
);
row_id!(
    /// Primary key of a node row.
    NodeId,
    "node"
);
row_id!(ArtifactId, "artifact");
row_id!(JobId, "job");

#[cfg(test)]
mod tests {
    use super::{JobId, NodeId};

    #[test]
    fn ids_display_with_kind_prefix() {
        assert_eq!(NodeId::new(7).to_string(), "node-7");
        assert_eq!(JobId::from(3).value(), 3);
    }

    #[test]
    fn ids_serialize_as_bare_integers() {
        assert_eq!(serde_json::to_string(&NodeId::new(42)).ok().as_deref(), Some("42"));
    }
}
