//! Result of a single status probe

/// What one probe saw when it queried the control plane.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Observation<T> {
    /// The resource exists. `label` is the status extracted by the caller.
    Found {
        /// Resource snapshot, passed through to the caller untouched
        snapshot: T,
        /// Status label used for classification
        label: String,
    },
    /// The control plane reports no such resource
    NotFound,
}

impl<T> Observation<T> {
    /// Observation of an existing resource in state `label`
    pub fn found(snapshot: T, label: impl Into<String>) -> Self {
        Self::Found {
            snapshot,
            label: label.into(),
        }
    }

    /// Observation of a resource that does not exist
    pub fn not_found() -> Self {
        Self::NotFound
    }

    /// The status label, if the resource was found
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Found { label, .. } => Some(label),
            Self::NotFound => None,
        }
    }
}
