use serde::Deserialize;

/// Phase of a pod as reported in `status.phase`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl From<&str> for PodPhase {
    fn from(phase: &str) -> Self {
        match phase {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }
}

impl std::fmt::Display for PodPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PodPhase::Pending => write!(f, "Pending"),
            PodPhase::Running => write!(f, "Running"),
            PodPhase::Succeeded => write!(f, "Succeeded"),
            PodPhase::Failed => write!(f, "Failed"),
            PodPhase::Unknown => write!(f, "Unknown"),
        }
    }
}

/// `items` of a `kubectl get ... -o json` listing.
///
/// kubectl reports `kind: List` rather than the typed `PodList`, so the
/// typed list wrappers from k8s-openapi do not apply.
#[derive(Debug, Deserialize)]
pub struct ObjectList<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pod_phase_from_str() {
        assert_eq!(PodPhase::from("Running"), PodPhase::Running);
        assert_eq!(PodPhase::from("Pending"), PodPhase::Pending);
        assert_eq!(PodPhase::from("CrashLoopBackOff"), PodPhase::Unknown);
        assert_eq!(PodPhase::from(""), PodPhase::Unknown);
    }

    #[test]
    fn test_pod_phase_display_round_trips() {
        for phase in [PodPhase::Pending, PodPhase::Running, PodPhase::Failed] {
            assert_eq!(PodPhase::from(phase.to_string().as_str()), phase);
        }
    }
}
