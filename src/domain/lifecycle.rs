use std::fmt::Debug;

// ============================================================================
// Status Lifecycle - Table-driven state machines
// ============================================================================
//
// Generic transition check shared by every status enum in the domain.
// A status type lists its legal (from, to) pairs once; everything else
// (transition checks, terminal detection) is derived from that table.
//
// ============================================================================

/// A status enum whose legal transitions are a static lookup table.
pub trait Lifecycle: Copy + PartialEq + Debug + 'static {
    /// Every value of the status type.
    const ALL: &'static [Self];

    /// Allowed `(from, to)` pairs. Any pair not listed is illegal.
    const TRANSITIONS: &'static [(Self, Self)];

    /// Whether moving from `self` to `target` is legal.
    fn can_transition_to(self, target: Self) -> bool {
        Self::TRANSITIONS
            .iter()
            .any(|&(from, to)| from == self && to == target)
    }

    /// A status with no outgoing transition.
    fn is_terminal(self) -> bool {
        !Self::TRANSITIONS.iter().any(|&(from, _)| from == self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Light {
        Red,
        Green,
        Off,
    }

    impl Lifecycle for Light {
        const ALL: &'static [Self] = &[Light::Red, Light::Green, Light::Off];
        const TRANSITIONS: &'static [(Self, Self)] = &[
            (Light::Red, Light::Green),
            (Light::Green, Light::Red),
            (Light::Green, Light::Off),
        ];
    }

    #[test]
    fn test_listed_pairs_are_allowed() {
        assert!(Light::Red.can_transition_to(Light::Green));
        assert!(Light::Green.can_transition_to(Light::Off));
    }

    #[test]
    fn test_unlisted_pairs_are_rejected() {
        assert!(!Light::Red.can_transition_to(Light::Off));
        assert!(!Light::Red.can_transition_to(Light::Red));
        assert!(!Light::Off.can_transition_to(Light::Red));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(Light::Off.is_terminal());
        assert!(!Light::Red.is_terminal());
        assert!(!Light::Green.is_terminal());
    }
}
