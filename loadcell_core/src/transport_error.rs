//! Maps `Box<dyn Error>` from collaborator boundaries to typed `WeighError`.
//!
//! The traits in `loadcell_traits` return boxed errors; this module converts
//! them, with an optional feature-gated path for `loadcell_sim::error::SimError`.

use crate::error::WeighError;

/// Map a publish/fan-out error to a typed `WeighError`.
///
/// Known simulated errors are downcast first, then string heuristics apply.
pub fn map_transport_error(e: &(dyn std::error::Error + 'static)) -> WeighError {
    #[cfg(feature = "sim-errors")]
    {
        use loadcell_sim::error::SimError;
        if let Some(sim) = e.downcast_ref::<SimError>() {
            return match sim {
                SimError::NotConnected => WeighError::NotConnected,
                other => WeighError::Transport(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("not connected") {
        WeighError::NotConnected
    } else {
        WeighError::Transport(s)
    }
}

/// Map an order-lookup error to `WeighError::LookupFailed`.
pub fn map_lookup_error(e: &(dyn std::error::Error + 'static)) -> WeighError {
    #[cfg(feature = "sim-errors")]
    {
        use loadcell_sim::error::SimError;
        if let Some(SimError::Timeout) = e.downcast_ref::<SimError>() {
            return WeighError::LookupFailed("request timed out".into());
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") || s.to_lowercase().contains("timed out") {
        WeighError::LookupFailed("request timed out".into())
    } else {
        WeighError::LookupFailed(s)
    }
}
