use thiserror::Error;

/// Faults detected at the tick boundary. The room keeps running after any of
/// these; they exist to be logged and counted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// A position or hp went NaN/inf. The entity was repaired or removed.
    #[error("non-finite state on {entity}")]
    NonFiniteState { entity: String },

    #[error("tick panicked: {0}")]
    TickPanicked(String),
}
