//! Fixture lifecycle: the states a create or restore passes through and the
//! orchestrator that drives them.

mod orchestrator;
mod state;

pub use orchestrator::{CatalogListing, CreateReport, ListedFixture, Orchestrator, RestoreReport};
pub use state::{LifecycleState, StateTracker, StateTransition};

/// Transition table of [`LifecycleState`].
///
/// A run starts in `Idle` and ends in one of the terminal states; the
/// [`StateTracker`] refuses any step the table does not list.
pub trait StateMachine: Copy + Eq + Sized + 'static {
    fn can_transition_to(self, next: Self) -> bool;

    fn valid_next_states(self) -> Vec<Self>;

    /// No transitions out.
    fn is_terminal(self) -> bool;

    /// Every variant, starting state first.
    fn all_states() -> &'static [Self];
}
