//! Store reducers.
//!
//! Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.
//! Remote calls happen only inside the effects they return.

pub mod session;
pub mod todo;

pub use session::SessionReducer;
pub use todo::TodoReducer;
