mod seen;

pub use seen::{PersistOutcome, SeenStore, StateError};
