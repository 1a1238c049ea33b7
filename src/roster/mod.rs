pub mod reconciler;
pub mod weapons;

pub use reconciler::reconcile;
pub use weapons::{derive_class, normalize_weapons};
