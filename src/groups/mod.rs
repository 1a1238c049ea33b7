pub mod bands;
pub mod former;

pub use bands::{band_index, compute_bands, GsBand};
pub use former::{form_groups, Candidate};
