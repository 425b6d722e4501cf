//! Form handling for the Temps console
//!
//! Turns a snapshot of named input elements into a plain record of values
//! (see [`collect`]) and wraps form submission with client-side validation
//! (see [`FormSubmitter`]).

pub mod collect;
pub mod element;
pub mod error;
pub mod submit;

pub use collect::{collect, CollectOptions, FormValue, FormValues};
pub use element::{InputElement, InputKind};
pub use error::FormError;
pub use submit::{FormSubmitter, SubmitEvent};
