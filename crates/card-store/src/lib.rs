pub mod debounce;
pub mod dialog;
pub mod error;
pub mod store;
pub mod validation;

pub use debounce::{Debouncer, DEFAULT_SEARCH_DEBOUNCE};
pub use dialog::{DialogEvent, DialogState};
pub use error::{CardError, FormField, ValidationErrors};
pub use store::{CardPage, CardStore, StoreOptions, StoreState};
pub use validation::validate_form;
