//! Request-level operations composed from the file store and the record store.
//! Each call is independent; the only shared state is the two stores themselves.

pub mod checkout;
pub mod query;
pub mod upload;

pub use checkout::{checkin, checkout, CheckoutRequest};
pub use query::list_clients;
pub use upload::{upload_document, UploadReceipt};
