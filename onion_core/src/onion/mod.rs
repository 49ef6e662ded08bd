/*! Building and peeling onion envelopes.
*/

mod builder;
mod peeler;

pub use self::builder::*;
pub use self::peeler::*;
