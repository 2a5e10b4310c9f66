//! Common modules used throughout the release scripts: the deployment record
//! types, the file-backed address book & release manifest stores, and the
//! table of networks known to the services we talk to

#![deny(missing_docs)]

pub mod constants;
pub mod errors;
pub mod networks;
pub mod store;
pub mod types;
