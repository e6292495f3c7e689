mod connection;
mod source;

pub use {
    connection::{ConnectionState, RetryPolicy, StreamConnection},
    source::{DEFAULT_ADDRESS_TEMPLATE, SourceDescriptor, StreamAddress},
};
