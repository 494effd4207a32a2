mod description;
mod topology;

pub use self::{
    description::server::{ServerAddress, ServerDescription, ServerType},
    topology::{SelectedServer, SessionSupportStatus, Topology},
};

pub(crate) use self::description::server::RETRYABLE_READS_MIN_WIRE_VERSION;
