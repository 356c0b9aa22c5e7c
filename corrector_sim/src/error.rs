use corrector_traits::{NodeId, OutputPoint};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("connection refused (attempt {0})")]
    Refused(u32),
    #[error("write to {0} rejected by server")]
    WriteRejected(OutputPoint),
    #[error("node {0} is not a writable output")]
    NotWritable(NodeId),
    #[error("producer thread: {0}")]
    Thread(String),
}

pub type Result<T> = std::result::Result<T, SimError>;
