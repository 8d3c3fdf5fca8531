#[derive(Debug, thiserror::Error, Clone)]
pub enum Error {
    #[error("node {0} has no live connection")]
    Offline(uuid::Uuid),

    #[error("send to node {0} exceeded its deadline")]
    DeadlineExceeded(uuid::Uuid),
}
