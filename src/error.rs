use crate::view::NodeId;

/// Precondition violations raised synchronously to the embedding layer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SceneError {
    #[error("Scene node {0:?} does not exist")]
    NodeNotFound(NodeId),

    #[error("Scene node {0:?} is still attached to a parent")]
    NodeAttached(NodeId),

    #[error("Operation is not allowed on the root node")]
    RootNode,

    #[error("Scene node {0:?} cannot have children")]
    NotAContainer(NodeId),

    #[error("Appending {child:?} to {parent:?} would create a cycle")]
    CycleDetected { parent: NodeId, child: NodeId },

    #[error("Scene node {child:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("Child index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Style is locked")]
    StyleLocked,

    #[error("Invalid value for style property {0}")]
    InvalidPropertyValue(&'static str),

    #[error("URI {0:?} uses a reserved prefix")]
    ReservedUri(String),

    #[error("Scene node {node:?} is not a {expected} node")]
    WrongNodeKind { node: NodeId, expected: &'static str },

    #[error("Layout error: {0}")]
    Layout(String),

    #[error("Resource error: {0}")]
    Resource(ResourceError),

    #[error("Renderer error: {0}")]
    Render(#[from] RenderError),
}

/// Terminal failure of a resource load. Stored in the resource's `Error` state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResourceError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Unsupported resource: {0}")]
    Unsupported(String),

    #[error("Loader panicked: {0}")]
    Panicked(String),

    #[error("URI {0:?} uses a reserved prefix")]
    ReservedUri(String),
}

impl From<ResourceError> for SceneError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::ReservedUri(uri) => SceneError::ReservedUri(uri),
            other => SceneError::Resource(other),
        }
    }
}

/// Failure observed through a [`crate::JobHandle`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JobError {
    #[error("Job panicked: {0}")]
    Panicked(String),

    #[error("Job was dropped before it ran")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("Texture creation failed: {0}")]
    TextureCreation(String),

    #[error("Texture {0} is not lockable")]
    NotLockable(u64),

    #[error("Texture {0} does not exist")]
    UnknownTexture(u64),
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
