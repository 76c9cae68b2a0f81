#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("link record missing required field '{field}'")]
    MissingField { field: &'static str },
}

#[derive(Debug, thiserror::Error)]
pub enum PrefsError {
    #[error("prefs file not found: {0}")]
    FileNotFound(std::path::PathBuf),

    #[error("prefs parse error: {0}")]
    ParseError(String),

    #[error("prefs write error: {0}")]
    WriteError(String),

    #[error("prefs watch error: {0}")]
    WatchError(String),

    #[error("unknown pref key: {0}")]
    UnknownKey(String),
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("frame is gone")]
    FrameGone,

    #[error("invalid location url: {0}")]
    InvalidLocation(String),

    #[error("post message failed: {0}")]
    PostFailed(String),

    #[error("host channel error: {0}")]
    ChannelError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum FreshtabError {
    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Prefs(#[from] PrefsError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("page error: {0}")]
    Page(String),

    #[error("{0}")]
    Other(String),
}
