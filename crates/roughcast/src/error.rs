pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to fetch `{url}`: {message}")]
    ResourceFetch { url: String, message: String },

    #[error("Invalid vector markup: {message}")]
    MarkupParse { message: String },

    #[error("Cannot sketch <{kind}>: {message}")]
    PrimitiveConstruction { kind: String, message: String },

    #[error("Document tree error: {message}")]
    Tree { message: String },

    #[error("Invalid sketch options: {0}")]
    Options(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn fetch(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::ResourceFetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn markup(message: impl std::fmt::Display) -> Self {
        Self::MarkupParse {
            message: message.to_string(),
        }
    }

    pub(crate) fn primitive(kind: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::PrimitiveConstruction {
            kind: kind.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn tree(message: impl Into<String>) -> Self {
        Self::Tree {
            message: message.into(),
        }
    }
}

impl From<roxmltree::Error> for Error {
    fn from(value: roxmltree::Error) -> Self {
        Self::markup(value)
    }
}
