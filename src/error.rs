//! Domain errors of the viewer. Everything below these (parsers, GPU setup)
//! reports through `anyhow` and is wrapped here where a caller needs to tell
//! failures apart.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no parser for '{path}'")]
    UnknownFormat { path: String },
    #[error("failed to load '{path}'")]
    ParseFailure {
        path: String,
        #[source]
        source: anyhow::Error,
    },
}

impl LoadError {
    pub fn path(&self) -> &str {
        match self {
            Self::UnknownFormat { path } | Self::ParseFailure { path, .. } => path,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum StageError {
    #[error("a model is already on the stage")]
    AlreadyLoaded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_failure_keeps_its_cause() {
        let err = LoadError::ParseFailure {
            path: "model/a.fbx".into(),
            source: anyhow::anyhow!("truncated header"),
        };
        assert_eq!(err.to_string(), "failed to load 'model/a.fbx'");
        assert_eq!(format!("{:#}", anyhow::Error::from(err)), "failed to load 'model/a.fbx': truncated header");
    }
}
