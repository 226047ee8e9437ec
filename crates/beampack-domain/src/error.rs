use std::io;

/// Failure kinds for the escript build step.
///
/// The first four are user-fixable configuration problems; `CreationFailed`
/// and `Io` indicate the environment (disk, permissions) broke underneath us.
#[derive(Debug, thiserror::Error)]
pub enum EscriptError {
    #[error("project defines multiple applications; set escript.main_app in beampack.toml")]
    NoMainApp,

    #[error("escript.main_app `{0}` does not match any project application")]
    AppNotFound(String),

    #[error("no compiled output found for application `{0}`")]
    BadAppName(String),

    #[error("escript.{key} must start with `{marker}`")]
    InvalidHeader {
        key: &'static str,
        marker: &'static str,
    },

    #[error("failed to create escript for `{app}`")]
    CreationFailed {
        app: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl EscriptError {
    /// True when the failure is fixable by editing project configuration.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::NoMainApp
                | Self::AppNotFound(_)
                | Self::BadAppName(_)
                | Self::InvalidHeader { .. }
        )
    }

    /// A one-line remediation hint, when one exists.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::NoMainApp => Some("add `main_app = \"<name>\"` under [escript]"),
            Self::AppNotFound(_) => {
                Some("escript.main_app must name one of the apps listed under [project]")
            }
            Self::BadAppName(_) => {
                Some("compile the application first, or remove it from escript.include_apps")
            }
            _ => None,
        }
    }
}
