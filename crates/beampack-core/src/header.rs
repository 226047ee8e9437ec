use beampack_domain::{EscriptConfig, EscriptError};

const SHEBANG_MARKER: &str = "#!";
const COMMENT_MARKER: &str = "%%";
const EMU_ARGS_MARKER: &str = "%%!";

const DEFAULT_SHEBANG: &str = "#!/usr/bin/env escript";
const DEFAULT_COMMENT: &str = "%%";

/// The three text lines prepended to the archive. None carries a trailing
/// newline; the emitter appends exactly one per line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderLines {
    pub shebang: String,
    pub comment: String,
    pub emu_args: String,
}

impl HeaderLines {
    pub fn lines(&self) -> [&str; 3] {
        [&self.shebang, &self.comment, &self.emu_args]
    }
}

/// Builds the escript header from configuration, falling back to defaults.
///
/// Each configured value must literally start with its marker; embedded
/// line breaks after the marker are stripped so a single value cannot
/// smuggle extra header lines into the output.
pub fn compose_headers(
    config: &EscriptConfig,
    app_name: &str,
) -> Result<HeaderLines, EscriptError> {
    let default_emu_args = format!("{EMU_ARGS_MARKER} -pa {app_name}/{app_name}/ebin");
    Ok(HeaderLines {
        shebang: header_line(
            "shebang",
            config.shebang.as_deref(),
            SHEBANG_MARKER,
            DEFAULT_SHEBANG,
        )?,
        comment: header_line(
            "comment",
            config.comment.as_deref(),
            COMMENT_MARKER,
            DEFAULT_COMMENT,
        )?,
        emu_args: header_line(
            "emu_args",
            config.emu_args.as_deref(),
            EMU_ARGS_MARKER,
            &default_emu_args,
        )?,
    })
}

fn header_line(
    key: &'static str,
    configured: Option<&str>,
    marker: &'static str,
    default: &str,
) -> Result<String, EscriptError> {
    let value = configured.unwrap_or(default);
    let rest = value
        .strip_prefix(marker)
        .ok_or(EscriptError::InvalidHeader { key, marker })?;
    let cleaned: String = rest.chars().filter(|c| *c != '\n' && *c != '\r').collect();
    Ok(format!("{marker}{cleaned}"))
}
