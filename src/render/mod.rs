//! Output renderers for decoded records.
//!
//! Every renderer writes one line per output item, using an explicit `\n`.
//! Diagnostics go through `tracing` (stderr in the binary), never to the
//! renderer's output.
//!
//! - `fmt` - human-readable, space-separated fields ([`TextRenderer`])
//! - `json` - one `{"Truncated": .., "Msg": [..]}` object per record ([`JsonRenderer`])
//! - `null` - discards everything ([`NullRenderer`])
//! - `pairup` - one JSON object per request/reply pair ([`PairUpRenderer`])
//!
//! # Example
//!
//! ```
//! use parsefuse::render::{renderer, OutputFormat};
//!
//! let mut out = Vec::new();
//! let format: OutputFormat = "json".parse()?;
//! let mut render = renderer(format, &mut out, 512);
//! render.finish()?;
//! # Ok::<(), parsefuse::ParsefuseError>(())
//! ```

mod json;
mod pairup;
mod text;

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use crate::error::{ParsefuseError, Result};
use crate::Record;

pub use json::{JsonRenderer, MsgView};
pub use pairup::PairUpRenderer;
pub use text::{format_record, TextRenderer};

/// Default blob length limit.
pub const DEFAULT_LIMIT: usize = 512;

/// Consumer of decoded records.
pub trait Render {
    /// Emit one record.
    fn render(&mut self, record: &Record) -> Result<()>;

    /// Called once after the last record.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Selectable output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Null,
    PairUp,
}

impl FromStr for OutputFormat {
    type Err = ParsefuseError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fmt" | "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "null" => Ok(OutputFormat::Null),
            "pairup" => Ok(OutputFormat::PairUp),
            other => Err(ParsefuseError::UnknownOutputFormat(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Text => "fmt",
            OutputFormat::Json => "json",
            OutputFormat::Null => "null",
            OutputFormat::PairUp => "pairup",
        })
    }
}

/// Renderer that drops every record.
#[derive(Debug, Default)]
pub struct NullRenderer;

impl Render for NullRenderer {
    fn render(&mut self, _record: &Record) -> Result<()> {
        Ok(())
    }
}

/// Create the renderer for `format` writing to `out`.
///
/// `limit` caps blob lengths in the output; 0 means unlimited.
pub fn renderer<'a, W: Write + 'a>(
    format: OutputFormat,
    out: W,
    limit: usize,
) -> Box<dyn Render + 'a> {
    match format {
        OutputFormat::Text => Box::new(TextRenderer::new(out, limit)),
        OutputFormat::Json => Box::new(JsonRenderer::new(out, limit)),
        OutputFormat::Null => Box::new(NullRenderer),
        OutputFormat::PairUp => Box::new(PairUpRenderer::new(out, limit)),
    }
}

/// Write `line` followed by a single `\n`.
pub(crate) fn write_line<W: Write>(out: &mut W, line: &[u8]) -> Result<()> {
    out.write_all(line)?;
    out.write_all(b"\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse() {
        assert_eq!("fmt".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("null".parse::<OutputFormat>().unwrap(), OutputFormat::Null);
        assert_eq!("pairup".parse::<OutputFormat>().unwrap(), OutputFormat::PairUp);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_format_display_round_trip() {
        for format in [
            OutputFormat::Text,
            OutputFormat::Json,
            OutputFormat::Null,
            OutputFormat::PairUp,
        ] {
            assert_eq!(format.to_string().parse::<OutputFormat>().unwrap(), format);
        }
    }

    #[test]
    fn test_write_line() {
        let mut out = Vec::new();
        write_line(&mut out, b"abc").unwrap();
        assert_eq!(out, b"abc\n");
    }
}
