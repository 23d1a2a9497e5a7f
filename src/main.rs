//! `embedview [DATA_ROOT] [OPTIONS_TOML]`
//! `embedview --print-schema`
//!
//! Opens the tiled viewer over the data files under `DATA_ROOT` (default:
//! the current directory). With the `fetch` feature `DATA_ROOT` may also be
//! an `http(s)://` base URL. Options default to `DATA_ROOT/embedview.toml`
//! when that file exists, and `S` in the viewer writes them back there.
//!
//! `--print-schema` writes the JSON Schema of the options file to stdout.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use embedview::source::{DataSource, FsSource};
use embedview::{EmbedError, Options, Viewer};

const OPTIONS_FILE: &str = "embedview.toml";

fn resolve_source(root: &str) -> Result<Arc<dyn DataSource>, EmbedError> {
    if root.starts_with("http://") || root.starts_with("https://") {
        #[cfg(feature = "fetch")]
        return Ok(Arc::new(embedview::source::HttpSource::new(root)));
        #[cfg(not(feature = "fetch"))]
        return Err(EmbedError::Viewer(format!(
            "{root}: built without the `fetch` feature"
        )));
    }
    Ok(Arc::new(FsSource::new(root)))
}

/// Options file for this run: the explicit argument, else the one in a
/// local data root, else the working directory.
fn options_path(root: &str, explicit: Option<&str>) -> PathBuf {
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }
    if root.contains("://") {
        return PathBuf::from(OPTIONS_FILE);
    }
    PathBuf::from(root).join(OPTIONS_FILE)
}

fn resolve_options(
    path: &Path,
    explicit: bool,
) -> Result<Options, EmbedError> {
    if explicit || path.is_file() {
        log::info!("using options from {}", path.display());
        return Options::load(path);
    }
    Ok(Options::default())
}

fn print_schema() -> Result<(), EmbedError> {
    let schema = serde_json::to_string_pretty(&Options::json_schema())?;
    let mut out = std::io::stdout().lock();
    writeln!(out, "{schema}").map_err(EmbedError::Io)
}

fn run() -> Result<(), EmbedError> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().is_some_and(|a| a == "--print-schema") {
        return print_schema();
    }
    let root = args.first().map_or(".", String::as_str);
    let explicit = args.get(1).map(String::as_str);
    let path = options_path(root, explicit);
    let options = resolve_options(&path, explicit.is_some())?;
    let source = resolve_source(root)?;

    Viewer::builder()
        .with_source(source)
        .with_options(options)
        .with_options_path(path)
        .build()
        .run()
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}
