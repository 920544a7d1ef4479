// Library root
// -----------
// The binary (`main.rs`) wires these modules together; everything with
// behaviour lives here so it can be tested without a terminal or network.
//
// Module responsibilities:
// - `paths`: which files to upload (image filter, directory walking).
// - `option`: the per-run upload options, from flags or an interactive prompt.
// - `metadata`: EXIF capture time and camera settings.
// - `api`: the HTTP client for the Gyazo upload endpoint.
// - `upload`: bounded-concurrency orchestration and outcome reporting.
// - `config`, `error`, `cli`: environment, error types, argument parsing.
// - `ui`: the dialoguer prompt and indicatif spinners.
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod metadata;
pub mod option;
pub mod paths;
pub mod ui;
pub mod upload;

/// Initialize tracing through `writer`. `RUST_LOG` overrides the `info`
/// default; `quiet` silences everything.
pub fn init_tracing<W>(quiet: bool, writer: W)
where
    W: for<'a> tracing_subscriber::fmt::MakeWriter<'a> + Send + Sync + 'static,
{
    let filter = if quiet {
        tracing_subscriber::EnvFilter::new("off")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .init();
}
