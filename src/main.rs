use clap::{Arg, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use yeoman_mcp::config::Config;
use yeoman_mcp::server::Server;
use yeoman_mcp::tools::ToolRouter;

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    // stdout carries the protocol
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = Command::new("yeoman-mcp")
        .about("Search, inspect and run yeoman generators over a stdio tool protocol")
        .long_about(
            "yeoman-mcp speaks line-delimited JSON-RPC on stdin/stdout and exposes three tools: \
             search_templates, get_generator_options and run_generator. Generators run without a \
             terminal; missing answers are reported instead of prompted for.",
        )
        .version(env!("CARGO_PKG_VERSION"))
        .arg(Arg::new("generator-dir")
            .long("generator-dir")
            .help(
                "Persistent directory to install generators into \
                 (default: a temporary directory per call)",
            )
            .value_name("DIR")
            .value_parser(clap::value_parser!(PathBuf))
            .num_args(1))
        .arg(Arg::new("log-level")
            .long("log-level")
            .help("Log filter, e.g. debug or yeoman_mcp=trace (overrides RUST_LOG)")
            .value_name("LEVEL")
            .num_args(1))
        .arg(Arg::new("config")
            .long("config")
            .help("Show configuration information")
            .action(clap::ArgAction::SetTrue))
        .get_matches();

    init_logging(matches.get_one::<String>("log-level").map(String::as_str));

    let generator_dir = matches.get_one::<PathBuf>("generator-dir").cloned();
    let config = Config::load()?.with_workspace_dir(generator_dir);

    if matches.get_flag("config") {
        config.show_config_info()?;
        return Ok(());
    }

    info!("yeoman-mcp {} serving on stdio", env!("CARGO_PKG_VERSION"));
    let server = Arc::new(Server::new(ToolRouter::new(&config)));
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    server.serve(stdin, tokio::io::stdout()).await?;

    info!("Shutting down");
    Ok(())
}
