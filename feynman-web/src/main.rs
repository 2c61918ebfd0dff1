//! Feynman Web Server
//!
//! HTTP entry point for the Feynman learning platform.

use clap::Parser;
use feynman_core::logging::{init_logging, LoggingConfig};
use feynman_rag::RagConfig;
use feynman_web::server::FeynmanServerBuilder;
use feynman_web::WebConfig;
use std::path::PathBuf;

/// Feynman web server - RAG question answering and explanation evaluation
#[derive(Parser)]
#[command(name = "feynman-web")]
#[command(about = "Web server for the Feynman learning platform")]
#[command(version)]
struct Args {
    /// Server host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Enable development mode
    #[arg(long)]
    dev: bool,

    /// Path to a TOML pipeline configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Load environment variables before anything reads them
    dotenvy::dotenv().ok();

    let logging = LoggingConfig {
        level: args.log_level.clone(),
        ..LoggingConfig::default()
    };
    if let Err(e) = init_logging(&logging) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    // File config wins over environment variables when given
    let rag_config = match &args.config {
        Some(path) => match RagConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => RagConfig::from_env(),
    };

    if let Err(e) = rag_config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let mut web_config = WebConfig::from_env();
    web_config.host = args.host;
    web_config.port = args.port;
    web_config.dev_mode = args.dev;

    let server = match FeynmanServerBuilder::new()
        .host(web_config.host.clone())
        .port(web_config.port)
        .dev_mode(web_config.dev_mode)
        .rag_config(rag_config)
        .build()
    {
        Ok(server) => server,
        Err(e) => {
            eprintln!("Failed to build server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.start().await {
        eprintln!("Server failed: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["feynman-web"]);
        assert_eq!(args.host, "127.0.0.1");
        assert_eq!(args.port, 8080);
        assert!(!args.dev);

        let args =
            Args::parse_from(["feynman-web", "--host", "0.0.0.0", "--port", "3000", "--dev"]);
        assert_eq!(args.host, "0.0.0.0");
        assert_eq!(args.port, 3000);
        assert!(args.dev);
    }
}
