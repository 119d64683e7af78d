// wakegateのCLIモジュール
//
// コマンドライン引数の解析とコマンド実行機能を提供

use crate::common::types::TargetAddress;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod commands;

#[derive(Parser)]
#[command(
    name = "wakegate",
    about = "Transparent TCP relay that wakes its target on demand",
    version = env!("CARGO_PKG_VERSION"),
    long_about = "wakegate accepts TCP connections, wakes the real destination (Wake-on-LAN or hypervisor API), waits for it to come up and then relays bytes transparently."
)]
pub struct CliArgs {
    /// Configuration file path (default: ./wakegate.toml if present)
    #[arg(short, long, global = true, value_name = "FILE", env = "WAKEGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the relay (default)
    Serve(ServeArgs),

    /// Trigger the configured wakeup once and exit
    Wake,

    /// Manage configuration
    Config(ConfigArgs),

    /// Show version information
    Version,
}

#[derive(Parser, Default)]
pub struct ServeArgs {
    /// Address to listen on, overrides [listen]
    #[arg(short, long, value_name = "HOST:PORT")]
    pub listen: Option<String>,

    /// Target service, overrides [target]
    #[arg(short, long, value_name = "HOST:PORT")]
    pub target: Option<TargetAddress>,
}

#[derive(Parser)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show effective configuration
    Show {
        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Validate configuration file
    Validate {
        /// Configuration file path
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output file path
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_serve_overrides_parse() {
        let args = CliArgs::try_parse_from([
            "wakegate", "serve", "--listen", "127.0.0.1:2200", "--target", "nas.lan:22",
        ])
        .unwrap();

        match args.command {
            Some(Commands::Serve(serve)) => {
                assert_eq!(serve.listen.as_deref(), Some("127.0.0.1:2200"));
                assert_eq!(serve.target, Some(TargetAddress::new("nas.lan", 22)));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_no_subcommand_defaults_to_serve() {
        let args = CliArgs::try_parse_from(["wakegate", "--log-format", "json"]).unwrap();
        assert!(args.command.is_none());
        assert_eq!(args.log_format, LogFormat::Json);
    }
}
