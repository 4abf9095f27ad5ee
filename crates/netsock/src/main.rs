mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "netsock", version, about = "Framed TCP/UDP packet CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::field::{FieldKind, FieldValue};

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "netsock",
            "send",
            "127.0.0.1",
            "4000",
            "--field",
            "u32:42",
            "-f",
            "text:hi",
        ])
        .expect("send args should parse");

        let Command::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.port, 4000);
        assert!(!args.udp);
        assert_eq!(
            args.fields,
            vec![FieldValue::U32(42), FieldValue::Text("hi".to_string())]
        );
    }

    #[test]
    fn rejects_malformed_field() {
        let err = Cli::try_parse_from(["netsock", "send", "127.0.0.1", "4000", "--field", "u8:300"])
            .expect_err("out-of-range field should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_listen_with_decode_layout() {
        let cli = Cli::try_parse_from([
            "netsock",
            "listen",
            "4000",
            "--udp",
            "--count",
            "3",
            "--decode",
            "u32,text",
        ])
        .expect("listen args should parse");

        let Command::Listen(args) = cli.command else {
            panic!("expected listen");
        };
        assert!(args.udp);
        assert_eq!(args.count, Some(3));
        assert_eq!(args.decode, vec![FieldKind::U32, FieldKind::Text]);
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from(["netsock", "echo", "4000", "--format", "json"])
            .expect("echo args should parse");
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        assert!(matches!(cli.command, Command::Echo(_)));
    }

    #[test]
    fn rejects_out_of_range_port() {
        let err = Cli::try_parse_from(["netsock", "listen", "70000"])
            .expect_err("port above u16 should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
