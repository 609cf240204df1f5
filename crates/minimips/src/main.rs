//! CLI entry point for the MiniMIPS test-program generator.

use std::env;
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use generator_core::{GeneratorConfig, DEFAULT_SEED};
use minimips::templates::{self, DEFAULT_TEMPLATE, TEMPLATE_NAMES};
use minimips::{standard_template, FrontEndError, ListingPrinter};
#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
#[cfg(test)]
use tempfile as _;
use strum as _;
use tracing as _;
use thiserror as _;
use tracing_subscriber::EnvFilter;

const USAGE_TEXT: &str = "\
Usage: minimips-gen <command> [options]

Commands:
  generate [options]  Generate test sequences as an assembly listing
  list                List available templates

Options:
  -t, --template <name>  Template to expand (default: self_check)
  -n, --count <n>        Number of sequences (default: 1)
  -s, --seed <seed>      Random seed (decimal or 0x-prefixed hex)
  -o, --output <file>    Output file path (default: stdout)
  -v, --verbose          Log expansion details to stderr
  -h, --help             Show this help message

Examples:
  minimips-gen list
  minimips-gen generate --template loops --count 4
  minimips-gen generate -t self_check -n 10 -s 0x2a -o checks.s
";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Generate(GenerateArgs),
    List,
}

#[derive(Debug, PartialEq, Eq)]
struct GenerateArgs {
    template: String,
    count: usize,
    seed: u64,
    output: Option<PathBuf>,
    verbose: bool,
}

impl Default for GenerateArgs {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_owned(),
            count: 1,
            seed: DEFAULT_SEED,
            output: None,
            verbose: false,
        }
    }
}

#[derive(Debug)]
enum ParseResult {
    Command(Command),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let first = args.next().ok_or_else(|| "missing command".to_string())?;

    if first == "--help" || first == "-h" {
        return Ok(ParseResult::Help);
    }

    let command_str = first.to_string_lossy().to_string();

    match command_str.as_str() {
        "generate" => parse_generate_args(args)
            .map(Command::Generate)
            .map(ParseResult::Command),
        "list" => match args.next() {
            None => Ok(ParseResult::Command(Command::List)),
            Some(extra) => Err(format!("unexpected argument: {}", extra.to_string_lossy())),
        },
        other => Err(format!("unknown command: {other}")),
    }
}

fn parse_seed(text: &str) -> Result<u64, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|_| format!("invalid seed: {text}"))
}

fn value_of(args: &mut impl Iterator<Item = OsString>, flag: &str) -> Result<String, String> {
    args.next()
        .map(|value| value.to_string_lossy().to_string())
        .ok_or_else(|| format!("missing value for {flag}"))
}

#[allow(clippy::while_let_on_iterator)]
fn parse_generate_args(mut args: impl Iterator<Item = OsString>) -> Result<GenerateArgs, String> {
    let mut parsed = GenerateArgs::default();

    while let Some(arg) = args.next() {
        let flag = arg.to_string_lossy().to_string();
        match flag.as_str() {
            "--help" | "-h" => return Err(USAGE_TEXT.to_string()),
            "--verbose" | "-v" => parsed.verbose = true,
            "--template" | "-t" => parsed.template = value_of(&mut args, &flag)?,
            "--count" | "-n" => {
                let value = value_of(&mut args, &flag)?;
                parsed.count = value
                    .parse()
                    .map_err(|_| format!("invalid count: {value}"))?;
            }
            "--seed" | "-s" => parsed.seed = parse_seed(&value_of(&mut args, &flag)?)?,
            "--output" | "-o" => parsed.output = Some(PathBuf::from(value_of(&mut args, &flag)?)),
            other if other.starts_with('-') => return Err(format!("unknown option: {other}")),
            other => return Err(format!("unexpected argument: {other}")),
        }
    }

    Ok(parsed)
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn generate(args: &GenerateArgs, out: impl Write) -> Result<usize, FrontEndError> {
    let template = standard_template(GeneratorConfig::default().with_seed(args.seed))?;
    let root = templates::build(&template, &args.template)?;
    let mut printer = ListingPrinter::new(out);
    let result = template.run(&root, args.count, &mut printer);
    let written = printer.written();
    printer.finish()?;
    result?;
    Ok(written)
}

fn run_generate(args: &GenerateArgs) -> Result<(), i32> {
    init_logging(args.verbose);

    let result = match &args.output {
        Some(path) => match File::create(path) {
            Ok(file) => generate(args, BufWriter::new(file)),
            Err(e) => {
                eprintln!("error: failed to create {}: {e}", path.display());
                return Err(1);
            }
        },
        None => generate(args, io::stdout().lock()),
    };

    match result {
        Ok(written) => {
            if let Some(path) = &args.output {
                println!(
                    "Generated {written} sequence(s) from '{}' -> {}",
                    args.template,
                    path.display()
                );
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("error: {e}");
            Err(1)
        }
    }
}

fn run_list() {
    for name in TEMPLATE_NAMES {
        let marker = if *name == DEFAULT_TEMPLATE { " (default)" } else { "" };
        println!("{name}{marker}");
    }
}

fn main() {
    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Command(Command::Generate(args))) => match run_generate(&args) {
            Ok(()) => 0,
            Err(code) => code,
        },
        Ok(ParseResult::Command(Command::List)) => {
            run_list();
            0
        }
        Err(error) => {
            if error.starts_with("Usage:") {
                println!("{error}");
            } else {
                eprintln!("error: {error}");
                eprintln!("{USAGE_TEXT}");
            }
            1
        }
    };

    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::path::PathBuf;

    fn os<'a>(args: &'a [&'a str]) -> impl Iterator<Item = OsString> + 'a {
        args.iter().map(OsString::from)
    }

    #[test]
    fn parses_generate_command() {
        let result = parse_generate_args(os(&[
            "--template",
            "loops",
            "-n",
            "4",
            "--seed",
            "0x2A",
            "-o",
            "out.s",
            "--verbose",
        ]))
        .expect("valid generate args should parse");

        assert_eq!(
            result,
            GenerateArgs {
                template: "loops".to_owned(),
                count: 4,
                seed: 42,
                output: Some(PathBuf::from("out.s")),
                verbose: true,
            }
        );
    }

    #[test]
    fn generate_defaults() {
        let result = parse_generate_args(std::iter::empty()).expect("no options should parse");
        assert_eq!(result, GenerateArgs::default());
        assert_eq!(result.template, DEFAULT_TEMPLATE);
    }

    #[test]
    fn parses_list_command() {
        let result = parse_args(os(&["list"])).expect("list should parse");
        assert!(matches!(result, ParseResult::Command(Command::List)));
    }

    #[test]
    fn parses_help_flag() {
        let result = parse_args(os(&["--help"])).expect("help should parse without error");
        assert!(matches!(result, ParseResult::Help));
    }

    #[test]
    fn rejects_unknown_command() {
        let error = parse_args(os(&["assemble"])).expect_err("unknown command should fail parse");
        assert!(error.contains("unknown command"));
    }

    #[test]
    fn rejects_bad_numbers() {
        let error = parse_generate_args(os(&["--count", "many"])).expect_err("count must be numeric");
        assert!(error.contains("invalid count"));

        let error = parse_generate_args(os(&["-s", "0xZZ"])).expect_err("seed must be numeric");
        assert!(error.contains("invalid seed"));
    }

    #[test]
    fn rejects_missing_values() {
        let error = parse_generate_args(os(&["--template"])).expect_err("missing value should fail");
        assert!(error.contains("missing value for --template"));
    }

    #[test]
    fn generate_writes_a_listing() {
        let args = GenerateArgs {
            template: "loops".to_owned(),
            count: 2,
            ..GenerateArgs::default()
        };
        let mut out = Vec::new();
        let written = generate(&args, &mut out).expect("loops template should generate");
        let text = String::from_utf8(out).unwrap();

        assert_eq!(written, 2);
        assert!(text.contains("# sequence 0"));
        assert!(text.contains("# sequence 1"));
        assert!(text.contains("1:"));
        assert!(text.contains("done:"));
    }

    #[test]
    fn generate_reports_unknown_templates() {
        let args = GenerateArgs {
            template: "nope".to_owned(),
            ..GenerateArgs::default()
        };
        let error = generate(&args, Vec::new()).expect_err("unknown template should fail");
        assert!(matches!(error, FrontEndError::UnknownTemplate(_)));
    }
}
