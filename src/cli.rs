//! Flag parsing and the harness entry point (`spec.md` §6's CLI surface,
//! ambient logging/config wiring per `spec.md` §4.11). Grounded on the
//! teacher's `main.rs`: a `clap::Parser` derive for the flag surface, a
//! `create_reporter`-style function here renamed [`build_listeners`] that
//! composes the built-in listeners, and the same overall shape — parse,
//! configure, build a runner, run, report.

use std::rc::Rc;

use clap::Parser;
use regex::Regex;

use crate::bus::Bus;
use crate::canvas::{Color, Style};
use crate::config::FileConfig;
use crate::dsl::Program;
use crate::listeners::{
    compile_pattern, DiagramListener, ExceptionPrinterListener, GeneratorOverrideListener, IncludeExcludeListener,
    LogPrinterListener, ProgressListener,
};
use crate::registry;
use crate::runner::{Runner, RunnerOptions, RunResult};
use crate::terminal::{colorize, AnsiTerminal, PlainTerminal, Terminal};

/// `spec.md` §6's external CLI contract. Boolean pairs (`--color`/
/// `--no-color`, and so on) follow the teacher's `ArgAction::SetTrue` plus
/// `overrides_with` pattern: whichever of the pair appears last wins.
#[derive(Parser, Debug)]
#[command(name = "taut", version, about = "A unit-test framework with assertion expression decomposition")]
pub struct Args {
    /// Enable tests matching PAT (a regex matched against the whole name or
    /// any slash-segment prefix). Repeatable. A `//` inside PAT redirects
    /// the whole argument to `--generate` instead.
    #[arg(short = 'i', long = "include", value_name = "PAT")]
    pub include: Vec<String>,

    /// Disable tests matching PAT. Repeatable.
    #[arg(short = 'e', long = "exclude", value_name = "PAT")]
    pub exclude: Vec<String>,

    /// Override a `generate!` site: `PAT//PROG`, PAT a test-name regex,
    /// PROG the override-DSL program. Repeatable; later flags win for the
    /// same generator entry.
    #[arg(short = 'g', long = "generate", value_name = "PAT//PROG")]
    pub generate: Vec<String>,

    /// Print the `--generate` override grammar and exit.
    #[arg(long = "help-generate")]
    pub help_generate: bool,

    #[arg(long = "color", action = clap::ArgAction::SetTrue, overrides_with = "no_color")]
    pub color: bool,
    #[arg(long = "no-color", action = clap::ArgAction::SetTrue, overrides_with = "color")]
    pub no_color: bool,

    #[arg(long = "unicode", action = clap::ArgAction::SetTrue, overrides_with = "no_unicode")]
    pub unicode: bool,
    #[arg(long = "no-unicode", action = clap::ArgAction::SetTrue, overrides_with = "unicode")]
    pub no_unicode: bool,

    #[arg(long = "progress", action = clap::ArgAction::SetTrue, overrides_with = "no_progress")]
    pub progress: bool,
    #[arg(long = "no-progress", action = clap::ArgAction::SetTrue, overrides_with = "progress")]
    pub no_progress: bool,

    #[arg(long = "break", action = clap::ArgAction::SetTrue, overrides_with = "no_break")]
    pub break_on_failure: bool,
    #[arg(long = "no-break", action = clap::ArgAction::SetTrue, overrides_with = "break_on_failure")]
    pub no_break: bool,

    #[arg(long = "catch", action = clap::ArgAction::SetTrue, overrides_with = "no_catch")]
    pub catch: bool,
    #[arg(long = "no-catch", action = clap::ArgAction::SetTrue, overrides_with = "catch")]
    pub no_catch: bool,

    /// Shorthand for `--break --no-catch`.
    #[arg(long = "debug")]
    pub debug: bool,

    /// Repeatable; raises the internal diagnostic log level. `RUST_LOG`
    /// always takes precedence over this when set.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Every source of truth the CLI draws flags from, resolved in precedence
/// order: explicit CLI flag, then `taut.toml`, then the built-in default.
pub struct ResolvedOptions {
    pub color: bool,
    pub unicode: bool,
    pub progress: bool,
    pub catch_exceptions: bool,
    pub break_on_failure: bool,
    pub filter_flags: Vec<(bool, Regex)>,
    pub generate_programs: Vec<(Regex, Program)>,
}

fn tri_state(on: bool, off: bool, config: Option<bool>, default: bool) -> bool {
    if off {
        false
    } else if on {
        true
    } else {
        config.unwrap_or(default)
    }
}

impl ResolvedOptions {
    pub fn resolve(args: &Args, config: &FileConfig) -> Result<Self, crate::error::UserError> {
        let mut break_on_failure = tri_state(args.break_on_failure, args.no_break, config.taut.break_on_failure, false);
        let mut catch_exceptions = tri_state(args.catch, args.no_catch, config.taut.catch_exceptions, true);
        // `--debug` only supplies its implied values where neither explicit
        // flag of the corresponding pair was given.
        if args.debug {
            if !args.break_on_failure && !args.no_break {
                break_on_failure = true;
            }
            if !args.catch && !args.no_catch {
                catch_exceptions = false;
            }
        }

        let color = tri_state(args.color, args.no_color, config.taut.color, AnsiTerminal.is_tty());
        let unicode = tri_state(args.unicode, args.no_unicode, config.taut.unicode, true);
        let progress = tri_state(args.progress, args.no_progress, config.taut.progress, true);

        let mut include_patterns = config.include.patterns.clone();
        let mut exclude_patterns = config.include.exclude.clone();
        let mut generate_programs_raw = config.generate.overrides.clone();

        for raw in &args.include {
            // `spec.md` §6: a `//` inside an `--include` pattern redirects
            // the whole argument to `--generate` instead of treating it as
            // an inclusion rule.
            if raw.contains("//") {
                generate_programs_raw.push(raw.clone());
            } else {
                include_patterns.push(raw.clone());
            }
        }
        exclude_patterns.extend(args.exclude.iter().cloned());
        generate_programs_raw.extend(args.generate.iter().cloned());

        let mut filter_flags = Vec::new();
        for pattern in &include_patterns {
            filter_flags.push((true, compile_or_err(pattern)?));
        }
        for pattern in &exclude_patterns {
            filter_flags.push((false, compile_or_err(pattern)?));
        }

        let mut generate_programs = Vec::new();
        for raw in &generate_programs_raw {
            let Some((test_pattern, program_text)) = raw.split_once("//") else {
                return Err(crate::error::UserError::BadFlag(format!(
                    "--generate argument '{raw}' is missing the '//' separator"
                )));
            };
            let re = compile_or_err(test_pattern)?;
            let base = test_pattern.len() + 2;
            let program = crate::dsl::parse_program(program_text, base)?.flatten();
            generate_programs.push((re, program));
        }

        Ok(ResolvedOptions {
            color,
            unicode,
            progress,
            catch_exceptions,
            break_on_failure,
            filter_flags,
            generate_programs,
        })
    }
}

fn compile_or_err(pattern: &str) -> Result<Regex, crate::error::UserError> {
    compile_pattern(pattern).map_err(|e| crate::error::UserError::BadFlag(format!("invalid pattern '{pattern}': {e}")))
}

/// Composes the built-in listener set (`spec.md` §4.10) for one run.
pub fn build_listeners(options: &ResolvedOptions, terminal: Rc<dyn Terminal>) -> Vec<Box<dyn crate::bus::Listener>> {
    let mut listeners: Vec<Box<dyn crate::bus::Listener>> = Vec::new();
    if !options.filter_flags.is_empty() {
        listeners.push(Box::new(IncludeExcludeListener::new(options.filter_flags.clone())));
    }
    if !options.generate_programs.is_empty() {
        listeners.push(Box::new(GeneratorOverrideListener::new(options.generate_programs.clone())));
    }
    if options.progress {
        listeners.push(Box::new(ProgressListener::new(terminal.clone())));
    }
    listeners.push(Box::new(DiagramListener::new(terminal.clone(), options.unicode)));
    listeners.push(Box::new(LogPrinterListener::new(terminal.clone())));
    listeners.push(Box::new(ExceptionPrinterListener::new(terminal)));
    listeners
}

const GENERATE_HELP: &str = r#"--generate PAT//PROG overrides a generate!() call site.

PAT is a regex matched against the name of the test the site belongs to
(whole name, or any slash-segment prefix).

PROG is a comma-separated list of entries, one per generator name:

  Program := Entry ("," Entry)*
  Entry    := Name ( Rule | "{" Rule ("," Rule)* "}" )
  Rule     := "=" Value Scope?      custom value
            | "-=" Value            remove by value
            | "#" Range Scope?      accept index range (1-based)
            | "-#" Range            remove index range
            | "&" Rule Scope?       join sibling rules sharing one Scope
  Scope    := "(" Program? ")"
  Range    := Num | Num ".." | ".." Num | Num ".." Num

Example: --generate 'sums/.*//x{#1..3,=99}'
"#;

/// Parses arguments, loads `taut.toml`, builds the runner, and runs it.
/// Diverges via `std::process::exit` for `--help-generate` and for
/// malformed flags/config (`EXIT_BAD_FLAGS`); otherwise returns the
/// [`RunResult`] for the caller to `.report()`.
pub fn main() -> RunResult {
    let args = Args::parse();
    crate::logging::init(args.verbose);

    if args.help_generate {
        print!("{GENERATE_HELP}");
        std::process::exit(crate::runner::EXIT_OK);
    }

    let config = match crate::config::load_default() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("taut: {e:#}");
            std::process::exit(crate::runner::EXIT_BAD_FLAGS);
        }
    };

    let resolved = match ResolvedOptions::resolve(&args, &config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("taut: {e}");
            std::process::exit(crate::runner::EXIT_BAD_FLAGS);
        }
    };

    let terminal: Rc<dyn Terminal> = if resolved.color {
        Rc::new(AnsiTerminal)
    } else {
        Rc::new(PlainTerminal)
    };

    let tests = registry::all_tests();
    let listeners = build_listeners(&resolved, terminal.clone());
    let bus = Bus::new(listeners);
    let runner = Runner::new(
        tests,
        bus,
        RunnerOptions {
            catch_exceptions: resolved.catch_exceptions,
        },
    );
    let result = runner.run();

    if resolved.break_on_failure && result.progress.num_tests_failed > 0 {
        terminal.print(&colorize(
            terminal.as_ref(),
            "one or more tests failed; breaking\n",
            Style::fg(Color::Yellow).bold(),
        ));
        crate::exception::breakpoint();
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_config() -> FileConfig {
        FileConfig::default()
    }

    #[test]
    fn debug_flag_implies_break_and_no_catch_when_unset() {
        let args = Args {
            include: vec![],
            exclude: vec![],
            generate: vec![],
            help_generate: false,
            color: false,
            no_color: false,
            unicode: false,
            no_unicode: false,
            progress: false,
            no_progress: false,
            break_on_failure: false,
            no_break: false,
            catch: false,
            no_catch: false,
            debug: true,
            verbose: 0,
        };
        let resolved = ResolvedOptions::resolve(&args, &empty_config()).unwrap();
        assert!(resolved.break_on_failure);
        assert!(!resolved.catch_exceptions);
    }

    #[test]
    fn explicit_catch_flag_overrides_debug_shorthand() {
        let args = Args {
            include: vec![],
            exclude: vec![],
            generate: vec![],
            help_generate: false,
            color: false,
            no_color: false,
            unicode: false,
            no_unicode: false,
            progress: false,
            no_progress: false,
            break_on_failure: false,
            no_break: false,
            catch: true,
            no_catch: false,
            debug: true,
            verbose: 0,
        };
        let resolved = ResolvedOptions::resolve(&args, &empty_config()).unwrap();
        assert!(resolved.catch_exceptions);
    }

    #[test]
    fn include_pattern_with_double_slash_redirects_to_generate() {
        let args = Args {
            include: vec!["sums//x=1".to_string()],
            exclude: vec![],
            generate: vec![],
            help_generate: false,
            color: false,
            no_color: false,
            unicode: false,
            no_unicode: false,
            progress: false,
            no_progress: false,
            break_on_failure: false,
            no_break: false,
            catch: false,
            no_catch: false,
            debug: false,
            verbose: 0,
        };
        let resolved = ResolvedOptions::resolve(&args, &empty_config()).unwrap();
        assert!(resolved.filter_flags.is_empty());
        assert_eq!(resolved.generate_programs.len(), 1);
    }

    #[test]
    fn malformed_generate_flag_without_separator_is_a_user_error() {
        let args = Args {
            include: vec![],
            exclude: vec![],
            generate: vec!["no-separator-here".to_string()],
            help_generate: false,
            color: false,
            no_color: false,
            unicode: false,
            no_unicode: false,
            progress: false,
            no_progress: false,
            break_on_failure: false,
            no_break: false,
            catch: false,
            no_catch: false,
            debug: false,
            verbose: 0,
        };
        assert!(ResolvedOptions::resolve(&args, &empty_config()).is_err());
    }
}
