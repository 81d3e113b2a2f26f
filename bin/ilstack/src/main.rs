use ilstack::analysis::{self, Settings, StackStates};
use ilstack::cil::{self, FlowControl, MethodBody};

use clap::{Arg, ArgAction, Command};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::exit;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use walkdir::WalkDir;

fn main() -> io::Result<()> {
    env_logger::init();

    let matches = Command::new("CIL stack analyzer")
        .version(clap::crate_version!())
        .about("Check that guarded push calls in CIL method listings can be rewritten safely")
        .arg(
            Arg::new("push-type")
                .long("push-type")
                .value_name("TYPE")
                .action(ArgAction::Set)
                .help("Full name of the type declaring the push methods (default `InlineIL.IL`)"),
        )
        .arg(
            Arg::new("ensure-local")
                .long("ensure-local")
                .value_name("METHOD")
                .action(ArgAction::Set)
                .help("Method to suggest when a push is rejected (default `EnsureLocal`)"),
        )
        .arg(
            Arg::new("trust-exception-object")
                .long("trust-exception-object")
                .action(ArgAction::SetTrue)
                .help("Allow pushes to consume the exception object in handlers"),
        )
        .arg(
            Arg::new("states")
                .long("states")
                .action(ArgAction::SetTrue)
                .help("Print the stack state on entry to every instruction"),
        )
        .arg(
            Arg::new("arguments")
                .long("arguments")
                .action(ArgAction::SetTrue)
                .help("Print the instructions producing the arguments of every call"),
        )
        .arg(
            Arg::new("INPUT")
                .help("Sets the input listing file or folder (of `.il` files)")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf))
                .index(1),
        )
        .get_matches();

    let mut settings = Settings::default();
    if let Some(push_type) = matches.get_one::<String>("push-type") {
        settings.push_type = push_type.clone();
    }
    if let Some(ensure_local) = matches.get_one::<String>("ensure-local") {
        settings.ensure_local_method = ensure_local.clone();
    }
    if matches.get_flag("trust-exception-object") {
        settings.taint_exception_object = false;
    }
    let show_states = matches.get_flag("states");
    let show_arguments = matches.get_flag("arguments");

    let input_path: PathBuf = match matches.get_one::<PathBuf>("INPUT") {
        Some(path) => path.clone(),
        None => {
            log::error!("Missing input");
            exit(2);
        }
    };

    // Find all of the listings
    let listings: Vec<PathBuf> = if input_path.is_file() {
        vec![input_path]
    } else {
        WalkDir::new(input_path)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|e| e.is_file() && e.extension().map_or(false, |ex| ex == "il"))
            .collect()
    };

    let mut count_ok = 0;
    let mut count_fail = 0;
    let mut count_error = 0;
    let stdout = StandardStream::stdout(ColorChoice::Auto);
    for listing in listings {
        let methods = match read_listing(&listing) {
            Ok(methods) => methods,
            Err(err) => {
                count_error += 1;
                log::error!("{}: {}", listing.display(), err);
                print_outcome(&stdout, &listing.to_string_lossy(), Outcome::Error)?;
                continue;
            }
        };

        for method in &methods {
            let states = if show_states {
                analysis::analyze_stack(method, &settings).map(Some)
            } else {
                analysis::validate_push_methods(method, &settings).map(|()| None)
            };

            let outcome = match &states {
                Ok(_) => {
                    count_ok += 1;
                    Outcome::Ok
                }
                Err(err) => {
                    count_fail += 1;
                    log::error!("{}", err.diagnostic(method));
                    Outcome::Fail
                }
            };
            let name = format!("{}: {}", listing.display(), method.name);
            print_outcome(&stdout, &name, outcome)?;

            if let Ok(Some(states)) = &states {
                print_states(&stdout, method, states)?;
            }
            if show_arguments {
                print_arguments(&stdout, method)?;
            }
        }
    }

    log::info!(
        "{} methods passed, {} failed, {} listings could not be read",
        count_ok,
        count_fail,
        count_error
    );

    // Exit code
    exit(if count_fail > 0 || count_error > 0 {
        1
    } else {
        0
    });
}

fn read_listing(path: &Path) -> Result<Vec<MethodBody>, ilstack::Error> {
    let source = fs::read_to_string(path).map_err(cil::Error::IoError)?;
    Ok(cil::parse_listing(&source)?)
}

enum Outcome {
    Ok,
    Fail,
    Error,
}

fn print_outcome(stdout: &StandardStream, name: &str, outcome: Outcome) -> io::Result<()> {
    let (color, summary) = match outcome {
        Outcome::Ok => (Color::Green, b"OK".as_ref()),
        Outcome::Fail => (Color::Red, b"FAILED".as_ref()),
        Outcome::Error => (Color::Yellow, b"ERROR".as_ref()),
    };

    let mut s = stdout.lock();
    s.write_all(b" - ")?;
    s.set_color(ColorSpec::new().set_bold(true))?;
    s.write_all(name.as_bytes())?;
    s.set_color(ColorSpec::new().set_dimmed(true))?;
    s.write_all(b" [")?;
    s.set_color(ColorSpec::new().set_fg(Some(color)))?;
    s.write_all(summary)?;
    s.set_color(ColorSpec::new().set_dimmed(true))?;
    s.write_all(b"]\n")?;
    s.reset()
}

fn print_states(
    stdout: &StandardStream,
    method: &MethodBody,
    states: &StackStates,
) -> io::Result<()> {
    let mut s = stdout.lock();
    for (id, state) in states.iter() {
        if let Some(instruction) = method.get(id) {
            s.set_color(ColorSpec::new().set_dimmed(true))?;
            write!(s, "     {:<16}", state.to_string())?;
            s.reset()?;
            writeln!(s, "{}", instruction)?;
        }
    }
    Ok(())
}

fn print_arguments(stdout: &StandardStream, method: &MethodBody) -> io::Result<()> {
    let mut s = stdout.lock();
    for (id, instruction) in method.iter() {
        if instruction.op_code().flow_control != FlowControl::Call {
            continue;
        }
        match analysis::argument_producers(method, id) {
            Ok(producers) => {
                let offsets: Vec<String> = producers
                    .iter()
                    .filter_map(|producer| method.offset_of(*producer))
                    .map(|offset| format!("IL_{:04x}", offset))
                    .collect();
                writeln!(s, "     {} <- ({})", instruction, offsets.join(", "))?;
            }
            Err(err) => log::warn!("{}", err.diagnostic(method)),
        }
    }
    Ok(())
}
