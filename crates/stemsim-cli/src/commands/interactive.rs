use crate::cli::InteractiveArgs;
use crate::config::build_parameters;
use crate::error::Result;
use crate::utils::parser::{ParseError, parse_number, parse_position};
use std::io::Write;
use std::time::Duration;
use stemsim::core::atoms::cell::UnitCell;
use stemsim::core::spectral::{intensity_range, total_intensity};
use stemsim::engine::simulation::Simulation;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::LocalSet;
use tracing::{info, warn};

const HELP: &str = "\
Commands:
  voltage <kV>                      accelerating voltage
  max-angle <mrad>                  largest collection angle on the grid
  aperture <mrad>                   probe-forming aperture
  grid <n>                          square grid edge in pixels
  scan <x>,<y>                      probe position in Å
  aberration <i> <mag> [angle-deg]  edit aberration i (see 'status')
  status                            show parameters and output freshness
  wait                              block until every output is up to date
  help                              show this text
  quit                              leave";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Voltage(f64),
    MaxAngle(f64),
    Aperture(f64),
    Grid(usize),
    Scan([f64; 2]),
    Aberration {
        index: usize,
        magnitude: f64,
        angle_deg: Option<f64>,
    },
    Status,
    Wait,
    Help,
    Quit,
}

fn single<'a>(
    command: &'static str,
    expected: &'static str,
    args: &[&'a str],
) -> std::result::Result<&'a str, ParseError> {
    match args {
        [value] => Ok(*value),
        _ => Err(ParseError::WrongArity { command, expected }),
    }
}

/// Parses one input line. Blank lines and `#` comments yield `None`.
pub fn parse_command(line: &str) -> std::result::Result<Option<Command>, ParseError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let mut tokens = line.split_whitespace();
    let Some(name) = tokens.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = tokens.collect();

    let command = match name {
        "voltage" => Command::Voltage(parse_number(single("voltage", "one value in kV", &args)?)?),
        "max-angle" => Command::MaxAngle(parse_number(single(
            "max-angle",
            "one value in mrad",
            &args,
        )?)?),
        "aperture" => Command::Aperture(parse_number(single(
            "aperture",
            "one value in mrad",
            &args,
        )?)?),
        "grid" => {
            let value = single("grid", "one pixel count", &args)?;
            Command::Grid(
                value
                    .parse()
                    .map_err(|_| ParseError::InvalidNumber(value.to_string()))?,
            )
        }
        "scan" => Command::Scan(parse_position(&args.join(""))?),
        "aberration" => {
            let arity = || ParseError::WrongArity {
                command: "aberration",
                expected: "an index, a magnitude and an optional angle in degrees",
            };
            let (index, magnitude, angle) = match args.as_slice() {
                [index, magnitude] => (index, magnitude, None),
                [index, magnitude, angle] => (index, magnitude, Some(angle)),
                _ => return Err(arity()),
            };
            Command::Aberration {
                index: index
                    .parse()
                    .map_err(|_| ParseError::InvalidNumber(index.to_string()))?,
                magnitude: parse_number(magnitude)?,
                angle_deg: angle.map(|a| parse_number(a)).transpose()?,
            }
        }
        "status" => Command::Status,
        "wait" => Command::Wait,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(ParseError::UnknownCommand(other.to_string())),
    };
    Ok(Some(command))
}

pub async fn run(args: InteractiveArgs) -> Result<()> {
    let params = build_parameters(&args.parameters)?;
    let debounce = Duration::from_millis(args.debounce_ms);

    LocalSet::new()
        .run_until(async move {
            let sim = Simulation::with_debounce(&params, UnitCell::mos2(), debounce)?;
            info!("Interactive session started.");
            let mut stdout = std::io::stdout();
            writeln!(stdout, "{HELP}")?;
            drive(&sim, BufReader::new(tokio::io::stdin()), &mut stdout).await
        })
        .await
}

/// Reads commands from `input` until it ends or `quit` is given.
pub async fn drive<R, W>(sim: &Simulation, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        match parse_command(&line) {
            Ok(None) => continue,
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => execute(sim, command, out).await?,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed command.");
                writeln!(out, "error: {e}")?;
            }
        }
        out.flush()?;
    }
    Ok(())
}

async fn execute<W: Write>(sim: &Simulation, command: Command, out: &mut W) -> Result<()> {
    let outcome = match command {
        Command::Voltage(kv) => sim.set_voltage(kv),
        Command::MaxAngle(mrad) => sim.set_max_angle(mrad),
        Command::Aperture(mrad) => sim.set_aperture(mrad),
        Command::Grid(n) => sim.set_grid_shape([n, n]),
        Command::Scan(position) => sim.set_scan_position(position),
        Command::Aberration {
            index,
            magnitude,
            angle_deg,
        } => {
            let mut aberrations = sim.parameters()?.aberrations;
            let Some(term) = aberrations.get_mut(index) else {
                writeln!(
                    out,
                    "error: no aberration #{index}; there are {}",
                    aberrations.len()
                )?;
                return Ok(());
            };
            let mut edited = term.with_magnitude(magnitude);
            if let Some(angle) = angle_deg {
                edited = edited.with_angle_deg(angle);
            }
            *term = edited;
            sim.set_aberrations(aberrations)
        }
        Command::Status => return print_status(sim, out),
        Command::Wait => {
            sim.settle().await;
            return print_status(sim, out);
        }
        Command::Help => {
            writeln!(out, "{HELP}")?;
            return Ok(());
        }
        Command::Quit => return Ok(()),
    };

    if let Err(e) = outcome {
        writeln!(out, "rejected: {e}")?;
    }
    Ok(())
}

fn print_status<W: Write>(sim: &Simulation, out: &mut W) -> Result<()> {
    let params = sim.parameters()?;
    writeln!(
        out,
        "voltage {} kV | max angle {} mrad | grid {}x{} | aperture {} mrad | scan ({}, {}) Å",
        params.voltage_kv,
        params.max_angle_mrad,
        params.grid_shape[0],
        params.grid_shape[1],
        params.aperture_mrad,
        params.scan_position[0],
        params.scan_position[1],
    )?;
    for (i, term) in params.aberrations.iter().enumerate() {
        writeln!(
            out,
            "  [{i}] {:<12} |C| = {:.3} Å at {:.1}°",
            term.label(),
            term.magnitude(),
            term.angle_deg()
        )?;
    }

    for (name, state) in sim.status()? {
        writeln!(out, "  {name:<16} {state}")?;
    }

    if let Some(probe) = sim.probe()?.value() {
        writeln!(out, "  probe total      {:.6}", total_intensity(&probe.reciprocal))?;
    }
    if let Some(pattern) = sim.pattern()?.value() {
        if let Some((_, peak)) = intensity_range(pattern) {
            writeln!(
                out,
                "  pattern total    {:.6} (peak {:.3e})",
                pattern.sum(),
                peak
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stemsim::engine::simulation::preview_parameters;

    #[test]
    fn commands_are_parsed() {
        assert_eq!(parse_command("voltage 300"), Ok(Some(Command::Voltage(300.0))));
        assert_eq!(parse_command("  max-angle 40 "), Ok(Some(Command::MaxAngle(40.0))));
        assert_eq!(parse_command("grid 64"), Ok(Some(Command::Grid(64))));
        assert_eq!(parse_command("scan 1.5, -2"), Ok(Some(Command::Scan([1.5, -2.0]))));
        assert_eq!(
            parse_command("aberration 1 12.5 45"),
            Ok(Some(Command::Aberration {
                index: 1,
                magnitude: 12.5,
                angle_deg: Some(45.0),
            }))
        );
        assert_eq!(parse_command("# comment"), Ok(None));
        assert_eq!(parse_command(""), Ok(None));
        assert_eq!(parse_command("exit"), Ok(Some(Command::Quit)));
    }

    #[test]
    fn malformed_commands_are_reported() {
        assert_eq!(
            parse_command("voltage abc"),
            Err(ParseError::InvalidNumber("abc".to_string()))
        );
        assert!(matches!(
            parse_command("aperture"),
            Err(ParseError::WrongArity { .. })
        ));
        assert!(matches!(
            parse_command("focus 3"),
            Err(ParseError::UnknownCommand(_))
        ));
        assert!(parse_command("grid -4").is_err());
    }

    async fn session_output(script: &str) -> (String, f64) {
        let sim = Simulation::new(&preview_parameters(32), UnitCell::mos2()).unwrap();
        let mut out = Vec::new();
        drive(&sim, script.as_bytes(), &mut out).await.unwrap();
        let aperture = sim.parameters().unwrap().aperture_mrad;
        (String::from_utf8(out).unwrap(), aperture)
    }

    #[tokio::test(start_paused = true)]
    async fn session_applies_edits_and_reports_fresh_outputs() {
        LocalSet::new()
            .run_until(async {
                let (out, aperture) =
                    session_output("aperture 20\nvoltage abc\nwait\nquit\naperture 5\n").await;
                assert_eq!(aperture, 20.0);
                assert!(out.contains("error: 'abc' is not a number."), "{out}");
                assert!(out.contains("aperture 20 mrad"), "{out}");
                assert!(out.contains("pattern          fresh"), "{out}");
                assert!(out.contains("probe total      1.000000"), "{out}");
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn degenerate_aperture_is_shown_as_a_failed_output() {
        LocalSet::new()
            .run_until(async {
                let (out, aperture) = session_output("aperture 0\nwait\n").await;
                assert_eq!(aperture, 0.0);
                assert!(out.contains("probe            failed"), "{out}");
                assert!(out.contains("object           fresh"), "{out}");
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn aberration_edits_replace_one_term() {
        LocalSet::new()
            .run_until(async {
                let (out, _) = session_output("aberration 3 5000\naberration 9 1\nstatus\n").await;
                assert!(out.contains("error: no aberration #9"), "{out}");
                assert!(out.contains("Spherical    |C| = 5000.000 Å"), "{out}");
            })
            .await;
    }
}
