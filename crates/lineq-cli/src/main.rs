use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use lineq_core::{LineEquation, Point, SignDomain, intersect, probe, root, sample, sign_domain};
use lineq_parse::{LinearForm, parse_equation};
use lineq_server::config::LineqConfig;
use lineq_server::{AppState, LiveCollaborators, collaborators, serve};
use lineq_tutor::{
    InvestigationRoom, LearningExample, LoadState, Stage, StepId, SubmitOutcome, Submission, Transcript,
    ask_or_apologize,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "lineq", version, about = "Practice linear equations from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Read an equation such as `y = 2x + 3` and describe the line.
    Parse { equation: String },
    /// Find where two lines cross.
    Intersect { line1: String, line2: String },
    /// Sample both lines at unit steps around a focus point.
    Sample {
        line1: String,
        line2: String,
        #[arg(long, allow_negative_numbers = true)]
        focus_x: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        focus_y: Option<f64>,
    },
    /// Read both lines at one x position.
    Probe {
        line1: String,
        line2: String,
        #[arg(long, allow_negative_numbers = true)]
        x: f64,
    },
    /// Show a worked learning example, optionally with the scan line at `--x`.
    Learn {
        #[arg(long, default_value_t = 1)]
        example: u32,
        #[arg(long, allow_negative_numbers = true)]
        x: Option<f64>,
    },
    /// Walk through a guided investigation on stdin.
    Investigate {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Run the HTTP and WebSocket server.
    Serve {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        port: Option<u16>,
    },
}

impl Command {
    fn default_log_filter(&self) -> &'static str {
        match self {
            Command::Serve { .. } => lineq_server::DEFAULT_LOG_FILTER,
            _ => "lineq=warn",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.command.default_log_filter());

    match cli.command {
        Command::Parse { equation } => run_parse(&equation),
        Command::Intersect { line1, line2 } => run_intersect(&line1, &line2),
        Command::Sample {
            line1,
            line2,
            focus_x,
            focus_y,
        } => run_sample(&line1, &line2, focus_x, focus_y),
        Command::Probe { line1, line2, x } => run_probe(&line1, &line2, x),
        Command::Learn { example, x } => run_learn(example, x),
        Command::Investigate { config } => run_investigate(load_config(config)?).await,
        Command::Serve { config, port } => {
            let mut config = load_config(config)?;
            if let Some(port) = port {
                config.server.port = port;
            }
            run_serve(config).await
        }
    }
}

// Logs go to stderr so they never mix with command output.
fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<LineqConfig> {
    let config = match path {
        Some(path) => LineqConfig::load_from(&path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => LineqConfig::load().context("failed to load configuration")?,
    };
    Ok(config)
}

fn read_lines(line1: &str, line2: &str) -> anyhow::Result<(LineEquation, LineEquation)> {
    let a = parse_equation(line1).with_context(|| format!("line 1 '{line1}'"))?;
    let b = parse_equation(line2).with_context(|| format!("line 2 '{line2}'"))?;
    Ok((
        LineEquation::primary(a.slope, a.intercept),
        LineEquation::secondary(b.slope, b.intercept),
    ))
}

fn run_parse(equation: &str) -> anyhow::Result<()> {
    let form = parse_equation(equation)?;
    for line in describe_line(form) {
        println!("{line}");
    }
    Ok(())
}

fn describe_line(form: LinearForm) -> Vec<String> {
    let line = LineEquation::primary(form.slope, form.intercept);
    let mut out = vec![
        format!("canonical {form}"),
        format!("slope {}", form.slope),
        format!("intercept {}", form.intercept),
    ];
    match root(&line) {
        Ok(x) => out.push(format!("root {x}")),
        Err(err) => out.push(format!("root none ({err})")),
    }
    match sign_domain(&line) {
        SignDomain::Split {
            positive_side,
            negative_side,
            boundary,
        } => {
            out.push(format!("positive x {positive_side} {boundary}"));
            out.push(format!("negative x {negative_side} {boundary}"));
        }
        SignDomain::Constant(sign) => out.push(format!("constant {sign:?}").to_lowercase()),
    }
    out
}

fn run_intersect(line1: &str, line2: &str) -> anyhow::Result<()> {
    let (a, b) = read_lines(line1, line2)?;
    let point = intersect(&a, &b)?;
    println!("x {}", point.x);
    println!("y {}", point.y);
    Ok(())
}

fn run_sample(
    line1: &str,
    line2: &str,
    focus_x: Option<f64>,
    focus_y: Option<f64>,
) -> anyhow::Result<()> {
    let (a, b) = read_lines(line1, line2)?;
    let crossing = intersect(&a, &b).unwrap_or(Point::new(0.0, 0.0));
    let focus = Point::new(
        focus_x.unwrap_or(crossing.x),
        focus_y.unwrap_or(crossing.y),
    );

    let graph = sample(&a, &b, focus);
    let [y_min, y_max] = graph.y_range();
    println!("half_width {}", graph.half_width());
    println!("y_range {y_min} {y_max}");
    for point in graph.points() {
        println!("{} {} {}", point.x, point.y1, point.y2);
    }
    Ok(())
}

fn run_probe(line1: &str, line2: &str, x: f64) -> anyhow::Result<()> {
    let (a, b) = read_lines(line1, line2)?;
    let reading = probe(&a, &b, x);
    println!("x {}", reading.x);
    println!("y1 {}", reading.y1);
    println!("y2 {}", reading.y2);
    println!("gap {}", reading.gap);
    Ok(())
}

fn run_learn(id: u32, x: Option<f64>) -> anyhow::Result<()> {
    let Some(example) = LearningExample::find(id) else {
        bail!("no learning example {id}");
    };
    for line in describe_example(&example, x) {
        println!("{line}");
    }
    Ok(())
}

fn describe_example(example: &LearningExample, x: Option<f64>) -> Vec<String> {
    let [from, to] = example.scan_range();
    let mut out = vec![
        example.title.clone(),
        format!("line1 {}", example.line1_display),
        format!("line2 {}", example.line2_display),
        format!("solve {}", example.equated_sides()),
        format!("scan {from} .. {to}"),
    ];
    if let Some(x) = x {
        let scan = example.scan(x);
        out.push(format!(
            "x {} y1 {} y2 {} gap {}",
            scan.reading.x, scan.reading.y1, scan.reading.y2, scan.reading.gap
        ));
        if scan.at_intersection {
            let crossing = example.intersection();
            out.push(format!("crossing ({}, {})", crossing.x, crossing.y));
        }
    }
    out
}

async fn run_serve(config: LineqConfig) -> anyhow::Result<()> {
    let collaborators = collaborators(&config).context("failed to set up content service")?;
    let state = AppState::new(collaborators, config.room_config());
    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    serve(listener, state).await.context("server stopped")
}

/// What the student typed at the investigation prompt.
#[derive(Debug, PartialEq)]
enum Input {
    Answer(Submission),
    Ask(String),
    Restart,
    Quit,
    Unreadable,
}

fn read_input(step: StepId, raw: &str) -> Input {
    let raw = raw.trim();
    match raw {
        "quit" | "exit" => return Input::Quit,
        "restart" => return Input::Restart,
        _ => {}
    }
    if let Some(question) = raw.strip_prefix('?') {
        let question = question.trim();
        if question.is_empty() {
            return Input::Unreadable;
        }
        return Input::Ask(question.to_string());
    }
    submission_for(step, raw).map_or(Input::Unreadable, Input::Answer)
}

fn submission_for(step: StepId, raw: &str) -> Option<Submission> {
    match step {
        StepId::Slope => Some(Submission::Slope {
            value: raw.to_string(),
        }),
        StepId::Equation => Some(Submission::Equation {
            text: raw.to_string(),
        }),
        StepId::Intersection => {
            let (x, y) = split_point(raw)?;
            Some(Submission::Intersection { x, y })
        }
        StepId::Positivity1 | StepId::Negativity1 | StepId::Positivity2 | StepId::Negativity2 => {
            let (sign, value) = split_sign(raw)?;
            Some(match step {
                StepId::Positivity1 => Submission::Positivity1 { sign, value },
                StepId::Negativity1 => Submission::Negativity1 { sign, value },
                StepId::Positivity2 => Submission::Positivity2 { sign, value },
                _ => Submission::Negativity2 { sign, value },
            })
        }
    }
}

/// `4,2`, `(4, 2)` or `4 2`.
fn split_point(raw: &str) -> Option<(String, String)> {
    let inner = raw.trim().trim_start_matches('(').trim_end_matches(')');
    let parts: Vec<&str> = inner
        .split(|ch: char| ch == ',' || ch.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect();
    match parts.as_slice() {
        [x, y] => Some((x.to_string(), y.to_string())),
        _ => None,
    }
}

/// `x > 2`, `>2` or `< -1`.
fn split_sign(raw: &str) -> Option<(String, String)> {
    let rest = raw.trim();
    let rest = rest
        .strip_prefix(['x', 'X'])
        .unwrap_or(rest)
        .trim_start();
    let sign = rest.chars().next().filter(|ch| matches!(ch, '<' | '>'))?;
    let value = rest[sign.len_utf8()..].trim();
    if value.is_empty() {
        return None;
    }
    Some((sign.to_string(), value.to_string()))
}

fn input_hint(step: StepId) -> &'static str {
    match step {
        StepId::Slope => "a number, e.g. 2",
        StepId::Equation => "an equation, e.g. y = 2x + 3",
        StepId::Intersection => "a point, e.g. 4,2",
        _ => "a sign and a boundary, e.g. x > 2",
    }
}

async fn run_investigate(config: LineqConfig) -> anyhow::Result<()> {
    let provider: Arc<LiveCollaborators> = Arc::new(collaborators(&config)?);
    let mut room = InvestigationRoom::new(Arc::clone(&provider), config.room_config());
    let mut transcript = Transcript::default();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    load_problem(&mut room).await?;
    debug!(live = provider.is_live(), "investigation ready");
    println!("Type an answer, '? question' to ask the tutor, 'restart' or 'quit'.");

    loop {
        let Some(workflow) = room.workflow() else {
            bail!("investigation is not loaded");
        };
        let step = match workflow.current_stage() {
            Stage::Active(step) => step,
            Stage::Complete => {
                println!("{}", workflow.status_message());
                return Ok(());
            }
        };
        println!();
        println!("{} ({})", workflow.problem().questions.prompt(step), input_hint(step));
        if step == StepId::Slope {
            let [p, q] = workflow.problem().points_line1;
            println!("points on the blue line: ({}, {}) and ({}, {})", p.x, p.y, q.x, q.y);
        }

        let Some(raw) = stdin.next_line().await? else {
            return Ok(());
        };
        match read_input(step, &raw) {
            Input::Quit => return Ok(()),
            Input::Restart => {
                transcript = Transcript::default();
                load_problem(&mut room).await?;
            }
            Input::Ask(question) => {
                let reply = ask_or_apologize(
                    provider.as_ref(),
                    transcript.clone(),
                    room.tutor_context(),
                    question.clone(),
                )
                .await;
                println!("tutor: {reply}");
                transcript.record_exchange(question, reply);
            }
            Input::Unreadable => println!("expected {}", input_hint(step)),
            Input::Answer(submission) => {
                let outcome = room.submit(submission);
                if let Some(message) = room.workflow().map(|workflow| workflow.status_message()) {
                    println!("{message}");
                }
                if let Some(SubmitOutcome::Advanced(StepId::Intersection)) = outcome {
                    if let Some(workflow) = room.workflow() {
                        let problem = workflow.problem();
                        println!("blue: {}", problem.line1_display);
                        println!("red: {}", problem.line2_display);
                    }
                }
            }
        }
    }
}

async fn load_problem(room: &mut InvestigationRoom<LiveCollaborators>) -> anyhow::Result<()> {
    room.load().await;
    match room.state() {
        LoadState::Ready => Ok(()),
        LoadState::Failed(message) => bail!("{message}"),
        LoadState::Loading => bail!("investigation load was interrupted"),
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use lineq_parse::parse_equation;
    use lineq_tutor::{LearningExample, StepId, Submission};
    use pretty_assertions::assert_eq;

    use super::{
        Cli, Command, Input, describe_example, describe_line, read_input, split_point, split_sign,
    };

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn learn_defaults_to_the_first_example() {
        let cli = Cli::try_parse_from(["lineq", "learn"]).expect("arguments should parse");
        match cli.command {
            Command::Learn { example, x } => {
                assert_eq!(example, 1);
                assert_eq!(x, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn example_description_marks_the_crossing() {
        let example = LearningExample::find(2).expect("second example");
        let away = describe_example(&example, Some(0.0));
        assert_eq!(
            away[1..],
            [
                "line1 y = 3x + 1".to_string(),
                "line2 y = x - 3".to_string(),
                "solve 3x + 1 = x - 3".to_string(),
                "scan -7 .. 3".to_string(),
                "x 0 y1 1 y2 -3 gap 4".to_string(),
            ]
        );

        let on = describe_example(&example, Some(-2.0));
        assert_eq!(on.last().map(String::as_str), Some("crossing (-2, -5)"));
        assert_eq!(describe_example(&example, None).len(), 5);
    }

    #[test]
    fn parses_negative_probe_position() {
        let cli = Cli::try_parse_from(["lineq", "probe", "y=x", "y=-x+4", "--x", "-3"])
            .expect("arguments should parse");
        match cli.command {
            Command::Probe { line1, line2, x } => {
                assert_eq!(line1, "y=x");
                assert_eq!(line2, "y=-x+4");
                assert_eq!(x, -3.0);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn serve_overrides_are_optional() {
        let cli = Cli::try_parse_from(["lineq", "serve", "--port", "8080"])
            .expect("arguments should parse");
        assert!(matches!(
            cli.command,
            Command::Serve {
                config: None,
                port: Some(8080)
            }
        ));
    }

    #[test]
    fn describes_a_rising_line() {
        let form = parse_equation("y = 2x - 4").expect("valid equation");
        assert_eq!(
            describe_line(form),
            vec![
                "canonical y = 2x - 4",
                "slope 2",
                "intercept -4",
                "root 2",
                "positive x > 2",
                "negative x < 2",
            ]
        );
    }

    #[test]
    fn describes_a_horizontal_line() {
        let form = parse_equation("y = 3").expect("valid equation");
        let lines = describe_line(form);
        assert_eq!(lines[0], "canonical y = 3");
        assert!(lines[3].starts_with("root none"));
        assert_eq!(lines[4], "constant positive");
    }

    #[test]
    fn points_accept_common_notations() {
        let expected = Some(("4".to_string(), "-2".to_string()));
        assert_eq!(split_point("4,-2"), expected);
        assert_eq!(split_point("(4, -2)"), expected);
        assert_eq!(split_point("4 -2"), expected);
        assert_eq!(split_point("4"), None);
        assert_eq!(split_point("1,2,3"), None);
    }

    #[test]
    fn sign_answers_accept_optional_variable() {
        let expected = Some((">".to_string(), "2".to_string()));
        assert_eq!(split_sign("x > 2"), expected);
        assert_eq!(split_sign(">2"), expected);
        assert_eq!(split_sign(" X>  2 "), expected);
        assert_eq!(split_sign("< -1"), Some(("<".to_string(), "-1".to_string())));
        assert_eq!(split_sign("x = 2"), None);
        assert_eq!(split_sign(">"), None);
    }

    #[test]
    fn input_is_routed_by_step() {
        assert_eq!(read_input(StepId::Slope, " quit "), Input::Quit);
        assert_eq!(read_input(StepId::Slope, "restart"), Input::Restart);
        assert_eq!(
            read_input(StepId::Equation, "? what is b"),
            Input::Ask("what is b".into())
        );
        assert_eq!(
            read_input(StepId::Equation, "y = x - 2"),
            Input::Answer(Submission::Equation {
                text: "y = x - 2".into()
            })
        );
        assert_eq!(
            read_input(StepId::Intersection, "(4, 2)"),
            Input::Answer(Submission::Intersection {
                x: "4".into(),
                y: "2".into()
            })
        );
        assert_eq!(
            read_input(StepId::Negativity2, "x > 6"),
            Input::Answer(Submission::Negativity2 {
                sign: ">".into(),
                value: "6".into()
            })
        );
        assert_eq!(read_input(StepId::Positivity1, "two"), Input::Unreadable);
    }
}
