use crate::animate::{DiagramProgram, STATE_RESTART_DELAY, default_looping};
use crate::config::{Config, Mode, load_config};
use crate::graph::Graph;
use crate::ir::{ConnectorId, DiagramKind, TargetId};
use crate::render::{DiagramRenderer, TextRenderer};
use crate::runtime::{Runtime, TimedEvent};
use crate::stage::MemoryStage;
use crate::timeline_dump::{EventDump, TimelineDump, write_json};
use crate::waves::{decompose, decompose_nodes};
use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "mmda", version, about = "Plan and simulate Mermaid diagram animations")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Config JSON/JSON5 file
    #[arg(short = 'c', long = "configFile", global = true)]
    pub config: Option<PathBuf>,

    /// More log output on stderr (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the BFS waves of a flowchart
    Waves(InputArgs),
    /// Print the planned timeline of each diagram
    Timeline(TimelineArgs),
    /// Run diagrams on a virtual clock and print the event log
    Simulate(SimulateArgs),
}

#[derive(ClapArgs, Debug)]
pub struct InputArgs {
    /// Input file (.mmd or .md) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Node to start from; every root when omitted
    #[arg(short = 's', long = "start")]
    pub start: Option<String>,

    /// Output JSON file. Defaults to stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
pub struct TimelineArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Animation mode, overriding the config
    #[arg(short = 'm', long = "mode", value_enum)]
    pub mode: Option<ModeArg>,

    /// Speed multiplier, overriding the config
    #[arg(long = "speed")]
    pub speed: Option<f64>,
}

#[derive(ClapArgs, Debug)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub timeline: TimelineArgs,

    /// Virtual seconds to simulate
    #[arg(short = 'd', long = "duration", default_value_t = 10.0)]
    pub duration: f64,

    /// Second at which the diagrams scroll into view
    #[arg(long = "visibleAt", default_value_t = 0.0)]
    pub visible_at: f64,

    /// Second at which the diagrams scroll out of view
    #[arg(long = "hiddenAt")]
    pub hidden_at: Option<f64>,

    /// Restart interactively after each completion instead of using autoplay
    #[arg(long = "loopDelay")]
    pub loop_delay: Option<f64>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum ModeArg {
    Auto,
    EdgeDraw,
    Tracer,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Auto => Mode::Auto,
            ModeArg::EdgeDraw => Mode::EdgeDraw,
            ModeArg::Tracer => Mode::Tracer,
        }
    }
}

#[derive(Debug, Serialize)]
struct WavesDump {
    target: String,
    root: String,
    nodes: Vec<Vec<String>>,
    edges: Vec<Vec<String>>,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);
    let base_config = load_config(args.config.as_deref())
        .with_context(|| "failed to load config")?;

    match args.command {
        Command::Waves(input) => run_waves(&input, &base_config),
        Command::Timeline(timeline) => {
            let config = apply_overrides(base_config, &timeline)?;
            run_timeline(&timeline.input, &config)
        }
        Command::Simulate(simulate) => {
            let config = apply_overrides(base_config, &simulate.timeline)?;
            run_simulate(&simulate, &config)
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .try_init();
}

fn apply_overrides(mut config: Config, args: &TimelineArgs) -> Result<Config> {
    if let Some(mode) = args.mode {
        config.animate.mode = mode.into();
    }
    if let Some(speed) = args.speed {
        config.animate.speed = speed;
    }
    config.animate.validate()?;
    Ok(config)
}

fn load_diagrams(input: &InputArgs) -> Result<Vec<String>> {
    let (input, is_markdown) = read_input(input.input.as_deref())?;
    let diagrams = if is_markdown {
        extract_mermaid_blocks(&input)
    } else {
        vec![input]
    };
    if diagrams.is_empty() {
        return Err(anyhow::anyhow!("No Mermaid diagrams found in input"));
    }
    Ok(diagrams)
}

fn diagram_target(idx: usize) -> TargetId {
    TargetId::new(format!("diagram-{}", idx + 1))
}

fn run_waves(input: &InputArgs, config: &Config) -> Result<()> {
    let mut dumps = Vec::new();
    for (idx, diagram) in load_diagrams(input)?.iter().enumerate() {
        let target = diagram_target(idx);
        let rendered = TextRenderer.render(&target, diagram)?;
        if rendered.kind != DiagramKind::Flowchart {
            tracing::warn!(%target, kind = ?rendered.kind, "waves only apply to flowcharts");
            continue;
        }
        let graph = Graph::build(rendered.edges);
        let roots = match &input.start {
            Some(start) => vec![start.clone()],
            None => graph.roots_with(config.animate.root_fallback),
        };
        for root in roots {
            let edges: Vec<Vec<String>> = decompose(&graph, &root)
                .into_iter()
                .map(|wave| wave.iter().map(ConnectorId::to_string).collect())
                .collect();
            dumps.push(WavesDump {
                target: target.to_string(),
                nodes: decompose_nodes(&graph, &root),
                edges,
                root,
            });
        }
    }
    write_json(input.output.as_deref(), &dumps)
}

fn run_timeline(input: &InputArgs, config: &Config) -> Result<()> {
    let mut dumps = Vec::new();
    for (idx, diagram) in load_diagrams(input)?.into_iter().enumerate() {
        let target = diagram_target(idx);
        let mut program = DiagramProgram::new(TextRenderer, diagram, config.clone());
        let (rendered, timeline) = program
            .plan(&target, input.start.as_deref())
            .with_context(|| format!("failed to plan {target}"))?;
        dumps.push(TimelineDump::from_timeline(&target, rendered.kind, &timeline));
    }
    if dumps.len() == 1 {
        return write_json(input.output.as_deref(), &dumps[0]);
    }
    write_json(input.output.as_deref(), &dumps)
}

fn run_simulate(args: &SimulateArgs, config: &Config) -> Result<()> {
    let input = &args.timeline.input;
    if !(args.duration.is_finite() && args.duration >= 0.0) {
        return Err(anyhow::anyhow!("duration must be a non-negative number of seconds"));
    }
    if args.loop_delay.is_some_and(|delay| !(delay.is_finite() && delay >= 0.0)) {
        return Err(anyhow::anyhow!("loopDelay must be a non-negative number of seconds"));
    }

    let mut runtime = Runtime::new(MemoryStage::<ConnectorId>::new());
    let mut targets = Vec::new();
    for (idx, diagram) in load_diagrams(input)?.into_iter().enumerate() {
        let target = diagram_target(idx);
        let kind = crate::parser::detect_diagram_kind(&diagram);
        let program = DiagramProgram::new(TextRenderer, diagram, config.clone());
        let loop_delay = args.loop_delay.map(Duration::from_secs_f64).or_else(|| {
            (kind == DiagramKind::State && input.start.is_some()).then_some(STATE_RESTART_DELAY)
        });
        match loop_delay {
            Some(delay) => {
                runtime.attach_loop(&target, program, delay)?;
                if let Some(start) = input.start.as_deref() {
                    runtime.restart_from_node(&target, start)?;
                }
            }
            None => {
                runtime.attach_autoplay(&target, program, config.animate.autoplay.clone());
            }
        }
        tracing::debug!(%target, ?kind, loops = default_looping(kind), "attached");
        targets.push(target);
    }

    let mut log: Vec<TimedEvent> = runtime.take_events();
    let mut script = vec![(args.visible_at, 1.0)];
    if let Some(hidden_at) = args.hidden_at {
        script.push((hidden_at, 0.0));
    }
    script.retain(|(at, _)| *at <= args.duration);
    script.sort_by(|a, b| a.0.total_cmp(&b.0));

    for (at, ratio) in script {
        let until = Duration::from_secs_f64(at.max(0.0));
        log.extend(runtime.advance(until.saturating_sub(runtime.now())));
        for target in &targets {
            runtime.set_visibility(target, ratio);
        }
    }
    let end = Duration::from_secs_f64(args.duration);
    log.extend(runtime.advance(end.saturating_sub(runtime.now())));

    let dump: Vec<EventDump<'_>> = log.iter().map(EventDump::from).collect();
    write_json(input.output.as_deref(), &dump)
}

fn read_input(path: Option<&Path>) -> Result<(String, bool)> {
    if let Some(path) = path {
        if path == Path::new("-") {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            return Ok((buf, false));
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let is_md = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| matches!(ext, "md" | "markdown"))
            .unwrap_or(false);
        return Ok((content, is_md));
    }

    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok((buf, false))
}

pub fn extract_mermaid_blocks(input: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut in_block = false;
    let mut current = Vec::new();
    let mut fence = String::new();

    for line in input.lines() {
        let trimmed = line.trim();
        if !in_block {
            if let Some(start_fence) = detect_mermaid_fence(trimmed) {
                in_block = true;
                fence = start_fence;
                continue;
            }
        } else if is_fence_end(trimmed, &fence) {
            in_block = false;
            blocks.push(current.join("\n"));
            current.clear();
            continue;
        }

        if in_block {
            current.push(line.to_string());
        }
    }

    blocks
}

fn detect_mermaid_fence(line: &str) -> Option<String> {
    for fence in ["```", "~~~", ":::"] {
        if let Some(rest) = line.strip_prefix(fence) {
            let marker = fence.chars().next().unwrap_or_default();
            if rest.trim_start_matches(marker).trim().starts_with("mermaid") {
                return Some(fence.to_string());
            }
        }
    }
    None
}

fn is_fence_end(line: &str, fence: &str) -> bool {
    match line.strip_prefix(fence) {
        Some(rest) => rest.trim().is_empty(),
        None => false,
    }
}
