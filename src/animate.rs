//! Picks how a rendered diagram is animated and builds its timeline.

use crate::compose::{compose_roots, compose_sequential, compose_tracers, rotate, schedule_from_graph};
use crate::config::{AnimateConfig, Config, Mode, Split, merge_init_config};
use crate::error::AnimateError;
use crate::graph::Graph;
use crate::ir::{DiagramKind, RawEdge, TargetId};
use crate::render::{DiagramRenderer, RenderedDiagram};
use crate::runtime::Program;
use crate::stage::Stage;
use crate::theme::Theme;
use crate::timeline::Timeline;
use crate::waves::decompose;
use std::hash::Hash;
use std::time::Duration;

/// Pause between runs of a looping state diagram driven by [`Runtime::attach_loop`].
///
/// [`Runtime::attach_loop`]: crate::runtime::Runtime::attach_loop
pub const STATE_RESTART_DELAY: Duration = Duration::from_millis(1000);

/// Whether `kind` loops when the config leaves `loop` unset.
pub fn default_looping(kind: DiagramKind) -> bool {
    matches!(kind, DiagramKind::Sequence | DiagramKind::State)
}

/// Timeline for `rendered`. `start` names the node a run begins at; without one, flowcharts
/// start at every root and tracers at the first edge.
#[tracing::instrument(level = "debug", skip_all, fields(target = %rendered.target, kind = ?rendered.kind, start = ?start))]
pub fn plan<P>(
    rendered: &RenderedDiagram<P>,
    config: &AnimateConfig,
    theme: &Theme,
    start: Option<&str>,
) -> Timeline<P>
where
    P: Clone + Hash + Eq,
{
    let looping = config
        .looping
        .unwrap_or_else(|| default_looping(rendered.kind));
    let timing = config.timing();

    let mut timeline = match (rendered.kind, config.mode) {
        (DiagramKind::Flowchart, Mode::Auto | Mode::EdgeDraw) => match config.split {
            Split::Waves => {
                let graph = Graph::build(rendered.edges.iter().cloned());
                match start {
                    Some(start) => schedule_from_graph(&graph, start, &timing),
                    None => {
                        let roots = graph.roots_with(config.root_fallback);
                        compose_roots(&graph, &roots, &timing)
                    }
                }
            }
            Split::Continuous => {
                let offset = start.map_or(0, |start| first_leaving(&rendered.edges, start));
                compose_sequential(&rotate(&primitives(&rendered.edges), offset), &timing)
            }
        },
        (DiagramKind::Flowchart, Mode::Tracer) => {
            let path = match start {
                Some(start) => {
                    let graph = Graph::build(rendered.edges.iter().cloned());
                    decompose(&graph, start).concat()
                }
                None => primitives(&rendered.edges),
            };
            tracer(&path, config, theme)
        }
        (DiagramKind::Sequence, _) => tracer(&primitives(&rendered.edges), config, theme),
        (DiagramKind::State, _) => {
            let offset = start.map_or(0, |start| first_leaving(&rendered.edges, start));
            tracer(&rotate(&primitives(&rendered.edges), offset), config, theme)
        }
        (DiagramKind::Other, _) => Timeline::new(),
    };

    timeline.looping = looping;
    timeline.remove_markers_on_complete = !looping && !timeline.markers.is_empty();
    tracing::debug!(
        instructions = timeline.len(),
        duration = timeline.duration(),
        looping,
        "planned"
    );
    timeline
}

fn tracer<P: Clone>(path: &[P], config: &AnimateConfig, theme: &Theme) -> Timeline<P> {
    let mut tracer = config.tracer.clone();
    tracer.stagger = tracer.stagger.map(|stagger| stagger / config.speed);
    compose_tracers(path, &tracer, config.timing().step, &theme.accent)
}

fn primitives<P: Clone>(edges: &[RawEdge<P>]) -> Vec<P> {
    edges.iter().map(|edge| edge.primitive.clone()).collect()
}

// Index of the first edge leaving `node`, 0 when there is none.
fn first_leaving<P>(edges: &[RawEdge<P>], node: &str) -> isize {
    edges
        .iter()
        .position(|edge| edge.from == node)
        .map_or(0, |index| index as isize)
}

/// Renders `source` and plans it on every run. The rendered connectors are mounted into the
/// stage before the timeline is built, so a fresh run always animates a fresh drawing.
pub struct DiagramProgram<R> {
    renderer: R,
    source: String,
    config: Config,
}

impl<R: DiagramRenderer> DiagramProgram<R> {
    pub fn new(renderer: R, source: impl Into<String>, config: Config) -> Self {
        Self {
            renderer,
            source: source.into(),
            config,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render and plan without a stage.
    pub fn plan(
        &mut self,
        target: &TargetId,
        start: Option<&str>,
    ) -> Result<(RenderedDiagram<R::Primitive>, Timeline<R::Primitive>), AnimateError> {
        let rendered = self.renderer.render(target, &self.source)?;
        let config = match &rendered.init_config {
            Some(init) => merge_init_config(self.config.clone(), init),
            None => self.config.clone(),
        };
        let timeline = plan(&rendered, &config.animate, &config.theme, start);
        Ok((rendered, timeline))
    }
}

impl<R: DiagramRenderer> Program<R::Primitive> for DiagramProgram<R> {
    fn build(
        &mut self,
        target: &TargetId,
        start: Option<&str>,
        stage: &mut dyn Stage<R::Primitive>,
    ) -> Result<Timeline<R::Primitive>, AnimateError> {
        let (rendered, timeline) = self.plan(target, start)?;
        stage.mount(target, rendered.tree.connectors.into_iter().collect());
        Ok(timeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TracerConfig;
    use crate::ease::Ease;
    use crate::graph::RootFallback;
    use crate::ir::ConnectorId;
    use crate::render::TextRenderer;
    use crate::timeline::Effect;

    const EPS: f64 = 1e-9;

    fn render(source: &str) -> RenderedDiagram<ConnectorId> {
        TextRenderer.render(&TargetId::new("t"), source).unwrap()
    }

    fn linear() -> AnimateConfig {
        let mut config = AnimateConfig::default();
        config.draw.step = 1.0;
        config.draw.gap = 0.5;
        config.draw.ease = Ease::Linear;
        config
    }

    fn start_of(timeline: &Timeline<ConnectorId>, id: usize) -> f64 {
        timeline
            .instructions
            .iter()
            .find(|i| i.primitive == ConnectorId(id))
            .map(|i| i.start)
            .unwrap()
    }

    #[test]
    fn flowchart_waves_from_every_root() {
        let rendered = render("graph TD\nA-->B\nA-->C\nB-->D\nC-->D\nX-->Y");
        let tl = plan(&rendered, &linear(), &Theme::light(), None);
        assert_eq!(tl.len(), 5);
        assert_eq!(start_of(&tl, 0), 0.0);
        assert_eq!(start_of(&tl, 4), 0.0);
        assert!((start_of(&tl, 2) - 1.5).abs() < EPS);
        assert!((tl.duration() - 2.5).abs() < EPS);
        assert!(!tl.looping);
        assert!(tl.markers.is_empty());
    }

    #[test]
    fn flowchart_waves_from_start_node() {
        let rendered = render("graph TD\nA-->B\nB-->C");
        let tl = plan(&rendered, &linear(), &Theme::light(), Some("B"));
        assert_eq!(tl.len(), 1);
        assert_eq!(tl.instructions[0].primitive, ConnectorId(1));
    }

    #[test]
    fn cyclic_flowchart_needs_root_fallback() {
        let rendered = render("graph TD\nA-->B\nB-->A");
        assert!(plan(&rendered, &linear(), &Theme::light(), None).is_empty());

        let mut config = linear();
        config.root_fallback = RootFallback::FirstNode;
        assert_eq!(plan(&rendered, &config, &Theme::light(), None).len(), 2);
    }

    #[test]
    fn continuous_split_rotates_to_start() {
        let rendered = render("graph LR\nA-->B\nB-->C\nC-->D");
        let mut config = linear();
        config.split = Split::Continuous;
        let tl = plan(&rendered, &config, &Theme::light(), Some("B"));
        let order: Vec<ConnectorId> = tl.instructions.iter().map(|i| i.primitive).collect();
        assert_eq!(order, vec![ConnectorId(1), ConnectorId(2), ConnectorId(0)]);
    }

    #[test]
    fn speed_scales_timing() {
        let rendered = render("graph LR\nA-->B\nB-->C");
        let mut config = linear();
        config.speed = 2.0;
        let tl = plan(&rendered, &config, &Theme::light(), None);
        assert!((start_of(&tl, 1) - 0.75).abs() < EPS);
    }

    #[test]
    fn flowchart_tracer_cleans_up_when_not_looping() {
        let rendered = render("graph LR\nA-->B\nB-->C");
        let mut config = linear();
        config.mode = Mode::Tracer;
        let tl = plan(&rendered, &config, &Theme::dark(), None);
        assert_eq!(tl.markers.len(), 1);
        assert_eq!(tl.markers[0].color, Theme::dark().accent);
        assert!(tl.remove_markers_on_complete);
        assert!(
            tl.instructions
                .iter()
                .all(|i| matches!(i.effect, Effect::Follow { .. }))
        );

        config.looping = Some(true);
        let tl = plan(&rendered, &config, &Theme::dark(), None);
        assert!(tl.looping);
        assert!(!tl.remove_markers_on_complete);
    }

    #[test]
    fn sequence_loops_a_tracer_by_default() {
        let rendered = render("sequenceDiagram\nAlice->>Bob: hi\nBob-->>Alice: hey");
        let tl = plan(&rendered, &linear(), &Theme::light(), None);
        assert!(tl.looping);
        assert_eq!(tl.markers.len(), 1);
        assert_eq!(tl.len(), 2);
        assert!((tl.duration() - 2.0).abs() < EPS);
    }

    #[test]
    fn state_tracer_rotates_to_start() {
        let rendered = render("stateDiagram-v2\n[*] --> Idle\nIdle --> Busy\nBusy --> Done\nDone --> Idle");
        let mut config = linear();
        config.tracer = TracerConfig {
            count: 2,
            stagger: Some(0.5),
            ..TracerConfig::default()
        };
        config.speed = 2.0;
        let tl = plan(&rendered, &config, &Theme::light(), Some("Busy"));
        assert!(tl.looping);
        let first: Vec<ConnectorId> = tl.instructions.iter().take(3).map(|i| i.primitive).collect();
        assert_eq!(first, vec![ConnectorId(2), ConnectorId(3), ConnectorId(1)]);
        // second marker starts one scaled stagger later
        assert!((tl.instructions[3].start - 0.25).abs() < EPS);
    }

    #[test]
    fn other_kinds_plan_nothing() {
        let rendered = render("pie\n\"a\": 1");
        assert!(plan(&rendered, &linear(), &Theme::light(), None).is_empty());
    }

    #[test]
    fn init_directive_overrides_config() {
        let source = "%%{init: {\"animate\": {\"mode\": \"tracer\", \"loop\": true}}}%%\ngraph LR\nA-->B";
        let mut program = DiagramProgram::new(TextRenderer, source, Config::default());
        let (_, tl) = program.plan(&TargetId::new("t"), None).unwrap();
        assert!(tl.looping);
        assert_eq!(tl.markers.len(), 1);
    }

    #[test]
    fn program_mounts_the_rendered_tree() {
        use crate::stage::MemoryStage;

        let mut stage = MemoryStage::new();
        let target = TargetId::new("t");
        let mut program = DiagramProgram::new(TextRenderer, "graph LR\nA-->B", Config::default());
        let tl = program.build(&target, None, &mut stage).unwrap();
        assert!(stage.contains(&target, &ConnectorId(0)));
        assert_eq!(tl.len(), 1);

        let mut broken = DiagramProgram::new(TextRenderer, "", Config::default());
        assert!(matches!(
            broken.build(&target, None, &mut stage),
            Err(AnimateError::Render(_))
        ));
    }
}
