use std::path::Path;
use std::time::Duration;

use mermaid_animate::config::{AutoplayConfig, Config};
use mermaid_animate::runtime::TimedEvent;
use mermaid_animate::theme::Theme;
use mermaid_animate::{
    AnimateConfig, AutoplayState, ConnectorId, DiagramKind, DiagramProgram, DiagramRenderer, Effect, Event,
    MemoryStage, RenderedDiagram, RootFallback, Runtime, TargetId, TextRenderer, Timeline, plan,
};

const EPS: f64 = 1e-9;

fn fixture(rel: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(rel);
    std::fs::read_to_string(&path).unwrap_or_else(|err| panic!("fixture {rel}: {err}"))
}

fn render_fixture(rel: &str) -> RenderedDiagram<ConnectorId> {
    TextRenderer
        .render(&TargetId::new(rel), &fixture(rel))
        .unwrap_or_else(|err| panic!("{rel}: {err}"))
}

fn plan_fixture(rel: &str, start: Option<&str>) -> Timeline<ConnectorId> {
    let mut program = DiagramProgram::new(TextRenderer, fixture(rel), Config::default());
    let (_, timeline) = program
        .plan(&TargetId::new(rel), start)
        .unwrap_or_else(|err| panic!("{rel}: {err}"));
    timeline
}

fn runtime() -> Runtime<ConnectorId, MemoryStage<ConnectorId>> {
    Runtime::new(MemoryStage::new())
}

fn ids(timeline: &Timeline<ConnectorId>) -> Vec<usize> {
    timeline.instructions.iter().map(|i| i.primitive.0).collect()
}

fn starts(events: &[TimedEvent]) -> Vec<Duration> {
    events
        .iter()
        .filter(|e| matches!(e.event, Event::Started { .. }))
        .map(|e| e.at)
        .collect()
}

#[test]
fn every_fixture_renders_and_plans() {
    let candidates = [
        ("flowchart/diamond.mmd", DiagramKind::Flowchart),
        ("flowchart/labels.mmd", DiagramKind::Flowchart),
        ("flowchart/cycle.mmd", DiagramKind::Flowchart),
        ("sequence/basic.mmd", DiagramKind::Sequence),
        ("state/basic.mmd", DiagramKind::State),
        ("other/pie.mmd", DiagramKind::Other),
    ];
    for (rel, kind) in candidates {
        let rendered = render_fixture(rel);
        assert_eq!(rendered.kind, kind, "{rel}");
        let timeline = plan(&rendered, &AnimateConfig::default(), &Theme::default(), None);
        for instruction in &timeline.instructions {
            assert!(
                rendered.tree.contains(&instruction.primitive),
                "{rel}: {} is not drawn",
                instruction.primitive
            );
        }
    }
}

#[test]
fn diamond_waves_share_offsets() {
    let timeline = plan_fixture("flowchart/diamond.mmd", None);
    assert_eq!(ids(&timeline), vec![0, 1, 2, 3]);
    assert_eq!(timeline.offsets(), vec![0.0, 1.25]);
    assert!((timeline.duration() - 2.25).abs() < EPS);
    assert!(!timeline.looping);
}

#[test]
fn labelled_chains_and_fans_expand() {
    let rendered = render_fixture("flowchart/labels.mmd");
    let pairs: Vec<(&str, &str)> = rendered
        .edges
        .iter()
        .map(|e| (e.from.as_str(), e.to.as_str()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("In", "Parse"),
            ("Parse", "Check"),
            ("Check", "Ok"),
            ("Check", "Err"),
            ("Ok", "Out"),
            ("Err", "Out"),
        ]
    );
    // the invisible link draws nothing
    assert_eq!(rendered.tree.connectors.len(), 6);

    let timeline = plan_fixture("flowchart/labels.mmd", Some("Check"));
    assert_eq!(ids(&timeline), vec![2, 3, 4, 5]);
    assert_eq!(timeline.offsets().len(), 2);
}

#[test]
fn cycle_without_roots_is_empty_unless_falling_back() {
    let rendered = render_fixture("flowchart/cycle.mmd");
    let mut config = AnimateConfig::default();
    assert!(plan(&rendered, &config, &Theme::default(), None).is_empty());

    config.root_fallback = RootFallback::FirstNode;
    let timeline = plan(&rendered, &config, &Theme::default(), None);
    assert_eq!(ids(&timeline), vec![0, 1, 2]);
    assert_eq!(timeline.offsets().len(), 2);
}

#[test]
fn sequence_messages_become_a_looping_tracer() {
    let timeline = plan_fixture("sequence/basic.mmd", None);
    assert_eq!(ids(&timeline), vec![0, 1, 2]);
    assert!(timeline.looping);
    assert_eq!(timeline.markers.len(), 1);
    assert_eq!(timeline.markers[0].color, Theme::default().accent);
    assert!((timeline.duration() - 3.0).abs() < EPS);
}

#[test]
fn state_init_directive_configures_tracers() {
    let timeline = plan_fixture("state/basic.mmd", Some("Paused"));
    let colors: Vec<&str> = timeline.markers.iter().map(|m| m.color.as_str()).collect();
    assert_eq!(colors, vec!["#f00", "#0f0"]);
    // rotated to the first transition leaving `Paused`, terminal transitions left out
    assert_eq!(ids(&timeline), vec![3, 4, 1, 2, 3, 4, 1, 2]);
    assert!(
        timeline
            .instructions
            .iter()
            .all(|i| matches!(i.effect, Effect::Follow { .. }))
    );
    assert!((timeline.duration() - 5.0).abs() < EPS);
}

#[test]
fn autoplay_runs_replays_and_pauses_with_visibility() {
    let target = TargetId::new("diamond");
    let mut runtime = runtime();
    let program = DiagramProgram::new(TextRenderer, fixture("flowchart/diamond.mmd"), Config::default());
    let options = AutoplayConfig {
        seed: Some(7),
        ..AutoplayConfig::default()
    };
    runtime.attach_autoplay(&target, program, options);

    runtime.set_visibility(&target, 0.75);
    let events = runtime.advance(Duration::from_secs(6));
    // start after 1s, 2.25s run, replay 2s later
    assert_eq!(
        starts(&events),
        vec![Duration::from_millis(1000), Duration::from_millis(5250)]
    );
    assert!(runtime.is_playing(&target));
    assert_eq!(runtime.autoplay_state(&target), Some(AutoplayState::Playing));
    let first_wave = runtime.stage().stroke(&target, &ConnectorId(0)).unwrap();
    assert!(first_wave > 0.5 && first_wave < 1.0);
    assert_eq!(runtime.stage().stroke(&target, &ConnectorId(2)), Some(0.0));

    runtime.set_visibility(&target, 0.0);
    assert!(!runtime.is_playing(&target));
    let events = runtime.advance(Duration::from_secs(30));
    assert_eq!(
        events.iter().map(|e| &e.event).collect::<Vec<_>>(),
        vec![&Event::Paused {
            target: target.clone()
        }]
    );

    runtime.dispose(&target);
    runtime.dispose(&target);
    assert_eq!(runtime.sessions(), 0);
}

#[test]
fn restart_from_node_supersedes_the_running_timeline() {
    let target = TargetId::new("labels");
    let mut runtime = runtime();
    let program = DiagramProgram::new(TextRenderer, fixture("flowchart/labels.mmd"), Config::default());
    let first = runtime
        .attach_loop(&target, program, Duration::from_millis(500))
        .unwrap();
    runtime.advance(Duration::from_secs(1));

    let second = runtime.restart_from_node(&target, "Ok").unwrap();
    assert!(second > first);
    assert_eq!(starts(&runtime.take_events()), vec![Duration::from_secs(1)]);
    assert!(!runtime.notify_complete(&target, first));
    let current = runtime.current(&target).unwrap();
    assert_eq!(ids(current), vec![4]);

    // one step, then a restart from `Ok` half a second later
    let events = runtime.advance(Duration::from_millis(1600));
    assert_eq!(starts(&events), vec![Duration::from_millis(2500)]);
    assert_eq!(runtime.current(&target).map(ids), Some(vec![4]));
}

#[test]
fn render_failure_leaves_no_session_behind() {
    let target = TargetId::new("broken");
    let mut runtime = runtime();
    let program = DiagramProgram::new(TextRenderer, "graph TD\nA[oops --> B", Config::default());
    runtime.set_program(&target, program);
    assert!(runtime.run(&target, None).is_err());
    assert_eq!(runtime.sessions(), 0);
}
