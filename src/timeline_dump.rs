use crate::ir::{DiagramKind, TargetId};
use crate::runtime::TimedEvent;
use crate::timeline::{Effect, Timeline};
use serde::Serialize;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineDump {
    pub target: String,
    pub kind: DiagramKind,
    pub duration: f64,
    #[serde(rename = "loop")]
    pub looping: bool,
    pub remove_markers_on_complete: bool,
    pub markers: Vec<MarkerDump>,
    pub instructions: Vec<InstructionDump>,
}

#[derive(Debug, Serialize)]
pub struct MarkerDump {
    pub id: String,
    pub color: String,
    pub radius: f64,
}

#[derive(Debug, Serialize)]
pub struct InstructionDump {
    pub primitive: String,
    pub start: f64,
    pub duration: f64,
    pub ease: String,
    /// Marker id for follow instructions, absent for stroke draws.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
}

impl TimelineDump {
    pub fn from_timeline<P: Display>(target: &TargetId, kind: DiagramKind, timeline: &Timeline<P>) -> Self {
        let markers = timeline
            .markers
            .iter()
            .map(|spec| MarkerDump {
                id: spec.id.to_string(),
                color: spec.color.clone(),
                radius: spec.radius,
            })
            .collect();

        let instructions = timeline
            .instructions
            .iter()
            .map(|instruction| InstructionDump {
                primitive: instruction.primitive.to_string(),
                start: instruction.start,
                duration: instruction.duration,
                ease: instruction.ease.to_string(),
                marker: match instruction.effect {
                    Effect::StrokeDraw => None,
                    Effect::Follow { marker } => Some(marker.to_string()),
                },
            })
            .collect();

        TimelineDump {
            target: target.to_string(),
            kind,
            duration: timeline.duration(),
            looping: timeline.looping,
            remove_markers_on_complete: timeline.remove_markers_on_complete,
            markers,
            instructions,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EventDump<'a> {
    /// Seconds on the virtual clock.
    pub at: f64,
    #[serde(flatten)]
    pub event: &'a crate::runtime::Event,
}

impl<'a> From<&'a TimedEvent> for EventDump<'a> {
    fn from(timed: &'a TimedEvent) -> Self {
        EventDump {
            at: timed.at.as_secs_f64(),
            event: &timed.event,
        }
    }
}

/// Pretty JSON to `path`, or to stdout when no path is given.
pub fn write_json<T: Serialize>(path: Option<&Path>, value: &T) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            let file = File::create(path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, value)?;
            writeln!(writer)?;
            writer.flush()?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            serde_json::to_writer_pretty(&mut writer, value)?;
            writeln!(writer)?;
            writer.flush()?;
        }
    }
    Ok(())
}

pub fn write_timeline_dump<P: Display>(
    path: Option<&Path>,
    target: &TargetId,
    kind: DiagramKind,
    timeline: &Timeline<P>,
) -> anyhow::Result<()> {
    write_json(path, &TimelineDump::from_timeline(target, kind, timeline))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::compose_tracers;
    use crate::config::TracerConfig;
    use crate::ir::ConnectorId;

    #[test]
    fn dump_names_primitives_and_markers() {
        let tl = compose_tracers(
            &[ConnectorId(0), ConnectorId(1)],
            &TracerConfig::default(),
            1.0,
            "#1b74e4",
        );
        let dump = TimelineDump::from_timeline(&TargetId::new("d"), DiagramKind::Sequence, &tl);
        let json = serde_json::to_value(&dump).unwrap();
        assert_eq!(json["kind"], "sequence");
        assert_eq!(json["duration"], 2.0);
        assert_eq!(json["markers"][0]["id"], "marker-0");
        assert_eq!(json["instructions"][1]["primitive"], "L1");
        assert_eq!(json["instructions"][1]["marker"], "marker-0");
        assert_eq!(json["instructions"][0]["ease"], "power1.inOut");
    }
}
