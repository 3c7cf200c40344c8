use crate::error::RenderError;
use crate::ir::{Connector, ConnectorId, DiagramKind, NodeId, Transition};
use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;

static HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(flowchart|graph)(\s+\w+)?\s*$").unwrap());
static INIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^%%\{\s*init\s*:\s*(\{.*\})\s*\}%%").unwrap());
static FLOW_HINT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)graph\s+(LR|RL|TB|TD|BT)\b|flowchart\b").unwrap());
static SEQUENCE_HINT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)sequenceDiagram").unwrap());
static STATE_HINT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)stateDiagram").unwrap());
// Runs on label-masked text. The inline form (`-- text -->`) is tried before the plain and
// pipe-labelled forms.
static LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"<?(?:(?:--|==|-\.)\s+(?P<inline>[^\s\-=.<>|][^|]*?)\s+(?:-{2,}|={2,}|\.+-)[>ox]?|(?P<plain>-{2,}|={2,}|-\.+-|~{3,})[>ox]?(?:\|(?P<pipe>[^|]*)\|)?)",
    )
    .unwrap()
});
static PARTICIPANT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:create\s+)?(?:participant|actor)\s+(?P<id>[^\s]+)(?:\s+as\s+(?P<alias>.+))?$")
        .unwrap()
});
static MESSAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<from>[^\s\-<>+:]+)\s*(?P<arrow>-->>|->>|--x|-x|--\)|-\)|-->|->)\s*[+-]?\s*(?P<to>[^\s:]+)\s*(?::\s*(?P<text>.*))?$",
    )
    .unwrap()
});
static TRANSITION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<from>\S+?)\s*-+>{1,2}\s*(?P<to>[^\s:]+)").unwrap());
static PIPE_TEXT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\|[^|]*\|").unwrap());
static STATE_DECL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^state\s+(?:"[^"]*"\s+as\s+)?(?P<id>[^\s{]+)"#).unwrap()
});

const STATE_TERMINAL: &str = "[*]";

#[derive(Debug, Clone, Default)]
pub struct ParseOutput {
    pub kind: DiagramKind,
    /// Nodes in declaration order.
    pub nodes: Vec<NodeId>,
    /// Every drawn connector, numbered in document order.
    pub connectors: Vec<Connector>,
    pub init_config: Option<serde_json::Value>,
}

#[derive(Default)]
struct Builder {
    nodes: IndexSet<NodeId>,
    connectors: Vec<Connector>,
}

impl Builder {
    fn node(&mut self, id: &str) {
        if !id.is_empty() {
            self.nodes.insert(id.to_string());
        }
    }

    fn connect(&mut self, from: &str, to: &str, label: Option<String>) {
        if from.is_empty() || to.is_empty() {
            return;
        }
        self.node(from);
        self.node(to);
        self.connectors.push(Connector {
            id: ConnectorId(self.connectors.len()),
            from: from.to_string(),
            to: to.to_string(),
            label,
        });
    }

    fn finish(self, kind: DiagramKind, init_config: Option<serde_json::Value>) -> ParseOutput {
        ParseOutput {
            kind,
            nodes: self.nodes.into_iter().collect(),
            connectors: self.connectors,
            init_config,
        }
    }
}

pub fn parse_mermaid(input: &str) -> Result<ParseOutput, RenderError> {
    let (lines, init_config) = preprocess_input(input);
    if lines.is_empty() {
        return Err(RenderError::Empty);
    }
    let kind = detect_diagram_kind(input);
    let builder = match kind {
        DiagramKind::Flowchart => parse_flowchart(&lines)?,
        DiagramKind::State => parse_state_diagram(&lines),
        DiagramKind::Sequence => parse_sequence_diagram(&lines),
        DiagramKind::Other => Builder::default(),
    };
    tracing::debug!(
        ?kind,
        nodes = builder.nodes.len(),
        connectors = builder.connectors.len(),
        "parsed diagram"
    );
    Ok(builder.finish(kind, init_config))
}

/// Kind from the first meaningful line, falling back to a scan of the whole text.
pub fn detect_diagram_kind(input: &str) -> DiagramKind {
    let first = input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("%%"))
        .map(strip_trailing_comment)
        .find(|line| !line.is_empty());
    if let Some(line) = first {
        let head = line
            .split(|c: char| c.is_whitespace() || c == ';')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        if head == "sequence" || head == "sequencediagram" {
            return DiagramKind::Sequence;
        }
        if head == "state" || head == "state-diagram" || head.starts_with("statediagram") {
            return DiagramKind::State;
        }
        if head == "graph" || head == "flowchart" {
            return DiagramKind::Flowchart;
        }
    }
    if SEQUENCE_HINT_RE.is_match(input) {
        return DiagramKind::Sequence;
    }
    if STATE_HINT_RE.is_match(input) {
        return DiagramKind::State;
    }
    if FLOW_HINT_RE.is_match(input) {
        return DiagramKind::Flowchart;
    }
    DiagramKind::Other
}

/// State transitions in document order, with transitions into or out of `[*]` left out.
pub fn parse_transitions(input: &str) -> Vec<Transition> {
    let (lines, _) = preprocess_input(input);
    parse_state_diagram(&lines)
        .connectors
        .into_iter()
        .filter(|c| c.from != STATE_TERMINAL && c.to != STATE_TERMINAL)
        .map(|c| Transition {
            from: c.from,
            to: c.to,
            label: c.label,
        })
        .collect()
}

/// Non-empty lines with comments removed, paired with their 1-based line number, plus the
/// payload of the last `%%{init: ...}%%` directive.
fn preprocess_input(input: &str) -> (Vec<(usize, String)>, Option<serde_json::Value>) {
    let mut init_config: Option<serde_json::Value> = None;
    let mut lines = Vec::new();

    for (idx, raw_line) in input.lines().enumerate() {
        let trimmed_line = raw_line.trim();
        if trimmed_line.is_empty() {
            continue;
        }
        if let Some(caps) = INIT_RE.captures(trimmed_line) {
            if let Some(json_str) = caps.get(1).map(|m| m.as_str()) {
                if let Ok(value) = serde_json::from_str::<serde_json::Value>(json_str) {
                    init_config = Some(value);
                } else if let Ok(value) = json5::from_str::<serde_json::Value>(json_str) {
                    init_config = Some(value);
                } else {
                    tracing::debug!(line = idx + 1, "ignoring malformed init directive");
                }
            }
            continue;
        }
        if trimmed_line.starts_with("%%") {
            continue;
        }
        let without_comment = strip_trailing_comment(trimmed_line);
        if without_comment.is_empty() {
            continue;
        }
        lines.push((idx + 1, without_comment));
    }

    (lines, init_config)
}

fn parse_flowchart(lines: &[(usize, String)]) -> Result<Builder, RenderError> {
    let mut builder = Builder::default();

    for (line_no, raw_line) in lines {
        for line in split_statements(raw_line) {
            if HEADER_RE.is_match(&line) || is_flowchart_directive(&line) {
                continue;
            }
            let masked = mask_labels(&line).map_err(|msg| RenderError::parse(*line_no, msg))?;
            add_flowchart_chain(&line, &masked, &mut builder);
        }
    }

    Ok(builder)
}

fn is_flowchart_directive(line: &str) -> bool {
    const KEYWORDS: &[&str] = &[
        "subgraph ",
        "direction ",
        "classDef ",
        "class ",
        "style ",
        "linkStyle ",
        "click ",
        "accTitle",
        "accDescr",
        "title ",
    ];
    line == "end" || line == "subgraph" || KEYWORDS.iter().any(|kw| line.starts_with(kw))
}

/// Registers the nodes and links of one statement such as `A & B --> C -->|x| D`.
fn add_flowchart_chain(line: &str, masked: &str, builder: &mut Builder) {
    let mut segments: Vec<Vec<NodeId>> = Vec::new();
    // label and visibility of the link between segment i and i + 1
    let mut links: Vec<(Option<String>, bool)> = Vec::new();
    let mut cursor = 0;

    for caps in LINK_RE.captures_iter(masked) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        segments.push(node_group(&line[cursor..whole.start()], &masked[cursor..whole.start()]));
        let label = caps
            .name("inline")
            .or_else(|| caps.name("pipe"))
            .map(|m| strip_quotes(&line[m.start()..m.end()]))
            .filter(|label| !label.is_empty());
        let visible = !caps
            .name("plain")
            .is_some_and(|m| m.as_str().starts_with('~'));
        links.push((label, visible));
        cursor = whole.end();
    }
    segments.push(node_group(&line[cursor..], &masked[cursor..]));

    for group in &segments {
        for id in group {
            builder.node(id);
        }
    }
    for (idx, (label, visible)) in links.into_iter().enumerate() {
        if !visible {
            continue;
        }
        for from in &segments[idx] {
            for to in &segments[idx + 1] {
                builder.connect(from, to, label.clone());
            }
        }
    }
}

/// Node ids of an `&`-separated group.
fn node_group(text: &str, masked: &str) -> Vec<NodeId> {
    let mut ids = Vec::new();
    let mut start = 0;
    for (pos, _) in masked.match_indices('&') {
        ids.push(node_id(&text[start..pos]));
        start = pos + 1;
    }
    ids.push(node_id(&text[start..]));
    ids.into_iter().filter(|id| !id.is_empty()).collect()
}

/// Id of a node token with its shape, label and `:::class` suffix removed.
fn node_id(token: &str) -> NodeId {
    let base = token.split(":::").next().unwrap_or_default().trim();
    let end = base
        .find(['[', '(', '{', '>'])
        .unwrap_or(base.len());
    base[..end]
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Copy of `line` with the contents of node shapes and quoted strings blanked out. Byte
/// offsets are preserved.
fn mask_labels(line: &str) -> Result<String, &'static str> {
    let mut out = String::with_capacity(line.len());
    let mut depth = 0usize;
    let mut quote = false;
    let mut prev: Option<char> = None;

    for ch in line.chars() {
        let hidden_before = depth > 0 || quote;
        if quote {
            if ch == '"' {
                quote = false;
            }
        } else {
            match ch {
                '"' => quote = true,
                '[' | '(' | '{' => depth += 1,
                // `id>label]` asymmetric shape
                '>' if depth == 0
                    && prev.is_some_and(|p| p.is_alphanumeric() || p == '_') =>
                {
                    depth += 1
                }
                ']' | ')' | '}' => {
                    depth = depth.checked_sub(1).ok_or("unbalanced closing bracket")?;
                }
                _ => {}
            }
        }
        if hidden_before || depth > 0 || quote {
            out.extend(std::iter::repeat_n('_', ch.len_utf8()));
        } else {
            out.push(ch);
        }
        prev = Some(ch);
    }

    if quote {
        return Err("unterminated string");
    }
    if depth > 0 {
        return Err("unclosed node shape");
    }
    Ok(out)
}

fn parse_state_diagram(lines: &[(usize, String)]) -> Builder {
    let mut builder = Builder::default();
    let mut in_note = false;

    for (_, raw_line) in lines {
        let line = raw_line.trim();
        let lower = line.to_ascii_lowercase();
        if in_note {
            in_note = lower != "end note";
            continue;
        }
        if lower.starts_with("statediagram")
            || lower.starts_with("direction ")
            || lower.starts_with("classdef ")
            || lower.starts_with("class ")
            || line == "}"
            || line == "--"
        {
            continue;
        }
        if lower.starts_with("note ") {
            // single-line notes carry their text after a colon
            in_note = !line.contains(':');
            continue;
        }
        if let Some(caps) = STATE_DECL_RE.captures(line) {
            if let Some(id) = caps.name("id") {
                builder.node(id.as_str());
            }
            continue;
        }

        let (body, label) = match line.split_once(':') {
            Some((body, label)) => (body, Some(label.trim().to_string())),
            None => (line, None),
        };
        let pipe_label = PIPE_TEXT_RE
            .find(body)
            .map(|m| m.as_str().trim_matches('|').trim().to_string());
        let cleaned = PIPE_TEXT_RE.replace_all(body, "");
        if let Some(caps) = TRANSITION_RE.captures(cleaned.trim()) {
            let label = label.or(pipe_label).filter(|label| !label.is_empty());
            builder.connect(&caps["from"], &caps["to"], label);
        } else if label.is_some() {
            // `Id : description`
            builder.node(body.trim());
        }
    }

    builder
}

fn parse_sequence_diagram(lines: &[(usize, String)]) -> Builder {
    let mut builder = Builder::default();

    for (_, raw_line) in lines {
        let line = raw_line.trim();
        let lower = line.to_ascii_lowercase();
        if lower.starts_with("sequencediagram") || lower.starts_with("note ") {
            continue;
        }
        if let Some(caps) = PARTICIPANT_RE.captures(line) {
            builder.node(&caps["id"]);
            continue;
        }
        if let Some(caps) = MESSAGE_RE.captures(line) {
            let label = caps
                .name("text")
                .map(|m| m.as_str().trim().to_string())
                .filter(|text| !text.is_empty());
            builder.connect(&caps["from"], &caps["to"], label);
        }
    }

    builder
}

fn split_statements(line: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;

    for ch in line.chars() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            current.push(ch);
            continue;
        }
        match ch {
            '"' => {
                quote = Some(ch);
                current.push(ch);
            }
            '[' | '(' | '{' => {
                depth += 1;
                current.push(ch);
            }
            ']' | ')' | '}' => {
                if depth > 0 {
                    depth -= 1;
                }
                current.push(ch);
            }
            ';' if depth == 0 => {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    parts.push(trimmed.to_string());
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        parts.push(trimmed.to_string());
    }
    parts
}

fn strip_trailing_comment(line: &str) -> String {
    let mut quote: Option<char> = None;
    let mut chars = line.chars().peekable();
    let mut out = String::new();
    while let Some(ch) = chars.next() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            out.push(ch);
            continue;
        }
        if ch == '"' {
            quote = Some(ch);
            out.push(ch);
            continue;
        }
        if ch == '%' && chars.peek() == Some(&'%') {
            break;
        }
        out.push(ch);
    }
    out.trim().to_string()
}

fn strip_quotes(text: &str) -> String {
    let trimmed = text.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(output: &ParseOutput) -> Vec<(String, String)> {
        output
            .connectors
            .iter()
            .map(|c| (c.from.clone(), c.to.clone()))
            .collect()
    }

    fn pair(from: &str, to: &str) -> (String, String) {
        (from.to_string(), to.to_string())
    }

    #[test]
    fn detects_kinds_from_header_and_heuristics() {
        assert_eq!(detect_diagram_kind("graph LR\nA-->B"), DiagramKind::Flowchart);
        assert_eq!(detect_diagram_kind("%% hi\nflowchart TD"), DiagramKind::Flowchart);
        assert_eq!(detect_diagram_kind("sequenceDiagram\nA->>B: hi"), DiagramKind::Sequence);
        assert_eq!(detect_diagram_kind("stateDiagram-v2\n[*] --> A"), DiagramKind::State);
        assert_eq!(
            detect_diagram_kind("---\ntitle: x\n---\nsequenceDiagram"),
            DiagramKind::Sequence
        );
        assert_eq!(detect_diagram_kind("pie\n\"a\": 1"), DiagramKind::Other);
    }

    #[test]
    fn parse_simple_flowchart() {
        let output = parse_mermaid("flowchart LR\n  A[Start] --> B(Next)\n  B --> C{Done?}").unwrap();
        assert_eq!(output.kind, DiagramKind::Flowchart);
        assert_eq!(output.nodes, vec!["A", "B", "C"]);
        assert_eq!(pairs(&output), vec![pair("A", "B"), pair("B", "C")]);
        assert_eq!(output.connectors[1].id, ConnectorId(1));
    }

    #[test]
    fn chains_and_fan_out_expand_in_order() {
        let output = parse_mermaid("graph TD\nA --> B --> C\nA & B --> D & E").unwrap();
        assert_eq!(
            pairs(&output),
            vec![
                pair("A", "B"),
                pair("B", "C"),
                pair("A", "D"),
                pair("A", "E"),
                pair("B", "D"),
                pair("B", "E"),
            ]
        );
    }

    #[test]
    fn edge_labels_are_captured() {
        let output = parse_mermaid("graph LR\nA -->|yes| B\nB -- maybe --> C\nC == \"bold\" ==> D").unwrap();
        let labels: Vec<Option<&str>> = output
            .connectors
            .iter()
            .map(|c| c.label.as_deref())
            .collect();
        assert_eq!(labels, vec![Some("yes"), Some("maybe"), Some("bold")]);
    }

    #[test]
    fn arrows_inside_labels_are_not_links() {
        let output = parse_mermaid("graph LR\nA[\"a --> b\"] --> B[x -- y]").unwrap();
        assert_eq!(pairs(&output), vec![pair("A", "B")]);
    }

    #[test]
    fn statements_and_link_variants() {
        let output =
            parse_mermaid("graph LR; A-.->B; B==>C; C---D; D--oE; E<-->F; F~~~G").unwrap();
        assert_eq!(
            pairs(&output),
            vec![
                pair("A", "B"),
                pair("B", "C"),
                pair("C", "D"),
                pair("D", "E"),
                pair("E", "F"),
            ]
        );
        assert!(output.nodes.contains(&"G".to_string()));
    }

    #[test]
    fn directives_are_skipped() {
        let input = "flowchart TB\nsubgraph one [First]\nA --> B\nend\nclassDef hot fill:#f00\nclass A hot\nstyle B fill:#0f0\nclick A callback\nB:::hot --> C";
        let output = parse_mermaid(input).unwrap();
        assert_eq!(pairs(&output), vec![pair("A", "B"), pair("B", "C")]);
    }

    #[test]
    fn asymmetric_shapes_strip_to_id() {
        let output = parse_mermaid("graph LR\nA>flag] --> B").unwrap();
        assert_eq!(pairs(&output), vec![pair("A", "B")]);
    }

    #[test]
    fn unbalanced_shape_is_a_parse_error() {
        let err = parse_mermaid("graph LR\nA[open --> B").unwrap_err();
        assert!(matches!(err, RenderError::Parse { line: 2, .. }));
    }

    #[test]
    fn empty_input_is_an_error() {
        assert_eq!(parse_mermaid("  \n%% only a comment\n").unwrap_err(), RenderError::Empty);
    }

    #[test]
    fn init_directive_is_extracted_with_json5_fallback() {
        let output = parse_mermaid("%%{init: {animate: {loop: true}}}%%\ngraph LR\nA-->B").unwrap();
        let init = output.init_config.unwrap();
        assert_eq!(init["animate"]["loop"], serde_json::Value::Bool(true));
    }

    #[test]
    fn malformed_init_directive_is_ignored() {
        let output = parse_mermaid("%%{init: {oops}%%\ngraph LR\nA-->B").unwrap();
        assert!(output.init_config.is_none());
        assert_eq!(output.connectors.len(), 1);
    }

    #[test]
    fn state_transitions_skip_terminal_but_keep_connector() {
        let input = "stateDiagram-v2\n[*] --> Idle\nIdle --> Busy : start\nBusy -->> Idle\nBusy -> Done |finish|\nDone --> [*]";
        let output = parse_mermaid(input).unwrap();
        assert_eq!(output.connectors.len(), 5);

        let transitions = parse_transitions(input);
        let flat: Vec<(&str, &str)> = transitions
            .iter()
            .map(|t| (t.from.as_str(), t.to.as_str()))
            .collect();
        assert_eq!(flat, vec![("Idle", "Busy"), ("Busy", "Idle"), ("Busy", "Done")]);
        assert_eq!(transitions[0].label.as_deref(), Some("start"));
        assert_eq!(transitions[2].label.as_deref(), Some("finish"));
    }

    #[test]
    fn state_notes_and_declarations() {
        let input = "stateDiagram\nstate \"Waiting room\" as W\nnote right of W\n  A --> B\nend note\nW --> X\nX : described";
        let output = parse_mermaid(input).unwrap();
        assert_eq!(pairs(&output), vec![pair("W", "X")]);
        assert_eq!(output.nodes, vec!["W", "X"]);
    }

    #[test]
    fn sequence_messages_in_order() {
        let input = "sequenceDiagram\nparticipant A as Alice\nactor B\nA->>B: hello\nNote right of B: thinks\nB-->>A: hi\nA-x+B: lost\nB--)A: async";
        let output = parse_mermaid(input).unwrap();
        assert_eq!(output.kind, DiagramKind::Sequence);
        assert_eq!(
            pairs(&output),
            vec![pair("A", "B"), pair("B", "A"), pair("A", "B"), pair("B", "A")]
        );
        assert_eq!(output.connectors[0].label.as_deref(), Some("hello"));
        assert_eq!(output.nodes, vec!["A", "B"]);
    }
}
