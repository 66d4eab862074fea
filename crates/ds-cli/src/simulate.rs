use std::fs;

use serde::Deserialize;

use ds_core::controller::{Controller, RecordingSink};
use ds_core::dom::{FeedDocument, MemoryDocument, NodeSpec};
use ds_core::extract::extract_post_text;
use ds_core::observer::{resolve_observation_root, MutationBatch, RootSource};
use ds_core::scanner::{PostScanner, ScanReport};
use ds_core::timer::{TimerHost, VirtualTimers};
use ds_core::{Classification, ScannerConfig, Settings};

pub struct SimulateOptions {
    pub fixture_path: String,
    pub config_path: Option<String>,
    pub duration: u64,
    pub scroll_step: f64,
    pub scroll_interval: u64,
    pub enabled: bool,
    pub list: bool,
}

/// Feed fixture: the initial page plus posts that arrive later.
#[derive(Debug, Deserialize)]
struct Fixture {
    #[serde(default = "default_viewport_height")]
    viewport_height: f64,
    nodes: Vec<NodeSpec>,
    #[serde(default)]
    arrivals: Vec<Arrival>,
}

/// Nodes appended to the first element matching `parent` at time `at`.
#[derive(Debug, Deserialize)]
struct Arrival {
    at: u64,
    parent: String,
    nodes: Vec<NodeSpec>,
}

fn default_viewport_height() -> f64 {
    900.0
}

enum Event<'a> {
    Arrival(&'a Arrival),
    Scroll,
}

type SimController = Controller<MemoryDocument, VirtualTimers, RecordingSink>;

fn load_fixture(path: &str) -> Result<Fixture, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    serde_json::from_str(&content).map_err(|e| format!("Invalid fixture '{}': {}", path, e))
}

fn load_config(path: Option<&str>) -> Result<ScannerConfig, String> {
    let path = match path {
        Some(path) => path,
        None => return Ok(ScannerConfig::default()),
    };
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    serde_json::from_str(&content).map_err(|e| format!("Invalid config '{}': {}", path, e))
}

fn print_pass(at: u64, report: &ScanReport) {
    println!(
        "  [{:>7}ms] pass: eligible {:>3}, hidden {:>3}, clean {:>3}, remaining {:>3}",
        at, report.eligible, report.hidden, report.clean, report.remaining
    );
}

/// Fire every timer due up to `target`, printing each pass.
fn step_to(ctl: &mut SimController, target: u64) -> usize {
    let mut passes = 0;
    while let Some(slot) = ctl.timers_mut().pop_due(target) {
        let at = ctl.timers().now_ms();
        if let Some(report) = ctl.on_timer(slot) {
            print_pass(at, &report);
            passes += 1;
        }
    }
    ctl.timers_mut().set_now(target);
    passes
}

fn schedule<'a>(fixture: &'a Fixture, opts: &SimulateOptions) -> Vec<(u64, Event<'a>)> {
    let mut events: Vec<(u64, Event<'a>)> = fixture
        .arrivals
        .iter()
        .filter(|arrival| arrival.at <= opts.duration)
        .map(|arrival| (arrival.at, Event::Arrival(arrival)))
        .collect();

    if opts.scroll_step > 0.0 && opts.scroll_interval > 0 {
        let mut at = opts.scroll_interval;
        while at <= opts.duration {
            events.push((at, Event::Scroll));
            at += opts.scroll_interval;
        }
    }

    // Stable: arrivals before scrolls at the same instant.
    events.sort_by_key(|(at, _)| *at);
    events
}

pub fn run_simulate(opts: SimulateOptions) -> Result<(), String> {
    let fixture = load_fixture(&opts.fixture_path)?;
    let config = load_config(opts.config_path.as_deref())?;

    let doc = MemoryDocument::from_specs(fixture.viewport_height, fixture.nodes.clone());
    let mut ctl = Controller::new(
        config,
        Settings { enabled: opts.enabled },
        doc,
        VirtualTimers::new(),
        RecordingSink::default(),
    )
    .map_err(|e| format!("Invalid config: {}", e))?;

    let root = resolve_observation_root(ctl.document(), ctl.config())
        .ok_or_else(|| "Fixture has no body".to_string())?;
    let root_name = match &root.source {
        RootSource::Container(selector) => selector.clone(),
        RootSource::Body => "body".to_string(),
    };

    println!("Simulating '{}' for {}ms", opts.fixture_path, opts.duration);
    println!("  Observing:   {}", root_name);
    println!("  Page height: {:.0}px (viewport {:.0}px)", ctl.document().page_height(), fixture.viewport_height);
    println!();

    let mut passes = 0;
    if let Some(report) = ctl.start() {
        print_pass(0, &report);
        passes += 1;
    }

    for (at, event) in schedule(&fixture, &opts) {
        passes += step_to(&mut ctl, at);
        match event {
            Event::Arrival(arrival) => {
                let parent = ctl
                    .document()
                    .query_first(&arrival.parent)
                    .ok_or_else(|| format!("Arrival at {}ms: no element matches '{}'", arrival.at, arrival.parent))?;
                for node in &arrival.nodes {
                    ctl.document_mut().append(parent, node.clone());
                }
                // Only mutations under the observed root are seen.
                let doc = ctl.document();
                if parent == root.element || doc.is_ancestor(&root.element, &parent) {
                    ctl.on_mutations(MutationBatch {
                        records: 1,
                        added_elements: arrival.nodes.len(),
                    });
                }
            }
            Event::Scroll => {
                let doc = ctl.document_mut();
                let max_scroll = (doc.page_height() - doc.viewport_height()).max(0.0);
                let next = (doc.scroll_y() + opts.scroll_step).min(max_scroll);
                if next > doc.scroll_y() {
                    doc.scroll_to(next);
                    ctl.on_scroll();
                }
            }
        }
    }
    passes += step_to(&mut ctl, opts.duration);

    print_summary(&ctl, passes, opts.list);
    Ok(())
}

fn print_summary(ctl: &SimController, passes: usize, list: bool) {
    let scanner = PostScanner::new(ctl.config());
    let doc = ctl.document();
    let posts = scanner.candidates(doc);

    let mut hidden = 0;
    let mut clean = 0;
    for post in &posts {
        match scanner.classification(doc, post) {
            Some(Classification::Hidden) => hidden += 1,
            Some(Classification::Clean) => clean += 1,
            None => {}
        }
    }

    println!();
    println!("Summary");
    println!("  Passes:        {}", passes);
    println!("  Posts:         {}", posts.len());
    println!("  Hidden:        {}", hidden);
    println!("  Clean:         {}", clean);
    println!("  Unclassified:  {}", posts.len() - hidden - clean);
    println!("  Hidden count:  {}", ctl.hidden_count());
    println!("  Badge updates: {}", ctl.sink().updates.len());

    if list {
        println!();
        for post in &posts {
            let status = scanner
                .classification(doc, post)
                .map_or("-", Classification::as_str);
            let text = extract_post_text(doc, post, &ctl.config().content_selectors);
            println!("  {:<7} {}", status, snippet(&text, 70));
        }
    }
}

fn snippet(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let mut out: String = collapsed.chars().take(max_chars).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_parse() {
        let fixture: Fixture = serde_json::from_str(
            r#"{
                "nodes": [{"tag": "main", "children": [{"classes": ["occludable-update"], "text": "hi"}]}],
                "arrivals": [{"at": 1500, "parent": "main", "nodes": [{"classes": ["occludable-update"]}]}]
            }"#,
        )
        .unwrap();
        assert_eq!(fixture.viewport_height, 900.0);
        assert_eq!(fixture.arrivals[0].at, 1500);
        assert_eq!(fixture.nodes[0].children.len(), 1);
    }

    #[test]
    fn test_schedule_orders_events() {
        let fixture: Fixture = serde_json::from_str(
            r#"{"nodes": [], "arrivals": [{"at": 2500, "parent": "main", "nodes": []}, {"at": 9000, "parent": "main", "nodes": []}]}"#,
        )
        .unwrap();
        let opts = SimulateOptions {
            fixture_path: String::new(),
            config_path: None,
            duration: 5000,
            scroll_step: 100.0,
            scroll_interval: 2000,
            enabled: true,
            list: false,
        };
        let times: Vec<u64> = schedule(&fixture, &opts).iter().map(|(at, _)| *at).collect();
        assert_eq!(times, vec![2000, 2500, 4000]);
    }

    #[test]
    fn test_snippet() {
        assert_eq!(snippet("  a\n b  ", 10), "a b");
        assert_eq!(snippet("abcdef", 3), "abc…");
    }
}
