use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use pcap_file::pcap::PcapReader;
use pcap_file::DataLink;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tabled::{Table, Tabled};

use framewatch::config::Config;
use framewatch::core::{parse_ethernet_packet, parse_ip_packet};
use framewatch::flow::{Dispatch, StatsRegistry, StreamDispatcher};
use framewatch::protocols::http::{
    DetectionDisposition, HeaderSection, HttpFlowData, HttpInspector, Infractions, SectionOutcome,
    SourceId,
};

#[derive(Parser)]
#[command(name = "framewatch")]
#[command(author, version, about = "HTTP message framing inspector")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify header sections of one flow read as JSON lines
    Replay {
        /// File with one section record per line
        file: PathBuf,

        /// Output format (json, table)
        #[arg(short, long, default_value = "json")]
        format: String,
    },

    /// Run a capture through the stream dispatcher and show peg counts
    Stream {
        /// pcap file (Ethernet or raw IP link type)
        file: PathBuf,
    },

    /// Print the effective configuration
    Config {
        /// Also write it to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// One header section as produced by an external tokenizer
#[derive(Debug, Deserialize)]
struct SectionRecord {
    source: SourceId,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    status: Option<u16>,
    #[serde(default)]
    headers: Vec<(String, String)>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    tcp_close: bool,
    #[serde(default)]
    infractions: Infractions,
    /// Octets of a partial section held by the reassembler
    #[serde(default)]
    buffered: u64,
    /// Octets received but not yet cut into sections
    #[serde(default)]
    visible: u64,
}

impl SectionRecord {
    fn into_section(self) -> HeaderSection {
        let mut section = match (self.source, self.method, self.status) {
            (SourceId::Client, Some(method), _) => HeaderSection::request(&method),
            (SourceId::Server, _, Some(status)) => HeaderSection::response(status),
            (source, _, _) => HeaderSection::new(source),
        };
        for (name, value) in self.headers {
            section = section.with_header(name, value);
        }
        for infraction in self.infractions.iter() {
            section = section.with_infraction(infraction);
        }
        if self.tcp_close {
            section = section.with_tcp_close();
        }
        section.with_text(self.text.into_bytes())
    }
}

/// Table row for replay output
#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Tx")]
    transaction: String,
    #[tabled(rename = "Rule")]
    rule: String,
    #[tabled(rename = "Next")]
    expected: String,
    #[tabled(rename = "Detection")]
    disposition: String,
    #[tabled(rename = "Alerts")]
    alerts: String,
}

impl OutcomeRow {
    fn new(index: usize, outcome: &SectionOutcome) -> Self {
        Self {
            index,
            source: outcome.source.to_string(),
            transaction: outcome
                .transaction
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string()),
            rule: format!("{:?}", outcome.rule),
            expected: outcome.expected.to_string(),
            disposition: match outcome.disposition {
                DetectionDisposition::Ignore => "ignore".to_string(),
                DetectionDisposition::Inspect => "inspect".to_string(),
                DetectionDisposition::Aggregate { body_octets } => format!("aggregate +{}", body_octets),
            },
            alerts: outcome
                .alerts
                .iter()
                .map(|a| format!("{}:{}", a.gid, a.sid))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// Table row for stream pegs
#[derive(Tabled)]
struct PegRow {
    #[tabled(rename = "Module")]
    module: String,
    #[tabled(rename = "Peg")]
    peg: &'static str,
    #[tabled(rename = "Count")]
    count: u64,
}

pub fn run_command(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };

    match cli.command {
        Commands::Replay { file, format } => cmd_replay(config, file, format),
        Commands::Stream { file } => cmd_stream(config, file),
        Commands::Config { output } => cmd_config(config, output),
    }
}

fn cmd_replay(config: Config, file: PathBuf, format: String) -> Result<()> {
    let reader = BufReader::new(
        File::open(&file).with_context(|| format!("Failed to open {}", file.display()))?,
    );

    let inspector = HttpInspector::new(config.inspect);
    let mut flow = HttpFlowData::new();
    let mut outcomes = Vec::new();

    for (lineno, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", file.display()))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let record: SectionRecord = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: invalid section record", file.display(), lineno + 1))?;
        flow.set_buffered(record.source, record.buffered, record.visible);
        let section = record.into_section();
        outcomes.push(inspector.process_header(&mut flow, &section));
    }

    match format.as_str() {
        "json" => {
            for outcome in &outcomes {
                println!("{}", serde_json::to_string(outcome)?);
            }
        }
        "table" => {
            let rows: Vec<OutcomeRow> = outcomes
                .iter()
                .enumerate()
                .map(|(i, o)| OutcomeRow::new(i + 1, o))
                .collect();
            println!("{}", Table::new(rows));

            let alerts: usize = outcomes.iter().map(|o| o.alerts.len()).sum();
            let summary = format!("{} sections, {} alerts", outcomes.len(), alerts);
            if alerts > 0 {
                println!("{}", summary.yellow().bold());
            } else {
                println!("{}", summary.green().bold());
            }
        }
        other => bail!("Unknown output format: {}", other),
    }

    Ok(())
}

fn cmd_stream(config: Config, file: PathBuf) -> Result<()> {
    let reader = BufReader::new(
        File::open(&file).with_context(|| format!("Failed to open {}", file.display()))?,
    );
    let mut pcap_reader = PcapReader::new(reader)
        .with_context(|| format!("Failed to read pcap header: {}", file.display()))?;
    let raw_ip = matches!(
        pcap_reader.header().datalink,
        DataLink::RAW | DataLink::IPV4 | DataLink::IPV6
    );

    let registry = StatsRegistry::new();
    let mut dispatcher = StreamDispatcher::new(&config.stream);
    let start = Instant::now();
    let mut first_ts: Option<Duration> = None;
    let mut packet_id = 0u64;

    while let Some(packet) = pcap_reader.next_packet() {
        let packet = packet.with_context(|| format!("Failed to read packet from {}", file.display()))?;
        packet_id += 1;

        let mut pkt = if raw_ip {
            parse_ip_packet(&packet.data, packet_id)
        } else {
            parse_ethernet_packet(&packet.data, packet_id)
        };
        let base = *first_ts.get_or_insert(packet.timestamp);
        pkt.timestamp = start + packet.timestamp.saturating_sub(base);

        if let Dispatch::Http { flow, source } = dispatcher.eval(&mut pkt) {
            tracing::trace!(
                "Packet {} on HTTP flow, {} expects {}",
                packet_id,
                source,
                flow.expected(source)
            );
        }

        if packet_id % 4096 == 0 {
            dispatcher.prune_expired(pkt.timestamp);
        }
    }

    dispatcher.shutdown();
    registry.merge(&dispatcher.stats());
    dispatcher.reset_stats();

    let totals = registry.snapshot();
    totals.show();

    let mut rows: Vec<PegRow> = totals
        .base
        .pegs()
        .into_iter()
        .map(|(peg, count)| PegRow {
            module: "stream".to_string(),
            peg,
            count,
        })
        .collect();
    for (proto, stats) in totals.sessions() {
        rows.extend(stats.pegs().into_iter().map(|(peg, count)| PegRow {
            module: format!("stream_{}", proto),
            peg,
            count,
        }));
    }

    println!("{}", Table::new(rows));
    println!(
        "{} {} packets from {}",
        "Processed".green().bold(),
        packet_id,
        file.display()
    );

    Ok(())
}

fn cmd_config(config: Config, output: Option<PathBuf>) -> Result<()> {
    println!("{}", toml::to_string_pretty(&config)?);

    if let Some(path) = output {
        config.save(&path)?;
        println!("{} {}", "Wrote".green().bold(), path.display());
    }

    Ok(())
}
