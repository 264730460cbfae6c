//! Command output extraction from interactive session transcripts
//!
//! A jlogin transcript interleaves the login banner, prompts with echoed
//! commands, and the replies. Output is captured between a
//! `<host>> show ...` (or `request ...`) echo and the next prompt for the
//! same host. Prompt lines themselves are never part of the output.

use crate::config::UnresolvedHostname;
use once_cell::sync::Lazy;
use regex::Regex;

static PROMPT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[^@\s<>]+@)?(?P<host>[^@\s<>]+)[>#] ?(?P<command>.*)$").expect("prompt regex")
});

static PROMPT_HOSTNAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)@([^>\s]+)> (?:show|request)\b").expect("prompt hostname regex")
});

static VERSION_HOSTNAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*Hostname: (\S+)").expect("version hostname regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractState {
    Outside,
    Capturing,
}

/// Line-at-a-time capture state machine for one device
#[derive(Debug)]
pub struct OutputExtractor<'h> {
    hostname: &'h str,
    state: ExtractState,
    output: String,
    blocks: usize,
}

impl<'h> OutputExtractor<'h> {
    pub fn new(hostname: &'h str) -> Self {
        Self {
            hostname,
            state: ExtractState::Outside,
            output: String::new(),
            blocks: 0,
        }
    }

    pub fn feed_line(&mut self, line: &str) {
        let line = line.trim_end_matches('\r');

        match self.prompt_command(line) {
            Some(command) => {
                if is_capture_command(command) {
                    self.state = ExtractState::Capturing;
                    self.blocks += 1;
                } else {
                    self.state = ExtractState::Outside;
                }
            }
            None if self.state == ExtractState::Capturing => {
                self.output.push_str(line);
                self.output.push('\n');
            }
            None => {}
        }
    }

    pub fn feed(&mut self, transcript: &str) {
        for line in transcript.lines() {
            self.feed_line(line);
        }
    }

    pub fn state(&self) -> ExtractState {
        self.state
    }

    /// Number of command echoes seen so far
    pub fn blocks(&self) -> usize {
        self.blocks
    }

    pub fn finish(self) -> String {
        self.output
    }

    /// The command text if `line` is a prompt for this device
    fn prompt_command<'l>(&self, line: &'l str) -> Option<&'l str> {
        let caps = PROMPT.captures(line)?;
        if caps.name("host")?.as_str() != self.hostname {
            return None;
        }
        caps.name("command").map(|m| m.as_str().trim())
    }
}

fn is_capture_command(command: &str) -> bool {
    matches!(
        command.split_whitespace().next(),
        Some("show") | Some("request")
    )
}

/// Hostname announced in the transcript, from a `user@host> show` prompt or
/// from `show version` output.
pub fn resolve_hostname(transcript: &str) -> Option<String> {
    PROMPT_HOSTNAME
        .captures(transcript)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .or_else(|| hostname_from_version(transcript))
}

/// `Hostname: <name>` line of `show version`
pub fn hostname_from_version(output: &str) -> Option<String> {
    VERSION_HOSTNAME
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Output of every captured command block, in transcript order.
///
/// Without a hostname the prompts are matched against the raw address; if
/// that finds nothing, `policy` decides between no output and the whole
/// transcript.
pub fn extract_output(
    transcript: &str,
    hostname: Option<&str>,
    address: &str,
    policy: UnresolvedHostname,
) -> String {
    let run = |host: &str| {
        let mut extractor = OutputExtractor::new(host);
        extractor.feed(transcript);
        extractor.finish()
    };

    match hostname {
        Some(host) => run(host),
        None => {
            let output = run(address);
            if output.is_empty() && policy == UnresolvedHostname::CaptureAll {
                transcript.to_string()
            } else {
                output
            }
        }
    }
}
