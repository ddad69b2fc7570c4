//! SubRip parsing and active-line lookup.
//!
//! An entry is a sequence-number line, a `HH:MM:SS,mmm --> HH:MM:SS,mmm`
//! line and zero or more text lines joined with a single space. Entries are
//! separated by blank lines. Malformed entries are dropped and parsing moves
//! on to the next block.

use crate::error::ParseIssue;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;
use tracing::{debug, warn};
use ts_rs::TS;

static TIME_RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+):(\d{1,2}):(\d{1,2})[,.](\d{1,3})\s*-->\s*(\d+):(\d{1,2}):(\d{1,2})[,.](\d{1,3})")
        .expect("valid subtitle time regex")
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SubtitleLine {
    pub id: u32,
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
}

impl SubtitleLine {
    pub fn contains(&self, t: f64) -> bool {
        self.start_time <= t && t < self.end_time
    }
}

/// Parse SubRip text. Bad entries are logged and skipped.
pub fn parse(raw: &str) -> Vec<SubtitleLine> {
    let (lines, issues) = parse_with_issues(raw);
    for issue in &issues {
        warn!(entry = issue.entry, reason = %issue.reason, "Dropped subtitle entry");
    }
    debug!(
        lines = lines.len(),
        dropped = issues.len(),
        "Parsed subtitle timeline"
    );
    lines
}

/// Parse SubRip text, also returning the entries that were dropped.
pub fn parse_with_issues(raw: &str) -> (Vec<SubtitleLine>, Vec<ParseIssue>) {
    let mut lines = Vec::new();
    let mut issues = Vec::new();
    let mut block: Vec<&str> = Vec::new();
    let mut ordinal = 0usize;

    for line in raw.trim().lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            if !block.is_empty() {
                ordinal += 1;
                match parse_block(&block, ordinal) {
                    Ok(entry) => lines.push(entry),
                    Err(issue) => issues.push(issue),
                }
                block.clear();
            }
            continue;
        }
        block.push(line);
    }

    if !block.is_empty() {
        ordinal += 1;
        match parse_block(&block, ordinal) {
            // A trailing entry only counts once it has text, even when a
            // blank line followed it, since the input is trimmed first.
            Ok(entry) if entry.text.is_empty() => issues.push(ParseIssue {
                entry: ordinal,
                reason: "trailing entry has no text".to_string(),
            }),
            Ok(entry) => lines.push(entry),
            Err(issue) => issues.push(issue),
        }
    }

    lines.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
    (lines, issues)
}

fn parse_block(block: &[&str], ordinal: usize) -> Result<SubtitleLine, ParseIssue> {
    let issue = |reason: &str| ParseIssue {
        entry: ordinal,
        reason: reason.to_string(),
    };

    let mut rest = block;
    let id = match rest.first().map(|line| line.trim()) {
        Some(first) if !first.is_empty() && first.chars().all(|c| c.is_ascii_digit()) => {
            rest = &rest[1..];
            first
                .parse::<u32>()
                .map_err(|_| issue("sequence number out of range"))?
        }
        _ => u32::try_from(ordinal).map_err(|_| issue("sequence number out of range"))?,
    };

    let Some((time_line, text_lines)) = rest.split_first() else {
        return Err(issue("missing time range"));
    };
    let (start_time, end_time) = parse_time_range(time_line).ok_or_else(|| {
        issue("unparsable time range")
    })?;
    if end_time <= start_time {
        return Err(issue("end time does not follow start time"));
    }

    let text = text_lines
        .iter()
        .map(|line| line.trim())
        .collect::<Vec<_>>()
        .join(" ");

    Ok(SubtitleLine {
        id,
        start_time,
        end_time,
        text,
    })
}

fn parse_time_range(line: &str) -> Option<(f64, f64)> {
    let caps = TIME_RANGE_RE.captures(line)?;
    let part = |idx: usize| caps.get(idx)?.as_str().parse::<u64>().ok();
    let start = to_seconds(part(1)?, part(2)?, part(3)?, part(4)?)?;
    let end = to_seconds(part(5)?, part(6)?, part(7)?, part(8)?)?;
    Some((start, end))
}

fn to_seconds(h: u64, m: u64, s: u64, ms: u64) -> Option<f64> {
    let whole = h
        .checked_mul(3600)?
        .checked_add(m.checked_mul(60)?)?
        .checked_add(s)?;
    Some(whole as f64 + ms as f64 / 1000.0)
}

pub fn format_srt_time(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

/// Serialize lines back to SubRip text.
pub fn to_srt(lines: &[SubtitleLine]) -> String {
    let mut out = String::new();
    for line in lines {
        let _ = writeln!(out, "{}", line.id);
        let _ = writeln!(
            out,
            "{} --> {}",
            format_srt_time(line.start_time),
            format_srt_time(line.end_time)
        );
        if !line.text.is_empty() {
            let _ = writeln!(out, "{}", line.text);
        }
        out.push('\n');
    }
    out
}

/// First line in order whose interval contains `t`.
pub fn lookup(lines: &[SubtitleLine], t: f64) -> Option<u32> {
    lines.iter().find(|line| line.contains(t)).map(|line| line.id)
}

/// Sorted lines with an O(log n) active-line query.
#[derive(Debug, Clone, Default)]
pub struct SubtitleTimeline {
    lines: Vec<SubtitleLine>,
    // running maximum of end times, used to find the first interval still open at t
    max_end: Vec<f64>,
    by_id: HashMap<u32, usize>,
}

impl SubtitleTimeline {
    pub fn parse(raw: &str) -> Self {
        Self::from_lines(parse(raw))
    }

    pub fn from_lines(mut lines: Vec<SubtitleLine>) -> Self {
        lines.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        let mut max_end = Vec::with_capacity(lines.len());
        let mut running = f64::NEG_INFINITY;
        for line in &lines {
            running = running.max(line.end_time);
            max_end.push(running);
        }
        let mut by_id = HashMap::with_capacity(lines.len());
        for (idx, line) in lines.iter().enumerate() {
            by_id.entry(line.id).or_insert(idx);
        }
        Self {
            lines,
            max_end,
            by_id,
        }
    }

    pub fn lines(&self) -> &[SubtitleLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line(&self, id: u32) -> Option<&SubtitleLine> {
        self.index_of(id).map(|idx| &self.lines[idx])
    }

    pub fn index_of(&self, id: u32) -> Option<usize> {
        self.by_id.get(&id).copied()
    }

    pub fn lookup(&self, t: f64) -> Option<u32> {
        self.lookup_index(t).map(|idx| self.lines[idx].id)
    }

    pub fn lookup_index(&self, t: f64) -> Option<usize> {
        if !t.is_finite() {
            return None;
        }
        let started = self.lines.partition_point(|line| line.start_time <= t);
        let first_open = self.max_end.partition_point(|end| *end <= t);
        (first_open < started).then_some(first_open)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveLineChange {
    pub previous: Option<u32>,
    pub current: Option<u32>,
}

/// Remembers the active line between time updates and reports changes only.
#[derive(Debug, Clone, Default)]
pub struct ActiveLineTracker {
    current: Option<u32>,
}

impl ActiveLineTracker {
    pub fn current(&self) -> Option<u32> {
        self.current
    }

    pub fn update(&mut self, timeline: &SubtitleTimeline, t: f64) -> Option<ActiveLineChange> {
        let next = timeline.lookup(t);
        if next == self.current {
            return None;
        }
        let change = ActiveLineChange {
            previous: self.current,
            current: next,
        };
        self.current = next;
        Some(change)
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "1\n00:00:00,000 --> 00:00:05,000\nA\n\n2\n00:00:05,000 --> 00:00:10,000\nB\n\n3\n00:00:12,000 --> 00:00:15,000\nC\n";

    #[test]
    fn lookup_matches_half_open_intervals() {
        let timeline = SubtitleTimeline::parse(SAMPLE);
        let expected = [
            (0.0, Some(1)),
            (4.9, Some(1)),
            (5.0, Some(2)),
            (6.0, Some(2)),
            (10.0, None),
            (11.0, None),
            (13.0, Some(3)),
            (15.0, None),
            (-1.0, None),
        ];
        for (t, id) in expected {
            assert_eq!(timeline.lookup(t), id, "t = {t}");
            assert_eq!(lookup(timeline.lines(), t), id, "linear t = {t}");
        }
    }

    #[test]
    fn joins_text_lines_and_handles_crlf() {
        let raw = "1\r\n00:01:02,500 --> 00:01:04,250\r\nHello\r\nthere\r\n\r\n";
        let lines = parse(raw);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "Hello there");
        assert_eq!(lines[0].start_time, 62.5);
        assert_eq!(lines[0].end_time, 64.25);
    }

    #[test]
    fn bad_entries_are_dropped_without_stopping() {
        let raw = "1\n00:00:01,000 -> 00:00:02,000\nbroken\n\n2\n00:00:03,000 --> 00:00:04,000\nok\n\n3\n00:00:06,000 --> 00:00:05,000\nbackwards\n";
        let (lines, issues) = parse_with_issues(raw);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].id, 2);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].entry, 1);
    }

    #[test]
    fn oversized_hour_field_drops_only_that_entry() {
        let raw = "1\n9999999999999999:00:00,000 --> 9999999999999999:00:01,000\nbad\n\n2\n00:00:01,000 --> 00:00:02,000\nok\n";
        let (lines, issues) = parse_with_issues(raw);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].id, 2);
        assert_eq!(lines[0].text, "ok");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].entry, 1);
        assert_eq!(issues[0].reason, "unparsable time range");
    }

    #[test]
    fn terminated_trailing_entry_without_text_is_dropped() {
        let raw = "1\n00:00:00,000 --> 00:00:01,000\nbody\n\n2\n00:00:01,000 --> 00:00:02,000\n\n";
        let (lines, issues) = parse_with_issues(raw);
        assert_eq!(lines.len(), 1);
        assert_eq!(issues[0].reason, "trailing entry has no text");
    }

    #[test]
    fn empty_text_entry_is_kept_unless_trailing() {
        let raw = "1\n00:00:00,000 --> 00:00:01,000\n\n2\n00:00:01,000 --> 00:00:02,000\nbody\n\n3\n00:00:02,000 --> 00:00:03,000";
        let timeline = SubtitleTimeline::parse(raw);
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.lookup(0.5), Some(1));
        assert_eq!(timeline.line(1).map(|line| line.text.as_str()), Some(""));
        assert_eq!(timeline.lookup(2.5), None);
    }

    #[test]
    fn trailing_entry_without_blank_line_is_emitted() {
        let lines = parse("7\n00:00:00,000 --> 00:00:01,000\nlast words");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].id, 7);
        assert_eq!(lines[0].text, "last words");
    }

    #[test]
    fn overlapping_lines_use_first_in_order() {
        let lines = vec![
            SubtitleLine {
                id: 1,
                start_time: 0.0,
                end_time: 10.0,
                text: "long".into(),
            },
            SubtitleLine {
                id: 2,
                start_time: 2.0,
                end_time: 3.0,
                text: "short".into(),
            },
            SubtitleLine {
                id: 3,
                start_time: 11.0,
                end_time: 12.0,
                text: "after".into(),
            },
        ];
        let timeline = SubtitleTimeline::from_lines(lines);
        assert_eq!(timeline.lookup(2.5), Some(1));
        assert_eq!(timeline.lookup(10.5), None);
        assert_eq!(timeline.lookup(11.5), Some(3));
    }

    #[test]
    fn nested_short_line_is_found_after_long_one_closes() {
        let lines = vec![
            SubtitleLine {
                id: 1,
                start_time: 0.0,
                end_time: 2.0,
                text: "a".into(),
            },
            SubtitleLine {
                id: 2,
                start_time: 1.0,
                end_time: 8.0,
                text: "b".into(),
            },
            SubtitleLine {
                id: 3,
                start_time: 3.0,
                end_time: 4.0,
                text: "c".into(),
            },
        ];
        let timeline = SubtitleTimeline::from_lines(lines);
        assert_eq!(timeline.lookup(1.5), Some(1));
        assert_eq!(timeline.lookup(3.5), Some(2));
        assert_eq!(timeline.lookup(7.0), Some(2));
    }

    #[test]
    fn serialized_lines_parse_back_identically() {
        let raw = "1\n00:00:01,001 --> 01:02:03,999\nfirst line\n\n2\n01:02:04,000 --> 01:02:05,020\nsecond\n";
        let parsed = parse(raw);
        let reparsed = parse(&to_srt(&parsed));
        let key = |lines: &[SubtitleLine]| {
            lines
                .iter()
                .map(|l| (l.start_time, l.end_time, l.text.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(key(&parsed), key(&reparsed));
        assert_eq!(format_srt_time(3723.999), "01:02:03,999");
    }

    #[test]
    fn tracker_reports_only_changes() {
        let timeline = SubtitleTimeline::parse(SAMPLE);
        let mut tracker = ActiveLineTracker::default();
        assert_eq!(
            tracker.update(&timeline, 1.0),
            Some(ActiveLineChange {
                previous: None,
                current: Some(1)
            })
        );
        assert_eq!(tracker.update(&timeline, 2.0), None);
        assert_eq!(
            tracker.update(&timeline, 10.5),
            Some(ActiveLineChange {
                previous: Some(1),
                current: None
            })
        );
        tracker.reset();
        assert_eq!(tracker.current(), None);
    }
}
