//! Uptime text -> seconds
//!
//! Routers print connection uptime in whatever locale their firmware ships
//! with: `"1 сут 2 ч 3 мин 4 сек"`, `"1 day 2 h 3 min 4 s"` or a clock-style
//! `"2 days, 26:03:04"`. Text with nothing recognisable parses to 0, which
//! the detector treats like any other reading (a blank uptime after a link
//! loss therefore reads as a reset).

use regex::Regex;
use std::sync::LazyLock;

const DAY: u64 = 86_400;
const HOUR: u64 = 3_600;
const MINUTE: u64 = 60;

static CLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+):(\d{1,2})(?::(\d{1,2}))?").expect("valid clock regex"));

static COMPONENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*(\p{L}+)").expect("valid component regex"));

#[derive(Clone, Copy, PartialEq, Eq)]
enum Unit {
    Day,
    Hour,
    Minute,
    Second,
}

impl Unit {
    fn classify(word: &str) -> Option<Unit> {
        let word = word.to_lowercase();
        let w = word.as_str();
        if w.starts_with("сут") || w.starts_with('д') || w.starts_with("day") || w == "d" {
            Some(Unit::Day)
        } else if w.starts_with('ч') || w.starts_with('h') {
            Some(Unit::Hour)
        } else if w.starts_with("мин") || w.starts_with("min") || w == "m" {
            Some(Unit::Minute)
        } else if w.starts_with('с') || w.starts_with("sec") || w == "s" {
            Some(Unit::Second)
        } else {
            None
        }
    }

    fn seconds(self) -> u64 {
        match self {
            Unit::Day => DAY,
            Unit::Hour => HOUR,
            Unit::Minute => MINUTE,
            Unit::Second => 1,
        }
    }
}

/// Parse an uptime string into seconds, 0 when nothing matches
pub fn parse_uptime(text: &str) -> u64 {
    let mut total = 0u64;
    let mut rest = text.to_string();

    if let Some(caps) = CLOCK.captures(text) {
        let num = |i: usize| {
            caps.get(i)
                .and_then(|m| m.as_str().parse::<u64>().ok())
                .unwrap_or(0)
        };
        total = num(1)
            .saturating_mul(HOUR)
            .saturating_add(num(2).saturating_mul(MINUTE))
            .saturating_add(num(3));
        if let Some(m) = caps.get(0) {
            rest.replace_range(m.range(), " ");
        }
    }

    // First occurrence of each unit wins
    let mut seen: Vec<Unit> = Vec::new();
    for caps in COMPONENT.captures_iter(&rest) {
        let Some(unit) = Unit::classify(&caps[2]) else {
            continue;
        };
        if seen.contains(&unit) {
            continue;
        }
        seen.push(unit);
        if let Ok(value) = caps[1].parse::<u64>() {
            total = total.saturating_add(value.saturating_mul(unit.seconds()));
        }
    }

    total
}
