// Copyright (c) 2026 The daemonlib Authors. Licensed under Apache License, Version 2.0.

//! The `log.debug_filter` grammar and its application to a [`super::source::LogSource`]
//! in fixed precedence order: per-line rule, then group rule, then the source's own
//! compile-time/default level.

use super::source::GroupMask;
use std::fmt;

/// One parsed `+`/`-name[:line]` rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub include: bool,
    pub name: String,
    pub line: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError(pub String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid debug filter rule: {}", self.0)
    }
}

impl std::error::Error for ParseError {}

fn group_keyword(name: &str) -> Option<GroupMask> {
    match name {
        "common" => Some(GroupMask::COMMON),
        "event" => Some(GroupMask::EVENT),
        "packet" => Some(GroupMask::PACKET),
        "object" => Some(GroupMask::OBJECT),
        "libusb" => Some(GroupMask::LIBUSB),
        "all" => Some(GroupMask::all_groups()),
        _ => None,
    }
}

/// Parses a full filter string: `rule ("," rule)*`.
pub fn parse(filter: &str) -> Result<Vec<Rule>, ParseError> {
    filter.split(',').map(parse_rule).collect()
}

fn parse_rule(raw: &str) -> Result<Rule, ParseError> {
    let raw = raw.trim();
    let mut chars = raw.chars();
    let include = match chars.next() {
        Some('+') => true,
        Some('-') => false,
        _ => return Err(ParseError(format!("rule must start with + or -: {raw:?}"))),
    };
    let rest = chars.as_str();

    let (name, line) = match rest.split_once(':') {
        Some((name, line_str)) => {
            let line: u32 = line_str
                .parse()
                .map_err(|_| ParseError(format!("bad line number in {raw:?}")))?;
            if !(1..=99_999).contains(&line) {
                return Err(ParseError(format!("line number out of range in {raw:?}")));
            }
            (name, Some(line))
        }
        None => (rest, None),
    };

    if name.is_empty() || name.len() > 64 {
        return Err(ParseError(format!("name length out of range in {raw:?}")));
    }

    Ok(Rule {
        include,
        name: name.to_ascii_lowercase(),
        line,
    })
}

/// Applies `rules` in order to `source`, matching only rules whose `name` equals this
/// source's basename or a recognized group keyword. `source_basename` must already be
/// lowercased (the interner canonicalizes at intern time).
///
/// Returns the new filter version to stamp onto the source.
pub fn apply_to_source(
    rules: &[Rule],
    source_basename: &str,
    source: &super::source::LogSource,
    new_version: u64,
) {
    for rule in rules {
        if let Some(group) = group_keyword(&rule.name) {
            match rule.line {
                // `spec.md` §8 S2 ("+packet:137" flips line 137 specifically) takes
                // precedence over §4.5 rule 3's "rejected with a warning" text for
                // this case; see `LogSource::adjust_group_at_line`.
                Some(line) => source.adjust_group_at_line(group, rule.include, line, new_version),
                None => source.adjust_group(group, rule.include, new_version),
            }
            continue;
        }

        if rule.name != source_basename {
            continue;
        }

        let mask = if rule.include {
            GroupMask::all_groups()
        } else {
            GroupMask::empty()
        };

        match rule.line {
            None => source.set_group_mask(mask, new_version),
            Some(line) => source.set_per_line(line, mask, new_version),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::source::{LogSource, NameId};
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_basic_rules() {
        let rules = parse("+all,-packet,+event:137").unwrap();
        assert_eq!(
            rules,
            vec![
                Rule { include: true, name: "all".into(), line: None },
                Rule { include: false, name: "packet".into(), line: None },
                Rule { include: true, name: "event".into(), line: Some(137) },
            ]
        );
    }

    #[test]
    fn rejects_malformed_rule() {
        assert!(parse("all").is_err());
        assert!(parse("+foo:0").is_err());
        assert!(parse("+foo:100000").is_err());
    }

    /// A later, more specific rule must win over an earlier, broader one.
    #[test]
    fn filter_precedence_scenario() {
        let rules = parse("+all,-packet,+packet:137").unwrap();
        let source = LogSource::new(NameId::from_raw(0));
        apply_to_source(&rules, "foo.c", &source, 1);

        assert!(source.group_included(GroupMask::PACKET, 137));
        assert!(!source.group_included(GroupMask::PACKET, 138));
        assert!(source.group_included(GroupMask::EVENT, 9999));
    }
}
