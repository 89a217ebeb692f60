// Copyright (c) 2026 The daemonlib Authors. Licensed under Apache License, Version 2.0.

//! Line formatting: timestamp, level tag, debug-group tag, source-name and
//! qualifier, then the message.

use super::entry::{LogEntry, Qualifier};
use super::source::{GroupMask, NameTable};

#[cfg(windows)]
const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
const LINE_ENDING: &str = "\n";

fn group_tag(group: GroupMask) -> &'static str {
    if group.intersects(GroupMask::PACKET) {
        "packet"
    } else if group.intersects(GroupMask::EVENT) {
        "event"
    } else if group.intersects(GroupMask::OBJECT) {
        "object"
    } else if group.intersects(GroupMask::LIBUSB) {
        "libusb"
    } else {
        "common"
    }
}

/// Formats one complete log line, including the trailing platform line ending.
#[must_use]
pub fn format(entry: &LogEntry, message: &str, names: &NameTable) -> String {
    let secs = entry.timestamp_micros / 1_000_000;
    let micros = entry.timestamp_micros % 1_000_000;
    let source_name = names.resolve(entry.source);

    let qualifier = match entry.qualifier {
        Qualifier::Line(line) => format!("{source_name}:{line}"),
        Qualifier::Function(id) => format!("{source_name}:{}", names.resolve(id)),
    };

    format!(
        "{secs}.{micros:06} [{}] [{}] {qualifier}: {message}{LINE_ENDING}",
        entry.level.tag(),
        group_tag(entry.group),
    )
}
