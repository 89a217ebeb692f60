// Copyright (c) 2026 The daemonlib Authors. Licensed under Apache License, Version 2.0.

//! `LogEntry`: the fixed-size header written to the FIFO ahead of each message, in
//! two writes — the header, then the NUL-terminated message bytes. The source name
//! travels as an interned [`NameId`] rather than the message bytes themselves,
//! which is what keeps this header fixed-size and `Copy` — the forward thread
//! resolves the id back to a string only once, at format time, via the shared
//! [`super::source::NameTable`].

use super::source::{GroupMask, NameId};

pub const ENTRY_LEN: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

impl Level {
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
        }
    }

    fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Level::Error),
            1 => Some(Level::Warn),
            2 => Some(Level::Info),
            3 => Some(Level::Debug),
            _ => None,
        }
    }
}

/// Where in the source the call site identifies itself, per §4.5's "source-name and
/// (line or function) qualifier". A function name is interned the same way a source
/// name is, so the qualifier stays a fixed-width `(tag, NameId-or-line-number)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qualifier {
    Line(u32),
    Function(NameId),
}

/// Fixed-size, `Copy` header preceding each message in the logger's FIFO transport.
#[derive(Debug, Clone, Copy)]
pub struct LogEntry {
    pub level: Level,
    pub group: GroupMask,
    pub source: NameId,
    pub qualifier: Qualifier,
    pub timestamp_micros: u64,
    pub message_len: u32,
}

impl LogEntry {
    #[must_use]
    pub fn new(
        level: Level,
        group: GroupMask,
        source: NameId,
        qualifier: Qualifier,
        timestamp_micros: u64,
        message_len: u32,
    ) -> Self {
        Self {
            level,
            group,
            source,
            qualifier,
            timestamp_micros,
            message_len,
        }
    }

    /// Serializes the header into exactly [`ENTRY_LEN`] bytes.
    #[must_use]
    pub fn encode(&self) -> [u8; ENTRY_LEN] {
        let mut buf = [0u8; ENTRY_LEN];
        buf[0] = self.level as u8;
        buf[1] = self.group.raw();
        buf[2..6].copy_from_slice(&(self.source.raw() as u32).to_le_bytes());
        let (qtag, qval) = match self.qualifier {
            Qualifier::Line(n) => (0u8, n),
            Qualifier::Function(id) => (1u8, id.raw() as u32),
        };
        buf[6] = qtag;
        buf[7..11].copy_from_slice(&qval.to_le_bytes());
        buf[11..19].copy_from_slice(&self.timestamp_micros.to_le_bytes());
        buf[19..23].copy_from_slice(&self.message_len.to_le_bytes());
        buf
    }

    /// Parses a header previously produced by [`LogEntry::encode`].
    #[must_use]
    pub fn decode(buf: &[u8; ENTRY_LEN]) -> Self {
        let level = Level::from_u8(buf[0]).expect("corrupt LogEntry: bad level byte");
        let group = GroupMask::from_raw(buf[1]);
        let source = NameId::from_raw(u32::from_le_bytes([buf[2], buf[3], buf[4], buf[5]]) as usize);
        let qtag = buf[6];
        let qval = u32::from_le_bytes([buf[7], buf[8], buf[9], buf[10]]);
        let qualifier = if qtag == 0 {
            Qualifier::Line(qval)
        } else {
            Qualifier::Function(NameId::from_raw(qval as usize))
        };
        let timestamp_micros = u64::from_le_bytes([
            buf[11], buf[12], buf[13], buf[14], buf[15], buf[16], buf[17], buf[18],
        ]);
        let message_len = u32::from_le_bytes([buf[19], buf[20], buf[21], buf[22]]);
        Self {
            level,
            group,
            source,
            qualifier,
            timestamp_micros,
            message_len,
        }
    }
}
