// src/db/models/status.rs

//! Per-host errata and trace status
//!
//! Statuses are stored as integer codes so that ordering by severity stays a
//! plain numeric comparison; the search names are the snake_case forms.

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, params};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum StatusKind {
    Errata,
    Trace,
}

/// Outstanding errata on a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, EnumIter)]
pub enum ErrataStatus {
    #[strum(serialize = "updated")]
    UpToDate,
    #[strum(serialize = "errata_needed")]
    NeededErrata,
    #[strum(serialize = "security_needed")]
    NeededSecurityErrata,
    #[strum(serialize = "unknown")]
    Unknown,
}

impl ErrataStatus {
    pub fn code(self) -> i32 {
        match self {
            ErrataStatus::UpToDate => 0,
            ErrataStatus::NeededErrata => 1,
            ErrataStatus::NeededSecurityErrata => 2,
            ErrataStatus::Unknown => 3,
        }
    }

    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(ErrataStatus::UpToDate),
            1 => Ok(ErrataStatus::NeededErrata),
            2 => Ok(ErrataStatus::NeededSecurityErrata),
            3 => Ok(ErrataStatus::Unknown),
            _ => Err(Error::ParseError(format!("Invalid errata status code: {code}"))),
        }
    }
}

/// Whether processes or the whole host need restarting after updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, EnumIter)]
pub enum TraceStatus {
    #[strum(serialize = "updated")]
    UpToDate,
    #[strum(serialize = "process_restart_needed")]
    RequireProcessRestart,
    #[strum(serialize = "reboot_needed")]
    RequireReboot,
}

impl TraceStatus {
    pub fn code(self) -> i32 {
        match self {
            TraceStatus::UpToDate => 0,
            TraceStatus::RequireProcessRestart => 1,
            TraceStatus::RequireReboot => 2,
        }
    }

    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(TraceStatus::UpToDate),
            1 => Ok(TraceStatus::RequireProcessRestart),
            2 => Ok(TraceStatus::RequireReboot),
            _ => Err(Error::ParseError(format!("Invalid trace status code: {code}"))),
        }
    }
}

/// A stored status row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostStatus {
    pub host_id: i64,
    pub kind: StatusKind,
    pub status: i32,
    pub reported_at: String,
}

impl HostStatus {
    /// Record a status for a host, replacing the previous one of that kind
    pub fn set(conn: &Connection, host_id: i64, kind: StatusKind, status: i32) -> Result<()> {
        conn.execute(
            "INSERT INTO host_statuses (host_id, kind, status, reported_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(host_id, kind)
             DO UPDATE SET status = excluded.status, reported_at = excluded.reported_at",
            params![host_id, kind.as_ref(), status, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn get(conn: &Connection, host_id: i64, kind: StatusKind) -> Result<Option<Self>> {
        let status = conn
            .query_row(
                "SELECT status, reported_at FROM host_statuses WHERE host_id = ?1 AND kind = ?2",
                params![host_id, kind.as_ref()],
                |row| {
                    Ok(Self {
                        host_id,
                        kind,
                        status: row.get(0)?,
                        reported_at: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(status)
    }

    pub fn set_errata(conn: &Connection, host_id: i64, status: ErrataStatus) -> Result<()> {
        Self::set(conn, host_id, StatusKind::Errata, status.code())
    }

    pub fn set_trace(conn: &Connection, host_id: i64, status: TraceStatus) -> Result<()> {
        Self::set(conn, host_id, StatusKind::Trace, status.code())
    }

    /// Errata status, `Unknown` if the host never reported one
    pub fn errata(conn: &Connection, host_id: i64) -> Result<ErrataStatus> {
        match Self::get(conn, host_id, StatusKind::Errata)? {
            Some(row) => ErrataStatus::from_code(row.status),
            None => Ok(ErrataStatus::Unknown),
        }
    }

    pub fn trace(conn: &Connection, host_id: i64) -> Result<Option<TraceStatus>> {
        Self::get(conn, host_id, StatusKind::Trace)?
            .map(|row| TraceStatus::from_code(row.status))
            .transpose()
    }
}
