use std::str::FromStr;

/// When the log fsyncs.
///
/// `Commit` is the default: appends are buffered and the file is fsynced
/// before a COMMIT is acknowledged. `Always` additionally fsyncs every
/// append. `Off` never fsyncs; crash durability is gone, but the record
/// stream stays well-formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPolicy {
    Always,
    #[default]
    Commit,
    Off,
}

impl FromStr for SyncPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "always" => Ok(SyncPolicy::Always),
            "commit" => Ok(SyncPolicy::Commit),
            "off" => Ok(SyncPolicy::Off),
            other => Err(format!(
                "invalid wal sync policy '{other}' (expected always|commit|off)"
            )),
        }
    }
}
