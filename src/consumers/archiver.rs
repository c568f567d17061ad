/*!
Rotating, templated archival sink: the reference consumer for the on-disk wire format
(spec.md §4.7), fully implemented per SPEC_FULL.md §6.1 from `bvc_archiver.c`'s
`generate_file_name`/`SHOULD_ROTATE`/`complete_file` logic.
*/
use crate::codec::{self, HostEndian, NoFilter};
use crate::error::CoreError;
use crate::models::{AsPathStore, PeerStore, View};
use chrono::{DateTime, Utc};
use log::{info, warn};
use std::io::{BufWriter, Write};

/// Writes `view`s to files named from `pattern`, rotating on `rotation_interval` seconds
/// (0 disables rotation: everything goes to one file, opened on the first `write` call).
pub struct ArchiveSink {
    pattern: String,
    rotation_interval: u32,
    rotate_align: bool,
    latest_filename: Option<String>,
    outfile: Option<BufWriter<Box<dyn Write>>>,
    outfile_name: Option<String>,
    next_rotate_time: u32,
}

impl ArchiveSink {
    pub fn new(
        pattern: impl Into<String>,
        rotation_interval: u32,
        rotate_align: bool,
        latest_filename: Option<String>,
    ) -> Self {
        ArchiveSink {
            pattern: pattern.into(),
            rotation_interval,
            rotate_align,
            latest_filename,
            outfile: None,
            outfile_name: None,
            next_rotate_time: 0,
        }
    }

    fn should_rotate(&self, view_time: u32) -> bool {
        self.outfile.is_none()
            || (self.rotation_interval > 0 && view_time >= self.next_rotate_time)
    }

    fn open_new_file(&mut self, file_time: u32) -> Result<(), CoreError> {
        let name = generate_file_name(&self.pattern, file_time);
        info!("archiver opening {name}");
        self.outfile = Some(BufWriter::new(oneio::get_writer(&name)?));
        self.outfile_name = Some(name);
        Ok(())
    }

    /// Closes the current output file, and if a "latest" pointer path is configured,
    /// writes the just-closed file's name to it uncompressed (matching
    /// `bvc_archiver.c`'s `complete_file`/`write_latest_file`).
    fn complete_file(&mut self) -> Result<(), CoreError> {
        let Some(mut outfile) = self.outfile.take() else {
            return Ok(());
        };
        outfile.flush()?;
        drop(outfile);

        let Some(name) = self.outfile_name.take() else {
            return Ok(());
        };
        if let Some(latest) = &self.latest_filename {
            let mut latest_writer = oneio::get_writer(latest)?;
            writeln!(latest_writer, "{name}")?;
        }
        Ok(())
    }

    /// Writes `view` to the current (or a freshly rotated) output file.
    pub fn write(
        &mut self,
        view: &View,
        peers: &PeerStore,
        paths: &AsPathStore,
    ) -> Result<(), CoreError> {
        let view_time = view.time();
        if self.should_rotate(view_time) {
            if self.rotation_interval > 0 {
                if self.outfile.is_some() {
                    self.complete_file()?;
                }
                let file_time = if self.rotate_align {
                    (view_time / self.rotation_interval) * self.rotation_interval
                } else {
                    view_time
                };
                self.next_rotate_time = file_time + self.rotation_interval;
                self.open_new_file(file_time)?;
            } else {
                self.open_new_file(view_time)?;
            }
        }

        let outfile = self
            .outfile
            .as_mut()
            .expect("should_rotate guarantees a file is open at this point");
        codec::write_sync(
            outfile,
            view,
            peers,
            paths,
            &mut NoFilter,
            HostEndian::native(),
        )?;
        outfile.flush()?;
        Ok(())
    }

    /// Closes the current file (and writes the latest pointer, if configured). Call this
    /// on clean shutdown; an `ArchiveSink` dropped without calling `close` leaves the
    /// in-progress file as-is but never updates the latest pointer.
    pub fn close(&mut self) -> Result<(), CoreError> {
        if self.complete_file().is_err() {
            warn!("failed to cleanly close archive output file");
        }
        Ok(())
    }
}

/// Expands `%s` to `time` as decimal seconds, then runs the result through chrono's
/// strftime-equivalent formatter so any other `%` token (`%Y`, `%m`, ...) resolves against
/// the same timestamp, mirroring `generate_file_name`'s two-pass expansion.
fn generate_file_name(pattern: &str, time: u32) -> String {
    let with_secs = pattern.replace("%s", &time.to_string());
    let dt: DateTime<Utc> = DateTime::from_timestamp(time as i64, 0).unwrap_or_default();
    dt.format(&with_secs).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PeerSignature;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn expands_unix_seconds_and_strftime_tokens() {
        let name = generate_file_name("view.%s.%Y-%m-%d.bgpview.gz", 1_000_000_000);
        assert!(name.starts_with("view.1000000000."));
        assert!(name.ends_with(".bgpview.gz"));
    }

    #[test]
    fn rotates_and_writes_latest_pointer() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = dir.path().join("view.%s.gz").to_str().unwrap().to_string();
        let latest = dir.path().join("latest.txt");
        let mut sink = ArchiveSink::new(
            pattern,
            100,
            true,
            Some(latest.to_str().unwrap().to_string()),
        );

        let mut peers = PeerStore::new();
        let paths = AsPathStore::new();
        let peer_id = peers
            .add(PeerSignature::new(
                "rrc00",
                IpAddr::V4(Ipv4Addr::new(198, 51, 100, 1)),
                65001,
            ))
            .unwrap()
            .id;
        let mut view_a = View::new(150);
        view_a.add_peer(peer_id);
        view_a.activate_peer(peer_id);
        sink.write(&view_a, &peers, &paths).unwrap();

        let mut view_b = View::new(260);
        view_b.add_peer(peer_id);
        view_b.activate_peer(peer_id);
        sink.write(&view_b, &peers, &paths).unwrap();
        sink.close().unwrap();

        let latest_contents = std::fs::read_to_string(&latest).unwrap();
        assert!(latest_contents.trim_end().ends_with("view.200.gz"));
    }
}
