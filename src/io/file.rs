/*!
Binds the codec to a compressed byte stream via `oneio`, the same crate the teacher uses
for transparent gz/bz2 reading and writing (see `bgpkit-parser`'s `oneio::get_writer`
usage). This is the archival sink's transport and the vehicle for the crate's own
round-trip tests.
*/
use crate::codec::{self, DecodedFrame, HostEndian, NoFilter, ViewFilter};
use crate::error::CoreError;
use crate::models::view::View;
use crate::models::{AsPathStore, PeerStore};
use std::io::{BufReader, BufWriter};

/// Opens `path` for writing, transparently compressing according to its extension (`.gz`,
/// etc., per `oneio`'s own dispatch).
pub fn writer(path: &str) -> Result<BufWriter<Box<dyn std::io::Write>>, CoreError> {
    Ok(BufWriter::new(oneio::get_writer(path)?))
}

/// Opens `path` for reading, transparently decompressing according to its extension.
pub fn reader(path: &str) -> Result<BufReader<Box<dyn std::io::Read>>, CoreError> {
    Ok(BufReader::new(oneio::get_reader(path)?))
}

/// Writes a single sync view to `path`, truncating/creating it.
pub fn write_view_to_path(
    path: &str,
    view: &View,
    peers: &PeerStore,
    paths: &AsPathStore,
) -> Result<(), CoreError> {
    let mut out = writer(path)?;
    codec::write_sync(
        &mut out,
        view,
        peers,
        paths,
        &mut NoFilter,
        HostEndian::native(),
    )?;
    Ok(())
}

/// Reads every frame archived in `path` as sync views (the archival format never writes
/// diffs — each rotated file is a self-contained sync, see SPEC_FULL.md §6.1).
pub fn read_views_from_path(
    path: &str,
    peers: &mut PeerStore,
    paths: &mut AsPathStore,
) -> Result<Vec<View>, CoreError> {
    let mut input = reader(path)?;
    let mut views = Vec::new();
    loop {
        match codec::read_frame(&mut input, peers, paths, &mut NoFilter, false)? {
            Some(DecodedFrame::Sync(view)) => views.push(view),
            Some(DecodedFrame::Diff(_)) => {
                return Err(CoreError::Corruption(
                    "unexpected diff frame in archive file".into(),
                ))
            }
            None => break,
        }
    }
    Ok(views)
}

/// Generic read entry point used by self-tests that need filtering or a custom
/// [`ViewFilter`].
pub fn read_frame_from_path(
    path: &str,
    peers: &mut PeerStore,
    paths: &mut AsPathStore,
    filter: &mut dyn ViewFilter,
) -> Result<Option<DecodedFrame>, CoreError> {
    let mut input = reader(path)?;
    codec::read_frame(&mut input, peers, paths, filter, false)
}
