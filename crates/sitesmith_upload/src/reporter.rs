use sitesmith_cas::Cid;

use crate::PutOutcome;

/// A trait that enables being notified of the progress of an upload.
pub trait Reporter: Send + Sync {
    /// Called before the existence checks start.
    fn on_probe_start(&self, _total: usize) {}

    /// Called when the existence check of a block finished.
    fn on_probe_complete(&self, _cid: &Cid, _present: bool) {}

    /// Called after every block was checked.
    fn on_probes_done(&self) {}

    /// Called before the first write with the number of blocks that will be written.
    fn on_upload_start(&self, _total: usize) {}

    /// Called after a block was written.
    fn on_block_uploaded(&self, _cid: &Cid, _outcome: PutOutcome) {}

    /// Called after the last block was written.
    fn on_upload_complete(&self) {}
}
