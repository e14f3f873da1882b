//! Restore run: startup checks, the entry loop and the final bookkeeping.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};
use uuid::Uuid;

use clio_core::defaults::{RECOVERY_FINISHED, RECOVERY_NOT_STARTED};
use clio_core::{
    ArchiveSource, AttachmentStore, Error, ImageTranscoder, RawEntry, RemoteFetcher, Result,
};
use clio_db::{Database, ViaSettings};

use crate::archive::{entry_names, find_owner, read_entry};
use crate::config::DateFilter;
use crate::entry::{normalize, normalize_via};
use crate::importer::{EntryImporter, RestoreOutcome};
use crate::media_index::MediaIndex;
use crate::resolver::AttachmentResolver;

/// External services a run talks to.
pub struct Services {
    pub fetcher: Arc<dyn RemoteFetcher>,
    pub store: Arc<dyn AttachmentStore>,
    pub transcoder: Arc<dyn ImageTranscoder>,
    /// Public base URL of stored attachments.
    pub attachments_url: String,
}

/// Counters of a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub imported: usize,
    pub already_imported: usize,
    pub filtered_out: usize,
}

/// Refuse archives whose owner has not requested a restore or that were
/// already restored.
pub fn check_recovery_status(old_username: &str, status: i32) -> Result<()> {
    match status {
        RECOVERY_NOT_STARTED => Err(Error::InvalidInput(format!(
            "restoration of @{} is not allowed",
            old_username
        ))),
        RECOVERY_FINISHED => Err(Error::InvalidInput(format!(
            "archive of @{} is already restored",
            old_username
        ))),
        _ => Ok(()),
    }
}

/// Whether the owner chose to restore this record: its date is inside the
/// filter window and its normalized via source is on the allow-list.
///
/// Decided on the raw record, so excluded entries are never converted.
pub fn is_selected(raw: &RawEntry, filter: &DateFilter, via: &ViaSettings) -> bool {
    if !filter.accepts(raw.date) {
        return false;
    }
    let (source, _) = normalize_via(raw.via.clone());
    via.allows(&source.url)
}

pub struct Restorer {
    db: Arc<Database>,
    source: Arc<dyn ArchiveSource>,
    fetcher: Arc<dyn RemoteFetcher>,
    importer: EntryImporter,
    owner: String,
    owner_id: Uuid,
    via: ViaSettings,
    filter: DateFilter,
}

impl Restorer {
    /// Check that the archive may be restored and index its media.
    pub async fn prepare(
        db: Arc<Database>,
        source: Arc<dyn ArchiveSource>,
        mp3_source: Option<Arc<dyn ArchiveSource>>,
        services: Services,
        filter: DateFilter,
    ) -> Result<Self> {
        let owner = find_owner(source.as_ref())?;
        info!(
            subsystem = "restore",
            component = "app",
            old_username = %owner,
            "Archive owner found"
        );

        let account = db.accounts.resolve(&owner).await?;
        let owner_id = account
            .user_id
            .ok_or_else(|| Error::NotFound(format!("user @{} not found", owner)))?;
        check_recovery_status(&owner, db.archives.recovery_status(owner_id).await?)?;

        let via = db.archives.via_settings(&owner).await?;
        info!(
            subsystem = "restore",
            component = "app",
            total_entries = via.total_entries(),
            entries_to_restore = via.entries_to_restore(),
            "Loaded via settings"
        );

        let mut media = MediaIndex::build(Arc::clone(&source))?;
        if let Some(mp3) = mp3_source {
            media.add_mp3_archive(mp3);
        }

        let resolver = AttachmentResolver::new(
            Arc::clone(&services.fetcher),
            services.store,
            services.transcoder,
            media,
            services.attachments_url,
        );

        Ok(Self {
            importer: EntryImporter::new(Arc::clone(&db), resolver),
            db,
            source,
            fetcher: services.fetcher,
            owner,
            owner_id,
            via,
            filter,
        })
    }

    /// Restore every selected entry in archive order, then mark the
    /// archive as restored. Stops at the first failing entry.
    pub async fn run(&self) -> Result<RunSummary> {
        let start = Instant::now();
        let total = self.via.entries_to_restore();
        let mut summary = RunSummary::default();
        let mut n = 0i64;

        for name in entry_names(self.source.as_ref()) {
            let raw = read_entry(self.source.as_ref(), &name)?;
            if !is_selected(&raw, &self.filter, &self.via) {
                debug!(
                    subsystem = "restore",
                    component = "app",
                    entry_name = %raw.name,
                    "Entry filtered out"
                );
                summary.filtered_out += 1;
                continue;
            }

            n += 1;
            info!(
                subsystem = "restore",
                component = "app",
                entry_name = %raw.name,
                "Processing entry {} [{}/{}]",
                raw.name,
                n,
                total
            );

            let entry = normalize(raw, self.fetcher.as_ref()).await?;
            match self.importer.restore_entry(&entry).await? {
                RestoreOutcome::Imported { .. } => summary.imported += 1,
                RestoreOutcome::AlreadyImported => summary.already_imported += 1,
            }
        }

        self.db
            .archives
            .set_recovery_status(self.owner_id, RECOVERY_FINISHED)
            .await?;
        info!(
            subsystem = "restore",
            component = "app",
            old_username = %self.owner,
            imported = summary.imported,
            already_imported = summary.already_imported,
            filtered_out = summary.filtered_out,
            duration_ms = start.elapsed().as_millis() as u64,
            "Done."
        );
        Ok(summary)
    }
}
