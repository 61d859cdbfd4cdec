pub mod log;

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info, warn};

use crate::config::{RenameMode, SweepConfig};
use crate::error::RequestError;
use crate::model::card::Card;
use crate::providers::BoardApi;
use crate::util::text::{clean_card_name, extract_name_and_policy};
use self::log::{new_event, ActivityLog, EventKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    DeleteAttachment,
    Rename,
    ClearDescriptions,
}

impl Phase {
    /// Pipeline order.
    pub const ALL: [Phase; 3] = [
        Phase::DeleteAttachment,
        Phase::Rename,
        Phase::ClearDescriptions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::DeleteAttachment => "delete-attachment",
            Phase::Rename => "rename",
            Phase::ClearDescriptions => "clear-descriptions",
        }
    }

    pub fn order(&self) -> usize {
        match self {
            Phase::DeleteAttachment => 0,
            Phase::Rename => 1,
            Phase::ClearDescriptions => 2,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one phase over the whole list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseReport {
    pub phase: Phase,
    pub enabled: bool,
    pub fetch_failed: bool,
    pub processed: usize,
    pub changed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl PhaseReport {
    fn new(phase: Phase) -> Self {
        Self {
            phase,
            enabled: true,
            fetch_failed: false,
            processed: 0,
            changed: 0,
            skipped: 0,
            failed: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub phases: Vec<PhaseReport>,
}

impl RunSummary {
    pub fn report(&self, phase: Phase) -> Option<&PhaseReport> {
        self.phases.iter().find(|r| r.phase == phase)
    }

    /// Cards that failed plus phases whose card list could not be fetched.
    pub fn failures(&self) -> usize {
        self.phases
            .iter()
            .map(|r| r.failed + usize::from(r.fetch_failed))
            .sum()
    }
}

enum CardOutcome {
    Changed,
    Unchanged,
}

/// Runs the housekeeping phases over every card in the configured list.
/// Nothing here returns an error: failures are logged per card or per phase
/// and the run moves on.
pub struct Sweeper<'a> {
    board: &'a dyn BoardApi,
    config: &'a SweepConfig,
    log: &'a ActivityLog,
}

impl<'a> Sweeper<'a> {
    pub fn new(board: &'a dyn BoardApi, config: &'a SweepConfig, log: &'a ActivityLog) -> Self {
        Self { board, config, log }
    }

    pub async fn run(&self) -> RunSummary {
        info!(
            board = self.board.name(),
            list = %self.config.list_id,
            mode = self.config.rename_mode.as_str(),
            "Starting sweep"
        );

        let mut summary = RunSummary::default();
        for phase in Phase::ALL {
            summary.phases.push(self.run_phase(phase).await);
        }

        info!(failures = summary.failures(), "Sweep complete");
        summary
    }

    pub async fn run_phase(&self, phase: Phase) -> PhaseReport {
        let mut report = PhaseReport::new(phase);

        if !self.config.is_enabled(phase) {
            info!(%phase, "Phase disabled, skipping");
            self.log
                .record(&new_event(phase, EventKind::PhaseDisabled, None, None, None));
            report.enabled = false;
            return report;
        }

        // Each phase re-reads the list; earlier phases may have renamed cards.
        let cards = match self.board.list_cards(&self.config.list_id).await {
            Ok(cards) => cards,
            Err(e) => {
                error!(%phase, error = %e, "Failed to fetch cards, skipping phase");
                let msg = e.to_string();
                self.log.record(&new_event(
                    phase,
                    EventKind::FetchFailed,
                    None,
                    None,
                    Some(&msg),
                ));
                report.fetch_failed = true;
                return report;
            }
        };

        info!(%phase, cards = cards.len(), "Phase started");

        for card in &cards {
            report.processed += 1;
            let result = match phase {
                Phase::DeleteAttachment => self.delete_attachment(card).await,
                Phase::Rename => match self.config.rename_mode {
                    RenameMode::Simple => self.rename_simple(card).await,
                    RenameMode::Extract => self.rename_extract(card).await,
                },
                Phase::ClearDescriptions => self.clear_description(card).await,
            };

            match result {
                Ok(CardOutcome::Changed) => report.changed += 1,
                Ok(CardOutcome::Unchanged) => report.skipped += 1,
                Err(e) => {
                    error!(
                        %phase,
                        card_id = %card.id,
                        card = %card.name,
                        error = %e,
                        "Card failed"
                    );
                    let msg = e.to_string();
                    self.log.record(&new_event(
                        phase,
                        EventKind::CardFailed,
                        Some(&card.id),
                        Some(&card.name),
                        Some(&msg),
                    ));
                    report.failed += 1;
                }
            }
        }

        info!(
            %phase,
            changed = report.changed,
            skipped = report.skipped,
            failed = report.failed,
            "Phase finished"
        );
        report
    }

    fn record(&self, phase: Phase, kind: EventKind, card: &Card, message: Option<&str>) {
        self.log.record(&new_event(
            phase,
            kind,
            Some(&card.id),
            Some(&card.name),
            message,
        ));
    }

    async fn delete_attachment(&self, card: &Card) -> Result<CardOutcome, RequestError> {
        let target = &self.config.attachment_name;
        let attachments = self.board.list_attachments(&card.id).await?;

        match attachments.iter().find(|a| &a.name == target) {
            Some(attachment) => {
                self.board
                    .delete_attachment(&card.id, &attachment.id)
                    .await?;
                info!(
                    card_id = %card.id,
                    card = %card.name,
                    attachment = %target,
                    "Deleted attachment"
                );
                self.record(
                    Phase::DeleteAttachment,
                    EventKind::AttachmentDeleted,
                    card,
                    Some(&attachment.id),
                );
                Ok(CardOutcome::Changed)
            }
            None => {
                warn!(
                    card_id = %card.id,
                    card = %card.name,
                    attachment = %target,
                    "Attachment not found"
                );
                self.record(
                    Phase::DeleteAttachment,
                    EventKind::AttachmentNotFound,
                    card,
                    None,
                );
                Ok(CardOutcome::Unchanged)
            }
        }
    }

    async fn rename_simple(&self, card: &Card) -> Result<CardOutcome, RequestError> {
        let cleaned = clean_card_name(&card.name);
        if cleaned == card.name {
            info!(card_id = %card.id, card = %card.name, "Name already clean");
            self.record(Phase::Rename, EventKind::AlreadyClean, card, None);
            return Ok(CardOutcome::Unchanged);
        }

        self.board.update_card_name(&card.id, &cleaned).await?;
        info!(card_id = %card.id, from = %card.name, to = %cleaned, "Updated card name");
        self.record(Phase::Rename, EventKind::NameUpdated, card, Some(&cleaned));
        Ok(CardOutcome::Changed)
    }

    async fn rename_extract(&self, card: &Card) -> Result<CardOutcome, RequestError> {
        let details = self.board.get_card_details(&card.id).await?;
        let extraction = extract_name_and_policy(&details.name, &details.desc);

        let person_name = match extraction.person_name {
            Some(name) if extraction.should_process => name,
            _ => {
                warn!(
                    card_id = %card.id,
                    card = %card.name,
                    "No usable name in description, skipping"
                );
                self.record(
                    Phase::Rename,
                    EventKind::RenameSkipped,
                    card,
                    Some("no usable name in description"),
                );
                return Ok(CardOutcome::Unchanged);
            }
        };

        self.board.update_card_name(&card.id, &person_name).await?;
        info!(card_id = %card.id, from = %card.name, to = %person_name, "Updated card name");
        self.record(Phase::Rename, EventKind::NameUpdated, card, Some(&person_name));

        match &self.config.custom_field_id {
            Some(field_id) => {
                self.board
                    .update_custom_field(&card.id, field_id, &extraction.policy_number)
                    .await?;
                info!(
                    card_id = %card.id,
                    field = %field_id,
                    policy = %extraction.policy_number,
                    "Stored policy number"
                );
                self.record(
                    Phase::Rename,
                    EventKind::CustomFieldUpdated,
                    card,
                    Some(&extraction.policy_number),
                );
            }
            None => {
                warn!(card_id = %card.id, "No custom field configured, policy number not stored");
            }
        }

        Ok(CardOutcome::Changed)
    }

    async fn clear_description(&self, card: &Card) -> Result<CardOutcome, RequestError> {
        self.board.clear_card_description(&card.id).await?;
        info!(card_id = %card.id, card = %card.name, "Cleared description");
        self.record(Phase::ClearDescriptions, EventKind::DescriptionCleared, card, None);
        Ok(CardOutcome::Changed)
    }
}
