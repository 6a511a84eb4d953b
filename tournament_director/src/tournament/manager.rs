//! Tournament manager: lifecycle and blind levels.
//!
//! The aggregate never touches other services' state. Registration and
//! elimination are validated here and forwarded as events; the reply
//! confirms acceptance, not completion of the downstream steps.

use super::models::{
    BlindLevel, DEFAULT_LEVEL_DURATION_MS, Tournament, TournamentId, TournamentStatus,
};
use crate::db::{StoreError, TournamentRepository};
use crate::error::ErrorKind;
use crate::events::{
    BusError, EventBus, PlayerAddPayload, PlayerEliminatePayload, TimerStartPayload,
    TournamentCreatedPayload, TournamentEvent,
};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Tournament errors
#[derive(Debug, Error)]
pub enum TournamentError {
    #[error("Tournament not found: {0}")]
    NotFound(TournamentId),

    #[error("Tournament already started")]
    AlreadyStarted,

    #[error("Tournament is not running")]
    NotRunning,

    #[error("Registration is closed")]
    RegistrationClosed,

    #[error("Tournament has not started")]
    NotStarted,

    #[error("Invalid tournament name")]
    InvalidName,

    #[error("Invalid level duration: {0}ms")]
    InvalidDuration(i64),

    #[error("Invalid username")]
    InvalidUsername,

    #[error("Tournament {0} kept changing underneath the update")]
    Contended(TournamentId),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Event bus error: {0}")]
    Bus(#[from] BusError),
}

impl TournamentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TournamentError::NotFound(_) => ErrorKind::NotFound,
            TournamentError::AlreadyStarted
            | TournamentError::NotRunning
            | TournamentError::RegistrationClosed
            | TournamentError::NotStarted
            | TournamentError::InvalidName
            | TournamentError::InvalidDuration(_)
            | TournamentError::InvalidUsername => ErrorKind::InvalidState,
            TournamentError::Contended(_) | TournamentError::Store(_) | TournamentError::Bus(_) => {
                ErrorKind::Transient
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            TournamentError::NotFound(_) => "NOT_FOUND",
            TournamentError::AlreadyStarted => "ALREADY_STARTED",
            TournamentError::NotRunning => "NOT_RUNNING",
            TournamentError::RegistrationClosed => "REGISTRATION_CLOSED",
            TournamentError::NotStarted => "TOURNAMENT_NOT_STARTED",
            TournamentError::InvalidName => "INVALID_NAME",
            TournamentError::InvalidDuration(_) => "INVALID_DURATION",
            TournamentError::InvalidUsername => "INVALID_USERNAME",
            TournamentError::Contended(_) | TournamentError::Store(_) | TournamentError::Bus(_) => {
                "UNAVAILABLE"
            }
        }
    }

    /// Message safe to show to callers
    pub fn client_message(&self) -> String {
        match self.kind() {
            ErrorKind::Transient => "Tournament service temporarily unavailable".to_string(),
            _ => self.to_string(),
        }
    }
}

pub type TournamentResult<T> = Result<T, TournamentError>;

/// Read-check-write rounds before a contended update gives up
const MAX_TRANSITION_ATTEMPTS: usize = 5;

/// Tournament manager
#[derive(Clone)]
pub struct TournamentManager {
    repo: Arc<dyn TournamentRepository>,
    bus: Arc<dyn EventBus>,
}

impl TournamentManager {
    /// Create a new tournament manager
    pub fn new(repo: Arc<dyn TournamentRepository>, bus: Arc<dyn EventBus>) -> Self {
        Self { repo, bus }
    }

    /// Create a new tournament in OPEN_REGISTRATION at level 1
    ///
    /// # Arguments
    ///
    /// * `name` - Display name, must not be blank
    /// * `level_duration_ms` - Length of every level, 20 minutes when `None`
    pub async fn create_tournament(
        &self,
        name: &str,
        level_duration_ms: Option<i64>,
    ) -> TournamentResult<Tournament> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TournamentError::InvalidName);
        }
        let level_duration_ms = level_duration_ms.unwrap_or(DEFAULT_LEVEL_DURATION_MS);
        if level_duration_ms <= 0 {
            return Err(TournamentError::InvalidDuration(level_duration_ms));
        }

        let tournament = self.repo.create(name, level_duration_ms).await?;
        log::info!("Created tournament {} '{}'", tournament.id, tournament.name);

        self.notify(TournamentEvent::TournamentCreated(TournamentCreatedPayload {
            tournament_id: tournament.id,
            name: tournament.name.clone(),
            level_duration_ms,
        }))
        .await;
        Ok(tournament)
    }

    pub async fn get_tournament(&self, tournament_id: TournamentId) -> TournamentResult<Tournament> {
        self.repo
            .find_by_id(tournament_id)
            .await?
            .ok_or(TournamentError::NotFound(tournament_id))
    }

    pub async fn list_tournaments(&self) -> TournamentResult<Vec<Tournament>> {
        Ok(self.repo.list().await?)
    }

    /// Start a tournament and its level-1 countdown
    ///
    /// # Errors
    ///
    /// * `TournamentError::AlreadyStarted` - not in OPEN_REGISTRATION
    pub async fn start_tournament(&self, tournament_id: TournamentId) -> TournamentResult<Tournament> {
        let tournament = self
            .transition(tournament_id, |current| {
                if current.status != TournamentStatus::OpenRegistration {
                    return Err(TournamentError::AlreadyStarted);
                }
                Ok(Some(Tournament {
                    status: TournamentStatus::Running,
                    current_level: 1,
                    ..current.clone()
                }))
            })
            .await?;
        log::info!("Tournament {} started", tournament_id);

        self.notify(TournamentEvent::TimerStart(TimerStartPayload {
            tournament_id,
            duration_ms: tournament.level_duration_ms,
        }))
        .await;
        Ok(tournament)
    }

    /// Advance to the next blind level and restart the countdown. The restart
    /// is emitted only when the new level was written over a RUNNING row.
    ///
    /// # Errors
    ///
    /// * `TournamentError::NotRunning` - not RUNNING
    pub async fn advance_blind_level(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Tournament> {
        let tournament = self
            .transition(tournament_id, |current| {
                if current.status != TournamentStatus::Running {
                    return Err(TournamentError::NotRunning);
                }
                Ok(Some(Tournament {
                    current_level: current.current_level.saturating_add(1),
                    ..current.clone()
                }))
            })
            .await?;
        log::info!(
            "Tournament {} advanced to level {}",
            tournament_id,
            tournament.current_level
        );

        self.notify(TournamentEvent::TimerRestart(TimerStartPayload {
            tournament_id,
            duration_ms: tournament.level_duration_ms,
        }))
        .await;
        Ok(tournament)
    }

    /// Blinds of the current level
    pub async fn blind_level(&self, tournament_id: TournamentId) -> TournamentResult<BlindLevel> {
        let tournament = self.get_tournament(tournament_id).await?;
        Ok(BlindLevel::for_level(
            tournament.current_level,
            tournament.level_duration_ms,
        ))
    }

    /// Accept a registration and forward it to the player registry.
    ///
    /// Returns the id of the forwarded event.
    ///
    /// # Errors
    ///
    /// * `TournamentError::InvalidUsername` - `username` is blank
    /// * `TournamentError::RegistrationClosed` - not in OPEN_REGISTRATION
    /// * `TournamentError::Bus` - the request could not be forwarded
    pub async fn register_player(
        &self,
        tournament_id: TournamentId,
        username: &str,
    ) -> TournamentResult<Uuid> {
        let username = username.trim();
        if username.is_empty() {
            return Err(TournamentError::InvalidUsername);
        }
        let tournament = self.get_tournament(tournament_id).await?;
        if tournament.status != TournamentStatus::OpenRegistration {
            return Err(TournamentError::RegistrationClosed);
        }

        let envelope = self
            .bus
            .emit(TournamentEvent::PlayerAdd(PlayerAddPayload {
                tournament_id,
                username: username.to_string(),
            }))
            .await?;
        log::info!(
            "Registration of {} accepted for tournament {}",
            username,
            tournament_id
        );
        Ok(envelope.event_id)
    }

    /// Accept an elimination request and forward it to the player registry.
    /// Nothing changes locally.
    ///
    /// # Errors
    ///
    /// * `TournamentError::NotStarted` - still in OPEN_REGISTRATION
    /// * `TournamentError::Bus` - the request could not be forwarded
    pub async fn eliminate_player(
        &self,
        tournament_id: TournamentId,
        player_id: i64,
    ) -> TournamentResult<Uuid> {
        let tournament = self.get_tournament(tournament_id).await?;
        if tournament.status == TournamentStatus::OpenRegistration {
            return Err(TournamentError::NotStarted);
        }

        let envelope = self
            .bus
            .emit(TournamentEvent::PlayerEliminate(PlayerEliminatePayload {
                tournament_id,
                player_id,
            }))
            .await?;
        log::info!(
            "Elimination of player {} accepted for tournament {}",
            player_id,
            tournament_id
        );
        Ok(envelope.event_id)
    }

    /// Mark the tournament FINISHED. Idempotent; a missing tournament is
    /// logged and yields `None`.
    pub async fn finish_tournament(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Option<Tournament>> {
        let result = self
            .transition(tournament_id, |current| {
                if current.status == TournamentStatus::Finished {
                    return Ok(None);
                }
                Ok(Some(Tournament {
                    status: TournamentStatus::Finished,
                    ..current.clone()
                }))
            })
            .await;
        match result {
            Ok(tournament) => {
                log::info!("Tournament {} finished", tournament_id);
                Ok(Some(tournament))
            }
            Err(TournamentError::NotFound(_)) => {
                log::warn!("Cannot finish unknown tournament {}", tournament_id);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Apply `change` to the stored row and write it back only if nobody
    /// changed the row in between, re-reading on conflict.
    ///
    /// `change` returns `Ok(None)` when the row is already in the target
    /// state; the current row is returned without a write.
    async fn transition<F>(
        &self,
        tournament_id: TournamentId,
        change: F,
    ) -> TournamentResult<Tournament>
    where
        F: Fn(&Tournament) -> TournamentResult<Option<Tournament>>,
    {
        for attempt in 1..=MAX_TRANSITION_ATTEMPTS {
            let current = self.get_tournament(tournament_id).await?;
            let Some(next) = change(&current)? else {
                return Ok(current);
            };
            if self.repo.compare_and_save(&current, &next).await? {
                return Ok(next);
            }
            log::debug!(
                "Tournament {} changed concurrently (attempt {})",
                tournament_id,
                attempt
            );
        }
        Err(TournamentError::Contended(tournament_id))
    }

    /// Publish after commit. Failure is logged and not rolled back.
    async fn notify(&self, event: TournamentEvent) {
        let event_type = event.event_type();
        if let Err(e) = self.bus.emit(event).await {
            log::error!("Failed to publish {} after commit: {}", event_type, e);
        }
    }
}
