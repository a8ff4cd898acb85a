use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

pub const TECHNIQUE_NAME_MAX: usize = 100;
pub const TECHNIQUE_DESCRIPTION_MAX: usize = 1000;
pub const TECHNIQUE_STYLE_MAX: usize = 50;
pub const TECHNIQUE_DIFFICULTY_MAX: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Technique {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub style: Option<String>,
    pub difficulty: Option<String>,
    pub reference_video_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Column values for a technique about to be inserted.
#[derive(Debug, Clone, Default)]
pub struct NewTechnique {
    pub name: String,
    pub description: Option<String>,
    pub style: Option<String>,
    pub difficulty: Option<String>,
    pub reference_video_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TrainingSession {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub style: Option<String>,
    pub duration: Option<i64>,
    pub intensity: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub location: Option<String>,
    pub session_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Pending => "pending",
            VideoStatus::Processing => "processing",
            VideoStatus::Completed => "completed",
            VideoStatus::Failed => "failed",
        }
    }
}

impl FromStr for VideoStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(VideoStatus::Pending),
            "processing" => Ok(VideoStatus::Processing),
            "completed" => Ok(VideoStatus::Completed),
            "failed" => Ok(VideoStatus::Failed),
            other => Err(AppError::Validation(format!(
                "Unknown analysis status: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingVideo {
    pub id: i64,
    pub user_id: i64,
    pub technique_id: Option<i64>,
    pub session_id: Option<i64>,
    pub title: String,
    pub filename: String,
    #[serde(skip)]
    pub file_path: String,
    pub file_size: Option<i64>,
    pub duration: Option<f64>,
    pub technique_name: Option<String>,
    pub style: Option<String>,
    pub description: Option<String>,
    pub is_private: bool,
    pub analysis_status: VideoStatus,
    pub analysis_score: Option<f64>,
    pub analysis_feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbTrainingVideo {
    pub id: i64,
    pub user_id: i64,
    pub technique_id: Option<i64>,
    pub session_id: Option<i64>,
    pub title: String,
    pub filename: String,
    pub file_path: String,
    pub file_size: Option<i64>,
    pub duration: Option<f64>,
    pub technique_name: Option<String>,
    pub style: Option<String>,
    pub description: Option<String>,
    pub is_private: bool,
    pub analysis_status: String,
    pub analysis_score: Option<f64>,
    pub analysis_feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbTrainingVideo> for TrainingVideo {
    fn from(db: DbTrainingVideo) -> Self {
        Self {
            id: db.id,
            user_id: db.user_id,
            technique_id: db.technique_id,
            session_id: db.session_id,
            title: db.title,
            filename: db.filename,
            file_path: db.file_path,
            file_size: db.file_size,
            duration: db.duration,
            technique_name: db.technique_name,
            style: db.style,
            description: db.description,
            is_private: db.is_private,
            analysis_status: db
                .analysis_status
                .parse()
                .unwrap_or(VideoStatus::Pending),
            analysis_score: db.analysis_score,
            analysis_feedback: db.analysis_feedback,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProficiencyStatus {
    Learning,
    Practicing,
    Mastered,
}

impl ProficiencyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProficiencyStatus::Learning => "learning",
            ProficiencyStatus::Practicing => "practicing",
            ProficiencyStatus::Mastered => "mastered",
        }
    }
}

impl fmt::Display for ProficiencyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProficiencyStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "learning" => Ok(ProficiencyStatus::Learning),
            "practicing" => Ok(ProficiencyStatus::Practicing),
            "mastered" => Ok(ProficiencyStatus::Mastered),
            other => Err(AppError::Validation(format!(
                "Invalid proficiency status '{}': expected learning, practicing or mastered",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechniqueProgress {
    pub id: i64,
    pub user_id: i64,
    pub technique_id: i64,
    pub proficiency_status: ProficiencyStatus,
    pub is_favorite: bool,
    pub notes: Option<String>,
    pub personal_goal: Option<String>,
    pub practice_count: i64,
    pub total_practice_time: i64,
    pub first_practiced: Option<DateTime<Utc>>,
    pub last_practiced: Option<DateTime<Utc>>,
    pub mastered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub technique: Option<Technique>,
}

/// A progress row joined with its catalog technique (`t_`-prefixed columns).
#[derive(sqlx::FromRow, Clone)]
pub struct DbTechniqueProgress {
    pub id: i64,
    pub user_id: i64,
    pub technique_id: i64,
    pub proficiency_status: String,
    pub is_favorite: bool,
    pub notes: Option<String>,
    pub personal_goal: Option<String>,
    pub practice_count: i64,
    pub total_practice_time: i64,
    pub first_practiced: Option<DateTime<Utc>>,
    pub last_practiced: Option<DateTime<Utc>>,
    pub mastered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub t_name: Option<String>,
    pub t_description: Option<String>,
    pub t_style: Option<String>,
    pub t_difficulty: Option<String>,
    pub t_reference_video_url: Option<String>,
    pub t_created_at: Option<DateTime<Utc>>,
}

impl From<DbTechniqueProgress> for TechniqueProgress {
    fn from(db: DbTechniqueProgress) -> Self {
        let technique = match (db.t_name, db.t_created_at) {
            (Some(name), Some(created_at)) => Some(Technique {
                id: db.technique_id,
                name,
                description: db.t_description,
                style: db.t_style,
                difficulty: db.t_difficulty,
                reference_video_url: db.t_reference_video_url,
                created_at,
            }),
            _ => None,
        };

        Self {
            id: db.id,
            user_id: db.user_id,
            technique_id: db.technique_id,
            proficiency_status: db
                .proficiency_status
                .parse()
                .unwrap_or(ProficiencyStatus::Learning),
            is_favorite: db.is_favorite,
            notes: db.notes,
            personal_goal: db.personal_goal,
            practice_count: db.practice_count,
            total_practice_time: db.total_practice_time,
            first_practiced: db.first_practiced,
            last_practiced: db.last_practiced,
            mastered_at: db.mastered_at,
            created_at: db.created_at,
            updated_at: db.updated_at,
            technique,
        }
    }
}

/// Field changes requested for one progress row.
#[derive(Debug, Clone, Default)]
pub struct ProgressChanges {
    pub proficiency_status: Option<ProficiencyStatus>,
    pub is_favorite: Option<bool>,
    pub notes: Option<String>,
    pub personal_goal: Option<String>,
    pub mark_practiced: bool,
    pub practice_duration: Option<i64>,
}

impl TechniqueProgress {
    /// Applies `changes` as of `now`.
    ///
    /// `mastered_at` is stamped only on entry into `mastered`, kept while the
    /// status stays `mastered`, and cleared by any other status.
    pub fn apply(&mut self, changes: &ProgressChanges, now: DateTime<Utc>) {
        if let Some(status) = changes.proficiency_status {
            let was_mastered = self.proficiency_status == ProficiencyStatus::Mastered;

            match status {
                ProficiencyStatus::Mastered if !was_mastered => self.mastered_at = Some(now),
                ProficiencyStatus::Mastered => {}
                _ => self.mastered_at = None,
            }

            self.proficiency_status = status;
        }

        if let Some(is_favorite) = changes.is_favorite {
            self.is_favorite = is_favorite;
        }

        if let Some(notes) = &changes.notes {
            self.notes = Some(notes.clone());
        }

        if let Some(goal) = &changes.personal_goal {
            self.personal_goal = Some(goal.clone());
        }

        if changes.mark_practiced {
            self.practice_count += 1;
            self.last_practiced = Some(now);
            self.total_practice_time += changes.practice_duration.unwrap_or(0);
        }

        self.updated_at = now;
    }
}

/// Renders a duration in minutes as `1h 5m`, or `5m` under an hour.
pub fn format_minutes(total_minutes: i64) -> String {
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

/// One entry of a bulk technique import. Every field is optional on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TechniqueImport {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub reference_video_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportError {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkImportReport {
    pub imported: i64,
    pub skipped: i64,
    pub errors: Vec<ImportError>,
    pub total_techniques: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TechniqueStats {
    pub total: i64,
    pub by_style: BTreeMap<String, i64>,
    pub by_difficulty: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserVideoStats {
    pub total_videos: i64,
    /// Seconds.
    pub total_duration: f64,
    pub duration_formatted: String,
    pub analyzed_videos: i64,
    pub videos_by_style: BTreeMap<String, i64>,
}

impl Default for UserVideoStats {
    fn default() -> Self {
        Self {
            total_videos: 0,
            total_duration: 0.0,
            duration_formatted: format_minutes(0),
            analyzed_videos: 0,
            videos_by_style: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StyleBreakdown {
    pub style: Option<String>,
    pub count: i64,
    pub total_duration: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_sessions: i64,
    /// Minutes.
    pub total_duration: i64,
    pub duration_formatted: String,
    pub sessions_by_style: Vec<StyleBreakdown>,
    pub recent_sessions: Vec<TrainingSession>,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self {
            total_sessions: 0,
            total_duration: 0,
            duration_formatted: format_minutes(0),
            sessions_by_style: Vec::new(),
            recent_sessions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressStats {
    pub total_tracked: i64,
    pub by_status: BTreeMap<String, i64>,
    pub favorites_count: i64,
    pub total_practices: i64,
    pub total_practice_time: i64,
    pub recently_practiced: Vec<TechniqueProgress>,
}
