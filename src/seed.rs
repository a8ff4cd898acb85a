use sqlx::{Pool, Sqlite};
use tracing::{info, instrument, warn};

use crate::database::{count_techniques, create_technique};
use crate::error::AppError;
use crate::models::NewTechnique;

const STARTER_TECHNIQUES: [(&str, &str, &str, &str); 8] = [
    (
        "Front Kick (Mae Geri)",
        "A fundamental forward kick executed with the ball of the foot, targeting the opponent's midsection.",
        "Karate",
        "Beginner",
    ),
    (
        "Roundhouse Kick (Mawashi Geri)",
        "A circular kick that strikes with the instep or shin, one of the most powerful kicks in martial arts.",
        "Karate",
        "Intermediate",
    ),
    (
        "Jab-Cross Combination",
        "Basic boxing combination: lead hand jab followed by rear hand cross punch.",
        "Boxing",
        "Beginner",
    ),
    (
        "Triangle Choke (Sankaku Jime)",
        "A submission technique that uses the legs to apply pressure to the opponent's neck and shoulder.",
        "Brazilian Jiu-Jitsu",
        "Advanced",
    ),
    (
        "Spinning Back Kick",
        "A powerful kick executed while spinning 360 degrees, striking with the heel.",
        "Taekwondo",
        "Advanced",
    ),
    (
        "Side Kick (Yoko Geri)",
        "A lateral kick delivered with the edge of the foot, used for keeping distance and generating power.",
        "Karate",
        "Intermediate",
    ),
    (
        "Hip Throw (O Goshi)",
        "A fundamental judo throw that uses hip rotation to off-balance and throw the opponent.",
        "Judo",
        "Intermediate",
    ),
    (
        "Flying Knee",
        "An explosive jumping knee strike aimed at the opponent's head or body.",
        "Muay Thai",
        "Advanced",
    ),
];

pub fn starter_techniques() -> Vec<NewTechnique> {
    STARTER_TECHNIQUES
        .iter()
        .map(|(name, description, style, difficulty)| NewTechnique {
            name: name.to_string(),
            description: Some(description.to_string()),
            style: Some(style.to_string()),
            difficulty: Some(difficulty.to_string()),
            reference_video_url: None,
        })
        .collect()
}

/// Inserts the starter catalog when the catalog is empty. Returns the number inserted.
#[instrument(skip(pool))]
pub async fn seed_catalog(pool: &Pool<Sqlite>) -> Result<usize, AppError> {
    if count_techniques(pool).await? > 0 {
        warn!("Techniques already exist in database, skipping seed");
        return Ok(0);
    }

    let techniques = starter_techniques();
    for technique in &techniques {
        create_technique(pool, technique).await?;
    }

    info!(count = techniques.len(), "Seeded starter techniques");
    Ok(techniques.len())
}
