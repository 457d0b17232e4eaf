use std::sync::Arc;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    config::VerificationConfig,
    domain::User,
    error::{AppError, Result},
    repository::{UserRepository, VerificationCodeRepository},
};

/// Delivers a freshly issued code to the phone.
#[async_trait]
pub trait CodeSender: Send + Sync {
    async fn send(&self, phone: &str, code: &str) -> Result<()>;
}

/// Writes codes to the log instead of sending an SMS.
pub struct LogCodeSender;

#[async_trait]
impl CodeSender for LogCodeSender {
    async fn send(&self, phone: &str, code: &str) -> Result<()> {
        tracing::debug!("Verification code for {}: {}", phone, code);
        Ok(())
    }
}

pub struct VerificationService {
    codes: Arc<dyn VerificationCodeRepository>,
    user_repo: Arc<dyn UserRepository>,
    sender: Arc<dyn CodeSender>,
    config: VerificationConfig,
}

impl VerificationService {
    pub fn new(
        codes: Arc<dyn VerificationCodeRepository>,
        user_repo: Arc<dyn UserRepository>,
        sender: Arc<dyn CodeSender>,
        config: VerificationConfig,
    ) -> Self {
        Self { codes, user_repo, sender, config }
    }

    /// Issues a new code for `phone`, replacing any earlier one.
    pub async fn issue(&self, phone: &str) -> Result<()> {
        let phone = normalize_phone(phone)?;
        let now = Utc::now();

        let purged = self.codes.purge_expired(now).await?;
        if purged > 0 {
            tracing::debug!("Purged {} expired verification codes", purged);
        }

        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));
        let expires_at = now + Duration::seconds(self.config.code_ttl_seconds);

        self.codes.upsert(&phone, &hash_code(&phone, &code), expires_at).await?;
        self.sender.send(&phone, &code).await?;

        Ok(())
    }

    /// Checks `code` and, on success, marks the phone verified for the user.
    /// A code is consumed by a match or by running out of attempts.
    pub async fn verify(&self, user_id: Uuid, phone: &str, code: &str) -> Result<User> {
        let phone = normalize_phone(phone)?;

        let record = self.codes.find(&phone).await?
            .filter(|r| !r.is_expired(Utc::now()))
            .ok_or_else(|| AppError::Validation("Verification code expired or not issued".to_string()))?;

        if record.code_hash != hash_code(&phone, code.trim()) {
            let attempts = self.codes.record_failed_attempt(&phone).await?;
            if attempts >= self.config.max_attempts {
                self.codes.delete(&phone).await?;
                tracing::warn!("Verification locked out for {} after {} attempts", phone, attempts);
                return Err(AppError::Validation(
                    "Too many attempts, request a new code".to_string(),
                ));
            }
            return Err(AppError::Validation("Invalid verification code".to_string()));
        }

        self.codes.delete(&phone).await?;
        self.user_repo.mark_phone_verified(user_id, &phone).await
    }
}

/// Strips separators and checks the number has 8 to 15 digits.
pub fn normalize_phone(phone: &str) -> Result<String> {
    let trimmed = phone.trim();
    let (plus, rest) = match trimmed.strip_prefix('+') {
        Some(rest) => ("+", rest),
        None => ("", trimmed),
    };

    let mut digits = String::with_capacity(rest.len());
    for c in rest.chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' | '(' | ')' | '.' => {}
            _ => return Err(AppError::Validation("Invalid phone number".to_string())),
        }
    }

    if !(8..=15).contains(&digits.len()) {
        return Err(AppError::Validation("Invalid phone number".to_string()));
    }

    Ok(format!("{}{}", plus, digits))
}

fn hash_code(phone: &str, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(phone.as_bytes());
    hasher.update(b":");
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}
