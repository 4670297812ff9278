use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::{AppError, AppResult};

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to hash password: {}", e)))
}

pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Stored hash is malformed: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Security answers match regardless of case and surrounding whitespace.
fn normalize_answer(answer: &str) -> String {
    answer.trim().to_lowercase()
}

pub fn hash_security_answer(answer: &str) -> AppResult<String> {
    hash_password(&normalize_answer(answer))
}

pub fn verify_security_answer(answer: &str, hash: &str) -> AppResult<bool> {
    verify_password(&normalize_answer(answer), hash)
}
