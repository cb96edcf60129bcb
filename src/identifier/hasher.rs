//! Password hashing collaborator
//!
//! Hash algorithms (bcrypt, argon2, ...) live outside this crate; the Password
//! identifier only needs to ask whether a plain password matches a stored hash.

/// Password verification capability
pub trait PasswordHasher: Send + Sync {
    fn verify(&self, plain: &str, hashed: &str) -> bool;
}

impl<F> PasswordHasher for F
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    fn verify(&self, plain: &str, hashed: &str) -> bool {
        self(plain, hashed)
    }
}
