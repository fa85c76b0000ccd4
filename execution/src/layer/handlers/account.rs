use super::super::*;
use crate::{password, state::load_directory};
use bourse_types::market::{
    is_valid_username, ERROR_ACCOUNT_EXISTS, ERROR_INVALID_PASSWORD, ERROR_INVALID_USERNAME,
    ERROR_MARKET_FULL, ERROR_PASSWORD_MISMATCH, MAX_ACCOUNTS, MAX_PASSWORD_LENGTH,
    MAX_USERNAME_LENGTH, MIN_PASSWORD_LENGTH, MIN_USERNAME_LENGTH,
};
use rand::Rng;

impl<'a, S: State> Layer<'a, S> {
    pub(in crate::layer) async fn handle_signup(
        &mut self,
        username: &str,
        password: &str,
        confirm_password: &str,
    ) -> Vec<Event> {
        if !is_valid_username(username) {
            return Self::reject(
                username,
                ERROR_INVALID_USERNAME,
                format!(
                    "Username must be {MIN_USERNAME_LENGTH}-{MAX_USERNAME_LENGTH} letters, digits or underscores"
                ),
            );
        }

        let mut directory = load_directory(&*self).await;
        if directory.contains(username) {
            return Self::reject(username, ERROR_ACCOUNT_EXISTS, "Username already exists");
        }
        if directory.usernames.len() >= MAX_ACCOUNTS {
            return Self::reject(username, ERROR_MARKET_FULL, "No more accounts can be created");
        }

        if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&password.len()) {
            return Self::reject(
                username,
                ERROR_INVALID_PASSWORD,
                format!(
                    "Password must be {MIN_PASSWORD_LENGTH}-{MAX_PASSWORD_LENGTH} characters"
                ),
            );
        }
        if password != confirm_password {
            return Self::reject(username, ERROR_PASSWORD_MISMATCH, "Passwords do not match");
        }

        let credential = password::credential(self.rng.gen(), password);
        let account = Account::new(username.to_string(), credential, self.now);
        self.insert(
            Key::Account(username.to_string()),
            Value::Account(account),
        );
        directory.register(username);
        self.insert(Key::Directory, Value::Directory(directory));

        vec![Event::SignedUp {
            username: username.to_string(),
        }]
    }
}
