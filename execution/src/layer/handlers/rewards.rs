use super::super::*;
use crate::state::load_directory;
use bourse_types::market::{
    CLAIM_COOLDOWN_SECS, DAILY_REWARD, ERROR_ACCOUNT_NOT_FOUND, ERROR_COOLDOWN, FEATURED_STOCKS,
    REFRESH_COOLDOWN_SECS,
};
use rand::seq::SliceRandom;

fn plural(count: u64, unit: &str) -> String {
    if count > 1 {
        format!("{count} {unit}s")
    } else {
        format!("{count} {unit}")
    }
}

/// Renders a wait as "H hours, M minutes, S seconds", omitting zero parts.
pub fn format_wait(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    let mut parts = Vec::with_capacity(3);
    if hours > 0 {
        parts.push(plural(hours, "hour"));
    }
    if minutes > 0 {
        parts.push(plural(minutes, "minute"));
    }
    if seconds > 0 {
        parts.push(plural(seconds, "second"));
    }
    if parts.is_empty() {
        return "0 seconds".to_string();
    }
    parts.join(", ")
}

impl<'a, S: State> Layer<'a, S> {
    pub(in crate::layer) async fn handle_claim(&mut self, username: &str) -> Vec<Event> {
        let Some(mut account) = load_account(&*self, username).await else {
            return Self::reject(username, ERROR_ACCOUNT_NOT_FOUND, "Please login first");
        };

        let elapsed = self.now.saturating_sub(account.last_claim);
        if elapsed <= CLAIM_COOLDOWN_SECS {
            let wait = format_wait(CLAIM_COOLDOWN_SECS - elapsed);
            return Self::reject(
                username,
                ERROR_COOLDOWN,
                format!("You need to wait for {wait} to claim your daily"),
            );
        }

        account.coins = account.coins.saturating_add(DAILY_REWARD);
        account.last_claim = self.now;

        let mut events = vec![Event::Claimed {
            username: username.to_string(),
            amount: DAILY_REWARD,
        }];
        events.extend(self.store_account(account).await);
        events
    }

    pub(in crate::layer) async fn handle_refresh(&mut self, username: &str) -> Vec<Event> {
        let Some(mut account) = load_account(&*self, username).await else {
            return Self::reject(username, ERROR_ACCOUNT_NOT_FOUND, "Please login first");
        };

        let elapsed = self.now.saturating_sub(account.last_refresh);
        if elapsed <= REFRESH_COOLDOWN_SECS {
            return Self::reject(
                username,
                ERROR_COOLDOWN,
                format!(
                    "You still need to wait for {} seconds to refresh",
                    REFRESH_COOLDOWN_SECS - elapsed
                ),
            );
        }

        let candidates: Vec<String> = load_directory(&*self)
            .await
            .usernames
            .into_iter()
            .filter(|name| name != username)
            .collect();
        let featured: Vec<String> = candidates
            .choose_multiple(&mut self.rng, FEATURED_STOCKS)
            .cloned()
            .collect();

        account.featured = featured.clone();
        account.last_refresh = self.now;
        self.insert(
            Key::Account(username.to_string()),
            Value::Account(account),
        );

        vec![Event::Refreshed {
            username: username.to_string(),
            featured,
        }]
    }
}
