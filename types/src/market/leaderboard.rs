use serde::{Deserialize, Serialize};

/// A player's position on the leaderboard
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub username: String,
    pub net_worth: u64,
    pub rank: u32,
}

/// All players ordered by net worth
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Leaderboard {
    pub entries: Vec<Standing>,
}

impl Leaderboard {
    /// Builds a ranked leaderboard from `(username, net_worth)` pairs.
    ///
    /// Entries are sorted by net worth descending, ties broken by username.
    pub fn from_net_worths(net_worths: impl IntoIterator<Item = (String, u64)>) -> Self {
        let mut entries: Vec<Standing> = net_worths
            .into_iter()
            .map(|(username, net_worth)| Standing {
                username,
                net_worth,
                rank: 0,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.net_worth
                .cmp(&a.net_worth)
                .then_with(|| a.username.cmp(&b.username))
        });
        for (i, entry) in entries.iter_mut().enumerate() {
            entry.rank = (i + 1) as u32;
        }
        Self { entries }
    }

    pub fn top(&self, n: usize) -> &[Standing] {
        &self.entries[..n.min(self.entries.len())]
    }

    pub fn standing(&self, username: &str) -> Option<&Standing> {
        self.entries.iter().find(|e| e.username == username)
    }
}
