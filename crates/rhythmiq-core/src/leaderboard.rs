//! Top users by lifetime XP.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::rewards::level_for_xp;

pub const DEFAULT_LEADERBOARD_SIZE: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserXp {
    pub user_id: Uuid,
    pub name: String,
    pub xp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: Uuid,
    pub name: String,
    pub xp: u64,
    pub level: u32,
}

pub trait Leaderboard: Send + Sync {
    /// Highest XP first.
    fn top_users(&self, limit: usize) -> Result<Vec<UserXp>>;
}

/// Ranked standings, 1-based. Ties keep the order the source returned.
pub fn standings(source: &dyn Leaderboard, limit: usize) -> Result<Vec<LeaderboardEntry>> {
    let mut users = source.top_users(limit)?;
    users.sort_by(|a, b| b.xp.cmp(&a.xp));
    Ok(users
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, u)| LeaderboardEntry {
            rank: i + 1,
            level: level_for_xp(u.xp),
            user_id: u.user_id,
            name: u.name,
            xp: u.xp,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<UserXp>);

    impl Leaderboard for Fixed {
        fn top_users(&self, _limit: usize) -> Result<Vec<UserXp>> {
            Ok(self.0.clone())
        }
    }

    fn user(name: &str, xp: u64) -> UserXp {
        UserXp {
            user_id: Uuid::new_v4(),
            name: name.into(),
            xp,
        }
    }

    #[test]
    fn ranks_by_xp_and_truncates() {
        let source = Fixed(vec![
            user("ana", 120),
            user("bo", 950),
            user("cy", 40),
            user("di", 300),
        ]);
        let top = standings(&source, DEFAULT_LEADERBOARD_SIZE).unwrap();
        let names: Vec<(usize, &str, u32)> = top
            .iter()
            .map(|e| (e.rank, e.name.as_str(), e.level))
            .collect();
        assert_eq!(names, vec![(1, "bo", 10), (2, "di", 4), (3, "ana", 2)]);
    }
}
