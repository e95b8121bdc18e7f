//! Users submitting bags of tasks on behalf of a federation member.

#[derive(Clone, Debug)]
pub struct User {
    pub id: u32,
    pub member_id: u32,
    /// Index of the user within its member.
    pub local_id: u32,
    pub name: String,
    bots: Vec<u32>,
}

impl User {
    pub fn new(id: u32, member_id: u32, local_id: u32, member_abbreviation: &str) -> Self {
        Self {
            id,
            member_id,
            local_id,
            name: format!("{} {}", member_abbreviation, local_id),
            bots: Vec::new(),
        }
    }

    /// Returns IDs of bags submitted by this user in submission order.
    pub fn bots(&self) -> &[u32] {
        &self.bots
    }

    /// Adds bag of tasks, returns false if it was already added.
    pub fn add_bot(&mut self, bot_id: u32) -> bool {
        if self.bots.contains(&bot_id) {
            return false;
        }
        self.bots.push(bot_id);
        true
    }

    /// Adds bags of tasks, returns the number of bags actually added.
    pub fn add_bots(&mut self, bot_ids: &[u32]) -> usize {
        let mut added = 0;
        for bot_id in bot_ids {
            if self.add_bot(*bot_id) {
                added += 1;
            }
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_bots_are_ignored() {
        let mut user = User::new(5, 1, 2, "UFBA");
        assert_eq!(user.name, "UFBA 2");
        assert!(user.add_bot(10));
        assert!(!user.add_bot(10));
        assert_eq!(user.add_bots(&[10, 11, 12, 11]), 2);
        assert_eq!(user.bots(), &[10, 11, 12]);
    }
}
