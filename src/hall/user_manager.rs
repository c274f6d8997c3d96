use std::collections::HashMap;

use super::{HallUser, HallUserData};
use crate::define::PlayerId;
use crate::gate::Session;

/// 在线玩家表，调用方负责加锁
#[derive(Default)]
pub struct HallUserManager {
    users: HashMap<PlayerId, HallUser>,
}

impl HallUserManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 玩家进入大厅
    ///
    /// 已在线时保留内存中的角色数据，只替换会话，返回被顶掉的旧会话。
    pub fn on_user_login(&mut self, user_data: HallUserData, session: Session) -> Option<Session> {
        let user_id = user_data.user_id;
        match self.users.get_mut(&user_id) {
            Some(user) => {
                let previous = std::mem::replace(&mut user.session, session);
                (previous.session_id != user.session.session_id).then_some(previous)
            }
            None => {
                self.users.insert(user_id, HallUser::new(user_data, session));
                None
            }
        }
    }

    /// 玩家离开大厅，只有会话匹配时才移除
    pub fn on_user_logout(&mut self, user_id: PlayerId, session_id: &str) -> Option<HallUser> {
        let matches = self
            .users
            .get(&user_id)
            .is_some_and(|user| user.session.session_id == session_id);
        if !matches {
            return None;
        }
        self.users.remove(&user_id)
    }

    pub fn get_user(&self, user_id: PlayerId) -> Option<&HallUser> {
        self.users.get(&user_id)
    }

    pub fn get_user_mut(&mut self, user_id: PlayerId) -> Option<&mut HallUser> {
        self.users.get_mut(&user_id)
    }

    pub fn get_user_count(&self) -> usize {
        self.users.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_for(user_id: PlayerId) -> Session {
        let mut session = Session::new("Gate@1", None);
        session.bind(user_id);
        session
    }

    #[test]
    fn test_on_user_login_new_user_registers() {
        let mut manager = HallUserManager::new();
        let user = PlayerId(1);

        let evicted = manager.on_user_login(HallUserData::new(user, "alice"), session_for(user));
        assert!(evicted.is_none());
        assert_eq!(manager.get_user_count(), 1);
    }

    #[test]
    fn test_on_user_login_takeover_returns_old_session() {
        let mut manager = HallUserManager::new();
        let user = PlayerId(1);
        let old = session_for(user);
        let new = session_for(user);

        manager.on_user_login(HallUserData::new(user, "alice"), old.clone());
        manager.get_user_mut(user).unwrap().user_data.money = 50;

        let evicted = manager.on_user_login(HallUserData::new(user, "ignored"), new.clone());
        assert_eq!(evicted.map(|s| s.session_id), Some(old.session_id));

        let current = manager.get_user(user).unwrap();
        assert_eq!(current.session.session_id, new.session_id);
        // 内存中的角色数据不被覆盖
        assert_eq!(current.user_data.money, 50);
        assert_eq!(current.user_data.name, "alice");
        assert_eq!(manager.get_user_count(), 1);
    }

    #[test]
    fn test_on_user_login_same_session_evicts_nothing() {
        let mut manager = HallUserManager::new();
        let user = PlayerId(1);
        let session = session_for(user);

        manager.on_user_login(HallUserData::new(user, "alice"), session.clone());
        assert!(manager.on_user_login(HallUserData::new(user, "alice"), session).is_none());
    }

    #[test]
    fn test_on_user_logout_stale_session_is_ignored() {
        let mut manager = HallUserManager::new();
        let user = PlayerId(1);
        let old = session_for(user);
        let new = session_for(user);
        manager.on_user_login(HallUserData::new(user, "alice"), old.clone());
        manager.on_user_login(HallUserData::new(user, "alice"), new.clone());

        assert!(manager.on_user_logout(user, &old.session_id).is_none());
        assert!(manager.get_user(user).is_some());

        let removed = manager.on_user_logout(user, &new.session_id).unwrap();
        assert_eq!(removed.user_data.user_id, user);
        assert_eq!(manager.get_user_count(), 0);
        assert!(manager.on_user_logout(user, &new.session_id).is_none());
    }
}
