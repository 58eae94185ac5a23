use crate::evaluation::{DevCycleUser, FlagClient};

#[derive(Clone)]
pub struct AppState {
    pub flags: FlagClient,
    pub user: DevCycleUser,
}
