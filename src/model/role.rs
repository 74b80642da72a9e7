/// Role ids carried in bearer-token claims.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Role {
    Admin = 1,
    Hr = 2,
    Employee = 3,
    System = 4,
    ApiUser = 5,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Hr),
            3 => Some(Role::Employee),
            4 => Some(Role::System),
            5 => Some(Role::ApiUser),
            _ => None,
        }
    }

    /// May read other employees' attendance days.
    pub fn reviews_attendance(self) -> bool {
        matches!(self, Role::Admin | Role::Hr)
    }

    /// May trigger a finalizer pass by hand.
    pub fn runs_finalizer(self) -> bool {
        matches!(self, Role::Admin | Role::System)
    }
}
